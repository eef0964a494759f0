//! Generic record administration over introspected tables
//!
//! Every statement is assembled from validated identifiers and bound
//! parameters; raw values never reach the SQL text. Rows are addressed by
//! `rowid`, exposed to clients as `_id`.

use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Map, Value};

use super::DbPool;
use super::introspect::SchemaRepo;
use crate::{Error, Result};

/// Record repository for tenant tables
#[derive(Clone)]
pub struct RecordRepo {
    pool: DbPool,
    schema: SchemaRepo,
}

impl RecordRepo {
    /// Create a new record repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool, schema: SchemaRepo) -> Self {
        Self { pool, schema }
    }

    /// List up to `limit` rows of a table as JSON objects
    ///
    /// # Errors
    ///
    /// Returns error if the table is unknown or the query fails
    pub fn list(&self, table: &str, limit: u32) -> Result<Vec<Value>> {
        // Also validates the identifier and checks existence
        self.schema.table_detail(table)?;

        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let sql = format!("SELECT rowid AS _id, * FROM \"{table}\" LIMIT ?1");
        let mut stmt = conn.prepare(&sql)?;
        let names: Vec<String> = stmt
            .column_names()
            .iter()
            .map(ToString::to_string)
            .collect();

        let rows: Vec<Value> = stmt
            .query_map([limit], |row| {
                let mut object = Map::new();
                for (i, name) in names.iter().enumerate() {
                    object.insert(name.clone(), sql_to_json(row.get_ref(i)?));
                }
                Ok(Value::Object(object))
            })?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(rows)
    }

    /// Insert a record built from a JSON object; returns the new `rowid`
    ///
    /// # Errors
    ///
    /// Returns error if the table or a column is unknown, the payload is
    /// empty, or the insert fails
    pub fn insert(&self, table: &str, fields: &Map<String, Value>) -> Result<i64> {
        let columns = self.checked_columns(table, fields)?;

        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let quoted: Vec<String> = columns.iter().map(|c| format!("\"{c}\"")).collect();
        let sql = format!(
            "INSERT INTO \"{table}\" ({}) VALUES ({})",
            quoted.join(", "),
            placeholders.join(", ")
        );

        let mut params: Vec<SqlValue> = Vec::with_capacity(columns.len());
        for column in &columns {
            params.push(json_to_sql(&fields[column])?);
        }

        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;
        conn.execute(&sql, rusqlite::params_from_iter(params))?;

        Ok(conn.last_insert_rowid())
    }

    /// Update columns of one record; returns false when no row matched
    ///
    /// # Errors
    ///
    /// Returns error if the table or a column is unknown, the payload is
    /// empty, or the update fails
    pub fn update(&self, table: &str, id: i64, fields: &Map<String, Value>) -> Result<bool> {
        let columns = self.checked_columns(table, fields)?;

        let assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("\"{c}\" = ?{}", i + 1))
            .collect();
        let sql = format!(
            "UPDATE \"{table}\" SET {} WHERE rowid = ?{}",
            assignments.join(", "),
            columns.len() + 1
        );

        let mut params: Vec<SqlValue> = Vec::with_capacity(columns.len() + 1);
        for column in &columns {
            params.push(json_to_sql(&fields[column])?);
        }
        params.push(SqlValue::Integer(id));

        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;
        let changed = conn.execute(&sql, rusqlite::params_from_iter(params))?;

        Ok(changed > 0)
    }

    /// Delete one record; returns false when no row matched
    ///
    /// # Errors
    ///
    /// Returns error if the table is unknown or the delete fails
    pub fn delete(&self, table: &str, id: i64) -> Result<bool> {
        self.schema.table_detail(table)?;

        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let sql = format!("DELETE FROM \"{table}\" WHERE rowid = ?1");
        let deleted = conn.execute(&sql, [id])?;

        Ok(deleted > 0)
    }

    /// Validate the payload against the table's column set, preserving the
    /// payload's key order
    fn checked_columns(&self, table: &str, fields: &Map<String, Value>) -> Result<Vec<String>> {
        if fields.is_empty() {
            return Err(Error::BadRequest("record has no fields".to_string()));
        }

        let known = self.schema.column_names(table)?;
        let mut columns = Vec::with_capacity(fields.len());
        for key in fields.keys() {
            if !known.iter().any(|c| c == key) {
                return Err(Error::BadRequest(format!("unknown column: {table}.{key}")));
            }
            columns.push(key.clone());
        }

        Ok(columns)
    }
}

/// Map a JSON value onto an `SQLite` storage class
fn json_to_sql(value: &Value) -> Result<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(SqlValue::Integer(i))
            } else if let Some(f) = n.as_f64() {
                Ok(SqlValue::Real(f))
            } else {
                Err(Error::BadRequest(format!("unsupported number: {n}")))
            }
        }
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        // Nested structures are stored as JSON text
        other @ (Value::Array(_) | Value::Object(_)) => Ok(SqlValue::Text(other.to_string())),
    }
}

/// Map an `SQLite` value back to JSON
fn sql_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(hex::encode(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;
    use serde_json::json;

    fn setup() -> RecordRepo {
        let pool = init_memory().unwrap();
        let conn = pool.get().unwrap();
        conn.execute_batch(
            r"
            CREATE TABLE notes (
                title TEXT NOT NULL,
                body TEXT,
                stars INTEGER NOT NULL DEFAULT 0
            );
            ",
        )
        .unwrap();
        let schema = SchemaRepo::new(pool.clone());
        RecordRepo::new(pool, schema)
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_insert_and_list() {
        let repo = setup();

        let id = repo
            .insert("notes", &object(json!({"title": "first", "stars": 3})))
            .unwrap();
        assert_eq!(id, 1);

        let rows = repo.list("notes", 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["_id"], json!(1));
        assert_eq!(rows[0]["title"], json!("first"));
        assert_eq!(rows[0]["stars"], json!(3));
        assert_eq!(rows[0]["body"], Value::Null);
    }

    #[test]
    fn test_list_respects_limit() {
        let repo = setup();
        for i in 0..5 {
            repo.insert("notes", &object(json!({"title": format!("n{i}")})))
                .unwrap();
        }

        assert_eq!(repo.list("notes", 3).unwrap().len(), 3);
        assert_eq!(repo.list("notes", 100).unwrap().len(), 5);
    }

    #[test]
    fn test_update_and_delete() {
        let repo = setup();
        let id = repo
            .insert("notes", &object(json!({"title": "draft"})))
            .unwrap();

        let changed = repo
            .update("notes", id, &object(json!({"title": "final", "stars": 5})))
            .unwrap();
        assert!(changed);

        let rows = repo.list("notes", 10).unwrap();
        assert_eq!(rows[0]["title"], json!("final"));
        assert_eq!(rows[0]["stars"], json!(5));

        assert!(repo.delete("notes", id).unwrap());
        assert!(!repo.delete("notes", id).unwrap());
        assert!(repo.list("notes", 10).unwrap().is_empty());
    }

    #[test]
    fn test_update_missing_row_reports_no_change() {
        let repo = setup();
        let changed = repo
            .update("notes", 999, &object(json!({"title": "x"})))
            .unwrap();
        assert!(!changed);
    }

    #[test]
    fn test_unknown_column_rejected() {
        let repo = setup();
        let err = repo
            .insert("notes", &object(json!({"title": "x", "bogus": 1})))
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn test_empty_payload_rejected() {
        let repo = setup();
        let err = repo.insert("notes", &Map::new()).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn test_unknown_table_rejected() {
        let repo = setup();
        let err = repo
            .insert("missing", &object(json!({"title": "x"})))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownEntity(_)));
    }

    #[test]
    fn test_values_round_trip_storage_classes() {
        let repo = setup();
        repo.insert(
            "notes",
            &object(json!({
                "title": "typed",
                "body": {"nested": [1, 2]},
                "stars": 2.5,
            })),
        )
        .unwrap();

        let rows = repo.list("notes", 1).unwrap();
        assert_eq!(rows[0]["body"], json!("{\"nested\":[1,2]}"));
        assert_eq!(rows[0]["stars"], json!(2.5));
    }
}
