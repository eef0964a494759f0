//! Schema introspection over `sqlite_master` and table pragmas
//!
//! Results are cached for a short window, so row counts and column sets may
//! lag DDL run outside the gateway by up to the cache TTL.

use std::time::Duration;

use mini_moka::sync::Cache;
use serde::Serialize;

use super::DbPool;
use crate::{Error, Result};

/// How long introspection results stay cached
const CACHE_TTL: Duration = Duration::from_secs(30);

/// Upper bound on cached table details
const CACHE_CAPACITY: u64 = 256;

/// A tenant table visible through the API
#[derive(Debug, Clone, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub row_count: i64,
}

/// One column of an introspected table
#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
}

/// Full description of one table
#[derive(Debug, Clone, Serialize)]
pub struct TableDetail {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub row_count: i64,
}

/// Schema introspection repository with a TTL cache in front of the pragmas
#[derive(Clone)]
pub struct SchemaRepo {
    pool: DbPool,
    tables: Cache<(), Vec<TableInfo>>,
    details: Cache<String, TableDetail>,
}

impl SchemaRepo {
    /// Create a new schema repository
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            tables: Cache::builder()
                .max_capacity(1)
                .time_to_live(CACHE_TTL)
                .build(),
            details: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    /// List tenant tables with their row counts
    ///
    /// Internal (`tabula_`) and `SQLite` system tables are hidden.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_tables(&self) -> Result<Vec<TableInfo>> {
        if let Some(cached) = self.tables.get(&()) {
            return Ok(cached);
        }

        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE 'tabula_%'
             ORDER BY name",
        )?;

        let names: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .filter_map(std::result::Result::ok)
            .collect();

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let row_count = count_rows(&conn, &name)?;
            tables.push(TableInfo { name, row_count });
        }

        self.tables.insert((), tables.clone());
        Ok(tables)
    }

    /// Describe one table: columns and row count
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentifier`] for malformed names,
    /// [`Error::UnknownEntity`] when the table does not exist, or a database
    /// error
    pub fn table_detail(&self, table: &str) -> Result<TableDetail> {
        validate_identifier(table)?;
        if is_reserved(table) {
            return Err(Error::UnknownEntity(format!("table {table}")));
        }

        if let Some(cached) = self.details.get(&table.to_string()) {
            return Ok(cached);
        }

        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(Error::UnknownEntity(format!("table {table}")));
        }

        let mut stmt = conn.prepare(
            "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let columns: Vec<ColumnInfo> = stmt
            .query_map([table], |row| {
                Ok(ColumnInfo {
                    name: row.get(0)?,
                    data_type: row.get(1)?,
                    nullable: row.get::<_, i64>(2)? == 0,
                    primary_key: row.get::<_, i64>(3)? != 0,
                })
            })?
            .filter_map(std::result::Result::ok)
            .collect();

        let detail = TableDetail {
            name: table.to_string(),
            columns,
            row_count: count_rows(&conn, table)?,
        };

        self.details.insert(table.to_string(), detail.clone());
        Ok(detail)
    }

    /// Column names of a table (validation helper for record writes)
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::table_detail`]
    pub fn column_names(&self, table: &str) -> Result<Vec<String>> {
        Ok(self
            .table_detail(table)?
            .columns
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    /// Drop all cached introspection results
    pub fn invalidate(&self) {
        self.tables.invalidate_all();
        self.details.invalidate_all();
    }
}

/// Count rows of a table whose name has already been validated
fn count_rows(conn: &rusqlite::Connection, table: &str) -> Result<i64> {
    // Identifiers cannot be bound as parameters; `table` is validated and
    // known to exist, so interpolation is safe here.
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

/// Accept only bare SQL identifiers: `[A-Za-z_][A-Za-z0-9_]*`
///
/// # Errors
///
/// Returns [`Error::InvalidIdentifier`] otherwise
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

/// Tables the API must never expose
fn is_reserved(name: &str) -> bool {
    name.starts_with("sqlite_") || name.starts_with("tabula_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn setup() -> SchemaRepo {
        let pool = init_memory().unwrap();
        let conn = pool.get().unwrap();
        conn.execute_batch(
            r"
            CREATE TABLE notes (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                body TEXT
            );
            CREATE TABLE tags (name TEXT NOT NULL);
            INSERT INTO tags (name) VALUES ('a'), ('b'), ('c');
            ",
        )
        .unwrap();
        SchemaRepo::new(pool)
    }

    #[test]
    fn test_list_tables_hides_internal() {
        let repo = setup();
        let tables = repo.list_tables().unwrap();

        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["notes", "tags"]);
        assert!(!names.contains(&"tabula_api_keys"));

        let tags = tables.iter().find(|t| t.name == "tags").unwrap();
        assert_eq!(tags.row_count, 3);
    }

    #[test]
    fn test_table_detail_columns() {
        let repo = setup();
        let detail = repo.table_detail("notes").unwrap();

        assert_eq!(detail.name, "notes");
        assert_eq!(detail.columns.len(), 3);
        assert_eq!(detail.row_count, 0);

        let id = &detail.columns[0];
        assert_eq!(id.name, "id");
        assert!(id.primary_key);

        let title = &detail.columns[1];
        assert_eq!(title.name, "title");
        assert_eq!(title.data_type, "TEXT");
        assert!(!title.nullable);

        let body = &detail.columns[2];
        assert!(body.nullable);
        assert!(!body.primary_key);
    }

    #[test]
    fn test_unknown_table_rejected() {
        let repo = setup();
        assert!(matches!(
            repo.table_detail("missing"),
            Err(Error::UnknownEntity(_))
        ));
    }

    #[test]
    fn test_reserved_tables_hidden() {
        let repo = setup();
        assert!(matches!(
            repo.table_detail("tabula_api_keys"),
            Err(Error::UnknownEntity(_))
        ));
        assert!(matches!(
            repo.table_detail("sqlite_master"),
            Err(Error::UnknownEntity(_))
        ));
    }

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("notes").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("t2").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("2fast").is_err());
        assert!(validate_identifier("bad-name").is_err());
        assert!(validate_identifier("drop table; --").is_err());
        assert!(validate_identifier("no\"quote").is_err());
    }

    #[test]
    fn test_stale_cache_refreshes_on_invalidate() {
        let repo = setup();
        assert_eq!(repo.list_tables().unwrap().len(), 2);

        let conn = repo.pool.get().unwrap();
        conn.execute_batch("CREATE TABLE extras (x TEXT);").unwrap();
        drop(conn);

        // Within the TTL the cached list is served
        assert_eq!(repo.list_tables().unwrap().len(), 2);

        repo.invalidate();
        assert_eq!(repo.list_tables().unwrap().len(), 3);
    }
}
