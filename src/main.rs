use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tabula_gateway::api::ApiServer;
use tabula_gateway::idempotency::spawn_sweeper;
use tabula_gateway::{Config, db, security};

/// Tabula - Admin and database introspection gateway for multi-tenant APIs
#[derive(Parser)]
#[command(name = "tabula", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "TABULA_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway (the default when no subcommand is given)
    Serve,
    /// Mint an API key and store its digest in the database
    GenerateKey {
        /// Human-readable name for the key
        #[arg(short, long, default_value = "default")]
        name: String,
    },
    /// Query idempotency cache statistics from a running gateway
    Stats {
        /// Base URL of the gateway; defaults to localhost on the configured port
        #[arg(long)]
        url: Option<String>,
        /// API key for the admin endpoint
        #[arg(long, env = "TABULA_API_KEY")]
        api_key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,tabula_gateway=info",
        1 => "info,tabula_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        None | Some(Command::Serve) => serve(cli.port).await,
        Some(Command::GenerateKey { name }) => generate_key(cli.port, &name),
        Some(Command::Stats { url, api_key }) => stats(cli.port, url, api_key).await,
    }
}

/// Run the gateway until interrupted
async fn serve(port: Option<u16>) -> anyhow::Result<()> {
    let config = Config::load(port)?;
    tracing::debug!(?config, "loaded configuration");

    std::fs::create_dir_all(&config.data_dir)?;
    let pool = db::init(config.data_dir.join("tabula.db"))?;

    let server = ApiServer::new(pool, &config);
    let sweeper = spawn_sweeper(server.store(), &config.idempotency);

    tracing::info!(port = config.server.port, "tabula gateway ready");

    let server_task = server.spawn();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
        result = server_task => {
            result??;
        }
    }

    sweeper.shutdown();
    Ok(())
}

/// Mint an API key; the plaintext is printed once and never stored
fn generate_key(port: Option<u16>, name: &str) -> anyhow::Result<()> {
    let config = Config::load(port)?;
    std::fs::create_dir_all(&config.data_dir)?;
    let pool = db::init(config.data_dir.join("tabula.db"))?;

    let plaintext = security::generate_api_key();
    let key = db::ApiKeyRepo::new(pool).create(name, &security::hash_api_key(&plaintext))?;

    println!("API key created: {} ({})", key.name, key.id);
    println!("{plaintext}");
    println!("Store this key now; only its digest is kept.");
    Ok(())
}

/// Print idempotency cache statistics from a running gateway
async fn stats(
    port: Option<u16>,
    url: Option<String>,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let base = match url {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => {
            let config = Config::load(port)?;
            format!("http://127.0.0.1:{}", config.server.port)
        }
    };

    let mut request = reqwest::Client::new().get(format!("{base}/api/admin/idempotency/stats"));
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        anyhow::bail!("gateway returned {}", response.status());
    }

    let body: serde_json::Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
