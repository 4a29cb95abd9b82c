//! votebox server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered with
//! `VOTEBOX_*` environment variables, opens the SQLite store (migrating it to
//! the latest schema first) and serves the JSON API over HTTP.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use votebox_server::{AppState, ServerConfig};
use votebox_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "votebox server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Migrate the store, print what was done and exit.
  #[arg(long)]
  migrate_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("VOTEBOX"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open and migrate the SQLite store.
  let store = SqliteStore::open(&store_path, server_cfg.superuser.as_deref())
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let report = store.migration_report();
  for step in &report.applied {
    tracing::info!(from = %step.from, to = %step.to, "applied migration");
  }

  if cli.migrate_only {
    if report.is_noop() {
      println!("store at {} is up to date", store_path.display());
    } else if report.bootstrapped {
      println!("created new store at {}", store_path.display());
    } else {
      println!("applied {} migration step(s)", report.applied.len());
    }
    return Ok(());
  }

  // Build application state.
  let state = AppState { store: Arc::new(store) };

  let app = votebox_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
