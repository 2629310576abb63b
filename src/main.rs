//! Playstats - game library ingestion and leaderboards
//!
//! Architecture:
//! - Steam Web API as the remote catalog
//! - SeaORM over SQLite for users and ownership rows
//! - Axum for the HTTP API with rate limiting
//! - Tokio for async runtime

mod catalog;
mod compose;
mod entity;
mod error;
mod plugins;
mod prelude;
mod state;
mod sv;

use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{
  catalog::Steam,
  plugins::server,
  prelude::*,
  state::{AppState, Config},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "playstats=debug,tower_http=debug,sea_orm=warn".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = Config::from_env()?;
  info!("Starting Playstats v{}", env!("CARGO_PKG_VERSION"));

  let catalog = Steam::new(config.steam_api_key.clone(), config.catalog_timeout)
    .context("Failed to build catalog client")?;
  let app = Arc::new(AppState::new(config, Arc::new(catalog)).await?);

  let supervisor = plugins::App::new().register(server::Plugin).run(app);

  tokio::signal::ctrl_c().await.context("Failed to listen for ctrl-c")?;
  info!("Shutting down...");
  supervisor.shutdown().await;

  Ok(())
}
