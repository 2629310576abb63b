use std::env;

use sea_orm::ConnectOptions;
use tokio::sync::Mutex;

use crate::{catalog::Catalog, prelude::*, sv};

/// Per-identity ingestion guards, only populated with `serialize_ingest`.
pub type IngestLocks = DashMap<String, Arc<Mutex<()>>>;

#[derive(Debug, Clone)]
pub struct Config {
  pub steam_api_key: String,
  pub database_url: String,
  pub port: u16,
  pub catalog_timeout: Duration,
  pub store_timeout: Duration,
  pub request_deadline: Duration,
  pub catalog_cdn: String,
  pub prune_missing: bool,
  pub serialize_ingest: bool,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      steam_api_key: String::new(),
      database_url: String::from("sqlite:playstats.db?mode=rwc"),
      port: 3000,
      catalog_timeout: Duration::from_secs(10),
      store_timeout: Duration::from_secs(5),
      request_deadline: Duration::from_secs(30),
      catalog_cdn: String::from(
        "http://media.steampowered.com/steamcommunity/public/images/apps",
      ),
      prune_missing: false,
      serialize_ingest: false,
    }
  }
}

impl Config {
  pub fn from_env() -> anyhow::Result<Self> {
    Self::from_lookup(|key| env::var(key).ok())
  }

  pub fn from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
  ) -> anyhow::Result<Self> {
    let defaults = Self::default();

    let duration = |key: &str, default: Duration| -> anyhow::Result<Duration> {
      match lookup(key) {
        Some(raw) => humantime::parse_duration(raw.trim())
          .with_context(|| format!("{key}: invalid duration `{raw}`")),
        None => Ok(default),
      }
    };

    let flag = |key: &str| -> anyhow::Result<bool> {
      match lookup(key).as_deref().map(str::trim) {
        None | Some("") => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => anyhow::bail!("{key}: invalid flag `{other}`"),
      }
    };

    let port = match lookup("PORT") {
      Some(raw) => raw
        .trim()
        .parse::<u16>()
        .with_context(|| format!("PORT: invalid `{raw}`"))?,
      None => defaults.port,
    };

    Ok(Self {
      steam_api_key: lookup("STEAM_API_KEY")
        .filter(|key| !key.trim().is_empty())
        .context("STEAM_API_KEY not set")?,
      database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
      port,
      catalog_timeout: duration("CATALOG_TIMEOUT", defaults.catalog_timeout)?,
      store_timeout: duration("STORE_TIMEOUT", defaults.store_timeout)?,
      request_deadline: duration(
        "REQUEST_DEADLINE",
        defaults.request_deadline,
      )?,
      catalog_cdn: lookup("CATALOG_CDN").unwrap_or(defaults.catalog_cdn),
      prune_missing: flag("PRUNE_MISSING")?,
      serialize_ingest: flag("SERIALIZE_INGEST")?,
    })
  }
}

/// Opens the store and brings the schema up to date.
pub async fn connect(config: &Config) -> anyhow::Result<DatabaseConnection> {
  let mut opts = ConnectOptions::new(config.database_url.clone());
  opts
    .connect_timeout(config.store_timeout)
    .acquire_timeout(config.store_timeout)
    .sqlx_logging(false);

  info!("Connecting to database...");
  let db = Database::connect(opts)
    .await
    .context("Failed to connect to database")?;

  if !config.database_url.contains(":memory:") {
    // Readers keep a consistent snapshot without blocking the writer.
    db.execute_unprepared("PRAGMA journal_mode=WAL")
      .await
      .context("Failed to enable WAL")?;
  }

  info!("Running migrations...");
  Migrator::up(&db, None).await.context("Failed to run migrations")?;

  Ok(db)
}

pub struct Services<'a> {
  pub ingest: sv::Ingest<'a>,
  pub stats: sv::Stats<'a>,
}

pub struct AppState {
  pub db: DatabaseConnection,
  pub catalog: Arc<dyn Catalog>,
  pub config: Config,
  locks: IngestLocks,
}

impl AppState {
  pub async fn new(
    config: Config,
    catalog: Arc<dyn Catalog>,
  ) -> anyhow::Result<Self> {
    let db = connect(&config).await?;
    Ok(Self::with_db(db, catalog, config))
  }

  pub fn with_db(
    db: DatabaseConnection,
    catalog: Arc<dyn Catalog>,
    config: Config,
  ) -> Self {
    Self { db, catalog, config, locks: DashMap::new() }
  }

  pub fn sv(&self) -> Services<'_> {
    let locks = self.config.serialize_ingest.then_some(&self.locks);
    let ingest =
      sv::Ingest::new(&self.db, self.catalog.as_ref(), &self.config, locks);

    Services { ingest, stats: sv::Stats::new(&self.db, ingest) }
  }
}
