//! Ingestion pipeline: reconciles catalog state for one identity into the
//! store.
//!
//! Profile resolution happens before any write. The identity row is upserted
//! before the ownership batch starts, and the batch commits as one unit, so a
//! failed or cancelled call never leaves a mix of old and new rows for the
//! identity. Every step is an idempotent upsert, which makes the whole call
//! safe to retry.

use tokio::sync::OwnedMutexGuard;

use crate::{
  catalog::{self, Catalog},
  prelude::*,
  state::{Config, IngestLocks},
  sv::{
    self,
    game::{Batch, GameRow},
  },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
  pub id: String,
  pub batch: Batch,
}

#[derive(Clone, Copy)]
pub struct Ingest<'a> {
  db: &'a DatabaseConnection,
  catalog: &'a dyn Catalog,
  config: &'a Config,
  locks: Option<&'a IngestLocks>,
}

/// Holds the per-identity lock and releases its map entry when dropped,
/// including when the ingestion future is cancelled.
struct Held<'a> {
  locks: &'a IngestLocks,
  id: &'a str,
  guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for Held<'_> {
  fn drop(&mut self) {
    self.guard.take();
    self.locks.remove_if(self.id, |_, lock| Arc::strong_count(lock) == 1);
  }
}

impl<'a> Ingest<'a> {
  pub fn new(
    db: &'a DatabaseConnection,
    catalog: &'a dyn Catalog,
    config: &'a Config,
    locks: Option<&'a IngestLocks>,
  ) -> Self {
    Self { db, catalog, config, locks }
  }

  pub fn catalog(&self) -> &'a dyn Catalog {
    self.catalog
  }

  pub fn config(&self) -> &'a Config {
    self.config
  }

  /// Callers bound this with their request deadline. A call cut short drops
  /// its open transaction, which rolls back.
  pub async fn ingest(&self, id: &str) -> Result<Report> {
    let Some(locks) = self.locks else {
      return self.run(id).await;
    };

    let mut held = Held { locks, id, guard: None };
    let lock = locks.entry(id.to_string()).or_default().clone();
    held.guard = Some(lock.lock_owned().await);

    self.run(id).await
  }

  async fn run(&self, id: &str) -> Result<Report> {
    let profile = self
      .catalog
      .fetch_profile(id)
      .await
      .inspect_err(|err| warn!("Profile fetch for {} failed: {}", id, err))?
      .ok_or(Error::IdentityNotFound)?;

    sv::User::new(self.db).upsert(id, &profile).await?;

    let items = self
      .catalog
      .fetch_owned_items(id)
      .await
      .inspect_err(|err| warn!("Owned items for {} failed: {}", id, err))?;

    let cdn = self.config.catalog_cdn.as_str();
    let rows = items
      .into_iter()
      .map(|item| GameRow {
        logo_url: catalog::logo_url(cdn, item.app_id, item.logo_hash.as_deref()),
        app_id: item.app_id,
        name: item.name,
        playtime_minutes: item.playtime_minutes,
      })
      .collect();

    let batch = sv::Game::new(self.db)
      .upsert_batch(id, rows, self.config.prune_missing)
      .await?;

    info!(
      "Ingested {}: {} items written, {} pruned",
      id, batch.written, batch.pruned
    );

    Ok(Report { id: id.to_string(), batch })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    catalog::fake::{FakeCatalog, item},
    entity::{game, user},
    sv::testing,
  };

  const U1: &str = "76561198000000001";

  async fn snapshot(db: &DatabaseConnection) -> (Vec<user::Model>, Vec<game::Model>) {
    let users = user::Entity::find()
      .order_by_asc(user::Column::Id)
      .all(db)
      .await
      .unwrap();
    let games = game::Entity::find()
      .order_by_asc(game::Column::OwnerId)
      .order_by_asc(game::Column::AppId)
      .all(db)
      .await
      .unwrap();
    (users, games)
  }

  #[tokio::test]
  async fn test_ingest_is_idempotent() {
    let db = testing::db().await;
    let config = Config::default();
    let catalog = FakeCatalog::default()
      .with_account(U1, "one", vec![item(10, "A", 120), item(20, "B", 5)]);
    let ingest = Ingest::new(&db, &catalog, &config, None);

    ingest.ingest(U1).await.unwrap();
    let once = snapshot(&db).await;
    ingest.ingest(U1).await.unwrap();
    let twice = snapshot(&db).await;

    assert_eq!(once, twice);
    assert_eq!(once.0.len(), 1);
    assert_eq!(once.1.len(), 2);
    assert_eq!(
      once.1[0].logo_url.as_deref(),
      Some(
        "http://media.steampowered.com/steamcommunity/public/images/apps/10/hash10.jpg"
      )
    );
  }

  #[tokio::test]
  async fn test_playtime_converges_to_catalog() {
    let db = testing::db().await;
    let config = Config::default();
    let catalog =
      FakeCatalog::default().with_account(U1, "one", vec![item(10, "X", 5)]);
    let ingest = Ingest::new(&db, &catalog, &config, None);

    ingest.ingest(U1).await.unwrap();
    catalog.set_account(U1, "renamed", vec![item(10, "X", 50)]);
    ingest.ingest(U1).await.unwrap();

    let (users, games) = snapshot(&db).await;
    assert_eq!(users[0].display_name, "renamed");
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].playtime_minutes, 50);
  }

  #[tokio::test]
  async fn test_unknown_identity_writes_nothing() {
    let db = testing::db().await;
    let config = Config::default();
    let catalog = FakeCatalog::default();
    let ingest = Ingest::new(&db, &catalog, &config, None);

    let result = ingest.ingest(U1).await;
    assert!(matches!(result, Err(Error::IdentityNotFound)));

    let (users, games) = snapshot(&db).await;
    assert!(users.is_empty());
    assert!(games.is_empty());
  }

  #[tokio::test]
  async fn test_outage_is_retryable_and_writes_nothing() {
    let db = testing::db().await;
    let config = Config::default();
    let catalog =
      FakeCatalog::default().with_account(U1, "one", vec![item(10, "A", 1)]);
    catalog.set_outage(true);
    let ingest = Ingest::new(&db, &catalog, &config, None);

    let err = ingest.ingest(U1).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(snapshot(&db).await.0.is_empty());

    catalog.set_outage(false);
    ingest.ingest(U1).await.unwrap();
    assert_eq!(snapshot(&db).await.1.len(), 1);
  }

  #[tokio::test]
  async fn test_empty_library_keeps_previous_rows() {
    let db = testing::db().await;
    let config = Config::default();
    let catalog =
      FakeCatalog::default().with_account(U1, "one", vec![item(10, "A", 1)]);
    let ingest = Ingest::new(&db, &catalog, &config, None);

    ingest.ingest(U1).await.unwrap();
    catalog.set_account(U1, "one", vec![]);
    let report = ingest.ingest(U1).await.unwrap();

    assert_eq!(report.batch, Batch { written: 0, pruned: 0 });
    assert_eq!(snapshot(&db).await.1.len(), 1);
  }

  #[tokio::test]
  async fn test_prune_missing_reconciles_library() {
    let db = testing::db().await;
    let config = Config { prune_missing: true, ..Config::default() };
    let catalog = FakeCatalog::default()
      .with_account(U1, "one", vec![item(10, "A", 1), item(20, "B", 2)]);
    let ingest = Ingest::new(&db, &catalog, &config, None);

    ingest.ingest(U1).await.unwrap();
    catalog.set_account(U1, "one", vec![item(20, "B", 3)]);
    let report = ingest.ingest(U1).await.unwrap();

    assert_eq!(report.batch.pruned, 1);
    let games = snapshot(&db).await.1;
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].app_id, 20);
  }

  #[tokio::test]
  async fn test_concurrent_ingestions_converge() {
    let db = testing::db().await;
    let catalog = FakeCatalog::default()
      .with_account(U1, "one", vec![item(10, "A", 1), item(20, "B", 2)]);

    let config = Config::default();

    for serialize in [false, true] {
      let locks = IngestLocks::new();
      let ingest =
        Ingest::new(&db, &catalog, &config, serialize.then_some(&locks));

      let (a, b) = tokio::join!(ingest.ingest(U1), ingest.ingest(U1));
      a.unwrap();
      b.unwrap();

      let (users, games) = snapshot(&db).await;
      assert_eq!(users.len(), 1);
      assert_eq!(games.len(), 2);
      assert!(locks.is_empty());
    }
  }

  #[tokio::test]
  async fn test_deadline_aborts_ingestion() {
    let db = testing::db().await;
    let config = Config::default();
    let catalog =
      FakeCatalog::default().with_account(U1, "one", vec![item(10, "A", 1)]);
    catalog.set_delay(Duration::from_millis(500));
    let ingest = Ingest::new(&db, &catalog, &config, None);

    let result = time::timeout(Duration::from_millis(20), ingest.ingest(U1)).await;
    assert!(matches!(result.map_err(Error::from), Err(Error::Deadline)));
    assert!(snapshot(&db).await.0.is_empty());
  }

  #[tokio::test]
  async fn test_cancelled_ingestions_release_locks() {
    let db = testing::db().await;
    let config = Config::default();
    let catalog = FakeCatalog::default();
    catalog.set_delay(Duration::from_millis(300));
    let locks = IngestLocks::new();
    let ingest = Ingest::new(&db, &catalog, &config, Some(&locks));

    for n in 0..5 {
      let id = format!("7656119800000010{n}");
      let result = time::timeout(Duration::from_millis(10), ingest.ingest(&id)).await;
      assert!(result.is_err());
    }

    assert!(locks.is_empty());
  }

  #[tokio::test]
  async fn test_cancelled_waiter_releases_lock() {
    let db = testing::db().await;
    let config = Config::default();
    let catalog =
      FakeCatalog::default().with_account(U1, "one", vec![item(10, "A", 1)]);
    catalog.set_delay(Duration::from_millis(100));
    let locks = IngestLocks::new();
    let ingest = Ingest::new(&db, &catalog, &config, Some(&locks));

    let (done, waited) = tokio::join!(
      ingest.ingest(U1),
      time::timeout(Duration::from_millis(20), ingest.ingest(U1)),
    );

    done.unwrap();
    assert!(waited.is_err());
    assert!(locks.is_empty());
  }
}
