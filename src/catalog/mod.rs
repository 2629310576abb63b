//! Remote game catalog.
//!
//! Ingestion only talks to the [`Catalog`] trait, the Steam Web API is one
//! implementation of it.

pub mod steam;

use serde::Serialize;

use crate::prelude::*;

pub use steam::Steam;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
  pub display_name: String,
  pub avatar_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedItem {
  pub app_id: i64,
  pub name: String,
  pub logo_hash: Option<String>,
  pub playtime_minutes: i64,
}

/// Item played during the last two weeks. Not stored, it changes daily.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentItem {
  pub app_id: i64,
  pub name: String,
  pub logo_hash: Option<String>,
  pub recent_minutes: i64,
  pub playtime_minutes: i64,
}

#[async_trait]
pub trait Catalog: Send + Sync {
  /// Resolves a vanity name (or a raw id) to an identity.
  async fn resolve_identity(&self, name: &str) -> Result<Option<String>>;

  async fn fetch_profile(&self, id: &str) -> Result<Option<Profile>>;

  /// Owned items of the identity. A private or empty library yields an empty
  /// list rather than an error.
  async fn fetch_owned_items(&self, id: &str) -> Result<Vec<OwnedItem>>;

  async fn fetch_recent_items(&self, id: &str) -> Result<Vec<RecentItem>>;
}

/// `<cdn>/<app_id>/<hash>.jpg`
pub fn logo_url(cdn: &str, app_id: i64, hash: Option<&str>) -> Option<String> {
  hash
    .filter(|hash| !hash.is_empty())
    .map(|hash| format!("{}/{}/{}.jpg", cdn.trim_end_matches('/'), app_id, hash))
}

/// Steam ids are 17 decimal digits.
pub fn is_identity(name: &str) -> bool {
  name.len() == 17 && name.bytes().all(|b| b.is_ascii_digit())
}
