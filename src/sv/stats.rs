//! Operations exposed to the route layer. Each identity-bearing call refreshes
//! the identity through ingestion first, then reads everything it reports
//! from one snapshot. The whole call, refresh and reads alike, runs under the
//! caller's deadline.

use serde::Serialize;

use crate::{
  catalog,
  compose::{self, Fields},
  prelude::*,
  sv::{
    self,
    rank::{self, DEFAULT_LIMIT, Metric, Standing},
  },
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedItem {
  pub item_id: i64,
  pub logo_url: Option<String>,
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentItem {
  pub item_id: i64,
  pub name: String,
  pub logo_url: Option<String>,
  pub recent_hours: i64,
  pub total_hours: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Identity {
  display_name: String,
  avatar_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Ranks {
  playtime_rank: Standing,
  item_count_rank: Standing,
  played_percent_rank: Standing,
}

pub struct Stats<'a> {
  db: &'a DatabaseConnection,
  ingest: sv::Ingest<'a>,
}

/// Identity metadata, totals, ownership counts and top played items.
async fn personal<C: ConnectionTrait>(db: &C, id: &str) -> Result<Vec<Fields>> {
  let user =
    sv::User::new(db).by_id(id).await?.ok_or(Error::IdentityNotFound)?;
  let rank = sv::Rank::new(db);

  Ok(vec![
    compose::fields(&Identity {
      display_name: user.display_name,
      avatar_url: user.avatar_url,
    })?,
    compose::field("totalHours", rank.total_playtime(id).await?)?,
    compose::fields(&rank.ownership_counts(id).await?)?,
    compose::field("topPlayed", rank.top_played(id, DEFAULT_LIMIT).await?)?,
  ])
}

impl<'a> Stats<'a> {
  pub fn new(db: &'a DatabaseConnection, ingest: sv::Ingest<'a>) -> Self {
    Self { db, ingest }
  }

  pub async fn owned_items(
    &self,
    id: &str,
    deadline: time::Instant,
  ) -> Result<Vec<OwnedItem>> {
    time::timeout_at(deadline, async {
      self.ingest.ingest(id).await?;

      let games = sv::Game::new(self.db).owned(id).await?;
      Ok::<_, Error>(
        games
          .into_iter()
          .map(|game| OwnedItem {
            item_id: game.app_id,
            logo_url: game.logo_url,
            name: game.name,
          })
          .collect(),
      )
    })
    .await?
  }

  /// Straight from the catalog, recent playtime is never stored.
  pub async fn recent_items(
    &self,
    id: &str,
    deadline: time::Instant,
  ) -> Result<Vec<RecentItem>> {
    let items =
      time::timeout_at(deadline, self.ingest.catalog().fetch_recent_items(id))
        .await??;

    let cdn = self.ingest.config().catalog_cdn.as_str();
    Ok(
      items
        .into_iter()
        .map(|item| RecentItem {
          logo_url: catalog::logo_url(cdn, item.app_id, item.logo_hash.as_deref()),
          item_id: item.app_id,
          name: item.name,
          recent_hours: rank::hours(item.recent_minutes),
          total_hours: rank::hours(item.playtime_minutes),
        })
        .collect(),
    )
  }

  pub async fn my_stats(&self, id: &str, deadline: time::Instant) -> Result<Fields> {
    time::timeout_at(deadline, async {
      self.ingest.ingest(id).await?;

      let snapshot = self.db.begin().await?;
      let parts = personal(&snapshot, id).await?;
      snapshot.commit().await?;

      Ok::<_, Error>(compose::merge(parts))
    })
    .await?
  }

  pub async fn global_stats(
    &self,
    id: &str,
    deadline: time::Instant,
  ) -> Result<Fields> {
    time::timeout_at(deadline, async {
      self.ingest.ingest(id).await?;

      let snapshot = self.db.begin().await?;
      let rank = sv::Rank::new(&snapshot);

      let mut user = personal(&snapshot, id).await?;
      user.push(compose::fields(&Ranks {
        playtime_rank: rank.rank(id, Metric::Playtime).await?,
        item_count_rank: rank.rank(id, Metric::GameCount).await?,
        played_percent_rank: rank.rank(id, Metric::PlayedPercent).await?,
      })?);

      let parts = [
        compose::field("userStats", compose::merge(user))?,
        compose::field(
          "topByPlaytime",
          rank.leaderboard(Metric::Playtime, DEFAULT_LIMIT).await?,
        )?,
        compose::field(
          "topByItemCount",
          rank.leaderboard(Metric::GameCount, DEFAULT_LIMIT).await?,
        )?,
        compose::field(
          "topByUnplayedPercentComplement",
          rank.leaderboard(Metric::PlayedPercent, DEFAULT_LIMIT).await?,
        )?,
      ];
      snapshot.commit().await?;

      Ok::<_, Error>(compose::merge(parts))
    })
    .await?
  }

  pub async fn most_popular(&self, deadline: time::Instant) -> Result<Fields> {
    time::timeout_at(deadline, async {
      let snapshot = self.db.begin().await?;
      let rank = sv::Rank::new(&snapshot);

      let mut parts =
        vec![compose::field("totalUsers", rank.total_identity_count().await?)?];
      if let Some(item) = rank.most_popular_item().await? {
        parts.push(compose::fields(&item)?);
      }
      snapshot.commit().await?;

      Ok::<_, Error>(compose::merge(parts))
    })
    .await?
  }
}
