//! Ranking engine: read-only aggregates over the ownership table.
//!
//! Every operation is a single statement, so each result is internally
//! consistent. Callers that combine several results open a transaction and
//! hand it in as the connection to read them all from one snapshot.
//!
//! Minutes and counts are stored raw; hours and percentages are derived here
//! with integer division.

use sea_orm::{FromQueryResult, Statement, Value};
use serde::Serialize;

use crate::{entity::game, prelude::*, sv};

/// Items played for less than this many minutes count as unplayed.
pub const UNPLAYED_MINUTES: i64 = 10;

pub const DEFAULT_LIMIT: u64 = 10;

/// `floor(part * 100 / total)`, or 0 when there is nothing to divide by.
pub fn percent(part: i64, total: i64) -> i64 {
  if total == 0 {
    return 0;
  }
  part * 100 / total
}

pub fn hours(minutes: i64) -> i64 {
  minutes / 60
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
  /// Total playtime, ranked in minutes and reported in hours.
  Playtime,
  GameCount,
  /// Complement of the unplayed percentage.
  PlayedPercent,
}

impl Metric {
  pub const ALL: [Metric; 3] =
    [Metric::Playtime, Metric::GameCount, Metric::PlayedPercent];

  /// Per-owner aggregate over `games`. Fixed SQL, never built from input.
  fn aggregate(self) -> &'static str {
    match self {
      Metric::Playtime => "SUM(playtime_minutes)",
      Metric::GameCount => "COUNT(*)",
      Metric::PlayedPercent => {
        "100 - SUM(CASE WHEN playtime_minutes < ? THEN 1 ELSE 0 END) * 100 \
         / COUNT(*)"
      }
    }
  }

  /// Values bound to the placeholders inside [`Metric::aggregate`].
  fn params(self) -> Vec<Value> {
    match self {
      Metric::PlayedPercent => vec![UNPLAYED_MINUTES.into()],
      _ => vec![],
    }
  }

  fn totals(self) -> String {
    format!(
      "WITH totals AS (\
         SELECT owner_id, {} AS value FROM games GROUP BY owner_id\
       )",
      self.aggregate()
    )
  }

  pub fn display(self, value: i64) -> i64 {
    match self {
      Metric::Playtime => hours(value),
      _ => value,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ownership {
  pub total_items: i64,
  pub unplayed_items: i64,
  pub unplayed_percent: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Played {
  pub name: String,
  pub hours: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
  pub value: i64,
  pub rank: i64,
  /// `rank` as a share of ranked identities, "top N percent".
  pub top_percent: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
  pub id: String,
  pub display_name: Option<String>,
  pub avatar_url: Option<String>,
  pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularItem {
  pub name: String,
  pub logo_url: Option<String>,
  pub total_hours: i64,
  pub owner_count: i64,
}

#[derive(Debug, FromQueryResult)]
struct Counts {
  total: i64,
  unplayed: i64,
}

#[derive(Debug, FromQueryResult)]
struct Placement {
  value: i64,
  above: i64,
  population: i64,
}

#[derive(Debug, FromQueryResult)]
struct Popular {
  name: String,
  logo_url: Option<String>,
  minutes: i64,
  owners: i64,
}

pub struct Rank<'a, C = DatabaseConnection> {
  db: &'a C,
}

impl<'a, C: ConnectionTrait> Rank<'a, C> {
  pub fn new(db: &'a C) -> Self {
    Self { db }
  }

  fn statement(&self, sql: &str, values: Vec<Value>) -> Statement {
    Statement::from_sql_and_values(self.db.get_database_backend(), sql, values)
  }

  pub async fn playtime_minutes(&self, id: &str) -> Result<i64> {
    let minutes: Option<Option<i64>> = game::Entity::find()
      .select_only()
      .column_as(game::Column::PlaytimeMinutes.sum(), "minutes")
      .filter(game::Column::OwnerId.eq(id))
      .into_tuple()
      .one(self.db)
      .await?;

    Ok(minutes.flatten().unwrap_or(0))
  }

  /// Whole hours, fractions discarded.
  pub async fn total_playtime(&self, id: &str) -> Result<i64> {
    Ok(hours(self.playtime_minutes(id).await?))
  }

  pub async fn ownership_counts(&self, id: &str) -> Result<Ownership> {
    let stmt = self.statement(
      "SELECT COUNT(*) AS total, \
         COALESCE(SUM(CASE WHEN playtime_minutes < ? THEN 1 ELSE 0 END), 0) \
           AS unplayed \
       FROM games WHERE owner_id = ?",
      vec![UNPLAYED_MINUTES.into(), id.into()],
    );

    let counts = Counts::find_by_statement(stmt)
      .one(self.db)
      .await?
      .unwrap_or(Counts { total: 0, unplayed: 0 });

    Ok(Ownership {
      total_items: counts.total,
      unplayed_items: counts.unplayed,
      unplayed_percent: percent(counts.unplayed, counts.total),
    })
  }

  /// Most played first, ties in item id order.
  pub async fn top_played(&self, id: &str, limit: u64) -> Result<Vec<Played>> {
    let games = game::Entity::find()
      .filter(game::Column::OwnerId.eq(id))
      .order_by_desc(game::Column::PlaytimeMinutes)
      .order_by_asc(game::Column::AppId)
      .limit(limit)
      .all(self.db)
      .await?;

    Ok(
      games
        .into_iter()
        .map(|game| Played {
          name: game.name,
          hours: hours(game.playtime_minutes),
        })
        .collect(),
    )
  }

  /// `rank = 1 + |{owners with a strictly greater value}|`. Equal values share
  /// a rank and the following rank is skipped. An identity without rows has
  /// value 0.
  pub async fn rank(&self, id: &str, metric: Metric) -> Result<Standing> {
    let sql = format!(
      "{totals}, me AS (\
         SELECT COALESCE((SELECT value FROM totals WHERE owner_id = ?), 0) \
           AS value\
       ) \
       SELECT me.value AS value, \
         (SELECT COUNT(*) FROM totals WHERE totals.value > me.value) AS above, \
         (SELECT COUNT(*) FROM totals) \
           + (CASE WHEN EXISTS (SELECT 1 FROM totals WHERE owner_id = ?) \
              THEN 0 ELSE 1 END) AS population \
       FROM me",
      totals = metric.totals()
    );

    let mut values = metric.params();
    values.push(id.into());
    values.push(id.into());

    let placement = Placement::find_by_statement(self.statement(&sql, values))
      .one(self.db)
      .await?
      .ok_or_else(|| Error::Internal("rank query returned no row".into()))?;

    let rank = placement.above + 1;
    Ok(Standing {
      value: metric.display(placement.value),
      rank,
      top_percent: percent(rank, placement.population),
    })
  }

  /// Identities ordered by `metric`, highest first. Ownership rows whose
  /// identity row is missing still appear, with empty metadata.
  pub async fn leaderboard(
    &self,
    metric: Metric,
    limit: u64,
  ) -> Result<Vec<Entry>> {
    let sql = format!(
      "{totals} \
       SELECT totals.owner_id AS id, users.display_name AS display_name, \
         users.avatar_url AS avatar_url, totals.value AS value \
       FROM totals LEFT JOIN users ON users.id = totals.owner_id \
       ORDER BY totals.value DESC, totals.owner_id ASC \
       LIMIT ?",
      totals = metric.totals()
    );

    let mut values = metric.params();
    values.push((limit as i64).into());

    let entries = Entry::find_by_statement(self.statement(&sql, values))
      .all(self.db)
      .await?;

    Ok(
      entries
        .into_iter()
        .map(|entry| Entry { value: metric.display(entry.value), ..entry })
        .collect(),
    )
  }

  /// Item owned by the most identities, ties broken by total playtime.
  pub async fn most_popular_item(&self) -> Result<Option<PopularItem>> {
    let stmt = self.statement(
      "SELECT name, logo_url, SUM(playtime_minutes) AS minutes, \
         COUNT(DISTINCT owner_id) AS owners \
       FROM games GROUP BY name, logo_url \
       ORDER BY owners DESC, minutes DESC, name ASC \
       LIMIT 1",
      vec![],
    );

    let popular = Popular::find_by_statement(stmt).one(self.db).await?;

    Ok(popular.map(|item| PopularItem {
      name: item.name,
      logo_url: item.logo_url,
      total_hours: hours(item.minutes),
      owner_count: item.owners,
    }))
  }

  pub async fn total_identity_count(&self) -> Result<u64> {
    sv::User::new(self.db).count().await
  }
}
