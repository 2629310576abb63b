use std::collections::HashSet;

use sea_orm::sea_query::OnConflict;

use crate::{entity::game, prelude::*};

/// Rows per statement, keeps bound parameters under SQLite's limit.
const CHUNK: usize = 150;

/// One ownership row as produced by ingestion, owner implied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRow {
  pub app_id: i64,
  pub name: String,
  pub logo_url: Option<String>,
  pub playtime_minutes: i64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
  pub written: usize,
  pub pruned: u64,
}

pub struct Game<'a, C = DatabaseConnection> {
  db: &'a C,
}

impl<'a, C: ConnectionTrait + TransactionTrait> Game<'a, C> {
  pub fn new(db: &'a C) -> Self {
    Self { db }
  }

  /// Upserts all rows of one owner as a single transaction. With `prune`,
  /// rows of that owner missing from `rows` are deleted in the same unit.
  pub async fn upsert_batch(
    &self,
    owner_id: &str,
    rows: Vec<GameRow>,
    prune: bool,
  ) -> Result<Batch> {
    let txn = self.db.begin().await?;
    let mut batch = Batch { written: rows.len(), pruned: 0 };

    if prune {
      let keep: HashSet<i64> = rows.iter().map(|row| row.app_id).collect();
      let existing: Vec<i64> = game::Entity::find()
        .select_only()
        .column(game::Column::AppId)
        .filter(game::Column::OwnerId.eq(owner_id))
        .into_tuple()
        .all(&txn)
        .await?;

      let stale: Vec<i64> =
        existing.into_iter().filter(|id| !keep.contains(id)).collect();

      for chunk in stale.chunks(CHUNK) {
        let res = game::Entity::delete_many()
          .filter(game::Column::OwnerId.eq(owner_id))
          .filter(game::Column::AppId.is_in(chunk.iter().copied()))
          .exec(&txn)
          .await?;
        batch.pruned += res.rows_affected;
      }
    }

    for chunk in rows.chunks(CHUNK) {
      let models = chunk.iter().map(|row| game::ActiveModel {
        app_id: Set(row.app_id),
        owner_id: Set(owner_id.to_string()),
        name: Set(row.name.clone()),
        logo_url: Set(row.logo_url.clone()),
        playtime_minutes: Set(row.playtime_minutes),
      });

      game::Entity::insert_many(models)
        .on_conflict(
          OnConflict::columns([game::Column::AppId, game::Column::OwnerId])
            .update_columns([
              game::Column::Name,
              game::Column::LogoUrl,
              game::Column::PlaytimeMinutes,
            ])
            .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;
    }

    txn.commit().await?;
    Ok(batch)
  }

  pub async fn owned(&self, owner_id: &str) -> Result<Vec<game::Model>> {
    let games = game::Entity::find()
      .filter(game::Column::OwnerId.eq(owner_id))
      .order_by_asc(game::Column::AppId)
      .all(self.db)
      .await?;
    Ok(games)
  }
}
