pub mod game;
pub mod ingest;
pub mod rank;
pub mod stats;
pub mod user;

pub use game::Game;
pub use ingest::Ingest;
pub use rank::Rank;
pub use stats::Stats;
pub use user::User;

#[cfg(test)]
pub mod testing {
  use crate::{
    entity::{game, user},
    prelude::*,
  };

  /// Each pooled connection would get its own in-memory database.
  pub async fn db() -> DatabaseConnection {
    let mut opts = sea_orm::ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).sqlx_logging(false);

    let db = Database::connect(opts).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
  }

  pub async fn seed_user(db: &DatabaseConnection, id: &str, name: &str) {
    user::ActiveModel {
      id: Set(id.to_string()),
      display_name: Set(name.to_string()),
      avatar_url: Set(format!("https://avatars.test/{id}.jpg")),
    }
    .insert(db)
    .await
    .unwrap();
  }

  pub async fn seed_game(
    db: &DatabaseConnection,
    owner: &str,
    app_id: i64,
    name: &str,
    minutes: i64,
  ) {
    game::ActiveModel {
      app_id: Set(app_id),
      owner_id: Set(owner.to_string()),
      name: Set(name.to_string()),
      logo_url: Set(Some(format!("https://cdn.test/{app_id}/logo.jpg"))),
      playtime_minutes: Set(minutes),
    }
    .insert(db)
    .await
    .unwrap();
  }
}
