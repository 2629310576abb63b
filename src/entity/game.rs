use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::user;

/// Ownership of one catalog item by one identity.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "games")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub app_id: i64,
  #[sea_orm(primary_key, auto_increment = false)]
  pub owner_id: String,
  pub name: String,
  pub logo_url: Option<String>,
  /// Overwritten on every ingestion, never accumulated.
  pub playtime_minutes: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "user::Entity",
    from = "Column::OwnerId",
    to = "user::Column::Id"
  )]
  User,
}

impl Related<user::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::User.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
