use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One catalog account, keyed by its stable numeric id.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: String,
  pub display_name: String,
  pub avatar_url: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "super::game::Entity")]
  Games,
}

impl Related<super::game::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Games.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
