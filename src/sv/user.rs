use sea_orm::sea_query::OnConflict;

use crate::{catalog::Profile, entity::user, prelude::*};

pub struct User<'a, C = DatabaseConnection> {
  db: &'a C,
}

impl<'a, C: ConnectionTrait> User<'a, C> {
  pub fn new(db: &'a C) -> Self {
    Self { db }
  }

  /// Single `INSERT .. ON CONFLICT DO UPDATE`, so concurrent writers of the
  /// same identity never lose the row to a read-then-write gap.
  pub async fn upsert(&self, id: &str, profile: &Profile) -> Result<()> {
    let user = user::ActiveModel {
      id: Set(id.to_string()),
      display_name: Set(profile.display_name.clone()),
      avatar_url: Set(profile.avatar_url.clone()),
    };

    user::Entity::insert(user)
      .on_conflict(
        OnConflict::column(user::Column::Id)
          .update_columns([
            user::Column::DisplayName,
            user::Column::AvatarUrl,
          ])
          .to_owned(),
      )
      .exec_without_returning(self.db)
      .await?;

    Ok(())
  }

  pub async fn by_id(&self, id: &str) -> Result<Option<user::Model>> {
    Ok(user::Entity::find_by_id(id).one(self.db).await?)
  }

  pub async fn count(&self) -> Result<u64> {
    Ok(user::Entity::find().count(self.db).await?)
  }
}
