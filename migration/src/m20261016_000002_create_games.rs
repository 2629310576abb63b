use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// No foreign key to `users`: leaderboards left-join identity metadata and
// must keep ownership rows whose identity row is missing.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Games::Table)
          .if_not_exists()
          .col(ColumnDef::new(Games::AppId).big_integer().not_null())
          .col(ColumnDef::new(Games::OwnerId).string().not_null())
          .col(ColumnDef::new(Games::Name).string().not_null())
          .col(ColumnDef::new(Games::LogoUrl).string().null())
          .col(
            ColumnDef::new(Games::PlaytimeMinutes)
              .big_integer()
              .not_null()
              .default(0),
          )
          .primary_key(
            Index::create()
              .name("pk_games")
              .col(Games::AppId)
              .col(Games::OwnerId),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_games_owner")
          .table(Games::Table)
          .col(Games::OwnerId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Games::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Games {
  Table,
  AppId,
  OwnerId,
  Name,
  LogoUrl,
  PlaytimeMinutes,
}
