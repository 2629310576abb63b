use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use serde::Serialize;

use crate::{
  compose::Fields,
  prelude::*,
  state::AppState,
  sv::stats::{OwnedItem, RecentItem},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolved {
  pub steam_id: String,
}

/// Resolution, refresh and reads of one request share this deadline.
fn deadline(app: &AppState) -> time::Instant {
  time::Instant::now() + app.config.request_deadline
}

/// Vanity name or raw id to identity.
async fn identity(
  app: &AppState,
  name: &str,
  deadline: time::Instant,
) -> Result<String> {
  time::timeout_at(deadline, app.catalog.resolve_identity(name))
    .await??
    .ok_or(Error::IdentityNotFound)
}

pub async fn health() -> &'static str {
  "OK"
}

pub async fn resolve(
  State(app): State<Arc<AppState>>,
  Path(name): Path<String>,
) -> Result<Json<Resolved>> {
  let steam_id = identity(&app, &name, deadline(&app)).await?;
  Ok(Json(Resolved { steam_id }))
}

pub async fn owned_items(
  State(app): State<Arc<AppState>>,
  Path(name): Path<String>,
) -> Result<Json<Vec<OwnedItem>>> {
  let deadline = deadline(&app);
  let id = identity(&app, &name, deadline).await?;
  Ok(Json(app.sv().stats.owned_items(&id, deadline).await?))
}

pub async fn my_stats(
  State(app): State<Arc<AppState>>,
  Path(name): Path<String>,
) -> Result<Json<Fields>> {
  let deadline = deadline(&app);
  let id = identity(&app, &name, deadline).await?;
  Ok(Json(app.sv().stats.my_stats(&id, deadline).await?))
}

pub async fn global_stats(
  State(app): State<Arc<AppState>>,
  Path(name): Path<String>,
) -> Result<Json<Fields>> {
  let deadline = deadline(&app);
  let id = identity(&app, &name, deadline).await?;
  Ok(Json(app.sv().stats.global_stats(&id, deadline).await?))
}

pub async fn most_popular(
  State(app): State<Arc<AppState>>,
) -> Result<Json<Fields>> {
  Ok(Json(app.sv().stats.most_popular(deadline(&app)).await?))
}

pub async fn recent_items(
  State(app): State<Arc<AppState>>,
  Path(name): Path<String>,
) -> Result<Json<Vec<RecentItem>>> {
  let deadline = deadline(&app);
  let id = identity(&app, &name, deadline).await?;
  Ok(Json(app.sv().stats.recent_items(&id, deadline).await?))
}
