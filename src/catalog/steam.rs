use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};

use super::{Catalog, OwnedItem, Profile, RecentItem, is_identity};
use crate::prelude::*;

const API: &str = "https://api.steampowered.com";
const RECENT_COUNT: &str = "20";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
  response: T,
}

#[derive(Debug, Deserialize)]
struct VanityResponse {
  success: u32,
  steamid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SummariesResponse {
  #[serde(default)]
  players: Vec<PlayerSummary>,
}

#[derive(Debug, Deserialize)]
struct PlayerSummary {
  steamid: String,
  personaname: String,
  avatarfull: String,
}

#[derive(Debug, Deserialize)]
struct OwnedGamesResponse {
  /// Absent for private profiles.
  #[serde(default)]
  games: Vec<OwnedGame>,
}

#[derive(Debug, Deserialize)]
struct OwnedGame {
  appid: i64,
  name: String,
  playtime_forever: i64,
  #[serde(default)]
  img_icon_url: Option<String>,
  #[serde(default)]
  img_logo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecentGamesResponse {
  #[serde(default)]
  games: Vec<RecentGame>,
}

#[derive(Debug, Deserialize)]
struct RecentGame {
  appid: i64,
  name: String,
  #[serde(default)]
  playtime_2weeks: i64,
  playtime_forever: i64,
  #[serde(default)]
  img_icon_url: Option<String>,
  #[serde(default)]
  img_logo_url: Option<String>,
}

/// Older payloads carry both hashes; the logo wins over the icon.
fn logo_hash(logo: Option<String>, icon: Option<String>) -> Option<String> {
  logo.filter(|hash| !hash.is_empty()).or(icon.filter(|hash| !hash.is_empty()))
}

/// Steam Web API catalog. The key is loaded once at startup and handed in.
pub struct Steam {
  client: Client,
  key: String,
}

impl Steam {
  pub fn new(key: impl Into<String>, timeout: Duration) -> Result<Self> {
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|err| Error::Internal(format!("http client: {err}")))?;

    Ok(Self { client, key: key.into() })
  }

  async fn get<T: DeserializeOwned>(
    &self,
    method: &str,
    params: &[(&str, &str)],
  ) -> Result<T> {
    let url = format!("{API}/{method}/");
    let envelope: Envelope<T> = self
      .client
      .get(&url)
      .query(&[("key", self.key.as_str())])
      .query(params)
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    Ok(envelope.response)
  }
}

fn vanity_identity(response: VanityResponse) -> Option<String> {
  (response.success == 1).then_some(response.steamid).flatten()
}

fn profile_of(response: SummariesResponse, id: &str) -> Option<Profile> {
  response.players.into_iter().find(|player| player.steamid == id).map(
    |player| Profile {
      display_name: player.personaname,
      avatar_url: player.avatarfull,
    },
  )
}

fn owned_items(response: OwnedGamesResponse) -> Vec<OwnedItem> {
  response
    .games
    .into_iter()
    .map(|game| OwnedItem {
      app_id: game.appid,
      name: game.name,
      logo_hash: logo_hash(game.img_logo_url, game.img_icon_url),
      playtime_minutes: game.playtime_forever.max(0),
    })
    .collect()
}

fn recent_items(response: RecentGamesResponse) -> Vec<RecentItem> {
  response
    .games
    .into_iter()
    .map(|game| RecentItem {
      app_id: game.appid,
      name: game.name,
      logo_hash: logo_hash(game.img_logo_url, game.img_icon_url),
      recent_minutes: game.playtime_2weeks.max(0),
      playtime_minutes: game.playtime_forever.max(0),
    })
    .collect()
}

#[async_trait]
impl Catalog for Steam {
  async fn resolve_identity(&self, name: &str) -> Result<Option<String>> {
    if is_identity(name) {
      return Ok(Some(name.to_string()));
    }

    let response: VanityResponse = self
      .get("ISteamUser/ResolveVanityURL/v0001", &[("vanityurl", name)])
      .await?;

    Ok(vanity_identity(response))
  }

  async fn fetch_profile(&self, id: &str) -> Result<Option<Profile>> {
    let response: SummariesResponse = self
      .get("ISteamUser/GetPlayerSummaries/v0002", &[("steamids", id)])
      .await?;

    Ok(profile_of(response, id))
  }

  async fn fetch_owned_items(&self, id: &str) -> Result<Vec<OwnedItem>> {
    let response: OwnedGamesResponse = self
      .get(
        "IPlayerService/GetOwnedGames/v1",
        &[
          ("steamid", id),
          ("include_appinfo", "1"),
          ("include_played_free_games", "1"),
        ],
      )
      .await?;

    debug!("Catalog returned {} owned items for {}", response.games.len(), id);
    Ok(owned_items(response))
  }

  async fn fetch_recent_items(&self, id: &str) -> Result<Vec<RecentItem>> {
    let response: RecentGamesResponse = self
      .get(
        "IPlayerService/GetRecentlyPlayedGames/v1",
        &[("steamid", id), ("count", RECENT_COUNT)],
      )
      .await?;

    Ok(recent_items(response))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse<T: DeserializeOwned>(raw: &str) -> T {
    json::from_str::<Envelope<T>>(raw).unwrap().response
  }

  #[test]
  fn test_vanity_resolution() {
    let found = parse(r#"{"response":{"steamid":"76561198038149325","success":1}}"#);
    assert_eq!(vanity_identity(found).as_deref(), Some("76561198038149325"));

    let missing = parse(r#"{"response":{"success":42,"message":"No match"}}"#);
    assert_eq!(vanity_identity(missing), None);
  }

  #[test]
  fn test_profile_matches_requested_id() {
    let raw = r#"{"response":{"players":[{
      "steamid":"76561198038149325",
      "personaname":"autarch",
      "avatarfull":"https://avatars.test/full.jpg",
      "profileurl":"https://steamcommunity.com/id/autarch/"
    }]}}"#;

    let profile = profile_of(parse(raw), "76561198038149325").unwrap();
    assert_eq!(profile.display_name, "autarch");
    assert_eq!(profile.avatar_url, "https://avatars.test/full.jpg");

    assert_eq!(profile_of(parse(raw), "76561198000000000"), None);
    assert_eq!(profile_of(parse(r#"{"response":{"players":[]}}"#), "1"), None);
  }

  #[test]
  fn test_owned_games_payload() {
    let raw = r#"{"response":{"game_count":2,"games":[
      {"appid":427520,"name":"Factorio","playtime_forever":120,"img_icon_url":"abc"},
      {"appid":10,"name":"Counter-Strike","playtime_forever":5,"img_icon_url":""}
    ]}}"#;

    let items = owned_items(parse(raw));
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].app_id, 427520);
    assert_eq!(items[0].logo_hash.as_deref(), Some("abc"));
    assert_eq!(items[0].playtime_minutes, 120);
    assert_eq!(items[1].logo_hash, None);
  }

  #[test]
  fn test_logo_hash_preferred_over_icon() {
    let raw = r#"{"response":{"games":[
      {"appid":427520,"name":"Factorio","playtime_forever":120,
       "img_icon_url":"abc","img_logo_url":"def"},
      {"appid":10,"name":"Counter-Strike","playtime_forever":5,
       "img_icon_url":"ghi","img_logo_url":""}
    ]}}"#;

    let items = owned_items(parse(raw));
    assert_eq!(items[0].logo_hash.as_deref(), Some("def"));
    assert_eq!(items[1].logo_hash.as_deref(), Some("ghi"));
  }

  #[test]
  fn test_recently_played_payload() {
    let raw = r#"{"response":{"total_count":2,"games":[
      {"appid":427520,"name":"Factorio","playtime_2weeks":90,
       "playtime_forever":600,"img_icon_url":"abc","img_logo_url":"def"},
      {"appid":10,"name":"Counter-Strike","playtime_forever":5}
    ]}}"#;

    let items = recent_items(parse(raw));
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].recent_minutes, 90);
    assert_eq!(items[0].playtime_minutes, 600);
    assert_eq!(items[0].logo_hash.as_deref(), Some("def"));
    assert_eq!(items[1].recent_minutes, 0);
    assert_eq!(items[1].logo_hash, None);

    assert!(recent_items(parse(r#"{"response":{}}"#)).is_empty());
  }

  #[test]
  fn test_private_library_is_empty() {
    assert!(owned_items(parse(r#"{"response":{}}"#)).is_empty());
  }

  #[test]
  fn test_malformed_payload_is_rejected() {
    let raw = r#"{"response":{"games":[{"appid":1,"playtime_forever":3}]}}"#;
    assert!(json::from_str::<Envelope<OwnedGamesResponse>>(raw).is_err());
  }
}
