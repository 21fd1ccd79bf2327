//! HTTP client for the Spotify Web API.
//!
//! Token acquisition and refresh happen elsewhere; this client is handed a
//! bearer token and only classifies what the API answers.

use super::error::CatalogError;
use super::models::{CatalogPayload, SearchHits};
use super::trait_def::CatalogClient;
use crate::catalog::{EntityKind, FeatureDimension, SearchType};
use crate::recommendation::ToleranceWindow;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";

pub struct SpotifyClient {
    client: Client,
    base_url: String,
    access_token: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Deserialize)]
struct IdOnly {
    id: Option<String>,
}

impl SpotifyClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - API root, e.g. "https://api.spotify.com/v1"
    /// * `access_token` - OAuth bearer token
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: &str, access_token: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        })
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, CatalogError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await
            .map_err(classify_transport_error)?;

        if !response.status().is_success() {
            return Err(classify_failure(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| CatalogError::RemoteError {
                status: StatusCode::OK.as_u16(),
                message: format!("Undecodable response body: {}", e),
            })
    }
}

fn classify_transport_error(err: reqwest::Error) -> CatalogError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        CatalogError::Unavailable(err.to_string())
    } else {
        CatalogError::RemoteError {
            status: err.status().map(|s| s.as_u16()).unwrap_or(0),
            message: err.to_string(),
        }
    }
}

async fn classify_failure(response: Response) -> CatalogError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let body = response.text().await.unwrap_or_default();
    classify_status(status, retry_after, &body)
}

fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> CatalogError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        warn!("Remote catalog rate limit hit, retry after {:?}", retry_after);
        return CatalogError::RateLimited { retry_after };
    }
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error.message)
        .unwrap_or_else(|| body.to_string());
    if status.is_server_error() {
        CatalogError::Unavailable(format!("{}: {}", status, message))
    } else {
        CatalogError::RemoteError {
            status: status.as_u16(),
            message,
        }
    }
}

/// Decode a batch lookup body into entries aligned with the requested ids.
fn parse_batch(
    kind: EntityKind,
    mut body: serde_json::Value,
    expected: usize,
) -> Result<Vec<Option<CatalogPayload>>, CatalogError> {
    let malformed = |message: String| CatalogError::RemoteError {
        status: StatusCode::OK.as_u16(),
        message,
    };

    let items = match body.get_mut(kind.response_key()).map(serde_json::Value::take) {
        Some(serde_json::Value::Array(items)) => items,
        _ => {
            return Err(malformed(format!(
                "Response is missing the '{}' array",
                kind.response_key()
            )))
        }
    };
    if items.len() != expected {
        return Err(malformed(format!(
            "Asked for {} {} entries, got {}",
            expected,
            kind,
            items.len()
        )));
    }

    items
        .into_iter()
        .map(|item| {
            if item.is_null() {
                Ok(None)
            } else {
                CatalogPayload::from_json(kind, item)
                    .map(Some)
                    .map_err(|e| malformed(format!("Malformed {} entry: {}", kind, e)))
            }
        })
        .collect()
}

fn ids_of(items: Option<&serde_json::Value>) -> Vec<String> {
    items
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value::<IdOnly>(item.clone()).ok())
                .filter_map(|item| item.id)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_search(body: &serde_json::Value, types: &[SearchType]) -> SearchHits {
    let mut hits = SearchHits::default();
    for search_type in types {
        let ids = ids_of(body.get(search_type.response_key()).and_then(|p| p.get("items")));
        match search_type {
            SearchType::Track => hits.tracks = ids,
            SearchType::Artist => hits.artists = ids,
            SearchType::Album => hits.albums = ids,
        }
    }
    hits
}

fn recommendation_query(
    seed_track_ids: &[String],
    window: &ToleranceWindow,
    limit: usize,
) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("seed_tracks", seed_track_ids.join(",")),
        ("limit", limit.to_string()),
    ];
    for dimension in FeatureDimension::ALL {
        let (min, max) = window.range(dimension);
        let (min_key, max_key) = match dimension {
            FeatureDimension::Acousticness => ("min_acousticness", "max_acousticness"),
            FeatureDimension::Danceability => ("min_danceability", "max_danceability"),
            FeatureDimension::Energy => ("min_energy", "max_energy"),
            FeatureDimension::Instrumentalness => ("min_instrumentalness", "max_instrumentalness"),
            FeatureDimension::Liveness => ("min_liveness", "max_liveness"),
            FeatureDimension::Valence => ("min_valence", "max_valence"),
            FeatureDimension::Speechiness => ("min_speechiness", "max_speechiness"),
            FeatureDimension::Tempo => ("min_tempo", "max_tempo"),
        };
        query.push((min_key, min.to_string()));
        query.push((max_key, max.to_string()));
    }
    query
}

#[async_trait]
impl CatalogClient for SpotifyClient {
    async fn fetch_batch(
        &self,
        kind: EntityKind,
        ids: &[String],
    ) -> Result<Vec<Option<CatalogPayload>>, CatalogError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let body = self
            .get_json(kind.endpoint(), &[("ids", ids.join(","))])
            .await?;
        parse_batch(kind, body, ids.len())
    }

    async fn search(
        &self,
        query: &str,
        types: &[SearchType],
        limit: usize,
    ) -> Result<SearchHits, CatalogError> {
        let type_param = types
            .iter()
            .map(|t| t.query_value())
            .collect::<Vec<_>>()
            .join(",");
        debug!("Searching for '{}' in [{}]", query, type_param);
        let body = self
            .get_json(
                "search",
                &[
                    ("q", query.to_string()),
                    ("type", type_param),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(parse_search(&body, types))
    }

    async fn recommend(
        &self,
        seed_track_ids: &[String],
        window: &ToleranceWindow,
        limit: usize,
    ) -> Result<Vec<String>, CatalogError> {
        let query = recommendation_query(seed_track_ids, window, limit);
        let body = self.get_json("recommendations", &query).await?;
        Ok(ids_of(body.get("tracks")))
    }
}
