use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::error::CatalogError;
use super::traits::{CatalogProvider, TokenSource};
use crate::config::CatalogConfig;
use crate::models::{AudioTargets, Collection, RawItem};

/// Web-API style catalog over HTTPS with bearer authentication.
pub struct HttpCatalog {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
    max_retry_after: Duration,
}

impl HttpCatalog {
    pub fn new(config: &CatalogConfig, tokens: Arc<dyn TokenSource>) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens,
            max_retry_after: Duration::from_millis(config.max_retry_after_ms),
        })
    }

    async fn get_json(
        &self,
        path: &str,
        params: &[(&str, String)],
        operation: &str,
    ) -> Result<Value, CatalogError> {
        let url = format!("{}{}", self.base_url, path);
        let token = self.tokens.access_token().await?;

        log::debug!("{} -> GET {} {:?}", operation, url, params);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(params)
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|secs| Duration::from_secs(secs).min(self.max_retry_after));
            log::warn!("Rate limit (429) on {} ({:?})", operation, retry_after);
            return Err(CatalogError::RateLimited { retry_after });
        }

        let text = response
            .text()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CatalogError::Auth(format!("HTTP {} on {}", status.as_u16(), operation)));
        }

        if status == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(format!("{} ({})", operation, url)));
        }

        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text)
            .map_err(|e| CatalogError::Parse(format!("JSON error in {}: {}", operation, e)))
    }

    /// Pull the `items` array out of `data[key]` (or `data` itself when `key`
    /// is empty), unwrapping `{ "track": {...} }` wrappers and skipping nulls.
    fn extract_items(data: &Value, key: &str, wrapper: Option<&str>) -> Vec<RawItem> {
        let container = if key.is_empty() { Some(data) } else { data.get(key) };
        let Some(items) = container
            .and_then(|c| c.get("items").or(Some(c)))
            .and_then(|v| v.as_array())
        else {
            return Vec::new();
        };

        items
            .iter()
            .filter_map(|raw| {
                let inner = match wrapper {
                    Some(w) => raw.get(w)?,
                    None => raw,
                };
                if inner.is_null() {
                    return None;
                }
                serde_json::from_value::<RawItem>(inner.clone()).ok()
            })
            .collect()
    }

    fn parse_collections(data: &Value) -> Vec<Collection> {
        data.get("playlists")
            .and_then(|p| p.get("items"))
            .and_then(|i| i.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let id = item.get("id")?.as_str()?.to_string();
                        let name = item
                            .get("name")
                            .and_then(|n| n.as_str())
                            .unwrap_or("")
                            .to_string();
                        let item_count = item
                            .get("tracks")
                            .and_then(|t| t.get("total"))
                            .and_then(|t| t.as_u64())
                            .map(|t| t as u32);
                        Some(Collection {
                            id,
                            name,
                            item_count,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl CatalogProvider for HttpCatalog {
    fn id(&self) -> &str {
        "http"
    }

    async fn search(
        &self,
        query: &str,
        offset: u32,
        limit: u32,
        market: Option<&str>,
    ) -> Result<Vec<RawItem>, CatalogError> {
        let mut params = vec![
            ("q", query.to_string()),
            ("type", "track".to_string()),
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(market) = market {
            params.push(("market", market.to_string()));
        }

        let data = self.get_json("/search", &params, "search_tracks").await?;
        Ok(Self::extract_items(&data, "tracks", None))
    }

    async fn list_collections(
        &self,
        category: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Collection>, CatalogError> {
        let path = format!("/browse/categories/{}/playlists", category);
        let params = [("offset", offset.to_string()), ("limit", limit.to_string())];
        let data = self.get_json(&path, &params, "list_collections").await?;
        Ok(Self::parse_collections(&data))
    }

    async fn list_collection_items(
        &self,
        collection_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<RawItem>, CatalogError> {
        let path = format!("/playlists/{}/tracks", collection_id);
        let params = [("offset", offset.to_string()), ("limit", limit.to_string())];
        let data = self.get_json(&path, &params, "list_collection_items").await?;
        Ok(Self::extract_items(&data, "", Some("track")))
    }

    async fn recommendations(
        &self,
        seed_genres: &[String],
        targets: &AudioTargets,
        limit: u32,
    ) -> Result<Vec<RawItem>, CatalogError> {
        let params = [
            ("seed_genres", seed_genres.join(",")),
            ("limit", limit.to_string()),
            ("target_energy", format!("{:.3}", targets.energy)),
            ("target_danceability", format!("{:.3}", targets.danceability)),
            ("target_valence", format!("{:.3}", targets.valence)),
            ("target_acousticness", format!("{:.3}", targets.acousticness)),
            ("target_instrumentalness", format!("{:.3}", targets.instrumentalness)),
            ("target_tempo", format!("{:.1}", targets.tempo)),
            ("max_popularity", targets.max_popularity.to_string()),
        ];
        let data = self.get_json("/recommendations", &params, "recommendations").await?;
        Ok(Self::extract_items(&data, "tracks", None))
    }
}
