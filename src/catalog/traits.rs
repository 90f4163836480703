use super::error::CatalogError;
use crate::models::{AudioTargets, Collection, RawItem};
use async_trait::async_trait;

/// Remote catalog, as seen by the sampler.
///
/// All listings are offset-paginated except recommendations. Pages near
/// the end of the result space may be short or empty.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Unique identifier (e.g., "spotify", "fixture")
    fn id(&self) -> &str;

    /// Free-text search over items.
    async fn search(
        &self,
        query: &str,
        offset: u32,
        limit: u32,
        market: Option<&str>,
    ) -> Result<Vec<RawItem>, CatalogError>;

    /// Collections (playlists) listed under a browse category.
    async fn list_collections(
        &self,
        category: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Collection>, CatalogError>;

    /// Member items of one collection.
    async fn list_collection_items(
        &self,
        collection_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<RawItem>, CatalogError>;

    /// Catalog-side suggestions seeded by genres and attribute targets.
    async fn recommendations(
        &self,
        seed_genres: &[String],
        targets: &AudioTargets,
        limit: u32,
    ) -> Result<Vec<RawItem>, CatalogError>;
}

/// Supplies bearer tokens. The token lifecycle is owned by the caller.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, CatalogError>;
}

/// A fixed token, e.g. read from the environment.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, CatalogError> {
        if self.0.trim().is_empty() {
            return Err(CatalogError::Auth("empty access token".to_string()));
        }
        Ok(self.0.clone())
    }
}
