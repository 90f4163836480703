//! Catalog backed by an in-memory dump, for offline runs and tests.
//!
//! Pagination follows the remote semantics: offsets past the end of a
//! result set return empty pages rather than errors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::error::CatalogError;
use super::traits::CatalogProvider;
use crate::models::{AudioTargets, Collection, RawItem};

/// A collection in the dump, with its category and member ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureCollection {
    pub id: String,
    pub name: String,
    pub category: String,
    pub item_ids: Vec<String>,
}

/// On-disk layout of a catalog dump.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogDump {
    pub items: Vec<RawItem>,
    pub collections: Vec<FixtureCollection>,
}

pub struct MemoryCatalog {
    items: Vec<RawItem>,
    by_id: HashMap<String, usize>,
    collections: Vec<FixtureCollection>,
}

impl MemoryCatalog {
    pub fn new(dump: CatalogDump) -> Self {
        let by_id = dump
            .items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| item.id.clone().map(|id| (id, i)))
            .collect();
        Self {
            items: dump.items,
            by_id,
            collections: dump.collections,
        }
    }

    pub fn from_items(items: Vec<RawItem>) -> Self {
        Self::new(CatalogDump {
            items,
            collections: Vec::new(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::NotFound(format!("{:?}: {}", path, e)))?;
        let dump: CatalogDump = serde_json::from_str(&text)?;
        log::info!(
            "Loaded fixture catalog: {} items, {} collections",
            dump.items.len(),
            dump.collections.len()
        );
        Ok(Self::new(dump))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn page<T: Clone>(all: &[T], offset: u32, limit: u32) -> Vec<T> {
        all.iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect()
    }

    fn matches(item: &RawItem, needle: &str) -> bool {
        let contains = |value: Option<&str>| {
            value.is_some_and(|v| v.to_lowercase().contains(needle))
        };
        contains(item.name.as_deref())
            || item.artists.iter().any(|a| contains(a.name.as_deref()))
            || item
                .album
                .as_ref()
                .is_some_and(|album| {
                    contains(album.name.as_deref()) || contains(album.release_date.as_deref())
                })
    }

    fn genres_of(item: &RawItem) -> impl Iterator<Item = &String> {
        item.genres
            .iter()
            .chain(item.album.iter().flat_map(|a| a.genres.iter()))
    }
}

#[async_trait]
impl CatalogProvider for MemoryCatalog {
    fn id(&self) -> &str {
        "fixture"
    }

    async fn search(
        &self,
        query: &str,
        offset: u32,
        limit: u32,
        _market: Option<&str>,
    ) -> Result<Vec<RawItem>, CatalogError> {
        let needle = query.trim().to_lowercase();
        let hits: Vec<RawItem> = self
            .items
            .iter()
            .filter(|item| needle.is_empty() || Self::matches(item, &needle))
            .cloned()
            .collect();
        Ok(Self::page(&hits, offset, limit))
    }

    async fn list_collections(
        &self,
        category: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Collection>, CatalogError> {
        let listed: Vec<Collection> = self
            .collections
            .iter()
            .filter(|c| c.category.eq_ignore_ascii_case(category))
            .map(|c| Collection {
                id: c.id.clone(),
                name: c.name.clone(),
                item_count: Some(c.item_ids.len() as u32),
            })
            .collect();
        Ok(Self::page(&listed, offset, limit))
    }

    async fn list_collection_items(
        &self,
        collection_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<RawItem>, CatalogError> {
        let collection = self
            .collections
            .iter()
            .find(|c| c.id == collection_id)
            .ok_or_else(|| CatalogError::NotFound(format!("collection {}", collection_id)))?;

        let members: Vec<RawItem> = collection
            .item_ids
            .iter()
            .filter_map(|id| self.by_id.get(id).map(|&i| self.items[i].clone()))
            .collect();
        Ok(Self::page(&members, offset, limit))
    }

    async fn recommendations(
        &self,
        seed_genres: &[String],
        targets: &AudioTargets,
        limit: u32,
    ) -> Result<Vec<RawItem>, CatalogError> {
        let seeds: Vec<String> = seed_genres.iter().map(|g| g.to_lowercase()).collect();
        Ok(self
            .items
            .iter()
            .filter(|item| {
                item.popularity
                    .is_none_or(|p| p <= targets.max_popularity as u32)
            })
            .filter(|item| {
                seeds.is_empty()
                    || Self::genres_of(item).any(|g| seeds.contains(&g.to_lowercase()))
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawContainer, RawContributor};

    fn raw(id: &str, name: &str, genre: &str, popularity: u32) -> RawItem {
        RawItem {
            id: Some(id.into()),
            name: Some(name.into()),
            artists: vec![RawContributor {
                id: None,
                name: Some("Band".into()),
            }],
            duration_ms: Some(180_000),
            popularity: Some(popularity),
            explicit: Some(false),
            album: Some(RawContainer {
                name: Some("LP".into()),
                release_date: Some("1977".into()),
                genres: vec![genre.into()],
            }),
            genres: vec![],
            uri: None,
        }
    }

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new(CatalogDump {
            items: vec![
                raw("1", "Amber Field", "folk", 10),
                raw("2", "Blue Hour", "jazz", 70),
                raw("3", "Amberlight", "jazz", 20),
            ],
            collections: vec![FixtureCollection {
                id: "c1".into(),
                name: "Warm".into(),
                category: "chill".into(),
                item_ids: vec!["3".into(), "1".into(), "missing".into()],
            }],
        })
    }

    #[tokio::test]
    async fn search_pages_past_the_end_are_empty() {
        let catalog = catalog();
        let hits = catalog.search("amber", 0, 10, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(catalog.search("amber", 2, 10, None).await.unwrap().is_empty());
        assert_eq!(catalog.search("1977", 0, 10, None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn collections_resolve_members() {
        let catalog = catalog();
        let listed = catalog.list_collections("CHILL", 0, 5).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].item_count, Some(3));

        let members = catalog.list_collection_items("c1", 0, 10).await.unwrap();
        let ids: Vec<_> = members.iter().filter_map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec!["3", "1"]);

        assert!(catalog.list_collection_items("nope", 0, 10).await.is_err());
    }

    #[tokio::test]
    async fn recommendations_respect_seeds_and_popularity() {
        let catalog = catalog();
        let targets = AudioTargets {
            energy: 0.2,
            danceability: 0.2,
            valence: 0.2,
            acousticness: 0.9,
            instrumentalness: 0.5,
            tempo: 90.0,
            max_popularity: 50,
        };
        let recs = catalog
            .recommendations(&["jazz".to_string()], &targets, 10)
            .await
            .unwrap();
        let ids: Vec<_> = recs.iter().filter_map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec!["3"]);
    }
}
