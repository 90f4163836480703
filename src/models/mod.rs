use serde::{Deserialize, Serialize};

/// Genre bucket used when an item carries no genre information.
pub const UNKNOWN_GENRE: &str = "unknown";

/// A validated catalog entry.
///
/// Two items with the same `id` are the same item for the lifetime of a
/// discovery run; the first copy seen wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    /// Ordered, never empty. The first entry is the primary contributor.
    pub contributors: Vec<String>,
    pub duration_ms: u64,
    /// Catalog-assigned, 0-100.
    pub popularity: u8,
    pub explicit: bool,
    /// ISO date, possibly year-only ("1987") or year-month ("1987-04").
    pub release_date: Option<String>,
    pub container_name: String,
    /// Resolved lazily; frequently empty at fetch time.
    #[serde(default)]
    pub genres: Vec<String>,
    /// Playable reference handed to the consumer (e.g. "spotify:track:...").
    pub uri: Option<String>,
    /// Times consumed according to history; `None` means unknown (treated as 0).
    #[serde(default)]
    pub play_count: Option<u32>,
}

impl Item {
    pub fn primary_contributor(&self) -> &str {
        self.contributors.first().map(String::as_str).unwrap_or("")
    }

    /// First genre entry, or the unknown bucket.
    pub fn primary_genre(&self) -> &str {
        self.genres
            .iter()
            .map(|g| g.trim())
            .find(|g| !g.is_empty())
            .unwrap_or(UNKNOWN_GENRE)
    }

    pub fn release_year(&self) -> Option<i32> {
        let date = self.release_date.as_deref()?.trim();
        date.get(..4)?.parse().ok()
    }

    pub fn is_unplayed(&self) -> bool {
        self.play_count.unwrap_or(0) == 0
    }
}

/// Inclusive release-year window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub from: i32,
    pub to: i32,
}

impl YearRange {
    pub fn contains(&self, year: i32) -> bool {
        year >= self.from && year <= self.to
    }
}

/// User constraints for one discovery run. Never mutated by discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintSet {
    pub max_popularity: u8,
    pub allow_explicit: bool,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
    pub year_range: Option<YearRange>,
    pub genre_allowlist: Option<Vec<String>>,
    /// Matched case-insensitively against title, container and first contributor.
    pub denylist_patterns: Vec<String>,
    /// Also deny mainstream-indicator terms.
    pub obscure_mode: bool,
}

impl Default for ConstraintSet {
    fn default() -> Self {
        Self {
            max_popularity: 100,
            allow_explicit: true,
            min_duration_ms: 30_000,
            max_duration_ms: 15 * 60 * 1000,
            year_range: None,
            genre_allowlist: None,
            denylist_patterns: crate::filter::DEFAULT_DENYLIST
                .iter()
                .map(|s| s.to_string())
                .collect(),
            obscure_mode: false,
        }
    }
}

impl ConstraintSet {
    /// One-line summary for logs and error messages.
    pub fn summary(&self) -> String {
        let years = self
            .year_range
            .map(|r| format!("{}-{}", r.from, r.to))
            .unwrap_or_else(|| "any".to_string());
        format!(
            "popularity<={}, explicit={}, duration={}..{}ms, years={}, genres={}, obscure={}",
            self.max_popularity,
            self.allow_explicit,
            self.min_duration_ms,
            self.max_duration_ms,
            years,
            self.genre_allowlist
                .as_ref()
                .map(|g| g.join("|"))
                .unwrap_or_else(|| "any".to_string()),
            self.obscure_mode
        )
    }
}

/// Append-only pool of accepted, deduplicated items for one discovery run.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    items: Vec<Item>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: Item) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [Item] {
        &mut self.items
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }
}

impl From<Vec<Item>> for CandidatePool {
    fn from(items: Vec<Item>) -> Self {
        Self { items }
    }
}

// === Raw catalog records ===

/// A catalog record exactly as returned by the remote service.
///
/// Every field is optional; `filter::validate` turns it into an [`Item`]
/// or drops it as malformed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawItem {
    pub id: Option<String>,
    pub name: Option<String>,
    pub artists: Vec<RawContributor>,
    pub duration_ms: Option<u64>,
    pub popularity: Option<u32>,
    pub explicit: Option<bool>,
    pub album: Option<RawContainer>,
    pub genres: Vec<String>,
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawContributor {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawContainer {
    pub name: Option<String>,
    pub release_date: Option<String>,
    pub genres: Vec<String>,
}

/// A listed collection (playlist) within a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    /// Total member count when the catalog reports it.
    pub item_count: Option<u32>,
}

/// Target values for continuous audio attributes, sent to the
/// recommendation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTargets {
    pub energy: f64,
    pub danceability: f64,
    pub valence: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub tempo: f64,
    pub max_popularity: u8,
}
