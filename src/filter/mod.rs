//! Candidate filter.
//!
//! Two steps, both pure:
//! 1. [`validate`] turns a raw catalog record into an [`Item`], dropping
//!    records that are missing required fields.
//! 2. [`CandidateFilter::check`] applies the caller's [`ConstraintSet`].
//!
//! All predicates are independent, so the check order only affects which
//! rejection reason gets reported.

use crate::models::{ConstraintSet, Item, RawItem};
use thiserror::Error;

/// Karaoke, tribute and cover-version markers denied by default.
pub const DEFAULT_DENYLIST: &[&str] = &[
    "karaoke",
    "tribute",
    "cover version",
    "made famous by",
    "in the style of",
    "originally performed",
    "backing track",
    "instrumental version",
];

/// Mainstream indicators, denied on top of the default list in obscure mode.
pub const MAINSTREAM_DENYLIST: &[&str] = &[
    "greatest hits",
    "essential",
    "chart",
    "best of",
    "top hits",
    "hits",
    "now that's what i call",
];

/// Why an item was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("malformed record: missing {0}")]
    Malformed(&'static str),

    #[error("popularity {popularity} above ceiling {max}")]
    TooPopular { popularity: u8, max: u8 },

    #[error("explicit content not allowed")]
    Explicit,

    #[error("duration {0}ms out of bounds")]
    Duration(u64),

    #[error("release year {0:?} outside range")]
    ReleaseYear(Option<i32>),

    #[error("genres outside allowlist")]
    Genre,

    #[error("matches denylisted pattern '{0}'")]
    Denylisted(String),
}

/// Convert a raw record into an [`Item`].
///
/// Required: non-empty id and title, at least one named contributor, a
/// positive duration and a popularity score.
pub fn validate(raw: RawItem) -> Result<Item, Rejection> {
    let id = non_empty(raw.id).ok_or(Rejection::Malformed("id"))?;
    let title = non_empty(raw.name).ok_or(Rejection::Malformed("title"))?;

    let contributors: Vec<String> = raw
        .artists
        .into_iter()
        .filter_map(|a| non_empty(a.name).or_else(|| non_empty(a.id)))
        .collect();
    if contributors.is_empty() {
        return Err(Rejection::Malformed("contributors"));
    }

    let duration_ms = raw
        .duration_ms
        .filter(|d| *d > 0)
        .ok_or(Rejection::Malformed("duration"))?;
    let popularity = raw.popularity.ok_or(Rejection::Malformed("popularity"))?;

    let (container_name, release_date, container_genres) = match raw.album {
        Some(album) => (
            album.name.unwrap_or_default(),
            non_empty(album.release_date),
            album.genres,
        ),
        None => (String::new(), None, Vec::new()),
    };

    let genres = if raw.genres.is_empty() {
        container_genres
    } else {
        raw.genres
    };

    Ok(Item {
        id,
        title,
        contributors,
        duration_ms,
        popularity: popularity.min(100) as u8,
        explicit: raw.explicit.unwrap_or(false),
        release_date,
        container_name,
        genres,
        uri: non_empty(raw.uri),
        play_count: None,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// A [`ConstraintSet`] prepared for repeated checks (lowercased patterns).
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    constraints: ConstraintSet,
    patterns: Vec<String>,
    allowlist: Option<Vec<String>>,
}

impl CandidateFilter {
    pub fn new(constraints: &ConstraintSet) -> Self {
        let mut patterns: Vec<String> = constraints
            .denylist_patterns
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        if constraints.obscure_mode {
            for term in MAINSTREAM_DENYLIST {
                if !patterns.iter().any(|p| p == term) {
                    patterns.push(term.to_string());
                }
            }
        }

        let allowlist = constraints.genre_allowlist.as_ref().map(|genres| {
            genres
                .iter()
                .map(|g| g.trim().to_lowercase())
                .filter(|g| !g.is_empty())
                .collect::<Vec<_>>()
        });

        Self {
            constraints: constraints.clone(),
            patterns,
            allowlist: allowlist.filter(|a| !a.is_empty()),
        }
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    /// Check an item against every constraint.
    pub fn check(&self, item: &Item) -> Result<(), Rejection> {
        let c = &self.constraints;

        if item.id.is_empty() || item.title.is_empty() || item.contributors.is_empty() {
            return Err(Rejection::Malformed("required field"));
        }

        if item.popularity > c.max_popularity {
            return Err(Rejection::TooPopular {
                popularity: item.popularity,
                max: c.max_popularity,
            });
        }

        if item.explicit && !c.allow_explicit {
            return Err(Rejection::Explicit);
        }

        if item.duration_ms < c.min_duration_ms || item.duration_ms > c.max_duration_ms {
            return Err(Rejection::Duration(item.duration_ms));
        }

        if let Some(range) = c.year_range {
            let year = item.release_year();
            if !year.is_some_and(|y| range.contains(y)) {
                return Err(Rejection::ReleaseYear(year));
            }
        }

        // Unknown genres pass; only a known, disjoint genre set is rejected.
        if let Some(allow) = &self.allowlist {
            if !item.genres.is_empty()
                && !item
                    .genres
                    .iter()
                    .any(|g| allow.contains(&g.trim().to_lowercase()))
            {
                return Err(Rejection::Genre);
            }
        }

        let fields = [
            item.title.to_lowercase(),
            item.container_name.to_lowercase(),
            item.primary_contributor().to_lowercase(),
        ];
        if let Some(pattern) = self
            .patterns
            .iter()
            .find(|p| fields.iter().any(|f| f.contains(p.as_str())))
        {
            return Err(Rejection::Denylisted(pattern.clone()));
        }

        Ok(())
    }

    pub fn is_acceptable(&self, item: &Item) -> bool {
        self.check(item).is_ok()
    }
}

/// One-shot form of [`CandidateFilter::is_acceptable`].
pub fn is_acceptable(item: &Item, constraints: &ConstraintSet) -> bool {
    CandidateFilter::new(constraints).is_acceptable(item)
}
