//! Randomization engine.
//!
//! Every policy is a pure function from a filtered, deduplicated pool to a
//! play order. The only side effect is drawing from the [`RandomSource`].

use crate::dedup::RecentHistory;
use crate::models::{CandidatePool, Item, UNKNOWN_GENRE};
use crate::random::RandomSource;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Ordering policy applied to a candidate pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShufflePolicy {
    #[default]
    Uniform,
    NoRepeatFirst,
    GenreBalanced,
    GenreDiversity,
    UnplayedFirst,
    UnplayedOnly,
}

impl ShufflePolicy {
    pub const ALL: [ShufflePolicy; 6] = [
        ShufflePolicy::Uniform,
        ShufflePolicy::NoRepeatFirst,
        ShufflePolicy::GenreBalanced,
        ShufflePolicy::GenreDiversity,
        ShufflePolicy::UnplayedFirst,
        ShufflePolicy::UnplayedOnly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShufflePolicy::Uniform => "uniform",
            ShufflePolicy::NoRepeatFirst => "no-repeat-first",
            ShufflePolicy::GenreBalanced => "genre-balanced",
            ShufflePolicy::GenreDiversity => "genre-diversity",
            ShufflePolicy::UnplayedFirst => "unplayed-first",
            ShufflePolicy::UnplayedOnly => "unplayed-only",
        }
    }
}

impl fmt::Display for ShufflePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ShufflePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        ShufflePolicy::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "Invalid shuffle policy: '{}'. Valid: {}",
                    s,
                    ShufflePolicy::ALL
                        .iter()
                        .map(|p| p.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

/// Produce a play order for `pool` under `policy`.
///
/// `recent` is the soft-dedup history consulted by [`ShufflePolicy::NoRepeatFirst`].
pub fn order(
    pool: CandidatePool,
    policy: ShufflePolicy,
    recent: &RecentHistory,
    rng: &mut RandomSource,
) -> Vec<Item> {
    let items = pool.into_items();
    match policy {
        ShufflePolicy::Uniform => {
            let mut items = items;
            fisher_yates(&mut items, rng);
            items
        }
        ShufflePolicy::NoRepeatFirst => no_repeat_first(items, |id| recent.contains(id), rng),
        ShufflePolicy::GenreBalanced => genre_round_robin(items, rng),
        ShufflePolicy::GenreDiversity => genre_diversity(items, rng),
        ShufflePolicy::UnplayedFirst => unplayed_first(items, rng),
        ShufflePolicy::UnplayedOnly => unplayed_only(items, rng),
    }
}

/// In-place Fisher-Yates: for `i` from `len-1` down to 1, swap `i` with a
/// uniform `j` in `[0, i]`.
pub fn fisher_yates<T>(items: &mut [T], rng: &mut RandomSource) {
    for i in (1..items.len()).rev() {
        let j = rng.uniform_int(i + 1);
        items.swap(i, j);
    }
}

/// Items not in the recent history first, then the recent ones; each
/// partition shuffled independently.
pub fn no_repeat_first<F>(items: Vec<Item>, is_recent: F, rng: &mut RandomSource) -> Vec<Item>
where
    F: Fn(&str) -> bool,
{
    let (mut fresh, mut recent): (Vec<Item>, Vec<Item>) =
        items.into_iter().partition(|item| !is_recent(&item.id));
    fisher_yates(&mut fresh, rng);
    fisher_yates(&mut recent, rng);
    fresh.extend(recent);
    fresh
}

/// Round robin over primary-genre groups.
///
/// Groups and their members are shuffled, then each cycle takes one item
/// from every non-empty group in the same group order. Two consecutive items
/// share a genre only once a single group is left.
pub fn genre_round_robin(items: Vec<Item>, rng: &mut RandomSource) -> Vec<Item> {
    let total = items.len();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<Item>> = Vec::new();

    for item in items {
        let genre = item.primary_genre().to_string();
        let slot = *index.entry(genre).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(item);
    }

    for group in groups.iter_mut() {
        fisher_yates(group, rng);
    }
    fisher_yates(&mut groups, rng);

    let mut result = Vec::with_capacity(total);
    while result.len() < total {
        for group in groups.iter_mut() {
            if let Some(item) = group.pop() {
                result.push(item);
            }
        }
    }
    result
}

/// Greedy adjacency diversity.
///
/// Each step picks uniformly among remaining items whose genres do not
/// include the previous pick's primary genre, or among all remaining items
/// when none qualify.
pub fn genre_diversity(items: Vec<Item>, rng: &mut RandomSource) -> Vec<Item> {
    let mut remaining = items;
    let mut result = Vec::with_capacity(remaining.len());
    let mut previous: Option<String> = None;

    while !remaining.is_empty() {
        let candidates: Vec<usize> = match &previous {
            Some(genre) => remaining
                .iter()
                .enumerate()
                .filter(|(_, item)| !has_genre(item, genre))
                .map(|(i, _)| i)
                .collect(),
            None => Vec::new(),
        };

        let pick = if candidates.is_empty() {
            rng.uniform_int(remaining.len())
        } else {
            candidates[rng.uniform_int(candidates.len())]
        };

        let item = remaining.swap_remove(pick);
        previous = Some(item.primary_genre().to_string());
        result.push(item);
    }
    result
}

fn has_genre(item: &Item, genre: &str) -> bool {
    if item.genres.iter().all(|g| g.trim().is_empty()) {
        return genre == UNKNOWN_GENRE;
    }
    item.genres.iter().any(|g| g.trim() == genre)
}

/// Unplayed items (play count 0 or unknown) first, then played ones.
pub fn unplayed_first(items: Vec<Item>, rng: &mut RandomSource) -> Vec<Item> {
    let (mut unplayed, mut played): (Vec<Item>, Vec<Item>) =
        items.into_iter().partition(Item::is_unplayed);
    fisher_yates(&mut unplayed, rng);
    fisher_yates(&mut played, rng);
    unplayed.extend(played);
    unplayed
}

/// Unplayed items only, shuffled.
pub fn unplayed_only(items: Vec<Item>, rng: &mut RandomSource) -> Vec<Item> {
    let mut unplayed: Vec<Item> = items.into_iter().filter(Item::is_unplayed).collect();
    fisher_yates(&mut unplayed, rng);
    unplayed
}
