//! Query material for the sampling strategies: probe terms, markets,
//! browse categories, seed genres and attribute targets.

use crate::models::AudioTargets;
use crate::random::RandomSource;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

pub const WORD_LIST: &[&str] = &[
    "love", "night", "rain", "river", "blue", "dream", "home", "light", "fire", "city",
    "ocean", "ghost", "summer", "road", "gold", "moon", "echo", "wild", "slow", "glass",
    "garden", "winter", "paper", "smoke", "signal",
];

/// Code point ranges probed by the unicode generator, one per script.
pub const SCRIPT_RANGES: &[(&str, u32, u32)] = &[
    ("latin-1", 0x00E0, 0x00FC),
    ("greek", 0x03B1, 0x03C9),
    ("cyrillic", 0x0430, 0x044F),
    ("hebrew", 0x05D0, 0x05EA),
    ("arabic", 0x0627, 0x064A),
    ("devanagari", 0x0905, 0x0939),
    ("thai", 0x0E01, 0x0E2E),
    ("hiragana", 0x3041, 0x3093),
    ("katakana", 0x30A1, 0x30F6),
    ("hangul", 0xAC00, 0xD7A3),
];

/// Language to candidate search markets (ISO 3166-1 alpha-2).
pub const LANGUAGE_MARKETS: &[(&str, &[&str])] = &[
    ("en", &["US", "GB", "CA", "AU", "IE", "NZ"]),
    ("es", &["ES", "MX", "AR", "CO", "CL", "PE"]),
    ("pt", &["BR", "PT"]),
    ("fr", &["FR", "BE", "CA", "CH"]),
    ("de", &["DE", "AT", "CH"]),
    ("it", &["IT"]),
    ("nl", &["NL", "BE"]),
    ("sv", &["SE"]),
    ("no", &["NO"]),
    ("da", &["DK"]),
    ("fi", &["FI"]),
    ("pl", &["PL"]),
    ("tr", &["TR"]),
    ("ja", &["JP"]),
    ("ko", &["KR"]),
    ("zh", &["TW", "HK", "SG"]),
    ("hi", &["IN"]),
    ("id", &["ID"]),
    ("th", &["TH"]),
    ("vi", &["VN"]),
    ("ar", &["EG", "SA", "AE", "MA"]),
];

/// Browse categories crawled by the collection strategy.
pub const CATEGORIES: &[&str] = &[
    "pop", "rock", "jazz", "classical", "hiphop", "indie_alt", "electronic", "chill",
    "soul", "blues", "country", "metal", "punk", "folk_acoustic", "latin", "reggae",
    "ambient", "focus", "sleep", "instrumental", "world",
];

/// Seed genres used when the constraints carry no allowlist.
pub const DEFAULT_GENRE_POOL: &[&str] = &[
    "acoustic", "afrobeat", "ambient", "bluegrass", "blues", "bossanova", "chill",
    "classical", "dub", "electronic", "folk", "funk", "garage", "gospel", "idm", "indie",
    "jazz", "new-age", "psych-rock", "punk", "reggae", "rockabilly", "ska", "soul",
    "synth-pop", "trip-hop", "world-music",
];

/// Catalog limit on recommendation seeds per request.
pub const MAX_SEED_GENRES: usize = 5;

/// Independent ways of building a probe term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermGenerator {
    Letters,
    Number,
    Word,
    Unicode,
}

impl TermGenerator {
    pub const ALL: [TermGenerator; 4] = [
        TermGenerator::Letters,
        TermGenerator::Number,
        TermGenerator::Word,
        TermGenerator::Unicode,
    ];

    pub fn random(rng: &mut RandomSource) -> Self {
        Self::ALL[rng.uniform_int(Self::ALL.len())]
    }

    pub fn generate(&self, rng: &mut RandomSource, current_year: i32) -> String {
        match self {
            TermGenerator::Letters => {
                let len = 1 + rng.uniform_int(3);
                (0..len)
                    .map(|_| ALPHABET[rng.uniform_int(ALPHABET.len())] as char)
                    .collect()
            }
            TermGenerator::Number => {
                if rng.uniform() < 0.5 {
                    let year = rng.range_inclusive(1950, current_year.max(1950) as u64);
                    year.to_string()
                } else {
                    rng.range_inclusive(1, 99).to_string()
                }
            }
            TermGenerator::Word => rng.choose(WORD_LIST).copied().unwrap_or("love").to_string(),
            TermGenerator::Unicode => random_script_char(rng).to_string(),
        }
    }
}

/// One code point from a uniformly chosen whitelisted script.
pub fn random_script_char(rng: &mut RandomSource) -> char {
    let (_, lo, hi) = SCRIPT_RANGES[rng.uniform_int(SCRIPT_RANGES.len())];
    let code = rng.range_inclusive(lo as u64, hi as u64) as u32;
    char::from_u32(code).unwrap_or('a')
}

/// Pick a market for a language preference, or `None` when unmapped.
pub fn market_for_language(language: &str, rng: &mut RandomSource) -> Option<&'static str> {
    let lang = language.trim().to_lowercase();
    let primary = lang.split(['-', '_']).next().unwrap_or("");
    LANGUAGE_MARKETS
        .iter()
        .find(|(code, _)| *code == primary)
        .and_then(|(_, markets)| rng.choose(markets).copied())
}

/// Draw between one and [`MAX_SEED_GENRES`] distinct seed genres from `pool`.
pub fn pick_seed_genres(pool: &[String], rng: &mut RandomSource) -> Vec<String> {
    if pool.is_empty() {
        return Vec::new();
    }
    let k = 1 + rng.uniform_int(pool.len().min(MAX_SEED_GENRES));
    rng.sample_indices(pool.len(), k)
        .into_iter()
        .map(|i| pool[i].clone())
        .collect()
}

/// Uniformly random attribute targets, capped at the popularity ceiling.
pub fn random_targets(rng: &mut RandomSource, max_popularity: u8) -> AudioTargets {
    AudioTargets {
        energy: rng.uniform(),
        danceability: rng.uniform(),
        valence: rng.uniform(),
        acousticness: rng.uniform(),
        instrumentalness: rng.uniform(),
        tempo: 60.0 + rng.uniform() * 120.0,
        max_popularity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_are_short_lowercase() {
        let mut rng = RandomSource::new();
        for _ in 0..200 {
            let term = TermGenerator::Letters.generate(&mut rng, 2024);
            assert!((1..=3).contains(&term.len()));
            assert!(term.chars().all(|c| c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn numbers_are_years_or_small_ints() {
        let mut rng = RandomSource::new();
        for _ in 0..200 {
            let n: u64 = TermGenerator::Number.generate(&mut rng, 2024).parse().unwrap();
            assert!((1..=99).contains(&n) || (1950..=2024).contains(&n));
        }
    }

    #[test]
    fn unicode_terms_come_from_whitelisted_scripts() {
        let mut rng = RandomSource::new();
        for _ in 0..500 {
            let c = random_script_char(&mut rng) as u32;
            assert!(SCRIPT_RANGES.iter().any(|(_, lo, hi)| c >= *lo && c <= *hi));
        }
    }

    #[test]
    fn market_lookup() {
        let mut rng = RandomSource::new();
        assert_eq!(market_for_language("ja", &mut rng), Some("JP"));
        assert_eq!(market_for_language("JA-jp", &mut rng), Some("JP"));
        let es = market_for_language("es", &mut rng).unwrap();
        assert!(["ES", "MX", "AR", "CO", "CL", "PE"].contains(&es));
        assert_eq!(market_for_language("xx", &mut rng), None);
    }

    #[test]
    fn seed_genres_are_distinct_and_bounded() {
        let mut rng = RandomSource::new();
        let pool: Vec<String> = DEFAULT_GENRE_POOL.iter().map(|g| g.to_string()).collect();
        for _ in 0..100 {
            let seeds = pick_seed_genres(&pool, &mut rng);
            assert!((1..=MAX_SEED_GENRES).contains(&seeds.len()));
            let mut dedup = seeds.clone();
            dedup.sort();
            dedup.dedup();
            assert_eq!(dedup.len(), seeds.len());
        }
        assert!(pick_seed_genres(&[], &mut rng).is_empty());
    }

    #[test]
    fn targets_in_range() {
        let mut rng = RandomSource::new();
        let t = random_targets(&mut rng, 35);
        assert!((0.0..1.0).contains(&t.energy));
        assert!((60.0..180.0).contains(&t.tempo));
        assert_eq!(t.max_popularity, 35);
    }
}
