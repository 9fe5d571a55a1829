//! Catalogizer Dedup: duplicate detection for recognized media records.

pub mod error;
pub mod config;
pub mod models;
pub mod normalize;
pub mod similarity;
pub mod isbn;
pub mod fields;
pub mod profile;
pub mod scorer;
pub mod blocking;
pub mod cluster;
pub mod engine;

use once_cell::sync::Lazy;

pub use error::{DedupError, Result};
pub use config::DedupConfig;
pub use models::{
    DetectionMethod, DuplicateDetectionRequest, DuplicateGroup, MediaMetadata, MediaType,
    MethodSet, SimilarityResult,
};
pub use profile::{Attribute, AttributeWeight, FieldRule, ProfileSet, ScoringProfile};
pub use scorer::{PairwiseScorer, ScoreOptions};
pub use blocking::{BlockingIndex, BlockingKind, BlockingStrategy, ExhaustiveBlocking, SoundexDecadeBlocking};
pub use cluster::CanonicalCriterion;
pub use engine::{CancelToken, DuplicateEngine};
pub use similarity::soundex_match;

static DEFAULT_ENGINE: Lazy<DuplicateEngine> = Lazy::new(DuplicateEngine::new);

/// Duplicate decision and score for one pair, using the default profiles.
pub fn is_duplicate(a: &MediaMetadata, b: &MediaMetadata) -> (bool, f64) {
    DEFAULT_ENGINE.is_duplicate(a, b)
}

pub fn calculate_text_similarity(a: &str, b: &str) -> f64 {
    similarity::text_similarity(a, b)
}

pub fn calculate_levenshtein_distance(a: &str, b: &str) -> usize {
    similarity::levenshtein_distance(a, b)
}

pub fn calculate_jaro_winkler_similarity(a: &str, b: &str) -> f64 {
    similarity::jaro_winkler_similarity(a, b)
}

/// Groups every duplicate in `items` with the default engine.
pub fn find_all_duplicates(items: &[MediaMetadata]) -> Vec<DuplicateGroup> {
    DEFAULT_ENGINE.find_all_duplicates(items)
}
