use crate::fields::{
    NEUTRAL_SCORE, PreparedRecord, compare_field, file_hash_match, isbn_field_match,
    shared_external_id,
};
use crate::models::{MediaMetadata, MethodSet, SimilarityResult};
use crate::profile::{Attribute, FieldRule, ProfileSet, ScoringProfile};

/// Score given to a pair that shares a provider id (IMDb, MusicBrainz, ...).
pub const EXTERNAL_ID_SCORE: f64 = 0.95;

/// Sub-scores at or above this count as a matched attribute.
pub const DEFAULT_MATCH_FLOOR: f64 = 0.8;

/// Per-run knobs taken from a [`crate::DuplicateDetectionRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreOptions {
    pub methods: MethodSet,
    /// Replaces the profile threshold when set.
    pub threshold: Option<f64>,
}

/// Combines field sub-scores with a media type's profile weights.
#[derive(Debug, Clone)]
pub struct PairwiseScorer {
    profiles: ProfileSet,
    match_floor: f64,
}

impl Default for PairwiseScorer {
    fn default() -> Self {
        Self::new(ProfileSet::default())
    }
}

impl PairwiseScorer {
    pub fn new(profiles: ProfileSet) -> Self {
        Self {
            profiles,
            match_floor: DEFAULT_MATCH_FLOOR,
        }
    }

    pub fn with_match_floor(mut self, match_floor: f64) -> Self {
        self.match_floor = match_floor.clamp(0.0, 1.0);
        self
    }

    pub fn is_duplicate(&self, a: &MediaMetadata, b: &MediaMetadata) -> (bool, f64) {
        let result = self.compare(a, b, &ScoreOptions::default());
        (result.is_duplicate, result.score)
    }

    pub fn compare(&self, a: &MediaMetadata, b: &MediaMetadata, options: &ScoreOptions) -> SimilarityResult {
        if a.media_type != b.media_type {
            return SimilarityResult::none();
        }
        self.compare_prepared(&PreparedRecord::new(a), &PreparedRecord::new(b), options)
    }

    pub(crate) fn compare_prepared(
        &self,
        a: &PreparedRecord<'_>,
        b: &PreparedRecord<'_>,
        options: &ScoreOptions,
    ) -> SimilarityResult {
        let (left, right) = (a.item, b.item);
        if left.media_type != right.media_type {
            return SimilarityResult::none();
        }

        let profile = self.profiles.get(left.media_type);
        let threshold = options.threshold.unwrap_or(profile.threshold);
        let methods = options.methods;

        if methods.hash && file_hash_match(left, right) {
            return short_circuit("file_hash");
        }

        let mut score = 0.0_f64;
        let mut matched = Vec::new();

        if methods.identifier {
            if isbn_field_match(left, right) {
                return short_circuit("isbn");
            }
            if let Some(provider) = shared_external_id(left, right) {
                score = EXTERNAL_ID_SCORE;
                matched.push(format!("external_id:{provider}"));
            }
        }

        if methods.metadata {
            let (weighted, attributes) = self.weighted_score(profile, a, b);
            score = score.max(weighted);
            matched.extend(attributes);
        } else if methods.title {
            let title = compare_field(
                FieldRule::Text,
                a.value(Attribute::Title),
                b.value(Attribute::Title),
            )
            .unwrap_or(0.0);
            if title >= self.match_floor {
                matched.push("title".to_string());
            }
            score = score.max(title);
        }

        let score = score.clamp(0.0, 1.0);
        SimilarityResult {
            score,
            is_duplicate: score >= threshold,
            matched_attributes: matched,
        }
    }

    fn weighted_score(
        &self,
        profile: &ScoringProfile,
        a: &PreparedRecord<'_>,
        b: &PreparedRecord<'_>,
    ) -> (f64, Vec<String>) {
        let mut matched = Vec::new();

        // Only a record compared with itself bypasses the neutral score for
        // absent fields. Distinct records with equal sparse fields do not.
        let identical = a.item == b.item;

        let mut total = 0.0;
        for entry in &profile.attributes {
            let sub_score = compare_field(entry.rule, a.value(entry.attribute), b.value(entry.attribute));
            if let Some(value) = sub_score
                && value >= self.match_floor
            {
                matched.push(entry.attribute.as_str().to_string());
            }
            total += entry.weight * sub_score.unwrap_or(NEUTRAL_SCORE);
        }

        if identical {
            return (1.0, matched);
        }

        let weight_sum = profile.weight_sum();
        let score = if weight_sum > 0.0 { total / weight_sum } else { 0.0 };
        (score.clamp(0.0, 1.0), matched)
    }
}

fn short_circuit(reason: &str) -> SimilarityResult {
    SimilarityResult {
        score: 1.0,
        is_duplicate: true,
        matched_attributes: vec![reason.to_string()],
    }
}
