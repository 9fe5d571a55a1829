use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Media type ────────────────────────────────────────────

/// Scoring family of a record. Software shares the `Game` profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    #[default]
    #[serde(alias = "movie", alias = "tv_series", alias = "tv_episode")]
    Video,
    #[serde(alias = "music", alias = "album", alias = "audiobook", alias = "track")]
    Audio,
    #[serde(alias = "comic_book", alias = "magazine", alias = "ebook")]
    Book,
    #[serde(alias = "software")]
    Game,
}

impl MediaType {
    pub const ALL: [MediaType; 4] = [
        MediaType::Video,
        MediaType::Audio,
        MediaType::Book,
        MediaType::Game,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Book => "book",
            MediaType::Game => "game",
        }
    }

    /// Maps the upstream catalog's finer-grained labels onto a scoring family.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match label.as_str() {
            "video" | "movie" | "tv_series" | "tv_episode" => Some(MediaType::Video),
            "audio" | "music" | "album" | "audiobook" | "track" => Some(MediaType::Audio),
            "book" | "comic_book" | "magazine" | "ebook" => Some(MediaType::Book),
            "game" | "software" => Some(MediaType::Game),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| format!("unknown media type: {s}"))
    }
}

// ─── Input record ──────────────────────────────────────────

/// A recognized media record, as produced by the upstream recognizer.
///
/// Only `media_type` and `title` are required. Every optional field that is
/// absent (or an empty string) is treated as missing by the comparators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub id: String,
    pub media_type: MediaType,
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer: Option<String>,

    /// Seconds for audio and video. Books may carry a page count here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_number: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Recognition confidence in `[0, 1]`. Tie-breaker only.
    #[serde(default)]
    pub confidence: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub external_ids: BTreeMap<String, String>,

    /// Group assigned by a previous run, if the caller persisted one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_group_id: Option<String>,
}

impl MediaMetadata {
    pub fn new(id: impl Into<String>, media_type: MediaType, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            media_type,
            title: title.into(),
            ..Default::default()
        }
    }

    /// Page count for books: `pages`, falling back to `duration`.
    pub fn page_count(&self) -> Option<u32> {
        self.pages.or(self.duration)
    }

    /// Number of populated descriptive fields, used by the `most_complete`
    /// canonical criterion.
    pub fn completeness(&self) -> usize {
        let texts = [
            &self.genre,
            &self.director,
            &self.author,
            &self.developer,
            &self.resolution,
            &self.format,
            &self.artist,
            &self.album,
            &self.isbn,
            &self.publisher,
            &self.platform,
            &self.version,
            &self.file_hash,
        ];

        let mut score = texts
            .iter()
            .filter(|value| value.as_deref().is_some_and(|v| !v.trim().is_empty()))
            .count();
        if !self.title.trim().is_empty() {
            score += 2;
        }
        score += self.year.iter().count();
        score += self.duration.iter().count();
        score += self.file_size.iter().count();
        score += self.bitrate.iter().count();
        score += self.sample_rate.iter().count();
        score += self.track_number.iter().count();
        score += self.pages.iter().count();
        score += self.external_ids.len();
        score
    }
}

// ─── Request ───────────────────────────────────────────────

/// Comparator families a detection run may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Hash,
    #[serde(alias = "external_id", alias = "isbn")]
    Identifier,
    Metadata,
    Title,
}

/// Resolved set of enabled comparator families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSet {
    pub hash: bool,
    pub identifier: bool,
    pub metadata: bool,
    pub title: bool,
}

impl MethodSet {
    pub const ALL: MethodSet = MethodSet {
        hash: true,
        identifier: true,
        metadata: true,
        title: true,
    };

    /// An empty list enables every family.
    pub fn from_methods(methods: &[DetectionMethod]) -> Self {
        if methods.is_empty() {
            return Self::ALL;
        }
        Self {
            hash: methods.contains(&DetectionMethod::Hash),
            identifier: methods.contains(&DetectionMethod::Identifier),
            metadata: methods.contains(&DetectionMethod::Metadata),
            title: methods.contains(&DetectionMethod::Title),
        }
    }
}

impl Default for MethodSet {
    fn default() -> Self {
        Self::ALL
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateDetectionRequest {
    /// Empty means every media type.
    pub media_types: Vec<MediaType>,
    /// Overrides the profile threshold when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_similarity: Option<f64>,
    /// Empty means every comparator family.
    pub detection_methods: Vec<DetectionMethod>,
    /// Upper bound on records considered; `0` selects the configured cap.
    pub batch_size: usize,
    /// Re-evaluate records that already carry a `duplicate_group_id`.
    pub include_existing: bool,
}

impl DuplicateDetectionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_media_types(mut self, media_types: impl IntoIterator<Item = MediaType>) -> Self {
        self.media_types = media_types.into_iter().collect();
        self
    }

    pub fn with_min_similarity(mut self, min_similarity: f64) -> Self {
        self.min_similarity = Some(min_similarity);
        self
    }

    pub fn with_methods(mut self, methods: impl IntoIterator<Item = DetectionMethod>) -> Self {
        self.detection_methods = methods.into_iter().collect();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_include_existing(mut self, include_existing: bool) -> Self {
        self.include_existing = include_existing;
        self
    }

    /// Threshold override clamped to `[0, 1]`; NaN counts as unset.
    pub fn threshold_override(&self) -> Option<f64> {
        self.min_similarity
            .filter(|value| !value.is_nan())
            .map(|value| value.clamp(0.0, 1.0))
    }

    pub fn method_set(&self) -> MethodSet {
        MethodSet::from_methods(&self.detection_methods)
    }

    pub fn accepts(&self, media_type: MediaType) -> bool {
        self.media_types.is_empty() || self.media_types.contains(&media_type)
    }
}

// ─── Results ───────────────────────────────────────────────

/// Outcome of comparing one pair of records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityResult {
    pub score: f64,
    pub is_duplicate: bool,
    pub matched_attributes: Vec<String>,
}

impl SimilarityResult {
    pub fn none() -> Self {
        Self {
            score: 0.0,
            is_duplicate: false,
            matched_attributes: Vec::new(),
        }
    }
}

/// A connected component of records judged to be the same work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub id: String,
    pub media_type: MediaType,
    pub members: Vec<MediaMetadata>,
    pub canonical_member: MediaMetadata,
    pub average_similarity: f64,
    pub file_count: usize,
    pub total_size: u64,
    pub match_types: Vec<String>,
    pub detected_at: DateTime<Utc>,
}

impl DuplicateGroup {
    pub fn member_ids(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.id.as_str()).collect()
    }

    /// Members other than the canonical one.
    pub fn duplicates(&self) -> impl Iterator<Item = &MediaMetadata> {
        self.members
            .iter()
            .filter(|m| m.id != self.canonical_member.id)
    }
}
