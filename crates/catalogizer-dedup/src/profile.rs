use serde::{Deserialize, Serialize};

use crate::error::{DedupError, Result};
use crate::models::MediaType;

pub const DEFAULT_THRESHOLD: f64 = 0.80;
pub const DURATION_TOLERANCE_SECS: f64 = 2.0;
pub const PAGE_TOLERANCE: f64 = 5.0;

/// A scored attribute of [`crate::MediaMetadata`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Title,
    Year,
    Genre,
    Director,
    Author,
    Developer,
    Artist,
    Album,
    Publisher,
    Duration,
    Pages,
    TrackNumber,
    Platform,
}

impl Attribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Attribute::Title => "title",
            Attribute::Year => "year",
            Attribute::Genre => "genre",
            Attribute::Director => "director",
            Attribute::Author => "author",
            Attribute::Developer => "developer",
            Attribute::Artist => "artist",
            Attribute::Album => "album",
            Attribute::Publisher => "publisher",
            Attribute::Duration => "duration",
            Attribute::Pages => "pages",
            Attribute::TrackNumber => "track_number",
            Attribute::Platform => "platform",
        }
    }
}

/// How two values of an attribute turn into a sub-score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldRule {
    /// Normalized blend of Levenshtein and Jaro-Winkler.
    Text,
    /// Relative difference, with a dead zone of `tolerance` units.
    Numeric { tolerance: f64 },
    /// 1.0 exact, 0.7 one year apart, then linear decay.
    Year,
    /// Integers that either match or do not.
    Exact,
    /// Platform families (`win64` and `pc` are the same platform).
    Platform,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttributeWeight {
    pub attribute: Attribute,
    pub weight: f64,
    pub rule: FieldRule,
}

impl AttributeWeight {
    pub const fn new(attribute: Attribute, weight: f64, rule: FieldRule) -> Self {
        Self {
            attribute,
            weight,
            rule,
        }
    }
}

/// Weighted attributes and decision threshold for one media type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringProfile {
    pub threshold: f64,
    pub attributes: Vec<AttributeWeight>,
}

impl ScoringProfile {
    pub fn new(threshold: f64, attributes: Vec<AttributeWeight>) -> Self {
        Self {
            threshold,
            attributes,
        }
    }

    pub fn weight_sum(&self) -> f64 {
        self.attributes.iter().map(|a| a.weight).sum()
    }

    pub fn weight_of(&self, attribute: Attribute) -> Option<f64> {
        self.attributes
            .iter()
            .find(|a| a.attribute == attribute)
            .map(|a| a.weight)
    }

    pub fn video() -> Self {
        use Attribute::*;
        Self::new(
            DEFAULT_THRESHOLD,
            vec![
                AttributeWeight::new(Title, 0.40, FieldRule::Text),
                AttributeWeight::new(Year, 0.15, FieldRule::Year),
                AttributeWeight::new(Genre, 0.10, FieldRule::Text),
                AttributeWeight::new(Director, 0.15, FieldRule::Text),
                AttributeWeight::new(
                    Duration,
                    0.10,
                    FieldRule::Numeric {
                        tolerance: DURATION_TOLERANCE_SECS,
                    },
                ),
            ],
        )
    }

    pub fn audio() -> Self {
        use Attribute::*;
        Self::new(
            DEFAULT_THRESHOLD,
            vec![
                AttributeWeight::new(Title, 0.35, FieldRule::Text),
                AttributeWeight::new(Artist, 0.35, FieldRule::Text),
                AttributeWeight::new(Album, 0.10, FieldRule::Text),
                AttributeWeight::new(
                    Duration,
                    0.15,
                    FieldRule::Numeric {
                        tolerance: DURATION_TOLERANCE_SECS,
                    },
                ),
                AttributeWeight::new(TrackNumber, 0.05, FieldRule::Exact),
            ],
        )
    }

    pub fn book() -> Self {
        use Attribute::*;
        Self::new(
            DEFAULT_THRESHOLD,
            vec![
                AttributeWeight::new(Title, 0.40, FieldRule::Text),
                AttributeWeight::new(Author, 0.30, FieldRule::Text),
                AttributeWeight::new(Year, 0.10, FieldRule::Year),
                AttributeWeight::new(Publisher, 0.05, FieldRule::Text),
                AttributeWeight::new(
                    Pages,
                    0.15,
                    FieldRule::Numeric {
                        tolerance: PAGE_TOLERANCE,
                    },
                ),
            ],
        )
    }

    pub fn game() -> Self {
        use Attribute::*;
        Self::new(
            DEFAULT_THRESHOLD,
            vec![
                AttributeWeight::new(Title, 0.45, FieldRule::Text),
                AttributeWeight::new(Developer, 0.25, FieldRule::Text),
                AttributeWeight::new(Year, 0.10, FieldRule::Year),
                AttributeWeight::new(Genre, 0.10, FieldRule::Text),
                AttributeWeight::new(Platform, 0.10, FieldRule::Platform),
            ],
        )
    }

    fn validate(&self, media_type: MediaType) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(DedupError::InvalidProfile(format!(
                "{media_type}: threshold {} outside [0, 1]",
                self.threshold
            )));
        }
        if self.attributes.is_empty() {
            return Err(DedupError::InvalidProfile(format!(
                "{media_type}: no weighted attributes"
            )));
        }
        for entry in &self.attributes {
            if !entry.weight.is_finite() || entry.weight < 0.0 {
                return Err(DedupError::InvalidProfile(format!(
                    "{media_type}: weight {} for {} must be a non-negative number",
                    entry.weight,
                    entry.attribute.as_str()
                )));
            }
            if let FieldRule::Numeric { tolerance } = entry.rule
                && (!tolerance.is_finite() || tolerance < 0.0)
            {
                return Err(DedupError::InvalidProfile(format!(
                    "{media_type}: tolerance {tolerance} for {} must be a non-negative number",
                    entry.attribute.as_str()
                )));
            }
        }
        // Scores are normalized by this total.
        let sum = self.weight_sum();
        if !sum.is_finite() || sum <= 0.0 {
            return Err(DedupError::InvalidProfile(format!(
                "{media_type}: weights sum to {sum}, expected a positive total"
            )));
        }
        Ok(())
    }
}

/// One scoring profile per media type, injected into the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSet {
    pub video: ScoringProfile,
    pub audio: ScoringProfile,
    pub book: ScoringProfile,
    pub game: ScoringProfile,
}

impl Default for ProfileSet {
    fn default() -> Self {
        Self {
            video: ScoringProfile::video(),
            audio: ScoringProfile::audio(),
            book: ScoringProfile::book(),
            game: ScoringProfile::game(),
        }
    }
}

impl ProfileSet {
    pub fn get(&self, media_type: MediaType) -> &ScoringProfile {
        match media_type {
            MediaType::Video => &self.video,
            MediaType::Audio => &self.audio,
            MediaType::Book => &self.book,
            MediaType::Game => &self.game,
        }
    }

    pub fn get_mut(&mut self, media_type: MediaType) -> &mut ScoringProfile {
        match media_type {
            MediaType::Video => &mut self.video,
            MediaType::Audio => &mut self.audio,
            MediaType::Book => &mut self.book,
            MediaType::Game => &mut self.game,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for media_type in MediaType::ALL {
            self.get(media_type).validate(media_type)?;
        }
        Ok(())
    }
}
