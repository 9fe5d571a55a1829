//! Per-attribute comparison: two raw field values in, a `[0, 1]` sub-score out.
//!
//! Descriptor fields (resolution, bitrate, sample rate, file size, format,
//! version) are deliberately absent here: the same work exists at many
//! qualities, so they never contribute to a score.

use crate::isbn::isbn_match;
use crate::models::MediaMetadata;
use crate::normalize::normalize_optional;
use crate::profile::{Attribute, FieldRule};
use crate::similarity::blended_similarity;

/// Sub-score used when either side lacks a value.
pub const NEUTRAL_SCORE: f64 = 0.5;

const ONE_YEAR_APART: f64 = 0.7;
const YEAR_DECAY_SPAN: f64 = 4.0;

/// A record with its text fields normalized once, up front.
#[derive(Debug, Clone)]
pub struct PreparedRecord<'a> {
    pub item: &'a MediaMetadata,
    title: Option<String>,
    genre: Option<String>,
    director: Option<String>,
    author: Option<String>,
    developer: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    publisher: Option<String>,
    platform: Option<String>,
}

impl<'a> PreparedRecord<'a> {
    pub fn new(item: &'a MediaMetadata) -> Self {
        Self {
            item,
            title: normalize_optional(Some(&item.title)),
            genre: normalize_optional(item.genre.as_deref()),
            director: normalize_optional(item.director.as_deref()),
            author: normalize_optional(item.author.as_deref()),
            developer: normalize_optional(item.developer.as_deref()),
            artist: normalize_optional(item.artist.as_deref()),
            album: normalize_optional(item.album.as_deref()),
            publisher: normalize_optional(item.publisher.as_deref()),
            platform: normalize_optional(item.platform.as_deref()),
        }
    }

    pub fn value(&self, attribute: Attribute) -> FieldValue<'_> {
        let item = self.item;
        match attribute {
            Attribute::Title => FieldValue::Text {
                normalized: self.title.as_deref(),
                raw: &item.title,
            },
            Attribute::Genre => FieldValue::text(&self.genre, item.genre.as_deref()),
            Attribute::Director => FieldValue::text(&self.director, item.director.as_deref()),
            Attribute::Author => FieldValue::text(&self.author, item.author.as_deref()),
            Attribute::Developer => FieldValue::text(&self.developer, item.developer.as_deref()),
            Attribute::Artist => FieldValue::text(&self.artist, item.artist.as_deref()),
            Attribute::Album => FieldValue::text(&self.album, item.album.as_deref()),
            Attribute::Publisher => FieldValue::text(&self.publisher, item.publisher.as_deref()),
            Attribute::Platform => FieldValue::text(&self.platform, item.platform.as_deref()),
            Attribute::Year => FieldValue::Number(item.year.map(f64::from)),
            Attribute::Duration => FieldValue::Number(item.duration.map(f64::from)),
            Attribute::Pages => FieldValue::Number(item.page_count().map(f64::from)),
            Attribute::TrackNumber => FieldValue::Number(item.track_number.map(f64::from)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text {
        normalized: Option<&'a str>,
        raw: &'a str,
    },
    Number(Option<f64>),
}

impl FieldValue<'_> {
    fn text<'b>(normalized: &'b Option<String>, raw: Option<&'b str>) -> FieldValue<'b> {
        FieldValue::Text {
            normalized: normalized.as_deref(),
            raw: raw.unwrap_or_default(),
        }
    }
}

/// Sub-score for one attribute, or `None` when either side is missing.
pub fn compare_field(rule: FieldRule, left: FieldValue<'_>, right: FieldValue<'_>) -> Option<f64> {
    match (left, right) {
        (
            FieldValue::Text {
                normalized: Some(a),
                raw: raw_a,
            },
            FieldValue::Text {
                normalized: Some(b),
                raw: raw_b,
            },
        ) => Some(match rule {
            FieldRule::Platform => platform_similarity(a, b),
            _ if a == b => 1.0,
            _ => blended_similarity(a, b, raw_a, raw_b),
        }),
        (FieldValue::Number(Some(a)), FieldValue::Number(Some(b))) => Some(match rule {
            FieldRule::Numeric { tolerance } => numeric_similarity(a, b, tolerance),
            FieldRule::Year => year_similarity(a, b),
            FieldRule::Exact | FieldRule::Text | FieldRule::Platform => exact_similarity(a, b),
        }),
        _ => None,
    }
}

/// `1 - |a - b| / max(a, b, 1)`, with a dead zone of `tolerance` units.
pub fn numeric_similarity(a: f64, b: f64, tolerance: f64) -> f64 {
    let diff = (a - b).abs();
    if diff <= tolerance {
        return 1.0;
    }
    let scale = a.abs().max(b.abs()).max(1.0);
    (1.0 - (diff - tolerance) / scale).max(0.0)
}

/// Exact year 1.0, one year apart 0.7, zero at five years apart.
pub fn year_similarity(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs();
    if diff < 0.5 {
        1.0
    } else if diff < 1.5 {
        ONE_YEAR_APART
    } else {
        (ONE_YEAR_APART * (1.0 - (diff - 1.0) / YEAR_DECAY_SPAN)).max(0.0)
    }
}

fn exact_similarity(a: f64, b: f64) -> f64 {
    if (a - b).abs() < f64::EPSILON { 1.0 } else { 0.0 }
}

pub fn platform_similarity(a: &str, b: &str) -> f64 {
    if platform_family(a) == platform_family(b) { 1.0 } else { 0.0 }
}

/// Collapses common spellings of a platform onto one family name.
pub fn platform_family(normalized: &str) -> String {
    let compact: String = normalized.split_whitespace().collect();
    let family = match compact.as_str() {
        "pc" | "windows" | "win" | "win32" | "win64" | "windows10" | "windows11"
        | "microsoftwindows" => "pc",
        "mac" | "macos" | "osx" | "macosx" | "macintosh" => "mac",
        "linux" | "steamos" => "linux",
        "ps3" | "playstation3" => "ps3",
        "ps4" | "playstation4" => "ps4",
        "ps5" | "playstation5" => "ps5",
        "xboxone" | "xone" | "xb1" => "xbox_one",
        "xboxseriesx" | "xboxseriess" | "xboxseriesxs" | "xsx" => "xbox_series",
        "switch" | "nintendoswitch" | "ns" => "switch",
        _ => return compact,
    };
    family.to_string()
}

// ─── Short-circuit fields ──────────────────────────────────

/// Both records carry the same file checksum.
pub fn file_hash_match(a: &MediaMetadata, b: &MediaMetadata) -> bool {
    match (a.file_hash.as_deref(), b.file_hash.as_deref()) {
        (Some(left), Some(right)) => {
            let (left, right) = (left.trim(), right.trim());
            !left.is_empty() && left.eq_ignore_ascii_case(right)
        }
        _ => false,
    }
}

/// Both records carry the same ISBN (ISBN-10 and ISBN-13 forms are equal).
pub fn isbn_field_match(a: &MediaMetadata, b: &MediaMetadata) -> bool {
    match (a.isbn.as_deref(), b.isbn.as_deref()) {
        (Some(left), Some(right)) => isbn_match(left, right),
        _ => false,
    }
}

/// First provider (in key order) for which both records share an id.
pub fn shared_external_id<'a>(a: &'a MediaMetadata, b: &MediaMetadata) -> Option<&'a str> {
    a.external_ids.iter().find_map(|(provider, id)| {
        let id = id.trim();
        let other = b.external_ids.get(provider)?.trim();
        (!id.is_empty() && id.eq_ignore_ascii_case(other)).then_some(provider.as_str())
    })
}
