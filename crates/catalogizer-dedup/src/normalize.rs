//! Free-text cleanup applied before any field comparison.
//!
//! Release names carry a lot of noise that says nothing about the work
//! itself: `The.Matrix.1999.1080p.BluRay.x264` and `Matrix 1999 DVDRip XviD`
//! should compare as the same title. Normalization lowercases, removes
//! release tags (bracketed or bare), turns punctuation and separators into
//! single spaces and trims.

use once_cell::sync::Lazy;
use regex::Regex;

const RELEASE_TAGS: &str = concat!(
    // resolution
    r"2160p|1440p|1080p|1080i|720p|576p|480p|4k|uhd|",
    // codec
    r"x\.?26[45]|h\.?26[45]|hevc|avc|xvid|divx|av1|10bit|aac|ac3|dts|",
    // source
    r"blu-?ray|bdrip|brrip|dvdrip|dvdscr|webrip|web-?dl|hdtv|hdrip|remux|proper|repack",
);

static BRACKETED_RELEASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"[\(\[\{{][^\)\]\}}]*\b(?:{RELEASE_TAGS})\b[^\)\]\}}]*[\)\]\}}]"
    ))
    .expect("bracketed release pattern")
});

static BARE_RELEASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b(?:{RELEASE_TAGS})\b")).expect("release tag pattern")
});

static APOSTROPHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"['’`]").expect("apostrophe pattern"));

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("separator pattern"));

const LEADING_ARTICLES: [&str; 3] = ["the", "a", "an"];

/// Normalizes a free-text field for comparison.
pub fn normalize_text(raw: &str) -> String {
    // `_` is a word character for `\b`, so it has to go before tag matching.
    let lowered = raw.to_lowercase().replace('_', " ");
    let without_groups = BRACKETED_RELEASE.replace_all(&lowered, " ");
    let without_tags = BARE_RELEASE.replace_all(&without_groups, " ");
    let without_apostrophes = APOSTROPHES.replace_all(&without_tags, "");
    let spaced = NON_ALPHANUMERIC.replace_all(&without_apostrophes, " ");
    spaced.trim().to_string()
}

/// First word of the normalized text that is not a leading article.
///
/// Falls back to the article itself when the text has nothing else.
pub fn first_significant_word(normalized: &str) -> Option<&str> {
    let mut words = normalized.split_whitespace().peekable();
    let first = words.next()?;
    if LEADING_ARTICLES.contains(&first) {
        return Some(words.next().unwrap_or(first));
    }
    Some(first)
}

/// Normalizes an optional field; blank values become `None`.
pub(crate) fn normalize_optional(raw: Option<&str>) -> Option<String> {
    raw.map(normalize_text).filter(|s| !s.is_empty())
}
