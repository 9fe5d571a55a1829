//! String similarity primitives: Levenshtein, Jaro-Winkler and Soundex,
//! plus the blended score used for text fields.

use crate::normalize::normalize_text;

const LEVENSHTEIN_WEIGHT: f64 = 0.5;
const JARO_WINKLER_WEIGHT: f64 = 0.5;
const PHONETIC_RESCUE_BELOW: f64 = 0.5;
const PHONETIC_BONUS: f64 = 0.1;
const WINKLER_PREFIX_SCALE: f64 = 0.1;
const WINKLER_MAX_PREFIX: usize = 4;

/// Edit distance with unit insert/delete/substitute costs, counted in chars.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// `1 - distance / max(len)`; two empty strings are identical.
pub fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    let (a, b) = ordered(a, b);
    strsim::normalized_levenshtein(a, b)
}

/// Jaro similarity plus a 0.1 bonus per shared leading character (at most
/// four). The bonus applies at every Jaro score, not only above 0.7.
pub fn jaro_winkler_similarity(a: &str, b: &str) -> f64 {
    let (a, b) = ordered(a, b);
    let jaro = strsim::jaro(a, b);
    let prefix = a
        .chars()
        .zip(b.chars())
        .take(WINKLER_MAX_PREFIX)
        .take_while(|(x, y)| x == y)
        .count();
    (jaro + WINKLER_PREFIX_SCALE * prefix as f64 * (1.0 - jaro)).clamp(0.0, 1.0)
}

/// American Soundex code (`S530` for "Smith").
///
/// Non-letters are ignored. Input without any ASCII letter yields an empty
/// code, so two such inputs still match each other.
pub fn soundex(input: &str) -> String {
    let mut letters = input
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_uppercase());

    let Some(first) = letters.next() else {
        return String::new();
    };

    let mut code = String::with_capacity(4);
    code.push(first);
    let mut previous = soundex_digit(first);

    for letter in letters {
        if code.len() == 4 {
            break;
        }
        match soundex_digit(letter) {
            Some(digit) => {
                if previous != Some(digit) {
                    code.push(digit);
                }
                previous = Some(digit);
            }
            // H and W do not separate letters with the same code.
            None if matches!(letter, 'H' | 'W') => {}
            None => previous = None,
        }
    }

    while code.len() < 4 {
        code.push('0');
    }
    code
}

pub fn soundex_match(a: &str, b: &str) -> bool {
    soundex(a) == soundex(b)
}

fn soundex_digit(letter: char) -> Option<char> {
    match letter {
        'B' | 'F' | 'P' | 'V' => Some('1'),
        'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => Some('2'),
        'D' | 'T' => Some('3'),
        'L' => Some('4'),
        'M' | 'N' => Some('5'),
        'R' => Some('6'),
        _ => None,
    }
}

/// Blended similarity of two free-text values.
///
/// Both sides are normalized first. Empty input on either side scores 0.
/// Low scores get a small bonus when the raw values sound alike.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let left = normalize_text(a);
    let right = normalize_text(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    if left == right {
        return 1.0;
    }
    blended_similarity(&left, &right, a, b)
}

/// Same as [`text_similarity`] for values already normalized by the caller.
pub(crate) fn blended_similarity(left: &str, right: &str, raw_left: &str, raw_right: &str) -> f64 {
    let mut score = LEVENSHTEIN_WEIGHT * levenshtein_similarity(left, right)
        + JARO_WINKLER_WEIGHT * jaro_winkler_similarity(left, right);

    if score < PHONETIC_RESCUE_BELOW && soundex_match(raw_left, raw_right) {
        score += PHONETIC_BONUS;
    }
    score.clamp(0.0, 1.0)
}

// Fixed argument order keeps every score bit-for-bit symmetric.
fn ordered<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}
