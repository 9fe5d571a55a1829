//! ISBN canonicalisation for the book short-circuit.
//!
//! ISBN-10 and ISBN-13 spellings of the same book (with or without hyphens)
//! must compare equal, so valid values are lifted to their ISBN-13 form.

fn strip(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn isbn13_checksum_ok(digits: &[u32]) -> bool {
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
        .sum();
    sum % 10 == 0
}

fn isbn10_checksum_ok(digits: &[u32]) -> bool {
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| (10 - i as u32) * d)
        .sum();
    sum % 11 == 0
}

fn isbn10_to_isbn13(digits: &[u32]) -> String {
    let mut body = vec![9, 7, 8];
    body.extend_from_slice(&digits[..9]);
    let sum: u32 = body
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
        .sum();
    body.push((10 - sum % 10) % 10);
    body.iter().map(u32::to_string).collect()
}

/// ISBN-13 digits for a valid ISBN-10 or ISBN-13, `None` otherwise.
pub fn canonical_isbn(raw: &str) -> Option<String> {
    let stripped = strip(raw);
    match stripped.len() {
        13 => {
            let digits: Vec<u32> = stripped.chars().map(|c| c.to_digit(10)).collect::<Option<_>>()?;
            isbn13_checksum_ok(&digits).then_some(stripped)
        }
        10 => {
            let mut digits = Vec::with_capacity(10);
            for (i, c) in stripped.chars().enumerate() {
                match c.to_digit(10) {
                    Some(d) => digits.push(d),
                    None if i == 9 && c == 'X' => digits.push(10),
                    None => return None,
                }
            }
            isbn10_checksum_ok(&digits).then(|| isbn10_to_isbn13(&digits))
        }
        _ => None,
    }
}

/// Whether two ISBN values identify the same edition.
///
/// Values that fail validation still match when their stripped forms are
/// identical, so a consistently mistyped ISBN is not lost. Blank values
/// never match.
pub fn isbn_match(a: &str, b: &str) -> bool {
    match (canonical_isbn(a), canonical_isbn(b)) {
        (Some(left), Some(right)) => left == right,
        _ => {
            let (left, right) = (strip(a), strip(b));
            !left.is_empty() && left == right
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isbn13_with_hyphens_is_canonical() {
        assert_eq!(
            canonical_isbn("978-0-306-40615-7").as_deref(),
            Some("9780306406157")
        );
    }

    #[test]
    fn isbn10_lifts_to_isbn13() {
        assert_eq!(canonical_isbn("0306406152").as_deref(), Some("9780306406157"));
        assert_eq!(canonical_isbn("007462542X").as_deref(), Some("9780074625422"));
    }

    #[test]
    fn invalid_check_digit_is_rejected() {
        assert_eq!(canonical_isbn("9780306406158"), None);
        assert_eq!(canonical_isbn("0306406153"), None);
        assert_eq!(canonical_isbn("not an isbn"), None);
    }

    #[test]
    fn isbn10_and_isbn13_editions_match() {
        assert!(isbn_match("0-306-40615-2", "9780306406157"));
        assert!(!isbn_match("9780306406157", "9781492056812"));
    }

    #[test]
    fn unparsable_values_fall_back_to_literal_comparison() {
        assert!(isbn_match("ASIN-B00X", "asin b00x"));
        assert!(!isbn_match("", ""));
        assert!(!isbn_match(" - ", "-"));
    }
}
