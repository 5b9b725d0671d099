//! Numeric score extraction from free-text model replies.

use taodiv_core::SentimentScore;

/// First signed decimal number in `response`, clamped to the sentiment range.
///
/// Commas count as decimal separators. A reply with no digits scores neutral.
pub fn extract_score(response: &str) -> SentimentScore {
    let normalized = response.replace(',', ".");
    match first_number(&normalized).and_then(|n| n.parse::<f64>().ok()) {
        Some(value) => SentimentScore::new(value),
        None => SentimentScore::NEUTRAL,
    }
}

/// Leftmost match of `-?\d+\.?\d*`.
fn first_number(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let first_digit = bytes.iter().position(u8::is_ascii_digit)?;
    let start = if first_digit > 0 && bytes[first_digit - 1] == b'-' {
        first_digit - 1
    } else {
        first_digit
    };

    let mut end = first_digit;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }

    Some(text[start..end].trim_end_matches('.'))
}
