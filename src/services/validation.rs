// Input Validation Service
// Shared gate in front of every oracle-facing entrypoint: reject bad input
// before any external call, strip control characters from the rest.

use regex::Regex;

use crate::error::Error;

/// Maximum accepted document length in Unicode code points.
pub const MAX_TEXT_LENGTH: usize = 50_000;

/// Remove NUL and other control characters that would corrupt prompts.
pub fn sanitize_text(text: &str) -> String {
    let control_re = Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").unwrap();
    control_re.replace_all(text, "").to_string()
}

/// Validate and sanitize user text. Empty and over-length inputs are rejected
/// here, with no oracle call having been made.
pub fn validate_text(text: &str, max_length: usize) -> Result<String, Error> {
    if text.trim().is_empty() {
        return Err(Error::InvalidInput("Text cannot be empty".to_string()));
    }

    if text.chars().count() > max_length {
        return Err(Error::InvalidInput(format!(
            "Text exceeds maximum length of {} characters",
            max_length
        )));
    }

    Ok(sanitize_text(text))
}
