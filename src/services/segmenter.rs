// Sentence Segmenter Service
// Splits a sanitized document into sentence units for per-sentence scoring.

use crate::models::TextUnit;

const TERMINATORS: [char; 6] = ['.', '!', '?', '\u{3002}', '\u{ff01}', '\u{ff1f}'];

/// Split text into sentence units, keeping each terminator attached to the
/// sentence it ends. A `.` between two ASCII digits is a decimal point, not a
/// boundary. Text with no terminator at all comes back as a single unit.
pub fn split_sentences(text: &str) -> Vec<TextUnit> {
    let mut units = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut buffer = String::new();

    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        buffer.push(ch);

        if TERMINATORS.contains(&ch) {
            // Decimal numbers like 3.14 stay in one unit.
            let decimal = ch == '.'
                && i > 0
                && i + 1 < chars.len()
                && chars[i - 1].is_ascii_digit()
                && chars[i + 1].is_ascii_digit();

            if !decimal {
                let unit = buffer.trim();
                if !unit.is_empty() {
                    units.push(TextUnit::new(unit));
                }
                buffer.clear();
            }
        }

        i += 1;
    }

    let remaining = buffer.trim();
    if !remaining.is_empty() {
        units.push(TextUnit::new(remaining));
    }

    units
}

/// Whitespace-separated token count, reported alongside detection results.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
