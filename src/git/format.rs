//! Custom pretty-format encoder.
//!
//! Every record git prints is wrapped in control-character delimiters that
//! cannot be typed into a commit message by accident. The delimiters carry a
//! variable-length suffix derived from the session's retry count, so after a
//! parse failure the next attempt uses tokens of a different length.

use crate::stable_hash;

use super::option::LogOption;

// ─── Constants ──────────────────────────────────────────────────────

/// Reserved symbols. Delimiters are built only from these.
pub const CONTROL_CHARS: [char; 3] = ['\u{1}', '\u{2}', '\u{3}'];

/// Suffix length is in `0..MAX_SUFFIX_LEN`.
const MAX_SUFFIX_LEN: u64 = 10;

// ─── Delimiters ─────────────────────────────────────────────────────

/// The three tokens that frame records and separate fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delimiters {
    pub record_start: String,
    pub record_end: String,
    pub field_separator: String,
}

impl Delimiters {
    /// Derive the delimiters for a given retry count.
    ///
    /// Deterministic: the same retry count always yields the same tokens.
    pub fn for_retry_count(retry_count: u32) -> Self {
        Self {
            record_start: generate_token(CONTROL_CHARS[0], "record-start", retry_count),
            field_separator: generate_token(CONTROL_CHARS[1], "field-separator", retry_count),
            record_end: generate_token(CONTROL_CHARS[2], "record-end", retry_count),
        }
    }

    /// Render field values exactly as git prints them for a format built
    /// from these delimiters (no trailing newline).
    pub fn render_record(&self, values: &[&str]) -> String {
        let mut out = String::with_capacity(
            self.record_start.len()
                + self.record_end.len()
                + values.iter().map(|v| v.len() + self.field_separator.len()).sum::<usize>(),
        );
        out.push_str(&self.record_start);
        out.push_str(&values.join(&self.field_separator));
        out.push_str(&self.record_end);
        out
    }

    /// True if `text` contains any of the three tokens.
    pub fn collides_with(&self, text: &str) -> bool {
        text.contains(&self.record_start)
            || text.contains(&self.record_end)
            || text.contains(&self.field_separator)
    }
}

/// Base symbol doubled, then a suffix whose length shifts by one per retry.
fn generate_token(base: char, role: &str, retry_count: u32) -> String {
    let len = ((stable_hash(&[role.as_bytes()]) % MAX_SUFFIX_LEN + u64::from(retry_count) % MAX_SUFFIX_LEN)
        % MAX_SUFFIX_LEN) as usize;
    let mut bits = stable_hash(&[role.as_bytes(), &retry_count.to_le_bytes()]);

    let mut token = String::with_capacity(2 + len);
    token.push(base);
    token.push(base);
    for _ in 0..len {
        token.push(CONTROL_CHARS[(bits % 3) as usize]);
        bits /= 3;
    }
    token
}

/// Escape literal text for git's pretty-format mini-language (`%xHH`).
fn encode_literal(out: &mut String, literal: &str) {
    for c in literal.chars() {
        out.push_str(&format!("%x{:02x}", c as u32));
    }
}

// ─── Session ────────────────────────────────────────────────────────

/// Delimiter state for one caller.
///
/// Holds its own retry count instead of a process-wide counter, so
/// concurrent readers never disturb each other's delimiters.
#[derive(Clone, Debug)]
pub struct ParserSession {
    retry_count: u32,
    delimiters: Delimiters,
}

impl Default for ParserSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserSession {
    pub fn new() -> Self {
        Self::with_retry_count(0)
    }

    pub fn with_retry_count(retry_count: u32) -> Self {
        Self {
            retry_count,
            delimiters: Delimiters::for_retry_count(retry_count),
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    /// Switch to fresh delimiters after a parse failure.
    ///
    /// Only format strings built after this call are affected.
    pub fn regenerate_delimiters(&mut self) {
        self.retry_count = self.retry_count.wrapping_add(1);
        self.delimiters = Delimiters::for_retry_count(self.retry_count);
    }

    /// Build the pretty-format string for the given options.
    pub fn format_string(&self, options: &[LogOption]) -> String {
        let mut out = String::new();
        encode_literal(&mut out, &self.delimiters.record_start);
        for (i, option) in options.iter().enumerate() {
            if i > 0 {
                encode_literal(&mut out, &self.delimiters.field_separator);
            }
            out.push('%');
            out.push_str(option.placeholder());
        }
        encode_literal(&mut out, &self.delimiters.record_end);
        out
    }

    /// `--pretty=format:<format_string>`
    pub fn pretty_arg(&self, options: &[LogOption]) -> String {
        format!("--pretty=format:{}", self.format_string(options))
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
