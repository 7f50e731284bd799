//! Unit tests for delimiter generation and format-string encoding.

use super::*;

fn is_control_only(token: &str) -> bool {
    token.chars().all(|c| CONTROL_CHARS.contains(&c))
}

// ─── Delimiter generation ───────────────────────────────────────────

#[test]
fn test_delimiters_use_reserved_alphabet_only() {
    for retry in 0..20 {
        let d = Delimiters::for_retry_count(retry);
        assert!(is_control_only(&d.record_start));
        assert!(is_control_only(&d.record_end));
        assert!(is_control_only(&d.field_separator));
    }
}

#[test]
fn test_delimiter_prefixes_are_distinct() {
    let d = Delimiters::for_retry_count(0);
    assert!(d.record_start.starts_with("\u{1}\u{1}"));
    assert!(d.field_separator.starts_with("\u{2}\u{2}"));
    assert!(d.record_end.starts_with("\u{3}\u{3}"));
}

#[test]
fn test_delimiter_lengths_are_bounded() {
    for retry in 0..50 {
        let d = Delimiters::for_retry_count(retry);
        for token in [&d.record_start, &d.record_end, &d.field_separator] {
            let len = token.chars().count();
            assert!((2..=11).contains(&len), "token length {} out of range", len);
        }
    }
}

#[test]
fn test_delimiters_are_deterministic() {
    assert_eq!(Delimiters::for_retry_count(7), Delimiters::for_retry_count(7));
}

#[test]
fn test_consecutive_retries_change_lengths() {
    for retry in 0..30 {
        let a = Delimiters::for_retry_count(retry);
        let b = Delimiters::for_retry_count(retry + 1);
        assert_ne!(a.record_start.len(), b.record_start.len());
        assert_ne!(a.record_end.len(), b.record_end.len());
        assert_ne!(a.field_separator.len(), b.field_separator.len());
    }
}

// ─── Session ────────────────────────────────────────────────────────

#[test]
fn test_regenerate_affects_only_later_calls() {
    let mut session = ParserSession::new();
    let options = [LogOption::Hash, LogOption::Subject];
    let before = session.format_string(&options);
    assert_eq!(session.format_string(&options), before, "pure given state");

    session.regenerate_delimiters();
    assert_eq!(session.retry_count(), 1);
    let after = session.format_string(&options);
    assert_ne!(before, after);
    assert_eq!(session.delimiters(), &Delimiters::for_retry_count(1));
}

#[test]
fn test_sessions_are_independent() {
    let mut a = ParserSession::new();
    let b = ParserSession::new();
    a.regenerate_delimiters();
    assert_eq!(b.retry_count(), 0);
    assert_eq!(b.delimiters(), &Delimiters::for_retry_count(0));
}

// ─── Encoding ───────────────────────────────────────────────────────

#[test]
fn test_format_string_layout() {
    let session = ParserSession::with_retry_count(3);
    let d = session.delimiters().clone();
    let format = session.format_string(&[LogOption::Hash, LogOption::Parents, LogOption::Subject]);

    let enc = |s: &str| s.chars().map(|c| format!("%x{:02x}", c as u32)).collect::<String>();
    let expected = format!(
        "{}%H{}%P{}%s{}",
        enc(&d.record_start),
        enc(&d.field_separator),
        enc(&d.field_separator),
        enc(&d.record_end)
    );
    assert_eq!(format, expected);
}

#[test]
fn test_format_string_has_no_raw_control_chars() {
    let format = ParserSession::new().format_string(&LogOption::ALL);
    assert!(!format.chars().any(|c| CONTROL_CHARS.contains(&c)));
    assert!(format.starts_with("%x01%x01"));
    assert!(format.contains("%d%x03%x03"), "refs placeholder is last before the end token");
}

#[test]
fn test_pretty_arg_prefix() {
    let arg = ParserSession::new().pretty_arg(&[LogOption::Hash]);
    assert!(arg.starts_with("--pretty=format:%x01%x01"));
    assert!(arg.contains("%H"));
}

#[test]
fn test_render_record() {
    let d = Delimiters::for_retry_count(0);
    let text = d.render_record(&["abc", "def"]);
    assert_eq!(
        text,
        format!("{}abc{}def{}", d.record_start, d.field_separator, d.record_end)
    );
}

#[test]
fn test_collides_with() {
    let d = Delimiters::for_retry_count(0);
    assert!(d.collides_with(&format!("x{}y", d.record_end)));
    assert!(!d.collides_with("plain commit message"));
}
