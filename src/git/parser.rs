//! Streaming parser for `git log` output produced with a
//! [`ParserSession`](super::format::ParserSession) format string.
//!
//! Input arrives one line at a time. A record starts with the record-start
//! token, its fields are split by the field separator and it ends with the
//! record-end token. Fields may span lines (commit bodies); the newline is
//! put back into the field. With `--name-status`, status lines follow the
//! record until the next record-start token.
//!
//! ```text
//! AwaitingRecordStart --record-start--> InOptions
//! InOptions --record-end--> InPaths | AwaitingRecordStart
//! InOptions --end of line--> InOptions (field gets '\n')
//! InPaths --status line--> InPaths
//! InPaths --record-start--> InOptions (pending record finalized)
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::io;

use tracing::{trace, warn};

use crate::GitLogError;

use super::format::Delimiters;
use super::option::LogOption;
use super::record::{unescape_path, ChangeType, LogRecord, PathChange};

// ─── Types ──────────────────────────────────────────────────────────

/// Why a record was discarded instead of handed to the consumer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// A status line had too few (or too many) tab-separated tokens.
    MalformedStatus { line: String },
    /// A status line started with a code git does not print.
    UnknownChangeType { code: String },
    /// A quoted path could not be decoded.
    BadPath { message: String },
    /// The record ended before every requested field was seen.
    IncompleteOptions { expected: usize, found: usize },
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::MalformedStatus { line } => {
                write!(f, "status list malformed: {:?}", line)
            }
            DropReason::UnknownChangeType { code } => write!(f, "unknown change type {:?}", code),
            DropReason::BadPath { message } => f.write_str(message),
            DropReason::IncompleteOptions { expected, found } => {
                write!(f, "expected {} fields, found {}", expected, found)
            }
        }
    }
}

/// A record the parser refused to emit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DroppedRecord {
    /// Commit hash, when the hash field was parsed before the failure.
    pub hash: Option<String>,
    pub reason: DropReason,
}

/// Outcome for one record boundary.
pub type ParsedRecord = Result<LogRecord, DroppedRecord>;

/// Counters for one parse session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub records: usize,
    pub dropped: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    AwaitingRecordStart,
    InOptions,
    InPaths,
}

// ─── Parser ─────────────────────────────────────────────────────────

/// Line-driven state machine. One instance serves one git invocation.
pub struct LogParser {
    options: Vec<LogOption>,
    with_paths: bool,
    delimiters: Delimiters,
    state: State,
    /// Closed fields of the record being read.
    fields: Vec<String>,
    /// Field currently being accumulated.
    current: String,
    /// Record whose status lines are being read.
    pending: Option<LogRecord>,
    /// First status-line problem of the pending record.
    pending_error: Option<DropReason>,
    ready: VecDeque<ParsedRecord>,
    stats: ParseStats,
}

impl LogParser {
    pub fn new(options: &[LogOption], with_paths: bool, delimiters: &Delimiters) -> Self {
        Self {
            options: options.to_vec(),
            with_paths,
            delimiters: delimiters.clone(),
            state: State::AwaitingRecordStart,
            fields: Vec::with_capacity(options.len()),
            current: String::new(),
            pending: None,
            pending_error: None,
            ready: VecDeque::new(),
            stats: ParseStats::default(),
        }
    }

    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    /// Take the next finished (or dropped) record, oldest first.
    pub fn next_ready(&mut self) -> Option<ParsedRecord> {
        self.ready.pop_front()
    }

    /// Feed one line of output, without its trailing newline.
    ///
    /// Fails only on a format mismatch, after which the parser is reset.
    pub fn parse_line(&mut self, line: &str) -> Result<(), GitLogError> {
        let result = self.parse_line_inner(line);
        if result.is_err() {
            self.reset();
        }
        result
    }

    /// Signal end of output. Finalizes the record in progress, if any.
    pub fn finish(&mut self) -> Result<(), GitLogError> {
        let result = self.finish_inner();
        self.reset();
        result
    }

    /// Parse a whole captured output. Convenience for small outputs.
    pub fn parse_text(&mut self, text: &str) -> Result<Vec<ParsedRecord>, GitLogError> {
        let text = text.strip_suffix('\n').unwrap_or(text);
        let mut out = Vec::new();
        for line in text.split('\n') {
            if let Err(e) = self.parse_line(line) {
                self.ready.clear();
                return Err(e);
            }
            out.extend(self.ready.drain(..));
        }
        if let Err(e) = self.finish() {
            self.ready.clear();
            return Err(e);
        }
        out.extend(self.ready.drain(..));
        Ok(out)
    }

    // ─── Internal helpers ───────────────────────────────────────────

    fn parse_line_inner(&mut self, line: &str) -> Result<(), GitLogError> {
        match self.state {
            State::AwaitingRecordStart => {
                if let Some(rest) = line.strip_prefix(self.delimiters.record_start.as_str()) {
                    self.state = State::InOptions;
                    self.parse_options(rest)
                } else {
                    if !line.trim().is_empty() {
                        trace!(line = %line, "Ignoring text outside of a record");
                    }
                    Ok(())
                }
            }
            State::InOptions => self.parse_options(line),
            State::InPaths => {
                if let Some(rest) = line.strip_prefix(self.delimiters.record_start.as_str()) {
                    self.finish_pending();
                    self.state = State::InOptions;
                    self.parse_options(rest)
                } else {
                    self.parse_status_line(line);
                    Ok(())
                }
            }
        }
    }

    fn parse_options(&mut self, text: &str) -> Result<(), GitLogError> {
        let mut rest = text;
        loop {
            let sep = rest.find(self.delimiters.field_separator.as_str());
            let end = rest.find(self.delimiters.record_end.as_str());

            let next = match (sep, end) {
                (Some(s), Some(e)) if e < s => self.end_options(rest, e)?,
                (Some(s), _) => {
                    self.current.push_str(&rest[..s]);
                    self.close_field();
                    Some(&rest[s + self.delimiters.field_separator.len()..])
                }
                (None, Some(e)) => self.end_options(rest, e)?,
                (None, None) => {
                    self.current.push_str(rest);
                    self.current.push('\n');
                    None
                }
            };
            match next {
                Some(remaining) => rest = remaining,
                None => return Ok(()),
            }
        }
    }

    /// Close the record whose end token starts at `end`. Returns the text
    /// of a next record starting on the same line, if any.
    fn end_options<'a>(&mut self, text: &'a str, end: usize) -> Result<Option<&'a str>, GitLogError> {
        self.current.push_str(&text[..end]);
        self.close_field();
        let rest = &text[end + self.delimiters.record_end.len()..];
        self.complete_options()?;

        if let Some(next) = rest.strip_prefix(self.delimiters.record_start.as_str()) {
            if self.state == State::InPaths {
                self.finish_pending();
            }
            self.state = State::InOptions;
            return Ok(Some(next));
        }
        if self.state == State::InPaths {
            self.parse_status_line(rest);
        } else if !rest.trim().is_empty() {
            trace!(text = %rest, "Ignoring text after record end");
        }
        Ok(None)
    }

    fn close_field(&mut self) {
        let field = std::mem::take(&mut self.current);
        self.fields.push(field);
    }

    /// All fields of a record are closed: check the count and build it.
    fn complete_options(&mut self) -> Result<(), GitLogError> {
        let fields = std::mem::take(&mut self.fields);
        let expected = self.options.len();

        if fields.len() > expected {
            return Err(GitLogError::Format {
                expected,
                found: fields.len(),
            });
        }
        if fields.len() < expected {
            let hash = self.hash_from_fields(&fields);
            self.push_dropped(DroppedRecord {
                hash,
                reason: DropReason::IncompleteOptions {
                    expected,
                    found: fields.len(),
                },
            });
            self.state = State::AwaitingRecordStart;
            return Ok(());
        }

        let record = LogRecord::from_values(&self.options, fields);
        if self.with_paths {
            self.pending = Some(record);
            self.pending_error = None;
            self.state = State::InPaths;
        } else {
            self.push_ready(record);
            self.state = State::AwaitingRecordStart;
        }
        Ok(())
    }

    fn hash_from_fields(&self, fields: &[String]) -> Option<String> {
        let pos = self.options.iter().position(|o| *o == LogOption::Hash)?;
        fields.get(pos).cloned()
    }

    /// Parse `<code>\t<path>[\t<path>]`. Problems are deferred until the
    /// record is finalized.
    fn parse_status_line(&mut self, line: &str) {
        if line.trim().is_empty() || self.pending_error.is_some() {
            return;
        }
        let Some(record) = self.pending.as_mut() else {
            return;
        };

        let tokens: Vec<&str> = line.split('\t').collect();
        if tokens.len() < 2 || tokens.len() > 3 {
            self.pending_error = Some(DropReason::MalformedStatus {
                line: line.to_string(),
            });
            return;
        }

        let Some(change_type) = ChangeType::from_status_code(tokens[0]) else {
            self.pending_error = Some(DropReason::UnknownChangeType {
                code: tokens[0].to_string(),
            });
            return;
        };
        if change_type.has_second_path() != (tokens.len() == 3) {
            self.pending_error = Some(DropReason::MalformedStatus {
                line: line.to_string(),
            });
            return;
        }

        let paths: Result<Vec<String>, String> =
            tokens[1..].iter().map(|p| unescape_path(p)).collect();
        match paths {
            Ok(mut paths) => {
                let second_path = if paths.len() == 2 { paths.pop() } else { None };
                let first_path = paths.pop().unwrap_or_default();
                record.push_change(PathChange {
                    change_type,
                    first_path,
                    second_path,
                });
            }
            Err(message) => {
                self.pending_error = Some(DropReason::BadPath { message });
            }
        }
    }

    fn finish_pending(&mut self) {
        let Some(record) = self.pending.take() else {
            return;
        };
        match self.pending_error.take() {
            Some(reason) => self.push_dropped(DroppedRecord {
                hash: Some(record.hash().to_string()),
                reason,
            }),
            None => self.push_ready(record),
        }
    }

    fn finish_inner(&mut self) -> Result<(), GitLogError> {
        match self.state {
            State::AwaitingRecordStart => {}
            State::InPaths => self.finish_pending(),
            State::InOptions => {
                // The newline was added for a line that never got a successor.
                if self.current.ends_with('\n') {
                    self.current.pop();
                }
                self.close_field();
                self.complete_options()?;
                self.finish_pending();
            }
        }
        Ok(())
    }

    fn push_ready(&mut self, record: LogRecord) {
        self.stats.records += 1;
        self.ready.push_back(Ok(record));
    }

    fn push_dropped(&mut self, dropped: DroppedRecord) {
        warn!(
            hash = dropped.hash.as_deref().unwrap_or("<unknown>"),
            reason = %dropped.reason,
            "Dropping malformed git log record"
        );
        self.stats.dropped += 1;
        self.ready.push_back(Err(dropped));
    }

    fn reset(&mut self) {
        self.state = State::AwaitingRecordStart;
        self.fields.clear();
        self.current.clear();
        self.pending = None;
        self.pending_error = None;
    }
}

// ─── Iterator adapter ───────────────────────────────────────────────

/// Lazily parses records from a line source.
///
/// Ends after the source is exhausted and the parser finished, or after
/// the first error. Records completed before an error are yielded first.
pub struct Records<I> {
    lines: I,
    parser: LogParser,
    finished: bool,
    error: Option<GitLogError>,
}

impl<I> Records<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    pub fn new(lines: I, parser: LogParser) -> Self {
        Self {
            lines,
            parser,
            finished: false,
            error: None,
        }
    }

    pub fn stats(&self) -> ParseStats {
        self.parser.stats()
    }
}

impl<I> Iterator for Records<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    type Item = Result<ParsedRecord, GitLogError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.parser.next_ready() {
                return Some(Ok(record));
            }
            if let Some(e) = self.error.take() {
                return Some(Err(e));
            }
            if self.finished {
                return None;
            }
            match self.lines.next() {
                Some(Ok(line)) => {
                    if let Err(e) = self.parser.parse_line(&line) {
                        self.finished = true;
                        self.error = Some(e);
                    }
                }
                Some(Err(e)) => {
                    self.finished = true;
                    self.error = Some(e.into());
                }
                None => {
                    self.finished = true;
                    if let Err(e) = self.parser.finish() {
                        self.error = Some(e);
                    }
                }
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
