//! Git process layer: runs the `git` CLI and streams its output through
//! the log parser and record collectors.
//!
//! stdout is read line by line on the calling thread; stderr is drained on
//! a helper thread and only used for error messages. Text for `--stdin`
//! queries is written from a second helper thread so large hash lists
//! never block on a full pipe.

pub mod collector;
pub mod format;
pub mod option;
pub mod parser;
pub mod record;

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::{debug, warn};

use crate::GitLogError;

use collector::{CollectorStats, RecordCollector, TreeHashSource, UnorderedRecordCollector};
use format::ParserSession;
use option::LogOption;
use parser::{LogParser, ParseStats};
use record::LogRecord;

// ─── Constants ──────────────────────────────────────────────────────

/// Default git executable.
pub const GIT_COMMAND: &str = "git";

/// `-c` overrides applied to every invocation so output stays parseable
/// regardless of user configuration.
const CONFIG_OVERRIDES: [&str; 2] = ["core.quotepath=false", "log.showSignature=false"];

// ─── Request ────────────────────────────────────────────────────────

/// What to ask `git log` for.
#[derive(Clone, Debug)]
pub struct LogRequest {
    options: Vec<LogOption>,
    with_paths: bool,
    diff_merges: bool,
    unordered: bool,
    revisions: Vec<String>,
    paths: Vec<String>,
    extra_args: Vec<String>,
}

impl LogRequest {
    pub fn new(options: Vec<LogOption>) -> Self {
        Self {
            options,
            with_paths: false,
            diff_merges: false,
            unordered: false,
            revisions: Vec::new(),
            paths: Vec::new(),
            extra_args: Vec::new(),
        }
    }

    /// Every metadata field, `--name-status` and `-m`.
    pub fn full_details() -> Self {
        Self::new(LogOption::full_details())
            .with_paths(true)
            .diff_merges(true)
    }

    /// Request `--name-status` output after each record.
    pub fn with_paths(mut self, with_paths: bool) -> Self {
        self.with_paths = with_paths;
        self
    }

    /// Request `-m` (one record per merge parent).
    pub fn diff_merges(mut self, diff_merges: bool) -> Self {
        self.diff_merges = diff_merges;
        self
    }

    /// Collect batches with [`UnorderedRecordCollector`].
    pub fn unordered(mut self, unordered: bool) -> Self {
        self.unordered = unordered;
        self
    }

    pub fn revisions<I, S>(mut self, revisions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.revisions.extend(revisions.into_iter().map(Into::into));
        self
    }

    pub fn paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Extra `git log` arguments placed before the revisions.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    pub fn options(&self) -> &[LogOption] {
        &self.options
    }

    pub fn has_paths(&self) -> bool {
        self.with_paths
    }

    pub fn is_unordered(&self) -> bool {
        self.unordered
    }

    /// Full argument list for the current session delimiters.
    pub fn args(&self, session: &ParserSession) -> Vec<String> {
        let mut args = vec![
            "log".to_string(),
            "--no-color".to_string(),
            "--encoding=UTF-8".to_string(),
            session.pretty_arg(&self.options),
        ];
        if self.with_paths {
            args.push("--name-status".to_string());
        }
        if self.diff_merges {
            args.push("-m".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args.extend(self.revisions.iter().cloned());
        args.push("--".to_string());
        args.extend(self.paths.iter().cloned());
        args
    }
}

/// Counters for one batch read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadSummary {
    pub parse: ParseStats,
    pub batches: CollectorStats,
}

// ─── Repository handle ──────────────────────────────────────────────

/// A working tree that git commands run in.
#[derive(Clone, Debug)]
pub struct GitRepo {
    root: PathBuf,
    git_binary: String,
    cancel: Option<Arc<AtomicBool>>,
}

impl GitRepo {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            git_binary: GIT_COMMAND.to_string(),
            cancel: None,
        }
    }

    /// Use a different git executable.
    pub fn with_git_binary(mut self, git_binary: impl Into<String>) -> Self {
        self.git_binary = git_binary.into();
        self
    }

    /// Abort reads with [`GitLogError::Cancelled`] once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run git and hand each stdout line (without `\n`) to `on_line`.
    ///
    /// `stdin` is written to the process when given. If `on_line` fails
    /// the process is killed and that error is returned.
    pub fn run_lines<F>(
        &self,
        args: &[String],
        stdin: Option<String>,
        mut on_line: F,
    ) -> Result<(), GitLogError>
    where
        F: FnMut(&str) -> Result<(), GitLogError>,
    {
        let command_line = format!("{} {}", self.git_binary, args.join(" "));
        debug!(command = %command_line, dir = %self.root.display(), "Running git");

        let mut cmd = Command::new(&self.git_binary);
        cmd.current_dir(&self.root);
        for config in CONFIG_OVERRIDES {
            cmd.arg("-c").arg(config);
        }
        cmd.args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GitLogError::GitNotFound
            } else {
                GitLogError::Io(e)
            }
        })?;

        let writer = match (stdin, child.stdin.take()) {
            (Some(text), Some(mut pipe)) => Some(thread::spawn(move || pipe.write_all(text.as_bytes()))),
            _ => None,
        };
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        let read_result = match child.stdout.take() {
            Some(stdout) => read_lines(BufReader::new(stdout), &mut on_line),
            None => Err(GitLogError::Io(std::io::Error::other("Failed to capture git stdout"))),
        };
        if read_result.is_err() {
            let _ = child.kill();
        }

        let status = child.wait()?;
        let stderr = stderr_reader
            .map(|handle| handle.join().unwrap_or_default())
            .unwrap_or_default();
        if let Some(Ok(Err(e))) = writer.map(|handle| handle.join()) {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                warn!(error = %e, "Failed to write git stdin");
            }
        }

        read_result?;

        if !status.success() {
            let stderr = stderr.trim();
            return Err(GitLogError::CommandFailed {
                command: command_line,
                exit_code: status.code().unwrap_or(-1),
                stderr: if stderr.is_empty() {
                    format!("git exited with {}", status)
                } else {
                    stderr.to_string()
                },
            });
        }
        Ok(())
    }

    /// Stream parsed records to `on_record`. Dropped records are logged and
    /// counted in the returned stats.
    ///
    /// On a format mismatch the session switches to new delimiters before
    /// the error is returned, so a retry uses different tokens.
    pub fn read_records<F>(
        &self,
        request: &LogRequest,
        session: &mut ParserSession,
        mut on_record: F,
    ) -> Result<ParseStats, GitLogError>
    where
        F: FnMut(LogRecord),
    {
        let mut parser = LogParser::new(request.options(), request.has_paths(), session.delimiters());
        let args = request.args(session);

        let result = self
            .run_lines(&args, None, |line| {
                self.check_cancelled()?;
                feed_line(&mut parser, line, &mut on_record)
            })
            .and_then(|()| {
                let result = parser.finish();
                drain_ready(&mut parser, &mut on_record);
                result
            });

        if let Err(GitLogError::Format { expected, found }) = &result {
            warn!(
                expected,
                found,
                retry = session.retry_count(),
                "git log output did not match the format, switching delimiters"
            );
            session.regenerate_delimiters();
        }
        result.map(|()| parser.stats())
    }

    /// Stream per-commit batches to `on_batch`, repairing merges whose
    /// tree-identical parents git left out.
    ///
    /// The request must include [`LogOption::Hash`] and [`LogOption::Parents`].
    pub fn read_batches<F>(
        &self,
        request: &LogRequest,
        session: &mut ParserSession,
        on_batch: F,
    ) -> Result<ReadSummary, GitLogError>
    where
        F: FnMut(Vec<LogRecord>),
    {
        for required in [LogOption::Hash, LogOption::Parents] {
            if !request.options().contains(&required) {
                return Err(GitLogError::InvalidArgs(format!(
                    "Batch reads need the '{}' option",
                    required
                )));
            }
        }

        if request.is_unordered() {
            let mut collector = UnorderedRecordCollector::new(self, on_batch);
            let parse = self.read_records(request, session, |r| collector.consume(r))?;
            Ok(ReadSummary {
                parse,
                batches: collector.finish(),
            })
        } else {
            let mut collector = RecordCollector::new(self, on_batch);
            let parse = self.read_records(request, session, |r| collector.consume(r))?;
            Ok(ReadSummary {
                parse,
                batches: collector.finish(),
            })
        }
    }

    /// Look up the tree hash of each commit with one no-walk query.
    ///
    /// Hashes go through stdin rather than the command line, so the list
    /// can be arbitrarily long.
    pub fn tree_hashes(&self, hashes: &[String]) -> Result<HashMap<String, String>, GitLogError> {
        let mut trees = HashMap::new();
        if hashes.is_empty() {
            return Ok(trees);
        }

        let session = ParserSession::new();
        let options = [LogOption::Hash, LogOption::TreeHash];
        let args = vec![
            "log".to_string(),
            "--no-color".to_string(),
            "--no-walk".to_string(),
            "--stdin".to_string(),
            session.pretty_arg(&options),
        ];
        let mut input = hashes.join("\n");
        input.push('\n');

        let mut parser = LogParser::new(&options, false, session.delimiters());
        self.run_lines(&args, Some(input), |line| parser.parse_line(line))?;
        parser.finish()?;

        while let Some(parsed) = parser.next_ready() {
            let Ok(record) = parsed else { continue };
            if let Some(tree) = record.tree_hash() {
                trees.insert(record.hash().to_string(), tree.to_string());
            }
        }
        Ok(trees)
    }

    fn check_cancelled(&self) -> Result<(), GitLogError> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(GitLogError::Cancelled),
            _ => Ok(()),
        }
    }
}

impl TreeHashSource for &GitRepo {
    fn tree_hashes(&mut self, hashes: &[String]) -> Result<HashMap<String, String>, GitLogError> {
        GitRepo::tree_hashes(self, hashes)
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Split a byte stream on `\n`, decoding each line lossily.
///
/// `\r` is kept: it can be part of a commit message.
fn read_lines<R, F>(mut reader: R, on_line: &mut F) -> Result<(), GitLogError>
where
    R: BufRead,
    F: FnMut(&str) -> Result<(), GitLogError>,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        on_line(&String::from_utf8_lossy(&buf))?;
    }
}

/// Parse one line, then hand out every record it completed, including
/// those queued before a format error.
fn feed_line<F: FnMut(LogRecord)>(parser: &mut LogParser, line: &str, on_record: &mut F) -> Result<(), GitLogError> {
    let result = parser.parse_line(line);
    drain_ready(parser, on_record);
    result
}

fn drain_ready<F: FnMut(LogRecord)>(parser: &mut LogParser, on_record: &mut F) {
    while let Some(parsed) = parser.next_ready() {
        if let Ok(record) = parsed {
            on_record(record);
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
