//! CLI layer: argument parsing, logging setup, and command dispatch.

pub mod args;

pub use args::*;

use std::io::{self, BufWriter, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value, json};
use tracing::level_filters::LevelFilter;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use gitlog::{CommitDetails, GitLogError, GitRepo, LogOption, LogRecord, ParserSession, PathChange};

// ─── CLI ─────────────────────────────────────────────────────────────

/// Streaming `git log` reader with merge-record repair
#[derive(Parser, Debug)]
#[command(name = "gitlog", version, about, after_help = "\
Run 'gitlog <COMMAND> --help' for detailed options and examples.\n\
Common options: -d <DIR> (repository), -o <LIST> (fields), --batches (one object per commit)")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Write logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Read git log and print one JSON object per record or commit
    Log(LogArgs),

    /// Print the encoded --pretty argument for a field list
    Format(FormatArgs),

    /// Print the tree hash of each commit
    Trees(TreesArgs),
}

// ─── Main entry point ───────────────────────────────────────────────

pub fn run() {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json);

    let result = match cli.command {
        Commands::Log(args) => cmd_log(args),
        Commands::Format(args) => cmd_format(args),
        Commands::Trees(args) => cmd_trees(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// `RUST_LOG` directives take precedence over `--log-level`.
fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(parse_log_level(level)).into())
        .from_env_lossy();
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(io::stderr)
            .init();
    }
}

pub(crate) fn parse_log_level(level: &str) -> tracing::Level {
    match level {
        "error" => tracing::Level::ERROR,
        "info" => tracing::Level::INFO,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::WARN,
    }
}

/// Flag set by Ctrl-C. Reads check it per line and stop with `Cancelled`.
fn cancel_on_ctrlc() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    if let Err(e) = ctrlc::set_handler(move || handler_flag.store(true, Ordering::Relaxed)) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }
    flag
}

// ─── Output ─────────────────────────────────────────────────────────

/// Buffered stdout that remembers the first write error.
///
/// Consumers can't return errors, so a failed write raises the cancel
/// flag and the read stops at the next line.
struct Output {
    writer: BufWriter<io::StdoutLock<'static>>,
    error: Option<io::Error>,
    cancel: Arc<AtomicBool>,
}

impl Output {
    fn new(cancel: Arc<AtomicBool>) -> Self {
        Self {
            writer: BufWriter::new(io::stdout().lock()),
            error: None,
            cancel,
        }
    }

    fn line(&mut self, text: &str) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = writeln!(self.writer, "{}", text) {
            self.error = Some(e);
            self.cancel.store(true, Ordering::Relaxed);
        }
    }

    /// Returns `Ok(false)` when the reader went away (e.g. `| head`).
    fn finish(mut self) -> Result<bool, GitLogError> {
        match self.error.take() {
            Some(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(false),
            Some(e) => Err(e.into()),
            None => match self.writer.flush() {
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(false),
                other => other.map(|()| true).map_err(Into::into),
            },
        }
    }
}

pub(crate) fn record_json(record: &LogRecord, options: &[LogOption]) -> Value {
    let mut obj = Map::new();
    for option in options {
        if let Some(value) = record.get(*option) {
            obj.insert(option.name().to_string(), Value::String(value.to_string()));
        }
    }
    if !record.changes().is_empty() {
        let changes: Vec<Value> = record.changes().iter().map(change_json).collect();
        obj.insert("changes".to_string(), Value::Array(changes));
    }
    Value::Object(obj)
}

fn change_json(change: &PathChange) -> Value {
    match &change.second_path {
        Some(second) => json!({
            "status": change.change_type.status_letter().to_string(),
            "from": change.first_path,
            "path": second,
        }),
        None => json!({
            "status": change.change_type.status_letter().to_string(),
            "path": change.first_path,
        }),
    }
}

pub(crate) fn change_text(change: &PathChange) -> String {
    match &change.second_path {
        Some(second) => format!("{}\t{}\t{}", change.change_type.status_letter(), change.first_path, second),
        None => format!("{}\t{}", change.change_type.status_letter(), change.first_path),
    }
}

// ─── Commands ───────────────────────────────────────────────────────

fn cmd_log(args: LogArgs) -> Result<(), GitLogError> {
    let request = args.to_request().map_err(GitLogError::InvalidArgs)?;
    let cancel = cancel_on_ctrlc();
    let repo = GitRepo::new(&args.dir).with_cancel_flag(Arc::clone(&cancel));
    let mut session = ParserSession::with_retry_count(args.retry);
    let mut out = Output::new(cancel);
    let start = Instant::now();

    info!(dir = %repo.root().display(), batches = args.batches, unordered = args.unordered, "Reading git log");

    let result = if args.batches {
        repo.read_batches(&request, &mut session, |batch| {
            let Some(details) = CommitDetails::from_batch(&batch) else {
                return;
            };
            if args.text {
                out.line(&format!("{} {}", details.hash, details.subject));
                let show_parents = details.changes.len() > 1;
                for (i, changes) in details.changes.iter().enumerate() {
                    if let Some(parent) = details.parents.get(i).filter(|_| show_parents) {
                        out.line(&format!("  vs {}", parent));
                    }
                    for change in changes {
                        out.line(&format!("    {}", change_text(change)));
                    }
                }
            } else {
                match serde_json::to_string(&details) {
                    Ok(line) => out.line(&line),
                    Err(e) => warn!(hash = %details.hash, error = %e, "Failed to serialize commit"),
                }
            }
        })
        .map(|summary| (summary.parse, Some(summary.batches)))
    } else {
        repo.read_records(&request, &mut session, |record| {
            if args.text {
                out.line(&format!("{} {}", record.hash(), record.subject()));
                for change in record.changes() {
                    out.line(&format!("    {}", change_text(change)));
                }
            } else {
                out.line(&record_json(&record, request.options()).to_string());
            }
        })
        .map(|stats| (stats, None))
    };

    if !out.finish()? {
        debug!("stdout closed, stopping");
        return Ok(());
    }

    match result {
        Ok((parse, batches)) => {
            let elapsed = start.elapsed();
            match batches {
                Some(b) => eprintln!(
                    "{} records ({} dropped), {} commits ({} repaired with {} empty records) in {:.1}ms",
                    parse.records,
                    parse.dropped,
                    b.batches,
                    b.incomplete,
                    b.synthesized,
                    elapsed.as_secs_f64() * 1000.0
                ),
                None => eprintln!(
                    "{} records ({} dropped) in {:.1}ms",
                    parse.records,
                    parse.dropped,
                    elapsed.as_secs_f64() * 1000.0
                ),
            }
            Ok(())
        }
        Err(e @ GitLogError::Format { .. }) => {
            eprintln!(
                "Hint: a commit message may contain the delimiters; rerun with --retry {}",
                session.retry_count()
            );
            Err(e)
        }
        Err(e) => Err(e),
    }
}

fn cmd_format(args: FormatArgs) -> Result<(), GitLogError> {
    let options = parse_options(args.options.as_deref()).map_err(GitLogError::InvalidArgs)?;
    let session = ParserSession::with_retry_count(args.retry);
    debug!(retry = args.retry, delimiters = ?session.delimiters(), "Encoding format");
    println!("{}", session.pretty_arg(&options));
    Ok(())
}

fn cmd_trees(args: TreesArgs) -> Result<(), GitLogError> {
    let repo = GitRepo::new(&args.dir);
    let trees = repo.tree_hashes(&args.hashes)?;

    for hash in &args.hashes {
        // Abbreviated input resolves to the full hash git printed.
        let found = trees.get(hash).map(|tree| (hash.as_str(), tree)).or_else(|| {
            let mut matches = trees.iter().filter(|(full, _)| full.starts_with(hash.as_str()));
            match (matches.next(), matches.next()) {
                (Some((full, tree)), None) => Some((full.as_str(), tree)),
                _ => None,
            }
        });
        match found {
            Some((full, tree)) => println!("{} {}", full, tree),
            None => warn!(hash = %hash, "No tree hash resolved"),
        }
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
