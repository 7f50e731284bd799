//! CLI argument structs for all subcommands.

use clap::Parser;

use gitlog::{LogOption, LogRequest};

#[derive(Parser, Debug)]
pub struct LogArgs {
    /// Repository directory
    #[arg(short, long, default_value = ".")]
    pub dir: String,

    /// Comma-separated fields to request (default: all except raw-body).
    /// Available: hash, tree, parents, author-name, author-email,
    /// author-time, committer-name, committer-email, commit-time,
    /// subject, body, raw-body, refs
    #[arg(short, long)]
    pub options: Option<String>,

    /// Include changed paths (--name-status)
    #[arg(long)]
    pub name_status: bool,

    /// Print a merge once per parent (-m)
    #[arg(short = 'm', long)]
    pub diff_merges: bool,

    /// Group records into one JSON object per commit, repairing merges
    /// that are missing tree-identical parents
    #[arg(long)]
    pub batches: bool,

    /// Records of a commit may be interleaved (use with --date-order etc.)
    #[arg(long)]
    pub unordered: bool,

    /// Limit the number of commits
    #[arg(short = 'n', long)]
    pub max_count: Option<usize>,

    /// Plain text output: `hash subject` plus status lines
    #[arg(long)]
    pub text: bool,

    /// Start with the delimiters of this retry count
    #[arg(long, default_value = "0")]
    pub retry: u32,

    /// Revisions or ranges (default: HEAD)
    pub revisions: Vec<String>,

    /// Path filters, after `--`
    #[arg(last = true)]
    pub paths: Vec<String>,
}

impl LogArgs {
    /// Convert to a library request. Batch output needs hash and parents,
    /// so they are added when missing.
    pub fn to_request(&self) -> Result<LogRequest, String> {
        let mut options = parse_options(self.options.as_deref())?;
        if self.batches {
            for required in [LogOption::Parents, LogOption::Hash] {
                if !options.contains(&required) {
                    options.insert(0, required);
                }
            }
        }

        let mut request = LogRequest::new(options)
            .with_paths(self.name_status)
            .diff_merges(self.diff_merges)
            .unordered(self.unordered)
            .revisions(self.revisions.iter().cloned())
            .paths(self.paths.iter().cloned());
        if let Some(n) = self.max_count {
            request = request.arg(format!("--max-count={}", n));
        }
        Ok(request)
    }
}

#[derive(Parser, Debug)]
pub struct FormatArgs {
    /// Comma-separated fields (default: all except raw-body)
    #[arg(short, long)]
    pub options: Option<String>,

    /// Retry count the delimiters are derived from
    #[arg(long, default_value = "0")]
    pub retry: u32,
}

#[derive(Parser, Debug)]
pub struct TreesArgs {
    /// Repository directory
    #[arg(short, long, default_value = ".")]
    pub dir: String,

    /// Commit hashes to look up
    #[arg(required = true)]
    pub hashes: Vec<String>,
}

/// `None` means every field except raw-body.
pub fn parse_options(options: Option<&str>) -> Result<Vec<LogOption>, String> {
    match options {
        Some(list) => LogOption::parse_list(list),
        None => Ok(LogOption::full_details()),
    }
}
