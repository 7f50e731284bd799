//! Record fields that can be requested from `git log`.

use std::fmt;
use std::str::FromStr;

/// A single `git log` pretty-format field.
///
/// The set is closed so records can store values in a fixed-size array
/// indexed by [`LogOption::index`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogOption {
    Hash,
    TreeHash,
    Parents,
    AuthorName,
    AuthorEmail,
    AuthorTime,
    CommitterName,
    CommitterEmail,
    CommitTime,
    Subject,
    Body,
    RawBody,
    RefNames,
}

impl LogOption {
    /// Number of variants.
    pub const COUNT: usize = 13;

    /// All options in declaration order.
    pub const ALL: [LogOption; Self::COUNT] = [
        LogOption::Hash,
        LogOption::TreeHash,
        LogOption::Parents,
        LogOption::AuthorName,
        LogOption::AuthorEmail,
        LogOption::AuthorTime,
        LogOption::CommitterName,
        LogOption::CommitterEmail,
        LogOption::CommitTime,
        LogOption::Subject,
        LogOption::Body,
        LogOption::RawBody,
        LogOption::RefNames,
    ];

    /// The pretty-format placeholder, without the leading `%`.
    pub fn placeholder(self) -> &'static str {
        match self {
            LogOption::Hash => "H",
            LogOption::TreeHash => "T",
            LogOption::Parents => "P",
            LogOption::AuthorName => "an",
            LogOption::AuthorEmail => "ae",
            LogOption::AuthorTime => "at",
            LogOption::CommitterName => "cn",
            LogOption::CommitterEmail => "ce",
            LogOption::CommitTime => "ct",
            LogOption::Subject => "s",
            LogOption::Body => "b",
            LogOption::RawBody => "B",
            LogOption::RefNames => "d",
        }
    }

    /// Dense index into per-record storage.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            LogOption::Hash => "hash",
            LogOption::TreeHash => "tree",
            LogOption::Parents => "parents",
            LogOption::AuthorName => "author-name",
            LogOption::AuthorEmail => "author-email",
            LogOption::AuthorTime => "author-time",
            LogOption::CommitterName => "committer-name",
            LogOption::CommitterEmail => "committer-email",
            LogOption::CommitTime => "commit-time",
            LogOption::Subject => "subject",
            LogOption::Body => "body",
            LogOption::RawBody => "raw-body",
            LogOption::RefNames => "refs",
        }
    }

    /// Options requested for full commit details.
    ///
    /// `RawBody` is left out: subject + body already carry the message.
    pub fn full_details() -> Vec<LogOption> {
        vec![
            LogOption::Hash,
            LogOption::TreeHash,
            LogOption::Parents,
            LogOption::AuthorName,
            LogOption::AuthorEmail,
            LogOption::AuthorTime,
            LogOption::CommitterName,
            LogOption::CommitterEmail,
            LogOption::CommitTime,
            LogOption::Subject,
            LogOption::Body,
            LogOption::RefNames,
        ]
    }

    /// Parse a comma-separated list of option names.
    pub fn parse_list(s: &str) -> Result<Vec<LogOption>, String> {
        let mut options = Vec::new();
        for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let option: LogOption = name.parse()?;
            if options.contains(&option) {
                return Err(format!("Option '{}' listed twice", name));
            }
            options.push(option);
        }
        if options.is_empty() {
            return Err("At least one option is required".to_string());
        }
        Ok(options)
    }
}

impl fmt::Display for LogOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LogOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogOption::ALL
            .iter()
            .copied()
            .find(|o| o.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<&str> = LogOption::ALL.iter().map(|o| o.name()).collect();
                format!("Unknown option '{}'. Known options: {}", s, known.join(", "))
            })
    }
}
