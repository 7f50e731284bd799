//! Parsed `git log` records and the values built from them.

use serde::Serialize;

use super::option::LogOption;

// ─── Change types ───────────────────────────────────────────────────

/// Kind of change reported by `--name-status`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
    Copied,
    Renamed,
    TypeChanged,
    Unmerged,
    Unresolved,
}

impl ChangeType {
    /// Parse a status code such as `M`, `A` or `R087`.
    ///
    /// Only the leading letter matters; the similarity score is ignored.
    pub fn from_status_code(code: &str) -> Option<ChangeType> {
        match code.chars().next()? {
            'A' => Some(ChangeType::Added),
            'M' => Some(ChangeType::Modified),
            'D' => Some(ChangeType::Deleted),
            'C' => Some(ChangeType::Copied),
            'R' => Some(ChangeType::Renamed),
            'T' => Some(ChangeType::TypeChanged),
            'U' => Some(ChangeType::Unmerged),
            'X' => Some(ChangeType::Unresolved),
            _ => None,
        }
    }

    /// Copies and renames carry a source and a destination path.
    pub fn has_second_path(self) -> bool {
        matches!(self, ChangeType::Copied | ChangeType::Renamed)
    }

    pub fn status_letter(self) -> char {
        match self {
            ChangeType::Added => 'A',
            ChangeType::Modified => 'M',
            ChangeType::Deleted => 'D',
            ChangeType::Copied => 'C',
            ChangeType::Renamed => 'R',
            ChangeType::TypeChanged => 'T',
            ChangeType::Unmerged => 'U',
            ChangeType::Unresolved => 'X',
        }
    }
}

/// One `--name-status` line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PathChange {
    pub change_type: ChangeType,
    pub first_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_path: Option<String>,
}

impl PathChange {
    /// The path the change leaves behind (destination for renames/copies).
    pub fn path(&self) -> &str {
        self.second_path.as_deref().unwrap_or(&self.first_path)
    }
}

// ─── Record ─────────────────────────────────────────────────────────

/// One record printed by `git log`: requested field values plus path changes.
///
/// With `-m`, a merge commit produces one record per parent it differs from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogRecord {
    values: [Option<String>; LogOption::COUNT],
    changes: Vec<PathChange>,
}

impl LogRecord {
    /// Zip requested options with parsed values, in request order.
    pub fn from_values(options: &[LogOption], values: Vec<String>) -> Self {
        let mut record = LogRecord::default();
        for (option, value) in options.iter().zip(values) {
            record.values[option.index()] = Some(value);
        }
        record
    }

    pub fn get(&self, option: LogOption) -> Option<&str> {
        self.values[option.index()].as_deref()
    }

    pub fn set(&mut self, option: LogOption, value: impl Into<String>) {
        self.values[option.index()] = Some(value.into());
    }

    pub fn changes(&self) -> &[PathChange] {
        &self.changes
    }

    pub fn push_change(&mut self, change: PathChange) {
        self.changes.push(change);
    }

    pub fn path_count(&self) -> usize {
        self.changes.len()
    }

    /// Same field values, no path changes.
    ///
    /// Stands in for the record git omits when a merge is tree-identical to
    /// one of its parents.
    pub fn empty_copy(&self) -> Self {
        Self {
            values: self.values.clone(),
            changes: Vec::new(),
        }
    }

    // ─── Typed accessors ────────────────────────────────────────────

    pub fn hash(&self) -> &str {
        self.get(LogOption::Hash).unwrap_or("")
    }

    pub fn tree_hash(&self) -> Option<&str> {
        self.get(LogOption::TreeHash)
    }

    pub fn parent_hashes(&self) -> Vec<&str> {
        self.get(LogOption::Parents)
            .map(|p| p.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn author_name(&self) -> &str {
        self.get(LogOption::AuthorName).unwrap_or("")
    }

    pub fn author_email(&self) -> &str {
        self.get(LogOption::AuthorEmail).unwrap_or("")
    }

    pub fn committer_name(&self) -> &str {
        self.get(LogOption::CommitterName).unwrap_or("")
    }

    pub fn committer_email(&self) -> &str {
        self.get(LogOption::CommitterEmail).unwrap_or("")
    }

    /// Author timestamp in seconds since the epoch.
    pub fn author_time(&self) -> Option<i64> {
        self.get(LogOption::AuthorTime)?.trim().parse().ok()
    }

    /// Committer timestamp in seconds since the epoch.
    pub fn commit_time(&self) -> Option<i64> {
        self.get(LogOption::CommitTime)?.trim().parse().ok()
    }

    pub fn subject(&self) -> &str {
        self.get(LogOption::Subject).unwrap_or("")
    }

    pub fn body(&self) -> &str {
        self.get(LogOption::Body).unwrap_or("")
    }

    /// Full commit message: raw body when requested, else subject + body.
    pub fn full_message(&self) -> String {
        if let Some(raw) = self.get(LogOption::RawBody) {
            return raw.trim_end().to_string();
        }
        let body = self.body().trim();
        if body.is_empty() {
            self.subject().trim_end().to_string()
        } else {
            format!("{}\n\n{}", self.subject().trim_end(), body)
        }
    }

    /// Ref names from the `%d` decoration.
    pub fn refs(&self) -> Vec<String> {
        self.get(LogOption::RefNames)
            .map(parse_ref_names)
            .unwrap_or_default()
    }
}

// ─── Decoration and path helpers ────────────────────────────────────

/// Parse a `%d` decoration such as ` (HEAD -> main, tag: v1.0, origin/main)`.
///
/// `HEAD -> main` yields both `HEAD` and `main`.
pub fn parse_ref_names(decoration: &str) -> Vec<String> {
    let trimmed = decoration.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(trimmed);

    let mut refs = Vec::new();
    for item in inner.split(", ") {
        for name in item.split(" -> ") {
            let name = name.trim();
            if !name.is_empty() {
                refs.push(name.to_string());
            }
        }
    }
    refs
}

/// Decode a path as printed by git.
///
/// Paths with unusual characters are wrapped in double quotes with C-style
/// escapes and octal bytes (`"caf\303\251.txt"`). Unquoted paths are
/// returned unchanged.
pub fn unescape_path(path: &str) -> Result<String, String> {
    let Some(inner) = path.strip_prefix('"').and_then(|s| s.strip_suffix('"')) else {
        return Ok(path.to_string());
    };

    let mut bytes: Vec<u8> = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        let escaped = chars
            .next()
            .ok_or_else(|| format!("Dangling escape in path {}", path))?;
        match escaped {
            '\\' => bytes.push(b'\\'),
            '"' => bytes.push(b'"'),
            't' => bytes.push(b'\t'),
            'n' => bytes.push(b'\n'),
            'r' => bytes.push(b'\r'),
            'a' => bytes.push(0x07),
            'b' => bytes.push(0x08),
            'f' => bytes.push(0x0c),
            'v' => bytes.push(0x0b),
            '0'..='3' => {
                let mut value = escaped as u32 - '0' as u32;
                for _ in 0..2 {
                    let digit = chars
                        .next()
                        .and_then(|d| d.to_digit(8))
                        .ok_or_else(|| format!("Bad octal escape in path {}", path))?;
                    value = value * 8 + digit;
                }
                bytes.push(value as u8);
            }
            other => return Err(format!("Unknown escape '\\{}' in path {}", other, path)),
        }
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// ─── Commit details ─────────────────────────────────────────────────

/// Name + email pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Person {
    pub name: String,
    pub email: String,
}

/// One commit assembled from its batch of records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommitDetails {
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree: Option<String>,
    pub parents: Vec<String>,
    pub author: Person,
    pub committer: Person,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_time: Option<i64>,
    pub subject: String,
    pub message: String,
    pub refs: Vec<String>,
    /// Changes against each parent, in parent order.
    pub changes: Vec<Vec<PathChange>>,
}

impl CommitDetails {
    /// Build from all records of one commit. `None` for an empty batch.
    pub fn from_batch(batch: &[LogRecord]) -> Option<Self> {
        let first = batch.first()?;
        Some(Self {
            hash: first.hash().to_string(),
            tree: first.tree_hash().map(str::to_string),
            parents: first.parent_hashes().into_iter().map(str::to_string).collect(),
            author: Person {
                name: first.author_name().to_string(),
                email: first.author_email().to_string(),
            },
            committer: Person {
                name: first.committer_name().to_string(),
                email: first.committer_email().to_string(),
            },
            author_time: first.author_time(),
            commit_time: first.commit_time(),
            subject: first.subject().to_string(),
            message: first.full_message(),
            refs: first.refs(),
            changes: batch.iter().map(|r| r.changes().to_vec()).collect(),
        })
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
