//! # gitlog: streaming `git log` reader
//!
//! Runs `git log` with a custom pretty format whose records are framed by
//! control-character delimiters, parses the output line by line and groups
//! the records into per-commit batches. Merge commits that `git log -m`
//! printed short (tree-identical parents are skipped by git) are repaired
//! with a single extra tree-hash query.
//!
//! ## Library usage
//!
//! ```no_run
//! use gitlog::{GitRepo, LogRequest, ParserSession};
//!
//! let repo = GitRepo::new(".");
//! let mut session = ParserSession::new();
//! repo.read_batches(&LogRequest::full_details(), &mut session, |batch| {
//!     println!("{} ({} parents)", batch[0].hash(), batch.len());
//! })?;
//! # Ok::<(), gitlog::GitLogError>(())
//! ```

pub mod error;
pub mod git;

pub use error::GitLogError;
pub use git::collector::{CollectorStats, RecordCollector, TreeHashSource, UnorderedRecordCollector};
pub use git::format::{Delimiters, ParserSession};
pub use git::option::LogOption;
pub use git::parser::{DropReason, DroppedRecord, LogParser, ParseStats, ParsedRecord, Records};
pub use git::record::{ChangeType, CommitDetails, LogRecord, PathChange};
pub use git::{GitRepo, LogRequest, ReadSummary};

// ─── Stable hashing ─────────────────────────────────────────────────

/// Stable FNV-1a hash (deterministic across Rust versions, unlike `DefaultHasher`).
///
/// Accepts multiple byte slices that are fed into the hash sequentially.
#[must_use]
pub fn stable_hash(parts: &[&[u8]]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;
    let mut hash = FNV_OFFSET;
    for part in parts {
        for &byte in *part {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_stable_hash_is_deterministic() {
        assert_eq!(stable_hash(&[b"record-start"]), stable_hash(&[b"record-start"]));
    }

    #[test]
    fn test_stable_hash_parts_concatenate() {
        assert_eq!(stable_hash(&[b"ab", b"c"]), stable_hash(&[b"abc"]));
        assert_ne!(stable_hash(&[b"abc"]), stable_hash(&[b"abd"]));
    }

    #[test]
    fn test_stable_hash_empty_is_offset_basis() {
        assert_eq!(stable_hash(&[]), 0xcbf2_9ce4_8422_2325);
    }
}

// ─── Property-based tests (proptest) ─────────────────────────────────
