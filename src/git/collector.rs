//! Groups parsed records into per-commit batches.
//!
//! `git log -m` prints a merge commit once per parent, but skips a parent
//! entirely when the merge result is tree-identical to it. A batch is
//! complete once it holds one record per parent. Batches that stay short
//! are repaired after the stream ends: one extra query fetches tree hashes
//! for the commits and their parents, and an empty record is inserted at
//! the index of every parent whose tree equals the commit's tree.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::GitLogError;

use super::record::LogRecord;

// ─── Constants ──────────────────────────────────────────────────────

/// Buffered path changes above which the unordered collector repairs
/// and emits everything it holds.
pub const DEFAULT_PATH_LIMIT: usize = 200_000;

// ─── Tree hash lookup ───────────────────────────────────────────────

/// Answers "what tree does each of these commits point to?".
pub trait TreeHashSource {
    /// Returns a hash → tree map. Unknown hashes may be missing.
    fn tree_hashes(&mut self, hashes: &[String]) -> Result<HashMap<String, String>, GitLogError>;
}

impl TreeHashSource for HashMap<String, String> {
    fn tree_hashes(&mut self, hashes: &[String]) -> Result<HashMap<String, String>, GitLogError> {
        Ok(hashes
            .iter()
            .filter_map(|h| self.get(h).map(|t| (h.clone(), t.clone())))
            .collect())
    }
}

impl<T: TreeHashSource + ?Sized> TreeHashSource for &mut T {
    fn tree_hashes(&mut self, hashes: &[String]) -> Result<HashMap<String, String>, GitLogError> {
        (**self).tree_hashes(hashes)
    }
}

// ─── Stats ──────────────────────────────────────────────────────────

/// Counters reported when a collector finishes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollectorStats {
    /// Batches handed to the consumer.
    pub batches: usize,
    /// Batches that were short when their hash stopped arriving.
    pub incomplete: usize,
    /// Empty records inserted by the repair pass.
    pub synthesized: usize,
}

// ─── Shared emit/repair logic ───────────────────────────────────────

struct BatchSink<S, F> {
    source: S,
    consumer: F,
    stats: CollectorStats,
}

impl<S, F> BatchSink<S, F>
where
    S: TreeHashSource,
    F: FnMut(Vec<LogRecord>),
{
    fn emit(&mut self, batch: Vec<LogRecord>) {
        self.stats.batches += 1;
        (self.consumer)(batch);
    }

    /// One tree-hash query for all batches, then emit each of them.
    ///
    /// A failed query leaves the batches as they are.
    fn repair_and_emit(&mut self, batches: Vec<Vec<LogRecord>>) {
        if batches.is_empty() {
            return;
        }

        let mut seen = HashSet::new();
        let mut hashes = Vec::new();
        for batch in &batches {
            let first = &batch[0];
            for hash in std::iter::once(first.hash()).chain(first.parent_hashes()) {
                if seen.insert(hash.to_string()) {
                    hashes.push(hash.to_string());
                }
            }
        }

        debug!(
            commits = batches.len(),
            hashes = hashes.len(),
            "Resolving tree hashes for incomplete merge records"
        );

        match self.source.tree_hashes(&hashes) {
            Ok(trees) => {
                for mut batch in batches {
                    self.stats.synthesized += fill_with_empty_records(&mut batch, &trees);
                    self.emit(batch);
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to resolve tree hashes, emitting merge records unrepaired");
                for batch in batches {
                    self.emit(batch);
                }
            }
        }
    }
}

/// A batch is complete once it has a record per parent. Root commits and
/// records without parent information are complete on arrival.
fn is_complete(batch: &[LogRecord]) -> bool {
    let parents = batch.first().map(|r| r.parent_hashes().len()).unwrap_or(0);
    parents == 0 || batch.len() >= parents
}

/// Insert an empty record for each parent whose tree equals the commit's.
///
/// Parents are visited in index order and each match is inserted at its
/// parent index, so several tree-identical parents land in the right slots.
/// Returns the number of records inserted.
pub(crate) fn fill_with_empty_records(
    batch: &mut Vec<LogRecord>,
    trees: &HashMap<String, String>,
) -> usize {
    let Some(first) = batch.first() else {
        return 0;
    };
    let Some(commit_tree) = trees.get(first.hash()) else {
        debug!(hash = first.hash(), "No tree hash for commit, leaving batch unrepaired");
        return 0;
    };
    let parents: Vec<String> = first.parent_hashes().into_iter().map(str::to_string).collect();
    let template = first.empty_copy();

    let mut inserted = 0;
    for (index, parent) in parents.iter().enumerate() {
        if batch.len() >= parents.len() {
            break;
        }
        if trees.get(parent) == Some(commit_tree) {
            batch.insert(index.min(batch.len()), template.clone());
            inserted += 1;
        }
    }

    if batch.len() != parents.len() {
        debug!(
            hash = template.hash(),
            records = batch.len(),
            parents = parents.len(),
            "Merge batch still incomplete after repair"
        );
    }
    inserted
}

// ─── Ordered collector ──────────────────────────────────────────────

/// Collector for output where all records of a commit are adjacent,
/// which is what `git log -m` prints.
///
/// A change of hash closes the previous commit for good: a later record
/// with the same hash starts a new batch.
pub struct RecordCollector<S, F> {
    sink: BatchSink<S, F>,
    current: Vec<LogRecord>,
    incomplete: Vec<Vec<LogRecord>>,
}

impl<S, F> RecordCollector<S, F>
where
    S: TreeHashSource,
    F: FnMut(Vec<LogRecord>),
{
    pub fn new(source: S, consumer: F) -> Self {
        Self {
            sink: BatchSink {
                source,
                consumer,
                stats: CollectorStats::default(),
            },
            current: Vec::new(),
            incomplete: Vec::new(),
        }
    }

    pub fn consume(&mut self, record: LogRecord) {
        let same_commit = self
            .current
            .first()
            .is_some_and(|r| r.hash() == record.hash());
        if !same_commit {
            self.flush_current();
        }

        self.current.push(record);
        if is_complete(&self.current) {
            let batch = std::mem::take(&mut self.current);
            self.sink.emit(batch);
        }
    }

    /// Flush, repair short batches and emit them.
    pub fn finish(mut self) -> CollectorStats {
        self.flush_current();
        let incomplete = std::mem::take(&mut self.incomplete);
        self.sink.repair_and_emit(incomplete);
        self.sink.stats
    }

    fn flush_current(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.current);
        if is_complete(&batch) {
            self.sink.emit(batch);
        } else {
            self.sink.stats.incomplete += 1;
            self.incomplete.push(batch);
        }
    }
}

// ─── Unordered collector ────────────────────────────────────────────

/// Collector for output where records of one commit may be interleaved
/// with other commits (e.g. `--date-order` combined with `-m`).
///
/// Buffers by hash across the whole stream. To bound memory, once more
/// than `path_limit` path changes are buffered every pending batch is
/// repaired and emitted.
pub struct UnorderedRecordCollector<S, F> {
    sink: BatchSink<S, F>,
    /// hash → (arrival sequence, records)
    buffered: HashMap<String, (u64, Vec<LogRecord>)>,
    next_seq: u64,
    path_count: usize,
    path_limit: usize,
}

impl<S, F> UnorderedRecordCollector<S, F>
where
    S: TreeHashSource,
    F: FnMut(Vec<LogRecord>),
{
    pub fn new(source: S, consumer: F) -> Self {
        Self {
            sink: BatchSink {
                source,
                consumer,
                stats: CollectorStats::default(),
            },
            buffered: HashMap::new(),
            next_seq: 0,
            path_count: 0,
            path_limit: DEFAULT_PATH_LIMIT,
        }
    }

    pub fn with_path_limit(mut self, path_limit: usize) -> Self {
        self.path_limit = path_limit;
        self
    }

    pub fn consume(&mut self, record: LogRecord) {
        let hash = record.hash().to_string();
        self.path_count += record.path_count();

        let next_seq = &mut self.next_seq;
        let (_, batch) = self.buffered.entry(hash.clone()).or_insert_with(|| {
            *next_seq += 1;
            (*next_seq, Vec::new())
        });
        batch.push(record);

        if is_complete(batch) {
            if let Some((_, batch)) = self.buffered.remove(&hash) {
                self.path_count -= batch.iter().map(LogRecord::path_count).sum::<usize>();
                self.sink.emit(batch);
            }
        } else if self.path_count > self.path_limit {
            debug!(
                paths = self.path_count,
                commits = self.buffered.len(),
                "Path limit reached, repairing buffered merge records"
            );
            self.flush_all();
        }
    }

    pub fn finish(mut self) -> CollectorStats {
        self.flush_all();
        self.sink.stats
    }

    fn flush_all(&mut self) {
        let mut pending: Vec<(u64, Vec<LogRecord>)> = self.buffered.drain().map(|(_, v)| v).collect();
        pending.sort_by_key(|(seq, _)| *seq);
        self.path_count = 0;

        self.sink.stats.incomplete += pending.len();
        let batches = pending.into_iter().map(|(_, batch)| batch).collect();
        self.sink.repair_and_emit(batches);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "collector_tests.rs"]
mod tests;
