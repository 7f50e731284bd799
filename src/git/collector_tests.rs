//! Unit tests for batch collection and incomplete-merge repair.
//!
//! Tree hashes come from an in-memory source, no git repository required.

use super::*;
use crate::git::option::LogOption;
use crate::git::record::{ChangeType, PathChange};

// ─── Test helpers ───────────────────────────────────────────────────

/// Tree lookup that records every query and can be told to fail.
#[derive(Default)]
struct FakeTrees {
    trees: HashMap<String, String>,
    queries: Vec<Vec<String>>,
    fail: bool,
}

impl FakeTrees {
    fn with(pairs: &[(&str, &str)]) -> Self {
        Self {
            trees: pairs.iter().map(|(h, t)| (h.to_string(), t.to_string())).collect(),
            ..Default::default()
        }
    }
}

impl TreeHashSource for FakeTrees {
    fn tree_hashes(&mut self, hashes: &[String]) -> Result<HashMap<String, String>, GitLogError> {
        self.queries.push(hashes.to_vec());
        if self.fail {
            return Err(GitLogError::CommandFailed {
                command: "git log --no-walk --stdin".to_string(),
                exit_code: 128,
                stderr: "fatal: bad object".to_string(),
            });
        }
        self.trees.tree_hashes(hashes)
    }
}

fn record(hash: &str, parents: &[&str], paths: &[&str]) -> LogRecord {
    let mut record = LogRecord::from_values(
        &[LogOption::Hash, LogOption::Parents, LogOption::Subject],
        vec![hash.to_string(), parents.join(" "), format!("commit {}", hash)],
    );
    for path in paths {
        record.push_change(PathChange {
            change_type: ChangeType::Modified,
            first_path: path.to_string(),
            second_path: None,
        });
    }
    record
}

fn collect_ordered(
    trees: &mut FakeTrees,
    records: Vec<LogRecord>,
) -> (Vec<Vec<LogRecord>>, CollectorStats) {
    let mut batches = Vec::new();
    let mut collector = RecordCollector::new(trees, |batch| batches.push(batch));
    for r in records {
        collector.consume(r);
    }
    let stats = collector.finish();
    (batches, stats)
}

fn hashes(batch: &[LogRecord]) -> Vec<&str> {
    batch.iter().map(|r| r.hash()).collect()
}

// ─── Ordered collector ──────────────────────────────────────────────

#[test]
fn test_linear_history_emits_one_batch_per_commit() {
    let mut trees = FakeTrees::default();
    let (batches, stats) = collect_ordered(
        &mut trees,
        vec![
            record("c3", &["c2"], &["a"]),
            record("c2", &["c1"], &["b"]),
            record("c1", &[], &["a", "b"]),
        ],
    );

    assert_eq!(batches.len(), 3);
    assert!(batches.iter().all(|b| b.len() == 1));
    assert_eq!(stats, CollectorStats { batches: 3, incomplete: 0, synthesized: 0 });
    assert!(trees.queries.is_empty(), "no repair query for complete history");
}

#[test]
fn test_complete_merge_is_emitted_immediately_in_order() {
    let mut trees = FakeTrees::default();
    let (batches, _) = collect_ordered(
        &mut trees,
        vec![
            record("m", &["p1", "p2"], &["x"]),
            record("m", &["p1", "p2"], &["y"]),
            record("p1", &[], &["x"]),
        ],
    );
    assert_eq!(batches.len(), 2);
    assert_eq!(hashes(&batches[0]), vec!["m", "m"]);
    assert_eq!(batches[0][1].changes()[0].first_path, "y");
    assert_eq!(hashes(&batches[1]), vec!["p1"]);
}

#[test]
fn test_incomplete_merge_is_repaired_with_empty_record() {
    // p2 has the same tree as the merge, so git printed only the p1 diff.
    let mut trees = FakeTrees::with(&[("m", "T-merge"), ("p1", "T-one"), ("p2", "T-merge")]);
    let (batches, stats) = collect_ordered(
        &mut trees,
        vec![record("m", &["p1", "p2"], &["changed.txt"]), record("p1", &[], &["a"])],
    );

    assert_eq!(batches.len(), 2);
    // Complete batches come first, repaired ones in the second pass.
    assert_eq!(hashes(&batches[0]), vec!["p1"]);
    let merge = &batches[1];
    assert_eq!(merge.len(), 2);
    assert_eq!(merge[0].path_count(), 1);
    assert_eq!(merge[1].path_count(), 0);
    assert_eq!(merge[1].hash(), "m");
    assert_eq!(merge[1].subject(), "commit m");

    assert_eq!(stats, CollectorStats { batches: 2, incomplete: 1, synthesized: 1 });
    assert_eq!(trees.queries.len(), 1);
    assert_eq!(trees.queries[0], vec!["m", "p1", "p2"]);
}

#[test]
fn test_repair_inserts_at_parent_index() {
    // First parent is tree-identical: the empty record goes in front.
    let mut trees = FakeTrees::with(&[("m", "T"), ("p1", "T"), ("p2", "other")]);
    let (batches, _) = collect_ordered(&mut trees, vec![record("m", &["p1", "p2"], &["f"])]);
    assert_eq!(batches[0].len(), 2);
    assert_eq!(batches[0][0].path_count(), 0);
    assert_eq!(batches[0][1].path_count(), 1);
}

#[test]
fn test_repair_two_identical_parents_of_octopus_merge() {
    let mut trees = FakeTrees::with(&[("m", "T"), ("p1", "T"), ("p2", "x"), ("p3", "T")]);
    let (batches, stats) =
        collect_ordered(&mut trees, vec![record("m", &["p1", "p2", "p3"], &["only-vs-p2"])]);

    let merge = &batches[0];
    assert_eq!(merge.len(), 3);
    assert_eq!(merge[0].path_count(), 0);
    assert_eq!(merge[1].path_count(), 1, "real record stays at the p2 slot");
    assert_eq!(merge[2].path_count(), 0);
    assert_eq!(stats.synthesized, 2);
}

#[test]
fn test_non_contiguous_hash_is_not_merged() {
    let mut trees = FakeTrees::default();
    let (batches, stats) = collect_ordered(
        &mut trees,
        vec![
            record("a", &["p1", "p2"], &["first"]),
            record("b", &["p1"], &["b"]),
            record("a", &["p1", "p2"], &["second"]),
        ],
    );

    assert_eq!(batches.len(), 3);
    assert_eq!(hashes(&batches[0]), vec!["b"]);
    assert_eq!(hashes(&batches[1]), vec!["a"]);
    assert_eq!(hashes(&batches[2]), vec!["a"]);
    assert_eq!(batches[1][0].changes()[0].first_path, "first");
    assert_eq!(batches[2][0].changes()[0].first_path, "second");
    assert_eq!(stats.incomplete, 2);
    assert_eq!(trees.queries.len(), 1, "one query covers all incomplete batches");
}

#[test]
fn test_failed_repair_query_emits_batch_unrepaired() {
    let mut trees = FakeTrees::with(&[("m", "T"), ("p2", "T")]);
    trees.fail = true;
    let (batches, stats) = collect_ordered(&mut trees, vec![record("m", &["p1", "p2"], &["f"])]);

    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 1);
    assert_eq!(stats.synthesized, 0);
}

#[test]
fn test_missing_commit_tree_leaves_batch_unrepaired() {
    let mut trees = FakeTrees::with(&[("p1", "T"), ("p2", "T")]);
    let (batches, _) = collect_ordered(&mut trees, vec![record("m", &["p1", "p2"], &["f"])]);
    assert_eq!(batches[0].len(), 1);
}

#[test]
fn test_no_batch_is_emitted_twice() {
    let mut trees = FakeTrees::with(&[("m", "T"), ("p1", "x"), ("p2", "T")]);
    let (batches, stats) = collect_ordered(
        &mut trees,
        vec![
            record("m", &["p1", "p2"], &["f"]),
            record("p2", &["p0"], &["g"]),
            record("p1", &["p0"], &["h"]),
            record("p0", &[], &["i"]),
        ],
    );
    let mut seen: Vec<&str> = batches.iter().map(|b| b[0].hash()).collect();
    seen.sort();
    assert_eq!(seen, vec!["m", "p0", "p1", "p2"]);
    assert_eq!(stats.batches, 4);
}

// ─── fill_with_empty_records ────────────────────────────────────────

#[test]
fn test_fill_stops_when_batch_is_complete() {
    // Both parents match, but only one record is missing.
    let trees: HashMap<String, String> = [("m", "T"), ("p1", "T"), ("p2", "T")]
        .iter()
        .map(|(h, t)| (h.to_string(), t.to_string()))
        .collect();
    let mut batch = vec![record("m", &["p1", "p2"], &["f"])];
    assert_eq!(fill_with_empty_records(&mut batch, &trees), 1);
    assert_eq!(batch.len(), 2);
}

#[test]
fn test_hashmap_tree_source_filters_unknown() {
    let mut source: HashMap<String, String> =
        [("a".to_string(), "ta".to_string())].into_iter().collect();
    let result = source
        .tree_hashes(&["a".to_string(), "zzz".to_string()])
        .unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result["a"], "ta");
}

// ─── Unordered collector ────────────────────────────────────────────

#[test]
fn test_unordered_merges_interleaved_records() {
    let mut trees = FakeTrees::default();
    let mut batches = Vec::new();
    let mut collector = UnorderedRecordCollector::new(&mut trees, |b| batches.push(b));
    collector.consume(record("m", &["p1", "p2"], &["x"]));
    collector.consume(record("p1", &[], &["a"]));
    collector.consume(record("m", &["p1", "p2"], &["y"]));
    let stats = collector.finish();

    assert_eq!(batches.len(), 2);
    assert_eq!(hashes(&batches[0]), vec!["p1"]);
    assert_eq!(hashes(&batches[1]), vec!["m", "m"]);
    assert_eq!(stats.incomplete, 0);
    assert!(trees.queries.is_empty());
}

#[test]
fn test_unordered_repairs_at_finish_in_arrival_order() {
    let mut trees = FakeTrees::with(&[("m1", "T1"), ("a", "T1"), ("m2", "T2"), ("c", "T2")]);
    let mut batches = Vec::new();
    let mut collector = UnorderedRecordCollector::new(&mut trees, |b| batches.push(b));
    collector.consume(record("m1", &["a", "b"], &["x"]));
    collector.consume(record("m2", &["c", "d"], &["y"]));
    let stats = collector.finish();

    assert_eq!(hashes(&batches[0]), vec!["m1", "m1"]);
    assert_eq!(batches[0][0].path_count(), 0);
    assert_eq!(hashes(&batches[1]), vec!["m2", "m2"]);
    assert_eq!(stats.synthesized, 2);
    assert_eq!(trees.queries.len(), 1);
}

#[test]
fn test_unordered_path_limit_forces_early_repair() {
    let mut trees = FakeTrees::with(&[("m", "T"), ("p2", "T")]);
    let mut batches = Vec::new();
    {
        let mut collector =
            UnorderedRecordCollector::new(&mut trees, |b| batches.push(b)).with_path_limit(2);
        collector.consume(record("m", &["p1", "p2"], &["1", "2", "3"]));
        collector.finish();
    }
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 2);
}

#[test]
fn test_unordered_path_limit_flushes_before_stream_end() {
    let mut trees = FakeTrees::default();
    let mut emitted_before_finish = 0;
    let mut batches = Vec::new();
    {
        let mut collector =
            UnorderedRecordCollector::new(&mut trees, |b| batches.push(b)).with_path_limit(3);
        collector.consume(record("m1", &["p1", "p2"], &["1", "2"]));
        collector.consume(record("m2", &["p3", "p4"], &["3", "4"]));
        emitted_before_finish += collector.sink.stats.batches;
        collector.finish();
    }
    assert_eq!(emitted_before_finish, 2, "limit exceeded on the second record");
    assert_eq!(batches.len(), 2);
}
