// Integration tests for `noveldup::core::analyze`. Exercises the full
// pipeline end-to-end against real temp-file fixtures, rather than any one
// stage in isolation.

use chrono::{DateTime, TimeZone, Utc};
use noveldup::core::{analyze, cancel::CancellationToken, model::*, reader::*};
use std::io::Write;
use tempfile::NamedTempFile;

struct Fixture {
    _files: Vec<NamedTempFile>,
    descriptors: Vec<FileDescriptor>,
}

fn fixture(entries: Vec<(u64, &str, Vec<u8>, i64)>) -> Fixture {
    let mut files = Vec::new();
    let mut descriptors = Vec::new();
    for (file_id, name, content, mtime_secs) in entries {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(&content).unwrap();
        descriptors.push(FileDescriptor {
            file_id,
            path: f.path().to_path_buf(),
            name: name.to_string(),
            extension: ".txt".to_string(),
            size: content.len() as u64,
            mtime: mtime(mtime_secs),
        });
        files.push(f);
    }
    Fixture {
        _files: files,
        descriptors,
    }
}

fn mtime(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn run(descriptors: Vec<FileDescriptor>, options: EngineOptions) -> Vec<DuplicateGroup> {
    let reader = StdFileReader;
    analyze(
        descriptors,
        options,
        &CancellationToken::new(),
        &reader,
        &NoEncodingHint,
        &AlwaysText,
        None,
    )
    .unwrap()
}

// Scenario 3: multi-segment overlap via a shared Named(본편) segment, no
// unnamed Primary on either side.
#[test]
fn multi_segment_overlap_detected_as_containment() {
    let fixture = fixture(vec![
        (
            1,
            "Work C 본편 1-1213 외전 1-71.txt",
            [b"a".repeat(9_000_000), b"b".repeat(1_000_000)].concat(),
            1005,
        ),
        (2, "Work C 본편 1-1000.txt", b"a".repeat(8_000_000), 1000),
    ]);

    let groups = run(fixture.descriptors, EngineOptions::default());
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].file_ids, vec![1, 2]);
    assert_eq!(groups[0].duplicate_type, DuplicateType::Containment);
    assert_eq!(groups[0].recommended_keeper_id, 1);
}

// Scenario 4: version relation with a size shrink between range growth.
#[test]
fn version_with_size_shrink_flags_evidence() {
    let fixture = fixture(vec![
        (1, "Work D 1-100.txt", vec![0u8; 5_000_000], 1000),
        (2, "Work D 1-120.txt", vec![1u8; 4_800_000], 1001),
    ]);

    let groups = run(fixture.descriptors, EngineOptions::default());
    assert_eq!(groups.len(), 1);
    let group = &groups[0];
    assert_eq!(group.file_ids, vec![1, 2]);
    assert_eq!(group.duplicate_type, DuplicateType::Version);
    assert_eq!(group.recommended_keeper_id, 2);
    assert!((group.confidence - 0.70).abs() < 1e-9);
    assert!(group.evidence.get("merged_evidence").unwrap().contains("shrink_warning"));
}

// Scenario 5: low-confidence, unrelated-looking filenames with identical
// content. Suppressed by blocking unless the caller opts into exact mode.
#[test]
fn parse_failure_grouping_suppressed_unless_exact_enabled() {
    let content = b"identical payload shared across two garbage-named files\n".repeat(2000);

    let fixture = fixture(vec![
        (1, "alpha_random_dump", content.clone(), 1000),
        (2, "beta_random_dump", content.clone(), 1001),
    ]);
    let descriptors = fixture.descriptors;

    let without_exact = run(
        descriptors.clone(),
        EngineOptions {
            enable_exact: false,
            ..EngineOptions::default()
        },
    );
    assert!(without_exact.is_empty());

    let with_exact = run(
        descriptors,
        EngineOptions {
            enable_exact: true,
            ..EngineOptions::default()
        },
    );
    assert_eq!(with_exact.len(), 1);
    assert_eq!(with_exact[0].duplicate_type, DuplicateType::Exact);
    assert_eq!(with_exact[0].file_ids, vec![1, 2]);
    assert!((with_exact[0].confidence - 1.0).abs() < 1e-9);
}

// Scenario 6: three files of the same work chained by a Containment and a
// Version relation merge into a single group.
#[test]
fn chained_relations_merge_into_one_group() {
    let content_a = [b"x".repeat(3_000_000), b"y".repeat(1_000_000)].concat();
    let content_b = b"x".repeat(3_000_000);
    let content_c = b"z".repeat(1_500_000);

    let fixture = fixture(vec![
        (1, "Work H 1-300.txt", content_a, 3000),
        (2, "Work H 1-200.txt", content_b, 1000),
        (3, "Work H 1-250.txt", content_c, 2000),
    ]);

    let groups = run(fixture.descriptors, EngineOptions::default());
    assert_eq!(groups.len(), 1);
    let group = &groups[0];
    assert_eq!(group.file_ids, vec![1, 2, 3]);
    assert_eq!(group.duplicate_type, DuplicateType::Merged);
    assert_eq!(group.recommended_keeper_id, 1);
    assert!((group.confidence - 0.90).abs() < 1e-9);
}

// Boundary: completely unrelated files never collide.
#[test]
fn unrelated_files_produce_no_groups() {
    let fixture = fixture(vec![
        (1, "Totally Different Work 1-10.txt", vec![7u8; 50_000], 1000),
        (2, "Another Separate Series 1-10.txt", vec![9u8; 50_000], 1000),
    ]);
    let groups = run(fixture.descriptors, EngineOptions::default());
    assert!(groups.is_empty());
}

// Invariants: no file in more than one group, every keeper is a member, and
// results are stable across a second run with a shuffled input order.
#[test]
fn invariants_hold_across_a_mixed_batch_and_are_order_independent() {
    let content_a = [b"p".repeat(2_000_000), b"q".repeat(500_000)].concat();
    let content_b = b"p".repeat(2_000_000);

    let entries = vec![
        (1, "Mixed Work 1-400.txt", content_a, 1000),
        (2, "Mixed Work 1-300.txt", content_b, 999),
        (3, "Unrelated Work 1-5.txt", vec![3u8; 20_000], 1000),
    ];

    let fixture_forward = fixture(entries.clone());
    let forward = run(fixture_forward.descriptors, EngineOptions::default());

    let mut reversed_entries = entries;
    reversed_entries.reverse();
    let fixture_reversed = fixture(reversed_entries);
    let reversed = run(fixture_reversed.descriptors, EngineOptions::default());

    assert_eq!(forward.len(), reversed.len());
    for group in &forward {
        assert!(group.file_ids.len() >= 2);
        assert!(group.file_ids.contains(&group.recommended_keeper_id));
    }

    let mut seen = std::collections::HashSet::new();
    for group in &forward {
        for id in &group.file_ids {
            assert!(seen.insert(*id), "file {id} appeared in more than one group");
        }
    }

    assert_eq!(
        forward.iter().map(|g| g.file_ids.clone()).collect::<Vec<_>>(),
        reversed.iter().map(|g| g.file_ids.clone()).collect::<Vec<_>>()
    );
}

// Idempotence: running the same input twice yields structurally identical
// output.
#[test]
fn running_analyze_twice_is_idempotent() {
    let content_a = [b"m".repeat(1_200_000), b"n".repeat(300_000)].concat();
    let content_b = b"m".repeat(1_200_000);
    let entries = vec![
        (1, "Repeat Work 1-80.txt", content_a, 1000),
        (2, "Repeat Work 1-60.txt", content_b, 999),
    ];

    let first = run(fixture(entries.clone()).descriptors, EngineOptions::default());
    let second = run(fixture(entries).descriptors, EngineOptions::default());

    assert_eq!(first.len(), second.len());
    assert_eq!(first[0].file_ids, second[0].file_ids);
    assert_eq!(first[0].recommended_keeper_id, second[0].recommended_keeper_id);
    assert_eq!(first[0].duplicate_type, second[0].duplicate_type);
}

// Cancellation requested before the call starts surfaces immediately.
#[test]
fn cancellation_is_observed_before_any_stage_runs() {
    let fixture = fixture(vec![(1, "Work Z 1-10.txt", vec![0u8; 20_000], 1000)]);
    let token = CancellationToken::new();
    token.cancel();

    let reader = StdFileReader;
    let result = analyze(
        fixture.descriptors,
        EngineOptions::default(),
        &token,
        &reader,
        &NoEncodingHint,
        &AlwaysText,
        None,
    );
    assert!(matches!(result, Err(noveldup::util::error::EngineError::Cancelled)));
}
