// noveldup - core/blocking.rs
//
// Blocking service (§4.2). Partitions parsed files into small candidate
// buckets so the relation detector only ever compares files that share an
// extension, a normalized title, a range start, and a counting unit --
// without this, pairwise detection would be quadratic in the whole scan.

use crate::core::model::{BlockKey, BlockingGroup, FileDescriptor, FilenameParseResult};
use std::collections::HashMap;

/// Partition `(descriptor, parse_result)` pairs into [`BlockingGroup`]s.
///
/// Steps (§4.2): drop parses below `confidence_threshold`, partition by
/// `(extension, series_title_norm)`, sub-partition by range start, then by
/// counting unit, and emit one group per leaf partition with >= 2 members.
/// Input order does not affect the output: leaf groups are emitted sorted
/// by key so downstream stages see a stable iteration order.
pub fn build_blocks(entries: &[(FileDescriptor, FilenameParseResult)], confidence_threshold: f64) -> Vec<BlockingGroup> {
    let mut buckets: HashMap<BlockKey, Vec<u64>> = HashMap::new();

    for (descriptor, parsed) in entries {
        if parsed.confidence < confidence_threshold {
            continue;
        }
        let Some(start) = parsed.blocking_start() else {
            continue;
        };
        let key = BlockKey {
            extension: descriptor.extension.clone(),
            series_title_norm: parsed.series_title_norm.clone(),
            range_start: start,
            range_unit: parsed.blocking_unit(),
        };
        buckets.entry(key).or_default().push(descriptor.file_id);
    }

    let mut groups: Vec<BlockingGroup> = buckets
        .into_iter()
        .filter(|(_, members)| members.len() >= 2)
        .map(|(key, mut member_ids)| {
            member_ids.sort_unstable();
            BlockingGroup { key, member_ids }
        })
        .collect();

    groups.sort_by(|a, b| a.key.cmp(&b.key));

    tracing::debug!(block_count = groups.len(), "Blocking complete");
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::parse_filename;
    use crate::util::constants::MIN_CONFIDENCE_FOR_BLOCKING;
    use chrono::Utc;
    use std::path::PathBuf;

    fn descriptor(file_id: u64, name: &str) -> FileDescriptor {
        FileDescriptor {
            file_id,
            path: PathBuf::from(format!("/data/{name}")),
            name: name.to_string(),
            extension: ".txt".to_string(),
            size: 100_000,
            mtime: Utc::now(),
        }
    }

    fn parsed_pair(file_id: u64, name: &str) -> (FileDescriptor, FilenameParseResult) {
        let d = descriptor(file_id, name);
        let p = parse_filename(&d.path, &d.name);
        (d, p)
    }

    #[test]
    fn groups_same_title_and_start() {
        let entries = vec![
            parsed_pair(1, "Work A 1-114.txt"),
            parsed_pair(2, "Work A 1-158.txt"),
        ];
        let groups = build_blocks(&entries, MIN_CONFIDENCE_FOR_BLOCKING);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].member_ids, vec![1, 2]);
    }

    #[test]
    fn different_range_start_does_not_block_together() {
        let entries = vec![
            parsed_pair(1, "Work B 1권.txt"),
            parsed_pair(2, "Work B 2권.txt"),
        ];
        let groups = build_blocks(&entries, MIN_CONFIDENCE_FOR_BLOCKING);
        assert!(groups.is_empty());
    }

    #[test]
    fn different_unit_does_not_block_together() {
        let entries = vec![
            parsed_pair(1, "Work G 1-10화.txt"),
            parsed_pair(2, "Work G 1-10권.txt"),
        ];
        let groups = build_blocks(&entries, MIN_CONFIDENCE_FOR_BLOCKING);
        assert!(groups.is_empty());
    }

    #[test]
    fn low_confidence_parses_excluded() {
        let entries = vec![
            parsed_pair(1, "totally_unparseable_name_one"),
            parsed_pair(2, "totally_unparseable_name_two"),
        ];
        let groups = build_blocks(&entries, MIN_CONFIDENCE_FOR_BLOCKING);
        assert!(groups.is_empty());
    }

    #[test]
    fn singleton_blocks_are_dropped() {
        let entries = vec![parsed_pair(1, "Work A 1-114.txt")];
        let groups = build_blocks(&entries, MIN_CONFIDENCE_FOR_BLOCKING);
        assert!(groups.is_empty());
    }

    #[test]
    fn named_segment_only_files_still_block_together() {
        let entries = vec![
            parsed_pair(1, "Work C 본편 1-1213 외전 1-71.txt"),
            parsed_pair(2, "Work C 본편 1-1000.txt"),
        ];
        let groups = build_blocks(&entries, MIN_CONFIDENCE_FOR_BLOCKING);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].member_ids, vec![1, 2]);
    }
}
