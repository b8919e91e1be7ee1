// noveldup - core/relation.rs
//
// Relation detector (§4.4). Within one blocking group, runs three checks
// per ordered pair (i < j) -- disjoint-range prefilter, containment,
// version -- emitting at most one relation per pair. Exact-duplicate
// detection is a separate, cross-cutting tiered-hash pass that ignores
// blocking entirely (§8 scenario 5: low-confidence titles can still match
// when the caller opts into exact detection).

use crate::core::fingerprint::Fingerprinter;
use crate::core::model::{
    AnchorSignature, BlockingGroup, Evidence, FileDescriptor, FilenameParseResult, PairwiseRelation, RangeSegment,
};
use crate::core::reader::FileReader;
use crate::util::constants::{
    CONFIDENCE_CONTAINMENT, CONFIDENCE_CONTAINMENT_COMPLETE, CONFIDENCE_VERSION_BASE, CONFIDENCE_VERSION_CORROBORATED,
    CONFIDENCE_VERSION_SHRINK,
};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

/// Per-file context the detector needs: its descriptor, its parse result,
/// and the encoding/text hints used to decide normalization.
pub struct FileContext<'a> {
    pub descriptor: &'a FileDescriptor,
    pub parsed: &'a FilenameParseResult,
    pub is_text: bool,
    pub encoding: Option<String>,
}

pub struct RelationDetector<'a> {
    fingerprinter: Fingerprinter<'a>,
    enable_containment: bool,
    enable_version: bool,
}

impl<'a> RelationDetector<'a> {
    pub fn new(reader: &'a dyn FileReader, enable_containment: bool, enable_version: bool) -> Self {
        Self {
            fingerprinter: Fingerprinter::new(reader),
            enable_containment,
            enable_version,
        }
    }

    /// Detect pairwise relations within one block. The fingerprint cache is
    /// scoped to this call (and therefore to this block), per §5.
    pub fn detect(&self, block: &BlockingGroup, files: &HashMap<u64, FileContext<'_>>) -> Vec<PairwiseRelation> {
        let mut members = block.member_ids.clone();
        members.sort_unstable();

        let mut cache: HashMap<u64, AnchorSignature> = HashMap::new();
        let mut relations = Vec::new();

        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                let a_id = members[i];
                let b_id = members[j];
                let (Some(a), Some(b)) = (files.get(&a_id), files.get(&b_id)) else {
                    continue;
                };

                let shared = shared_segment_pairs(a.parsed, b.parsed);
                if shared.is_empty() {
                    continue;
                }
                if !shared.iter().any(|(sa, sb)| ranges_overlap(sa, sb)) {
                    // Disjoint-range prefilter: consecutive volumes, not duplicates.
                    continue;
                }

                if self.enable_containment {
                    if let Some(rel) = self.try_containment(a, b, &shared, &mut cache) {
                        relations.push(rel);
                        continue;
                    }
                }

                if self.enable_version {
                    if let Some(rel) = try_version(a, b) {
                        relations.push(rel);
                    }
                }
            }
        }

        tracing::debug!(
            block = ?block.key,
            members = members.len(),
            relations = relations.len(),
            "Relation detection complete for block"
        );

        relations
    }

    fn try_containment(
        &self,
        a: &FileContext<'_>,
        b: &FileContext<'_>,
        shared: &[(&RangeSegment, &RangeSegment)],
        cache: &mut HashMap<u64, AnchorSignature>,
    ) -> Option<PairwiseRelation> {
        // Determine which side (if either) contains the other on some
        // shared segment kind. The file-level anchor hashes, not the
        // segment, corroborate candidate containment.
        let (container, contained, container_is_a) = shared.iter().find_map(|(sa, sb)| {
            if sa.contains(sb) {
                Some((a, b, true))
            } else if sb.contains(sa) {
                Some((b, a, false))
            } else {
                None
            }
        })?;

        if container.descriptor.size <= contained.descriptor.size {
            return None;
        }

        let container_sig = self.signature_for(container, cache).ok()?;
        let contained_sig = self.signature_for(contained, cache).ok()?;

        let head_matches = contained_sig.head_hash == container_sig.head_hash;
        let tail_matches = contained_sig.tail_hash == container_sig.tail_hash || contained_sig.tail_hash == container_sig.mid_hash;
        if !(head_matches && tail_matches) {
            return None;
        }

        let mut confidence = CONFIDENCE_CONTAINMENT;
        if container.parsed.is_complete && !contained.parsed.is_complete {
            confidence = CONFIDENCE_CONTAINMENT_COMPLETE;
        }

        let mut evidence: Evidence = BTreeMap::new();
        evidence.insert("check".to_string(), "containment".to_string());
        evidence.insert(
            "head_tail_corroborated".to_string(),
            "true".to_string(),
        );
        evidence.insert(
            "container_is_a".to_string(),
            container_is_a.to_string(),
        );

        Some(PairwiseRelation::Containment {
            container_id: container.descriptor.file_id,
            contained_id: contained.descriptor.file_id,
            evidence,
            confidence,
        })
    }

    fn signature_for(
        &self,
        file: &FileContext<'_>,
        cache: &mut HashMap<u64, AnchorSignature>,
    ) -> Result<AnchorSignature, crate::util::error::EngineError> {
        if let Some(sig) = cache.get(&file.descriptor.file_id) {
            return Ok(sig.clone());
        }
        let sig = self
            .fingerprinter
            .fingerprint(file.descriptor, file.is_text, file.encoding.as_deref())?;
        cache.insert(file.descriptor.file_id, sig.clone());
        Ok(sig)
    }
}

fn try_version(a: &FileContext<'_>, b: &FileContext<'_>) -> Option<PairwiseRelation> {
    let pa = a.parsed.primary_segment()?;
    let pb = b.parsed.primary_segment()?;
    if pa.start != pb.start || pa.end == pb.end {
        return None;
    }

    let (newer, older) = if pa.end > pb.end { (a, b) } else { (b, a) };

    let mut evidence: Evidence = BTreeMap::new();
    evidence.insert("check".to_string(), "version".to_string());

    let confidence = if newer.descriptor.size < older.descriptor.size {
        evidence.insert("shrink_warning".to_string(), "true".to_string());
        CONFIDENCE_VERSION_SHRINK
    } else if newer.descriptor.mtime > older.descriptor.mtime {
        evidence.insert("corroboration".to_string(), "size_and_mtime".to_string());
        CONFIDENCE_VERSION_CORROBORATED
    } else {
        evidence.insert("corroboration".to_string(), "size_only".to_string());
        CONFIDENCE_VERSION_BASE
    };

    Some(PairwiseRelation::Version {
        newer_id: newer.descriptor.file_id,
        older_id: older.descriptor.file_id,
        evidence,
        confidence,
    })
}

fn shared_segment_pairs<'a>(
    a: &'a FilenameParseResult,
    b: &'a FilenameParseResult,
) -> Vec<(&'a RangeSegment, &'a RangeSegment)> {
    let mut pairs = Vec::new();
    for sa in &a.segments {
        for sb in &b.segments {
            if sa.kind == sb.kind {
                pairs.push((sa, sb));
            }
        }
    }
    pairs
}

fn ranges_overlap(a: &RangeSegment, b: &RangeSegment) -> bool {
    !(a.end < b.start || b.end < a.start)
}

// =============================================================================
// Exact detection (§4.4, optional, cross-cutting)
// =============================================================================

/// Tiered exact-duplicate detection across the *whole* descriptor set,
/// ignoring blocking and parse confidence entirely: byte-for-byte
/// duplicates are duplicates regardless of what their filenames say.
///
/// Tiers: group by size, then head_hash, then tail_hash, then a full
/// streaming SHA-256. Any final class of >= 2 members emits one `Exact`
/// relation per clique.
pub fn detect_exact(descriptors: &[FileDescriptor], reader: &dyn FileReader) -> Vec<PairwiseRelation> {
    use crate::util::constants::{ANCHOR_BYTES, CONFIDENCE_EXACT};

    let mut by_size: HashMap<u64, Vec<&FileDescriptor>> = HashMap::new();
    for d in descriptors {
        by_size.entry(d.size).or_default().push(d);
    }

    let mut relations = Vec::new();

    for (_, same_size) in by_size {
        if same_size.len() < 2 {
            continue;
        }

        let mut by_head: HashMap<[u8; 32], Vec<&FileDescriptor>> = HashMap::new();
        for d in &same_size {
            let Ok(bytes) = reader.read_window(&d.path, 0, ANCHOR_BYTES) else {
                continue;
            };
            by_head.entry(sha256(&bytes)).or_default().push(d);
        }

        for (_, same_head) in by_head {
            if same_head.len() < 2 {
                continue;
            }

            let mut by_tail: HashMap<[u8; 32], Vec<&FileDescriptor>> = HashMap::new();
            for d in &same_head {
                let tail_offset = d.size.saturating_sub(ANCHOR_BYTES);
                let Ok(bytes) = reader.read_window(&d.path, tail_offset, ANCHOR_BYTES) else {
                    continue;
                };
                by_tail.entry(sha256(&bytes)).or_default().push(d);
            }

            for (_, same_tail) in by_tail {
                if same_tail.len() < 2 {
                    continue;
                }

                let mut by_full: HashMap<[u8; 32], Vec<u64>> = HashMap::new();
                for d in &same_tail {
                    if let Ok(digest) = full_file_sha256(d, reader) {
                        by_full.entry(digest).or_default().push(d.file_id);
                    }
                }

                for (_, mut clique) in by_full {
                    if clique.len() < 2 {
                        continue;
                    }
                    clique.sort_unstable();
                    let mut evidence: Evidence = BTreeMap::new();
                    evidence.insert("check".to_string(), "exact".to_string());
                    evidence.insert("tier".to_string(), "full_sha256".to_string());
                    relations.push(PairwiseRelation::Exact {
                        file_ids: clique,
                        evidence,
                        confidence: CONFIDENCE_EXACT,
                    });
                }
            }
        }
    }

    relations
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

fn full_file_sha256(descriptor: &FileDescriptor, reader: &dyn FileReader) -> Result<[u8; 32], crate::util::error::EngineError> {
    const CHUNK: u64 = 1024 * 1024;
    let mut hasher = Sha256::new();
    let mut offset = 0u64;
    loop {
        let chunk = reader.read_window(&descriptor.path, offset, CHUNK)?;
        if chunk.is_empty() {
            break;
        }
        let len = chunk.len() as u64;
        hasher.update(&chunk);
        offset += len;
        if len < CHUNK {
            break;
        }
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::parse_filename;
    use crate::core::reader::StdFileReader;
    use chrono::{TimeZone, Utc};
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn make_file(file_id: u64, name: &str, content: &[u8], mtime_secs: i64) -> (NamedTempFile, FileDescriptor) {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content).unwrap();
        let descriptor = FileDescriptor {
            file_id,
            path: f.path().to_path_buf(),
            name: name.to_string(),
            extension: ".txt".to_string(),
            size: content.len() as u64,
            mtime: Utc.timestamp_opt(mtime_secs, 0).unwrap(),
        };
        (f, descriptor)
    }

    fn context<'a>(descriptor: &'a FileDescriptor, parsed: &'a FilenameParseResult) -> FileContext<'a> {
        FileContext {
            descriptor,
            parsed,
            is_text: false,
            encoding: None,
        }
    }

    #[test]
    fn containment_detected_when_anchors_corroborate() {
        let base = "x".repeat(200_000);
        let extended = format!("{base}{}", "y".repeat(80_000));

        let (_fa, da) = make_file(1, "Work A 1-114.txt", base.as_bytes(), 1000);
        let (_fb, db) = make_file(2, "Work A 1-158.txt", extended.as_bytes(), 1001);

        let pa = parse_filename(&da.path, &da.name);
        let pb = parse_filename(&db.path, &db.name);

        let ca = context(&da, &pa);
        let cb = context(&db, &pb);
        let mut files = HashMap::new();
        files.insert(1, ca);
        files.insert(2, cb);

        let block = BlockingGroup {
            key: crate::core::model::BlockKey {
                extension: ".txt".to_string(),
                series_title_norm: "work a".to_string(),
                range_start: 1,
                range_unit: None,
            },
            member_ids: vec![1, 2],
        };

        let reader = StdFileReader;
        let detector = RelationDetector::new(&reader, true, true);
        let relations = detector.detect(&block, &files);

        assert_eq!(relations.len(), 1);
        match &relations[0] {
            PairwiseRelation::Containment {
                container_id,
                contained_id,
                confidence,
                ..
            } => {
                assert_eq!(*container_id, 2);
                assert_eq!(*contained_id, 1);
                assert!((*confidence - 0.90).abs() < 1e-9);
            }
            other => panic!("expected Containment, got {other:?}"),
        }
    }

    #[test]
    fn version_detected_with_size_shrink_warning() {
        let (_fa, da) = make_file(1, "Work D 1-100.txt", &vec![0u8; 5_000_000], 1000);
        let (_fb, db) = make_file(2, "Work D 1-120.txt", &vec![1u8; 4_800_000], 1001);

        let pa = parse_filename(&da.path, &da.name);
        let pb = parse_filename(&db.path, &db.name);

        let ca = context(&da, &pa);
        let cb = context(&db, &pb);
        let mut files = HashMap::new();
        files.insert(1, ca);
        files.insert(2, cb);

        let block = BlockingGroup {
            key: crate::core::model::BlockKey {
                extension: ".txt".to_string(),
                series_title_norm: "work d".to_string(),
                range_start: 1,
                range_unit: None,
            },
            member_ids: vec![1, 2],
        };

        let reader = StdFileReader;
        let detector = RelationDetector::new(&reader, true, true);
        let relations = detector.detect(&block, &files);

        assert_eq!(relations.len(), 1);
        match &relations[0] {
            PairwiseRelation::Version {
                newer_id,
                older_id,
                confidence,
                evidence,
            } => {
                assert_eq!(*newer_id, 2);
                assert_eq!(*older_id, 1);
                assert!((*confidence - 0.70).abs() < 1e-9);
                assert_eq!(evidence.get("shrink_warning").map(String::as_str), Some("true"));
            }
            other => panic!("expected Version, got {other:?}"),
        }
    }

    #[test]
    fn disjoint_ranges_produce_no_relation() {
        let (_fa, da) = make_file(1, "Work B 1권.txt", &vec![0u8; 100_000], 1000);
        let (_fb, db) = make_file(2, "Work B 2권.txt", &vec![1u8; 100_000], 1000);

        let pa = parse_filename(&da.path, &da.name);
        let pb = parse_filename(&db.path, &db.name);

        let ca = context(&da, &pa);
        let cb = context(&db, &pb);
        let mut files = HashMap::new();
        files.insert(1, ca);
        files.insert(2, cb);

        let block = BlockingGroup {
            key: crate::core::model::BlockKey {
                extension: ".txt".to_string(),
                series_title_norm: "work b".to_string(),
                range_start: 1,
                range_unit: Some("권".to_string()),
            },
            member_ids: vec![1, 2],
        };

        let reader = StdFileReader;
        let detector = RelationDetector::new(&reader, true, true);
        let relations = detector.detect(&block, &files);
        assert!(relations.is_empty());
    }

    #[test]
    fn exact_detection_ignores_blocking_and_confidence() {
        let content = b"identical content for exact detection test padding padding".repeat(200);
        let (_fa, da) = make_file(1, "garbage_name_one", &content, 1000);
        let (_fb, db) = make_file(2, "garbage_name_two", &content, 1001);

        let reader = StdFileReader;
        let relations = detect_exact(&[da, db], &reader);
        assert_eq!(relations.len(), 1);
        match &relations[0] {
            PairwiseRelation::Exact { file_ids, confidence, .. } => {
                assert_eq!(file_ids, &vec![1, 2]);
                assert!((*confidence - 1.0).abs() < 1e-9);
            }
            other => panic!("expected Exact, got {other:?}"),
        }
    }
}
