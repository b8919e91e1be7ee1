// noveldup - core/model.rs
//
// Core data model types. Pure data definitions with no I/O.
// These types are the shared vocabulary across every pipeline stage.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

// =============================================================================
// File Descriptor (input)
// =============================================================================

/// Metadata about one candidate file, supplied by the caller.
///
/// Immutable once constructed. The engine never touches the file system
/// except through the [`crate::core::reader::FileReader`] the caller
/// provides; `path` here is carried only for reporting and tie-breaking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Opaque identifier, unique within a single `analyze` call.
    pub file_id: u64,

    /// Absolute path to the file.
    pub path: PathBuf,

    /// Filename including extension.
    pub name: String,

    /// Lowercased extension, dot included (e.g. ".txt"). Empty if none.
    pub extension: String,

    /// File size in bytes.
    pub size: u64,

    /// Last modification time.
    pub mtime: DateTime<Utc>,
}

// =============================================================================
// Filename parsing (§4.1)
// =============================================================================

/// How a [`FilenameParseResult`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseMethod {
    /// One of the cascading regex patterns matched.
    Pattern,
    /// The "first number pair in the name" heuristic matched.
    Heuristic,
    /// No structured extraction succeeded; the stem was used verbatim.
    Fallback,
}

/// The kind of an episode range segment extracted from a filename.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum SegmentKind {
    /// The unnamed range used for version comparison.
    Primary,
    /// A named range such as 본편, 외전, 에필, 후기, or a numbered 부.
    Named(String),
}

/// One contiguous episode range captured from a filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeSegment {
    pub kind: SegmentKind,
    pub start: u32,
    pub end: u32,
    pub unit: Option<String>,
}

impl RangeSegment {
    /// Whether `self` strictly contains `other` — same invariant used by
    /// the relation detector, exposed here so callers can reuse it without
    /// duplicating the comparison.
    pub fn contains(&self, other: &RangeSegment) -> bool {
        self.start <= other.start && self.end >= other.end && (self.start, self.end) != (other.start, other.end)
    }
}

/// Result of parsing one filename (§4.1). Always produced; parsing never fails.
#[derive(Debug, Clone, Serialize)]
pub struct FilenameParseResult {
    /// Normalized series title: tags stripped, whitespace collapsed, lowercased.
    /// Empty only when every extraction attempt, including fallback, yielded
    /// nothing usable (e.g. an empty filename stem).
    pub series_title_norm: String,

    /// Ordered segments extracted from the filename. May be empty.
    pub segments: Vec<RangeSegment>,

    /// Mirror of the Primary segment's start, for backward-compatible lookup.
    pub range_start: Option<u32>,
    /// Mirror of the Primary segment's end.
    pub range_end: Option<u32>,
    /// Mirror of the Primary segment's unit.
    pub range_unit: Option<String>,

    /// Normalized tag strings found in parentheses, brackets, `@token`, or
    /// the status-word list.
    pub tags: Vec<String>,

    pub is_complete: bool,
    pub is_epilogue_included: bool,

    pub confidence: f64,
    pub parse_method: ParseMethod,
}

impl FilenameParseResult {
    /// The distinguished Primary segment, if one was captured.
    pub fn primary_segment(&self) -> Option<&RangeSegment> {
        self.segments.iter().find(|s| s.kind == SegmentKind::Primary)
    }

    /// Whether a Primary range was captured (by pattern or mirrored fields).
    pub fn has_range(&self) -> bool {
        self.range_start.is_some() && self.range_end.is_some()
    }

    /// Whether this result and `other` plausibly describe the same series.
    pub fn is_same_series(&self, other: &FilenameParseResult) -> bool {
        !self.series_title_norm.is_empty() && self.series_title_norm == other.series_title_norm
    }

    /// The range start used to key a [`BlockKey`] (§4.2).
    ///
    /// Mirrors `range_start` (the Primary segment) when one exists. When a
    /// filename only captured named segments (e.g. a bare "본편 1-1213"
    /// with no competing unnamed range), there is no Primary to mirror, but
    /// the file still needs a bucket to land in so it can be compared
    /// against sibling files that share the same named segment — so this
    /// falls back to the first captured segment's start. The model's own
    /// `range_start` field stays strictly Primary-only, per its invariant.
    pub fn blocking_start(&self) -> Option<u32> {
        self.range_start.or_else(|| self.segments.first().map(|s| s.start))
    }

    /// The counting unit used to key a [`BlockKey`], with the same
    /// first-segment fallback as [`Self::blocking_start`].
    pub fn blocking_unit(&self) -> Option<String> {
        match self.primary_segment() {
            Some(seg) => seg.unit.clone(),
            None => self.segments.first().and_then(|s| s.unit.clone()),
        }
    }
}

// =============================================================================
// Blocking (§4.2)
// =============================================================================

/// Composite key used to partition files into comparison candidates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockKey {
    pub extension: String,
    pub series_title_norm: String,
    pub range_start: u32,
    pub range_unit: Option<String>,
}

/// A set of at least two files sharing a [`BlockKey`]; the unit of work for
/// the relation detector.
#[derive(Debug, Clone)]
pub struct BlockingGroup {
    pub key: BlockKey,
    pub member_ids: Vec<u64>,
}

// =============================================================================
// Content fingerprinting (§4.3)
// =============================================================================

/// SHA-256 digest, stored as raw bytes.
pub type Sha256Digest = [u8; 32];

/// Truncated SHA-1 digest (160 bits), stored as raw bytes.
pub type Sha1Digest = [u8; 20];

/// Lightweight content signature computed from a file's head, middle, and
/// tail, without reading the entire file.
#[derive(Debug, Clone)]
pub struct AnchorSignature {
    pub file_id: u64,
    pub head_hash: Sha256Digest,
    pub mid_hash: Sha256Digest,
    pub tail_hash: Sha256Digest,
    pub k_gram_set: std::collections::BTreeSet<Sha1Digest>,
    /// Whether hashes were computed over text-normalized bytes. `false` when
    /// the file was treated as opaque (binary, or encoding undetected).
    pub normalized: bool,
}

// =============================================================================
// Relation detection (§4.4)
// =============================================================================

/// Diagnostic payload attached to a relation, for audit/UI consumption.
pub type Evidence = BTreeMap<String, String>;

/// One detected relationship between two files, or a clique for `Exact`.
#[derive(Debug, Clone)]
pub enum PairwiseRelation {
    Containment {
        container_id: u64,
        contained_id: u64,
        evidence: Evidence,
        confidence: f64,
    },
    Version {
        newer_id: u64,
        older_id: u64,
        evidence: Evidence,
        confidence: f64,
    },
    Exact {
        file_ids: Vec<u64>,
        evidence: Evidence,
        confidence: f64,
    },
}

impl PairwiseRelation {
    /// Every file_id implicated by this relation (2 for Containment/Version,
    /// N for an Exact clique).
    pub fn member_ids(&self) -> Vec<u64> {
        match self {
            Self::Containment {
                container_id,
                contained_id,
                ..
            } => vec![*container_id, *contained_id],
            Self::Version {
                newer_id, older_id, ..
            } => vec![*newer_id, *older_id],
            Self::Exact { file_ids, .. } => file_ids.clone(),
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Self::Containment { confidence, .. }
            | Self::Version { confidence, .. }
            | Self::Exact { confidence, .. } => *confidence,
        }
    }

    /// The member this relation would "prefer" as the group keeper, used by
    /// the first tie-break step in §4.5 (container, newer, or — for an
    /// Exact clique, which has no preferred side — `None`).
    pub fn preferred_id(&self) -> Option<u64> {
        match self {
            Self::Containment { container_id, .. } => Some(*container_id),
            Self::Version { newer_id, .. } => Some(*newer_id),
            Self::Exact { .. } => None,
        }
    }
}

// =============================================================================
// Duplicate groups (§4.5, output)
// =============================================================================

/// The classification of a finished, normalized duplicate group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DuplicateType {
    Exact,
    Version,
    Containment,
    /// The component was assembled from more than one relation kind.
    Merged,
}

/// One finished duplicate group: the unit of output from `analyze`.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub group_id: u32,
    pub duplicate_type: DuplicateType,
    /// Ascending-sorted member file_ids.
    pub file_ids: Vec<u64>,
    pub recommended_keeper_id: u64,
    pub confidence: f64,
    pub evidence: Evidence,
}

// =============================================================================
// Options and progress (§6, ambient)
// =============================================================================

/// Caller-supplied configuration for one `analyze` run. This is the only
/// configuration surface the engine has; there is no file-based config.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub enable_exact: bool,
    pub enable_version: bool,
    pub enable_containment: bool,
    pub min_file_size: u64,
    pub confidence_threshold: f64,
    pub max_parallelism: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        use crate::util::constants::*;
        Self {
            enable_exact: false,
            enable_version: true,
            enable_containment: true,
            min_file_size: MIN_FILE_SIZE,
            confidence_threshold: MIN_CONFIDENCE_FOR_BLOCKING,
            max_parallelism: DEFAULT_MAX_PARALLELISM,
        }
    }
}

/// Stage index paired with a human-readable name, handed to the caller's
/// progress callback alongside processed/total counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FilenameParsing,
    Blocking,
    Fingerprinting,
    RelationDetection,
    GroupNormalization,
}

impl Stage {
    pub fn index(self) -> u8 {
        match self {
            Self::FilenameParsing => 0,
            Self::Blocking => 1,
            Self::Fingerprinting => 2,
            Self::RelationDetection => 3,
            Self::GroupNormalization => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::FilenameParsing => "filename parsing",
            Self::Blocking => "blocking",
            Self::Fingerprinting => "fingerprinting",
            Self::RelationDetection => "relation detection",
            Self::GroupNormalization => "group normalization",
        }
    }
}
