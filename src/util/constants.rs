// noveldup - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.
// No magic numbers in the detection logic; every bound is named here.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "noveldup";

/// Current application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Fingerprinting limits
// =============================================================================

/// Size of each anchor window (head/mid/tail) read from a file, in bytes.
pub const ANCHOR_BYTES: u64 = 64 * 1024;

/// Files smaller than this are never fingerprinted; too little content to
/// distinguish a genuine duplicate from an unrelated short file.
pub const MIN_FILE_SIZE: u64 = 8 * 1024;

/// Width of each k-gram window used to build the overlap-estimation hash set.
pub const K_GRAM_SIZE: usize = 64;

/// Size of each interior sample window used for k-gram extraction.
pub const INTERIOR_SAMPLE_BYTES: usize = 4 * 1024;

/// Number of interior samples taken across the file body (excluding head/tail).
pub const INTERIOR_SAMPLE_COUNT: usize = 5;

/// Quantile positions (as fractions of file size) at which interior samples
/// are centred. Matches `INTERIOR_SAMPLE_COUNT`.
pub const INTERIOR_SAMPLE_QUANTILES: [f64; 5] = [1.0 / 6.0, 2.0 / 6.0, 3.0 / 6.0, 4.0 / 6.0, 5.0 / 6.0];

/// Above this size, fingerprint windows are read via `memmap2` rather than
/// buffered reads, avoiding a full read of files that may be tens of MB.
pub const MMAP_THRESHOLD_BYTES: u64 = 1024 * 1024;

// =============================================================================
// Parsing / blocking confidence
// =============================================================================

/// Confidence assigned to a multi-segment filename match (본편/외전/에필/...).
pub const CONFIDENCE_MULTI_SEGMENT: f64 = 0.95;

/// Confidence assigned to a hyphen range match ("title 1-114").
pub const CONFIDENCE_RANGE_HYPHEN: f64 = 0.90;

/// Confidence assigned to a tilde range match ("title 1~114").
pub const CONFIDENCE_RANGE_TILDE: f64 = 0.85;

/// Confidence assigned to a single-episode match with a counting unit.
pub const CONFIDENCE_SINGLE_RANGE: f64 = 0.80;

/// Confidence assigned to the heuristic "first number pair in the name" fallback.
pub const CONFIDENCE_HEURISTIC: f64 = 0.50;

/// Confidence assigned when every pattern attempt fails and the filename is
/// used verbatim (minus tag-like substrings) as the title.
pub const CONFIDENCE_FALLBACK: f64 = 0.20;

/// Confidence at or above which a parse is considered pattern-grade
/// (`parse_method == PATTERN`). Below this, blocking excludes the file.
pub const MIN_CONFIDENCE_FOR_BLOCKING: f64 = 0.7;

// =============================================================================
// Relation detection confidence
// =============================================================================

/// Base confidence for a containment relation confirmed by anchor hashes.
pub const CONFIDENCE_CONTAINMENT: f64 = 0.90;

/// Raised containment confidence when the container is tagged complete and
/// the contained file is not.
pub const CONFIDENCE_CONTAINMENT_COMPLETE: f64 = 0.95;

/// Base confidence for a version relation where size does not corroborate.
pub const CONFIDENCE_VERSION_BASE: f64 = 0.85;

/// Raised version confidence when both size and mtime corroborate "newer".
pub const CONFIDENCE_VERSION_CORROBORATED: f64 = 0.90;

/// Lowered version confidence when the range grew but size shrank
/// (possible compressed/cleaned reissue).
pub const CONFIDENCE_VERSION_SHRINK: f64 = 0.70;

/// Confidence for an exact byte-level duplicate clique.
pub const CONFIDENCE_EXACT: f64 = 1.0;

// =============================================================================
// Concurrency / resource bounds
// =============================================================================

/// Default parallelism cap when the caller does not specify one.
pub const DEFAULT_MAX_PARALLELISM: u32 = 1;

/// Upper bound on configurable parallelism, regardless of host CPU count.
pub const ABSOLUTE_MAX_PARALLELISM: u32 = 64;

// =============================================================================
// Logging
// =============================================================================

/// Default log level when neither RUST_LOG nor an explicit override is set.
pub const DEFAULT_LOG_LEVEL: &str = "info";
