// noveldup - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation; all errors preserve the causal chain
// for diagnostic logging.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all engine operations.
///
/// Only two variants are ever surfaced to a caller of `analyze`:
/// `Cancelled` and `Internal`. Everything else is recorded as evidence on
/// the affected pair or file and the run continues.
#[derive(Debug)]
pub enum EngineError {
    /// Fingerprinting a file failed.
    Fingerprint(FingerprintError),

    /// Group normalization found a structural problem it cannot repair.
    Normalize(NormalizeError),

    /// The run was cancelled via the caller's `CancellationToken`.
    Cancelled,

    /// An invariant the pipeline depends on was violated. This indicates a
    /// bug in the engine, not bad input.
    Internal(InternalError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fingerprint(e) => write!(f, "fingerprint error: {e}"),
            Self::Normalize(e) => write!(f, "group normalization error: {e}"),
            Self::Cancelled => write!(f, "analysis was cancelled"),
            Self::Internal(e) => write!(f, "internal error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Fingerprint(e) => Some(e),
            Self::Normalize(e) => Some(e),
            Self::Cancelled => None,
            Self::Internal(e) => Some(e),
        }
    }
}

impl From<FingerprintError> for EngineError {
    fn from(e: FingerprintError) -> Self {
        Self::Fingerprint(e)
    }
}

impl From<NormalizeError> for EngineError {
    fn from(e: NormalizeError) -> Self {
        Self::Normalize(e)
    }
}

impl From<InternalError> for EngineError {
    fn from(e: InternalError) -> Self {
        Self::Internal(e)
    }
}

// ---------------------------------------------------------------------------
// Fingerprint errors
// ---------------------------------------------------------------------------

/// Errors related to content fingerprinting (§4.3).
///
/// These are always recoverable at the pair/file level: a fingerprint
/// failure removes the affected file from further comparison in its block
/// rather than aborting the run.
#[derive(Debug)]
pub enum FingerprintError {
    /// Reading an anchor window failed.
    Io {
        path: PathBuf,
        file_id: u64,
        source: io::Error,
    },

    /// Memory-mapping a large file failed.
    Mmap {
        path: PathBuf,
        file_id: u64,
        source: io::Error,
    },
}

impl fmt::Display for FingerprintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io {
                path,
                file_id,
                source,
            } => write!(
                f,
                "failed to read '{}' (file_id {file_id}): {source}",
                path.display()
            ),
            Self::Mmap {
                path,
                file_id,
                source,
            } => write!(
                f,
                "failed to memory-map '{}' (file_id {file_id}): {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for FingerprintError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Mmap { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Normalize errors
// ---------------------------------------------------------------------------

/// Errors arising while merging pairwise relations into duplicate groups.
#[derive(Debug)]
pub enum NormalizeError {
    /// A file_id appeared in more than one emitted group after merging.
    FileInMultipleGroups { file_id: u64 },

    /// A group's recommended keeper is not among its own members.
    KeeperNotInGroup { group_id: u32, keeper_id: u64 },

    /// A group contains the same file_id more than once.
    DuplicateFileInGroup { group_id: u32, file_id: u64 },

    /// Two members of the same group share an identical path.
    DuplicatePathInGroup { group_id: u32, path: PathBuf },
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileInMultipleGroups { file_id } => {
                write!(f, "file_id {file_id} appears in more than one group")
            }
            Self::KeeperNotInGroup { group_id, keeper_id } => write!(
                f,
                "group {group_id}: recommended keeper {keeper_id} is not a member"
            ),
            Self::DuplicateFileInGroup { group_id, file_id } => write!(
                f,
                "group {group_id}: file_id {file_id} listed more than once"
            ),
            Self::DuplicatePathInGroup { group_id, path } => write!(
                f,
                "group {group_id}: duplicate path '{}' within group",
                path.display()
            ),
        }
    }
}

impl std::error::Error for NormalizeError {}

// ---------------------------------------------------------------------------
// Internal errors
// ---------------------------------------------------------------------------

/// An invariant the pipeline relies on was violated. Always a bug.
#[derive(Debug)]
pub enum InternalError {
    InvariantViolated { context: &'static str, detail: String },
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvariantViolated { context, detail } => {
                write!(f, "invariant violated in {context}: {detail}")
            }
        }
    }
}

impl std::error::Error for InternalError {}

/// Convenience type alias for engine results.
pub type Result<T> = std::result::Result<T, EngineError>;
