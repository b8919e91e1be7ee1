// noveldup - core/reader.rs
//
// The content-reading boundary (§6, §4.6.5). Directory traversal is out of
// scope, but the fingerprinter still needs bytes from somewhere; rather than
// hard-wiring `std::fs` into `fingerprint.rs`, reads go through this trait so
// callers with their own index-backed storage can supply one, and tests can
// run against real temp files without a mock.

use memmap2::Mmap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::util::constants::MMAP_THRESHOLD_BYTES;
use crate::util::error::{EngineError, FingerprintError};

/// Reads a bounded window of bytes from a file, identified by path.
///
/// Implementations must return fewer than `length` bytes at EOF rather than
/// erroring, and must fail cleanly (not panic) on permission or I/O errors.
pub trait FileReader: Send + Sync {
    fn read_window(&self, path: &Path, offset: u64, length: u64) -> Result<Vec<u8>, EngineError>;

    /// Total size of the file in bytes, used to compute window positions.
    fn file_size(&self, path: &Path) -> Result<u64, EngineError>;
}

/// Optional hint telling the fingerprinter which decoder to use before text
/// normalization (§4.3, §6 `EncodingHint`). Returns `None` when the caller
/// has no detected encoding for a file, in which case the fingerprinter
/// treats the bytes as opaque rather than guessing (§9).
pub trait EncodingHint: Send + Sync {
    fn lookup(&self, file_id: u64) -> Option<String>;
}

/// Hint telling the fingerprinter whether a file should be text-normalized
/// at all before hashing. Binary bundles (archives, images accidentally
/// swept up by the scanner) should never go through text normalization.
pub trait TextClassifier: Send + Sync {
    fn is_text(&self, file_id: u64) -> bool;
}

/// No encoding ever detected; every file is hashed as opaque bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEncodingHint;

impl EncodingHint for NoEncodingHint {
    fn lookup(&self, _file_id: u64) -> Option<String> {
        None
    }
}

/// Every file is treated as text. Reasonable default for a collection that
/// is, by construction, serialized episode text.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysText;

impl TextClassifier for AlwaysText {
    fn is_text(&self, _file_id: u64) -> bool {
        true
    }
}

/// Default production reader: buffered reads for small files, `memmap2` for
/// anything over [`MMAP_THRESHOLD_BYTES`] so large bundles are not copied
/// into memory just to read a handful of 64 KiB windows.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFileReader;

impl FileReader for StdFileReader {
    fn read_window(&self, path: &Path, offset: u64, length: u64) -> Result<Vec<u8>, EngineError> {
        let mut file = File::open(path).map_err(|source| {
            EngineError::from(FingerprintError::Io {
                path: path.to_path_buf(),
                file_id: 0,
                source,
            })
        })?;

        let size = file
            .metadata()
            .map_err(|source| {
                EngineError::from(FingerprintError::Io {
                    path: path.to_path_buf(),
                    file_id: 0,
                    source,
                })
            })?
            .len();

        let clamped_len = length.min(size.saturating_sub(offset));
        if clamped_len == 0 {
            return Ok(Vec::new());
        }

        if size >= MMAP_THRESHOLD_BYTES {
            // Safety: the file is opened read-only for the duration of this
            // call and not concurrently truncated by this process.
            let mmap = unsafe {
                Mmap::map(&file).map_err(|source| {
                    EngineError::from(FingerprintError::Mmap {
                        path: path.to_path_buf(),
                        file_id: 0,
                        source,
                    })
                })?
            };
            let start = offset as usize;
            let end = (start + clamped_len as usize).min(mmap.len());
            return Ok(mmap[start..end].to_vec());
        }

        file.seek(SeekFrom::Start(offset)).map_err(|source| {
            EngineError::from(FingerprintError::Io {
                path: path.to_path_buf(),
                file_id: 0,
                source,
            })
        })?;

        let mut buf = vec![0u8; clamped_len as usize];
        let mut read_total = 0usize;
        while read_total < buf.len() {
            let n = file.read(&mut buf[read_total..]).map_err(|source| {
                EngineError::from(FingerprintError::Io {
                    path: path.to_path_buf(),
                    file_id: 0,
                    source,
                })
            })?;
            if n == 0 {
                break;
            }
            read_total += n;
        }
        buf.truncate(read_total);
        Ok(buf)
    }

    fn file_size(&self, path: &Path) -> Result<u64, EngineError> {
        std::fs::metadata(path)
            .map(|m| m.len())
            .map_err(|source| {
                EngineError::from(FingerprintError::Io {
                    path: path.to_path_buf(),
                    file_id: 0,
                    source,
                })
            })
    }
}
