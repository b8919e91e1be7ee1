// noveldup - core/fingerprint.rs
//
// Content fingerprinter (§4.3). Produces a small, fixed-size anchor
// signature for a file -- head/mid/tail SHA-256 digests plus a k-gram set
// over sampled windows -- without reading the whole file. Computed on
// demand and cached per block (§5): a file is opened at most once per run.

use crate::core::model::{AnchorSignature, FileDescriptor, Sha1Digest, Sha256Digest};
use crate::core::reader::FileReader;
use crate::util::constants::{
    ANCHOR_BYTES, INTERIOR_SAMPLE_BYTES, INTERIOR_SAMPLE_COUNT, INTERIOR_SAMPLE_QUANTILES, K_GRAM_SIZE,
};
use crate::util::error::EngineError;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Computes [`AnchorSignature`]s for files, reading through a [`FileReader`].
///
/// Stateless: the per-block cache lives in [`crate::core::relation`], which
/// owns the lifetime described in §5 (scoped to one block and one worker).
pub struct Fingerprinter<'a> {
    reader: &'a dyn FileReader,
}

impl<'a> Fingerprinter<'a> {
    pub fn new(reader: &'a dyn FileReader) -> Self {
        Self { reader }
    }

    /// Produce the anchor signature for `descriptor`.
    ///
    /// `is_text` and `encoding` come from the caller's integrity/encoding
    /// layer (§6 `EncodingHint`); when `encoding` is `None` the bytes are
    /// treated as opaque and `normalized` is `false`, per the resolved open
    /// question in §9.
    pub fn fingerprint(
        &self,
        descriptor: &FileDescriptor,
        is_text: bool,
        encoding: Option<&str>,
    ) -> Result<AnchorSignature, EngineError> {
        let size = descriptor.size;

        let head_window = self.read_clamped(descriptor, 0, ANCHOR_BYTES)?;
        let mid_offset = (size / 2).saturating_sub(ANCHOR_BYTES / 2);
        let mid_window = self.read_clamped(descriptor, mid_offset, ANCHOR_BYTES)?;
        let tail_offset = size.saturating_sub(ANCHOR_BYTES);
        let tail_window = self.read_clamped(descriptor, tail_offset, ANCHOR_BYTES)?;

        let (head_bytes, head_normalized) = normalize_if_text(&head_window, is_text, encoding);
        let (mid_bytes, _) = normalize_if_text(&mid_window, is_text, encoding);
        let (tail_bytes, _) = normalize_if_text(&tail_window, is_text, encoding);

        let head_hash = sha256(&head_bytes);
        let mid_hash = sha256(&mid_bytes);
        let tail_hash = sha256(&tail_bytes);

        let mut k_gram_set: BTreeSet<Sha1Digest> = BTreeSet::new();
        extend_k_grams(&mut k_gram_set, &head_bytes);
        extend_k_grams(&mut k_gram_set, &tail_bytes);

        for quantile in INTERIOR_SAMPLE_QUANTILES.iter().take(INTERIOR_SAMPLE_COUNT) {
            let center = (size as f64 * quantile) as u64;
            let offset = center.saturating_sub(INTERIOR_SAMPLE_BYTES as u64 / 2);
            let window = self.read_clamped(descriptor, offset, INTERIOR_SAMPLE_BYTES as u64)?;
            let (bytes, _) = normalize_if_text(&window, is_text, encoding);
            extend_k_grams(&mut k_gram_set, &bytes);
        }

        Ok(AnchorSignature {
            file_id: descriptor.file_id,
            head_hash,
            mid_hash,
            tail_hash,
            k_gram_set,
            normalized: head_normalized,
        })
    }

    fn read_clamped(&self, descriptor: &FileDescriptor, offset: u64, length: u64) -> Result<Vec<u8>, EngineError> {
        let offset = offset.min(descriptor.size);
        self.reader
            .read_window(&descriptor.path, offset, length)
            .map_err(|err| with_file_id(err, descriptor.file_id))
    }
}

/// Readers only know a path, not a `file_id`; stamp the correct one onto
/// whatever error they raised so evidence downstream can point at a file.
fn with_file_id(err: EngineError, file_id: u64) -> EngineError {
    use crate::util::error::FingerprintError;
    match err {
        EngineError::Fingerprint(FingerprintError::Io { path, source, .. }) => {
            EngineError::from(FingerprintError::Io { path, file_id, source })
        }
        EngineError::Fingerprint(FingerprintError::Mmap { path, source, .. }) => {
            EngineError::from(FingerprintError::Mmap { path, file_id, source })
        }
        other => other,
    }
}

fn sha256(bytes: &[u8]) -> Sha256Digest {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

fn sha1_truncated160(bytes: &[u8]) -> Sha1Digest {
    let digest = Sha1::digest(bytes);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    out
}

/// Hash every contiguous `K_GRAM_SIZE`-byte slice of `bytes` into `set`.
fn extend_k_grams(set: &mut BTreeSet<Sha1Digest>, bytes: &[u8]) {
    if bytes.len() < K_GRAM_SIZE {
        return;
    }
    for window in bytes.windows(K_GRAM_SIZE) {
        set.insert(sha1_truncated160(window));
    }
}

/// Apply text normalization (§4.3) when `is_text`, else return the raw
/// bytes unnormalized. Returns the bytes to hash plus whether normalization
/// was actually applied.
fn normalize_if_text(raw: &[u8], is_text: bool, encoding: Option<&str>) -> (Vec<u8>, bool) {
    if !is_text {
        return (raw.to_vec(), false);
    }
    let Some(decoded) = decode_with_hint(raw, encoding) else {
        return (raw.to_vec(), false);
    };
    (normalize_text(&decoded).into_bytes(), true)
}

/// Strip a BOM and decode `raw` using the caller-provided encoding hint.
/// Returns `None` (opaque bytes) when no encoding was detected, per §9.
fn decode_with_hint(raw: &[u8], encoding: Option<&str>) -> Option<String> {
    let label = encoding?;
    let stripped = strip_bom(raw);
    let enc = encoding_rs::Encoding::for_label(label.as_bytes()).unwrap_or(encoding_rs::UTF_8);
    let (decoded, _, _) = enc.decode(stripped);
    Some(decoded.into_owned())
}

fn strip_bom(raw: &[u8]) -> &[u8] {
    if raw.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &raw[3..]
    } else if raw.starts_with(&[0xFF, 0xFE]) {
        &raw[2..]
    } else if raw.starts_with(&[0xFE, 0xFF]) {
        &raw[2..]
    } else {
        raw
    }
}

/// Newline folding, trailing-whitespace strip per line, whitespace
/// collapse, and case fold (§4.3).
fn normalize_text(text: &str) -> String {
    let folded = text.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<String> = folded
        .lines()
        .map(|line| {
            let trimmed = line.trim_end();
            trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
        })
        .collect();
    lines.join("\n").to_lowercase()
}
