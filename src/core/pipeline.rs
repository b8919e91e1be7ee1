// noveldup - core/pipeline.rs
//
// `analyze` (§6): the one entry point the engine exposes. Sequences the
// five stages, threads progress/cancellation through them, and short-
// circuits to an empty result the moment an early stage has nothing left
// to hand the next one -- without relying on positional stage indices
// (§9, resolved open question).

use crate::core::blocking::build_blocks;
use crate::core::model::{DuplicateGroup, EngineOptions, FileDescriptor, FilenameParseResult, Stage};
use crate::core::normalize::normalize;
use crate::core::parser::parse_filename;
use crate::core::reader::{EncodingHint, FileReader, TextClassifier};
use crate::core::relation::{detect_exact, FileContext, RelationDetector};
use crate::core::cancel::CancellationToken;
use crate::util::constants::ABSOLUTE_MAX_PARALLELISM;
use crate::util::error::EngineError;
use std::collections::HashMap;

/// Progress callback: stage index, stage name, processed count, total count.
pub type ProgressFn<'a> = dyn FnMut(u8, &str, u64, u64) + 'a;

/// Run the full detection pipeline over one batch of descriptors.
///
/// Two invocations with the same descriptors and options produce
/// byte-identical output (§6 determinism contract): every stage sorts its
/// working set by `file_id` before doing anything order-sensitive.
pub fn analyze(
    descriptors: Vec<FileDescriptor>,
    options: EngineOptions,
    cancel: &CancellationToken,
    reader: &dyn FileReader,
    encoding_hint: &dyn EncodingHint,
    text_classifier: &dyn TextClassifier,
    mut progress: Option<&mut ProgressFn<'_>>,
) -> Result<Vec<DuplicateGroup>, EngineError> {
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    if descriptors.is_empty() {
        return Ok(Vec::new());
    }

    let mut working: Vec<FileDescriptor> = descriptors
        .into_iter()
        .filter(|d| d.size >= options.min_file_size)
        .collect();
    working.sort_by_key(|d| d.file_id);

    if working.is_empty() {
        return Ok(Vec::new());
    }

    // ---- Stage 1: filename parsing -----------------------------------
    let total = working.len() as u64;
    let mut parsed: Vec<(FileDescriptor, FilenameParseResult)> = Vec::with_capacity(working.len());
    for (processed, descriptor) in working.into_iter().enumerate() {
        let result = parse_filename(&descriptor.path, &descriptor.name);
        parsed.push((descriptor, result));
        report(&mut progress, Stage::FilenameParsing, processed as u64 + 1, total);
    }
    parsed.sort_by_key(|(d, _)| d.file_id);

    if parsed.is_empty() {
        return Ok(Vec::new());
    }

    let descriptors_by_id: HashMap<u64, FileDescriptor> =
        parsed.iter().map(|(d, _)| (d.file_id, d.clone())).collect();
    let parses_by_id: HashMap<u64, FilenameParseResult> =
        parsed.iter().map(|(d, p)| (d.file_id, p.clone())).collect();

    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    // ---- Stage 2: blocking --------------------------------------------
    let blocks = build_blocks(&parsed, options.confidence_threshold);
    report(&mut progress, Stage::Blocking, blocks.len() as u64, blocks.len() as u64);

    if blocks.is_empty() && !options.enable_exact {
        return Ok(Vec::new());
    }

    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    // ---- Stage 3 + 4: fingerprinting (on demand) + relation detection -
    report(&mut progress, Stage::Fingerprinting, 0, blocks.len() as u64);

    let detector = RelationDetector::new(reader, options.enable_containment, options.enable_version);
    let chunk_size = (options.max_parallelism.clamp(1, ABSOLUTE_MAX_PARALLELISM)) as usize;

    let mut relations = Vec::new();
    let mut blocks_done = 0u64;
    let total_blocks = blocks.len() as u64;

    for chunk in blocks.chunks(chunk_size) {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let chunk_results: Vec<Vec<crate::core::model::PairwiseRelation>> = run_chunk(chunk, &detector, &descriptors_by_id, &parses_by_id, encoding_hint, text_classifier);

        for result in chunk_results {
            relations.extend(result);
        }
        blocks_done += chunk.len() as u64;
        report(&mut progress, Stage::RelationDetection, blocks_done, total_blocks);
    }

    if options.enable_exact {
        let all_descriptors: Vec<FileDescriptor> = descriptors_by_id.values().cloned().collect();
        relations.extend(detect_exact(&all_descriptors, reader));
    }

    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    if relations.is_empty() {
        return Ok(Vec::new());
    }

    // ---- Stage 5: group normalization -----------------------------------
    let groups = normalize(&relations, &descriptors_by_id)?;
    report(&mut progress, Stage::GroupNormalization, groups.len() as u64, groups.len() as u64);

    Ok(groups)
}

fn run_chunk(
    chunk: &[crate::core::model::BlockingGroup],
    detector: &RelationDetector<'_>,
    descriptors_by_id: &HashMap<u64, FileDescriptor>,
    parses_by_id: &HashMap<u64, FilenameParseResult>,
    encoding_hint: &dyn EncodingHint,
    text_classifier: &dyn TextClassifier,
) -> Vec<Vec<crate::core::model::PairwiseRelation>> {
    use rayon::prelude::*;

    chunk
        .par_iter()
        .map(|block| {
            let mut files = HashMap::with_capacity(block.member_ids.len());
            for id in &block.member_ids {
                let (Some(descriptor), Some(parsed)) = (descriptors_by_id.get(id), parses_by_id.get(id)) else {
                    continue;
                };
                files.insert(
                    *id,
                    FileContext {
                        descriptor,
                        parsed,
                        is_text: text_classifier.is_text(*id),
                        encoding: encoding_hint.lookup(*id),
                    },
                );
            }
            detector.detect(block, &files)
        })
        .collect()
}

fn report(progress: &mut Option<&mut ProgressFn<'_>>, stage: Stage, processed: u64, total: u64) {
    if let Some(callback) = progress.as_mut() {
        callback(stage.index(), stage.name(), processed, total);
    }
    tracing::debug!(stage = stage.name(), processed, total, "Pipeline stage progress");
}
