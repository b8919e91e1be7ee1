// noveldup - core/parser.rs
//
// Filename parsing (§4.1). Extracts a normalized series title and one or
// more episode range segments from a bundle's filename using a cascade of
// patterns, from most to least structured. Never fails: the cascade always
// bottoms out at a fallback that treats the filename stem as the title.

use crate::core::model::{FilenameParseResult, ParseMethod, RangeSegment, SegmentKind};
use crate::util::constants;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Counting units recognized after an episode number (화, 권, 장, 회, 부).
const UNITS: &str = "화|권|장|회|부";

/// Closed list of status words stripped from titles and collected as tags.
/// Longest-first so e.g. "완결" isn't swallowed by a shorter "완" match.
const STATUS_WORDS: &[&str] = &[
    "완전판",
    "완결",
    "완본",
    "에필로그",
    "에필",
    "완",
    "完",
    "후기",
    "complete",
    "finished",
    "afterword",
    "epilogue",
    "end",
];

const COMPLETE_WORDS: &[&str] = &["완", "완결", "완전판", "완본", "完", "complete", "finished", "end"];
const EPILOGUE_WORDS: &[&str] = &["후기", "에필", "에필로그", "epilogue", "afterword"];

/// Named kinds recognized by the multi-segment pattern (§4.1 attempt 1).
const NAMED_KIND_ALT: &str = r"본편|외전|에필|후기|\d+부";

fn multi_segment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?x)
            ^(?P<title>.+?)\s+
            (?P<kind1>{NAMED_KIND_ALT})\s+(?P<a1>\d+)\s*-\s*(?P<b1>\d+)
            (?:\s+(?P<kind2>{NAMED_KIND_ALT})\s+(?P<a2>\d+)\s*-\s*(?P<b2>\d+))?
            (?P<tail>.*)$
            "
        ))
        .expect("static multi-segment pattern compiles")
    })
}

fn range_hyphen_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?x)
            ^(?P<title>.+?)\s+
            (?P<a>\d+)\s*-\s*(?P<b>\d+)
            \s*(?P<unit>{UNITS})?
            (?P<tail>.*)$
            "
        ))
        .expect("static range-hyphen pattern compiles")
    })
}

fn range_tilde_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?x)
            ^(?P<title>.+?)\s+
            (?P<a>\d+)\s*~\s*(?P<b>\d+)
            \s*(?P<unit>{UNITS})?
            (?P<tail>.*)$
            "
        ))
        .expect("static range-tilde pattern compiles")
    })
}

fn single_range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?x)
            ^(?P<title>.+?)\s+
            (?P<n>\d+)(?P<unit>{UNITS})
            \s*$
            "
        ))
        .expect("static single-range pattern compiles")
    })
}

fn heuristic_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*[-~]\s*(\d+)").expect("static heuristic pattern compiles"))
}

fn paren_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([^()]*)\)").expect("static paren-tag pattern compiles"))
}

fn bracket_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\[\]]*)\]").expect("static bracket-tag pattern compiles"))
}

fn at_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@(\S+)").expect("static at-tag pattern compiles"))
}

fn status_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Word-alternation, NOT a character class: a class over the status
        // words' bytes would match stray Hangul jamo inside unrelated titles.
        let alt = STATUS_WORDS
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!(r"(?i)\b(?:{alt})\b")).expect("static status-word pattern compiles")
    })
}

/// Parse one filename into a [`FilenameParseResult`]. Always succeeds.
pub fn parse_filename(path: &Path, name: &str) -> FilenameParseResult {
    let stem = strip_extension(name);

    let attempts: [fn(&str) -> Option<(String, Vec<RangeSegment>, f64)>; 4] = [
        try_multi_segment,
        try_range_hyphen,
        try_range_tilde,
        try_single_range,
    ];

    let mut best: Option<(String, Vec<RangeSegment>, f64, ParseMethod)> = None;
    for attempt in attempts {
        if let Some((title, segments, confidence)) = attempt(stem) {
            best = Some((title, segments, confidence, ParseMethod::Pattern));
            break;
        }
    }

    if best.is_none() {
        if let Some((title, segments)) = try_heuristic(stem) {
            best = Some((title, segments, constants::CONFIDENCE_HEURISTIC, ParseMethod::Heuristic));
        }
    }

    let (raw_title, segments, confidence, parse_method) = best.unwrap_or_else(|| {
        (
            fallback_title(stem),
            Vec::new(),
            constants::CONFIDENCE_FALLBACK,
            ParseMethod::Fallback,
        )
    });

    let (series_title_norm, mut tags) = normalize_title(&raw_title);
    // Tags can also appear in the tail captured alongside the matched range
    // (e.g. a trailing "(완결)" after "1-114"); collect from the whole stem
    // so nothing is missed regardless of which attempt matched.
    for tag in collect_tags(stem) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    let is_complete = tags.iter().any(|t| word_in(t, COMPLETE_WORDS));
    let is_epilogue_included = tags.iter().any(|t| word_in(t, EPILOGUE_WORDS));

    let primary = segments.iter().find(|s| s.kind == SegmentKind::Primary).cloned();
    let (range_start, range_end, range_unit) = match &primary {
        Some(seg) => (Some(seg.start), Some(seg.end), seg.unit.clone()),
        None => (None, None, None),
    };

    tracing::debug!(
        path = %path.display(),
        title = %series_title_norm,
        confidence,
        method = ?parse_method,
        segments = segments.len(),
        "Filename parsed"
    );

    FilenameParseResult {
        series_title_norm,
        segments,
        range_start,
        range_end,
        range_unit,
        tags,
        is_complete,
        is_epilogue_included,
        confidence,
        parse_method,
    }
}

fn word_in(tag: &str, list: &[&str]) -> bool {
    let lower = tag.to_lowercase();
    list.iter().any(|w| w.to_lowercase() == lower)
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        // Only treat it as an extension if something precedes the dot and
        // the suffix looks like a short alphanumeric extension, not e.g. a
        // version number embedded in the title.
        Some(idx) if idx > 0 && name.len() - idx <= 6 => &name[..idx],
        _ => name,
    }
}

fn parse_range(a: &str, b: &str) -> Option<(u32, u32)> {
    let a: u32 = a.parse().ok()?;
    let b: u32 = b.parse().ok()?;
    if a > b {
        return None;
    }
    Some((a, b))
}

fn try_multi_segment(stem: &str) -> Option<(String, Vec<RangeSegment>, f64)> {
    let caps = multi_segment_re().captures(stem)?;
    let title = caps.name("title")?.as_str().trim().to_string();
    let (a1, b1) = parse_range(&caps["a1"], &caps["b1"])?;
    let mut segments = vec![RangeSegment {
        kind: SegmentKind::Named(caps["kind1"].to_string()),
        start: a1,
        end: b1,
        unit: None,
    }];

    if let (Some(kind2), Some(a2), Some(b2)) = (caps.name("kind2"), caps.name("a2"), caps.name("b2")) {
        if let Some((a2, b2)) = parse_range(a2.as_str(), b2.as_str()) {
            segments.push(RangeSegment {
                kind: SegmentKind::Named(kind2.as_str().to_string()),
                start: a2,
                end: b2,
                unit: None,
            });
        }
    }

    if title.is_empty() {
        return None;
    }
    Some((title, segments, constants::CONFIDENCE_MULTI_SEGMENT))
}

fn try_range_hyphen(stem: &str) -> Option<(String, Vec<RangeSegment>, f64)> {
    let caps = range_hyphen_re().captures(stem)?;
    let title = caps.name("title")?.as_str().trim().to_string();
    let (a, b) = parse_range(&caps["a"], &caps["b"])?;
    if title.is_empty() {
        return None;
    }
    let unit = caps.name("unit").map(|m| m.as_str().to_string());
    let segments = vec![RangeSegment {
        kind: SegmentKind::Primary,
        start: a,
        end: b,
        unit,
    }];
    Some((title, segments, constants::CONFIDENCE_RANGE_HYPHEN))
}

fn try_range_tilde(stem: &str) -> Option<(String, Vec<RangeSegment>, f64)> {
    let caps = range_tilde_re().captures(stem)?;
    let title = caps.name("title")?.as_str().trim().to_string();
    let (a, b) = parse_range(&caps["a"], &caps["b"])?;
    if title.is_empty() {
        return None;
    }
    let unit = caps.name("unit").map(|m| m.as_str().to_string());
    let segments = vec![RangeSegment {
        kind: SegmentKind::Primary,
        start: a,
        end: b,
        unit,
    }];
    Some((title, segments, constants::CONFIDENCE_RANGE_TILDE))
}

fn try_single_range(stem: &str) -> Option<(String, Vec<RangeSegment>, f64)> {
    let caps = single_range_re().captures(stem)?;
    let title = caps.name("title")?.as_str().trim().to_string();
    let n: u32 = caps["n"].parse().ok()?;
    if title.is_empty() {
        return None;
    }
    let unit = caps["unit"].to_string();
    let segments = vec![RangeSegment {
        kind: SegmentKind::Primary,
        start: n,
        end: n,
        unit: Some(unit),
    }];
    Some((title, segments, constants::CONFIDENCE_SINGLE_RANGE))
}

fn try_heuristic(stem: &str) -> Option<(String, Vec<RangeSegment>)> {
    let m = heuristic_re().find(stem)?;
    let caps = heuristic_re().captures(stem)?;
    let (a, b) = parse_range(&caps[1], &caps[2])?;
    let title = stem[..m.start()].trim().to_string();
    if title.is_empty() {
        return None;
    }
    Some((
        title,
        vec![RangeSegment {
            kind: SegmentKind::Primary,
            start: a,
            end: b,
            unit: None,
        }],
    ))
}

fn fallback_title(stem: &str) -> String {
    let mut s = paren_tag_re().replace_all(stem, " ").to_string();
    s = bracket_tag_re().replace_all(&s, " ").to_string();
    s = at_tag_re().replace_all(&s, " ").to_string();
    collapse_whitespace(&s)
}

/// Strip bracketed/parenthesized tags, `@token`s, and status words from a
/// raw title candidate, collapse whitespace, and lowercase it.
fn normalize_title(raw: &str) -> (String, Vec<String>) {
    let mut tags = collect_tags(raw);
    let mut s = paren_tag_re().replace_all(raw, " ").to_string();
    s = bracket_tag_re().replace_all(&s, " ").to_string();
    s = at_tag_re().replace_all(&s, " ").to_string();
    s = status_word_re().replace_all(&s, " ").to_string();
    let norm = collapse_whitespace(&s).to_lowercase();
    tags.sort();
    tags.dedup();
    (norm, tags)
}

/// Collect tag strings (original form) from parentheses, brackets, `@token`,
/// and the closed status-word list.
fn collect_tags(s: &str) -> Vec<String> {
    let mut tags = Vec::new();
    for caps in paren_tag_re().captures_iter(s) {
        let inner = caps[1].trim();
        if !inner.is_empty() {
            tags.push(inner.to_string());
        }
    }
    for caps in bracket_tag_re().captures_iter(s) {
        let inner = caps[1].trim();
        if !inner.is_empty() {
            tags.push(inner.to_string());
        }
    }
    for caps in at_tag_re().captures_iter(s) {
        tags.push(caps[1].to_string());
    }
    for m in status_word_re().find_iter(s) {
        tags.push(m.as_str().to_string());
    }
    tags
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
