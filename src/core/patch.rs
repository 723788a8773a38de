//! Surgical value replacement in JSON-with-comments text.
//!
//! Changes are applied to the *original* text, never to a re-serialized
//! document: only the value span of each located property is replaced and
//! every other byte is kept. Each change re-locates against the current
//! buffer, so earlier edits cannot shift later offsets.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use similar::TextDiff;
use tracing::{debug, warn};

use crate::core::locate::{PropertySpan, locate, split_path};

/// One requested edit: dotted path plus new JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChange {
    pub path: String,
    pub value: Value,
}

impl PendingChange {
    pub fn new(path: impl Into<String>, value: Value) -> Self {
        Self { path: path.into(), value }
    }
}

/// A replacement for one span of a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanEdit {
    pub span: PropertySpan,
    pub replacement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpliceError {
    #[error("span {start}..{end} lies outside a buffer of {len} bytes")]
    OutOfBounds { start: usize, end: usize, len: usize },
    #[error("span {start}..{end} does not fall on character boundaries")]
    NotCharBoundary { start: usize, end: usize },
    #[error("spans {first:?} and {second:?} overlap")]
    Overlap { first: PropertySpan, second: PropertySpan },
}

/// Why a change was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotFound,
    InvalidPath,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedChange {
    pub path: String,
    pub reason: SkipReason,
}

/// Result of applying a batch of changes to one buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchOutcome {
    pub text: String,
    pub applied: Vec<String>,
    pub skipped: Vec<SkippedChange>,
}

impl PatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// JSON encoding of a replacement value: strings quoted and escaped,
/// scalars literal, containers compact.
pub fn serialize_value(value: &Value) -> String {
    value.to_string()
}

/// Apply span edits to `text`. Edits are applied from the highest start
/// offset down, so no edit moves another's offsets. Overlaps are refused.
pub fn splice(text: &str, edits: &[SpanEdit]) -> Result<String, SpliceError> {
    let mut ordered: Vec<&SpanEdit> = edits.iter().collect();
    ordered.sort_by(|a, b| b.span.start.cmp(&a.span.start).then(b.span.end.cmp(&a.span.end)));

    for e in &ordered {
        let PropertySpan { start, end } = e.span;
        if start > end || end > text.len() {
            return Err(SpliceError::OutOfBounds { start, end, len: text.len() });
        }
        if !text.is_char_boundary(start) || !text.is_char_boundary(end) {
            return Err(SpliceError::NotCharBoundary { start, end });
        }
    }
    for pair in ordered.windows(2) {
        let (later, earlier) = (pair[0].span, pair[1].span);
        if earlier.end > later.start {
            return Err(SpliceError::Overlap { first: earlier, second: later });
        }
    }

    let mut out = text.to_string();
    for e in ordered {
        out.replace_range(e.span.start..e.span.end, &e.replacement);
    }
    Ok(out)
}

/// Replace the value at `path`; `None` when the path cannot be located.
pub fn patch_value(text: &str, path: &str, value: &Value) -> Option<String> {
    let span = locate(path, text)?;
    let edit = SpanEdit { span, replacement: serialize_value(value) };
    splice(text, std::slice::from_ref(&edit)).ok()
}

/// Apply `changes` in order. Unlocatable paths are skipped and reported;
/// the remaining changes still apply.
pub fn apply_changes(text: &str, changes: &[PendingChange]) -> PatchOutcome {
    let mut current = text.to_string();
    let mut applied = Vec::new();
    let mut skipped = Vec::new();

    for change in changes {
        if split_path(&change.path).is_none() {
            warn!(path = %change.path, "skipping change with an invalid property path");
            skipped.push(SkippedChange { path: change.path.clone(), reason: SkipReason::InvalidPath });
            continue;
        }

        match patch_value(&current, &change.path, &change.value) {
            Some(next) => {
                debug!(path = %change.path, "applied change");
                current = next;
                applied.push(change.path.clone());
            }
            None => {
                warn!(path = %change.path, "could not find property in the JSON content");
                skipped.push(SkippedChange { path: change.path.clone(), reason: SkipReason::NotFound });
            }
        }
    }

    PatchOutcome { text: current, applied, skipped }
}

/// Navigate a parsed document by dotted path. Numeric segments index
/// arrays.
pub fn read_path<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    split_path(path)?.into_iter().try_fold(value, |cur, seg| match cur {
        Value::Object(map) => map.get(seg),
        Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Set a value in a parsed document by dotted path, creating missing
/// intermediate objects. Returns false when the path runs into a scalar
/// or an out-of-range array index.
pub fn set_path(root: &mut Value, path: &str, new: Value) -> bool {
    let Some(segments) = split_path(path) else {
        return false;
    };
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };

    let mut cur = root;
    for seg in parents {
        cur = match cur {
            Value::Object(map) => map.entry(seg.to_string()).or_insert_with(|| Value::Object(Map::new())),
            Value::Array(items) => match seg.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                Some(v) => v,
                None => return false,
            },
            _ => return false,
        };
    }

    match cur {
        Value::Object(map) => {
            map.insert(last.to_string(), new);
            true
        }
        Value::Array(items) => match last.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
            Some(slot) => {
                *slot = new;
                true
            }
            None => false,
        },
        _ => false,
    }
}

/// Unified diff between two versions of a file, for previews.
pub fn render_diff(label: &str, old: &str, new: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{label}"), &format!("b/{label}"))
        .to_string()
}
