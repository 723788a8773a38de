//! Tolerant JSON parsing for hand-edited config files.
//!
//! Config files in the wild carry comments, trailing commas and stray
//! control characters. `parse` tries strict JSON first and then walks a
//! ladder of cumulative cleanup passes, stopping at the first one that
//! yields valid JSON. When every pass fails the caller gets a
//! [`ParseErrorMarker`] instead of an error, so something can always be
//! rendered.

use std::sync::LazyLock;

use miette::{Diagnostic, SourceSpan};
use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

const BOM: char = '\u{FEFF}';

/// Cleanup pass that made the text parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Repair {
    /// Strict JSON, untouched
    None,
    /// `//` and `/* */` comments removed
    Comments,
    /// Stray ASCII control characters removed
    ControlChars,
    /// CRLF normalized and trailing commas dropped
    TrailingCommas,
    /// Non-ASCII blanked and bad escapes repaired
    Aggressive,
    /// Line-by-line rebuild of the raw text
    LineByLine,
}

impl std::fmt::Display for Repair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Repair::None => "none",
            Repair::Comments => "comments",
            Repair::ControlChars => "control-chars",
            Repair::TrailingCommas => "trailing-commas",
            Repair::Aggressive => "aggressive",
            Repair::LineByLine => "line-by-line",
        };
        f.write_str(s)
    }
}

/// Terminal parse failure. Carries the last parser message and the
/// 1-based position it reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ParseErrorMarker {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseErrorMarker {
    /// Legacy object shape understood by older front-ends.
    pub fn to_value(&self) -> Value {
        json!({ "_parseError": true, "_errorMessage": self.message })
    }

    /// Labeled diagnostic pointing into the raw `source`.
    pub fn diagnostic(&self, name: &str, source: &str) -> ParseDiagnostic {
        // Positions are reported against the text without its byte order mark.
        let body = source.strip_prefix(BOM).unwrap_or(source);
        let offset = (source.len() - body.len()) + offset_for(body, self.line, self.column);
        ParseDiagnostic {
            name: name.to_string(),
            message: self.message.clone(),
            src: source.to_string(),
            span: (offset, 0).into(),
            help: "the file is not valid JSON even after comment, comma and control-character cleanup"
                .to_string(),
        }
    }
}

#[derive(Debug, Diagnostic, thiserror::Error)]
#[error("could not parse {name}: {message}")]
#[diagnostic(code(cfgpatch::parse))]
pub struct ParseDiagnostic {
    pub name: String,
    pub message: String,

    #[source_code]
    pub src: String,

    #[label("parser gave up here")]
    pub span: SourceSpan,

    #[help]
    pub help: String,
}

/// Result of a tolerant parse.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed { value: Value, repair: Repair },
    Failed(ParseErrorMarker),
}

impl ParseOutcome {
    pub fn value(&self) -> Option<&Value> {
        match self {
            ParseOutcome::Parsed { value, .. } => Some(value),
            ParseOutcome::Failed(_) => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, ParseOutcome::Parsed { .. })
    }

    /// Value to render: the parsed document, or the legacy error object.
    pub fn into_display_value(self) -> Value {
        match self {
            ParseOutcome::Parsed { value, .. } => value,
            ParseOutcome::Failed(marker) => marker.to_value(),
        }
    }
}

/// Parse `text`, degrading through the cleanup ladder. Never panics and
/// never returns an error; see [`ParseOutcome`]. A leading byte order
/// mark is ignored.
pub fn parse(text: &str) -> ParseOutcome {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return ParseOutcome::Parsed { value, repair: Repair::None };
    }

    let no_comments = strip_comments(text);
    if let Ok(value) = serde_json::from_str::<Value>(&no_comments) {
        return parsed(value, Repair::Comments);
    }

    let no_controls = strip_control_chars(&no_comments);
    if let Ok(value) = serde_json::from_str::<Value>(&no_controls) {
        return parsed(value, Repair::ControlChars);
    }

    let no_commas = strip_trailing_commas(&no_controls.replace("\r\n", "\n"));
    if let Ok(value) = serde_json::from_str::<Value>(&no_commas) {
        return parsed(value, Repair::TrailingCommas);
    }

    let aggressive = aggressive_clean(&no_commas);
    if let Ok(value) = serde_json::from_str::<Value>(&aggressive) {
        return parsed(value, Repair::Aggressive);
    }

    let rebuilt = line_by_line(text);
    match serde_json::from_str::<Value>(&rebuilt) {
        Ok(value) => parsed(value, Repair::LineByLine),
        Err(err) => {
            debug!(error = %err, "all tolerant parse attempts failed");
            ParseOutcome::Failed(ParseErrorMarker {
                message: err.to_string(),
                line: err.line(),
                column: err.column(),
            })
        }
    }
}

fn parsed(value: Value, repair: Repair) -> ParseOutcome {
    debug!(%repair, "tolerant parse succeeded after cleanup");
    ParseOutcome::Parsed { value, repair }
}

/// Remove `//` and `/* */` comments outside string literals. Newlines
/// inside comments are kept so line numbers stay meaningful.
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        let next = chars.peek().copied();
        match (c, next) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                // Line comment: drop up to (not including) the newline.
                while let Some(&n) = chars.peek() {
                    if n == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for n in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    if n == '\n' {
                        out.push('\n');
                    }
                    prev = n;
                }
            }
            _ => out.push(c),
        }
    }

    out
}

fn is_stray_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}')
}

/// Drop ASCII control characters other than tab, LF and CR.
pub fn strip_control_chars(text: &str) -> String {
    text.chars().filter(|&c| !is_stray_control(c)).collect()
}

/// Drop commas directly followed (after whitespace) by `}` or `]`,
/// outside string literals.
pub fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = text[i + 1..].chars().find(|n| !n.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

static BAD_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([^\\])\\([^"\\/bfnrtu])"#).expect("static regex"));

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("static regex"));

/// Blank everything outside printable ASCII, then drop the backslash of
/// escapes JSON does not know.
fn aggressive_clean(text: &str) -> String {
    let ascii: String = text
        .chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { ' ' })
        .collect();
    BAD_ESCAPE.replace_all(&ascii, "$1$2").into_owned()
}

/// Last resort on the raw text: cut each line at `//`, drop control
/// characters and `\r`, rejoin and drop trailing commas.
fn line_by_line(text: &str) -> String {
    let joined = text
        .split('\n')
        .map(|line| {
            let line = match line.find("//") {
                Some(idx) => &line[..idx],
                None => line,
            };
            line.chars().filter(|&c| c != '\r' && !is_stray_control(c)).collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n");
    TRAILING_COMMA.replace_all(&joined, "$1").into_owned()
}

/// Byte offset of a 1-based (line, column) in `source`, clamped.
fn offset_for(source: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    for (idx, l) in source.split_inclusive('\n').enumerate() {
        if idx + 1 == line {
            let col = column.saturating_sub(1).min(l.trim_end_matches('\n').len());
            let mut at = offset + col;
            while !source.is_char_boundary(at) {
                at -= 1;
            }
            return at;
        }
        offset += l.len();
    }
    source.len()
}
