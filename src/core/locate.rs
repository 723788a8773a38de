//! Property location inside raw JSON-with-comments text.
//!
//! `locate` maps a dotted path such as `Logging.LogLevel.Default` to the
//! byte span of that property's value in the original text, so a caller
//! can replace the value and leave every other byte (comments, spacing,
//! key order) untouched.
//!
//! The primary strategy is a small tokenizer that understands `//` and
//! `/* */` comments, single-quoted strings, barewords and trailing commas,
//! and walks the document tracking the full key path. Only when the text
//! cannot be tokenized at all does the locator fall back to the older
//! regex heuristic, which checks that parent keys appear in order before
//! the match and can therefore pick the wrong branch when siblings share
//! key names.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use smallvec::SmallVec;
use tracing::debug;

/// Byte range `[start, end)` of a value inside one specific text buffer.
/// Offsets are invalid as soon as the buffer is edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PropertySpan {
    pub start: usize,
    pub end: usize,
}

impl PropertySpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The spanned text.
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

/// Which strategy produced a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Exact,
    Heuristic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    pub span: PropertySpan,
    pub strategy: Strategy,
}

/// Lexing/structure errors of the exact strategy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocateError {
    #[error("unterminated string starting at byte {0}")]
    UnterminatedString(usize),
    #[error("unterminated block comment starting at byte {0}")]
    UnterminatedComment(usize),
    #[error("unexpected `{found}` at byte {at}")]
    Unexpected { at: usize, found: String },
    #[error("unexpected end of input")]
    Eof,
    #[error("nesting deeper than {max} levels at byte {0}", max = MAX_DEPTH)]
    TooDeep(usize),
}

/// Deepest object/array nesting the exact strategy walks.
pub const MAX_DEPTH: usize = 256;

/// UTF-8 byte order mark some editors put at the start of the file.
const BOM: char = '\u{FEFF}';

/// Find the value span of `path` in `text`.
pub fn locate(path: &str, text: &str) -> Option<PropertySpan> {
    locate_detailed(path, text).map(|l| l.span)
}

/// Like [`locate`], also reporting which strategy answered.
pub fn locate_detailed(path: &str, text: &str) -> Option<Located> {
    let segments = split_path(path)?;

    match locate_exact(&segments, text) {
        Ok(found) => found.map(|span| Located { span, strategy: Strategy::Exact }),
        Err(err) => {
            debug!(%path, error = %err, "text not tokenizable, using heuristic locator");
            locate_heuristic(&segments, text).map(|span| Located { span, strategy: Strategy::Heuristic })
        }
    }
}

/// Split a dotted path; `None` for an empty path or empty segment.
pub fn split_path(path: &str) -> Option<Vec<&str>> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    Some(segments)
}

// ---------------------------------------------------------------------------
// Exact strategy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Colon,
    Comma,
    Str,
    Bare,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    kind: Kind,
    start: usize,
    end: usize,
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

fn ends_bare(bytes: &[u8], i: usize) -> bool {
    let b = bytes[i];
    if is_space(b) || matches!(b, b'{' | b'}' | b'[' | b']' | b':' | b',' | b'"' | b'\'') {
        return true;
    }
    b == b'/' && matches!(bytes.get(i + 1), Some(b'/') | Some(b'*'))
}

/// Tokenize `text`, skipping whitespace and comments. Anything that is
/// not structure, a string or a comment becomes a bareword token, so only
/// unterminated strings and block comments fail. A leading byte order mark
/// counts as whitespace.
fn tokenize(text: &str) -> Result<Vec<Token>, LocateError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = if text.starts_with(BOM) { BOM.len_utf8() } else { 0 };

    while i < bytes.len() {
        let b = bytes[i];
        let single = match b {
            b'{' => Some(Kind::LBrace),
            b'}' => Some(Kind::RBrace),
            b'[' => Some(Kind::LBracket),
            b']' => Some(Kind::RBracket),
            b':' => Some(Kind::Colon),
            b',' => Some(Kind::Comma),
            _ => None,
        };
        if let Some(kind) = single {
            tokens.push(Token { kind, start: i, end: i + 1 });
            i += 1;
            continue;
        }

        if is_space(b) {
            i += 1;
            continue;
        }

        match (b, bytes.get(i + 1)) {
            (b'/', Some(b'/')) => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            (b'/', Some(b'*')) => {
                let start = i;
                i += 2;
                loop {
                    if i + 1 >= bytes.len() {
                        return Err(LocateError::UnterminatedComment(start));
                    }
                    if bytes[i] == b'*' && bytes[i + 1] == b'/' {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            }
            (b'"' | b'\'', _) => {
                let start = i;
                let quote = b;
                i += 1;
                loop {
                    match bytes.get(i) {
                        None => return Err(LocateError::UnterminatedString(start)),
                        Some(b'\\') => i += 2,
                        Some(&c) if c == quote => {
                            i += 1;
                            break;
                        }
                        Some(_) => i += 1,
                    }
                }
                tokens.push(Token { kind: Kind::Str, start, end: i.min(bytes.len()) });
            }
            _ => {
                let start = i;
                i += 1;
                while i < bytes.len() && !ends_bare(bytes, i) {
                    i += 1;
                }
                tokens.push(Token { kind: Kind::Bare, start, end: i });
            }
        }
    }

    Ok(tokens)
}

/// One step of a concrete key path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    fn matches(&self, target: &str) -> bool {
        match self {
            Segment::Key(k) => k == target,
            Segment::Index(i) => target.parse::<usize>() == Ok(*i),
        }
    }
}

struct Walker<'t, 'p> {
    text: &'t str,
    tokens: Vec<Token>,
    pos: usize,
    target: &'p [&'p str],
    path: SmallVec<[Segment; 8]>,
    depth: usize,
    found: Option<PropertySpan>,
}

impl Walker<'_, '_> {
    fn next(&mut self) -> Result<Token, LocateError> {
        let tok = self.tokens.get(self.pos).copied().ok_or(LocateError::Eof)?;
        self.pos += 1;
        Ok(tok)
    }

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn unexpected(&self, tok: Token) -> LocateError {
        LocateError::Unexpected { at: tok.start, found: self.text[tok.start..tok.end].to_string() }
    }

    fn on_target(&self) -> bool {
        self.path.len() == self.target.len()
            && self.path.iter().zip(self.target).all(|(seg, t)| seg.matches(t))
    }

    fn value(&mut self) -> Result<PropertySpan, LocateError> {
        let tok = self.next()?;
        let span = match tok.kind {
            Kind::LBrace | Kind::LBracket => {
                if self.depth >= MAX_DEPTH {
                    return Err(LocateError::TooDeep(tok.start));
                }
                self.depth += 1;
                let res = if tok.kind == Kind::LBrace { self.object(tok.start) } else { self.array(tok.start) };
                self.depth -= 1;
                res?
            }
            Kind::Str | Kind::Bare => PropertySpan { start: tok.start, end: tok.end },
            _ => return Err(self.unexpected(tok)),
        };

        if self.found.is_none() && self.on_target() {
            self.found = Some(span);
        }
        Ok(span)
    }

    fn object(&mut self, start: usize) -> Result<PropertySpan, LocateError> {
        loop {
            let tok = self.next()?;
            match tok.kind {
                Kind::RBrace => return Ok(PropertySpan { start, end: tok.end }),
                // Leading, doubled and trailing commas are tolerated.
                Kind::Comma => continue,
                Kind::Str | Kind::Bare => {
                    let key = decode_key(&self.text[tok.start..tok.end]);
                    match self.peek() {
                        Some(t) if t.kind == Kind::Colon => self.pos += 1,
                        Some(t) => return Err(self.unexpected(t)),
                        None => return Err(LocateError::Eof),
                    }
                    self.path.push(Segment::Key(key));
                    let res = self.value();
                    self.path.pop();
                    res?;
                }
                _ => return Err(self.unexpected(tok)),
            }
        }
    }

    fn array(&mut self, start: usize) -> Result<PropertySpan, LocateError> {
        let mut index = 0;
        loop {
            match self.peek() {
                None => return Err(LocateError::Eof),
                Some(t) if t.kind == Kind::RBracket => {
                    self.pos += 1;
                    return Ok(PropertySpan { start, end: t.end });
                }
                Some(t) if t.kind == Kind::Comma => {
                    self.pos += 1;
                }
                Some(_) => {
                    self.path.push(Segment::Index(index));
                    let res = self.value();
                    self.path.pop();
                    res?;
                    index += 1;
                }
            }
        }
    }
}

/// Key text without quotes, with JSON escapes decoded where possible.
fn decode_key(raw: &str) -> String {
    if raw.starts_with('"') {
        return serde_json::from_str::<String>(raw)
            .unwrap_or_else(|_| raw.trim_matches('"').to_string());
    }
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return raw[1..raw.len() - 1].to_string();
    }
    raw.to_string()
}

/// Exact strategy: walk the token stream tracking the full key path.
/// A structural error after the target was seen still returns the span.
fn locate_exact(segments: &[&str], text: &str) -> Result<Option<PropertySpan>, LocateError> {
    let tokens = tokenize(text)?;
    let mut walker = Walker {
        text,
        tokens,
        pos: 0,
        target: segments,
        path: SmallVec::new(),
        depth: 0,
        found: None,
    };

    match walker.value() {
        Ok(_) => Ok(walker.found),
        Err(_) if walker.found.is_some() => Ok(walker.found),
        Err(LocateError::Eof) if walker.tokens.is_empty() => Ok(None),
        Err(err) => Err(err),
    }
}

// ---------------------------------------------------------------------------
// Heuristic fallback
// ---------------------------------------------------------------------------

static VALUE_ALTERNATIVES: LazyLock<String> = LazyLock::new(|| {
    [
        r#""(?:[^"\\]|\\.)*""#,
        r"'[^']*'",
        r"-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?",
        r"true|false|null",
        r"\{[^{}]*\}",
        r"\[[^\[\]]*\]",
    ]
    .join("|")
});

/// Regex fallback: `"<last>" : <value>` where every parent key occurs in
/// order somewhere before the match. Non-nested object/array values only.
fn locate_heuristic(segments: &[&str], text: &str) -> Option<PropertySpan> {
    let (last, parents) = segments.split_last()?;
    let pattern = format!(r#"["']{}["']\s*:\s*({})"#, regex::escape(last), *VALUE_ALTERNATIVES);
    let property = Regex::new(&pattern).ok()?;

    let parent_patterns: Vec<Regex> = parents
        .iter()
        .map(|p| Regex::new(&format!(r#"["']{}["']\s*:"#, regex::escape(p))))
        .collect::<Result<_, _>>()
        .ok()?;

    for caps in property.captures_iter(text) {
        let whole = caps.get(0)?;
        let value = caps.get(1)?;
        let span = PropertySpan { start: value.start(), end: value.end() };

        let before = &text[..whole.start()];
        let mut last_found = 0;
        let in_context = parent_patterns.iter().all(|re| match re.find_at(before, last_found) {
            Some(m) => {
                last_found = m.start();
                true
            }
            None => false,
        });

        if in_context {
            return Some(span);
        }
    }

    None
}
