//! Lenient JSON payload parsing and path lookup.

use std::fmt;

use serde_json::Value;

/// Parses the JSON value at the start of `text`.
///
/// Anything after the first balanced `{…}` / `[…]` is ignored (scripts often
/// continue with `;(function(){…})()`), and bare `undefined` tokens outside
/// strings are read as `null`.
pub fn parse_payload(text: &str) -> Result<Value, String> {
    let text = text.trim_start();
    let span = balanced_span(text).ok_or_else(|| {
        let head: String = text.chars().take(40).collect();
        format!("no balanced JSON value at {head:?}")
    })?;
    let cleaned = replace_undefined(span);
    serde_json::from_str(&cleaned).map_err(|e| format!("invalid JSON payload: {e}"))
}

/// Prefix of `text` holding one balanced object or array, string-aware.
pub(crate) fn balanced_span(text: &str) -> Option<&str> {
    let mut chars = text.char_indices();
    let (_, open) = chars.next()?;
    if open != '{' && open != '[' {
        return None;
    }

    let mut depth = 1usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in chars {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Rewrites the JavaScript literal `undefined` to `null` outside strings.
fn replace_undefined(text: &str) -> String {
    const WORD: &str = "undefined";
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < text.len() {
        let c = bytes[i];
        if in_string {
            match c {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
        } else if c == b'"' {
            in_string = true;
        } else if text[i..].starts_with(WORD) {
            let before_ok = i == 0 || !is_ident_byte(bytes[i - 1]);
            let after = i + WORD.len();
            let after_ok = after >= bytes.len() || !is_ident_byte(bytes[after]);
            if before_ok && after_ok {
                out.push_str("null");
                i = after;
                continue;
            }
        }
        // Copy one full char; multi-byte chars never match the ASCII cases above.
        let len = text[i..].chars().next().map(char::len_utf8).unwrap_or(1);
        out.push_str(&text[i..i + len]);
        i += len;
    }
    out
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(isize),
}

/// Dotted path into a JSON value: `data.dash.video`, `note.noteDetailMap[-1].note`.
///
/// Negative indices count from the end; an index applied to an object picks
/// the n-th entry in document order. `{id}` inside a key is replaced with the
/// resource id at lookup time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    source: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(path: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        for part in path.split('.').map(str::trim) {
            if part.is_empty() {
                return Err(format!("empty segment in path {path:?}"));
            }
            let (key, mut rest) = match part.find('[') {
                Some(i) => (&part[..i], &part[i..]),
                None => (part, ""),
            };
            if !key.is_empty() {
                segments.push(Segment::Key(key.to_string()));
            }
            while let Some(inner) = rest.strip_prefix('[') {
                let close = inner
                    .find(']')
                    .ok_or_else(|| format!("unclosed '[' in path {path:?}"))?;
                let index = inner[..close]
                    .trim()
                    .parse::<isize>()
                    .map_err(|_| format!("bad index {:?} in path {path:?}", &inner[..close]))?;
                segments.push(Segment::Index(index));
                rest = &inner[close + 1..];
            }
            if !rest.is_empty() {
                return Err(format!("unexpected {rest:?} in path {path:?}"));
            }
        }
        if segments.is_empty() {
            return Err(format!("empty path {path:?}"));
        }
        Ok(Self {
            source: path.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Looks the path up in `value`, substituting `{id}` with `id`.
    pub fn lookup<'v>(&self, value: &'v Value, id: &str) -> Option<&'v Value> {
        self.segments
            .iter()
            .try_fold(value, |current, segment| match segment {
                Segment::Key(key) if key.contains("{id}") => {
                    current.get(key.replace("{id}", id).as_str())
                }
                Segment::Key(key) => current.get(key.as_str()),
                Segment::Index(index) => nth(current, *index),
            })
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn nth(value: &Value, index: isize) -> Option<&Value> {
    let len = match value {
        Value::Array(a) => a.len(),
        Value::Object(o) => o.len(),
        _ => return None,
    };
    let i = if index < 0 {
        len.checked_sub(index.unsigned_abs())?
    } else {
        index as usize
    };
    match value {
        Value::Array(a) => a.get(i),
        Value::Object(o) => o.values().nth(i),
        _ => None,
    }
}
