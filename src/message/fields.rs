//! Scalar field extraction over a single NDJSON line
//!
//! The CLI's event schema is narrow and shallow, so events are read with a
//! key scanner instead of a JSON parser. Every higher-level extraction in
//! [`super::parser`] and [`super::content`] is built on [`find_field_from`].
//!
//! A key matches only where `"key"` is followed by optional whitespace and a
//! `:`. The value after the colon is one of a quoted string (escapes honored
//! while scanning), `null`, a nested object or array (not descended into),
//! or a bare token such as a number or boolean.

/// A scalar value found after a key
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    /// Quoted string, already unescaped
    Str(String),
    /// Literal `null`
    Null,
    /// Object or array; only its position is known
    Nested,
    /// Unquoted token (number, `true`, `false`)
    Bare(&'a str),
}

impl FieldValue<'_> {
    /// The string value, if quoted
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Text of a quoted string or bare token
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Bare(token) => Some(token),
            Self::Null | Self::Nested => None,
        }
    }

    /// Unsigned integer from a bare token or a quoted number
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        self.as_text()?.trim().parse().ok()
    }

    /// Float from a bare token or a quoted number
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.as_text()?.trim().parse().ok()
    }

    /// Boolean from `true`/`false`
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self.as_text()? {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }
}

/// A located field
#[derive(Debug, Clone, PartialEq)]
pub struct Field<'a> {
    /// Byte offset of the opening quote of the key
    pub key_start: usize,
    /// Byte offset just past the value (for nested values, the opening bracket)
    pub end: usize,
    /// The value
    pub value: FieldValue<'a>,
}

/// Find `key` anywhere in `line` and return its value
#[must_use]
pub fn find_field<'a>(line: &'a str, key: &str) -> Option<FieldValue<'a>> {
    find_field_from(line, key, 0).map(|field| field.value)
}

/// Find the first `key` at or after byte offset `from` and return it located
#[must_use]
pub fn find_field_from<'a>(line: &'a str, key: &str, from: usize) -> Option<Field<'a>> {
    let (key_start, value_start) = find_key(line, key, from)?;
    let (value, end) = scan_value(line, value_start)?;
    Some(Field {
        key_start,
        end,
        value,
    })
}

/// Find a `"type":"<kind>"` marker at or after `from`
///
/// Returns the byte offset just past the marker's closing quote.
#[must_use]
pub fn find_type_marker(line: &str, kind: &str, from: usize) -> Option<usize> {
    let mut pos = from;
    while let Some(field) = find_field_from(line, "type", pos) {
        if field.value.as_str() == Some(kind) {
            return Some(field.end);
        }
        pos = field.end.max(field.key_start + 1);
    }
    None
}

/// Locate `"key"` followed by a colon
///
/// Returns `(key_start, value_start)` where `value_start` is the first
/// non-space byte after the colon.
pub(crate) fn find_key(line: &str, key: &str, from: usize) -> Option<(usize, usize)> {
    let needle = format!("\"{key}\"");
    let bytes = line.as_bytes();
    let mut search = from;

    while search <= line.len() {
        let key_start = search + line.get(search..)?.find(&needle)?;
        let mut pos = skip_spaces(bytes, key_start + needle.len());
        if bytes.get(pos) == Some(&b':') {
            pos = skip_spaces(bytes, pos + 1);
            return Some((key_start, pos));
        }
        search = key_start + 1;
    }
    None
}

fn skip_spaces(bytes: &[u8], mut pos: usize) -> usize {
    while matches!(bytes.get(pos), Some(b' ' | b'\t' | b'\r')) {
        pos += 1;
    }
    pos
}

/// Classify and read the value starting at `start`
fn scan_value(line: &str, start: usize) -> Option<(FieldValue<'_>, usize)> {
    let bytes = line.as_bytes();
    match *bytes.get(start)? {
        b'"' => {
            let close = closing_quote(bytes, start + 1)?;
            let raw = &line[start + 1..close];
            Some((FieldValue::Str(unescape(raw)), close + 1))
        }
        b'{' | b'[' => Some((FieldValue::Nested, start)),
        _ => {
            let len = line[start..]
                .find(|c: char| matches!(c, ',' | '}' | ']') || c.is_whitespace())
                .unwrap_or(line.len() - start);
            if len == 0 {
                return None;
            }
            let token = &line[start..start + len];
            if token == "null" {
                Some((FieldValue::Null, start + len))
            } else {
                Some((FieldValue::Bare(token), start + len))
            }
        }
    }
}

/// Offset of the first unescaped `"` at or after `pos`
///
/// A backslash always consumes the following byte, so `\"` and `\\` are
/// both two-byte escapes.
fn closing_quote(bytes: &[u8], mut pos: usize) -> Option<usize> {
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'"' => return Some(pos),
            _ => pos += 1,
        }
    }
    None
}

/// Undo the four escapes the agent's text actually uses
///
/// `\n`, `\t`, `\"` and `\\` are decoded; any other escape is kept as written.
#[must_use]
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
