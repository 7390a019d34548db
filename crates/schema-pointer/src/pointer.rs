// RFC 6901 JSON Pointer

use crate::error::{PointerError, PointerResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A segment in a path (object key or array index)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object property key
    Key(String),
    /// Array index
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, "{}", k),
            PathSegment::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<&String> for PathSegment {
    fn from(key: &String) -> Self {
        PathSegment::Key(key.clone())
    }
}

/// A JSON Pointer: a sequence of unescaped reference tokens.
///
/// Segments are stored unescaped; `~0`/`~1` escaping only happens when the
/// pointer is parsed from or written to text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsonPointer {
    segments: Vec<String>,
}

impl JsonPointer {
    /// The empty pointer, referring to the whole document
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pointer from already-unescaped segments
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        Self {
            segments: segments
                .into_iter()
                .map(|s| s.into().to_string())
                .collect(),
        }
    }

    /// Parse the textual form (`""`, `"/a/b~1c"`)
    pub fn parse(text: &str) -> PointerResult<Self> {
        if text.is_empty() {
            return Ok(Self::new());
        }
        let Some(rest) = text.strip_prefix('/') else {
            return Err(PointerError::MissingLeadingSlash(text.to_string()));
        };

        let mut segments = Vec::new();
        let mut offset = 1;
        for raw in rest.split('/') {
            segments.push(unescape(raw, text, offset)?);
            offset += raw.len() + 1;
        }
        Ok(Self { segments })
    }

    /// Parse a pointer carried in a URI fragment (`#/properties/a%20b`).
    ///
    /// The leading `#` is optional. Percent-escapes are decoded before the
    /// pointer escapes.
    pub fn from_uri_fragment(fragment: &str) -> PointerResult<Self> {
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
        let decoded = percent_decode(fragment)
            .ok_or_else(|| PointerError::InvalidPercentEncoding(fragment.to_string()))?;
        Self::parse(&decoded)
    }

    /// The unescaped segments of this pointer
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The last segment, if any
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Append a segment in place
    pub fn push(&mut self, segment: impl Into<PathSegment>) {
        self.segments.push(segment.into().to_string());
    }

    /// Remove the last segment in place
    pub fn pop(&mut self) -> Option<String> {
        self.segments.pop()
    }

    /// A new pointer with one more segment
    pub fn child(&self, segment: impl Into<PathSegment>) -> Self {
        let mut next = self.clone();
        next.push(segment);
        next
    }

    /// A new pointer with all of `other`'s segments appended
    pub fn join(&self, other: &JsonPointer) -> Self {
        let mut segments = Vec::with_capacity(self.len() + other.len());
        segments.extend(self.segments.iter().cloned());
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Whether `prefix` is a leading part of this pointer
    pub fn starts_with(&self, prefix: &JsonPointer) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Follow the pointer into `value`
    pub fn resolve<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        self.segments
            .iter()
            .try_fold(value, |current, segment| match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => parse_index(segment).and_then(|i| items.get(i)),
                _ => None,
            })
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            f.write_str("/")?;
            for c in segment.chars() {
                match c {
                    '~' => f.write_str("~0")?,
                    '/' => f.write_str("~1")?,
                    _ => write!(f, "{}", c)?,
                }
            }
        }
        Ok(())
    }
}

impl FromStr for JsonPointer {
    type Err = PointerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for JsonPointer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for JsonPointer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Array indices are decimal without leading zeros
fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || (segment.len() > 1 && segment.starts_with('0')) {
        return None;
    }
    if !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

fn unescape(raw: &str, pointer: &str, offset: usize) -> PointerResult<String> {
    if !raw.contains('~') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some((_, '0')) => out.push('~'),
            Some((_, '1')) => out.push('/'),
            _ => {
                return Err(PointerError::InvalidEscape {
                    pointer: pointer.to_string(),
                    offset: offset + i,
                });
            }
        }
    }
    Ok(out)
}

fn percent_decode(text: &str) -> Option<String> {
    if !text.contains('%') {
        return Some(text.to_string());
    }
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = text.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
