use crate::record::Record;
use serde_json::Value;
use std::fmt;

/// Opaque position in the remote collection, echoed back as `cursor=`.
///
/// Numbers keep their JSON text (integral floats drop the `.0`); strings are
/// kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for Cursor {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What an envelope says about the page after it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NextCursor {
    /// Absent or falsy (`null`, `false`, `0`, `""`): this was the last page.
    #[default]
    End,
    At(Cursor),
    /// Present and truthy, but an array or object that cannot be sent back.
    Unreadable(String),
}

impl NextCursor {
    pub fn from_json(value: Option<&Value>) -> Self {
        let Some(value) = value else {
            return Self::End;
        };
        match value {
            Value::Null | Value::Bool(false) => Self::End,
            Value::Bool(true) => Self::At(Cursor::from(1)),
            Value::Number(n) => match number_text(n) {
                Some(text) => Self::At(Cursor(text)),
                None => Self::End,
            },
            Value::String(s) if s.is_empty() => Self::End,
            Value::String(s) => Self::At(Cursor(s.clone())),
            Value::Array(_) | Value::Object(_) => Self::Unreadable(value.to_string()),
        }
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        match self {
            Self::At(cursor) => Some(cursor),
            _ => None,
        }
    }
}

/// `None` for zero, which is falsy.
fn number_text(n: &serde_json::Number) -> Option<String> {
    if let Some(i) = n.as_i64() {
        return (i != 0).then(|| i.to_string());
    }
    if n.is_u64() {
        return Some(n.to_string());
    }
    let f = n.as_f64()?;
    if f == 0.0 {
        return None;
    }
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        return Some((f as i64).to_string());
    }
    Some(n.to_string())
}

/// One page of records plus where to continue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub records: Vec<Record>,
    pub next: NextCursor,
}

impl Page {
    pub fn next_cursor(&self) -> Option<&Cursor> {
        self.next.cursor()
    }

    pub fn is_last(&self) -> bool {
        self.next_cursor().is_none()
    }
}

/// The shapes a collection endpoint may answer with.
#[derive(Debug, Clone, PartialEq)]
pub enum PageBody {
    /// A bare JSON array: the whole collection, no further pages.
    Bare(Vec<Value>),
    /// `{ "items": [...], "nextCursor": ... }`.
    Envelope { items: Vec<Value>, next: NextCursor },
    /// Anything else. Yields no records and ends the walk.
    Malformed,
}

impl PageBody {
    pub fn decode(bytes: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => Self::from_value(value),
            Err(_) => Self::Malformed,
        }
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::Bare(items),
            Value::Object(mut obj) => {
                let items = match obj.remove("items") {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                };
                let next = NextCursor::from_json(obj.get("nextCursor"));
                Self::Envelope { items, next }
            }
            _ => Self::Malformed,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed)
    }

    pub fn into_page(self) -> Page {
        let (items, next) = match self {
            Self::Bare(items) => (items, NextCursor::End),
            Self::Envelope { items, next } => (items, next),
            Self::Malformed => (Vec::new(), NextCursor::End),
        };
        Page {
            records: items.iter().map(Record::from_value).collect(),
            next,
        }
    }
}
