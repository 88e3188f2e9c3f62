use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// JSON field holding the owner reference of a record.
pub const OWNER_FIELD: &str = "ownerId";
/// JSON field holding the creation timestamp of a record.
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Normalized owner identifier.
///
/// Owners arrive as strings, numbers or `null`; all of them collapse into a
/// string key. Missing and blank owners become [`OwnerId::UNASSIGNED`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub const UNASSIGNED: &'static str = "unassigned";

    /// Non-blank ids are kept exactly as sent, so `" 1"` and `"1"` stay
    /// distinct owners.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        if id.trim().is_empty() {
            Self::unassigned()
        } else {
            Self(id)
        }
    }

    pub fn unassigned() -> Self {
        Self(Self::UNASSIGNED.to_string())
    }

    pub fn is_unassigned(&self) -> bool {
        self.0 == Self::UNASSIGNED
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Normalize a raw JSON owner reference.
    ///
    /// Arrays and objects are not valid owner references and count as unassigned.
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) => Self::new(s.as_str()),
            Some(Value::Number(n)) => Self::new(number_key(n)),
            Some(Value::Bool(b)) => Self::new(b.to_string()),
            _ => Self::unassigned(),
        }
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for OwnerId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<i64> for OwnerId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<i32> for OwnerId {
    fn from(value: i32) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for OwnerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(Self::from_json(value.as_ref()))
    }
}

/// `1` and `1.0` name the same owner.
fn number_key(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            (f as i64).to_string()
        }
        _ => n.to_string(),
    }
}

/// The slice of a remote item the aggregator cares about.
///
/// Items are decoded leniently: anything that is not an object still counts
/// as a record, just without an owner or timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub owner_id: OwnerId,
    pub created_at: Option<String>,
}

impl Record {
    pub fn new(owner_id: impl Into<OwnerId>, created_at: Option<&str>) -> Self {
        Self {
            owner_id: owner_id.into(),
            created_at: created_at.map(str::to_string),
        }
    }

    pub fn from_value(value: &Value) -> Self {
        let field = |name: &str| value.as_object().and_then(|obj| obj.get(name));
        Self {
            owner_id: OwnerId::from_json(field(OWNER_FIELD)),
            created_at: field(CREATED_AT_FIELD)
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}
