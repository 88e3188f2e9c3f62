use crate::record::{OwnerId, Record};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

/// Record with the given owner and optional raw `createdAt`.
pub fn record(owner: impl Into<OwnerId>, created_at: Option<&str>) -> Record {
    Record::new(owner, created_at)
}

/// Remote item JSON as the collection API would return it.
pub fn item(owner: impl Into<Value>, created_at: Option<&str>) -> Value {
    let owner: Value = owner.into();
    json!({
        "id": next_id(),
        "ownerId": owner,
        "createdAt": created_at,
    })
}

/// Parse an RFC 3339 instant; panics on malformed input.
pub fn at(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .unwrap_or_else(|e| panic!("bad test timestamp {raw:?}: {e}"))
        .with_timezone(&Utc)
}

fn next_id() -> u32 {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}
