use ownerpulse_core::OwnerId;
use serde::Deserialize;

use crate::fetch::{FetchCapability, FetchError};

/// Path of the owner-name lookup endpoint.
pub const ASSIGNABLE_USERS_PATH: &str = "assignable-users";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssignableUser {
    pub id: OwnerId,
    #[serde(default)]
    pub name: String,
}

/// `GET assignable-users` → `[{ id, name }]`.
pub async fn fetch_assignable_users<F: FetchCapability>(
    fetch: &F,
) -> Result<Vec<AssignableUser>, FetchError> {
    let resp = fetch.get(ASSIGNABLE_USERS_PATH).await?;
    if !resp.ok() {
        return Err(FetchError::from_response(&resp));
    }
    serde_json::from_slice(&resp.body).map_err(|e| FetchError::Decode(e.to_string()))
}
