use std::future::Future;

/// Raw answer from the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 200 response carrying `value` as its JSON body.
    pub fn json(value: &serde_json::Value) -> Self {
        Self::new(200, value.to_string())
    }

    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl FetchError {
    pub fn from_response(resp: &FetchResponse) -> Self {
        Self::Status {
            status: resp.status,
            body: resp.body_text(),
        }
    }
}

/// An authenticated GET bound to a base URL.
///
/// The session layer owns authentication; callers only pass paths relative
/// to the base URL (`leads?take=100`). Non-2xx answers are returned as
/// responses, transport failures as [`FetchError`].
pub trait FetchCapability: Send + Sync {
    fn get(&self, path: &str) -> impl Future<Output = Result<FetchResponse, FetchError>> + Send;
}
