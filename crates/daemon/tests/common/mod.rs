#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use ownerpulse_api_client::{FetchCapability, FetchError, FetchResponse};
use serde_json::{Value, json};
use tokio::sync::Notify;

/// One scripted answer for a collection request.
pub enum Step {
    Page(Value),
    /// Answer with `Page` only after the notify fires.
    Gated(Arc<Notify>, Value),
    Status(u16),
    /// Answer with `Status` only after the notify fires.
    GatedStatus(Arc<Notify>, u16),
    Transport,
}

/// In-memory stand-in for the authenticated fetch capability.
///
/// Collection requests pop steps in order; an exhausted script answers with
/// an empty last page. `assignable-users` answers from `users`.
pub struct ScriptedFetch {
    steps: Mutex<VecDeque<Step>>,
    users: Mutex<Option<Value>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedFetch {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            users: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn with_users(steps: Vec<Step>, users: Value) -> Arc<Self> {
        let fetch = Self::new(steps);
        *fetch.users.lock().unwrap() = Some(users);
        fetch
    }

    pub fn push(&self, step: Step) {
        self.steps.lock().unwrap().push_back(step);
    }

    /// Collection paths requested so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl FetchCapability for ScriptedFetch {
    async fn get(&self, path: &str) -> Result<FetchResponse, FetchError> {
        if path == "assignable-users" {
            let users = self.users.lock().unwrap().clone();
            return match users {
                Some(users) => Ok(FetchResponse::json(&users)),
                None => Ok(FetchResponse::new(503, "lookup unavailable")),
            };
        }

        self.requests.lock().unwrap().push(path.to_string());
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            None => Ok(FetchResponse::json(&json!([]))),
            Some(Step::Page(body)) => Ok(FetchResponse::json(&body)),
            Some(Step::Gated(gate, body)) => {
                gate.notified().await;
                Ok(FetchResponse::json(&body))
            }
            Some(Step::Status(status)) => Ok(FetchResponse::new(status, "upstream error")),
            Some(Step::GatedStatus(gate, status)) => {
                gate.notified().await;
                Ok(FetchResponse::new(status, "upstream error"))
            }
            Some(Step::Transport) => Err(FetchError::Transport("connection reset".to_string())),
        }
    }
}

/// `{ items, nextCursor }` envelope.
pub fn envelope(items: Vec<Value>, next_cursor: Option<i64>) -> Value {
    json!({ "items": items, "nextCursor": next_cursor })
}

/// Yield until `fetch` has seen `count` collection requests.
pub async fn wait_for_requests(fetch: &ScriptedFetch, count: usize) {
    while fetch.request_count() < count {
        tokio::task::yield_now().await;
    }
}
