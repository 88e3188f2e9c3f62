use std::sync::Arc;

use ownerpulse_core::{Cursor, Page, PageBody};
use tracing::{debug, warn};

use crate::fetch::{FetchCapability, FetchError};

/// Reads one page of a remote collection at a time.
pub struct PageReader<F> {
    fetch: Arc<F>,
    collection: String,
}

impl<F: FetchCapability> PageReader<F> {
    pub fn new(fetch: Arc<F>, collection: &str) -> Self {
        Self {
            fetch,
            collection: collection.trim_matches('/').to_string(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// `{collection}?take={take}[&cursor={cursor}]`, the cursor percent-encoded.
    pub fn page_path(&self, cursor: Option<&Cursor>, take: u32) -> String {
        match cursor {
            Some(cursor) => format!(
                "{}?take={take}&cursor={}",
                self.collection,
                urlencoding::encode(cursor.as_str())
            ),
            None => format!("{}?take={take}", self.collection),
        }
    }

    /// Fetch and normalize one page. `take` is passed through unchecked.
    ///
    /// Non-2xx answers and transport failures come back as `Err`; a body
    /// that fits neither page shape yields an empty last page.
    pub async fn fetch_page(&self, cursor: Option<&Cursor>, take: u32) -> Result<Page, FetchError> {
        let path = self.page_path(cursor, take);
        let resp = self.fetch.get(&path).await?;
        if !resp.ok() {
            return Err(FetchError::from_response(&resp));
        }

        let body = PageBody::decode(&resp.body);
        if body.is_malformed() {
            warn!(path = %path, "Page body is neither an item array nor an envelope, treating as empty");
        }
        let page = body.into_page();
        debug!(
            path = %path,
            records = page.records.len(),
            next = ?page.next,
            "Fetched page"
        );
        Ok(page)
    }
}
