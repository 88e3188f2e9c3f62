pub mod client;
pub mod fetch;
pub mod page_reader;
pub mod users;

pub use client::ApiClient;
pub use fetch::{FetchCapability, FetchError, FetchResponse};
pub use ownerpulse_core;
pub use page_reader::PageReader;
pub use users::{AssignableUser, fetch_assignable_users};
