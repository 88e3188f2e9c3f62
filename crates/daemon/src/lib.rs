pub mod config;
pub mod controller;
pub mod dashboard;
pub mod store;

pub use controller::{ScanController, ScanOptions, ScanOutcome};
pub use dashboard::Dashboard;
pub use store::{Generation, ScanPhase, ScanState, ScanStore};
