//! Shared scanner configuration types.
//!
//! `ownerpulse-daemon` reads `ownerpulse.toml` into these types. Every field
//! has a serde default so a partial (or empty) file is valid.

use serde::{Deserialize, Serialize};

/// Canonical config file name.
pub const CONFIG_FILE_NAME: &str = "ownerpulse.toml";

/// Largest page the collection endpoint hands out.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Top-level scanner configuration (persisted as `ownerpulse.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PulseConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub scan: ScanSettings,
    #[serde(default)]
    pub calendar: CalendarSettings,
    #[serde(default)]
    pub identity: IdentitySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Collection path under the server URL, e.g. `leads`.
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_take")]
    pub take: u32,
    /// Hard stop for the page loop, whatever the upstream cursor says.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_recent_window_days")]
    pub recent_window_days: u32,
    /// Full re-scan cadence for the daemon. `0` scans once and exits.
    #[serde(default = "default_rescan_interval_secs")]
    pub rescan_interval_secs: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            take: default_take(),
            max_pages: default_max_pages(),
            recent_window_days: default_recent_window_days(),
            rescan_interval_secs: default_rescan_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarSettings {
    /// `local`, `utc` or a fixed offset such as `+02:00`.
    #[serde(default = "default_zone")]
    pub zone: String,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            zone: default_zone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IdentitySettings {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub display_name: String,
}

// ── Serde default functions ─────────────────────────────────────────────

fn default_server_url() -> String {
    "http://localhost:3000".to_string()
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_collection() -> String {
    "records".to_string()
}
fn default_take() -> u32 {
    MAX_PAGE_SIZE
}
fn default_max_pages() -> u32 {
    200
}
fn default_recent_window_days() -> u32 {
    7
}
fn default_rescan_interval_secs() -> u64 {
    300
}
fn default_zone() -> String {
    "local".to_string()
}

/// Clamp values the upstream would reject or the loop cannot honor.
/// Returns true when any field was updated.
pub fn apply_compat_fallbacks(config: &mut PulseConfig) -> bool {
    let mut changed = false;

    let take = config.scan.take.clamp(1, MAX_PAGE_SIZE);
    if take != config.scan.take {
        config.scan.take = take;
        changed = true;
    }

    if config.scan.max_pages == 0 {
        config.scan.max_pages = 1;
        changed = true;
    }

    let collection = config.scan.collection.trim().trim_matches('/');
    if collection.is_empty() {
        config.scan.collection = default_collection();
        changed = true;
    } else if collection.len() != config.scan.collection.len() {
        config.scan.collection = collection.to_string();
        changed = true;
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg: PulseConfig = toml::from_str("").expect("parse toml");
        assert_eq!(cfg.scan.take, 100);
        assert_eq!(cfg.scan.max_pages, 200);
        assert_eq!(cfg.scan.recent_window_days, 7);
        assert_eq!(cfg.scan.collection, "records");
        assert_eq!(cfg.calendar.zone, "local");
        assert_eq!(cfg.server.timeout_secs, 15);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: PulseConfig = toml::from_str(
            r#"
[scan]
collection = "leads"

[calendar]
zone = "+02:00"
"#,
        )
        .expect("parse toml");
        assert_eq!(cfg.scan.collection, "leads");
        assert_eq!(cfg.scan.take, 100);
        assert_eq!(cfg.calendar.zone, "+02:00");
        assert_eq!(cfg.server.url, "http://localhost:3000");
    }

    #[test]
    fn apply_compat_fallbacks_clamps_scan_settings() {
        let mut cfg = PulseConfig::default();
        cfg.scan.take = 500;
        cfg.scan.max_pages = 0;
        cfg.scan.collection = "/leads/".to_string();

        assert!(apply_compat_fallbacks(&mut cfg));
        assert_eq!(cfg.scan.take, 100);
        assert_eq!(cfg.scan.max_pages, 1);
        assert_eq!(cfg.scan.collection, "leads");

        assert!(!apply_compat_fallbacks(&mut cfg));
    }

    #[test]
    fn default_config_roundtrips() {
        let toml_str = toml::to_string_pretty(&PulseConfig::default()).expect("serialize");
        let parsed: PulseConfig = toml::from_str(&toml_str).expect("parse toml");
        assert_eq!(parsed.scan.rescan_interval_secs, 300);
        assert_eq!(parsed.calendar.zone, "local");
    }
}
