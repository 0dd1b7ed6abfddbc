// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_AERODATABOX_URL: &str = "https://aerodatabox.p.rapidapi.com";
pub const DEFAULT_AERODATABOX_HOST: &str = "aerodatabox.p.rapidapi.com";
pub const DEFAULT_GOFLIGHTLABS_URL: &str = "https://api.goflightlabs.com";
const DEFAULT_CACHE_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub aerodatabox_base_url: String,
    pub aerodatabox_host: String,
    pub aerodatabox_api_key: Option<String>,
    pub goflightlabs_base_url: String,
    /// Secondary lookup source is disabled while this is unset.
    pub goflightlabs_api_key: Option<String>,
    /// Minimum gap between two outbound calls, across the whole run.
    pub rate_limit_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub forward_search_days: u32,
    /// Fields edited locally within this many seconds are not overwritten.
    pub local_edit_guard_secs: u64,
    pub registration_cache_ttl_hours: i64,
    pub registration_cache_max_entries: usize,
    pub sync_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            aerodatabox_base_url: DEFAULT_AERODATABOX_URL.to_string(),
            aerodatabox_host: DEFAULT_AERODATABOX_HOST.to_string(),
            aerodatabox_api_key: None,
            goflightlabs_base_url: DEFAULT_GOFLIGHTLABS_URL.to_string(),
            goflightlabs_api_key: None,
            rate_limit_delay_ms: 1200,
            request_timeout_secs: 30,
            forward_search_days: 3,
            local_edit_guard_secs: 5,
            registration_cache_ttl_hours: DEFAULT_CACHE_TTL_HOURS,
            registration_cache_max_entries: 1000,
            sync_url: None,
        }
    }
}

impl EngineConfig {
    pub fn default_path() -> PathBuf {
        crate::get_config_root().join("config.json")
    }

    /// Missing file yields defaults; a file that exists but does not parse
    /// is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn local_edit_guard(&self) -> Duration {
        Duration::from_secs(self.local_edit_guard_secs)
    }

    /// Out-of-range or non-positive values fall back to the default TTL.
    pub fn registration_cache_ttl(&self) -> chrono::Duration {
        Some(self.registration_cache_ttl_hours)
            .filter(|h| *h > 0)
            .and_then(chrono::Duration::try_hours)
            .unwrap_or_else(|| chrono::Duration::hours(DEFAULT_CACHE_TTL_HOURS))
    }

    pub fn cache_path(&self) -> PathBuf {
        crate::get_config_root().join("registration_cache.json")
    }
}
