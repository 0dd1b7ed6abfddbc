// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::model::RegistrationSource;
use crate::registration::Registration;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub registration: Registration,
    pub source: RegistrationSource,
    pub cached_at: DateTime<Utc>,
}

const CURRENT_CACHE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    entries: HashMap<String, CacheEntry>,
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            version: CURRENT_CACHE_VERSION,
            entries: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub total: usize,
    pub expired: usize,
}

/// Flight-number → registration cache, keyed `"{FLIGHT}_{YYYY-MM-DD}"`.
#[derive(Debug, Clone)]
pub struct RegistrationCache {
    path: PathBuf,
    ttl: Duration,
    max_entries: usize,
    data: CacheFile,
}

pub fn cache_key(flight_number: &str, date: NaiveDate) -> String {
    format!("{}_{}", flight_number, date.format("%Y-%m-%d"))
}

impl RegistrationCache {
    pub fn new(path: PathBuf, ttl: Duration, max_entries: usize) -> Self {
        Self {
            path,
            ttl,
            max_entries,
            data: CacheFile::default(),
        }
    }

    /// Unreadable files and version mismatches yield an empty cache.
    pub fn load(path: &Path, ttl: Duration, max_entries: usize) -> Self {
        let mut cache = Self::new(path.to_path_buf(), ttl, max_entries);

        if path.exists() {
            if let Ok(content) = std::fs::read_to_string(path) {
                if let Ok(data) = serde_json::from_str::<CacheFile>(&content) {
                    if data.version == CURRENT_CACHE_VERSION {
                        cache.data = data;
                    } else {
                        debug!(
                            "Discarding registration cache — path={} version={}",
                            path.display(),
                            data.version
                        );
                    }
                }
            }
        }

        cache
    }

    /// Drops expired entries and keeps the newest `max_entries` on disk.
    pub fn save(&mut self) -> Result<()> {
        self.purge_expired(Utc::now());
        self.enforce_cap();

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create cache directory")?;
        }
        let content =
            serde_json::to_string_pretty(&self.data).context("Failed to serialize cache")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.data.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.entries.is_empty()
    }

    pub fn get(&self, flight_number: &str, date: NaiveDate) -> Option<&CacheEntry> {
        self.get_at(flight_number, date, Utc::now())
    }

    pub fn get_at(
        &self,
        flight_number: &str,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Option<&CacheEntry> {
        self.data
            .entries
            .get(&cache_key(flight_number, date))
            .filter(|e| !self.is_expired(e, now))
    }

    pub fn insert(
        &mut self,
        flight_number: &str,
        date: NaiveDate,
        registration: Registration,
        source: RegistrationSource,
    ) {
        self.insert_at(flight_number, date, registration, source, Utc::now());
    }

    pub fn insert_at(
        &mut self,
        flight_number: &str,
        date: NaiveDate,
        registration: Registration,
        source: RegistrationSource,
        now: DateTime<Utc>,
    ) {
        self.data.entries.insert(
            cache_key(flight_number, date),
            CacheEntry {
                registration,
                source,
                cached_at: now,
            },
        );
    }

    pub fn clear(&mut self) {
        self.data.entries.clear();
    }

    pub fn stats(&self, now: DateTime<Utc>) -> CacheStats {
        CacheStats {
            total: self.data.entries.len(),
            expired: self
                .data
                .entries
                .values()
                .filter(|e| self.is_expired(e, now))
                .count(),
        }
    }

    pub fn purge_expired(&mut self, now: DateTime<Utc>) {
        let ttl = self.ttl;
        self.data.entries.retain(|_, e| now - e.cached_at < ttl);
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now - entry.cached_at >= self.ttl
    }

    fn enforce_cap(&mut self) {
        if self.data.entries.len() <= self.max_entries {
            return;
        }
        let mut by_age: Vec<(String, DateTime<Utc>)> = self
            .data
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.cached_at))
            .collect();
        // Newest first; key breaks ties so the cut is stable.
        by_age.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        for (key, _) in by_age.into_iter().skip(self.max_entries) {
            self.data.entries.remove(&key);
        }
    }
}
