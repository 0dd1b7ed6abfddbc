// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Boundary to the externally owned slot (tile) state.
//!
//! The engine reads a snapshot through [`SlotRegistry`], writes once through
//! [`SyncPush`], and asks an [`EditGuard`] which fields a human touched a
//! moment ago. Two adapters are provided: a JSON file snapshot and the
//! HTTP sync endpoint.

use crate::reconciler::SlotField;
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Sync transport error: {0}")]
    Transport(String),
    #[error("Sync endpoint rejected the update ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        SyncError::Transport(e.to_string())
    }
}

/// The five fields the engine manages on a slot. Any other field the UI
/// keeps on the slot rides along in `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SlotFields {
    pub arrival_time: String,
    pub departure_time: String,
    #[serde(alias = "routeText")]
    pub route: String,
    pub origin_code: String,
    pub dest_code: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SlotFields {
    pub fn get(&self, field: SlotField) -> &str {
        match field {
            SlotField::ArrivalTime => &self.arrival_time,
            SlotField::DepartureTime => &self.departure_time,
            SlotField::Route => &self.route,
            SlotField::OriginCode => &self.origin_code,
            SlotField::DestCode => &self.dest_code,
        }
    }

    pub fn set(&mut self, field: SlotField, value: String) {
        let slot = match field {
            SlotField::ArrivalTime => &mut self.arrival_time,
            SlotField::DepartureTime => &mut self.departure_time,
            SlotField::Route => &mut self.route,
            SlotField::OriginCode => &mut self.origin_code,
            SlotField::DestCode => &mut self.dest_code,
        };
        *slot = value;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: String,
    /// As typed by the operator; may be empty or unnormalized.
    #[serde(default)]
    pub registration: String,
    #[serde(default)]
    pub fields: SlotFields,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Slot {
    pub fn new(id: &str, registration: &str, fields: SlotFields) -> Self {
        Self {
            id: id.to_string(),
            registration: registration.to_string(),
            fields,
            extra: Map::new(),
        }
    }
}

pub trait SlotRegistry {
    fn list_slots(&self) -> Result<Vec<Slot>, SyncError>;
}

pub trait SyncPush {
    /// One aggregated write for the whole run, keyed by field id.
    fn push_field_updates(&self, updates: &BTreeMap<String, String>) -> Result<(), SyncError>;
}

pub trait EditGuard {
    fn is_guarded(&self, field_id: &str) -> bool;
}

/// Guard that never blocks anything.
pub struct NoGuard;

impl EditGuard for NoGuard {
    fn is_guarded(&self, _field_id: &str) -> bool {
        false
    }
}

/// Fields written locally within `window` are guarded.
#[derive(Debug, Clone)]
pub struct RecentEdits {
    window: Duration,
    edits: HashMap<String, DateTime<Utc>>,
}

impl RecentEdits {
    pub fn new(window: std::time::Duration) -> Self {
        Self {
            window: Duration::from_std(window).unwrap_or_else(|_| Duration::seconds(5)),
            edits: HashMap::new(),
        }
    }

    pub fn record(&mut self, field_id: &str, edited_at: DateTime<Utc>) {
        self.edits.insert(field_id.to_string(), edited_at);
    }

    pub fn is_guarded_at(&self, field_id: &str, now: DateTime<Utc>) -> bool {
        self.edits
            .get(field_id)
            .is_some_and(|edited| now - *edited < self.window)
    }
}

impl EditGuard for RecentEdits {
    fn is_guarded(&self, field_id: &str) -> bool {
        self.is_guarded_at(field_id, Utc::now())
    }
}

// --- file-backed store ----------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalEdit {
    #[serde(default)]
    pub value: String,
    pub edited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSnapshot {
    #[serde(default)]
    pub slots: Vec<Slot>,
    #[serde(default)]
    pub local_edits: BTreeMap<String, LocalEdit>,
    /// Settings and anything else the UI stores beside the slots.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// JSON snapshot `{slots:[…], localEdits:{…}}` on disk.
pub struct FileSlotStore {
    path: PathBuf,
    guard: RecentEdits,
    // Serializes read-modify-write of the file within this process.
    write_lock: Mutex<()>,
}

impl FileSlotStore {
    pub fn open(path: &Path, guard_window: std::time::Duration) -> anyhow::Result<Self> {
        let snapshot = Self::read_snapshot(path)?;
        let mut guard = RecentEdits::new(guard_window);
        for (field_id, edit) in &snapshot.local_edits {
            guard.record(field_id, edit.edited_at);
        }

        Ok(Self {
            path: path.to_path_buf(),
            guard,
            write_lock: Mutex::new(()),
        })
    }

    /// A missing file is an empty board.
    pub fn read_snapshot(path: &Path) -> anyhow::Result<SlotSnapshot> {
        if !path.exists() {
            return Ok(SlotSnapshot::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read slot file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse slot file {}", path.display()))
    }

    pub fn write_snapshot(path: &Path, snapshot: &SlotSnapshot) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create slot file directory")?;
        }
        let content = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write slot file {}", path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<SlotSnapshot, SyncError> {
        if !self.path.exists() {
            return Ok(SlotSnapshot::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl SlotRegistry for FileSlotStore {
    fn list_slots(&self) -> Result<Vec<Slot>, SyncError> {
        Ok(self.load()?.slots)
    }
}

impl SyncPush for FileSlotStore {
    fn push_field_updates(&self, updates: &BTreeMap<String, String>) -> Result<(), SyncError> {
        let _held = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut snapshot = self.load()?;
        let mut applied = 0usize;

        for (field_id, value) in updates {
            let Some((field, slot_id)) = SlotField::parse_field_id(field_id) else {
                debug!("Ignoring unknown field id — field={}", field_id);
                continue;
            };
            if let Some(slot) = snapshot.slots.iter_mut().find(|s| s.id == slot_id) {
                slot.fields.set(field, value.clone());
                applied += 1;
            } else {
                debug!("Ignoring update for missing slot — field={}", field_id);
            }
        }

        let content = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&self.path, content)?;
        info!(
            "Slot file updated — path={} fields={}",
            self.path.display(),
            applied
        );
        Ok(())
    }
}

impl EditGuard for FileSlotStore {
    fn is_guarded(&self, field_id: &str) -> bool {
        self.guard.is_guarded(field_id)
    }
}

// --- HTTP sync endpoint ---------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncMetadata<'a> {
    timestamp: i64,
    last_writer: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncBody<'a> {
    metadata: SyncMetadata<'a>,
    settings: Map<String, Value>,
    field_updates: &'a BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct SyncReply {
    #[serde(default)]
    error: Option<String>,
}

/// Posts the aggregated field map to the shared sync endpoint.
pub struct HttpSyncPush {
    client: reqwest::blocking::Client,
    url: String,
    writer: String,
}

impl HttpSyncPush {
    pub fn new(url: &str, writer: &str, timeout: std::time::Duration) -> Result<Self, SyncError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            writer: writer.to_string(),
        })
    }
}

fn sync_body<'a>(
    writer: &'a str,
    updates: &'a BTreeMap<String, String>,
    now: DateTime<Utc>,
) -> SyncBody<'a> {
    SyncBody {
        metadata: SyncMetadata {
            timestamp: now.timestamp_millis(),
            last_writer: writer,
        },
        settings: Map::new(),
        field_updates: updates,
    }
}

impl SyncPush for HttpSyncPush {
    fn push_field_updates(&self, updates: &BTreeMap<String, String>) -> Result<(), SyncError> {
        debug!("Sync push — url={} fields={}", self.url, updates.len());

        let response = self
            .client
            .post(&self.url)
            .json(&sync_body(&self.writer, updates, Utc::now()))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            let message = serde_json::from_str::<SyncReply>(&text)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or(text);
            return Err(SyncError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}
