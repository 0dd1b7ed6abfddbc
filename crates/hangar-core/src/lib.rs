// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Overnight aircraft stay detection and hangar tile reconciliation.
//!
//! A run flows strictly through four stages:
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │  Collector  │───▶│  Resolver   │───▶│ Classifier  │───▶│ Reconciler  │
//! │ (4 slices)  │    │ (reg chain) │    │   (pure)    │    │ (diff+push) │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//!        │                  │
//!        └──── RunContext ──┘  (rate-limit clock, quota flag)
//! ```

pub mod cache;
pub mod classifier;
pub mod collector;
pub mod config;
pub mod context;
pub mod engine;
pub mod model;
pub mod provider;
pub mod reconciler;
pub mod registration;
pub mod resolver;
pub mod slots;

use std::path::PathBuf;
use thiserror::Error;

pub use context::RunContext;
pub use engine::{OvernightEngine, RunRequest, RunSummary};
pub use model::{OvernightRecord, OvernightType, QueryWindow, RawFlight, ResolvedFlight};
pub use registration::{normalize_flight_number, normalize_registration, Registration};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid run request: {0}")]
    InvalidRequest(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Directory holding `config.json` and the registration cache.
pub fn get_config_root() -> PathBuf {
    directories::ProjectDirs::from("org", "hangar-planner", "HangarPlanner")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".hangar-planner"))
}
