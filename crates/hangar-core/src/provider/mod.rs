// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Flight data providers consumed by the engine.
//!
//! Implementations only translate wire formats; rate limiting and the
//! quota flag live in [`crate::RunContext`], which wraps every call.

pub mod aerodatabox;
pub mod goflightlabs;

use crate::model::RawFlight;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Provider returned error status: {status}")]
    Status { status: u16 },
    #[error("Provider quota exceeded")]
    QuotaExceeded,
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Transport(e.to_string())
    }
}

/// 429 is the quota signal; every other non-2xx is a plain status failure.
pub(crate) fn check_status(status: reqwest::StatusCode) -> Result<(), ProviderError> {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        Err(ProviderError::QuotaExceeded)
    } else if !status.is_success() {
        Err(ProviderError::Status {
            status: status.as_u16(),
        })
    } else {
        Ok(())
    }
}

/// Result of a flight-number lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AircraftLookup {
    pub registration: String,
    pub aircraft_type: Option<String>,
}

/// Lists every movement at an airport inside a bounded time span.
pub trait AirportSchedule: Send + Sync {
    fn name(&self) -> &str;

    /// `from`/`to` are UTC; the span must not exceed the provider's cap.
    fn list_airport_flights(
        &self,
        airport: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<RawFlight>, ProviderError>;
}

/// Maps a flight number on a given date to the operating aircraft.
pub trait FlightLookup: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` means the provider answered but knows no aircraft.
    fn lookup_flight_number(
        &self,
        flight_number: &str,
        date: NaiveDate,
    ) -> Result<Option<AircraftLookup>, ProviderError>;
}

/// Accepts `"2025-08-03 14:10Z"`, `"2025-08-03 14:10"` and RFC 3339.
/// Anything else is treated as missing.
pub fn parse_provider_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let trimmed = raw.trim_end_matches('Z');
    ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}
