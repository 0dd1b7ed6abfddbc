// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use super::{check_status, AircraftLookup, FlightLookup, ProviderError};
use crate::config::EngineConfig;
use crate::EngineError;
use chrono::NaiveDate;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
struct ScheduleResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    data: Vec<ScheduleItem>,
    /// Either a plain string or `{ "message": ..., "code": ... }`.
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ScheduleItem {
    #[serde(default)]
    reg_number: Option<String>,
    #[serde(default)]
    aircraft_icao: Option<String>,
}

fn error_text(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("info"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

fn mentions_limit(text: &str) -> bool {
    let lower = text.to_lowercase();
    ["limit", "quota", "too many requests"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// Parses a `/schedules` answer. An error object that talks about usage
/// limits is the quota signal; any other error object means "no data".
pub fn parse_schedule_lookup(body: &str) -> Result<Option<AircraftLookup>, ProviderError> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let response: ScheduleResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;

    if let Some(error) = &response.error {
        let text = error_text(error);
        if mentions_limit(&text) {
            return Err(ProviderError::QuotaExceeded);
        }
        debug!("GoFlightLabs returned an error object — error={}", text);
        return Ok(None);
    }
    if response.success == Some(false) {
        return Ok(None);
    }

    Ok(response.data.into_iter().find_map(|item| {
        let registration = item.reg_number?.trim().to_string();
        if registration.is_empty() {
            return None;
        }
        Some(AircraftLookup {
            registration,
            aircraft_type: item.aircraft_icao.filter(|t| !t.trim().is_empty()),
        })
    }))
}

/// Secondary registration source.
pub struct GoFlightLabsClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl GoFlightLabsClient {
    /// Returns `Ok(None)` when no key is configured; the source is then
    /// simply left out of the fallback chain.
    pub fn from_config(config: &EngineConfig) -> Result<Option<Self>, EngineError> {
        let api_key = match config
            .goflightlabs_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
        {
            Some(k) => k.to_string(),
            None => return Ok(None),
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| EngineError::Config(format!("GoFlightLabs HTTP client: {}", e)))?;

        Ok(Some(Self {
            client,
            base_url: config.goflightlabs_base_url.trim_end_matches('/').to_string(),
            api_key,
        }))
    }
}

impl FlightLookup for GoFlightLabsClient {
    fn name(&self) -> &str {
        "goflightlabs"
    }

    fn lookup_flight_number(
        &self,
        flight_number: &str,
        date: NaiveDate,
    ) -> Result<Option<AircraftLookup>, ProviderError> {
        let url = format!(
            "{}/schedules?access_key={}&flight_iata={}&date={}",
            self.base_url,
            self.api_key,
            flight_number,
            date.format("%Y-%m-%d")
        );
        debug!(
            "GoFlightLabs request — flight={} date={}",
            flight_number, date
        );

        let response = self.client.get(&url).send()?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        check_status(status)?;

        let body = response.text()?;
        parse_schedule_lookup(&body).inspect_err(|e| {
            if !matches!(e, ProviderError::QuotaExceeded) {
                warn!("GoFlightLabs response unusable — flight={} error={}", flight_number, e);
            }
        })
    }
}
