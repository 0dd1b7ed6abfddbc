// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use super::{check_status, parse_provider_time, AircraftLookup, AirportSchedule, FlightLookup, ProviderError};
use crate::config::EngineConfig;
use crate::EngineError;
use crate::model::{FlightPoint, RawFlight};
use crate::registration::normalize_flight_number;
use chrono::{NaiveDate, NaiveDateTime};
use log::debug;
use serde::Deserialize;

/// Longest span the airport endpoint accepts in one query.
pub const MAX_QUERY_HOURS: i64 = 12;

// --- wire format -----------------------------------------------------------
// Every field is optional; `into_raw` is the single place where missing or
// malformed values become `None`/empty.

#[derive(Debug, Default, Deserialize)]
struct AirportBoard {
    #[serde(default)]
    departures: Vec<FlightItem>,
    #[serde(default)]
    arrivals: Vec<FlightItem>,
}

#[derive(Debug, Default, Deserialize)]
struct FlightItem {
    #[serde(default)]
    number: Option<String>,
    #[serde(default)]
    aircraft: Option<AircraftItem>,
    #[serde(default)]
    departure: Option<MovementItem>,
    #[serde(default)]
    arrival: Option<MovementItem>,
}

#[derive(Debug, Default, Deserialize)]
struct AircraftItem {
    #[serde(default)]
    reg: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MovementItem {
    #[serde(default)]
    airport: Option<AirportItem>,
    #[serde(default)]
    scheduled_time: Option<TimeItem>,
    #[serde(default)]
    scheduled_time_utc: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AirportItem {
    #[serde(default)]
    iata: Option<String>,
    #[serde(default)]
    icao: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TimeItem {
    #[serde(default)]
    utc: Option<String>,
}

impl MovementItem {
    fn into_point(self) -> FlightPoint {
        let AirportItem { iata, icao } = self.airport.unwrap_or_default();
        let iata = iata.filter(|c| !c.trim().is_empty());
        let icao = icao.filter(|c| !c.trim().is_empty());
        let scheduled = self
            .scheduled_time
            .and_then(|t| t.utc)
            .or(self.scheduled_time_utc)
            .and_then(|s| parse_provider_time(&s));
        match iata {
            Some(iata) => FlightPoint::new(&iata, scheduled).with_alt_code(icao.as_deref()),
            None => FlightPoint::new(icao.as_deref().unwrap_or_default(), scheduled),
        }
    }
}

impl FlightItem {
    fn registration(&self) -> Option<String> {
        self.aircraft
            .as_ref()
            .and_then(|a| a.reg.as_deref())
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
    }

    fn into_raw(self) -> RawFlight {
        let registration = self.registration();
        RawFlight {
            flight_number: self
                .number
                .as_deref()
                .map(normalize_flight_number)
                .unwrap_or_default(),
            registration,
            departure: self.departure.map(MovementItem::into_point).unwrap_or_else(empty_point),
            arrival: self.arrival.map(MovementItem::into_point).unwrap_or_else(empty_point),
        }
    }
}

fn empty_point() -> FlightPoint {
    FlightPoint::new("", None)
}

/// Parses an airport board (`{departures, arrivals}`) into raw flights.
pub fn parse_airport_board(body: &str) -> Result<Vec<RawFlight>, ProviderError> {
    if body.trim().is_empty() {
        return Err(ProviderError::Malformed("empty body".to_string()));
    }
    let board: AirportBoard =
        serde_json::from_str(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;

    Ok(board
        .departures
        .into_iter()
        .chain(board.arrivals)
        .map(FlightItem::into_raw)
        .collect())
}

/// Parses a flight-number lookup (array of legs); first leg with a
/// registration wins.
pub fn parse_flight_lookup(body: &str) -> Result<Option<AircraftLookup>, ProviderError> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let items: Vec<FlightItem> =
        serde_json::from_str(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;

    Ok(items.iter().find_map(|item| {
        item.registration().map(|registration| AircraftLookup {
            registration,
            aircraft_type: item
                .aircraft
                .as_ref()
                .and_then(|a| a.model.clone())
                .filter(|m| !m.trim().is_empty()),
        })
    }))
}

/// Primary provider: AeroDataBox through RapidAPI.
pub struct AeroDataBoxClient {
    client: reqwest::blocking::Client,
    base_url: String,
    host: String,
    api_key: String,
}

impl AeroDataBoxClient {
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let api_key = config
            .aerodatabox_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| EngineError::Config("no AeroDataBox API key configured".to_string()))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| EngineError::Config(format!("AeroDataBox HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.aerodatabox_base_url.trim_end_matches('/').to_string(),
            host: config.aerodatabox_host.clone(),
            api_key,
        })
    }

    fn get(&self, url: &str) -> Result<(reqwest::StatusCode, String), ProviderError> {
        debug!("AeroDataBox request — url={}", url);
        let response = self
            .client
            .get(url)
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", &self.host)
            .send()?;
        let status = response.status();
        let body = response.text()?;
        Ok((status, body))
    }
}

fn code_kind(airport: &str) -> &'static str {
    if airport.len() == 4 {
        "icao"
    } else {
        "iata"
    }
}

impl AirportSchedule for AeroDataBoxClient {
    fn name(&self) -> &str {
        "aerodatabox"
    }

    fn list_airport_flights(
        &self,
        airport: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<RawFlight>, ProviderError> {
        let url = format!(
            "{}/flights/airports/{}/{}/{}/{}?withLeg=true&direction=Both&withCancelled=false&withCodeshared=false&withCargo=true&withPrivate=true&withLocation=false",
            self.base_url,
            code_kind(airport),
            airport,
            from.format("%Y-%m-%dT%H:%M"),
            to.format("%Y-%m-%dT%H:%M"),
        );
        let (status, body) = self.get(&url)?;
        check_status(status)?;
        if status == reqwest::StatusCode::NO_CONTENT {
            return Err(ProviderError::Malformed("empty body".to_string()));
        }
        parse_airport_board(&body)
    }
}

impl FlightLookup for AeroDataBoxClient {
    fn name(&self) -> &str {
        "aerodatabox"
    }

    fn lookup_flight_number(
        &self,
        flight_number: &str,
        date: NaiveDate,
    ) -> Result<Option<AircraftLookup>, ProviderError> {
        let url = format!(
            "{}/flights/number/{}/{}",
            self.base_url,
            flight_number,
            date.format("%Y-%m-%d")
        );
        let (status, body) = self.get(&url)?;
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        check_status(status)?;
        parse_flight_lookup(&body)
    }
}
