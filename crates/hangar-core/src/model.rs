// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::registration::Registration;
use crate::EngineError;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Placeholder shown for an unknown end of a route.
pub const UNKNOWN_AIRPORT: &str = "---";

/// One end of a scheduled movement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlightPoint {
    /// Display code, IATA when the provider sent one.
    pub airport: String,
    /// The airport's other code (ICAO next to an IATA `airport`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_code: Option<String>,
    pub scheduled_utc: Option<DateTime<Utc>>,
}

impl FlightPoint {
    pub fn new(airport: &str, scheduled_utc: Option<DateTime<Utc>>) -> Self {
        Self {
            airport: airport.trim().to_uppercase(),
            alt_code: None,
            scheduled_utc,
        }
    }

    pub fn with_alt_code(mut self, code: Option<&str>) -> Self {
        self.alt_code = code
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty() && *c != self.airport);
        self
    }

    /// Matches either code, so a window keyed by ICAO finds IATA-labelled legs.
    pub fn is_at(&self, airport: &str) -> bool {
        let hit = |code: &str| !code.is_empty() && code.eq_ignore_ascii_case(airport);
        hit(&self.airport) || self.alt_code.as_deref().is_some_and(hit)
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.scheduled_utc.map(|t| t.date_naive())
    }
}

/// A movement exactly as reported by a provider, after the parse step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFlight {
    /// Carrier + number, normalized; may be empty.
    pub flight_number: String,
    /// Tail number when the provider supplied one directly.
    pub registration: Option<String>,
    pub departure: FlightPoint,
    pub arrival: FlightPoint,
}

impl RawFlight {
    pub fn touches(&self, airport: &str) -> bool {
        self.departure.is_at(airport) || self.arrival.is_at(airport)
    }

    /// A flight with neither a registration nor a flight number can never be
    /// attributed to an aircraft.
    pub fn is_attributable(&self) -> bool {
        let has_reg = self
            .registration
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty());
        has_reg || !self.flight_number.is_empty()
    }

    /// The flight's own operating date: departure first, then arrival.
    pub fn scheduled_date(&self) -> Option<NaiveDate> {
        self.departure.date().or_else(|| self.arrival.date())
    }
}

/// How a flight's registration was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationSource {
    Provider,
    Cache,
    ExactDate,
    WindowDate,
    ForwardSearch,
    Secondary,
}

/// A [`RawFlight`] whose identity is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFlight {
    pub registration: Registration,
    pub flight_number: String,
    pub departure: FlightPoint,
    pub arrival: FlightPoint,
    pub source: RegistrationSource,
}

impl ResolvedFlight {
    pub fn from_raw(raw: RawFlight, registration: Registration, source: RegistrationSource) -> Self {
        Self {
            registration,
            flight_number: raw.flight_number,
            departure: raw.departure,
            arrival: raw.arrival,
            source,
        }
    }
}

/// All flights of one aircraft inside the query window.
#[derive(Debug, Clone)]
pub struct AircraftFlightSet<'a> {
    pub registration: &'a Registration,
    pub flights: Vec<&'a ResolvedFlight>,
    /// Arrival airport == subject, arrival date == day 1.
    pub arrivals_day1: Vec<&'a ResolvedFlight>,
    /// Departure airport == subject, departure date == day 2.
    pub departures_day2: Vec<&'a ResolvedFlight>,
}

impl<'a> AircraftFlightSet<'a> {
    pub fn partition(
        registration: &'a Registration,
        flights: Vec<&'a ResolvedFlight>,
        window: &QueryWindow,
    ) -> Self {
        let arrivals_day1 = flights
            .iter()
            .copied()
            .filter(|f| f.arrival.is_at(&window.airport) && f.arrival.date() == Some(window.day1))
            .collect();
        let departures_day2 = flights
            .iter()
            .copied()
            .filter(|f| {
                f.departure.is_at(&window.airport) && f.departure.date() == Some(window.day2)
            })
            .collect();

        Self {
            registration,
            flights,
            arrivals_day1,
            departures_day2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OvernightType {
    /// Has a day-2 departure from the subject airport.
    Continues,
    /// Arrived on day 1, no departure seen.
    Parked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrivalInfo {
    pub from: String,
    pub time: DateTime<Utc>,
    pub flight_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartureInfo {
    pub to: String,
    pub time: DateTime<Utc>,
    pub flight_number: String,
}

/// Classifier output for one aircraft that stays overnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OvernightRecord {
    pub registration: Registration,
    pub overnight_type: OvernightType,
    pub arrival: Option<ArrivalInfo>,
    pub departure: Option<DepartureInfo>,
    pub route: String,
    pub duration: String,
}

impl OvernightRecord {
    pub fn new(
        registration: Registration,
        arrival: Option<ArrivalInfo>,
        departure: Option<DepartureInfo>,
    ) -> Self {
        let overnight_type = if departure.is_some() {
            OvernightType::Continues
        } else {
            OvernightType::Parked
        };
        let route = format_route(arrival.as_ref(), departure.as_ref());
        let duration = format_duration(
            arrival.as_ref().map(|a| a.time),
            departure.as_ref().map(|d| d.time),
        );

        Self {
            registration,
            overnight_type,
            arrival,
            departure,
            route,
            duration,
        }
    }

    pub fn arrival_time_text(&self) -> String {
        self.arrival
            .as_ref()
            .map(|a| a.time.format("%H:%M").to_string())
            .unwrap_or_default()
    }

    pub fn departure_time_text(&self) -> String {
        self.departure
            .as_ref()
            .map(|d| d.time.format("%H:%M").to_string())
            .unwrap_or_default()
    }

    pub fn origin_code(&self) -> String {
        self.arrival.as_ref().map(|a| a.from.clone()).unwrap_or_default()
    }

    pub fn dest_code(&self) -> String {
        self.departure.as_ref().map(|d| d.to.clone()).unwrap_or_default()
    }
}

fn non_empty_or_unknown(code: &str) -> &str {
    if code.is_empty() {
        UNKNOWN_AIRPORT
    } else {
        code
    }
}

fn format_route(arrival: Option<&ArrivalInfo>, departure: Option<&DepartureInfo>) -> String {
    let origin = arrival.map_or(UNKNOWN_AIRPORT, |a| non_empty_or_unknown(&a.from));
    let destination = departure.map_or(UNKNOWN_AIRPORT, |d| non_empty_or_unknown(&d.to));
    format!("{} → {}", origin, destination)
}

/// `"16h 20m"`, or `"n/a"` when an end is missing or the span is negative.
pub fn format_duration(arrival: Option<DateTime<Utc>>, departure: Option<DateTime<Utc>>) -> String {
    match (arrival, departure) {
        (Some(a), Some(d)) if d >= a => {
            let span: Duration = d - a;
            format!("{}h {}m", span.num_hours(), span.num_minutes() % 60)
        }
        _ => "n/a".to_string(),
    }
}

fn airport_code_pattern() -> Result<&'static Regex, EngineError> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Z0-9]{3,4}$"))
        .as_ref()
        .map_err(|e| EngineError::Config(format!("airport code pattern: {}", e)))
}

/// Validated run input: subject airport plus two consecutive days.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryWindow {
    pub airport: String,
    pub day1: NaiveDate,
    pub day2: NaiveDate,
}

impl QueryWindow {
    pub fn new(airport: &str, day1: NaiveDate, day2: NaiveDate) -> Result<Self, EngineError> {
        let airport = airport.trim().to_uppercase();
        if airport.is_empty() {
            return Err(EngineError::InvalidRequest(
                "airport code is required".to_string(),
            ));
        }
        if !airport_code_pattern()?.is_match(&airport) {
            return Err(EngineError::InvalidRequest(format!(
                "airport code '{}' is not a 3-letter IATA or 4-letter ICAO code",
                airport
            )));
        }
        if day1.succ_opt() != Some(day2) {
            return Err(EngineError::InvalidRequest(format!(
                "day2 ({}) must be the day after day1 ({})",
                day2, day1
            )));
        }

        Ok(Self { airport, day1, day2 })
    }
}
