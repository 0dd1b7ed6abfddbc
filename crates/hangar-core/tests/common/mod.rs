// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use hangar_core::model::FlightPoint;
use hangar_core::provider::{AircraftLookup, AirportSchedule, FlightLookup, ProviderError};
use hangar_core::slots::{SyncError, SyncPush};
use hangar_core::RawFlight;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Routes engine logs through the test harness; later calls are no-ops.
pub fn init_logging() {
    let _ = simplelog::TestLogger::init(
        simplelog::LevelFilter::Debug,
        simplelog::Config::default(),
    );
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 8, d).unwrap()
}

pub fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, d, h, m, 0).unwrap()
}

pub fn raw(
    flight: &str,
    reg: Option<&str>,
    from: &str,
    dep: DateTime<Utc>,
    to: &str,
    arr: DateTime<Utc>,
) -> RawFlight {
    RawFlight {
        flight_number: flight.to_string(),
        registration: reg.map(str::to_string),
        departure: FlightPoint::new(from, Some(dep)),
        arrival: FlightPoint::new(to, Some(arr)),
    }
}

/// Airport board that serves every flight with an end inside the slice,
/// so flights spanning two slices show up twice like they do upstream.
pub struct MockBoard {
    pub flights: Vec<RawFlight>,
    /// Slices starting here answer with a quota signal.
    pub quota_at: Option<NaiveDateTime>,
    pub calls: Mutex<Vec<NaiveDateTime>>,
}

impl MockBoard {
    pub fn new(flights: Vec<RawFlight>) -> Self {
        Self {
            flights,
            quota_at: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl AirportSchedule for MockBoard {
    fn name(&self) -> &str {
        "mock-board"
    }

    fn list_airport_flights(
        &self,
        _airport: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<RawFlight>, ProviderError> {
        self.calls.lock().unwrap().push(from);
        if Some(from) == self.quota_at {
            return Err(ProviderError::QuotaExceeded);
        }
        let from = Utc.from_utc_datetime(&from);
        let to = Utc.from_utc_datetime(&to) + Duration::minutes(1);
        let inside = |t: Option<DateTime<Utc>>| t.is_some_and(|t| t >= from && t < to);

        Ok(self
            .flights
            .iter()
            .filter(|f| inside(f.departure.scheduled_utc) || inside(f.arrival.scheduled_utc))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MockLookup {
    pub answers: HashMap<(String, NaiveDate), String>,
    pub calls: Mutex<Vec<(String, NaiveDate)>>,
}

impl MockLookup {
    pub fn with(mut self, flight: &str, date: NaiveDate, reg: &str) -> Self {
        self.answers
            .insert((flight.to_string(), date), reg.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, NaiveDate)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, flight: &str) -> usize {
        self.calls().iter().filter(|(f, _)| f == flight).count()
    }
}

impl FlightLookup for MockLookup {
    fn name(&self) -> &str {
        "mock-lookup"
    }

    fn lookup_flight_number(
        &self,
        flight_number: &str,
        date: NaiveDate,
    ) -> Result<Option<AircraftLookup>, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((flight_number.to_string(), date));
        Ok(self
            .answers
            .get(&(flight_number.to_string(), date))
            .map(|reg| AircraftLookup {
                registration: reg.clone(),
                aircraft_type: None,
            }))
    }
}

#[derive(Default)]
pub struct RecordingPush {
    pub pushes: Mutex<Vec<BTreeMap<String, String>>>,
    pub fail: bool,
}

impl SyncPush for RecordingPush {
    fn push_field_updates(&self, updates: &BTreeMap<String, String>) -> Result<(), SyncError> {
        self.pushes.lock().unwrap().push(updates.clone());
        if self.fail {
            return Err(SyncError::Rejected {
                status: 403,
                message: "Write not allowed: client is not in master mode.".into(),
            });
        }
        Ok(())
    }
}
