// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Overnight Classifier.
//!
//! Pure: no I/O, no clock. Output is ordered by registration and every
//! selection has a total tie-break, so equal input gives equal output.

use crate::model::{
    AircraftFlightSet, ArrivalInfo, DepartureInfo, OvernightRecord, QueryWindow, ResolvedFlight,
};
use crate::registration::Registration;
use chrono::{DateTime, Utc};
use log::debug;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// Groups flights by registration, collapsing exact duplicates (the same
/// movement reported by two adjacent slices).
pub fn group_by_registration(
    flights: &[ResolvedFlight],
) -> BTreeMap<&Registration, Vec<&ResolvedFlight>> {
    let mut groups: BTreeMap<&Registration, Vec<&ResolvedFlight>> = BTreeMap::new();
    let mut seen = HashSet::new();

    for flight in flights {
        let key = (
            &flight.registration,
            &flight.flight_number,
            &flight.departure,
            &flight.arrival,
        );
        if seen.insert(key) {
            groups.entry(&flight.registration).or_default().push(flight);
        }
    }
    groups
}

pub fn classify(flights: &[ResolvedFlight], window: &QueryWindow) -> Vec<OvernightRecord> {
    group_by_registration(flights)
        .into_iter()
        .filter_map(|(registration, group)| {
            let set = AircraftFlightSet::partition(registration, group, window);
            classify_aircraft(&set, window)
        })
        .collect()
}

/// Decision rule for a single aircraft. `None` means "does not stay".
pub fn classify_aircraft(set: &AircraftFlightSet<'_>, window: &QueryWindow) -> Option<OvernightRecord> {
    let last_arrival = set
        .arrivals_day1
        .iter()
        .copied()
        .filter_map(|f| f.arrival.scheduled_utc.map(|t| (t, f)))
        .max_by(|a, b| later_arrival(a, b));

    if let Some((arrived_at, arrival)) = last_arrival {
        if let Some(leaving) = same_day_departure(set, window, arrived_at) {
            debug!(
                "Same-day continuation — registration={} arrival={} departure={}",
                set.registration, arrival.flight_number, leaving.flight_number
            );
            return None;
        }
    }

    let first_departure = set
        .departures_day2
        .iter()
        .copied()
        .filter_map(|f| f.departure.scheduled_utc.map(|t| (t, f)))
        .min_by(|a, b| earlier_departure(a, b));

    if last_arrival.is_none() && first_departure.is_none() {
        return None;
    }

    let arrival = last_arrival.map(|(time, f)| ArrivalInfo {
        from: f.departure.airport.clone(),
        time,
        flight_number: f.flight_number.clone(),
    });
    let departure = first_departure.map(|(time, f)| DepartureInfo {
        to: f.arrival.airport.clone(),
        time,
        flight_number: f.flight_number.clone(),
    });

    Some(OvernightRecord::new(set.registration.clone(), arrival, departure))
}

/// Any departure from the subject airport on day 1 strictly after the
/// arrival, looking at every flight of the aircraft.
fn same_day_departure<'a>(
    set: &AircraftFlightSet<'a>,
    window: &QueryWindow,
    arrived_at: DateTime<Utc>,
) -> Option<&'a ResolvedFlight> {
    set.flights.iter().copied().find(|f| {
        f.departure.is_at(&window.airport)
            && f.departure
                .scheduled_utc
                .is_some_and(|t| t > arrived_at && t.date_naive() == window.day1)
    })
}

type Timed<'a> = (DateTime<Utc>, &'a ResolvedFlight);

/// Orders so that `max_by` picks the latest time and, on equal times, the
/// smaller flight number.
fn later_arrival(a: &Timed<'_>, b: &Timed<'_>) -> Ordering {
    a.0.cmp(&b.0)
        .then_with(|| b.1.flight_number.cmp(&a.1.flight_number))
        .then_with(|| b.1.departure.airport.cmp(&a.1.departure.airport))
}

/// Orders so that `min_by` picks the earliest time and, on equal times, the
/// smaller flight number.
fn earlier_departure(a: &Timed<'_>, b: &Timed<'_>) -> Ordering {
    a.0.cmp(&b.0)
        .then_with(|| a.1.flight_number.cmp(&b.1.flight_number))
        .then_with(|| a.1.arrival.airport.cmp(&b.1.arrival.airport))
}
