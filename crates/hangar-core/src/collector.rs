// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::context::RunContext;
use crate::model::{QueryWindow, RawFlight};
use crate::provider::{AirportSchedule, ProviderError};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, info, warn};
use rayon::prelude::*;

/// One bounded provider query span, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlice {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

/// The four fixed 12-hour slices covering `[day1 00:00, day2 23:59]`.
pub fn time_slices(day1: NaiveDate, day2: NaiveDate) -> [TimeSlice; 4] {
    let half = |day: NaiveDate, first: bool| {
        if first {
            TimeSlice {
                from: day.and_time(hm(0, 0)),
                to: day.and_time(hm(11, 59)),
            }
        } else {
            TimeSlice {
                from: day.and_time(hm(12, 0)),
                to: day.and_time(hm(23, 59)),
            }
        }
    };
    [
        half(day1, true),
        half(day1, false),
        half(day2, true),
        half(day2, false),
    ]
}

/// Flight-Window Collector.
pub struct FlightWindowCollector<'a> {
    schedule: &'a dyn AirportSchedule,
}

impl<'a> FlightWindowCollector<'a> {
    pub fn new(schedule: &'a dyn AirportSchedule) -> Self {
        Self { schedule }
    }

    /// Fetches all four slices concurrently and returns the flattened union.
    ///
    /// A failed slice contributes nothing; a quota signal is recorded on
    /// `ctx` and the remaining slices short-circuit through it.
    pub fn collect(&self, ctx: &RunContext, window: &QueryWindow) -> Vec<RawFlight> {
        let slices = time_slices(window.day1, window.day2);

        let per_slice: Vec<Vec<RawFlight>> = slices
            .par_iter()
            .map(|slice| self.fetch_slice(ctx, &window.airport, slice))
            .collect();

        let total: usize = per_slice.iter().map(Vec::len).sum();
        let flights: Vec<RawFlight> = per_slice
            .into_iter()
            .flatten()
            .filter(|f| f.touches(&window.airport) && f.is_attributable())
            .collect();

        info!(
            "Collected flights — airport={} raw={} kept={} calls={}",
            window.airport,
            total,
            flights.len(),
            ctx.calls_made()
        );
        flights
    }

    fn fetch_slice(&self, ctx: &RunContext, airport: &str, slice: &TimeSlice) -> Vec<RawFlight> {
        let label = format!("{}:{} {}..{}", self.schedule.name(), airport, slice.from, slice.to);
        match ctx.call(&label, || {
            self.schedule
                .list_airport_flights(airport, slice.from, slice.to)
        }) {
            Ok(flights) => {
                debug!(
                    "Slice fetched — airport={} from={} count={}",
                    airport,
                    slice.from,
                    flights.len()
                );
                flights
            }
            Err(ProviderError::QuotaExceeded) => {
                warn!(
                    "Slice skipped, quota exceeded — airport={} from={}",
                    airport, slice.from
                );
                Vec::new()
            }
            Err(e) => {
                warn!(
                    "Slice fetch failed — airport={} from={} to={} error={}",
                    airport, slice.from, slice.to, e
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FlightPoint;
    use crate::provider::aerodatabox::MAX_QUERY_HOURS;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Board {
        seen: Mutex<Vec<NaiveDateTime>>,
        fail_from: Option<NaiveDateTime>,
    }

    impl AirportSchedule for Board {
        fn name(&self) -> &str {
            "board"
        }

        fn list_airport_flights(
            &self,
            _airport: &str,
            from: NaiveDateTime,
            _to: NaiveDateTime,
        ) -> Result<Vec<RawFlight>, ProviderError> {
            self.seen.lock().unwrap().push(from);
            if Some(from) == self.fail_from {
                return Err(ProviderError::Malformed("empty body".into()));
            }
            Ok(vec![
                RawFlight {
                    flight_number: format!("LH{}", from.format("%d%H")),
                    registration: None,
                    departure: FlightPoint::new("FRA", None),
                    arrival: FlightPoint::new("MUC", None),
                },
                // Neither end at the subject airport.
                RawFlight {
                    flight_number: "XX1".into(),
                    registration: None,
                    departure: FlightPoint::new("FRA", None),
                    arrival: FlightPoint::new("CDG", None),
                },
                // Unattributable.
                RawFlight {
                    flight_number: String::new(),
                    registration: None,
                    departure: FlightPoint::new("MUC", None),
                    arrival: FlightPoint::new("CDG", None),
                },
            ])
        }
    }

    fn window() -> QueryWindow {
        QueryWindow::new(
            "MUC",
            NaiveDate::from_ymd_opt(2025, 8, 3).unwrap(),
            NaiveDate::from_ymd_opt(2025, 8, 4).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_slices_cover_both_days() {
        let w = window();
        let slices = time_slices(w.day1, w.day2);
        assert_eq!(slices[0].from, w.day1.and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(slices[1].from, w.day1.and_hms_opt(12, 0, 0).unwrap());
        assert_eq!(slices[3].to, w.day2.and_hms_opt(23, 59, 0).unwrap());
        for s in &slices {
            assert!(s.to - s.from < chrono::Duration::hours(MAX_QUERY_HOURS));
        }
    }

    #[test]
    fn test_failed_slice_is_empty_and_others_survive() {
        let w = window();
        let board = Board {
            seen: Mutex::new(Vec::new()),
            fail_from: Some(w.day1.and_hms_opt(12, 0, 0).unwrap()),
        };
        let ctx = RunContext::new(Duration::ZERO);
        let flights = FlightWindowCollector::new(&board).collect(&ctx, &w);

        assert_eq!(board.seen.lock().unwrap().len(), 4);
        assert_eq!(flights.len(), 3);
        assert!(flights.iter().all(|f| f.touches("MUC")));
        assert_eq!(ctx.calls_made(), 4);
        assert!(!ctx.quota_exceeded());
    }

    /// Serves a parsed provider board whose subject airport carries both codes.
    struct DualCodeBoard;

    impl AirportSchedule for DualCodeBoard {
        fn name(&self) -> &str {
            "dual-code"
        }

        fn list_airport_flights(
            &self,
            _airport: &str,
            _from: NaiveDateTime,
            _to: NaiveDateTime,
        ) -> Result<Vec<RawFlight>, ProviderError> {
            crate::provider::aerodatabox::parse_airport_board(
                r#"{
                    "arrivals": [{
                        "number": "LH401",
                        "departure": { "airport": { "iata": "JFK", "icao": "KJFK" } },
                        "arrival": { "airport": { "iata": "MUC", "icao": "EDDM" },
                                     "scheduledTime": { "utc": "2025-08-03 14:10Z" } }
                    }]
                }"#,
            )
        }
    }

    #[test]
    fn test_icao_window_keeps_iata_labelled_flights() {
        let by_iata = window();
        let by_icao = QueryWindow::new("EDDM", by_iata.day1, by_iata.day2).unwrap();

        let iata_kept = FlightWindowCollector::new(&DualCodeBoard)
            .collect(&RunContext::new(Duration::ZERO), &by_iata);
        let icao_kept = FlightWindowCollector::new(&DualCodeBoard)
            .collect(&RunContext::new(Duration::ZERO), &by_icao);

        assert_eq!(iata_kept.len(), 4);
        assert_eq!(icao_kept.len(), iata_kept.len());
        assert_eq!(icao_kept[0].arrival.airport, "MUC");
    }
}
