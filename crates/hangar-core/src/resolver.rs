// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::cache::RegistrationCache;
use crate::context::RunContext;
use crate::model::{QueryWindow, RawFlight, RegistrationSource, ResolvedFlight};
use crate::provider::{FlightLookup, ProviderError};
use crate::registration::Registration;
use chrono::{Days, NaiveDate};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};

/// Output of one resolver pass.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub flights: Vec<ResolvedFlight>,
    /// Flights that arrived without a registration and got one here.
    pub resolved: usize,
    /// Flights dropped because no strategy produced a registration.
    pub dropped: usize,
    pub unresolved_numbers: Vec<String>,
}

/// State for resolving one flight number; remembers which dates were
/// already asked so later strategies never repeat a call.
struct Attempt<'q> {
    flight_number: &'q str,
    primary_date: NaiveDate,
    window: &'q QueryWindow,
    tried: BTreeSet<NaiveDate>,
}

type Found = Option<(Registration, RegistrationSource)>;
type Strategy = fn(&RegistrationResolver<'_>, &RunContext, &mut Attempt<'_>) -> Found;

const STRATEGIES: [(&str, Strategy); 4] = [
    ("exact-date", exact_date),
    ("window-dates", window_dates),
    ("forward-search", forward_search),
    ("secondary", secondary_source),
];

/// Registration Resolver.
pub struct RegistrationResolver<'a> {
    primary: &'a dyn FlightLookup,
    secondary: Option<&'a dyn FlightLookup>,
    forward_search_days: u32,
}

impl<'a> RegistrationResolver<'a> {
    pub fn new(primary: &'a dyn FlightLookup) -> Self {
        Self {
            primary,
            secondary: None,
            forward_search_days: 3,
        }
    }

    pub fn with_secondary(mut self, secondary: Option<&'a dyn FlightLookup>) -> Self {
        self.secondary = secondary;
        self
    }

    pub fn with_forward_search_days(mut self, days: u32) -> Self {
        self.forward_search_days = days;
        self
    }

    pub fn resolve(
        &self,
        ctx: &RunContext,
        flights: Vec<RawFlight>,
        window: &QueryWindow,
        mut cache: Option<&mut RegistrationCache>,
    ) -> Resolution {
        let mut out = Resolution::default();
        let mut pending: BTreeMap<String, Vec<RawFlight>> = BTreeMap::new();

        for raw in flights {
            match raw.registration.as_deref().and_then(Registration::parse) {
                Some(reg) => out
                    .flights
                    .push(ResolvedFlight::from_raw(raw, reg, RegistrationSource::Provider)),
                None if !raw.flight_number.is_empty() => {
                    pending.entry(raw.flight_number.clone()).or_default().push(raw)
                }
                None => out.dropped += 1,
            }
        }

        for (flight_number, group) in pending {
            let primary_date = group
                .iter()
                .filter_map(RawFlight::scheduled_date)
                .min()
                .unwrap_or(window.day1);

            // Under quota every flight-number-only record is dropped, cached or not.
            let found = if ctx.quota_exceeded() {
                None
            } else {
                self.from_cache(cache.as_deref(), &flight_number, primary_date)
            };
            let found = found.or_else(|| {
                let found = self.run_chain(ctx, &flight_number, primary_date, window);
                if let (Some((reg, source)), Some(c)) = (&found, cache.as_deref_mut()) {
                    c.insert(&flight_number, primary_date, reg.clone(), *source);
                }
                found
            });

            match found {
                Some((reg, source)) => {
                    out.resolved += group.len();
                    out.flights.extend(
                        group
                            .into_iter()
                            .map(|raw| ResolvedFlight::from_raw(raw, reg.clone(), source)),
                    );
                }
                None => {
                    debug!(
                        "Dropping unresolved flights — flight={} count={}",
                        flight_number,
                        group.len()
                    );
                    out.dropped += group.len();
                    out.unresolved_numbers.push(flight_number);
                }
            }
        }

        info!(
            "Resolved registrations — kept={} resolved={} dropped={} quota_exceeded={}",
            out.flights.len(),
            out.resolved,
            out.dropped,
            ctx.quota_exceeded()
        );
        out
    }

    /// Resolves a single flight number through the full chain, cache aside.
    pub fn resolve_number(
        &self,
        ctx: &RunContext,
        flight_number: &str,
        date: NaiveDate,
        window: &QueryWindow,
    ) -> Found {
        self.run_chain(ctx, flight_number, date, window)
    }

    fn from_cache(
        &self,
        cache: Option<&RegistrationCache>,
        flight_number: &str,
        date: NaiveDate,
    ) -> Found {
        let entry = cache?.get(flight_number, date)?;
        debug!(
            "Cache hit — flight={} date={} registration={}",
            flight_number, date, entry.registration
        );
        Some((entry.registration.clone(), RegistrationSource::Cache))
    }

    fn run_chain(
        &self,
        ctx: &RunContext,
        flight_number: &str,
        primary_date: NaiveDate,
        window: &QueryWindow,
    ) -> Found {
        if ctx.quota_exceeded() {
            return None;
        }

        let mut attempt = Attempt {
            flight_number,
            primary_date,
            window,
            tried: BTreeSet::new(),
        };

        for (name, strategy) in STRATEGIES.iter() {
            if ctx.quota_exceeded() {
                return None;
            }
            if let Some(found) = strategy(self, ctx, &mut attempt) {
                debug!(
                    "Registration found — flight={} strategy={} registration={}",
                    flight_number, name, found.0
                );
                return Some(found);
            }
        }
        None
    }

    fn lookup(
        &self,
        ctx: &RunContext,
        source: &dyn FlightLookup,
        flight_number: &str,
        date: NaiveDate,
    ) -> Option<Registration> {
        let label = format!("{}:{} {}", source.name(), flight_number, date);
        match ctx.call(&label, || source.lookup_flight_number(flight_number, date)) {
            Ok(found) => found.and_then(|l| Registration::parse(&l.registration)),
            Err(ProviderError::QuotaExceeded) => None,
            Err(e) => {
                warn!(
                    "Lookup failed — source={} flight={} date={} error={}",
                    source.name(),
                    flight_number,
                    date,
                    e
                );
                None
            }
        }
    }

    /// Primary lookup on `date` unless that date was already asked.
    fn try_date(&self, ctx: &RunContext, attempt: &mut Attempt<'_>, date: NaiveDate) -> Option<Registration> {
        if !attempt.tried.insert(date) {
            return None;
        }
        self.lookup(ctx, self.primary, attempt.flight_number, date)
    }
}

fn exact_date(r: &RegistrationResolver<'_>, ctx: &RunContext, attempt: &mut Attempt<'_>) -> Found {
    let date = attempt.primary_date;
    r.try_date(ctx, attempt, date)
        .map(|reg| (reg, RegistrationSource::ExactDate))
}

/// Covers records whose own date is missing or off by one.
fn window_dates(r: &RegistrationResolver<'_>, ctx: &RunContext, attempt: &mut Attempt<'_>) -> Found {
    for date in [attempt.window.day1, attempt.window.day2] {
        if ctx.quota_exceeded() {
            return None;
        }
        if let Some(reg) = r.try_date(ctx, attempt, date) {
            return Some((reg, RegistrationSource::WindowDate));
        }
    }
    None
}

fn forward_search(r: &RegistrationResolver<'_>, ctx: &RunContext, attempt: &mut Attempt<'_>) -> Found {
    for offset in 1..=u64::from(r.forward_search_days) {
        if ctx.quota_exceeded() {
            return None;
        }
        let Some(date) = attempt.primary_date.checked_add_days(Days::new(offset)) else {
            break;
        };
        if let Some(reg) = r.try_date(ctx, attempt, date) {
            return Some((reg, RegistrationSource::ForwardSearch));
        }
    }
    None
}

fn secondary_source(r: &RegistrationResolver<'_>, ctx: &RunContext, attempt: &mut Attempt<'_>) -> Found {
    let secondary = r.secondary?;
    r.lookup(ctx, secondary, attempt.flight_number, attempt.primary_date)
        .map(|reg| (reg, RegistrationSource::Secondary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FlightPoint;
    use crate::provider::AircraftLookup;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Table {
        answers: HashMap<(String, NaiveDate), String>,
        calls: Mutex<Vec<(String, NaiveDate)>>,
    }

    impl Table {
        fn with(mut self, flight: &str, date: NaiveDate, reg: &str) -> Self {
            self.answers.insert((flight.to_string(), date), reg.to_string());
            self
        }
        fn calls(&self) -> Vec<(String, NaiveDate)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl FlightLookup for Table {
        fn name(&self) -> &str {
            "table"
        }
        fn lookup_flight_number(
            &self,
            flight_number: &str,
            date: NaiveDate,
        ) -> Result<Option<AircraftLookup>, ProviderError> {
            self.calls.lock().unwrap().push((flight_number.to_string(), date));
            Ok(self
                .answers
                .get(&(flight_number.to_string(), date))
                .map(|r| AircraftLookup {
                    registration: r.clone(),
                    aircraft_type: None,
                }))
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, day).unwrap()
    }

    fn window() -> QueryWindow {
        QueryWindow::new("MUC", d(3), d(4)).unwrap()
    }

    fn numbered(flight: &str, day: Option<u32>) -> RawFlight {
        RawFlight {
            flight_number: flight.into(),
            registration: None,
            departure: FlightPoint::new(
                "FRA",
                day.map(|dd| Utc.with_ymd_and_hms(2025, 8, dd, 9, 0, 0).unwrap()),
            ),
            arrival: FlightPoint::new("MUC", None),
        }
    }

    #[test]
    fn test_chain_order_and_no_repeated_dates() {
        // Record dated day 1: exact date == day1, so window strategy only adds day2.
        let primary = Table::default().with("LH9", d(6), "D-AIXA");
        let resolver = RegistrationResolver::new(&primary);
        let ctx = RunContext::new(Duration::ZERO);

        let res = resolver.resolve(&ctx, vec![numbered("LH9", Some(3))], &window(), None);
        assert_eq!(res.flights.len(), 1);
        assert_eq!(res.flights[0].source, RegistrationSource::ForwardSearch);
        let dates: Vec<NaiveDate> = primary.calls().into_iter().map(|c| c.1).collect();
        assert_eq!(dates, vec![d(3), d(4), d(5), d(6)]);
    }

    #[test]
    fn test_secondary_is_last_resort() {
        let primary = Table::default();
        let secondary = Table::default().with("EW7", d(3), "d-abcd");
        let resolver = RegistrationResolver::new(&primary)
            .with_secondary(Some(&secondary))
            .with_forward_search_days(2);
        let ctx = RunContext::new(Duration::ZERO);

        let res = resolver.resolve(&ctx, vec![numbered("EW7", None)], &window(), None);
        assert_eq!(res.flights[0].registration.as_str(), "D-ABCD");
        assert_eq!(res.flights[0].source, RegistrationSource::Secondary);
        // day1, day2, then day1+1 (already tried) and day1+2.
        assert_eq!(primary.calls().len(), 3);
        assert_eq!(secondary.calls().len(), 1);
    }

    #[test]
    fn test_provider_registration_passes_through_normalized() {
        let primary = Table::default();
        let resolver = RegistrationResolver::new(&primary);
        let ctx = RunContext::new(Duration::ZERO);
        let mut raw = numbered("", None);
        raw.registration = Some("daibl".into());

        let res = resolver.resolve(&ctx, vec![raw], &window(), None);
        assert_eq!(res.flights[0].registration.as_str(), "D-AIBL");
        assert_eq!(res.flights[0].source, RegistrationSource::Provider);
        assert!(primary.calls().is_empty());
    }

    #[test]
    fn test_cache_hit_skips_calls_and_success_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = RegistrationCache::new(
            dir.path().join("c.json"),
            chrono::Duration::hours(24),
            100,
        );
        cache.insert(
            "LH1",
            d(3),
            Registration::parse("D-AIAA").unwrap(),
            RegistrationSource::ExactDate,
        );
        let primary = Table::default().with("LH2", d(3), "D-AIBB");
        let resolver = RegistrationResolver::new(&primary);
        let ctx = RunContext::new(Duration::ZERO);

        let res = resolver.resolve(
            &ctx,
            vec![numbered("LH1", Some(3)), numbered("LH2", Some(3))],
            &window(),
            Some(&mut cache),
        );
        assert_eq!(res.flights.len(), 2);
        assert_eq!(primary.calls(), vec![("LH2".to_string(), d(3))]);
        assert_eq!(
            cache.get("LH2", d(3)).unwrap().registration.as_str(),
            "D-AIBB"
        );
    }
}
