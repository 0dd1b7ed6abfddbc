// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::cache::RegistrationCache;
use crate::classifier::classify;
use crate::collector::FlightWindowCollector;
use crate::config::EngineConfig;
use crate::context::RunContext;
use crate::model::{OvernightRecord, OvernightType, QueryWindow, RegistrationSource};
use crate::provider::aerodatabox::AeroDataBoxClient;
use crate::provider::goflightlabs::GoFlightLabsClient;
use crate::provider::{AirportSchedule, FlightLookup};
use crate::reconciler::{self, FieldUpdate};
use crate::registration::{normalize_flight_number, Registration};
use crate::resolver::RegistrationResolver;
use crate::slots::{EditGuard, SlotRegistry, SyncPush};
use crate::EngineError;
use chrono::NaiveDate;
use log::{error, info, warn};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The only run inputs; all three are required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub airport: String,
    pub day1: NaiveDate,
    pub day2: NaiveDate,
}

impl RunRequest {
    pub fn new(airport: &str, day1: NaiveDate, day2: NaiveDate) -> Self {
        Self {
            airport: airport.to_string(),
            day1,
            day2,
        }
    }

    pub fn window(&self) -> Result<QueryWindow, EngineError> {
        QueryWindow::new(&self.airport, self.day1, self.day2)
    }
}

/// Collector + resolver + classifier output.
#[derive(Debug, Clone)]
pub struct Classification {
    pub window: QueryWindow,
    pub records: Vec<OvernightRecord>,
    pub flights_seen: usize,
    pub flights_resolved: usize,
    pub flights_dropped: usize,
    pub calls_made: u64,
    pub quota_exceeded: bool,
}

impl Classification {
    pub fn count(&self, kind: OvernightType) -> usize {
        self.records
            .iter()
            .filter(|r| r.overnight_type == kind)
            .count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub airport: String,
    pub day1: Option<NaiveDate>,
    pub day2: Option<NaiveDate>,
    pub flights_seen: usize,
    pub flights_resolved: usize,
    pub flights_dropped: usize,
    pub continues: usize,
    pub parked: usize,
    pub slots_updated: usize,
    pub slots_cleared: usize,
    pub fields_skipped: usize,
    pub fields_staged: usize,
    pub calls_made: u64,
    pub quota_exceeded: bool,
    pub dry_run: bool,
    /// Slot read or sync push failure; the run itself still succeeded.
    pub push_error: Option<String>,
}

impl RunSummary {
    fn from_classification(c: &Classification) -> Self {
        Self {
            airport: c.window.airport.clone(),
            day1: Some(c.window.day1),
            day2: Some(c.window.day2),
            flights_seen: c.flights_seen,
            flights_resolved: c.flights_resolved,
            flights_dropped: c.flights_dropped,
            continues: c.count(OvernightType::Continues),
            parked: c.count(OvernightType::Parked),
            calls_made: c.calls_made,
            quota_exceeded: c.quota_exceeded,
            ..Self::default()
        }
    }

    pub fn aircraft_classified(&self) -> usize {
        self.continues + self.parked
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let day = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
        writeln!(
            f,
            "Overnight run {} {} -> {}{}",
            self.airport,
            day(self.day1),
            day(self.day2),
            if self.dry_run { " (dry run)" } else { "" }
        )?;
        writeln!(f, "  flights seen:     {}", self.flights_seen)?;
        writeln!(
            f,
            "  resolved:         {} ({} dropped as unresolved)",
            self.flights_resolved, self.flights_dropped
        )?;
        writeln!(
            f,
            "  overnight:        {} ({} continues, {} parked)",
            self.aircraft_classified(),
            self.continues,
            self.parked
        )?;
        if self.dry_run {
            writeln!(f, "  fields staged:    {}", self.fields_staged)?;
        } else {
            writeln!(
                f,
                "  slots:            {} updated, {} cleared, {} fields skipped",
                self.slots_updated, self.slots_cleared, self.fields_skipped
            )?;
        }
        write!(f, "  outbound calls:   {}", self.calls_made)?;
        if let Some(err) = &self.push_error {
            write!(f, "\n  sync failed:      {}", err)?;
        }
        if self.quota_exceeded {
            write!(
                f,
                "\nNOTICE: provider quota exceeded; showing partial, possibly stale results"
            )?;
        }
        Ok(())
    }
}

/// Runs the collector → resolver → classifier → reconciler pipeline.
pub struct OvernightEngine {
    schedule: Arc<dyn AirportSchedule>,
    lookup: Arc<dyn FlightLookup>,
    secondary: Option<Arc<dyn FlightLookup>>,
    rate_limit_delay: Duration,
    forward_search_days: u32,
    cache: Option<RegistrationCache>,
}

impl OvernightEngine {
    pub fn new(schedule: Arc<dyn AirportSchedule>, lookup: Arc<dyn FlightLookup>) -> Self {
        Self {
            schedule,
            lookup,
            secondary: None,
            rate_limit_delay: Duration::from_millis(1200),
            forward_search_days: 3,
            cache: None,
        }
    }

    /// Wires the HTTP providers and the on-disk registration cache.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let primary = Arc::new(AeroDataBoxClient::from_config(config)?);
        let secondary = GoFlightLabsClient::from_config(config)?
            .map(|c| Arc::new(c) as Arc<dyn FlightLookup>);

        let cache = RegistrationCache::load(
            &config.cache_path(),
            config.registration_cache_ttl(),
            config.registration_cache_max_entries,
        );

        Ok(Self::new(primary.clone(), primary)
            .with_secondary(secondary)
            .with_rate_limit_delay(config.rate_limit_delay())
            .with_forward_search_days(config.forward_search_days)
            .with_cache(Some(cache)))
    }

    pub fn with_secondary(mut self, secondary: Option<Arc<dyn FlightLookup>>) -> Self {
        self.secondary = secondary;
        self
    }

    pub fn with_rate_limit_delay(mut self, delay: Duration) -> Self {
        self.rate_limit_delay = delay;
        self
    }

    pub fn with_forward_search_days(mut self, days: u32) -> Self {
        self.forward_search_days = days;
        self
    }

    pub fn with_cache(mut self, cache: Option<RegistrationCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> Option<&RegistrationCache> {
        self.cache.as_ref()
    }

    fn resolver(&self) -> RegistrationResolver<'_> {
        RegistrationResolver::new(self.lookup.as_ref())
            .with_secondary(self.secondary.as_deref())
            .with_forward_search_days(self.forward_search_days)
    }

    fn save_cache(&mut self) {
        if let Some(cache) = self.cache.as_mut() {
            if let Err(e) = cache.save() {
                warn!("Failed to persist registration cache — error={:#}", e);
            }
        }
    }

    /// Collector, resolver and classifier, with a fresh [`RunContext`].
    pub fn classify(&mut self, request: &RunRequest) -> Result<Classification, EngineError> {
        let window = request.window()?;
        let ctx = RunContext::new(self.rate_limit_delay);

        info!(
            "Starting overnight classification — airport={} day1={} day2={}",
            window.airport, window.day1, window.day2
        );

        let raw = FlightWindowCollector::new(self.schedule.as_ref()).collect(&ctx, &window);
        let flights_seen = raw.len();

        let resolution = {
            let resolver = RegistrationResolver::new(self.lookup.as_ref())
                .with_secondary(self.secondary.as_deref())
                .with_forward_search_days(self.forward_search_days);
            resolver.resolve(&ctx, raw, &window, self.cache.as_mut())
        };
        self.save_cache();

        let records = classify(&resolution.flights, &window);
        info!(
            "Classified aircraft — airport={} records={} calls={} quota_exceeded={}",
            window.airport,
            records.len(),
            ctx.calls_made(),
            ctx.quota_exceeded()
        );

        Ok(Classification {
            window,
            records,
            flights_seen,
            flights_resolved: resolution.resolved,
            flights_dropped: resolution.dropped,
            calls_made: ctx.calls_made(),
            quota_exceeded: ctx.quota_exceeded(),
        })
    }

    /// Full run: classify, diff against the slot snapshot, push once.
    ///
    /// Slot read and push failures are reported in the summary rather than
    /// failing the run.
    pub fn run(
        &mut self,
        request: &RunRequest,
        registry: &dyn SlotRegistry,
        guard: &dyn EditGuard,
        push: &dyn SyncPush,
    ) -> Result<RunSummary, EngineError> {
        let classification = self.classify(request)?;
        let mut summary = RunSummary::from_classification(&classification);

        let slots = match registry.list_slots() {
            Ok(slots) => slots,
            Err(e) => {
                error!("Slot registry unavailable — error={}", e);
                summary.push_error = Some(format!("slot registry unavailable: {}", e));
                return Ok(summary);
            }
        };

        let updates = reconciler::reconcile(&classification.records, &slots);
        summary.fields_staged = updates.len();

        match reconciler::apply(&updates, guard, push) {
            Ok(outcome) => {
                summary.slots_updated = outcome.slots_updated;
                summary.slots_cleared = outcome.slots_cleared;
                summary.fields_skipped = outcome.skipped.len();
            }
            Err(e) => {
                error!("Sync push failed — fields={} error={}", updates.len(), e);
                summary.push_error = Some(e.to_string());
            }
        }

        info!(
            "Run finished — airport={} updated={} cleared={} skipped={} quota_exceeded={}",
            summary.airport,
            summary.slots_updated,
            summary.slots_cleared,
            summary.fields_skipped,
            summary.quota_exceeded
        );
        Ok(summary)
    }

    /// Dry run: everything up to the diff, nothing written.
    pub fn plan(
        &mut self,
        request: &RunRequest,
        registry: &dyn SlotRegistry,
    ) -> Result<(RunSummary, Vec<FieldUpdate>), EngineError> {
        let classification = self.classify(request)?;
        let mut summary = RunSummary::from_classification(&classification);
        summary.dry_run = true;

        let updates = match registry.list_slots() {
            Ok(slots) => reconciler::reconcile(&classification.records, &slots),
            Err(e) => {
                summary.push_error = Some(format!("slot registry unavailable: {}", e));
                Vec::new()
            }
        };
        summary.fields_staged = updates.len();
        Ok((summary, updates))
    }

    /// Runs the resolver chain for one flight number, cache first.
    pub fn lookup(
        &mut self,
        flight_number: &str,
        date: NaiveDate,
    ) -> Result<Option<(Registration, RegistrationSource)>, EngineError> {
        let flight_number = normalize_flight_number(flight_number);
        if flight_number.is_empty() {
            return Err(EngineError::InvalidRequest(
                "flight number is required".to_string(),
            ));
        }

        if let Some(entry) = self.cache.as_ref().and_then(|c| c.get(&flight_number, date)) {
            return Ok(Some((entry.registration.clone(), RegistrationSource::Cache)));
        }

        let window = QueryWindow {
            airport: String::new(),
            day1: date,
            day2: date.succ_opt().unwrap_or(date),
        };
        let ctx = RunContext::new(self.rate_limit_delay);
        let found = self
            .resolver()
            .resolve_number(&ctx, &flight_number, date, &window);

        if let (Some((reg, source)), Some(cache)) = (&found, self.cache.as_mut()) {
            cache.insert(&flight_number, date, reg.clone(), *source);
        }
        self.save_cache();
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_notice_only_on_quota() {
        let mut summary = RunSummary {
            airport: "MUC".into(),
            continues: 2,
            parked: 1,
            ..RunSummary::default()
        };
        let text = summary.to_string();
        assert!(text.contains("3 (2 continues, 1 parked)"));
        assert!(!text.contains("NOTICE"));

        summary.quota_exceeded = true;
        assert!(summary.to_string().contains("partial, possibly stale"));
    }

    #[test]
    fn test_request_validation() {
        let d1 = NaiveDate::from_ymd_opt(2025, 8, 3).unwrap();
        assert!(RunRequest::new("", d1, d1.succ_opt().unwrap()).window().is_err());
        assert!(RunRequest::new("MUC", d1, d1).window().is_err());
        assert!(RunRequest::new("muc", d1, d1.succ_opt().unwrap()).window().is_ok());
    }
}
