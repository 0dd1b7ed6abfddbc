// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::model::OvernightRecord;
use crate::registration::Registration;
use crate::slots::{EditGuard, Slot, SyncError, SyncPush};
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotField {
    ArrivalTime,
    DepartureTime,
    Route,
    OriginCode,
    DestCode,
}

impl SlotField {
    pub const ALL: [SlotField; 5] = [
        SlotField::ArrivalTime,
        SlotField::DepartureTime,
        SlotField::Route,
        SlotField::OriginCode,
        SlotField::DestCode,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            SlotField::ArrivalTime => "arrival-time-",
            SlotField::DepartureTime => "departure-time-",
            SlotField::Route => "route-",
            SlotField::OriginCode => "origin-code-",
            SlotField::DestCode => "dest-code-",
        }
    }

    pub fn field_id(self, slot_id: &str) -> String {
        format!("{}{}", self.prefix(), slot_id)
    }

    /// `"route-A12"` -> `(Route, "A12")`.
    pub fn parse_field_id(field_id: &str) -> Option<(SlotField, &str)> {
        Self::ALL.iter().find_map(|field| {
            field_id
                .strip_prefix(field.prefix())
                .filter(|slot| !slot.is_empty())
                .map(|slot| (*field, slot))
        })
    }

    pub fn value_for(self, record: &OvernightRecord) -> String {
        match self {
            SlotField::ArrivalTime => record.arrival_time_text(),
            SlotField::DepartureTime => record.departure_time_text(),
            SlotField::Route => record.route.clone(),
            SlotField::OriginCode => record.origin_code(),
            SlotField::DestCode => record.dest_code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldUpdate {
    pub slot_id: String,
    pub field: SlotField,
    pub value: String,
    /// Part of clearing a slot that no longer has an overnight record.
    pub clearing: bool,
}

impl FieldUpdate {
    pub fn field_id(&self) -> String {
        self.field.field_id(&self.slot_id)
    }
}

/// Pure diff of the classification against a slot snapshot.
///
/// Slots without a registration are never touched. Fields that already
/// hold the desired value are not staged.
pub fn reconcile(records: &[OvernightRecord], slots: &[Slot]) -> Vec<FieldUpdate> {
    let by_registration: HashMap<&Registration, &OvernightRecord> =
        records.iter().map(|r| (&r.registration, r)).collect();

    let mut updates = Vec::new();
    for slot in slots {
        let Some(registration) = Registration::parse(&slot.registration) else {
            continue;
        };
        let record = by_registration.get(&registration).copied();

        for field in SlotField::ALL {
            let desired = record.map(|r| field.value_for(r)).unwrap_or_default();
            if slot.fields.get(field) == desired {
                continue;
            }
            updates.push(FieldUpdate {
                slot_id: slot.id.clone(),
                field,
                value: desired,
                clearing: record.is_none(),
            });
        }
    }

    debug!(
        "Reconciled slots — records={} slots={} staged={}",
        records.len(),
        slots.len(),
        updates.len()
    );
    updates
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Field ids actually sent in the push.
    pub pushed: Vec<String>,
    /// Field ids held back by the local-edit guard.
    pub skipped: Vec<String>,
    pub slots_updated: usize,
    pub slots_cleared: usize,
}

/// Filters guarded fields and pushes the remainder in one call. Nothing
/// is pushed when nothing is left.
pub fn apply(
    updates: &[FieldUpdate],
    guard: &dyn EditGuard,
    push: &dyn SyncPush,
) -> Result<ApplyOutcome, SyncError> {
    let mut outcome = ApplyOutcome::default();
    let mut payload = BTreeMap::new();
    let mut updated = BTreeSet::new();
    let mut cleared = BTreeSet::new();

    for update in updates {
        let field_id = update.field_id();
        if guard.is_guarded(&field_id) {
            debug!("Skipping recently edited field — field={}", field_id);
            outcome.skipped.push(field_id);
            continue;
        }
        if update.clearing {
            cleared.insert(update.slot_id.as_str());
        } else {
            updated.insert(update.slot_id.as_str());
        }
        payload.insert(field_id, update.value.clone());
    }

    outcome.slots_updated = updated.len();
    outcome.slots_cleared = cleared.len();

    if payload.is_empty() {
        debug!("Nothing to push — skipped={}", outcome.skipped.len());
        return Ok(outcome);
    }

    push.push_field_updates(&payload)?;
    info!(
        "Pushed field updates — fields={} slots_updated={} slots_cleared={} skipped={}",
        payload.len(),
        outcome.slots_updated,
        outcome.slots_cleared,
        outcome.skipped.len()
    );
    outcome.pushed = payload.into_keys().collect();
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArrivalInfo, DepartureInfo};
    use crate::slots::{NoGuard, SlotFields};
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    fn record(reg: &str) -> OvernightRecord {
        OvernightRecord::new(
            Registration::parse(reg).unwrap(),
            Some(ArrivalInfo {
                from: "JFK".into(),
                time: Utc.with_ymd_and_hms(2025, 8, 3, 14, 10, 0).unwrap(),
                flight_number: "LH401".into(),
            }),
            Some(DepartureInfo {
                to: "LHR".into(),
                time: Utc.with_ymd_and_hms(2025, 8, 4, 7, 30, 0).unwrap(),
                flight_number: "LH2470".into(),
            }),
        )
    }

    fn slot(id: &str, reg: &str, fields: SlotFields) -> Slot {
        Slot::new(id, reg, fields)
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<BTreeMap<String, String>>>);

    impl SyncPush for Recorder {
        fn push_field_updates(&self, updates: &BTreeMap<String, String>) -> Result<(), SyncError> {
            self.0.lock().unwrap().push(updates.clone());
            Ok(())
        }
    }

    struct GuardOnly(&'static str);

    impl EditGuard for GuardOnly {
        fn is_guarded(&self, field_id: &str) -> bool {
            field_id == self.0
        }
    }

    #[test]
    fn test_parse_field_id() {
        assert_eq!(
            SlotField::parse_field_id("dest-code-7"),
            Some((SlotField::DestCode, "7"))
        );
        assert_eq!(
            SlotField::parse_field_id("departure-time-A1"),
            Some((SlotField::DepartureTime, "A1"))
        );
        assert_eq!(SlotField::parse_field_id("route-"), None);
        assert_eq!(SlotField::parse_field_id("notes-1"), None);
    }

    #[test]
    fn test_match_sets_and_stale_clears() {
        let stale = SlotFields {
            arrival_time: "09:00".into(),
            route: "CDG → ---".into(),
            ..SlotFields::default()
        };
        let slots = vec![
            slot("1", "daibl", SlotFields::default()),
            slot("2", "D-AIBM", stale),
            slot("3", "", SlotFields::default()),
            slot("4", "D-AIBN", SlotFields::default()),
        ];
        let updates = reconcile(&[record("D-AIBL")], &slots);

        let for_slot = |id: &str| updates.iter().filter(|u| u.slot_id == id).count();
        assert_eq!(for_slot("1"), 5);
        // Only the two non-empty stale fields need clearing.
        assert_eq!(for_slot("2"), 2);
        assert_eq!(for_slot("3"), 0);
        assert_eq!(for_slot("4"), 0);
        assert!(updates
            .iter()
            .any(|u| u.field_id() == "route-1" && u.value == "JFK → LHR"));
    }

    #[test]
    fn test_unchanged_fields_are_not_staged() {
        let rec = record("D-AIBL");
        let current = SlotFields {
            arrival_time: rec.arrival_time_text(),
            departure_time: rec.departure_time_text(),
            route: rec.route.clone(),
            origin_code: rec.origin_code(),
            dest_code: rec.dest_code(),
            ..SlotFields::default()
        };
        assert!(reconcile(&[rec], &[slot("1", "D-AIBL", current)]).is_empty());
    }

    #[test]
    fn test_apply_single_push_and_guard() {
        let slots = vec![slot("1", "D-AIBL", SlotFields::default())];
        let updates = reconcile(&[record("D-AIBL")], &slots);
        let push = Recorder::default();

        let outcome = apply(&updates, &GuardOnly("route-1"), &push).unwrap();
        let pushes = push.0.lock().unwrap();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].len(), 4);
        assert!(!pushes[0].contains_key("route-1"));
        assert_eq!(outcome.skipped, vec!["route-1".to_string()]);
        assert_eq!(outcome.slots_updated, 1);
    }

    #[test]
    fn test_apply_with_nothing_does_not_push() {
        let push = Recorder::default();
        let outcome = apply(&[], &NoGuard, &push).unwrap();
        assert!(push.0.lock().unwrap().is_empty());
        assert!(outcome.pushed.is_empty());
    }
}
