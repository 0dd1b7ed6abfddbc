// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

mod common;

use common::at;
use hangar_core::model::{ArrivalInfo, DepartureInfo};
use hangar_core::reconciler::{apply, reconcile, SlotField};
use hangar_core::slots::{
    EditGuard, FileSlotStore, LocalEdit, Slot, SlotFields, SlotRegistry, SlotSnapshot, SyncPush,
};
use hangar_core::{OvernightRecord, Registration};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tempfile::tempdir;

fn continues(reg: &str) -> OvernightRecord {
    OvernightRecord::new(
        Registration::parse(reg).unwrap(),
        Some(ArrivalInfo {
            from: "JFK".into(),
            time: at(3, 14, 10),
            flight_number: "LH401".into(),
        }),
        Some(DepartureInfo {
            to: "LHR".into(),
            time: at(4, 7, 30),
            flight_number: "LH2470".into(),
        }),
    )
}

fn filled() -> SlotFields {
    SlotFields {
        arrival_time: "09:15".into(),
        departure_time: "06:00".into(),
        route: "CDG → FRA".into(),
        origin_code: "CDG".into(),
        dest_code: "FRA".into(),
        ..SlotFields::default()
    }
}

#[test]
fn test_field_symmetry() {
    let slots = vec![
        Slot {
            id: "7".into(),
            registration: "D AIBL".into(),
            fields: filled(),
            ..Default::default()
        },
        Slot {
            id: "8".into(),
            registration: "G-EUPH".into(),
            fields: filled(),
            ..Default::default()
        },
    ];
    let updates = reconcile(&[continues("D-AIBL")], &slots);

    let set: HashSet<(String, SlotField)> = updates
        .iter()
        .filter(|u| u.slot_id == "7")
        .map(|u| (u.slot_id.clone(), u.field))
        .collect();
    assert_eq!(set.len(), 5);

    let cleared: Vec<_> = updates.iter().filter(|u| u.slot_id == "8").collect();
    assert_eq!(cleared.len(), 5);
    assert!(cleared.iter().all(|u| u.value.is_empty() && u.clearing));

    // Nothing outside the five managed field ids.
    for u in &updates {
        assert!(SlotField::parse_field_id(&u.field_id()).is_some());
    }
}

#[test]
fn test_second_run_posts_nothing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("slots.json");
    let snapshot = SlotSnapshot {
        slots: vec![Slot {
            id: "1".into(),
            registration: "DAIBL".into(),
            fields: SlotFields::default(),
            ..Default::default()
        }],
        local_edits: BTreeMap::new(),
        ..Default::default()
    };
    FileSlotStore::write_snapshot(&path, &snapshot).unwrap();
    let store = FileSlotStore::open(&path, Duration::from_secs(5)).unwrap();
    let records = [continues("D-AIBL")];

    let first = apply(
        &reconcile(&records, &store.list_slots().unwrap()),
        &store,
        &store,
    )
    .unwrap();
    assert_eq!(first.pushed.len(), 5);

    let again = reconcile(&records, &store.list_slots().unwrap());
    assert!(again.is_empty());
}

#[test]
fn test_file_store_guard_reads_local_edits() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("slots.json");
    let mut local_edits = BTreeMap::new();
    local_edits.insert(
        "arrival-time-1".to_string(),
        LocalEdit {
            value: "12:00".into(),
            edited_at: chrono::Utc::now(),
        },
    );
    local_edits.insert(
        "route-1".to_string(),
        LocalEdit {
            value: "old".into(),
            edited_at: at(1, 0, 0),
        },
    );
    FileSlotStore::write_snapshot(
        &path,
        &SlotSnapshot {
            slots: Vec::new(),
            local_edits,
            ..Default::default()
        },
    )
    .unwrap();

    let store = FileSlotStore::open(&path, Duration::from_secs(5)).unwrap();
    assert!(store.is_guarded("arrival-time-1"));
    assert!(!store.is_guarded("route-1"));
    assert!(!store.is_guarded("dest-code-1"));
}

#[test]
fn test_missing_slot_file_is_empty_board() {
    let dir = tempdir().unwrap();
    let store = FileSlotStore::open(&dir.path().join("none.json"), Duration::from_secs(5)).unwrap();
    assert!(store.list_slots().unwrap().is_empty());
}

#[test]
fn test_malformed_slot_file_fails_to_open() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("slots.json");
    std::fs::write(&path, "{ broken").unwrap();
    assert!(FileSlotStore::open(&path, Duration::from_secs(5)).is_err());
}

#[test]
fn test_push_keeps_unmanaged_slot_data() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("slots.json");
    std::fs::write(
        &path,
        r#"{
            "slots": [{
                "id": "1",
                "registration": "D-AIBL",
                "notes": "keep me",
                "fields": { "arrivalTime": "", "position": "A12" }
            }],
            "localEdits": {},
            "settings": { "zoom": 2 }
        }"#,
    )
    .unwrap();

    let store = FileSlotStore::open(&path, Duration::from_secs(5)).unwrap();
    let mut updates = BTreeMap::new();
    updates.insert("arrival-time-1".to_string(), "14:10".to_string());
    store.push_field_updates(&updates).unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let slot = &written["slots"][0];
    assert_eq!(slot["fields"]["arrivalTime"], "14:10");
    assert_eq!(slot["notes"], "keep me");
    assert_eq!(slot["fields"]["position"], "A12");
    assert_eq!(written["settings"]["zoom"], 2);

    // The typed view still sees only the managed fields.
    let slots = store.list_slots().unwrap();
    assert_eq!(slots[0].fields.get(SlotField::ArrivalTime), "14:10");
    assert_eq!(slots[0].fields.extra["position"], "A12");
}
