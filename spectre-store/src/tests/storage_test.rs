use assert_fs::TempDir;
use clockabilly::mock::MockUtcClock;
use rstest::*;
use spectre_types::{Event, EventType, ResourceMetadata};

use crate::{QueryFilter, Storage, StoreConfig};

fn ev(id: &str, ts: i64, kind: &str) -> Event {
    Event {
        id: id.into(),
        timestamp: ts,
        event_type: EventType::Create,
        resource: ResourceMetadata { uid: id.into(), kind: kind.into(), namespace: "default".into(), ..Default::default() },
        data: serde_json::json!({"spec": "v1"}),
    }
}

fn config(dir: &TempDir) -> StoreConfig {
    StoreConfig { data_dir: dir.path().to_path_buf(), ..Default::default() }
}

#[rstest(tokio::test)]
async fn test_write_then_query_roundtrip() {
    let dir = TempDir::new().unwrap();
    let storage = Storage::new(config(&dir)).unwrap();
    let bucket = spectre_core::time::hour_bucket(0);

    storage.write_event(ev("e1", bucket.start_ns, "Pod")).await.unwrap();
    storage.write_event(ev("e2", bucket.start_ns + 5, "Service")).await.unwrap();

    let filter = QueryFilter { kind: None, namespace: None, api_group: None };
    let events = storage.query_events(bucket.start_ns, bucket.end_ns, filter).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].id, "e1");
}

#[rstest(tokio::test)]
async fn test_carryover_resource_synthesized_in_next_hour() {
    let dir = TempDir::new().unwrap();
    let storage = Storage::new(config(&dir)).unwrap();
    let hour_a = spectre_core::time::hour_bucket(0);
    let hour_b = hour_a.next();

    storage.write_event(ev("p1", hour_a.start_ns, "Pod")).await.unwrap();

    let filter = QueryFilter { kind: None, namespace: None, api_group: None };
    let events_before = storage.query_events(hour_b.start_ns, hour_b.end_ns, filter).await.unwrap();
    assert!(events_before.is_empty());

    storage.write_event(ev("p2", hour_b.start_ns + 1, "Pod")).await.unwrap();

    let filter = QueryFilter { kind: None, namespace: None, api_group: None };
    let events_after = storage.query_events(hour_b.start_ns, hour_b.end_ns, filter).await.unwrap();
    assert!(events_after.iter().any(|e| e.id == "state-p1"));
    assert!(events_after.iter().any(|e| e.id == "p2"));
}

#[rstest(tokio::test)]
async fn test_delete_old_files_removes_closed_hour() {
    let dir = TempDir::new().unwrap();
    let hour = spectre_core::time::hour_bucket(0);
    let now_ts = hour.end_ns / spectre_core::time::NANOS_PER_SEC + 400 * 24 * 3600;
    let clock = MockUtcClock::new(now_ts);
    let storage = Storage::with_clock(config(&dir), clock).unwrap();

    storage.write_event(ev("old1", hour.start_ns, "Pod")).await.unwrap();
    storage.shutdown().await.unwrap();

    let removed = storage.delete_old_files(24).await.unwrap();
    assert_eq!(removed, 1);

    let filter = QueryFilter { kind: None, namespace: None, api_group: None };
    let events = storage.query_events(hour.start_ns, hour.end_ns, filter).await.unwrap();
    assert!(events.is_empty());
}
