mod common;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::{ScriptedFetch, Step, envelope, wait_for_requests};
use ownerpulse_api_client::PageReader;
use ownerpulse_core::testing::{at, item};
use ownerpulse_core::{AggregateSnapshot, DayZone, FoldPolicy, OwnerId, Record};
use ownerpulse_daemon::{ScanController, ScanOptions, ScanPhase, ScanStore};
use serde_json::{Value, json};
use tokio::sync::Notify;

fn fixed_now() -> DateTime<Utc> {
    at("2024-05-10T12:00:00Z")
}

fn options() -> ScanOptions {
    ScanOptions {
        take: 100,
        max_pages: 200,
        policy: FoldPolicy::new(DayZone::Utc, 7),
    }
}

fn controller(
    fetch: &Arc<ScriptedFetch>,
    store: &ScanStore,
    options: ScanOptions,
) -> ScanController<ScriptedFetch> {
    ScanController::new(
        store.clone(),
        PageReader::new(Arc::clone(fetch), "records"),
        options,
    )
    .with_clock(fixed_now)
}

fn records(items: &[Value]) -> Vec<Record> {
    items.iter().map(Record::from_value).collect()
}

fn rfc3339(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339()
}

#[tokio::test]
async fn two_pages_fold_to_completion() {
    let today = rfc3339(Utc::now());
    let yesterday = rfc3339(Utc::now() - Duration::days(1));
    let fetch = ScriptedFetch::new(vec![
        Step::Page(envelope(
            vec![item(1, Some(today.as_str())), item(2, Some(today.as_str()))],
            Some(2),
        )),
        Step::Page(envelope(vec![item(1, Some(yesterday.as_str()))], None)),
    ]);
    let store = ScanStore::new();

    let outcome = controller(&fetch, &store, options()).scan().await;

    assert_eq!(outcome.phase, ScanPhase::Completed);
    assert_eq!(outcome.pages_fetched, 2);
    assert_eq!(outcome.records_seen, 3);
    assert!(!outcome.truncated);

    let state = store.latest();
    assert_eq!(state.phase, ScanPhase::Completed);
    assert!(!state.partial);
    assert_eq!(state.snapshot.total, 3);
    assert_eq!(state.snapshot.owner_totals[&OwnerId::from(1)], 2);
    assert_eq!(state.snapshot.owner_totals[&OwnerId::from(2)], 1);
    assert_eq!(
        fetch.requests(),
        vec!["records?take=100", "records?take=100&cursor=2"]
    );
}

#[tokio::test]
async fn failed_second_page_keeps_first_page() {
    let page_one = vec![item(1, None), item(2, None)];
    let fetch = ScriptedFetch::new(vec![
        Step::Page(envelope(page_one.clone(), Some(2))),
        Step::Status(500),
    ]);
    let store = ScanStore::new();

    let outcome = controller(&fetch, &store, options()).scan().await;

    assert_eq!(outcome.phase, ScanPhase::PartiallyFailed);
    let state = store.latest();
    assert_eq!(state.phase, ScanPhase::PartiallyFailed);
    assert!(state.partial);
    assert_eq!(state.snapshot.total, 2);
    assert!(state.error.as_deref().unwrap_or_default().contains("500"));

    let expected =
        AggregateSnapshot::default().fold(&records(&page_one), fixed_now(), &options().policy);
    assert_eq!(*state.snapshot, expected);
}

#[tokio::test]
async fn failure_on_page_three_of_five_keeps_pages_one_and_two() {
    let p1 = vec![item(1, Some("2024-05-09T10:00:00Z")), item(3, None)];
    let p2 = vec![item(json!(null), Some("2024-05-01T10:00:00Z"))];
    let p4 = vec![item(9, None)];
    let fetch = ScriptedFetch::new(vec![
        Step::Page(envelope(p1.clone(), Some(2))),
        Step::Page(envelope(p2.clone(), Some(3))),
        Step::Transport,
        Step::Page(envelope(p4, Some(5))),
        Step::Page(envelope(vec![], None)),
    ]);
    let store = ScanStore::new();

    let outcome = controller(&fetch, &store, options()).scan().await;

    assert_eq!(outcome.phase, ScanPhase::PartiallyFailed);
    assert_eq!(outcome.pages_fetched, 2);
    assert_eq!(fetch.request_count(), 3);

    let policy = options().policy;
    let expected = AggregateSnapshot::default()
        .fold(&records(&p1), fixed_now(), &policy)
        .fold(&records(&p2), fixed_now(), &policy);
    let state = store.latest();
    assert!(state.partial);
    assert_eq!(*state.snapshot, expected);
    assert_eq!(state.pages_fetched, 2);
}

#[tokio::test]
async fn superseded_generation_never_publishes() {
    let gate = Arc::new(Notify::new());
    let fetch = ScriptedFetch::new(vec![
        Step::Gated(Arc::clone(&gate), json!([item(1, None), item(1, None)])),
        Step::Page(json!([item(2, None)])),
    ]);
    let store = ScanStore::new();
    let controller = Arc::new(controller(&fetch, &store, options()));

    let g1 = controller.start();
    let stale = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.run(g1).await }
    });
    wait_for_requests(&fetch, 1).await;

    let g2 = controller.start();
    assert!(g2 > g1);
    let fresh = controller.run(g2).await;
    assert_eq!(fresh.phase, ScanPhase::Completed);

    gate.notify_one();
    let stale = stale.await.unwrap();
    assert_eq!(stale.phase, ScanPhase::Aborted);
    assert_eq!(stale.generation, g1);

    let state = store.latest();
    assert_eq!(state.generation, g2);
    assert_eq!(state.phase, ScanPhase::Completed);
    assert_eq!(state.snapshot.total, 1);
    assert_eq!(state.snapshot.owner_totals.get(&OwnerId::from(1)), None);
}

#[tokio::test]
async fn stale_failure_does_not_flag_partial() {
    let gate = Arc::new(Notify::new());
    let fetch = ScriptedFetch::new(vec![Step::GatedStatus(Arc::clone(&gate), 502)]);
    let store = ScanStore::new();
    let controller = Arc::new(controller(&fetch, &store, options()));

    let g1 = controller.start();
    let stale = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.run(g1).await }
    });
    wait_for_requests(&fetch, 1).await;

    let g2 = store.begin();
    gate.notify_one();
    assert_eq!(stale.await.unwrap().phase, ScanPhase::Aborted);

    // g2 has not fetched anything; its state must still be pristine.
    let state = store.latest();
    assert_eq!(state.generation, g2);
    assert_eq!(state.phase, ScanPhase::Running);
    assert!(!state.partial);
}

#[tokio::test]
async fn page_cap_stops_walk_and_flags_truncation() {
    let fetch = ScriptedFetch::new(vec![
        Step::Page(envelope(vec![item(1, None)], Some(2))),
        Step::Page(envelope(vec![item(1, None)], Some(3))),
        Step::Page(envelope(vec![item(1, None)], Some(4))),
    ]);
    let store = ScanStore::new();
    let options = ScanOptions {
        max_pages: 2,
        ..options()
    };

    let outcome = controller(&fetch, &store, options).scan().await;

    assert_eq!(outcome.phase, ScanPhase::Completed);
    assert!(outcome.truncated);
    assert_eq!(outcome.pages_fetched, 2);
    assert_eq!(fetch.request_count(), 2);
    let state = store.latest();
    assert!(state.truncated);
    assert!(!state.partial);
    assert_eq!(state.snapshot.total, 2);
}

#[tokio::test]
async fn cap_on_the_last_page_is_not_truncation() {
    let fetch = ScriptedFetch::new(vec![
        Step::Page(envelope(vec![item(1, None)], Some(2))),
        Step::Page(envelope(vec![item(1, None)], None)),
    ]);
    let store = ScanStore::new();
    let options = ScanOptions {
        max_pages: 2,
        ..options()
    };

    let outcome = controller(&fetch, &store, options).scan().await;
    assert_eq!(outcome.phase, ScanPhase::Completed);
    assert!(!outcome.truncated);
}

#[tokio::test]
async fn malformed_bodies_count_as_empty_pages() {
    let fetch = ScriptedFetch::new(vec![
        Step::Page(json!({ "nextCursor": 7 })),
        Step::Page(envelope(vec![item(4, None)], Some(8))),
        Step::Page(json!("definitely not a page")),
        Step::Page(envelope(vec![item(5, None)], None)),
    ]);
    let store = ScanStore::new();

    let outcome = controller(&fetch, &store, options()).scan().await;

    assert_eq!(outcome.phase, ScanPhase::Completed);
    assert_eq!(outcome.pages_fetched, 3);
    let state = store.latest();
    assert_eq!(state.snapshot.total, 1);
    assert_eq!(state.snapshot.owner_totals[&OwnerId::from(4)], 1);
}

#[tokio::test]
async fn opaque_cursors_are_followed_as_sent() {
    let cases = [
        (json!(18446744073709551615u64), "18446744073709551615"),
        (json!(7.5), "7.5"),
        (json!("abc123"), "abc123"),
    ];
    for (next_cursor, sent) in cases {
        let fetch = ScriptedFetch::new(vec![
            Step::Page(json!({ "items": [item(1, None)], "nextCursor": next_cursor })),
            Step::Page(envelope(vec![item(2, None)], None)),
        ]);
        let store = ScanStore::new();

        let outcome = controller(&fetch, &store, options()).scan().await;

        assert_eq!(outcome.phase, ScanPhase::Completed, "{sent}");
        assert_eq!(outcome.pages_fetched, 2, "{sent}");
        assert_eq!(
            fetch.requests(),
            vec![
                "records?take=100".to_string(),
                format!("records?take=100&cursor={sent}"),
            ]
        );
        assert_eq!(store.latest().snapshot.total, 2);
    }
}

#[tokio::test]
async fn structured_cursor_ends_as_partial_failure() {
    let fetch = ScriptedFetch::new(vec![
        Step::Page(json!({ "items": [item(1, None)], "nextCursor": { "after": 9 } })),
        Step::Page(envelope(vec![item(2, None)], None)),
    ]);
    let store = ScanStore::new();

    let outcome = controller(&fetch, &store, options()).scan().await;

    assert_eq!(outcome.phase, ScanPhase::PartiallyFailed);
    assert_eq!(outcome.pages_fetched, 1);
    assert_eq!(fetch.request_count(), 1);
    let state = store.latest();
    assert_eq!(state.phase, ScanPhase::PartiallyFailed);
    assert!(state.partial);
    assert_eq!(state.snapshot.total, 1);
    assert!(state.error.as_deref().unwrap_or_default().contains("nextCursor"));
}

#[tokio::test]
async fn bare_array_is_the_whole_collection() {
    let fetch = ScriptedFetch::new(vec![
        Step::Page(json!([item(1, None), item("7", None), item(json!(null), None)])),
        Step::Page(json!([item(1, None)])),
    ]);
    let store = ScanStore::new();

    let outcome = controller(&fetch, &store, options()).scan().await;

    assert_eq!(outcome.pages_fetched, 1);
    let snapshot = store.latest().snapshot;
    assert_eq!(snapshot.total, 3);
    assert_eq!(snapshot.owner_totals[&OwnerId::unassigned()], 1);
}

#[tokio::test]
async fn completed_scan_conserves_every_record() {
    let sizes = [100usize, 100, 37, 0, 64, 100, 3];
    let mut steps = Vec::new();
    let mut seen = 0u64;
    for (page, size) in sizes.iter().enumerate() {
        let items: Vec<Value> = (0..*size)
            .map(|i| {
                let owner = (page * 31 + i) % 11;
                let created = (i % 4 != 0).then_some("2024-05-02T09:30:00Z");
                if owner == 0 {
                    item(json!(null), created)
                } else {
                    item(owner as i64, created)
                }
            })
            .collect();
        seen += items.len() as u64;
        let next = (page + 1 < sizes.len()).then_some(page as i64 + 2);
        steps.push(Step::Page(envelope(items, next)));
    }
    let fetch = ScriptedFetch::new(steps);
    let store = ScanStore::new();

    let outcome = controller(&fetch, &store, options()).scan().await;

    assert_eq!(outcome.phase, ScanPhase::Completed);
    assert_eq!(outcome.records_seen, seen);
    let snapshot = store.latest().snapshot;
    assert_eq!(snapshot.total, seen);
    assert_eq!(snapshot.owner_totals.values().sum::<u64>(), snapshot.total);
    assert!(snapshot.dated_total() <= snapshot.total);
}

#[tokio::test]
async fn snapshots_grow_monotonically_within_a_generation() {
    let gate = Arc::new(Notify::new());
    let fetch = ScriptedFetch::new(vec![
        Step::Page(envelope(vec![item(1, None)], Some(2))),
        Step::Gated(
            Arc::clone(&gate),
            envelope(vec![item(2, None), item(3, None)], None),
        ),
    ]);
    let store = ScanStore::new();
    let controller = Arc::new(controller(&fetch, &store, options()));

    let task = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.scan().await }
    });
    wait_for_requests(&fetch, 2).await;

    let midway = store.latest();
    assert!(midway.is_running());
    assert_eq!(midway.snapshot.total, 1);

    gate.notify_one();
    task.await.unwrap();
    let done = store.latest();
    assert_eq!(done.generation, midway.generation);
    assert_eq!(done.snapshot.total, 3);
    // The earlier snapshot handed out is unaffected by later folds.
    assert_eq!(midway.snapshot.total, 1);
}
