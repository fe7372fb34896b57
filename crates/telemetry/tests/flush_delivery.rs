//! Buffered shipment tests: batch ordering, at-least-once restoration on
//! transport failure, lifecycle-triggered flushes, and dispose semantics.

mod common;

use steno_telemetry::LifecycleSignal;

use common::{failure_details, subscription, tracker_fixture, user, wait_for};

#[tokio::test]
async fn flush_ships_one_batch_in_insertion_order() {
    let fixture = tracker_fixture();
    let mut ids = Vec::new();
    for _ in 0..3 {
        let attempt_id = fixture
            .tracker
            .track_payment_attempt(user(), subscription(9.99))
            .expect("attempt recorded");
        fixture
            .tracker
            .track_payment_failure(&attempt_id, failure_details("CARD_DECLINED"))
            .expect("failure recorded");
        ids.push(attempt_id);
    }

    assert_eq!(fixture.tracker.buffered_failures(), 3);
    assert!(fixture.tracker.flush_now().await);
    assert_eq!(fixture.tracker.buffered_failures(), 0);

    let batches = fixture.transport.delivered_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0], ids);
}

#[tokio::test]
async fn failed_flush_restores_the_batch_without_loss_or_duplication() {
    let fixture = tracker_fixture();
    let attempt_id = fixture
        .tracker
        .track_payment_attempt(user(), subscription(9.99))
        .expect("attempt recorded");
    fixture
        .tracker
        .track_payment_failure(&attempt_id, failure_details("CARD_DECLINED"))
        .expect("failure recorded");

    fixture.transport.set_failing(true);
    assert!(!fixture.tracker.flush_now().await);
    assert_eq!(fixture.tracker.buffered_failures(), 1);
    assert!(fixture.transport.delivered_batches().is_empty());

    // A second failed flush still neither loses nor duplicates.
    assert!(!fixture.tracker.flush_now().await);
    assert_eq!(fixture.tracker.buffered_failures(), 1);

    fixture.transport.set_failing(false);
    assert!(fixture.tracker.flush_now().await);
    let batches = fixture.transport.delivered_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0], vec![attempt_id]);
}

#[tokio::test]
async fn retried_batch_ships_ahead_of_newer_failures() {
    let fixture = tracker_fixture();

    let first = fixture
        .tracker
        .track_payment_attempt(user(), subscription(9.99))
        .expect("attempt recorded");
    fixture
        .tracker
        .track_payment_failure(&first, failure_details("CARD_DECLINED"))
        .expect("failure recorded");

    fixture.transport.set_failing(true);
    assert!(!fixture.tracker.flush_now().await);

    // A failure recorded while the first batch awaits retry.
    let second = fixture
        .tracker
        .track_payment_attempt(user(), subscription(9.99))
        .expect("attempt recorded");
    fixture
        .tracker
        .track_payment_failure(&second, failure_details("SERVER_ERROR"))
        .expect("failure recorded");

    fixture.transport.set_failing(false);
    assert!(fixture.tracker.flush_now().await);

    let batches = fixture.transport.delivered_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0], vec![first, second]);
}

#[tokio::test]
async fn hidden_tab_triggers_a_background_flush() {
    let fixture = tracker_fixture();
    let attempt_id = fixture
        .tracker
        .track_payment_attempt(user(), subscription(9.99))
        .expect("attempt recorded");
    fixture
        .tracker
        .track_payment_failure(&attempt_id, failure_details("CARD_DECLINED"))
        .expect("failure recorded");

    fixture.tracker.on_lifecycle(LifecycleSignal::Hidden);
    assert!(wait_for(|| fixture.transport.delivered_batches().len() == 1).await);
    assert_eq!(fixture.tracker.buffered_failures(), 0);
}

#[tokio::test]
async fn dispose_stops_the_loops_and_flushes_what_remains() {
    let fixture = tracker_fixture();
    fixture.tracker.start();

    let attempt_id = fixture
        .tracker
        .track_payment_attempt(user(), subscription(9.99))
        .expect("attempt recorded");
    fixture
        .tracker
        .track_payment_failure(&attempt_id, failure_details("CARD_DECLINED"))
        .expect("failure recorded");

    fixture.tracker.dispose().await;

    let batches = fixture.transport.delivered_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0], vec![attempt_id]);
    assert_eq!(fixture.tracker.buffered_failures(), 0);
}

#[tokio::test(start_paused = true)]
async fn periodic_flush_ships_on_the_configured_interval() {
    let fixture = tracker_fixture();
    fixture.tracker.start();

    let attempt_id = fixture
        .tracker
        .track_payment_attempt(user(), subscription(9.99))
        .expect("attempt recorded");
    fixture
        .tracker
        .track_payment_failure(&attempt_id, failure_details("CARD_DECLINED"))
        .expect("failure recorded");

    // The default interval is 30 s; the record ships without a manual flush
    // once virtual time passes the next tick.
    tokio::time::sleep(std::time::Duration::from_secs(31)).await;
    assert_eq!(fixture.transport.delivered_batches().len(), 1);

    fixture.tracker.dispose().await;
}
