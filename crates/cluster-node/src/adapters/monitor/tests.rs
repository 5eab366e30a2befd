//! Tests for HeartbeatMonitor

use std::sync::{OnceLock, Weak};

use super::*;
use crate::domain::{HelloReply, ServerType};
use crate::events::NodeEventListener;
use crate::testing::{primary_reply, MockHeartbeat, RecordingListener};

fn address() -> Address {
    Address::parse("db1:27017").unwrap()
}

fn build_monitor(
    heartbeat: &Arc<MockHeartbeat>,
    options: NodeOptions,
) -> (HeartbeatMonitor<Arc<MockHeartbeat>>, Arc<RecordingListener>) {
    let listeners = Arc::new(EventListeners::new());
    let recorder = Arc::new(RecordingListener::new());
    listeners.subscribe(recorder.clone());
    let monitor = HeartbeatMonitor::new(address(), Arc::clone(heartbeat), options, listeners);
    (monitor, recorder)
}

/// Records `last_scan_time` at the moment each new description is published.
#[derive(Default)]
struct StampAtPublish {
    monitor: OnceLock<Weak<HeartbeatMonitor<Arc<MockHeartbeat>>>>,
    seen: Mutex<Vec<Option<SystemTime>>>,
}

impl NodeEventListener for StampAtPublish {
    fn on_event(&self, event: &NodeEvent) {
        if let NodeEvent::DescriptionChanged { .. } = event {
            let stamp = self
                .monitor
                .get()
                .and_then(Weak::upgrade)
                .and_then(|monitor| monitor.last_scan_time());
            self.seen.lock().push(stamp);
        }
    }
}

// =============================================================================
// TEST GROUP 1: Forced scans
// =============================================================================

#[tokio::test]
async fn test_scan_publishes_description() {
    let heartbeat = Arc::new(MockHeartbeat::new(primary_reply()));
    let (monitor, recorder) = build_monitor(&heartbeat, NodeOptions::for_testing());

    assert!(monitor.current_description().is_unknown());
    assert!(monitor.last_scan_time().is_none());

    let description = monitor.scan().await.unwrap();

    assert!(description.is_primary());
    assert!(monitor.current_description().is_primary());
    assert!(monitor.current_description().round_trip_time().is_some());
    assert!(monitor.last_scan_time().is_some());
    assert_eq!(heartbeat.calls(), 1);
    assert_eq!(recorder.description_changes(), 1);
    assert_eq!(
        recorder.count(|e| matches!(e, NodeEvent::HeartbeatSucceeded { .. })),
        1
    );
}

#[tokio::test]
async fn test_failed_heartbeat_publishes_unknown_with_error() {
    let heartbeat = Arc::new(MockHeartbeat::failing(NodeError::connectivity(
        "db1:27017",
        "connection refused",
    )));
    let (monitor, recorder) = build_monitor(&heartbeat, NodeOptions::for_testing());

    let err = monitor.scan().await.unwrap_err();

    assert!(err.is_network_error());
    let description = monitor.current_description();
    assert!(description.is_unknown());
    assert!(description.error().unwrap().contains("connection refused"));
    assert!(monitor.last_scan_time().is_some());
    assert_eq!(recorder.heartbeat_failures(), 1);
}

#[tokio::test]
async fn test_incompatible_server_fails_scan() {
    let heartbeat = Arc::new(MockHeartbeat::new(primary_reply()));
    let (monitor, _) = build_monitor(&heartbeat, NodeOptions::for_testing());
    let monitor = monitor.with_client_wire_versions(WireVersionRange::new(0, 3));

    let err = monitor.scan().await.unwrap_err();

    assert!(matches!(err, NodeError::Compatibility(_)));
    let msg = err.to_string();
    assert!(msg.contains("0..3"));
    assert!(msg.contains("0..6"));
    assert!(monitor.current_description().is_unknown());
}

#[tokio::test]
async fn test_inverted_reported_range_fails_scan() {
    let heartbeat = Arc::new(MockHeartbeat::new(primary_reply()));
    heartbeat.set_fallback(
        WireVersionRange::try_new(6, 2)
            .map(|range| HelloReply::new(ServerType::Primary, range))
            .map_err(NodeError::from),
    );
    let (monitor, recorder) = build_monitor(&heartbeat, NodeOptions::for_testing());

    let err = monitor.scan().await.unwrap_err();

    assert!(matches!(err, NodeError::InvalidWireVersions(_)));
    let description = monitor.current_description();
    assert!(description.is_unknown());
    assert!(description.error().unwrap().contains("min 6 is above max 2"));
    assert_eq!(recorder.heartbeat_failures(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_heartbeat_times_out() {
    let heartbeat = Arc::new(MockHeartbeat::new(primary_reply()));
    heartbeat.set_delay(Duration::from_secs(5));
    let (monitor, _) = build_monitor(&heartbeat, NodeOptions::for_testing());

    let err = monitor.scan().await.unwrap_err();

    assert!(matches!(err, NodeError::Timeout { .. }));
    assert!(monitor.current_description().is_unknown());
}

#[tokio::test]
async fn test_unchanged_description_is_not_republished() {
    let heartbeat = Arc::new(MockHeartbeat::new(primary_reply()));
    let (monitor, recorder) = build_monitor(&heartbeat, NodeOptions::for_testing());

    monitor.scan().await.unwrap();
    monitor.scan().await.unwrap();

    assert_eq!(heartbeat.calls(), 2);
    assert_eq!(recorder.description_changes(), 1);
}

#[tokio::test]
async fn test_subscriber_sees_new_description() {
    let heartbeat = Arc::new(MockHeartbeat::new(primary_reply()));
    let (monitor, _) = build_monitor(&heartbeat, NodeOptions::for_testing());
    let mut receiver = monitor.subscribe();

    monitor.scan().await.unwrap();

    assert!(receiver.has_changed().unwrap());
    assert!(receiver.borrow_and_update().is_primary());
}

#[tokio::test]
async fn test_mark_unknown_replaces_description() {
    let heartbeat = Arc::new(MockHeartbeat::new(primary_reply()));
    let (monitor, recorder) = build_monitor(&heartbeat, NodeOptions::for_testing());
    monitor.scan().await.unwrap();

    monitor.mark_unknown("not authorized");

    let description = monitor.current_description();
    assert!(description.is_unknown());
    assert_eq!(description.error(), Some("not authorized"));
    assert_eq!(recorder.description_changes(), 2);
}

#[tokio::test]
async fn test_scan_time_is_stamped_after_publication() {
    let heartbeat = Arc::new(MockHeartbeat::new(primary_reply()));
    let listeners = Arc::new(EventListeners::new());
    let stamps = Arc::new(StampAtPublish::default());
    listeners.subscribe(stamps.clone());
    let monitor = Arc::new(HeartbeatMonitor::new(
        address(),
        Arc::clone(&heartbeat),
        NodeOptions::for_testing(),
        listeners,
    ));
    let _ = stamps.monitor.set(Arc::downgrade(&monitor));

    monitor.scan().await.unwrap();
    let first = monitor.last_scan_time();
    assert!(first.is_some());

    heartbeat.set_fallback(Err(NodeError::connectivity("db1:27017", "reset")));
    monitor.scan().await.unwrap_err();

    // Each description was visible before the time of its own scan.
    assert_eq!(stamps.seen.lock().clone(), vec![None, first]);
    assert!(monitor.last_scan_time() >= first);
}

// =============================================================================
// TEST GROUP 2: Refresh loop
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_loop_refreshes_on_period() {
    let heartbeat = Arc::new(MockHeartbeat::new(primary_reply()));
    let (monitor, _) = build_monitor(&heartbeat, NodeOptions::for_testing());

    monitor.run();
    assert!(monitor.is_running());
    tokio::time::sleep(Duration::from_millis(175)).await;

    assert!(heartbeat.calls() >= 2);
    assert!(monitor.current_description().is_primary());

    assert!(monitor.stop().await);
    assert!(!monitor.is_running());

    let calls = heartbeat.calls();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(heartbeat.calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_run_twice_keeps_one_loop() {
    let heartbeat = Arc::new(MockHeartbeat::new(primary_reply()));
    let (monitor, _) = build_monitor(&heartbeat, NodeOptions::for_testing());

    monitor.run();
    monitor.run();
    tokio::time::sleep(Duration::from_millis(75)).await;

    assert_eq!(heartbeat.calls(), 1);
    assert!(monitor.stop().await);
}

#[tokio::test]
async fn test_stop_without_run_is_noop() {
    let heartbeat = Arc::new(MockHeartbeat::new(primary_reply()));
    let (monitor, _) = build_monitor(&heartbeat, NodeOptions::for_testing());

    assert!(monitor.stop().await);
    assert!(monitor.stop().await);
    assert_eq!(heartbeat.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_interrupts_in_flight_scan() {
    let heartbeat = Arc::new(MockHeartbeat::new(primary_reply()));
    heartbeat.set_delay(Duration::from_secs(3600));
    let options = NodeOptions {
        connect_timeout_ms: 7_200_000,
        ..NodeOptions::for_testing()
    };
    let stop_timeout = options.monitor_stop_timeout();
    let (monitor, _) = build_monitor(&heartbeat, options);

    monitor.run();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(heartbeat.calls(), 1);

    let started = Instant::now();
    assert!(monitor.stop().await);
    assert!(started.elapsed() < stop_timeout);
    assert!(!monitor.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_request_scan_wakes_loop_early() {
    let heartbeat = Arc::new(MockHeartbeat::new(primary_reply()));
    let options = NodeOptions {
        heartbeat_frequency_ms: 60_000,
        ..NodeOptions::for_testing()
    };
    let (monitor, _) = build_monitor(&heartbeat, options);

    monitor.run();
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(heartbeat.calls(), 0);

    monitor.request_scan();
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(heartbeat.calls(), 1);

    assert!(monitor.stop().await);
}

#[tokio::test(start_paused = true)]
async fn test_requested_scans_are_throttled() {
    let heartbeat = Arc::new(MockHeartbeat::new(primary_reply()));
    let options = NodeOptions {
        heartbeat_frequency_ms: 60_000,
        min_heartbeat_frequency_ms: 500,
        ..NodeOptions::for_testing()
    };
    let (monitor, _) = build_monitor(&heartbeat, options);
    monitor.scan().await.unwrap();

    monitor.run();
    monitor.request_scan();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(heartbeat.calls(), 1);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(heartbeat.calls(), 2);

    assert!(monitor.stop().await);
}

#[tokio::test(start_paused = true)]
async fn test_restart_replaces_loop() {
    let heartbeat = Arc::new(MockHeartbeat::new(primary_reply()));
    let (monitor, _) = build_monitor(&heartbeat, NodeOptions::for_testing());

    monitor.run();
    monitor.restart();
    assert!(monitor.is_running());
    tokio::time::sleep(Duration::from_millis(75)).await;

    assert_eq!(heartbeat.calls(), 1);
    assert!(monitor.stop().await);
}

#[tokio::test(start_paused = true)]
async fn test_background_incompatibility_marks_unknown() {
    let heartbeat = Arc::new(MockHeartbeat::new(primary_reply()));
    let (monitor, _) = build_monitor(&heartbeat, NodeOptions::for_testing());
    monitor.scan().await.unwrap();

    heartbeat.set_fallback(Ok(HelloReply::new(
        ServerType::Primary,
        WireVersionRange::new(0, 9),
    )));
    monitor.run();
    tokio::time::sleep(Duration::from_millis(75)).await;

    let description = monitor.current_description();
    assert!(description.is_unknown());
    assert!(description.error().unwrap().contains("0..9"));
    assert!(monitor.stop().await);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_monitor_ends_loop() {
    let heartbeat = Arc::new(MockHeartbeat::new(primary_reply()));
    let (monitor, _) = build_monitor(&heartbeat, NodeOptions::for_testing());

    monitor.run();
    tokio::time::sleep(Duration::from_millis(75)).await;
    drop(monitor);

    let calls = heartbeat.calls();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(heartbeat.calls(), calls);
}

// =============================================================================
// TEST GROUP 3: Runtime handoff
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restart_from_plain_thread() {
    let heartbeat = Arc::new(MockHeartbeat::new(primary_reply()));
    let (monitor, _) = build_monitor(&heartbeat, NodeOptions::for_testing());
    let monitor = Arc::new(monitor);

    let handle = Arc::clone(&monitor);
    std::thread::spawn(move || handle.restart())
        .join()
        .unwrap();

    assert!(monitor.is_running());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(heartbeat.calls() >= 1);
    assert!(monitor.stop().await);
}

#[test]
fn test_run_without_runtime_leaves_loop_stopped() {
    let heartbeat = Arc::new(MockHeartbeat::new(primary_reply()));
    let (monitor, _) = build_monitor(&heartbeat, NodeOptions::for_testing());

    monitor.run();
    monitor.restart();

    assert!(!monitor.is_running());
    assert_eq!(heartbeat.calls(), 0);
}
