//! Link session behaviour against the mock transport
//!
//! Covers bounded connect retries, reconnect after link loss with
//! subscription replay, and the finality of a requested disconnect.

use std::time::Duration;

use heykube_ble::{
    HeyKube, HeykubeBleError, HeykubeConfig, MockHandle, MockTransport, NotifyOn, SessionState,
};
use heykube_core::{NotifyFlags, WireField};
use tokio::time::{sleep, timeout};

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn fast_config() -> HeykubeConfig {
    HeykubeConfig::new()
        .with_retry_delay(Duration::from_millis(1))
        .with_connection_timeout(Duration::from_millis(200))
        .with_command_timeout(Duration::from_secs(1))
}

fn new_client() -> (HeyKube, MockHandle) {
    init_tracing();
    let (transport, handle) = MockTransport::new();
    let client = HeyKube::new(transport, fast_config()).unwrap();
    (client, handle)
}

/// Polls `check` until it holds or a second passes
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        sleep(Duration::from_millis(5)).await;
    }
    check()
}

// ----------------------------------------------------------------------------
// Connect Retries
// ----------------------------------------------------------------------------

#[tokio::test]
async fn three_connect_failures_are_terminal() {
    let (mut client, handle) = new_client();
    handle.fail_next_connects(10);

    let err = client.connect_first().await.unwrap_err();
    assert_eq!(err, HeykubeBleError::TooManyRetries { attempts: 3 });
    assert_eq!(client.session_state(), SessionState::Disconnected);
    assert!(!client.is_connected());

    // No background retries after giving up
    sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.connect_attempts(), 3);
    assert_eq!(
        client.read(WireField::Version).await,
        Err(HeykubeBleError::NotConnected)
    );
}

#[tokio::test]
async fn connect_recovers_from_two_failures() {
    let (mut client, handle) = new_client();
    handle.fail_next_connects(2);

    client.connect_first().await.unwrap();
    assert_eq!(handle.connect_attempts(), 3);
    assert_eq!(client.session_state(), SessionState::Connected);
}

#[tokio::test]
async fn scan_without_devices_reports_prefix() {
    let (mut client, handle) = new_client();
    handle.set_devices(Vec::new());

    let err = client.connect_first().await.unwrap_err();
    assert_eq!(
        err,
        HeykubeBleError::NoDeviceFound {
            prefix: "HEYKUBE".to_string()
        }
    );
}

// ----------------------------------------------------------------------------
// Reconnect
// ----------------------------------------------------------------------------

#[tokio::test]
async fn link_loss_reconnects_and_replays_subscriptions_once() {
    let (mut client, handle) = new_client();
    client.connect_first().await.unwrap();

    client
        .enable_notifications(NotifyOn::Status(NotifyFlags::MOVE))
        .await
        .unwrap();
    // Already active: no second transport subscribe
    client.subscribe(WireField::Status).await.unwrap();
    assert_eq!(handle.subscribe_calls(WireField::Status), 1);
    assert_eq!(handle.writes_to(WireField::Status), vec![vec![0x02]]);

    let mut status = client.watch_session();
    handle.drop_link();
    // The watch guard must not outlive the assertion
    assert!(matches!(
        timeout(
            Duration::from_secs(1),
            status.wait_for(|s| s.state == SessionState::Connected && s.epoch == 2),
        )
        .await,
        Ok(Ok(_))
    ));

    assert!(eventually(|| handle.subscribe_calls(WireField::Status) == 2).await);
    assert!(handle.is_subscribed(WireField::Status));
    assert!(!handle.is_subscribed(WireField::CubeState));

    // The replay happens once per link, not on every status update
    sleep(Duration::from_millis(20)).await;
    assert_eq!(handle.subscribe_calls(WireField::Status), 2);
}

#[tokio::test]
async fn reconnect_gives_up_after_three_failures() {
    let (mut client, handle) = new_client();
    client.connect_first().await.unwrap();

    handle.fail_next_connects(3);
    handle.drop_link();

    let mut status = client.watch_session();
    assert!(matches!(
        timeout(
            Duration::from_secs(1),
            status.wait_for(|s| s.state == SessionState::Disconnected),
        )
        .await,
        Ok(Ok(_))
    ));
    assert_eq!(handle.connect_attempts(), 4);
    assert!(matches!(
        client.read(WireField::Version).await,
        Err(HeykubeBleError::SessionClosed)
    ));

    // The handle can still be wound down and reused
    client.disconnect().await.unwrap();
    client.connect_first().await.unwrap();
    assert_eq!(client.session_state(), SessionState::Connected);
}

// ----------------------------------------------------------------------------
// Disconnect
// ----------------------------------------------------------------------------

#[tokio::test]
async fn requested_disconnect_is_final() {
    let (mut client, handle) = new_client();
    client.connect_first().await.unwrap();

    client.disconnect().await.unwrap();
    assert_eq!(client.session_state(), SessionState::Disconnected);
    assert!(!handle.is_connected());

    handle.drop_link();
    sleep(Duration::from_millis(20)).await;
    assert_eq!(handle.connect_attempts(), 1);
    assert_eq!(client.session_state(), SessionState::Disconnected);

    // A fresh connect ignores the stale link-loss event
    client.connect_first().await.unwrap();
    assert_eq!(handle.connect_attempts(), 2);
    sleep(Duration::from_millis(20)).await;
    assert_eq!(client.session_state(), SessionState::Connected);
}
