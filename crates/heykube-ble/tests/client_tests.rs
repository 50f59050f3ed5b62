//! Client operations against the mock transport

use std::time::Duration;

use heykube_ble::{
    CubeEvent, HeyKube, HeykubeBleError, HeykubeConfig, MockHandle, MockTransport, NotifyOn,
};
use heykube_core::{
    codec::{self, StateFrame},
    BuiltinPattern, CubeState, DeviceTimestamp, Face, Match, MoveSequence, WireField,
};
use tokio::time::sleep;

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

fn seq(text: &str) -> MoveSequence {
    text.parse().unwrap()
}

/// A CubeState frame for the cube after `moves`, carrying them as history
fn frame_after(moves: &MoveSequence, seq_num: u8, ticks: u16) -> Vec<u8> {
    let state = CubeState::solved().applied(moves);
    StateFrame::new(&state, seq_num)
        .unwrap()
        .with_history(moves.as_slice())
        .unwrap()
        .with_timestamp(DeviceTimestamp::from_ticks(ticks))
        .to_bytes()
        .to_vec()
}

async fn connected_client(config: HeykubeConfig) -> (HeyKube, MockHandle) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let (transport, handle) = MockTransport::new();
    let mut client = HeyKube::new(transport, config).unwrap();
    client.connect_first().await.unwrap();
    (client, handle)
}

fn test_config() -> HeykubeConfig {
    HeykubeConfig::new()
        .with_retry_delay(Duration::from_millis(1))
        .with_command_timeout(Duration::from_secs(1))
}

// ----------------------------------------------------------------------------
// Cube State
// ----------------------------------------------------------------------------

#[tokio::test]
async fn first_read_is_baseline_then_moves_are_recovered() {
    let (mut client, handle) = connected_client(test_config()).await;
    handle.set_value(WireField::CubeState, frame_after(&seq("F"), 10, 100));

    let baseline = client.read_cube_state().await.unwrap();
    assert_eq!(baseline.seq_num, 10);
    assert!(baseline.moves.is_empty());
    assert_eq!(client.cube().state(), &CubeState::solved().applied(&seq("F")));

    handle.set_value(WireField::CubeState, frame_after(&seq("F R U"), 12, 300));
    let update = client.read_cube_state().await.unwrap();
    assert_eq!(update.delta, 2);
    assert_eq!(update.moves, seq("R U"));
    assert_eq!(client.cube().moves(), &seq("R U"));
    assert_eq!(client.cube().timestamp(), DeviceTimestamp::from_ticks(300));
}

#[tokio::test]
async fn corrupt_frame_keeps_tracked_state() {
    let (mut client, handle) = connected_client(test_config()).await;
    handle.set_value(WireField::CubeState, frame_after(&seq("R"), 1, 0));
    client.read_cube_state().await.unwrap();
    let before = client.cube().clone();

    let mut corrupt = frame_after(&seq("R U"), 2, 0);
    corrupt[9] |= 0x01;
    handle.set_value(WireField::CubeState, corrupt);

    assert!(matches!(
        client.read_cube_state().await,
        Err(HeykubeBleError::Core(_))
    ));
    assert_eq!(client.cube(), &before);
}

#[tokio::test]
async fn initialize_writes_solved_state_and_clears_log() {
    let (mut client, handle) = connected_client(test_config()).await;
    handle.set_value(WireField::CubeState, frame_after(&seq("R U"), 5, 0));
    client.read_cube_state().await.unwrap();
    assert!(!client.is_solved().await.unwrap());

    client.initialize().await.unwrap();
    assert_eq!(
        handle.writes_to(WireField::CubeState),
        vec![vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 8, 0]]
    );
    assert!(client.cube().is_solved());
    assert!(client.cube().moves().is_empty());
    assert!(client.is_solved().await.unwrap());
}

#[tokio::test]
async fn write_cube_state_rejects_displaced_centers() {
    let (client, _handle) = connected_client(test_config()).await;
    let rotated = CubeState::solved().applied(&seq("x"));
    assert!(matches!(
        client.write_cube_state(&rotated).await,
        Err(HeykubeBleError::Core(_))
    ));
}

// ----------------------------------------------------------------------------
// Notifications
// ----------------------------------------------------------------------------

#[tokio::test]
async fn cube_state_notification_updates_tracked_cube() {
    let (mut client, handle) = connected_client(test_config()).await;
    handle.set_value(WireField::CubeState, frame_after(&MoveSequence::new(), 40, 0));
    client.read_cube_state().await.unwrap();
    client.enable_notifications(NotifyOn::CubeState).await.unwrap();
    assert!(handle.is_subscribed(WireField::CubeState));

    handle.push_notification(WireField::CubeState, frame_after(&seq("R U R'"), 43, 900));
    let update = client
        .wait_for_cube_state(Some(Duration::from_secs(1)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(update.moves, seq("R U R'"));
    assert_eq!(client.cube().seq_num(), 43);
    assert_eq!(client.cube().state(), &CubeState::solved().applied(&seq("R U R'")));
}

#[tokio::test]
async fn status_notification_reports_sequence_without_polling() {
    let (mut client, handle) = connected_client(test_config()).await;
    client
        .enable_notifications(NotifyOn::Status(heykube_core::NotifyFlags::all()))
        .await
        .unwrap();

    handle.push_notification(WireField::Status, vec![0, 0x02, 0, 7, 0, 2]);
    let report = client
        .wait_for_notify(Some(5), Some(Duration::from_secs(1)))
        .await
        .unwrap();
    assert!(!report.polled);
    assert_eq!(report.seq_num, 7);
    assert_eq!(report.new_moves, 2);
    assert_eq!(report.timestamp.as_secs_f64(), 1.0);
    assert!(matches!(report.event, Some(CubeEvent::Status(Some(_)))));
}

#[tokio::test]
async fn wait_for_notify_falls_back_to_state_read() {
    let (mut client, handle) = connected_client(test_config()).await;
    handle.set_value(WireField::CubeState, frame_after(&seq("U"), 42, 1024));

    let report = client
        .wait_for_notify(Some(40), Some(Duration::from_millis(20)))
        .await
        .unwrap();
    assert!(report.polled);
    assert!(report.event.is_none());
    assert_eq!(report.seq_num, 42);
    assert_eq!(report.new_moves, 2);
    assert_eq!(report.timestamp, DeviceTimestamp::from_ticks(1024));
}

#[tokio::test]
async fn corrupt_push_falls_back_to_state_read() {
    let (mut client, handle) = connected_client(test_config()).await;
    handle.set_value(WireField::CubeState, frame_after(&seq("R"), 20, 0));
    client.read_cube_state().await.unwrap();
    client.enable_notifications(NotifyOn::CubeState).await.unwrap();
    let before = client.cube().clone();

    let mut corrupt = frame_after(&seq("R U"), 21, 0);
    corrupt[9] |= 0x01;
    handle.push_notification(WireField::CubeState, corrupt);
    handle.set_value(WireField::CubeState, frame_after(&seq("R U"), 21, 600));

    let report = client
        .wait_for_notify(Some(20), Some(Duration::from_secs(1)))
        .await
        .unwrap();
    assert!(report.polled);
    assert!(report.event.is_none());
    assert_eq!(report.seq_num, 21);
    assert_eq!(report.new_moves, 1);
    assert_eq!(report.timestamp, DeviceTimestamp::from_ticks(600));
    assert_ne!(client.cube(), &before);
    assert_eq!(client.cube().moves(), &seq("U"));
}

#[tokio::test]
async fn get_notify_and_clear() {
    let (mut client, handle) = connected_client(test_config()).await;
    assert_eq!(client.get_notify().unwrap(), None);

    handle.push_notification(WireField::Accel, vec![1, 2, 3]);
    handle.push_notification(WireField::Accel, vec![4, 5, 6]);
    sleep(Duration::from_millis(20)).await;

    assert_eq!(
        client.get_notify().unwrap(),
        Some(CubeEvent::Raw {
            field: WireField::Accel,
            data: vec![1, 2, 3]
        })
    );
    assert_eq!(client.clear_notifications().unwrap(), 1);
    assert_eq!(client.get_notify().unwrap(), None);
}

// ----------------------------------------------------------------------------
// Commands
// ----------------------------------------------------------------------------

#[tokio::test]
async fn slow_command_times_out_and_queue_recovers() {
    let config = test_config().with_command_timeout(Duration::from_millis(50));
    let (client, handle) = connected_client(config).await;
    handle.set_value(WireField::Version, vec![3, 1, 0x06, 0x13]);
    handle.set_read_delay(Some(Duration::from_millis(150)));

    assert_eq!(
        client.read(WireField::Version).await,
        Err(HeykubeBleError::CommandTimeout {
            command: "read",
            timeout_ms: 50
        })
    );

    // The abandoned read completes in the background; later commands still work
    handle.set_read_delay(None);
    sleep(Duration::from_millis(200)).await;
    let version = client.read_version().await.unwrap();
    assert_eq!(version.version.to_string(), "v1.3");
    assert!(version.battery_ok);
}

#[tokio::test]
async fn instruction_and_match_writes() {
    let (client, handle) = connected_client(test_config()).await;

    client.write_instructions(&seq("R U")).await.unwrap();
    client.append_instructions(&seq("F")).await.unwrap();
    client.clear_instructions().await.unwrap();
    assert_eq!(
        handle.writes_to(WireField::Instructions),
        vec![vec![2, 0x03], vec![0x81, 0xf2], vec![0]]
    );

    let too_many = MoveSequence::from_moves(vec![heykube_core::Move::R; 53]);
    assert!(client.write_instructions(&too_many).await.is_err());

    let mut cross = Match::new();
    cross.add_cross(Face::D);
    client.set_match(&cross, true).await.unwrap();
    client.disable_match().await.unwrap();
    let writes = handle.writes_to(WireField::MatchState);
    assert_eq!(writes[0][0], 1);
    assert_eq!(&writes[0][1..], &cross.encode()[..]);
    assert_eq!(writes[1], vec![0]);

    client.enable_pattern(BuiltinPattern::ALL[3]).await.unwrap();
    client.send_action(&[0x0b, 2]).await.unwrap();
    assert_eq!(
        handle.writes_to(WireField::Action),
        vec![vec![0x08, 3], vec![0x0b, 2]]
    );
}

#[tokio::test]
async fn instructions_read_back() {
    let (client, handle) = connected_client(test_config()).await;
    handle.set_value(WireField::Instructions, vec![3, 0x03, 0xf2]);
    assert_eq!(client.read_instructions().await.unwrap(), seq("R U F"));
}

#[tokio::test]
async fn sounds_rewrite_config_byte() {
    let (client, handle) = connected_client(test_config()).await;
    handle.set_value(WireField::Config, vec![0x1b, 0x40]);

    client.set_sounds(false, false).await.unwrap();
    client.set_sounds(true, false).await.unwrap();
    assert_eq!(
        handle.writes_to(WireField::Config),
        vec![vec![0x03], vec![0x0b]]
    );
}

#[tokio::test]
async fn device_reads_decode_payloads() {
    let (client, handle) = connected_client(test_config()).await;

    // 3.5 V in 3.9 fixed point, charging
    handle.set_value(WireField::Battery, vec![0x00, 0x17]);
    let battery = client.read_battery().await.unwrap();
    assert!((battery.voltage - 3.5).abs() < 1e-6);
    assert!(battery.charging);

    let mut history = vec![0u8];
    history.extend_from_slice(&[0x02, 0, 9, 0, 2]);
    history.extend_from_slice(&[0x01, 0x05, 8, 0, 1]);
    history.extend_from_slice(&[0; 10]);
    handle.set_value(WireField::Status, history);
    let events = client.read_status().await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(client.read_last_status().await.unwrap().unwrap().seq_num, 9);

    let packed = codec::pack_moves(seq("R U F").as_slice()).unwrap();
    let mut moves = vec![7u8];
    moves.extend_from_slice(&packed);
    moves.resize(21, 0xff);
    moves.extend_from_slice(&[0, 4]);
    handle.set_value(WireField::Moves, moves);
    let record = client.read_moves(Some(5)).await.unwrap();
    assert_eq!(record.seq_num, 7);
    assert_eq!(record.moves, seq("U F"));
}
