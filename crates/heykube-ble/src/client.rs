//! Caller-facing HEYKUBE handle
//!
//! [`HeyKube`] never touches the transport. Every device operation becomes a
//! command on the dispatcher's queue and is answered within the configured
//! command timeout; device pushes arrive on the notification queue and are
//! decoded against the locally tracked cube.

use std::time::Duration;

use heykube_core::codec::{self, StateFrame};
use heykube_core::protocol::{device, instructions, sequence_delta};
use heykube_core::{
    BatteryReading, BuiltinPattern, CubeState, DeviceTimestamp, FrameUpdate, Match, MovesRecord,
    MoveSequence, NotifyFlags, PayloadError, StatusEvent, TrackedCube, VersionInfo, WireField,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::config::HeykubeConfig;
use crate::dispatcher::{Command, CommandRequest, Dispatcher, Notification};
use crate::error::{HeykubeBleError, Result};
use crate::session::{LinkSession, SessionState, SessionStatus};
use crate::transport::{CubeTransport, DeviceInfo};

// ----------------------------------------------------------------------------
// Events
// ----------------------------------------------------------------------------

/// A decoded device notification
#[derive(Debug, Clone, PartialEq)]
pub enum CubeEvent {
    /// A CubeState push, already reconciled into the tracked cube
    CubeState(FrameUpdate),
    /// A Status push; `None` when the record carries no event flags
    Status(Option<StatusEvent>),
    /// A push from any other characteristic
    Raw { field: WireField, data: Vec<u8> },
}

/// Outcome of [`HeyKube::wait_for_notify`]
#[derive(Debug, Clone, PartialEq)]
pub struct NotifyReport {
    /// The notification that arrived, if any did before the deadline
    pub event: Option<CubeEvent>,
    pub seq_num: u8,
    pub timestamp: DeviceTimestamp,
    /// Moves since the caller's previous sequence number, if one was given
    pub new_moves: u8,
    /// True when the numbers come from a state read instead of a notification
    pub polled: bool,
}

/// Which status events the device should push
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyOn {
    /// Full CubeState frames after every move
    CubeState,
    /// Compact Status records for the selected events
    Status(NotifyFlags),
}

// ----------------------------------------------------------------------------
// Client
// ----------------------------------------------------------------------------

struct Connection {
    commands: mpsc::Sender<CommandRequest>,
    notifications: mpsc::Receiver<Notification>,
    session_task: JoinHandle<LinkSession>,
    dispatcher_task: JoinHandle<()>,
}

pub struct HeyKube {
    config: HeykubeConfig,
    /// The session while no connection task owns it
    idle: Option<LinkSession>,
    status: watch::Receiver<SessionStatus>,
    connection: Option<Connection>,
    cube: TrackedCube,
    /// Whether the tracked cube holds a baseline read from this device
    synced: bool,
}

impl HeyKube {
    pub fn new<T: CubeTransport>(transport: T, config: HeykubeConfig) -> Result<Self> {
        config.validate()?;
        let session = LinkSession::new(transport, config.clone())?;
        let status = session.status();
        Ok(Self {
            config,
            idle: Some(session),
            status,
            connection: None,
            cube: TrackedCube::new(),
            synced: false,
        })
    }

    pub fn config(&self) -> &HeykubeConfig {
        &self.config
    }

    /// The locally tracked cube
    pub fn cube(&self) -> &TrackedCube {
        &self.cube
    }

    pub fn session_state(&self) -> SessionState {
        self.status.borrow().state
    }

    /// Watch session state changes, including reconnects
    pub fn watch_session(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some() && self.session_state() == SessionState::Connected
    }

    // ------------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------------

    /// Lists nearby cubes advertising the configured name prefix
    pub async fn scan(&mut self) -> Result<Vec<DeviceInfo>> {
        let session = self.idle.as_mut().ok_or(HeykubeBleError::AlreadyConnected)?;
        session.scan().await
    }

    /// Connects to `device` and starts the connection and command tasks
    pub async fn connect(&mut self, device: &DeviceInfo) -> Result<()> {
        let mut session = match self.idle.take() {
            Some(session) => session,
            None if self.connection.is_some() => return Err(HeykubeBleError::AlreadyConnected),
            None => return Err(HeykubeBleError::SessionClosed),
        };

        if let Err(e) = session.establish(device).await {
            self.idle = Some(session);
            return Err(e);
        }

        let (command_tx, command_rx) = mpsc::channel(self.config.command_queue_size);
        let (link_tx, link_rx) = mpsc::channel(self.config.command_queue_size);
        let (push_tx, push_rx) = mpsc::channel(self.config.notification_queue_size);
        let (notify_tx, notify_rx) = mpsc::channel(self.config.notification_queue_size);

        let session_task = tokio::spawn(session.run(link_rx, push_tx));
        let dispatcher = Dispatcher::new(link_tx, push_rx, notify_tx, self.status.clone());
        let dispatcher_task = tokio::spawn(dispatcher.run(command_rx));

        self.connection = Some(Connection {
            commands: command_tx,
            notifications: notify_rx,
            session_task,
            dispatcher_task,
        });
        self.synced = false;
        Ok(())
    }

    /// Scans and connects to the first cube found
    pub async fn connect_first(&mut self) -> Result<DeviceInfo> {
        let device = self
            .scan()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| HeykubeBleError::NoDeviceFound {
                prefix: self.config.device_name_prefix.clone(),
            })?;
        self.connect(&device).await?;
        Ok(device)
    }

    /// Ends the session; it will not reconnect on its own afterwards
    pub async fn disconnect(&mut self) -> Result<()> {
        let Some(connection) = self.connection.take() else {
            return Ok(());
        };

        let request = Self::submit(
            &self.config,
            &connection.commands,
            Command::Disconnect,
            "disconnect",
        );
        if let Err(e) = request.await {
            warn!("Disconnect request failed: {}", e);
        }
        drop(connection.commands);

        match connection.session_task.await {
            Ok(session) => self.idle = Some(session),
            Err(e) => warn!("Connection task ended abnormally: {}", e),
        }
        if let Err(e) = connection.dispatcher_task.await {
            warn!("Command task ended abnormally: {}", e);
        }
        info!("Disconnected");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Raw Field Access
    // ------------------------------------------------------------------------

    async fn submit(
        config: &HeykubeConfig,
        commands: &mpsc::Sender<CommandRequest>,
        command: Command,
        name: &'static str,
    ) -> Result<Vec<u8>> {
        let (reply, reply_rx) = oneshot::channel();
        let exchange = async {
            commands
                .send(CommandRequest { command, reply })
                .await
                .map_err(|_| HeykubeBleError::SessionClosed)?;
            reply_rx.await.map_err(|_| HeykubeBleError::SessionClosed)?
        };

        match timeout(config.command_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                warn!("{} timed out after {:?}", name, config.command_timeout);
                Err(HeykubeBleError::CommandTimeout {
                    command: name,
                    timeout_ms: config.command_timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn request(&self, command: Command, name: &'static str) -> Result<Vec<u8>> {
        let connection = self.connection.as_ref().ok_or(HeykubeBleError::NotConnected)?;
        Self::submit(&self.config, &connection.commands, command, name).await
    }

    pub async fn read(&self, field: WireField) -> Result<Vec<u8>> {
        self.request(Command::Read(field), "read").await
    }

    /// Writes without waiting for a link-layer response
    pub async fn write(&self, field: WireField, data: &[u8]) -> Result<()> {
        self.request(
            Command::Write {
                field,
                data: data.to_vec(),
                with_response: false,
            },
            "write",
        )
        .await
        .map(drop)
    }

    pub async fn write_with_response(&self, field: WireField, data: &[u8]) -> Result<()> {
        self.request(
            Command::Write {
                field,
                data: data.to_vec(),
                with_response: true,
            },
            "write",
        )
        .await
        .map(drop)
    }

    pub async fn subscribe(&self, field: WireField) -> Result<()> {
        self.request(Command::Subscribe(field), "subscribe").await.map(drop)
    }

    pub async fn unsubscribe(&self, field: WireField) -> Result<()> {
        self.request(Command::Unsubscribe(field), "unsubscribe").await.map(drop)
    }

    // ------------------------------------------------------------------------
    // Cube State
    // ------------------------------------------------------------------------

    /// Reconciles a CubeState frame into the tracked cube
    fn absorb_frame(&mut self, bytes: &[u8]) -> Result<FrameUpdate> {
        let frame = StateFrame::parse(bytes).map_err(HeykubeBleError::core)?;
        if self.synced {
            return Ok(self.cube.apply_frame(&frame)?);
        }

        self.cube.adopt_frame(&frame)?;
        self.synced = true;
        Ok(FrameUpdate {
            seq_num: frame.seq_num,
            delta: 0,
            moves: MoveSequence::new(),
            missed: 0,
            timestamp: frame.timestamp,
        })
    }

    /// Reads the device state into the tracked cube
    ///
    /// The first read after connecting becomes the baseline; later reads
    /// recover the moves made since the previous one.
    pub async fn read_cube_state(&mut self) -> Result<FrameUpdate> {
        let bytes = self.read(WireField::CubeState).await?;
        self.absorb_frame(&bytes)
    }

    pub async fn is_solved(&mut self) -> Result<bool> {
        self.read_cube_state().await?;
        Ok(self.cube.is_solved())
    }

    /// Resets the device to the solved state and clears the move log
    pub async fn initialize(&mut self) -> Result<()> {
        self.write_cube_state(&CubeState::solved()).await?;
        self.read_cube_state().await?;
        self.cube.clear_moves();
        info!("Cube state reset to solved");
        Ok(())
    }

    /// Overwrites the device's notion of the cube state
    pub async fn write_cube_state(&self, state: &CubeState) -> Result<()> {
        let bytes = codec::encode_state(state).map_err(HeykubeBleError::core)?;
        self.write(WireField::CubeState, &bytes).await
    }

    /// Current device sequence number, without touching the tracked cube
    pub async fn seq_num(&self) -> Result<u8> {
        let bytes = self.read(WireField::CubeState).await?;
        let frame = StateFrame::parse(&bytes).map_err(HeykubeBleError::core)?;
        Ok(frame.seq_num)
    }

    /// Current device clock, without touching the tracked cube
    pub async fn timestamp(&self) -> Result<DeviceTimestamp> {
        let bytes = self.read(WireField::CubeState).await?;
        let frame = StateFrame::parse(&bytes).map_err(HeykubeBleError::core)?;
        Ok(frame.timestamp)
    }

    // ------------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------------

    /// Arms device pushes
    ///
    /// Status pushes need the event mask written before subscribing.
    pub async fn enable_notifications(&self, on: NotifyOn) -> Result<()> {
        match on {
            NotifyOn::CubeState => self.subscribe(WireField::CubeState).await,
            NotifyOn::Status(flags) => {
                self.write(WireField::Status, &[flags.bits()]).await?;
                self.subscribe(WireField::Status).await
            }
        }
    }

    pub async fn disable_notifications(&self) -> Result<()> {
        self.unsubscribe(WireField::CubeState).await?;
        self.unsubscribe(WireField::Status).await
    }

    fn decode_notification(&mut self, notification: Notification) -> Result<CubeEvent> {
        let Notification { field, data } = notification;
        match field {
            WireField::CubeState => self.absorb_frame(&data).map(CubeEvent::CubeState),
            WireField::Status => StatusEvent::parse_notification(&data)
                .map(CubeEvent::Status)
                .map_err(HeykubeBleError::core),
            _ => Ok(CubeEvent::Raw { field, data }),
        }
    }

    fn notification_queue(&mut self) -> Result<&mut mpsc::Receiver<Notification>> {
        self.connection
            .as_mut()
            .map(|c| &mut c.notifications)
            .ok_or(HeykubeBleError::NotConnected)
    }

    /// Takes the next queued notification without waiting
    pub fn get_notify(&mut self) -> Result<Option<CubeEvent>> {
        match self.notification_queue()?.try_recv() {
            Ok(notification) => self.decode_notification(notification).map(Some),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(HeykubeBleError::SessionClosed),
        }
    }

    /// Waits for the next notification, falling back to a state read on timeout
    ///
    /// The report always carries a current sequence number and timestamp.
    pub async fn wait_for_notify(
        &mut self,
        previous_seq: Option<u8>,
        wait: Option<Duration>,
    ) -> Result<NotifyReport> {
        let wait = wait.unwrap_or(self.config.notify_timeout);
        let received = timeout(wait, self.notification_queue()?.recv()).await;

        let event = match received {
            Ok(Some(notification)) => {
                let field = notification.field;
                match self.decode_notification(notification) {
                    Ok(event) => Some(event),
                    Err(e) => {
                        warn!(
                            "Dropping undecodable {} notification, polling the cube state: {}",
                            field, e
                        );
                        None
                    }
                }
            }
            Ok(None) => return Err(HeykubeBleError::SessionClosed),
            Err(_) => {
                warn!("No notification within {:?}, polling the cube state", wait);
                None
            }
        };

        let pushed = match &event {
            Some(CubeEvent::Status(Some(status))) => Some((status.seq_num, status.timestamp)),
            Some(CubeEvent::CubeState(update)) => Some((update.seq_num, update.timestamp)),
            _ => None,
        };
        let polled = pushed.is_none();
        let (seq_num, timestamp) = match pushed {
            Some(numbers) => numbers,
            None => {
                if event.is_some() {
                    debug!("Notification carries no sequence number, polling the cube state");
                }
                let update = self.read_cube_state().await?;
                (update.seq_num, update.timestamp)
            }
        };

        Ok(NotifyReport {
            event,
            seq_num,
            timestamp,
            new_moves: previous_seq.map_or(0, |prev| sequence_delta(prev, seq_num)),
            polled,
        })
    }

    /// Waits for a CubeState push, discarding other notifications meanwhile
    ///
    /// Returns `None` when nothing arrived before the deadline.
    pub async fn wait_for_cube_state(
        &mut self,
        wait: Option<Duration>,
    ) -> Result<Option<FrameUpdate>> {
        let deadline = Instant::now() + wait.unwrap_or(self.config.notify_timeout);
        loop {
            let received = timeout_at(deadline, self.notification_queue()?.recv()).await;
            match received {
                Ok(Some(notification)) if notification.field == WireField::CubeState => {
                    return self.absorb_frame(&notification.data).map(Some);
                }
                Ok(Some(notification)) => {
                    debug!(
                        "Skipping {} notification while waiting for cube state",
                        notification.field
                    );
                }
                Ok(None) => return Err(HeykubeBleError::SessionClosed),
                Err(_) => return Ok(None),
            }
        }
    }

    /// Drops queued notifications; returns how many were dropped
    pub fn clear_notifications(&mut self) -> Result<usize> {
        let queue = self.notification_queue()?;
        let mut dropped = 0;
        while queue.try_recv().is_ok() {
            dropped += 1;
        }
        debug!("Cleared {} queued notification(s)", dropped);
        Ok(dropped)
    }

    // ------------------------------------------------------------------------
    // Device Information
    // ------------------------------------------------------------------------

    /// Reads the recent move history, optionally only moves after `previous_seq`
    pub async fn read_moves(&self, previous_seq: Option<u8>) -> Result<MovesRecord> {
        let bytes = self.read(WireField::Moves).await?;
        let record = MovesRecord::parse(&bytes)?;
        Ok(match previous_seq {
            Some(seq) => record.since(seq),
            None => record,
        })
    }

    pub async fn read_version(&self) -> Result<VersionInfo> {
        let bytes = self.read(WireField::Version).await?;
        VersionInfo::parse(&bytes).map_err(HeykubeBleError::core)
    }

    pub async fn read_battery(&self) -> Result<BatteryReading> {
        let bytes = self.read(WireField::Battery).await?;
        BatteryReading::parse(&bytes).map_err(HeykubeBleError::core)
    }

    pub async fn read_config(&self) -> Result<Vec<u8>> {
        self.read(WireField::Config).await
    }

    /// Enables or disables the major and minor sounds for this session
    pub async fn set_sounds(&self, major: bool, minor: bool) -> Result<()> {
        let config = self.read_config().await?;
        let Some(&current) = config.first() else {
            return Err(HeykubeBleError::core(PayloadError::TooShort {
                field: "Config",
                expected: 1,
                actual: 0,
            }));
        };
        let updated = device::with_sounds(current, major, minor);
        self.write(WireField::Config, &[updated]).await
    }

    /// Recent status events, newest first
    pub async fn read_status(&self) -> Result<Vec<StatusEvent>> {
        let bytes = self.read(WireField::Status).await?;
        StatusEvent::parse_history(&bytes).map_err(HeykubeBleError::core)
    }

    pub async fn read_last_status(&self) -> Result<Option<StatusEvent>> {
        Ok(self.read_status().await?.into_iter().next())
    }

    // ------------------------------------------------------------------------
    // Match Trigger
    // ------------------------------------------------------------------------

    /// Loads a pattern into the device's match trigger
    pub async fn set_match(&self, pattern: &Match, enable: bool) -> Result<()> {
        let mut data = Vec::with_capacity(1 + pattern.encode().len());
        data.push(u8::from(enable));
        data.extend_from_slice(&pattern.encode());
        self.write(WireField::MatchState, &data).await
    }

    /// Re-arms the match trigger, which disarms itself after firing
    pub async fn enable_match(&self) -> Result<()> {
        self.write(WireField::MatchState, &[1]).await
    }

    pub async fn disable_match(&self) -> Result<()> {
        self.write(WireField::MatchState, &[0]).await
    }

    // ------------------------------------------------------------------------
    // Instructions
    // ------------------------------------------------------------------------

    /// Replaces the queued instructions shown on the cube's LEDs
    pub async fn write_instructions(&self, moves: &MoveSequence) -> Result<()> {
        let payload = instructions::encode_instructions(moves, false)?;
        self.write(WireField::Instructions, &payload).await
    }

    pub async fn append_instructions(&self, moves: &MoveSequence) -> Result<()> {
        let payload = instructions::encode_instructions(moves, true)?;
        self.write(WireField::Instructions, &payload).await
    }

    /// Drops queued instructions and returns to the built-in solver
    pub async fn clear_instructions(&self) -> Result<()> {
        self.write(WireField::Instructions, &instructions::clear_instructions())
            .await
    }

    pub async fn read_instructions(&self) -> Result<MoveSequence> {
        let bytes = self.read(WireField::Instructions).await?;
        Ok(instructions::decode_instructions(&bytes)?)
    }

    // ------------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------------

    /// Starts guiding the user toward one of the built-in patterns
    pub async fn enable_pattern(&self, pattern: BuiltinPattern) -> Result<()> {
        info!("Enabling pattern {}", pattern);
        self.send_action(&pattern.action_payload()).await
    }

    /// Writes raw bytes to the opaque action channel
    pub async fn send_action(&self, payload: &[u8]) -> Result<()> {
        self.write(WireField::Action, payload).await
    }
}
