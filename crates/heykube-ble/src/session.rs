//! Link session manager
//!
//! The session is the connection task: it owns the transport exclusively,
//! establishes the link with bounded retries, reconnects after link loss and
//! executes link operations one at a time on behalf of the dispatcher.
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Reconnecting -> Connected
//!                                         -> Terminating  -> Disconnected
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::HeykubeConfig;
use crate::error::{HeykubeBleError, Result, TransportError};
use crate::transport::{CubeTransport, DeviceInfo, TransportEvent};

// ----------------------------------------------------------------------------
// Session State
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Terminating,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Reconnecting => "reconnecting",
            SessionState::Terminating => "terminating",
        };
        f.write_str(name)
    }
}

/// Published session state
///
/// `epoch` counts successful link establishments, so a watcher that misses
/// an intermediate `Reconnecting` still sees that the link was replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub epoch: u64,
}

// ----------------------------------------------------------------------------
// Link Operations
// ----------------------------------------------------------------------------

/// One transport operation requested by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LinkOp {
    Read(Uuid),
    Write {
        uuid: Uuid,
        data: Vec<u8>,
        with_response: bool,
    },
    Subscribe(Uuid),
    Unsubscribe(Uuid),
    Disconnect,
}

impl LinkOp {
    fn name(&self) -> &'static str {
        match self {
            LinkOp::Read(_) => "read",
            LinkOp::Write { .. } => "write",
            LinkOp::Subscribe(_) => "subscribe",
            LinkOp::Unsubscribe(_) => "unsubscribe",
            LinkOp::Disconnect => "disconnect",
        }
    }
}

/// A link operation with its reply slot; non-read operations reply with no bytes
pub(crate) struct LinkRequest {
    pub op: LinkOp,
    pub reply: oneshot::Sender<Result<Vec<u8>>>,
}

/// A notification pushed by the device
pub(crate) type Push = (Uuid, Vec<u8>);

// ----------------------------------------------------------------------------
// Link Session
// ----------------------------------------------------------------------------

pub struct LinkSession {
    transport: Box<dyn CubeTransport>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    config: HeykubeConfig,
    device: Option<DeviceInfo>,
    status_tx: watch::Sender<SessionStatus>,
    epoch: u64,
}

impl LinkSession {
    pub fn new<T: CubeTransport>(mut transport: T, config: HeykubeConfig) -> Result<Self> {
        let events = transport.take_event_receiver().ok_or_else(|| {
            HeykubeBleError::Transport(TransportError::Backend(
                "transport event receiver already taken".to_string(),
            ))
        })?;
        let (status_tx, _) = watch::channel(SessionStatus {
            state: SessionState::Disconnected,
            epoch: 0,
        });

        Ok(Self {
            transport: Box::new(transport),
            events,
            config,
            device: None,
            status_tx,
            epoch: 0,
        })
    }

    pub fn state(&self) -> SessionState {
        self.status_tx.borrow().state
    }

    /// Watch the published state of this session
    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    pub fn device(&self) -> Option<&DeviceInfo> {
        self.device.as_ref()
    }

    pub async fn scan(&mut self) -> Result<Vec<DeviceInfo>> {
        if self.state() != SessionState::Disconnected {
            return Err(HeykubeBleError::AlreadyConnected);
        }
        let devices = self
            .transport
            .scan(&self.config.device_name_prefix, self.config.scan_timeout)
            .await?;
        Ok(devices)
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.status_tx.send_replace(SessionStatus {
            state,
            epoch: self.epoch,
        });
        if previous.state != state {
            info!("Session {} -> {}", previous.state, state);
        }
    }

    /// Connects to `device`, giving up after the configured number of failures
    ///
    /// On failure the session is left `Disconnected` and makes no further
    /// attempts on its own.
    pub async fn establish(&mut self, device: &DeviceInfo) -> Result<()> {
        // Events from an earlier link must not leak into this one
        while self.events.try_recv().is_ok() {}

        self.device = Some(device.clone());
        self.set_state(SessionState::Connecting);
        match self.connect_with_retries(device).await {
            Ok(()) => {
                self.epoch += 1;
                self.set_state(SessionState::Connected);
                info!("Connected to {} ({})", device.name, device.address);
                Ok(())
            }
            Err(e) => {
                self.set_state(SessionState::Disconnected);
                Err(e)
            }
        }
    }

    async fn connect_with_retries(&mut self, device: &DeviceInfo) -> Result<()> {
        let attempts = self.config.max_connect_attempts;
        for attempt in 1..=attempts {
            debug!("Connect attempt {}/{} to {}", attempt, attempts, device.address);
            match timeout(self.config.connection_timeout, self.transport.connect(device)).await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(e)) => {
                    warn!("Connect attempt {}/{} failed: {}", attempt, attempts, e);
                }
                Err(_) => {
                    warn!(
                        "Connect attempt {}/{} timed out after {:?}",
                        attempt, attempts, self.config.connection_timeout
                    );
                    if let Err(e) = self.transport.disconnect().await {
                        debug!("Cleanup after connect timeout failed: {}", e);
                    }
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        error!(
            "Giving up on {} after {} consecutive connection failures",
            device.address, attempts
        );
        Err(HeykubeBleError::TooManyRetries { attempts })
    }

    /// Runs the connection task until disconnect is requested or the link is lost for good
    ///
    /// Returns the session so the transport can be reused.
    pub(crate) async fn run(
        mut self,
        mut requests: mpsc::Receiver<LinkRequest>,
        pushes: mpsc::Sender<Push>,
    ) -> Self {
        debug!("Connection task started");

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(TransportEvent::Notification { uuid, data }) => {
                        forward_push(&pushes, uuid, data);
                    }
                    Some(TransportEvent::Disconnected) => {
                        if !self.reconnect().await {
                            break;
                        }
                    }
                    None => {
                        error!("Transport event stream ended");
                        self.set_state(SessionState::Disconnected);
                        break;
                    }
                },

                request = requests.recv() => match request {
                    Some(request) => {
                        if self.handle_request(request).await {
                            break;
                        }
                    }
                    None => {
                        debug!("Dispatcher gone, closing the link");
                        if let Err(e) = self.terminate().await {
                            warn!("Failed to close the link: {}", e);
                        }
                        break;
                    }
                },
            }
        }

        debug!("Connection task stopped");
        self
    }

    /// Re-establishes a lost link; false when the session gave up
    async fn reconnect(&mut self) -> bool {
        let Some(device) = self.device.clone() else {
            self.set_state(SessionState::Disconnected);
            return false;
        };

        warn!("Lost link to {}", device.name);
        self.set_state(SessionState::Reconnecting);
        match self.connect_with_retries(&device).await {
            Ok(()) => {
                self.epoch += 1;
                self.set_state(SessionState::Connected);
                info!("Reconnected to {}", device.name);
                true
            }
            Err(e) => {
                error!("Reconnect failed: {}", e);
                self.set_state(SessionState::Disconnected);
                false
            }
        }
    }

    async fn terminate(&mut self) -> Result<()> {
        self.set_state(SessionState::Terminating);
        let result = self.transport.disconnect().await;
        self.set_state(SessionState::Disconnected);
        result.map_err(HeykubeBleError::from)
    }

    /// Executes one request; true when the session must stop
    async fn handle_request(&mut self, request: LinkRequest) -> bool {
        let LinkRequest { op, reply } = request;
        let name = op.name();

        if op == LinkOp::Disconnect {
            let result = self.terminate().await.map(|_| Vec::new());
            let _ = reply.send(result);
            return true;
        }

        let result = self.execute(op).await;
        if let Err(e) = &result {
            warn!("Link {} failed: {}", name, e);
        }
        if reply.send(result).is_err() {
            debug!("Caller abandoned {}; late reply discarded", name);
        }
        false
    }

    async fn execute(&mut self, op: LinkOp) -> Result<Vec<u8>> {
        let result = match op {
            LinkOp::Read(uuid) => {
                let data = self.transport.read_characteristic(uuid).await?;
                debug!("Read {} bytes from {}: {}", data.len(), uuid, hex::encode(&data));
                data
            }
            LinkOp::Write {
                uuid,
                data,
                with_response,
            } => {
                debug!("Writing {} bytes to {}: {}", data.len(), uuid, hex::encode(&data));
                self.transport
                    .write_characteristic(uuid, &data, with_response)
                    .await?;
                Vec::new()
            }
            LinkOp::Subscribe(uuid) => {
                debug!("Subscribing to {}", uuid);
                self.transport.subscribe(uuid).await?;
                Vec::new()
            }
            LinkOp::Unsubscribe(uuid) => {
                debug!("Unsubscribing from {}", uuid);
                self.transport.unsubscribe(uuid).await?;
                Vec::new()
            }
            LinkOp::Disconnect => {
                self.terminate().await?;
                Vec::new()
            }
        };
        Ok(result)
    }
}

fn forward_push(pushes: &mpsc::Sender<Push>, uuid: Uuid, data: Vec<u8>) {
    match pushes.try_send((uuid, data)) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!("Push queue full, dropping notification from {}", uuid);
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("Dispatcher gone, dropping notification from {}", uuid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use std::time::Duration;

    fn fast_config() -> HeykubeConfig {
        HeykubeConfig::new()
            .with_retry_delay(Duration::from_millis(1))
            .with_connection_timeout(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_establish_succeeds_after_transient_failures() {
        let (transport, handle) = MockTransport::new();
        let mut session = LinkSession::new(transport, fast_config()).unwrap();
        let status = session.status();

        handle.fail_next_connects(2);
        let device = session.scan().await.unwrap().remove(0);
        session.establish(&device).await.unwrap();

        assert_eq!(handle.connect_attempts(), 3);
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(status.borrow().epoch, 1);
    }

    #[tokio::test]
    async fn test_establish_gives_up() {
        let (transport, handle) = MockTransport::new();
        let mut session = LinkSession::new(transport, fast_config()).unwrap();

        handle.fail_next_connects(3);
        let device = session.scan().await.unwrap().remove(0);
        let err = session.establish(&device).await.unwrap_err();

        assert_eq!(err, HeykubeBleError::TooManyRetries { attempts: 3 });
        assert_eq!(handle.connect_attempts(), 3);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_run_reconnects_after_link_loss() {
        let (transport, handle) = MockTransport::new();
        let mut session = LinkSession::new(transport, fast_config()).unwrap();
        let mut status = session.status();
        let device = session.scan().await.unwrap().remove(0);
        session.establish(&device).await.unwrap();

        let (_request_tx, request_rx) = mpsc::channel(4);
        let (push_tx, _push_rx) = mpsc::channel(4);
        let task = tokio::spawn(session.run(request_rx, push_tx));

        handle.drop_link();
        let reconnected = status
            .wait_for(|s| s.state == SessionState::Connected && s.epoch == 2)
            .await
            .map(|s| *s);
        assert!(reconnected.is_ok());
        assert!(handle.is_connected());
        task.abort();
    }

    #[tokio::test]
    async fn test_run_ends_disconnected_when_closing_fails() {
        let (transport, handle) = MockTransport::new();
        let mut session = LinkSession::new(transport, fast_config()).unwrap();
        let device = session.scan().await.unwrap().remove(0);
        session.establish(&device).await.unwrap();

        let (request_tx, request_rx) = mpsc::channel(4);
        let (push_tx, _push_rx) = mpsc::channel(4);
        let task = tokio::spawn(session.run(request_rx, push_tx));

        handle.fail_next_disconnect();
        drop(request_tx);
        let session = task.await.unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Reconnecting.to_string(), "reconnecting");
    }
}
