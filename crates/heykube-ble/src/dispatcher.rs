//! Command and notification dispatcher
//!
//! The command task drains the caller's command queue strictly in order and
//! keeps at most one link operation in flight. While it waits on the
//! connection task it keeps forwarding device pushes to the notification
//! queue. It owns the subscription list and replays it after a reconnect.

use heykube_core::WireField;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::error::{HeykubeBleError, Result};
use crate::protocol::{characteristic_uuid, field_for_uuid};
use crate::session::{LinkOp, LinkRequest, Push, SessionState, SessionStatus};

// ----------------------------------------------------------------------------
// Commands and Notifications
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Read(WireField),
    Write {
        field: WireField,
        data: Vec<u8>,
        with_response: bool,
    },
    Subscribe(WireField),
    Unsubscribe(WireField),
    Disconnect,
}

/// A command with its reply slot; only reads reply with bytes
pub(crate) struct CommandRequest {
    pub command: Command,
    pub reply: oneshot::Sender<Result<Vec<u8>>>,
}

/// A device push tagged with the field it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub field: WireField,
    pub data: Vec<u8>,
}

// ----------------------------------------------------------------------------
// Dispatcher
// ----------------------------------------------------------------------------

pub(crate) struct Dispatcher {
    link: mpsc::Sender<LinkRequest>,
    pushes: Option<mpsc::Receiver<Push>>,
    notifications: mpsc::Sender<Notification>,
    status: watch::Receiver<SessionStatus>,
    /// Active subscriptions, in the order they were made
    subscriptions: Vec<WireField>,
    /// Link epoch the subscriptions were last made on
    epoch: u64,
}

impl Dispatcher {
    pub fn new(
        link: mpsc::Sender<LinkRequest>,
        pushes: mpsc::Receiver<Push>,
        notifications: mpsc::Sender<Notification>,
        mut status: watch::Receiver<SessionStatus>,
    ) -> Self {
        let epoch = status.borrow_and_update().epoch;
        Self {
            link,
            pushes: Some(pushes),
            notifications,
            status,
            subscriptions: Vec::new(),
            epoch,
        }
    }

    pub async fn run(mut self, mut commands: mpsc::Receiver<CommandRequest>) {
        debug!("Command task started");
        let mut watching = true;

        loop {
            // A replaced link gets its subscriptions back before any queued command
            tokio::select! {
                biased;

                changed = self.status.changed(), if watching => {
                    if changed.is_err() {
                        watching = false;
                    } else {
                        self.on_status_change().await;
                    }
                },

                push = next_push(&mut self.pushes) => match push {
                    Some(push) => forward(&self.notifications, push),
                    None => self.pushes = None,
                },

                request = commands.recv() => match request {
                    Some(request) => {
                        if self.handle(request).await {
                            break;
                        }
                    }
                    None => {
                        debug!("Command queue closed");
                        break;
                    }
                },
            }
        }

        debug!("Command task stopped");
    }

    async fn on_status_change(&mut self) {
        let status = *self.status.borrow_and_update();
        if status.state != SessionState::Connected || status.epoch == self.epoch {
            return;
        }
        self.epoch = status.epoch;
        if self.subscriptions.is_empty() {
            return;
        }

        info!("Link replaced, restoring {} subscription(s)", self.subscriptions.len());
        for field in self.subscriptions.clone() {
            if let Err(e) = self.link_call(LinkOp::Subscribe(characteristic_uuid(field))).await {
                warn!("Failed to restore {} subscription: {}", field, e);
            }
        }
    }

    /// Executes one command; true when the task must stop
    async fn handle(&mut self, request: CommandRequest) -> bool {
        let CommandRequest { command, reply } = request;
        let mut stop = false;

        let result = match command {
            Command::Read(field) => self.link_call(LinkOp::Read(characteristic_uuid(field))).await,
            Command::Write {
                field,
                data,
                with_response,
            } => {
                self.link_call(LinkOp::Write {
                    uuid: characteristic_uuid(field),
                    data,
                    with_response,
                })
                .await
            }
            Command::Subscribe(field) => self.subscribe(field).await,
            Command::Unsubscribe(field) => self.unsubscribe(field).await,
            Command::Disconnect => {
                stop = true;
                match self.link_call(LinkOp::Disconnect).await {
                    // Already down is as good as disconnected
                    Err(HeykubeBleError::SessionClosed) => Ok(Vec::new()),
                    other => other,
                }
            }
        };

        if reply.send(result).is_err() {
            debug!("Caller stopped waiting; reply discarded");
        }
        stop
    }

    async fn subscribe(&mut self, field: WireField) -> Result<Vec<u8>> {
        if self.subscriptions.contains(&field) {
            warn!("Already subscribed to {}", field);
            return Ok(Vec::new());
        }
        self.link_call(LinkOp::Subscribe(characteristic_uuid(field)))
            .await?;
        self.subscriptions.push(field);
        Ok(Vec::new())
    }

    async fn unsubscribe(&mut self, field: WireField) -> Result<Vec<u8>> {
        if !self.subscriptions.contains(&field) {
            debug!("Not subscribed to {}; nothing to do", field);
            return Ok(Vec::new());
        }
        self.link_call(LinkOp::Unsubscribe(characteristic_uuid(field)))
            .await?;
        self.subscriptions.retain(|f| *f != field);
        Ok(Vec::new())
    }

    /// Sends one operation to the connection task and waits for its reply
    async fn link_call(&mut self, op: LinkOp) -> Result<Vec<u8>> {
        let (reply_tx, mut reply_rx) = oneshot::channel();
        self.link
            .send(LinkRequest { op, reply: reply_tx })
            .await
            .map_err(|_| HeykubeBleError::SessionClosed)?;

        loop {
            tokio::select! {
                reply = &mut reply_rx => {
                    return reply.unwrap_or(Err(HeykubeBleError::SessionClosed));
                }
                push = next_push(&mut self.pushes) => match push {
                    Some(push) => forward(&self.notifications, push),
                    None => self.pushes = None,
                },
            }
        }
    }
}

/// Next device push; pends forever once the connection task is gone
async fn next_push(pushes: &mut Option<mpsc::Receiver<Push>>) -> Option<Push> {
    match pushes {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn forward(notifications: &mpsc::Sender<Notification>, (uuid, data): Push) {
    let Some(field) = field_for_uuid(uuid) else {
        warn!("Notification from unknown characteristic {}", uuid);
        return;
    };

    debug!("{} notification: {}", field, hex::encode(&data));
    match notifications.try_send(Notification { field, data }) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(n)) => {
            warn!("Notification queue full, dropping {} notification", n.field);
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("Client gone, dropping {} notification", field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::STATUS_CHARACTERISTIC_UUID;

    struct Harness {
        commands: mpsc::Sender<CommandRequest>,
        link: mpsc::Receiver<LinkRequest>,
        pushes: mpsc::Sender<Push>,
        notifications: mpsc::Receiver<Notification>,
        status: watch::Sender<SessionStatus>,
    }

    fn spawn_dispatcher() -> Harness {
        let (command_tx, command_rx) = mpsc::channel(8);
        let (link_tx, link_rx) = mpsc::channel(8);
        let (push_tx, push_rx) = mpsc::channel(8);
        let (notify_tx, notify_rx) = mpsc::channel(8);
        let (status_tx, status_rx) = watch::channel(SessionStatus {
            state: SessionState::Connected,
            epoch: 1,
        });
        tokio::spawn(Dispatcher::new(link_tx, push_rx, notify_tx, status_rx).run(command_rx));
        Harness {
            commands: command_tx,
            link: link_rx,
            pushes: push_tx,
            notifications: notify_rx,
            status: status_tx,
        }
    }

    async fn submit(
        commands: &mpsc::Sender<CommandRequest>,
        command: Command,
    ) -> oneshot::Receiver<Result<Vec<u8>>> {
        let (reply, rx) = oneshot::channel();
        commands
            .send(CommandRequest { command, reply })
            .await
            .unwrap();
        rx
    }

    #[tokio::test]
    async fn test_commands_run_one_at_a_time_in_order() {
        let mut h = spawn_dispatcher();
        let first = submit(&h.commands, Command::Read(WireField::Version)).await;
        let second = submit(&h.commands, Command::Read(WireField::Battery)).await;

        let request = h.link.recv().await.unwrap();
        assert_eq!(request.op, LinkOp::Read(characteristic_uuid(WireField::Version)));
        // The second command waits until the first is answered
        assert!(h.link.try_recv().is_err());
        request.reply.send(Ok(vec![1])).unwrap();

        let request = h.link.recv().await.unwrap();
        assert_eq!(request.op, LinkOp::Read(characteristic_uuid(WireField::Battery)));
        request.reply.send(Ok(vec![2])).unwrap();

        assert_eq!(first.await.unwrap(), Ok(vec![1]));
        assert_eq!(second.await.unwrap(), Ok(vec![2]));
    }

    #[tokio::test]
    async fn test_pushes_flow_while_a_command_is_in_flight() {
        let mut h = spawn_dispatcher();
        let pending = submit(&h.commands, Command::Read(WireField::CubeState)).await;
        let request = h.link.recv().await.unwrap();

        h.pushes
            .send((STATUS_CHARACTERISTIC_UUID, vec![0, 2, 0, 1, 0, 0]))
            .await
            .unwrap();
        let notification = h.notifications.recv().await.unwrap();
        assert_eq!(notification.field, WireField::Status);

        request.reply.send(Ok(vec![9])).unwrap();
        assert_eq!(pending.await.unwrap(), Ok(vec![9]));
    }

    #[tokio::test]
    async fn test_duplicate_subscribe_and_replay() {
        let mut h = spawn_dispatcher();
        let status_uuid = characteristic_uuid(WireField::Status);

        let first = submit(&h.commands, Command::Subscribe(WireField::Status)).await;
        let request = h.link.recv().await.unwrap();
        assert_eq!(request.op, LinkOp::Subscribe(status_uuid));
        request.reply.send(Ok(Vec::new())).unwrap();
        assert_eq!(first.await.unwrap(), Ok(Vec::new()));

        // Second subscribe is answered without touching the link
        let second = submit(&h.commands, Command::Subscribe(WireField::Status)).await;
        assert_eq!(second.await.unwrap(), Ok(Vec::new()));
        assert!(h.link.try_recv().is_err());

        // A command queued as the link is replaced runs after the replay
        let queued = submit(&h.commands, Command::Read(WireField::Version)).await;
        h.status.send_replace(SessionStatus {
            state: SessionState::Connected,
            epoch: 2,
        });
        let replay = h.link.recv().await.unwrap();
        assert_eq!(replay.op, LinkOp::Subscribe(status_uuid));
        replay.reply.send(Ok(Vec::new())).unwrap();

        let read = h.link.recv().await.unwrap();
        assert_eq!(read.op, LinkOp::Read(characteristic_uuid(WireField::Version)));
        read.reply.send(Ok(vec![7])).unwrap();
        assert_eq!(queued.await.unwrap(), Ok(vec![7]));
    }

    #[tokio::test]
    async fn test_closed_link_fails_commands() {
        let Harness { commands, link, .. } = spawn_dispatcher();
        drop(link);
        let reply = submit(&commands, Command::Read(WireField::Version)).await;
        assert_eq!(reply.await.unwrap(), Err(HeykubeBleError::SessionClosed));

        let reply = submit(&commands, Command::Disconnect).await;
        assert_eq!(reply.await.unwrap(), Ok(Vec::new()));
    }
}
