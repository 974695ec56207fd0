//! Connection writer task and its send handle.
//!
//! The writer owns the websocket sink and the outbound sequence counter:
//! frames are stamped with the next `seq` in the order they leave the queue,
//! so no sender ever coordinates numbering. [`Sender`] is the cloneable
//! handle the rest of the bot talks through.

use emcee_proto::Outbound;
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::SessionError;

/// Interval between client websocket pings. The read side allows a grace
/// window slightly longer than this before declaring the link dead.
pub(crate) const PING_INTERVAL: Duration = Duration::from_secs(20);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// What can be queued for the wire.
#[derive(Debug)]
pub(crate) enum WriterCmd {
    /// An application frame, stamped with the next sequence number.
    Frame(Outbound),
    /// A pong answering a websocket-level ping from the server.
    Pong(Vec<u8>),
}

/// Cloneable handle for putting frames on the wire.
///
/// Every method queues and returns once the writer has accepted the frame;
/// the actual send happens on the writer task. [`SessionError::QueueClosed`]
/// means the connection is tearing down.
#[derive(Debug, Clone)]
pub struct Sender {
    queue: mpsc::Sender<WriterCmd>,
}

impl Sender {
    pub(crate) fn new(queue: mpsc::Sender<WriterCmd>) -> Self {
        Self { queue }
    }

    /// Queue an outbound frame.
    pub async fn send(&self, frame: Outbound) -> Result<(), SessionError> {
        self.queue
            .send(WriterCmd::Frame(frame))
            .await
            .map_err(|_| SessionError::QueueClosed)
    }

    pub(crate) async fn ws_pong(&self, payload: Vec<u8>) -> Result<(), SessionError> {
        self.queue
            .send(WriterCmd::Pong(payload))
            .await
            .map_err(|_| SessionError::QueueClosed)
    }

    // ===== Send primitives =====

    /// Answer an application-level ping.
    pub async fn pong(&self) -> Result<(), SessionError> {
        self.send(Outbound::Pong).await
    }

    /// Public chat message.
    pub async fn msg(&self, text: &str) -> Result<(), SessionError> {
        self.send(Outbound::Msg {
            text: text.to_string(),
        })
        .await
    }

    /// Private message to one user.
    pub async fn pvtmsg(&self, handle: u64, text: &str) -> Result<(), SessionError> {
        self.send(Outbound::Pvtmsg {
            handle,
            text: text.to_string(),
        })
        .await
    }

    /// Change the client's nick.
    pub async fn nick(&self, nick: &str) -> Result<(), SessionError> {
        self.send(Outbound::Nick {
            nick: nick.to_string(),
        })
        .await
    }

    /// Kick a user out of the room.
    pub async fn kick(&self, handle: u64) -> Result<(), SessionError> {
        self.send(Outbound::Kick { handle }).await
    }

    /// Ban a user from the room.
    pub async fn ban(&self, handle: u64) -> Result<(), SessionError> {
        self.send(Outbound::Ban { handle }).await
    }

    /// Lift a ban by its server-assigned id.
    pub async fn unban(&self, ban_id: u64) -> Result<(), SessionError> {
        self.send(Outbound::Unban { ban_id }).await
    }

    /// Request the ban registry.
    pub async fn banlist(&self) -> Result<(), SessionError> {
        self.send(Outbound::Banlist).await
    }

    /// Answer a password prompt.
    pub async fn password(&self, password: &str) -> Result<(), SessionError> {
        self.send(Outbound::Password {
            password: password.to_string(),
        })
        .await
    }

    /// Allow a green-room user to broadcast.
    pub async fn cam_approve(&self, handle: u64) -> Result<(), SessionError> {
        self.send(Outbound::CamApprove { handle }).await
    }

    /// Close a user's broadcast.
    pub async fn cam_close(&self, handle: u64) -> Result<(), SessionError> {
        self.send(Outbound::CamClose { handle }).await
    }

    /// Submit a solved captcha token.
    pub async fn captcha(&self, token: &str) -> Result<(), SessionError> {
        self.send(Outbound::Captcha {
            token: token.to_string(),
        })
        .await
    }

    /// Start a media item, or seek within the current one when `offset` is
    /// non-zero.
    pub async fn media_play(
        &self,
        id: &str,
        duration: f64,
        title: &str,
        offset: f64,
    ) -> Result<(), SessionError> {
        self.send(Outbound::MediaPlay {
            id: id.to_string(),
            duration,
            title: title.to_string(),
            offset,
        })
        .await
    }

    /// Pause the current media item at `offset`.
    pub async fn media_pause(
        &self,
        id: &str,
        duration: f64,
        offset: f64,
    ) -> Result<(), SessionError> {
        self.send(Outbound::MediaPause {
            id: id.to_string(),
            duration,
            offset,
        })
        .await
    }

    /// Stop the current media item.
    pub async fn media_stop(
        &self,
        id: &str,
        duration: f64,
        offset: f64,
    ) -> Result<(), SessionError> {
        self.send(Outbound::MediaStop {
            id: id.to_string(),
            duration,
            offset,
        })
        .await
    }
}

/// Drive the sink until every sender is gone or the socket dies.
///
/// Also owns the keepalive schedule: a websocket ping goes out every
/// [`PING_INTERVAL`] regardless of application traffic.
pub(crate) async fn run(mut sink: WsSink, mut queue: mpsc::Receiver<WriterCmd>) {
    let mut seq: u64 = 1;
    let mut ping = interval(PING_INTERVAL);

    loop {
        tokio::select! {
            cmd = queue.recv() => match cmd {
                Some(WriterCmd::Frame(frame)) => {
                    debug!(kind = frame.kind(), seq, "Sending frame");
                    if let Err(e) = sink.send(Message::Text(frame.encode(seq))).await {
                        warn!(error = %e, "Write failed, stopping writer");
                        break;
                    }
                    seq += 1;
                }
                Some(WriterCmd::Pong(payload)) => {
                    if let Err(e) = sink.send(Message::Pong(payload)).await {
                        warn!(error = %e, "Pong write failed, stopping writer");
                        break;
                    }
                }
                None => {
                    // Every handle is gone; try for a clean close.
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            _ = ping.tick() => {
                if let Err(e) = sink.send(Message::Ping(Vec::new())).await {
                    warn!(error = %e, "Ping write failed, stopping writer");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_after_teardown_reports_queue_closed() {
        let (tx, rx) = mpsc::channel(4);
        let sender = Sender::new(tx);
        drop(rx);

        let err = sender.msg("hello").await.unwrap_err();
        assert!(matches!(err, SessionError::QueueClosed));
    }

    #[tokio::test]
    async fn test_queue_keeps_send_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = Sender::new(tx);

        sender.pong().await.unwrap();
        sender.msg("first").await.unwrap();
        sender.kick(7).await.unwrap();

        let mut kinds = Vec::new();
        for _ in 0..3 {
            match rx.recv().await.unwrap() {
                WriterCmd::Frame(frame) => kinds.push(frame.kind()),
                WriterCmd::Pong(_) => kinds.push("ws-pong"),
            }
        }
        assert_eq!(kinds, ["pong", "msg", "kick"]);
    }

    #[tokio::test]
    async fn test_ws_pong_carries_payload() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = Sender::new(tx);

        sender.ws_pong(vec![1, 2, 3]).await.unwrap();
        match rx.recv().await.unwrap() {
            WriterCmd::Pong(payload) => assert_eq!(payload, vec![1, 2, 3]),
            other => panic!("expected pong, got {other:?}"),
        }
    }
}
