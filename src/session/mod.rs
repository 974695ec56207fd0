//! Room session: connect sequence, read loop and keepalive.
//!
//! A [`Session`] owns the read half of the websocket and pre-routes the
//! frames that belong to the connection itself (`ping`, `closed`,
//! `password`, `captcha`) before anything reaches the event router. The
//! write half lives on a spawned task that owns the sequence counter and
//! hands out cloneable [`Sender`] handles.

mod writer;

pub use writer::Sender;

use std::sync::Arc;

use futures_util::stream::SplitStream;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use emcee_proto::payload::{CaptchaPayload, ClosedPayload};
use emcee_proto::{CloseCode, Frame, Outbound};

use crate::config::Config;
use crate::error::SessionError;
use crate::providers::{CaptchaSolver, Directory};

/// How long the read loop waits for any inbound traffic before declaring
/// the link dead. Client pings go out every [`writer::PING_INTERVAL`], so a
/// healthy wire always produces a pong inside this window.
const READ_TIMEOUT: Duration = Duration::from_secs(25);

/// Subprotocol the server expects on the websocket upgrade.
const SUB_PROTOCOL: &str = "tc";

/// Identification prefix for the join frame's useragent field.
const USER_AGENT: &str = "emcee-client";

/// Outbound queue depth between the bot and the writer task.
const OUTBOUND_QUEUE: usize = 64;

type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// One connected room session.
///
/// Dropping the session (and every [`Sender`] cloned from it) closes the
/// connection: the writer task sends a close frame and exits once its queue
/// drains.
pub struct Session {
    stream: WsStream,
    sender: Sender,
    password: Option<String>,
    password_sent: bool,
    solver: Option<Arc<dyn CaptchaSolver>>,
    /// Room page url handed to the captcha solver alongside the site key.
    page_url: String,
}

impl Session {
    /// Run the full connect sequence and join the room.
    ///
    /// Fetches connect args from the directory, upgrades the websocket with
    /// the server's subprotocol and queues the join frame, which the writer
    /// stamps with seq 1. The caller then drives the session with
    /// [`Session::next`].
    pub async fn connect(
        config: &Config,
        nick: &str,
        directory: &dyn Directory,
        solver: Option<Arc<dyn CaptchaSolver>>,
    ) -> Result<Session, SessionError> {
        let room = &config.room.name;
        let args = directory
            .connect_args(room)
            .await
            .map_err(SessionError::Directory)?;
        let version = match directory.client_version(room).await {
            Some(version) => version,
            None => config.client.version.clone(),
        };

        info!(room = %room, endpoint = %args.endpoint, %version, "Connecting");

        let mut request = args.endpoint.as_str().into_client_request()?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            http::HeaderValue::from_static(SUB_PROTOCOL),
        );
        let (socket, _) = connect_async(request).await?;
        let (sink, stream) = socket.split();

        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
        tokio::spawn(writer::run(sink, rx));
        let sender = Sender::new(tx);

        sender
            .send(Outbound::Join {
                useragent: format!("{USER_AGENT}-{version}"),
                token: args.token,
                room: room.clone(),
                nick: nick.to_string(),
            })
            .await?;

        Ok(Session {
            stream,
            sender,
            password: config.room.password.clone(),
            password_sent: false,
            solver,
            page_url: room_page(&config.providers.directory, room),
        })
    }

    /// A handle for sending frames on this session.
    pub fn sender(&self) -> Sender {
        self.sender.clone()
    }

    /// The next application frame.
    ///
    /// Session-level frames never surface here: `ping` is answered ahead of
    /// any dispatch, `password` prompts are answered once from config,
    /// `captcha` challenges go to the solver, and `closed` ends the session
    /// with the decoded close code. Malformed frames are logged and
    /// skipped.
    pub async fn next(&mut self) -> Result<Frame, SessionError> {
        loop {
            let message = match timeout(READ_TIMEOUT, self.stream.next()).await {
                Ok(Some(Ok(message))) => message,
                Ok(Some(Err(e))) => return Err(SessionError::Ws(e)),
                Ok(None) => return Err(SessionError::Ws(tungstenite::Error::ConnectionClosed)),
                Err(_) => return Err(SessionError::KeepaliveTimeout),
            };

            let text = match message {
                Message::Text(text) => text,
                Message::Ping(payload) => {
                    self.sender.ws_pong(payload).await?;
                    continue;
                }
                Message::Pong(_) => continue,
                Message::Close(frame) => {
                    debug!(frame = ?frame, "Websocket closed by server");
                    return Err(SessionError::Ws(tungstenite::Error::ConnectionClosed));
                }
                other => {
                    debug!(message = ?other, "Ignoring non-text message");
                    continue;
                }
            };

            let frame = match Frame::parse(&text) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "Dropping malformed frame");
                    continue;
                }
            };

            match frame.kind() {
                "ping" => self.sender.pong().await?,
                "closed" => return Err(close_reason(&frame)),
                "password" => self.password_prompt().await?,
                "captcha" => self.captcha_challenge(&frame).await?,
                _ => return Ok(frame),
            }
        }
    }

    /// Answer a password prompt. A second prompt means the first answer was
    /// rejected; the session ends instead of retrying.
    async fn password_prompt(&mut self) -> Result<(), SessionError> {
        if self.password_sent {
            return Err(SessionError::PasswordRejected);
        }
        let Some(password) = self.password.clone() else {
            return Err(SessionError::MissingPassword);
        };
        info!("Room is password protected, sending configured password");
        self.password_sent = true;
        self.sender.password(&password).await
    }

    /// Hand a captcha challenge to the solver and submit the token.
    async fn captcha_challenge(&mut self, frame: &Frame) -> Result<(), SessionError> {
        let payload: CaptchaPayload = frame
            .payload()
            .map_err(|e| SessionError::Captcha(format!("malformed challenge: {e}")))?;
        let Some(solver) = self.solver.as_ref() else {
            return Err(SessionError::Captcha("no solver configured".to_string()));
        };
        info!(site_key = %payload.key, "Captcha challenge received, handing off to solver");
        let token = solver
            .solve(&self.page_url, &payload.key)
            .await
            .map_err(|e| SessionError::Captcha(e.to_string()))?;
        self.sender.captcha(&token).await
    }
}

/// Decode a `closed` frame into the session's terminal error.
fn close_reason(frame: &Frame) -> SessionError {
    match frame.payload::<ClosedPayload>() {
        Ok(payload) => {
            let code = CloseCode::from_code(payload.error);
            info!(code = code.code(), reason = %code, "Session closed by server");
            SessionError::Closed(code)
        }
        Err(e) => {
            warn!(error = %e, "Malformed closed frame");
            SessionError::Ws(tungstenite::Error::ConnectionClosed)
        }
    }
}

/// The public room page, as the captcha service wants to see it.
fn room_page(base: &str, room: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), room)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_page_joins_cleanly() {
        assert_eq!(
            room_page("https://directory.example.com/", "lounge"),
            "https://directory.example.com/lounge"
        );
        assert_eq!(
            room_page("https://directory.example.com", "lounge"),
            "https://directory.example.com/lounge"
        );
    }

    #[test]
    fn test_close_reason_decodes_code() {
        let frame = Frame::parse(r#"{"type":"closed","error":4}"#).unwrap();
        match close_reason(&frame) {
            SessionError::Closed(code) => assert_eq!(code, CloseCode::Banned),
            other => panic!("expected close code, got {other:?}"),
        }
    }

    #[test]
    fn test_close_reason_reconnect_policy() {
        let frame = Frame::parse(r#"{"type":"closed","error":12}"#).unwrap();
        assert!(close_reason(&frame).should_reconnect());

        let frame = Frame::parse(r#"{"type":"closed","error":22}"#).unwrap();
        assert!(!close_reason(&frame).should_reconnect());
    }

    #[test]
    fn test_malformed_close_is_a_transport_error() {
        let frame = Frame::parse(r#"{"type":"closed"}"#).unwrap();
        assert!(matches!(close_reason(&frame), SessionError::Ws(_)));
    }
}
