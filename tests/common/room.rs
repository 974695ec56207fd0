//! Mock room management.
//!
//! Spawns the emcee binary against a scripted room: a minimal directory
//! HTTP endpoint handing out the connect token, and a websocket listener
//! standing in for the room server. Tests drive the conversation frame by
//! frame through [`RoomConn`].

use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, timeout_at, Instant};
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

pub const ROOM: &str = "testroom";
pub const BOT_NICK: &str = "emcee";
pub const PASSWORD: &str = "sesame";
pub const CONNECT_TOKEN: &str = "tok-fe11";
pub const CLIENT_VERSION: &str = "9.9.9";

/// A scripted room instance with the bot process attached.
pub struct MockRoom {
    child: Child,
    conns: mpsc::Receiver<RoomConn>,
    _data_dir: tempfile::TempDir,
}

impl MockRoom {
    /// Spawn the bot against fresh mock services. `overrides` is appended
    /// to the generated configuration, so tests can add whole tables like
    /// `[moderation]`.
    pub async fn spawn(overrides: &str) -> anyhow::Result<Self> {
        let directory_listener = TcpListener::bind("127.0.0.1:0").await?;
        let directory_port = directory_listener.local_addr()?.port();
        let room_listener = TcpListener::bind("127.0.0.1:0").await?;
        let room_port = room_listener.local_addr()?.port();

        let data_dir = tempfile::tempdir()?;
        let config_path = data_dir.path().join("emcee.toml");
        let config_content = format!(
            r#"
[room]
name = "{ROOM}"
nick = "{BOT_NICK}"
password = "{PASSWORD}"

[lists]
path = "{lists}"

[providers]
directory = "http://127.0.0.1:{directory_port}"

{overrides}
"#,
            lists = data_dir.path().join("rooms").display(),
        );
        std::fs::write(&config_path, config_content)?;

        tokio::spawn(serve_directory(directory_listener, room_port));
        let (conn_tx, conns) = mpsc::channel(4);
        tokio::spawn(accept_rooms(room_listener, conn_tx));

        // Binary lives in the workspace target dir.
        let binary_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("target/debug/emcee");
        let child = Command::new(&binary_path)
            .arg(config_path.to_str().unwrap())
            .spawn()?;

        Ok(Self {
            child,
            conns,
            _data_dir: data_dir,
        })
    }

    /// The next connection the bot dials in. The window is wide enough to
    /// cover the redial pause after a dropped session.
    pub async fn next_conn(&mut self) -> anyhow::Result<RoomConn> {
        match timeout(Duration::from_secs(12), self.conns.recv()).await {
            Ok(Some(conn)) => Ok(conn),
            Ok(None) => anyhow::bail!("accept loop stopped"),
            Err(_) => anyhow::bail!("bot did not connect within 12 seconds"),
        }
    }

    /// Wait for the bot process to exit on its own.
    pub async fn wait_exit(&mut self, wait: Duration) -> Option<ExitStatus> {
        let deadline = Instant::now() + wait;
        while Instant::now() < deadline {
            if let Ok(Some(status)) = self.child.try_wait() {
                return Some(status);
            }
            sleep(Duration::from_millis(50)).await;
        }
        None
    }
}

impl Drop for MockRoom {
    fn drop(&mut self) {
        // Kill the bot process; the temp dir cleans itself up.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// One accepted websocket connection from the bot.
pub struct RoomConn {
    socket: WebSocketStream<TcpStream>,
    /// Subprotocol the client requested during the upgrade.
    pub subprotocol: Option<String>,
}

impl RoomConn {
    /// The next application frame from the bot. Websocket-level ping/pong
    /// traffic is skipped.
    pub async fn recv(&mut self) -> anyhow::Result<Value> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    pub async fn recv_timeout(&mut self, wait: Duration) -> anyhow::Result<Value> {
        let deadline = Instant::now() + wait;
        loop {
            let message = timeout_at(deadline, self.socket.next())
                .await
                .map_err(|_| anyhow::anyhow!("timed out waiting for a frame"))?;
            match message {
                Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(&text)?),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => anyhow::bail!("connection closed"),
                Some(Ok(other)) => anyhow::bail!("unexpected message: {other:?}"),
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Read frames until one of `kind` arrives, returning every frame read
    /// including the match.
    pub async fn recv_until(&mut self, kind: &str) -> anyhow::Result<Vec<Value>> {
        let mut frames = Vec::new();
        loop {
            let frame = self.recv().await?;
            let done = frame["type"] == kind;
            frames.push(frame);
            if done {
                return Ok(frames);
            }
        }
    }

    pub async fn send(&mut self, frame: Value) -> anyhow::Result<()> {
        self.socket.send(Message::Text(frame.to_string())).await?;
        Ok(())
    }

    /// Answer the bot's join frame with a joined confirmation and an empty
    /// userlist, returning the join frame for inspection.
    pub async fn accept_join(&mut self, as_mod: bool) -> anyhow::Result<Value> {
        let join = self.recv().await?;
        assert_eq!(join["type"], "join", "first frame should be the room join");
        self.send(json!({
            "type": "joined",
            "self": {
                "handle": 1,
                "nick": join["nick"],
                "username": BOT_NICK,
                "mod": as_mod,
            },
            "room": {"name": ROOM, "topic": "integration"},
        }))
        .await?;
        self.send(json!({"type": "userlist", "users": []})).await?;
        Ok(join)
    }

    /// True when the bot drops the connection within a few seconds.
    pub async fn closed(mut self) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match timeout_at(deadline, self.socket.next()).await {
                Ok(Some(Ok(Message::Close(_)))) | Ok(None) | Ok(Some(Err(_))) => return true,
                Ok(Some(Ok(_))) => continue,
                Err(_) => return false,
            }
        }
    }
}

/// Answer the directory lookups the bot makes while connecting.
async fn serve_directory(listener: TcpListener, room_port: u16) {
    loop {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };
        tokio::spawn(async move {
            let mut raw = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                match stream.read(&mut chunk).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => {
                        raw.extend_from_slice(&chunk[..n]);
                        if raw.windows(4).any(|window| window == b"\r\n\r\n") {
                            break;
                        }
                    }
                }
            }
            let request = String::from_utf8_lossy(&raw);
            let path = request
                .lines()
                .next()
                .and_then(|line| line.split(' ').nth(1))
                .unwrap_or("/")
                .to_string();
            let body = directory_body(&path, room_port);
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len(),
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        });
    }
}

fn directory_body(path: &str, room_port: u16) -> String {
    if path.starts_with("/room/token/") {
        json!({
            "result": CONNECT_TOKEN,
            "endpoint": format!("ws://127.0.0.1:{room_port}"),
        })
        .to_string()
    } else if path.starts_with("/room/version/") {
        json!({"version": CLIENT_VERSION}).to_string()
    } else if path.starts_with("/user/profile") {
        json!({
            "result": "success",
            "biography": "integration test account",
            "location": "dk",
            "role": "member",
        })
        .to_string()
    } else {
        json!({"result": "not found"}).to_string()
    }
}

/// Accept websocket upgrades, recording the requested subprotocol.
async fn accept_rooms(listener: TcpListener, conns: mpsc::Sender<RoomConn>) {
    loop {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let requested: Arc<Mutex<Option<String>>> = Arc::default();
        let seen = Arc::clone(&requested);
        let socket = match accept_hdr_async(stream, move |request: &Request, response: Response| {
            *seen.lock().unwrap() = request
                .headers()
                .get("Sec-WebSocket-Protocol")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            Ok(response)
        })
        .await
        {
            Ok(socket) => socket,
            Err(_) => continue,
        };
        let subprotocol = requested.lock().unwrap().take();
        if conns.send(RoomConn { socket, subprotocol }).await.is_err() {
            return;
        }
    }
}
