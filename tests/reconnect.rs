//! Integration tests for session close handling.
//!
//! The server's close codes decide between redialing and giving up; both
//! paths are observable from outside the process.

mod common;

use std::time::Duration;

use common::room::CONNECT_TOKEN;
use common::MockRoom;
use serde_json::json;

#[tokio::test]
async fn test_redials_after_recoverable_close() {
    let mut room = MockRoom::spawn("").await.expect("Failed to spawn mock room");

    let mut conn = room.next_conn().await.expect("Bot did not connect");
    let join = conn.recv().await.expect("Failed to receive join frame");
    assert_eq!(join["seq"], 1);

    conn.send(json!({"type": "closed", "error": 12}))
        .await
        .expect("Failed to send close");
    assert!(conn.closed().await, "bot should drop the session");

    // A fresh dial means a fresh token fetch and a fresh sequence counter.
    let mut conn = room.next_conn().await.expect("Bot did not redial");
    let join = conn.recv().await.expect("Failed to receive second join");
    assert_eq!(join["type"], "join");
    assert_eq!(join["seq"], 1);
    assert_eq!(join["token"], CONNECT_TOKEN);
}

#[tokio::test]
async fn test_ban_close_is_terminal() {
    let mut room = MockRoom::spawn("").await.expect("Failed to spawn mock room");

    let mut conn = room.next_conn().await.expect("Bot did not connect");
    conn.recv().await.expect("Failed to receive join frame");

    conn.send(json!({"type": "closed", "error": 4}))
        .await
        .expect("Failed to send close");

    let status = room
        .wait_exit(Duration::from_secs(5))
        .await
        .expect("bot should exit after a ban close");
    assert!(!status.success(), "a ban close should exit with an error");
}
