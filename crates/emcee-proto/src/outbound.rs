//! Outbound message construction.
//!
//! Every message the client sends is a JSON object carrying the event name
//! in `type` and the client's sequence number in `seq`. The sequence number
//! is owned by the connection writer and injected at encode time, so the
//! variants here stay plain data.

use serde_json::json;

/// An outbound message, minus its sequence number.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// The initial room join, sent once after the websocket handshake.
    Join {
        /// Client identification string, version negotiated beforehand.
        useragent: String,
        /// Connect token obtained from the directory.
        token: String,
        /// Room to join.
        room: String,
        /// Nick to join under.
        nick: String,
    },
    /// Reply to an application-level `ping`.
    Pong,
    /// Change the client's nick.
    Nick {
        /// The new nick.
        nick: String,
    },
    /// Public chat message.
    Msg {
        /// Message text.
        text: String,
    },
    /// Private message to one user.
    Pvtmsg {
        /// Receiving user's handle.
        handle: u64,
        /// Message text.
        text: String,
    },
    /// Kick a user out of the room.
    Kick {
        /// Handle of the user to kick.
        handle: u64,
    },
    /// Ban a user from the room.
    Ban {
        /// Handle of the user to ban.
        handle: u64,
    },
    /// Lift a ban.
    Unban {
        /// The server-assigned ban id to lift.
        ban_id: u64,
    },
    /// Request the ban registry.
    Banlist,
    /// Answer a password prompt.
    Password {
        /// The room password.
        password: String,
    },
    /// Allow a green-room user to broadcast.
    CamApprove {
        /// Handle of the waiting user.
        handle: u64,
    },
    /// Close a user's broadcast.
    CamClose {
        /// Handle of the broadcasting user.
        handle: u64,
    },
    /// Submit a solved captcha token.
    Captcha {
        /// The solver's response token.
        token: String,
    },
    /// Start a media item, or seek within the current one.
    ///
    /// A non-zero offset encodes as a seek: the title is omitted and the
    /// `playlist`/`seek` markers are attached instead.
    MediaPlay {
        /// Provider-scoped media id.
        id: String,
        /// Duration in seconds.
        duration: f64,
        /// Title, carried only on a fresh start.
        title: String,
        /// Start offset in seconds; non-zero means seek.
        offset: f64,
    },
    /// Pause the current media item, or seek while paused.
    MediaPause {
        /// Provider-scoped media id.
        id: String,
        /// Duration in seconds.
        duration: f64,
        /// Offset in seconds at which the pause happens.
        offset: f64,
    },
    /// Stop the current media item.
    MediaStop {
        /// Provider-scoped media id.
        id: String,
        /// Duration in seconds.
        duration: f64,
        /// Offset in seconds at which the stop happens.
        offset: f64,
    },
}

impl Outbound {
    /// The wire event name this message is sent under.
    pub fn kind(&self) -> &'static str {
        match self {
            Outbound::Join { .. } => "join",
            Outbound::Pong => "pong",
            Outbound::Nick { .. } => "nick",
            Outbound::Msg { .. } => "msg",
            Outbound::Pvtmsg { .. } => "pvtmsg",
            Outbound::Kick { .. } => "kick",
            Outbound::Ban { .. } => "ban",
            Outbound::Unban { .. } => "unban",
            Outbound::Banlist => "banlist",
            Outbound::Password { .. } => "password",
            Outbound::CamApprove { .. } => "stream_moder_allow",
            Outbound::CamClose { .. } => "stream_moder_close",
            Outbound::Captcha { .. } => "captcha",
            Outbound::MediaPlay { .. } => "media_play",
            Outbound::MediaPause { .. } => "media_pause",
            Outbound::MediaStop { .. } => "media_stop",
        }
    }

    /// Encode the message with its assigned sequence number.
    pub fn encode(&self, seq: u64) -> String {
        let mut value = match self {
            Outbound::Join {
                useragent,
                token,
                room,
                nick,
            } => json!({
                "useragent": useragent,
                "token": token,
                "room": room,
                "nick": nick,
            }),
            Outbound::Pong | Outbound::Banlist => json!({}),
            Outbound::Nick { nick } => json!({ "nick": nick }),
            Outbound::Msg { text } => json!({ "text": text }),
            Outbound::Pvtmsg { handle, text } => json!({
                "handle": handle,
                "text": text,
            }),
            Outbound::Kick { handle }
            | Outbound::Ban { handle }
            | Outbound::CamApprove { handle }
            | Outbound::CamClose { handle } => json!({ "handle": handle }),
            Outbound::Unban { ban_id } => json!({ "id": ban_id }),
            Outbound::Password { password } => json!({ "password": password }),
            Outbound::Captcha { token } => json!({ "token": token }),
            Outbound::MediaPlay {
                id,
                duration,
                title,
                offset,
            } => {
                if *offset == 0.0 {
                    json!({
                        "item": {
                            "id": id,
                            "duration": duration,
                            "offset": offset,
                            "title": title,
                        }
                    })
                } else {
                    // Seek form: no title, playlist/seek markers instead.
                    json!({
                        "item": {
                            "id": id,
                            "duration": duration,
                            "offset": offset,
                            "playlist": false,
                            "seek": true,
                        }
                    })
                }
            }
            Outbound::MediaPause {
                id,
                duration,
                offset,
            }
            | Outbound::MediaStop {
                id,
                duration,
                offset,
            } => json!({
                "item": {
                    "id": id,
                    "duration": duration,
                    "offset": offset,
                }
            }),
        };

        // json! always yields an object here, so the inserts cannot fail.
        if let Some(object) = value.as_object_mut() {
            object.insert("type".to_string(), json!(self.kind()));
            object.insert("seq".to_string(), json!(seq));
        }
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn decode(raw: &str) -> Value {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_join_encoding() {
        let join = Outbound::Join {
            useragent: "emcee-client-0.9".to_string(),
            token: "tok123".to_string(),
            room: "lounge".to_string(),
            nick: "emcee".to_string(),
        };
        let value = decode(&join.encode(1));
        assert_eq!(value["type"], "join");
        assert_eq!(value["seq"], 1);
        assert_eq!(value["token"], "tok123");
        assert_eq!(value["room"], "lounge");
        assert_eq!(value["nick"], "emcee");
    }

    #[test]
    fn test_seq_is_injected() {
        let value = decode(&Outbound::Pong.encode(42));
        assert_eq!(value["type"], "pong");
        assert_eq!(value["seq"], 42);
    }

    #[test]
    fn test_media_play_fresh_start_keeps_title() {
        let play = Outbound::MediaPlay {
            id: "dQw4w9WgXcQ".to_string(),
            duration: 212.0,
            title: "some song".to_string(),
            offset: 0.0,
        };
        let value = decode(&play.encode(7));
        assert_eq!(value["type"], "media_play");
        assert_eq!(value["item"]["title"], "some song");
        assert!(value["item"].get("seek").is_none());
        assert!(value["item"].get("playlist").is_none());
    }

    #[test]
    fn test_media_play_seek_drops_title() {
        let seek = Outbound::MediaPlay {
            id: "dQw4w9WgXcQ".to_string(),
            duration: 212.0,
            title: "some song".to_string(),
            offset: 60.0,
        };
        let value = decode(&seek.encode(8));
        assert!(value["item"].get("title").is_none());
        assert_eq!(value["item"]["playlist"], false);
        assert_eq!(value["item"]["seek"], true);
        assert_eq!(value["item"]["offset"], 60.0);
    }

    #[test]
    fn test_unban_uses_ban_id() {
        let value = decode(&Outbound::Unban { ban_id: 77 }.encode(3));
        assert_eq!(value["type"], "unban");
        assert_eq!(value["id"], 77);
    }

    #[test]
    fn test_pvtmsg_carries_handle() {
        let pm = Outbound::Pvtmsg {
            handle: 45204,
            text: "hi there".to_string(),
        };
        let value = decode(&pm.encode(9));
        assert_eq!(value["handle"], 45204);
        assert_eq!(value["text"], "hi there");
    }

    #[test]
    fn test_moderation_kinds() {
        assert_eq!(Outbound::Kick { handle: 1 }.kind(), "kick");
        assert_eq!(Outbound::Ban { handle: 1 }.kind(), "ban");
        assert_eq!(Outbound::CamApprove { handle: 1 }.kind(), "stream_moder_allow");
        assert_eq!(Outbound::CamClose { handle: 1 }.kind(), "stream_moder_close");
    }
}
