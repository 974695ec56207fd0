//! Frame-to-event routing.

use emcee_proto::payload::{
    AllowPayload, BanActionPayload, BanlistPayload, BroadcastPayload, ChatPayload, JoinedPayload,
    MediaPayload, NickPayload, QuitPayload, RoomSettingsPayload, StreamClosePayload, SysMsgPayload,
    UserPayload, UserlistPayload,
};
use emcee_proto::{Frame, ProtoError};

use super::Event;
use crate::state::{BannedUser, MessageKind, RoomProfile, User, UserRegistry};

/// Fold one frame through the room state and produce its event.
///
/// Registry mutation happens here, before the event is handed out, so
/// handlers can rely on the registry already reflecting the frame.
/// `Ok(None)` means the frame resolved to nothing to act on (an unknown
/// handle in a frame that requires one); a payload decode failure is the
/// caller's to log and skip.
pub fn route(
    frame: &Frame,
    registry: &mut UserRegistry,
    room: &mut RoomProfile,
) -> Result<Option<Event>, ProtoError> {
    let event = match frame.kind() {
        "joined" => {
            let payload: JoinedPayload = frame.payload()?;
            let client = registry.add(&payload.client, true).clone();
            if let Some(profile) = &payload.room {
                room.update(profile);
            }
            Some(Event::Joined { client })
        }

        "join" => {
            let payload: UserPayload = frame.payload()?;
            Some(Event::Join(registry.add(&payload, false).clone()))
        }

        "nick" => {
            let payload: NickPayload = frame.payload()?;
            registry
                .change_nick(payload.handle, &payload.nick)
                .cloned()
                .map(Event::Nick)
        }

        "quit" => {
            let payload: QuitPayload = frame.payload()?;
            Some(Event::Quit(registry.delete(payload.handle)))
        }

        "msg" => message(frame, registry, MessageKind::Chat)?,
        "pvtmsg" => message(frame, registry, MessageKind::Private)?,

        "media_play" => {
            let payload: MediaPayload = frame.payload()?;
            Some(Event::MediaPlay {
                user: resolve(registry, payload.handle),
                item: payload.item,
                is_response: frame.is_response(),
            })
        }

        "media_pause" => {
            let payload: MediaPayload = frame.payload()?;
            Some(Event::MediaPause {
                user: resolve(registry, payload.handle),
                item: payload.item,
                is_response: frame.is_response(),
            })
        }

        "media_stop" => {
            let payload: MediaPayload = frame.payload()?;
            Some(Event::MediaStop {
                user: resolve(registry, payload.handle),
                is_response: frame.is_response(),
            })
        }

        "publish" => {
            let payload: BroadcastPayload = frame.payload()?;
            registry.search_mut(payload.handle).map(|user| {
                user.is_broadcasting = true;
                user.is_waiting = false;
                Event::Publish(user.clone())
            })
        }

        "unpublish" => {
            let payload: BroadcastPayload = frame.payload()?;
            registry.search_mut(payload.handle).map(|user| {
                user.is_broadcasting = false;
                Event::Unpublish(user.clone())
            })
        }

        "pending_moderation" => {
            let payload: BroadcastPayload = frame.payload()?;
            // A pending broadcast is proof the green room is on.
            room.green_room = true;
            registry.search_mut(payload.handle).map(|user| {
                user.is_waiting = true;
                Event::PendingModeration(user.clone())
            })
        }

        "stream_moder_allow" => {
            let payload: AllowPayload = frame.payload()?;
            registry.search_mut(payload.handle).map(|user| {
                user.is_waiting = false;
                Event::StreamAllowed(user.clone())
            })
        }

        "stream_moder_close" => {
            let payload: StreamClosePayload = frame.payload()?;
            if payload.success {
                let user = payload.handle.and_then(|handle| {
                    registry.search_mut(handle).map(|user| {
                        user.is_broadcasting = false;
                        user.clone()
                    })
                });
                Some(Event::StreamClosed(user))
            } else {
                Some(server_error(payload.reason.unwrap_or_default()))
            }
        }

        "ban" => {
            let payload: BanActionPayload = frame.payload()?;
            if payload.success {
                Some(Event::Banned(registry.add_banned(&payload.entry).clone()))
            } else {
                Some(server_error(payload.entry.reason))
            }
        }

        "unban" => {
            let payload: BanActionPayload = frame.payload()?;
            if payload.success {
                let removed = registry
                    .delete_banned(payload.entry.id)
                    .unwrap_or_else(|| BannedUser::from_payload(&payload.entry));
                Some(Event::Unbanned(removed))
            } else {
                Some(server_error(payload.entry.reason))
            }
        }

        "banlist" => {
            let payload: BanlistPayload = frame.payload()?;
            let entries = payload
                .items
                .iter()
                .map(|item| registry.add_banned(item).clone())
                .collect();
            Some(Event::Banlist(entries))
        }

        "userlist" => {
            let payload: UserlistPayload = frame.payload()?;
            let client_handle = registry.client().map(|client| client.handle);
            let users = payload
                .users
                .iter()
                .filter(|user| Some(user.handle) != client_handle)
                .map(|user| registry.add(user, false).clone())
                .collect();
            Some(Event::Userlist(users))
        }

        "room_settings" => {
            let payload: RoomSettingsPayload = frame.payload()?;
            room.update(&payload.room);
            Some(Event::RoomSettings)
        }

        "sysmsg" => {
            let payload: SysMsgPayload = frame.payload()?;
            Some(Event::SysMsg { text: payload.text })
        }

        name => Some(Event::Unrouted {
            name: name.to_string(),
            payload: frame.raw().clone(),
        }),
    };

    Ok(event)
}

fn message(
    frame: &Frame,
    registry: &mut UserRegistry,
    kind: MessageKind,
) -> Result<Option<Event>, ProtoError> {
    let payload: ChatPayload = frame.payload()?;
    let event = registry.search_mut(payload.handle).map(|user| {
        let gap = user.record_message(kind, &payload.text);
        Event::Message {
            user: user.clone(),
            text: payload.text,
            kind,
            gap,
        }
    });
    Ok(event)
}

fn resolve(registry: &UserRegistry, handle: Option<u64>) -> Option<User> {
    handle.and_then(|handle| registry.search(handle)).cloned()
}

fn server_error(reason: String) -> Event {
    Event::ServerError { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::UserLevel;

    fn frame(raw: &str) -> Frame {
        Frame::parse(raw).unwrap()
    }

    fn state() -> (UserRegistry, RoomProfile) {
        (UserRegistry::new(), RoomProfile::default())
    }

    fn join(registry: &mut UserRegistry, room: &mut RoomProfile, raw: &str) {
        route(&frame(raw), registry, room).unwrap();
    }

    #[test]
    fn test_joined_registers_client_and_room() {
        let (mut registry, mut room) = state();
        let event = route(
            &frame(
                r#"{"type":"joined","self":{"handle":1,"nick":"emcee","mod":true},
                   "room":{"name":"lounge","topic":"late"}}"#,
            ),
            &mut registry,
            &mut room,
        )
        .unwrap();

        match event {
            Some(Event::Joined { client }) => {
                assert!(client.is_client);
                assert_eq!(client.level, UserLevel::Moderator);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(registry.client().unwrap().handle, 1);
        assert_eq!(room.name, "lounge");
    }

    #[test]
    fn test_join_quit_roundtrip() {
        let (mut registry, mut room) = state();
        join(
            &mut registry,
            &mut room,
            r#"{"type":"join","handle":7,"nick":"bee"}"#,
        );
        assert!(registry.search(7).is_some());

        let event = route(&frame(r#"{"type":"quit","handle":7}"#), &mut registry, &mut room)
            .unwrap();
        match event {
            Some(Event::Quit(Some(user))) => assert_eq!(user.nick, "bee"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(registry.search(7).is_none());

        // Quit for a handle that was never here still routes, with None.
        let event = route(&frame(r#"{"type":"quit","handle":7}"#), &mut registry, &mut room)
            .unwrap();
        assert!(matches!(event, Some(Event::Quit(None))));
    }

    #[test]
    fn test_nick_keeps_history() {
        let (mut registry, mut room) = state();
        join(
            &mut registry,
            &mut room,
            r#"{"type":"join","handle":7,"nick":"guest-184"}"#,
        );

        let event = route(
            &frame(r#"{"type":"nick","handle":7,"nick":"bee"}"#),
            &mut registry,
            &mut room,
        )
        .unwrap();
        match event {
            Some(Event::Nick(user)) => {
                assert_eq!(user.nick, "bee");
                assert_eq!(user.last_nick(), "guest-184");
            }
            other => panic!("unexpected: {other:?}"),
        }

        let unknown = route(
            &frame(r#"{"type":"nick","handle":99,"nick":"x"}"#),
            &mut registry,
            &mut room,
        )
        .unwrap();
        assert!(unknown.is_none());
    }

    #[test]
    fn test_message_appends_history() {
        let (mut registry, mut room) = state();
        join(
            &mut registry,
            &mut room,
            r#"{"type":"join","handle":7,"nick":"bee"}"#,
        );

        let event = route(
            &frame(r#"{"type":"msg","handle":7,"text":"hello"}"#),
            &mut registry,
            &mut room,
        )
        .unwrap();
        match event {
            Some(Event::Message {
                user, text, gap, ..
            }) => {
                assert_eq!(text, "hello");
                assert!(gap.is_none());
                assert_eq!(user.last_message(), Some("hello"));
            }
            other => panic!("unexpected: {other:?}"),
        }

        let event = route(
            &frame(r#"{"type":"msg","handle":7,"text":"again"}"#),
            &mut registry,
            &mut room,
        )
        .unwrap();
        match event {
            Some(Event::Message { gap, .. }) => assert!(gap.is_some()),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_publish_for_unknown_handle_is_dropped() {
        let (mut registry, mut room) = state();
        let event = route(
            &frame(r#"{"type":"publish","handle":42}"#),
            &mut registry,
            &mut room,
        )
        .unwrap();
        assert!(event.is_none());
    }

    #[test]
    fn test_pending_moderation_flips_green_room() {
        let (mut registry, mut room) = state();
        join(
            &mut registry,
            &mut room,
            r#"{"type":"join","handle":7,"nick":"bee"}"#,
        );
        assert!(!room.green_room);

        let event = route(
            &frame(r#"{"type":"pending_moderation","handle":7}"#),
            &mut registry,
            &mut room,
        )
        .unwrap();
        assert!(matches!(event, Some(Event::PendingModeration(_))));
        assert!(room.green_room);
        assert!(registry.search(7).unwrap().is_waiting);
    }

    #[test]
    fn test_ban_failure_routes_to_error() {
        let (mut registry, mut room) = state();
        let event = route(
            &frame(r#"{"type":"ban","success":false,"reason":"not a mod"}"#),
            &mut registry,
            &mut room,
        )
        .unwrap();
        match event {
            Some(Event::ServerError { reason }) => assert_eq!(reason, "not a mod"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(registry.banlist().is_empty());
    }

    #[test]
    fn test_ban_success_enters_registry() {
        let (mut registry, mut room) = state();
        let event = route(
            &frame(r#"{"type":"ban","success":true,"id":9,"nick":"spam","moderator":"emcee"}"#),
            &mut registry,
            &mut room,
        )
        .unwrap();
        assert!(matches!(event, Some(Event::Banned(_))));
        assert_eq!(registry.search_banlist(9).unwrap().nick, "spam");

        let event = route(
            &frame(r#"{"type":"unban","success":true,"id":9,"nick":"spam"}"#),
            &mut registry,
            &mut room,
        )
        .unwrap();
        match event {
            Some(Event::Unbanned(entry)) => assert_eq!(entry.ban_id, 9),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(registry.search_banlist(9).is_none());
    }

    #[test]
    fn test_userlist_skips_client_entry() {
        let (mut registry, mut room) = state();
        join(
            &mut registry,
            &mut room,
            r#"{"type":"joined","self":{"handle":1,"nick":"emcee"}}"#,
        );

        let event = route(
            &frame(
                r#"{"type":"userlist","users":[
                    {"handle":1,"nick":"emcee"},
                    {"handle":2,"nick":"bee","username":"bee"},
                    {"handle":3,"nick":"guest-1"}]}"#,
            ),
            &mut registry,
            &mut room,
        )
        .unwrap();

        match event {
            Some(Event::Userlist(users)) => {
                assert_eq!(users.len(), 2);
                assert!(users.iter().all(|user| !user.is_client));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_media_play_with_absent_user() {
        let (mut registry, mut room) = state();
        let event = route(
            &frame(
                r#"{"type":"media_play",
                   "item":{"id":"dQw4w9WgXcQ","duration":212.0,"title":"a song"}}"#,
            ),
            &mut registry,
            &mut room,
        )
        .unwrap();
        match event {
            Some(Event::MediaPlay {
                user, is_response, ..
            }) => {
                assert!(user.is_none());
                assert!(!is_response);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_is_forwarded_by_name() {
        let (mut registry, mut room) = state();
        let event = route(
            &frame(r#"{"type":"gift","amount":5}"#),
            &mut registry,
            &mut room,
        )
        .unwrap();
        match event {
            Some(Event::Unrouted { name, payload }) => {
                assert_eq!(name, "gift");
                assert_eq!(payload["amount"], 5);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        let (mut registry, mut room) = state();
        let result = route(
            &frame(r#"{"type":"join","nick":"no-handle"}"#),
            &mut registry,
            &mut room,
        );
        assert!(result.is_err());
    }
}
