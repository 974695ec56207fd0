//! Server close codes.
//!
//! The server terminates a session by sending a `closed` frame carrying an
//! integer code. Two of the codes are transient (the client is expected to
//! reconnect); all others end the session for good until a fresh connect is
//! requested.

use std::fmt;

/// A decoded server close code.
///
/// Codes 9, 10 and 11 are emitted by the server without a documented
/// meaning; they are kept distinct from codes outside the table entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// 0 - the server believes the client has no internet connection.
    NoInternet,
    /// 1 - the room has no free user slots.
    RoomFull,
    /// 2 - the room was closed by an administrator.
    RoomClosed,
    /// 3 - generic close.
    Generic,
    /// 4 - the client is banned from the room.
    Banned,
    /// 5 - ambiguous server-side condition; reconnecting resolves it.
    Retry,
    /// 6 - the same account signed in from somewhere else.
    DuplicateLogin,
    /// 7 - the server failed while setting up the connection.
    ConnectError,
    /// 8 - password or captcha prompt timed out (~60s server-side).
    PromptTimeout,
    /// 9, 10 or 11 - unspecified server condition.
    Unspecified(u16),
    /// 12 - a moderator kicked the client.
    Kicked,
    /// 22 - the room requires a verified, adult account.
    AgeVerification,
    /// Any code not in the table.
    Unknown(u16),
}

impl CloseCode {
    /// Decode a raw close code.
    pub fn from_code(code: u16) -> CloseCode {
        match code {
            0 => CloseCode::NoInternet,
            1 => CloseCode::RoomFull,
            2 => CloseCode::RoomClosed,
            3 => CloseCode::Generic,
            4 => CloseCode::Banned,
            5 => CloseCode::Retry,
            6 => CloseCode::DuplicateLogin,
            7 => CloseCode::ConnectError,
            8 => CloseCode::PromptTimeout,
            9..=11 => CloseCode::Unspecified(code),
            12 => CloseCode::Kicked,
            22 => CloseCode::AgeVerification,
            other => CloseCode::Unknown(other),
        }
    }

    /// The raw integer code.
    pub fn code(&self) -> u16 {
        match self {
            CloseCode::NoInternet => 0,
            CloseCode::RoomFull => 1,
            CloseCode::RoomClosed => 2,
            CloseCode::Generic => 3,
            CloseCode::Banned => 4,
            CloseCode::Retry => 5,
            CloseCode::DuplicateLogin => 6,
            CloseCode::ConnectError => 7,
            CloseCode::PromptTimeout => 8,
            CloseCode::Unspecified(code) => *code,
            CloseCode::Kicked => 12,
            CloseCode::AgeVerification => 22,
            CloseCode::Unknown(code) => *code,
        }
    }

    /// True for codes where the client is expected to reconnect
    /// automatically (5 and 12).
    pub fn should_reconnect(&self) -> bool {
        matches!(self, CloseCode::Retry | CloseCode::Kicked)
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseCode::NoInternet => write!(f, "there is no internet connection"),
            CloseCode::RoomFull => write!(f, "the room has no free slots for users"),
            CloseCode::RoomClosed => write!(f, "the room has been closed by an administrator"),
            CloseCode::Generic => write!(f, "closed with code 3"),
            CloseCode::Banned => write!(f, "banned from the room"),
            CloseCode::Retry => write!(f, "transient close, reconnecting (code 5)"),
            CloseCode::DuplicateLogin => write!(f, "account signed in from another session"),
            CloseCode::ConnectError => write!(f, "server error while connecting"),
            CloseCode::PromptTimeout => write!(f, "password or captcha prompt timed out"),
            CloseCode::Unspecified(code) => write!(f, "unspecified close, code {}", code),
            CloseCode::Kicked => write!(f, "kicked by a moderator"),
            CloseCode::AgeVerification => {
                write!(f, "the room requires a verified account and age 18+")
            }
            CloseCode::Unknown(code) => write!(f, "connection closed, code {}", code),
        }
    }
}
