//! Client-side room state.
//!
//! The registry owns user and ban records for one connection; the room
//! profile tracks what the server pushes about the room itself.

mod registry;
mod room;
mod user;

pub use registry::UserRegistry;
pub use room::RoomProfile;
pub use user::{
    BannedUser, MessageKind, Profile, User, UserLevel, UserMessage, MAX_USER_MESSAGES,
};
