//! Playlist and track state.

mod playlist;
mod track;

pub use playlist::{DeleteSummary, Playlist};
pub use track::Track;
