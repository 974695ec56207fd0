//! Integration test common infrastructure.
//!
//! Stands up the services emcee dials at startup (room directory, websocket
//! room server) and spawns the built binary against them.

#![allow(dead_code)]

pub mod room;

#[allow(unused_imports)]
pub use room::{MockRoom, RoomConn};
