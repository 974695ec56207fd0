//! # emcee-proto
//!
//! Wire protocol types for the emcee chat room client.
//!
//! The protocol is JSON over a single WebSocket connection. Every frame in
//! either direction is one JSON object with a `type` field naming the event;
//! outbound frames additionally carry a strictly increasing `seq` number,
//! which the server echoes on frames that answer a request.
//!
//! This crate holds the pure data layer: envelope parsing, typed payloads,
//! outbound message encoding and the server close-code table. Connection
//! policy (reconnects, keepalive, sequencing) lives in the client.
//!
//! ## Quick start
//!
//! ```rust
//! use emcee_proto::{Frame, Outbound, payload::ChatPayload};
//!
//! let frame = Frame::parse(r#"{"type":"msg","handle":7,"text":"hi"}"#).unwrap();
//! assert_eq!(frame.kind(), "msg");
//! let chat: ChatPayload = frame.payload().unwrap();
//! assert_eq!(chat.text, "hi");
//!
//! let pong = Outbound::Pong.encode(1);
//! assert!(pong.contains(r#""type":"pong""#));
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod close;
pub mod error;
pub mod frame;
pub mod outbound;
pub mod payload;

pub use self::close::CloseCode;
pub use self::error::{ProtoError, Result};
pub use self::frame::Frame;
pub use self::outbound::Outbound;
