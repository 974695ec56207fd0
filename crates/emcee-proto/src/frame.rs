//! Inbound frame envelope.
//!
//! Every frame the server sends is a JSON object with a `type` field naming
//! the event and, for frames answering a client request, a `seq` field
//! echoing the client's sequence number. The remaining fields are the event
//! payload and are decoded lazily through [`Frame::payload`].

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ProtoError, Result};

/// A decoded frame envelope: event name, optional echoed sequence number,
/// and the raw payload object.
#[derive(Debug, Clone)]
pub struct Frame {
    kind: String,
    seq: Option<i64>,
    payload: Value,
}

impl Frame {
    /// Parse a frame from raw message text.
    pub fn parse(raw: &str) -> Result<Frame> {
        let value: Value = serde_json::from_str(raw)?;
        let object = value.as_object().ok_or(ProtoError::NotAnObject)?;

        let kind = match object.get("type") {
            None => return Err(ProtoError::MissingKind),
            Some(Value::String(kind)) => kind.clone(),
            Some(_) => return Err(ProtoError::NonStringKind),
        };
        let seq = object.get("seq").and_then(Value::as_i64);

        Ok(Frame {
            kind,
            seq,
            payload: value,
        })
    }

    /// The event name carried in the `type` field.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The echoed request sequence number, when present.
    pub fn seq(&self) -> Option<i64> {
        self.seq
    }

    /// True when this frame answers a request the client made: a `seq`
    /// field is present and non-negative.
    pub fn is_response(&self) -> bool {
        matches!(self.seq, Some(seq) if seq > -1)
    }

    /// Decode the payload into a typed struct.
    ///
    /// The envelope fields (`type`, `seq`) are part of the same object and
    /// are simply ignored by payload types that do not name them.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.payload.clone()).map_err(|source| ProtoError::Payload {
            kind: self.kind.clone(),
            source,
        })
    }

    /// The raw payload object, for events the caller routes untyped.
    pub fn raw(&self) -> &Value {
        &self.payload
    }
}

impl FromStr for Frame {
    type Err = ProtoError;

    fn from_str(raw: &str) -> Result<Frame> {
        Frame::parse(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_frame() {
        let frame = Frame::parse(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(frame.kind(), "ping");
        assert_eq!(frame.seq(), None);
        assert!(!frame.is_response());
    }

    #[test]
    fn test_parse_frame_with_seq() {
        let frame = Frame::parse(r#"{"type":"password","seq":1}"#).unwrap();
        assert_eq!(frame.kind(), "password");
        assert_eq!(frame.seq(), Some(1));
        assert!(frame.is_response());
    }

    #[test]
    fn test_negative_seq_is_not_a_response() {
        let frame = Frame::parse(r#"{"type":"media_play","seq":-1}"#).unwrap();
        assert!(!frame.is_response());
    }

    #[test]
    fn test_rejects_invalid_envelopes() {
        assert!(matches!(Frame::parse("[1,2]"), Err(ProtoError::NotAnObject)));
        assert!(matches!(
            Frame::parse(r#"{"text":"hi"}"#),
            Err(ProtoError::MissingKind)
        ));
        assert!(matches!(
            Frame::parse(r#"{"type":7}"#),
            Err(ProtoError::NonStringKind)
        ));
        assert!(matches!(Frame::parse("not json"), Err(ProtoError::Json(_))));
    }

    #[test]
    fn test_typed_payload_ignores_envelope() {
        #[derive(serde::Deserialize)]
        struct Text {
            text: String,
        }

        let frame = Frame::parse(r#"{"type":"msg","seq":4,"text":"hello","handle":12}"#).unwrap();
        let text: Text = frame.payload().unwrap();
        assert_eq!(text.text, "hello");
    }

    #[test]
    fn test_payload_error_names_event() {
        #[derive(serde::Deserialize)]
        struct Strict {
            #[allow(dead_code)]
            handle: u64,
        }

        let frame = Frame::parse(r#"{"type":"quit"}"#).unwrap();
        let err = frame.payload::<Strict>().unwrap_err();
        assert!(err.to_string().contains("`quit`"));
    }
}
