//! Error types for the wire protocol library.
//!
//! Frame decoding is deliberately forgiving: a malformed frame yields a
//! [`ProtoError`] the caller can log and skip, never a hard failure of the
//! whole connection.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtoError`].
pub type Result<T, E = ProtoError> = std::result::Result<T, E>;

/// Errors produced while decoding inbound frames.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtoError {
    /// The frame was not valid JSON at all.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame decoded to something other than a JSON object.
    #[error("frame is not a json object")]
    NotAnObject,

    /// The frame object carries no `type` discriminator.
    #[error("frame has no `type` field")]
    MissingKind,

    /// The frame's `type` field is not a string.
    #[error("frame `type` field is not a string")]
    NonStringKind,

    /// The event payload did not match the expected shape.
    #[error("malformed `{kind}` payload: {source}")]
    Payload {
        /// The event name the payload belongs to.
        kind: String,
        /// The underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },
}

impl ProtoError {
    /// True when the error concerns a single payload rather than the
    /// frame envelope itself.
    pub fn is_payload(&self) -> bool {
        matches!(self, ProtoError::Payload { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtoError::MissingKind;
        assert_eq!(format!("{}", err), "frame has no `type` field");

        let bad = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ProtoError::Payload {
            kind: "join".to_string(),
            source: bad,
        };
        assert!(format!("{}", err).starts_with("malformed `join` payload"));
        assert!(err.is_payload());
    }

    #[test]
    fn test_error_source_chaining() {
        let bad = serde_json::from_str::<serde_json::Value>("[").unwrap_err();
        let err = ProtoError::Payload {
            kind: "ban".to_string(),
            source: bad,
        };
        assert!(std::error::Error::source(&err).is_some());
    }
}
