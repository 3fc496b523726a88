//! Envelope serialization.
//!
//! Both envelopes go through the same `bincode` configuration: fixed-width integers,
//! an upper bound on the decoded size, and no trailing bytes, so a truncated or padded
//! datagram is reported instead of silently accepted.

use bincode::Options;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Upper bound on an encoded envelope. Guards decode against hostile length prefixes.
pub const MAX_ENVELOPE_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("failed to encode envelope: {0}")]
    Encode(String),
}

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_ENVELOPE_BYTES)
        .reject_trailing_bytes()
}

pub fn encode<T: Serialize>(envelope: &T) -> Result<Vec<u8>, ProtocolError> {
    options()
        .serialize(envelope)
        .map_err(|e| ProtocolError::Encode(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    options()
        .deserialize(bytes)
        .map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))
}
