use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;

use crate::protocol::{ProtocolError, Response, encode, fragment};

/// Largest datagram either side will read.
pub const MAX_DATAGRAM: usize = 65_535;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server {server} did not answer within {waited:?}")]
    ServerUnavailable { server: SocketAddr, waited: Duration },

    #[error("request of {0} bytes does not fit in one datagram")]
    RequestTooLarge(usize),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl TransportError {
    /// Transport failures never end a session; the operator may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Io(_) | TransportError::ServerUnavailable { .. }
        )
    }
}

/// Encodes `response`, splits it into fragments tagged with `request_id` and sends each
/// as one datagram to `dest`.
///
/// Returns the number of fragments sent.
pub async fn send_response(
    socket: &UdpSocket,
    dest: SocketAddr,
    request_id: i32,
    response: &Response,
    chunk_size: usize,
) -> Result<usize, TransportError> {
    let bytes = encode(response)?;
    let fragments = fragment::split_with_id(request_id, &bytes, chunk_size);

    for frag in &fragments {
        socket.send_to(&frag.encode(), dest).await?;
    }

    tracing::debug!(
        "Sent response of {} bytes to {} in {} fragment(s)",
        bytes.len(),
        dest,
        fragments.len()
    );

    Ok(fragments.len())
}
