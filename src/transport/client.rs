//! Client side of the request/response exchange.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;

use super::datagram::{MAX_DATAGRAM, TransportError};
use super::reassembly::Reassembler;
use crate::protocol::{Fragment, Request, Response, decode, encode};

pub struct UdpClient {
    socket: UdpSocket,
    server: SocketAddr,
    timeout: Duration,
    reassembler: Reassembler,
}

impl UdpClient {
    /// Binds an ephemeral local socket for talking to `server`.
    pub async fn connect(server: SocketAddr, timeout: Duration) -> Result<Self, TransportError> {
        let local = if server.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(local).await?;
        tracing::debug!("Client socket bound to {}", socket.local_addr()?);

        Ok(Self {
            socket,
            server,
            timeout,
            reassembler: Reassembler::new(timeout),
        })
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    /// Sends `request` and waits for the complete response.
    ///
    /// The request goes out under a fresh request id; fragments carrying any other id
    /// are answers to earlier, abandoned exchanges and are dropped. Fails with
    /// [`TransportError::ServerUnavailable`] when no complete response arrives within the
    /// configured timeout.
    pub async fn exchange(&mut self, request: &Request) -> Result<Response, TransportError> {
        self.reassembler.evict_expired(Instant::now());

        let mut request = request.clone();
        request.request_id = rand::random::<i32>();
        let expected = request.request_id;

        let bytes = encode(&request)?;
        if bytes.len() > MAX_DATAGRAM {
            return Err(TransportError::RequestTooLarge(bytes.len()));
        }

        self.socket.send_to(&bytes, self.server).await?;
        tracing::debug!(
            "Sent {} #{} ({} bytes) to {}",
            request.command,
            expected,
            bytes.len(),
            self.server
        );

        let deadline = Instant::now() + self.timeout;
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let received =
                match tokio::time::timeout(remaining, self.socket.recv_from(&mut buf)).await {
                    Ok(received) => received?,
                    Err(_) => {
                        return Err(TransportError::ServerUnavailable {
                            server: self.server,
                            waited: self.timeout,
                        });
                    }
                };
            let (len, from) = received;

            if from != self.server {
                tracing::warn!("Ignoring datagram from unexpected peer {}", from);
                continue;
            }

            let fragment = match Fragment::decode(&buf[..len]) {
                Ok(fragment) => fragment,
                Err(e) => {
                    tracing::warn!("Dropping undecodable fragment from {}: {}", from, e);
                    continue;
                }
            };

            if fragment.request_id != expected {
                tracing::debug!(
                    "Dropping stale fragment of response #{} while waiting for #{}",
                    fragment.request_id,
                    expected
                );
                continue;
            }

            if let Some(payload) = self.reassembler.accept(from, fragment) {
                return Ok(decode(&payload)?);
            }
        }
    }
}
