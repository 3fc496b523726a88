//! Datagram Transport
//!
//! Moves envelopes over UDP. UDP gives no ordering, no deduplication and no delivery
//! guarantee, so this layer is responsible for:
//! - **Sending**: a request as one datagram, a response as one datagram per fragment.
//! - **Reassembly**: buffering fragments per `(sender, request id)` until the response is
//!   complete, regardless of arrival order or duplicates.
//! - **Timeouts**: abandoning incomplete responses and reporting the server as unavailable.
//!
//! ## Submodules
//! - **`datagram`**: server-side send path and the shared error type.
//! - **`reassembly`**: the fragment reassembly buffer.
//! - **`client`**: request/response exchange used by the client.

pub mod client;
pub mod datagram;
pub mod reassembly;

pub use client::UdpClient;
pub use datagram::{MAX_DATAGRAM, TransportError, send_response};
pub use reassembly::Reassembler;
