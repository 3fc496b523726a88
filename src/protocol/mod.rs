//! Wire Protocol
//!
//! Everything that crosses the network between the client and the server.
//!
//! ## Layers
//! - **Envelopes** (`types`): `Request` carries a command, its typed payload and the caller's
//!   credentials; `Response` carries tagged text segments routed to the console or to a
//!   transcript file.
//! - **Codec** (`codec`): serializes envelopes to bytes with `bincode`.
//! - **Fragments** (`fragment`): responses larger than one chunk are split into numbered
//!   datagrams behind a 12-byte header and reassembled by the peer.
//!
//! Requests are always sent as a single datagram; only responses are fragmented.

pub mod codec;
pub mod fragment;
pub mod types;

pub use codec::{ProtocolError, decode, encode};
pub use fragment::{DEFAULT_CHUNK_SIZE, FRAME_HEADER_LEN, FrameError, Fragment};
pub use types::{
    CommandId, Payload, PayloadKind, Request, Response, ResponseStatus, Segment, Tag,
};
