//! Response fragment framing.
//!
//! # Wire format
//!
//! All integers are **big-endian** signed 32-bit values.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          Request Id                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Total Fragments                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                  Payload (up to chunk size) ...               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Every fragment of one response shares the request id and the total.

use thiserror::Error;

pub const FRAME_HEADER_LEN: usize = 12;
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

const OFF_REQUEST_ID: usize = 0;
const OFF_SEQUENCE: usize = 4;
const OFF_TOTAL: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("datagram of {0} bytes is shorter than the fragment header")]
    BufferTooShort(usize),

    #[error("total fragment count {0} is not positive")]
    InvalidTotal(i32),

    #[error("sequence number {sequence} outside 0..{total}")]
    SequenceOutOfRange { sequence: i32, total: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub request_id: i32,
    pub sequence: i32,
    pub total: i32,
    pub payload: Vec<u8>,
}

impl Fragment {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; FRAME_HEADER_LEN + self.payload.len()];
        buf[OFF_REQUEST_ID..OFF_REQUEST_ID + 4].copy_from_slice(&self.request_id.to_be_bytes());
        buf[OFF_SEQUENCE..OFF_SEQUENCE + 4].copy_from_slice(&self.sequence.to_be_bytes());
        buf[OFF_TOTAL..OFF_TOTAL + 4].copy_from_slice(&self.total.to_be_bytes());
        buf[FRAME_HEADER_LEN..].copy_from_slice(&self.payload);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < FRAME_HEADER_LEN {
            return Err(FrameError::BufferTooShort(buf.len()));
        }

        let read_i32 = |off: usize| i32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]]);
        let request_id = read_i32(OFF_REQUEST_ID);
        let sequence = read_i32(OFF_SEQUENCE);
        let total = read_i32(OFF_TOTAL);

        if total <= 0 {
            return Err(FrameError::InvalidTotal(total));
        }
        if sequence < 0 || sequence >= total {
            return Err(FrameError::SequenceOutOfRange { sequence, total });
        }

        Ok(Self {
            request_id,
            sequence,
            total,
            payload: buf[FRAME_HEADER_LEN..].to_vec(),
        })
    }
}

/// Splits `payload` into `ceil(len / chunk_size)` fragments (at least one).
pub fn split_with_id(request_id: i32, payload: &[u8], chunk_size: usize) -> Vec<Fragment> {
    let chunk_size = chunk_size.max(1);
    if payload.is_empty() {
        return vec![Fragment {
            request_id,
            sequence: 0,
            total: 1,
            payload: Vec::new(),
        }];
    }

    let total = payload.len().div_ceil(chunk_size) as i32;
    payload
        .chunks(chunk_size)
        .enumerate()
        .map(|(sequence, chunk)| Fragment {
            request_id,
            sequence: sequence as i32,
            total,
            payload: chunk.to_vec(),
        })
        .collect()
}
