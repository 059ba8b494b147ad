//! Length-prefixed codec for TCP framing
//!
//! Every frame on a device link is:
//! ```text
//! [ 4 bytes: length (u32, big-endian) ][ N bytes: protobuf Envelope ]
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use prost::Message;
use thiserror::Error;

use crate::Envelope;

/// Upper bound for a single frame. Heartbeats are a few hundred bytes; anything
/// near this size is a corrupt or hostile peer.
pub const MAX_FRAME_LEN: u32 = 1024 * 1024;

const PREFIX_LEN: usize = 4;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Frame too large: {0} bytes (max: {MAX_FRAME_LEN})")]
    FrameTooLarge(usize),

    #[error("Invalid frame length prefix: {0}")]
    InvalidLength(u32),

    #[error("Protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Protobuf encode error: {0}")]
    Encode(#[from] prost::EncodeError),
}

/// Encode an Envelope into a length-prefixed frame
pub fn encode(envelope: &Envelope) -> Result<Bytes, CodecError> {
    let body_len = envelope.encoded_len();
    if body_len > MAX_FRAME_LEN as usize {
        return Err(CodecError::FrameTooLarge(body_len));
    }

    let mut buf = BytesMut::with_capacity(PREFIX_LEN + body_len);
    buf.put_u32(body_len as u32);
    envelope.encode(&mut buf)?;

    Ok(buf.freeze())
}

/// Try to decode one length-prefixed Envelope from the front of `buf`.
///
/// Returns `Ok(None)` without consuming anything when the frame is incomplete.
pub fn decode(buf: &mut BytesMut) -> Result<Option<Envelope>, CodecError> {
    if buf.len() < PREFIX_LEN {
        return Ok(None);
    }

    let body_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if body_len > MAX_FRAME_LEN {
        return Err(CodecError::InvalidLength(body_len));
    }

    if buf.len() < PREFIX_LEN + body_len as usize {
        return Ok(None);
    }

    buf.advance(PREFIX_LEN);
    let body = buf.split_to(body_len as usize);

    Ok(Some(Envelope::decode(body)?))
}

/// Accumulates bytes read from a socket and yields complete frames
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Add data read from the link
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Decode the next complete frame, if any.
    ///
    /// Call repeatedly until it returns `Ok(None)` to drain the buffer.
    pub fn decode_next(&mut self) -> Result<Option<Envelope>, CodecError> {
        decode(&mut self.buffer)
    }

    /// Bytes still waiting for the rest of their frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
