//! Register frame encoding and bulk chunking
//!
//! # Frame Format
//!
//! ```text
//! write: [address: u8][value: u8]
//! read:  [address | READ_FLAG: u8]
//! ```
//!
//! The hardware accepts at most [`MAX_TRANSFER_SIZE`] bytes per bulk
//! transaction and reassembles a longer payload purely by byte count, so
//! chunks carry no headers and must be sent in order.

use crate::error::{ProtocolError, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Bit set in the address byte to request a register read
pub const READ_FLAG: u8 = 0x10;

/// Largest payload accepted in a single bulk transfer
pub const MAX_TRANSFER_SIZE: usize = 64;

/// Encode a single register write
///
/// # Example
/// ```
/// use protocol::encode_write;
///
/// assert_eq!(encode_write(2, 0x04), [0x02, 0x04]);
/// ```
pub fn encode_write(address: u8, value: u8) -> [u8; 2] {
    [address, value]
}

/// Encode a single register read request
///
/// # Example
/// ```
/// use protocol::encode_read;
///
/// assert_eq!(encode_read(1), [0x11]);
/// assert_eq!(encode_read(0x12), [0x12]);
/// ```
pub fn encode_read(address: u8) -> [u8; 1] {
    [address | READ_FLAG]
}

/// Extract the register value from a read response
pub fn decode_read_response(response: &[u8]) -> Result<u8> {
    response
        .first()
        .copied()
        .ok_or(ProtocolError::ShortResponse {
            expected: 1,
            actual: 0,
        })
}

/// Encode a sequence of `(address, value)` writes as one flat payload
pub fn encode_pairs<I>(pairs: I) -> Bytes
where
    I: IntoIterator<Item = (u8, u8)>,
{
    let pairs = pairs.into_iter();
    let mut buf = BytesMut::with_capacity(pairs.size_hint().0 * 2);
    for (address, value) in pairs {
        buf.put_slice(&encode_write(address, value));
    }
    buf.freeze()
}

/// Split a payload into bulk-transfer sized chunks, in order
pub fn chunks(payload: &[u8]) -> std::slice::Chunks<'_, u8> {
    payload.chunks(MAX_TRANSFER_SIZE)
}

/// Number of bulk transfers needed for a payload of `len` bytes
pub fn chunk_count(len: usize) -> usize {
    len.div_ceil(MAX_TRANSFER_SIZE)
}
