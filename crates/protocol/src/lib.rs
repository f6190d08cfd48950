//! Register protocol for the USB2LPT parallel-port adapter
//!
//! The adapter exposes its parallel-port registers through a pair of bulk
//! endpoints. Every command is a tiny byte frame:
//!
//! ```text
//! write: [address, value]
//! read:  [address | 0x10]   -> device answers with one byte on the IN endpoint
//! ```
//!
//! Several write frames may be concatenated into one payload; payloads are
//! split into bulk transfers of at most [`MAX_TRANSFER_SIZE`] bytes with no
//! framing between chunks.
//!
//! # Example
//!
//! ```
//! use protocol::{Register, encode_pairs, encode_write, chunks};
//!
//! assert_eq!(encode_write(Register::Data.address(), 0xff), [0x00, 0xff]);
//!
//! let burst = encode_pairs((0..=255u8).map(|i| (Register::Data.address(), i)));
//! assert_eq!(burst.len(), 512);
//! assert_eq!(chunks(&burst).count(), 8);
//! ```

pub mod codec;
pub mod error;
pub mod register;

pub use codec::{
    MAX_TRANSFER_SIZE, READ_FLAG, chunk_count, chunks, decode_read_response, encode_pairs,
    encode_read, encode_write,
};
pub use error::{ProtocolError, Result};
pub use register::Register;
