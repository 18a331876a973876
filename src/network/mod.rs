//! Wire layer: the frame codec and the TCP plumbing under it.
//!
//! A frame is a 5-byte header (type, checksum, size) plus an optional
//! UTF-8 payload. `Connection` owns the write side of one socket; the
//! reader loop owns the read side and feeds decoded frames back to the
//! session through a channel.

pub use connection::Connection;
pub use frame::{Frame, FrameType, HEADER_SIZE};
pub(crate) use reader::spawn_reader;

mod connection;
mod frame;
mod reader;
