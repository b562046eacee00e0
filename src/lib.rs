//! Bidirectional codec for the MQTT-SN wire protocol.
//!
//! The decoder half is an incremental state machine: feed it bytes in chunks
//! of any size and drain packets and per-frame errors from its event queue.
//! The encoder half is a pure function from a [`Packet`] to its exact wire
//! bytes. Transport I/O, retransmission and session state live above this
//! crate.

mod decoder;
mod encoder;
mod error;
mod packet;
pub mod protocol;

pub use decoder::{DecodeEvent, Decoder};
pub use encoder::encode;
pub use error::CodecError;
pub use packet::{Packet, TopicId};
pub use protocol::{CommandKind, ReturnCode, Role, TopicIdType};
