use crate::protocol::CommandKind;
use thiserror::Error;

/// Errors raised by either half of the codec.
///
/// Decode errors are delivered through the decoder's event queue and never
/// halt the run loop; encode errors are returned synchronously and the whole
/// output must be discarded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("wrong packet length for {cmd}: {length} byte payload")]
    LengthMismatch { cmd: CommandKind, length: usize },
    #[error("cannot read {0}")]
    TruncatedField(&'static str),
    #[error("invalid {field} value: {value:#04x}")]
    InvalidEnum { field: &'static str, value: u8 },
    #[error("unsupported command code: {0}")]
    UnsupportedCommand(u8),
    #[error("nested encapsulated message is not supported")]
    NestedEncapsulation,
    #[error("cannot encode packet: {0}")]
    EncodeInvalidField(&'static str),
}
