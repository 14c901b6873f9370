//! Error types shared by the codec, the server and the client.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::protocol::RefusalCause;

/// Everything that can go wrong while speaking the protocol.
///
/// Transport failures (`Io`, `WriteFailure`, `ShortRead`) and protocol
/// violations abort the exchange. `Refused` is the client-side view of a
/// well-formed refusal sent by the server.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown request type: {0}")]
    UnknownRequestType(u16),

    #[error("unknown response type: {0}")]
    UnknownResponseType(u16),

    #[error("unexpected response type: expected {expected}, got {actual}")]
    UnexpectedResponseType { expected: u16, actual: u16 },

    #[error("unknown refusal cause: {0}")]
    UnknownRefusalCause(u32),

    #[error("message truncated")]
    TruncatedMessage,

    #[error("filename too long: {0} bytes (max {max})", max = u16::MAX)]
    FilenameTooLong(usize),

    #[error("filename contains the delimiter byte")]
    InvalidFilename,

    #[error("filenames payload too large: {0} bytes")]
    PayloadTooLarge(u64),

    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: u64, actual: u64 },

    #[error("write failed: {0}")]
    WriteFailure(#[source] io::Error),

    #[error("request refused: {0}")]
    Refused(RefusalCause),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// Map an error from a fixed-size read. Running out of bytes mid-message
    /// is a protocol violation, anything else stays a transport error.
    pub(crate) fn from_read(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            ProtocolError::TruncatedMessage
        } else {
            ProtocolError::Io(err)
        }
    }

    /// The refusal cause, if the server turned the request down.
    pub fn refusal(&self) -> Option<RefusalCause> {
        match self {
            ProtocolError::Refused(cause) => Some(*cause),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Failure while building the file index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("cannot read directory {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("filename contains the delimiter byte: {0:?}")]
    InvalidName(String),
}

/// Failure while mapping a server filename onto local storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("refusing to store unsafe filename {0:?}")]
    UnsafeFilename(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}
