//! Error types for the socket core.
//!
//! `UdsError` is the single error type returned by every fallible entry
//! point in the crate. Variants map directly onto the POSIX errno families
//! a UNIX domain socket driver needs to surface; `Display` renders the short
//! name a dispatcher would log or translate back into an errno.

use core::fmt;

/// Errors returned directly by the socket core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UdsError {
    /// Minor number out of range.
    NoSuchDevice,
    /// Slot is not `INUSE` (stale or already-closed minor).
    InvalidArgument,
    /// No free slot on `open`.
    NoFile,
    /// Ring buffer allocation failed.
    OutOfMemory,
    /// Half shut down, or writing to a peer whose read half is closed.
    BrokenPipe,
    /// Stream/seqpacket operation on a disconnected socket.
    NotConnected,
    /// Deferred once after the peer reset; cleared after delivery.
    ConnectionReset,
    /// Datagram or seqpacket payload larger than `BUF_CAP`.
    MessageSize,
    /// Datagram addressed to an unbound name.
    NoEntry,
    /// Cancelled non-blocking connect.
    InProgress,
    /// Cancelled non-blocking read/write.
    Again,
    /// Explicit cancel of a parked request.
    Interrupted,
}

impl fmt::Display for UdsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UdsError::NoSuchDevice => write!(f, "ENXIO: no such device"),
            UdsError::InvalidArgument => write!(f, "EINVAL: invalid argument"),
            UdsError::NoFile => write!(f, "ENFILE: no free socket slot"),
            UdsError::OutOfMemory => write!(f, "ENOMEM: ring buffer allocation failed"),
            UdsError::BrokenPipe => write!(f, "EPIPE: broken pipe"),
            UdsError::NotConnected => write!(f, "ENOTCONN: socket not connected"),
            UdsError::ConnectionReset => write!(f, "ECONNRESET: connection reset by peer"),
            UdsError::MessageSize => write!(f, "EMSGSIZE: message too long"),
            UdsError::NoEntry => write!(f, "ENOENT: no such datagram destination"),
            UdsError::InProgress => write!(f, "EINPROGRESS: operation now in progress"),
            UdsError::Again => write!(f, "EAGAIN: resource temporarily unavailable"),
            UdsError::Interrupted => write!(f, "EINTR: interrupted system call"),
        }
    }
}

/// Convenience result alias for socket core operations.
pub type Result<T> = core::result::Result<T, UdsError>;
