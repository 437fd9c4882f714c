use thiserror::Error;
use tonic::{Code, Status};

use crate::ResourceId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// ErrChannelClosed indicates an operation executed after the channel
    /// has already been closed.
    #[error("channel closed")]
    ErrChannelClosed,

    /// ErrChannelReadOnly indicates a write or truncate attempted on a read
    /// channel.
    #[error("channel is read-only")]
    ErrChannelReadOnly,

    /// ErrObjectNotFound indicates the store reported that the object (or
    /// the pinned generation of it) does not exist.
    #[error("object not found: gs://{bucket}/{object}")]
    ErrObjectNotFound { bucket: String, object: String },

    /// ErrPositionOutOfRange indicates a seek target outside `[0, size)`.
    #[error("position {position} out of range for {resource} of size {size}")]
    ErrPositionOutOfRange {
        position: u64,
        size: u64,
        resource: String,
    },

    /// ErrChecksumMismatch indicates a chunk whose computed CRC32-C disagrees
    /// with the value the server attached to it.
    #[error("checksum mismatch in chunk of {resource}: server sent {expected:#010x}, computed {actual:#010x}")]
    ErrChecksumMismatch {
        expected: u32,
        actual: u32,
        resource: String,
    },

    /// ErrContentEncodingNotSupported indicates an object stored with a
    /// content encoding the channel does not inflate.
    #[error("unsupported content encoding {encoding:?} on {resource}")]
    ErrContentEncodingNotSupported { encoding: String, resource: String },

    /// ErrReadPastEnd indicates the store reported a read beyond the end of
    /// the pinned generation.
    #[error("read past end of {resource}")]
    ErrReadPastEnd { resource: String },

    /// ErrPrematureEndOfStream indicates a media stream that ended cleanly
    /// without yielding a single byte while more bytes were expected.
    #[error("stream for {resource} ended before any data at offset {position}")]
    ErrPrematureEndOfStream { position: u64, resource: String },

    /// ErrTransport wraps a non-retryable or retry-exhausted transport
    /// status.
    #[error("transport failure on {resource}: {source}")]
    ErrTransport {
        resource: String,
        #[source]
        source: Status,
    },

    /// ErrConnect indicates the underlying gRPC channel could not be
    /// established.
    #[error("connect failed: {0}")]
    ErrConnect(#[from] tonic::transport::Error),
}

impl Error {
    /// Translates a transport status into the matching domain error. Every
    /// message names the resource the channel is bound to.
    pub(crate) fn from_status(status: Status, resource: &ResourceId) -> Self {
        match status.code() {
            Code::NotFound => Error::ErrObjectNotFound {
                bucket: resource.bucket.clone(),
                object: resource.object.clone(),
            },
            Code::OutOfRange => Error::ErrReadPastEnd {
                resource: resource.to_string(),
            },
            _ => Error::ErrTransport {
                resource: resource.to_string(),
                source: status,
            },
        }
    }
}

/// Whether a status is worth another attempt at this layer. Codes that the
/// conversion step turns into domain errors are final; everything else is
/// assumed transient.
pub(crate) fn is_retryable(code: Code) -> bool {
    !matches!(
        code,
        Code::NotFound
            | Code::OutOfRange
            | Code::InvalidArgument
            | Code::PermissionDenied
            | Code::Unauthenticated
    )
}
