#![warn(rust_2018_idioms)]
#![allow(dead_code)]

//! Seekable streaming reads over a gRPC object store.
//!
//! The store serves object content through a server-streaming media RPC that
//! delivers a range of an object as a sequence of chunks. [`ReadChannel`]
//! turns that push-style stream into a pull-style, seekable byte channel: it
//! pins one object generation at open time, coalesces many small positional
//! reads onto a single open stream, absorbs small forward seeks by discarding
//! in-flight bytes, reconnects transparently after transient transport
//! failures, and optionally verifies the CRC32-C the server attaches to each
//! chunk.

pub mod backoff;
pub mod channel;
mod chunk;
pub mod error;
mod opener;
pub mod options;
pub mod proto;
mod session;
pub mod stub;

use std::fmt;

pub use backoff::BackoffPolicy;
pub use channel::ReadChannel;
pub use error::{Error, Result};
pub use options::{Fadvise, ReadOptions};
pub use stub::{
    ChunkLease, GrpcStubProvider, MediaStream, ObjectChunk, StorageStub, StubProvider,
};

/// Names one object in one bucket. Immutable for a channel's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    pub bucket: String,
    pub object: String,
}

impl ResourceId {
    pub fn new(bucket: impl Into<String>, object: impl Into<String>) -> Self {
        ResourceId {
            bucket: bucket.into(),
            object: object.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.object)
    }
}
