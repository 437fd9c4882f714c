use std::time::Duration;

use crate::backoff::BackoffPolicy;

/// Access-pattern hint, in the POSIX `fadvise` sense.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Fadvise {
    /// Reads walk the object front to back; streams run open-ended to the
    /// end of the object.
    Sequential,
    /// Reads jump around; every stream is a bounded range request.
    Random,
    /// Start sequential, switch to `Random` for good once a non-trivial
    /// seek is observed.
    #[default]
    Auto,
}

/// Tuning knobs for a [`ReadChannel`](crate::ReadChannel).
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Expected access pattern.
    pub fadvise: Fadvise,

    /// Largest forward seek absorbed by discarding bytes from the open
    /// stream instead of issuing a new request.
    pub inplace_seek_limit: u64,

    /// Floor for the range length of requests issued in random-access mode.
    pub min_range_request_size: u64,

    /// Deadline for each media (streaming) call.
    pub read_timeout: Duration,

    /// Deadline for the metadata call made at open time.
    pub metadata_timeout: Duration,

    /// Verify the CRC32-C the server attaches to each chunk.
    pub checksums_enabled: bool,

    /// Backoff applied between attempts of any retryable call.
    pub backoff: BackoffPolicy,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            fadvise: Fadvise::default(),
            inplace_seek_limit: 8 * 1024 * 1024,
            min_range_request_size: 2 * 1024 * 1024,
            read_timeout: Duration::from_secs(3600),
            metadata_timeout: Duration::from_secs(60),
            checksums_enabled: false,
            backoff: BackoffPolicy::default(),
        }
    }
}
