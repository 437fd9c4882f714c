
use std::cmp;
use std::sync::Arc;

use crc::{Crc, CRC_32_ISCSI};
use tonic::Status;

use crate::backoff::ExponentialBackoff;
use crate::chunk::ChunkBuffer;
use crate::error::{is_retryable, Error, Result};
use crate::options::{Fadvise, ReadOptions};
use crate::proto::GetObjectMediaRequest;
use crate::session::StreamSession;
use crate::stub::{ObjectChunk, StorageStub, StubProvider};
use crate::ResourceId;

const CASTAGNOLI: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Seekable read channel over one pinned generation of one object.
///
/// Content arrives through server-streaming media calls; the channel keeps
/// at most one call open and at most one undelivered chunk buffered, and
/// translates positional reads against them. Not safe for concurrent use:
/// every mutating operation takes `&mut self`.
pub struct ReadChannel {
    provider: Arc<dyn StubProvider>,
    stub: Arc<dyn StorageStub>,
    resource: ResourceId,
    generation: i64,
    object_size: u64,
    options: ReadOptions,

    /// Offset of the next byte the caller should see, except while a
    /// pending skip is outstanding.
    position: u64,
    /// Bytes seeked past but not yet discarded from buffered or streaming
    /// data. The caller-visible position is `position + pending_skip`.
    pending_skip: u64,
    /// Sticky once set; `Fadvise::Auto` flips it on the first non-trivial
    /// seek.
    random_access: bool,
    buffer: Option<ChunkBuffer>,
    session: Option<StreamSession>,
    open: bool,
}

impl std::fmt::Debug for ReadChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadChannel")
            .field("resource", &self.resource)
            .field("generation", &self.generation)
            .field("object_size", &self.object_size)
            .field("position", &self.position)
            .field("pending_skip", &self.pending_skip)
            .field("random_access", &self.random_access)
            .field("open", &self.open)
            .finish()
    }
}

impl ReadChannel {
    pub(crate) fn new(
        provider: Arc<dyn StubProvider>,
        stub: Arc<dyn StorageStub>,
        resource: ResourceId,
        generation: i64,
        object_size: u64,
        options: ReadOptions,
    ) -> Self {
        let random_access = options.fadvise == Fadvise::Random;
        ReadChannel {
            provider,
            stub,
            resource,
            generation,
            object_size,
            options,
            position: 0,
            pending_skip: 0,
            random_access,
            buffer: None,
            session: None,
            open: true,
        }
    }

    /// Reads into `dst` starting at the current position.
    ///
    /// Returns `Ok(None)` once the caller is at end of object, `Ok(Some(0))`
    /// only for a zero-capacity `dst`, and otherwise the number of bytes
    /// written. The read is never partial while more bytes can be had
    /// without issuing a new request.
    pub async fn read(&mut self, dst: &mut [u8]) -> Result<Option<usize>> {
        self.check_open()?;

        if self.caller_position() >= self.object_size {
            return Ok(None);
        }
        if dst.is_empty() {
            return Ok(Some(0));
        }

        let mut filled = 0usize;

        // Bytes left over from a previous call are served first.
        self.drain_buffer(dst, &mut filled);
        if filled == dst.len() {
            return Ok(Some(filled));
        }
        if self.position >= self.object_size {
            self.tear_down_session();
            return Ok(Some(filled));
        }

        loop {
            let chunk = match self.next_chunk(dst.len() - filled).await? {
                Some(chunk) => chunk,
                None => {
                    // Stream finished. Hand back whatever we have rather
                    // than paying for a new request inside this call.
                    if filled > 0 {
                        return Ok(Some(filled));
                    }
                    continue;
                }
            };

            // A pending skip eats stream data before anything is delivered.
            if self.pending_skip >= chunk.data.len() as u64 {
                self.pending_skip -= chunk.data.len() as u64;
                self.position += chunk.data.len() as u64;
                continue; // chunk and its lease released here
            }

            if self.options.checksums_enabled {
                self.verify_chunk(&chunk)?;
            }

            let ObjectChunk { data, lease, .. } = chunk;
            let skip = self.pending_skip as usize;
            if skip > 0 {
                self.position += skip as u64;
                self.pending_skip = 0;
            }

            let n = cmp::min(data.len() - skip, dst.len() - filled);
            dst[filled..filled + n].copy_from_slice(&data[skip..skip + n]);
            self.position += n as u64;
            filled += n;

            if skip + n < data.len() {
                // The chunk outlives this call; park the remainder (and its
                // lease) for the next read.
                self.buffer = Some(ChunkBuffer::new(data, skip + n, lease));
                return Ok(Some(filled));
            }

            if filled == dst.len() {
                return Ok(Some(filled));
            }
            if self.position >= self.object_size {
                self.tear_down_session();
                return Ok(Some(filled));
            }
        }
    }

    /// Moves the read position. A small forward move keeps the open stream
    /// and schedules the gap to be discarded; anything else tears the
    /// stream down and the next read issues a fresh request at the target.
    pub fn seek(&mut self, new_pos: u64) -> Result<()> {
        self.check_open()?;
        if new_pos >= self.object_size {
            return Err(Error::ErrPositionOutOfRange {
                position: new_pos,
                size: self.object_size,
                resource: self.resource.to_string(),
            });
        }
        if new_pos == self.caller_position() {
            return Ok(());
        }

        if new_pos >= self.position
            && new_pos - self.position <= self.options.inplace_seek_limit
        {
            self.pending_skip = new_pos - self.position;
            return Ok(());
        }

        if self.options.fadvise == Fadvise::Auto && !self.random_access {
            log::debug!(
                "[{}] non-sequential seek {} -> {}, switching to random access",
                self.resource,
                self.caller_position(),
                new_pos
            );
            self.random_access = true;
        }

        self.tear_down_session();
        self.buffer = None;
        self.position = new_pos;
        self.pending_skip = 0;
        Ok(())
    }

    /// Caller-visible position.
    pub fn position(&self) -> Result<u64> {
        self.check_open()?;
        Ok(self.caller_position())
    }

    /// Size of the pinned generation.
    pub fn size(&self) -> Result<u64> {
        self.check_open()?;
        Ok(self.object_size)
    }

    /// Generation pinned at open time.
    pub fn generation(&self) -> i64 {
        self.generation
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Idempotent; cancels any in-flight stream and drops buffered data.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        log::debug!(
            "[{}] closing read channel at position {}",
            self.resource,
            self.caller_position()
        );
        self.open = false;
        self.tear_down_session();
        self.buffer = None;
    }

    /// The channel is read-only.
    pub fn write(&mut self, _src: &[u8]) -> Result<usize> {
        Err(Error::ErrChannelReadOnly)
    }

    /// The channel is read-only.
    pub fn truncate(&mut self, _size: u64) -> Result<()> {
        Err(Error::ErrChannelReadOnly)
    }

    fn check_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::ErrChannelClosed)
        }
    }

    fn caller_position(&self) -> u64 {
        self.position + self.pending_skip
    }

    fn drain_buffer(&mut self, dst: &mut [u8], filled: &mut usize) {
        let Some(buffer) = self.buffer.as_mut() else {
            return;
        };

        if self.pending_skip > 0 {
            let want = cmp::min(self.pending_skip, buffer.remaining() as u64) as usize;
            let skipped = buffer.skip(want);
            self.position += skipped as u64;
            self.pending_skip -= skipped as u64;
        }

        let n = buffer.copy_into(&mut dst[*filled..]);
        self.position += n as u64;
        *filled += n;

        if buffer.is_drained() {
            self.buffer = None;
        }
    }

    /// Pulls the next chunk off the current session, starting or restarting
    /// one as needed. Transient failures are absorbed here: the session is
    /// cancelled and a new request reissued at the current position, which
    /// already accounts for every byte delivered so far.
    async fn next_chunk(&mut self, dst_remaining: usize) -> Result<Option<ObjectChunk>> {
        let mut backoff = self.options.backoff.backoff();
        loop {
            if self.session.is_none() {
                if let Err(status) = self.start_session(dst_remaining).await {
                    self.handle_stream_failure(status, &mut backoff).await?;
                    continue;
                }
            }

            let (outcome, session_start) = match self.session.as_mut() {
                Some(session) => (session.next_chunk().await, session.read_offset()),
                None => continue,
            };

            match outcome {
                Ok(Some(chunk)) => return Ok(Some(chunk)),
                Ok(None) => {
                    let made_progress = self.position > session_start;
                    self.tear_down_session();
                    if !made_progress && self.position < self.object_size {
                        // Reissuing at the same offset would loop forever.
                        return Err(Error::ErrPrematureEndOfStream {
                            position: self.position,
                            resource: self.resource.to_string(),
                        });
                    }
                    return Ok(None);
                }
                Err(status) => {
                    self.handle_stream_failure(status, &mut backoff).await?;
                }
            }
        }
    }

    async fn start_session(
        &mut self,
        dst_remaining: usize,
    ) -> std::result::Result<(), Status> {
        let read_limit = if self.random_access {
            Some(cmp::max(
                dst_remaining as u64,
                self.options.min_range_request_size,
            ))
        } else {
            None
        };

        let request = GetObjectMediaRequest {
            bucket: self.resource.bucket.clone(),
            object: self.resource.object.clone(),
            generation: self.generation,
            read_offset: self.position as i64,
            read_limit: read_limit.unwrap_or(0) as i64,
        };

        log::debug!(
            "[{}] opening stream at offset {} (limit {:?}, generation {})",
            self.resource,
            self.position,
            read_limit,
            self.generation
        );

        let stream = self
            .stub
            .get_object_media(request, self.options.read_timeout)
            .await?;
        self.session = Some(StreamSession::new(stream, self.position, read_limit));
        Ok(())
    }

    /// Classifies a mid-stream failure: retryables cost a backoff delay (and
    /// possibly a fresh stub), everything else surfaces as a domain error
    /// with the buffer invalidated.
    async fn handle_stream_failure(
        &mut self,
        status: Status,
        backoff: &mut ExponentialBackoff,
    ) -> Result<()> {
        self.tear_down_session();

        if !is_retryable(status.code()) {
            self.buffer = None;
            return Err(Error::from_status(status, &self.resource));
        }

        if self.provider.is_stub_broken(status.code()) {
            log::info!(
                "[{}] stub broken on {:?}, replacing it",
                self.resource,
                status.code()
            );
            self.stub = self.provider.stub();
        }

        match backoff.next_delay() {
            Some(delay) => {
                log::warn!(
                    "[{}] retryable stream failure ({}), reissuing at offset {} in {:?}",
                    self.resource,
                    status,
                    self.position,
                    delay
                );
                tokio::time::sleep(delay).await;
                Ok(())
            }
            None => {
                self.buffer = None;
                Err(Error::ErrTransport {
                    resource: self.resource.to_string(),
                    source: status,
                })
            }
        }
    }

    fn verify_chunk(&mut self, chunk: &ObjectChunk) -> Result<()> {
        let Some(expected) = chunk.crc32c else {
            return Ok(());
        };
        let actual = CASTAGNOLI.checksum(&chunk.data);
        if actual == expected {
            return Ok(());
        }
        // Checksum mismatches are never retried.
        self.tear_down_session();
        Err(Error::ErrChecksumMismatch {
            expected,
            actual,
            resource: self.resource.to_string(),
        })
    }

    fn tear_down_session(&mut self) {
        if let Some(session) = self.session.take() {
            // Fire the cancellation handle before the stream is dropped.
            session.shut_down();
        }
    }
}

impl Drop for ReadChannel {
    fn drop(&mut self) {
        self.close();
    }
}
