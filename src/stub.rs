use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Request, Status};

use crate::error::{Error, Result};
use crate::proto::{GetObjectMediaRequest, GetObjectMediaResponse, GetObjectRequest, Object};

const GET_OBJECT_PATH: &str = "/google.storage.v1.Storage/GetObject";
const GET_OBJECT_MEDIA_PATH: &str = "/google.storage.v1.Storage/GetObjectMedia";

/// A lazily-pulled stream of content chunks for one media call.
pub type MediaStream = Pin<Box<dyn Stream<Item = std::result::Result<ObjectChunk, Status>> + Send>>;

/// Drop guard for transport-pooled chunk memory.
///
/// Transports that hand out chunks backed by pooled buffers attach one of
/// these to each chunk; the pooled memory is returned exactly once, when the
/// guard drops. Holding the guard alive as long as the chunk's bytes are
/// referenced is what makes the borrow sound.
pub struct ChunkLease {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ChunkLease {
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        ChunkLease {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for ChunkLease {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for ChunkLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkLease").finish_non_exhaustive()
    }
}

/// One server-streamed chunk: a contiguous byte range, the CRC32-C the
/// server attached to it, and the lease scoping its backing memory.
#[derive(Debug)]
pub struct ObjectChunk {
    pub data: Bytes,
    pub crc32c: Option<u32>,
    pub lease: Option<ChunkLease>,
}

/// The two store calls the channel issues, behind a seam so tests (and other
/// transports) can stand in for the wire.
#[async_trait]
pub trait StorageStub: Send + Sync {
    /// Unary metadata fetch, bounded by `timeout`.
    async fn get_object(
        &self,
        request: GetObjectRequest,
        timeout: Duration,
    ) -> std::result::Result<Object, Status>;

    /// Ranged server-streaming content fetch, bounded by `timeout`.
    async fn get_object_media(
        &self,
        request: GetObjectMediaRequest,
        timeout: Duration,
    ) -> std::result::Result<MediaStream, Status>;
}

/// Supplies stubs and knows when one cannot be reused.
pub trait StubProvider: Send + Sync {
    /// Returns a fresh or pooled stub.
    fn stub(&self) -> Arc<dyn StorageStub>;

    /// Whether the stub that produced `code` should be replaced before the
    /// next attempt.
    fn is_stub_broken(&self, code: Code) -> bool;
}

/// Stub over a tonic channel. Cheap to mint: the channel itself is a shared
/// handle and each call runs on a clone of it.
pub struct GrpcStub {
    channel: Channel,
}

#[async_trait]
impl StorageStub for GrpcStub {
    async fn get_object(
        &self,
        request: GetObjectRequest,
        timeout: Duration,
    ) -> std::result::Result<Object, Status> {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("channel not ready: {e}")))?;

        let codec: ProstCodec<GetObjectRequest, Object> = ProstCodec::default();
        let mut request = Request::new(request);
        request.set_timeout(timeout);
        let response = grpc
            .unary(request, PathAndQuery::from_static(GET_OBJECT_PATH), codec)
            .await?;
        Ok(response.into_inner())
    }

    async fn get_object_media(
        &self,
        request: GetObjectMediaRequest,
        timeout: Duration,
    ) -> std::result::Result<MediaStream, Status> {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("channel not ready: {e}")))?;

        let codec: ProstCodec<GetObjectMediaRequest, GetObjectMediaResponse> = ProstCodec::default();
        let mut request = Request::new(request);
        request.set_timeout(timeout);
        let response = grpc
            .server_streaming(
                request,
                PathAndQuery::from_static(GET_OBJECT_MEDIA_PATH),
                codec,
            )
            .await?;

        // `Bytes` payloads are already reference-counted, so chunks off this
        // transport carry no lease.
        let chunks = response.into_inner().map(|item| {
            item.map(|response| {
                let data = response.checksummed_data.unwrap_or_default();
                ObjectChunk {
                    crc32c: data.crc32c,
                    data: data.content,
                    lease: None,
                }
            })
        });
        Ok(chunks.boxed())
    }
}

/// [`StubProvider`] backed by a single tonic channel.
pub struct GrpcStubProvider {
    channel: Channel,
}

impl GrpcStubProvider {
    /// Connects to `endpoint` (e.g. `https://storage.example.com`).
    pub async fn connect(endpoint: &str) -> Result<Self> {
        let channel = Endpoint::from_shared(endpoint.to_owned())
            .map_err(Error::ErrConnect)?
            .connect()
            .await
            .map_err(Error::ErrConnect)?;
        Ok(GrpcStubProvider { channel })
    }

    pub fn new(channel: Channel) -> Self {
        GrpcStubProvider { channel }
    }
}

impl StubProvider for GrpcStubProvider {
    fn stub(&self) -> Arc<dyn StorageStub> {
        Arc::new(GrpcStub {
            channel: self.channel.clone(),
        })
    }

    fn is_stub_broken(&self, code: Code) -> bool {
        // Expired credentials or a torn-down channel poison the stub; other
        // codes are attributable to the call, not the handle.
        matches!(code, Code::Unauthenticated | Code::Unavailable)
    }
}
