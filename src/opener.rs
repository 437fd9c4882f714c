use std::sync::Arc;

use crate::channel::ReadChannel;
use crate::error::{is_retryable, Error, Result};
use crate::options::ReadOptions;
use crate::proto::GetObjectRequest;
use crate::stub::StubProvider;
use crate::ResourceId;

impl ReadChannel {
    /// Opens a read channel on `resource`.
    ///
    /// One metadata call pins the generation and size every later media
    /// request is issued against, so all bytes the channel ever returns
    /// come from the same snapshot of the object.
    pub async fn open(
        provider: Arc<dyn StubProvider>,
        resource: ResourceId,
        options: ReadOptions,
    ) -> Result<ReadChannel> {
        let mut stub = provider.stub();
        let request = GetObjectRequest {
            bucket: resource.bucket.clone(),
            object: resource.object.clone(),
        };

        let mut backoff = options.backoff.backoff();
        let metadata = loop {
            match stub.get_object(request.clone(), options.metadata_timeout).await {
                Ok(metadata) => break metadata,
                Err(status) if is_retryable(status.code()) => {
                    if provider.is_stub_broken(status.code()) {
                        log::info!(
                            "[{resource}] stub broken on {:?}, replacing it",
                            status.code()
                        );
                        stub = provider.stub();
                    }
                    match backoff.next_delay() {
                        Some(delay) => {
                            log::warn!(
                                "[{resource}] metadata fetch failed ({status}), retrying in {delay:?}"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            return Err(Error::ErrTransport {
                                resource: resource.to_string(),
                                source: status,
                            });
                        }
                    }
                }
                Err(status) => return Err(Error::from_status(status, &resource)),
            }
        };

        // The channel hands bytes through verbatim, so encodings that need
        // inflating are refused up front.
        if metadata.content_encoding.contains("gzip") {
            return Err(Error::ErrContentEncodingNotSupported {
                encoding: metadata.content_encoding,
                resource: resource.to_string(),
            });
        }

        let object_size = u64::try_from(metadata.size).map_err(|_| Error::ErrTransport {
            resource: resource.to_string(),
            source: tonic::Status::internal(format!(
                "server reported negative size {}",
                metadata.size
            )),
        })?;

        log::debug!(
            "[{resource}] opened at generation {} ({object_size} bytes)",
            metadata.generation
        );

        Ok(ReadChannel::new(
            provider,
            stub,
            resource,
            metadata.generation,
            object_size,
            options,
        ))
    }
}
