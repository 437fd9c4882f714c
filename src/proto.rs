//! Message types for the subset of the `google.storage.v1` surface the read
//! channel consumes. Maintained by hand so the crate carries no proto
//! compilation step; field numbers and scalar types follow the published
//! schema.

/// Request for object metadata.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetObjectRequest {
    #[prost(string, tag = "1")]
    pub bucket: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub object: ::prost::alloc::string::String,
}

/// Object metadata, reduced to the fields the channel pins at open time.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Object {
    #[prost(string, tag = "1")]
    pub bucket: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub name: ::prost::alloc::string::String,
    #[prost(int64, tag = "3")]
    pub generation: i64,
    #[prost(int64, tag = "4")]
    pub size: i64,
    #[prost(string, tag = "5")]
    pub content_encoding: ::prost::alloc::string::String,
}

/// Ranged request for object content. A `read_limit` of zero means
/// unlimited: the stream runs to the end of the object.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetObjectMediaRequest {
    #[prost(string, tag = "1")]
    pub bucket: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub object: ::prost::alloc::string::String,
    #[prost(int64, tag = "3")]
    pub generation: i64,
    #[prost(int64, tag = "4")]
    pub read_offset: i64,
    #[prost(int64, tag = "5")]
    pub read_limit: i64,
}

/// One element of the media stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetObjectMediaResponse {
    #[prost(message, optional, tag = "1")]
    pub checksummed_data: ::core::option::Option<ChecksummedData>,
}

/// A contiguous slice of object content plus the CRC32-C the server
/// computed over it.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChecksummedData {
    #[prost(bytes = "bytes", tag = "1")]
    pub content: ::prost::bytes::Bytes,
    #[prost(uint32, optional, tag = "2")]
    pub crc32c: ::core::option::Option<u32>,
}
