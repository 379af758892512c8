//! S3 client module with AWS SigV4 signing
//!
//! This module provides:
//! - AWS Signature Version 4 signing with an injectable clock
//! - Object operations (get, head, put, copy, delete, list, ACLs, multipart)
//! - Adaptive streaming uploads over a chunked buffer stream
//! - Typed request and response structures plus their XML codec

pub mod chunked;
pub mod client;
pub mod clock;
pub mod error;
pub mod multipart;
pub mod request;
pub mod signer;
pub mod transport;
pub mod types;
pub mod xml;

// Re-export main types for convenience
pub use chunked::{Chunk, ChunkedBufferStream, DEFAULT_CHUNK_SIZE};
pub use client::{resolve_hostname, S3Client};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ErrorResponse, Result, S3Error};
pub use multipart::{AdaptiveUploadRequest, MultipartUpload, UploadOutcome, UploadState};
pub use request::{
    AclHeaders, CannedAcl, CopyObjectRequest, DeleteObjectRequest, GetObjectRequest,
    HeadObjectRequest, InitMultipartUploadRequest, ListObjectsRequest, MetadataDirective,
    ObjectMetadata, PutObjectAclRequest, PutObjectRequest, SseCustomerHeaders, StorageClass,
    TaggingDirective,
};
pub use signer::{Credentials, S3SignerV4};
pub use transport::{HyperTransport, RequestTransport, ResponseBody, SignedRequest, TransportResponse};
pub use types::{
    AccessControlPolicy, CommonResponseHeaders, CompletedPart, CompleteMultipartUploadResponse,
    ListBucketResult, ObjectResponseHeaders, PutObjectResponseHeaders, Response, S3Object,
};
