//! Streaming uploads: direct-vs-multipart selection and the multipart
//! part pump.
//!
//! [`S3Client::adaptive_upload`] reads the first chunk of the source. A
//! source that ends inside that chunk goes up as one PUT; anything larger
//! becomes a multipart upload whose parts are sent as tasks on a
//! [`JoinSet`], with at most `write_queue_max_parts` in flight. The source
//! is not read while the queue is full.

use crate::config::UploadOptions;
use crate::s3::chunked::{Chunk, ChunkedBufferStream};
use crate::s3::client::S3Client;
use crate::s3::error::{Result, S3Error};
use crate::s3::request::{
    content_md5, AbortMultipartUploadRequest, AclHeaders, CompleteMultipartUploadRequest,
    ContinueMultipartUploadRequest, InitMultipartUploadRequest, ObjectMetadata, PutObjectRequest,
    SseCustomerHeaders,
};
use crate::s3::transport::{HyperTransport, RequestTransport};
use crate::s3::types::{
    CommonResponseHeaders, CompleteMultipartUploadResponse, CompletedPart,
    InitMultipartUploadResponseHeaders, PutObjectResponseHeaders, Response,
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::io;
use tokio::task::{JoinError, JoinSet};

/// Highest part number S3 accepts
pub const MAX_PART_NUMBER: u32 = 10_000;

/// Lifecycle of a multipart upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Initiated,
    UploadingParts,
    Completing,
    Completed,
    Aborting,
    Aborted,
    /// Failed without an abort, or the abort itself failed
    Failed,
}

impl UploadState {
    pub fn accepts_parts(&self) -> bool {
        matches!(self, UploadState::Initiated | UploadState::UploadingParts)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Completed | UploadState::Aborted)
    }
}

/// An initiated multipart upload.
///
/// Part numbers are handed out in call order starting at 1. Dropping the
/// upload cancels parts still in flight but does not abort it server side.
pub struct MultipartUpload<T = HyperTransport> {
    client: S3Client<T>,
    bucket: String,
    key: String,
    upload_id: String,
    init_headers: InitMultipartUploadResponseHeaders,
    next_part_number: u32,
    parts: Vec<CompletedPart>,
    in_flight: JoinSet<Result<CompletedPart>>,
    state: UploadState,
    options: UploadOptions,
    sse: Option<SseCustomerHeaders>,
}

impl<T: RequestTransport> MultipartUpload<T> {
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn init_headers(&self) -> &InitMultipartUploadResponseHeaders {
        &self.init_headers
    }

    /// Parts dispatched so far
    pub fn part_count(&self) -> u32 {
        self.next_part_number - 1
    }

    /// Parts whose upload has been confirmed
    pub fn completed_parts(&self) -> &[CompletedPart] {
        &self.parts
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn ensure_accepting(&self) -> Result<()> {
        if self.state.accepts_parts() {
            Ok(())
        } else {
            Err(S3Error::InvalidRequest(format!(
                "upload {} no longer accepts parts ({:?})",
                self.upload_id, self.state
            )))
        }
    }

    fn record(&mut self, joined: std::result::Result<Result<CompletedPart>, JoinError>) -> Result<()> {
        let outcome = joined
            .map_err(|e| S3Error::Transport(format!("part upload task failed: {}", e)))
            .and_then(|part| part);
        match outcome {
            Ok(part) => {
                tracing::debug!(upload_id = %self.upload_id, part = part.part_number, "part uploaded");
                self.parts.push(part);
                Ok(())
            }
            Err(err) => {
                self.state = UploadState::Failed;
                Err(err)
            }
        }
    }

    /// Collect parts that already finished without waiting.
    fn reap_finished(&mut self) -> Result<()> {
        while let Some(joined) = self.in_flight.try_join_next() {
            self.record(joined)?;
        }
        Ok(())
    }

    /// Queue one part. Waits while `write_queue_max_parts` parts are in
    /// flight and returns the part number assigned to `data`.
    pub async fn upload_part(&mut self, data: Bytes) -> Result<u32> {
        self.ensure_accepting()?;
        if self.next_part_number > MAX_PART_NUMBER {
            return Err(S3Error::InvalidRequest(format!(
                "upload {} exceeds {} parts",
                self.upload_id, MAX_PART_NUMBER
            )));
        }

        self.reap_finished()?;
        while self.in_flight.len() >= self.options.write_queue_max_parts {
            if let Some(joined) = self.in_flight.join_next().await {
                self.record(joined)?;
            }
        }

        let part_number = self.next_part_number;
        self.next_part_number += 1;
        self.state = UploadState::UploadingParts;

        let mut request = ContinueMultipartUploadRequest::new(self.upload_id.clone(), part_number, data);
        if self.options.part_checksum {
            let md5 = content_md5(&request.body);
            request = request.with_content_md5(md5);
        }
        if let Some(sse) = &self.sse {
            request = request.with_sse(sse.clone());
        }

        tracing::debug!(
            upload_id = %self.upload_id,
            part = part_number,
            bytes = request.body.len(),
            "dispatching part"
        );

        let client = self.client.clone();
        let bucket = self.bucket.clone();
        let key = self.key.clone();
        self.in_flight.spawn(async move {
            let headers = client.continue_multipart_upload(&bucket, &key, request).await?;
            let etag = headers.etag().filter(|e| !e.is_empty()).ok_or_else(|| {
                S3Error::InvalidResponse(format!("part {} response has no ETag", part_number))
            })?;
            Ok(CompletedPart::new(part_number, etag))
        });

        Ok(part_number)
    }

    /// Wait for every in-flight part, then send the sorted manifest.
    pub async fn complete(
        &mut self,
    ) -> Result<Response<PutObjectResponseHeaders, CompleteMultipartUploadResponse>> {
        self.ensure_accepting()?;
        while let Some(joined) = self.in_flight.join_next().await {
            self.record(joined)?;
        }
        if self.parts.is_empty() {
            return Err(S3Error::InvalidRequest(format!(
                "upload {} has no parts to complete",
                self.upload_id
            )));
        }

        self.state = UploadState::Completing;
        self.parts.sort_by_key(|p| p.part_number);
        let request = CompleteMultipartUploadRequest::new(self.upload_id.clone(), self.parts.clone());

        match self
            .client
            .complete_multipart_upload(&self.bucket, &self.key, &request)
            .await
        {
            Ok(response) => {
                self.state = UploadState::Completed;
                tracing::info!(
                    bucket = %self.bucket,
                    key = %self.key,
                    upload_id = %self.upload_id,
                    parts = self.parts.len(),
                    "multipart upload completed"
                );
                Ok(response)
            }
            Err(err) => {
                self.state = UploadState::Failed;
                Err(err)
            }
        }
    }

    /// Cancel parts in flight and abort the upload server side.
    pub async fn abort(&mut self) -> Result<CommonResponseHeaders> {
        if self.state.is_terminal() {
            return Err(S3Error::InvalidRequest(format!(
                "upload {} is already {:?}",
                self.upload_id, self.state
            )));
        }
        self.state = UploadState::Aborting;
        self.in_flight.shutdown().await;

        let request = AbortMultipartUploadRequest::new(self.upload_id.clone());
        match self
            .client
            .abort_multipart_upload(&self.bucket, &self.key, &request)
            .await
        {
            Ok(headers) => {
                self.state = UploadState::Aborted;
                tracing::info!(upload_id = %self.upload_id, "multipart upload aborted");
                Ok(headers)
            }
            Err(err) => {
                self.state = UploadState::Failed;
                Err(err)
            }
        }
    }

    /// Handle a fatal error: abort once when configured to and hand the
    /// original error back. A failed abort is only logged.
    async fn fail(&mut self, err: S3Error) -> S3Error {
        if !self.options.abort_on_failure {
            self.in_flight.shutdown().await;
            self.state = UploadState::Failed;
            tracing::warn!(upload_id = %self.upload_id, error = %err, "multipart upload failed");
            return err;
        }

        tracing::warn!(upload_id = %self.upload_id, error = %err, "multipart upload failed, aborting");
        if let Err(abort_err) = self.abort().await {
            tracing::warn!(
                upload_id = %self.upload_id,
                error = %abort_err,
                "failed to abort multipart upload"
            );
        }
        err
    }
}

/// Caller side of [`S3Client::adaptive_upload`].
#[derive(Debug)]
pub struct AdaptiveUploadRequest<S> {
    pub source: S,
    pub metadata: ObjectMetadata,
    pub acl: AclHeaders,
    pub sse: Option<SseCustomerHeaders>,
    pub options: UploadOptions,
}

impl<S> AdaptiveUploadRequest<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            metadata: ObjectMetadata::default(),
            acl: AclHeaders::default(),
            sse: None,
            options: UploadOptions::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ObjectMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_acl(mut self, acl: AclHeaders) -> Self {
        self.acl = acl;
        self
    }

    pub fn with_sse(mut self, sse: SseCustomerHeaders) -> Self {
        self.sse = Some(sse);
        self
    }

    pub fn with_options(mut self, options: UploadOptions) -> Self {
        self.options = options;
        self
    }
}

/// How an adaptive upload went up.
#[derive(Debug)]
pub enum UploadOutcome {
    Direct {
        headers: PutObjectResponseHeaders,
    },
    Multipart {
        upload_id: String,
        part_count: u32,
        headers: PutObjectResponseHeaders,
        result: CompleteMultipartUploadResponse,
    },
}

impl UploadOutcome {
    pub fn is_multipart(&self) -> bool {
        matches!(self, UploadOutcome::Multipart { .. })
    }

    /// ETag of the stored object, without quotes
    pub fn etag(&self) -> Option<&str> {
        match self {
            UploadOutcome::Direct { headers } => headers.etag(),
            UploadOutcome::Multipart { result, .. } if !result.etag.is_empty() => {
                Some(result.etag.as_str())
            }
            UploadOutcome::Multipart { headers, .. } => headers.etag(),
        }
    }
}

impl<T: RequestTransport> S3Client<T> {
    /// Initiate a multipart upload and hand back the session for manual
    /// part pumping.
    pub async fn start_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        request: &InitMultipartUploadRequest,
        options: UploadOptions,
    ) -> Result<MultipartUpload<T>> {
        options.validate()?;
        let response = self.init_multipart_upload(bucket, key, request).await?;
        tracing::debug!(bucket, key, upload_id = %response.body.upload_id, "multipart upload initiated");

        Ok(MultipartUpload {
            client: self.clone(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id: response.body.upload_id,
            init_headers: response.headers,
            next_part_number: 1,
            parts: Vec::new(),
            in_flight: JoinSet::new(),
            state: UploadState::Initiated,
            options,
            sse: request.sse.clone(),
        })
    }

    /// Upload a stream of unknown length.
    ///
    /// A source that ends within the first `chunk_size` bytes is sent as one
    /// PUT. Otherwise the object goes up as a multipart upload with the same
    /// metadata and ACL, and is aborted on failure when
    /// `abort_on_failure` is set.
    pub async fn adaptive_upload<S>(
        &self,
        bucket: &str,
        key: &str,
        request: AdaptiveUploadRequest<S>,
    ) -> Result<UploadOutcome>
    where
        S: Stream<Item = io::Result<Bytes>> + Unpin,
    {
        let AdaptiveUploadRequest {
            source,
            metadata,
            acl,
            sse,
            options,
        } = request;
        options.validate()?;

        let mut chunks = ChunkedBufferStream::new(source, options.chunk_size);
        let first = match chunks.next().await {
            Some(Ok(chunk)) => chunk,
            Some(Err(err)) => return Err(S3Error::Stream(err)),
            None => Chunk {
                index: 0,
                data: Bytes::new(),
                terminal: true,
            },
        };

        if first.terminal && first.len() < options.chunk_size {
            tracing::info!(bucket, key, bytes = first.len(), "using direct upload");
            let mut put = PutObjectRequest::new(first.data)
                .with_metadata(metadata)
                .with_acl(acl);
            if options.part_checksum {
                let md5 = content_md5(&put.body);
                put = put.with_content_md5(md5);
            }
            if let Some(sse) = sse {
                put = put.with_sse(sse);
            }
            let headers = self.put_object(bucket, key, put).await?;
            return Ok(UploadOutcome::Direct { headers });
        }

        tracing::info!(bucket, key, chunk_size = options.chunk_size, "using multipart upload");
        chunks.pause();
        let mut init = InitMultipartUploadRequest::new(metadata).with_acl(acl);
        if let Some(sse) = sse {
            init = init.with_sse(sse);
        }
        let mut upload = self.start_multipart_upload(bucket, key, &init, options).await?;
        chunks.resume();

        if let Err(err) = pump_parts(&mut upload, first, &mut chunks).await {
            return Err(upload.fail(err).await);
        }

        let part_count = upload.part_count();
        match upload.complete().await {
            Ok(response) => Ok(UploadOutcome::Multipart {
                upload_id: upload.upload_id().to_string(),
                part_count,
                headers: response.headers,
                result: response.body,
            }),
            Err(err) => Err(upload.fail(err).await),
        }
    }
}

/// Feed every chunk of the source into the upload. Stops at the first
/// source or part error.
async fn pump_parts<T, S>(
    upload: &mut MultipartUpload<T>,
    first: Chunk,
    chunks: &mut ChunkedBufferStream<S>,
) -> Result<()>
where
    T: RequestTransport,
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    upload.upload_part(first.data).await?;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(S3Error::Stream)?;
        if chunk.is_empty() {
            continue;
        }
        upload.upload_part(chunk.data).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        assert!(UploadState::Initiated.accepts_parts());
        assert!(UploadState::UploadingParts.accepts_parts());
        assert!(!UploadState::Completing.accepts_parts());
        assert!(!UploadState::Failed.accepts_parts());
        assert!(UploadState::Aborted.is_terminal());
        assert!(!UploadState::Failed.is_terminal());
    }

    #[test]
    fn test_outcome_etag() {
        let direct = UploadOutcome::Direct {
            headers: PutObjectResponseHeaders {
                common: CommonResponseHeaders {
                    etag: Some("\"abc\"".into()),
                    ..Default::default()
                },
                ..Default::default()
            },
        };
        assert_eq!(direct.etag(), Some("abc"));
        assert!(!direct.is_multipart());

        let multipart = UploadOutcome::Multipart {
            upload_id: "u".into(),
            part_count: 2,
            headers: PutObjectResponseHeaders::default(),
            result: CompleteMultipartUploadResponse {
                etag: "def-2".into(),
                ..Default::default()
            },
        };
        assert_eq!(multipart.etag(), Some("def-2"));
        assert!(multipart.is_multipart());
    }
}
