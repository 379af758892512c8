//! S3 object client
//!
//! Every operation is one signed request through a [`RequestTransport`]:
//! - keys are percent-encoded with `/` kept, bucket and key must not be blank
//! - each request is bounded by the global timeout
//! - non-2xx responses are turned into [`S3Error::S3Response`] with the
//!   parsed `<Error>` body, or [`S3Error::Unmarshal`] when it does not parse
//! - nothing is retried; callers own the retry policy

use crate::config::{ClientOptions, DEFAULT_REGION};
use crate::s3::clock::{Clock, SystemClock};
use crate::s3::error::{Result, S3Error};
use crate::s3::request::{
    AbortMultipartUploadRequest, CompleteMultipartUploadRequest, ContinueMultipartUploadRequest,
    CopyObjectRequest, DeleteObjectRequest, GetObjectRequest, HeadObjectRequest,
    InitMultipartUploadRequest, ListObjectsRequest, PutObjectAclRequest, PutObjectRequest,
};
use crate::s3::signer::{canonical_query_string, uri_encode, Credentials, S3SignerV4};
use crate::s3::transport::{HyperTransport, RequestTransport, ResponseBody, SignedRequest, TransportResponse};
use crate::s3::types::{
    AccessControlPolicy, CommonResponseHeaders, CompleteMultipartUploadResponse,
    CopyObjectResponseHeaders, CopyObjectResult, GetObjectResponseHeaders,
    HeadObjectResponseHeaders, InitMultipartUploadResponse, InitMultipartUploadResponseHeaders,
    ListBucketResult, PutObjectResponseHeaders, Response, S3Object,
};
use crate::s3::xml;
use bytes::Bytes;
use hyper::{Method, StatusCode};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "s3.amazonaws.com";

/// Longest response body written to the log
const MAX_LOG_OUTPUT: usize = 10_000;

const XML_CONTENT_TYPE: &str = "application/xml";

/// Host for a region: `s3.amazonaws.com` for us-east-1, `s3-{region}.amazonaws.com`
/// otherwise. An override always wins.
pub fn resolve_hostname(region: &str, hostname_override: Option<&str>) -> String {
    if let Some(host) = hostname_override.map(str::trim).filter(|h| !h.is_empty()) {
        return host.to_string();
    }
    if region == DEFAULT_REGION {
        DEFAULT_ENDPOINT.to_string()
    } else {
        format!("s3-{}.amazonaws.com", region)
    }
}

/// `/{bucket}/{key}` with the key percent-encoded
fn object_path(bucket: &str, key: &str) -> Result<String> {
    let bucket = bucket.trim();
    if bucket.is_empty() {
        return Err(S3Error::InvalidRequest("bucket must not be blank".into()));
    }
    let key = key.trim_start_matches('/');
    if key.trim().is_empty() {
        return Err(S3Error::InvalidRequest("key must not be blank".into()));
    }
    Ok(format!("/{}/{}", bucket, uri_encode(key, false)))
}

fn bucket_path(bucket: &str) -> Result<String> {
    let bucket = bucket.trim();
    if bucket.is_empty() {
        return Err(S3Error::InvalidRequest("bucket must not be blank".into()));
    }
    Ok(format!("/{}", bucket))
}

fn flag_query(name: &str) -> BTreeMap<String, String> {
    let mut query = BTreeMap::new();
    query.insert(name.to_string(), String::new());
    query
}

fn truncate_for_log(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(MAX_LOG_OUTPUT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.into_owned(),
    }
}

/// S3 client
///
/// Clone is cheap: the signer and transport sit behind `Arc`s.
pub struct S3Client<T = HyperTransport> {
    transport: Arc<T>,
    signer: Arc<S3SignerV4>,
    /// Host header value, including a non-default port
    host: String,
    /// `scheme://host[:port]`
    endpoint: String,
    timeout: Duration,
}

impl<T> Clone for S3Client<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            signer: Arc::clone(&self.signer),
            host: self.host.clone(),
            endpoint: self.endpoint.clone(),
            timeout: self.timeout,
        }
    }
}

impl<T> fmt::Debug for S3Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Client")
            .field("endpoint", &self.endpoint)
            .field("region", &self.signer.region())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl S3Client<HyperTransport> {
    /// Create a client backed by the pooled hyper transport.
    pub fn new(options: &ClientOptions) -> Result<Self> {
        options.validate()?;
        let transport = HyperTransport::new(options.insecure_tls)?;
        Self::with_transport(options, transport, Arc::new(SystemClock))
    }
}

impl<T: RequestTransport> S3Client<T> {
    /// Create a client over any transport and clock.
    pub fn with_transport(
        options: &ClientOptions,
        transport: T,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        options.validate()?;
        let region = options.region.trim();
        let signer = S3SignerV4::new(
            Credentials::new(options.access_key.clone(), options.secret_key.clone()),
            region,
            options.service.trim(),
            options.sign_payload,
            clock,
        )?;

        let hostname = resolve_hostname(region, options.hostname_override.as_deref());
        let (scheme, default_port) = if options.use_ssl {
            ("https", 443)
        } else {
            ("http", 80)
        };
        let host = match options.port {
            Some(port) if port != default_port => format!("{}:{}", hostname, port),
            _ => hostname,
        };
        let endpoint = format!("{}://{}", scheme, host);

        Ok(Self {
            transport: Arc::new(transport),
            signer: Arc::new(signer),
            host,
            endpoint,
            timeout: options.global_timeout(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    /// Sign and send one request. Fails with [`S3Error::Timeout`] when the
    /// response head does not arrive within the global timeout.
    async fn execute(
        &self,
        action: &'static str,
        method: Method,
        path: &str,
        query: &BTreeMap<String, String>,
        headers: Vec<(String, String)>,
        body: Bytes,
    ) -> Result<TransportResponse> {
        let signed = self
            .signer
            .sign(&method, &self.host, path, query, &headers, &body);

        tracing::debug!(action, method = %method, path, bytes = body.len(), "sending request");

        let request = SignedRequest {
            method,
            endpoint: self.endpoint.clone(),
            path: path.to_string(),
            query: canonical_query_string(query),
            headers: signed.headers,
            body,
        };

        match tokio::time::timeout(self.timeout, self.transport.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(S3Error::Timeout(self.timeout)),
        }
    }

    /// Pass 2xx responses through; turn everything else into an error.
    async fn check_status(
        &self,
        action: &'static str,
        method: &Method,
        response: TransportResponse,
    ) -> Result<TransportResponse> {
        let status = response.status;
        if status.is_success() {
            tracing::debug!(action, status = status.as_u16(), "request successful");
            return Ok(response);
        }

        let status_message = status.canonical_reason().unwrap_or_default().to_string();
        tracing::warn!(action, status = status.as_u16(), "error occurred: {}", status_message);

        if *method == Method::HEAD {
            return Err(S3Error::S3Response {
                action,
                status,
                status_message,
                error: None,
            });
        }

        let body = response.body.collect().await?;
        tracing::warn!(action, "error response body: {}", truncate_for_log(&body));
        let error = xml::parse_error_response(action, &body)?;
        Err(S3Error::S3Response {
            action,
            status,
            status_message,
            error: Some(error),
        })
    }

    async fn send_checked(
        &self,
        action: &'static str,
        method: Method,
        path: &str,
        query: &BTreeMap<String, String>,
        headers: Vec<(String, String)>,
        body: Bytes,
    ) -> Result<TransportResponse> {
        let response = self
            .execute(action, method.clone(), path, query, headers, body)
            .await?;
        self.check_status(action, &method, response).await
    }

    /// Successful response whose body is an XML document
    async fn send_for_xml(
        &self,
        action: &'static str,
        method: Method,
        path: &str,
        query: &BTreeMap<String, String>,
        headers: Vec<(String, String)>,
        body: Bytes,
    ) -> Result<(hyper::HeaderMap, Bytes)> {
        let response = self
            .send_checked(action, method, path, query, headers, body)
            .await?;
        let body = response.body.collect().await?;
        tracing::trace!(action, "response body: {}", truncate_for_log(&body));
        Ok((response.headers, body))
    }

    /// Some operations report failure inside a 200 response.
    fn reject_embedded_error(action: &'static str, body: &[u8]) -> Result<()> {
        if !xml::is_error_document(body) {
            return Ok(());
        }
        tracing::warn!(action, "error document in 200 response: {}", truncate_for_log(body));
        let error = xml::parse_error_response(action, body)?;
        Err(S3Error::S3Response {
            action,
            status: StatusCode::OK,
            status_message: "OK".to_string(),
            error: Some(error),
        })
    }

    // =========================================================================
    // Object operations
    // =========================================================================

    /// Download an object. The body is streamed, not buffered.
    pub async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        request: &GetObjectRequest,
    ) -> Result<Response<GetObjectResponseHeaders, ResponseBody>> {
        let path = object_path(bucket, key)?;
        let response = self
            .send_checked(
                "getObject",
                Method::GET,
                &path,
                &request.query(),
                request.headers(),
                Bytes::new(),
            )
            .await?;
        Ok(Response::new(
            GetObjectResponseHeaders::from_headers(&response.headers),
            response.body,
        ))
    }

    pub async fn get_object_acl(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Response<CommonResponseHeaders, AccessControlPolicy>> {
        const ACTION: &str = "getObjectAcl";
        let path = object_path(bucket, key)?;
        let (headers, body) = self
            .send_for_xml(ACTION, Method::GET, &path, &flag_query("acl"), Vec::new(), Bytes::new())
            .await?;
        let policy = xml::parse_access_control_policy(ACTION, &body)?;
        Ok(Response::new(CommonResponseHeaders::from_headers(&headers), policy))
    }

    pub async fn put_object_acl(
        &self,
        bucket: &str,
        key: &str,
        request: &PutObjectAclRequest,
    ) -> Result<CommonResponseHeaders> {
        let path = object_path(bucket, key)?;
        let mut headers = request.headers();
        let body = match &request.policy {
            Some(policy) => {
                headers.push(("content-type".to_string(), XML_CONTENT_TYPE.to_string()));
                Bytes::from(xml::write_access_control_policy(policy))
            }
            None => Bytes::new(),
        };
        let response = self
            .send_checked("putObjectAcl", Method::PUT, &path, &flag_query("acl"), headers, body)
            .await?;
        let headers = CommonResponseHeaders::from_headers(&response.headers);
        response.body.collect().await?;
        Ok(headers)
    }

    pub async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        request: &HeadObjectRequest,
    ) -> Result<HeadObjectResponseHeaders> {
        let path = object_path(bucket, key)?;
        let response = self
            .send_checked(
                "headObject",
                Method::HEAD,
                &path,
                &BTreeMap::new(),
                request.headers(),
                Bytes::new(),
            )
            .await?;
        Ok(HeadObjectResponseHeaders::from_headers(&response.headers))
    }

    /// Single-request upload.
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        request: PutObjectRequest,
    ) -> Result<PutObjectResponseHeaders> {
        let path = object_path(bucket, key)?;
        let mut headers = request.headers();
        headers.push(("content-length".to_string(), request.body.len().to_string()));
        let response = self
            .send_checked("putObject", Method::PUT, &path, &BTreeMap::new(), headers, request.body)
            .await?;
        let headers = PutObjectResponseHeaders::from_headers(&response.headers);
        response.body.collect().await?;
        Ok(headers)
    }

    // =========================================================================
    // Multipart Upload Operations
    // =========================================================================

    /// Initiate a multipart upload (POST `?uploads`)
    pub async fn init_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        request: &InitMultipartUploadRequest,
    ) -> Result<Response<InitMultipartUploadResponseHeaders, InitMultipartUploadResponse>> {
        const ACTION: &str = "initMultipartUpload";
        let path = object_path(bucket, key)?;
        let (headers, body) = self
            .send_for_xml(
                ACTION,
                Method::POST,
                &path,
                &flag_query("uploads"),
                request.headers(),
                Bytes::new(),
            )
            .await?;
        let result = xml::parse_init_multipart_response(ACTION, &body)?;
        Ok(Response::new(
            InitMultipartUploadResponseHeaders::from_headers(&headers),
            result,
        ))
    }

    /// Upload one part (PUT `?partNumber=n&uploadId=id`)
    ///
    /// Part numbers are 1-indexed, 1 to 10000.
    pub async fn continue_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        request: ContinueMultipartUploadRequest,
    ) -> Result<PutObjectResponseHeaders> {
        if !(1..=crate::s3::multipart::MAX_PART_NUMBER).contains(&request.part_number) {
            return Err(S3Error::InvalidRequest(format!(
                "part number {} is outside 1..={}",
                request.part_number,
                crate::s3::multipart::MAX_PART_NUMBER
            )));
        }
        let path = object_path(bucket, key)?;
        let mut headers = request.headers();
        headers.push(("content-length".to_string(), request.body.len().to_string()));
        let response = self
            .send_checked(
                "continueMultipartUpload",
                Method::PUT,
                &path,
                &request.query(),
                headers,
                request.body,
            )
            .await?;
        let headers = PutObjectResponseHeaders::from_headers(&response.headers);
        // Drain body to return connection to pool
        response.body.collect().await?;
        Ok(headers)
    }

    /// Complete a multipart upload (POST `?uploadId=id`)
    ///
    /// Parts must be sorted by part number.
    pub async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        request: &CompleteMultipartUploadRequest,
    ) -> Result<Response<PutObjectResponseHeaders, CompleteMultipartUploadResponse>> {
        const ACTION: &str = "completeMultipartUpload";
        let path = object_path(bucket, key)?;
        let manifest = Bytes::from(xml::write_complete_multipart_upload(&request.parts));
        let headers = vec![
            ("content-type".to_string(), XML_CONTENT_TYPE.to_string()),
            ("content-length".to_string(), manifest.len().to_string()),
        ];
        let (headers, body) = self
            .send_for_xml(ACTION, Method::POST, &path, &request.query(), headers, manifest)
            .await?;
        Self::reject_embedded_error(ACTION, &body)?;
        let result = xml::parse_complete_multipart_response(ACTION, &body)?;
        Ok(Response::new(PutObjectResponseHeaders::from_headers(&headers), result))
    }

    /// Abort a multipart upload (DELETE `?uploadId=id`)
    ///
    /// Cancels the upload and deletes all uploaded parts.
    pub async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        request: &AbortMultipartUploadRequest,
    ) -> Result<CommonResponseHeaders> {
        let path = object_path(bucket, key)?;
        let response = self
            .send_checked(
                "abortMultipartUpload",
                Method::DELETE,
                &path,
                &request.query(),
                Vec::new(),
                Bytes::new(),
            )
            .await?;
        let headers = CommonResponseHeaders::from_headers(&response.headers);
        response.body.collect().await?;
        Ok(headers)
    }

    // =========================================================================
    // Copy / delete / list
    // =========================================================================

    /// Server-side copy of `source_bucket/source_key` to `bucket/key`.
    pub async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        bucket: &str,
        key: &str,
        request: &CopyObjectRequest,
    ) -> Result<Response<CopyObjectResponseHeaders, CopyObjectResult>> {
        const ACTION: &str = "copyObject";
        let source = object_path(source_bucket, source_key)?;
        let path = object_path(bucket, key)?;
        let mut headers = request.headers();
        headers.push(("x-amz-copy-source".to_string(), source));
        let (headers, body) = self
            .send_for_xml(ACTION, Method::PUT, &path, &BTreeMap::new(), headers, Bytes::new())
            .await?;
        Self::reject_embedded_error(ACTION, &body)?;
        let result = xml::parse_copy_object_result(ACTION, &body)?;
        Ok(Response::new(CopyObjectResponseHeaders::from_headers(&headers), result))
    }

    pub async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        request: &DeleteObjectRequest,
    ) -> Result<CommonResponseHeaders> {
        let path = object_path(bucket, key)?;
        let response = self
            .send_checked(
                "deleteObject",
                Method::DELETE,
                &path,
                &BTreeMap::new(),
                request.headers(),
                Bytes::new(),
            )
            .await?;
        let headers = CommonResponseHeaders::from_headers(&response.headers);
        response.body.collect().await?;
        Ok(headers)
    }

    /// One page of ListObjectsV2.
    pub async fn list_objects(
        &self,
        bucket: &str,
        request: &ListObjectsRequest,
    ) -> Result<Response<CommonResponseHeaders, ListBucketResult>> {
        const ACTION: &str = "listObjects";
        let path = bucket_path(bucket)?;
        let (headers, body) = self
            .send_for_xml(ACTION, Method::GET, &path, &request.query(), Vec::new(), Bytes::new())
            .await?;
        let result = xml::parse_list_objects_response(ACTION, &body)?;
        Ok(Response::new(CommonResponseHeaders::from_headers(&headers), result))
    }

    /// Every object matching the request, following continuation tokens.
    pub async fn list_all_objects(
        &self,
        bucket: &str,
        request: &ListObjectsRequest,
    ) -> Result<Vec<S3Object>> {
        let mut all_objects = Vec::new();
        let mut page = request.clone();

        loop {
            let response = self.list_objects(bucket, &page).await?;
            let result = response.body;
            all_objects.extend(result.contents);

            match result.next_continuation_token {
                Some(token) if result.is_truncated => {
                    page.continuation_token = Some(token);
                }
                _ => break,
            }
        }

        tracing::debug!(bucket, objects = all_objects.len(), "listing complete");
        Ok(all_objects)
    }
}
