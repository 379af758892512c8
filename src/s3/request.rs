//! Request value types and their header/query population rules
//!
//! Every optional string is trimmed before it goes on the wire, and blank
//! values are left out entirely.

use crate::s3::types::{AccessControlPolicy, CompletedPart};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const AMZ_META_PREFIX: &str = "x-amz-meta-";

type Headers = Vec<(String, String)>;

fn push_trimmed(headers: &mut Headers, name: &str, value: Option<&str>) {
    if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
        headers.push((name.to_string(), v.to_string()));
    }
}

fn insert_trimmed(query: &mut BTreeMap<String, String>, name: &str, value: Option<&str>) {
    if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
        query.insert(name.to_string(), v.to_string());
    }
}

/// Base64 MD5 digest, as sent in `Content-MD5`.
pub fn content_md5(data: &[u8]) -> String {
    BASE64.encode(md5::compute(data).0)
}

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                $(if s.eq_ignore_ascii_case($wire) {
                    return Ok($name::$variant);
                })+
                Err(format!("unknown {} '{}'", stringify!($name), s))
            }
        }
    };
}

wire_enum!(
    /// `x-amz-storage-class`
    StorageClass {
        Standard => "STANDARD",
        ReducedRedundancy => "REDUCED_REDUNDANCY",
        StandardIa => "STANDARD_IA",
        OnezoneIa => "ONEZONE_IA",
        IntelligentTiering => "INTELLIGENT_TIERING",
        Glacier => "GLACIER",
        DeepArchive => "DEEP_ARCHIVE",
    }
);

wire_enum!(
    /// `x-amz-acl`
    CannedAcl {
        Private => "private",
        PublicRead => "public-read",
        PublicReadWrite => "public-read-write",
        AwsExecRead => "aws-exec-read",
        AuthenticatedRead => "authenticated-read",
        BucketOwnerRead => "bucket-owner-read",
        BucketOwnerFullControl => "bucket-owner-full-control",
        LogDeliveryWrite => "log-delivery-write",
    }
);

wire_enum!(
    /// `x-amz-metadata-directive`
    MetadataDirective {
        Copy => "COPY",
        Replace => "REPLACE",
    }
);

wire_enum!(
    /// `x-amz-tagging-directive`
    TaggingDirective {
        Copy => "COPY",
        Replace => "REPLACE",
    }
);

/// Object attributes shared by direct and multipart uploads.
///
/// Both upload paths render these through [`ObjectMetadata::populate_headers`]
/// so the stored object looks the same whichever path was taken.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub content_type: Option<String>,
    pub expires: Option<String>,
    /// User metadata, sent as `x-amz-meta-{name}`
    pub user_metadata: Vec<(String, String)>,
    pub storage_class: Option<StorageClass>,
    pub tagging: Option<String>,
    pub website_redirect_location: Option<String>,
}

impl ObjectMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_control(mut self, value: impl Into<String>) -> Self {
        self.cache_control = Some(value.into());
        self
    }

    pub fn with_content_disposition(mut self, value: impl Into<String>) -> Self {
        self.content_disposition = Some(value.into());
        self
    }

    pub fn with_content_encoding(mut self, value: impl Into<String>) -> Self {
        self.content_encoding = Some(value.into());
        self
    }

    pub fn with_content_type(mut self, value: impl Into<String>) -> Self {
        self.content_type = Some(value.into());
        self
    }

    pub fn with_expires(mut self, value: impl Into<String>) -> Self {
        self.expires = Some(value.into());
        self
    }

    pub fn with_meta(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_metadata.push((name.into(), value.into()));
        self
    }

    pub fn with_storage_class(mut self, storage_class: StorageClass) -> Self {
        self.storage_class = Some(storage_class);
        self
    }

    pub fn with_tagging(mut self, value: impl Into<String>) -> Self {
        self.tagging = Some(value.into());
        self
    }

    pub fn with_website_redirect_location(mut self, value: impl Into<String>) -> Self {
        self.website_redirect_location = Some(value.into());
        self
    }

    pub fn populate_headers(&self, headers: &mut Headers) {
        self.populate_content_headers(headers);
        push_trimmed(headers, "x-amz-tagging", self.tagging.as_deref());
    }

    /// Everything except tagging, which copy requests handle with a directive.
    fn populate_content_headers(&self, headers: &mut Headers) {
        push_trimmed(headers, "cache-control", self.cache_control.as_deref());
        push_trimmed(headers, "content-disposition", self.content_disposition.as_deref());
        push_trimmed(headers, "content-encoding", self.content_encoding.as_deref());
        push_trimmed(headers, "content-type", self.content_type.as_deref());
        push_trimmed(headers, "expires", self.expires.as_deref());
        for (name, value) in &self.user_metadata {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            headers.push((
                format!("{}{}", AMZ_META_PREFIX, name.to_ascii_lowercase()),
                value.trim().to_string(),
            ));
        }
        if let Some(class) = self.storage_class {
            headers.push(("x-amz-storage-class".to_string(), class.as_str().to_string()));
        }
        push_trimmed(
            headers,
            "x-amz-website-redirect-location",
            self.website_redirect_location.as_deref(),
        );
    }
}

/// Canned ACL and explicit grants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclHeaders {
    pub canned: Option<CannedAcl>,
    pub grant_read: Option<String>,
    pub grant_write: Option<String>,
    pub grant_read_acp: Option<String>,
    pub grant_write_acp: Option<String>,
    pub grant_full_control: Option<String>,
}

impl AclHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn canned(acl: CannedAcl) -> Self {
        Self {
            canned: Some(acl),
            ..Self::default()
        }
    }

    pub fn with_grant_read(mut self, grantees: impl Into<String>) -> Self {
        self.grant_read = Some(grantees.into());
        self
    }

    pub fn with_grant_write(mut self, grantees: impl Into<String>) -> Self {
        self.grant_write = Some(grantees.into());
        self
    }

    pub fn with_grant_read_acp(mut self, grantees: impl Into<String>) -> Self {
        self.grant_read_acp = Some(grantees.into());
        self
    }

    pub fn with_grant_write_acp(mut self, grantees: impl Into<String>) -> Self {
        self.grant_write_acp = Some(grantees.into());
        self
    }

    pub fn with_grant_full_control(mut self, grantees: impl Into<String>) -> Self {
        self.grant_full_control = Some(grantees.into());
        self
    }

    pub fn populate_headers(&self, headers: &mut Headers) {
        if let Some(acl) = self.canned {
            headers.push(("x-amz-acl".to_string(), acl.as_str().to_string()));
        }
        push_trimmed(headers, "x-amz-grant-read", self.grant_read.as_deref());
        push_trimmed(headers, "x-amz-grant-write", self.grant_write.as_deref());
        push_trimmed(headers, "x-amz-grant-read-acp", self.grant_read_acp.as_deref());
        push_trimmed(headers, "x-amz-grant-write-acp", self.grant_write_acp.as_deref());
        push_trimmed(
            headers,
            "x-amz-grant-full-control",
            self.grant_full_control.as_deref(),
        );
    }
}

/// Server-side encryption with a customer-provided key (SSE-C).
#[derive(Clone, PartialEq, Eq)]
pub struct SseCustomerHeaders {
    pub algorithm: String,
    /// Base64 encoded 256-bit key
    pub key: String,
    /// Base64 encoded MD5 of the raw key
    pub key_md5: String,
}

impl SseCustomerHeaders {
    pub fn new(key: impl Into<String>, key_md5: impl Into<String>) -> Self {
        Self {
            algorithm: "AES256".to_string(),
            key: key.into(),
            key_md5: key_md5.into(),
        }
    }

    /// Build the headers from raw key bytes.
    pub fn from_raw_key(key: &[u8]) -> Self {
        Self::new(BASE64.encode(key), content_md5(key))
    }

    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    pub fn populate_headers(&self, headers: &mut Headers) {
        push_trimmed(
            headers,
            "x-amz-server-side-encryption-customer-algorithm",
            Some(&self.algorithm),
        );
        push_trimmed(
            headers,
            "x-amz-server-side-encryption-customer-key",
            Some(&self.key),
        );
        push_trimmed(
            headers,
            "x-amz-server-side-encryption-customer-key-md5",
            Some(&self.key_md5),
        );
    }
}

impl fmt::Debug for SseCustomerHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SseCustomerHeaders")
            .field("algorithm", &self.algorithm)
            .field("key", &"<redacted>")
            .field("key_md5", &self.key_md5)
            .finish()
    }
}

/// Direct single-request upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutObjectRequest {
    pub body: Bytes,
    pub metadata: ObjectMetadata,
    pub content_md5: Option<String>,
    pub acl: AclHeaders,
    pub sse: Option<SseCustomerHeaders>,
}

impl PutObjectRequest {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, metadata: ObjectMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_content_md5(mut self, md5: impl Into<String>) -> Self {
        self.content_md5 = Some(md5.into());
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

    pub(crate) fn headers(&self) -> Headers {
        let mut headers = Vec::new();
        self.metadata.populate_headers(&mut headers);
        push_trimmed(&mut headers, "content-md5", self.content_md5.as_deref());
        self.acl.populate_headers(&mut headers);
        if let Some(sse) = &self.sse {
            sse.populate_headers(&mut headers);
        }
        headers
    }
}

/// Starts a multipart upload. Carries the same attributes as
/// [`PutObjectRequest`] minus the body-specific ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitMultipartUploadRequest {
    pub metadata: ObjectMetadata,
    pub acl: AclHeaders,
    /// SSE-C key; S3 expects the same key on every part
    pub sse: Option<SseCustomerHeaders>,
}

impl InitMultipartUploadRequest {
    pub fn new(metadata: ObjectMetadata) -> Self {
        Self {
            metadata,
            acl: AclHeaders::default(),
            sse: None,
        }
    }

    pub fn with_acl(mut self, acl: AclHeaders) -> Self {
        self.acl = acl;
        self
    }

    pub fn with_sse(mut self, sse: SseCustomerHeaders) -> Self {
        self.sse = Some(sse);
        self
    }

    pub(crate) fn headers(&self) -> Headers {
        let mut headers = Vec::new();
        self.metadata.populate_headers(&mut headers);
        self.acl.populate_headers(&mut headers);
        if let Some(sse) = &self.sse {
            sse.populate_headers(&mut headers);
        }
        headers
    }
}

/// One part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinueMultipartUploadRequest {
    pub upload_id: String,
    pub part_number: u32,
    pub body: Bytes,
    pub content_md5: Option<String>,
    pub sse: Option<SseCustomerHeaders>,
}

impl ContinueMultipartUploadRequest {
    pub fn new(upload_id: impl Into<String>, part_number: u32, body: impl Into<Bytes>) -> Self {
        Self {
            upload_id: upload_id.into(),
            part_number,
            body: body.into(),
            content_md5: None,
            sse: None,
        }
    }

    pub fn with_content_md5(mut self, md5: impl Into<String>) -> Self {
        self.content_md5 = Some(md5.into());
        self
    }

    pub fn with_sse(mut self, sse: SseCustomerHeaders) -> Self {
        self.sse = Some(sse);
        self
    }

    pub(crate) fn query(&self) -> BTreeMap<String, String> {
        let mut query = BTreeMap::new();
        query.insert("partNumber".to_string(), self.part_number.to_string());
        insert_trimmed(&mut query, "uploadId", Some(&self.upload_id));
        query
    }

    pub(crate) fn headers(&self) -> Headers {
        let mut headers = Vec::new();
        push_trimmed(&mut headers, "content-md5", self.content_md5.as_deref());
        if let Some(sse) = &self.sse {
            sse.populate_headers(&mut headers);
        }
        headers
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteMultipartUploadRequest {
    pub upload_id: String,
    pub parts: Vec<CompletedPart>,
}

impl CompleteMultipartUploadRequest {
    pub fn new(upload_id: impl Into<String>, parts: Vec<CompletedPart>) -> Self {
        Self {
            upload_id: upload_id.into(),
            parts,
        }
    }

    pub(crate) fn query(&self) -> BTreeMap<String, String> {
        upload_id_query(&self.upload_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortMultipartUploadRequest {
    pub upload_id: String,
}

impl AbortMultipartUploadRequest {
    pub fn new(upload_id: impl Into<String>) -> Self {
        Self {
            upload_id: upload_id.into(),
        }
    }

    pub(crate) fn query(&self) -> BTreeMap<String, String> {
        upload_id_query(&self.upload_id)
    }
}

fn upload_id_query(upload_id: &str) -> BTreeMap<String, String> {
    let mut query = BTreeMap::new();
    insert_trimmed(&mut query, "uploadId", Some(upload_id));
    query
}

/// Conditional and range headers shared by GET and HEAD.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectConditions {
    pub range: Option<String>,
    pub if_modified_since: Option<String>,
    pub if_unmodified_since: Option<String>,
    pub if_match: Option<String>,
    pub if_none_match: Option<String>,
}

impl ObjectConditions {
    fn populate_headers(&self, headers: &mut Headers) {
        push_trimmed(headers, "range", self.range.as_deref());
        push_trimmed(headers, "if-modified-since", self.if_modified_since.as_deref());
        push_trimmed(headers, "if-unmodified-since", self.if_unmodified_since.as_deref());
        push_trimmed(headers, "if-match", self.if_match.as_deref());
        push_trimmed(headers, "if-none-match", self.if_none_match.as_deref());
    }
}

macro_rules! condition_builders {
    ($name:ident) => {
        impl $name {
            pub fn with_range(mut self, range: impl Into<String>) -> Self {
                self.conditions.range = Some(range.into());
                self
            }

            /// Byte range `bytes={start}-{end}`, both ends inclusive.
            pub fn with_byte_range(self, start: u64, end: Option<u64>) -> Self {
                match end {
                    Some(end) => self.with_range(format!("bytes={}-{}", start, end)),
                    None => self.with_range(format!("bytes={}-", start)),
                }
            }

            pub fn with_if_modified_since(mut self, value: impl Into<String>) -> Self {
                self.conditions.if_modified_since = Some(value.into());
                self
            }

            pub fn with_if_unmodified_since(mut self, value: impl Into<String>) -> Self {
                self.conditions.if_unmodified_since = Some(value.into());
                self
            }

            pub fn with_if_match(mut self, value: impl Into<String>) -> Self {
                self.conditions.if_match = Some(value.into());
                self
            }

            pub fn with_if_none_match(mut self, value: impl Into<String>) -> Self {
                self.conditions.if_none_match = Some(value.into());
                self
            }

            pub fn with_sse(mut self, sse: SseCustomerHeaders) -> Self {
                self.sse = Some(sse);
                self
            }
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetObjectRequest {
    pub conditions: ObjectConditions,
    pub response_cache_control: Option<String>,
    pub response_content_disposition: Option<String>,
    pub response_content_encoding: Option<String>,
    pub response_content_language: Option<String>,
    pub response_content_type: Option<String>,
    pub response_expires: Option<String>,
    pub sse: Option<SseCustomerHeaders>,
}

condition_builders!(GetObjectRequest);

impl GetObjectRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response_cache_control(mut self, value: impl Into<String>) -> Self {
        self.response_cache_control = Some(value.into());
        self
    }

    pub fn with_response_content_disposition(mut self, value: impl Into<String>) -> Self {
        self.response_content_disposition = Some(value.into());
        self
    }

    pub fn with_response_content_encoding(mut self, value: impl Into<String>) -> Self {
        self.response_content_encoding = Some(value.into());
        self
    }

    pub fn with_response_content_language(mut self, value: impl Into<String>) -> Self {
        self.response_content_language = Some(value.into());
        self
    }

    pub fn with_response_content_type(mut self, value: impl Into<String>) -> Self {
        self.response_content_type = Some(value.into());
        self
    }

    pub fn with_response_expires(mut self, value: impl Into<String>) -> Self {
        self.response_expires = Some(value.into());
        self
    }

    pub(crate) fn query(&self) -> BTreeMap<String, String> {
        let mut query = BTreeMap::new();
        insert_trimmed(&mut query, "response-cache-control", self.response_cache_control.as_deref());
        insert_trimmed(
            &mut query,
            "response-content-disposition",
            self.response_content_disposition.as_deref(),
        );
        insert_trimmed(
            &mut query,
            "response-content-encoding",
            self.response_content_encoding.as_deref(),
        );
        insert_trimmed(
            &mut query,
            "response-content-language",
            self.response_content_language.as_deref(),
        );
        insert_trimmed(&mut query, "response-content-type", self.response_content_type.as_deref());
        insert_trimmed(&mut query, "response-expires", self.response_expires.as_deref());
        query
    }

    pub(crate) fn headers(&self) -> Headers {
        let mut headers = Vec::new();
        self.conditions.populate_headers(&mut headers);
        if let Some(sse) = &self.sse {
            sse.populate_headers(&mut headers);
        }
        headers
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadObjectRequest {
    pub conditions: ObjectConditions,
    pub sse: Option<SseCustomerHeaders>,
}

condition_builders!(HeadObjectRequest);

impl HeadObjectRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn headers(&self) -> Headers {
        let mut headers = Vec::new();
        self.conditions.populate_headers(&mut headers);
        if let Some(sse) = &self.sse {
            sse.populate_headers(&mut headers);
        }
        headers
    }
}

/// Server-side copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyObjectRequest {
    pub metadata: ObjectMetadata,
    pub metadata_directive: Option<MetadataDirective>,
    pub tagging_directive: Option<TaggingDirective>,
    pub copy_source_if_match: Option<String>,
    pub copy_source_if_none_match: Option<String>,
    pub copy_source_if_unmodified_since: Option<String>,
    pub copy_source_if_modified_since: Option<String>,
    pub acl: AclHeaders,
}

impl CopyObjectRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the destination's metadata instead of copying the source's.
    pub fn with_metadata(mut self, metadata: ObjectMetadata) -> Self {
        self.metadata = metadata;
        self.metadata_directive = Some(MetadataDirective::Replace);
        self
    }

    pub fn with_metadata_directive(mut self, directive: MetadataDirective) -> Self {
        self.metadata_directive = Some(directive);
        self
    }

    pub fn with_tagging_directive(mut self, directive: TaggingDirective) -> Self {
        self.tagging_directive = Some(directive);
        self
    }

    pub fn with_copy_source_if_match(mut self, etag: impl Into<String>) -> Self {
        self.copy_source_if_match = Some(etag.into());
        self
    }

    pub fn with_copy_source_if_none_match(mut self, etag: impl Into<String>) -> Self {
        self.copy_source_if_none_match = Some(etag.into());
        self
    }

    pub fn with_copy_source_if_unmodified_since(mut self, date: impl Into<String>) -> Self {
        self.copy_source_if_unmodified_since = Some(date.into());
        self
    }

    pub fn with_copy_source_if_modified_since(mut self, date: impl Into<String>) -> Self {
        self.copy_source_if_modified_since = Some(date.into());
        self
    }

    pub fn with_acl(mut self, acl: AclHeaders) -> Self {
        self.acl = acl;
        self
    }

    pub(crate) fn headers(&self) -> Headers {
        let mut headers = Vec::new();
        self.metadata.populate_content_headers(&mut headers);
        if let Some(directive) = self.metadata_directive {
            headers.push((
                "x-amz-metadata-directive".to_string(),
                directive.as_str().to_string(),
            ));
        }
        push_trimmed(
            &mut headers,
            "x-amz-copy-source-if-match",
            self.copy_source_if_match.as_deref(),
        );
        push_trimmed(
            &mut headers,
            "x-amz-copy-source-if-none-match",
            self.copy_source_if_none_match.as_deref(),
        );
        push_trimmed(
            &mut headers,
            "x-amz-copy-source-if-unmodified-since",
            self.copy_source_if_unmodified_since.as_deref(),
        );
        push_trimmed(
            &mut headers,
            "x-amz-copy-source-if-modified-since",
            self.copy_source_if_modified_since.as_deref(),
        );
        if let Some(directive) = self.tagging_directive {
            headers.push((
                "x-amz-tagging-directive".to_string(),
                directive.as_str().to_string(),
            ));
        }
        push_trimmed(&mut headers, "x-amz-tagging", self.metadata.tagging.as_deref());
        self.acl.populate_headers(&mut headers);
        headers
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteObjectRequest {
    /// `x-amz-mfa`: serial number and current token, space separated
    pub mfa: Option<String>,
}

impl DeleteObjectRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mfa(mut self, mfa: impl Into<String>) -> Self {
        self.mfa = Some(mfa.into());
        self
    }

    pub(crate) fn headers(&self) -> Headers {
        let mut headers = Vec::new();
        push_trimmed(&mut headers, "x-amz-mfa", self.mfa.as_deref());
        headers
    }
}

/// Either ACL headers, a full policy document, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutObjectAclRequest {
    pub acl: AclHeaders,
    pub policy: Option<AccessControlPolicy>,
}

impl PutObjectAclRequest {
    pub fn from_headers(acl: AclHeaders) -> Self {
        Self { acl, policy: None }
    }

    pub fn from_policy(policy: AccessControlPolicy) -> Self {
        Self {
            acl: AclHeaders::default(),
            policy: Some(policy),
        }
    }

    pub(crate) fn headers(&self) -> Headers {
        let mut headers = Vec::new();
        self.acl.populate_headers(&mut headers);
        headers
    }
}

/// ListObjectsV2 parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsRequest {
    pub continuation_token: Option<String>,
    pub delimiter: Option<String>,
    pub encoding_type: Option<String>,
    pub fetch_owner: Option<bool>,
    pub max_keys: Option<u32>,
    pub prefix: Option<String>,
    pub start_after: Option<String>,
}

impl ListObjectsRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_continuation_token(mut self, token: impl Into<String>) -> Self {
        self.continuation_token = Some(token.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn with_encoding_type(mut self, encoding_type: impl Into<String>) -> Self {
        self.encoding_type = Some(encoding_type.into());
        self
    }

    pub fn with_fetch_owner(mut self, fetch_owner: bool) -> Self {
        self.fetch_owner = Some(fetch_owner);
        self
    }

    pub fn with_max_keys(mut self, max_keys: u32) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_start_after(mut self, start_after: impl Into<String>) -> Self {
        self.start_after = Some(start_after.into());
        self
    }

    pub(crate) fn query(&self) -> BTreeMap<String, String> {
        let mut query = BTreeMap::new();
        query.insert("list-type".to_string(), "2".to_string());
        insert_trimmed(&mut query, "continuation-token", self.continuation_token.as_deref());
        insert_trimmed(&mut query, "delimiter", self.delimiter.as_deref());
        insert_trimmed(&mut query, "encoding-type", self.encoding_type.as_deref());
        if let Some(fetch_owner) = self.fetch_owner {
            query.insert("fetch-owner".to_string(), fetch_owner.to_string());
        }
        if let Some(max_keys) = self.max_keys {
            query.insert("max-keys".to_string(), max_keys.to_string());
        }
        // Prefix is not trimmed; leading spaces can be part of a key
        if let Some(prefix) = self.prefix.as_deref().filter(|p| !p.is_empty()) {
            query.insert("prefix".to_string(), prefix.to_string());
        }
        insert_trimmed(&mut query, "start-after", self.start_after.as_deref());
        query
    }
}
