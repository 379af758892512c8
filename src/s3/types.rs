//! S3 response types: mapped response headers and parsed XML bodies

use hyper::header::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::s3::request::AMZ_META_PREFIX;

/// Non-blank, trimmed header value
fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn header_parse<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    header_str(headers, name).and_then(|v| v.parse().ok())
}

/// Headers plus body of a response.
#[derive(Debug)]
pub struct Response<H, B> {
    pub headers: H,
    pub body: B,
}

impl<H, B> Response<H, B> {
    pub fn new(headers: H, body: B) -> Self {
        Self { headers, body }
    }
}

/// Headers present on every S3 response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonResponseHeaders {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub date: Option<String>,
    pub etag: Option<String>,
    pub connection: Option<String>,
    pub server: Option<String>,
    pub delete_marker: Option<bool>,
    pub amz_id_2: Option<String>,
    pub request_id: Option<String>,
    pub version_id: Option<String>,
}

impl CommonResponseHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            content_type: header_str(headers, "content-type"),
            content_length: header_parse(headers, "content-length"),
            date: header_str(headers, "date"),
            etag: header_str(headers, "etag"),
            connection: header_str(headers, "connection"),
            server: header_str(headers, "server"),
            delete_marker: header_parse(headers, "x-amz-delete-marker"),
            amz_id_2: header_str(headers, "x-amz-id-2"),
            request_id: header_str(headers, "x-amz-request-id"),
            version_id: header_str(headers, "x-amz-version-id"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSideEncryptionHeaders {
    pub server_side_encryption: Option<String>,
    pub aws_kms_key_id: Option<String>,
    pub customer_algorithm: Option<String>,
    pub customer_key_md5: Option<String>,
}

impl ServerSideEncryptionHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            server_side_encryption: header_str(headers, "x-amz-server-side-encryption"),
            aws_kms_key_id: header_str(headers, "x-amz-server-side-encryption-aws-kms-key-id"),
            customer_algorithm: header_str(
                headers,
                "x-amz-server-side-encryption-customer-algorithm",
            ),
            customer_key_md5: header_str(headers, "x-amz-server-side-encryption-customer-key-md5"),
        }
    }
}

/// Headers returned by GET and HEAD on an object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectResponseHeaders {
    #[serde(flatten)]
    pub common: CommonResponseHeaders,
    #[serde(flatten)]
    pub sse: ServerSideEncryptionHeaders,
    pub last_modified: Option<String>,
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
    pub expires: Option<String>,
    pub accept_ranges: Option<String>,
    pub content_range: Option<String>,
    pub expiration: Option<String>,
    pub missing_meta: Option<String>,
    pub replication_status: Option<String>,
    pub restore: Option<String>,
    pub storage_class: Option<String>,
    pub tagging_count: Option<u32>,
    pub website_redirect_location: Option<String>,
    /// `x-amz-meta-*` headers with the prefix stripped
    pub user_metadata: Vec<(String, String)>,
}

pub type GetObjectResponseHeaders = ObjectResponseHeaders;
pub type HeadObjectResponseHeaders = ObjectResponseHeaders;

impl ObjectResponseHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let user_metadata = headers
            .iter()
            .filter_map(|(name, value)| {
                let meta = name.as_str().strip_prefix(AMZ_META_PREFIX)?;
                let value = value.to_str().ok()?;
                Some((meta.to_string(), value.to_string()))
            })
            .collect();

        Self {
            common: CommonResponseHeaders::from_headers(headers),
            sse: ServerSideEncryptionHeaders::from_headers(headers),
            last_modified: header_str(headers, "last-modified"),
            cache_control: header_str(headers, "cache-control"),
            content_disposition: header_str(headers, "content-disposition"),
            content_encoding: header_str(headers, "content-encoding"),
            content_language: header_str(headers, "content-language"),
            expires: header_str(headers, "expires"),
            accept_ranges: header_str(headers, "accept-ranges"),
            content_range: header_str(headers, "content-range"),
            expiration: header_str(headers, "x-amz-expiration"),
            missing_meta: header_str(headers, "x-amz-missing-meta"),
            replication_status: header_str(headers, "x-amz-replication-status"),
            restore: header_str(headers, "x-amz-restore"),
            storage_class: header_str(headers, "x-amz-storage-class"),
            tagging_count: header_parse(headers, "x-amz-tagging-count"),
            website_redirect_location: header_str(headers, "x-amz-website-redirect-location"),
            user_metadata,
        }
    }

    pub fn meta(&self, name: &str) -> Option<&str> {
        self.user_metadata
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Headers returned by PUT, part upload and multipart completion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutObjectResponseHeaders {
    #[serde(flatten)]
    pub common: CommonResponseHeaders,
    #[serde(flatten)]
    pub sse: ServerSideEncryptionHeaders,
    pub expiration: Option<String>,
}

impl PutObjectResponseHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            common: CommonResponseHeaders::from_headers(headers),
            sse: ServerSideEncryptionHeaders::from_headers(headers),
            expiration: header_str(headers, "x-amz-expiration"),
        }
    }

    /// ETag with surrounding quotes removed
    pub fn etag(&self) -> Option<&str> {
        self.common.etag.as_deref().map(|e| e.trim_matches('"'))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitMultipartUploadResponseHeaders {
    #[serde(flatten)]
    pub common: CommonResponseHeaders,
    #[serde(flatten)]
    pub sse: ServerSideEncryptionHeaders,
    pub abort_date: Option<String>,
    pub abort_rule_id: Option<String>,
}

impl InitMultipartUploadResponseHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            common: CommonResponseHeaders::from_headers(headers),
            sse: ServerSideEncryptionHeaders::from_headers(headers),
            abort_date: header_str(headers, "x-amz-abort-date"),
            abort_rule_id: header_str(headers, "x-amz-abort-rule-id"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyObjectResponseHeaders {
    #[serde(flatten)]
    pub common: CommonResponseHeaders,
    #[serde(flatten)]
    pub sse: ServerSideEncryptionHeaders,
    pub expiration: Option<String>,
    pub copy_source_version_id: Option<String>,
}

impl CopyObjectResponseHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            common: CommonResponseHeaders::from_headers(headers),
            sse: ServerSideEncryptionHeaders::from_headers(headers),
            expiration: header_str(headers, "x-amz-expiration"),
            copy_source_version_id: header_str(headers, "x-amz-copy-source-version-id"),
        }
    }
}

// =============================================================================
// Multipart Upload Types
// =============================================================================

/// `<InitiateMultipartUploadResult>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitMultipartUploadResponse {
    pub bucket: String,
    pub key: String,
    /// Upload ID for subsequent part uploads and completion
    pub upload_id: String,
}

/// Part information for CompleteMultipartUpload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    /// Part number (1-10000)
    pub part_number: u32,
    /// ETag returned from the part upload, without quotes
    pub etag: String,
}

impl CompletedPart {
    pub fn new(part_number: u32, etag: impl Into<String>) -> Self {
        Self {
            part_number,
            etag: etag.into().trim_matches('"').to_string(),
        }
    }
}

/// `<CompleteMultipartUploadResult>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteMultipartUploadResponse {
    /// Location URL of the completed object
    pub location: Option<String>,
    pub bucket: String,
    pub key: String,
    /// ETag of the completed object
    pub etag: String,
}

// =============================================================================
// Copy / list / ACL bodies
// =============================================================================

/// `<CopyObjectResult>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyObjectResult {
    pub etag: String,
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: Option<String>,
    pub display_name: Option<String>,
}

/// S3 Object metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Object {
    pub key: String,
    /// Object size in bytes
    pub size: u64,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
    /// Storage class (STANDARD, STANDARD_IA, GLACIER, etc.)
    pub storage_class: Option<String>,
    /// Present when the listing was requested with `fetch-owner`
    pub owner: Option<Owner>,
}

impl S3Object {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            ..Self::default()
        }
    }
}

/// `<ListBucketResult>` of ListObjectsV2
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListBucketResult {
    pub name: Option<String>,
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub encoding_type: Option<String>,
    pub max_keys: Option<u32>,
    /// Key count in this response
    pub key_count: Option<u32>,
    pub is_truncated: bool,
    pub continuation_token: Option<String>,
    /// Token for the next page
    pub next_continuation_token: Option<String>,
    pub start_after: Option<String>,
    pub contents: Vec<S3Object>,
    /// Common prefixes (subdirectories when using delimiter)
    pub common_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GranteeType {
    CanonicalUser,
    AmazonCustomerByEmail,
    Group,
}

impl GranteeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GranteeType::CanonicalUser => "CanonicalUser",
            GranteeType::AmazonCustomerByEmail => "AmazonCustomerByEmail",
            GranteeType::Group => "Group",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CanonicalUser" => Some(GranteeType::CanonicalUser),
            "AmazonCustomerByEmail" => Some(GranteeType::AmazonCustomerByEmail),
            "Group" => Some(GranteeType::Group),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grantee {
    pub kind: GranteeType,
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub email_address: Option<String>,
    pub uri: Option<String>,
}

impl Grantee {
    pub fn canonical_user(id: impl Into<String>) -> Self {
        Self {
            kind: GranteeType::CanonicalUser,
            id: Some(id.into()),
            display_name: None,
            email_address: None,
            uri: None,
        }
    }

    pub fn group(uri: impl Into<String>) -> Self {
        Self {
            kind: GranteeType::Group,
            id: None,
            display_name: None,
            email_address: None,
            uri: Some(uri.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub grantee: Grantee,
    /// FULL_CONTROL, WRITE, WRITE_ACP, READ or READ_ACP
    pub permission: String,
}

/// `<AccessControlPolicy>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlPolicy {
    pub owner: Option<Owner>,
    pub grants: Vec<Grant>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn test_object_headers_mapping() {
        let mut headers = HeaderMap::new();
        headers.insert("etag", HeaderValue::from_static("\"abc\""));
        headers.insert("content-length", HeaderValue::from_static("42"));
        headers.insert("x-amz-meta-owner", HeaderValue::from_static("alice"));
        headers.insert("x-amz-storage-class", HeaderValue::from_static("GLACIER"));
        headers.insert("x-amz-tagging-count", HeaderValue::from_static("2"));
        headers.insert("x-amz-version-id", HeaderValue::from_static("  "));

        let mapped = ObjectResponseHeaders::from_headers(&headers);
        assert_eq!(mapped.common.etag.as_deref(), Some("\"abc\""));
        assert_eq!(mapped.common.content_length, Some(42));
        assert_eq!(mapped.common.version_id, None);
        assert_eq!(mapped.storage_class.as_deref(), Some("GLACIER"));
        assert_eq!(mapped.tagging_count, Some(2));
        assert_eq!(mapped.meta("Owner"), Some("alice"));
    }

    #[test]
    fn test_put_headers_etag_unquoted() {
        let mut headers = HeaderMap::new();
        headers.insert("etag", HeaderValue::from_static("\"d41d8cd9\""));
        headers.insert("x-amz-expiration", HeaderValue::from_static("expiry-date"));
        let mapped = PutObjectResponseHeaders::from_headers(&headers);
        assert_eq!(mapped.etag(), Some("d41d8cd9"));
        assert_eq!(mapped.expiration.as_deref(), Some("expiry-date"));
    }

    #[test]
    fn test_completed_part_strips_quotes() {
        assert_eq!(CompletedPart::new(1, "\"abc\"").etag, "abc");
    }
}
