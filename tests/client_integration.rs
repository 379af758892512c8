//! Integration tests for the object operations and error mapping

mod common;

use bytes::Bytes;
use common::{
    client, client_with, error_response, etag_response, options, response, MockTransport,
    ACCESS_KEY,
};
use hyper::header::{HeaderMap, HeaderValue};
use hyper::{Method, StatusCode};
use s3stream::s3::request::{CompleteMultipartUploadRequest, ContinueMultipartUploadRequest};
use s3stream::s3::types::{Grant, Grantee};
use s3stream::s3::{
    AccessControlPolicy, CopyObjectRequest, DeleteObjectRequest, GetObjectRequest,
    HeadObjectRequest, ListObjectsRequest, MetadataDirective, PutObjectAclRequest,
    PutObjectRequest, S3Client, S3Error, SystemClock, TransportResponse,
};
use std::sync::Arc;
use std::time::Duration;

fn list_page(keys: &[&str], next: Option<&str>) -> String {
    let mut xml = String::from("<ListBucketResult><Name>bucket</Name>");
    xml.push_str(&format!("<KeyCount>{}</KeyCount>", keys.len()));
    xml.push_str(&format!("<IsTruncated>{}</IsTruncated>", next.is_some()));
    if let Some(token) = next {
        xml.push_str(&format!("<NextContinuationToken>{}</NextContinuationToken>", token));
    }
    for key in keys {
        xml.push_str(&format!(
            "<Contents><Key>{}</Key><Size>10</Size><ETag>\"e\"</ETag></Contents>",
            key
        ));
    }
    xml.push_str("</ListBucketResult>");
    xml
}

#[tokio::test]
async fn test_requests_are_signed() {
    let transport = MockTransport::new(|_| etag_response("abc"));
    let client = client(transport.clone());

    client
        .put_object("bucket", "notes.txt", PutObjectRequest::new(Bytes::from_static(b"hi")))
        .await
        .unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.endpoint, "https://s3.amazonaws.com");
    assert_eq!(request.header("host"), Some("s3.amazonaws.com"));
    assert_eq!(request.header("x-amz-date"), Some("20130524T000000Z"));
    assert_eq!(request.header("x-amz-content-sha256"), Some("UNSIGNED-PAYLOAD"));

    let authorization = request.header("authorization").unwrap();
    let prefix = format!(
        "AWS4-HMAC-SHA256 Credential={}/20130524/us-east-1/s3/aws4_request, SignedHeaders=",
        ACCESS_KEY
    );
    assert!(authorization.starts_with(&prefix), "{}", authorization);
    assert!(authorization.contains("content-length;host;x-amz-content-sha256;x-amz-date"));
}

#[tokio::test]
async fn test_signed_payload_hash() {
    let transport = MockTransport::new(|_| etag_response("abc"));
    let client = client_with(&options().with_sign_payload(true), transport.clone());

    client
        .put_object("bucket", "empty", PutObjectRequest::new(Bytes::new()))
        .await
        .unwrap();

    assert_eq!(
        transport.requests()[0].header("x-amz-content-sha256"),
        Some("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
    );
}

#[tokio::test]
async fn test_custom_host_and_port() {
    let transport = MockTransport::new(|_| response(StatusCode::OK, Bytes::new()));
    let options = options()
        .with_hostname_override("localhost")
        .with_port(9000)
        .with_ssl(false);
    let client = client_with(&options, transport.clone());
    assert_eq!(client.endpoint(), "http://localhost:9000");

    client
        .delete_object("bucket", "key", &DeleteObjectRequest::new())
        .await
        .unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.uri(), "http://localhost:9000/bucket/key");
    assert_eq!(request.header("host"), Some("localhost:9000"));
}

#[tokio::test]
async fn test_default_port_is_omitted() {
    let transport = MockTransport::new(|_| response(StatusCode::OK, Bytes::new()));
    let options = options().with_region("eu-west-1").with_port(443);
    let client = client_with(&options, transport);

    assert_eq!(client.host(), "s3-eu-west-1.amazonaws.com");
    assert_eq!(client.endpoint(), "https://s3-eu-west-1.amazonaws.com");
}

#[tokio::test]
async fn test_padded_region_is_trimmed() {
    let transport = MockTransport::new(|_| etag_response("abc"));
    let options = options().with_region(" eu-west-1 ");
    let client = client_with(&options, transport.clone());

    assert_eq!(client.host(), "s3-eu-west-1.amazonaws.com");

    client
        .put_object("bucket", "k", PutObjectRequest::new(Bytes::from_static(b"hi")))
        .await
        .unwrap();
    let request = &transport.requests()[0];
    assert_eq!(request.header("host"), Some("s3-eu-west-1.amazonaws.com"));
    let authorization = request.header("authorization").unwrap();
    assert!(authorization.contains("/20130524/eu-west-1/s3/aws4_request"));
}

#[tokio::test]
async fn test_invalid_region_fails_construction() {
    let transport = MockTransport::new(|_| etag_response("abc"));
    let clock = Arc::new(SystemClock);
    let result = S3Client::with_transport(&options().with_region("eu west-1"), transport, clock);
    assert!(matches!(result, Err(S3Error::Config(_))));
}

#[tokio::test]
async fn test_get_object_streams_body() {
    let transport = MockTransport::new(|_| {
        let mut headers = HeaderMap::new();
        headers.insert("content-range", HeaderValue::from_static("bytes 0-4/11"));
        headers.insert("x-amz-meta-owner", HeaderValue::from_static("alice"));
        Ok(TransportResponse::new(
            StatusCode::PARTIAL_CONTENT,
            headers,
            Bytes::from_static(b"hello"),
        ))
    });
    let client = client(transport.clone());

    let request = GetObjectRequest::new()
        .with_byte_range(0, Some(4))
        .with_response_content_type("text/plain");
    let response = client.get_object("bucket", "dir/a b.txt", &request).await.unwrap();

    assert_eq!(response.headers.content_range.as_deref(), Some("bytes 0-4/11"));
    assert_eq!(response.headers.meta("owner"), Some("alice"));
    assert_eq!(response.body.collect().await.unwrap(), Bytes::from_static(b"hello"));

    let sent = &transport.requests()[0];
    assert_eq!(sent.method, Method::GET);
    assert_eq!(sent.path, "/bucket/dir/a%20b.txt");
    assert_eq!(sent.header("range"), Some("bytes=0-4"));
    assert_eq!(
        sent.query_param("response-content-type").as_deref(),
        Some("text/plain")
    );
}

#[tokio::test]
async fn test_not_found_maps_error_document() {
    let transport =
        MockTransport::new(|_| error_response(StatusCode::NOT_FOUND, "NoSuchKey"));
    let client = client(transport);

    let err = client
        .get_object("bucket", "missing", &GetObjectRequest::new())
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    match err {
        S3Error::S3Response {
            action,
            status_message,
            error: Some(error),
            ..
        } => {
            assert_eq!(action, "getObject");
            assert_eq!(status_message, "Not Found");
            assert_eq!(error.code.as_deref(), Some("NoSuchKey"));
            assert_eq!(error.request_id.as_deref(), Some("4442587FB7D0A2F9"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_forbidden_on_delete() {
    let transport =
        MockTransport::new(|_| error_response(StatusCode::FORBIDDEN, "AccessDenied"));
    let client = client(transport);

    let err = client
        .delete_object("bucket", "key", &DeleteObjectRequest::new().with_mfa("serial 123456"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
    assert_eq!(
        err.error_response().and_then(|e| e.code.as_deref()),
        Some("AccessDenied")
    );
}

#[tokio::test]
async fn test_unparseable_error_body() {
    let transport = MockTransport::new(|_| {
        response(StatusCode::BAD_GATEWAY, "<html><body>bad gateway</body></html>")
    });
    let client = client(transport);

    let err = client
        .get_object("bucket", "key", &GetObjectRequest::new())
        .await
        .unwrap_err();

    match err {
        S3Error::Unmarshal { action, raw, .. } => {
            assert_eq!(action, "getObject");
            assert!(raw.contains("bad gateway"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_error_body_is_unmarshal_error() {
    let transport = MockTransport::new(|_| response(StatusCode::INTERNAL_SERVER_ERROR, Bytes::new()));
    let client = client(transport);

    let err = client
        .delete_object("bucket", "key", &DeleteObjectRequest::new())
        .await
        .unwrap_err();
    assert!(matches!(err, S3Error::Unmarshal { .. }));
}

#[tokio::test]
async fn test_head_error_has_no_document() {
    let transport = MockTransport::new(|_| response(StatusCode::NOT_FOUND, Bytes::new()));
    let client = client(transport.clone());

    let err = client
        .head_object("bucket", "missing", &HeadObjectRequest::new())
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(err.error_response().is_none());
    assert_eq!(transport.requests()[0].method, Method::HEAD);
}

#[tokio::test]
async fn test_timeout() {
    let transport = MockTransport::new(|_| response(StatusCode::OK, Bytes::new()))
        .with_delay(Duration::from_secs(5));
    let client = client(transport).with_timeout(Duration::from_millis(20));

    let err = client
        .head_object("bucket", "slow", &HeadObjectRequest::new())
        .await
        .unwrap_err();
    assert!(matches!(err, S3Error::Timeout(d) if d == Duration::from_millis(20)));
}

#[tokio::test]
async fn test_blank_names_send_nothing() {
    let transport = MockTransport::new(|_| response(StatusCode::OK, Bytes::new()));
    let client = client(transport.clone());

    let err = client
        .head_object("bucket", "  ", &HeadObjectRequest::new())
        .await
        .unwrap_err();
    assert!(matches!(err, S3Error::InvalidRequest(_)));

    let err = client
        .put_object("bucket", "///", PutObjectRequest::new(Bytes::from_static(b"x")))
        .await
        .unwrap_err();
    assert!(matches!(err, S3Error::InvalidRequest(_)));

    let err = client
        .list_objects("", &ListObjectsRequest::new())
        .await
        .unwrap_err();
    assert!(matches!(err, S3Error::InvalidRequest(_)));

    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_part_number_out_of_range() {
    let transport = MockTransport::new(|_| etag_response("p"));
    let client = client(transport.clone());

    for number in [0, 10_001] {
        let request = ContinueMultipartUploadRequest::new("id", number, Bytes::from_static(b"x"));
        let err = client
            .continue_multipart_upload("bucket", "key", request)
            .await
            .unwrap_err();
        assert!(matches!(err, S3Error::InvalidRequest(_)));
    }
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_error_inside_complete_response() {
    let transport = MockTransport::new(|_| {
        response(
            StatusCode::OK,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <Error><Code>InternalError</Code><Message>try again</Message></Error>",
        )
    });
    let client = client(transport);

    let request = CompleteMultipartUploadRequest::new(
        "upload-1",
        vec![s3stream::s3::CompletedPart::new(1, "etag-1")],
    );
    let err = client
        .complete_multipart_upload("bucket", "key", &request)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::OK));
    assert_eq!(
        err.error_response().and_then(|e| e.message.as_deref()),
        Some("try again")
    );
}

#[tokio::test]
async fn test_copy_object() {
    let transport = MockTransport::new(|_| {
        response(
            StatusCode::OK,
            "<CopyObjectResult><LastModified>2013-05-24T00:00:00.000Z</LastModified>\
             <ETag>\"copied\"</ETag></CopyObjectResult>",
        )
    });
    let client = client(transport.clone());

    let request = CopyObjectRequest::new().with_metadata_directive(MetadataDirective::Copy);
    let response = client
        .copy_object("src-bucket", "dir/a b.txt", "dst-bucket", "copy.txt", &request)
        .await
        .unwrap();
    assert_eq!(response.body.etag, "copied");

    let sent = &transport.requests()[0];
    assert_eq!(sent.method, Method::PUT);
    assert_eq!(sent.path, "/dst-bucket/copy.txt");
    assert_eq!(sent.header("x-amz-copy-source"), Some("/src-bucket/dir/a%20b.txt"));
    assert_eq!(sent.header("x-amz-metadata-directive"), Some("COPY"));
}

#[tokio::test]
async fn test_list_all_objects_follows_tokens() {
    let transport = MockTransport::new(|req| {
        let body = match req.query_param("continuation-token").as_deref() {
            None => list_page(&["a", "b"], Some("page/2")),
            Some("page/2") => list_page(&["c"], Some("page3")),
            Some(_) => list_page(&["d"], None),
        };
        response(StatusCode::OK, body)
    });
    let client = client(transport.clone());

    let objects = client
        .list_all_objects("bucket", &ListObjectsRequest::new().with_prefix("logs/"))
        .await
        .unwrap();

    let keys: Vec<&str> = objects.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(keys, vec!["a", "b", "c", "d"]);

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    for request in &requests {
        assert_eq!(request.path, "/bucket");
        assert_eq!(request.query_param("list-type").as_deref(), Some("2"));
        assert_eq!(request.query_param("prefix").as_deref(), Some("logs/"));
    }
    assert_eq!(
        requests[1].query_param("continuation-token").as_deref(),
        Some("page/2")
    );
}

#[tokio::test]
async fn test_object_acl_round_trip() {
    let transport = MockTransport::new(|req| {
        if req.method == Method::GET {
            return response(
                StatusCode::OK,
                "<AccessControlPolicy xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
                 <Owner><ID>owner-id</ID><DisplayName>owner</DisplayName></Owner>\
                 <AccessControlList><Grant>\
                 <Grantee xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
                 xsi:type=\"CanonicalUser\"><ID>owner-id</ID></Grantee>\
                 <Permission>FULL_CONTROL</Permission></Grant></AccessControlList>\
                 </AccessControlPolicy>",
            );
        }
        response(StatusCode::OK, Bytes::new())
    });
    let client = client(transport.clone());

    let policy = client.get_object_acl("bucket", "key").await.unwrap().body;
    assert_eq!(
        policy.owner.as_ref().and_then(|o| o.id.as_deref()),
        Some("owner-id")
    );
    assert_eq!(policy.grants.len(), 1);
    assert_eq!(policy.grants[0].permission, "FULL_CONTROL");

    let update = AccessControlPolicy {
        owner: policy.owner.clone(),
        grants: vec![Grant {
            grantee: Grantee::group("http://acs.amazonaws.com/groups/global/AllUsers"),
            permission: "READ".to_string(),
        }],
    };
    client
        .put_object_acl("bucket", "key", &PutObjectAclRequest::from_policy(update))
        .await
        .unwrap();

    let put = &transport.requests()[1];
    assert_eq!(put.method, Method::PUT);
    assert_eq!(put.query, "acl=");
    assert_eq!(put.header("content-type"), Some("application/xml"));
    let body = String::from_utf8(put.body.to_vec()).unwrap();
    assert!(body.contains("<Permission>READ</Permission>"));
    assert!(body.contains("AllUsers"));
}
