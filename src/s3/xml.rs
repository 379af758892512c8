//! XML bodies of S3 requests and responses
//!
//! Parsing walks quick-xml events and matches tags on their local name, so
//! namespace prefixes are ignored. Every parser fails with
//! [`S3Error::Unmarshal`] carrying the raw body text.

use crate::s3::error::{ErrorResponse, Result, S3Error};
use crate::s3::types::{
    AccessControlPolicy, CompleteMultipartUploadResponse, CompletedPart, CopyObjectResult, Grant,
    Grantee, GranteeType, InitMultipartUploadResponse, ListBucketResult, Owner, S3Object,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt::{Display, Write as FmtWrite};

const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

fn unmarshal(action: &'static str, data: &[u8], message: impl Display) -> S3Error {
    S3Error::Unmarshal {
        action,
        message: message.to_string(),
        raw: String::from_utf8_lossy(data).into_owned(),
    }
}

fn reader(data: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(data);
    reader.config_mut().trim_text_start = true;
    reader.config_mut().trim_text_end = true;
    reader
}

/// Walk a document whose root is `root` and whose fields are leaf children
/// of the root. `on_field` receives each child's local name and text.
fn parse_flat<F>(action: &'static str, data: &[u8], root: &[u8], mut on_field: F) -> Result<()>
where
    F: FnMut(&[u8], String),
{
    let mut reader = reader(data);
    let mut current_text = String::with_capacity(128);
    let mut depth = 0usize;
    let mut root_seen = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if depth == 0 {
                    check_root(action, data, root, &e)?;
                    root_seen = true;
                }
                depth += 1;
                current_text.clear();
            }
            Ok(Event::Empty(e)) => {
                if depth == 0 {
                    check_root(action, data, root, &e)?;
                    root_seen = true;
                }
            }
            Ok(Event::Text(e)) => {
                current_text.clear();
                current_text.push_str(&e.unescape().map_err(|e| unmarshal(action, data, e))?);
            }
            Ok(Event::End(e)) => {
                depth = depth.saturating_sub(1);
                if depth == 1 {
                    on_field(e.local_name().as_ref(), std::mem::take(&mut current_text));
                }
                current_text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(unmarshal(action, data, e)),
            _ => {}
        }
    }

    finish(action, data, root, root_seen, depth)
}

fn check_root(action: &'static str, data: &[u8], root: &[u8], e: &BytesStart<'_>) -> Result<()> {
    let name = e.local_name();
    if name.as_ref() == root {
        Ok(())
    } else {
        Err(unmarshal(
            action,
            data,
            format!(
                "expected <{}> but found <{}>",
                String::from_utf8_lossy(root),
                String::from_utf8_lossy(name.as_ref())
            ),
        ))
    }
}

fn finish(action: &'static str, data: &[u8], root: &[u8], root_seen: bool, depth: usize) -> Result<()> {
    if !root_seen {
        return Err(unmarshal(
            action,
            data,
            format!("missing <{}> element", String::from_utf8_lossy(root)),
        ));
    }
    if depth != 0 {
        return Err(unmarshal(action, data, "unexpected end of document"));
    }
    Ok(())
}

/// Whether the first element of `data` is an S3 `<Error>`.
pub fn is_error_document(data: &[u8]) -> bool {
    let mut reader = reader(data);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return e.local_name().as_ref() == b"Error";
            }
            Ok(Event::Eof) | Err(_) => return false,
            _ => {}
        }
    }
}

/// Parse an `<Error>` document.
pub fn parse_error_response(action: &'static str, data: &[u8]) -> Result<ErrorResponse> {
    let mut error = ErrorResponse::default();
    parse_flat(action, data, b"Error", |name, text| match name {
        b"Code" => error.code = Some(text),
        b"Message" => error.message = Some(text),
        b"Resource" => error.resource = Some(text),
        b"RequestId" => error.request_id = Some(text),
        b"HostId" => error.host_id = Some(text),
        _ => {}
    })?;
    Ok(error)
}

/// Parse `<InitiateMultipartUploadResult>`.
pub fn parse_init_multipart_response(
    action: &'static str,
    data: &[u8],
) -> Result<InitMultipartUploadResponse> {
    let mut response = InitMultipartUploadResponse::default();
    parse_flat(action, data, b"InitiateMultipartUploadResult", |name, text| match name {
        b"Bucket" => response.bucket = text,
        b"Key" => response.key = text,
        b"UploadId" => response.upload_id = text,
        _ => {}
    })?;
    if response.upload_id.is_empty() {
        return Err(unmarshal(action, data, "missing <UploadId>"));
    }
    Ok(response)
}

/// Parse `<CompleteMultipartUploadResult>`.
pub fn parse_complete_multipart_response(
    action: &'static str,
    data: &[u8],
) -> Result<CompleteMultipartUploadResponse> {
    let mut response = CompleteMultipartUploadResponse::default();
    parse_flat(action, data, b"CompleteMultipartUploadResult", |name, text| match name {
        b"Location" => response.location = Some(text),
        b"Bucket" => response.bucket = text,
        b"Key" => response.key = text,
        b"ETag" => response.etag = text.trim_matches('"').to_string(),
        _ => {}
    })?;
    Ok(response)
}

/// Parse `<CopyObjectResult>`.
pub fn parse_copy_object_result(action: &'static str, data: &[u8]) -> Result<CopyObjectResult> {
    let mut result = CopyObjectResult::default();
    parse_flat(action, data, b"CopyObjectResult", |name, text| match name {
        b"ETag" => result.etag = text.trim_matches('"').to_string(),
        b"LastModified" => result.last_modified = Some(text),
        _ => {}
    })?;
    Ok(result)
}

/// Parse a ListObjectsV2 `<ListBucketResult>`.
pub fn parse_list_objects_response(action: &'static str, data: &[u8]) -> Result<ListBucketResult> {
    let mut reader = reader(data);
    let mut response = ListBucketResult::default();

    let mut current_object: Option<S3Object> = None;
    let mut current_owner: Option<Owner> = None;
    let mut current_text = String::with_capacity(256);
    let mut in_common_prefixes = false;
    let mut depth = 0usize;
    let mut root_seen = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if depth == 0 {
                    check_root(action, data, b"ListBucketResult", &e)?;
                    root_seen = true;
                }
                depth += 1;
                match e.local_name().as_ref() {
                    b"Contents" => current_object = Some(S3Object::default()),
                    b"Owner" => current_owner = Some(Owner::default()),
                    b"CommonPrefixes" => in_common_prefixes = true,
                    _ => {}
                }
                current_text.clear();
            }
            Ok(Event::Empty(e)) => {
                if depth == 0 {
                    check_root(action, data, b"ListBucketResult", &e)?;
                    root_seen = true;
                }
            }
            Ok(Event::Text(e)) => {
                current_text.clear();
                current_text.push_str(&e.unescape().map_err(|e| unmarshal(action, data, e))?);
            }
            Ok(Event::End(e)) => {
                depth = depth.saturating_sub(1);
                let text = std::mem::take(&mut current_text);
                match (e.local_name().as_ref(), current_owner.as_mut(), current_object.as_mut()) {
                    (b"ID", Some(owner), _) => owner.id = Some(text),
                    (b"DisplayName", Some(owner), _) => owner.display_name = Some(text),
                    (b"Owner", _, Some(obj)) => obj.owner = current_owner.take(),
                    (b"Owner", _, None) => current_owner = None,
                    (b"Key", _, Some(obj)) => obj.key = text,
                    (b"Size", _, Some(obj)) => {
                        obj.size = text
                            .parse()
                            .map_err(|_| unmarshal(action, data, format!("invalid <Size> '{}'", text)))?;
                    }
                    (b"LastModified", _, Some(obj)) => obj.last_modified = Some(text),
                    (b"ETag", _, Some(obj)) => obj.etag = Some(text),
                    (b"StorageClass", _, Some(obj)) => obj.storage_class = Some(text),
                    (b"Contents", _, _) => {
                        if let Some(obj) = current_object.take() {
                            response.contents.push(obj);
                        }
                    }
                    (b"CommonPrefixes", _, _) => in_common_prefixes = false,
                    (b"Prefix", _, _) if in_common_prefixes => response.common_prefixes.push(text),
                    (b"Prefix", _, None) => response.prefix = Some(text),
                    (b"Name", _, None) => response.name = Some(text),
                    (b"Delimiter", _, None) => response.delimiter = Some(text),
                    (b"EncodingType", _, None) => response.encoding_type = Some(text),
                    (b"IsTruncated", _, None) => response.is_truncated = text == "true",
                    (b"ContinuationToken", _, None) => response.continuation_token = Some(text),
                    (b"NextContinuationToken", _, None) => {
                        response.next_continuation_token = Some(text)
                    }
                    (b"StartAfter", _, None) => response.start_after = Some(text),
                    (b"MaxKeys", _, None) => response.max_keys = text.parse().ok(),
                    (b"KeyCount", _, None) => response.key_count = text.parse().ok(),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(unmarshal(action, data, e)),
            _ => {}
        }
    }

    finish(action, data, b"ListBucketResult", root_seen, depth)?;
    Ok(response)
}

#[derive(Default)]
struct GranteeBuilder {
    kind: Option<GranteeType>,
    id: Option<String>,
    display_name: Option<String>,
    email_address: Option<String>,
    uri: Option<String>,
}

impl GranteeBuilder {
    fn from_start(e: &BytesStart<'_>) -> Self {
        let kind = e
            .attributes()
            .flatten()
            .find(|a| a.key.local_name().as_ref() == b"type")
            .and_then(|a| a.unescape_value().ok().and_then(|v| GranteeType::parse(&v)));
        Self {
            kind,
            ..Self::default()
        }
    }

    fn build(self) -> Grantee {
        let kind = self.kind.unwrap_or(if self.uri.is_some() {
            GranteeType::Group
        } else if self.email_address.is_some() {
            GranteeType::AmazonCustomerByEmail
        } else {
            GranteeType::CanonicalUser
        });
        Grantee {
            kind,
            id: self.id,
            display_name: self.display_name,
            email_address: self.email_address,
            uri: self.uri,
        }
    }
}

/// Parse `<AccessControlPolicy>`.
pub fn parse_access_control_policy(
    action: &'static str,
    data: &[u8],
) -> Result<AccessControlPolicy> {
    let mut reader = reader(data);
    let mut policy = AccessControlPolicy::default();

    let mut owner: Option<Owner> = None;
    let mut grantee: Option<GranteeBuilder> = None;
    let mut grant_grantee: Option<Grantee> = None;
    let mut permission: Option<String> = None;
    let mut current_text = String::with_capacity(128);
    let mut depth = 0usize;
    let mut root_seen = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if depth == 0 {
                    check_root(action, data, b"AccessControlPolicy", &e)?;
                    root_seen = true;
                }
                depth += 1;
                match e.local_name().as_ref() {
                    b"Owner" => owner = Some(Owner::default()),
                    b"Grantee" => grantee = Some(GranteeBuilder::from_start(&e)),
                    b"Grant" => {
                        grant_grantee = None;
                        permission = None;
                    }
                    _ => {}
                }
                current_text.clear();
            }
            Ok(Event::Empty(e)) => {
                if depth == 0 {
                    check_root(action, data, b"AccessControlPolicy", &e)?;
                    root_seen = true;
                }
            }
            Ok(Event::Text(e)) => {
                current_text.clear();
                current_text.push_str(&e.unescape().map_err(|e| unmarshal(action, data, e))?);
            }
            Ok(Event::End(e)) => {
                depth = depth.saturating_sub(1);
                let text = std::mem::take(&mut current_text);
                match e.local_name().as_ref() {
                    b"ID" => {
                        if let Some(g) = grantee.as_mut() {
                            g.id = Some(text);
                        } else if let Some(o) = owner.as_mut() {
                            o.id = Some(text);
                        }
                    }
                    b"DisplayName" => {
                        if let Some(g) = grantee.as_mut() {
                            g.display_name = Some(text);
                        } else if let Some(o) = owner.as_mut() {
                            o.display_name = Some(text);
                        }
                    }
                    b"EmailAddress" => {
                        if let Some(g) = grantee.as_mut() {
                            g.email_address = Some(text);
                        }
                    }
                    b"URI" => {
                        if let Some(g) = grantee.as_mut() {
                            g.uri = Some(text);
                        }
                    }
                    b"Owner" => policy.owner = owner.take(),
                    b"Grantee" => grant_grantee = grantee.take().map(GranteeBuilder::build),
                    b"Permission" => permission = Some(text),
                    b"Grant" => match (grant_grantee.take(), permission.take()) {
                        (Some(grantee), Some(permission)) => {
                            policy.grants.push(Grant { grantee, permission })
                        }
                        _ => return Err(unmarshal(action, data, "incomplete <Grant>")),
                    },
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(unmarshal(action, data, e)),
            _ => {}
        }
    }

    finish(action, data, b"AccessControlPolicy", root_seen, depth)?;
    Ok(policy)
}

/// Escape XML special characters
pub fn xml_escape_into(buf: &mut String, s: &str) {
    for ch in s.chars() {
        match ch {
            '&' => buf.push_str("&amp;"),
            '<' => buf.push_str("&lt;"),
            '>' => buf.push_str("&gt;"),
            '"' => buf.push_str("&quot;"),
            '\'' => buf.push_str("&apos;"),
            _ => buf.push(ch),
        }
    }
}

fn push_element(buf: &mut String, name: &str, value: &str) {
    let _ = write!(buf, "<{}>", name);
    xml_escape_into(buf, value);
    let _ = write!(buf, "</{}>", name);
}

/// `<CompleteMultipartUpload>` body listing parts in the given order.
pub fn write_complete_multipart_upload(parts: &[CompletedPart]) -> String {
    let mut xml = String::with_capacity(parts.len() * 100 + 100);
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
    xml.push_str("<CompleteMultipartUpload>");
    for part in parts {
        xml.push_str("<Part><PartNumber>");
        let _ = write!(xml, "{}", part.part_number);
        xml.push_str("</PartNumber><ETag>&quot;");
        xml_escape_into(&mut xml, part.etag.trim_matches('"'));
        xml.push_str("&quot;</ETag></Part>");
    }
    xml.push_str("</CompleteMultipartUpload>");
    xml
}

/// `<AccessControlPolicy>` body for a put-ACL request.
pub fn write_access_control_policy(policy: &AccessControlPolicy) -> String {
    let mut xml = String::with_capacity(256 + policy.grants.len() * 256);
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
    let _ = write!(xml, "<AccessControlPolicy xmlns=\"{}\">", S3_NAMESPACE);
    if let Some(owner) = &policy.owner {
        xml.push_str("<Owner>");
        if let Some(id) = &owner.id {
            push_element(&mut xml, "ID", id);
        }
        if let Some(name) = &owner.display_name {
            push_element(&mut xml, "DisplayName", name);
        }
        xml.push_str("</Owner>");
    }
    xml.push_str("<AccessControlList>");
    for grant in &policy.grants {
        let grantee = &grant.grantee;
        let _ = write!(
            xml,
            "<Grant><Grantee xmlns:xsi=\"{}\" xsi:type=\"{}\">",
            XSI_NAMESPACE,
            grantee.kind.as_str()
        );
        if let Some(id) = &grantee.id {
            push_element(&mut xml, "ID", id);
        }
        if let Some(name) = &grantee.display_name {
            push_element(&mut xml, "DisplayName", name);
        }
        if let Some(email) = &grantee.email_address {
            push_element(&mut xml, "EmailAddress", email);
        }
        if let Some(uri) = &grantee.uri {
            push_element(&mut xml, "URI", uri);
        }
        xml.push_str("</Grantee>");
        push_element(&mut xml, "Permission", &grant.permission);
        xml.push_str("</Grant>");
    }
    xml.push_str("</AccessControlList></AccessControlPolicy>");
    xml
}
