use anyhow::{Context, Result};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Write as FmtWrite;
use std::io::Write;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio_util::io::ReaderStream;

use crate::core::Core;
use crate::s3::request::{
    AbortMultipartUploadRequest, AclHeaders, CannedAcl, CopyObjectRequest, DeleteObjectRequest, GetObjectRequest,
    HeadObjectRequest, ListObjectsRequest, ObjectMetadata, StorageClass,
};
use crate::s3::types::{AccessControlPolicy, S3Object};
use crate::s3::multipart::{AdaptiveUploadRequest, UploadOutcome};

// ============================================================================
// Utility functions
// ============================================================================

/// Format bytes in human-readable form (B, KB, MB, GB, TB) - verbose
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f64 = bytes as f64;
    let exponent = (bytes_f64.ln() / 1024_f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);

    let value = bytes_f64 / 1024_f64.powi(exponent as i32);

    if exponent == 0 {
        format!("{} {}", bytes, UNITS[exponent])
    } else {
        format!("{:.2} {}", value, UNITS[exponent])
    }
}

/// Format bytes in mc-compatible compact form (0B, 1.0KiB, 10MiB, etc.)
pub fn format_bytes_compact(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

    if bytes == 0 {
        return "0B".to_string();
    }

    let bytes_f64 = bytes as f64;
    let exponent = (bytes_f64.ln() / 1024_f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);

    let value = bytes_f64 / 1024_f64.powi(exponent as i32);

    if exponent == 0 {
        format!("{}B", bytes)
    } else if value >= 10.0 {
        format!("{:.0}{}", value, UNITS[exponent])
    } else {
        format!("{:.1}{}", value, UNITS[exponent])
    }
}

/// Format an S3 date string as [YYYY-MM-DD HH:MM:SS UTC]
pub fn format_s3_date(date_str: Option<&str>) -> String {
    let mut buf = String::with_capacity(24);
    match date_str {
        Some(s) => match s.split_once('T') {
            // Input is like "2026-01-22T20:44:33.219Z"
            Some((date_part, time_rest)) => {
                let time_part = time_rest.get(..8).unwrap_or(time_rest.trim_end_matches('Z'));
                let _ = write!(buf, "{} {} UTC", date_part, time_part);
            }
            None => buf.push_str(s),
        },
        // blank placeholder matching width
        None => buf.push_str("                       "),
    }
    buf
}

/// Byte progress bar; a spinner when the total is unknown.
fn transfer_bar(total: Option<u64>, message: String) -> Result<ProgressBar> {
    let pb = match total {
        Some(total) => {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {bytes}/{total_bytes} {msg}")?
                    .progress_chars("=>-"),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner} [{elapsed_precise}] {bytes} ({bytes_per_sec}) {msg}")?,
            );
            pb
        }
    };
    pb.set_message(message);
    Ok(pb)
}

// ============================================================================
// Commands
// ============================================================================

/// Flags of the put command
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub storage_class: Option<StorageClass>,
    pub acl: Option<CannedAcl>,
    pub meta: Vec<(String, String)>,
    pub tagging: Option<String>,
    pub cache_control: Option<String>,
    pub chunk_size: Option<u64>,
    pub parallel: Option<usize>,
    pub show_progress: bool,
}

impl PutOptions {
    fn metadata(&self) -> ObjectMetadata {
        let mut metadata = ObjectMetadata::new();
        if let Some(content_type) = &self.content_type {
            metadata = metadata.with_content_type(content_type.clone());
        }
        if let Some(storage_class) = self.storage_class {
            metadata = metadata.with_storage_class(storage_class);
        }
        if let Some(tagging) = &self.tagging {
            metadata = metadata.with_tagging(tagging.clone());
        }
        if let Some(cache_control) = &self.cache_control {
            metadata = metadata.with_cache_control(cache_control.clone());
        }
        for (name, value) in &self.meta {
            metadata = metadata.with_meta(name.clone(), value.clone());
        }
        metadata
    }
}

/// Upload a file, or stdin when `source` is `-`.
pub async fn cmd_put(core: &Core, source: &str, dest: &str, opts: &PutOptions) -> Result<()> {
    let (bucket, key) = core.locate_object(dest)?;

    let mut upload = core.upload_options();
    if let Some(chunk_size) = opts.chunk_size {
        upload.chunk_size = usize::try_from(chunk_size).context("Chunk size too large")?;
    }
    if let Some(parallel) = opts.parallel {
        upload.write_queue_max_parts = parallel;
    }

    let (reader, total): (Box<dyn AsyncRead + Unpin + Send>, Option<u64>) = if source == "-" {
        (Box::new(tokio::io::stdin()), None)
    } else {
        let file = tokio::fs::File::open(source)
            .await
            .with_context(|| format!("Failed to open {}", source))?;
        let size = file.metadata().await.ok().map(|m| m.len());
        (Box::new(file), size)
    };

    let pb = if opts.show_progress {
        Some(transfer_bar(total, format!("Uploading {}", key))?)
    } else {
        None
    };
    let progress = pb.clone();
    // Counts bytes taken from the source, not bytes acknowledged by S3
    let stream = ReaderStream::with_capacity(reader, upload.read_buffer_size).inspect(
        move |chunk| {
            if let (Some(pb), Ok(bytes)) = (&progress, chunk) {
                pb.inc(bytes.len() as u64);
            }
        },
    );

    let mut request = AdaptiveUploadRequest::new(stream)
        .with_metadata(opts.metadata())
        .with_options(upload);
    if let Some(acl) = opts.acl {
        request = request.with_acl(AclHeaders::canned(acl));
    }

    println!("{} -> s3://{}/{}", source, bucket, key);
    let result = core.s3_client().adaptive_upload(&bucket, &key, request).await;
    if let Some(pb) = &pb {
        match &result {
            Ok(_) => pb.finish_with_message("Upload complete"),
            Err(_) => pb.abandon_with_message("Upload failed"),
        }
    }
    let outcome = result.with_context(|| format!("Upload to s3://{}/{} failed", bucket, key))?;

    match &outcome {
        UploadOutcome::Direct { .. } => println!("  uploaded in a single request"),
        UploadOutcome::Multipart {
            upload_id,
            part_count,
            ..
        } => println!("  uploaded in {} parts (upload id {})", part_count, upload_id),
    }
    if let Some(etag) = outcome.etag() {
        println!("  ETag: {}", etag);
    }

    Ok(())
}

/// Download an object to a file, or stdout when `dest` is `-`.
pub async fn cmd_get(
    core: &Core,
    source: &str,
    dest: &str,
    range: Option<&str>,
    show_progress: bool,
) -> Result<()> {
    let (bucket, key) = core.locate_object(source)?;

    let mut request = GetObjectRequest::new();
    if let Some(range) = range {
        request = request.with_range(range);
    }

    let response = core
        .s3_client()
        .get_object(&bucket, &key, &request)
        .await
        .with_context(|| format!("Failed to get s3://{}/{}", bucket, key))?;

    let mut writer: Box<dyn tokio::io::AsyncWrite + Unpin + Send> = if dest == "-" {
        Box::new(tokio::io::stdout())
    } else {
        let path = std::path::Path::new(dest);
        // Create parent directories if needed
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        Box::new(tokio::fs::File::create(path).await?)
    };

    // Progress would interleave with the object on stdout
    let pb = if show_progress && dest != "-" {
        Some(transfer_bar(
            response.headers.common.content_length,
            format!("Downloading {}", key),
        )?)
    } else {
        None
    };

    let mut body = response.body;
    let mut bytes_written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await?;
        bytes_written += chunk.len() as u64;
        if let Some(pb) = &pb {
            pb.inc(chunk.len() as u64);
        }
    }
    writer.flush().await?;
    if let Some(pb) = pb {
        pb.finish_with_message("Download complete");
    }

    if dest != "-" {
        println!("s3://{}/{} -> {}", bucket, key, dest);
        println!("  {} downloaded", format_bytes(bytes_written));
    }

    Ok(())
}

/// Print object headers as JSON.
pub async fn cmd_head(core: &Core, path: &str) -> Result<()> {
    let (bucket, key) = core.locate_object(path)?;
    let headers = core
        .s3_client()
        .head_object(&bucket, &key, &HeadObjectRequest::new())
        .await
        .with_context(|| format!("Failed to stat s3://{}/{}", bucket, key))?;

    println!("{}", serde_json::to_string_pretty(&headers)?);
    Ok(())
}

pub async fn cmd_rm(core: &Core, path: &str) -> Result<()> {
    let (bucket, key) = core.locate_object(path)?;
    core.s3_client()
        .delete_object(&bucket, &key, &DeleteObjectRequest::new())
        .await
        .with_context(|| format!("Failed to delete s3://{}/{}", bucket, key))?;
    println!("Deleted: s3://{}/{}", bucket, key);
    Ok(())
}

fn write_object_line(out: &mut impl Write, obj: &S3Object) -> std::io::Result<()> {
    writeln!(
        out,
        "[{}] {:>7} {}",
        format_s3_date(obj.last_modified.as_deref()),
        format_bytes_compact(obj.size),
        obj.key
    )
}

/// List objects under a prefix, one page or all of them.
pub async fn cmd_ls(core: &Core, path: &str, max_keys: Option<u32>, all: bool) -> Result<()> {
    let (bucket, prefix) = core.locate(path)?;

    let mut request = ListObjectsRequest::new();
    if let Some(prefix) = prefix {
        request = request.with_prefix(prefix);
    }
    if let Some(max_keys) = max_keys {
        request = request.with_max_keys(max_keys);
    }

    // Buffer stdout to avoid per-line flush syscalls
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::with_capacity(64 * 1024, stdout.lock());

    let total_entries = if all {
        let objects = core.s3_client().list_all_objects(&bucket, &request).await?;
        for obj in &objects {
            write_object_line(&mut out, obj)?;
        }
        objects.len()
    } else {
        let request = request.with_delimiter("/");
        let result = core.s3_client().list_objects(&bucket, &request).await?.body;
        for prefix in &result.common_prefixes {
            writeln!(out, "[{}] {:>7} {}", format_s3_date(None), "PRE", prefix)?;
        }
        for obj in &result.contents {
            write_object_line(&mut out, obj)?;
        }
        if result.is_truncated {
            writeln!(out, "... more results available, use --all to list everything")?;
        }
        result.common_prefixes.len() + result.contents.len()
    };
    out.flush()?;
    drop(out);

    if total_entries == 0 {
        println!("No objects found");
    }

    Ok(())
}

/// Server-side copy between two S3 locations.
pub async fn cmd_cp(core: &Core, source: &str, dest: &str) -> Result<()> {
    let (source_bucket, source_key) = core.locate_object(source)?;
    let (bucket, key) = core.locate_object(dest)?;

    let response = core
        .s3_client()
        .copy_object(&source_bucket, &source_key, &bucket, &key, &CopyObjectRequest::new())
        .await
        .with_context(|| format!("Failed to copy {} to {}", source, dest))?;

    println!(
        "s3://{}/{} -> s3://{}/{}",
        source_bucket, source_key, bucket, key
    );
    println!("  ETag: {}", response.body.etag);
    Ok(())
}

fn print_policy(policy: &AccessControlPolicy) {
    if let Some(owner) = &policy.owner {
        println!(
            "Owner: {} ({})",
            owner.display_name.as_deref().unwrap_or("-"),
            owner.id.as_deref().unwrap_or("-")
        );
    }
    for grant in &policy.grants {
        let grantee = &grant.grantee;
        let who = grantee
            .display_name
            .as_deref()
            .or(grantee.id.as_deref())
            .or(grantee.email_address.as_deref())
            .or(grantee.uri.as_deref())
            .unwrap_or("-");
        println!("{:<12} {:<22} {}", grant.permission, grantee.kind.as_str(), who);
    }
}

/// Show the ACL of an object.
pub async fn cmd_acl(core: &Core, path: &str) -> Result<()> {
    let (bucket, key) = core.locate_object(path)?;
    let response = core
        .s3_client()
        .get_object_acl(&bucket, &key)
        .await
        .with_context(|| format!("Failed to get ACL of s3://{}/{}", bucket, key))?;
    print_policy(&response.body);
    Ok(())
}

/// Abort a multipart upload left behind by an interrupted put.
pub async fn cmd_abort(core: &Core, path: &str, upload_id: &str) -> Result<()> {
    let (bucket, key) = core.locate_object(path)?;
    core.s3_client()
        .abort_multipart_upload(&bucket, &key, &AbortMultipartUploadRequest::new(upload_id))
        .await
        .with_context(|| format!("Failed to abort upload {}", upload_id))?;
    println!("Aborted upload {} for s3://{}/{}", upload_id, bucket, key);
    Ok(())
}
