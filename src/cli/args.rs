//! Parsers for command line values

/// Parse an S3 path into bucket and optional key.
pub fn parse_s3_path(path: &str) -> anyhow::Result<(String, Option<String>)> {
    let path = path.trim();

    // Accept both "s3://bucket/key" (URI) and "s3/bucket/key" (mc-compatible)
    let stripped = if let Some(p) = path.strip_prefix("s3://") {
        p
    } else if let Some(p) = path.strip_prefix("s3/") {
        p
    } else {
        anyhow::bail!("Invalid S3 path format. Expected: s3://bucket/key");
    };

    let (bucket, key) = match stripped.split_once('/') {
        Some((bucket, key)) => (bucket, key),
        None => (stripped, ""),
    };

    if bucket.is_empty() {
        anyhow::bail!("Bucket name cannot be empty");
    }

    let key = (!key.is_empty()).then(|| key.to_string());

    Ok((bucket.to_string(), key))
}

/// Parse a `name=value` user metadata pair.
pub fn parse_meta(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("metadata name is empty in '{}'", s));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Parse size string like "10M", "1G", etc.
pub fn parse_size(size_str: &str) -> anyhow::Result<u64> {
    let size_str = size_str.trim().to_uppercase();
    let size_str = size_str.trim_end_matches("IB").trim_end_matches('B');
    let (num_str, multiplier) = if let Some(n) = size_str.strip_suffix('K') {
        (n, 1024u64)
    } else if let Some(n) = size_str.strip_suffix('M') {
        (n, 1024u64 * 1024)
    } else if let Some(n) = size_str.strip_suffix('G') {
        (n, 1024u64 * 1024 * 1024)
    } else {
        (size_str, 1u64)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid size format: {}", size_str))?;

    num.checked_mul(multiplier)
        .ok_or_else(|| anyhow::anyhow!("Size too large: {}", size_str))
}
