use std::env;
use std::fs;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

/// Environment variables are process wide; tests touching them run one at a time
static ENV_LOCK: Mutex<()> = Mutex::new(());

const ENV_VARS: &[&str] = &[
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_REGION",
    "S3_KEY",
    "S3_SECRET",
    "S3_REGION",
    "S3_ENDPOINT",
    "S3_PORT",
    "S3_USE_SSL",
    "S3_SIGN_PAYLOAD",
    "S3_TIMEOUT_MS",
    "S3_INSECURE_TLS",
    "S3_BUCKET",
    "S3_CHUNK_SIZE",
    "S3_MAX_PARTS_IN_FLIGHT",
];

/// Run `f` with only `vars` set among the variables the loader reads, then
/// restore the original environment.
fn with_env<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let saved: Vec<(&str, Option<String>)> =
        ENV_VARS.iter().map(|k| (*k, env::var(k).ok())).collect();

    for key in ENV_VARS {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    f();

    for (key, value) in saved {
        cleanup_env(key, value);
    }
}

/// Test loading configuration from YAML file
#[test]
fn test_load_yaml_config() {
    let yaml = r#"
profiles:
  test:
    access_key: AKIATEST
    secret_key: secrettest
    region: us-west-2
    hostname_override: minio.internal
    port: 9000
    use_ssl: false
    global_timeout_ms: 5000
    bucket: test-bucket

upload:
  chunk_size: 16777216
  write_queue_max_parts: 2
  abort_on_failure: false
  part_checksum: true

default_profile: test
"#;

    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, yaml).unwrap();

    let config = s3stream::config::load_from_yaml(&config_path).unwrap();

    assert_eq!(config.profiles.len(), 1);
    let profile = config.profiles.get("test").unwrap();
    assert_eq!(profile.access_key, "AKIATEST");
    assert_eq!(profile.secret_key, "secrettest");
    assert_eq!(profile.region, "us-west-2");
    assert_eq!(profile.hostname_override.as_deref(), Some("minio.internal"));
    assert_eq!(profile.port, Some(9000));
    assert!(!profile.use_ssl);
    assert_eq!(profile.global_timeout(), Duration::from_secs(5));
    assert_eq!(profile.bucket, Some("test-bucket".to_string()));

    assert_eq!(config.upload.chunk_size, 16 * 1024 * 1024);
    assert_eq!(config.upload.write_queue_max_parts, 2);
    assert!(!config.upload.abort_on_failure);
    assert!(config.upload.part_checksum);
    // Not given in the file
    assert_eq!(config.upload.read_buffer_size, 64 * 1024);
}

/// Test loading configuration from environment variables (AWS standard format)
#[test]
fn test_load_env_config_aws_format() {
    with_env(
        &[
            ("AWS_ACCESS_KEY_ID", "test_key"),
            ("AWS_SECRET_ACCESS_KEY", "test_secret"),
            ("AWS_REGION", "eu-west-1"),
            ("S3_BUCKET", "test-bucket"),
            ("S3_SIGN_PAYLOAD", "true"),
            ("S3_TIMEOUT_MS", "1500"),
        ],
        || {
            let config = s3stream::config::load_from_env().unwrap();

            assert_eq!(config.profiles.len(), 1);
            assert_eq!(config.default_profile, Some("default".to_string()));

            let profile = config.profile(None).unwrap();
            assert_eq!(profile.access_key, "test_key");
            assert_eq!(profile.secret_key, "test_secret");
            assert_eq!(profile.region, "eu-west-1");
            assert_eq!(profile.bucket, Some("test-bucket".to_string()));
            assert!(profile.sign_payload);
            assert_eq!(profile.global_timeout_ms, 1500);
            assert!(profile.use_ssl);
        },
    );
}

/// Test loading configuration from environment variables (short format)
#[test]
fn test_load_env_config_short_format() {
    with_env(
        &[
            ("S3_KEY", "short_key"),
            ("S3_SECRET", "short_secret"),
            ("S3_ENDPOINT", "http://localhost:9000"),
            ("S3_CHUNK_SIZE", "8388608"),
            ("S3_MAX_PARTS_IN_FLIGHT", "8"),
        ],
        || {
            let config = s3stream::config::load_from_env().unwrap();

            let profile = config.profiles.get("default").unwrap();
            assert_eq!(profile.access_key, "short_key");
            assert_eq!(profile.secret_key, "short_secret");
            // Should use default region when not specified
            assert_eq!(profile.region, "us-east-1");
            assert_eq!(profile.hostname_override.as_deref(), Some("localhost"));
            assert_eq!(profile.port, Some(9000));
            assert!(!profile.use_ssl);

            assert_eq!(config.upload.chunk_size, 8 * 1024 * 1024);
            assert_eq!(config.upload.write_queue_max_parts, 8);
        },
    );
}

#[test]
fn test_load_env_requires_credentials() {
    with_env(&[("AWS_ACCESS_KEY_ID", "only_key")], || {
        assert!(s3stream::config::load_from_env().is_err());
    });
}

#[test]
fn test_load_env_rejects_bad_numbers() {
    with_env(
        &[
            ("AWS_ACCESS_KEY_ID", "key"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("S3_PORT", "not-a-port"),
        ],
        || {
            let err = s3stream::config::load_from_env().unwrap_err();
            assert!(err.to_string().contains("S3_PORT"));
        },
    );
}

/// Test default values
#[test]
fn test_default_values() {
    let yaml = r#"
profiles:
  minimal:
    access_key: key
    secret_key: secret
"#;

    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, yaml).unwrap();

    let config = s3stream::config::load_from_yaml(&config_path).unwrap();

    let profile = config.profiles.get("minimal").unwrap();
    assert_eq!(profile.region, "us-east-1");
    assert_eq!(profile.service, "s3");
    assert_eq!(profile.bucket, None);
    assert!(profile.use_ssl);
    assert!(!profile.insecure_tls);
    assert_eq!(profile.global_timeout_ms, 30_000);

    assert_eq!(config.upload, s3stream::UploadOptions::default());
    assert_eq!(config.upload.chunk_size, 5 * 1024 * 1024);
    assert_eq!(config.upload.write_queue_max_parts, 4);
    assert!(config.upload.abort_on_failure);
}

/// Test profile selection
#[test]
fn test_profile_selection() {
    let yaml = r#"
profiles:
  prod:
    access_key: prod_key
    secret_key: prod_secret
  dev:
    access_key: dev_key
    secret_key: dev_secret

default_profile: prod
"#;

    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, yaml).unwrap();

    let config = s3stream::config::load_from_yaml(&config_path).unwrap();

    let dev_profile = config.profile(Some("dev")).unwrap();
    assert_eq!(dev_profile.access_key, "dev_key");

    // None specified, should use default_profile
    let default_profile = config.profile(None).unwrap();
    assert_eq!(default_profile.access_key, "prod_key");

    assert!(config.profile(Some("nonexistent")).is_none());

    // A named profile makes it the default
    let path = config_path.to_str().unwrap();
    let config = s3stream::config::load_config(Some(path), Some("dev")).unwrap();
    assert_eq!(config.profile(None).unwrap().access_key, "dev_key");

    let err = s3stream::config::load_config(Some(path), Some("staging")).unwrap_err();
    assert!(err.to_string().contains("staging"));
}

#[test]
fn test_missing_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("absent.yaml");
    assert!(s3stream::config::load_from_yaml(&missing).is_err());
}

/// Helper function to cleanup environment variables
fn cleanup_env(key: &str, orig_val: Option<String>) {
    match orig_val {
        Some(val) => env::set_var(key, val),
        None => env::remove_var(key),
    }
}
