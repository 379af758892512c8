//! s3stream - S3-compatible object storage client with SigV4 signing and
//! adaptive streaming uploads

pub mod cli;
pub mod config;
pub mod core;
pub mod s3;

pub use config::{ClientOptions, Config, UploadOptions};
pub use self::core::Core;
pub use s3::{S3Client, S3Error};
