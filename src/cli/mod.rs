//! CLI module for s3stream
//!
//! Command implementations behind the `s3stream` binary. Each command is a
//! thin layer over [`crate::s3::S3Client`]; uploads always go through the
//! adaptive path so files and stdin of any size stream without buffering.
//!
//! # Usage
//!
//! ```bash
//! # Upload a file (multipart above the chunk size)
//! s3stream put ./backup.tar s3://bucket/backups/backup.tar --storage-class STANDARD_IA
//!
//! # Upload from stdin
//! pg_dump db | s3stream put - s3://bucket/dumps/db.sql --meta source=pg_dump
//!
//! # Download, optionally a byte range
//! s3stream get s3://bucket/key ./local --range bytes=0-1023
//!
//! # Object headers as JSON
//! s3stream head s3://bucket/key
//!
//! # List one level, or everything under a prefix
//! s3stream ls s3://bucket/prefix/ --all
//! ```

pub mod args;
pub mod commands;
