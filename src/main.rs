use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use s3stream::cli::args::{parse_meta, parse_size};
use s3stream::cli::commands::{self, PutOptions};
use s3stream::config;
use s3stream::core::Core;
use s3stream::s3::request::{CannedAcl, StorageClass};

#[derive(Parser)]
#[command(name = "s3stream")]
#[command(version, about = "S3 client with streaming uploads of any size", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(long, global = true, env = "S3STREAM_CONFIG")]
    config: Option<String>,

    /// Profile to use from config
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Disable SSL certificate verification
    #[arg(long, global = true)]
    insecure: bool,

    /// Hide transfer progress bars
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file or stdin
    Put {
        /// Local file, or - for stdin
        source: String,

        /// Destination (s3://bucket/key)
        destination: String,

        #[arg(long)]
        content_type: Option<String>,

        /// STANDARD, STANDARD_IA, GLACIER, ...
        #[arg(long)]
        storage_class: Option<StorageClass>,

        /// Canned ACL (private, public-read, ...)
        #[arg(long)]
        acl: Option<CannedAcl>,

        /// User metadata, repeatable (name=value)
        #[arg(long = "meta", value_parser = parse_meta)]
        meta: Vec<(String, String)>,

        /// URL-encoded tag set (k1=v1&k2=v2)
        #[arg(long)]
        tagging: Option<String>,

        #[arg(long)]
        cache_control: Option<String>,

        /// Part size and direct upload threshold (e.g. 8M)
        #[arg(long, value_parser = parse_size)]
        chunk_size: Option<u64>,

        /// Parts uploaded concurrently
        #[arg(long)]
        parallel: Option<usize>,
    },

    /// Download an object
    Get {
        /// Source (s3://bucket/key)
        source: String,

        /// Local file, or - for stdout
        destination: String,

        /// Byte range (bytes=start-end)
        #[arg(long)]
        range: Option<String>,
    },

    /// Show object headers as JSON
    Head {
        /// S3 path
        path: String,
    },

    /// Remove an object
    Rm {
        /// S3 path to remove
        path: String,
    },

    /// List objects
    Ls {
        /// S3 path (s3://bucket/prefix/)
        path: String,

        /// Maximum keys per page
        #[arg(long)]
        max_keys: Option<u32>,

        /// Follow continuation tokens and list everything under the prefix
        #[arg(long)]
        all: bool,
    },

    /// Server-side copy
    Cp {
        /// Source (s3://bucket/key)
        source: String,

        /// Destination (s3://bucket/key)
        destination: String,
    },

    /// Show an object's ACL
    Acl {
        /// S3 path
        path: String,
    },

    /// Abort a multipart upload
    Abort {
        /// S3 path of the upload
        path: String,

        /// Upload ID
        upload_id: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("s3stream={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Parts of a multipart upload run as tasks, so use the multi-threaded runtime
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Load configuration
    let config = config::load_config(cli.config.as_deref(), cli.profile.as_deref())?;

    let core = Core::new(config, cli.insecure)?;

    match cli.command {
        Commands::Put {
            source,
            destination,
            content_type,
            storage_class,
            acl,
            meta,
            tagging,
            cache_control,
            chunk_size,
            parallel,
        } => {
            let opts = PutOptions {
                content_type,
                storage_class,
                acl,
                meta,
                tagging,
                cache_control,
                chunk_size,
                parallel,
                show_progress: !cli.no_progress,
            };
            commands::cmd_put(&core, &source, &destination, &opts).await?;
        }
        Commands::Get {
            source,
            destination,
            range,
        } => {
            commands::cmd_get(
                &core,
                &source,
                &destination,
                range.as_deref(),
                !cli.no_progress,
            )
            .await?;
        }
        Commands::Head { path } => {
            commands::cmd_head(&core, &path).await?;
        }
        Commands::Rm { path } => {
            commands::cmd_rm(&core, &path).await?;
        }
        Commands::Ls {
            path,
            max_keys,
            all,
        } => {
            commands::cmd_ls(&core, &path, max_keys, all).await?;
        }
        Commands::Cp {
            source,
            destination,
        } => {
            commands::cmd_cp(&core, &source, &destination).await?;
        }
        Commands::Acl { path } => {
            commands::cmd_acl(&core, &path).await?;
        }
        Commands::Abort { path, upload_id } => {
            commands::cmd_abort(&core, &path, &upload_id).await?;
        }
    }

    Ok(())
}
