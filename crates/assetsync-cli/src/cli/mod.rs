//! CLI for the assetsync asset client.

mod commands;

use anyhow::Result;
use assetsync_core::config;
use assetsync_core::model::{DataSource, Destination, RenditionKind};
use assetsync_core::transfer::Priority;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{
    run_checksum, run_create, run_delete, run_download, run_generate, run_refresh,
    run_upload_master, run_upload_rendition, Session,
};

/// Top-level CLI for the assetsync asset client.
#[derive(Debug, Parser)]
#[command(name = "assetsync")]
#[command(about = "assetsync: remote asset CRUD, transfers and rendition generation", long_about = None)]
pub struct Cli {
    /// Bearer token sent with every request.
    #[arg(long, global = true, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Retry transient failures (connection errors, 429, 5xx) up to N more times.
    /// Overrides the `[retry]` section of the config file.
    #[arg(long, global = true, value_name = "N")]
    pub retries: Option<u32>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Create an asset from a local JPEG and register it in a collection or catalog.
    Create {
        /// Path to the JPEG file.
        path: PathBuf,
        /// Collection to add the asset to.
        #[arg(long, value_name = "ID", conflicts_with = "catalog", required_unless_present = "catalog")]
        collection: Option<String>,
        /// Catalog to add the asset to.
        #[arg(long, value_name = "ID")]
        catalog: Option<String>,
        /// Asset name (default: the file name).
        #[arg(long)]
        name: Option<String>,
        /// Content type (default: inferred from the extension).
        #[arg(long, value_name = "MIME")]
        content_type: Option<String>,
    },

    /// Fetch and print the latest state of an asset.
    Refresh {
        /// Asset identifier.
        id: String,
    },

    /// Delete an asset from the service.
    Delete {
        /// Asset identifier.
        id: String,
    },

    /// Upload new master bytes for an asset.
    UploadMaster {
        /// Asset identifier.
        id: String,
        /// Path to the master file (JPEG or camera raw).
        path: PathBuf,
        /// Queue generation of the auto renditions after the upload.
        #[arg(long)]
        generate: bool,
        /// Transfer priority: low, normal or high.
        #[arg(long, default_value = "normal")]
        priority: Priority,
    },

    /// Upload bytes for one rendition of an asset.
    UploadRendition {
        /// Asset identifier.
        id: String,
        /// Rendition kind (fullsize, panorama, 2048, 1280, 640, thumbnail2x).
        kind: RenditionKind,
        /// Path to the rendition file.
        path: PathBuf,
        /// Transfer priority: low, normal or high.
        #[arg(long, default_value = "normal")]
        priority: Priority,
    },

    /// Download master, proxy or rendition bytes of an asset.
    Download {
        /// Asset identifier.
        id: String,
        /// What to download: master, proxy, or a rendition kind.
        source: DataSource,
        /// Write to this file; without it only a size summary is printed.
        #[arg(long, short = 'o', value_name = "PATH")]
        output: Option<PathBuf>,
        /// Transfer priority: low, normal or high.
        #[arg(long, default_value = "normal")]
        priority: Priority,
    },

    /// Ask the service to generate renditions of an asset.
    Generate {
        /// Asset identifier.
        id: String,
        /// Rendition kinds to generate.
        #[arg(required = true, num_args = 1..)]
        kinds: Vec<RenditionKind>,
        /// Metadata directives, comma separated (e.g. extract_all, or
        /// extract_caption,suppress_location). Default depends on the kinds.
        #[arg(long, value_delimiter = ',', value_name = "DIRECTIVES")]
        metadata: Vec<String>,
        /// Transfer priority: low, normal or high.
        #[arg(long, default_value = "normal")]
        priority: Priority,
    },

    /// Compute SHA-256 of a file (the digest sent with uploads).
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },
}

fn destination(collection: Option<String>, catalog: Option<String>) -> Result<Destination> {
    match (collection, catalog) {
        (Some(id), _) => Ok(Destination::Collection(id)),
        (None, Some(id)) => Ok(Destination::Catalog(id)),
        (None, None) => anyhow::bail!("either --collection or --catalog is required"),
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        if let CliCommand::Checksum { path } = &cli.command {
            return run_checksum(path).await;
        }

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let session = Session::open(&cfg, cli.token.as_deref(), cli.retries)?;

        let result = match cli.command {
            CliCommand::Create {
                path,
                collection,
                catalog,
                name,
                content_type,
            } => {
                let destination = destination(collection, catalog)?;
                run_create(&session, &path, &destination, name.as_deref(), content_type.as_deref()).await
            }
            CliCommand::Refresh { id } => run_refresh(&session, &id.into()).await,
            CliCommand::Delete { id } => run_delete(&session, &id.into()).await,
            CliCommand::UploadMaster {
                id,
                path,
                generate,
                priority,
            } => run_upload_master(&session, &id.into(), &path, generate, priority).await,
            CliCommand::UploadRendition {
                id,
                kind,
                path,
                priority,
            } => run_upload_rendition(&session, &id.into(), kind, &path, priority).await,
            CliCommand::Download {
                id,
                source,
                output,
                priority,
            } => run_download(&session, &id.into(), source, output.as_deref(), priority).await,
            CliCommand::Generate {
                id,
                kinds,
                metadata,
                priority,
            } => run_generate(&session, &id.into(), &kinds, &metadata, priority).await,
            CliCommand::Checksum { path } => run_checksum(&path).await,
        };

        session.close().await;
        result
    }
}
