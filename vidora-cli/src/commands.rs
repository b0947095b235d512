//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::Subcommand;
use tracing::info;
use vidora_core::VidoraConfig;
use vidora_core::storage::{InMemoryCatalog, VideoCatalog, ingest_directory, scan_video_directory};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to (overrides VIDORA_HOST)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to (overrides VIDORA_PORT)
        #[arg(short, long)]
        port: Option<u16>,
        /// Directory for uploaded videos (overrides VIDORA_VIDEO_DIR)
        #[arg(long)]
        video_dir: Option<PathBuf>,
        /// Existing directory of .mp4 files to add to the catalog at startup
        #[arg(long)]
        ingest_dir: Option<PathBuf>,
        /// Bytes per streamed chunk (overrides VIDORA_CHUNK_SIZE)
        #[arg(long)]
        chunk_size: Option<u32>,
    },
    /// List the videos a directory would contribute, without serving
    Ingest {
        /// Directory to scan recursively for .mp4 files
        dir: PathBuf,
    },
}

/// Server overrides given on the command line.
#[derive(Debug, Default)]
pub struct ServeOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub video_dir: Option<PathBuf>,
    pub chunk_size: Option<u32>,
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve {
            host,
            port,
            video_dir,
            ingest_dir,
            chunk_size,
        } => {
            let options = ServeOptions {
                host,
                port,
                video_dir,
                chunk_size,
            };
            serve(options, ingest_dir).await
        }
        Commands::Ingest { dir } => list_ingestable(dir).await,
    }
}

/// Applies command-line overrides on top of environment configuration.
///
/// # Errors
/// - Chunk size of zero
pub fn build_config(base: VidoraConfig, options: ServeOptions) -> anyhow::Result<VidoraConfig> {
    let mut config = base;

    if let Some(host) = options.host {
        config.server.host = host;
    }
    if let Some(port) = options.port {
        config.server.port = port;
    }
    if let Some(video_dir) = options.video_dir {
        config.storage.video_dir = video_dir;
    }
    if let Some(chunk_size) = options.chunk_size {
        if chunk_size == 0 {
            return Err(anyhow!("Chunk size must be at least 1 byte"));
        }
        config.streaming.chunk_size = chunk_size;
    }

    Ok(config)
}

/// Start the HTTP server, optionally seeding the catalog from a directory
///
/// # Errors
/// - Invalid overrides
/// - Ingest directory could not be read
/// - Server failed to bind or stopped with an error
pub async fn serve(options: ServeOptions, ingest_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let config = build_config(VidoraConfig::from_env(), options)?;
    let catalog = Arc::new(InMemoryCatalog::new());

    if let Some(dir) = ingest_dir {
        let added = ingest_directory(catalog.as_ref(), &dir)
            .await
            .with_context(|| format!("Failed to ingest {}", dir.display()))?;
        info!("Ingested {} videos from {}", added, dir.display());
    }

    info!(
        "Starting server on {} with chunk size {} bytes",
        config.server.bind_address(),
        config.streaming.chunk_size
    );

    let catalog: Arc<dyn VideoCatalog> = catalog;
    vidora_web::run_server(config, catalog)
        .await
        .map_err(|e| anyhow!("Server error: {e}"))
}

/// Print the videos found under `dir`
///
/// # Errors
/// - Directory could not be read
pub async fn list_ingestable(dir: PathBuf) -> anyhow::Result<()> {
    let videos = scan_video_directory(&dir)
        .await
        .with_context(|| format!("Failed to scan {}", dir.display()))?;

    if videos.is_empty() {
        println!("No .mp4 files found in {}", dir.display());
        return Ok(());
    }

    println!("Found {} videos in {}:", videos.len(), dir.display());
    for video in &videos {
        println!(
            "  {}  {} ({} bytes)",
            video.title,
            video.filepath.display(),
            video.size
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config_overrides() {
        let options = ServeOptions {
            host: Some("0.0.0.0".to_string()),
            port: Some(9100),
            video_dir: Some(PathBuf::from("/srv/videos")),
            chunk_size: Some(65536),
        };

        let config = build_config(VidoraConfig::default(), options).unwrap();

        assert_eq!(config.server.bind_address(), "0.0.0.0:9100");
        assert_eq!(config.storage.video_dir, PathBuf::from("/srv/videos"));
        assert_eq!(config.streaming.chunk_size, 65536);
    }

    #[test]
    fn test_build_config_keeps_base_without_overrides() {
        let config = build_config(VidoraConfig::default(), ServeOptions::default()).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.streaming.chunk_size, 1024 * 1024);
    }

    #[test]
    fn test_build_config_rejects_zero_chunk() {
        let options = ServeOptions {
            chunk_size: Some(0),
            ..ServeOptions::default()
        };
        assert!(build_config(VidoraConfig::default(), options).is_err());
    }

    #[tokio::test]
    async fn test_list_ingestable_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_ingestable(dir.path().join("absent")).await.is_err());
    }
}
