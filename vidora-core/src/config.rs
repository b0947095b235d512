//! Centralized configuration for Vidora.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::path::PathBuf;

use crate::streaming::DEFAULT_CHUNK_SIZE;

/// Central configuration for all Vidora components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct VidoraConfig {
    pub streaming: StreamingConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
}

/// Byte-range streaming configuration.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Upper bound for a single body chunk in bytes
    pub chunk_size: u32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE, // 1 MiB
        }
    }
}

/// Upload storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory where uploaded videos are written
    pub video_dir: PathBuf,
    /// Largest accepted upload body in bytes
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            video_dir: PathBuf::from("videos"),
            max_upload_bytes: 2 * 1024 * 1024 * 1024, // 2 GiB
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Origins allowed by the CORS layer
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost".to_string(),
                "http://localhost:8080".to_string(),
                "http://127.0.0.1:5500".to_string(),
            ],
        }
    }
}

impl ServerConfig {
    /// Socket address string for binding, e.g. `127.0.0.1:8000`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl VidoraConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(size) = std::env::var("VIDORA_CHUNK_SIZE")
            && let Ok(bytes) = size.parse::<u32>()
            && bytes > 0
        {
            config.streaming.chunk_size = bytes;
        }

        if let Ok(dir) = std::env::var("VIDORA_VIDEO_DIR")
            && !dir.is_empty()
        {
            config.storage.video_dir = PathBuf::from(dir);
        }

        if let Ok(limit) = std::env::var("VIDORA_MAX_UPLOAD_BYTES")
            && let Ok(bytes) = limit.parse::<usize>()
        {
            config.storage.max_upload_bytes = bytes;
        }

        if let Ok(host) = std::env::var("VIDORA_HOST")
            && !host.is_empty()
        {
            config.server.host = host;
        }

        if let Ok(port) = std::env::var("VIDORA_PORT")
            && let Ok(port) = port.parse::<u16>()
        {
            config.server.port = port;
        }

        if let Ok(origins) = std::env::var("VIDORA_CORS_ORIGINS") {
            config.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }

        config
    }

    /// Creates a configuration for tests: small chunks, uploads under `video_dir`.
    pub fn for_testing(video_dir: PathBuf) -> Self {
        Self {
            streaming: StreamingConfig { chunk_size: 4096 },
            storage: StorageConfig {
                video_dir,
                max_upload_bytes: 16 * 1024 * 1024,
            },
            server: ServerConfig::default(),
        }
    }
}
