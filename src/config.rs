//! Configuration loading and validation utilities.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::model::Device;
use crate::pipeline::Config as PipelineConfig;

/// Fully merged configuration set.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub gallery: GalleryConfig,
    pub models: ModelConfig,
    pub pipeline: PipelineConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by the CORS layer.
    pub allowed_origins: Vec<String>,
    /// Maximum accepted request body in bytes.
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            body_limit: 50 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Socket address the server binds to.
    ///
    /// # Errors
    ///
    /// Returns an error if `host:port` is not a valid socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|err| Error::invalid("server.host", format!("{err}")))
    }
}

/// Scene storage settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GalleryConfig {
    pub dir: PathBuf,
    /// Longest side of generated thumbnails.
    pub thumbnail_size: u32,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("gallery"),
            thumbnail_size: 256,
        }
    }
}

/// Model download and execution settings.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelConfig {
    /// Cache directory override. Defaults to the platform cache dir.
    pub cache_dir: Option<PathBuf>,
    /// Execution device, selected once at startup.
    pub device: Device,
    /// Download URL override for the depth network.
    pub depth_url: Option<String>,
    /// Download URL override for the inpainting network.
    pub inpaint_url: Option<String>,
}

impl AppConfig {
    /// Load configuration from an optional TOML file.
    ///
    /// A missing `path` yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    #[instrument(skip_all)]
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = tokio::fs::read_to_string(path).await?;
                Self::from_toml(&raw, path)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text; `origin` is used in error messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration document.
    pub fn from_toml(raw: &str, origin: &Path) -> Result<Self> {
        toml::from_str(raw).map_err(|source| Error::Config {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        self.server.socket_addr()?;
        if self.server.body_limit == 0 {
            return Err(Error::invalid("server.body_limit", "must be greater than 0"));
        }
        if self.gallery.thumbnail_size == 0 {
            return Err(Error::invalid(
                "gallery.thumbnail_size",
                "must be greater than 0",
            ));
        }
        if self.gallery.dir.as_os_str().is_empty() {
            return Err(Error::invalid("gallery.dir", "must not be empty"));
        }
        self.pipeline.validate()
    }
}
