//! Model downloading and caching utilities.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};

use crate::config::ModelConfig;
use crate::error::{Error, Result};

/// Pretrained networks used by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelType {
    /// Depth-Anything-V2 monocular depth network.
    Depth,
    /// Big-LaMa image inpainting network.
    Inpaint,
}

impl ModelType {
    /// Get the filename for this model type.
    #[must_use]
    pub const fn filename(&self) -> &'static str {
        match self {
            Self::Depth => "depth_anything_v2.onnx",
            Self::Inpaint => "big_lama.onnx",
        }
    }

    /// Get the default download URL for this model type.
    #[must_use]
    pub const fn url(&self) -> &'static str {
        match self {
            Self::Depth => {
                "https://huggingface.co/onnx-community/depth-anything-v2-small/resolve/main/onnx/model.onnx"
            }
            Self::Inpaint => "https://huggingface.co/Carve/LaMa-ONNX/resolve/main/lama_fp32.onnx",
        }
    }

    /// Get the approximate size in bytes for progress indication.
    #[must_use]
    pub const fn approx_size(&self) -> u64 {
        match self {
            Self::Depth => 99_000_000,    // ~99 MB
            Self::Inpaint => 208_000_000, // ~208 MB
        }
    }
}

/// Manages the model cache directory and downloads.
#[derive(Debug, Clone)]
pub struct ModelCache {
    cache_dir: PathBuf,
    depth_url: Option<String>,
    inpaint_url: Option<String>,
}

impl ModelCache {
    /// Create a new model cache.
    ///
    /// Without an explicit `cache_dir` the platform cache directory is used:
    /// - Windows: `%LOCALAPPDATA%\spatialscene\models`
    /// - Linux: `~/.cache/spatialscene/models`
    /// - macOS: `~/Library/Caches/spatialscene/models`
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let cache_dir = config.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("spatialscene")
                .join("models")
        });

        fs::create_dir_all(&cache_dir).map_err(|source| Error::CreateDir {
            path: cache_dir.clone(),
            source,
        })?;

        Ok(Self {
            cache_dir,
            depth_url: config.depth_url.clone(),
            inpaint_url: config.inpaint_url.clone(),
        })
    }

    /// Directory holding the cached model files.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// URL a model is fetched from, honoring configured overrides.
    #[must_use]
    pub fn url_for(&self, model_type: ModelType) -> &str {
        let custom = match model_type {
            ModelType::Depth => self.depth_url.as_deref(),
            ModelType::Inpaint => self.inpaint_url.as_deref(),
        };
        custom.unwrap_or_else(|| model_type.url())
    }

    /// Get the path to a model file, downloading if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be downloaded or accessed.
    pub fn get_model_path(&self, model_type: ModelType) -> Result<PathBuf> {
        let path = self.cache_dir.join(model_type.filename());

        if !path.exists() {
            download_file(
                self.url_for(model_type),
                &path,
                model_type.filename(),
                model_type.approx_size(),
            )?;
        }

        Ok(path)
    }
}

/// Download a file from a URL to a path with progress indication.
fn download_file(url: &str, path: &Path, name: &str, approx_size: u64) -> Result<()> {
    tracing::info!("Downloading {name} from {url}");

    let client = reqwest::blocking::Client::new();
    let response = client
        .get(url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(|source| Error::ModelDownload {
            name: name.to_string(),
            source,
        })?;

    let total_size = response.content_length().unwrap_or(approx_size);

    let pb = ProgressBar::new(total_size);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(format!("Downloading {name}"));

    let mut reader = response;
    store_stream(&mut reader, path, &pb)?;
    pb.finish_with_message(format!("Downloaded {name}"));

    Ok(())
}

/// Stream `reader` into `path` through a sibling `.tmp` file.
///
/// The temporary file is removed if the stream fails.
fn store_stream(reader: &mut impl Read, path: &Path, pb: &ProgressBar) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    if let Err(err) = copy_with_progress(reader, &temp_path, pb) {
        pb.abandon();
        if let Err(cleanup) = fs::remove_file(&temp_path) {
            tracing::warn!("Failed to remove {}: {cleanup}", temp_path.display());
        }
        return Err(err.into());
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}

fn copy_with_progress(
    reader: &mut impl Read,
    dest: &Path,
    pb: &ProgressBar,
) -> std::io::Result<()> {
    let mut file = fs::File::create(dest)?;
    let mut downloaded = 0u64;
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        file.write_all(&buffer[..bytes_read])?;
        downloaded += bytes_read as u64;
        pb.set_position(downloaded);
    }
    file.flush()
}
