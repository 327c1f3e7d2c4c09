//! ONNX session construction and construct-once shared handles.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use serde::Deserialize;

use crate::error::{Error, Result};

use super::{ModelCache, ModelType};

/// Execution device for inference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// CUDA when compiled in, otherwise CPU.
    #[default]
    Auto,
    Cpu,
    Cuda,
}

impl Device {
    /// Resolve `Auto` against what this build supports.
    #[must_use]
    pub const fn resolve(self) -> Self {
        match self {
            Self::Auto if cfg!(feature = "cuda") => Self::Cuda,
            Self::Auto => Self::Cpu,
            other => other,
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Cpu => f.write_str("cpu"),
            Self::Cuda => f.write_str("cuda"),
        }
    }
}

/// Builds sessions for cached models on a device chosen once.
#[derive(Debug, Clone)]
pub struct SessionFactory {
    cache: ModelCache,
    device: Device,
}

impl SessionFactory {
    /// Create a factory; `device` is resolved immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if CUDA is requested in a build without the `cuda` feature.
    pub fn new(cache: ModelCache, device: Device) -> Result<Self> {
        let device = device.resolve();
        if device == Device::Cuda && !cfg!(feature = "cuda") {
            return Err(Error::invalid(
                "models.device",
                "cuda requested but this build lacks the `cuda` feature",
            ));
        }
        tracing::info!("Inference device: {device}");
        Ok(Self { cache, device })
    }

    /// Device sessions are created on.
    #[must_use]
    pub const fn device(&self) -> Device {
        self.device
    }

    /// Fetch (if needed) and load an ONNX session.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be downloaded or loaded.
    pub fn load(&self, model_type: ModelType) -> Result<Session> {
        let path = self.cache.get_model_path(model_type)?;
        tracing::info!("Loading {} from {}", model_type.filename(), path.display());

        build_session(&path, self.device).map_err(|source| Error::ModelLoad {
            name: model_type.filename().to_string(),
            source,
        })
    }
}

fn build_session(path: &Path, device: Device) -> ort::Result<Session> {
    let builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;

    #[cfg(feature = "cuda")]
    let builder = if device == Device::Cuda {
        builder.with_execution_providers([
            ort::execution_providers::CUDAExecutionProvider::default().build(),
        ])?
    } else {
        builder
    };
    #[cfg(not(feature = "cuda"))]
    let _ = device;

    Ok(builder.commit_from_file(path)?)
}

/// A session loaded on first use and shared for the process lifetime.
///
/// `Session::run` needs exclusive access, so callers are serialized.
pub struct LazySession {
    model_type: ModelType,
    factory: Arc<SessionFactory>,
    cell: OnceCell<Mutex<Session>>,
}

impl LazySession {
    #[must_use]
    pub fn new(model_type: ModelType, factory: Arc<SessionFactory>) -> Self {
        Self {
            model_type,
            factory,
            cell: OnceCell::new(),
        }
    }

    /// Whether the weights have been loaded yet.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Run `f` with exclusive access to the session, loading it first if needed.
    ///
    /// Concurrent first callers block until the single load completes.
    ///
    /// # Errors
    ///
    /// Returns an error if loading fails or `f` fails. A failed load is retried
    /// by the next caller.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut Session) -> Result<R>) -> Result<R> {
        let cell = self
            .cell
            .get_or_try_init(|| self.factory.load(self.model_type).map(Mutex::new))?;
        let mut session = cell.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut session)
    }
}

impl fmt::Debug for LazySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazySession")
            .field("model_type", &self.model_type)
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_resolves_to_build_default() {
        let expected = if cfg!(feature = "cuda") {
            Device::Cuda
        } else {
            Device::Cpu
        };
        assert_eq!(Device::Auto.resolve(), expected);
        assert_eq!(Device::Cpu.resolve(), Device::Cpu);
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_cuda_without_feature_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ModelCache::new(&crate::config::ModelConfig {
            cache_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        })
        .unwrap();
        assert!(SessionFactory::new(cache, Device::Cuda).is_err());
    }

    #[test]
    fn test_lazy_session_starts_unloaded_and_reports_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ModelCache::new(&crate::config::ModelConfig {
            cache_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        })
        .unwrap();
        std::fs::write(dir.path().join(ModelType::Depth.filename()), b"not onnx").unwrap();
        let factory = Arc::new(SessionFactory::new(cache, Device::Cpu).unwrap());
        let lazy = LazySession::new(ModelType::Depth, factory);

        assert!(!lazy.is_loaded());
        let result = lazy.with_session(|_| Ok(()));
        assert!(matches!(result, Err(Error::ModelLoad { .. })));
        assert!(!lazy.is_loaded());
    }
}
