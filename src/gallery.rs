//! File-backed scene gallery: one JSON document per saved scene.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;

use crate::config::GalleryConfig;
use crate::error::{Error, Result};
use crate::image::{decode_data_uri, thumbnail_data_uri};

/// Declared pixel size of a scene's images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Request body for saving a scene.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewScene {
    pub original_image: String,
    pub depth_map: String,
    pub inpainted_image: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub image_dimensions: Option<Dimensions>,
}

/// A persisted scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub original_image: String,
    pub depth_map: String,
    pub inpainted_image: String,
    pub image_dimensions: Option<Dimensions>,
    pub thumbnail: String,
}

/// Listing entry for a scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub image_dimensions: Option<Dimensions>,
    pub thumbnail: String,
}

impl From<Scene> for SceneSummary {
    fn from(scene: Scene) -> Self {
        Self {
            id: scene.id,
            title: scene.title,
            created_at: scene.created_at,
            image_dimensions: scene.image_dimensions,
            thumbnail: scene.thumbnail,
        }
    }
}

/// Directory of scene documents.
#[derive(Debug, Clone)]
pub struct GalleryStore {
    dir: PathBuf,
    thumbnail_size: u32,
}

impl GalleryStore {
    /// Open the gallery, creating its directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open(config: &GalleryConfig) -> Result<Self> {
        fs::create_dir_all(&config.dir)
            .await
            .map_err(|source| Error::CreateDir {
                path: config.dir.clone(),
                source,
            })?;
        tracing::info!("Gallery directory: {}", config.dir.display());

        Ok(Self {
            dir: config.dir.clone(),
            thumbnail_size: config.thumbnail_size,
        })
    }

    /// Directory scenes are stored in.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a new scene and return the stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the scene cannot be written.
    #[instrument(skip_all)]
    pub async fn save(&self, new: NewScene) -> Result<Scene> {
        let created_at = Utc::now();
        let title = match new.title {
            Some(title) if !title.trim().is_empty() => title,
            _ => format!("Scene {}", created_at.format("%Y-%m-%d %H:%M:%S")),
        };
        let thumbnail = self.thumbnail_for(&new.original_image).await;

        let mut scene = Scene {
            id: String::new(),
            title,
            created_at,
            original_image: new.original_image,
            depth_map: new.depth_map,
            inpainted_image: new.inpainted_image,
            image_dimensions: new.image_dimensions,
            thumbnail,
        };

        let base_id = scene_id(created_at);
        let mut attempt = 0u32;
        let file = loop {
            let id = if attempt == 0 {
                base_id.clone()
            } else {
                format!("{base_id}_{attempt}")
            };
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.path_for(&id))
                .await
            {
                Ok(file) => {
                    scene.id = id;
                    break file;
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(err) => return Err(err.into()),
            }
        };

        write_reserved(file, &self.path_for(&scene.id), &scene).await?;

        tracing::info!("Saved scene {} ({})", scene.id, scene.title);
        Ok(scene)
    }

    /// Summaries of every stored scene, newest first.
    ///
    /// Unreadable documents are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    #[instrument(skip_all)]
    pub async fn list(&self) -> Result<Vec<SceneSummary>> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut scenes = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_scene(&path).await {
                Ok(scene) => scenes.push(SceneSummary::from(scene)),
                Err(err) => tracing::warn!("Skipping {}: {err}", path.display()),
            }
        }

        scenes.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(scenes)
    }

    /// Load one scene.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SceneNotFound`] for unknown or malformed ids.
    pub async fn get(&self, id: &str) -> Result<Scene> {
        if !is_valid_id(id) {
            return Err(not_found(id));
        }
        match read_scene(&self.path_for(id)).await {
            Err(Error::Io(err)) if err.kind() == ErrorKind::NotFound => Err(not_found(id)),
            other => other,
        }
    }

    /// Remove one scene.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SceneNotFound`] for unknown or malformed ids.
    pub async fn delete(&self, id: &str) -> Result<()> {
        if !is_valid_id(id) {
            return Err(not_found(id));
        }
        match fs::remove_file(self.path_for(id)).await {
            Ok(()) => {
                tracing::info!("Deleted scene {id}");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Err(not_found(id)),
            Err(err) => Err(err.into()),
        }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Downscaled copy of the original, or the original itself when it cannot be decoded.
    async fn thumbnail_for(&self, original: &str) -> String {
        let uri = original.to_string();
        let max_side = self.thumbnail_size;
        let generated = tokio::task::spawn_blocking(move || {
            decode_data_uri(&uri).and_then(|image| thumbnail_data_uri(&image, max_side))
        })
        .await;

        match generated {
            Ok(Ok(thumbnail)) => thumbnail,
            Ok(Err(err)) => {
                tracing::warn!("Thumbnail generation failed, storing original: {err}");
                original.to_string()
            }
            Err(err) => {
                tracing::warn!("Thumbnail worker failed, storing original: {err}");
                original.to_string()
            }
        }
    }
}

/// Write `scene` into the file reserved at `path`, removing it on failure.
async fn write_reserved(mut file: fs::File, path: &Path, scene: &Scene) -> Result<()> {
    let written: Result<()> = async {
        let body = serde_json::to_vec_pretty(scene)?;
        file.write_all(&body).await?;
        file.flush().await?;
        Ok(())
    }
    .await;

    if written.is_err() {
        drop(file);
        if let Err(err) = fs::remove_file(path).await {
            tracing::warn!("Failed to remove partial scene {}: {err}", path.display());
        }
    }
    written
}

async fn read_scene(path: &Path) -> Result<Scene> {
    let raw = fs::read(path).await?;
    Ok(serde_json::from_slice(&raw)?)
}

fn not_found(id: &str) -> Error {
    Error::SceneNotFound { id: id.to_string() }
}

/// Timestamp-derived id, e.g. `scene_20240131_235959_123456`.
fn scene_id(created_at: DateTime<Utc>) -> String {
    format!("scene_{}", created_at.format("%Y%m%d_%H%M%S_%6f"))
}

/// Ids may only contain ASCII alphanumerics, `_` and `-`.
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_scene_id_format() {
        let at = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 58).unwrap();
        assert_eq!(scene_id(at), "scene_20240131_235958_000000");
    }

    #[tokio::test]
    async fn test_failed_write_releases_reserved_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene_20240131_235958_000000.json");
        std::fs::write(&path, b"").unwrap();
        // Read-only handle: the write surfaces an error on flush.
        let file = fs::File::open(&path).await.unwrap();
        let scene = Scene {
            id: "scene_20240131_235958_000000".to_string(),
            title: "Broken".to_string(),
            created_at: Utc::now(),
            original_image: "data:image/png;base64,AA==".to_string(),
            depth_map: "data:image/png;base64,AA==".to_string(),
            inpainted_image: "data:image/png;base64,AA==".to_string(),
            image_dimensions: None,
            thumbnail: "data:image/png;base64,AA==".to_string(),
        };

        assert!(write_reserved(file, &path, &scene).await.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_id_validation_blocks_traversal() {
        assert!(is_valid_id("scene_20240131_235958_000000"));
        assert!(is_valid_id("scene_1-2"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("../etc/passwd"));
        assert!(!is_valid_id("a/b"));
        assert!(!is_valid_id("scene.json"));
    }
}
