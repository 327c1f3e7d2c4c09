//! HTTP handlers.

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::instrument;

use crate::error::Error;
use crate::gallery::{NewScene, Scene, SceneSummary};
use crate::pipeline::ProcessedImage;

use super::{ApiError, AppState};

/// Response of `POST /save-to-gallery`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
    pub scene_id: String,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "spatialscene" }))
}

#[instrument(skip_all)]
pub async fn process_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProcessedImage>, ApiError> {
    let mut multipart = multipart?;
    let mut file = None;
    let mut inpaint = true;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                file = Some(field.bytes().await?);
            }
            "inpaint" => {
                let text = field.text().await?;
                inpaint = parse_flag(&text).ok_or_else(|| {
                    ApiError::BadRequest(format!("inpaint must be a boolean, got {text:?}"))
                })?;
            }
            _ => {}
        }
    }

    let bytes = file.ok_or_else(|| ApiError::BadRequest("missing `file` field".to_string()))?;
    tracing::info!("process-image: {} bytes, inpaint={inpaint}", bytes.len());

    let pipeline = Arc::clone(&state.pipeline);
    let processed = tokio::task::spawn_blocking(move || pipeline.process(&bytes, inpaint))
        .await
        .map_err(Error::from)??;

    Ok(Json(processed))
}

#[instrument(skip_all)]
pub async fn save_to_gallery(
    State(state): State<AppState>,
    payload: Result<Json<NewScene>, JsonRejection>,
) -> Result<Json<SaveResponse>, ApiError> {
    let Json(scene) = payload?;
    let saved = state.gallery.save(scene).await?;
    Ok(Json(SaveResponse {
        success: true,
        scene_id: saved.id,
    }))
}

pub async fn list_gallery(
    State(state): State<AppState>,
) -> Result<Json<Vec<SceneSummary>>, ApiError> {
    Ok(Json(state.gallery.list().await?))
}

pub async fn get_scene(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Scene>, ApiError> {
    Ok(Json(state.gallery.get(&id).await?))
}

pub async fn delete_scene(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.gallery.delete(&id).await?;
    Ok(Json(json!({ "success": true })))
}

/// Parse a form boolean the way browsers and HTML forms send them.
fn parse_flag(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::parse_flag;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag(" False "), Some(false));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
