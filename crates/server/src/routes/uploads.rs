//! Object storage uploads: admin category images, batch deletes, and the
//! multipart reader shared by every upload route.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Multipart, State, multipart::MultipartError},
    routing::{delete, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::{ApiJson, ApiQuery, RequireAdmin};
use crate::services::storage::{UploadFolder, upload_key};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/admin/uploads/category/image",
            post(upload_category_image).delete(delete_category_image),
        )
        .route("/admin/delete-upload", delete(delete_uploads))
}

/// A file part read from a multipart body.
#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Store the file under `folder` and return its public URL.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Storage` if the upload fails.
    pub async fn store(self, state: &AppState, folder: UploadFolder) -> Result<String> {
        let key = upload_key(folder, &self.file_name, Utc::now());
        Ok(state
            .storage()
            .put_object(&key, self.bytes, &self.content_type)
            .await?)
    }
}

/// A parsed multipart form: the named file part plus every text field.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    /// Read the whole body, keeping the first part named `file_field` as the
    /// file. Other parts are read as text fields.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the body is not valid multipart.
    pub async fn read(mut multipart: Multipart, file_field: &str) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == file_field && form.file.is_none() {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?.to_vec();
                form.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            } else {
                let text = field.text().await.map_err(bad_multipart)?;
                form.fields.insert(name, text);
            }
        }

        Ok(form)
    }

    /// A text field, or an empty string when absent.
    #[must_use]
    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }
}

fn bad_multipart(err: MultipartError) -> AppError {
    AppError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
}

/// Upload a category image and return its URL.
#[instrument(skip_all)]
async fn upload_category_image(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Value>> {
    let file = UploadForm::read(multipart, "files")
        .await?
        .file
        .ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))?;

    let url = file.store(&state, UploadFolder::Category).await?;
    Ok(Json(json!({ "url": url })))
}

#[derive(Debug, Deserialize)]
struct KeyQuery {
    key: Option<String>,
}

#[instrument(skip(_admin, state))]
async fn delete_category_image(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<KeyQuery>,
) -> Result<Json<Value>> {
    let key = query
        .key
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing or invalid 'key' in query".to_string()))?;

    state.storage().delete_object(&key).await?;
    Ok(Json(json!({ "message": "Image deleted from S3 successfully" })))
}

#[derive(Debug, Deserialize)]
struct DeleteUploadsRequest {
    file_keys: Option<Vec<String>>,
}

/// Keys to delete, or `None` when the list is missing, empty or has a blank key.
fn valid_keys(keys: Option<Vec<String>>) -> Option<Vec<String>> {
    keys.filter(|keys| !keys.is_empty() && keys.iter().all(|k| !k.trim().is_empty()))
}

/// Delete several objects; per-key failures are reported, not fatal.
#[instrument(skip_all)]
async fn delete_uploads(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<DeleteUploadsRequest>,
) -> Result<Json<Value>> {
    let keys = valid_keys(body.file_keys).ok_or_else(|| {
        AppError::BadRequest("Missing or invalid file_keys parameter".to_string())
    })?;

    let report = state.storage().delete_objects(&keys).await;
    tracing::info!(
        deleted = report.deleted.len(),
        failed = report.errors.len(),
        "Batch delete finished"
    );

    Ok(Json(json!({
        "message": "Images deleted from S3 successfully",
        "deleted": report.deleted,
        "errors": report.errors,
    })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_keys() {
        assert!(valid_keys(None).is_none());
        assert!(valid_keys(Some(vec![])).is_none());
        assert!(valid_keys(Some(vec!["a.png".to_string(), " ".to_string()])).is_none());
        assert_eq!(
            valid_keys(Some(vec!["uploads/images/category/1_a.png".to_string()])).unwrap(),
            vec!["uploads/images/category/1_a.png".to_string()]
        );
    }

    #[test]
    fn test_form_text_defaults_to_empty() {
        let mut form = UploadForm::default();
        form.fields.insert("type".to_string(), "Eat".to_string());
        assert_eq!(form.text("type"), "Eat");
        assert_eq!(form.text("button_text"), "");
    }
}
