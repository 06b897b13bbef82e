//! Single-image multipart uploads.
//!
//! [`ImageUpload`] drains a `multipart/form-data` body: text parts become
//! form fields, and at most one file (field `image`) is written to the
//! uploads directory as `<uuid>.<ext>`. If the request later fails, the
//! handler hands the stored path back with its error (see [`UploadRejection`])
//! and the error responder removes the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{multipart::Field, FromRef, FromRequest, Multipart, Request},
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::config::{AppConfig, UploadConfig};
use crate::error::ApiError;

pub const IMAGE_FIELD: &str = "image";

/// Room left in a request body for the multipart framing and text fields
/// that travel alongside the image.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Body limit for routes that take an upload: the image cap plus form overhead.
pub fn upload_body_limit(config: &UploadConfig) -> usize {
    config.max_bytes.saturating_add(FORM_OVERHEAD_BYTES)
}

/// MIME types accepted for uploads, with the extension used when the
/// client's filename has none.
const ALLOWED_IMAGE_TYPES: &[(&str, &str)] = &[("image/png", "png"), ("image/jpeg", "jpeg"), ("image/jpg", "jpg")];

/// A file persisted by the upload stage. `path` is the reference stored on
/// records and served back under `/uploads/images`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub path: String,
}

impl StoredImage {
    /// Best-effort removal; failures are logged and swallowed.
    pub async fn discard(&self) {
        discard_file(Path::new(&self.path)).await;
    }
}

pub(crate) async fn discard_file(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!("Could not remove uploaded file {}: {}", path.display(), e);
    }
}

/// Parsed multipart body: text fields plus the optional stored image.
#[derive(Debug, Default)]
pub struct ImageUpload {
    pub fields: HashMap<String, String>,
    pub image: Option<StoredImage>,
}

impl ImageUpload {
    /// The stored image, or `ImageRequired` when the client sent none.
    pub fn require_image(&self) -> Result<&StoredImage, ApiError> {
        self.image.as_ref().ok_or(ApiError::ImageRequired)
    }
}

#[async_trait]
impl<S> FromRequest<S> for ImageUpload
where
    Arc<AppConfig>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let config = Arc::<AppConfig>::from_ref(state);
        let multipart = Multipart::from_request(req, state).await.map_err(|e| {
            tracing::debug!("Rejecting non-multipart upload: {}", e);
            ApiError::ValidationFailed
        })?;

        let mut upload = ImageUpload::default();
        if let Err(e) = read_parts(multipart, &config, &mut upload).await {
            if let Some(image) = upload.image.take() {
                image.discard().await;
            }
            return Err(e);
        }

        Ok(upload)
    }
}

async fn read_parts(mut multipart: Multipart, config: &AppConfig, upload: &mut ImageUpload) -> Result<(), ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::debug!("Malformed multipart body: {}", e);
        ApiError::ValidationFailed
    })? {
        let name = field.name().unwrap_or_default().to_string();

        if field.file_name().is_none() {
            let value = field.text().await.map_err(|_| ApiError::ValidationFailed)?;
            upload.fields.insert(name, value);
            continue;
        }

        if name != IMAGE_FIELD {
            return Err(ApiError::InvalidImage("Unexpected file field"));
        }
        if upload.image.is_some() {
            return Err(ApiError::InvalidImage("Only one image may be uploaded"));
        }

        upload.image = Some(store_image(field, &config.uploads.dir, config.uploads.max_bytes).await?);
    }

    Ok(())
}

async fn store_image(field: Field<'_>, dir: &Path, max_bytes: usize) -> Result<StoredImage, ApiError> {
    let content_type = field.content_type().unwrap_or_default().to_ascii_lowercase();
    let extension = image_extension(field.file_name(), &content_type).ok_or(ApiError::InvalidImage("Invalid mime type!"))?;

    let bytes = field.bytes().await.map_err(|e| {
        tracing::debug!("Failed reading upload: {}", e);
        ApiError::ValidationFailed
    })?;
    if bytes.len() > max_bytes {
        return Err(ApiError::InvalidImage("File too large"));
    }

    let path: PathBuf = dir.join(format!("{}.{}", Uuid::new_v4(), extension));
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        tracing::error!("Could not create uploads directory {}: {}", dir.display(), e);
        ApiError::UploadFailed
    })?;
    tokio::fs::write(&path, &bytes).await.map_err(|e| {
        tracing::error!("Could not write upload {}: {}", path.display(), e);
        ApiError::UploadFailed
    })?;

    tracing::debug!("Stored upload at {}", path.display());
    Ok(StoredImage {
        path: path.to_string_lossy().into_owned(),
    })
}

/// Picks the stored file's extension: the client's own if it has one,
/// otherwise the MIME type's. `None` means the type is not an accepted image.
fn image_extension(file_name: Option<&str>, content_type: &str) -> Option<String> {
    let (_, mime_extension) = ALLOWED_IMAGE_TYPES.iter().find(|(mime, _)| *mime == content_type)?;

    let original = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase());

    Some(original.unwrap_or_else(|| mime_extension.to_string()))
}

/// Response extension naming an upload the error responder must remove.
#[derive(Debug, Clone)]
pub struct DiscardUpload(pub PathBuf);

/// An [`ApiError`] raised after an image was stored.
#[derive(Debug)]
pub struct UploadRejection {
    pub error: ApiError,
    pub upload: Option<StoredImage>,
}

impl ApiError {
    pub fn discarding(self, upload: Option<&StoredImage>) -> UploadRejection {
        UploadRejection {
            error: self,
            upload: upload.cloned(),
        }
    }
}

impl From<ApiError> for UploadRejection {
    fn from(error: ApiError) -> Self {
        Self { error, upload: None }
    }
}

impl IntoResponse for UploadRejection {
    fn into_response(self) -> Response {
        let mut response = self.error.into_response();
        if let Some(upload) = self.upload {
            response.extensions_mut().insert(DiscardUpload(PathBuf::from(upload.path)));
        }
        response
    }
}
