use std::path::Path;

use uuid::Uuid;

use crate::constants::{ALLOWED_IMAGE_EXTENSIONS, RECIPE_UPLOAD_DIR};
use crate::error::ApiError;

/// Storage path for an uploaded recipe image. A fresh random identifier is
/// generated per upload; only the extension of the client filename is kept.
pub fn recipe_image_path(original_filename: &str) -> Result<String, ApiError> {
    let extension = Path::new(original_filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .ok_or_else(|| ApiError::validation("image", "Upload a valid image."))?;

    if !ALLOWED_IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ApiError::validation("image", "Upload a valid image."));
    }

    Ok(format!("{RECIPE_UPLOAD_DIR}/{}.{extension}", Uuid::new_v4()))
}

pub async fn save_image(media_root: &Path, relative: &str, data: &[u8]) -> Result<(), ApiError> {
    let target = media_root.join(relative);

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to create media directory: {e}")))?;
    }

    tokio::fs::write(&target, data)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to store image: {e}")))
}

/// Best-effort removal of a replaced image file.
pub async fn remove_image(media_root: &Path, relative: &str) {
    let target = media_root.join(relative);

    if let Err(e) = tokio::fs::remove_file(&target).await {
        log::warn!("failed to remove replaced image {}: {e}", target.display());
    }
}
