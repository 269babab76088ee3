use axum::{Json, extract::State};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    models::{PresignedUrlRequest, PresignedUrlResponse},
    validation::ATTACHMENT_PREFIX,
};

const MAX_EXTENSION_LENGTH: usize = 16;

/// Object key for a new attachment: `posts/<uuid>.<ext>`, `bin` when the
/// filename has no usable extension. Extensions are capped so the key always
/// fits the `posts.image` column.
pub fn attachment_key_for(filename: &str) -> String {
    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .filter(|ext| {
            (1..=MAX_EXTENSION_LENGTH).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_string());
    format!("{}{}.{}", ATTACHMENT_PREFIX, Uuid::new_v4(), extension)
}

/// get_presigned_url
///
/// [Authenticated Route] Issues a short-lived URL the client PUTs the image to
/// directly. The returned `resource_key` is what goes into `Post.image`.
#[utoipa::path(
    post,
    path = "/api/v1/upload/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "Upload URL issued", body = PresignedUrlResponse),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Storage failure")
    )
)]
pub async fn get_presigned_url(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PresignedUrlRequest>,
) -> Result<Json<PresignedUrlResponse>, ApiError> {
    let object_key = attachment_key_for(&payload.filename);

    let upload_url = state
        .storage
        .get_presigned_upload_url(&object_key, &payload.file_type)
        .await?;

    tracing::debug!(user = %user_id, key = %object_key, "presigned upload issued");
    Ok(Json(PresignedUrlResponse {
        upload_url,
        resource_key: object_key,
    }))
}
