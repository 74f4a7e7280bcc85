//! Image upload
//!
//! Accepts a multipart form with a `file` field and stores it on local disk.

use axum::{
    extract::{multipart::{MultipartError, MultipartRejection}, Multipart, State},
    http::StatusCode,
    Extension,
};
use cardhub_models::{Action, Resource};
use cardhub_utils::{CardHubError, CardHubResult};

use super::require;
use crate::{extract::Json, middleware::AuthUser, storage::StoredFile, AppState};

const FILE_FIELD: &str = "file";

/// POST /api/upload
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> CardHubResult<(StatusCode, Json<StoredFile>)> {
    require(&auth.principal, Resource::Uploads, Action::Create)?;
    let mut multipart = multipart?;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| CardHubError::validation(FILE_FIELD, "Uploaded file has no name"))?;
        let data = field.bytes().await.map_err(malformed)?;

        let stored = state.storage.store(&file_name, &data).await?;
        state.metrics.uploads.inc();
        state.metrics.upload_bytes.inc_by(stored.size);
        tracing::info!(user_id = %auth.principal.user_id, file_name = %stored.file_name, "File uploaded");

        return Ok((StatusCode::CREATED, Json(stored)));
    }

    Err(CardHubError::validation(FILE_FIELD, "No file provided"))
}

fn malformed(error: MultipartError) -> CardHubError {
    CardHubError::validation(FILE_FIELD, format!("Failed to read upload: {}", error.body_text()))
}
