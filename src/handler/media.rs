use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::post;
use axum::{Extension, Router};
use tracing::instrument;

use crate::AppState;
use crate::db::MediaExt;
use crate::dtos::{ApiResponse, UploadMediaResponse};
use crate::error::{ErrorMessage, HttpError};
use crate::handler::db_error;
use crate::middleware::AuthUser;
use crate::models::{Owner, OwnerType};
use crate::services::reconcile;

/// Largest accepted multipart body, 32 MB
pub const MAX_UPLOAD_BYTES: usize = 32 << 20;

/// Router for uploads. Auth is applied in routes.rs.
pub fn media_handler() -> Router<AppState> {
    Router::new()
        .route("/", post(upload))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

struct Upload {
    filename: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

fn parse_owner_type(value: &str) -> Result<OwnerType, HttpError> {
    match value.trim() {
        "posts" => Ok(OwnerType::Posts),
        "comments" => Ok(OwnerType::Comments),
        other => Err(HttpError::bad_request(format!(
            "Unknown owner_type: {}",
            other
        ))),
    }
}

/// Upload one or more files.
///
/// Multipart fields: `files` (repeatable, `file` also accepted), and an
/// optional `owner_type` + `owner_id` pair to attach the media right away.
/// An owner must be a post or comment written by the caller. Without one the
/// media rows stay unattached until a post of the uploader references them.
#[instrument(skip(app_state, auth_user, multipart), fields(user_id = auth_user.user.id))]
pub async fn upload(
    State(app_state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let mut uploads = Vec::new();
    let mut owner_type = OwnerType::Posts;
    let mut owner_id: Option<i64> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Invalid multipart body: {}", e);
        HttpError::bad_request(e.body_text())
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" | "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| {
                    tracing::error!("Failed reading upload {}: {}", filename, e);
                    HttpError::bad_request(e.body_text())
                })?;
                uploads.push(Upload {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "owner_type" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| HttpError::bad_request(e.body_text()))?;
                owner_type = parse_owner_type(&text)?;
            }
            "owner_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| HttpError::bad_request(e.body_text()))?;
                let id = text
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| HttpError::bad_request("owner_id must be an integer"))?;
                owner_id = Some(id);
            }
            other => tracing::debug!("ignoring multipart field {}", other),
        }
    }

    if uploads.is_empty() {
        return Err(HttpError::bad_request("No files uploaded"));
    }

    let owner = owner_id.map(|id| Owner {
        id,
        kind: owner_type,
    });

    let user_id = auth_user.user.id;
    if let Some(owner) = owner {
        reconcile::check_owner(&app_state.db_client, user_id, owner).await?;
    }

    let mut results = Vec::with_capacity(uploads.len());
    for upload in uploads {
        let stored = app_state
            .storage
            .store(
                &upload.filename,
                upload.content_type.as_deref(),
                &upload.bytes,
            )
            .await
            .map_err(|e| {
                tracing::error!("Failed storing upload {}: {}", upload.filename, e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            })?;

        let media = app_state
            .db_client
            .create_media(&stored, user_id, owner)
            .await
            .map_err(|e| db_error("creating media", e))?;

        results.push(UploadMediaResponse::from(&media));
    }

    tracing::info!(count = results.len(), "upload successful");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Media uploaded successfully", results)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_type_accepts_both_kinds() {
        assert_eq!(parse_owner_type("posts").unwrap(), OwnerType::Posts);
        assert_eq!(parse_owner_type(" comments ").unwrap(), OwnerType::Comments);
    }

    #[test]
    fn owner_type_rejects_other_tables() {
        let err = parse_owner_type("users").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
