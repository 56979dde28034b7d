use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{delete, post};
use axum::{Extension, Router};
use tracing::instrument;
use validator::Validate;

use crate::AppState;
use crate::dtos::{ApiResponse, CreateLikeDto, LikeToggleDto};
use crate::error::HttpError;
use crate::middleware::AuthUser;
use crate::models::Owner;
use crate::services::likes::{self, LikeToggle};

/// Router for likes. Every route requires auth (applied in routes.rs).
pub fn like_handler() -> Router<AppState> {
    Router::new()
        .route("/", post(toggle_like))
        .route("/{like_id}", delete(delete_like))
}

/// Like a post or comment; liking it again removes the like.
#[instrument(skip(app_state, auth_user, body), fields(user_id = auth_user.user.id))]
pub async fn toggle_like(
    State(app_state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateLikeDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid toggle_like input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let target = Owner {
        id: body.likeable_id,
        kind: body.likeable_type,
    };

    let toggled = likes::toggle_like(&app_state.db_client, auth_user.user.id, target).await?;

    let response = match toggled {
        LikeToggle::Liked(like) => {
            tracing::info!(like_id = like.id, "liked");
            (
                StatusCode::CREATED,
                Json(ApiResponse::success(
                    "Like created successfully",
                    LikeToggleDto {
                        liked: true,
                        like: Some(like),
                    },
                )),
            )
        }
        LikeToggle::Unliked => {
            tracing::info!("unliked");
            (
                StatusCode::OK,
                Json(ApiResponse::success(
                    "Like removed successfully",
                    LikeToggleDto {
                        liked: false,
                        like: None,
                    },
                )),
            )
        }
    };

    Ok(response)
}

#[instrument(skip(app_state, auth_user), fields(user_id = auth_user.user.id))]
pub async fn delete_like(
    Path(like_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<impl IntoResponse, HttpError> {
    likes::remove_like(&app_state.db_client, auth_user.user.id, like_id).await?;

    Ok(Json(ApiResponse::message("Like deleted successfully")))
}
