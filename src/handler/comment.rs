use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, put};
use axum::{Extension, Router, middleware};
use tracing::instrument;
use validator::Validate;

use crate::AppState;
use crate::db::{CommentExt, PostExt};
use crate::dtos::{ApiResponse, CreateCommentDto, PaginationMeta, PaginationQuery, UpdateCommentDto};
use crate::error::{ErrorMessage, HttpError};
use crate::handler::db_error;
use crate::middleware::{AuthUser, auth};
use crate::models::Owner;
use crate::services::{comment_tree, reconcile};

/// Routes under `/comments`. Listing and creating live under `/posts/{post_id}/comments`.
pub fn comment_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/{comment_id}", get(get_comment))
        .route(
            "/{comment_id}",
            put(update_comment)
                .delete(delete_comment)
                .route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
}

/// Root comments of a post, paginated, each with its full reply tree
#[instrument(skip(app_state))]
pub async fn get_post_comments(
    Path(post_id): Path<i64>,
    Query(query): Query<PaginationQuery>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    query.validate().map_err(|e| {
        tracing::error!("Invalid get_post_comments input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let db = &app_state.db_client;
    db.get_post(post_id)
        .await
        .map_err(|e| db_error("getting post", e))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::PostNotFound.to_string()))?;

    let (page, per_page) = query.resolve();

    let roots = db
        .get_root_comments(post_id, page, per_page)
        .await
        .map_err(|e| db_error("getting comments", e))?;
    let total = db
        .count_root_comments(post_id)
        .await
        .map_err(|e| db_error("counting comments", e))?;

    let mut threads = Vec::with_capacity(roots.len());
    for root in roots {
        let tree = comment_tree::load_tree(db, root).await?;
        threads.push(tree.into_thread());
    }

    Ok(Json(ApiResponse::paginated(
        "Comments retrieved",
        threads,
        PaginationMeta::new(page, per_page, total),
    )))
}

/// A single comment with all of its replies
#[instrument(skip(app_state))]
pub async fn get_comment(
    Path(comment_id): Path<i64>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let thread = comment_tree::load_thread(&app_state.db_client, comment_id).await?;

    Ok(Json(ApiResponse::success("Comment retrieved", thread)))
}

/// Create a root comment or, with `parent_id`, a reply.
///
/// The parent must be a live comment of the same post.
#[instrument(skip(app_state, auth_user, body), fields(user_id = auth_user.user.id))]
pub async fn create_comment(
    Path(post_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateCommentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid create_comment input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let db = &app_state.db_client;
    db.get_post(post_id)
        .await
        .map_err(|e| db_error("getting post", e))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::PostNotFound.to_string()))?;

    if let Some(parent_id) = body.parent_id {
        let parent = db
            .get_comment(parent_id)
            .await
            .map_err(|e| db_error("getting parent comment", e))?;
        if !parent.is_some_and(|p| p.post_id == post_id) {
            tracing::warn!(post_id, parent_id, "parent comment missing or on another post");
            return Err(HttpError::bad_request(
                ErrorMessage::InvalidParentComment.to_string(),
            ));
        }
    }

    reconcile::check_mentions(db, &body.mentions).await?;

    let comment = db
        .create_comment(auth_user.user.id, post_id, body.parent_id, &body.body)
        .await
        .map_err(|e| db_error("creating comment", e))?;

    reconcile::sync_mentions(db, Owner::comment(comment.id), &body.mentions).await?;

    if let Err(e) = db.adjust_comment_count(post_id, 1).await {
        tracing::warn!(post_id, "failed to adjust comment_count: {}", e);
    }

    let comment = db
        .get_comment_dto(comment.id)
        .await
        .map_err(|e| db_error("getting comment", e))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::CommentNotFound.to_string()))?;

    tracing::info!(comment_id = comment.id, "create_comment successful");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Comment created successfully", comment)),
    ))
}

/// Replace the body and reconcile mentions. Author only.
#[instrument(skip(app_state, auth_user, body), fields(user_id = auth_user.user.id))]
pub async fn update_comment(
    Path(comment_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<UpdateCommentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid update_comment input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let db = &app_state.db_client;
    let comment = db
        .get_comment(comment_id)
        .await
        .map_err(|e| db_error("getting comment", e))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::CommentNotFound.to_string()))?;

    if comment.user_id != auth_user.user.id {
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    reconcile::check_mentions(db, &body.mentions).await?;
    db.update_comment_body(comment_id, &body.body)
        .await
        .map_err(|e| db_error("updating comment", e))?;
    reconcile::sync_mentions(db, Owner::comment(comment_id), &body.mentions).await?;

    let comment = db
        .get_comment_dto(comment_id)
        .await
        .map_err(|e| db_error("getting comment", e))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::CommentNotFound.to_string()))?;

    Ok(Json(ApiResponse::success("Comment updated", comment)))
}

/// Soft-delete a comment. Its replies stay in place but are no longer
/// reachable from the post's threads.
#[instrument(skip(app_state, auth_user), fields(user_id = auth_user.user.id))]
pub async fn delete_comment(
    Path(comment_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<impl IntoResponse, HttpError> {
    let db = &app_state.db_client;
    let comment = db
        .get_comment(comment_id)
        .await
        .map_err(|e| db_error("getting comment", e))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::CommentNotFound.to_string()))?;

    if comment.user_id != auth_user.user.id {
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    db.delete_comment(comment_id).await.map_err(|e| match e {
        sqlx::Error::RowNotFound => HttpError::not_found(ErrorMessage::CommentNotFound.to_string()),
        e => db_error("deleting comment", e),
    })?;

    if let Err(e) = db.adjust_comment_count(comment.post_id, -1).await {
        tracing::warn!(post_id = comment.post_id, "failed to adjust comment_count: {}", e);
    }

    tracing::info!(comment_id, "delete_comment successful");
    Ok(Json(ApiResponse::message("Comment deleted successfully")))
}
