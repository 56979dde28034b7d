use crate::{
    AppState,
    db::{ProfileUpdate, UserExt},
    dtos::{ApiResponse, FilterUserDto, PaginationMeta, PaginationQuery, UpdateUserDto},
    error::{ErrorMessage, HttpError},
    middleware::{AuthUser, auth},
};
use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    middleware,
    response::IntoResponse,
    routing::{get, put},
};
use tracing::instrument;
use validator::Validate;

/// Router for user endpoints. Reads are public, writes need a token and
/// only ever touch the caller's own account.
pub fn users_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(get_users))
        .route("/{user}", get(get_user))
        .route(
            "/{user}",
            put(update_user)
                .delete(delete_user)
                .route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
}

/// Paginated list of users, oldest first
///
/// Query params: ?page=1&per_page=10
#[instrument(skip(app_state))]
pub async fn get_users(
    Query(query_params): Query<PaginationQuery>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate().map_err(|e| {
        tracing::error!("Invalid get_users input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let (page, per_page) = query_params.resolve();

    let users = app_state
        .db_client
        .get_users(page, per_page)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting users: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let user_count = app_state.db_client.get_user_count().await.map_err(|e| {
        tracing::error!("DB error, getting user count: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    tracing::info!("get_users successful");
    Ok(Json(ApiResponse::paginated(
        "Users retrieved",
        FilterUserDto::filter_users(&users),
        PaginationMeta::new(page, per_page, user_count),
    )))
}

#[instrument(skip(app_state))]
pub async fn get_user(
    Path(username): Path<String>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let user = app_state
        .db_client
        .get_user(None, Some(&username), None)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::UserNotFound.to_string()))?;

    Ok(Json(ApiResponse::success(
        "User retrieved",
        FilterUserDto::filter_user(&user),
    )))
}

/// Partial profile update of the caller's own account
#[instrument(skip(app_state, auth_user, body), fields(user_id = auth_user.user.id))]
pub async fn update_user(
    Path(username): Path<String>,
    State(app_state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<UpdateUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid update_user input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    if auth_user.user.username != username {
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    let update = ProfileUpdate {
        first_name: body.first_name,
        last_name: body.last_name,
        avatar_url: body.avatar_url,
        bio: body.bio,
        website_url: body.website_url,
        city: body.city,
        country: body.country,
    };

    let user = app_state
        .db_client
        .update_user_profile(auth_user.user.id, &update)
        .await
        .map_err(|e| {
            tracing::error!("DB error, updating user profile: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    tracing::info!("update_user successful");
    Ok(Json(ApiResponse::success(
        "User updated",
        FilterUserDto::filter_user(&user),
    )))
}

/// Soft-delete the caller's own account
#[instrument(skip(app_state, auth_user), fields(user_id = auth_user.user.id))]
pub async fn delete_user(
    Path(user_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<impl IntoResponse, HttpError> {
    if auth_user.user.id != user_id {
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    app_state
        .db_client
        .delete_user(user_id)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => HttpError::not_found(ErrorMessage::UserNotFound.to_string()),
            e => {
                tracing::error!("DB error, deleting user: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        })?;

    tracing::info!("delete_user successful");
    Ok(Json(ApiResponse::message("User deleted")))
}
