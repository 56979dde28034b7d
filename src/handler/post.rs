use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post, put};
use axum::{Extension, Router, middleware};
use tracing::instrument;
use validator::Validate;

use crate::AppState;
use crate::db::{DBClient, FeedExt, NewPost, PostExt, PostSettings};
use crate::dtos::{
    ApiResponse, CreatePostDto, PaginationMeta, PaginationQuery, PostDto, PostWithAuthor,
    UpdatePostBodyDto, UpdatePostHashtagsDto, UpdatePostMediaDto, UpdatePostSettingsDto,
    UpdatePostTitleDto,
};
use crate::error::{ErrorMessage, HttpError};
use crate::handler::comment::{create_comment, get_post_comments};
use crate::handler::db_error;
use crate::middleware::{AuthUser, auth};
use crate::models::{Owner, OwnerType, Post};
use crate::services::{reconcile, tags};

pub fn post_handler(app_state: AppState) -> Router<AppState> {
    let auth_layer = || middleware::from_fn_with_state(app_state.clone(), auth);

    Router::new()
        .route("/", get(get_posts))
        .route("/", post(create_post).route_layer(auth_layer()))
        .route("/{post_id}", get(get_post))
        .route(
            "/{post_id}",
            put(update_post_settings)
                .delete(delete_post)
                .route_layer(auth_layer()),
        )
        .route("/{post_id}/title", put(update_post_title).route_layer(auth_layer()))
        .route("/{post_id}/body", put(update_post_body).route_layer(auth_layer()))
        .route("/{post_id}/medias", put(update_post_medias).route_layer(auth_layer()))
        .route(
            "/{post_id}/hashtags",
            put(update_post_hashtags).route_layer(auth_layer()),
        )
        .route("/{post_id}/comments", get(get_post_comments))
        .route(
            "/{post_id}/comments",
            post(create_comment).route_layer(auth_layer()),
        )
}

/// Loads media, mentions and hashtags for a page of posts, one query per kind.
async fn with_associations(
    db: &DBClient,
    rows: Vec<PostWithAuthor>,
) -> Result<Vec<PostDto>, sqlx::Error> {
    let ids: Vec<i64> = rows.iter().map(|r| r.post.id).collect();
    let mut posts: Vec<PostDto> = rows.into_iter().map(PostDto::without_associations).collect();
    if ids.is_empty() {
        return Ok(posts);
    }

    let index: HashMap<i64, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    for media in db.get_media_for_owners(OwnerType::Posts, &ids).await? {
        if let Some(&i) = media.owner_id.and_then(|id| index.get(&id)) {
            posts[i].medias.push(media);
        }
    }
    for mention in db.get_mentions_for_owners(OwnerType::Posts, &ids).await? {
        if let Some(&i) = index.get(&mention.owner_id) {
            posts[i].mentions.push(mention);
        }
    }
    for row in db.get_tags_for_posts(&ids).await? {
        if let Some(&i) = index.get(&row.post_id) {
            posts[i].hashtags.push(row.tag);
        }
    }

    Ok(posts)
}

async fn load_post_dto(db: &DBClient, post_id: i64) -> Result<PostDto, HttpError> {
    let row = db
        .get_post_with_author(post_id)
        .await
        .map_err(|e| db_error("getting post", e))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::PostNotFound.to_string()))?;

    with_associations(db, vec![row])
        .await
        .map_err(|e| db_error("loading post associations", e))?
        .pop()
        .ok_or_else(|| HttpError::not_found(ErrorMessage::PostNotFound.to_string()))
}

/// The post, if it exists and belongs to `user_id`
async fn owned_post(db: &DBClient, post_id: i64, user_id: i64) -> Result<Post, HttpError> {
    let post = db
        .get_post(post_id)
        .await
        .map_err(|e| db_error("getting post", e))?
        .ok_or_else(|| HttpError::not_found(ErrorMessage::PostNotFound.to_string()))?;

    if post.user_id != user_id {
        tracing::warn!(post_id, user_id, "not the post owner");
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    Ok(post)
}

#[instrument(skip(app_state))]
pub async fn get_posts(
    Query(params): Query<PaginationQuery>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    params.validate().map_err(|e| {
        tracing::error!("Invalid get_posts input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let (page, per_page) = params.resolve();
    let db = &app_state.db_client;

    let rows = db
        .get_posts(page, per_page)
        .await
        .map_err(|e| db_error("getting posts", e))?;
    let total = db
        .get_post_count()
        .await
        .map_err(|e| db_error("counting posts", e))?;
    let posts = with_associations(db, rows)
        .await
        .map_err(|e| db_error("loading post associations", e))?;

    Ok(Json(ApiResponse::paginated(
        "Posts retrieved",
        posts,
        PaginationMeta::new(page, per_page, total),
    )))
}

/// Show a post; every successful read counts as a view.
#[instrument(skip(app_state))]
pub async fn get_post(
    Path(post_id): Path<i64>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let mut post = load_post_dto(&app_state.db_client, post_id).await?;

    match app_state.db_client.increment_view_count(post_id).await {
        Ok(()) => post.post.view_count += 1,
        Err(e) => tracing::warn!(post_id, "failed to increment view_count: {}", e),
    }

    Ok(Json(ApiResponse::success("Post retrieved", post)))
}

/// Create a post, then attach its media, mentions and hashtags in that order.
///
/// Referenced media and mentioned users are checked before the post row is
/// written. After that each step is its own write; a failure part way leaves
/// the earlier steps in place.
#[instrument(skip(app_state, auth_user, body), fields(user_id = auth_user.user.id))]
pub async fn create_post(
    State(app_state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreatePostDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid create_post input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let db = &app_state.db_client;
    let user_id = auth_user.user.id;

    let media_ids: Vec<i64> = body.medias.iter().map(|m| m.id).collect();
    reconcile::check_media(db, user_id, &media_ids).await?;
    reconcile::check_mentions(db, &body.mentions).await?;

    let new_post = NewPost {
        title: body.title,
        body: body.body,
        settings: PostSettings {
            visibility: body.visibility,
            is_promoted: body.is_promoted,
            promotion_expiry: body.promotion_expiry,
            is_featured: body.is_featured,
            featured_expiry: body.featured_expiry,
        },
    };

    let post = db
        .create_post(user_id, &new_post)
        .await
        .map_err(|e| db_error("creating post", e))?;
    let owner = Owner::post(post.id);

    reconcile::sync_media(db, user_id, owner, &body.medias).await?;
    reconcile::sync_mentions(db, owner, &body.mentions).await?;
    tags::sync_hashtags(db, user_id, post.id, &body.hashtags).await?;

    let post = load_post_dto(db, post.id).await?;

    tracing::info!(post_id = post.post.id, "create_post successful");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Post created successfully", post)),
    ))
}

/// Update visibility and promotion flags
#[instrument(skip(app_state, auth_user, body), fields(user_id = auth_user.user.id))]
pub async fn update_post_settings(
    Path(post_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<UpdatePostSettingsDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid update_post_settings input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let db = &app_state.db_client;
    owned_post(db, post_id, auth_user.user.id).await?;

    let settings = PostSettings {
        visibility: body.visibility,
        is_promoted: body.is_promoted,
        promotion_expiry: body.promotion_expiry,
        is_featured: body.is_featured,
        featured_expiry: body.featured_expiry,
    };
    db.update_post_settings(post_id, &settings)
        .await
        .map_err(|e| db_error("updating post settings", e))?;

    let post = load_post_dto(db, post_id).await?;
    Ok(Json(ApiResponse::success("Post updated", post)))
}

#[instrument(skip(app_state, auth_user, body), fields(user_id = auth_user.user.id))]
pub async fn update_post_title(
    Path(post_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<UpdatePostTitleDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid update_post_title input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let db = &app_state.db_client;
    owned_post(db, post_id, auth_user.user.id).await?;

    db.update_post_title(post_id, &body.title)
        .await
        .map_err(|e| db_error("updating post title", e))?;

    let post = load_post_dto(db, post_id).await?;
    Ok(Json(ApiResponse::success("Post title updated", post)))
}

/// Replace the body and reconcile the mentions it carries
#[instrument(skip(app_state, auth_user, body), fields(user_id = auth_user.user.id))]
pub async fn update_post_body(
    Path(post_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<UpdatePostBodyDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid update_post_body input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let db = &app_state.db_client;
    owned_post(db, post_id, auth_user.user.id).await?;

    reconcile::check_mentions(db, &body.mentions).await?;
    db.update_post_body(post_id, &body.body)
        .await
        .map_err(|e| db_error("updating post body", e))?;
    let outcome = reconcile::sync_mentions(db, Owner::post(post_id), &body.mentions).await?;

    tracing::info!(
        added = outcome.added.len(),
        removed = outcome.removed.len(),
        "update_post_body successful"
    );
    let post = load_post_dto(db, post_id).await?;
    Ok(Json(ApiResponse::success("Post body updated", post)))
}

#[instrument(skip(app_state, auth_user, body), fields(user_id = auth_user.user.id))]
pub async fn update_post_medias(
    Path(post_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<UpdatePostMediaDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid update_post_medias input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let db = &app_state.db_client;
    let user_id = auth_user.user.id;
    owned_post(db, post_id, user_id).await?;

    let outcome =
        reconcile::sync_media(db, user_id, Owner::post(post_id), &body.medias).await?;

    tracing::info!(
        added = outcome.added.len(),
        removed = outcome.removed.len(),
        "update_post_medias successful"
    );
    let post = load_post_dto(db, post_id).await?;
    Ok(Json(ApiResponse::success("Post medias updated", post)))
}

/// Reconcile hashtags; existence and ownership are checked by the reconciler
#[instrument(skip(app_state, auth_user, body), fields(user_id = auth_user.user.id))]
pub async fn update_post_hashtags(
    Path(post_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<UpdatePostHashtagsDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid update_post_hashtags input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let db = &app_state.db_client;
    let outcome = tags::sync_hashtags(db, auth_user.user.id, post_id, &body.hashtags).await?;

    tracing::info!(
        added = outcome.added.len(),
        removed = outcome.removed.len(),
        "update_post_hashtags successful"
    );
    let post = load_post_dto(db, post_id).await?;
    Ok(Json(ApiResponse::success("Post hashtags updated", post)))
}

#[instrument(skip(app_state, auth_user), fields(user_id = auth_user.user.id))]
pub async fn delete_post(
    Path(post_id): Path<i64>,
    State(app_state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<impl IntoResponse, HttpError> {
    let db = &app_state.db_client;
    owned_post(db, post_id, auth_user.user.id).await?;

    db.delete_post(post_id).await.map_err(|e| match e {
        sqlx::Error::RowNotFound => HttpError::not_found(ErrorMessage::PostNotFound.to_string()),
        e => db_error("deleting post", e),
    })?;

    tracing::info!(post_id, "delete_post successful");
    Ok(Json(ApiResponse::message("Post deleted successfully")))
}
