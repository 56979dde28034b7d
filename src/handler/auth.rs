use crate::{
    AppState,
    db::UserExt,
    dtos::{ApiResponse, AuthData, FilterUserDto, LoginUserDto, RegisterUserDto},
    error::{ErrorMessage, HttpError},
    models::User,
    utils::{password, token},
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::instrument;
use validator::Validate;

/// Router for authentication endpoints
pub fn auth_handler() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Issues a token for `user` and the matching `access_token` cookie.
fn issue_token(app_state: &AppState, user: &User) -> Result<(String, Cookie<'static>), HttpError> {
    let access_token = token::create_token(
        &user.id.to_string(),
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .map_err(|e| {
        tracing::error!("Access token creation error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let cookie = Cookie::build(("access_token", access_token.clone()))
        .path("/")
        .http_only(true)
        .secure(true)
        .build();

    Ok((access_token, cookie))
}

/// Register a new account and log it in
#[instrument(skip(app_state, jar, body), fields(username = %body.username, email = %body.email))]
pub async fn register(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<RegisterUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid register input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let hash_password = password::hash(&body.password).map_err(|e| {
        tracing::error!("Password hashing error: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let result = app_state
        .db_client
        .save_user(&body.username, &body.email, &hash_password)
        .await;

    let user = match result {
        Ok(user) => user,
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            tracing::error!("DB error, saving user, unique_violation: {}", db_err);
            return Err(HttpError::unique_constraint_violation(
                ErrorMessage::UserExists.to_string(),
            ));
        }
        Err(e) => {
            tracing::error!("DB error, saving user: {}", e);
            return Err(HttpError::server_error(
                ErrorMessage::ServerError.to_string(),
            ));
        }
    };

    let (access_token, cookie) = issue_token(&app_state, &user)?;

    tracing::info!(user_id = user.id, "Register Successful");
    Ok((
        StatusCode::CREATED,
        jar.add(cookie),
        Json(ApiResponse::success(
            "Registration successful",
            AuthData {
                token: access_token,
                user: FilterUserDto::filter_user(&user),
            },
        )),
    ))
}

/// Login with username or email (identifier containing '@' is an email)
#[instrument(skip(app_state, jar, body), fields(identifier = %body.identifier))]
pub async fn login(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid login input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let result = if body.identifier.contains('@') {
        app_state
            .db_client
            .get_user(None, None, Some(&body.identifier))
            .await
    } else {
        app_state
            .db_client
            .get_user(None, Some(&body.identifier), None)
            .await
    }
    .map_err(|e| {
        tracing::error!("DB error, getting user: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let user = result.ok_or_else(|| {
        tracing::warn!("User not found");
        HttpError::unauthorized(ErrorMessage::WrongCredentials.to_string())
    })?;

    let password_matched = password::compare(&body.password, &user.password).map_err(|e| {
        tracing::warn!("Password error: {}", e);
        HttpError::unauthorized(ErrorMessage::WrongCredentials.to_string())
    })?;

    if !password_matched {
        tracing::warn!("password mismatch");
        return Err(HttpError::unauthorized(
            ErrorMessage::WrongCredentials.to_string(),
        ));
    }

    let (access_token, cookie) = issue_token(&app_state, &user)?;

    tracing::info!(user_id = user.id, "Login Successful");
    Ok((
        jar.add(cookie),
        Json(ApiResponse::success(
            "Login successful",
            AuthData {
                token: access_token,
                user: FilterUserDto::filter_user(&user),
            },
        )),
    ))
}
