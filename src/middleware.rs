use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::IntoResponse,
};

use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    db::UserExt,
    error::{ErrorMessage, HttpError},
    models::User,
    utils::token,
};

/// The authenticated caller, inserted into request extensions by `auth`.
///
/// ```text
/// async fn my_handler(Extension(auth): Extension<AuthUser>) {
///     // auth.user.id is the caller
/// }
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthUser {
    pub user: User,
}

/// Pulls the token out of the `access_token` cookie or, failing that, an
/// `Authorization: Bearer <token>` header.
fn extract_token(cookie_jar: &CookieJar, req: &Request) -> Option<String> {
    cookie_jar
        .get("access_token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_owned())
        })
}

/// Authentication middleware that validates JWT tokens
///
/// Verifies the token, loads the user it names and stores it as `AuthUser`.
///
/// # Errors
/// 401 if no token is given, the token is invalid or expired, or the user
/// no longer exists.
pub async fn auth(
    cookie_jar: CookieJar,
    State(app_state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let token = extract_token(&cookie_jar, &req)
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string()))?;

    let subject = token::decode_token(token, app_state.env.jwt_secret.as_bytes())
        .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;

    let user_id = subject
        .parse::<i64>()
        .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;

    let user = app_state
        .db_client
        .get_user(Some(user_id), None, None)
        .await
        .map_err(|e| {
            tracing::error!("DB error while authenticating user {}: {}", user_id, e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string()))?;

    req.extensions_mut().insert(AuthUser { user });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn bearer_header_is_read() {
        let req = Request::builder()
            .header(header::AUTHORIZATION, "Bearer abc.def.ghi")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            extract_token(&CookieJar::new(), &req),
            Some("abc.def.ghi".to_string())
        );
    }

    #[test]
    fn cookie_wins_over_header() {
        let req = Request::builder()
            .header(header::COOKIE, "access_token=from-cookie")
            .header(header::AUTHORIZATION, "Bearer from-header")
            .body(Body::empty())
            .unwrap();
        let jar = CookieJar::from_headers(req.headers());
        assert_eq!(extract_token(&jar, &req), Some("from-cookie".to_string()));
    }

    #[test]
    fn other_schemes_are_ignored() {
        let req = Request::builder()
            .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_token(&CookieJar::new(), &req), None);
    }
}
