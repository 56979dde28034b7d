use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One entry of the `errors` list in the error envelope.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetail {
    pub code: u16,
    pub message: String,
}

/// Error envelope sent to clients
///
/// Example JSON response:
/// ```text
/// {
///   "type": "error",
///   "message": "Post not found",
///   "errors": [{ "code": 404, "message": "Post not found" }]
/// }
/// ```
///
/// HttpError is what handlers return; this struct is only the wire format,
/// so internal details never leak into it.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub kind: String, // Always "error"
    pub message: String,
    pub errors: Vec<ErrorDetail>,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Fixed user-facing error messages
///
/// PartialEq allows comparing error variants in tests.
#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    // Password validation errors
    EmptyPassword,
    ExceededMaxPasswordLength(usize),
    InvalidHashFormat,
    HashingError,

    // Authentication errors
    InvalidToken,
    TokenNotProvided,
    WrongCredentials,

    // Authorization errors
    PermissionDenied,

    // Lookup errors
    UserNoLongerExist,
    UserNotFound,
    UserExists,
    PostNotFound,
    CommentNotFound,
    LikeNotFound,
    InvalidParentComment,

    //Else
    ServerError,
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorMessage::UserNoLongerExist => {
                "User belonging to this token no longer exists".to_string()
            }
            ErrorMessage::EmptyPassword => "Password cannot be empty".to_string(),
            ErrorMessage::HashingError => "Error while hashing password".to_string(),
            ErrorMessage::InvalidHashFormat => "Invalid password hash format".to_string(),
            ErrorMessage::ExceededMaxPasswordLength(max_length) => {
                format!("Password must not be more than {} characters", max_length)
            }
            ErrorMessage::InvalidToken => "Token is invalid or expired".to_string(),
            ErrorMessage::TokenNotProvided => {
                "You are not logged in, please provide a token".to_string()
            }
            ErrorMessage::WrongCredentials => "Invalid username or password".to_string(),
            ErrorMessage::PermissionDenied => {
                "You are not allowed to perform this action".to_string()
            }
            ErrorMessage::UserNotFound => "User not found".to_string(),
            ErrorMessage::UserExists => "Username or email already exists".to_string(),
            ErrorMessage::PostNotFound => "Post not found".to_string(),
            ErrorMessage::CommentNotFound => "Comment not found".to_string(),
            ErrorMessage::LikeNotFound => "Like not found".to_string(),
            ErrorMessage::InvalidParentComment => "Invalid parent comment ID".to_string(),
            ErrorMessage::ServerError => "Server Error. Please try again later".to_string(),
        };
        write!(f, "{}", message)
    }
}

/// Error returned by the service layer (reconcilers, tree loader, like toggle).
///
/// Services know nothing about HTTP; handlers turn this into an HttpError
/// through the `From` impl below.
#[derive(Debug)]
pub enum ServiceError {
    NotFound(String),
    Forbidden(String),
    BadRequest(String),
    Database(sqlx::Error),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::NotFound(message) => write!(f, "not found: {}", message),
            ServiceError::Forbidden(message) => write!(f, "forbidden: {}", message),
            ServiceError::BadRequest(message) => write!(f, "bad request: {}", message),
            ServiceError::Database(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self {
        ServiceError::Database(e)
    }
}

/// Internal HTTP error type used by handlers and middleware
///
/// Handlers return `Result<T, HttpError>`; axum renders the error through
/// `IntoResponse`, so the status code always travels with its message.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub message: String,
    pub status: StatusCode,
}

impl HttpError {
    /// 500: store failures and anything else that is not the client's fault.
    pub fn server_error(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 400: malformed body, failed validation, invalid references.
    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    /// 409: unique constraint violations (duplicate username or email).
    pub fn unique_constraint_violation(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::CONFLICT,
        }
    }

    /// 401: missing, invalid or expired credentials.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::UNAUTHORIZED,
        }
    }

    /// 403: authenticated, but not the owner of the resource.
    pub fn forbidden(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::FORBIDDEN,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::NOT_FOUND,
        }
    }

    pub fn into_http_response(self) -> Response {
        let json_response = Json(ErrorResponse {
            kind: "error".to_string(),
            message: self.message.clone(),
            errors: vec![ErrorDetail {
                code: self.status.as_u16(),
                message: self.message,
            }],
        });

        (self.status, json_response).into_response()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HttpError: message: {}, status: {}",
            self.message, self.status
        )
    }
}

impl std::error::Error for HttpError {}

impl From<ServiceError> for HttpError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::NotFound(message) => HttpError::not_found(message),
            ServiceError::Forbidden(message) => HttpError::forbidden(message),
            ServiceError::BadRequest(message) => HttpError::bad_request(message),
            ServiceError::Database(e) => {
                tracing::error!("DB error: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_status_codes() {
        let cases = [
            (ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ServiceError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ServiceError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (
                ServiceError::Database(sqlx::Error::RowNotFound),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(HttpError::from(err).status, status);
        }
    }

    #[test]
    fn database_errors_do_not_leak_details() {
        let err = HttpError::from(ServiceError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(err.message, ErrorMessage::ServerError.to_string());
    }

    #[tokio::test]
    async fn error_envelope_carries_code_and_message() {
        let response = HttpError::forbidden("nope").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.kind, "error");
        assert_eq!(body.message, "nope");
        assert_eq!(
            body.errors,
            vec![ErrorDetail {
                code: 403,
                message: "nope".to_string()
            }]
        );
    }
}
