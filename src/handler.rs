use crate::error::{ErrorMessage, HttpError};

pub mod auth;
pub mod comment;
pub mod like;
pub mod media;
pub mod post;
pub mod users;

/// Logs a store failure and hides it behind the generic server error.
pub(crate) fn db_error(context: &str, e: sqlx::Error) -> HttpError {
    tracing::error!("DB error, {}: {}", context, e);
    HttpError::server_error(ErrorMessage::ServerError.to_string())
}
