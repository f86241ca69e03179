use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use validator::ValidationErrors;

use crate::db;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not_found")]
    NotFound(String),
    #[error("validation")]
    Validation(ValidationErrors),

    #[error("persistence_read: {0}")]
    PersistenceRead(db::Error),
    #[error("persistence_write: {0}")]
    PersistenceWrite(db::Error),

    #[error("csrf_validation_failed")]
    CsrfValidationFailed,
    #[error(transparent)]
    Session(#[from] tower_sessions::session::Error),
    #[error("bad_form: {0}")]
    BadForm(String),
    #[error("unexpected: {0}")]
    Unexpected(String),

    // startup
    #[error(transparent)]
    DB(db::Error),
    #[error(transparent)]
    Template(#[from] minijinja::Error),
    #[error(transparent)]
    Config(#[from] envy::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<db::Error> for Error {
    fn from(error: db::Error) -> Self {
        match error {
            db::Error::NotFound(msg) => Self::NotFound(msg),
            error => Self::DB(error),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotFound(message) => {
                tracing::warn!("{message}");
                (StatusCode::NOT_FOUND, "Not found").into_response()
            }
            Error::CsrfValidationFailed => {
                tracing::warn!("anti-forgery token missing or invalid");
                (StatusCode::FORBIDDEN, "Forbidden").into_response()
            }
            Error::BadForm(message) => {
                tracing::warn!("rejected form: {message}");
                (StatusCode::BAD_REQUEST, "Bad request").into_response()
            }
            err => {
                tracing::error!("{err:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Unexpected error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_not_found_becomes_not_found() {
        let error = Error::from(db::Error::NotFound("Note '1' not found".into()));
        assert!(matches!(error, Error::NotFound(ref m) if m == "Note '1' not found"));

        let error = Error::from(db::Error::Rusqlite(rusqlite::Error::InvalidQuery));
        assert!(matches!(error, Error::DB(_)));
    }

    #[test]
    fn statuses() {
        assert_eq!(Error::NotFound("x".into()).into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(Error::CsrfValidationFailed.into_response().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            Error::PersistenceRead(db::Error::Rusqlite(rusqlite::Error::InvalidQuery))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
