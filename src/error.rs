use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::intake::FieldErrors;
use crate::model::IntakeFailure;

/// Failures of the persistence plumbing itself, independent of what was being attempted.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No active session")]
    MissingSession,

    #[error("Session is unknown or expired")]
    InvalidSession,

    #[error("Unauthorized access")]
    NotAdmin,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account for {0} already exists")]
    AlreadyProvisioned(String),

    #[error("Admin credential is not configured")]
    NotConfigured,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl From<diesel::result::Error> for AuthError {
    fn from(e: diesel::result::Error) -> Self {
        AuthError::Backend(BackendError::Database(e))
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::MissingSession | AuthError::InvalidSession => StatusCode::UNAUTHORIZED,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::NotAdmin => StatusCode::FORBIDDEN,
            AuthError::AlreadyProvisioned(_) => StatusCode::CONFLICT,
            AuthError::NotConfigured | AuthError::Hashing(_) | AuthError::Backend(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.to_string()).into_response()
    }
}

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Invalid blob path: {0:?}")]
    InvalidPath(String),

    #[error("Blob already exists: {0}")]
    AlreadyExists(String),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Storage error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl IntoResponse for BlobError {
    fn into_response(self) -> Response {
        let status = match self {
            BlobError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            BlobError::NotFound(_) => StatusCode::NOT_FOUND,
            BlobError::AlreadyExists(_) => StatusCode::CONFLICT,
            BlobError::Io { .. } | BlobError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Submissions are closed")]
    Closed,

    #[error("Please correct the highlighted fields")]
    Invalid(FieldErrors),

    #[error("Malformed submission: {0}")]
    Malformed(String),

    #[error("Error uploading {path}: {source}")]
    Upload {
        path: String,
        #[source]
        source: BlobError,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl From<diesel::result::Error> for IntakeError {
    fn from(e: diesel::result::Error) -> Self {
        IntakeError::Backend(BackendError::Database(e))
    }
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        let status = match self {
            IntakeError::Closed => StatusCode::FORBIDDEN,
            IntakeError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            IntakeError::Malformed(_) => StatusCode::BAD_REQUEST,
            IntakeError::Upload {
                source: BlobError::AlreadyExists(_),
                ..
            } => StatusCode::CONFLICT,
            IntakeError::Upload { .. } | IntakeError::Backend(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        // The blob key is derived from the team name, so a taken key means a repeat submission.
        let message = match self {
            IntakeError::Upload {
                source: BlobError::AlreadyExists(_),
                ..
            } => "This team has already submitted a project".to_string(),
            _ => self.to_string(),
        };
        let fields = match self {
            IntakeError::Invalid(fields) => fields,
            _ => FieldErrors::new(),
        };

        (status, Json(IntakeFailure { message, fields })).into_response()
    }
}

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Submission {0} not found")]
    NotFound(i32),

    #[error("Error deleting file {path}: {source}")]
    BlobRemoval {
        path: String,
        #[source]
        source: BlobError,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl From<diesel::result::Error> for ReviewError {
    fn from(e: diesel::result::Error) -> Self {
        ReviewError::Backend(BackendError::Database(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_team_upload_is_a_conflict() {
        let response = IntakeError::Upload {
            path: "Alpha/Alpha_technical.pdf".to_string(),
            source: BlobError::AlreadyExists("Alpha/Alpha_technical.pdf".to_string()),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let failed = IntakeError::Upload {
            path: "Alpha/Alpha_technical.pdf".to_string(),
            source: BlobError::Io {
                path: "Alpha/Alpha_technical.pdf".to_string(),
                source: std::io::Error::other("disk full"),
            },
        }
        .into_response();
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_auth_statuses() {
        assert_eq!(
            AuthError::MissingSession.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::NotAdmin.into_response().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::AlreadyProvisioned("admin@example.com".to_string())
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
    }
}
