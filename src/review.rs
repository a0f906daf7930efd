//! The admin review side: how a submission's artifacts are offered in the dashboard, the
//! delete workflow, and the blob download endpoint.

use crate::model::UploadRef;

#[cfg(feature = "ssr")]
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
#[cfg(feature = "ssr")]
use diesel::SqliteConnection;
#[cfg(feature = "ssr")]
use serde::Deserialize;
#[cfg(feature = "ssr")]
use tracing::{info, warn};

#[cfg(feature = "ssr")]
use crate::{
    auth::session_token,
    backend::Backend,
    delete_submission_row,
    error::{BackendError, BlobError, ReviewError},
    find_submission, list_submissions,
    model::Submission,
    storage::{content_type_for, file_name_of, is_valid_blob_path, BlobStore},
};

/// What a dashboard cell offers for one artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArtifactCell {
    /// A control that fetches the blob and saves it locally.
    Download { path: String, label: String },
    /// A plain outbound link.
    Link { href: String, label: String },
    Empty,
}

pub fn artifact_cell(label: &str, reference: Option<&UploadRef>) -> ArtifactCell {
    match reference {
        Some(UploadRef::File(path)) => ArtifactCell::Download {
            path: path.clone(),
            label: format!("Download {label}"),
        },
        Some(UploadRef::Link(href)) => ArtifactCell::Link {
            href: href.clone(),
            label: format!("View {label}"),
        },
        None => ArtifactCell::Empty,
    }
}

/// Deletes a submission: every referenced blob first (bmc, technical, presentation), then the
/// row. The first blob failure aborts before the row is touched. Returns the refreshed list.
#[cfg(feature = "ssr")]
pub fn delete_submission(
    conn: &mut SqliteConnection,
    store: &dyn BlobStore,
    submission_id: i32,
) -> Result<Vec<Submission>, ReviewError> {
    let submission =
        find_submission(conn, submission_id)?.ok_or(ReviewError::NotFound(submission_id))?;

    for path in submission.blob_paths() {
        store
            .remove(path)
            .map_err(|source| ReviewError::BlobRemoval {
                path: path.to_string(),
                source,
            })?;
    }

    delete_submission_row(conn, submission_id)?;
    info!(
        id = submission_id,
        team = %submission.team_name,
        "Submission deleted"
    );
    Ok(list_submissions(conn)?)
}

#[cfg(feature = "ssr")]
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub path: String,
}

/// `GET /files/download?path=…`: streams one blob to an admin, typed by its extension.
#[cfg(feature = "ssr")]
pub async fn download_handler(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Query(query): Query<DownloadQuery>,
) -> Response {
    if let Err(e) = backend.authorize(session_token(&headers)).await {
        warn!("Download refused: {e}");
        return e.into_response();
    }

    let path = query.path;
    if !is_valid_blob_path(&path) {
        return BlobError::InvalidPath(path).into_response();
    }

    let blobs = backend.blobs.clone();
    let blob_path = path.clone();
    let downloaded = tokio::task::spawn_blocking(move || blobs.download(&blob_path))
        .await
        .map_err(|e| BlobError::Backend(BackendError::Join(e)))
        .and_then(|result| result);

    match downloaded {
        Ok(bytes) => {
            let disposition = format!("attachment; filename=\"{}\"", file_name_of(&path));
            let mut response = bytes.into_response();
            let response_headers = response.headers_mut();
            response_headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(content_type_for(&path)),
            );
            if let Ok(value) = HeaderValue::from_str(&disposition) {
                response_headers.insert(header::CONTENT_DISPOSITION, value);
            }
            response
        }
        Err(e) => {
            warn!("Error downloading file: {e}");
            e.into_response()
        }
    }
}
