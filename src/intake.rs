//! Submission intake: field validation shared by the browser and the server, and the
//! upload-then-insert workflow behind `POST /intake`.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::storage::{blob_path, file_extension, is_valid_blob_path};

#[cfg(feature = "ssr")]
use std::collections::HashMap;

#[cfg(feature = "ssr")]
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
#[cfg(feature = "ssr")]
use chrono::{DateTime, Utc};
#[cfg(feature = "ssr")]
use diesel::SqliteConnection;
#[cfg(feature = "ssr")]
use tracing::{info, warn};

#[cfg(feature = "ssr")]
use crate::{
    backend::Backend,
    deadline::{is_open, load_deadline},
    error::IntakeError,
    insert_submission,
    model::{NewSubmission, Submission, UploadRef},
    storage::BlobStore,
};

pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;
pub const MAX_TEAM_NAME_CHARS: usize = 100;
/// Room for three maximum-size files plus the text fields.
pub const MAX_INTAKE_BODY_BYTES: usize = 3 * MAX_FILE_BYTES as usize + 1024 * 1024;

/// Multipart field names shared by the form markup and the handler.
pub mod names {
    pub const TEAM_NAME: &str = "team_name";
    pub const FIGMA_URL: &str = "figma_url";
    pub const TECHNICAL_FILE: &str = "technical_file";
    pub const PRESENTATION_MODE: &str = "presentation_mode";
    pub const PRESENTATION_FILE: &str = "presentation_file";
    pub const PRESENTATION_URL: &str = "presentation_url";
    pub const BMC_MODE: &str = "bmc_mode";
    pub const BMC_FILE: &str = "bmc_file";
    pub const BMC_URL: &str = "bmc_url";
    pub const DRIVE_URL: &str = "drive_url";
}

static FIGMA_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://([\w.-]+\.)?figma\.com/.*").expect("figma pattern is valid")
});
static ARTIFACT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://([\w.-]+\.)?(canva\.com|docs\.google\.com|drive\.google\.com)/.*")
        .expect("artifact link pattern is valid")
});
static DRIVE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://(drive|docs)\.google\.com/.*").expect("drive pattern is valid")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    TeamName,
    FigmaUrl,
    Technical,
    Presentation,
    Bmc,
    DriveUrl,
}

impl Field {
    /// The `{field}` segment of a blob path.
    pub fn blob_suffix(&self) -> &'static str {
        match self {
            Field::TeamName => "team_name",
            Field::FigmaUrl => "figma_url",
            Field::Technical => "technical",
            Field::Presentation => "presentation",
            Field::Bmc => "bmc",
            Field::DriveUrl => "drive_url",
        }
    }

    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            Field::Technical => &["pdf"],
            Field::Presentation => &["pdf", "ppt", "pptx"],
            Field::Bmc => &["pdf", "doc", "docx"],
            _ => &[],
        }
    }

    /// Value for the file input's `accept` attribute.
    pub fn accept(&self) -> String {
        self.allowed_extensions()
            .iter()
            .map(|ext| format!(".{ext}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

pub type FieldErrors = BTreeMap<Field, String>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub name: String,
    pub size: u64,
}

/// Which of the two mutually exclusive inputs the submitter picked for an artifact.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactMode {
    #[default]
    File,
    Link,
}

impl ArtifactMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactMode::File => "file",
            ArtifactMode::Link => "url",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "file" => Some(ArtifactMode::File),
            "url" => Some(ArtifactMode::Link),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArtifactInput {
    File(Option<FileMeta>),
    Link(String),
}

impl ArtifactInput {
    fn is_blank(&self) -> bool {
        match self {
            ArtifactInput::File(meta) => meta.is_none(),
            ArtifactInput::Link(url) => url.trim().is_empty(),
        }
    }
}

/// Everything the intake form collects, before any upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntakeDraft {
    pub team_name: String,
    pub figma_url: String,
    pub technical: Option<FileMeta>,
    pub presentation: ArtifactInput,
    /// `None` when the submitter chose not to provide a business model.
    pub bmc: Option<ArtifactInput>,
    /// Empty when not provided.
    pub drive_url: String,
}

/// Validates a draft. Returns every failing field with its message.
pub fn validate(draft: &IntakeDraft) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    let team_name = draft.team_name.trim();
    if team_name.is_empty() {
        errors.insert(Field::TeamName, "Team name is required".to_string());
    } else if team_name.chars().count() > MAX_TEAM_NAME_CHARS {
        errors.insert(
            Field::TeamName,
            format!("Team name must be at most {MAX_TEAM_NAME_CHARS} characters"),
        );
    } else if team_name.contains(['/', '\\']) || team_name.contains("..") {
        errors.insert(
            Field::TeamName,
            "Team name cannot contain slashes or \"..\"".to_string(),
        );
    } else if team_name.starts_with('.')
        || team_name.chars().any(char::is_control)
        || !is_valid_blob_path(&blob_path(team_name, Field::Technical.blob_suffix(), "pdf"))
    {
        errors.insert(
            Field::TeamName,
            "Team name cannot start with a dot or contain control characters".to_string(),
        );
    }

    let figma_url = draft.figma_url.trim();
    if figma_url.is_empty() {
        errors.insert(Field::FigmaUrl, "Figma URL is required".to_string());
    } else if !FIGMA_URL.is_match(figma_url) {
        errors.insert(Field::FigmaUrl, "Please enter a valid Figma URL".to_string());
    }

    match &draft.technical {
        None => {
            errors.insert(
                Field::Technical,
                "Technical documentation is required".to_string(),
            );
        }
        Some(meta) => {
            if let Err(message) = check_file(Field::Technical, meta) {
                errors.insert(Field::Technical, message);
            }
        }
    }

    if draft.presentation.is_blank() {
        let message = match draft.presentation {
            ArtifactInput::File(_) => "Presentation file is required",
            ArtifactInput::Link(_) => "Presentation URL is required",
        };
        errors.insert(Field::Presentation, message.to_string());
    } else if let Err(message) = check_artifact(Field::Presentation, &draft.presentation) {
        errors.insert(Field::Presentation, message);
    }

    if let Some(bmc) = draft.bmc.as_ref().filter(|bmc| !bmc.is_blank()) {
        if let Err(message) = check_artifact(Field::Bmc, bmc) {
            errors.insert(Field::Bmc, message);
        }
    }

    let drive_url = draft.drive_url.trim();
    if !drive_url.is_empty() && !DRIVE_URL.is_match(drive_url) {
        errors.insert(
            Field::DriveUrl,
            "Please enter a valid Google Drive URL".to_string(),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_artifact(field: Field, input: &ArtifactInput) -> Result<(), String> {
    match input {
        ArtifactInput::File(Some(meta)) => check_file(field, meta),
        ArtifactInput::File(None) => Ok(()),
        ArtifactInput::Link(url) => {
            if ARTIFACT_URL.is_match(url.trim()) {
                Ok(())
            } else {
                Err("Please enter a valid Canva or Google Docs URL".to_string())
            }
        }
    }
}

fn check_file(field: Field, meta: &FileMeta) -> Result<(), String> {
    if meta.size == 0 {
        return Err("File is empty".to_string());
    }
    if meta.size > MAX_FILE_BYTES {
        return Err(format!(
            "File size must be less than {}MB",
            MAX_FILE_BYTES / 1024 / 1024
        ));
    }
    let allowed = field.allowed_extensions();
    match file_extension(&meta.name) {
        Some(extension) if allowed.contains(&extension.as_str()) => Ok(()),
        _ => Err(format!("File type must be one of: {}", field.accept())),
    }
}

/// A validated-at-the-edge submission plus the raw bytes of each attached file.
#[cfg(feature = "ssr")]
#[derive(Debug)]
pub struct IntakeRequest {
    pub draft: IntakeDraft,
    pub files: HashMap<Field, Vec<u8>>,
}

/// Runs the whole intake: deadline gate, validation, uploads (technical, presentation, bmc),
/// then the row insert. Uploads that precede a failure are left in the bucket and logged.
#[cfg(feature = "ssr")]
pub fn submit_submission(
    conn: &mut SqliteConnection,
    store: &dyn BlobStore,
    request: IntakeRequest,
    now: DateTime<Utc>,
) -> Result<Submission, IntakeError> {
    if !is_open(now, load_deadline(conn)?) {
        return Err(IntakeError::Closed);
    }
    validate(&request.draft).map_err(IntakeError::Invalid)?;

    let mut uploaded = Vec::new();
    let result = persist(conn, store, request, now, &mut uploaded);
    if result.is_err() && !uploaded.is_empty() {
        warn!(paths = ?uploaded, "Intake failed after uploading files; leaving orphaned blobs");
    }
    result
}

#[cfg(feature = "ssr")]
fn persist(
    conn: &mut SqliteConnection,
    store: &dyn BlobStore,
    request: IntakeRequest,
    now: DateTime<Utc>,
    uploaded: &mut Vec<String>,
) -> Result<Submission, IntakeError> {
    let IntakeRequest { draft, mut files } = request;
    let team = draft.team_name.trim();

    let technical = draft
        .technical
        .as_ref()
        .ok_or_else(|| IntakeError::Malformed("technical documentation missing".to_string()))?;
    let technical_file = upload_file(store, team, Field::Technical, technical, &mut files)?;
    uploaded.push(technical_file.clone());

    let presentation = persist_artifact(
        store,
        team,
        Field::Presentation,
        &draft.presentation,
        &mut files,
        uploaded,
    )?
    .ok_or_else(|| IntakeError::Malformed("presentation missing".to_string()))?;

    let bmc = match &draft.bmc {
        Some(input) => persist_artifact(store, team, Field::Bmc, input, &mut files, uploaded)?,
        None => None,
    };

    let drive_url = Some(draft.drive_url.trim().to_string()).filter(|url| !url.is_empty());
    let row = NewSubmission::new(
        team.to_string(),
        draft.figma_url.trim().to_string(),
        technical_file,
        presentation,
        bmc,
        drive_url,
        now.naive_utc(),
    );
    Ok(insert_submission(conn, &row)?)
}

#[cfg(feature = "ssr")]
fn persist_artifact(
    store: &dyn BlobStore,
    team: &str,
    field: Field,
    input: &ArtifactInput,
    files: &mut HashMap<Field, Vec<u8>>,
    uploaded: &mut Vec<String>,
) -> Result<Option<UploadRef>, IntakeError> {
    match input {
        ArtifactInput::File(Some(meta)) => {
            let path = upload_file(store, team, field, meta, files)?;
            uploaded.push(path.clone());
            Ok(Some(UploadRef::File(path)))
        }
        ArtifactInput::File(None) => Ok(None),
        ArtifactInput::Link(url) if url.trim().is_empty() => Ok(None),
        ArtifactInput::Link(url) => Ok(Some(UploadRef::Link(url.trim().to_string()))),
    }
}

#[cfg(feature = "ssr")]
fn upload_file(
    store: &dyn BlobStore,
    team: &str,
    field: Field,
    meta: &FileMeta,
    files: &mut HashMap<Field, Vec<u8>>,
) -> Result<String, IntakeError> {
    let extension = file_extension(&meta.name)
        .ok_or_else(|| IntakeError::Malformed(format!("{} has no extension", meta.name)))?;
    let bytes = files.remove(&field).ok_or_else(|| {
        IntakeError::Malformed(format!("no content for {}", field.blob_suffix()))
    })?;
    let path = blob_path(team, field.blob_suffix(), &extension);
    store
        .upload(&path, &bytes)
        .map_err(|source| IntakeError::Upload {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

/// `POST /intake`: multipart form in, created submission out.
#[cfg(feature = "ssr")]
pub async fn intake_handler(
    State(backend): State<Backend>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Submission>), IntakeError> {
    let request = read_intake_form(&mut multipart).await?;

    let submission = backend
        .run(move |conn, store| submit_submission(conn, store, request, Utc::now()))
        .await
        .inspect_err(|e| match e {
            IntakeError::Invalid(fields) => info!(?fields, "Submission rejected by validation"),
            IntakeError::Closed => info!("Submission refused after the deadline"),
            _ => warn!("Error submitting project: {e}"),
        })?;

    info!(
        id = submission.id,
        team = %submission.team_name,
        "Project submitted"
    );
    Ok((StatusCode::CREATED, Json(submission)))
}

#[cfg(feature = "ssr")]
async fn read_intake_form(multipart: &mut Multipart) -> Result<IntakeRequest, IntakeError> {
    let malformed = |e: axum::extract::multipart::MultipartError| {
        IntakeError::Malformed(e.body_text())
    };

    let mut text: HashMap<String, String> = HashMap::new();
    let mut metas: HashMap<Field, FileMeta> = HashMap::new();
    let mut files: HashMap<Field, Vec<u8>> = HashMap::new();

    while let Some(part) = multipart.next_field().await.map_err(malformed)? {
        let name = part.name().unwrap_or_default().to_string();
        let file_field = match name.as_str() {
            names::TECHNICAL_FILE => Some(Field::Technical),
            names::PRESENTATION_FILE => Some(Field::Presentation),
            names::BMC_FILE => Some(Field::Bmc),
            _ => None,
        };

        match file_field {
            Some(field) => {
                let file_name = part.file_name().unwrap_or_default().to_string();
                let bytes = part.bytes().await.map_err(malformed)?;
                // Browsers send an unnamed, empty part for a file input left blank.
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                metas.insert(
                    field,
                    FileMeta {
                        name: file_name,
                        size: bytes.len() as u64,
                    },
                );
                files.insert(field, bytes.to_vec());
            }
            None => {
                let value = part.text().await.map_err(malformed)?;
                text.insert(name, value);
            }
        }
    }

    let mut take = |key: &str| text.remove(key).unwrap_or_default();
    let presentation_mode =
        ArtifactMode::parse(&take(names::PRESENTATION_MODE)).unwrap_or_default();
    let bmc_mode = ArtifactMode::parse(&take(names::BMC_MODE));

    let presentation = match presentation_mode {
        ArtifactMode::File => ArtifactInput::File(metas.remove(&Field::Presentation)),
        ArtifactMode::Link => ArtifactInput::Link(take(names::PRESENTATION_URL)),
    };
    let bmc = bmc_mode.map(|mode| match mode {
        ArtifactMode::File => ArtifactInput::File(metas.remove(&Field::Bmc)),
        ArtifactMode::Link => ArtifactInput::Link(take(names::BMC_URL)),
    });

    let draft = IntakeDraft {
        team_name: take(names::TEAM_NAME),
        figma_url: take(names::FIGMA_URL),
        technical: metas.remove(&Field::Technical),
        presentation,
        bmc,
        drive_url: take(names::DRIVE_URL),
    };

    // Bytes for an input whose mode was switched to a link are never uploaded.
    files.retain(|field, _| match field {
        Field::Presentation => matches!(draft.presentation, ArtifactInput::File(Some(_))),
        Field::Bmc => matches!(draft.bmc, Some(ArtifactInput::File(Some(_)))),
        _ => true,
    });

    Ok(IntakeRequest { draft, files })
}



#[cfg(all(test, feature = "ssr"))]
mod handler_tests {
    use super::*;
    use crate::backend::testing::backend_in;
    use crate::deadline::store_deadline;
    use crate::error::BackendError;
    use crate::model::IntakeFailure;
    use axum::{
        body::Body,
        http::{header, Request},
        response::Response,
        routing::post,
        Router,
    };
    use chrono::Duration;
    use tower::ServiceExt;

    const BOUNDARY: &str = "portal-intake-boundary";

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a [u8]),
    }

    fn router(backend: Backend) -> Router {
        Router::new()
            .route("/intake", post(intake_handler))
            .with_state(backend)
    }

    fn intake_request(parts: &[Part]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                ),
                Part::File(name, file_name, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                    body.extend_from_slice(b"\r\n");
                }
            }
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/intake")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    /// Alpha's form with a presentation link, as a browser posts it: the presentation file input
    /// still carries a file picked before switching to link mode, and the bmc file input is blank.
    fn alpha_parts<'a>(figma_url: &'a str) -> Vec<Part<'a>> {
        vec![
            Part::Text(names::TEAM_NAME, "Alpha"),
            Part::Text(names::FIGMA_URL, figma_url),
            Part::File(names::TECHNICAL_FILE, "Technical.pdf", b"%PDF-1.7 technical"),
            Part::Text(names::PRESENTATION_MODE, "url"),
            Part::File(names::PRESENTATION_FILE, "deck.pdf", b"%PDF-1.7 stray deck"),
            Part::Text(names::PRESENTATION_URL, "https://docs.google.com/x"),
            Part::Text(names::BMC_MODE, "file"),
            Part::File(names::BMC_FILE, "", b""),
            Part::Text(names::BMC_URL, ""),
            Part::Text(names::DRIVE_URL, ""),
        ]
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn test_link_mode_ignores_stray_file_and_blank_parts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = backend_in(dir.path());

        let response = router(backend.clone())
            .oneshot(intake_request(&alpha_parts("https://www.figma.com/file/abc")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);

        let submission: Submission = read_json(response).await;
        assert_eq!(submission.team_name, "Alpha");
        assert_eq!(submission.technical_file, "Alpha/Alpha_technical.pdf");
        assert_eq!(
            submission.presentation,
            Some(UploadRef::Link("https://docs.google.com/x".to_string()))
        );
        assert_eq!(submission.bmc, None);
        assert_eq!(submission.drive_url, None);

        assert!(backend.blobs.download("Alpha/Alpha_technical.pdf").is_ok());
        assert!(backend.blobs.download("Alpha/Alpha_presentation.pdf").is_err());
    }

    #[tokio::test]
    async fn test_invalid_form_answers_field_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = backend_in(dir.path());

        let response = router(backend.clone())
            .oneshot(intake_request(&alpha_parts("https://example.com/design")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let failure: IntakeFailure = read_json(response).await;
        assert_eq!(failure.message, "Please correct the highlighted fields");
        assert_eq!(
            failure.fields.get(&Field::FigmaUrl).map(String::as_str),
            Some("Please enter a valid Figma URL")
        );
        assert!(backend.blobs.download("Alpha/Alpha_technical.pdf").is_err());
    }

    #[tokio::test]
    async fn test_form_after_deadline_is_forbidden() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = backend_in(dir.path());
        let now = Utc::now();
        backend
            .run(move |conn, _| {
                Ok::<_, BackendError>(store_deadline(conn, now - Duration::minutes(1), now)?)
            })
            .await
            .expect("store deadline");

        let response = router(backend)
            .oneshot(intake_request(&alpha_parts("https://www.figma.com/file/abc")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let failure: IntakeFailure = read_json(response).await;
        assert_eq!(failure.message, "Submissions are closed");
        assert!(failure.fields.is_empty());
    }

    #[tokio::test]
    async fn test_repeat_team_form_is_a_conflict() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = router(backend_in(dir.path()));

        let first = app
            .clone()
            .oneshot(intake_request(&alpha_parts("https://www.figma.com/file/abc")))
            .await
            .expect("response");
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app
            .oneshot(intake_request(&alpha_parts("https://www.figma.com/file/abc")))
            .await
            .expect("response");
        assert_eq!(second.status(), StatusCode::CONFLICT);
        let failure: IntakeFailure = read_json(second).await;
        assert_eq!(failure.message, "This team has already submitted a project");
    }
}
