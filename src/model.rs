use chrono::NaiveDateTime;
#[cfg(feature = "ssr")]
use diesel::prelude::*;
#[cfg(feature = "ssr")]
use diesel::sqlite::Sqlite;
use serde::{Deserialize, Serialize};

/// The role recorded on a profile. Only `admin` grants anything; every other stored value is
/// `Other`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Other,
}

impl Role {
    pub fn from_db(value: &str) -> Self {
        match value {
            "admin" => Role::Admin,
            _ => Role::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Other => "other",
        }
    }
}

/// Where a submitted artifact lives: an uploaded blob (by bucket path) or an external link.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadRef {
    File(String),
    Link(String),
}

impl UploadRef {
    /// Folds the pair of nullable columns back into one reference. A populated file path wins
    /// over a link; empty strings count as absent.
    pub fn from_columns(file: Option<String>, url: Option<String>) -> Option<Self> {
        let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        match (present(file), present(url)) {
            (Some(path), _) => Some(UploadRef::File(path)),
            (None, Some(url)) => Some(UploadRef::Link(url)),
            (None, None) => None,
        }
    }

    /// Splits an optional reference into `(file, url)` column values.
    pub fn into_columns(reference: Option<UploadRef>) -> (Option<String>, Option<String>) {
        match reference {
            Some(UploadRef::File(path)) => (Some(path), None),
            Some(UploadRef::Link(url)) => (None, Some(url)),
            None => (None, None),
        }
    }

    pub fn blob_path(&self) -> Option<&str> {
        match self {
            UploadRef::File(path) => Some(path),
            UploadRef::Link(_) => None,
        }
    }
}

/// A submission as the dashboard sees it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: i32,
    pub team_name: String,
    pub figma_url: String,
    pub bmc: Option<UploadRef>,
    pub technical_file: String,
    pub presentation: Option<UploadRef>,
    pub drive_url: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Submission {
    /// Blob paths referenced by this submission, in removal order: bmc, technical, presentation.
    pub fn blob_paths(&self) -> Vec<&str> {
        let mut paths = Vec::with_capacity(3);
        if let Some(path) = self.bmc.as_ref().and_then(UploadRef::blob_path) {
            paths.push(path);
        }
        paths.push(self.technical_file.as_str());
        if let Some(path) = self.presentation.as_ref().and_then(UploadRef::blob_path) {
            paths.push(path);
        }
        paths
    }
}

#[cfg(feature = "ssr")]
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::submissions)]
#[diesel(check_for_backend(Sqlite))]
pub struct SubmissionRow {
    pub id: i32,
    pub team_name: String,
    pub figma_url: String,
    pub bmc_file: Option<String>,
    pub bmc_url: Option<String>,
    pub technical_file: String,
    pub presentation_file: Option<String>,
    pub presentation_url: Option<String>,
    pub drive_url: Option<String>,
    pub created_at: NaiveDateTime,
}

#[cfg(feature = "ssr")]
impl From<SubmissionRow> for Submission {
    fn from(row: SubmissionRow) -> Self {
        Submission {
            id: row.id,
            team_name: row.team_name,
            figma_url: row.figma_url,
            bmc: UploadRef::from_columns(row.bmc_file, row.bmc_url),
            technical_file: row.technical_file,
            presentation: UploadRef::from_columns(row.presentation_file, row.presentation_url),
            drive_url: row.drive_url.filter(|url| !url.trim().is_empty()),
            created_at: row.created_at,
        }
    }
}

#[cfg(feature = "ssr")]
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::submissions)]
pub struct NewSubmission {
    pub team_name: String,
    pub figma_url: String,
    pub bmc_file: Option<String>,
    pub bmc_url: Option<String>,
    pub technical_file: String,
    pub presentation_file: Option<String>,
    pub presentation_url: Option<String>,
    pub drive_url: Option<String>,
    pub created_at: NaiveDateTime,
}

#[cfg(feature = "ssr")]
impl NewSubmission {
    pub fn new(
        team_name: String,
        figma_url: String,
        technical_file: String,
        presentation: UploadRef,
        bmc: Option<UploadRef>,
        drive_url: Option<String>,
        created_at: NaiveDateTime,
    ) -> Self {
        let (presentation_file, presentation_url) = UploadRef::into_columns(Some(presentation));
        let (bmc_file, bmc_url) = UploadRef::into_columns(bmc);
        NewSubmission {
            team_name,
            figma_url,
            bmc_file,
            bmc_url,
            technical_file,
            presentation_file,
            presentation_url,
            drive_url,
            created_at,
        }
    }
}

#[cfg(feature = "ssr")]
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::profiles)]
#[diesel(check_for_backend(Sqlite))]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: NaiveDateTime,
}

#[cfg(feature = "ssr")]
impl Profile {
    pub fn role(&self) -> Role {
        Role::from_db(&self.role)
    }
}

#[cfg(feature = "ssr")]
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::profiles)]
pub struct NewProfile<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: &'a str,
    // created_at uses default
}

#[cfg(feature = "ssr")]
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::auth_sessions)]
pub struct NewAuthSession<'a> {
    pub user_id: &'a str,
    pub token: &'a str,
    pub expires_at: NaiveDateTime,
    // created_at uses default
}

#[cfg(feature = "ssr")]
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::settings)]
pub struct NewSetting<'a> {
    pub key: &'a str,
    pub value: &'a str,
    pub updated_at: NaiveDateTime,
}

/// The body the intake endpoint answers with when a submission is refused.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IntakeFailure {
    pub message: String,
    #[serde(default)]
    pub fields: crate::intake::FieldErrors,
}
