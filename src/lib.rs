pub mod app;
pub mod browser;
pub mod deadline;
pub mod intake;
pub mod model;
pub mod review;
pub mod storage;

#[cfg(feature = "ssr")]
pub mod auth;
#[cfg(feature = "ssr")]
pub mod backend;
#[cfg(feature = "ssr")]
pub mod config;
#[cfg(feature = "ssr")]
pub mod error;
#[cfg(feature = "ssr")]
pub mod guard;
#[cfg(feature = "ssr")]
pub mod schema;

#[cfg(feature = "ssr")]
use chrono::NaiveDateTime;
#[cfg(feature = "ssr")]
use diesel::connection::SimpleConnection;
#[cfg(feature = "ssr")]
use diesel::prelude::*;
#[cfg(feature = "ssr")]
use diesel::SqliteConnection;

#[cfg(feature = "ssr")]
use crate::model::{NewSetting, NewSubmission, Submission, SubmissionRow};
#[cfg(feature = "ssr")]
use crate::schema::{auth_sessions, settings, submissions};

#[cfg(feature = "hydrate")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub fn hydrate() {
    use crate::app::*;
    console_error_panic_hook::set_once();
    leptos::mount::hydrate_body(App);
}

/// Installs the `tracing` subscriber. `RUST_LOG` overrides the default `info` level.
#[cfg(feature = "ssr")]
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(
                    "submission_portal=info"
                        .parse()
                        .expect("Hard-coded default directive should be correct"),
                )
                .from_env_lossy(),
        )
        .init();
}

/// Schema applied at start-up. Every statement is idempotent.
#[cfg(feature = "ssr")]
const SCHEMA_SQL: &str = include_str!("../migrations/2025-10-01-000000_create_portal/up.sql");

#[cfg(feature = "ssr")]
pub fn establish_connection(database_url: &str) -> Result<SqliteConnection, ConnectionError> {
    let mut conn = SqliteConnection::establish(database_url)?;
    apply_pragmas(&mut conn).map_err(|e| ConnectionError::BadConnection(e.to_string()))?;
    Ok(conn)
}

/// Enable WAL mode to allow concurrent reads during writes, and a timeout to retry locked
/// operations.
#[cfg(feature = "ssr")]
pub fn apply_pragmas(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    conn.batch_execute(
        "PRAGMA foreign_keys = ON; \
        PRAGMA journal_mode = WAL; \
        PRAGMA synchronous = NORMAL; \
        PRAGMA busy_timeout = 10000;",
    )
}

#[cfg(feature = "ssr")]
pub fn run_migrations(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    conn.batch_execute(SCHEMA_SQL)
}

/// Returns the value stored under `key`, if any.
#[cfg(feature = "ssr")]
pub fn get_setting(
    conn: &mut SqliteConnection,
    key: &str,
) -> Result<Option<String>, diesel::result::Error> {
    settings::table
        .filter(settings::key.eq(key))
        .select(settings::value)
        .first(conn)
        .optional()
}

/// Inserts or fully replaces the setting stored under `key`.
#[cfg(feature = "ssr")]
pub fn upsert_setting(
    conn: &mut SqliteConnection,
    key: &str,
    value: &str,
    updated_at: NaiveDateTime,
) -> Result<(), diesel::result::Error> {
    diesel::insert_into(settings::table)
        .values(&NewSetting {
            key,
            value,
            updated_at,
        })
        .on_conflict(settings::key)
        .do_update()
        .set((
            settings::value.eq(value),
            settings::updated_at.eq(updated_at),
        ))
        .execute(conn)?;
    Ok(())
}

#[cfg(feature = "ssr")]
pub fn insert_submission(
    conn: &mut SqliteConnection,
    new_submission: &NewSubmission,
) -> Result<Submission, diesel::result::Error> {
    let row: SubmissionRow = diesel::insert_into(submissions::table)
        .values(new_submission)
        .returning(SubmissionRow::as_returning())
        .get_result(conn)?;
    Ok(row.into())
}

/// Returns all submissions, newest first.
#[cfg(feature = "ssr")]
pub fn list_submissions(
    conn: &mut SqliteConnection,
) -> Result<Vec<Submission>, diesel::result::Error> {
    let rows: Vec<SubmissionRow> = submissions::table
        .order((submissions::created_at.desc(), submissions::id.desc()))
        .select(SubmissionRow::as_select())
        .load(conn)?;
    Ok(rows.into_iter().map(Submission::from).collect())
}

#[cfg(feature = "ssr")]
pub fn find_submission(
    conn: &mut SqliteConnection,
    submission_id: i32,
) -> Result<Option<Submission>, diesel::result::Error> {
    let row: Option<SubmissionRow> = submissions::table
        .filter(submissions::id.eq(submission_id))
        .select(SubmissionRow::as_select())
        .first(conn)
        .optional()?;
    Ok(row.map(Submission::from))
}

/// Deletes a submission row. Returns number of affected rows.
#[cfg(feature = "ssr")]
pub fn delete_submission_row(
    conn: &mut SqliteConnection,
    submission_id: i32,
) -> Result<usize, diesel::result::Error> {
    diesel::delete(submissions::table.filter(submissions::id.eq(submission_id))).execute(conn)
}

/// Clears submissions, sessions, and settings. Profiles are kept so the admin can still sign in.
#[cfg(feature = "ssr")]
pub fn reset_database(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    conn.transaction(|conn| {
        diesel::delete(submissions::table).execute(conn)?;
        diesel::delete(auth_sessions::table).execute(conn)?;
        diesel::delete(settings::table).execute(conn)?;
        Ok(())
    })
}
