//! The explicitly constructed handle to everything the portal persists: the database pool, the
//! blob bucket, and the deadline change feed. Built once in `main` and handed to handlers as
//! axum state and to server functions as Leptos context.

use std::sync::Arc;

use axum::extract::FromRef;
use chrono::Utc;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::SqliteConnection;
use leptos::config::LeptosOptions;

use crate::auth;
use crate::config::AppConfig;
use crate::deadline::DeadlineEvents;
use crate::error::{AuthError, BackendError};
use crate::model::Role;
use crate::storage::BlobStore;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

#[derive(Debug)]
struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        crate::apply_pragmas(conn).map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Builds the connection pool. Every pooled connection gets the same PRAGMAs as
/// `establish_connection`.
pub fn build_pool(database_url: &str) -> Result<DbPool, diesel::r2d2::PoolError> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    Pool::builder()
        .connection_customizer(Box::new(SqlitePragmas))
        .build(manager)
}

#[derive(Clone)]
pub struct Backend {
    pub pool: DbPool,
    pub blobs: Arc<dyn BlobStore>,
    pub deadline_events: DeadlineEvents,
    pub config: Arc<AppConfig>,
}

impl Backend {
    pub fn new(pool: DbPool, blobs: Arc<dyn BlobStore>, config: AppConfig) -> Self {
        Backend {
            pool,
            blobs,
            deadline_events: DeadlineEvents::new(),
            config: Arc::new(config),
        }
    }

    /// Runs blocking persistence work off the async runtime with a pooled connection and the
    /// bucket.
    pub async fn run<T, E, F>(&self, task: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<BackendError> + Send + 'static,
        F: FnOnce(&mut SqliteConnection, &dyn BlobStore) -> Result<T, E> + Send + 'static,
    {
        let pool = self.pool.clone();
        let blobs = self.blobs.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(BackendError::from)?;
            task(&mut *conn, blobs.as_ref())
        })
        .await
        .map_err(BackendError::from)?
    }

    /// The single capability check behind the guard, the dashboard, and the download endpoint.
    pub async fn authorize(&self, token: Option<String>) -> Result<Role, AuthError> {
        self.run(move |conn, _| auth::authorize(conn, token.as_deref(), Utc::now().naive_utc()))
            .await
    }

    pub async fn sign_out(&self, token: String) -> Result<bool, AuthError> {
        self.run(move |conn, _| Ok(auth::sign_out(conn, &token)?))
            .await
    }
}

/// Router state: Leptos site options next to the backend handle.
#[derive(Clone)]
pub struct AppState {
    pub leptos_options: LeptosOptions,
    pub backend: Backend,
}

impl FromRef<AppState> for LeptosOptions {
    fn from_ref(state: &AppState) -> Self {
        state.leptos_options.clone()
    }
}

impl FromRef<AppState> for Backend {
    fn from_ref(state: &AppState) -> Self {
        state.backend.clone()
    }
}
