//! Wipes submissions, sessions, and settings, then empties the blob bucket. Admin profiles
//! survive.

#[cfg(feature = "ssr")]
use submission_portal::{
    config::AppConfig, establish_connection, init_tracing, reset_database, run_migrations,
    storage::FsBlobStore,
};

#[cfg(feature = "ssr")]
fn main() {
    use std::process::exit;
    use tracing::{error, info};

    init_tracing();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Could not load config: {err}");
            exit(255);
        }
    };

    let mut conn = match establish_connection(&config.database_url) {
        Ok(conn) => conn,
        Err(err) => {
            error!("Could not open database at {}: {err}", config.database_url);
            exit(255);
        }
    };
    if let Err(err) = run_migrations(&mut conn).and_then(|_| reset_database(&mut conn)) {
        error!("Failed to reset database: {err}");
        exit(1);
    }
    info!("Database has been reset.");

    let store = FsBlobStore::new(config.blob_root.clone());
    if let Err(err) = store.purge() {
        error!("Failed to empty the blob bucket: {err}");
        exit(1);
    }
    info!(root = %store.root().display(), "Blob bucket has been emptied.");
}

#[cfg(not(feature = "ssr"))]
fn main() {
    println!("This binary requires the 'ssr' feature to be enabled.");
}
