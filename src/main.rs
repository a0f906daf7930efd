#[cfg(feature = "ssr")]
#[tokio::main]
async fn main() {
    use std::{process::exit, sync::Arc};

    use axum::{
        extract::DefaultBodyLimit,
        middleware::from_fn_with_state,
        routing::{get, post},
        Router,
    };
    use leptos::prelude::*;
    use leptos_axum::{generate_route_list, LeptosRoutes};
    use submission_portal::{
        app::*,
        auth::setup_handler,
        backend::{build_pool, AppState, Backend},
        config::AppConfig,
        deadline::deadline_events_handler,
        guard::admin_guard,
        init_tracing,
        intake::{intake_handler, MAX_INTAKE_BODY_BYTES},
        review::download_handler,
        run_migrations,
        storage::FsBlobStore,
    };
    use tracing::{error, info};

    init_tracing();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Could not load config: {err}");
            exit(255);
        }
    };

    let pool = match build_pool(&config.database_url) {
        Ok(pool) => pool,
        Err(err) => {
            error!("Could not open database at {}: {err}", config.database_url);
            exit(255);
        }
    };
    if let Err(err) = pool
        .get()
        .map_err(|e| e.to_string())
        .and_then(|mut conn| run_migrations(&mut conn).map_err(|e| e.to_string()))
    {
        error!("Could not apply schema: {err}");
        exit(255);
    }

    if let Err(err) = std::fs::create_dir_all(&config.blob_root) {
        error!(
            "Could not create blob root {}: {err}",
            config.blob_root.display()
        );
        exit(255);
    }
    let blobs = Arc::new(FsBlobStore::new(config.blob_root.clone()));
    if config.enable_setup {
        info!("POST /setup is enabled");
    }
    let backend = Backend::new(pool, blobs, config);

    let conf = match get_configuration(None) {
        Ok(conf) => conf,
        Err(err) => {
            error!("Could not load Leptos configuration: {err}");
            exit(255);
        }
    };
    let addr = conf.leptos_options.site_addr;
    let leptos_options = conf.leptos_options;
    // Generate the list of routes in your Leptos App
    let routes = generate_route_list(App);

    let state = AppState {
        leptos_options: leptos_options.clone(),
        backend: backend.clone(),
    };
    let context_backend = backend.clone();
    let leptos_options_clone = leptos_options.clone();
    let app = Router::new()
        .route(
            "/intake",
            post(intake_handler).layer(DefaultBodyLimit::max(MAX_INTAKE_BODY_BYTES)),
        )
        .route("/files/download", get(download_handler))
        .route("/setup", post(setup_handler))
        .route("/events/deadline", get(deadline_events_handler))
        .leptos_routes_with_context(
            &state,
            routes,
            // Provide the backend for server functions.
            move || provide_context(context_backend.clone()),
            // Use App for main routes.
            move || shell(leptos_options_clone.clone()),
        )
        // Use shell for fallback.
        .fallback(leptos_axum::file_and_error_handler::<AppState, _>(shell))
        .layer(from_fn_with_state(backend, admin_guard))
        .with_state(state);

    info!("listening on http://{}", &addr);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("Could not bind {addr}: {err}");
            exit(255);
        }
    };
    if let Err(err) = axum::serve(listener, app.into_make_service()).await {
        error!("Server error: {err}");
    }
}

#[cfg(not(feature = "ssr"))]
pub fn main() {
    // no client-side main function
    // unless we want this to work with e.g., Trunk for pure client-side testing
    // see lib.rs for hydration function instead
}
