use chrono::{DateTime, Utc};
use gloo_timers::future::TimeoutFuture;
use leptos::ev::SubmitEvent;
use leptos::html::{Form, Input};
use leptos::logging::log;
use leptos::prelude::*;
use leptos::server_fn::error::NoCustomError;
use leptos::task::spawn_local;
use leptos_meta::{provide_meta_context, MetaTags, Stylesheet, Title};
use leptos_router::{
    components::{Route, Router, Routes},
    hooks::use_navigate,
    path, NavigateOptions,
};

use crate::browser;
use crate::deadline::{
    display_deadline, is_open, parse_deadline, parse_deadline_input, to_input_value, Countdown,
};
use crate::intake::{
    names, validate, ArtifactInput, ArtifactMode, Field, FieldErrors, IntakeDraft,
};
use crate::model::{Submission, UploadRef};
use crate::review::{artifact_cell, ArtifactCell};

#[cfg(feature = "ssr")]
use crate::{
    auth,
    backend::Backend,
    deadline::{format_deadline, load_deadline, store_deadline},
    error::BackendError,
    list_submissions,
    model::Role,
    review::delete_submission,
};
#[cfg(feature = "ssr")]
use tracing::{info, warn};

#[cfg(feature = "ssr")]
fn server_error(e: impl std::fmt::Display) -> ServerFnError<NoCustomError> {
    ServerFnError::ServerError(e.to_string())
}

#[cfg(feature = "ssr")]
async fn request_session_token() -> Result<Option<String>, ServerFnError<NoCustomError>> {
    use axum::http::HeaderMap;
    use leptos_axum::extract;

    let headers: HeaderMap = extract().await.map_err(server_error)?;
    Ok(auth::session_token(&headers))
}

// Returns the backend if the current request is from an admin, or an error otherwise.
#[cfg(feature = "ssr")]
async fn check_admin() -> Result<Backend, ServerFnError<NoCustomError>> {
    let backend: Backend = expect_context();
    let token = request_session_token().await?;
    backend.authorize(token).await.map_err(|e| {
        warn!("Unauthorized dashboard call: {e}");
        server_error(e)
    })?;
    Ok(backend)
}

#[cfg(feature = "ssr")]
fn deadline_from_input(value: &str) -> Result<DateTime<Utc>, ServerFnError<NoCustomError>> {
    parse_deadline_input(value).map_err(server_error)
}

#[server(GetDeadline)]
pub async fn get_deadline() -> Result<Option<String>, ServerFnError<NoCustomError>> {
    let backend: Backend = expect_context();
    let deadline = backend
        .run(|conn, _| Ok::<_, BackendError>(load_deadline(conn)?))
        .await
        .map_err(|e| {
            warn!("Error loading deadline: {e}");
            server_error(e)
        })?;
    Ok(deadline.map(format_deadline))
}

// Checks if the current request is from an admin. Any failure counts as not an admin.
#[server(IsAdmin)]
pub async fn is_admin() -> Result<bool, ServerFnError<NoCustomError>> {
    let backend: Backend = expect_context();
    let token = request_session_token().await?;
    Ok(matches!(backend.authorize(token).await, Ok(Role::Admin)))
}

#[server(AdminLogin)]
pub async fn admin_login(
    email: String,
    password: String,
) -> Result<(), ServerFnError<NoCustomError>> {
    let backend: Backend = expect_context();
    let ttl = backend.config.session_ttl();

    let token = backend
        .run(move |conn, _| auth::sign_in(conn, &email, &password, Utc::now().naive_utc(), ttl))
        .await
        .map_err(|e| {
            info!("Admin sign-in refused: {e}");
            server_error(e)
        })?;

    use leptos_axum::ResponseOptions;
    let resp: ResponseOptions = expect_context();
    resp.insert_header(
        axum::http::header::SET_COOKIE,
        axum::http::HeaderValue::from_str(&auth::session_cookie(&token, ttl))
            .map_err(server_error)?,
    );

    Ok(())
}

#[server(AdminLogout)]
pub async fn admin_logout() -> Result<(), ServerFnError<NoCustomError>> {
    let backend: Backend = expect_context();
    if let Some(token) = request_session_token().await? {
        if let Err(e) = backend.sign_out(token).await {
            warn!("Error ending session: {e}");
        }
    }

    use leptos_axum::ResponseOptions;
    let resp: ResponseOptions = expect_context();
    resp.insert_header(
        axum::http::header::SET_COOKIE,
        axum::http::HeaderValue::from_str(&auth::clear_session_cookie()).map_err(server_error)?,
    );
    Ok(())
}

#[server(ListSubmissions)]
pub async fn list_submissions_handler() -> Result<Vec<Submission>, ServerFnError<NoCustomError>> {
    let backend = check_admin().await?;
    backend
        .run(|conn, _| Ok::<_, BackendError>(list_submissions(conn)?))
        .await
        .map_err(|e| {
            warn!("Error loading submissions: {e}");
            server_error(e)
        })
}

#[server(DeleteSubmission)]
pub async fn delete_submission_handler(
    id: i32,
) -> Result<Vec<Submission>, ServerFnError<NoCustomError>> {
    let backend = check_admin().await?;
    backend
        .run(move |conn, store| delete_submission(conn, store, id))
        .await
        .map_err(|e| {
            warn!(id, "Error deleting submission: {e}");
            server_error(e)
        })
}

#[server(SetDeadline)]
pub async fn set_deadline(value: String) -> Result<String, ServerFnError<NoCustomError>> {
    let backend = check_admin().await?;
    let deadline = deadline_from_input(&value)?;

    let stored = backend
        .run(move |conn, _| {
            Ok::<_, BackendError>(store_deadline(conn, deadline, Utc::now())?)
        })
        .await
        .map_err(|e| {
            warn!("Error updating deadline: {e}");
            server_error(e)
        })?;

    info!(deadline = %stored, "Submission deadline updated");
    backend.deadline_events.publish(stored.clone());
    Ok(stored)
}

/// The message of a server function error, without the transport prefix.
fn error_message(e: &ServerFnError<NoCustomError>) -> String {
    match e {
        ServerFnError::ServerError(message) => message.clone(),
        other => other.to_string(),
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Notice {
    Success(String),
    Error(String),
}

pub fn shell(options: LeptosOptions) -> impl IntoView {
    view! {
        <!DOCTYPE html>
        <html lang="en">
            <head>
                <meta charset="utf-8" />
                <meta name="viewport" content="width=device-width, initial-scale=1" />
                <AutoReload options=options.clone() />
                <HydrationScripts options />
                <MetaTags />
            </head>
            <body>
                <App />
            </body>
        </html>
    }
}

#[component]
pub fn App() -> impl IntoView {
    // Provides context that manages stylesheets, titles, meta tags, etc.
    provide_meta_context();

    view! {
        // id=leptos means cargo-leptos will hot-reload this stylesheet
        <Stylesheet id="leptos" href="/pkg/submission-portal.css" />

        <Title text="Project Submission Portal" />

        <Router>
            <main>
                <Routes fallback=|| "Page not found.".into_view()>
                    <Route path=path!("/") view=Home />
                    <Route path=path!("/admin/login") view=AdminLogin />
                    <Route path=path!("/admin") view=AdminDashboard />
                </Routes>
            </main>
        </Router>
    }
}

#[component]
fn NoticeBanner(notice: RwSignal<Option<Notice>>) -> impl IntoView {
    move || {
        notice
            .get()
            .map(|current| {
                let (class, message) = match current {
                    Notice::Success(message) => ("notice notice-success", message),
                    Notice::Error(message) => ("notice notice-error", message),
                };
                view! {
                    <div class=class role="status">
                        <span>{message}</span>
                        <button class="notice-dismiss" on:click=move |_| notice.set(None)>
                            "×"
                        </button>
                    </div>
                }
            })
    }
}

#[component]
fn Home() -> impl IntoView {
    let deadline_fetcher = Resource::new(|| (), |_| get_deadline());

    // The latest value pushed by the change feed replaces the one fetched on load.
    let pushed = RwSignal::new(None::<String>);
    let now = RwSignal::new(Utc::now());

    let deadline = Signal::derive(move || {
        let fetched = deadline_fetcher.get().and_then(|result| result.ok()).flatten();
        pushed.get().or(fetched).as_deref().and_then(parse_deadline)
    });
    let open = Memo::new(move |_| is_open(now.get(), deadline.get()));

    // Effects only run in the browser. Both the ticker and the subscription end with this
    // component: the ticker once its signal is disposed, the subscription when its stored value
    // is dropped.
    Effect::new(move || {
        spawn_local(async move {
            loop {
                TimeoutFuture::new(1_000).await;
                if now.try_set(Utc::now()).is_some() {
                    break;
                }
            }
        });
        let subscription = browser::subscribe_deadline(move |value| {
            log!("Deadline changed to {}", value);
            pushed.set(Some(value));
        });
        StoredValue::new_local(subscription);
    });

    view! {
        <div class="portal">
            <header class="portal-header">
                <h1>"Project Submission Portal"</h1>
                <p class="tagline">"Submit your team's project before the deadline."</p>
            </header>
            <Suspense fallback=|| {
                view! { <p class="loading">"Loading..."</p> }
            }>
                {move || {
                    deadline_fetcher
                        .get()
                        .map(|result| {
                            if let Err(e) = result {
                                log!("Error loading deadline: {}", e);
                            }
                            view! {
                                <CountdownTimer deadline=deadline now=now />
                                <IntakeSection open=open />
                            }
                        })
                }}
            </Suspense>
        </div>
    }
}

#[component]
fn CountdownTimer(
    #[prop(into)] deadline: Signal<Option<DateTime<Utc>>>,
    #[prop(into)] now: Signal<DateTime<Utc>>,
) -> impl IntoView {
    view! {
        <section class="countdown">
            {move || match deadline.get() {
                None => view! { <p class="countdown-empty">"No deadline set"</p> }.into_any(),
                Some(deadline) => {
                    let countdown = Countdown::until(now.get(), deadline);
                    let (heading, class) = if countdown.is_expired() {
                        ("Submissions closed", "countdown-clock expired")
                    } else {
                        ("Time remaining", "countdown-clock")
                    };
                    view! {
                        <h2>{heading}</h2>
                        <p class=class>{countdown.to_string()}</p>
                        <p class="countdown-deadline">
                            "Deadline: " {display_deadline(deadline)}
                        </p>
                    }
                        .into_any()
                }
            }}
        </section>
    }
}

/// The form while submissions are open, a closed notice (with no way to submit) afterwards.
#[component]
fn IntakeSection(#[prop(into)] open: Signal<bool>) -> impl IntoView {
    move || {
        if open.get() {
            view! { <SubmissionForm /> }.into_any()
        } else {
            view! {
                <section class="closed">
                    <h2>"Submissions are closed"</h2>
                    <p>"The submission deadline has passed. Thank you for your interest."</p>
                </section>
            }
                .into_any()
        }
    }
}

fn field_error(errors: RwSignal<FieldErrors>, field: Field) -> impl IntoView {
    move || {
        errors
            .with(|errors| errors.get(&field).cloned())
            .map(|message| view! { <p class="field-error">{message}</p> })
    }
}

#[component]
fn SubmissionForm() -> impl IntoView {
    let form_ref = NodeRef::<Form>::new();
    let technical_ref = NodeRef::<Input>::new();
    let presentation_ref = NodeRef::<Input>::new();
    let bmc_ref = NodeRef::<Input>::new();

    let team_name = RwSignal::new(String::new());
    let figma_url = RwSignal::new(String::new());
    let presentation_mode = RwSignal::new(ArtifactMode::File);
    let presentation_url = RwSignal::new(String::new());
    let bmc_mode = RwSignal::new(None::<ArtifactMode>);
    let bmc_url = RwSignal::new(String::new());
    let drive_url = RwSignal::new(String::new());

    let errors = RwSignal::new(FieldErrors::new());
    let notice = RwSignal::new(None::<Notice>);
    let submitting = RwSignal::new(false);

    let clear = move || {
        team_name.set(String::new());
        figma_url.set(String::new());
        presentation_mode.set(ArtifactMode::File);
        presentation_url.set(String::new());
        bmc_mode.set(None);
        bmc_url.set(String::new());
        drive_url.set(String::new());
        browser::reset_form(form_ref);
    };

    let submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        if submitting.get_untracked() {
            return;
        }

        let artifact = |mode: ArtifactMode, input: &NodeRef<Input>, url: RwSignal<String>| {
            match mode {
                ArtifactMode::File => ArtifactInput::File(browser::file_meta(input)),
                ArtifactMode::Link => ArtifactInput::Link(url.get_untracked()),
            }
        };
        let draft = IntakeDraft {
            team_name: team_name.get_untracked(),
            figma_url: figma_url.get_untracked(),
            technical: browser::file_meta(&technical_ref),
            presentation: artifact(
                presentation_mode.get_untracked(),
                &presentation_ref,
                presentation_url,
            ),
            bmc: bmc_mode
                .get_untracked()
                .map(|mode| artifact(mode, &bmc_ref, bmc_url)),
            drive_url: drive_url.get_untracked(),
        };

        // Nothing reaches the network until the draft is valid.
        if let Err(field_errors) = validate(&draft) {
            errors.set(field_errors);
            notice.set(Some(Notice::Error(
                "Please correct the highlighted fields".to_string(),
            )));
            return;
        }
        errors.set(FieldErrors::new());

        if !browser::confirm("Submit your project? This cannot be undone.") {
            return;
        }

        submitting.set(true);
        spawn_local(async move {
            match browser::post_intake(form_ref).await {
                Ok(submission) => {
                    log!("Submitted project {} for {}", submission.id, submission.team_name);
                    notice.set(Some(Notice::Success(
                        "Project submitted successfully!".to_string(),
                    )));
                    clear();
                }
                Err(failure) => {
                    log!("Error submitting project: {}", failure.message);
                    errors.set(failure.fields);
                    notice.set(Some(Notice::Error(failure.message)));
                }
            }
            submitting.set(false);
        });
    };

    view! {
        <section class="intake">
            <NoticeBanner notice=notice />
            <form class="intake-form" node_ref=form_ref on:submit=submit>
                <div class="form-group">
                    <label for="team_name">"Team Name *"</label>
                    <input
                        id="team_name"
                        class="form-input"
                        type="text"
                        name=names::TEAM_NAME
                        placeholder="Enter your team name"
                        prop:value=move || team_name.get()
                        on:input=move |ev| team_name.set(event_target_value(&ev))
                    />
                    {field_error(errors, Field::TeamName)}
                </div>

                <div class="form-group">
                    <label for="figma_url">"Figma Demo URL *"</label>
                    <input
                        id="figma_url"
                        class="form-input"
                        type="url"
                        name=names::FIGMA_URL
                        placeholder="https://www.figma.com/..."
                        prop:value=move || figma_url.get()
                        on:input=move |ev| figma_url.set(event_target_value(&ev))
                    />
                    {field_error(errors, Field::FigmaUrl)}
                </div>

                <div class="form-group">
                    <label for="technical_file">"Technical Documentation (PDF) *"</label>
                    <input
                        id="technical_file"
                        class="form-file"
                        type="file"
                        name=names::TECHNICAL_FILE
                        accept=Field::Technical.accept()
                        node_ref=technical_ref
                    />
                    {field_error(errors, Field::Technical)}
                </div>

                <fieldset class="form-group">
                    <legend>"Presentation *"</legend>
                    <div class="mode-toggle">
                        <label>
                            <input
                                type="radio"
                                name=names::PRESENTATION_MODE
                                value=ArtifactMode::File.as_str()
                                prop:checked=move || presentation_mode.get() == ArtifactMode::File
                                on:change=move |_| presentation_mode.set(ArtifactMode::File)
                            />
                            "Upload file"
                        </label>
                        <label>
                            <input
                                type="radio"
                                name=names::PRESENTATION_MODE
                                value=ArtifactMode::Link.as_str()
                                prop:checked=move || presentation_mode.get() == ArtifactMode::Link
                                on:change=move |_| presentation_mode.set(ArtifactMode::Link)
                            />
                            "Link (Canva / Google Slides)"
                        </label>
                    </div>
                    <input
                        class="form-file"
                        class:hidden=move || presentation_mode.get() != ArtifactMode::File
                        type="file"
                        name=names::PRESENTATION_FILE
                        accept=Field::Presentation.accept()
                        node_ref=presentation_ref
                    />
                    <input
                        class="form-input"
                        class:hidden=move || presentation_mode.get() != ArtifactMode::Link
                        type="url"
                        name=names::PRESENTATION_URL
                        placeholder="https://www.canva.com/..."
                        prop:value=move || presentation_url.get()
                        on:input=move |ev| presentation_url.set(event_target_value(&ev))
                    />
                    {field_error(errors, Field::Presentation)}
                </fieldset>

                <fieldset class="form-group">
                    <legend>"Business Model Canvas (optional)"</legend>
                    <div class="mode-toggle">
                        <label>
                            <input
                                type="radio"
                                name=names::BMC_MODE
                                value="none"
                                prop:checked=move || bmc_mode.get().is_none()
                                on:change=move |_| bmc_mode.set(None)
                            />
                            "None"
                        </label>
                        <label>
                            <input
                                type="radio"
                                name=names::BMC_MODE
                                value=ArtifactMode::File.as_str()
                                prop:checked=move || bmc_mode.get() == Some(ArtifactMode::File)
                                on:change=move |_| bmc_mode.set(Some(ArtifactMode::File))
                            />
                            "Upload file"
                        </label>
                        <label>
                            <input
                                type="radio"
                                name=names::BMC_MODE
                                value=ArtifactMode::Link.as_str()
                                prop:checked=move || bmc_mode.get() == Some(ArtifactMode::Link)
                                on:change=move |_| bmc_mode.set(Some(ArtifactMode::Link))
                            />
                            "Link"
                        </label>
                    </div>
                    <input
                        class="form-file"
                        class:hidden=move || bmc_mode.get() != Some(ArtifactMode::File)
                        type="file"
                        name=names::BMC_FILE
                        accept=Field::Bmc.accept()
                        node_ref=bmc_ref
                    />
                    <input
                        class="form-input"
                        class:hidden=move || bmc_mode.get() != Some(ArtifactMode::Link)
                        type="url"
                        name=names::BMC_URL
                        placeholder="https://docs.google.com/..."
                        prop:value=move || bmc_url.get()
                        on:input=move |ev| bmc_url.set(event_target_value(&ev))
                    />
                    {field_error(errors, Field::Bmc)}
                </fieldset>

                <div class="form-group">
                    <label for="drive_url">"Google Drive Folder (optional)"</label>
                    <input
                        id="drive_url"
                        class="form-input"
                        type="url"
                        name=names::DRIVE_URL
                        placeholder="https://drive.google.com/..."
                        prop:value=move || drive_url.get()
                        on:input=move |ev| drive_url.set(event_target_value(&ev))
                    />
                    {field_error(errors, Field::DriveUrl)}
                </div>

                <button class="btn-primary" type="submit" disabled=move || submitting.get()>
                    {move || if submitting.get() { "Submitting..." } else { "Submit Project" }}
                </button>
            </form>
        </section>
    }
}

#[component]
fn AdminLogin() -> impl IntoView {
    let email = RwSignal::new(String::new());
    let password = RwSignal::new(String::new());
    let error = RwSignal::new(String::new());

    let submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        let (e, p) = (email.get(), password.get());
        if e.trim().is_empty() || p.is_empty() {
            error.set("Please enter email and password.".to_string());
            return;
        }
        spawn_local(async move {
            match admin_login(e, p).await {
                Ok(_) => {
                    error.set(String::new());
                    let navigate = use_navigate();
                    navigate("/admin", NavigateOptions::default());
                }
                Err(e) => error.set(error_message(&e)),
            }
        });
    };

    view! {
        <div class="login-container">
            <h1>"Admin Login"</h1>
            <form class="admin-form" on:submit=submit>
                <div class="form-group">
                    <label>
                        "Email: "
                        <input
                            class="form-input"
                            type="email"
                            on:input=move |ev| email.set(event_target_value(&ev))
                        />
                    </label>
                </div>
                <div class="form-group">
                    <label>
                        "Password: "
                        <input
                            class="form-input"
                            type="password"
                            on:input=move |ev| password.set(event_target_value(&ev))
                        />
                    </label>
                </div>
                <button class="btn-primary" type="submit">
                    "Login"
                </button>
            </form>
            {move || {
                if !error.get().is_empty() {
                    view! { <p class="field-error">{error.get()}</p> }.into_any()
                } else {
                    view! {}.into_any()
                }
            }}
        </div>
    }
}

fn artifact_view(cell: ArtifactCell, notice: RwSignal<Option<Notice>>) -> AnyView {
    match cell {
        ArtifactCell::Download { path, label } => {
            let download = move |_| {
                let path = path.clone();
                spawn_local(async move {
                    if let Err(e) = browser::download_blob(path).await {
                        log!("Error downloading file: {}", e);
                        notice.set(Some(Notice::Error(format!("Error downloading file: {e}"))));
                    }
                });
            };
            view! {
                <button class="btn-link" on:click=download>
                    {label}
                </button>
            }
            .into_any()
        }
        ArtifactCell::Link { href, label } => view! {
            <a href=href target="_blank" rel="noopener noreferrer">
                {label}
            </a>
        }
        .into_any(),
        ArtifactCell::Empty => view! { <span class="muted">"-"</span> }.into_any(),
    }
}

#[component]
fn AdminDashboard() -> impl IntoView {
    let is_admin_fetcher = Resource::new(|| (), |_| is_admin());
    let submissions_fetcher = Resource::new(|| (), |_| list_submissions_handler());
    let deadline_fetcher = Resource::new(|| (), |_| get_deadline());

    // Redirects away once the server says this is not an admin session. Duplicates the request
    // guard for client-side navigation.
    let navigate = use_navigate();
    Effect::new(move || {
        is_admin_fetcher.with(|maybe_result| {
            if let Some(Ok(false) | Err(_)) = maybe_result {
                navigate("/admin/login", NavigateOptions::default());
            }
        });
    });

    // Local copies replaced by mutation results, so the page does not refetch.
    let refreshed = RwSignal::new(None::<Vec<Submission>>);
    let saved_deadline = RwSignal::new(None::<DateTime<Utc>>);
    let notice = RwSignal::new(None::<Notice>);

    let current_deadline = Signal::derive(move || {
        saved_deadline.get().or_else(|| {
            deadline_fetcher
                .get()
                .and_then(|result| result.ok())
                .flatten()
                .as_deref()
                .and_then(parse_deadline)
        })
    });
    let on_deadline_saved = Callback::new(move |deadline: DateTime<Utc>| {
        saved_deadline.set(Some(deadline));
    });

    let delete = move |submission_id: i32, team_name: String| {
        if !browser::confirm(&format!(
            "Delete the submission from {team_name}? This cannot be undone."
        )) {
            return;
        }
        spawn_local(async move {
            match delete_submission_handler(submission_id).await {
                Ok(submissions) => {
                    refreshed.set(Some(submissions));
                    notice.set(Some(Notice::Success(format!(
                        "Deleted the submission from {team_name}"
                    ))));
                }
                Err(e) => {
                    log!("Error deleting submission: {}", e);
                    notice.set(Some(Notice::Error(error_message(&e))));
                }
            }
        });
    };

    let logout = move |_| {
        spawn_local(async move {
            let _ = admin_logout().await;
            let navigate = use_navigate();
            navigate("/admin/login", NavigateOptions::default());
        });
    };

    view! {
        <Suspense fallback=|| {
            "Loading..."
        }>
            {move || {
                if let Some(Ok(true)) = is_admin_fetcher.get() {
                    view! {
                        <div class="admin-container">
                            <header class="admin-header">
                                <h1>"Admin Dashboard"</h1>
                                <button class="btn-logout" on:click=logout>
                                    "Logout"
                                </button>
                            </header>

                            <NoticeBanner notice=notice />

                            <DeadlineManager
                                current=current_deadline
                                on_saved=on_deadline_saved
                            />

                            <section class="admin-section">
                                <h2>"Submissions"</h2>
                                <Suspense fallback=|| {
                                    view! { <p>"Loading submissions..."</p> }
                                }>
                                    {move || {
                                        let submissions = refreshed
                                            .get()
                                            .map(Ok)
                                            .or_else(|| submissions_fetcher.get());
                                        match submissions {
                                            None => view! {}.into_any(),
                                            Some(Err(e)) => {
                                                view! {
                                                    <p class="field-error">
                                                        "Error loading submissions: " {error_message(&e)}
                                                    </p>
                                                }
                                                    .into_any()
                                            }
                                            Some(Ok(submissions)) if submissions.is_empty() => {
                                                view! { <p class="muted">"No submissions yet."</p> }
                                                    .into_any()
                                            }
                                            Some(Ok(submissions)) => {
                                                view! {
                                                    <table class="submissions-table">
                                                        <thead>
                                                            <tr>
                                                                <th>"Team"</th>
                                                                <th>"Figma"</th>
                                                                <th>"Technical"</th>
                                                                <th>"Presentation"</th>
                                                                <th>"BMC"</th>
                                                                <th>"Drive"</th>
                                                                <th>"Submitted"</th>
                                                                <th></th>
                                                            </tr>
                                                        </thead>
                                                        <tbody>
                                                            {submissions
                                                                .into_iter()
                                                                .map(|submission| {
                                                                    let technical = UploadRef::File(
                                                                        submission.technical_file.clone(),
                                                                    );
                                                                    let id = submission.id;
                                                                    let team_name = submission.team_name.clone();
                                                                    view! {
                                                                        <tr>
                                                                            <td>{submission.team_name.clone()}</td>
                                                                            <td>
                                                                                <a
                                                                                    href=submission.figma_url.clone()
                                                                                    target="_blank"
                                                                                    rel="noopener noreferrer"
                                                                                >
                                                                                    "View Demo"
                                                                                </a>
                                                                            </td>
                                                                            <td>
                                                                                {artifact_view(
                                                                                    artifact_cell("Technical Doc", Some(&technical)),
                                                                                    notice,
                                                                                )}
                                                                            </td>
                                                                            <td>
                                                                                {artifact_view(
                                                                                    artifact_cell(
                                                                                        "Presentation",
                                                                                        submission.presentation.as_ref(),
                                                                                    ),
                                                                                    notice,
                                                                                )}
                                                                            </td>
                                                                            <td>
                                                                                {artifact_view(
                                                                                    artifact_cell("BMC", submission.bmc.as_ref()),
                                                                                    notice,
                                                                                )}
                                                                            </td>
                                                                            <td>
                                                                                {artifact_view(
                                                                                    artifact_cell(
                                                                                        "Drive",
                                                                                        submission
                                                                                            .drive_url
                                                                                            .clone()
                                                                                            .map(UploadRef::Link)
                                                                                            .as_ref(),
                                                                                    ),
                                                                                    notice,
                                                                                )}
                                                                            </td>
                                                                            <td>
                                                                                {submission
                                                                                    .created_at
                                                                                    .format("%Y-%m-%d %H:%M")
                                                                                    .to_string()}
                                                                            </td>
                                                                            <td>
                                                                                <button
                                                                                    class="btn-danger"
                                                                                    on:click=move |_| delete(id, team_name.clone())
                                                                                >
                                                                                    "Delete"
                                                                                </button>
                                                                            </td>
                                                                        </tr>
                                                                    }
                                                                })
                                                                .collect_view()}
                                                        </tbody>
                                                    </table>
                                                }
                                                    .into_any()
                                            }
                                        }
                                    }}
                                </Suspense>
                            </section>
                        </div>
                    }
                        .into_any()
                } else {
                    view! { <p>"Checking access..."</p> }.into_any()
                }
            }}
        </Suspense>
    }
}

#[component]
fn DeadlineManager(
    #[prop(into)] current: Signal<Option<DateTime<Utc>>>,
    on_saved: Callback<DateTime<Utc>>,
) -> impl IntoView {
    let input = RwSignal::new(String::new());
    let message = RwSignal::new(None::<Notice>);
    let saving = RwSignal::new(false);

    // Seed the editor with the stored deadline once it is known.
    Effect::new(move || {
        if let Some(deadline) = current.get() {
            if input.get_untracked().is_empty() {
                input.set(to_input_value(deadline));
            }
        }
    });

    let save = move |ev: SubmitEvent| {
        ev.prevent_default();
        let value = input.get_untracked();
        if let Err(e) = parse_deadline_input(&value) {
            message.set(Some(Notice::Error(e)));
            return;
        }
        saving.set(true);
        spawn_local(async move {
            match set_deadline(value).await {
                Ok(stored) => {
                    if let Some(deadline) = parse_deadline(&stored) {
                        on_saved.run(deadline);
                    }
                    message.set(Some(Notice::Success("Deadline updated".to_string())));
                }
                Err(e) => {
                    log!("Error updating deadline: {}", e);
                    message.set(Some(Notice::Error(error_message(&e))));
                }
            }
            saving.set(false);
        });
    };

    view! {
        <section class="admin-section deadline-manager">
            <h2>"Submission Deadline"</h2>
            <p>
                "Current: "
                {move || {
                    current
                        .get()
                        .map(display_deadline)
                        .unwrap_or_else(|| "No deadline set".to_string())
                }}
            </p>
            <form class="admin-form" on:submit=save>
                <label>
                    "New deadline (UTC): "
                    <input
                        class="form-input"
                        type="datetime-local"
                        prop:value=move || input.get()
                        on:input=move |ev| input.set(event_target_value(&ev))
                    />
                </label>
                <button class="btn-primary" type="submit" disabled=move || saving.get()>
                    "Update Deadline"
                </button>
            </form>
            <NoticeBanner notice=message />
        </section>
    }
}
