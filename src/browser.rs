//! Browser-side calls the components make: posting the intake form, saving a downloaded blob,
//! and listening for deadline changes. Without the `hydrate` feature these are inert so the same
//! component code renders on the server.

use leptos::html::{Form, Input};
use leptos::prelude::*;

use crate::intake::FileMeta;
use crate::model::{IntakeFailure, Submission};

#[cfg(feature = "hydrate")]
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
#[cfg(feature = "hydrate")]
use wasm_bindgen_futures::JsFuture;

#[cfg(feature = "hydrate")]
use crate::storage::{content_type_for, file_name_of};

pub const INTAKE_ENDPOINT: &str = "/intake";
pub const DOWNLOAD_ENDPOINT: &str = "/files/download";
pub const DEADLINE_EVENTS_ENDPOINT: &str = "/events/deadline";

/// How long a downloaded blob's object URL stays alive after the save starts.
pub const REVOKE_DELAY_MS: u32 = 10_000;

#[cfg(feature = "hydrate")]
fn describe(value: JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

#[cfg(feature = "hydrate")]
fn failure(message: impl Into<String>) -> IntakeFailure {
    IntakeFailure {
        message: message.into(),
        fields: Default::default(),
    }
}

#[cfg(feature = "hydrate")]
async fn fetch(request: &web_sys::Request) -> Result<web_sys::Response, String> {
    let window = web_sys::window().ok_or("No window")?;
    JsFuture::from(window.fetch_with_request(request))
        .await
        .map_err(describe)?
        .dyn_into::<web_sys::Response>()
        .map_err(describe)
}

/// Name and size of the file currently picked in a file input.
pub fn file_meta(input: &NodeRef<Input>) -> Option<FileMeta> {
    #[cfg(feature = "hydrate")]
    {
        let file = input.get_untracked()?.files()?.get(0)?;
        Some(FileMeta {
            name: file.name(),
            size: file.size() as u64,
        })
    }
    #[cfg(not(feature = "hydrate"))]
    {
        let _ = input;
        None
    }
}

/// Posts the form as multipart data to the intake endpoint.
pub async fn post_intake(form: NodeRef<Form>) -> Result<Submission, IntakeFailure> {
    #[cfg(feature = "hydrate")]
    {
        let form = form
            .get_untracked()
            .ok_or_else(|| failure("The form is not ready yet"))?;
        let data =
            web_sys::FormData::new_with_form(&form).map_err(|e| failure(describe(e)))?;
        let init = web_sys::RequestInit::new();
        init.set_method("POST");
        init.set_body(&data);
        let request = web_sys::Request::new_with_str_and_init(INTAKE_ENDPOINT, &init)
            .map_err(|e| failure(describe(e)))?;

        let response = fetch(&request).await.map_err(failure)?;
        let text = response.text().map_err(|e| failure(describe(e)))?;
        let body = JsFuture::from(text)
            .await
            .map_err(|e| failure(describe(e)))?
            .as_string()
            .unwrap_or_default();

        if response.ok() {
            serde_json::from_str::<Submission>(&body).map_err(|e| failure(e.to_string()))
        } else {
            Err(serde_json::from_str::<IntakeFailure>(&body).unwrap_or_else(|_| {
                failure(format!("Submission failed ({})", response.status()))
            }))
        }
    }
    #[cfg(not(feature = "hydrate"))]
    {
        let _ = form;
        Err(IntakeFailure {
            message: "Submitting requires a browser".to_string(),
            fields: Default::default(),
        })
    }
}

/// Clears every input, file inputs included.
pub fn reset_form(form: NodeRef<Form>) {
    #[cfg(feature = "hydrate")]
    if let Some(form) = form.get_untracked() {
        form.reset();
    }
    #[cfg(not(feature = "hydrate"))]
    let _ = form;
}

/// Fetches a blob through the download endpoint and saves it under its own file name, typed by
/// extension.
pub async fn download_blob(path: String) -> Result<(), String> {
    #[cfg(feature = "hydrate")]
    {
        let window = web_sys::window().ok_or("No window")?;
        let params = web_sys::UrlSearchParams::new().map_err(describe)?;
        params.append("path", &path);
        let url = format!("{DOWNLOAD_ENDPOINT}?{}", String::from(params.to_string()));

        let request = web_sys::Request::new_with_str(&url).map_err(describe)?;
        let response = fetch(&request).await?;
        if !response.ok() {
            return Err(format!("Error downloading file ({})", response.status()));
        }
        let blob = JsFuture::from(response.blob().map_err(describe)?)
            .await
            .map_err(describe)?
            .dyn_into::<web_sys::Blob>()
            .map_err(describe)?;
        let typed = blob
            .slice_with_f64_and_f64_and_content_type(0.0, blob.size(), content_type_for(&path))
            .map_err(describe)?;

        let object_url = web_sys::Url::create_object_url_with_blob(&typed).map_err(describe)?;
        let anchor = window
            .document()
            .ok_or("No document")?
            .create_element("a")
            .map_err(describe)?
            .dyn_into::<web_sys::HtmlAnchorElement>()
            .map_err(|_| "Could not create a download link".to_string())?;
        anchor.set_href(&object_url);
        anchor.set_download(file_name_of(&path));
        anchor.click();

        // Revoking right after the click can cancel the save in some browsers.
        wasm_bindgen_futures::spawn_local(async move {
            gloo_timers::future::TimeoutFuture::new(REVOKE_DELAY_MS).await;
            if let Err(e) = web_sys::Url::revoke_object_url(&object_url) {
                leptos::logging::log!("Could not revoke download URL: {}", describe(e));
            }
        });
        Ok(())
    }
    #[cfg(not(feature = "hydrate"))]
    {
        let _ = path;
        Err("Downloading requires a browser".to_string())
    }
}

/// An open deadline change subscription. Dropping it closes the stream.
pub struct DeadlineSubscription {
    #[cfg(feature = "hydrate")]
    source: web_sys::EventSource,
    #[cfg(feature = "hydrate")]
    _on_message: Closure<dyn FnMut(web_sys::MessageEvent)>,
}

impl Drop for DeadlineSubscription {
    fn drop(&mut self) {
        #[cfg(feature = "hydrate")]
        self.source.close();
    }
}

/// Calls `on_value` with every deadline value the server publishes.
pub fn subscribe_deadline(on_value: impl Fn(String) + 'static) -> Option<DeadlineSubscription> {
    #[cfg(feature = "hydrate")]
    {
        let source = match web_sys::EventSource::new(DEADLINE_EVENTS_ENDPOINT) {
            Ok(source) => source,
            Err(e) => {
                leptos::logging::log!("Could not subscribe to deadline changes: {}", describe(e));
                return None;
            }
        };
        let on_message = Closure::<dyn FnMut(web_sys::MessageEvent)>::new(
            move |event: web_sys::MessageEvent| {
                if let Some(value) = event.data().as_string() {
                    on_value(value);
                }
            },
        );
        source.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
        Some(DeadlineSubscription {
            source,
            _on_message: on_message,
        })
    }
    #[cfg(not(feature = "hydrate"))]
    {
        let _ = on_value;
        None
    }
}

pub fn confirm(message: &str) -> bool {
    leptos::leptos_dom::helpers::window()
        .confirm_with_message(message)
        .unwrap_or(false)
}
