//! Session/CSRF manager: every request to the backend goes through here.
//!
//! Responsibilities, in dispatch order: canonicalize the path, attach the
//! anti-forgery token where required, send, then sort the response. A 401
//! marks the session dead and broadcasts that on a watch channel. A 403 that
//! has not been replayed yet triggers session recovery: exactly one in-flight
//! probe/token-refresh no matter how many requests hit 403 together, with the
//! latecomers parked on a waiter list until the outcome is known. Each
//! request replays at most once.

use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::cookie::Jar;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result, error_from_response};
use crate::http::credentials::{CookieCredentialStore, CredentialStore};
use crate::http::paths::{canonicalize, is_sensitive_read};

/// Multipart field value. Files carry their bytes so a replay can rebuild
/// the form from scratch.
pub enum FormValue {
    Text(String),
    File {
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

impl std::fmt::Debug for FormValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormValue::Text(text) => f.debug_tuple("Text").field(text).finish(),
            FormValue::File {
                file_name, bytes, ..
            } => f
                .debug_struct("File")
                .field("file_name", file_name)
                .field("bytes", &bytes.len())
                .finish(),
        }
    }
}

#[derive(Debug)]
pub struct FormField {
    pub name: String,
    pub value: FormValue,
}

impl FormField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FormValue::Text(value.into()),
        }
    }

    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            value: FormValue::File {
                file_name: file_name.into(),
                content_type: content_type.into(),
                bytes,
            },
        }
    }
}

#[derive(Debug)]
pub enum Payload {
    None,
    Json(serde_json::Value),
    Multipart(Vec<FormField>),
}

/// A request described as data, so retries reconstruct it instead of cloning
/// a consumed body.
#[derive(Debug)]
pub struct RequestSpec {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    payload: Payload,
}

impl RequestSpec {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            payload: Payload::None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn query_opt<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.payload = Payload::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn multipart(mut self, fields: Vec<FormField>) -> Self {
        self.payload = Payload::Multipart(fields);
        self
    }

    /// Mutations always carry the token; reads only when the path is
    /// classified sensitive.
    fn needs_token(&self, canonical_path: &str) -> bool {
        self.method != Method::GET || is_sensitive_read(canonical_path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unknown,
    Active,
    Expired,
}

/// What a finished recovery tells the parked requests.
#[derive(Debug, Clone)]
enum RecoveryOutcome {
    Recovered,
    SessionInvalid,
    RefreshFailed(String),
}

#[derive(Default)]
struct RecoveryState {
    in_progress: bool,
    waiters: Vec<oneshot::Sender<RecoveryOutcome>>,
}

pub struct SessionManager {
    http: reqwest::Client,
    credentials: Arc<dyn CredentialStore>,
    /// API root without trailing slash, e.g. `http://localhost:8000/api`.
    base: String,
    csrf_header: String,
    state: watch::Sender<SessionState>,
    recovery: Mutex<RecoveryState>,
}

impl SessionManager {
    /// Full stack: fresh cookie jar, HTTP client sharing it, cookie-backed
    /// credential store.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let http = build_http(config, jar.clone())?;
        let credentials = Arc::new(CookieCredentialStore::new(
            http.clone(),
            jar,
            config.api_root.clone(),
            config.csrf_cookie.clone(),
            config.cookie_settle,
        ));
        Ok(Self::assemble(config, http, credentials))
    }

    /// Same plumbing with an injected credential store.
    pub fn with_credentials(
        config: &ClientConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let http = build_http(config, jar)?;
        Ok(Self::assemble(config, http, credentials))
    }

    fn assemble(
        config: &ClientConfig,
        http: reqwest::Client,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        Self {
            http,
            credentials,
            base: config.api_root.as_str().trim_end_matches('/').to_string(),
            csrf_header: config.csrf_header.clone(),
            state,
            recovery: Mutex::new(RecoveryState::default()),
        }
    }

    /// Observe session liveness; flips to `Expired` on any 401 or failed
    /// recovery probe.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn session_state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// Dispatches a request and returns the raw successful response.
    /// Non-success statuses are already mapped to [`Error`].
    pub async fn send(&self, spec: RequestSpec) -> Result<reqwest::Response> {
        let path = canonicalize(&spec.path);
        let url = format!("{}{}", self.base, path);
        let mut replayed = false;

        loop {
            let mut request = self.http.request(spec.method.clone(), &url);
            if !spec.query.is_empty() {
                request = request.query(&spec.query);
            }
            if spec.needs_token(&path) {
                let token = self.credentials.refresh().await?;
                request = request.header(self.csrf_header.as_str(), token);
            }
            request = match &spec.payload {
                Payload::None => request,
                Payload::Json(value) => request.json(value),
                Payload::Multipart(fields) => request.multipart(build_form(fields)?),
            };

            debug!(method = %spec.method, path = %path, replayed, "dispatching request");
            let response = request.send().await?;
            let status = response.status();

            if status.is_success() {
                self.set_state(SessionState::Active);
                return Ok(response);
            }

            let body = response.text().await.unwrap_or_default();
            let error = error_from_response(status, &body);

            if status == StatusCode::UNAUTHORIZED {
                info!(path = %path, "session rejected; marking expired");
                self.set_state(SessionState::Expired);
                return Err(error);
            }

            if status == StatusCode::FORBIDDEN && !replayed {
                warn!(path = %path, "403 received; entering session recovery");
                replayed = true;
                self.recover(error).await?;
                continue;
            }

            return Err(error);
        }
    }

    pub async fn send_json<T: DeserializeOwned>(&self, spec: RequestSpec) -> Result<T> {
        let response = self.send(spec).await?;
        Ok(response.json().await?)
    }

    pub async fn send_unit(&self, spec: RequestSpec) -> Result<()> {
        self.send(spec).await.map(|_| ())
    }

    /// Coalesced 403 recovery. The first caller becomes the leader: it
    /// probes the session and, if the session still stands, refreshes the
    /// token once. Every concurrent caller parks on the waiter list and
    /// shares the leader's outcome. `Ok(())` means "replay your request".
    async fn recover(&self, original: Error) -> Result<()> {
        let parked = {
            let mut recovery = self.recovery.lock();
            if recovery.in_progress {
                let (tx, rx) = oneshot::channel();
                recovery.waiters.push(tx);
                Some(rx)
            } else {
                recovery.in_progress = true;
                None
            }
        };

        if let Some(rx) = parked {
            debug!("recovery already in flight; parking request");
            return match rx.await {
                Ok(RecoveryOutcome::Recovered) => Ok(()),
                Ok(RecoveryOutcome::SessionInvalid) => {
                    Err(Error::Unauthorized("session expired during recovery".into()))
                }
                Ok(RecoveryOutcome::RefreshFailed(reason)) => Err(Error::TokenUnavailable(reason)),
                // Leader dropped mid-recovery; fall back to the caller's
                // original failure.
                Err(_) => Err(original),
            };
        }

        let guard = RecoveryGuard {
            recovery: &self.recovery,
            armed: true,
        };

        let outcome = if self.probe_session().await {
            match self.credentials.refresh().await {
                Ok(_) => RecoveryOutcome::Recovered,
                Err(error) => RecoveryOutcome::RefreshFailed(error.to_string()),
            }
        } else {
            info!("session probe failed during recovery; marking expired");
            self.set_state(SessionState::Expired);
            RecoveryOutcome::SessionInvalid
        };

        let waiters = guard.finish();
        debug!(waiters = waiters.len(), outcome = ?outcome, "recovery resolved");
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }

        match outcome {
            RecoveryOutcome::Recovered => Ok(()),
            // The leader keeps its own failure so callers see the server's
            // detail (a pending-approval login, for example).
            RecoveryOutcome::SessionInvalid => Err(original),
            RecoveryOutcome::RefreshFailed(reason) => Err(Error::TokenUnavailable(reason)),
        }
    }

    /// Raw probe, deliberately outside `send` so recovery cannot recurse.
    async fn probe_session(&self) -> bool {
        let url = format!("{}/auth/session/", self.base);
        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                warn!(error = %error, "session probe transport failure");
                false
            }
        }
    }

    fn set_state(&self, next: SessionState) {
        self.state.send_if_modified(|state| {
            if *state != next {
                *state = next;
                true
            } else {
                false
            }
        });
    }
}

/// Clears the in-progress flag even if the leader future is dropped; parked
/// senders drop with it, which wakes waiters with their original errors.
struct RecoveryGuard<'a> {
    recovery: &'a Mutex<RecoveryState>,
    armed: bool,
}

impl RecoveryGuard<'_> {
    fn finish(mut self) -> Vec<oneshot::Sender<RecoveryOutcome>> {
        self.armed = false;
        let mut recovery = self.recovery.lock();
        recovery.in_progress = false;
        mem::take(&mut recovery.waiters)
    }
}

impl Drop for RecoveryGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut recovery = self.recovery.lock();
            recovery.in_progress = false;
            recovery.waiters.clear();
        }
    }
}

fn build_http(config: &ClientConfig, jar: Arc<Jar>) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(config.request_timeout)
        .cookie_provider(jar)
        .build()?)
}

fn build_form(fields: &[FormField]) -> Result<reqwest::multipart::Form> {
    let mut form = reqwest::multipart::Form::new();
    for field in fields {
        form = match &field.value {
            FormValue::Text(text) => form.text(field.name.clone(), text.clone()),
            FormValue::File {
                file_name,
                content_type,
                bytes,
            } => {
                let part = reqwest::multipart::Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str(content_type)?;
                form.part(field.name.clone(), part)
            }
        };
    }
    Ok(form)
}
