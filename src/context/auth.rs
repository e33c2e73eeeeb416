//! Authentication state: the current user and the calls that change it.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::error::{Error, FieldErrors, Result};
use crate::model::{RegisterRequest, RegisterResponse, User};

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Default)]
struct AuthState {
    user: Option<User>,
    loading: bool,
}

pub struct AuthContext {
    api: Arc<ApiClient>,
    inner: RwLock<AuthState>,
}

impl AuthContext {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            inner: RwLock::new(AuthState::default()),
        }
    }

    /// Startup probe: restores the user from an existing session cookie.
    /// Any failure just means "not logged in".
    pub async fn init(&self) {
        self.inner.write().loading = true;
        let user = match self.api.me().await {
            Ok(user) => {
                debug!(username = %user.username, "session restored");
                Some(user)
            }
            Err(error) => {
                debug!(error = %error, "no session to restore");
                None
            }
        };
        let mut inner = self.inner.write();
        inner.user = user;
        inner.loading = false;
    }

    pub fn current_user(&self) -> Option<User> {
        self.inner.read().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.read().user.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.read().loading
    }

    /// Exchanges credentials for a session. Both a wrong password (401) and
    /// an unapproved or blocked account (403) surface as
    /// [`Error::InvalidCredentials`] carrying the server's detail.
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        match self.api.login(username, password).await {
            Ok(user) => {
                info!(username = %user.username, role = %user.role, "login succeeded");
                self.inner.write().user = Some(user.clone());
                Ok(user)
            }
            Err(Error::Unauthorized(detail)) | Err(Error::Forbidden(detail)) => {
                Err(Error::InvalidCredentials(detail))
            }
            Err(other) => Err(other),
        }
    }

    /// Local state clears unconditionally; a failed network call is logged
    /// and otherwise ignored so the user is never stuck half logged in.
    pub async fn logout(&self) {
        if let Err(error) = self.api.logout().await {
            warn!(error = %error, "logout request failed; clearing local session anyway");
        }
        self.inner.write().user = None;
    }

    /// Creates a PENDING account after client-side form checks. Does not
    /// authenticate: the account needs manager approval before first login.
    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse> {
        validate_registration(&request)?;
        self.api.register(&request).await
    }
}

fn validate_registration(request: &RegisterRequest) -> Result<()> {
    let mut errors = FieldErrors::new();
    if request.username.trim().is_empty() {
        errors.push("username", "Username is required");
    }
    if request.password.len() < MIN_PASSWORD_LENGTH {
        errors.push(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
        );
    }
    if request.password != request.password2 {
        errors.push("password2", "Passwords do not match");
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors))
    }
}
