//! Login and registration flows.

use tracing::warn;

use crate::app::{App, Redirect};
use crate::error::Result;
use crate::model::{RegisterRequest, RegisterResponse, User};

pub struct LoginPage<'a> {
    app: &'a App,
}

impl<'a> LoginPage<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }

    /// Already-authenticated visitors are sent home.
    pub fn entry_redirect(&self) -> Option<Redirect> {
        self.app.guard_public()
    }

    /// On success the cart is primed for the fresh session; a cart fetch
    /// failure is not a login failure.
    pub async fn submit_login(&self, username: &str, password: &str) -> Result<User> {
        let user = self.app.auth().login(username, password).await?;
        if let Err(error) = self.app.cart().refetch().await {
            warn!(error = %error, "cart fetch after login failed");
        }
        Ok(user)
    }

    /// Registration leaves the visitor logged out; the new account waits for
    /// manager approval.
    pub async fn submit_registration(&self, request: RegisterRequest) -> Result<RegisterResponse> {
        self.app.auth().register(request).await
    }
}
