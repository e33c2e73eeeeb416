//! Auth endpoints: login, logout, registration, and the who-am-I probe.

use super::ApiClient;
use crate::error::Result;
use crate::http::session::RequestSpec;
use crate::model::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, User};

impl ApiClient {
    /// Who-am-I probe used to restore a session on startup.
    pub async fn me(&self) -> Result<User> {
        self.session().send_json(RequestSpec::get("/users/me/")).await
    }

    /// Lightweight session validity check.
    pub async fn session_probe(&self) -> Result<()> {
        self.session()
            .send_unit(RequestSpec::get("/auth/session/"))
            .await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response: LoginResponse = self
            .session()
            .send_json(RequestSpec::post("/auth/login/").json(&body)?)
            .await?;
        Ok(response.user)
    }

    pub async fn logout(&self) -> Result<()> {
        self.session()
            .send_unit(RequestSpec::post("/auth/logout/"))
            .await
    }

    /// Creates a PENDING account. Deliberately does not authenticate the
    /// caller; approval comes first.
    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse> {
        self.session()
            .send_json(RequestSpec::post("/auth/register/").json(request)?)
            .await
    }
}
