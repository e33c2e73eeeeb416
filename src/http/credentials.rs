//! Credential storage behind a trait.
//!
//! The double-submit anti-forgery scheme keeps the token in a cookie; the
//! session layer only ever asks a [`CredentialStore`] for it, so the cookie
//! jar (or an in-memory stand-in for tests) stays an implementation detail.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use reqwest::cookie::{CookieStore, Jar};
use tracing::debug;

use crate::error::{Error, Result, error_from_response};

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Current token value, if one is already stored.
    async fn get(&self) -> Option<String>;

    /// Acquires a fresh token: round trip to the issuing endpoint, settle
    /// wait, then read back. Fails with [`Error::TokenUnavailable`] when the
    /// cookie never materializes.
    async fn refresh(&self) -> Result<String>;
}

/// Cookie-jar-backed store. Shares the jar with the session's HTTP client so
/// the browser-equivalent state (session cookie + token cookie) lives in one
/// place.
pub struct CookieCredentialStore {
    http: reqwest::Client,
    jar: Arc<Jar>,
    base: Url,
    token_path: String,
    cookie_name: String,
    settle: Duration,
}

impl CookieCredentialStore {
    pub fn new(
        http: reqwest::Client,
        jar: Arc<Jar>,
        base: Url,
        cookie_name: impl Into<String>,
        settle: Duration,
    ) -> Self {
        Self {
            http,
            jar,
            base,
            token_path: "/auth/csrf/".to_string(),
            cookie_name: cookie_name.into(),
            settle,
        }
    }

    fn read_cookie(&self) -> Option<String> {
        let header = self.jar.cookies(&self.base)?;
        let header = header.to_str().ok()?;
        cookie_value(header, &self.cookie_name)
    }

    fn token_url(&self) -> String {
        format!(
            "{}{}",
            self.base.as_str().trim_end_matches('/'),
            self.token_path
        )
    }
}

#[async_trait]
impl CredentialStore for CookieCredentialStore {
    async fn get(&self) -> Option<String> {
        self.read_cookie()
    }

    async fn refresh(&self) -> Result<String> {
        let response = self.http.get(self.token_url()).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_response(status, &body));
        }
        // The jar is updated by the client after the response is consumed;
        // the settle delay mirrors the same wait the cookie write needs in
        // a browser.
        tokio::time::sleep(self.settle).await;
        match self.read_cookie() {
            Some(token) => {
                debug!(cookie = %self.cookie_name, "anti-forgery token refreshed");
                Ok(token)
            }
            None => Err(Error::TokenUnavailable(format!(
                "cookie `{}` absent after issuing round trip",
                self.cookie_name
            ))),
        }
    }
}

/// Pulls one value out of a `name=value; name2=value2` cookie header.
fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}
