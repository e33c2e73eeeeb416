#![allow(dead_code)]

//! Shared harness: one in-process backend plus a geocoder stub, with a
//! client factory so each role gets its own session (cookie jar and all),
//! the way separate browser profiles would.

pub mod backend;
pub mod geocoder;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use orderdesk::location::Position;
use orderdesk::{App, ClientConfig};

use backend::TestBackend;

/// Coordinates the geocoder stub resolves to Pune, Maharashtra.
pub const PUNE: Position = Position {
    latitude: 18.5204303,
    longitude: 73.8567437,
};

pub struct TestServer {
    pub state: Arc<TestBackend>,
    api_addr: SocketAddr,
    geo_addr: SocketAddr,
}

impl TestServer {
    pub async fn start() -> Self {
        let state = TestBackend::seeded();
        let api_addr = backend::spawn(state.clone()).await;
        let geo_addr = geocoder::spawn().await;
        Self {
            state,
            api_addr,
            geo_addr,
        }
    }

    pub fn config(&self, position: Option<Position>) -> ClientConfig {
        ClientConfig {
            api_root: format!("http://{}/api", self.api_addr).parse().unwrap(),
            request_timeout: Duration::from_secs(5),
            csrf_cookie: "csrftoken".to_string(),
            csrf_header: "X-CSRFToken".to_string(),
            cookie_settle: Duration::from_millis(10),
            geocoder_url: format!("http://{}", self.geo_addr).parse().unwrap(),
            geocoder_timeout: Duration::from_secs(2),
            position,
        }
    }

    /// Fresh session against the shared backend.
    pub async fn client(&self, position: Option<Position>) -> App {
        let app = App::new(self.config(position)).unwrap();
        app.init().await;
        app
    }
}
