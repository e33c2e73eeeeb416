//! Nominatim-shaped reverse geocoder stub.

use std::net::SocketAddr;

use axum::Json;
use axum::Router;
use axum::response::{IntoResponse, Response};
use serde_json::json;

async fn reverse() -> Response {
    Json(json!({
        "address": {"state": "Maharashtra", "country": "India"},
        "display_name": "Pune, Maharashtra, India",
        "lat": "18.520430",
        "lon": "73.856744",
    }))
    .into_response()
}

pub async fn spawn() -> SocketAddr {
    let router = Router::new().fallback(reverse);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}
