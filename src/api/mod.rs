//! Typed wrappers over the backend's REST resources.
//!
//! One method per backend operation, split by resource. Each wrapper builds
//! the canonical path and query, delegates dispatch to the session manager,
//! and returns the parsed response typed to the resource's shape. No
//! business logic lives here; validation and authorization belong to the
//! backend.

mod admin;
mod auth;
mod cart;
mod orders;
mod products;
mod users;

pub use admin::UserAdminFilter;
pub use orders::OrderFilter;
pub use products::{ImageFile, ProductFilter, ProductPayload};

use std::sync::Arc;

use crate::http::session::SessionManager;

pub struct ApiClient {
    session: Arc<SessionManager>,
}

impl ApiClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }
}
