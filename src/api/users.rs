//! Read-only user endpoints available outside the admin surface.

use super::ApiClient;
use crate::error::Result;
use crate::http::session::RequestSpec;
use crate::model::{Role, User, UserStats};

impl ApiClient {
    pub async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>> {
        self.session()
            .send_json(RequestSpec::get("/users/").query_opt("role", role))
            .await
    }

    /// Active customers, for the on-behalf-of selector.
    pub async fn get_customers(&self) -> Result<Vec<User>> {
        self.session()
            .send_json(RequestSpec::get("/users/get_customers/"))
            .await
    }

    pub async fn user_stats(&self) -> Result<UserStats> {
        self.session()
            .send_json(RequestSpec::get("/users/stats/"))
            .await
    }
}
