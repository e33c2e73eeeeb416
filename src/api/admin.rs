//! Manager-only administration endpoints: user lifecycle, profile edits,
//! password resets, and employee-to-customer assignments.

use chrono::NaiveDate;

use super::ApiClient;
use crate::error::Result;
use crate::http::session::RequestSpec;
use crate::model::{
    CustomerAssignment, PasswordResetResponse, Role, User, UserProfileUpdate, UserStatus,
};

#[derive(Debug, Clone, Default)]
pub struct UserAdminFilter {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub search: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl UserAdminFilter {
    fn apply(&self, spec: RequestSpec) -> RequestSpec {
        spec.query_opt("role", self.role)
            .query_opt("status", self.status)
            .query_opt("search", self.search.clone())
            .query_opt("start_date", self.start_date)
            .query_opt("end_date", self.end_date)
    }
}

impl ApiClient {
    pub async fn list_managed_users(&self, filter: &UserAdminFilter) -> Result<Vec<User>> {
        self.session()
            .send_json(filter.apply(RequestSpec::get("/admin/manage/")))
            .await
    }

    pub async fn update_user_status(&self, id: i64, status: UserStatus) -> Result<User> {
        self.session()
            .send_json(
                RequestSpec::patch(format!("/admin/manage/{id}/update_status/"))
                    .json(&serde_json::json!({ "status": status }))?,
            )
            .await
    }

    /// Approval is a status transition to ACTIVE; the backend has no
    /// dedicated approve verb.
    pub async fn approve_user(&self, id: i64) -> Result<User> {
        self.update_user_status(id, UserStatus::Active).await
    }

    pub async fn update_user_role(&self, id: i64, role: Role) -> Result<User> {
        self.session()
            .send_json(
                RequestSpec::patch(format!("/admin/manage/{id}/update_role/"))
                    .json(&serde_json::json!({ "role": role }))?,
            )
            .await
    }

    /// Issues a temporary password the manager relays to the user.
    pub async fn reset_password(&self, id: i64) -> Result<PasswordResetResponse> {
        self.session()
            .send_json(RequestSpec::post(format!(
                "/admin/manage/{id}/reset_password/"
            )))
            .await
    }

    pub async fn edit_user(&self, id: i64, update: &UserProfileUpdate) -> Result<User> {
        self.session()
            .send_json(RequestSpec::patch(format!("/admin/manage/{id}/edit_user/")).json(update)?)
            .await
    }

    pub async fn assign_customers(&self, employee_id: i64, customer_ids: &[i64]) -> Result<()> {
        self.session()
            .send_unit(
                RequestSpec::post("/admin/manage/assign_customers/").json(&serde_json::json!({
                    "employee_id": employee_id,
                    "customer_ids": customer_ids,
                }))?,
            )
            .await
    }

    pub async fn employee_customers(&self, employee_id: i64) -> Result<Vec<CustomerAssignment>> {
        self.session()
            .send_json(
                RequestSpec::get("/admin/manage/get_employee_customers/")
                    .query("employee_id", employee_id),
            )
            .await
    }

    /// Customers not currently assigned to any employee.
    pub async fn unassigned_customers(&self) -> Result<Vec<User>> {
        self.session()
            .send_json(RequestSpec::get("/admin/manage/unassigned_customers/"))
            .await
    }

    pub async fn unassign_customer(&self, employee_id: i64, customer_id: i64) -> Result<()> {
        self.session()
            .send_unit(
                RequestSpec::post("/admin/manage/unassign_customer/").json(&serde_json::json!({
                    "employee_id": employee_id,
                    "customer_id": customer_id,
                }))?,
            )
            .await
    }
}
