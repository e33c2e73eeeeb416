//! User administration (manager only): approval, role and status changes,
//! password resets, profile edits, and the employee-to-customer assignment
//! panel.

use crate::api::UserAdminFilter;
use crate::app::{App, PageFlow, Route};
use crate::error::{Error, Result};
use crate::model::{
    CustomerAssignment, PasswordResetResponse, Role, User, UserProfileUpdate, UserStatus,
};

pub struct UserRow {
    pub user: User,
    /// Only PENDING accounts offer the approve affordance.
    pub can_approve: bool,
}

pub struct UserManagementView {
    pub users: Vec<UserRow>,
}

/// One employee's assignment state: who they already have, and who is still
/// free to assign.
pub struct AssignmentPanel {
    pub assigned: Vec<CustomerAssignment>,
    pub unassigned: Vec<User>,
}

pub struct UserManagementPage<'a> {
    app: &'a App,
}

impl<'a> UserManagementPage<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }

    pub async fn load(&self, filter: &UserAdminFilter) -> Result<PageFlow<UserManagementView>> {
        if let Err(redirect) = self.app.guard(Route::UserManagement) {
            return Ok(PageFlow::Redirect(redirect));
        }
        let users = self.app.api().list_managed_users(filter).await?;
        Ok(PageFlow::Page(UserManagementView {
            users: users
                .into_iter()
                .map(|user| UserRow {
                    can_approve: user.status == Some(UserStatus::Pending),
                    user,
                })
                .collect(),
        }))
    }

    pub async fn approve(&self, user_id: i64) -> Result<User> {
        super::require_role(self.app, Role::Manager)?;
        self.app.api().approve_user(user_id).await
    }

    pub async fn set_status(&self, user_id: i64, status: UserStatus) -> Result<User> {
        super::require_role(self.app, Role::Manager)?;
        self.app.api().update_user_status(user_id, status).await
    }

    pub async fn set_role(&self, user_id: i64, role: Role) -> Result<User> {
        super::require_role(self.app, Role::Manager)?;
        self.app.api().update_user_role(user_id, role).await
    }

    pub async fn reset_password(&self, user_id: i64) -> Result<PasswordResetResponse> {
        super::require_role(self.app, Role::Manager)?;
        self.app.api().reset_password(user_id).await
    }

    pub async fn edit_profile(&self, user_id: i64, update: &UserProfileUpdate) -> Result<User> {
        super::require_role(self.app, Role::Manager)?;
        self.app.api().edit_user(user_id, update).await
    }

    pub async fn assignments(&self, employee_id: i64) -> Result<AssignmentPanel> {
        super::require_role(self.app, Role::Manager)?;
        let (assigned, unassigned) = tokio::join!(
            self.app.api().employee_customers(employee_id),
            self.app.api().unassigned_customers(),
        );
        Ok(AssignmentPanel {
            assigned: assigned?,
            unassigned: unassigned?,
        })
    }

    pub async fn assign(&self, employee_id: i64, customer_ids: &[i64]) -> Result<()> {
        super::require_role(self.app, Role::Manager)?;
        if customer_ids.is_empty() {
            return Err(Error::validation(
                "customer_ids",
                "Select at least one customer to assign",
            ));
        }
        self.app
            .api()
            .assign_customers(employee_id, customer_ids)
            .await
    }

    pub async fn unassign(&self, employee_id: i64, customer_id: i64) -> Result<()> {
        super::require_role(self.app, Role::Manager)?;
        self.app
            .api()
            .unassign_customer(employee_id, customer_id)
            .await
    }
}
