//! Page controllers: role-scoped fetch/mutate orchestration.
//!
//! Each page loads through the route guard and returns a typed view model
//! with the affordances the current role is allowed to see. Mutations
//! re-check the role locally (the backend enforces it anyway) so a
//! misrouted call fails fast with a permission error instead of a round
//! trip.

pub mod cart;
pub mod dashboard;
pub mod edit_order;
pub mod login;
pub mod orders;
pub mod products;
pub mod user_management;

pub use cart::{CartLine, CartPage, CartView};
pub use dashboard::{DashboardPage, DashboardView, OrderSummary};
pub use edit_order::{DraftLine, EditOrderPage, OrderDraft};
pub use login::LoginPage;
pub use orders::{OrderRow, OrdersPage, OrdersView};
pub use products::{ProductCard, ProductsPage, ProductsView};
pub use user_management::{AssignmentPanel, UserManagementPage, UserManagementView, UserRow};

use crate::app::App;
use crate::error::{Error, Result};
use crate::model::{Role, User};

/// Local role check for page mutations.
fn require_role(app: &App, role: Role) -> Result<User> {
    match app.auth().current_user() {
        Some(user) if user.role == role => Ok(user),
        Some(user) => Err(Error::Forbidden(format!(
            "{} role required, logged in as {}",
            role, user.role
        ))),
        None => Err(Error::Unauthorized("not logged in".to_string())),
    }
}

fn require_staff(app: &App) -> Result<User> {
    match app.auth().current_user() {
        Some(user) if user.role.is_staff() => Ok(user),
        Some(user) => Err(Error::Forbidden(format!(
            "staff role required, logged in as {}",
            user.role
        ))),
        None => Err(Error::Unauthorized("not logged in".to_string())),
    }
}
