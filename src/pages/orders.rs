//! Orders page: filtered listing, countdown display, and the manager's
//! accept/reject verbs.
//!
//! State machine, enforced here for affordances and by the backend for real:
//! `pending -accept-> accepted`, `pending -reject-> rejected`; terminal
//! states reject every further transition and edit.

use crate::api::OrderFilter;
use crate::app::{App, PageFlow, Route};
use crate::error::Result;
use crate::model::{Order, OrderStatus, Role};

pub struct OrderRow {
    pub order: Order,
    /// Human-readable payment countdown derived from the server's
    /// `days_remaining`; never recomputed from dates on this side.
    pub deadline_label: String,
    pub can_accept: bool,
    pub can_reject: bool,
    pub can_edit: bool,
}

pub struct OrdersView {
    pub orders: Vec<OrderRow>,
    pub can_moderate: bool,
}

pub struct OrdersPage<'a> {
    app: &'a App,
}

impl<'a> OrdersPage<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }

    pub async fn load(&self, filter: &OrderFilter) -> Result<PageFlow<OrdersView>> {
        let user = match self.app.guard(Route::Orders) {
            Ok(user) => user,
            Err(redirect) => return Ok(PageFlow::Redirect(redirect)),
        };
        let can_moderate = user.role == Role::Manager;
        let orders = self.app.api().list_orders(filter).await?;
        Ok(PageFlow::Page(OrdersView {
            orders: orders
                .into_iter()
                .map(|order| {
                    let actionable = can_moderate && order.status == OrderStatus::Pending;
                    OrderRow {
                        deadline_label: deadline_label(&order),
                        can_accept: actionable,
                        can_reject: actionable,
                        can_edit: actionable,
                        order,
                    }
                })
                .collect(),
            can_moderate,
        }))
    }

    pub async fn accept(&self, order_id: i64) -> Result<Order> {
        super::require_role(self.app, Role::Manager)?;
        self.app.api().accept_order(order_id).await
    }

    pub async fn reject(&self, order_id: i64) -> Result<Order> {
        super::require_role(self.app, Role::Manager)?;
        self.app.api().reject_order(order_id).await
    }
}

fn deadline_label(order: &Order) -> String {
    if order.status.is_terminal() {
        return order.status.to_string();
    }
    match order.days_remaining {
        0 => "due today".to_string(),
        1 => "1 day remaining".to_string(),
        days if days > 1 => format!("{days} days remaining"),
        -1 => "overdue by 1 day".to_string(),
        days => format!("overdue by {} days", -days),
    }
}
