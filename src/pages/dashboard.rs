//! Dashboard: a client-side order summary for everyone, plus role-gated
//! stats panels. Stats failures are logged and swallowed; they never take
//! the page down with them.

use std::future::Future;

use rust_decimal::Decimal;
use tracing::warn;

use crate::api::OrderFilter;
use crate::app::{App, PageFlow, Route};
use crate::error::Result;
use crate::model::{OrderStatus, Product, ProductStats, Role, UserStats};

#[derive(Debug, Clone, PartialEq)]
pub struct OrderSummary {
    /// Sum over the listed orders' server-reported totals.
    pub total: Decimal,
    pub count: usize,
    pub pending: usize,
}

pub struct DashboardView {
    pub order_summary: OrderSummary,
    /// Staff only.
    pub product_stats: Option<ProductStats>,
    /// Manager only.
    pub user_stats: Option<UserStats>,
    /// Manager only.
    pub low_stock: Option<Vec<Product>>,
}

pub struct DashboardPage<'a> {
    app: &'a App,
}

impl<'a> DashboardPage<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }

    pub async fn load(&self) -> Result<PageFlow<DashboardView>> {
        let user = match self.app.guard(Route::Dashboard) {
            Ok(user) => user,
            Err(redirect) => return Ok(PageFlow::Redirect(redirect)),
        };

        // The order list is the page's backbone; its failure is the page's.
        let orders = self.app.api().list_orders(&OrderFilter::default()).await?;
        let order_summary = OrderSummary {
            total: orders.iter().map(|order| order.total_amount).sum(),
            count: orders.len(),
            pending: orders
                .iter()
                .filter(|order| order.status == OrderStatus::Pending)
                .count(),
        };

        let is_staff = user.role.is_staff();
        let is_manager = user.role == Role::Manager;
        let (product_stats, user_stats, low_stock) = tokio::join!(
            optional(is_staff, "product stats", self.app.api().product_stats()),
            optional(is_manager, "user stats", self.app.api().user_stats()),
            optional(is_manager, "low stock", self.app.api().low_stock_products()),
        );

        Ok(PageFlow::Page(DashboardView {
            order_summary,
            product_stats,
            user_stats,
            low_stock,
        }))
    }
}

async fn optional<T>(
    enabled: bool,
    what: &str,
    fetch: impl Future<Output = Result<T>>,
) -> Option<T> {
    if !enabled {
        return None;
    }
    match fetch.await {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(error = %error, "{what} fetch failed; panel hidden");
            None
        }
    }
}
