//! Order endpoints: listing with filters, creation, the pending-only
//! lifecycle verbs, and the pending-order edit.

use chrono::NaiveDate;

use super::ApiClient;
use crate::error::Result;
use crate::http::session::RequestSpec;
use crate::model::{CreateOrderRequest, Order, OrderStatus, UpdateOrderRequest};

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub search: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Scope to one customer's orders (staff views).
    pub user_id: Option<i64>,
}

impl OrderFilter {
    fn apply(&self, spec: RequestSpec) -> RequestSpec {
        spec.query_opt("status", self.status)
            .query_opt("search", self.search.clone())
            .query_opt("start_date", self.start_date)
            .query_opt("end_date", self.end_date)
            .query_opt("user_id", self.user_id)
    }
}

impl ApiClient {
    pub async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
        self.session()
            .send_json(filter.apply(RequestSpec::get("/orders/")))
            .await
    }

    pub async fn get_order(&self, id: i64) -> Result<Order> {
        self.session()
            .send_json(RequestSpec::get(format!("/orders/{id}/")))
            .await
    }

    pub async fn create_order(&self, request: &CreateOrderRequest) -> Result<Order> {
        self.session()
            .send_json(RequestSpec::post("/orders/").json(request)?)
            .await
    }

    pub async fn update_order_status(&self, id: i64, status: OrderStatus) -> Result<Order> {
        self.session()
            .send_json(
                RequestSpec::patch(format!("/orders/{id}/"))
                    .json(&serde_json::json!({ "status": status }))?,
            )
            .await
    }

    /// Replaces items, address and deadline on a pending order. The backend
    /// rejects non-pending orders.
    pub async fn update_order(&self, id: i64, request: &UpdateOrderRequest) -> Result<Order> {
        self.session()
            .send_json(RequestSpec::patch(format!("/orders/{id}/update_order/")).json(request)?)
            .await
    }

    pub async fn accept_order(&self, id: i64) -> Result<Order> {
        self.session()
            .send_json(RequestSpec::post(format!("/orders/{id}/accept/")))
            .await
    }

    pub async fn reject_order(&self, id: i64) -> Result<Order> {
        self.session()
            .send_json(RequestSpec::post(format!("/orders/{id}/reject/")))
            .await
    }
}
