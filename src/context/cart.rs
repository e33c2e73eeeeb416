//! Cart state: the item list, the server-computed total, and the acting-user
//! scope for staff ordering on behalf of a customer.
//!
//! Every mutation follows the same discipline: call the API, and only on
//! success refetch the whole cart. Quantities are never reconciled locally
//! and the total is always the server's; a failed mutation leaves the prior
//! snapshot untouched.

use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::debug;

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::model::CartItem;

#[derive(Default)]
struct CartState {
    items: Vec<CartItem>,
    total: Decimal,
    loading: bool,
    error: Option<String>,
    acting_user: Option<i64>,
}

/// Read-only view of the cart state at one point in time.
#[derive(Debug, Clone)]
pub struct CartSnapshot {
    pub items: Vec<CartItem>,
    pub total: Decimal,
    pub loading: bool,
    pub error: Option<String>,
    pub acting_user: Option<i64>,
}

pub struct CartContext {
    api: Arc<ApiClient>,
    inner: RwLock<CartState>,
}

impl CartContext {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            inner: RwLock::new(CartState::default()),
        }
    }

    pub fn snapshot(&self) -> CartSnapshot {
        let inner = self.inner.read();
        CartSnapshot {
            items: inner.items.clone(),
            total: inner.total,
            loading: inner.loading,
            error: inner.error.clone(),
            acting_user: inner.acting_user,
        }
    }

    pub fn acting_user(&self) -> Option<i64> {
        self.inner.read().acting_user
    }

    /// Switching the acting customer refetches immediately so the view never
    /// shows one customer's items under another's name.
    pub async fn set_acting_user(&self, user_id: Option<i64>) -> Result<()> {
        {
            let mut inner = self.inner.write();
            if inner.acting_user == user_id {
                return Ok(());
            }
            inner.acting_user = user_id;
        }
        debug!(acting_user = ?user_id, "cart scope switched");
        self.refetch().await
    }

    pub async fn refetch(&self) -> Result<()> {
        let acting = {
            let mut inner = self.inner.write();
            inner.loading = true;
            inner.error = None;
            inner.acting_user
        };
        match self.api.get_cart(acting).await {
            Ok(cart) => {
                let mut inner = self.inner.write();
                inner.items = cart.items;
                inner.total = cart.total;
                inner.loading = false;
                Ok(())
            }
            Err(error) => {
                self.record_failure(&error);
                Err(error)
            }
        }
    }

    pub async fn add(&self, product_id: i64, quantity: u32) -> Result<()> {
        let acting = self.acting_user();
        if let Err(error) = self.api.add_to_cart(product_id, quantity, acting).await {
            self.record_failure(&error);
            return Err(error);
        }
        self.refetch().await
    }

    pub async fn update_quantity(&self, product_id: i64, quantity: u32) -> Result<()> {
        let acting = self.acting_user();
        if let Err(error) = self
            .api
            .update_cart_item(product_id, quantity, acting)
            .await
        {
            self.record_failure(&error);
            return Err(error);
        }
        self.refetch().await
    }

    pub async fn remove(&self, product_id: i64) -> Result<()> {
        let acting = self.acting_user();
        if let Err(error) = self.api.remove_from_cart(product_id, acting).await {
            self.record_failure(&error);
            return Err(error);
        }
        self.refetch().await
    }

    pub async fn clear(&self) -> Result<()> {
        let acting = self.acting_user();
        if let Err(error) = self.api.clear_cart(acting).await {
            self.record_failure(&error);
            return Err(error);
        }
        self.refetch().await
    }

    /// Forgets everything local, including the acting scope. Used on logout;
    /// server-side cart state is untouched.
    pub fn reset(&self) {
        *self.inner.write() = CartState::default();
    }

    fn record_failure(&self, error: &Error) {
        let mut inner = self.inner.write();
        inner.loading = false;
        inner.error = Some(error.to_string());
    }
}
