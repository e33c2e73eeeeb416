//! Pending-order editing (manager only).
//!
//! Loading a non-pending order never reaches the edit view: the page
//! redirects back to the orders list with an error notice. The draft holds
//! order-time prices for existing lines and catalog prices for added ones,
//! with the same stock ceilings as the cart.

use rust_decimal::Decimal;

use crate::api::ProductFilter;
use crate::app::{App, PageFlow, Redirect, Route};
use crate::error::{Error, FieldErrors, Result};
use crate::model::{CheckoutItem, Order, OrderStatus, Product, Role, UpdateOrderRequest};
use crate::pages::cart::{MAX_PAYMENT_DEADLINE, MIN_PAYMENT_DEADLINE};

#[derive(Debug, Clone)]
pub struct DraftLine {
    pub product_id: i64,
    pub name: String,
    /// Order-time price for carried-over lines, catalog price for added ones.
    pub price: Decimal,
    pub stock: u32,
    pub quantity: u32,
}

impl DraftLine {
    pub fn can_increment(&self) -> bool {
        self.quantity < self.stock
    }

    pub fn can_decrement(&self) -> bool {
        self.quantity > 1
    }

    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Editable projection of a pending order. Totals shown from the draft are a
/// preview; the server recomputes on save.
#[derive(Debug)]
pub struct OrderDraft {
    order_id: i64,
    pub shipping_address: String,
    pub payment_deadline: u32,
    lines: Vec<DraftLine>,
    catalog: Vec<Product>,
}

impl OrderDraft {
    fn from_order(order: Order, catalog: Vec<Product>) -> Self {
        let lines = order
            .items
            .iter()
            .map(|item| DraftLine {
                product_id: item.product_detail.id,
                name: item.product_detail.name.clone(),
                price: item.price,
                stock: item.product_detail.stock,
                quantity: item.quantity,
            })
            .collect();
        Self {
            order_id: order.id,
            shipping_address: order.shipping_address,
            payment_deadline: order.payment_deadline,
            lines,
            catalog,
        }
    }

    pub fn order_id(&self) -> i64 {
        self.order_id
    }

    pub fn lines(&self) -> &[DraftLine] {
        &self.lines
    }

    /// Products that can still be added to the order.
    pub fn catalog(&self) -> &[Product] {
        &self.catalog
    }

    pub fn preview_total(&self) -> Decimal {
        self.lines.iter().map(DraftLine::line_total).sum()
    }

    pub fn set_address(&mut self, address: impl Into<String>) {
        self.shipping_address = address.into();
    }

    pub fn set_deadline(&mut self, days: u32) {
        self.payment_deadline = days;
    }

    /// Adds one unit of a catalog product, or bumps an existing line.
    pub fn add_product(&mut self, product_id: i64) -> Result<()> {
        if self.lines.iter().any(|line| line.product_id == product_id) {
            return self.increment(product_id);
        }
        let product = self
            .catalog
            .iter()
            .find(|product| product.id == product_id)
            .ok_or_else(|| Error::NotFound(format!("product {product_id} not in the catalog")))?;
        if product.stock == 0 {
            return Err(Error::validation("quantity", "Product is out of stock"));
        }
        self.lines.push(DraftLine {
            product_id: product.id,
            name: product.name.clone(),
            price: product.price,
            stock: product.stock,
            quantity: 1,
        });
        Ok(())
    }

    pub fn increment(&mut self, product_id: i64) -> Result<()> {
        let line = self.line_mut(product_id)?;
        if !line.can_increment() {
            return Err(Error::validation(
                "quantity",
                "Requested quantity exceeds available stock",
            ));
        }
        line.quantity += 1;
        Ok(())
    }

    pub fn decrement(&mut self, product_id: i64) -> Result<()> {
        let line = self.line_mut(product_id)?;
        if !line.can_decrement() {
            return Err(Error::validation(
                "quantity",
                "Quantity cannot go below one; remove the line instead",
            ));
        }
        line.quantity -= 1;
        Ok(())
    }

    pub fn remove(&mut self, product_id: i64) -> Result<()> {
        let before = self.lines.len();
        self.lines.retain(|line| line.product_id != product_id);
        if self.lines.len() == before {
            return Err(Error::NotFound(format!(
                "product {product_id} is not on the order"
            )));
        }
        Ok(())
    }

    fn line_mut(&mut self, product_id: i64) -> Result<&mut DraftLine> {
        self.lines
            .iter_mut()
            .find(|line| line.product_id == product_id)
            .ok_or_else(|| Error::NotFound(format!("product {product_id} is not on the order")))
    }

    fn validate(&self) -> Result<()> {
        let mut errors = FieldErrors::new();
        if self.shipping_address.trim().is_empty() {
            errors.push("shipping_address", "Shipping address is required");
        }
        if !(MIN_PAYMENT_DEADLINE..=MAX_PAYMENT_DEADLINE).contains(&self.payment_deadline) {
            errors.push(
                "payment_deadline",
                format!(
                    "Payment deadline must be between {MIN_PAYMENT_DEADLINE} and {MAX_PAYMENT_DEADLINE} days"
                ),
            );
        }
        if self.lines.is_empty() {
            errors.push("items", "An order needs at least one item");
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(errors))
        }
    }

    fn to_request(&self) -> UpdateOrderRequest {
        UpdateOrderRequest {
            shipping_address: self.shipping_address.trim().to_string(),
            payment_deadline: self.payment_deadline,
            items: self
                .lines
                .iter()
                .map(|line| CheckoutItem {
                    product_id: line.product_id,
                    quantity: line.quantity,
                })
                .collect(),
        }
    }
}

pub struct EditOrderPage<'a> {
    app: &'a App,
}

impl<'a> EditOrderPage<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }

    pub async fn load(&self, order_id: i64) -> Result<PageFlow<OrderDraft>> {
        if let Err(redirect) = self.app.guard(Route::EditOrder) {
            return Ok(PageFlow::Redirect(redirect));
        }
        let filter = ProductFilter::default();
        let (order, catalog) = tokio::join!(
            self.app.api().get_order(order_id),
            self.app.api().list_products(&filter),
        );
        let order = order?;
        if order.status != OrderStatus::Pending {
            return Ok(PageFlow::Redirect(Redirect::with_notice(
                Route::Orders,
                "Only pending orders can be edited",
            )));
        }
        Ok(PageFlow::Page(OrderDraft::from_order(order, catalog?)))
    }

    pub async fn save(&self, draft: &OrderDraft) -> Result<Order> {
        super::require_role(self.app, Role::Manager)?;
        draft.validate()?;
        self.app
            .api()
            .update_order(draft.order_id, &draft.to_request())
            .await
    }
}
