//! Cart page: quantity affordances, the on-behalf-of customer selector, and
//! checkout with the staff geolocation gate.

use rust_decimal::Decimal;
use tracing::warn;

use crate::app::{App, PageFlow, Route};
use crate::error::{Error, FieldErrors, Result};
use crate::model::{CartItem, CheckoutItem, CreateOrderRequest, Order, Role, User};

pub const MIN_PAYMENT_DEADLINE: u32 = 1;
pub const MAX_PAYMENT_DEADLINE: u32 = 30;

pub struct CartLine {
    pub item: CartItem,
    /// Disabled once quantity reaches the product's stock.
    pub can_increment: bool,
    /// Disabled at quantity 1; removal is its own affordance.
    pub can_decrement: bool,
}

pub struct CartView {
    pub lines: Vec<CartLine>,
    /// Server-computed total, taken verbatim.
    pub total: Decimal,
    pub acting_customer: Option<User>,
    pub error: Option<String>,
}

pub struct CartPage<'a> {
    app: &'a App,
}

impl<'a> CartPage<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }

    pub async fn load(&self) -> Result<PageFlow<CartView>> {
        if let Err(redirect) = self.app.guard(Route::Cart) {
            return Ok(PageFlow::Redirect(redirect));
        }
        self.app.cart().refetch().await?;
        Ok(PageFlow::Page(self.view()))
    }

    /// Current snapshot without a refetch, for re-rendering after mutations.
    pub fn view(&self) -> CartView {
        let snapshot = self.app.cart().snapshot();
        CartView {
            lines: snapshot
                .items
                .into_iter()
                .map(|item| CartLine {
                    can_increment: item.quantity < item.product.stock,
                    can_decrement: item.quantity > 1,
                    item,
                })
                .collect(),
            total: snapshot.total,
            acting_customer: self.app.customers().selected(),
            error: snapshot.error,
        }
    }

    /// Customers a staff member may act for: managers see every active
    /// customer, employees only their assigned ones.
    pub async fn selectable_customers(&self) -> Result<Vec<User>> {
        let user = super::require_staff(self.app)?;
        match user.role {
            Role::Manager => self.app.api().get_customers().await,
            Role::Employee => {
                let assignments = self.app.api().employee_customers(user.id).await?;
                Ok(assignments
                    .into_iter()
                    .map(|assignment| assignment.customer)
                    .collect())
            }
            Role::Customer => unreachable!("require_staff filtered customers"),
        }
    }

    /// Selecting a customer rescopes the cart immediately; the selection and
    /// the cart's acting id move together.
    pub async fn select_customer(&self, customer: User) -> Result<()> {
        super::require_staff(self.app)?;
        if customer.role != Role::Customer {
            return Err(Error::validation(
                "customer",
                "Orders can only be placed on behalf of customers",
            ));
        }
        let customer_id = customer.id;
        self.app.customers().select(customer);
        self.app.cart().set_acting_user(Some(customer_id)).await
    }

    pub async fn clear_customer(&self) -> Result<()> {
        self.app.customers().clear();
        self.app.cart().set_acting_user(None).await
    }

    pub async fn increment(&self, product_id: i64) -> Result<()> {
        let item = self.find_item(product_id)?;
        if item.quantity >= item.product.stock {
            return Err(Error::validation(
                "quantity",
                "Requested quantity exceeds available stock",
            ));
        }
        self.app
            .cart()
            .update_quantity(product_id, item.quantity + 1)
            .await
    }

    pub async fn decrement(&self, product_id: i64) -> Result<()> {
        let item = self.find_item(product_id)?;
        if item.quantity <= 1 {
            return Err(Error::validation(
                "quantity",
                "Quantity cannot go below one; remove the item instead",
            ));
        }
        self.app
            .cart()
            .update_quantity(product_id, item.quantity - 1)
            .await
    }

    pub async fn remove(&self, product_id: i64) -> Result<()> {
        self.app.cart().remove(product_id).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.app.cart().clear().await
    }

    /// Creates the order from the current cart. Staff must have selected a
    /// customer and pass the geolocation gate; the captured location rides on
    /// the order payload for staff-created orders only.
    pub async fn checkout(&self, shipping_address: &str, payment_deadline: u32) -> Result<Order> {
        let user = match self.app.auth().current_user() {
            Some(user) => user,
            None => return Err(Error::Unauthorized("not logged in".to_string())),
        };

        let snapshot = self.app.cart().snapshot();
        validate_checkout(shipping_address, payment_deadline, &snapshot.items)?;

        let mut request = CreateOrderRequest {
            shipping_address: shipping_address.trim().to_string(),
            payment_deadline,
            items: snapshot
                .items
                .iter()
                .map(|item| CheckoutItem {
                    product_id: item.product.id,
                    quantity: item.quantity,
                })
                .collect(),
            user_id: None,
            location_state: None,
            location_display_name: None,
            location_latitude: None,
            location_longitude: None,
        };

        if user.role.is_staff() {
            let customer_id = self.app.customers().selected_id().ok_or_else(|| {
                Error::validation("customer", "Select a customer before checking out")
            })?;
            let location = self.app.location().ensure_granted().await?;
            request.user_id = Some(customer_id);
            request.location_state = Some(location.state);
            request.location_display_name = Some(location.display_name);
            request.location_latitude = Some(location.latitude);
            request.location_longitude = Some(location.longitude);
        }

        let order = self.app.api().create_order(&request).await?;
        if let Err(error) = self.app.cart().clear().await {
            warn!(error = %error, order_id = order.id, "cart clear after checkout failed");
        }
        Ok(order)
    }

    fn find_item(&self, product_id: i64) -> Result<CartItem> {
        self.app
            .cart()
            .snapshot()
            .items
            .into_iter()
            .find(|item| item.product.id == product_id)
            .ok_or_else(|| Error::NotFound(format!("product {product_id} is not in the cart")))
    }
}

fn validate_checkout(shipping_address: &str, payment_deadline: u32, items: &[CartItem]) -> Result<()> {
    let mut errors = FieldErrors::new();
    if shipping_address.trim().is_empty() {
        errors.push("shipping_address", "Shipping address is required");
    }
    if !(MIN_PAYMENT_DEADLINE..=MAX_PAYMENT_DEADLINE).contains(&payment_deadline) {
        errors.push(
            "payment_deadline",
            format!(
                "Payment deadline must be between {MIN_PAYMENT_DEADLINE} and {MAX_PAYMENT_DEADLINE} days"
            ),
        );
    }
    if items.is_empty() {
        errors.push("items", "Cart is empty");
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors))
    }
}
