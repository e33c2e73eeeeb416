//! Product catalog page: browsing for everyone, CRUD for managers.

use crate::api::{ProductFilter, ProductPayload};
use crate::app::{App, PageFlow, Route};
use crate::error::{Error, FieldErrors, Result};
use crate::model::{Product, Role};
use rust_decimal::Decimal;

pub struct ProductCard {
    pub product: Product,
    pub can_add_to_cart: bool,
}

pub struct ProductsView {
    pub products: Vec<ProductCard>,
    /// Shows the create/edit/deactivate affordances.
    pub can_manage: bool,
}

pub struct ProductsPage<'a> {
    app: &'a App,
}

impl<'a> ProductsPage<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }

    pub async fn load(&self, filter: &ProductFilter) -> Result<PageFlow<ProductsView>> {
        let user = match self.app.guard(Route::Products) {
            Ok(user) => user,
            Err(redirect) => return Ok(PageFlow::Redirect(redirect)),
        };
        let products = self.app.api().list_products(filter).await?;
        Ok(PageFlow::Page(ProductsView {
            can_manage: user.role == Role::Manager,
            products: products
                .into_iter()
                .map(|product| ProductCard {
                    can_add_to_cart: product.is_active && product.in_stock(),
                    product,
                })
                .collect(),
        }))
    }

    pub async fn create(&self, payload: &ProductPayload) -> Result<Product> {
        super::require_role(self.app, Role::Manager)?;
        validate_payload(payload)?;
        self.app.api().create_product(payload).await
    }

    pub async fn update(&self, id: i64, payload: &ProductPayload) -> Result<Product> {
        super::require_role(self.app, Role::Manager)?;
        validate_payload(payload)?;
        self.app.api().update_product(id, payload).await
    }

    pub async fn deactivate(&self, id: i64) -> Result<String> {
        super::require_role(self.app, Role::Manager)?;
        let response = self.app.api().delete_product(id).await?;
        Ok(response.detail)
    }

    pub async fn set_stock(&self, id: i64, stock: u32) -> Result<Product> {
        super::require_role(self.app, Role::Manager)?;
        self.app.api().update_stock(id, stock).await
    }
}

fn validate_payload(payload: &ProductPayload) -> Result<()> {
    let mut errors = FieldErrors::new();
    if payload.name.trim().is_empty() {
        errors.push("name", "Product name is required");
    }
    if payload.price <= Decimal::ZERO {
        errors.push("price", "Price must be greater than zero");
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors))
    }
}
