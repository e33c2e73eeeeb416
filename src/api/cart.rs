//! Shopping cart endpoints.
//!
//! Every operation accepts an optional acting-user id for staff working on
//! behalf of a customer. Mutations return nothing useful on purpose: the
//! cart context refetches after each one and trusts the server's arithmetic.

use serde::Serialize;

use super::ApiClient;
use crate::error::Result;
use crate::http::session::RequestSpec;
use crate::model::Cart;

#[derive(Debug, Serialize)]
struct CartItemBody {
    product_id: i64,
    quantity: u32,
}

#[derive(Debug, Serialize)]
struct CartProductBody {
    product_id: i64,
}

fn scoped(spec: RequestSpec, user_id: Option<i64>) -> RequestSpec {
    spec.query_opt("user_id", user_id)
}

impl ApiClient {
    pub async fn get_cart(&self, user_id: Option<i64>) -> Result<Cart> {
        self.session()
            .send_json(scoped(RequestSpec::get("/shopping-cart/"), user_id))
            .await
    }

    pub async fn add_to_cart(
        &self,
        product_id: i64,
        quantity: u32,
        user_id: Option<i64>,
    ) -> Result<()> {
        let body = CartItemBody {
            product_id,
            quantity,
        };
        self.session()
            .send_unit(scoped(
                RequestSpec::post("/shopping-cart/add_item/").json(&body)?,
                user_id,
            ))
            .await
    }

    pub async fn update_cart_item(
        &self,
        product_id: i64,
        quantity: u32,
        user_id: Option<i64>,
    ) -> Result<()> {
        let body = CartItemBody {
            product_id,
            quantity,
        };
        self.session()
            .send_unit(scoped(
                RequestSpec::post("/shopping-cart/update_item/").json(&body)?,
                user_id,
            ))
            .await
    }

    pub async fn remove_from_cart(&self, product_id: i64, user_id: Option<i64>) -> Result<()> {
        let body = CartProductBody { product_id };
        self.session()
            .send_unit(scoped(
                RequestSpec::post("/shopping-cart/remove_item/").json(&body)?,
                user_id,
            ))
            .await
    }

    pub async fn clear_cart(&self, user_id: Option<i64>) -> Result<()> {
        self.session()
            .send_unit(scoped(RequestSpec::post("/shopping-cart/clear/"), user_id))
            .await
    }
}
