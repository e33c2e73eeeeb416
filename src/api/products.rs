//! Product catalog endpoints, including the manager-only mutations.

use rust_decimal::Decimal;
use serde::Serialize;

use super::ApiClient;
use crate::error::Result;
use crate::http::session::{FormField, RequestSpec};
use crate::model::{DetailResponse, Product, ProductStats};

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock: Option<bool>,
    /// Backend ordering key, e.g. `price` or `-created_at`.
    pub ordering: Option<String>,
}

impl ProductFilter {
    fn apply(&self, spec: RequestSpec) -> RequestSpec {
        spec.query_opt("search", self.search.clone())
            .query_opt("min_price", self.min_price)
            .query_opt("max_price", self.max_price)
            .query_opt("in_stock", self.in_stock)
            .query_opt("ordering", self.ordering.clone())
    }
}

/// Image file attached to a product create/update; forces the payload into
/// multipart form encoding.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductPayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip)]
    pub image: Option<ImageFile>,
}

impl ProductPayload {
    /// Multipart rendering for payloads carrying a file.
    fn form_fields(&self) -> Vec<FormField> {
        let mut fields = vec![
            FormField::text("name", self.name.clone()),
            FormField::text("price", self.price.to_string()),
            FormField::text("stock", self.stock.to_string()),
        ];
        if let Some(description) = &self.description {
            fields.push(FormField::text("description", description.clone()));
        }
        if let Some(image_url) = &self.image_url {
            fields.push(FormField::text("image_url", image_url.clone()));
        }
        if let Some(image) = &self.image {
            fields.push(FormField::file(
                "image",
                image.file_name.clone(),
                image.content_type.clone(),
                image.bytes.clone(),
            ));
        }
        fields
    }

    fn attach(&self, spec: RequestSpec) -> Result<RequestSpec> {
        if self.image.is_some() {
            Ok(spec.multipart(self.form_fields()))
        } else {
            spec.json(self)
        }
    }
}

impl ApiClient {
    pub async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        self.session()
            .send_json(filter.apply(RequestSpec::get("/products/")))
            .await
    }

    pub async fn get_product(&self, id: i64) -> Result<Product> {
        self.session()
            .send_json(RequestSpec::get(format!("/products/{id}/")))
            .await
    }

    pub async fn create_product(&self, payload: &ProductPayload) -> Result<Product> {
        let spec = payload.attach(RequestSpec::post("/products/"))?;
        self.session().send_json(spec).await
    }

    pub async fn update_product(&self, id: i64, payload: &ProductPayload) -> Result<Product> {
        let spec = payload.attach(RequestSpec::put(format!("/products/{id}/")))?;
        self.session().send_json(spec).await
    }

    /// Soft-deactivates: the product drops out of listings but keeps its
    /// history on existing orders.
    pub async fn delete_product(&self, id: i64) -> Result<DetailResponse> {
        self.session()
            .send_json(RequestSpec::delete(format!("/products/{id}/")))
            .await
    }

    pub async fn update_stock(&self, id: i64, stock: u32) -> Result<Product> {
        self.session()
            .send_json(
                RequestSpec::post(format!("/products/{id}/update_stock/"))
                    .json(&serde_json::json!({ "stock": stock }))?,
            )
            .await
    }

    pub async fn low_stock_products(&self) -> Result<Vec<Product>> {
        self.session()
            .send_json(RequestSpec::get("/products/low_stock/"))
            .await
    }

    pub async fn product_stats(&self) -> Result<ProductStats> {
        self.session()
            .send_json(RequestSpec::get("/products/stats/"))
            .await
    }
}
