//! Wire types for the storefront API.
//!
//! Shapes mirror the backend's serializers exactly; everything arriving over
//! the wire is validated into these structs at the API-client boundary.
//! Money is [`rust_decimal::Decimal`] (the backend emits decimal strings) and
//! is never recomputed client-side where the server reports a total.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Role {
    Customer,
    Employee,
    Manager,
}

impl Role {
    /// Staff roles order on behalf of customers and must pass the
    /// geolocation gate before checkout.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Employee | Role::Manager)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum UserStatus {
    Pending,
    Active,
    Blocked,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OrderStatus {
    Pending,
    Accepted,
    Rejected,
}

impl OrderStatus {
    /// Accepted and rejected orders reject further edits.
    pub fn is_terminal(self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

/// A user as the backend serializes it. The slim auth endpoints omit the
/// management fields, so everything past `role` is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub status: Option<UserStatus>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub registration_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: u32,
    /// Absolute URL of an uploaded image, if any.
    #[serde(default)]
    pub image: Option<String>,
    /// External image URL alternative.
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl Product {
    /// Uploaded image wins over the external URL, matching the backend's
    /// serializer precedence.
    pub fn display_image(&self) -> Option<&str> {
        self.image.as_deref().or(self.image_url.as_deref())
    }

    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: i64,
    pub product: Product,
    pub quantity: u32,
    /// Server-computed line total (price x quantity at current price).
    pub total: Decimal,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub id: i64,
    pub username: String,
    pub items: Vec<CartItem>,
    /// Server-computed cart total; the client never sums items itself.
    pub total: Decimal,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Staff-only projection of the order owner embedded in order payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUserDetails {
    pub id: i64,
    pub username: String,
    pub role: Role,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub product_detail: Product,
    pub quantity: u32,
    /// Price snapshot taken at order time; later catalog edits do not move it.
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    /// Owning user's id.
    pub user: i64,
    pub username: String,
    /// Present only when the viewer is staff.
    #[serde(default)]
    pub user_details: Option<OrderUserDetails>,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItem>,
    /// Days allowed for payment, 1 to 30.
    pub payment_deadline: u32,
    /// Server-derived countdown; negative means overdue. Formatted, never
    /// recomputed, on this side.
    pub days_remaining: i64,
    #[serde(default)]
    pub created_by_role: Option<Role>,
    #[serde(default)]
    pub location_state: Option<String>,
    #[serde(default)]
    pub location_display_name: Option<String>,
    #[serde(default)]
    pub location_latitude: Option<Decimal>,
    #[serde(default)]
    pub location_longitude: Option<Decimal>,
}

impl Order {
    pub fn is_overdue(&self) -> bool {
        self.days_remaining < 0
    }

    pub fn has_location(&self) -> bool {
        self.location_state.is_some()
            && self.location_latitude.is_some()
            && self.location_longitude.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerAssignment {
    pub id: i64,
    pub employee: i64,
    pub customer: User,
    #[serde(default)]
    pub assigned_by: Option<i64>,
    #[serde(default)]
    pub assigned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStats {
    pub total_products: u64,
    pub low_stock_products: u64,
    pub out_of_stock: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_users: u64,
    pub pending_approval: u64,
}

// ---- request payloads ----

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub user: User,
}

/// Registration payload; the backend checks `password == password2` and
/// creates the account in `PENDING` status.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub password2: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    pub detail: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutItem {
    pub product_id: i64,
    pub quantity: u32,
}

/// Order creation payload. Location fields ride along only when the creator
/// is staff; `user_id` only when ordering on behalf of a customer.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    pub shipping_address: String,
    pub payment_deadline: u32,
    pub items: Vec<CheckoutItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_longitude: Option<f64>,
}

/// Item/address/deadline replacement for a pending order.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOrderRequest {
    pub shipping_address: String,
    pub payment_deadline: u32,
    pub items: Vec<CheckoutItem>,
}

/// Profile fields a manager may edit in place.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordResetResponse {
    pub message: String,
    pub temp_password: String,
}

/// Response given when a product is soft-deactivated.
#[derive(Debug, Clone, Deserialize)]
pub struct DetailResponse {
    pub detail: String,
}
