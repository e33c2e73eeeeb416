//! In-process storefront backend for integration tests.
//!
//! Speaks the same wire contract as the real API: session cookie auth, the
//! double-submit anti-forgery token, DRF-style error bodies, and the
//! resource routes the client calls. Every request is recorded so tests can
//! assert on what actually went over the wire, and a forced-403 counter
//! makes the session-recovery path scriptable.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use orderdesk::model::{
    Cart, CartItem, CustomerAssignment, Order, OrderItem, OrderStatus, OrderUserDetails, Product,
    Role, User, UserStatus,
};

pub const MEG: i64 = 1;
pub const EARL: i64 = 2;
pub const BOB: i64 = 3;
pub const SPRAYER: i64 = 10;

pub const PASSWORD: &str = "pw12345678";

const LOW_STOCK_THRESHOLD: u32 = 5;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub csrf_header: Option<String>,
    pub csrf_cookie: Option<String>,
}

struct UserRecord {
    user: User,
    password: String,
}

struct AssignmentRecord {
    id: i64,
    employee: i64,
    customer: i64,
}

pub struct TestBackend {
    users: Mutex<BTreeMap<i64, UserRecord>>,
    sessions: Mutex<HashMap<String, i64>>,
    products: Mutex<BTreeMap<i64, Product>>,
    carts: Mutex<HashMap<i64, Vec<(i64, u32)>>>,
    orders: Mutex<BTreeMap<i64, Order>>,
    assignments: Mutex<Vec<AssignmentRecord>>,
    next_id: AtomicI64,
    csrf_issued: AtomicUsize,
    session_probes: AtomicUsize,
    forced_403: AtomicUsize,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl TestBackend {
    /// Seeds one user per role plus a small-stock product.
    pub fn seeded() -> Arc<Self> {
        let backend = Self {
            users: Mutex::new(BTreeMap::new()),
            sessions: Mutex::new(HashMap::new()),
            products: Mutex::new(BTreeMap::new()),
            carts: Mutex::new(HashMap::new()),
            orders: Mutex::new(BTreeMap::new()),
            assignments: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(100),
            csrf_issued: AtomicUsize::new(0),
            session_probes: AtomicUsize::new(0),
            forced_403: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        };
        backend.seed_user(MEG, "meg", Role::Manager, UserStatus::Active);
        backend.seed_user(EARL, "earl", Role::Employee, UserStatus::Active);
        backend.seed_user(BOB, "bob", Role::Customer, UserStatus::Active);
        backend.products.lock().insert(
            SPRAYER,
            product(SPRAYER, "Sprayer", Decimal::new(2550, 2), 2),
        );
        Arc::new(backend)
    }

    fn seed_user(&self, id: i64, username: &str, role: Role, status: UserStatus) {
        self.users.lock().insert(
            id,
            UserRecord {
                user: make_user(id, username, role, status),
                password: PASSWORD.to_string(),
            },
        );
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn session_probes(&self) -> usize {
        self.session_probes.load(Ordering::SeqCst)
    }

    pub fn csrf_issued(&self) -> usize {
        self.csrf_issued.load(Ordering::SeqCst)
    }

    /// The next `count` API requests (recovery endpoints excepted) answer 403.
    pub fn force_403(&self, count: usize) {
        self.forced_403.store(count, Ordering::SeqCst);
    }

    pub fn forced_403_remaining(&self) -> usize {
        self.forced_403.load(Ordering::SeqCst)
    }

    /// Server-side session invalidation, as an idle timeout would do it.
    pub fn expire_sessions(&self) {
        self.sessions.lock().clear();
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn handle(&self, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
        let path = uri.path().to_string();
        let query = uri.query().map(str::to_string);
        let cookies = parse_cookies(&headers);
        let csrf_header = headers
            .get("X-CSRFToken")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        self.requests.lock().push(RecordedRequest {
            method: method.to_string(),
            path: path.clone(),
            query: query.clone(),
            csrf_header: csrf_header.clone(),
            csrf_cookie: cookies.get("csrftoken").cloned(),
        });

        let Some(route) = path.strip_prefix("/api") else {
            return err(StatusCode::NOT_FOUND, "unknown path");
        };

        if route == "/auth/csrf/" {
            let n = self.csrf_issued.fetch_add(1, Ordering::SeqCst) + 1;
            let mut response = StatusCode::NO_CONTENT.into_response();
            response.headers_mut().append(
                header::SET_COOKIE,
                format!("csrftoken=tok-{n}; Path=/").parse().unwrap(),
            );
            return response;
        }

        let session_user = cookies
            .get("sessionid")
            .and_then(|sid| self.sessions.lock().get(sid).copied())
            .and_then(|id| self.users.lock().get(&id).map(|record| record.user.clone()));

        if route == "/auth/session/" {
            self.session_probes.fetch_add(1, Ordering::SeqCst);
            return match session_user {
                Some(_) => ok(&json!({"detail": "ok"})),
                None => err(StatusCode::UNAUTHORIZED, "Session expired"),
            };
        }

        // Scriptable failure injection for the recovery tests. Atomic
        // decrement so concurrent requests each consume exactly one slot.
        if self
            .forced_403
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return err(StatusCode::FORBIDDEN, "CSRF Failed: token mismatch.");
        }

        // Double-submit check on every mutation.
        if method != Method::GET {
            let cookie = cookies.get("csrftoken").map(String::as_str);
            if cookie.is_none() || csrf_header.as_deref() != cookie {
                return err(StatusCode::FORBIDDEN, "CSRF token missing or incorrect.");
            }
        }

        if method == Method::POST && route == "/auth/login/" {
            return self.login(&body);
        }
        if method == Method::POST && route == "/auth/register/" {
            return self.register(&body);
        }

        let Some(user) = session_user else {
            return err(
                StatusCode::UNAUTHORIZED,
                "Authentication credentials were not provided.",
            );
        };

        if method == Method::POST && route == "/auth/logout/" {
            if let Some(sid) = cookies.get("sessionid") {
                self.sessions.lock().remove(sid);
            }
            return ok(&json!({"detail": "ok"}));
        }

        let segments: Vec<&str> = route
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        self.route(&method, &segments, &query, &body, &user)
    }

    fn route(
        &self,
        method: &Method,
        segments: &[&str],
        query: &Option<String>,
        body: &Bytes,
        user: &User,
    ) -> Response {
        match (method, segments) {
            (&Method::GET, ["users", "me"]) => ok(user),
            (&Method::GET, ["users", "get_customers"]) => ok(&self.active_customers()),
            (&Method::GET, ["users", "stats"]) => {
                let users = self.users.lock();
                ok(&json!({
                    "total_users": users.len(),
                    "pending_approval": users
                        .values()
                        .filter(|r| r.user.status == Some(UserStatus::Pending))
                        .count(),
                }))
            }
            (&Method::GET, ["users"]) => {
                let role = param(query, "role").and_then(|r| r.parse::<Role>().ok());
                let users = self.users.lock();
                let listed: Vec<User> = users
                    .values()
                    .map(|record| record.user.clone())
                    .filter(|u| role.is_none_or(|r| u.role == r))
                    .collect();
                ok(&listed)
            }

            (&Method::GET, ["products", "low_stock"]) => {
                let products = self.products.lock();
                let low: Vec<Product> = products
                    .values()
                    .filter(|p| p.is_active && p.stock < LOW_STOCK_THRESHOLD)
                    .cloned()
                    .collect();
                ok(&low)
            }
            (&Method::GET, ["products", "stats"]) => {
                let products = self.products.lock();
                let active: Vec<&Product> = products.values().filter(|p| p.is_active).collect();
                ok(&json!({
                    "total_products": active.len(),
                    "low_stock_products": active
                        .iter()
                        .filter(|p| p.stock > 0 && p.stock < LOW_STOCK_THRESHOLD)
                        .count(),
                    "out_of_stock": active.iter().filter(|p| p.stock == 0).count(),
                }))
            }
            (&Method::GET, ["products"]) => {
                let search = param(query, "search").map(|s| s.to_lowercase());
                let products = self.products.lock();
                let listed: Vec<Product> = products
                    .values()
                    .filter(|p| p.is_active)
                    .filter(|p| {
                        search
                            .as_deref()
                            .is_none_or(|needle| p.name.to_lowercase().contains(needle))
                    })
                    .cloned()
                    .collect();
                ok(&listed)
            }
            (&Method::POST, ["products"]) => {
                if let Some(denied) = require_manager(user) {
                    return denied;
                }
                let payload: ProductBody = match parse(body) {
                    Ok(payload) => payload,
                    Err(response) => return response,
                };
                let id = self.next_id();
                let created = Product {
                    id,
                    name: payload.name,
                    description: payload.description,
                    price: payload.price,
                    stock: payload.stock,
                    image: None,
                    image_url: payload.image_url,
                    is_active: true,
                    created_at: Some(Utc::now()),
                    updated_at: None,
                };
                self.products.lock().insert(id, created.clone());
                created_response(&created)
            }
            (&Method::GET, ["products", raw]) => self.with_product(raw, |product| ok(product)),
            (&Method::PUT, ["products", raw]) => {
                if let Some(denied) = require_manager(user) {
                    return denied;
                }
                let payload: ProductBody = match parse(body) {
                    Ok(payload) => payload,
                    Err(response) => return response,
                };
                self.with_product_mut(raw, |product| {
                    product.name = payload.name.clone();
                    product.description = payload.description.clone();
                    product.price = payload.price;
                    product.stock = payload.stock;
                    product.image_url = payload.image_url.clone();
                    product.updated_at = Some(Utc::now());
                    ok(product)
                })
            }
            (&Method::DELETE, ["products", raw]) => {
                if let Some(denied) = require_manager(user) {
                    return denied;
                }
                self.with_product_mut(raw, |product| {
                    product.is_active = false;
                    ok(&json!({"detail": "Product deactivated"}))
                })
            }
            (&Method::POST, ["products", raw, "update_stock"]) => {
                if let Some(denied) = require_manager(user) {
                    return denied;
                }
                let payload: StockBody = match parse(body) {
                    Ok(payload) => payload,
                    Err(response) => return response,
                };
                self.with_product_mut(raw, |product| {
                    product.stock = payload.stock;
                    ok(product)
                })
            }

            (&Method::GET, ["shopping-cart"]) => match self.cart_scope(user, query) {
                Ok(scope) => ok(&self.render_cart(scope)),
                Err(response) => response,
            },
            (&Method::POST, ["shopping-cart", verb]) => self.cart_mutation(user, query, verb, body),

            (&Method::GET, ["orders"]) => {
                let status = param(query, "status").and_then(|s| s.parse::<OrderStatus>().ok());
                let orders = self.orders.lock();
                let listed: Vec<Order> = orders
                    .values()
                    .filter(|order| user.role.is_staff() || order.user == user.id)
                    .filter(|order| status.is_none_or(|s| order.status == s))
                    .cloned()
                    .collect();
                ok(&listed)
            }
            (&Method::POST, ["orders"]) => self.create_order(user, body),
            (&Method::GET, ["orders", raw]) => self.with_order(raw, |order| ok(order)),
            (&Method::PATCH, ["orders", raw]) => {
                if let Some(denied) = require_manager(user) {
                    return denied;
                }
                let payload: StatusPatch<OrderStatus> = match parse(body) {
                    Ok(payload) => payload,
                    Err(response) => return response,
                };
                self.with_order_mut(raw, |order| {
                    order.status = payload.status;
                    ok(order)
                })
            }
            (&Method::PATCH, ["orders", raw, "update_order"]) => {
                if let Some(denied) = require_manager(user) {
                    return denied;
                }
                self.update_order(raw, body)
            }
            (&Method::POST, ["orders", raw, verb @ ("accept" | "reject")]) => {
                if let Some(denied) = require_manager(user) {
                    return denied;
                }
                let next = if *verb == "accept" {
                    OrderStatus::Accepted
                } else {
                    OrderStatus::Rejected
                };
                self.with_order_mut(raw, |order| {
                    if order.status != OrderStatus::Pending {
                        return err(
                            StatusCode::BAD_REQUEST,
                            "Only pending orders can change status",
                        );
                    }
                    order.status = next;
                    order.updated_at = Some(Utc::now());
                    ok(order)
                })
            }

            (_, ["admin", "manage", ..]) => {
                // Staff read their own assignment list; everything else under
                // /admin/manage/ stays manager-only.
                let own_assignments = *method == Method::GET
                    && segments[2..] == ["get_employee_customers"]
                    && user.role != Role::Customer
                    && param(query, "employee_id").and_then(|v| v.parse::<i64>().ok())
                        == Some(user.id);
                if !own_assignments {
                    if let Some(denied) = require_manager(user) {
                        return denied;
                    }
                }
                self.admin(method, &segments[2..], query, body)
            }

            _ => err(StatusCode::NOT_FOUND, "unknown path"),
        }
    }

    fn admin(
        &self,
        method: &Method,
        segments: &[&str],
        query: &Option<String>,
        body: &Bytes,
    ) -> Response {
        match (method, segments) {
            (&Method::GET, []) => {
                let role = param(query, "role").and_then(|r| r.parse::<Role>().ok());
                let status = param(query, "status").and_then(|s| s.parse::<UserStatus>().ok());
                let search = param(query, "search").map(|s| s.to_lowercase());
                let users = self.users.lock();
                let listed: Vec<User> = users
                    .values()
                    .map(|record| record.user.clone())
                    .filter(|u| role.is_none_or(|r| u.role == r))
                    .filter(|u| status.is_none_or(|s| u.status == Some(s)))
                    .filter(|u| {
                        search
                            .as_deref()
                            .is_none_or(|needle| u.username.to_lowercase().contains(needle))
                    })
                    .collect();
                ok(&listed)
            }
            (&Method::PATCH, [raw, "update_status"]) => {
                let payload: StatusPatch<UserStatus> = match parse(body) {
                    Ok(payload) => payload,
                    Err(response) => return response,
                };
                self.with_user_mut(raw, |record| {
                    record.user.status = Some(payload.status);
                    record.user.is_active = Some(payload.status == UserStatus::Active);
                    ok(&record.user)
                })
            }
            (&Method::PATCH, [raw, "update_role"]) => {
                let payload: RolePatch = match parse(body) {
                    Ok(payload) => payload,
                    Err(response) => return response,
                };
                self.with_user_mut(raw, |record| {
                    record.user.role = payload.role;
                    ok(&record.user)
                })
            }
            (&Method::POST, [raw, "reset_password"]) => self.with_user_mut(raw, |record| {
                let temp = format!("temp-{}-pass", record.user.id);
                record.password = temp.clone();
                ok(&json!({"message": "Password has been reset", "temp_password": temp}))
            }),
            (&Method::PATCH, [raw, "edit_user"]) => {
                let payload: ProfileBody = match parse(body) {
                    Ok(payload) => payload,
                    Err(response) => return response,
                };
                self.with_user_mut(raw, |record| {
                    if let Some(username) = payload.username.clone() {
                        record.user.username = username;
                    }
                    if let Some(email) = payload.email.clone() {
                        record.user.email = Some(email);
                    }
                    if let Some(phone) = payload.phone.clone() {
                        record.user.phone = Some(phone);
                    }
                    if let Some(address) = payload.address.clone() {
                        record.user.address = Some(address);
                    }
                    record.user.last_modified = Some(Utc::now());
                    ok(&record.user)
                })
            }
            (&Method::POST, ["assign_customers"]) => {
                let payload: AssignBody = match parse(body) {
                    Ok(payload) => payload,
                    Err(response) => return response,
                };
                let mut assignments = self.assignments.lock();
                for customer in payload.customer_ids {
                    let exists = assignments
                        .iter()
                        .any(|a| a.employee == payload.employee_id && a.customer == customer);
                    if !exists {
                        assignments.push(AssignmentRecord {
                            id: self.next_id(),
                            employee: payload.employee_id,
                            customer,
                        });
                    }
                }
                ok(&json!({"detail": "Customers assigned"}))
            }
            (&Method::GET, ["get_employee_customers"]) => {
                let Some(employee) = param(query, "employee_id").and_then(|v| v.parse::<i64>().ok())
                else {
                    return err(StatusCode::BAD_REQUEST, "employee_id is required");
                };
                let users = self.users.lock();
                let assignments = self.assignments.lock();
                let listed: Vec<CustomerAssignment> = assignments
                    .iter()
                    .filter(|a| a.employee == employee)
                    .filter_map(|a| {
                        users.get(&a.customer).map(|record| CustomerAssignment {
                            id: a.id,
                            employee: a.employee,
                            customer: record.user.clone(),
                            assigned_by: Some(MEG),
                            assigned_at: Some(Utc::now()),
                        })
                    })
                    .collect();
                ok(&listed)
            }
            (&Method::GET, ["unassigned_customers"]) => {
                let assignments = self.assignments.lock();
                let taken: Vec<i64> = assignments.iter().map(|a| a.customer).collect();
                let free: Vec<User> = self
                    .active_customers()
                    .into_iter()
                    .filter(|u| !taken.contains(&u.id))
                    .collect();
                ok(&free)
            }
            (&Method::POST, ["unassign_customer"]) => {
                let payload: UnassignBody = match parse(body) {
                    Ok(payload) => payload,
                    Err(response) => return response,
                };
                let mut assignments = self.assignments.lock();
                let before = assignments.len();
                assignments
                    .retain(|a| !(a.employee == payload.employee_id && a.customer == payload.customer_id));
                if assignments.len() == before {
                    return err(StatusCode::NOT_FOUND, "Assignment not found");
                }
                ok(&json!({"detail": "Customer unassigned"}))
            }
            _ => err(StatusCode::NOT_FOUND, "unknown path"),
        }
    }

    fn login(&self, body: &Bytes) -> Response {
        let creds: Credentials = match parse(body) {
            Ok(creds) => creds,
            Err(response) => return response,
        };
        let users = self.users.lock();
        let Some(record) = users.values().find(|r| r.user.username == creds.username) else {
            return err(StatusCode::UNAUTHORIZED, "Invalid credentials");
        };
        if record.password != creds.password {
            return err(StatusCode::UNAUTHORIZED, "Invalid credentials");
        }
        match record.user.status {
            Some(UserStatus::Pending) => {
                return err(
                    StatusCode::FORBIDDEN,
                    "Your account has not been approved yet. Please wait for admin approval.",
                );
            }
            Some(UserStatus::Blocked) => {
                return err(
                    StatusCode::FORBIDDEN,
                    "Your account has been blocked. Contact the administrator.",
                );
            }
            _ => {}
        }
        let user = record.user.clone();
        drop(users);

        let sid = format!("sess-{}", self.next_id());
        self.sessions.lock().insert(sid.clone(), user.id);
        let mut response = ok(&json!({"user": user}));
        response.headers_mut().append(
            header::SET_COOKIE,
            format!("sessionid={sid}; Path=/").parse().unwrap(),
        );
        response
    }

    fn register(&self, body: &Bytes) -> Response {
        let payload: RegisterBody = match parse(body) {
            Ok(payload) => payload,
            Err(response) => return response,
        };
        let mut users = self.users.lock();
        if users
            .values()
            .any(|record| record.user.username == payload.username)
        {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"username": ["A user with that username already exists."]})),
            )
                .into_response();
        }
        if payload.password != payload.password2 {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"password": ["Passwords do not match"]})),
            )
                .into_response();
        }
        let id = self.next_id();
        let mut user = make_user(id, &payload.username, payload.role, UserStatus::Pending);
        user.email = payload.email;
        user.phone = payload.phone;
        user.address = payload.address;
        users.insert(
            id,
            UserRecord {
                user: user.clone(),
                password: payload.password,
            },
        );
        (
            StatusCode::CREATED,
            Json(json!({
                "detail": "Registration successful. Await admin approval before logging in.",
                "user": user,
            })),
        )
            .into_response()
    }

    fn cart_scope(&self, user: &User, query: &Option<String>) -> Result<i64, Response> {
        match param(query, "user_id").and_then(|v| v.parse::<i64>().ok()) {
            Some(target) if target != user.id => {
                if !user.role.is_staff() {
                    return Err(err(
                        StatusCode::FORBIDDEN,
                        "Only staff may act on another user's cart",
                    ));
                }
                Ok(target)
            }
            Some(_) | None => Ok(user.id),
        }
    }

    fn render_cart(&self, user_id: i64) -> Cart {
        let products = self.products.lock();
        let carts = self.carts.lock();
        let username = self
            .users
            .lock()
            .get(&user_id)
            .map(|record| record.user.username.clone())
            .unwrap_or_default();
        let items: Vec<CartItem> = carts
            .get(&user_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(|(product_id, quantity)| {
                products.get(product_id).map(|product| CartItem {
                    id: *product_id,
                    product: product.clone(),
                    quantity: *quantity,
                    total: product.price * Decimal::from(*quantity),
                    created_at: None,
                    updated_at: None,
                })
            })
            .collect();
        let total = items.iter().map(|item| item.total).sum();
        Cart {
            id: user_id,
            username,
            items,
            total,
            created_at: None,
            updated_at: None,
        }
    }

    fn cart_mutation(
        &self,
        user: &User,
        query: &Option<String>,
        verb: &str,
        body: &Bytes,
    ) -> Response {
        let scope = match self.cart_scope(user, query) {
            Ok(scope) => scope,
            Err(response) => return response,
        };
        match verb {
            "clear" => {
                self.carts.lock().remove(&scope);
                ok(&json!({"detail": "Cart cleared"}))
            }
            "add_item" | "update_item" | "remove_item" => {
                let payload: CartLineBody = match parse(body) {
                    Ok(payload) => payload,
                    Err(response) => return response,
                };
                let stock = match self.products.lock().get(&payload.product_id) {
                    Some(product) if product.is_active => product.stock,
                    _ => return err(StatusCode::NOT_FOUND, "Product not found"),
                };
                let mut carts = self.carts.lock();
                let lines = carts.entry(scope).or_default();
                match verb {
                    "add_item" => {
                        let current = lines
                            .iter()
                            .find(|(id, _)| *id == payload.product_id)
                            .map(|(_, q)| *q)
                            .unwrap_or(0);
                        let next = current + payload.quantity;
                        if next > stock {
                            return err(StatusCode::BAD_REQUEST, "Not enough stock");
                        }
                        lines.retain(|(id, _)| *id != payload.product_id);
                        lines.push((payload.product_id, next));
                    }
                    "update_item" => {
                        if payload.quantity > stock {
                            return err(StatusCode::BAD_REQUEST, "Not enough stock");
                        }
                        match lines.iter_mut().find(|(id, _)| *id == payload.product_id) {
                            Some(line) => line.1 = payload.quantity,
                            None => return err(StatusCode::NOT_FOUND, "Item not in cart"),
                        }
                    }
                    _ => lines.retain(|(id, _)| *id != payload.product_id),
                }
                ok(&json!({"detail": "ok"}))
            }
            _ => err(StatusCode::NOT_FOUND, "unknown path"),
        }
    }

    fn create_order(&self, creator: &User, body: &Bytes) -> Response {
        let payload: CreateOrderBody = match parse(body) {
            Ok(payload) => payload,
            Err(response) => return response,
        };
        let owner_id = match payload.user_id {
            Some(target) if target != creator.id => {
                if !creator.role.is_staff() {
                    return err(
                        StatusCode::FORBIDDEN,
                        "Only staff may order on behalf of a customer",
                    );
                }
                target
            }
            _ => creator.id,
        };
        let owner = match self.users.lock().get(&owner_id) {
            Some(record) => record.user.clone(),
            None => return err(StatusCode::NOT_FOUND, "User not found"),
        };
        if payload.items.is_empty() {
            return err(StatusCode::BAD_REQUEST, "Cart is empty");
        }

        let mut products = self.products.lock();
        let mut items = Vec::new();
        for line in &payload.items {
            let Some(product) = products.get_mut(&line.product_id) else {
                return err(StatusCode::NOT_FOUND, "Product not found");
            };
            if line.quantity > product.stock {
                return err(StatusCode::BAD_REQUEST, "Not enough stock");
            }
            product.stock -= line.quantity;
            items.push(OrderItem {
                id: self.next_id(),
                product_detail: product.clone(),
                quantity: line.quantity,
                price: product.price,
            });
        }
        drop(products);

        let total_amount = items
            .iter()
            .map(|item| item.price * Decimal::from(item.quantity))
            .sum();
        let id = self.next_id();
        let order = Order {
            id,
            user: owner.id,
            username: owner.username.clone(),
            user_details: Some(OrderUserDetails {
                id: owner.id,
                username: owner.username.clone(),
                role: owner.role,
                phone: owner.phone.clone(),
                address: owner.address.clone(),
            }),
            status: OrderStatus::Pending,
            total_amount,
            shipping_address: payload.shipping_address,
            created_at: Utc::now(),
            updated_at: None,
            items,
            payment_deadline: payload.payment_deadline,
            days_remaining: i64::from(payload.payment_deadline),
            created_by_role: Some(creator.role),
            location_state: payload.location_state,
            location_display_name: payload.location_display_name,
            location_latitude: payload.location_latitude.and_then(Decimal::from_f64),
            location_longitude: payload.location_longitude.and_then(Decimal::from_f64),
        };
        self.orders.lock().insert(id, order.clone());
        self.carts.lock().remove(&owner.id);
        created_response(&order)
    }

    fn update_order(&self, raw: &str, body: &Bytes) -> Response {
        let payload: UpdateOrderBody = match parse(body) {
            Ok(payload) => payload,
            Err(response) => return response,
        };
        let Ok(id) = raw.parse::<i64>() else {
            return err(StatusCode::NOT_FOUND, "Order not found");
        };
        let mut orders = self.orders.lock();
        let Some(order) = orders.get_mut(&id) else {
            return err(StatusCode::NOT_FOUND, "Order not found");
        };
        if order.status != OrderStatus::Pending {
            return err(StatusCode::BAD_REQUEST, "Only pending orders can be edited");
        }

        let mut products = self.products.lock();
        // Return the old reservation before applying the new one.
        for item in &order.items {
            if let Some(product) = products.get_mut(&item.product_detail.id) {
                product.stock += item.quantity;
            }
        }
        let mut items = Vec::new();
        for line in &payload.items {
            let Some(product) = products.get_mut(&line.product_id) else {
                return err(StatusCode::NOT_FOUND, "Product not found");
            };
            if line.quantity > product.stock {
                return err(StatusCode::BAD_REQUEST, "Not enough stock");
            }
            product.stock -= line.quantity;
            items.push(OrderItem {
                id: self.next_id(),
                product_detail: product.clone(),
                quantity: line.quantity,
                price: product.price,
            });
        }
        order.items = items;
        order.shipping_address = payload.shipping_address;
        order.payment_deadline = payload.payment_deadline;
        order.days_remaining = i64::from(payload.payment_deadline);
        order.total_amount = order
            .items
            .iter()
            .map(|item| item.price * Decimal::from(item.quantity))
            .sum();
        order.updated_at = Some(Utc::now());
        ok(order)
    }

    fn active_customers(&self) -> Vec<User> {
        self.users
            .lock()
            .values()
            .map(|record| record.user.clone())
            .filter(|u| u.role == Role::Customer && u.status == Some(UserStatus::Active))
            .collect()
    }

    fn with_product(&self, raw: &str, render: impl FnOnce(&Product) -> Response) -> Response {
        let Ok(id) = raw.parse::<i64>() else {
            return err(StatusCode::NOT_FOUND, "Product not found");
        };
        match self.products.lock().get(&id) {
            Some(product) => render(product),
            None => err(StatusCode::NOT_FOUND, "Product not found"),
        }
    }

    fn with_product_mut(
        &self,
        raw: &str,
        mutate: impl FnOnce(&mut Product) -> Response,
    ) -> Response {
        let Ok(id) = raw.parse::<i64>() else {
            return err(StatusCode::NOT_FOUND, "Product not found");
        };
        match self.products.lock().get_mut(&id) {
            Some(product) => mutate(product),
            None => err(StatusCode::NOT_FOUND, "Product not found"),
        }
    }

    fn with_order(&self, raw: &str, render: impl FnOnce(&Order) -> Response) -> Response {
        let Ok(id) = raw.parse::<i64>() else {
            return err(StatusCode::NOT_FOUND, "Order not found");
        };
        match self.orders.lock().get(&id) {
            Some(order) => render(order),
            None => err(StatusCode::NOT_FOUND, "Order not found"),
        }
    }

    fn with_order_mut(&self, raw: &str, mutate: impl FnOnce(&mut Order) -> Response) -> Response {
        let Ok(id) = raw.parse::<i64>() else {
            return err(StatusCode::NOT_FOUND, "Order not found");
        };
        match self.orders.lock().get_mut(&id) {
            Some(order) => mutate(order),
            None => err(StatusCode::NOT_FOUND, "Order not found"),
        }
    }

    fn with_user_mut(
        &self,
        raw: &str,
        mutate: impl FnOnce(&mut UserRecord) -> Response,
    ) -> Response {
        let Ok(id) = raw.parse::<i64>() else {
            return err(StatusCode::NOT_FOUND, "User not found");
        };
        match self.users.lock().get_mut(&id) {
            Some(record) => mutate(record),
            None => err(StatusCode::NOT_FOUND, "User not found"),
        }
    }
}

/// Binds an ephemeral port and serves the backend until the test ends.
pub async fn spawn(state: Arc<TestBackend>) -> SocketAddr {
    let router = Router::new().fallback(dispatch).with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn dispatch(State(state): State<Arc<TestBackend>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, 1 << 20).await.unwrap_or_default();
    state.handle(parts.method, parts.uri, parts.headers, bytes)
}

fn make_user(id: i64, username: &str, role: Role, status: UserStatus) -> User {
    User {
        id,
        username: username.to_string(),
        email: Some(format!("{username}@example.com")),
        role,
        status: Some(status),
        phone: None,
        address: None,
        registration_date: Some(Utc::now()),
        last_modified: None,
        is_active: Some(status == UserStatus::Active),
    }
}

fn product(id: i64, name: &str, price: Decimal, stock: u32) -> Product {
    Product {
        id,
        name: name.to_string(),
        description: None,
        price,
        stock,
        image: None,
        image_url: None,
        is_active: true,
        created_at: Some(Utc::now()),
        updated_at: None,
    }
}

fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

fn param(query: &Option<String>, key: &str) -> Option<String> {
    query.as_deref()?.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then(|| v.to_string())
    })
}

fn parse<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|_| err(StatusCode::BAD_REQUEST, "malformed body"))
}

fn ok<T: serde::Serialize>(value: &T) -> Response {
    (StatusCode::OK, Json(serde_json::to_value(value).unwrap())).into_response()
}

fn created_response<T: serde::Serialize>(value: &T) -> Response {
    (
        StatusCode::CREATED,
        Json(serde_json::to_value(value).unwrap()),
    )
        .into_response()
}

fn err(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({"detail": detail}))).into_response()
}

fn require_manager(user: &User) -> Option<Response> {
    (user.role != Role::Manager).then(|| {
        err(
            StatusCode::FORBIDDEN,
            "You do not have permission to perform this action.",
        )
    })
}

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct RegisterBody {
    username: String,
    password: String,
    password2: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    address: Option<String>,
    role: Role,
}

#[derive(Deserialize)]
struct ProductBody {
    name: String,
    #[serde(default)]
    description: Option<String>,
    price: Decimal,
    stock: u32,
    #[serde(default)]
    image_url: Option<String>,
}

#[derive(Deserialize)]
struct StockBody {
    stock: u32,
}

#[derive(Deserialize)]
struct CartLineBody {
    product_id: i64,
    #[serde(default)]
    quantity: u32,
}

#[derive(Deserialize)]
struct LineBody {
    product_id: i64,
    quantity: u32,
}

#[derive(Deserialize)]
struct CreateOrderBody {
    shipping_address: String,
    payment_deadline: u32,
    items: Vec<LineBody>,
    #[serde(default)]
    user_id: Option<i64>,
    #[serde(default)]
    location_state: Option<String>,
    #[serde(default)]
    location_display_name: Option<String>,
    #[serde(default)]
    location_latitude: Option<f64>,
    #[serde(default)]
    location_longitude: Option<f64>,
}

#[derive(Deserialize)]
struct UpdateOrderBody {
    shipping_address: String,
    payment_deadline: u32,
    items: Vec<LineBody>,
}

#[derive(Deserialize)]
struct StatusPatch<S> {
    status: S,
}

#[derive(Deserialize)]
struct RolePatch {
    role: Role,
}

#[derive(Deserialize)]
struct ProfileBody {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    address: Option<String>,
}

#[derive(Deserialize)]
struct AssignBody {
    employee_id: i64,
    customer_ids: Vec<i64>,
}

#[derive(Deserialize)]
struct UnassignBody {
    employee_id: i64,
    customer_id: i64,
}
