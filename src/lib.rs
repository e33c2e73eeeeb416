//! Terminal client for a role-scoped storefront API.
//!
//! The stack, bottom up: [`http`] owns the cookie session and CSRF
//! double-submit handling with transparent 403 recovery; [`api`] is the
//! typed endpoint surface on top of it; [`context`] holds per-session
//! client state (auth, cart, customer selection); [`pages`] are the
//! role-guarded controllers the [`console`] shell drives.

pub mod api;
pub mod app;
pub mod config;
pub mod console;
pub mod context;
pub mod error;
pub mod http;
pub mod location;
pub mod logging;
pub mod model;
pub mod pages;

pub use app::{App, PageFlow, Redirect, Route};
pub use config::{CliArgs, ClientConfig};
pub use error::{Error, FieldErrors, Result};
pub use logging::{init_logging, LoggingConfig};
