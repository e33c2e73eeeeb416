//! Process-wide client-side state, populated from the API and consumed by
//! the page controllers. State lives in explicitly-owned containers behind
//! `parking_lot` locks shared via `Arc`; locks are never held across awaits.

mod auth;
mod cart;
mod customer;

pub use auth::AuthContext;
pub use cart::{CartContext, CartSnapshot};
pub use customer::CustomerSelection;
