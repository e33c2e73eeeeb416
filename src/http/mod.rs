//! HTTP plumbing: path canonicalization, credential storage, and the
//! session/CSRF manager every API call goes through.

pub mod credentials;
pub mod paths;
pub mod session;

pub use credentials::{CookieCredentialStore, CredentialStore};
pub use session::{FormField, Payload, RequestSpec, SessionManager, SessionState};
