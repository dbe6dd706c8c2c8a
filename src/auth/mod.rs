//! Authentication Module
//! Mission: Opaque server-side sessions, bcrypt credentials, ownership checks

pub mod middleware;
pub mod models;
pub mod password;
pub mod policy;
pub mod service;
pub mod session_store;
pub mod user_store;

pub use middleware::{optional_auth, require_auth, AuthGate, CurrentUser, MaybeUser};
pub use password::PasswordHasher;
pub use service::AuthService;
pub use session_store::{SessionPolicy, SessionStore};
pub use user_store::UserStore;
