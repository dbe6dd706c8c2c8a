//! HackSpark Backend Library
//!
//! Session authentication, ownership authorization and the edge/counter engine behind a
//! project-sharing platform. `main.rs` is a thin CLI over [`api::create_router`].

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod edges;
pub mod error;
pub mod ids;
pub mod middleware;
pub mod models;
pub mod store;

pub use api::{create_router, AppState};
pub use config::Config;
pub use db::Database;
pub use error::{AppError, AppResult};
