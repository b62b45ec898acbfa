pub mod admin;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod github;
pub mod health;
pub mod models;
pub mod oauth;
pub mod pool;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod surreal_client;
pub mod types;

pub use error::{GatewayError, Result};
pub use routes::app;
pub use state::AppState;
