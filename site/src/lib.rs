pub mod app;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod templates;

pub use app::{create_app, AppState};
