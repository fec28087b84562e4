pub mod app;
pub mod authz;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod init_data;
pub mod middleware;
pub mod services;
pub mod store;
pub mod types;

pub use app::{app, AppState};
pub use config::AppConfig;
