pub mod api;
pub mod auth;
pub mod config;
pub mod metrics;
pub mod server;

pub use server::GatewayServer;
