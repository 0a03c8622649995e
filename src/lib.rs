// Library exports for dropbook
// This allows integration tests and the binary to share the modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
