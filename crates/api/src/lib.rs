//! HTTP API: server, routing, and request/response mapping.

pub mod app;

pub use app::{AppState, build_app, build_app_with};
