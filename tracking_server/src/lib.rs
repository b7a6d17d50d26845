//! # Delivery tracking server
//!
//! The HTTP/WebSocket surface over the tracking engine. It is responsible for:
//! * Verifying access tokens and turning their claims into subjects the engine can authorize.
//! * Serving the synchronous query façade under `/api`.
//! * Running the connection gateway at `/ws/tracking` for live position streaming.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/tracking/...`: The synchronous tracking queries and commands.
//! * `/ws/tracking?token=...`: The WebSocket gateway.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod gateway;
pub mod helpers;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
