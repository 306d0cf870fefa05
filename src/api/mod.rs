//! Game API Service
//!
//! HTTP and WebSocket API for accounts, gameplay, round history and
//! fairness verification.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod monitoring;
pub mod routes;
pub mod server;
pub mod websocket;

pub use server::ApiServer;
