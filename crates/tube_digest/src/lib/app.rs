//! HTTP surface over the pipeline and chat cores.

pub mod routes;
pub mod server;

pub use server::{router, serve, AppState};
