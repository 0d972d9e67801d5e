//! Heartbeat - a minimal HTTP service with status and database health probes.
//!
//! `/` returns a static service descriptor, `/health` reports whether the
//! backing PostgreSQL database answers a trivial query. SIGTERM/SIGINT stop
//! the server and release the connection pool exactly once before exit.

pub mod config;
pub mod error;
pub mod http;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod store;

pub use error::AppError;
pub use state::AppState;
