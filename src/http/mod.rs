//! HTTP server module.
//!
//! The server includes:
//! - Plain HTTP listener on the configured address
//! - Graceful shutdown on SIGTERM/SIGINT with a bounded drain
//! - One-shot release of the data store before the process exits

mod server;
mod shutdown;

pub use server::{serve, start_server, ServerError};
pub use shutdown::{Phase, ShutdownCoordinator};
