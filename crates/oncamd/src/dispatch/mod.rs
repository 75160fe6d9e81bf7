//! Request parsing, gating and execution.
//!
//! Transports hand raw frames to [`DispatchConnectionHandler`], which parses
//! them into [`Request`]s and runs each one on its own task through the
//! [`Dispatcher`]. Replies carry the request's `seq` so clients can match
//! them up regardless of completion order.

mod errors;
mod handler;
mod request;
mod response;
mod router;

pub use self::errors::DispatchError;
pub use self::handler::DispatchConnectionHandler;
pub use self::request::{Method, Request};
pub use self::response::Response;
pub use self::router::{DEFAULT_MOVE_TIMEOUT, Dispatcher};

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
