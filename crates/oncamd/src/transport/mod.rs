//! Client-facing transports.
//!
//! The control socket (unix or tcp) carries newline-delimited JSON; the
//! optional HTTP server carries the same messages as WebSocket text frames.
//! Both hand every complete frame to a [`ConnectionHandler`] and write
//! whatever it sends back through the connection's [`ResponseSink`].

mod connection;
mod errors;
mod listener;
mod websocket;

pub use self::connection::{ConnectionHandler, MAX_FRAME_BYTES, ResponseSink, serve_stream};
pub use self::errors::ListenerError;
pub use self::listener::{ListenerHandle, SocketListener};
pub use self::websocket::HttpListener;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
