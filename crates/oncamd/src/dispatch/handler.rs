//! Connection handler that turns frames into dispatched requests.

use std::sync::Arc;

use tracing::{error, warn};

use crate::transport::{ConnectionHandler, ResponseSink};

use super::DISPATCH_TARGET;
use super::errors::DispatchError;
use super::request::Request;
use super::response::Response;
use super::router::Dispatcher;

/// Parses frames and runs each request on its own task.
///
/// Requests on one connection overlap freely; replies are written as they
/// complete and correlate by `seq` only.
#[derive(Debug, Clone)]
pub struct DispatchConnectionHandler {
    dispatcher: Arc<Dispatcher>,
}

impl DispatchConnectionHandler {
    /// Wraps `dispatcher`.
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }
}

impl ConnectionHandler for DispatchConnectionHandler {
    fn on_frame(&self, frame: &[u8], sink: &ResponseSink) {
        let request = match Request::parse(frame) {
            Ok(request) => request,
            Err(error) => {
                log_dropped(&error, frame.len());
                return;
            }
        };

        let dispatcher = Arc::clone(&self.dispatcher);
        let sink = sink.clone();
        tokio::spawn(async move {
            let method = request.method;
            let seq = request.seq.clone();
            let worker = tokio::spawn(async move { dispatcher.dispatch(request).await });
            let response = match worker.await {
                Ok(response) => response,
                Err(join_error) => {
                    error!(target: DISPATCH_TARGET, %method, error = %join_error, "request task failed");
                    Response::failure(method, seq, &DispatchError::Internal)
                }
            };
            deliver(&sink, &response);
        });
    }
}

fn log_dropped(error: &DispatchError, frame_len: usize) {
    match error {
        DispatchError::UnknownMethod { .. } => {
            warn!(target: DISPATCH_TARGET, %error, "dropping request");
        }
        _ => warn!(target: DISPATCH_TARGET, %error, frame_len, "dropping malformed message"),
    }
}

fn deliver(sink: &ResponseSink, response: &Response) {
    match response.to_json() {
        Ok(json) => {
            if !sink.send(json) {
                warn!(
                    target: DISPATCH_TARGET,
                    id = response.id,
                    "client disconnected before response"
                );
            }
        }
        Err(error) => {
            error!(target: DISPATCH_TARGET, id = response.id, %error, "failed to encode response");
        }
    }
}
