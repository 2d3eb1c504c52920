//! # Memory Bus - In-Process Loopback Transport
//!
//! A destination-keyed, in-memory transport for wiring a
//! [`CorrelationMediator`](reply_mediator::CorrelationMediator) to local
//! endpoints: integration tests, single-process deployments, and demos.
//!
//! Sends are delivered to the registered endpoint on a spawned task, so a
//! reply always arrives asynchronously with respect to the send, the same
//! shape a real broker gives you. Endpoint replies are routed back through
//! a [`ReplyRouter`](reply_mediator::ReplyRouter) by concrete reply type.
//!
//! Not a delivery guarantee, not persistence: messages to a dropped
//! endpoint handler or of an unregistered reply type are logged and
//! dropped, which is exactly what the mediator's timeout path is for.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

use async_trait::async_trait;
use dashmap::DashMap;
use reply_mediator::{
    InboundContext, ReplyRouter, RouteOutcome, SendOptions, Transport, TransportError,
    CORRELATION_HEADER,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Headers attached to a request or reply.
pub type Headers = HashMap<String, String>;

/// A type-erased endpoint handler.
///
/// Receives the request payload and its headers; returns the reply payload
/// plus reply headers, or `None` for fire-and-forget handling.
pub type EndpointHandler =
    Arc<dyn Fn(Box<dyn Any + Send>, &Headers) -> Option<(Box<dyn Any + Send>, Headers)> + Send + Sync>;

/// Copy the correlation header from a request into reply headers.
///
/// What a well-behaved endpoint does so the mediator can match the reply
/// to its caller.
pub fn correlated_reply_headers(request_headers: &Headers) -> Headers {
    let mut headers = Headers::new();
    if let Some(token) = request_headers.get(CORRELATION_HEADER) {
        headers.insert(CORRELATION_HEADER.to_string(), token.clone());
    }
    headers
}

/// In-memory loopback bus.
///
/// Endpoints are registered by destination name; outbound sends must name
/// one (or the bus must have a default). Replies flow back through the
/// router handed in at construction.
pub struct MemoryBus {
    endpoints: DashMap<String, EndpointHandler>,
    router: Arc<ReplyRouter>,
    default_destination: Option<String>,
}

impl MemoryBus {
    /// Bus delivering replies through `router`.
    pub fn new(router: Arc<ReplyRouter>) -> Self {
        Self {
            endpoints: DashMap::new(),
            router,
            default_destination: None,
        }
    }

    /// Bus with a default destination for sends that name none.
    pub fn with_default_destination(router: Arc<ReplyRouter>, destination: impl Into<String>) -> Self {
        Self {
            endpoints: DashMap::new(),
            router,
            default_destination: Some(destination.into()),
        }
    }

    /// Register a raw endpoint handler under a destination name.
    ///
    /// Replaces any previous handler for that destination.
    pub fn register_endpoint<F>(&self, destination: impl Into<String>, handler: F)
    where
        F: Fn(Box<dyn Any + Send>, &Headers) -> Option<(Box<dyn Any + Send>, Headers)>
            + Send
            + Sync
            + 'static,
    {
        let destination = destination.into();
        debug!(destination = %destination, "Registered endpoint");
        self.endpoints.insert(destination, Arc::new(handler));
    }

    /// Register a typed request handler that always replies.
    ///
    /// The correlation header is echoed into the reply automatically.
    /// Requests of the wrong payload type are dropped with a warning.
    pub fn register_service<M, R, F>(&self, destination: impl Into<String>, handler: F)
    where
        M: Send + 'static,
        R: Send + 'static,
        F: Fn(M, &Headers) -> R + Send + Sync + 'static,
    {
        self.register_endpoint(destination, move |payload, headers| {
            match payload.downcast::<M>() {
                Ok(message) => {
                    let reply = handler(*message, headers);
                    let reply_headers = correlated_reply_headers(headers);
                    Some((Box::new(reply) as Box<dyn Any + Send>, reply_headers))
                }
                Err(_) => {
                    warn!("Endpoint received request of unexpected type, dropped");
                    None
                }
            }
        });
    }

    /// Whether a destination is registered.
    pub fn has_endpoint(&self, destination: &str) -> bool {
        self.endpoints.contains_key(destination)
    }

    /// The router replies are delivered through.
    pub fn router(&self) -> Arc<ReplyRouter> {
        Arc::clone(&self.router)
    }
}

#[async_trait]
impl<M: Send + 'static> Transport<M> for MemoryBus {
    async fn send(&self, message: M, options: SendOptions) -> Result<(), TransportError> {
        let destination = options
            .destination
            .clone()
            .or_else(|| self.default_destination.clone())
            .ok_or(TransportError::NoDestination)?;

        let handler = self
            .endpoints
            .get(&destination)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| TransportError::UnknownDestination(destination.clone()))?;

        let router = Arc::clone(&self.router);
        let headers = options.headers;
        tokio::spawn(async move {
            if let Some((reply, reply_headers)) = handler(Box::new(message), &headers) {
                let context = InboundContext::from_headers(reply_headers);
                if router.deliver(reply, context) == RouteOutcome::Unrouted {
                    debug!(destination = %destination, "Reply type has no registered dispatcher, dropped");
                }
            }
        });

        Ok(())
    }
}
