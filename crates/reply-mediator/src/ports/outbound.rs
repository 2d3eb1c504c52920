//! Outbound port: what the mediator needs from a transport.

use crate::error::TransportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Options attached to an outbound send.
///
/// The mediator always sets the correlation header; hosts may add their
/// own headers or a destination override before the send goes out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendOptions {
    /// Explicit destination, overriding the transport's default routing.
    pub destination: Option<String>,
    /// String-keyed headers delivered alongside the message.
    pub headers: HashMap<String, String>,
}

impl SendOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach or replace a header.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    /// Route the message to an explicit destination.
    pub fn set_destination(&mut self, destination: impl Into<String>) {
        self.destination = Some(destination.into());
    }

    /// Header value by name, if set.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Fire-and-forget outbound send.
///
/// Implementations deliver `message` asynchronously; replies come back
/// later through whatever inbound path the host wired to the dispatcher.
/// A returned error means the send itself never completed and no reply
/// should be expected.
#[async_trait]
pub trait Transport<M: Send + 'static>: Send + Sync {
    /// Send one message with the given options.
    async fn send(&self, message: M, options: SendOptions) -> Result<(), TransportError>;
}

#[async_trait]
impl<M: Send + 'static, T: Transport<M> + ?Sized> Transport<M> for std::sync::Arc<T> {
    async fn send(&self, message: M, options: SendOptions) -> Result<(), TransportError> {
        (**self).send(message, options).await
    }
}
