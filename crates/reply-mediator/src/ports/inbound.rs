//! Inbound port: delivery metadata handed to the dispatcher per reply.

use crate::domain::correlation::CorrelationToken;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata captured from one inbound delivery.
///
/// The dispatcher reads the correlation header out of it; the rest is kept
/// opaque and returned to the caller with the reply for inspection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundContext {
    /// Received headers, string-keyed and string-valued.
    pub headers: HashMap<String, String>,
}

impl InboundContext {
    /// Empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context wrapping an existing header map.
    pub fn from_headers(headers: HashMap<String, String>) -> Self {
        Self { headers }
    }

    /// Builder-style header attachment.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Header value by name, if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Parse the correlation token out of the named header.
    ///
    /// Absent or unparsable values are both `None`; the dispatcher treats
    /// them identically (fall back to the most recent pending entry).
    pub fn correlation(&self, header_name: &str) -> Option<CorrelationToken> {
        self.header(header_name)
            .and_then(|value| CorrelationToken::parse(value).ok())
    }
}
