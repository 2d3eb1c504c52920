//! Reply-type routing at the transport boundary.
//!
//! Transports that carry more than one reply type deliver them through a
//! single inbound path. The router maps each concrete reply type to the
//! dispatcher registered for it, so the wiring is an explicit
//! [`register`](ReplyRouter::register) call rather than a side effect of
//! handler construction order.

use crate::dispatcher::{DispatchOutcome, ReplyDispatcher};
use crate::ports::InboundContext;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use tracing::debug;

/// What the router did with one inbound delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A dispatcher was registered for the type; its outcome is inside.
    Dispatched(DispatchOutcome),
    /// No dispatcher registered for this reply type; delivery dropped.
    Unrouted,
}

trait ErasedReplyHandler: Send + Sync {
    fn deliver(&self, reply: Box<dyn Any + Send>, context: InboundContext) -> RouteOutcome;
}

impl<R: Send + 'static> ErasedReplyHandler for ReplyDispatcher<R> {
    fn deliver(&self, reply: Box<dyn Any + Send>, context: InboundContext) -> RouteOutcome {
        match reply.downcast::<R>() {
            Ok(reply) => RouteOutcome::Dispatched(self.on_reply(*reply, context)),
            // Unreachable while routes are keyed by TypeId, but the inbound
            // path never panics.
            Err(_) => RouteOutcome::Unrouted,
        }
    }
}

/// Registry mapping reply types to their dispatchers.
///
/// One router per inbound wiring point; registration replaces any
/// previous dispatcher for the same type.
#[derive(Default)]
pub struct ReplyRouter {
    routes: DashMap<TypeId, Box<dyn ErasedReplyHandler>>,
}

impl ReplyRouter {
    /// Empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the dispatcher handling replies of type `R`.
    pub fn register<R: Send + 'static>(&self, dispatcher: ReplyDispatcher<R>) {
        self.routes.insert(TypeId::of::<R>(), Box::new(dispatcher));
    }

    /// Route one type-erased inbound reply to its dispatcher.
    ///
    /// Replies of unregistered types are dropped with a debug log; the
    /// inbound path never errors.
    pub fn deliver(&self, reply: Box<dyn Any + Send>, context: InboundContext) -> RouteOutcome {
        let type_id = reply.as_ref().type_id();
        match self.routes.get(&type_id) {
            Some(handler) => handler.deliver(reply, context),
            None => {
                debug!(?type_id, "Inbound reply of unregistered type, dropped");
                RouteOutcome::Unrouted
            }
        }
    }

    /// Route a typed inbound reply.
    pub fn deliver_typed<R: Send + 'static>(
        &self,
        reply: R,
        context: InboundContext,
    ) -> RouteOutcome {
        self.deliver(Box::new(reply), context)
    }

    /// Number of registered reply types.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}
