//! Ports: the seams between the mediator core and the host's transport.
//!
//! The transport itself (delivery, durability, retries, serialization) is
//! external. The core only requires an outbound [`Transport`] to send
//! through, and that the host feed every inbound reply to a
//! [`ReplyDispatcher`](crate::ReplyDispatcher) along with its
//! [`InboundContext`].

pub mod inbound;
pub mod outbound;

pub use inbound::InboundContext;
pub use outbound::{SendOptions, Transport};
