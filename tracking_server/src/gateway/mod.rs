//! The connection gateway: persistent WebSocket connections, per-message authorization,
//! subscription bookkeeping and fan-out.
//!
//! Each connection is served by one task ([`session`]) that processes its inbound events strictly
//! in arrival order and forwards broadcasts from the [`SubscriptionRegistry`] to the socket.
//! Broadcasts for an order are only emitted after the corresponding durable write has been
//! acknowledged by the engine.

pub mod messages;
pub mod registry;
pub mod session;

pub use registry::{ConnId, SubscriptionRegistry};
pub use session::{tracking_ws, GatewayOptions};
