//! Realtime fan-out: who is online and which connections watch which
//! conversation. State lives in the [`ChatHub`] actor; the service layer
//! talks to it through [`EventPublisher`] and [`PresenceDirectory`].

pub mod broadcaster;
pub mod events;
pub mod hub;
pub mod presence;
pub mod protocol;
pub mod session;

use async_trait::async_trait;
use uuid::Uuid;

pub use broadcaster::{Broadcaster, Deliver, DeliveryError, EventSink};
pub use events::{ConnectionId, ServerEvent};
pub use hub::ChatHub;
pub use presence::PresenceTracker;
pub use session::chat_websocket;

/// Fire-and-forget emission. Implementations never fail the caller.
pub trait EventPublisher: Send + Sync {
    fn emit(&self, conversation_id: Uuid, event: ServerEvent);
    fn emit_global(&self, event: ServerEvent);
}

#[async_trait]
pub trait PresenceDirectory: Send + Sync {
    async fn is_online(&self, user_id: Uuid) -> bool;
    async fn list_online(&self) -> Vec<Uuid>;
}
