use super::broadcaster::{Broadcaster, EventSink};
use super::events::{ConnectionId, ServerEvent};
use super::presence::PresenceTracker;
use super::{EventPublisher, PresenceDirectory};
use actix::{Actor, Addr, Context, Handler, MessageResult};
use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

/// Single owner of realtime state: presence per user and group membership
/// per connection. Every connection lifecycle step arrives as a message, so
/// the maps are only ever touched from this actor.
#[derive(Default)]
pub struct ChatHub {
    presence: PresenceTracker,
    broadcaster: Broadcaster,
    owners: HashMap<ConnectionId, Uuid>,
}

impl ChatHub {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Actor for ChatHub {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("Chat hub started");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            connections = self.owners.len(),
            "Chat hub stopped, dropping presence"
        );
        self.presence.clear();
        self.broadcaster.clear();
        self.owners.clear();
    }
}

#[derive(actix::Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub connection_id: ConnectionId,
    pub user_id: Uuid,
    pub sink: Box<dyn EventSink>,
}

#[derive(actix::Message, Debug)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub connection_id: ConnectionId,
}

/// Replies false when the connection is not (or no longer) registered.
#[derive(actix::Message, Debug)]
#[rtype(result = "bool")]
pub struct Join {
    pub connection_id: ConnectionId,
    pub conversation_id: Uuid,
}

#[derive(actix::Message, Debug)]
#[rtype(result = "()")]
pub struct Emit {
    pub conversation_id: Uuid,
    pub event: ServerEvent,
}

#[derive(actix::Message, Debug)]
#[rtype(result = "()")]
pub struct EmitGlobal {
    pub event: ServerEvent,
}

#[derive(actix::Message, Debug)]
#[rtype(result = "bool")]
pub struct IsOnline {
    pub user_id: Uuid,
}

#[derive(actix::Message, Debug)]
#[rtype(result = "Vec<Uuid>")]
pub struct ListOnline;

impl Handler<Connect> for ChatHub {
    type Result = ();

    fn handle(&mut self, msg: Connect, _ctx: &mut Self::Context) {
        tracing::debug!(
            connection_id = %msg.connection_id,
            user_id = %msg.user_id,
            "Connection registered"
        );
        self.broadcaster.register(msg.connection_id, msg.sink);
        self.owners.insert(msg.connection_id, msg.user_id);

        if self.presence.connect(msg.user_id, msg.connection_id) {
            tracing::info!(user_id = %msg.user_id, "User is online");
            self.broadcaster
                .emit_global(&ServerEvent::presence_changed(msg.user_id, true));
        }
    }
}

impl Handler<Disconnect> for ChatHub {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _ctx: &mut Self::Context) {
        let Some(user_id) = self.owners.remove(&msg.connection_id) else {
            tracing::debug!(connection_id = %msg.connection_id, "Disconnect for unknown connection");
            return;
        };
        self.broadcaster.unregister(msg.connection_id);

        if self.presence.disconnect(user_id, msg.connection_id) {
            tracing::info!(user_id = %user_id, "User is offline");
            self.broadcaster
                .emit_global(&ServerEvent::presence_changed(user_id, false));
        }
    }
}

impl Handler<Join> for ChatHub {
    type Result = bool;

    fn handle(&mut self, msg: Join, _ctx: &mut Self::Context) -> bool {
        self.broadcaster
            .join(msg.connection_id, msg.conversation_id)
    }
}

impl Handler<Emit> for ChatHub {
    type Result = ();

    fn handle(&mut self, msg: Emit, _ctx: &mut Self::Context) {
        let delivered = self.broadcaster.emit(msg.conversation_id, &msg.event);
        tracing::debug!(
            conversation_id = %msg.conversation_id,
            event = msg.event.name(),
            delivered,
            "Event emitted"
        );
    }
}

impl Handler<EmitGlobal> for ChatHub {
    type Result = ();

    fn handle(&mut self, msg: EmitGlobal, _ctx: &mut Self::Context) {
        self.broadcaster.emit_global(&msg.event);
    }
}

impl Handler<IsOnline> for ChatHub {
    type Result = bool;

    fn handle(&mut self, msg: IsOnline, _ctx: &mut Self::Context) -> bool {
        self.presence.is_online(msg.user_id)
    }
}

impl Handler<ListOnline> for ChatHub {
    type Result = MessageResult<ListOnline>;

    fn handle(&mut self, _msg: ListOnline, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.presence.list_online())
    }
}

impl EventPublisher for Addr<ChatHub> {
    fn emit(&self, conversation_id: Uuid, event: ServerEvent) {
        self.do_send(Emit {
            conversation_id,
            event,
        });
    }

    fn emit_global(&self, event: ServerEvent) {
        self.do_send(EmitGlobal { event });
    }
}

#[async_trait]
impl PresenceDirectory for Addr<ChatHub> {
    async fn is_online(&self, user_id: Uuid) -> bool {
        self.send(IsOnline { user_id }).await.unwrap_or_else(|err| {
            tracing::warn!("Presence lookup failed, reporting offline: {}", err);
            false
        })
    }

    async fn list_online(&self) -> Vec<Uuid> {
        self.send(ListOnline).await.unwrap_or_else(|err| {
            tracing::warn!("Presence listing failed, reporting nobody: {}", err);
            Vec::new()
        })
    }
}
