use super::events::{ConnectionId, ServerEvent};
use actix::Recipient;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Event handed to a connection's actor for writing to the socket.
#[derive(actix::Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct Deliver(pub ServerEvent);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Connection is gone.
    Closed,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "connection closed"),
        }
    }
}

/// Something a connection's events can be pushed into.
pub trait EventSink: Send {
    fn deliver(&self, event: &ServerEvent) -> Result<(), DeliveryError>;
}

impl EventSink for Recipient<Deliver> {
    fn deliver(&self, event: &ServerEvent) -> Result<(), DeliveryError> {
        // do_send ignores mailbox capacity, a busy session still gets every event
        if !self.connected() {
            return Err(DeliveryError::Closed);
        }
        self.do_send(Deliver(event.clone()));
        Ok(())
    }
}

impl EventSink for mpsc::UnboundedSender<ServerEvent> {
    fn deliver(&self, event: &ServerEvent) -> Result<(), DeliveryError> {
        self.send(event.clone()).map_err(|_| DeliveryError::Closed)
    }
}

/// Conversation-scoped fan-out over live connections.
///
/// Groups hold connections, not users: a user joined from two connections
/// receives each event twice. Nothing is buffered, so a connection joining
/// after an emit never sees it.
#[derive(Default)]
pub struct Broadcaster {
    sinks: HashMap<ConnectionId, Box<dyn EventSink>>,
    groups: HashMap<Uuid, HashSet<ConnectionId>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, connection_id: ConnectionId, sink: Box<dyn EventSink>) {
        self.sinks.insert(connection_id, sink);
    }

    /// Drops the connection and its memberships in every group.
    pub fn unregister(&mut self, connection_id: ConnectionId) {
        self.sinks.remove(&connection_id);
        self.groups.retain(|_, members| {
            members.remove(&connection_id);
            !members.is_empty()
        });
    }

    /// False when the connection is not registered.
    pub fn join(&mut self, connection_id: ConnectionId, conversation_id: Uuid) -> bool {
        if !self.sinks.contains_key(&connection_id) {
            return false;
        }
        self.groups
            .entry(conversation_id)
            .or_default()
            .insert(connection_id);
        true
    }

    /// Returns how many connections accepted the event.
    pub fn emit(&self, conversation_id: Uuid, event: &ServerEvent) -> usize {
        let Some(members) = self.groups.get(&conversation_id) else {
            tracing::debug!(
                conversation_id = %conversation_id,
                event = event.name(),
                "No connections joined, nothing to emit"
            );
            return 0;
        };

        members
            .iter()
            .filter(|connection_id| self.deliver_to(**connection_id, event))
            .count()
    }

    pub fn emit_global(&self, event: &ServerEvent) -> usize {
        self.sinks
            .keys()
            .filter(|connection_id| self.deliver_to(**connection_id, event))
            .count()
    }

    pub fn group_size(&self, conversation_id: Uuid) -> usize {
        self.groups.get(&conversation_id).map_or(0, HashSet::len)
    }

    pub fn connection_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.sinks.clear();
    }

    fn deliver_to(&self, connection_id: ConnectionId, event: &ServerEvent) -> bool {
        let Some(sink) = self.sinks.get(&connection_id) else {
            return false;
        };
        match sink.deliver(event) {
            Ok(()) => true,
            Err(err) => {
                // best effort: the message is already persisted
                tracing::warn!(
                    connection_id = %connection_id,
                    event = event.name(),
                    "Event delivery failed: {}",
                    err
                );
                false
            }
        }
    }
}
