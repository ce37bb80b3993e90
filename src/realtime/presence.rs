use super::events::ConnectionId;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Who is online, keyed by user, counted by connection.
///
/// A user is online while at least one of their connections is open. The
/// tracker lives as long as the hub that owns it and is never persisted.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    connections: HashMap<Uuid, HashSet<ConnectionId>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when this is the user's first open connection.
    pub fn connect(&mut self, user_id: Uuid, connection_id: ConnectionId) -> bool {
        let connections = self.connections.entry(user_id).or_default();
        let was_offline = connections.is_empty();
        connections.insert(connection_id);
        was_offline
    }

    /// Returns true when the user's last connection just closed.
    pub fn disconnect(&mut self, user_id: Uuid, connection_id: ConnectionId) -> bool {
        let Some(connections) = self.connections.get_mut(&user_id) else {
            return false;
        };
        if !connections.remove(&connection_id) {
            return false;
        }
        if connections.is_empty() {
            self.connections.remove(&user_id);
            return true;
        }
        false
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.connections.contains_key(&user_id)
    }

    pub fn list_online(&self) -> Vec<Uuid> {
        let mut users: Vec<Uuid> = self.connections.keys().copied().collect();
        users.sort();
        users
    }

    pub fn connection_count(&self, user_id: Uuid) -> usize {
        self.connections.get(&user_id).map_or(0, HashSet::len)
    }

    pub fn clear(&mut self) {
        self.connections.clear();
    }
}
