use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller identity handed over by the identity resolver. The authentication
/// service owns users; this service only ever references them by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
}

impl User {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
