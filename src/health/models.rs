use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub response_time_ms: Option<u64>,
    pub last_checked: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
}

impl ComponentHealth {
    pub fn healthy(response_time_ms: u64) -> Self {
        Self::with_status(ComponentStatus::Healthy, None, Some(response_time_ms))
    }

    pub fn unhealthy(error: String) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(error), None)
    }

    pub fn degraded(message: String, response_time_ms: Option<u64>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message), response_time_ms)
    }

    fn with_status(
        status: ComponentStatus,
        message: Option<String>,
        response_time_ms: Option<u64>,
    ) -> Self {
        Self {
            status,
            message,
            response_time_ms,
            last_checked: Utc::now(),
            details: None,
        }
    }

    pub fn with_detail(mut self, key: &str, value: serde_json::Value) -> Self {
        self.details
            .get_or_insert_with(HashMap::new)
            .insert(key.to_string(), value);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub status: ComponentStatus,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthCheckResponse {
    pub fn new(version: String, uptime_seconds: u64) -> Self {
        Self {
            status: ComponentStatus::Healthy,
            timestamp: Utc::now(),
            version,
            uptime_seconds,
            components: HashMap::new(),
        }
    }

    /// Overall status is the worst of the components.
    pub fn add_component(&mut self, name: &str, health: ComponentHealth) {
        self.status = self.status.max(health.status);
        self.components.insert(name.to_string(), health);
    }

    pub fn is_healthy(&self) -> bool {
        self.status != ComponentStatus::Unhealthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_component_wins() {
        let mut response = HealthCheckResponse::new("0.1.0".to_string(), 3);
        response.add_component("store", ComponentHealth::healthy(2));
        assert_eq!(response.status, ComponentStatus::Healthy);

        response.add_component("hub", ComponentHealth::degraded("slow".to_string(), Some(1500)));
        assert_eq!(response.status, ComponentStatus::Degraded);
        assert!(response.is_healthy());

        response.add_component("other", ComponentHealth::unhealthy("down".to_string()));
        response.add_component("late", ComponentHealth::healthy(1));
        assert_eq!(response.status, ComponentStatus::Unhealthy);
        assert!(!response.is_healthy());
    }
}
