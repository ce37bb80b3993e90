use super::models::{ComponentHealth, HealthCheckResponse};
use crate::configuration::StoreBackend;
use crate::db::ChatRepository;
use crate::realtime::hub::ListOnline;
use crate::realtime::ChatHub;
use actix::Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);
const SLOW_RESPONSE_THRESHOLD_MS: u64 = 1000;

pub struct HealthChecker {
    repo: Arc<dyn ChatRepository>,
    hub: Addr<ChatHub>,
    backend: StoreBackend,
    start_time: Instant,
}

fn timed(start: Instant, slow_message: &str) -> ComponentHealth {
    let elapsed = start.elapsed().as_millis() as u64;
    if elapsed > SLOW_RESPONSE_THRESHOLD_MS {
        ComponentHealth::degraded(slow_message.to_string(), Some(elapsed))
    } else {
        ComponentHealth::healthy(elapsed)
    }
}

impl HealthChecker {
    pub fn new(repo: Arc<dyn ChatRepository>, hub: Addr<ChatHub>, backend: StoreBackend) -> Self {
        Self {
            repo,
            hub,
            backend,
            start_time: Instant::now(),
        }
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let version = env!("CARGO_PKG_VERSION").to_string();
        let uptime = self.start_time.elapsed().as_secs();
        let mut response = HealthCheckResponse::new(version, uptime);

        let (store_result, hub_result) = tokio::join!(
            timeout(CHECK_TIMEOUT, self.check_store()),
            timeout(CHECK_TIMEOUT, self.check_hub())
        );

        response.add_component(
            "store",
            store_result.unwrap_or_else(|_| ComponentHealth::unhealthy("Timeout".to_string())),
        );
        response.add_component(
            "realtime_hub",
            hub_result.unwrap_or_else(|_| ComponentHealth::unhealthy("Timeout".to_string())),
        );

        response
    }

    #[tracing::instrument(name = "Check store health", skip(self))]
    async fn check_store(&self) -> ComponentHealth {
        let start = Instant::now();
        let backend = match self.backend {
            StoreBackend::Postgres => "postgres",
            StoreBackend::Memory => "memory",
        };

        match self.repo.ping().await {
            Ok(()) => timed(start, "Store responding slowly")
                .with_detail("backend", serde_json::json!(backend)),
            Err(e) => {
                tracing::error!("Store health check failed: {}", e);
                ComponentHealth::unhealthy(format!("Store error: {}", e))
                    .with_detail("backend", serde_json::json!(backend))
            }
        }
    }

    #[tracing::instrument(name = "Check realtime hub health", skip(self))]
    async fn check_hub(&self) -> ComponentHealth {
        let start = Instant::now();

        match self.hub.send(ListOnline).await {
            Ok(online) => timed(start, "Realtime hub responding slowly")
                .with_detail("online_users", serde_json::json!(online.len())),
            Err(e) => {
                tracing::error!("Realtime hub health check failed: {}", e);
                ComponentHealth::unhealthy(format!("Realtime hub unreachable: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryChatRepository;
    use crate::health::ComponentStatus;
    use actix::Actor;

    #[actix_web::test]
    async fn reports_each_component() {
        let repo = Arc::new(InMemoryChatRepository::new());
        let checker = HealthChecker::new(repo.clone(), ChatHub::new().start(), StoreBackend::Memory);

        let healthy = checker.check_all().await;
        assert_eq!(healthy.status, ComponentStatus::Healthy);
        assert!(healthy.components.contains_key("store"));
        assert!(healthy.components.contains_key("realtime_hub"));

        repo.set_unavailable(true);
        let failing = checker.check_all().await;
        assert_eq!(failing.status, ComponentStatus::Unhealthy);
        assert_eq!(
            failing.components["store"].status,
            ComponentStatus::Unhealthy
        );
    }
}
