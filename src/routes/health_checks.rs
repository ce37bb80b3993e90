use crate::health::HealthChecker;
use actix_web::{get, web, HttpResponse};
use std::sync::Arc;

#[get("")]
pub async fn health_check(checker: web::Data<Arc<HealthChecker>>) -> HttpResponse {
    let health_response = checker.check_all().await;

    if health_response.is_healthy() {
        HttpResponse::Ok().json(health_response)
    } else {
        HttpResponse::ServiceUnavailable().json(health_response)
    }
}
