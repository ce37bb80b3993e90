use crate::configuration::{AuthMethod, Settings, StoreBackend};
use crate::connectors::{AuthServiceResolver, IdentityResolver, JwtIdentityResolver};
use crate::db::{ChatRepository, InMemoryChatRepository, PgChatRepository};
use crate::health::HealthChecker;
use crate::middleware;
use crate::realtime::{self, ChatHub};
use crate::routes;
use crate::services::ChatService;
use actix::{Actor, Addr};
use actix_cors::Cors;
use actix_web::{dev::Server, error, http, web, App, HttpServer};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use tracing_actix_web::TracingLogger;

fn io_error(err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
}

/// Opens the configured store. Postgres gets its migrations applied first.
pub async fn build_repository(
    settings: &Settings,
) -> Result<Arc<dyn ChatRepository>, std::io::Error> {
    match settings.store {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store, nothing survives a restart");
            Ok(Arc::new(InMemoryChatRepository::new()))
        }
        StoreBackend::Postgres => {
            tracing::info!(
                db_host = %settings.database.host,
                db_port = settings.database.port,
                db_name = %settings.database.database_name,
                "Connecting to PostgreSQL"
            );

            let connect_options = PgConnectOptions::new()
                .host(&settings.database.host)
                .port(settings.database.port)
                .username(&settings.database.username)
                .password(&settings.database.password)
                .database(&settings.database.database_name)
                .ssl_mode(PgSslMode::Disable);

            let pg_pool = PgPoolOptions::new()
                .max_connections(settings.database.max_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect_with(connect_options)
                .await
                .map_err(io_error)?;

            sqlx::migrate!("./migrations")
                .run(&pg_pool)
                .await
                .map_err(io_error)?;

            Ok(Arc::new(PgChatRepository::new(pg_pool)))
        }
    }
}

pub fn build_identity_resolver(settings: &Settings) -> Arc<dyn IdentityResolver> {
    match settings.auth.method {
        AuthMethod::Jwt => Arc::new(JwtIdentityResolver::new()),
        AuthMethod::AuthService => Arc::new(AuthServiceResolver::new(
            settings.auth.auth_url.clone(),
            settings.auth.cache_ttl(),
        )),
    }
}

pub async fn run(
    listener: TcpListener,
    settings: Settings,
    repo: Arc<dyn ChatRepository>,
    identity: Arc<dyn IdentityResolver>,
) -> Result<Server, std::io::Error> {
    // one hub per process, owned here and stopped with the server's system
    let hub: Addr<ChatHub> = ChatHub::new().start();

    let chat = ChatService::new(
        repo.clone(),
        Arc::new(hub.clone()),
        Arc::new(hub.clone()),
    );
    let chat = web::Data::new(chat);

    let health_checker = Arc::new(HealthChecker::new(repo, hub.clone(), settings.store));
    let health_checker = web::Data::new(health_checker);

    let hub = web::Data::new(hub);
    let identity = web::Data::new(identity);
    let settings = web::Data::new(settings);

    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        let msg: String = match err {
            error::JsonPayloadError::Deserialize(err) => format!(
                "{{\"kind\":\"deserialize\",\"line\":{}, \"column\":{}, \"msg\":\"{}\"}}",
                err.line(),
                err.column(),
                err
            ),
            _ => format!("{{\"kind\":\"other\",\"msg\":\"{}\"}}", err),
        };
        error::InternalError::new(msg, http::StatusCode::BAD_REQUEST).into()
    });

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .wrap(Cors::permissive())
            .app_data(json_config.clone())
            .app_data(health_checker.clone())
            .app_data(chat.clone())
            .app_data(hub.clone())
            .app_data(identity.clone())
            .app_data(settings.clone())
            .service(web::scope("/health_check").service(routes::health_check))
            .service(
                web::scope("/conversation")
                    .wrap(middleware::authentication::Manager::new())
                    .service(routes::conversation::list_handler)
                    .service(routes::conversation::private_handler)
                    .service(routes::conversation::group_handler)
                    .service(routes::conversation::private_lookup_handler)
                    .service(routes::conversation::messages_handler)
                    .service(routes::conversation::read_handler)
                    .service(routes::conversation::item_handler),
            )
            .service(
                web::scope("/message")
                    .wrap(middleware::authentication::Manager::new())
                    .service(routes::message::add_handler),
            )
            .service(
                web::scope("/presence")
                    .wrap(middleware::authentication::Manager::new())
                    .service(routes::presence::list_handler)
                    .service(routes::presence::item_handler),
            )
            .service(
                web::resource("/ws")
                    .wrap(middleware::authentication::Manager::new())
                    .route(web::get().to(realtime::chat_websocket)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
