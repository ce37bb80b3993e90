#![allow(dead_code)]

use parley::configuration::{get_configuration, DatabaseSettings, Settings, StoreBackend};
use parley::connectors::FixedIdentityResolver;
use parley::db::InMemoryChatRepository;
use parley::models::User;
use parley::telemetry::{get_subscriber, init_subscriber};
use serde_json::Value;
use sqlx::{Connection, Executor, PgConnection, PgPool};
use std::net::TcpListener;
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

static TRACING: OnceLock<()> = OnceLock::new();

fn init_tracing() {
    TRACING.get_or_init(|| {
        // TEST_LOG=1 cargo test ... to see the server's logs
        if std::env::var("TEST_LOG").is_ok() {
            init_subscriber(get_subscriber("test".into(), "debug".into(), std::io::stdout));
        } else {
            init_subscriber(get_subscriber("test".into(), "debug".into(), std::io::sink));
        }
    });
}

pub struct TestUser {
    pub user: User,
    pub token: String,
}

impl TestUser {
    fn new(name: &str) -> Self {
        Self {
            user: User::new(Uuid::new_v4(), name),
            token: format!("{}-{}", name.to_lowercase(), Uuid::new_v4()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.user.id
    }
}

pub struct TestApp {
    pub address: String,
    pub repo: Arc<InMemoryChatRepository>,
    pub alice: TestUser,
    pub bob: TestUser,
    pub carol: TestUser,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn ws_url(&self, token: &str) -> String {
        format!(
            "{}/ws?token={}",
            self.address.replacen("http://", "ws://", 1),
            token
        )
    }

    pub async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Opens (or fetches) the private conversation between two users and returns its id.
    pub async fn private_conversation(&self, from: &TestUser, to: &TestUser) -> Uuid {
        let response = self
            .post(
                "/conversation/private",
                &from.token,
                serde_json::json!({"userId": to.id()}),
            )
            .await;
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.expect("Invalid JSON");
        body["item"]["id"]
            .as_str()
            .and_then(|id| id.parse().ok())
            .expect("conversation id missing")
    }
}

/// Serves the app on a random port with the in-memory store and a fixed
/// token table. Must run inside an actix system (`#[actix_web::test]`).
pub async fn spawn_app() -> TestApp {
    init_tracing();

    let mut configuration = get_configuration().expect("Failed to get configuration");
    configuration.store = StoreBackend::Memory;

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let repo = Arc::new(InMemoryChatRepository::new());
    let (alice, bob, carol) = (
        TestUser::new("Alice"),
        TestUser::new("Bob"),
        TestUser::new("Carol"),
    );

    let mut identity = FixedIdentityResolver::new();
    for user in [&alice, &bob, &carol] {
        repo.register_user(user.id(), user.user.name.clone()).await;
        identity = identity.with_user(user.token.clone(), user.user.clone());
    }

    let server = parley::startup::run(listener, configuration, repo.clone(), Arc::new(identity))
        .await
        .expect("Failed to bind address.");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        repo,
        alice,
        bob,
        carol,
        client: reqwest::Client::new(),
    }
}

/// Fresh database per call. `None` when no Postgres is reachable.
pub async fn configure_database() -> Option<(Settings, PgPool)> {
    let mut configuration = get_configuration().expect("Failed to get configuration");
    configuration.database.database_name = Uuid::new_v4().to_string();

    match create_database(&configuration.database).await {
        Ok(pool) => Some((configuration, pool)),
        Err(err) => {
            eprintln!("Skipping tests: failed to connect to postgres: {}", err);
            None
        }
    }
}

async fn create_database(config: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
    let mut connection = PgConnection::connect(&config.connection_string_without_db()).await?;

    connection
        .execute(format!(r#"CREATE DATABASE "{}""#, config.database_name).as_str())
        .await?;

    let connection_pool = PgPool::connect(&config.connection_string()).await?;

    sqlx::migrate!("./migrations").run(&connection_pool).await?;

    Ok(connection_pool)
}
