use parley::configuration::get_configuration;
use parley::startup::{build_identity_resolver, build_repository, run};
use parley::telemetry::{get_subscriber, init_subscriber};
use std::net::TcpListener;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let subscriber = get_subscriber("parley".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber);

    let settings = get_configuration().expect("Failed to read configuration.");

    let repo = build_repository(&settings).await?;
    let identity = build_identity_resolver(&settings);

    let address = format!("{}:{}", settings.app_host, settings.app_port);
    tracing::info!("Start server at {:?}", &address);
    let listener = TcpListener::bind(&address)?;

    run(listener, settings, repo, identity).await?.await
}
