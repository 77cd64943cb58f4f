use composectl::configuration::get_configuration;
use composectl::env_store::EnvStore;
use composectl::startup::run;
use composectl::telemetry::{get_subscriber, init_subscriber};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let subscriber = get_subscriber("composectl".into(), "info".into());
    init_subscriber(subscriber);

    let configuration = get_configuration().expect("Failed to read configuration.");
    let store = match EnvStore::load(&configuration.env_file, &configuration.secrets_dir) {
        Ok(store) => store,
        Err(err) => {
            // a case-insensitive key conflict between the env store and
            // the secrets directory must stop the process
            tracing::error!("{}", err);
            std::process::exit(1);
        }
    };

    let address = format!(
        "{}:{}",
        configuration.listen_host, configuration.listen_port
    );
    tracing::info!("Start server at {:?}", &address);
    let listener = std::net::TcpListener::bind(&address)
        .unwrap_or_else(|_| panic!("failed to bind to {}", address));

    run(listener, configuration, store)?.await
}
