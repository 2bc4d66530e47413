use log::{error, info, LevelFilter};
use rocket::{Error as RocketError, Ignite, Rocket};
use thiserror::Error;

const LOG_CONFIG: &str = "log4rs.yaml";

#[derive(Debug, Error)]
enum Error {
    #[error("Failed to initialise logging from {LOG_CONFIG}: {0}")]
    Logging(String),
    #[error(transparent)]
    Rocket(#[from] RocketError),
}

fn init_logging() -> Result<(), Error> {
    log4rs::init_file(LOG_CONFIG, log4rs_dynamic_filters::default_deserializers())
        .map_err(|err| Error::Logging(err.to_string()))
}

fn announce(rocket: &Rocket<Ignite>) {
    let config = rocket.config();
    let scheme = if config.tls_enabled() { "https" } else { "http" };
    info!(
        "Serving {} routes on {scheme}://{}:{}",
        rocket.routes().count(),
        config.address,
        config.port
    );
}

async fn run() -> Result<(), Error> {
    let rocket = evote_backend::build().ignite().await?;
    announce(&rocket);
    // Rocket's own launch banner and per-request lines are replaced by
    // `LoggerFairing` from here on.
    log4rs_dynamic_filters::DynamicLevelFilter::set("rocket", LevelFilter::Off);
    rocket.launch().await?;
    Ok(())
}

#[rocket::main]
async fn main() {
    if let Err(err) = init_logging() {
        eprintln!("{err}");
        std::process::exit(1)
    }

    if let Err(err) = run().await {
        error!("{err}");
        error!("Server stopped after a critical failure");
        std::process::exit(1)
    }
}
