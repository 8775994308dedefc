use actix_cors::Cors;
use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{middleware, App, HttpServer};
use std::io;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use kindred::config::{LoggingSettings, Settings};

/// LOG_LEVEL / LOG_FORMAT override the `[logging]` section
fn init_logging(settings: &LoggingSettings) {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| settings.level.clone());
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| settings.format.clone());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // KINDRED_CONFIG points at a single file instead of the config/ layers
    let loaded = match std::env::var("KINDRED_CONFIG") {
        Ok(path) => Settings::load_from(path),
        Err(_) => Settings::load(),
    };
    let settings = match loaded {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return Err(io::Error::new(io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    init_logging(&settings.logging);
    info!("Starting Kindred API...");

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);
    let per_second = settings.rate_limit.per_second;
    let burst_size = settings.rate_limit.burst_size;

    let state = kindred::build_state(settings).await.map_err(|e| {
        error!("Startup failed: {}", e);
        io::Error::new(io::ErrorKind::Other, e.to_string())
    })?;

    let governor_conf = GovernorConfigBuilder::default()
        .requests_per_second(per_second)
        .burst_size(burst_size)
        .use_headers()
        .finish()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid rate limit settings"))?;

    info!("Rate limiting: {} req/s, burst {}", per_second, burst_size);
    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .wrap(Governor::new(&governor_conf))
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(kindred::configure_app(state.clone()))
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
