use std::time::Duration;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;

use seek_backend::config::Config;
use seek_backend::{configure, AppState};

/// Upper bound for any single outbound request.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let bind_addr = config.bind_addr.clone();
    let port = config.port;

    log::info!("Starting Seek to Earn backend on {}:{}", bind_addr, port);

    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .expect("Failed to build HTTP client");

    // Built once so caches and pending sign-ins are shared across workers
    let state = web::Data::new(AppState::new(config, http));

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .wrap(cors)
            .configure(configure)
    })
    .bind((bind_addr.as_str(), port))?
    .run()
    .await
}
