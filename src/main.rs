use std::net::SocketAddr;
use std::sync::Arc;

use hairstyle_api_proxy::{api, auth, config, gemini, ledger};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    config::Config::dotenv_load();
    let config = config::Config::new().expect("Failed to load configuration");
    config::Config::print_env_vars();

    let ledger = ledger::SqliteLedger::new(config.database_path.clone());
    ledger
        .init()
        .await
        .expect("Failed to initialize the credit ledger");

    let state = Arc::new(api::routes::AppState {
        gemini: gemini::GeminiClient::new(&config),
        ledger,
        verifier: auth::AuthClient::new(config.auth_url.clone()),
    });

    let app = api::routes::router(state);

    // Run our application with safe parsing
    let host_str = config.api_host.clone();
    let port_str = config.api_port.clone();
    let ip: std::net::IpAddr = host_str.parse().unwrap_or_else(|_| {
        tracing::warn!("Invalid API_HOST '{}', falling back to 127.0.0.1", host_str);
        std::net::IpAddr::from([127, 0, 0, 1])
    });
    let port: u16 = port_str.parse().unwrap_or_else(|_| {
        tracing::warn!("Invalid API_PORT '{}', falling back to 8190", port_str);
        8190
    });
    let socket_address = SocketAddr::new(ip, port);
    tracing::info!("listening on {}", socket_address);
    axum::Server::bind(&socket_address)
        .serve(app.into_make_service())
        .await
        .unwrap();
}
