use trip_planner_svc::app::{create_app, init_tracing};
use trip_planner_svc::config::Config;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    // Load configuration
    let config = Config::from_env();

    // Initialize tracing/logging
    init_tracing(&config.log_level);

    info!("Starting trip planner service...");
    info!("Configuration loaded: {:?}", config);

    let bind_address = config.bind_address();
    let server_url = config.server_url();

    // Create the application
    let app = match create_app(config) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to create app: {}", e);
            std::process::exit(1);
        }
    };

    // Create TCP listener
    let listener = match tokio::net::TcpListener::bind(&bind_address).await {
        Ok(listener) => {
            info!("Server running on {}", server_url);
            info!("Health check: GET /health");
            info!("Planner endpoint: POST /api/ai");
            listener
        }
        Err(e) => {
            error!("Failed to bind to {}: {}", bind_address, e);
            std::process::exit(1);
        }
    };

    // Start the server
    info!("Server starting...");
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
    } else {
        info!("Server shutdown gracefully");
    }
}
