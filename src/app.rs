use std::any::Any;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use axum::{Extension, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::amap::AmapClient;
use crate::config::Config;
use crate::error::AppError;
use crate::planner::TripPlanner;
use crate::planner::chat::OpenAiChat;
use crate::routes::create_routes;

/// Initialize tracing and logging for the application
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Create the application from configuration. Fails when a provider
/// credential is missing.
pub fn create_app(config: Config) -> anyhow::Result<Router> {
    info!("Initializing application router");

    let chat = OpenAiChat::from_settings(&config.chat)?;

    let amap_key = config.amap_key.as_deref().ok_or_else(|| {
        anyhow::anyhow!("缺少高德地图Web服务API密钥，请设置环境变量 AMAP_WEB_KEY")
    })?;
    let places = AmapClient::new(amap_key)?;
    info!("Provider clients initialized");

    let planner = TripPlanner::new(Arc::new(chat), Arc::new(places));
    Ok(build_router(Arc::new(planner), Arc::new(config)))
}

/// Wires routes and middleware around a ready planner.
pub fn build_router(planner: Arc<TripPlanner>, config: Arc<Config>) -> Router {
    Router::new()
        .merge(create_routes())
        .layer(Extension(planner))
        .layer(Extension(config))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "服务器内部错误".to_string()
    };
    AppError::ServiceUnavailable(detail).into_response()
}
