use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    Extension,
    extract::{Json, rejection::JsonRejection},
    response::Json as ResponseJson,
};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{EnvDetails, EnvReport, HealthResponse, PlanResponse, TravelRequest};
use crate::planner::TripPlanner;

const NOT_SET: &str = "未设置";

/// Health check handler
/// Returns the service status and health information
pub async fn health_check() -> AppResult<ResponseJson<HealthResponse>> {
    debug!("Health check endpoint called");

    let response = HealthResponse::ok();

    info!("Health check successful");
    Ok(ResponseJson(response))
}

/// Trip planning handler
/// Accepts a travel request and answers with a plan plus the places to pin.
/// Anything short of a malformed request is answered with 200.
pub async fn plan_handler(
    Extension(planner): Extension<Arc<TripPlanner>>,
    payload: Result<Json<TravelRequest>, JsonRejection>,
) -> AppResult<ResponseJson<PlanResponse>> {
    let Json(request) = payload?;
    info!(
        "Plan endpoint called with prompt: {}",
        request.prompt.chars().take(50).collect::<String>()
    );

    request
        .validate()
        .map_err(|problems| AppError::ValidationError(problems.join(", ")))?;

    let response = planner.plan(&request).await;

    info!(
        "Returning plan '{}' with {} places",
        response.title,
        response.pois.len()
    );
    Ok(ResponseJson(response))
}

/// Configuration diagnostics handler
/// Reports which provider settings are present without revealing secrets.
pub async fn env_report(Extension(config): Extension<Arc<Config>>) -> ResponseJson<EnvReport> {
    let chat = &config.chat;
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();

    ResponseJson(EnvReport {
        success: true,
        message: "环境变量检查完成".to_string(),
        data: EnvDetails {
            has_openai_key: chat.api_key.is_some(),
            openai_key_prefix: chat.masked_key().unwrap_or_else(|| NOT_SET.to_string()),
            base_url: chat.base_url.clone().unwrap_or_else(|| NOT_SET.to_string()),
            model: chat.model.clone(),
            provider: chat.provider().to_string(),
            has_amap_key: config.amap_key.is_some(),
            timestamp,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let result = health_check().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_env_report_masks_key() {
        let config = Config::from_vars(|name| match name {
            "OPENAI_API_KEY" => Some("sk-abcdefghijklmnop".to_string()),
            "OPENAI_BASE_URL" => Some("https://api.deepseek.com".to_string()),
            _ => None,
        });

        let ResponseJson(report) = env_report(Extension(Arc::new(config))).await;
        assert!(report.success);
        assert!(report.data.has_openai_key);
        assert_eq!(report.data.openai_key_prefix, "sk-abcde...");
        assert_eq!(report.data.base_url, "https://api.deepseek.com/v1");
        assert_eq!(report.data.provider, "deepseek");
        assert!(!report.data.has_amap_key);
    }

    #[tokio::test]
    async fn test_env_report_without_settings() {
        let config = Config::from_vars(|_| None);
        let ResponseJson(report) = env_report(Extension(Arc::new(config))).await;
        assert_eq!(report.data.openai_key_prefix, "未设置");
        assert_eq!(report.data.base_url, "未设置");
        assert_eq!(report.data.model, "deepseek-chat");
    }
}
