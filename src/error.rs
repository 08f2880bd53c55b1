use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, warn};

use crate::models::PlanResponse;

/// Custom error type for the application
///
/// Only the outcomes that leave the pipeline with a non-200 status live here.
/// Provider failures are folded into a 200 [`PlanResponse`] by the planner.
#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    ServiceUnavailable(String),
}

/// Body of a rejected request
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

const UNAVAILABLE_TITLE: &str = "旅游规划";
const UNAVAILABLE_DESCRIPTION: &str = "抱歉，服务暂时不可用，请稍后重试。";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::ValidationError(msg) => {
                warn!("Rejected request: {}", msg);
                let body = ErrorResponse {
                    error: format!("请求参数错误: {}", msg),
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            AppError::ServiceUnavailable(msg) => {
                error!("Internal server error: {}", msg);
                let body = PlanResponse {
                    description: Some(UNAVAILABLE_DESCRIPTION.to_string()),
                    error: Some(format!("服务暂时不可用: {}", msg)),
                    ..PlanResponse::new(UNAVAILABLE_TITLE)
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

/// Result type for application handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_error_is_bad_request() {
        let response = AppError::ValidationError("旅游需求不能为空".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"], "请求参数错误: 旅游需求不能为空");
        assert!(body.get("title").is_none());
    }

    #[tokio::test]
    async fn test_unavailable_keeps_plan_shape() {
        let response = AppError::ServiceUnavailable("boom".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "服务暂时不可用: boom");
        assert_eq!(body["title"], "旅游规划");
        assert_eq!(body["pois"], serde_json::json!([]));
    }
}
