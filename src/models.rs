use serde::{Deserialize, Serialize};

pub const MAX_PROMPT_CHARS: usize = 1000;

/// Request payload for the planning endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelRequest {
    pub prompt: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub chat_history: Option<Vec<ChatTurn>>,
}

/// Who produced a turn of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    User,
    Ai,
}

/// One earlier message of the conversation, as the client recorded it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatTurn {
    #[serde(rename = "type")]
    pub kind: TurnKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// A keyword resolved to a real place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPlace {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub lat: f64,
    pub lng: f64,
}

/// Response payload for the planning endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanResponse {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub pois: Vec<ResolvedPlace>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response payload for the health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

/// Response payload for the configuration diagnostics endpoint
#[derive(Debug, Serialize)]
pub struct EnvReport {
    pub success: bool,
    pub message: String,
    pub data: EnvDetails,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvDetails {
    #[serde(rename = "hasOpenAIKey")]
    pub has_openai_key: bool,
    #[serde(rename = "openAIKeyPrefix")]
    pub openai_key_prefix: String,
    #[serde(rename = "baseURL")]
    pub base_url: String,
    pub model: String,
    pub provider: String,
    pub has_amap_key: bool,
    pub timestamp: u64,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            message: "Service is healthy".to_string(),
        }
    }
}

impl TravelRequest {
    /// Checks the prompt bounds and returns every violation found.
    pub fn validate(&self) -> Result<(), Vec<&'static str>> {
        let mut problems = Vec::new();
        let length = self.prompt.chars().count();
        if length == 0 {
            problems.push("旅游需求不能为空");
        }
        if length > MAX_PROMPT_CHARS {
            problems.push("旅游需求过长");
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    /// The caller-supplied city, ignoring blank values.
    pub fn explicit_city(&self) -> Option<&str> {
        self.city
            .as_deref()
            .map(str::trim)
            .filter(|city| !city.is_empty())
    }

    pub fn history(&self) -> &[ChatTurn] {
        self.chat_history.as_deref().unwrap_or_default()
    }
}

impl PlanResponse {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}
