use std::time::Duration;

use async_trait::async_trait;
use rig::{
    agent::Agent,
    completion::{Chat, CompletionError, Message, PromptError},
    providers::openai,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ChatSettings;
use crate::models::{ChatTurn, TurnKind};

pub const TEMPERATURE: f64 = 0.7;
pub const CHAT_TIMEOUT: Duration = Duration::from_secs(10);
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub const SYSTEM_PROMPT: &str = r#"你是旅游规划师，只负责中国大陆地区的旅游行程。根据用户需求制定行程，回答要简洁，避免超时。你可以结合之前的对话内容回答。

要求：
- 仔细阅读对话历史，理解用户的具体需求。
- 如果用户询问已有行程中某一天的安排（例如"第三天怎么玩"），在对话历史里找到你之前给出的完整行程，只使用那一天已经列出的景点，给出时间、交通、用餐建议。不要混淆天数，也不要编造新的景点。
- 如果是全新的旅游规划，严格按用户指定的地区推荐景点，景点名称要准确，景点总数不超过10个。

回答格式：

询问某一天的详细安排时：
【详细规划】第X天具体行程安排：
8:00-9:00 [具体活动]
9:00-12:00 [具体景点] - [游览建议]
12:00-13:00 [用餐建议]
13:00-17:00 [下午安排]
17:00-19:00 [晚餐和休息]
交通：[具体交通方案]
费用：[预估费用]
小贴士：[实用建议]

全新的旅游规划时：
标题：[简洁的行程标题]
📍 推荐景点：
[按天列出的行程安排，天数越多每天越简略]
[4天以上的行程在结尾提示用户可以继续询问某一天的详细安排]
关键景点：[所有景点名称，用逗号分隔]"#;

/// Provider error bodies arrive without their HTTP status, so failures are
/// recognised by what the body says. Compared against lowercased text.
const AUTH_MARKERS: &[&str] = &[
    "unauthorized",
    "authentication",
    "invalid_api_key",
    "incorrect api key",
    "invalid api key",
];
const RATE_LIMIT_MARKERS: &[&str] = &["rate limit", "rate_limit", "too many requests"];

/// Why a chat completion produced no reply.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat completion timed out")]
    Timeout,

    #[error("chat provider rejected the credentials: {0}")]
    Auth(String),

    #[error("chat provider rate limit hit: {0}")]
    RateLimited(String),

    #[error("cannot reach chat provider: {0}")]
    Network(String),

    #[error("{0}")]
    Unknown(String),
}

impl ChatError {
    /// Classifies a provider failure by what its message says.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();

        if lowered.contains("timeout") || lowered.contains("timed out") {
            ChatError::Timeout
        } else if message.contains("401")
            || AUTH_MARKERS.iter().any(|marker| lowered.contains(marker))
        {
            ChatError::Auth(message)
        } else if message.contains("429")
            || RATE_LIMIT_MARKERS.iter().any(|marker| lowered.contains(marker))
        {
            ChatError::RateLimited(message)
        } else if lowered.contains("network")
            || message.contains("ENOTFOUND")
            || lowered.contains("dns error")
            || lowered.contains("connection refused")
        {
            ChatError::Network(message)
        } else {
            ChatError::Unknown(message)
        }
    }

    /// The short text shown to the user in place of a plan.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Timeout => "AI响应超时，请稍后重试".to_string(),
            ChatError::Auth(_) => "AI服务认证失败，请检查API密钥配置".to_string(),
            ChatError::RateLimited(_) => "AI服务请求过于频繁，请稍后重试".to_string(),
            ChatError::Network(_) => "网络连接失败，请检查网络设置".to_string(),
            ChatError::Unknown(message) => format!("AI服务错误: {}", message),
        }
    }
}

impl From<PromptError> for ChatError {
    fn from(err: PromptError) -> Self {
        match err {
            PromptError::CompletionError(CompletionError::HttpError(e)) if e.is_timeout() => {
                ChatError::Timeout
            }
            PromptError::CompletionError(CompletionError::HttpError(e)) if e.is_connect() => {
                ChatError::Network(e.to_string())
            }
            other => ChatError::from_message(other.to_string()),
        }
    }
}

/// One round-trip to a chat-completion model.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Sends `system_prompt`, then `history` in order, then `prompt`, and
    /// returns the model's reply text.
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        prompt: &str,
    ) -> Result<String, ChatError>;
}

/// Chat completion over any OpenAI-compatible endpoint.
pub struct OpenAiChat {
    client: openai::Client,
    model: String,
    timeout: Duration,
}

impl OpenAiChat {
    /// Fails when no API key is configured.
    pub fn from_settings(settings: &ChatSettings) -> anyhow::Result<Self> {
        let api_key = settings
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("缺少AI API密钥，请设置环境变量 OPENAI_API_KEY"))?;
        let base_url = settings.base_url.as_deref().unwrap_or(OPENAI_BASE_URL);

        info!(
            "Chat provider: {} at {} with model {}",
            settings.provider(),
            base_url,
            settings.model
        );

        Ok(Self {
            client: openai::Client::from_url(api_key, base_url),
            model: settings.model.clone(),
            timeout: CHAT_TIMEOUT,
        })
    }

    fn agent(&self, system_prompt: &str) -> Agent<openai::CompletionModel> {
        self.client
            .agent(&self.model)
            .preamble(system_prompt)
            .temperature(TEMPERATURE)
            .build()
    }
}

pub fn to_messages(history: &[ChatTurn]) -> Vec<Message> {
    history
        .iter()
        .map(|turn| match turn.kind {
            TurnKind::User => Message::user(turn.content.clone()),
            TurnKind::Ai => Message::assistant(turn.content.clone()),
        })
        .collect()
}

#[async_trait]
impl ChatCompletion for OpenAiChat {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        prompt: &str,
    ) -> Result<String, ChatError> {
        let agent = self.agent(system_prompt);
        let messages = to_messages(history);

        let user_turns = history.iter().filter(|t| t.kind == TurnKind::User).count();
        debug!(
            "Sending {} messages ({} history: {} user, {} assistant), ~{} chars",
            messages.len() + 2,
            history.len(),
            user_turns,
            history.len() - user_turns,
            system_prompt.chars().count()
                + prompt.chars().count()
                + history.iter().map(|t| t.content.chars().count()).sum::<usize>()
        );

        let reply = tokio::time::timeout(self.timeout, agent.chat(prompt.to_string(), messages))
            .await
            .map_err(|_| ChatError::Timeout)??;
        Ok(reply)
    }
}
