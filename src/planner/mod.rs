//! The planning pipeline: scope check, model call, reply parsing and place
//! resolution, folded into one [`PlanResponse`].

pub mod chat;
pub mod region;
pub mod reply;
pub mod resolver;

use std::sync::Arc;

use tracing::{info, warn};

use crate::amap::PlaceSearch;
use crate::models::{PlanResponse, TravelRequest};
use chat::{ChatCompletion, SYSTEM_PROMPT};
use reply::{ParsedPlan, ReplyMode};
use resolver::{Pacing, PoiResolver};

const OUT_OF_SCOPE_ERROR: &str = "抱歉，我们的旅游规划服务目前仅支持中国大陆地区。";
const OUT_OF_SCOPE_TITLE: &str = "服务范围提醒";
const OUT_OF_SCOPE_DESCRIPTION: &str = "我们专注于为您提供国内旅游的精准规划服务，包括景点推荐、路线规划、美食指南等。如需国内旅游规划，请重新输入您的需求。";
const DEGRADED_TITLE: &str = "AI旅游规划";

/// Runs the planning pipeline against a chat model and a place provider.
#[derive(Clone)]
pub struct TripPlanner {
    chat: Arc<dyn ChatCompletion>,
    places: Arc<dyn PlaceSearch>,
    pacing: Pacing,
}

impl TripPlanner {
    pub fn new(chat: Arc<dyn ChatCompletion>, places: Arc<dyn PlaceSearch>) -> Self {
        Self {
            chat,
            places,
            pacing: Pacing::default(),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Plans a trip for an already validated request. Provider failures end
    /// up in `error` next to a best-effort plan, never as an `Err`.
    pub async fn plan(&self, request: &TravelRequest) -> PlanResponse {
        let prompt = request.prompt.as_str();

        if region::is_out_of_domain(prompt) {
            info!("Out-of-scope destination in prompt: {}", prompt);
            return out_of_scope();
        }

        let extracted = region::extract_region(prompt);
        let search_region = request.explicit_city().or(extracted);
        info!(
            "Region: extracted {:?}, provided {:?}, searching {:?}",
            extracted, request.city, search_region
        );

        let (plan, chat_error) = match self.draft(request).await {
            Ok(plan) => (plan, None),
            Err(e) => {
                warn!("Chat completion failed: {}", e);
                let plan = ParsedPlan {
                    mode: ReplyMode::FreshPlan,
                    title: DEGRADED_TITLE.to_string(),
                    description: None,
                    keywords: reply::fallback_keywords(prompt),
                };
                (plan, Some(e.user_message()))
            }
        };
        info!("Plan '{}' with keywords {:?}", plan.title, plan.keywords);

        let mut response = PlanResponse {
            description: plan.description,
            error: chat_error,
            ..PlanResponse::new(plan.title)
        };

        if plan.keywords.is_empty() {
            info!("No keywords to resolve, skipping place search");
            return response;
        }

        let resolver = PoiResolver::new(self.places.as_ref(), self.pacing);
        response.pois = resolver.resolve_all(&plan.keywords, search_region).await;
        info!("Resolved {} places", response.pois.len());
        response
    }

    async fn draft(&self, request: &TravelRequest) -> Result<ParsedPlan, chat::ChatError> {
        let history = request.history();
        info!(
            "Requesting itinerary ({} history turns) for: {}",
            history.len(),
            request.prompt
        );
        let raw = self
            .chat
            .complete(SYSTEM_PROMPT, history, &request.prompt)
            .await?;
        Ok(reply::parse_reply(&raw, &request.prompt))
    }
}

fn out_of_scope() -> PlanResponse {
    PlanResponse {
        description: Some(OUT_OF_SCOPE_DESCRIPTION.to_string()),
        error: Some(OUT_OF_SCOPE_ERROR.to_string()),
        ..PlanResponse::new(OUT_OF_SCOPE_TITLE)
    }
}
