use reqwest::Client as HttpClient;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{RecommendationPayload, ScoredGame},
};

/// Boundary to the external recommendation engine
///
/// The engine may be slow (seconds) and may fail. The coordinator never
/// retries through this trait; its only obligation is to keep at most one
/// invocation in flight per user.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecommendationComputer: Send + Sync {
    async fn compute(&self, user_id: Uuid) -> AppResult<RecommendationPayload>;
}

/// HTTP client for the recommendation engine service
pub struct HttpRecommendationEngine {
    http_client: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl HttpRecommendationEngine {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            base_url,
            api_key,
        }
    }
}

#[async_trait::async_trait]
impl RecommendationComputer for HttpRecommendationEngine {
    async fn compute(&self, user_id: Uuid) -> AppResult<RecommendationPayload> {
        let url = format!("{}/users/{}/recommendations", self.base_url, user_id);

        tracing::debug!(%user_id, "Requesting recommendations from engine");

        let mut request = self.http_client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::ComputationFailed(format!("engine request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                %user_id,
                status = %status,
                body = %body,
                "Recommendation engine request failed"
            );
            return Err(AppError::ComputationFailed(format!(
                "engine returned status {}",
                status
            )));
        }

        let games: Vec<ScoredGame> = response
            .json()
            .await
            .map_err(|e| AppError::ComputationFailed(format!("engine response malformed: {}", e)))?;

        tracing::info!(%user_id, count = games.len(), "Recommendations computed by engine");

        RecommendationPayload::from_games(&games)
    }
}
