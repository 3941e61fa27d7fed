use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{RecommendationCacheRecord, RecommendationPayload},
    services::{
        cache_store::RecommendationCacheStore,
        collection::CollectionReader,
        engine::RecommendationComputer,
        fingerprint::CollectionHasher,
        singleflight::{FlightError, InFlightMap},
    },
};

/// Coordinates the per-user recommendation cache
///
/// A cached payload is valid for as long as the stored fingerprint matches
/// the user's current collection fingerprint; there is no time-based
/// expiry. On miss or mismatch, at most one computation runs per user and
/// every concurrent caller shares its outcome.
pub struct RecommendationService {
    hasher: CollectionHasher,
    store: Arc<dyn RecommendationCacheStore>,
    computer: Arc<dyn RecommendationComputer>,
    in_flight: InFlightMap<RecommendationPayload>,
}

impl RecommendationService {
    pub fn new(
        reader: Arc<dyn CollectionReader>,
        store: Arc<dyn RecommendationCacheStore>,
        computer: Arc<dyn RecommendationComputer>,
    ) -> Self {
        Self {
            hasher: CollectionHasher::new(reader),
            store,
            computer,
            in_flight: InFlightMap::new(),
        }
    }

    /// Returns recommendations for a user, recomputing only when the
    /// collection has changed since they were last computed
    pub async fn get_recommendations(&self, user_id: Uuid) -> AppResult<RecommendationPayload> {
        // An unreadable collection is fatal to the request. Serving a
        // stale payload here would hide the failure, so it propagates.
        let current = self.hasher.fingerprint(user_id).await?;

        match self.store.get(user_id).await {
            Ok(Some(record)) if record.fingerprint == current => {
                tracing::debug!(%user_id, "Recommendation cache hit");
                return Ok(record.payload);
            }
            Ok(Some(record)) => {
                tracing::debug!(
                    %user_id,
                    stored = %record.fingerprint,
                    current = %current,
                    "Collection changed since last computation"
                );
            }
            Ok(None) => {
                tracing::debug!(%user_id, "No cached recommendations");
            }
            Err(e) => {
                // An unreadable cache must not serve garbage; recompute.
                tracing::warn!(%user_id, error = %e, "Cache read failed, treating as miss");
            }
        }

        let store = Arc::clone(&self.store);
        let computer = Arc::clone(&self.computer);
        let fingerprint = current.clone();

        let outcome = self
            .in_flight
            .run(user_id, async move {
                let payload = match computer.compute(user_id).await {
                    Ok(payload) => payload,
                    Err(AppError::ComputationFailed(msg)) => {
                        return Err(FlightError::Failed(msg));
                    }
                    Err(e) => return Err(FlightError::Failed(e.to_string())),
                };

                let record = RecommendationCacheRecord {
                    user_id,
                    fingerprint,
                    cached_at: Utc::now(),
                    payload: payload.clone(),
                };

                if let Err(e) = store.put(user_id, &record).await {
                    // Degraded success: the caller still gets the fresh
                    // payload, but the next call will recompute.
                    tracing::warn!(
                        %user_id,
                        error = %e,
                        "Recommendations computed but cache write failed"
                    );
                }

                Ok(payload)
            })
            .await;

        outcome.map_err(|e| match e {
            FlightError::Failed(msg) => AppError::ComputationFailed(msg),
            FlightError::Abandoned => {
                AppError::Internal("recommendation computation was dropped".to_string())
            }
        })
    }

    /// Administrative cache bust: removes the stored record so the next
    /// read recomputes regardless of fingerprint
    pub async fn invalidate(&self, user_id: Uuid) -> AppResult<()> {
        self.store.delete(user_id).await
    }
}
