use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{CollectionFingerprint, RecommendationCacheRecord, RecommendationPayload},
};

/// Durable per-user recommendation cache record store
///
/// At most one record per user; `put` replaces any prior record atomically
/// so a concurrent reader never sees a half-written record.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecommendationCacheStore: Send + Sync {
    async fn get(&self, user_id: Uuid) -> AppResult<Option<RecommendationCacheRecord>>;

    async fn put(&self, user_id: Uuid, record: &RecommendationCacheRecord) -> AppResult<()>;

    async fn delete(&self, user_id: Uuid) -> AppResult<()>;
}

/// Postgres-backed store, one row per user in `recommendation_cache`
pub struct PgRecommendationCacheStore {
    pool: PgPool,
}

impl PgRecommendationCacheStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: PgRow) -> AppResult<RecommendationCacheRecord> {
    let fingerprint: String = row
        .try_get("collection_fingerprint")
        .map_err(|e| AppError::Internal(format!("Cache row decode error: {}", e)))?;
    let payload: serde_json::Value = row
        .try_get("payload")
        .map_err(|e| AppError::Internal(format!("Cache row decode error: {}", e)))?;

    Ok(RecommendationCacheRecord {
        user_id: row
            .try_get("user_id")
            .map_err(|e| AppError::Internal(format!("Cache row decode error: {}", e)))?,
        fingerprint: CollectionFingerprint::new(fingerprint),
        cached_at: row
            .try_get("cached_at")
            .map_err(|e| AppError::Internal(format!("Cache row decode error: {}", e)))?,
        payload: RecommendationPayload(payload),
    })
}

#[async_trait::async_trait]
impl RecommendationCacheStore for PgRecommendationCacheStore {
    async fn get(&self, user_id: Uuid) -> AppResult<Option<RecommendationCacheRecord>> {
        let row = sqlx::query(
            "SELECT user_id, collection_fingerprint, cached_at, payload \
             FROM recommendation_cache WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        row.map(record_from_row).transpose()
    }

    async fn put(&self, user_id: Uuid, record: &RecommendationCacheRecord) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO recommendation_cache (user_id, collection_fingerprint, cached_at, payload) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 collection_fingerprint = EXCLUDED.collection_fingerprint, \
                 cached_at = EXCLUDED.cached_at, \
                 payload = EXCLUDED.payload",
        )
        .bind(user_id)
        .bind(record.fingerprint.as_str())
        .bind(record.cached_at)
        .bind(&record.payload.0)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        tracing::debug!(%user_id, fingerprint = %record.fingerprint, "Cache record stored");

        Ok(())
    }

    async fn delete(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM recommendation_cache WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        tracing::info!(%user_id, "Cache record invalidated");

        Ok(())
    }
}
