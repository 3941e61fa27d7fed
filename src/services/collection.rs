use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{CollectionSnapshot, LibraryEntry, LibraryStatus, WishlistEntry},
};

/// Read-only access to a user's library and wishlist
///
/// The catalogue service owns these tables; this side only ever reads them
/// to derive the collection fingerprint.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CollectionReader: Send + Sync {
    async fn read_collection(&self, user_id: Uuid) -> AppResult<CollectionSnapshot>;
}

/// Postgres-backed collection reader
pub struct PgCollectionReader {
    pool: PgPool,
}

impl PgCollectionReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CollectionReader for PgCollectionReader {
    async fn read_collection(&self, user_id: Uuid) -> AppResult<CollectionSnapshot> {
        let library_rows =
            sqlx::query("SELECT game_id, status FROM library_entries WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    AppError::CollectionUnavailable(format!("library read failed: {}", e))
                })?;

        let mut library = Vec::with_capacity(library_rows.len());
        for row in library_rows {
            let game_id: Uuid = row
                .try_get("game_id")
                .map_err(|e| AppError::CollectionUnavailable(e.to_string()))?;
            let status: String = row
                .try_get("status")
                .map_err(|e| AppError::CollectionUnavailable(e.to_string()))?;
            let status: LibraryStatus = status.parse().map_err(AppError::CollectionUnavailable)?;
            library.push(LibraryEntry { game_id, status });
        }

        let wishlist_rows = sqlx::query(
            "SELECT game_id, target_price_cents FROM wishlist_entries WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::CollectionUnavailable(format!("wishlist read failed: {}", e)))?;

        let mut wishlist = Vec::with_capacity(wishlist_rows.len());
        for row in wishlist_rows {
            let game_id: Uuid = row
                .try_get("game_id")
                .map_err(|e| AppError::CollectionUnavailable(e.to_string()))?;
            let target_price_cents: Option<i64> = row
                .try_get("target_price_cents")
                .map_err(|e| AppError::CollectionUnavailable(e.to_string()))?;
            wishlist.push(WishlistEntry {
                game_id,
                target_price_cents,
            });
        }

        tracing::debug!(
            %user_id,
            library_count = library.len(),
            wishlist_count = wishlist.len(),
            "Collection snapshot read"
        );

        Ok(CollectionSnapshot { library, wishlist })
    }
}
