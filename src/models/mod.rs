use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Shelf status of a game in a user's library
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LibraryStatus {
    Backlog,
    Playing,
    Completed,
    Abandoned,
}

impl LibraryStatus {
    /// Stable string form used for persistence and fingerprinting
    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryStatus::Backlog => "backlog",
            LibraryStatus::Playing => "playing",
            LibraryStatus::Completed => "completed",
            LibraryStatus::Abandoned => "abandoned",
        }
    }
}

impl std::str::FromStr for LibraryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backlog" => Ok(LibraryStatus::Backlog),
            "playing" => Ok(LibraryStatus::Playing),
            "completed" => Ok(LibraryStatus::Completed),
            "abandoned" => Ok(LibraryStatus::Abandoned),
            other => Err(format!("unknown library status: {}", other)),
        }
    }
}

/// A game the user owns, with its current shelf status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LibraryEntry {
    pub game_id: Uuid,
    pub status: LibraryStatus,
}

/// A game the user wants, with an optional target price
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WishlistEntry {
    pub game_id: Uuid,
    /// Price (in cents) below which the user wants to be notified
    pub target_price_cents: Option<i64>,
}

/// Read-only view of a user's current collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CollectionSnapshot {
    pub library: Vec<LibraryEntry>,
    pub wishlist: Vec<WishlistEntry>,
}

/// Deterministic digest of a collection's membership and tracked attributes
///
/// Two collections with the same entries and per-entry attributes always
/// produce the same fingerprint, regardless of storage order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct CollectionFingerprint(String);

impl CollectionFingerprint {
    pub fn new(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A recommended game with its relevance score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredGame {
    pub game_id: Uuid,
    pub score: f64,
}

/// Opaque recommendation payload
///
/// The cache core never looks inside: the engine produces it, the store
/// persists it as JSONB, and the API returns it verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RecommendationPayload(pub serde_json::Value);

impl RecommendationPayload {
    /// Builds a payload from scored games at the engine edge
    pub fn from_games(games: &[ScoredGame]) -> AppResult<Self> {
        let value = serde_json::to_value(games)
            .map_err(|e| AppError::Internal(format!("Payload serialization error: {}", e)))?;
        Ok(Self(value))
    }
}

/// One cached recommendation set per user
///
/// Created on first successful computation, replaced wholesale on every
/// subsequent one. `cached_at` is observability metadata; validity is
/// decided purely by fingerprint match, never by elapsed time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationCacheRecord {
    pub user_id: Uuid,
    pub fingerprint: CollectionFingerprint,
    pub cached_at: DateTime<Utc>,
    pub payload: RecommendationPayload,
}
