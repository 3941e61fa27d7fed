use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{CollectionFingerprint, CollectionSnapshot},
    services::collection::CollectionReader,
};

/// Derives the fingerprint of a user's current collection
///
/// Reads the collection through the configured reader and hashes the
/// snapshot. A read failure surfaces as `CollectionUnavailable`; there is
/// deliberately no stale-cache fallback at this level.
pub struct CollectionHasher {
    reader: Arc<dyn CollectionReader>,
}

impl CollectionHasher {
    pub fn new(reader: Arc<dyn CollectionReader>) -> Self {
        Self { reader }
    }

    pub async fn fingerprint(&self, user_id: Uuid) -> AppResult<CollectionFingerprint> {
        let snapshot = self.reader.read_collection(user_id).await?;
        Ok(fingerprint_snapshot(&snapshot))
    }
}

/// Computes the fingerprint of a collection snapshot
///
/// Each entry is encoded as one line carrying every attribute that affects
/// recommendation relevance (game id, membership kind, library status,
/// wishlist target price). Lines are sorted before hashing so storage order
/// never affects the result.
pub fn fingerprint_snapshot(snapshot: &CollectionSnapshot) -> CollectionFingerprint {
    let mut lines: Vec<String> =
        Vec::with_capacity(snapshot.library.len() + snapshot.wishlist.len());

    for entry in &snapshot.library {
        lines.push(format!("lib:{}:{}", entry.game_id, entry.status.as_str()));
    }

    for entry in &snapshot.wishlist {
        let price = entry
            .target_price_cents
            .map(|cents| cents.to_string())
            .unwrap_or_default();
        lines.push(format!("wish:{}:{}", entry.game_id, price));
    }

    lines.sort_unstable();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }

    CollectionFingerprint::new(format!("{:x}", hasher.finalize()))
}
