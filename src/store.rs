// Recording store seam and per-request decode cache
// The persistent blob store lives outside this crate; the engine only ever
// reads bytes by id and borrows the decoded result.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::audio::decoder::{decode_bytes, DecodedSegment};

/// External key-value store of recorded audio bytes
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the raw bytes for a recording id, or `None` if absent
    async fn get(&self, id: &str) -> Option<Vec<u8>>;
}

/// In-memory store for tests and locally bundled sound libraries
#[derive(Default)]
pub struct MemoryStore {
    blobs: parking_lot::RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: impl Into<String>, bytes: Vec<u8>) {
        self.blobs.write().insert(id.into(), bytes);
    }

    pub fn remove(&self, id: &str) {
        self.blobs.write().remove(id);
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn get(&self, id: &str) -> Option<Vec<u8>> {
        self.blobs.read().get(id).cloned()
    }
}

/// Fetches and decodes recordings with a decode cache scoped to one playback
/// request. The cache must not outlive the request: recordings can be
/// replaced in the store between words.
pub struct ClipStore {
    store: Arc<dyn BlobStore>,
    cache: HashMap<String, Option<Arc<DecodedSegment>>>,
}

impl ClipStore {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            cache: HashMap::new(),
        }
    }

    /// Load and decode a recording. Fetch and decode misses both come back
    /// as `None`; the caller substitutes a nominal duration so the timeline
    /// stays well-formed. Results (including misses) are cached per id.
    pub async fn load(&mut self, id: &str) -> Option<Arc<DecodedSegment>> {
        if let Some(hit) = self.cache.get(id) {
            return hit.clone();
        }

        let decoded = match self.store.get(id).await {
            Some(bytes) => match decode_bytes(&bytes) {
                Ok(segment) => Some(Arc::new(segment)),
                Err(e) => {
                    tracing::warn!(id, "undecodable recording, treating as missing: {}", e);
                    None
                }
            },
            None => {
                tracing::debug!(id, "no stored bytes for recording");
                None
            }
        };

        self.cache.insert(id.to_string(), decoded.clone());
        decoded
    }
}
