use chrono::{Duration as ChronoDuration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::blob::{BlobRecord, BlobStats};
use crate::models::room::RoomId;

#[derive(Default)]
struct BlobIndex {
    blobs: HashMap<Uuid, BlobRecord>,
    rooms: HashMap<RoomId, HashSet<Uuid>>,
}

impl BlobIndex {
    fn remove(&mut self, id: &Uuid) -> Option<BlobRecord> {
        let record = self.blobs.remove(id)?;
        if let Some(ids) = self.rooms.get_mut(&record.room_id) {
            ids.remove(id);
            if ids.is_empty() {
                self.rooms.remove(&record.room_id);
            }
        }
        Some(record)
    }
}

/// In-memory, room-partitioned cache of uploaded media.
#[derive(Clone)]
pub struct BlobStore {
    index: Arc<RwLock<BlobIndex>>,
    max_size: usize,
}

impl BlobStore {
    pub fn new(max_size: usize) -> Self {
        Self {
            index: Arc::new(RwLock::new(BlobIndex::default())),
            max_size,
        }
    }

    pub async fn put(
        &self,
        bytes: Vec<u8>,
        mime_type: String,
        original_name: String,
        room_id: &RoomId,
        ttl_minutes: u32,
    ) -> Result<Uuid> {
        if bytes.is_empty() {
            return Err(AppError::BadRequest("Empty upload".to_string()));
        }
        if bytes.len() > self.max_size {
            return Err(AppError::BlobTooLarge {
                size: bytes.len(),
                max: self.max_size,
            });
        }

        let now = Utc::now();
        let id = Uuid::new_v4();
        let size = bytes.len();
        let record = BlobRecord {
            id,
            bytes,
            mime_type,
            original_name,
            room_id: room_id.clone(),
            created_at: now,
            expires_at: now + ChronoDuration::minutes(i64::from(ttl_minutes)),
        };

        let mut index = self.index.write().await;
        index.rooms.entry(room_id.clone()).or_default().insert(id);
        index.blobs.insert(id, record);

        debug!("Stored blob {} ({} bytes) in room {}", id, size, room_id);
        Ok(id)
    }

    /// Fetch a live blob; an expired one is evicted on the spot.
    pub async fn get(&self, id: &Uuid) -> Option<BlobRecord> {
        {
            let index = self.index.read().await;
            match index.blobs.get(id) {
                None => return None,
                Some(record) if !record.is_expired() => return Some(record.clone()),
                Some(_) => {}
            }
        }

        let mut index = self.index.write().await;
        if index.blobs.get(id).is_some_and(BlobRecord::is_expired) {
            index.remove(id);
            debug!("Evicted expired blob {}", id);
        }
        None
    }

    /// Drop every blob of a room. Returns how many were removed.
    pub async fn delete_room(&self, room_id: &RoomId) -> usize {
        let mut index = self.index.write().await;
        let Some(ids) = index.rooms.remove(room_id) else {
            return 0;
        };

        let count = ids
            .iter()
            .filter(|id| index.blobs.remove(*id).is_some())
            .count();
        if count > 0 {
            info!("Deleted {} blobs for room {}", count, room_id);
        }
        count
    }

    /// Remove expired blobs nobody fetched. Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let mut index = self.index.write().await;
        let expired: Vec<Uuid> = index
            .blobs
            .values()
            .filter(|record| record.is_expired())
            .map(|record| record.id)
            .collect();

        for id in &expired {
            index.remove(id);
        }
        expired.len()
    }

    pub async fn stats(&self) -> BlobStats {
        let index = self.index.read().await;
        BlobStats {
            count: index.blobs.len(),
            room_count: index.rooms.len(),
            total_bytes: index.blobs.values().map(|record| record.bytes.len()).sum(),
        }
    }

    /// Run `sweep_expired` on a fixed interval for the life of the process.
    pub fn spawn_sweeper(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = store.sweep_expired().await;
                if removed > 0 {
                    info!("Blob sweep removed {} expired blobs", removed);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 1024 * 1024;

    fn room(name: &str) -> RoomId {
        RoomId::from(name.to_string())
    }

    async fn put(store: &BlobStore, room_id: &RoomId, ttl_minutes: u32) -> Uuid {
        store
            .put(b"payload".to_vec(), "image/png".into(), "cat.png".into(), room_id, ttl_minutes)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_store_and_get() {
        let store = BlobStore::new(MAX);
        let id = put(&store, &room("r1"), 120).await;

        let record = store.get(&id).await.expect("blob should be live");
        assert_eq!(record.bytes, b"payload");
        assert_eq!(record.mime_type, "image/png");
        assert_eq!(record.original_name, "cat.png");
        assert_eq!(record.room_id, room("r1"));
    }

    #[tokio::test]
    async fn test_expired_blob_is_evicted_on_read() {
        let store = BlobStore::new(MAX);
        let id = put(&store, &room("r1"), 0).await;

        assert!(store.get(&id).await.is_none());
        let stats = store.stats().await;
        assert_eq!(stats.count, 0);
        assert_eq!(stats.room_count, 0);
    }

    #[tokio::test]
    async fn test_delete_room_is_idempotent() {
        let store = BlobStore::new(MAX);
        let a = put(&store, &room("r1"), 120).await;
        let b = put(&store, &room("r1"), 120).await;
        let other = put(&store, &room("r2"), 120).await;

        assert_eq!(store.delete_room(&room("r1")).await, 2);
        assert_eq!(store.delete_room(&room("r1")).await, 0);

        assert!(store.get(&a).await.is_none());
        assert!(store.get(&b).await.is_none());
        assert!(store.get(&other).await.is_some());
        assert_eq!(store.stats().await.room_count, 1);
    }

    #[tokio::test]
    async fn test_sweep_prunes_empty_rooms() {
        let store = BlobStore::new(MAX);
        put(&store, &room("r1"), 0).await;
        put(&store, &room("r1"), 0).await;
        put(&store, &room("r2"), 120).await;

        assert_eq!(store.sweep_expired().await, 2);
        let stats = store.stats().await;
        assert_eq!(stats.count, 1);
        assert_eq!(stats.room_count, 1);
        assert_eq!(stats.total_bytes, b"payload".len());
    }

    #[tokio::test]
    async fn test_size_limits() {
        let store = BlobStore::new(4);
        let empty = store
            .put(Vec::new(), "text/plain".into(), "a.txt".into(), &room("r"), 1)
            .await;
        assert!(matches!(empty, Err(AppError::BadRequest(_))));

        let big = store
            .put(vec![0u8; 5], "text/plain".into(), "a.txt".into(), &room("r"), 1)
            .await;
        assert!(matches!(big, Err(AppError::BlobTooLarge { size: 5, max: 4 })));
    }
}
