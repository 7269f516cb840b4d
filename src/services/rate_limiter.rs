use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

use crate::models::guest::GuestId;

/// Best-effort per-guest sliding window over inbound socket events.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<GuestId, VecDeque<Instant>>>>,
    limit: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            limit: limit as usize,
            window,
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Record one event for `guest_id`. `false` when the window is already full.
    pub async fn check(&self, guest_id: &GuestId) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let hits = windows.entry(*guest_id).or_default();

        while hits
            .front()
            .is_some_and(|oldest| now.duration_since(*oldest) >= self.window)
        {
            hits.pop_front();
        }

        if hits.len() >= self.limit {
            warn!("Rate limit exceeded for guest {}", guest_id);
            return false;
        }

        hits.push_back(now);
        true
    }

    pub async fn forget(&self, guest_id: &GuestId) {
        self.windows.lock().await.remove(guest_id);
    }

    /// Drop windows with no events inside the current period.
    pub async fn purge_stale(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, hits| {
            hits.back()
                .is_some_and(|latest| now.duration_since(*latest) < self.window)
        });
        before - windows.len()
    }
}
