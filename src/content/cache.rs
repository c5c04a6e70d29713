//! Public page cache
//!
//! A miss hands out a [`FillTicket`] stamped with the cache clock. Every
//! invalidation advances the clock, and a fill whose ticket predates an
//! invalidation of its page is dropped, so a read that raced a write cannot
//! put the old sections back.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::models::PageSection;

/// Per-page invalidation stamps kept before they are folded into one floor
const MAX_TRACKED_INVALIDATIONS: usize = 1024;

/// Permission to store a freshly loaded page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillTicket {
    page_slug: String,
    issued: u64,
}

impl FillTicket {
    pub fn page_slug(&self) -> &str {
        &self.page_slug
    }
}

#[derive(Debug)]
pub enum CacheLookup {
    Hit(Vec<PageSection>),
    Miss(FillTicket),
}

#[async_trait]
pub trait PageCache: Send + Sync {
    async fn get(&self, page_slug: &str) -> CacheLookup;

    /// Store the sections loaded after a miss, unless the page was
    /// invalidated since the ticket was issued
    async fn set(&self, ticket: FillTicket, sections: Vec<PageSection>);

    async fn invalidate(&self, page_slug: &str);

    async fn clear(&self);
}

struct Entry {
    sections: Vec<PageSection>,
    stored_at: Instant,
}

#[derive(Default)]
struct State {
    entries: HashMap<String, Entry>,
    invalidated: HashMap<String, u64>,
    /// Tickets issued before this are stale for every page
    floor: u64,
    clock: u64,
}

impl State {
    fn is_stale(&self, ticket: &FillTicket) -> bool {
        self.floor > ticket.issued
            || self
                .invalidated
                .get(&ticket.page_slug)
                .is_some_and(|&at| at > ticket.issued)
    }
}

/// Process-local cache with a fixed time to live per page
#[derive(Clone)]
pub struct TtlPageCache {
    state: Arc<RwLock<State>>,
    ttl: Duration,
}

impl TtlPageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            ttl,
        }
    }

    /// Number of pages currently held, expired ones included
    pub async fn cached_pages(&self) -> usize {
        self.state.read().await.entries.len()
    }
}

#[async_trait]
impl PageCache for TtlPageCache {
    async fn get(&self, page_slug: &str) -> CacheLookup {
        {
            let state = self.state.read().await;
            if let Some(entry) = state.entries.get(page_slug) {
                if entry.stored_at.elapsed() < self.ttl {
                    return CacheLookup::Hit(entry.sections.clone());
                }
            } else {
                return CacheLookup::Miss(FillTicket {
                    page_slug: page_slug.to_string(),
                    issued: state.clock,
                });
            }
        }

        // Expired: evict under the write lock, unless a fresh fill beat us to it
        let mut state = self.state.write().await;
        match state.entries.get(page_slug) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                CacheLookup::Hit(entry.sections.clone())
            }
            _ => {
                state.entries.remove(page_slug);
                tracing::debug!(page_slug, "page cache entry expired");
                CacheLookup::Miss(FillTicket {
                    page_slug: page_slug.to_string(),
                    issued: state.clock,
                })
            }
        }
    }

    async fn set(&self, ticket: FillTicket, sections: Vec<PageSection>) {
        let mut state = self.state.write().await;
        if state.is_stale(&ticket) {
            tracing::debug!(page_slug = %ticket.page_slug, "discarding stale page fill");
            return;
        }
        state.entries.insert(
            ticket.page_slug,
            Entry {
                sections,
                stored_at: Instant::now(),
            },
        );
    }

    async fn invalidate(&self, page_slug: &str) {
        let mut state = self.state.write().await;
        state.clock += 1;
        let now = state.clock;
        state.invalidated.insert(page_slug.to_string(), now);
        if state.invalidated.len() > MAX_TRACKED_INVALIDATIONS {
            // Outstanding fills for any page are dropped; cached pages stay
            state.floor = now;
            state.invalidated.clear();
        }
        state.entries.remove(page_slug);
        tracing::debug!(page_slug, "page cache invalidated");
    }

    async fn clear(&self) {
        let mut state = self.state.write().await;
        state.clock += 1;
        state.floor = state.clock;
        state.entries.clear();
        state.invalidated.clear();
    }
}

/// Cache that never holds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledPageCache;

#[async_trait]
impl PageCache for DisabledPageCache {
    async fn get(&self, page_slug: &str) -> CacheLookup {
        CacheLookup::Miss(FillTicket {
            page_slug: page_slug.to_string(),
            issued: 0,
        })
    }

    async fn set(&self, _ticket: FillTicket, _sections: Vec<PageSection>) {}

    async fn invalidate(&self, _page_slug: &str) {}

    async fn clear(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewSection;
    use chrono::Utc;
    use serde_json::json;

    fn section(id: i64, slug: &str) -> PageSection {
        NewSection {
            page_slug: slug.to_string(),
            section_key: format!("s{}", id),
            content: json!({"n": id}),
            order_index: 0,
            is_active: true,
        }
        .into_section(id, Utc::now())
    }

    fn ticket(lookup: CacheLookup) -> FillTicket {
        match lookup {
            CacheLookup::Miss(ticket) => ticket,
            CacheLookup::Hit(_) => panic!("expected a miss"),
        }
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = TtlPageCache::new(Duration::from_secs(300));

        let t = ticket(cache.get("about").await);
        assert_eq!(t.page_slug(), "about");
        cache.set(t, vec![section(1, "about")]).await;

        match cache.get("about").await {
            CacheLookup::Hit(sections) => assert_eq!(sections.len(), 1),
            CacheLookup::Miss(_) => panic!("expected a hit"),
        }
    }

    #[tokio::test]
    async fn test_invalidate_evicts() {
        let cache = TtlPageCache::new(Duration::from_secs(300));
        let t = ticket(cache.get("about").await);
        cache.set(t, vec![section(1, "about")]).await;

        cache.invalidate("about").await;
        assert!(matches!(cache.get("about").await, CacheLookup::Miss(_)));
    }

    #[tokio::test]
    async fn test_fill_after_invalidation_is_discarded() {
        let cache = TtlPageCache::new(Duration::from_secs(300));

        // A reader misses, then a writer invalidates before the reader fills
        let t = ticket(cache.get("about").await);
        cache.invalidate("about").await;
        cache.set(t, vec![section(1, "about")]).await;

        assert_eq!(cache.cached_pages().await, 0);
        assert!(matches!(cache.get("about").await, CacheLookup::Miss(_)));
    }

    #[tokio::test]
    async fn test_invalidation_is_per_page() {
        let cache = TtlPageCache::new(Duration::from_secs(300));
        let about = ticket(cache.get("about").await);
        cache.invalidate("footer").await;
        cache.set(about, vec![section(1, "about")]).await;

        assert!(matches!(cache.get("about").await, CacheLookup::Hit(_)));
    }

    #[tokio::test]
    async fn test_clear_discards_pending_fills() {
        let cache = TtlPageCache::new(Duration::from_secs(300));
        let t = ticket(cache.get("about").await);
        cache.clear().await;
        cache.set(t, vec![section(1, "about")]).await;
        assert_eq!(cache.cached_pages().await, 0);
    }

    #[tokio::test]
    async fn test_invalidation_stamps_stay_bounded() {
        let cache = TtlPageCache::new(Duration::from_secs(300));
        let t = ticket(cache.get("about").await);
        cache.set(t, vec![section(1, "about")]).await;
        let pending = ticket(cache.get("footer").await);

        for i in 0..=MAX_TRACKED_INVALIDATIONS {
            cache.invalidate(&format!("page-{}", i)).await;
        }
        assert!(cache.state.read().await.invalidated.len() <= MAX_TRACKED_INVALIDATIONS);

        // Folding drops pending fills but keeps what is cached
        cache.set(pending, vec![section(2, "footer")]).await;
        assert!(matches!(cache.get("footer").await, CacheLookup::Miss(_)));
        assert!(matches!(cache.get("about").await, CacheLookup::Hit(_)));

        let fresh = ticket(cache.get("footer").await);
        cache.set(fresh, vec![section(2, "footer")]).await;
        assert!(matches!(cache.get("footer").await, CacheLookup::Hit(_)));
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = TtlPageCache::new(Duration::from_millis(20));
        let t = ticket(cache.get("about").await);
        cache.set(t, vec![section(1, "about")]).await;

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(matches!(cache.get("about").await, CacheLookup::Miss(_)));
        assert_eq!(cache.cached_pages().await, 0);
    }

    #[tokio::test]
    async fn test_disabled_cache_never_hits() {
        let cache = DisabledPageCache;
        let t = ticket(cache.get("about").await);
        cache.set(t, vec![section(1, "about")]).await;
        assert!(matches!(cache.get("about").await, CacheLookup::Miss(_)));
    }
}
