//! Site page content: cached public reads and bundled defaults

pub mod cache;
pub mod seed;

use std::sync::Arc;

pub use cache::{CacheLookup, DisabledPageCache, FillTicket, PageCache, TtlPageCache};

use crate::config::ContentConfig;
use crate::db::Store;
use crate::error::{Error, Result};
use crate::models::{check_page_slug, PageSection, SeedReport};

pub type SharedPageCache = Arc<dyn PageCache>;

/// Build the cache selected by configuration
pub fn build_cache(config: &ContentConfig) -> SharedPageCache {
    if config.cache_enabled {
        Arc::new(TtlPageCache::new(config.cache_ttl()))
    } else {
        Arc::new(DisabledPageCache)
    }
}

/// Active sections of a page in page order, served from cache when possible
pub async fn public_page(
    store: &dyn Store,
    cache: &dyn PageCache,
    page_slug: &str,
) -> Result<Vec<PageSection>> {
    check_page_slug(page_slug)?;

    match cache.get(page_slug).await {
        CacheLookup::Hit(sections) => Ok(sections),
        CacheLookup::Miss(ticket) => {
            let sections = store.page_sections(page_slug, true).await?;
            cache.set(ticket, sections.clone()).await;
            Ok(sections)
        }
    }
}

/// Replace a page with its bundled defaults and drop the cached copy
pub async fn seed_page(
    store: &dyn Store,
    cache: &dyn PageCache,
    page_slug: &str,
) -> Result<SeedReport> {
    let sections = seed::default_sections(page_slug)?.ok_or(Error::NotFound("Seed content"))?;
    let stored = store.replace_page(page_slug, sections).await?;
    cache.invalidate(page_slug).await;

    tracing::info!(page_slug, sections = stored.len(), "page_seeded");
    Ok(SeedReport {
        message: format!("Seeded {} sections for '{}'", stored.len(), page_slug),
        page_slug: page_slug.to_string(),
        sections: stored.into_iter().map(|s| s.section_key).collect(),
    })
}
