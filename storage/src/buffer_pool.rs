use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use bytes::Bytes;
use lru::LruCache;
use serde::Serialize;

use common::err::DbResult;

use crate::page::PageId;

#[derive(Debug, Clone)]
struct CachedPage {
    data: Bytes,
    dirty: bool,
}

/// Bounded LRU cache of table pages shared by every connection.
/// Dirty pages are counted but never flushed from here; persistence is
/// the file manager's job, so eviction never blocks on dirty state.
#[derive(Debug)]
pub struct BufferPool {
    pages: RwLock<LruCache<PageId, CachedPage>>,

    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BufferPoolStats {
    pub total_pages: usize,
    pub dirty_pages: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub hit_rate: f64,
}

impl BufferPool {
    pub fn new(max_pages: usize) -> Self {
        let cap = NonZeroUsize::new(max_pages).unwrap_or(NonZeroUsize::new(256).unwrap());
        BufferPool {
            pages: RwLock::new(LruCache::new(cap)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the cached page or loads and caches it. The loader runs
    /// outside the cache lock; a `None` load is returned but not cached.
    pub fn get_page<F>(&self, id: &PageId, loader: F) -> DbResult<Option<Bytes>>
    where
        F: FnOnce() -> DbResult<Option<Bytes>>,
    {
        {
            let mut pages = self.pages.write().unwrap();
            if let Some(page) = pages.get(id) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(page.data.clone()));
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let loaded = loader()?;
        if let Some(data) = &loaded {
            let mut pages = self.pages.write().unwrap();
            pages.put(
                id.clone(),
                CachedPage {
                    data: data.clone(),
                    dirty: false,
                },
            );
        }
        Ok(loaded)
    }

    /// Installs a page and marks it dirty.
    pub fn put_page(&self, id: PageId, data: Bytes) {
        let mut pages = self.pages.write().unwrap();
        pages.put(id, CachedPage { data, dirty: true });
    }

    pub fn invalidate_page(&self, id: &PageId) {
        self.pages.write().unwrap().pop(id);
    }

    /// Drops every cached page of one table.
    pub fn invalidate_table(&self, table: &str) {
        let mut pages = self.pages.write().unwrap();
        let stale: Vec<PageId> = pages
            .iter()
            .filter(|(id, _)| id.table == table)
            .map(|(id, _)| id.clone())
            .collect();
        for id in stale {
            pages.pop(&id);
        }
    }

    pub fn clear(&self) {
        self.pages.write().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.pages.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> BufferPoolStats {
        let (total_pages, dirty_pages) = {
            let pages = self.pages.read().unwrap();
            (pages.len(), pages.iter().filter(|(_, p)| p.dirty).count())
        };
        let hit_count = self.hits.load(Ordering::Relaxed);
        let miss_count = self.misses.load(Ordering::Relaxed);
        let lookups = hit_count + miss_count;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hit_count as f64 / lookups as f64
        };
        BufferPoolStats {
            total_pages,
            dirty_pages,
            hit_count,
            miss_count,
            hit_rate,
        }
    }
}
