//! Tile fetcher: cache lookup, transport, decode, cache fill.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

use crate::addressing::TileIndex;
use crate::cache::{TileCache, TileKey};
use crate::coalesce::{Registration, RequestCoalescer};
use crate::decode::{decode_tile, extract_pixels, Decoder};
use crate::error::{ElevationError, Result};
use crate::template::UrlTemplate;
use crate::tile::TileData;
use crate::transport::{is_empty_tile_placeholder, TileTransport, TransportResponse};

/// Longest slice of an unexpected not-found body quoted in errors.
const MAX_BODY_EXCERPT: usize = 120;

/// Cache and fetch statistics of a resolver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of tiles currently cached.
    pub entry_count: u64,
    /// Tile lookups answered from the cache.
    pub hit_count: u64,
    /// Tile lookups that missed the cache.
    pub miss_count: u64,
    /// Transport requests issued.
    pub fetch_count: u64,
    /// Misses that joined another caller's in-flight fetch.
    pub coalesced_count: u64,
}

impl CacheStats {
    /// Returns the cache hit rate as a fraction (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// Resolves a [`TileIndex`] into decoded elevations.
///
/// Tiles are served from the LRU cache when possible. On a miss, one
/// transport request is made per tile no matter how many callers are waiting
/// for it; successful results (including empty-tile placeholders) are
/// cached, failures are not.
pub(crate) struct TileFetcher {
    transport: Arc<dyn TileTransport>,
    template: UrlTemplate,
    zoom: u8,
    tile_size: u32,
    decoder: Decoder,
    cache: Mutex<TileCache>,
    coalescer: RequestCoalescer,
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
}

impl TileFetcher {
    pub(crate) fn new(
        transport: Arc<dyn TileTransport>,
        template: UrlTemplate,
        zoom: u8,
        tile_size: u32,
        decoder: Decoder,
        cache_size: usize,
    ) -> Self {
        Self {
            transport,
            template,
            zoom,
            tile_size,
            decoder,
            cache: Mutex::new(TileCache::new(cache_size)),
            coalescer: RequestCoalescer::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, TileCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cached(&self, key: &TileKey) -> Option<TileData> {
        self.lock_cache().get(key)
    }

    /// Transport address of a tile.
    pub(crate) fn url(&self, tile: TileIndex) -> String {
        self.template.expand(tile, self.zoom)
    }

    /// Whether a tile is cached, without refreshing its recency.
    pub(crate) fn is_cached(&self, tile: TileIndex) -> bool {
        self.lock_cache().contains(&TileKey::new(self.url(tile)))
    }

    /// Get a tile's elevations, fetching and decoding it if needed.
    pub(crate) async fn resolve(&self, tile: TileIndex) -> Result<TileData> {
        let url = self.url(tile);
        let key = TileKey::new(url.clone());

        if let Some(data) = self.cached(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(tile = %tile, url = %url, "tile cache hit");
            return Ok(data);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        loop {
            match self.coalescer.register(&key) {
                Registration::Leader(flight) => {
                    // A flight that finished since the lookup above has filled the cache
                    if let Some(data) = self.cached(&key) {
                        flight.complete(Ok(data.clone()));
                        return Ok(data);
                    }

                    let result = self.fetch(tile, &url).await;
                    match &result {
                        Ok(data) => self.lock_cache().put(key.clone(), data.clone()),
                        Err(e) => warn!(tile = %tile, url = %url, error = %e, "tile failed"),
                    }
                    flight.complete(result.clone());
                    return result;
                }
                Registration::Follower(mut rx) => match rx.recv().await {
                    Ok(result) => return result,
                    // Leader went away without an answer; try again
                    Err(_) => continue,
                },
            }
        }
    }

    async fn fetch(&self, tile: TileIndex, url: &str) -> Result<TileData> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        debug!(tile = %tile, url = %url, "fetching tile");

        let response = self
            .transport
            .fetch(url)
            .await
            .map_err(|e| ElevationError::TileFetch {
                tile,
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        match response {
            TransportResponse::Found(bytes) => {
                let decoded = extract_pixels(&bytes)
                    .and_then(|pixels| decode_tile(&pixels, self.tile_size, self.decoder.as_ref()));
                decoded.map_err(|source| ElevationError::Decode {
                    tile,
                    url: url.to_string(),
                    source,
                })
            }
            TransportResponse::NotFound(body) if is_empty_tile_placeholder(&body) => {
                debug!(tile = %tile, url = %url, "empty tile placeholder, using zero elevation");
                Ok(TileData::zeroed(self.tile_size))
            }
            TransportResponse::NotFound(body) => {
                let excerpt = String::from_utf8_lossy(&body[..body.len().min(MAX_BODY_EXCERPT)]);
                Err(ElevationError::TileFetch {
                    tile,
                    url: url.to_string(),
                    reason: format!("not found: {}", excerpt.trim()),
                })
            }
        }
    }

    pub(crate) fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.lock_cache().len() as u64,
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
            fetch_count: self.fetches.load(Ordering::Relaxed),
            coalesced_count: self.coalescer.coalesced_count(),
        }
    }

    pub(crate) fn cache_capacity(&self) -> usize {
        self.lock_cache().capacity()
    }
}
