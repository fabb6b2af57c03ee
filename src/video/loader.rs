use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use crate::{
    foundation::error::{SignreelError, SignreelResult},
    video::{
        cache::{CacheInfo, VideoCache},
        catalog::VideoCandidate,
        fetch::{ExtractorFetcher, ExtractorOptions, Fetcher, HttpFetcher, HttpOptions, RetryPolicy},
    },
};

/// Result of walking a ranked candidate list.
#[derive(Debug)]
pub struct FetchOutcome<'c> {
    /// First candidate that produced a local file.
    pub hit: Option<(&'c VideoCandidate, PathBuf)>,
    /// Video ids that were tried and failed, in order.
    pub failed: Vec<String>,
}

/// Cache-first clip retrieval with retries and per-id download serialization.
pub struct VideoLoader {
    cache: VideoCache,
    fetchers: Vec<Box<dyn Fetcher>>,
    retry: RetryPolicy,
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for VideoLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoLoader")
            .field("cache", &self.cache)
            .field(
                "fetchers",
                &self.fetchers.iter().map(|x| x.name()).collect::<Vec<_>>(),
            )
            .field("retry", &self.retry)
            .finish()
    }
}

impl VideoLoader {
    /// Loader over `cache`. Fetchers are tried in order; the first whose
    /// [`Fetcher::handles`] accepts the URL is used.
    pub fn new(cache: VideoCache, fetchers: Vec<Box<dyn Fetcher>>, retry: RetryPolicy) -> Self {
        Self {
            cache,
            fetchers,
            retry,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Loader with the site extractor ahead of plain HTTP.
    pub fn with_default_fetchers(
        cache: VideoCache,
        http: &HttpOptions,
        extractor: ExtractorOptions,
        retry: RetryPolicy,
    ) -> SignreelResult<Self> {
        let fetchers: Vec<Box<dyn Fetcher>> = vec![
            Box::new(ExtractorFetcher::new(extractor)),
            Box::new(HttpFetcher::new(http)?),
        ];
        Ok(Self::new(cache, fetchers, retry))
    }

    /// Backing cache.
    pub fn cache(&self) -> &VideoCache {
        &self.cache
    }

    /// Whether `video_id` is already on disk.
    pub fn is_cached(&self, video_id: &str) -> bool {
        self.cache.is_cached(video_id)
    }

    /// Cached file for `video_id`, if present.
    pub fn local_path(&self, video_id: &str) -> Option<PathBuf> {
        self.cache.local_path(video_id)
    }

    /// Drop `video_id` from the cache. Returns whether a file was removed.
    pub fn remove(&self, video_id: &str) -> SignreelResult<bool> {
        self.cache.remove(video_id)
    }

    /// Cache statistics.
    pub fn cache_info(&self) -> SignreelResult<CacheInfo> {
        self.cache.info()
    }

    /// Empty the cache.
    pub fn clear_cache(&self) -> SignreelResult<()> {
        self.cache.clear()
    }

    /// Local file for `video_id`, downloading `url` on a miss (or always, with
    /// `force_refresh`). Concurrent calls for the same id share one download.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn get(&self, url: &str, video_id: &str, force_refresh: bool) -> SignreelResult<PathBuf> {
        if !force_refresh && let Some(path) = self.cache.local_path(video_id) {
            tracing::debug!(video_id, "cache hit");
            return Ok(path);
        }

        let slot = self.inflight_slot(video_id);
        let result = {
            let _guard = slot.lock().unwrap_or_else(|e| e.into_inner());
            // Another caller may have finished this id while we waited.
            match self.cache.local_path(video_id) {
                Some(path) if !force_refresh => Ok(path),
                _ => self.download(url, video_id),
            }
        };
        self.release_slot(video_id, slot);
        result
    }

    /// Try candidates in order until one yields a local file.
    pub fn fetch_first<'c>(&self, candidates: &[&'c VideoCandidate]) -> FetchOutcome<'c> {
        let mut failed = Vec::new();
        for &candidate in candidates {
            match self.get(&candidate.url, &candidate.video_id, false) {
                Ok(path) => {
                    return FetchOutcome {
                        hit: Some((candidate, path)),
                        failed,
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        video_id = %candidate.video_id,
                        source = %candidate.source,
                        error = %e,
                        "candidate unavailable, trying next"
                    );
                    failed.push(candidate.video_id.clone());
                }
            }
        }
        FetchOutcome { hit: None, failed }
    }

    fn download(&self, url: &str, video_id: &str) -> SignreelResult<PathBuf> {
        let fetcher = self
            .fetchers
            .iter()
            .find(|f| f.handles(url))
            .ok_or_else(|| SignreelError::not_found(format!("no fetcher accepts '{url}'")))?;

        match self.cache.evict_if_needed(Some(video_id)) {
            Ok(report) if report.evicted() => tracing::info!(
                removed = report.removed.len(),
                bytes_after = report.bytes_after,
                "cache trimmed before download"
            ),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "cache eviction failed"),
        }

        let partial = self.cache.partial_path_for(video_id);
        tracing::info!(video_id, url, fetcher = fetcher.name(), "downloading");
        let outcome = self.retry.run(video_id, |_| {
            let attempt = fetcher
                .fetch(url, &partial)
                .and_then(|_| self.cache.commit(video_id, &partial));
            if attempt.is_err() {
                let _ = std::fs::remove_file(&partial);
            }
            attempt
        });

        outcome.map_err(|e| {
            SignreelError::download(format!(
                "'{video_id}' unavailable after {} attempt(s): {e}",
                self.retry.max_attempts.max(1)
            ))
        })
    }

    fn inflight_slot(&self, video_id: &str) -> Arc<Mutex<()>> {
        let mut map = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(map.entry(video_id.to_string()).or_default())
    }

    fn release_slot(&self, video_id: &str, slot: Arc<Mutex<()>>) {
        let mut map = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        // Map entry plus ours: nobody else is waiting.
        if Arc::strong_count(&slot) == 2 {
            map.remove(video_id);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/video/loader.rs"]
mod tests;
