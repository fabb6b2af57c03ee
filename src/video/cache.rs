use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};

use anyhow::Context as _;

use crate::foundation::error::{SignreelError, SignreelResult};

const CLIP_EXT: &str = "mp4";
const PARTIAL_EXT: &str = "mp4.part";

/// Size ceiling and eviction watermarks.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CacheLimits {
    /// Ceiling on total cached bytes.
    pub max_bytes: u64,
    /// Sweep runs once usage reaches this fraction of `max_bytes`.
    pub high_water: f64,
    /// Sweep removes files until usage is at or below this fraction.
    pub low_water: f64,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024 * 1024,
            high_water: 0.9,
            low_water: 0.7,
        }
    }
}

impl CacheLimits {
    /// Reject watermarks that cannot make progress.
    pub fn validate(&self) -> SignreelResult<()> {
        if self.max_bytes == 0 {
            return Err(SignreelError::validation("cache max_bytes must be non-zero"));
        }
        let in_unit = |v: f64| v > 0.0 && v <= 1.0;
        if !in_unit(self.high_water) || !in_unit(self.low_water) {
            return Err(SignreelError::validation(
                "cache watermarks must be in (0, 1]",
            ));
        }
        if self.low_water >= self.high_water {
            return Err(SignreelError::validation(
                "cache low_water must be below high_water",
            ));
        }
        Ok(())
    }

    fn high_bytes(&self) -> u64 {
        (self.max_bytes as f64 * self.high_water) as u64
    }

    fn low_bytes(&self) -> u64 {
        (self.max_bytes as f64 * self.low_water) as u64
    }
}

/// One cached clip as found on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    /// Cache key (file stem).
    pub key: String,
    /// Absolute file path.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
}

/// Aggregate cache statistics.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct CacheInfo {
    /// Cache directory.
    pub dir: PathBuf,
    /// Number of cached clips.
    pub file_count: usize,
    /// Sum of clip sizes.
    pub total_bytes: u64,
    /// Configured ceiling.
    pub max_bytes: u64,
}

/// What an eviction sweep did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EvictionReport {
    /// Usage before the sweep.
    pub bytes_before: u64,
    /// Usage after the sweep.
    pub bytes_after: u64,
    /// Removed files, oldest first.
    pub removed: Vec<PathBuf>,
}

impl EvictionReport {
    /// Whether the sweep ran and removed anything.
    pub fn evicted(&self) -> bool {
        !self.removed.is_empty()
    }
}

/// Directory of `<key>.mp4` files. The directory listing is the only index: a clip is cached
/// exactly when its file exists.
#[derive(Clone, Debug)]
pub struct VideoCache {
    dir: PathBuf,
    limits: CacheLimits,
}

impl VideoCache {
    /// Open (creating if needed) the cache at `dir`.
    pub fn open(dir: impl Into<PathBuf>, limits: CacheLimits) -> SignreelResult<Self> {
        limits.validate()?;
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create cache directory '{}'", dir.display()))?;
        Ok(Self { dir, limits })
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Active limits.
    pub fn limits(&self) -> CacheLimits {
        self.limits
    }

    /// File path a key maps to, whether or not it exists.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{CLIP_EXT}", file_stem_for(key)))
    }

    /// Scratch path a download streams into before it is committed.
    pub fn partial_path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{PARTIAL_EXT}", file_stem_for(key)))
    }

    /// Whether the key has a committed file.
    pub fn is_cached(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }

    /// Committed file for the key, if any.
    pub fn local_path(&self, key: &str) -> Option<PathBuf> {
        let path = self.path_for(key);
        path.is_file().then_some(path)
    }

    /// Atomically publish a finished download under `key`.
    pub fn commit(&self, key: &str, partial: &Path) -> SignreelResult<PathBuf> {
        let path = self.path_for(key);
        std::fs::rename(partial, &path).with_context(|| {
            format!(
                "failed to move '{}' into cache as '{}'",
                partial.display(),
                path.display()
            )
        })?;
        Ok(path)
    }

    /// Delete one entry. Returns whether a file was removed.
    pub fn remove(&self, key: &str) -> SignreelResult<bool> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("failed to remove '{}'", path.display()))
                .into()),
        }
    }

    /// Every committed clip. Scratch files are not entries.
    pub fn entries(&self) -> SignreelResult<Vec<CacheEntry>> {
        let mut out = Vec::new();
        let listing = std::fs::read_dir(&self.dir)
            .with_context(|| format!("failed to list cache '{}'", self.dir.display()))?;
        for entry in listing {
            let entry = entry.with_context(|| format!("failed to list cache '{}'", self.dir.display()))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CLIP_EXT) {
                continue;
            }
            let meta = entry
                .metadata()
                .with_context(|| format!("failed to stat '{}'", path.display()))?;
            if !meta.is_file() {
                continue;
            }
            let key = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            out.push(CacheEntry {
                key,
                size: meta.len(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                path,
            });
        }
        Ok(out)
    }

    /// File count and total size.
    pub fn info(&self) -> SignreelResult<CacheInfo> {
        let entries = self.entries()?;
        Ok(CacheInfo {
            dir: self.dir.clone(),
            file_count: entries.len(),
            total_bytes: entries.iter().map(|e| e.size).sum(),
            max_bytes: self.limits.max_bytes,
        })
    }

    /// Remove the whole directory and recreate it empty.
    pub fn clear(&self) -> SignreelResult<()> {
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir)
                .with_context(|| format!("failed to clear cache '{}'", self.dir.display()))?;
        }
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to recreate cache '{}'", self.dir.display()))?;
        tracing::info!(dir = %self.dir.display(), "cleared video cache");
        Ok(())
    }

    /// Once usage reaches the high watermark, delete least-recently-modified clips until usage
    /// is at or below the low watermark. `exclude` names a key that must survive (the one
    /// currently being fetched).
    pub fn evict_if_needed(&self, exclude: Option<&str>) -> SignreelResult<EvictionReport> {
        let mut entries = self.entries()?;
        let total: u64 = entries.iter().map(|e| e.size).sum();
        let mut report = EvictionReport {
            bytes_before: total,
            bytes_after: total,
            removed: Vec::new(),
        };
        if total < self.limits.high_bytes() {
            return Ok(report);
        }

        let target = self.limits.low_bytes();
        let keep = exclude.map(|k| self.path_for(k));
        entries.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
        tracing::info!(total, target, "cache size approaching limit, evicting");

        for entry in entries {
            if report.bytes_after <= target {
                break;
            }
            if keep.as_deref() == Some(entry.path.as_path()) {
                continue;
            }
            match std::fs::remove_file(&entry.path) {
                Ok(()) => {
                    tracing::info!(file = %entry.path.display(), size = entry.size, "evicted cached video");
                    report.bytes_after = report.bytes_after.saturating_sub(entry.size);
                    report.removed.push(entry.path);
                }
                Err(e) => {
                    tracing::error!(file = %entry.path.display(), error = %e, "failed to evict cached video");
                }
            }
        }
        Ok(report)
    }
}

// Keys are opaque catalog identifiers; keep them from escaping the cache directory.
fn file_stem_for(key: &str) -> String {
    let stem: String = key
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "_".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
#[path = "../../tests/unit/video/cache.rs"]
mod tests;
