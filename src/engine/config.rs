use std::{path::{Path, PathBuf}, time::Duration};

use anyhow::Context as _;

use crate::{
    foundation::{
        core::Canvas,
        error::{SignreelError, SignreelResult},
    },
    gesture::generate::GeneratorOptions,
    render::stick::StickStyle,
    video::{
        cache::CacheLimits,
        catalog::SourcePreference,
        compose::CompositeSettings,
        fetch::{ExtractorOptions, HttpOptions, RetryPolicy},
    },
};

/// Stick-figure path settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Directory of `*.json` gesture definitions.
    pub dir: PathBuf,
    /// Generation knobs.
    #[serde(flatten)]
    pub generator: GeneratorOptions,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("gestures"),
            generator: GeneratorOptions::default(),
        }
    }
}

/// Clip retrieval settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// WLASL-style catalog file.
    pub catalog: PathBuf,
    /// Download cache directory.
    pub cache_dir: PathBuf,
    /// Cache ceiling and watermarks.
    pub cache: CacheLimits,
    /// Ranked source sites.
    pub preferred_sources: SourcePreference,
    /// Candidates tried per gloss.
    pub max_alternatives: usize,
    /// Attempts per candidate.
    pub max_attempts: u32,
    /// First backoff; doubles per retry.
    pub base_delay_ms: u64,
    /// Direct download transport.
    pub http: HttpOptions,
    /// Site extractor.
    pub extractor: ExtractorOptions,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            catalog: PathBuf::from("data/WLASL_v0.3.json"),
            cache_dir: PathBuf::from("video_cache"),
            cache: CacheLimits::default(),
            preferred_sources: SourcePreference::default(),
            max_alternatives: 5,
            max_attempts: 3,
            base_delay_ms: 1000,
            http: HttpOptions::default(),
            extractor: ExtractorOptions::default(),
        }
    }
}

impl VideoConfig {
    /// Retry policy built from the attempt and backoff fields.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
        }
    }
}

/// Stick-figure export settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StickConfig {
    /// Canvas width.
    pub width: u32,
    /// Canvas height.
    pub height: u32,
    /// MP4 frame rate.
    pub fps: u32,
    /// Colors and proportions.
    pub style: StickStyle,
}

impl Default for StickConfig {
    fn default() -> Self {
        Self {
            width: 360,
            height: 480,
            fps: 30,
            style: StickStyle::default(),
        }
    }
}

impl StickConfig {
    /// Canvas size.
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }
}

/// Everything needed to build an [`crate::Engine`]. Every field has a default, so partial
/// JSON files are accepted.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Stick-figure path.
    pub gestures: GestureConfig,
    /// Clip retrieval.
    pub video: VideoConfig,
    /// Composited output.
    pub output: CompositeSettings,
    /// Stick-figure export.
    pub stick: StickConfig,
}

impl EngineConfig {
    /// Parse a JSON config file.
    pub fn from_json_file(path: &Path) -> SignreelResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Apply `SIGNREEL_*` environment overrides.
    pub fn apply_env(&mut self) -> SignreelResult<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (an environment stand-in).
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> SignreelResult<()> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("SIGNREEL_GESTURES_DIR") {
            self.gestures.dir = PathBuf::from(v);
        }
        if let Some(v) = get("SIGNREEL_CATALOG") {
            self.video.catalog = PathBuf::from(v);
        }
        if let Some(v) = get("SIGNREEL_CACHE_DIR") {
            self.video.cache_dir = PathBuf::from(v);
        }
        if let Some(v) = get("SIGNREEL_OUT_DIR") {
            self.output.out_dir = PathBuf::from(v);
        }
        if let Some(v) = get("SIGNREEL_MAX_CACHE_BYTES") {
            self.video.cache.max_bytes = v.parse::<u64>().map_err(|_| {
                SignreelError::validation(format!(
                    "SIGNREEL_MAX_CACHE_BYTES must be a byte count, got '{v}'"
                ))
            })?;
        }
        Ok(())
    }

    /// Reject values no component can run with.
    pub fn validate(&self) -> SignreelResult<()> {
        if self.gestures.generator.frames == 0 {
            return Err(SignreelError::validation("frames per gloss must be non-zero"));
        }
        if self.video.max_attempts == 0 {
            return Err(SignreelError::validation("max_attempts must be non-zero"));
        }
        if self.video.max_alternatives == 0 {
            return Err(SignreelError::validation("max_alternatives must be non-zero"));
        }
        self.video.cache.validate()?;
        self.output.validate()?;
        if self.stick.width == 0 || self.stick.height == 0 || self.stick.fps == 0 {
            return Err(SignreelError::validation(
                "stick width/height/fps must be non-zero",
            ));
        }
        if !self.stick.width.is_multiple_of(2) || !self.stick.height.is_multiple_of(2) {
            return Err(SignreelError::validation(
                "stick width/height must be even (yuv420p)",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/config.rs"]
mod tests;
