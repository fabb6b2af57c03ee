use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    engine::config::EngineConfig,
    foundation::error::{SignreelError, SignreelResult},
    gesture::{
        generate::{Generator, GeneratorOptions, PoseSequence},
        library::GestureLibrary,
    },
    render::stick::StickRenderer,
    video::{
        cache::VideoCache,
        catalog::{GlossResolver, VideoCatalog},
        compose::{FfmpegBackend, VideoCompositor},
        loader::{FetchOutcome, VideoLoader},
    },
};

/// How one requested gloss fared on the video path.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GlossOutcome {
    /// A clip was fetched and made it into the output.
    Rendered {
        /// Site the clip came from.
        source: String,
        /// Catalog identifier of the clip.
        video_id: String,
    },
    /// The catalog has no entry for the gloss.
    NotInCatalog,
    /// Every candidate failed to download or load.
    Unavailable {
        /// Video ids that were tried, in rank order.
        tried: Vec<String>,
    },
}

/// Per-gloss outcome, in input order.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct GlossReport {
    /// Uppercased gloss.
    pub gloss: String,
    /// What happened to it.
    #[serde(flatten)]
    pub outcome: GlossOutcome,
}

/// Result of [`Engine::video`].
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct VideoOutput {
    /// The composited (or single passed-through) clip.
    pub path: PathBuf,
    /// Glosses present in the output, in order. May be a subset of the request.
    pub rendered: Vec<String>,
    /// One report per requested gloss.
    pub outcomes: Vec<GlossReport>,
}

/// Capabilities an [`Engine`] is assembled from.
#[derive(Debug)]
pub struct EngineParts {
    /// Gesture definitions.
    pub library: Arc<GestureLibrary>,
    /// Stick-figure generation knobs.
    pub generator: GeneratorOptions,
    /// Gloss → clip candidates.
    pub resolver: GlossResolver,
    /// Cached clip retrieval.
    pub loader: VideoLoader,
    /// Clip joining.
    pub compositor: VideoCompositor,
    /// Candidates tried per gloss.
    pub max_alternatives: usize,
}

/// Gloss sequence → pose sequence or composited video.
///
/// The two paths share nothing mutable; each call handles its glosses strictly in order.
#[derive(Debug)]
pub struct Engine {
    generator: Generator,
    resolver: GlossResolver,
    loader: VideoLoader,
    compositor: VideoCompositor,
    max_alternatives: usize,
}

impl Engine {
    /// Assemble from explicit capabilities.
    pub fn new(parts: EngineParts) -> Self {
        Self {
            generator: Generator::new(parts.library, parts.generator),
            resolver: parts.resolver,
            loader: parts.loader,
            compositor: parts.compositor,
            max_alternatives: parts.max_alternatives.max(1),
        }
    }

    /// Build the production engine: JSON gesture directory, WLASL catalog, on-disk cache,
    /// yt-dlp/HTTP fetchers and the ffmpeg compositor.
    pub fn from_config(cfg: &EngineConfig) -> SignreelResult<Self> {
        cfg.validate()?;
        let library = Arc::new(GestureLibrary::from_dir(&cfg.gestures.dir)?);

        let catalog = if cfg.video.catalog.is_file() {
            VideoCatalog::from_json_file(&cfg.video.catalog)?
        } else {
            tracing::warn!(
                path = %cfg.video.catalog.display(),
                "video catalog not found, video path will resolve nothing"
            );
            VideoCatalog::default()
        };
        let resolver = GlossResolver::new(catalog, cfg.video.preferred_sources.clone());

        let cache = VideoCache::open(&cfg.video.cache_dir, cfg.video.cache)?;
        let loader = VideoLoader::with_default_fetchers(
            cache,
            &cfg.video.http,
            cfg.video.extractor.clone(),
            cfg.video.retry_policy(),
        )?;
        let compositor = VideoCompositor::new(FfmpegBackend::default(), cfg.output.clone())?;

        Ok(Self::new(EngineParts {
            library,
            generator: cfg.gestures.generator.clone(),
            resolver,
            loader,
            compositor,
            max_alternatives: cfg.video.max_alternatives,
        }))
    }

    /// Gesture library in use.
    pub fn library(&self) -> &Arc<GestureLibrary> {
        self.generator.library()
    }

    /// Catalog resolver in use.
    pub fn resolver(&self) -> &GlossResolver {
        &self.resolver
    }

    /// Clip loader in use.
    pub fn loader(&self) -> &VideoLoader {
        &self.loader
    }

    /// Compositor in use.
    pub fn compositor(&self) -> &VideoCompositor {
        &self.compositor
    }

    /// Stick-figure path. Never fails: missing glosses degrade to placeholders or idle frames,
    /// and each gloss's marker says which.
    #[tracing::instrument(skip_all, fields(glosses = glosses.len()))]
    pub fn stick<S: AsRef<str>>(&self, glosses: &[S]) -> PoseSequence {
        self.generator.generate_sequence(glosses)
    }

    /// Stick-figure path rendered to MP4. Returns frames written.
    pub fn stick_to_mp4<S: AsRef<str>>(
        &self,
        glosses: &[S],
        renderer: &StickRenderer,
        out: &Path,
        fps: u32,
    ) -> SignreelResult<u64> {
        let seq = self.stick(glosses);
        renderer.render_sequence_to_mp4(&seq, out, fps)
    }

    /// Video path. Glosses without a usable clip are skipped and reported; only a request
    /// where nothing at all could be rendered is an error.
    #[tracing::instrument(skip_all, fields(glosses = glosses.len()))]
    pub fn video<S: AsRef<str>>(
        &self,
        glosses: &[S],
        output: Option<&Path>,
    ) -> SignreelResult<VideoOutput> {
        let mut outcomes = Vec::with_capacity(glosses.len());
        // (outcome index, clip path)
        let mut fetched: Vec<(usize, PathBuf)> = Vec::new();

        for gloss in glosses {
            let gloss = gloss.as_ref().trim().to_uppercase();
            let candidates = self
                .resolver
                .best_candidates_with_alternatives(&gloss, self.max_alternatives);
            if candidates.is_empty() {
                tracing::warn!(gloss = %gloss, "gloss not in video catalog");
                outcomes.push(GlossReport {
                    gloss,
                    outcome: GlossOutcome::NotInCatalog,
                });
                continue;
            }

            let FetchOutcome { hit, failed } = self.loader.fetch_first(&candidates);
            let outcome = match hit {
                Some((candidate, path)) => {
                    fetched.push((outcomes.len(), path));
                    GlossOutcome::Rendered {
                        source: candidate.source.clone(),
                        video_id: candidate.video_id.clone(),
                    }
                }
                None => {
                    tracing::warn!(gloss = %gloss, tried = failed.len(), "no candidate clip available");
                    GlossOutcome::Unavailable { tried: failed }
                }
            };
            outcomes.push(GlossReport { gloss, outcome });
        }

        if fetched.is_empty() {
            return Err(SignreelError::composition(format!(
                "none of the {} requested glosses resolved to a clip",
                glosses.len()
            )));
        }

        let clips: Vec<PathBuf> = fetched.iter().map(|(_, p)| p.clone()).collect();
        let labels: Vec<&str> = fetched
            .iter()
            .map(|(i, _)| outcomes[*i].gloss.as_str())
            .collect();
        let composite = self.compositor.compose(&clips, &labels, output)?;

        let mut rendered = Vec::new();
        for (i, path) in &fetched {
            let report = &mut outcomes[*i];
            if composite.used.contains(path) {
                rendered.push(report.gloss.clone());
            } else if let GlossOutcome::Rendered { video_id, .. } = &report.outcome {
                let tried = vec![video_id.clone()];
                tracing::warn!(gloss = %report.gloss, video_id = %tried[0], "clip could not be loaded");
                report.outcome = GlossOutcome::Unavailable { tried };
            }
        }

        tracing::info!(
            path = %composite.path.display(),
            rendered = rendered.len(),
            requested = glosses.len(),
            "video ready"
        );
        Ok(VideoOutput {
            path: composite.path,
            rendered,
            outcomes,
        })
    }

    /// Catalog glosses resembling `gloss`, for diagnostics.
    pub fn suggest(&self, gloss: &str, max_results: usize) -> Vec<String> {
        self.resolver.similar_glosses(gloss, max_results)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/facade.rs"]
mod tests;
