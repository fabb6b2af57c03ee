//! Signreel turns a sequence of sign-language glosses into something you can watch.
//!
//! Two independent paths share the same input:
//!
//! - **Stick figure**: glosses are looked up in a [`GestureLibrary`] of keyframed poses and
//!   interpolated into a [`PoseSequence`], falling back to placeholder or idle motion when a
//!   gesture is missing. [`StickRenderer`] rasterizes poses and can encode them to MP4.
//! - **Recorded clips**: glosses are ranked against a WLASL-style [`VideoCatalog`], fetched
//!   through a size-bounded [`VideoCache`] and joined by a [`VideoCompositor`].
//!
//! [`Engine`] wires both paths from explicit capabilities (or from an [`EngineConfig`]).
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod foundation;

pub(crate) mod encode;
pub(crate) mod engine;
pub(crate) mod gesture;
pub(crate) mod render;
pub(crate) mod video;

pub use crate::foundation::core::{Affine, Canvas, FrameIndex, FrameRange, Point, Rgba8Premul};
pub use crate::foundation::error::{SignreelError, SignreelResult};

pub use crate::gesture::generate::{
    FrameSource, GeneratedGloss, Generator, GeneratorOptions, GlossFrames, PoseSequence,
    Validity, idle_pose,
};
pub use crate::gesture::interp::{
    Lerp, find_bracket, interpolate, interpolate_named, interpolate_pose, progress_for_frame,
    sample_at,
};
pub use crate::gesture::library::{
    DefinitionStore, GestureLibrary, JsonDirStore, MemoryStore, StoredDefinition,
    validate_definition,
};
pub use crate::gesture::model::{
    Gesture, GestureDef, GestureMeta, Joint, Keyframe, KeyframeDef, Pose,
};

pub use crate::video::cache::{CacheEntry, CacheInfo, CacheLimits, EvictionReport, VideoCache};
pub use crate::video::catalog::{GlossResolver, SourcePreference, VideoCandidate, VideoCatalog};
pub use crate::video::compose::{
    ClipBackend, ClipInfo, CompositeInfo, CompositeOutput, CompositeSettings, FfmpegBackend,
    Transition, VideoCompositor, build_filter_graph, output_filename,
};
pub use crate::video::fetch::{
    ExtractorFetcher, ExtractorOptions, Fetcher, HttpFetcher, HttpOptions, RetryPolicy,
    check_download_size, host_of, is_program_on_path,
};
pub use crate::video::loader::{FetchOutcome, VideoLoader};

pub use crate::encode::ffmpeg::{
    EncodeConfig, FfmpegEncoder, ensure_parent_dir, ffmpeg_tool_available,
};
pub use crate::render::FrameRGBA;
pub use crate::render::stick::{StickRenderer, StickStyle};

pub use crate::engine::config::{EngineConfig, GestureConfig, StickConfig, VideoConfig};
pub use crate::engine::facade::{
    Engine, EngineParts, GlossOutcome, GlossReport, VideoOutput,
};
