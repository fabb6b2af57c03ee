use std::sync::Arc;

use crate::{
    foundation::core::{FrameIndex, FrameRange},
    gesture::interp::interpolate_named,
    gesture::library::GestureLibrary,
    gesture::model::Pose,
};

/// How a gloss was resolved, so downstream consumers can annotate degraded output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    /// The gloss has its own gesture.
    Exact,
    /// Missing short gloss, shown with the fingerspell placeholder.
    Fingerspell,
    /// Missing longer gloss, shown with the unknown placeholder.
    Unknown,
}

impl std::fmt::Display for Validity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Exact => "exact",
            Self::Fingerspell => "fingerspell",
            Self::Unknown => "unknown",
        })
    }
}

/// Which animation actually produced a gloss's frames.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum FrameSource {
    /// The gloss's own gesture.
    Gesture(String),
    /// A placeholder gesture (fingerspell or unknown).
    Placeholder(String),
    /// Idle rest pose; no usable gesture was found.
    Idle,
}

/// Knobs for [`Generator`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GeneratorOptions {
    /// Frames produced per gloss.
    pub frames: u32,
    /// Whether missing glosses try placeholder gestures before idling.
    pub use_fallback: bool,
    /// Placeholder for short missing glosses.
    pub fingerspell_gesture: String,
    /// Placeholder for long missing glosses.
    pub unknown_gesture: String,
    /// Glosses up to this many characters count as fingerspelled.
    pub fingerspell_max_len: usize,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            frames: 30,
            use_fallback: true,
            fingerspell_gesture: "FINGERSPELL".to_string(),
            unknown_gesture: "UNKNOWN".to_string(),
            fingerspell_max_len: 3,
        }
    }
}

/// Frames for one gloss plus how they were obtained.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedGloss {
    /// Uppercased gloss.
    pub gloss: String,
    /// Resolution marker.
    pub marker: Validity,
    /// Animation used.
    pub source: FrameSource,
    /// Exactly `frames` fully-defined poses.
    pub frames: Vec<Pose>,
}

/// Per-gloss slice of a [`PoseSequence`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GlossFrames {
    /// Uppercased gloss.
    pub gloss: String,
    /// Resolution marker.
    pub marker: Validity,
    /// Animation used.
    pub source: FrameSource,
    /// Frames belonging to this gloss within the sequence.
    pub range: FrameRange,
}

/// Concatenated pose frames for a gloss sequence, in input order.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PoseSequence {
    /// Every frame, gloss after gloss.
    pub frames: Vec<Pose>,
    /// One entry per input gloss.
    pub glosses: Vec<GlossFrames>,
}

impl PoseSequence {
    /// Total frame count.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether no frames were produced.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Markers parallel to the input glosses.
    pub fn markers(&self) -> Vec<Validity> {
        self.glosses.iter().map(|g| g.marker).collect()
    }

    /// Frames belonging to the `i`-th gloss.
    pub fn frames_for(&self, i: usize) -> Option<&[Pose]> {
        let range = self.glosses.get(i)?.range;
        self.frames
            .get(range.start.0 as usize..range.end.0 as usize)
    }

    /// The gloss shown at `frame`, for captioning.
    pub fn gloss_at(&self, frame: FrameIndex) -> Option<&str> {
        self.glosses
            .iter()
            .find(|g| g.range.contains(frame))
            .map(|g| g.gloss.as_str())
    }
}

/// The idle rest pose.
pub fn idle_pose() -> Pose {
    Pose::rest()
}

/// Produces fixed-length pose sequences per gloss with exact → placeholder → idle fallback.
#[derive(Clone, Debug)]
pub struct Generator {
    library: Arc<GestureLibrary>,
    opts: GeneratorOptions,
}

impl Generator {
    /// Generator over `library`.
    pub fn new(library: Arc<GestureLibrary>, opts: GeneratorOptions) -> Self {
        Self { library, opts }
    }

    /// Active options.
    pub fn options(&self) -> &GeneratorOptions {
        &self.opts
    }

    /// Backing library.
    pub fn library(&self) -> &Arc<GestureLibrary> {
        &self.library
    }

    fn classify_missing(&self, gloss: &str) -> (Validity, &str) {
        if gloss.chars().count() <= self.opts.fingerspell_max_len {
            (Validity::Fingerspell, &self.opts.fingerspell_gesture)
        } else {
            (Validity::Unknown, &self.opts.unknown_gesture)
        }
    }

    /// Frames for a single gloss. Always returns exactly `frames` poses.
    pub fn generate(&self, gloss: &str) -> GeneratedGloss {
        let gloss = gloss.trim().to_uppercase();

        let (marker, source) = if self.library.exists(&gloss) {
            tracing::info!(gloss = %gloss, "using gesture");
            (Validity::Exact, FrameSource::Gesture(gloss.clone()))
        } else {
            let (marker, placeholder) = self.classify_missing(&gloss);
            if !self.opts.use_fallback {
                tracing::warn!(gloss = %gloss, "no gesture and fallback disabled, using idle");
                (marker, FrameSource::Idle)
            } else if self.library.exists(placeholder) {
                tracing::info!(gloss = %gloss, placeholder, "no gesture, using placeholder");
                (marker, FrameSource::Placeholder(placeholder.to_string()))
            } else {
                tracing::warn!(gloss = %gloss, placeholder, "placeholder gesture not found, using idle");
                (marker, FrameSource::Idle)
            }
        };

        let frames = (0..u64::from(self.opts.frames))
            .map(|f| self.frame(&source, f))
            .collect();

        GeneratedGloss {
            gloss,
            marker,
            source,
            frames,
        }
    }

    // Each frame re-resolves its gesture, so a gesture removed by a concurrent reload only
    // degrades the frames sampled after the swap.
    fn frame(&self, source: &FrameSource, frame: u64) -> Pose {
        let name = match source {
            FrameSource::Gesture(name) | FrameSource::Placeholder(name) => name,
            FrameSource::Idle => return idle_pose(),
        };
        interpolate_named(&self.library, name, frame, self.opts.frames).unwrap_or_else(|| {
            tracing::warn!(gesture = %name, frame, "interpolation failed, using idle");
            idle_pose()
        })
    }

    /// Frames for every gloss, in order.
    pub fn generate_sequence<S: AsRef<str>>(&self, glosses: &[S]) -> PoseSequence {
        let mut seq = PoseSequence::default();
        for gloss in glosses {
            let generated = self.generate(gloss.as_ref());
            let start = FrameIndex(seq.frames.len() as u64);
            seq.frames.extend(generated.frames);
            let end = FrameIndex(seq.frames.len() as u64);
            seq.glosses.push(GlossFrames {
                gloss: generated.gloss,
                marker: generated.marker,
                source: generated.source,
                range: FrameRange { start, end },
            });
        }
        seq
    }
}

#[cfg(test)]
#[path = "../../tests/unit/gesture/generate.rs"]
mod tests;
