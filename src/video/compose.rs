use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use chrono::NaiveDateTime;

use crate::{
    encode::ffmpeg::{ensure_parent_dir, ffmpeg_tool_available},
    foundation::error::{SignreelError, SignreelResult},
};

/// Stream facts a compositor needs about one clip.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipInfo {
    /// Clip location.
    pub path: PathBuf,
    /// Frame width.
    pub width: u32,
    /// Frame height.
    pub height: u32,
    /// Frames per second.
    pub fps: f64,
    /// Duration in seconds (0 when unknown).
    pub duration_sec: f64,
}

/// How consecutive clips are joined.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    /// Hard cut.
    #[default]
    Cut,
    /// Fade from one clip into the next over `duration_sec`.
    Crossfade {
        /// Overlap length in seconds.
        duration_sec: f64,
    },
}

impl Transition {
    fn overlap_sec(self) -> f64 {
        match self {
            Self::Cut => 0.0,
            Self::Crossfade { duration_sec } if duration_sec.is_finite() => duration_sec.max(0.0),
            Self::Crossfade { .. } => 0.0,
        }
    }
}

/// Output format every clip is normalized to.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompositeSettings {
    /// Output width.
    pub width: u32,
    /// Output height.
    pub height: u32,
    /// Output frame rate.
    pub fps: u32,
    /// Join between clips.
    pub transition: Transition,
    /// Directory for generated output names.
    pub out_dir: PathBuf,
}

impl Default for CompositeSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 25,
            transition: Transition::Cut,
            out_dir: PathBuf::from("output"),
        }
    }
}

impl CompositeSettings {
    /// Reject settings the encoder cannot honor.
    pub fn validate(&self) -> SignreelResult<()> {
        if self.width == 0 || self.height == 0 || self.fps == 0 {
            return Err(SignreelError::validation(
                "output width/height/fps must be non-zero",
            ));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(SignreelError::validation(
                "output width/height must be even (yuv420p)",
            ));
        }
        Ok(())
    }
}

/// Clip inspection and joining, supplied to the compositor at construction.
pub trait ClipBackend: Send + Sync {
    /// Read stream facts; an error means the clip cannot be used.
    fn inspect(&self, path: &Path) -> SignreelResult<ClipInfo>;

    /// Normalize `clips` to `settings` and write them, in order, to `out`.
    fn concat(&self, clips: &[ClipInfo], settings: &CompositeSettings, out: &Path)
    -> SignreelResult<()>;
}

/// Backend driving the system `ffprobe`/`ffmpeg` binaries.
#[derive(Clone, Debug)]
pub struct FfmpegBackend {
    ffmpeg: String,
    ffprobe: String,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

impl FfmpegBackend {
    /// Whether both binaries are runnable.
    pub fn available(&self) -> bool {
        ffmpeg_tool_available(&self.ffmpeg) && ffmpeg_tool_available(&self.ffprobe)
    }
}

#[derive(serde::Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

impl ClipBackend for FfmpegBackend {
    fn inspect(&self, path: &Path) -> SignreelResult<ClipInfo> {
        let out = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(path)
            .output()
            .map_err(|e| SignreelError::not_found(format!("failed to run ffprobe: {e}")))?;
        if !out.status.success() {
            return Err(SignreelError::not_found(format!(
                "ffprobe failed for '{}': {}",
                path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        parse_stream_json(path, &out.stdout)
    }

    fn concat(
        &self,
        clips: &[ClipInfo],
        settings: &CompositeSettings,
        out: &Path,
    ) -> SignreelResult<()> {
        if clips.is_empty() {
            return Err(SignreelError::composition("nothing to concatenate"));
        }
        let graph = build_filter_graph(clips, settings);
        let fps = settings.fps.to_string();
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .args(["-y", "-loglevel", "error"]);
        for clip in clips {
            cmd.arg("-i").arg(&clip.path);
        }
        cmd.args([
            "-filter_complex",
            graph.as_str(),
            "-map",
            "[outv]",
            "-an",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-r",
            fps.as_str(),
            "-movflags",
            "+faststart",
        ])
        .arg(out);

        tracing::debug!(clips = clips.len(), graph = %graph, "running ffmpeg concat");
        let output = cmd
            .output()
            .map_err(|e| SignreelError::composition(format!("failed to spawn ffmpeg: {e}")))?;
        if !output.status.success() {
            return Err(SignreelError::composition(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

fn parse_stream_json(path: &Path, json: &[u8]) -> SignreelResult<ClipInfo> {
    let parsed: ProbeOut = serde_json::from_slice(json)?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| SignreelError::not_found(format!("no video stream in '{}'", path.display())))?;
    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(SignreelError::not_found(format!(
                "missing video dimensions in '{}'",
                path.display()
            )));
        }
    };
    let fps = video
        .r_frame_rate
        .as_deref()
        .and_then(parse_ff_ratio)
        .ok_or_else(|| SignreelError::not_found(format!("invalid frame rate in '{}'", path.display())))?;
    let duration_sec = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video.duration.as_deref())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(0.0);
    Ok(ClipInfo {
        path: path.to_path_buf(),
        width,
        height,
        fps,
        duration_sec,
    })
}

fn parse_ff_ratio(s: &str) -> Option<f64> {
    let (a, b) = s.split_once('/').unwrap_or((s, "1"));
    let a = a.trim().parse::<f64>().ok()?;
    let b = b.trim().parse::<f64>().ok()?;
    (b > 0.0 && a > 0.0).then(|| a / b)
}

/// `filter_complex` that normalizes each input and joins them into `[outv]`.
pub fn build_filter_graph(clips: &[ClipInfo], settings: &CompositeSettings) -> String {
    let mut parts = Vec::with_capacity(clips.len() + 1);
    for (i, clip) in clips.iter().enumerate() {
        let mut chain = Vec::new();
        if clip.width != settings.width || clip.height != settings.height {
            chain.push(format!("scale={}:{}", settings.width, settings.height));
        }
        if (clip.fps - f64::from(settings.fps)).abs() > 1e-3 {
            chain.push(format!("fps={}", settings.fps));
        }
        chain.push("setsar=1".to_string());
        chain.push("format=yuv420p".to_string());
        parts.push(format!("[{i}:v]{}[v{i}]", chain.join(",")));
    }

    let overlap = settings.transition.overlap_sec();
    if clips.len() == 1 {
        parts.push("[v0]null[outv]".to_string());
    } else if overlap > 0.0 {
        let mut prev = "v0".to_string();
        let mut elapsed = 0.0;
        for i in 1..clips.len() {
            elapsed += clips[i - 1].duration_sec;
            let offset = (elapsed - overlap * i as f64).max(0.0);
            let label = if i + 1 == clips.len() {
                "outv".to_string()
            } else {
                format!("x{i}")
            };
            parts.push(format!(
                "[{prev}][v{i}]xfade=transition=fade:duration={overlap:.3}:offset={offset:.3}[{label}]"
            ));
            prev = label;
        }
    } else {
        let inputs: String = (0..clips.len()).map(|i| format!("[v{i}]")).collect();
        parts.push(format!("{inputs}concat=n={}:v=1:a=0[outv]", clips.len()));
    }
    parts.join(";")
}

/// `sign_language_<labels>_<YYYYmmdd_HHMMSS>.mp4`; labels are the first five glosses joined
/// by `_`, filesystem-unsafe characters replaced, capped at 50 characters.
pub fn output_filename<S: AsRef<str>>(glosses: &[S], at: NaiveDateTime) -> String {
    let stamp = at.format("%Y%m%d_%H%M%S");
    let joined = glosses
        .iter()
        .take(5)
        .map(|g| g.as_ref().trim())
        .filter(|g| !g.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    let label: String = joined
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .take(50)
        .collect();
    if label.is_empty() {
        format!("sign_language_composite_{stamp}.mp4")
    } else {
        format!("sign_language_{label}_{stamp}.mp4")
    }
}

/// Dry-run summary of a clip list.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct CompositeInfo {
    /// Clips supplied.
    pub clip_count: usize,
    /// Clips that could be read.
    pub valid_clips: usize,
    /// Sum of valid clip durations.
    pub total_duration_sec: f64,
    /// Expected output length after transition overlap.
    pub estimated_output_duration_sec: f64,
    /// Joins between valid clips.
    pub transition_count: usize,
}

/// What [`VideoCompositor::compose`] produced.
#[derive(Clone, Debug, PartialEq)]
pub struct CompositeOutput {
    /// Final file.
    pub path: PathBuf,
    /// Inputs that made it into the output, in order.
    pub used: Vec<PathBuf>,
    /// Whether a new file was encoded (false when a single clip passed through).
    pub encoded: bool,
}

/// Joins locally available clips into one normalized file.
pub struct VideoCompositor {
    backend: Box<dyn ClipBackend>,
    settings: CompositeSettings,
}

impl std::fmt::Debug for VideoCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoCompositor")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl VideoCompositor {
    /// Compositor using `backend` for all clip operations.
    pub fn new(backend: impl ClipBackend + 'static, settings: CompositeSettings) -> SignreelResult<Self> {
        settings.validate()?;
        Ok(Self {
            backend: Box::new(backend),
            settings,
        })
    }

    /// Active settings.
    pub fn settings(&self) -> &CompositeSettings {
        &self.settings
    }

    /// Join `clips` in order. `labels` run parallel to `clips` and only feed the generated file
    /// name (labels of skipped clips are dropped); `output` overrides it.
    /// Clips that cannot be read are skipped. A single surviving clip is returned as-is.
    #[tracing::instrument(skip_all, fields(clips = clips.len()))]
    pub fn compose<S: AsRef<str>>(
        &self,
        clips: &[PathBuf],
        labels: &[S],
        output: Option<&Path>,
    ) -> SignreelResult<CompositeOutput> {
        if clips.is_empty() {
            return Err(SignreelError::composition("no clips provided"));
        }
        let (kept, valid): (Vec<usize>, Vec<ClipInfo>) = self.inspect_all(clips).into_iter().unzip();
        match valid.as_slice() {
            [] => Err(SignreelError::composition("no clips could be loaded")),
            [only] => {
                tracing::info!(path = %only.path.display(), "single clip, returned unchanged");
                Ok(CompositeOutput {
                    path: only.path.clone(),
                    used: vec![only.path.clone()],
                    encoded: false,
                })
            }
            many => {
                let out = match output {
                    Some(p) => p.to_path_buf(),
                    None => {
                        let names: Vec<&str> = kept
                            .iter()
                            .filter_map(|&i| labels.get(i))
                            .map(|l| l.as_ref())
                            .collect();
                        self.settings
                            .out_dir
                            .join(output_filename(&names, chrono::Local::now().naive_local()))
                    }
                };
                ensure_parent_dir(&out)?;
                self.backend
                    .concat(many, &self.settings, &out)
                    .map_err(|e| match e {
                        SignreelError::Composition(_) => e,
                        other => SignreelError::composition(other.to_string()),
                    })?;
                tracing::info!(path = %out.display(), clips = many.len(), "composited video");
                Ok(CompositeOutput {
                    path: out,
                    used: many.iter().map(|c| c.path.clone()).collect(),
                    encoded: true,
                })
            }
        }
    }

    /// Probe every clip and predict the output without encoding.
    pub fn composite_info(&self, clips: &[PathBuf]) -> CompositeInfo {
        let valid: Vec<ClipInfo> = self.inspect_all(clips).into_iter().map(|(_, c)| c).collect();
        let total: f64 = valid.iter().map(|c| c.duration_sec).sum();
        let transition_count = valid.len().saturating_sub(1);
        let overlap = self.settings.transition.overlap_sec() * transition_count as f64;
        CompositeInfo {
            clip_count: clips.len(),
            valid_clips: valid.len(),
            total_duration_sec: total,
            estimated_output_duration_sec: (total - overlap).max(0.0),
            transition_count,
        }
    }

    // Clips that could be read, with their input index.
    fn inspect_all(&self, clips: &[PathBuf]) -> Vec<(usize, ClipInfo)> {
        clips
            .iter()
            .enumerate()
            .filter_map(|(i, path)| {
                if !path.is_file() {
                    tracing::warn!(path = %path.display(), "clip file missing, skipping");
                    return None;
                }
                match self.backend.inspect(path) {
                    Ok(info) => Some((i, info)),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to load clip, skipping");
                        None
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/video/compose.rs"]
mod tests;
