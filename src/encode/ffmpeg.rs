use std::{
    io::Write as _,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use crate::{
    foundation::{
        core::Canvas,
        error::{SignreelError, SignreelResult},
    },
    render::FrameRGBA,
};

/// Raw-frame encode target.
#[derive(Clone, Debug)]
pub struct EncodeConfig {
    /// Frame size every submitted frame must match.
    pub canvas: Canvas,
    /// Output frame rate.
    pub fps: u32,
    /// Destination file.
    pub out_path: PathBuf,
    /// Replace an existing file.
    pub overwrite: bool,
}

impl EncodeConfig {
    /// MP4 target that overwrites `out_path`.
    pub fn mp4(out_path: impl Into<PathBuf>, canvas: Canvas, fps: u32) -> Self {
        Self {
            canvas,
            fps,
            out_path: out_path.into(),
            overwrite: true,
        }
    }

    /// Reject sizes and rates libx264/yuv420p cannot take.
    pub fn validate(&self) -> SignreelResult<()> {
        let Canvas { width, height } = self.canvas;
        if width == 0 || height == 0 {
            return Err(SignreelError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if self.fps == 0 {
            return Err(SignreelError::validation("encode fps must be non-zero"));
        }
        if !width.is_multiple_of(2) || !height.is_multiple_of(2) {
            return Err(SignreelError::validation(
                "encode width/height must be even (yuv420p mp4 output)",
            ));
        }
        Ok(())
    }

    fn frame_bytes(&self) -> usize {
        self.canvas.width as usize * self.canvas.height as usize * 4
    }
}

/// Whether an ffmpeg-family binary (`ffmpeg`, `ffprobe`) answers `-version`.
pub fn ffmpeg_tool_available(tool: &str) -> bool {
    Command::new(tool)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Create the directory that will hold `path`.
pub fn ensure_parent_dir(path: &Path) -> SignreelResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Streams opaque RGBA frames into a system `ffmpeg` process producing H.264 MP4.
pub struct FfmpegEncoder {
    cfg: EncodeConfig,
    child: Child,
    stdin: Option<ChildStdin>,
    frames: u64,
}

impl FfmpegEncoder {
    /// Spawn `ffmpeg` reading raw frames from stdin.
    pub fn new(cfg: EncodeConfig) -> SignreelResult<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path)?;

        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(SignreelError::validation(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }
        if !ffmpeg_tool_available("ffmpeg") {
            return Err(SignreelError::composition(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .arg(if cfg.overwrite { "-y" } else { "-n" })
            .args([
                "-loglevel",
                "error",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-s",
                &format!("{}x{}", cfg.canvas.width, cfg.canvas.height),
                "-r",
                &cfg.fps.to_string(),
                "-i",
                "pipe:0",
                "-an",
                "-c:v",
                "libx264",
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "+faststart",
            ])
            .arg(&cfg.out_path);

        let mut child = cmd
            .spawn()
            .map_err(|e| SignreelError::composition(format!("failed to spawn ffmpeg: {e}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SignreelError::composition("failed to open ffmpeg stdin"))?;

        tracing::debug!(out = %cfg.out_path.display(), fps = cfg.fps, "ffmpeg encoder started");
        Ok(Self {
            cfg,
            child,
            stdin: Some(stdin),
            frames: 0,
        })
    }

    /// Append one frame. Frames are written as-is, so they should be opaque.
    pub fn encode_frame(&mut self, frame: &FrameRGBA) -> SignreelResult<()> {
        if frame.width != self.cfg.canvas.width || frame.height != self.cfg.canvas.height {
            return Err(SignreelError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.cfg.canvas.width, self.cfg.canvas.height
            )));
        }
        if frame.data.len() != self.cfg.frame_bytes() {
            return Err(SignreelError::validation(
                "frame data length does not match width*height*4",
            ));
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(SignreelError::composition("ffmpeg encoder is already finalized"));
        };
        stdin.write_all(&frame.data).map_err(|e| {
            SignreelError::composition(format!("failed to write frame to ffmpeg: {e}"))
        })?;
        self.frames += 1;
        Ok(())
    }

    /// Close stdin and wait for ffmpeg. Returns the number of frames written.
    pub fn finish(mut self) -> SignreelResult<u64> {
        drop(self.stdin.take());
        let output = self
            .child
            .wait_with_output()
            .map_err(|e| SignreelError::composition(format!("failed to wait for ffmpeg: {e}")))?;
        if !output.status.success() {
            return Err(SignreelError::composition(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        tracing::info!(out = %self.cfg.out_path.display(), frames = self.frames, "encoded video");
        Ok(self.frames)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
