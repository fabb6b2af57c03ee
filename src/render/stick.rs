use std::path::Path;

use kurbo::{BezPath, Cap, Circle, Join, PathEl, Shape as _, Stroke, StrokeOpts, Vec2};

use crate::{
    encode::ffmpeg::{EncodeConfig, FfmpegEncoder},
    foundation::{
        core::{Canvas, Point, Rgba8Premul},
        error::{SignreelError, SignreelResult},
    },
    gesture::{generate::PoseSequence, model::{Joint, Pose}},
    render::FrameRGBA,
};

const TOLERANCE: f64 = 0.1;

/// Colors and proportions of the avatar. Lengths are fractions of canvas height.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StickStyle {
    /// Canvas fill.
    pub background: Rgba8Premul,
    /// Body, head and limbs.
    pub ink: Rgba8Premul,
    /// Wrist dots.
    pub hand: Rgba8Premul,
    /// Limb thickness.
    pub line_width: f64,
    /// Head radius.
    pub head_radius: f64,
    /// Elbow dot radius.
    pub joint_radius: f64,
    /// Wrist dot radius.
    pub hand_radius: f64,
    /// Neck-to-hip distance.
    pub torso_length: f64,
}

impl Default for StickStyle {
    fn default() -> Self {
        Self {
            background: Rgba8Premul::opaque(255, 255, 255),
            ink: Rgba8Premul::opaque(31, 41, 55),
            hand: Rgba8Premul::opaque(37, 99, 235),
            line_width: 0.015,
            head_radius: 0.06,
            joint_radius: 0.012,
            hand_radius: 0.02,
            torso_length: 0.3,
        }
    }
}

/// Draws a six-joint [`Pose`] as a stick figure.
#[derive(Clone, Debug)]
pub struct StickRenderer {
    canvas: Canvas,
    size: (u16, u16),
    style: StickStyle,
}

impl StickRenderer {
    /// Renderer for `canvas`; dimensions must be non-zero and fit in `u16`.
    pub fn new(canvas: Canvas, style: StickStyle) -> SignreelResult<Self> {
        let w: u16 = canvas
            .width
            .try_into()
            .map_err(|_| SignreelError::validation("stick canvas width exceeds u16"))?;
        let h: u16 = canvas
            .height
            .try_into()
            .map_err(|_| SignreelError::validation("stick canvas height exceeds u16"))?;
        if w == 0 || h == 0 {
            return Err(SignreelError::validation(
                "stick canvas width/height must be non-zero",
            ));
        }
        Ok(Self {
            canvas,
            size: (w, h),
            style,
        })
    }

    /// Target size.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Rasterize one pose. Missing joints are drawn at their rest position.
    pub fn render(&self, pose: &Pose) -> FrameRGBA {
        let (w, h) = self.size;
        let scale = f64::from(self.canvas.height);
        let to_px = self.canvas.normalized_to_pixels();
        let at = |j: Joint| to_px * pose.get_or_default(j);

        let (ls, le, lw) = (at(Joint::LeftShoulder), at(Joint::LeftElbow), at(Joint::LeftWrist));
        let (rs, re, rw) = (
            at(Joint::RightShoulder),
            at(Joint::RightElbow),
            at(Joint::RightWrist),
        );
        let neck = ls.midpoint(rs);
        let hip = neck + Vec2::new(0.0, self.style.torso_length * scale);
        let head_r = self.style.head_radius * scale;
        let head = neck - Vec2::new(0.0, head_r + self.style.line_width * scale);

        let mut ctx = vello_cpu::RenderContext::new(w, h);
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);

        ctx.set_paint(paint(self.style.background));
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(w),
            f64::from(h),
        ));

        ctx.set_paint(paint(self.style.ink));
        let limbs = Stroke::new(self.style.line_width * scale)
            .with_caps(Cap::Round)
            .with_join(Join::Round);
        let chains: [&[Point]; 4] = [&[le, ls, rs, re], &[neck, hip], &[le, lw], &[re, rw]];
        for chain in chains {
            let outline = kurbo::stroke(
                polyline(chain).elements().iter().copied(),
                &limbs,
                &StrokeOpts::default(),
                TOLERANCE,
            );
            ctx.fill_path(&to_cpu_path(&outline));
        }
        ctx.fill_path(&disk(head, head_r));
        for elbow in [le, re] {
            ctx.fill_path(&disk(elbow, self.style.joint_radius * scale));
        }

        ctx.set_paint(paint(self.style.hand));
        for wrist in [lw, rw] {
            ctx.fill_path(&disk(wrist, self.style.hand_radius * scale));
        }

        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(w, h);
        ctx.render_to_pixmap(&mut pixmap);
        FrameRGBA {
            width: self.canvas.width,
            height: self.canvas.height,
            data: pixmap.data_as_u8_slice().to_vec(),
        }
    }

    /// Render every frame of `seq` and encode it to an MP4 at `out`. Returns frames written.
    #[tracing::instrument(skip(self, seq), fields(frames = seq.len()))]
    pub fn render_sequence_to_mp4(
        &self,
        seq: &PoseSequence,
        out: &Path,
        fps: u32,
    ) -> SignreelResult<u64> {
        if seq.is_empty() {
            return Err(SignreelError::composition("pose sequence has no frames"));
        }
        let mut enc = FfmpegEncoder::new(EncodeConfig::mp4(out, self.canvas, fps))?;
        for pose in &seq.frames {
            enc.encode_frame(&self.render(pose))?;
        }
        enc.finish()
    }
}

fn paint(c: Rgba8Premul) -> vello_cpu::peniko::Color {
    let straight = |v: u8| -> u8 {
        if c.a == 0 {
            0
        } else {
            ((u16::from(v) * 255 + u16::from(c.a) / 2) / u16::from(c.a)).min(255) as u8
        }
    };
    vello_cpu::peniko::Color::from_rgba8(straight(c.r), straight(c.g), straight(c.b), c.a)
}

fn polyline(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    if let Some((first, rest)) = points.split_first() {
        path.move_to(*first);
        for p in rest {
            path.line_to(*p);
        }
    }
    path
}

fn disk(center: Point, radius: f64) -> vello_cpu::kurbo::BezPath {
    to_cpu_path(&Circle::new(center, radius).to_path(TOLERANCE))
}

fn to_cpu_path(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    let pt = |p: Point| vello_cpu::kurbo::Point::new(p.x, p.y);
    let mut out = vello_cpu::kurbo::BezPath::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => out.move_to(pt(p)),
            PathEl::LineTo(p) => out.line_to(pt(p)),
            PathEl::QuadTo(a, b) => out.quad_to(pt(a), pt(b)),
            PathEl::CurveTo(a, b, c) => out.curve_to(pt(a), pt(b), pt(c)),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/render/stick.rs"]
mod tests;
