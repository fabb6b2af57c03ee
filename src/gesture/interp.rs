use std::collections::BTreeSet;

use crate::{
    foundation::core::Point,
    gesture::library::GestureLibrary,
    gesture::model::{Gesture, Joint, Keyframe, Pose},
};

/// Linear blend between two values at factor `t`.
pub trait Lerp: Sized {
    /// `a + (b - a) * t`.
    fn lerp(a: &Self, b: &Self, t: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        a + (b - a) * t
    }
}

impl Lerp for Point {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        // Identical endpoints are returned as-is so held joints stay bit-exact.
        if a == b {
            return *a;
        }
        Point::new(
            <f64 as Lerp>::lerp(&a.x, &b.x, t),
            <f64 as Lerp>::lerp(&a.y, &b.y, t),
        )
    }
}

/// Normalized progress for `frame` of a gesture authored with `frames` frames.
///
/// Always derived from the gesture's own frame count, never the caller's sequence length.
pub fn progress_for_frame(frames: u32, frame: u64) -> f64 {
    if frames <= 1 {
        return 0.0;
    }
    frame as f64 / f64::from(frames - 1)
}

/// Pick the two keyframes bracketing `progress` and the blend factor between them.
///
/// `progress` is clamped to `[0, 1]`. At or before the first keyframe (or at/after the last)
/// both sides are that keyframe and the factor is 0. Returns `None` only for an empty list.
pub fn find_bracket(keyframes: &[Keyframe], progress: f64) -> Option<(&Keyframe, &Keyframe, f64)> {
    let first = keyframes.first()?;
    let last = keyframes.last()?;
    let progress = if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    };

    if progress <= first.time {
        return Some((first, first, 0.0));
    }
    if progress >= last.time {
        return Some((last, last, 0.0));
    }
    // Landing exactly on a keyframe returns it untouched instead of `a + (b - a) * 1.0`.
    if let Some(hit) = keyframes.iter().find(|k| k.time == progress) {
        return Some((hit, hit, 0.0));
    }

    let (a, b) = keyframes
        .windows(2)
        .find(|w| w[0].time <= progress && progress <= w[1].time)
        .map(|w| (&w[0], &w[1]))
        .unwrap_or((first, last));

    let span = b.time - a.time;
    let factor = if span == 0.0 {
        0.0
    } else {
        (progress - a.time) / span
    };
    Some((a, b, factor))
}

/// Blend two partial poses joint by joint.
///
/// Only joints referenced by either side are produced; a joint missing on one side blends
/// from (or toward) its rest position.
pub fn interpolate_pose(a: &Pose, b: &Pose, factor: f64) -> Pose {
    let joints: BTreeSet<Joint> = a.joints().chain(b.joints()).collect();
    joints
        .into_iter()
        .map(|joint| {
            let from = a.get_or_default(joint);
            let to = b.get_or_default(joint);
            (joint, <Point as Lerp>::lerp(&from, &to, factor))
        })
        .collect()
}

/// Pose at `progress` in `[0, 1]`, fully defined over all six joints.
pub fn sample_at(gesture: &Gesture, progress: f64) -> Pose {
    match find_bracket(&gesture.keyframes, progress) {
        Some((a, b, factor)) => interpolate_pose(&a.pose, &b.pose, factor).filled(),
        None => Pose::rest(),
    }
}

/// Pose for `frame` of `gesture`, fully defined over all six joints.
pub fn interpolate(gesture: &Gesture, frame: u64) -> Pose {
    sample_at(gesture, progress_for_frame(gesture.frames, frame))
}

/// Library-backed lookup plus [`interpolate`].
///
/// `total_frames` is the length of the caller's requested animation; it is accepted for
/// parity with the generator but does not influence progress. Returns `None` only when the
/// gesture is not in the library.
pub fn interpolate_named(
    library: &GestureLibrary,
    name: &str,
    frame: u64,
    total_frames: u32,
) -> Option<Pose> {
    let Some(gesture) = library.get(name) else {
        tracing::warn!(gesture = %name, "gesture not found");
        return None;
    };
    tracing::trace!(gesture = %gesture.name, frame, total_frames, "interpolating");
    Some(interpolate(&gesture, frame))
}

#[cfg(test)]
#[path = "../../tests/unit/gesture/interp.rs"]
mod tests;
