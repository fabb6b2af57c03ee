use super::*;
use crate::gesture::model::GestureMeta;

fn gesture(frames: u32, keys: Vec<(f64, Pose)>) -> Gesture {
    Gesture {
        name: "TEST".to_string(),
        frames,
        keyframes: keys
            .into_iter()
            .map(|(time, pose)| Keyframe { time, pose })
            .collect(),
        meta: GestureMeta::default(),
    }
}

fn wrist(x: f64, y: f64) -> Pose {
    Pose::new().with(Joint::RightWrist, Point::new(x, y))
}

fn approx(a: Point, b: Point) -> bool {
    (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
}

#[test]
fn hello_midpoint_frame_lands_between_keyframes() {
    let hello = gesture(30, vec![(0.0, wrist(0.55, 0.4)), (1.0, wrist(0.65, 0.4))]);
    let pose = interpolate(&hello, 15);
    let w = pose.get(Joint::RightWrist).unwrap();
    assert!((w.x - 0.60).abs() < 0.005, "x was {}", w.x);
    assert_eq!(w.y, 0.4);
    assert!(pose.is_complete());
}

#[test]
fn progress_uses_authored_frame_count() {
    assert_eq!(progress_for_frame(30, 0), 0.0);
    assert_eq!(progress_for_frame(30, 29), 1.0);
    assert_eq!(progress_for_frame(11, 5), 0.5);
    assert_eq!(progress_for_frame(1, 7), 0.0);
    assert_eq!(progress_for_frame(0, 7), 0.0);
}

#[test]
fn sampling_at_a_keyframe_time_returns_that_pose() {
    let g = gesture(
        30,
        vec![
            (0.0, wrist(0.1, 0.2)),
            (0.3, wrist(0.7, 0.9)),
            (1.0, wrist(0.3, 0.3)),
        ],
    );
    for kf in &g.keyframes {
        assert_eq!(sample_at(&g, kf.time), kf.pose.filled());
    }
}

#[test]
fn out_of_range_progress_behaves_as_clamped() {
    let g = gesture(30, vec![(0.2, wrist(0.1, 0.2)), (0.8, wrist(0.7, 0.9))]);
    assert_eq!(sample_at(&g, 1.5), sample_at(&g, 1.0));
    assert_eq!(sample_at(&g, -3.0), sample_at(&g, 0.0));
    assert_eq!(sample_at(&g, 0.0), g.keyframes[0].pose.filled());
    assert_eq!(sample_at(&g, 1.0), g.keyframes[1].pose.filled());
    // Frame indices beyond the authored count clamp to the last keyframe too.
    assert_eq!(interpolate(&g, 500), sample_at(&g, 1.0));
}

#[test]
fn zero_width_interval_uses_factor_zero() {
    let keys = vec![
        Keyframe {
            time: 0.5,
            pose: wrist(0.1, 0.1),
        },
        Keyframe {
            time: 0.5,
            pose: wrist(0.9, 0.9),
        },
    ];
    // Clamped to the boundaries, but the bracket search must not divide by zero either.
    let (a, b, factor) = find_bracket(&keys, 0.5).unwrap();
    assert_eq!(factor, 0.0);
    assert_eq!(a.pose, b.pose);
}

#[test]
fn bracket_factor_is_relative_to_interval() {
    let keys = vec![
        Keyframe {
            time: 0.0,
            pose: Pose::new(),
        },
        Keyframe {
            time: 0.5,
            pose: Pose::new(),
        },
        Keyframe {
            time: 1.0,
            pose: Pose::new(),
        },
    ];
    let (a, b, factor) = find_bracket(&keys, 0.75).unwrap();
    assert_eq!(a.time, 0.5);
    assert_eq!(b.time, 1.0);
    assert!((factor - 0.5).abs() < 1e-12);
    assert!(find_bracket(&[], 0.5).is_none());
}

#[test]
fn joint_missing_on_one_side_blends_from_rest() {
    let a = Pose::new();
    let b = wrist(0.75, 0.4);
    let mid = interpolate_pose(&a, &b, 0.5);
    assert_eq!(mid.len(), 1);
    let rest = Joint::RightWrist.default_position();
    assert!(approx(
        mid.get(Joint::RightWrist).unwrap(),
        Point::new((rest.x + 0.75) / 2.0, 0.4)
    ));
}

#[test]
fn identical_coordinates_are_not_recomputed() {
    let p = Point::new(0.1, 0.7);
    assert_eq!(<Point as Lerp>::lerp(&p, &p, 0.3333), p);
    // `a + (a - a) * t` is NaN for a non-finite factor; a held joint must stay put.
    let far = Point::new(1.0e308, -1.0e308);
    assert_eq!(<Point as Lerp>::lerp(&far, &far, f64::NAN), far);
    assert_eq!(<Point as Lerp>::lerp(&far, &far, f64::INFINITY), far);
}

#[test]
fn held_joint_survives_non_finite_factor_in_pose_blend() {
    let a = wrist(0.3, 0.6);
    let b = wrist(0.3, 0.6);
    let out = interpolate_pose(&a, &b, f64::NAN);
    assert_eq!(out.get(Joint::RightWrist), Some(Point::new(0.3, 0.6)));
}

#[test]
fn single_keyframe_gesture_is_constant() {
    let g = gesture(30, vec![(0.4, wrist(0.2, 0.2))]);
    for frame in [0, 10, 29, 100] {
        assert_eq!(
            interpolate(&g, frame).get(Joint::RightWrist),
            Some(Point::new(0.2, 0.2))
        );
    }
}

#[test]
fn named_lookup_reports_missing_gesture() {
    use crate::gesture::library::{GestureLibrary, MemoryStore};
    let lib = GestureLibrary::load(MemoryStore::new(Vec::new())).unwrap();
    assert!(interpolate_named(&lib, "NOPE", 0, 30).is_none());
}
