use std::{
    sync::{Arc, Mutex},
    time::{SystemTime, UNIX_EPOCH},
};

use chrono::NaiveDate;

use super::*;

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(h, mi, s)
        .unwrap()
}

fn temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "signreel_compose_{name}_{}_{nanos}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn clip(path: &str, w: u32, h: u32, fps: f64, dur: f64) -> ClipInfo {
    ClipInfo {
        path: PathBuf::from(path),
        width: w,
        height: h,
        fps,
        duration_sec: dur,
    }
}

#[derive(Clone, Default)]
struct FakeBackend {
    concats: Arc<Mutex<Vec<(usize, PathBuf)>>>,
}

impl ClipBackend for FakeBackend {
    fn inspect(&self, path: &Path) -> SignreelResult<ClipInfo> {
        let body = std::fs::read_to_string(path).unwrap_or_default();
        if body.starts_with("bad") {
            return Err(SignreelError::not_found("corrupt clip"));
        }
        Ok(ClipInfo {
            path: path.to_path_buf(),
            width: 640,
            height: 480,
            fps: 30.0,
            duration_sec: 2.0,
        })
    }

    fn concat(
        &self,
        clips: &[ClipInfo],
        _settings: &CompositeSettings,
        out: &Path,
    ) -> SignreelResult<()> {
        std::fs::write(out, b"joined").unwrap();
        self.concats
            .lock()
            .unwrap()
            .push((clips.len(), out.to_path_buf()));
        Ok(())
    }
}

fn compositor(dir: &Path, backend: FakeBackend) -> VideoCompositor {
    VideoCompositor::new(
        backend,
        CompositeSettings {
            out_dir: dir.join("out"),
            ..CompositeSettings::default()
        },
    )
    .unwrap()
}

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let p = dir.join(name);
    std::fs::write(&p, body).unwrap();
    p
}

#[test]
fn single_valid_clip_is_returned_unchanged() {
    let dir = temp_dir("single");
    let backend = FakeBackend::default();
    let comp = compositor(&dir, backend.clone());
    let good = write(&dir, "a.mp4", "ok");
    let bad = write(&dir, "b.mp4", "bad");

    let out = comp
        .compose(&[good.clone(), bad, dir.join("missing.mp4")], &["A", "B", "C"], None)
        .unwrap();
    assert_eq!(out.path, good);
    assert!(!out.encoded);
    assert!(backend.concats.lock().unwrap().is_empty());
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn several_clips_are_joined_with_generated_name() {
    let dir = temp_dir("many");
    let backend = FakeBackend::default();
    let comp = compositor(&dir, backend.clone());
    let a = write(&dir, "a.mp4", "ok");
    let b = write(&dir, "b.mp4", "bad");
    let c = write(&dir, "c.mp4", "ok");

    let out = comp.compose(&[a.clone(), b, c.clone()], &["HELLO", "BAD", "WORLD"], None).unwrap();
    assert!(out.encoded);
    assert_eq!(out.used, vec![a, c]);
    assert_eq!(out.path.parent(), Some(dir.join("out").as_path()));
    let name = out.path.file_name().unwrap().to_string_lossy().into_owned();
    // The unloadable clip's label is left out of the generated name.
    assert!(name.starts_with("sign_language_HELLO_WORLD_"), "{name}");
    let stamp = name
        .trim_start_matches("sign_language_HELLO_WORLD_")
        .trim_end_matches(".mp4");
    assert_eq!(stamp.len(), "20250101_000000".len(), "{name}");
    assert!(NaiveDateTime::parse_from_str(stamp, "%Y%m%d_%H%M%S").is_ok(), "{name}");
    assert!(out.path.is_file());
    assert_eq!(backend.concats.lock().unwrap()[0].0, 2);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn explicit_output_path_is_honored() {
    let dir = temp_dir("explicit");
    let comp = compositor(&dir, FakeBackend::default());
    let a = write(&dir, "a.mp4", "ok");
    let b = write(&dir, "b.mp4", "ok");
    let target = dir.join("nested/final.mp4");
    let out = comp.compose(&[a, b], &[] as &[&str], Some(&target)).unwrap();
    assert_eq!(out.path, target);
    assert!(target.is_file());
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn zero_usable_clips_is_a_composition_error() {
    let dir = temp_dir("zero");
    let comp = compositor(&dir, FakeBackend::default());
    let bad = write(&dir, "b.mp4", "bad");

    let err = comp.compose(&[bad], &["X"], None).unwrap_err();
    assert!(err.is_fatal());
    let err = comp.compose(&[], &[] as &[&str], None).unwrap_err();
    assert!(matches!(err, SignreelError::Composition(_)));
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn composite_info_counts_valid_clips() {
    let dir = temp_dir("info");
    let comp = VideoCompositor::new(
        FakeBackend::default(),
        CompositeSettings {
            transition: Transition::Crossfade { duration_sec: 0.5 },
            out_dir: dir.clone(),
            ..CompositeSettings::default()
        },
    )
    .unwrap();
    let a = write(&dir, "a.mp4", "ok");
    let b = write(&dir, "b.mp4", "bad");
    let c = write(&dir, "c.mp4", "ok");
    let d = write(&dir, "d.mp4", "ok");
    let info = comp.composite_info(&[a, b, c, d]);
    assert_eq!(info.clip_count, 4);
    assert_eq!(info.valid_clips, 3);
    assert_eq!(info.transition_count, 2);
    assert!((info.total_duration_sec - 6.0).abs() < 1e-9);
    assert!((info.estimated_output_duration_sec - 5.0).abs() < 1e-9);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn filter_graph_normalizes_only_what_differs() {
    let settings = CompositeSettings::default();
    let clips = [
        clip("a.mp4", 1280, 720, 25.0, 2.0),
        clip("b.mp4", 640, 480, 29.97, 3.0),
    ];
    let graph = build_filter_graph(&clips, &settings);
    assert_eq!(
        graph,
        "[0:v]setsar=1,format=yuv420p[v0];\
         [1:v]scale=1280:720,fps=25,setsar=1,format=yuv420p[v1];\
         [v0][v1]concat=n=2:v=1:a=0[outv]"
    );
}

#[test]
fn crossfade_offsets_accumulate() {
    let settings = CompositeSettings {
        transition: Transition::Crossfade { duration_sec: 0.5 },
        ..CompositeSettings::default()
    };
    let clips = [
        clip("a.mp4", 1280, 720, 25.0, 2.0),
        clip("b.mp4", 1280, 720, 25.0, 3.0),
        clip("c.mp4", 1280, 720, 25.0, 1.0),
    ];
    let graph = build_filter_graph(&clips, &settings);
    assert!(graph.contains("[v0][v1]xfade=transition=fade:duration=0.500:offset=1.500[x1]"));
    assert!(graph.contains("[x1][v2]xfade=transition=fade:duration=0.500:offset=4.000[outv]"));
}

#[test]
fn output_names() {
    let t = at(2025, 3, 4, 5, 6, 7);
    assert_eq!(
        output_filename(&["HELLO", "THANK-YOU", "my name"], t),
        "sign_language_HELLO_THANK_YOU_my_name_20250304_050607.mp4"
    );
    let many = ["A", "B", "C", "D", "E", "F"];
    assert_eq!(
        output_filename(&many, at(2024, 12, 31, 23, 59, 59)),
        "sign_language_A_B_C_D_E_20241231_235959.mp4"
    );
    let long = ["X".repeat(80)];
    let name = output_filename(&long, t);
    assert_eq!(
        name,
        format!("sign_language_{}_20250304_050607.mp4", "X".repeat(50))
    );
    assert_eq!(
        output_filename(&[] as &[&str], t),
        "sign_language_composite_20250304_050607.mp4"
    );
}

#[test]
fn stream_json_is_parsed() {
    let json = br#"{
        "streams": [
            {"codec_type": "audio"},
            {"codec_type": "video", "width": 640, "height": 480, "r_frame_rate": "30000/1001"}
        ],
        "format": {"duration": "2.50"}
    }"#;
    let info = parse_stream_json(Path::new("x.mp4"), json).unwrap();
    assert_eq!((info.width, info.height), (640, 480));
    assert!((info.fps - 29.97).abs() < 0.01);
    assert!((info.duration_sec - 2.5).abs() < 1e-9);

    let audio_only = br#"{"streams": [{"codec_type": "audio"}]}"#;
    assert!(parse_stream_json(Path::new("y.mp4"), audio_only).is_err());
    assert_eq!(parse_ff_ratio("25"), Some(25.0));
    assert_eq!(parse_ff_ratio("0/0"), None);
}

#[test]
fn odd_output_size_is_rejected() {
    let err = VideoCompositor::new(
        FakeBackend::default(),
        CompositeSettings {
            width: 1281,
            ..CompositeSettings::default()
        },
    )
    .unwrap_err();
    assert!(err.to_string().starts_with("validation error"));
}
