use std::time::{Duration, SystemTime};

use super::*;

fn temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "signreel_cache_{name}_{}_{nanos}",
        std::process::id()
    ))
}

fn limits(max_bytes: u64) -> CacheLimits {
    CacheLimits {
        max_bytes,
        ..CacheLimits::default()
    }
}

fn put(cache: &VideoCache, key: &str, size: usize, age_secs: u64) -> PathBuf {
    let path = cache.path_for(key);
    std::fs::write(&path, vec![7u8; size]).unwrap();
    let when = SystemTime::now() - Duration::from_secs(age_secs);
    std::fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(when)
        .unwrap();
    path
}

#[test]
fn existence_is_the_index() {
    let dir = temp_dir("exists");
    let cache = VideoCache::open(&dir, limits(1_000)).unwrap();
    assert!(!cache.is_cached("69241"));
    assert_eq!(cache.local_path("69241"), None);

    let path = put(&cache, "69241", 10, 0);
    assert_eq!(path, dir.join("69241.mp4"));
    assert!(cache.is_cached("69241"));
    assert_eq!(cache.local_path("69241"), Some(path));

    assert!(cache.remove("69241").unwrap());
    assert!(!cache.remove("69241").unwrap());
    assert!(!cache.is_cached("69241"));
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn keys_cannot_escape_the_directory() {
    let dir = temp_dir("escape");
    let cache = VideoCache::open(&dir, limits(1_000)).unwrap();
    let path = cache.path_for("../../etc/passwd");
    assert_eq!(path.parent(), Some(dir.as_path()));
    assert_eq!(cache.path_for(""), dir.join("_.mp4"));
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn info_ignores_partials_and_clear_empties() {
    let dir = temp_dir("info");
    let cache = VideoCache::open(&dir, limits(1_000)).unwrap();
    put(&cache, "a", 100, 0);
    put(&cache, "b", 50, 0);
    std::fs::write(cache.partial_path_for("c"), b"half").unwrap();

    let info = cache.info().unwrap();
    assert_eq!(info.file_count, 2);
    assert_eq!(info.total_bytes, 150);
    assert_eq!(info.max_bytes, 1_000);

    cache.clear().unwrap();
    assert!(dir.is_dir());
    assert_eq!(cache.info().unwrap().file_count, 0);
    assert!(!cache.partial_path_for("c").exists());
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn below_high_water_nothing_is_evicted() {
    let dir = temp_dir("below");
    let cache = VideoCache::open(&dir, limits(1_000)).unwrap();
    put(&cache, "a", 400, 30);
    put(&cache, "b", 400, 20);
    let report = cache.evict_if_needed(None).unwrap();
    assert!(!report.evicted());
    assert_eq!(report.bytes_before, 800);
    assert_eq!(report.bytes_after, 800);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn eviction_removes_oldest_until_low_water() {
    let dir = temp_dir("evict");
    let cache = VideoCache::open(&dir, limits(1_000)).unwrap();
    put(&cache, "newest", 100, 10);
    let middle = put(&cache, "mid", 200, 200);
    let oldest = put(&cache, "old", 200, 300);
    put(&cache, "new", 450, 100);

    let report = cache.evict_if_needed(None).unwrap();
    assert_eq!(report.bytes_before, 950);
    assert_eq!(report.removed, vec![oldest.clone(), middle]);
    assert_eq!(report.bytes_after, 550);
    assert!(!oldest.exists());
    assert!(cache.is_cached("new"));
    assert!(cache.is_cached("newest"));
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn excluded_key_survives_eviction() {
    let dir = temp_dir("exclude");
    let cache = VideoCache::open(&dir, limits(1_000)).unwrap();
    put(&cache, "keep", 500, 500);
    put(&cache, "drop", 450, 100);

    let report = cache.evict_if_needed(Some("keep")).unwrap();
    assert_eq!(report.removed, vec![cache.path_for("drop")]);
    assert!(cache.is_cached("keep"));
    assert_eq!(report.bytes_after, 500);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn limits_are_validated() {
    assert!(CacheLimits::default().validate().is_ok());
    assert!(limits(0).validate().is_err());
    let inverted = CacheLimits {
        high_water: 0.5,
        low_water: 0.8,
        ..CacheLimits::default()
    };
    let err = inverted.validate().unwrap_err();
    assert!(err.to_string().starts_with("validation error: "));
    assert!(VideoCache::open(temp_dir("bad"), limits(0)).is_err());
}
