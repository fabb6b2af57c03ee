use std::{
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, SystemTime},
};

use super::*;
use crate::video::cache::CacheLimits;

fn temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "signreel_loader_{name}_{}_{nanos}",
        std::process::id()
    ))
}

struct FakeFetcher {
    calls: Arc<AtomicUsize>,
    failures_before_success: usize,
    delay: Duration,
}

impl Fetcher for FakeFetcher {
    fn name(&self) -> &str {
        "fake"
    }

    fn handles(&self, url: &str) -> bool {
        url.starts_with("fake://")
    }

    fn fetch(&self, url: &str, dest: &Path) -> SignreelResult<u64> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        // Leave a partial behind on failure so cleanup is observable.
        std::fs::write(dest, b"partial").unwrap();
        if url.contains("dead") || n < self.failures_before_success {
            return Err(SignreelError::download("connection reset"));
        }
        std::fs::write(dest, url.as_bytes()).unwrap();
        Ok(url.len() as u64)
    }
}

fn loader(name: &str, failures_before_success: usize, delay: Duration) -> (VideoLoader, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = VideoCache::open(temp_dir(name), CacheLimits::default()).unwrap();
    let fetcher = FakeFetcher {
        calls: Arc::clone(&calls),
        failures_before_success,
        delay,
    };
    let retry = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
    };
    (VideoLoader::new(cache, vec![Box::new(fetcher)], retry), calls)
}

#[test]
fn miss_downloads_then_hit_is_served_from_disk() {
    let (loader, calls) = loader("hit", 0, Duration::ZERO);
    let path = loader.get("fake://clip/1", "v1", false).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"fake://clip/1");
    assert!(loader.is_cached("v1"));
    assert!(!loader.cache().partial_path_for("v1").exists());

    let again = loader.get("fake://clip/1", "v1", false).unwrap();
    assert_eq!(again, path);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let _ = std::fs::remove_dir_all(loader.cache().dir());
}

#[test]
fn transient_failures_are_retried() {
    let (loader, calls) = loader("retry", 2, Duration::ZERO);
    let path = loader.get("fake://clip/2", "v2", false).unwrap();
    assert!(path.is_file());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let _ = std::fs::remove_dir_all(loader.cache().dir());
}

#[test]
fn exhausted_retries_leave_nothing_behind() {
    let (loader, calls) = loader("dead", 0, Duration::ZERO);
    let err = loader.get("fake://dead/3", "v3", false).unwrap_err();
    assert!(matches!(err, SignreelError::Download(_)));
    assert!(err.to_string().contains("unavailable after 3 attempt(s)"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(!loader.is_cached("v3"));
    assert!(!loader.cache().partial_path_for("v3").exists());
    let _ = std::fs::remove_dir_all(loader.cache().dir());
}

#[test]
fn unroutable_url_is_not_found_without_attempts() {
    let (loader, calls) = loader("route", 0, Duration::ZERO);
    let err = loader.get("gopher://x", "v4", false).unwrap_err();
    assert!(matches!(err, SignreelError::NotFound(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let _ = std::fs::remove_dir_all(loader.cache().dir());
}

#[test]
fn force_refresh_downloads_again() {
    let (loader, calls) = loader("refresh", 0, Duration::ZERO);
    loader.get("fake://clip/5", "v5", false).unwrap();
    let path = loader.get("fake://clip/5b", "v5", true).unwrap();
    assert_eq!(std::fs::read(path).unwrap(), b"fake://clip/5b");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let _ = std::fs::remove_dir_all(loader.cache().dir());
}

#[test]
fn concurrent_requests_for_one_id_download_once() {
    let (loader, calls) = loader("inflight", 0, Duration::from_millis(50));
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                loader.get("fake://clip/6", "v6", false).unwrap();
            });
        }
    });
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(loader.inflight.lock().unwrap().is_empty());
    let _ = std::fs::remove_dir_all(loader.cache().dir());
}

#[test]
fn fetch_first_falls_through_to_next_candidate() {
    let (loader, _) = loader("first", 0, Duration::ZERO);
    let dead = VideoCandidate::new("aslu", "fake://dead/a", "a");
    let live = VideoCandidate::new("handspeak", "fake://clip/b", "b");
    let outcome = loader.fetch_first(&[&dead, &live]);
    let (hit, path) = outcome.hit.unwrap();
    assert_eq!(hit.video_id, "b");
    assert!(path.is_file());
    assert_eq!(outcome.failed, vec!["a".to_string()]);

    let none = loader.fetch_first(&[&dead]);
    assert!(none.hit.is_none());
    assert_eq!(none.failed, vec!["a".to_string()]);
    let _ = std::fs::remove_dir_all(loader.cache().dir());
}

/// Answers `connections` requests with the same canned response, then stops.
fn serve(response: &'static [u8], connections: usize) -> String {
    use std::io::{Read as _, Write as _};

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        for stream in listener.incoming().take(connections) {
            let mut stream = stream.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let _ = stream.write_all(response);
            let _ = stream.flush();
        }
    });
    format!("http://{addr}/clip.mp4")
}

fn http_loader(name: &str) -> VideoLoader {
    let cache = VideoCache::open(temp_dir(name), CacheLimits::default()).unwrap();
    let fetcher = HttpFetcher::new(&HttpOptions {
        timeout_secs: 5,
        ..HttpOptions::default()
    })
    .unwrap();
    let retry = RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::ZERO,
    };
    VideoLoader::new(cache, vec![Box::new(fetcher)], retry)
}

fn files_in(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect()
}

#[test]
fn http_download_streams_body_into_cache() {
    let url = serve(
        b"HTTP/1.1 200 OK\r\nContent-Type: video/mp4\r\nContent-Length: 10\r\nConnection: close\r\n\r\n0123456789",
        1,
    );
    let loader = http_loader("http_ok");
    let path = loader.get(&url, "full", false).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"0123456789");
    assert_eq!(files_in(loader.cache().dir()), vec![path]);
    let _ = std::fs::remove_dir_all(loader.cache().dir());
}

#[test]
fn http_short_body_fails_and_leaves_no_file() {
    let url = serve(
        b"HTTP/1.1 200 OK\r\nContent-Type: video/mp4\r\nContent-Length: 100\r\nConnection: close\r\n\r\n0123456789",
        2,
    );
    let loader = http_loader("http_short");
    let err = loader.get(&url, "short", false).unwrap_err();
    assert!(matches!(err, SignreelError::Download(_)), "{err}");
    assert!(!loader.is_cached("short"));
    assert!(files_in(loader.cache().dir()).is_empty());
    let _ = std::fs::remove_dir_all(loader.cache().dir());
}

#[test]
fn http_empty_body_fails_and_leaves_no_file() {
    let url = serve(
        b"HTTP/1.1 200 OK\r\nContent-Type: video/mp4\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        2,
    );
    let loader = http_loader("http_empty");
    let err = loader.get(&url, "empty", false).unwrap_err();
    assert!(matches!(err, SignreelError::Download(_)), "{err}");
    assert!(err.to_string().contains("empty"), "{err}");
    assert!(files_in(loader.cache().dir()).is_empty());
    let _ = std::fs::remove_dir_all(loader.cache().dir());
}

#[test]
fn http_error_status_is_a_download_failure() {
    let url = serve(
        b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        2,
    );
    let loader = http_loader("http_404");
    let err = loader.get(&url, "missing", false).unwrap_err();
    assert!(err.to_string().contains("404"), "{err}");
    assert!(files_in(loader.cache().dir()).is_empty());
    let _ = std::fs::remove_dir_all(loader.cache().dir());
}
