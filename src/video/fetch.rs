use std::{
    io::{Read as _, Write as _},
    path::Path,
    process::{Command, Stdio},
    time::Duration,
};

use crate::foundation::error::{SignreelError, SignreelResult};

/// A way of turning a clip URL into bytes on disk.
pub trait Fetcher: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Whether this fetcher should be used for `url`.
    fn handles(&self, url: &str) -> bool;

    /// Download `url` into `dest`, replacing anything already there. Returns bytes written.
    fn fetch(&self, url: &str, dest: &Path) -> SignreelResult<u64>;
}

/// Attempts and backoff for one download.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait after the first failure; doubles after each further failure.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(2u32.pow(exp))
    }

    /// Run `op` until it succeeds or attempts run out; returns the last error.
    pub fn run<T>(
        &self,
        what: &str,
        mut op: impl FnMut(u32) -> SignreelResult<T>,
    ) -> SignreelResult<T> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(v) => return Ok(v),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    let wait = self.delay_after(attempt);
                    tracing::warn!(
                        what,
                        attempt,
                        max_attempts = attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "attempt failed, retrying"
                    );
                    if !wait.is_zero() {
                        std::thread::sleep(wait);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

/// Transport settings for direct HTTP downloads.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HttpOptions {
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
    /// Read buffer size.
    pub chunk_size: usize,
    /// `User-Agent` header; some hosts refuse non-browser clients.
    pub user_agent: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            chunk_size: 8192,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .to_string(),
        }
    }
}

/// Plain HTTP(S) GET streamed to disk.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    chunk_size: usize,
}

impl HttpFetcher {
    /// Build the underlying client.
    pub fn new(opts: &HttpOptions) -> SignreelResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(opts.timeout_secs.max(1)))
            .user_agent(opts.user_agent.clone())
            .build()
            .map_err(|e| SignreelError::download(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            chunk_size: opts.chunk_size.max(512),
        })
    }
}

impl Fetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    fn handles(&self, url: &str) -> bool {
        let lower = url.trim().to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }

    fn fetch(&self, url: &str, dest: &Path) -> SignreelResult<u64> {
        let mut resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| SignreelError::download(format!("request to '{url}' failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SignreelError::download(format!("HTTP {status} for '{url}'")));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !looks_like_video(&content_type) {
            tracing::warn!(url, content_type = %content_type, "unexpected content type for video download");
        }
        let declared = resp.content_length();

        let mut file = std::fs::File::create(dest).map_err(|e| {
            SignreelError::download(format!("failed to create '{}': {e}", dest.display()))
        })?;
        let mut buf = vec![0u8; self.chunk_size];
        let mut written = 0u64;
        loop {
            let n = resp
                .read(&mut buf)
                .map_err(|e| SignreelError::download(format!("read from '{url}' failed: {e}")))?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n]).map_err(|e| {
                SignreelError::download(format!("write to '{}' failed: {e}", dest.display()))
            })?;
            written += n as u64;
        }
        file.flush().map_err(|e| {
            SignreelError::download(format!("flush of '{}' failed: {e}", dest.display()))
        })?;

        check_download_size(written, declared)?;
        tracing::debug!(url, bytes = written, "downloaded");
        Ok(written)
    }
}

fn looks_like_video(content_type: &str) -> bool {
    content_type.is_empty()
        || content_type.contains("video")
        || content_type.contains("octet-stream")
}

/// Reject empty bodies and bodies shorter than the declared length.
pub fn check_download_size(written: u64, declared: Option<u64>) -> SignreelResult<()> {
    if written == 0 {
        return Err(SignreelError::download("downloaded file is empty"));
    }
    if let Some(expected) = declared
        && expected > 0
        && written < expected
    {
        return Err(SignreelError::download(format!(
            "incomplete download: {written} of {expected} bytes"
        )));
    }
    Ok(())
}

/// Settings for the external page-extractor tool.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExtractorOptions {
    /// Executable to run.
    pub program: String,
    /// Format selector passed through to the tool.
    pub format: String,
    /// Hosts (and their subdomains) routed to the extractor.
    pub hosts: Vec<String>,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            program: "yt-dlp".to_string(),
            format: "best[ext=mp4]/best".to_string(),
            hosts: vec!["youtube.com".to_string(), "youtu.be".to_string()],
        }
    }
}

/// Video-hosting pages that need a site extractor rather than a plain GET.
pub struct ExtractorFetcher {
    opts: ExtractorOptions,
}

impl ExtractorFetcher {
    /// Fetcher driving `opts.program`.
    pub fn new(opts: ExtractorOptions) -> Self {
        Self { opts }
    }
}

impl Fetcher for ExtractorFetcher {
    fn name(&self) -> &str {
        &self.opts.program
    }

    fn handles(&self, url: &str) -> bool {
        let Some(host) = host_of(url) else {
            return false;
        };
        self.opts
            .hosts
            .iter()
            .any(|h| host == *h || host.ends_with(&format!(".{h}")))
    }

    fn fetch(&self, url: &str, dest: &Path) -> SignreelResult<u64> {
        if !is_program_on_path(&self.opts.program) {
            return Err(SignreelError::download(format!(
                "'{}' is required for '{url}', but was not found on PATH",
                self.opts.program
            )));
        }
        let output = Command::new(&self.opts.program)
            .args([
                "--quiet",
                "--no-warnings",
                "--no-progress",
                "--no-playlist",
                "--force-overwrites",
                "--format",
                self.opts.format.as_str(),
                "--output",
            ])
            .arg(output_template(dest))
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                SignreelError::download(format!("failed to spawn '{}': {e}", self.opts.program))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SignreelError::download(format!(
                "'{}' exited with status {} for '{url}': {}",
                self.opts.program,
                output.status,
                stderr.trim()
            )));
        }

        let written = std::fs::metadata(dest).map(|m| m.len()).unwrap_or(0);
        check_download_size(written, None)?;
        tracing::debug!(url, bytes = written, "extracted");
        Ok(written)
    }
}

// `--output` is a template; a literal `%` in the path must be doubled.
fn output_template(dest: &Path) -> String {
    dest.to_string_lossy().replace('%', "%%")
}

/// Lowercased host of an absolute URL, without port or credentials.
pub fn host_of(url: &str) -> Option<String> {
    reqwest::Url::parse(url.trim())
        .ok()?
        .host_str()
        .map(str::to_ascii_lowercase)
}

/// Whether `program --version` runs successfully.
pub fn is_program_on_path(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/video/fetch.rs"]
mod tests;
