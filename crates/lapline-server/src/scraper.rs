//! Best-effort map metadata fetching.
//!
//! The real implementation shells out to the external scraper script with the
//! target URL as its sole argument and treats every deviation — bad exit code,
//! timeout, unparsable output, missing script — as a degraded success. A fetch
//! can never fail the zone write that triggered it.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use lapline_core::model::MapData;

use crate::config::ScraperConfig;

/// Shown to users whenever a scrape could not produce anything better.
pub const FALLBACK_MESSAGE: &str = "Map information available - View in There for full details";

/// Keep stdout bounded so a runaway scraper cannot exhaust memory.
const STDOUT_CAP: usize = 100_000;
const STDERR_CAP: usize = 10_000;

/// Degraded text is clipped to this many characters.
const DEGRADED_TEXT_LIMIT: usize = 1_000;

/// Outcome of a map-metadata fetch. Never an error: callers always get
/// something renderable.
#[derive(Debug, Clone, PartialEq)]
pub enum MapFetchOutcome {
    /// The scraper produced a structured payload.
    Structured { formatted: String, data: MapData },
    /// Fallback or degraded text, usable as `map_info` only.
    Text(String),
    /// The URL was rejected before any work happened.
    Skipped,
}

/// Injected capability for map enrichment, so CRUD logic is testable with a
/// fake.
#[async_trait]
pub trait MapFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> MapFetchOutcome;
}

/// JSON contract with the scraper script.
#[derive(Debug, serde::Deserialize)]
struct ScrapePayload {
    #[serde(default)]
    formatted: String,
    #[serde(default)]
    structured: MapData,
}

/// RAII slot under the process-wide scrape cap. Dropping releases the slot,
/// which is what guarantees the exactly-once decrement on every exit path.
struct ScrapeSlot {
    counter: Arc<AtomicUsize>,
}

impl ScrapeSlot {
    fn acquire(counter: &Arc<AtomicUsize>, cap: usize) -> Option<Self> {
        counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                (active < cap).then_some(active + 1)
            })
            .ok()?;
        Some(Self {
            counter: Arc::clone(counter),
        })
    }
}

impl Drop for ScrapeSlot {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Real fetcher: spawns the scraper subprocess under a concurrency cap and a
/// hard timeout.
pub struct SubprocessFetcher {
    command: String,
    script: PathBuf,
    timeout: Duration,
    grace: Duration,
    max_concurrent: usize,
    active: Arc<AtomicUsize>,
}

impl SubprocessFetcher {
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            command: config.command.clone(),
            script: PathBuf::from(&config.script),
            timeout: Duration::from_secs(config.timeout_secs),
            grace: Duration::from_secs(config.grace_secs),
            max_concurrent: config.max_concurrent,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn fallback() -> MapFetchOutcome {
        MapFetchOutcome::Text(FALLBACK_MESSAGE.to_string())
    }

    fn interpret(stdout: &str) -> MapFetchOutcome {
        match serde_json::from_str::<serde_json::Value>(stdout) {
            Ok(value @ serde_json::Value::Object(_)) => {
                match serde_json::from_value::<ScrapePayload>(value) {
                    Ok(payload) => MapFetchOutcome::Structured {
                        formatted: payload.formatted,
                        data: payload.structured,
                    },
                    Err(_) => Self::fallback(),
                }
            },
            // A bare JSON string is already display-ready
            Ok(serde_json::Value::String(text)) => MapFetchOutcome::Text(text),
            _ => {
                let trimmed = stdout.trim();
                if trimmed.is_empty() {
                    Self::fallback()
                } else {
                    // Degraded success: keep what the scraper printed, clipped
                    MapFetchOutcome::Structured {
                        formatted: trimmed.chars().take(DEGRADED_TEXT_LIMIT).collect(),
                        data: MapData::default(),
                    }
                }
            },
        }
    }
}

#[async_trait]
impl MapFetcher for SubprocessFetcher {
    async fn fetch(&self, url: &str) -> MapFetchOutcome {
        if url.is_empty() || !url.starts_with("https://") {
            return MapFetchOutcome::Skipped;
        }

        let Some(_slot) = ScrapeSlot::acquire(&self.active, self.max_concurrent) else {
            tracing::warn!("Map scraper concurrency cap reached, using fallback");
            return Self::fallback();
        };

        if !self.script.exists() {
            tracing::warn!(script = %self.script.display(), "Map scraper script not found");
            return Self::fallback();
        }

        tracing::info!(%url, active = self.active.load(Ordering::Acquire), "Scraping map data");

        let mut child = match Command::new(&self.command)
            .arg(&self.script)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!("Failed to spawn map scraper: {e}");
                return Self::fallback();
            },
        };

        let (Some(stdout_pipe), Some(stderr_pipe)) = (child.stdout.take(), child.stderr.take())
        else {
            return Self::fallback();
        };

        let capture = async {
            tokio::join!(
                read_capped(stdout_pipe, STDOUT_CAP),
                read_capped(stderr_pipe, STDERR_CAP),
                child.wait(),
            )
        };

        match tokio::time::timeout(self.timeout, capture).await {
            Err(_) => {
                tracing::warn!(%url, "Map scraper timed out, terminating");
                terminate(&mut child, self.grace).await;
                Self::fallback()
            },
            Ok((stdout, stderr, status)) => {
                if !stderr.is_empty() {
                    let clipped: String = stderr.chars().take(200).collect();
                    tracing::debug!(stderr = %clipped, "Map scraper diagnostics");
                }
                let exited_ok = status.map(|s| s.success()).unwrap_or(false);
                if !exited_ok {
                    tracing::warn!(%url, "Map scraper exited with failure");
                    return Self::fallback();
                }
                Self::interpret(&stdout)
            },
        }
    }
}

/// Read a pipe to EOF, keeping at most `cap` bytes but draining the rest so
/// the child never blocks on a full pipe.
async fn read_capped<R: AsyncRead + Unpin>(mut pipe: R, cap: usize) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if buf.len() < cap {
                    let take = n.min(cap - buf.len());
                    buf.extend_from_slice(&chunk[..take]);
                }
            },
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Graceful stop, then a forced kill if the child outlives the grace period.
async fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: plain signal send to a pid we own; no memory is touched.
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
    #[cfg(not(unix))]
    let _ = child.start_kill();

    if tokio::time::timeout(grace, child.wait()).await.is_err() {
        let _ = child.kill().await;
    }
}

#[cfg(test)]
pub(crate) struct FakeFetcher(pub MapFetchOutcome);

#[cfg(test)]
#[async_trait]
impl MapFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> MapFetchOutcome {
        if url.is_empty() || !url.starts_with("https://") {
            return MapFetchOutcome::Skipped;
        }
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> SubprocessFetcher {
        SubprocessFetcher::from_config(&ScraperConfig::default())
    }

    #[tokio::test]
    async fn rejects_non_https_urls_without_spawning() {
        let fetcher = fetcher();
        assert_eq!(fetcher.fetch("").await, MapFetchOutcome::Skipped);
        assert_eq!(
            fetcher.fetch("http://example.com/map").await,
            MapFetchOutcome::Skipped
        );
        assert_eq!(
            fetcher.fetch("ftp://example.com").await,
            MapFetchOutcome::Skipped
        );
        assert_eq!(fetcher.active.load(Ordering::Acquire), 0);
    }

    #[tokio::test]
    async fn missing_script_yields_fallback() {
        let fetcher = SubprocessFetcher {
            script: PathBuf::from("/nonexistent/scraper.py"),
            ..fetcher()
        };
        assert_eq!(
            fetcher.fetch("https://example.com/map").await,
            MapFetchOutcome::Text(FALLBACK_MESSAGE.to_string())
        );
        assert_eq!(fetcher.active.load(Ordering::Acquire), 0);
    }

    #[test]
    fn slot_cap_enforced_and_released() {
        let counter = Arc::new(AtomicUsize::new(0));
        let first = ScrapeSlot::acquire(&counter, 2).expect("slot");
        let _second = ScrapeSlot::acquire(&counter, 2).expect("slot");
        assert!(ScrapeSlot::acquire(&counter, 2).is_none());
        assert_eq!(counter.load(Ordering::Acquire), 2);

        drop(first);
        assert_eq!(counter.load(Ordering::Acquire), 1);
        assert!(ScrapeSlot::acquire(&counter, 2).is_some());
    }

    #[test]
    fn interpret_structured_payload() {
        let outcome = SubprocessFetcher::interpret(
            r#"{"formatted": "Dune Sea | Environment: Desert", "structured": {"title": "Dune Sea"}}"#,
        );
        match outcome {
            MapFetchOutcome::Structured { formatted, data } => {
                assert_eq!(formatted, "Dune Sea | Environment: Desert");
                assert_eq!(data.title, "Dune Sea");
            },
            other => panic!("expected structured outcome, got {other:?}"),
        }
    }

    #[test]
    fn interpret_non_json_output_degrades() {
        let outcome = SubprocessFetcher::interpret("  Zone Map ID: 12345  ");
        match outcome {
            MapFetchOutcome::Structured { formatted, data } => {
                assert_eq!(formatted, "Zone Map ID: 12345");
                assert_eq!(data, MapData::default());
            },
            other => panic!("expected degraded outcome, got {other:?}"),
        }
    }

    #[test]
    fn interpret_clips_degraded_output() {
        let long = "x".repeat(5_000);
        match SubprocessFetcher::interpret(&long) {
            MapFetchOutcome::Structured { formatted, .. } => {
                assert_eq!(formatted.len(), DEGRADED_TEXT_LIMIT);
            },
            other => panic!("expected degraded outcome, got {other:?}"),
        }
    }

    #[test]
    fn interpret_empty_output_is_fallback() {
        assert_eq!(
            SubprocessFetcher::interpret("   "),
            MapFetchOutcome::Text(FALLBACK_MESSAGE.to_string())
        );
    }

    #[test]
    fn interpret_json_string_passes_through() {
        assert_eq!(
            SubprocessFetcher::interpret(r#""Map details pending""#),
            MapFetchOutcome::Text("Map details pending".to_string())
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn subprocess_output_is_captured() {
        let script = std::env::temp_dir().join(format!(
            "lapline-scraper-test-{}-echo.sh",
            std::process::id()
        ));
        std::fs::write(
            &script,
            "#!/bin/sh\necho '{\"formatted\": \"from script\", \"structured\": {}}'\n",
        )
        .expect("write script");

        let fetcher = SubprocessFetcher {
            command: "sh".to_string(),
            script: script.clone(),
            ..fetcher()
        };
        let outcome = fetcher.fetch("https://example.com/map").await;
        match outcome {
            MapFetchOutcome::Structured { formatted, .. } => assert_eq!(formatted, "from script"),
            other => panic!("expected structured outcome, got {other:?}"),
        }
        assert_eq!(fetcher.active.load(Ordering::Acquire), 0);

        let _ = std::fs::remove_file(&script);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_terminates_and_falls_back() {
        let script = std::env::temp_dir().join(format!(
            "lapline-scraper-test-{}-sleep.sh",
            std::process::id()
        ));
        std::fs::write(&script, "#!/bin/sh\nsleep 30\n").expect("write script");

        let fetcher = SubprocessFetcher {
            command: "sh".to_string(),
            script: script.clone(),
            timeout: Duration::from_millis(200),
            grace: Duration::from_millis(100),
            ..fetcher()
        };
        let started = std::time::Instant::now();
        let outcome = fetcher.fetch("https://example.com/map").await;
        assert_eq!(outcome, MapFetchOutcome::Text(FALLBACK_MESSAGE.to_string()));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(fetcher.active.load(Ordering::Acquire), 0);

        let _ = std::fs::remove_file(&script);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_yields_fallback() {
        let script = std::env::temp_dir().join(format!(
            "lapline-scraper-test-{}-fail.sh",
            std::process::id()
        ));
        std::fs::write(&script, "#!/bin/sh\necho garbage\nexit 3\n").expect("write script");

        let fetcher = SubprocessFetcher {
            command: "sh".to_string(),
            script: script.clone(),
            ..fetcher()
        };
        assert_eq!(
            fetcher.fetch("https://example.com/map").await,
            MapFetchOutcome::Text(FALLBACK_MESSAGE.to_string())
        );

        let _ = std::fs::remove_file(&script);
    }
}
