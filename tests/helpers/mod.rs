//! Shared setup for integration tests: a fake renderer and polling helpers.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use render_jobs::config::AppConfig;
use render_jobs::models::job::JobStatus;
use render_jobs::models::render::StatusResponse;
use render_jobs::services::projector::JobProjector;
use tempfile::TempDir;
use tokio::time::{sleep, Instant};
use uuid::Uuid;

/// Stand-in for the real renderer. It accepts the same command line
/// (`<input> <entry> --media_dir <media>`), records its pid, runs the
/// payload as shell and then writes an empty artifact where the real
/// renderer would.
const FAKE_RENDERER: &str = r#"#!/bin/sh
input="$1"
entry="$2"
media="$4"
base=$(basename "$input" .sh)
echo $$ > "$media/$base.pid"
. "$input"
mkdir -p "$media/videos/$base/1080p60"
: > "$media/videos/$base/1080p60/$entry.mp4"
echo "rendered $entry"
"#;

/// Isolated directories plus a configuration pointing at the fake renderer.
pub struct TestEnv {
    pub dir: TempDir,
    pub config: AppConfig,
}

impl TestEnv {
    pub fn new(timeout_secs: u64) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let media_dir = dir.path().join("media");
        let input_dir = dir.path().join("inputs");
        std::fs::create_dir_all(&media_dir).unwrap();
        std::fs::create_dir_all(&input_dir).unwrap();

        let renderer = dir.path().join("fake renderer.sh");
        std::fs::write(&renderer, FAKE_RENDERER).unwrap();

        let config = AppConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            media_dir,
            input_dir: Some(input_dir),
            render_command: vec!["sh".to_string(), renderer.to_string_lossy().into_owned()],
            entry_symbol: "MainScene".to_string(),
            input_suffix: ".sh".to_string(),
            resolution_profile: "1080p60".to_string(),
            artifact_extension: "mp4".to_string(),
            public_base_url: "http://render.test".to_string(),
            render_timeout_secs: timeout_secs,
            terminate_grace_secs: 2,
            max_payload_bytes: 1024 * 1024,
            serve_media: true,
            shutdown_grace_secs: 5,
        };

        Self { dir, config }
    }

    pub fn media_dir(&self) -> &Path {
        &self.config.media_dir
    }

    pub fn input_dir(&self) -> &Path {
        self.config.input_dir.as_deref().unwrap()
    }

    /// Materialized payloads still on disk.
    pub fn inputs_left(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.input_dir())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.path())
            .collect()
    }

    /// Pid the fake renderer recorded for the input with this base name.
    pub fn renderer_pid(&self, base_name: &str) -> Option<i32> {
        let raw = std::fs::read_to_string(self.media_dir().join(format!("{base_name}.pid"))).ok()?;
        raw.trim().parse().ok()
    }

    /// Pids of every renderer that has started so far.
    pub fn renderer_pids(&self) -> Vec<i32> {
        std::fs::read_dir(self.media_dir())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "pid"))
            .filter_map(|e| std::fs::read_to_string(e.path()).ok())
            .filter_map(|raw| raw.trim().parse().ok())
            .collect()
    }
}

/// Whether a process (including an unreaped zombie) with this pid exists.
pub fn process_exists(pid: i32) -> bool {
    // SAFETY: signal 0 only performs the existence and permission check.
    unsafe { libc::kill(pid, 0) == 0 }
}

/// Base name of the input a job rendered, recovered from its `video_url`.
pub fn base_name_from_url(video_url: &str) -> String {
    video_url
        .trim_start_matches("http://render.test/media/videos/")
        .split('/')
        .next()
        .unwrap()
        .to_string()
}

/// Poll a job until it leaves `Running`.
pub async fn wait_for_terminal(
    projector: &JobProjector,
    id: Uuid,
    timeout: Duration,
) -> StatusResponse {
    let deadline = Instant::now() + timeout;
    loop {
        let status = projector.status(id).expect("Job should exist");
        if status.status != JobStatus::Running {
            return status;
        }
        assert!(
            Instant::now() < deadline,
            "Job {id} still running after {timeout:?}"
        );
        sleep(Duration::from_millis(50)).await;
    }
}
