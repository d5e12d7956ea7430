use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Root directory the renderer writes artifacts under.
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,

    /// Directory for materialized payloads. Falls back to the system temp dir.
    #[serde(default)]
    pub input_dir: Option<PathBuf>,

    /// Renderer program followed by its leading arguments (comma separated in the env).
    #[serde(default = "default_render_command")]
    pub render_command: Vec<String>,

    /// Symbol the payload is expected to define.
    #[serde(default = "default_entry_symbol")]
    pub entry_symbol: String,

    #[serde(default = "default_input_suffix")]
    pub input_suffix: String,

    /// Quality directory the renderer writes into by default.
    #[serde(default = "default_resolution_profile")]
    pub resolution_profile: String,

    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,

    /// Public prefix used when building `video_url`.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    #[serde(default = "default_render_timeout_secs")]
    pub render_timeout_secs: u64,

    /// Time a child gets to exit after SIGTERM before it is killed.
    #[serde(default = "default_terminate_grace_secs")]
    pub terminate_grace_secs: u64,

    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    /// Mount the media directory read-only at `/media`.
    #[serde(default = "default_serve_media")]
    pub serve_media: bool,

    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("media")
}

fn default_render_command() -> Vec<String> {
    vec!["manim".to_string(), "render".to_string()]
}

fn default_entry_symbol() -> String {
    "MainScene".to_string()
}

fn default_input_suffix() -> String {
    ".py".to_string()
}

fn default_resolution_profile() -> String {
    "1080p60".to_string()
}

fn default_artifact_extension() -> String {
    "mp4".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_render_timeout_secs() -> u64 {
    300
}

fn default_terminate_grace_secs() -> u64 {
    10
}

fn default_max_payload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_serve_media() -> bool {
    true
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_env() {
        let config: AppConfig = envy::from_iter(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.render_command, vec!["manim", "render"]);
        assert_eq!(config.entry_symbol, "MainScene");
        assert_eq!(config.render_timeout(), Duration::from_secs(300));
        assert_eq!(config.resolution_profile, "1080p60");
        assert!(config.input_dir.is_none());
        assert!(config.serve_media);
    }

    #[test]
    fn test_render_command_is_split_on_commas() {
        let vars = vec![
            ("RENDER_COMMAND".to_string(), "/opt/render tools/bin/manim,render".to_string()),
            ("RENDER_TIMEOUT_SECS".to_string(), "5".to_string()),
        ];
        let config: AppConfig = envy::from_iter(vars).unwrap();
        assert_eq!(config.render_command, vec!["/opt/render tools/bin/manim", "render"]);
        assert_eq!(config.render_timeout_secs, 5);
    }
}
