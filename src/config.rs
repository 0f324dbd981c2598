use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::utils::errors::PlayerError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub widget: WidgetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_auto_hide_ms")]
    pub auto_hide_ms: u64,

    #[serde(default = "default_double_tap_window_ms")]
    pub double_tap_window_ms: u64,

    #[serde(default = "default_skip_seconds")]
    pub skip_seconds: f64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_seek_grace_ms")]
    pub seek_grace_ms: u64,

    #[serde(default = "default_true")]
    pub autoplay: bool,

    #[serde(default = "default_volume")]
    pub default_volume: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default = "default_bootstrap_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_remote_sdk")]
    pub remote_sdk: ScriptSpec,

    #[serde(default = "default_demux_library")]
    pub demux_library: ScriptSpec,

    /// MIME type probed on the native element to decide whether the demuxer is needed.
    #[serde(default = "default_segmented_mime")]
    pub segmented_mime: String,
}

/// Describes a dynamically injected runtime dependency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptSpec {
    pub name: String,
    pub src: String,
    /// Global symbol whose presence means the dependency is already installed.
    pub global: String,
    /// Global callback the dependency invokes once it is usable. `None` means
    /// the script's load event is enough.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_callback: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_remote_hosts")]
    pub remote_widget_hosts: Vec<String>,

    #[serde(default = "default_manifest_extensions")]
    pub manifest_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetConfig {
    #[serde(default = "default_true")]
    pub autoplay: bool,

    /// Hide the widget's own control chrome; our control bar drives it.
    #[serde(default = "default_true")]
    pub chromeless: bool,

    #[serde(default = "default_true")]
    pub suppress_branding: bool,
}

impl PlaybackConfig {
    pub fn auto_hide_delay(&self) -> Duration {
        Duration::from_millis(self.auto_hide_ms)
    }

    pub fn double_tap_window(&self) -> Duration {
        Duration::from_millis(self.double_tap_window_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn seek_grace(&self) -> Duration {
        Duration::from_millis(self.seek_grace_ms)
    }
}

impl BootstrapConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            debug!("Loading config from {:?}", config_path);
            let contents =
                fs::read_to_string(config_path).context("Failed to read config file")?;
            let config = Self::from_toml_str(&contents)?;
            info!("Config loaded successfully");
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            let config = Config::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, contents).context("Failed to write config file")?;

        debug!("Config saved to {:?}", config_path);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.playback.default_volume > 100 {
            return Err(PlayerError::Configuration(format!(
                "playback.default_volume must be within 0..=100, got {}",
                self.playback.default_volume
            ))
            .into());
        }
        let skip = self.playback.skip_seconds;
        if !skip.is_finite() || skip <= 0.0 {
            return Err(PlayerError::Configuration(format!(
                "playback.skip_seconds must be a positive number, got {}",
                skip
            ))
            .into());
        }
        let durations = [
            ("playback.auto_hide_ms", self.playback.auto_hide_ms),
            ("playback.double_tap_window_ms", self.playback.double_tap_window_ms),
            ("playback.poll_interval_ms", self.playback.poll_interval_ms),
            ("bootstrap.timeout_ms", self.bootstrap.timeout_ms),
        ];
        if let Some((key, _)) = durations.iter().find(|(_, ms)| *ms == 0) {
            return Err(PlayerError::Configuration(format!("{} must be positive", key)).into());
        }
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(config_dir.join("lesson-player").join("config.toml"))
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            auto_hide_ms: default_auto_hide_ms(),
            double_tap_window_ms: default_double_tap_window_ms(),
            skip_seconds: default_skip_seconds(),
            poll_interval_ms: default_poll_interval_ms(),
            seek_grace_ms: default_seek_grace_ms(),
            autoplay: default_true(),
            default_volume: default_volume(),
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_bootstrap_timeout_ms(),
            remote_sdk: default_remote_sdk(),
            demux_library: default_demux_library(),
            segmented_mime: default_segmented_mime(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            remote_widget_hosts: default_remote_hosts(),
            manifest_extensions: default_manifest_extensions(),
        }
    }
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            autoplay: default_true(),
            chromeless: default_true(),
            suppress_branding: default_true(),
        }
    }
}

// Default value functions
fn default_true() -> bool { true }
fn default_auto_hide_ms() -> u64 { 3000 }
fn default_double_tap_window_ms() -> u64 { 300 }
fn default_skip_seconds() -> f64 { 10.0 }
fn default_poll_interval_ms() -> u64 { 250 }
fn default_seek_grace_ms() -> u64 { 400 }
fn default_volume() -> u8 { 100 }
fn default_bootstrap_timeout_ms() -> u64 { 10_000 }
fn default_segmented_mime() -> String { "application/vnd.apple.mpegurl".to_string() }

fn default_remote_sdk() -> ScriptSpec {
    ScriptSpec {
        name: "remote-widget-sdk".to_string(),
        src: "https://www.youtube.com/iframe_api".to_string(),
        global: "YT.Player".to_string(),
        ready_callback: Some("onYouTubeIframeAPIReady".to_string()),
    }
}

fn default_demux_library() -> ScriptSpec {
    ScriptSpec {
        name: "segmented-demuxer".to_string(),
        src: "https://cdn.jsdelivr.net/npm/hls.js@1".to_string(),
        global: "Hls".to_string(),
        ready_callback: None,
    }
}

fn default_remote_hosts() -> Vec<String> {
    vec![
        "youtube.com".to_string(),
        "youtu.be".to_string(),
        "youtube-nocookie.com".to_string(),
    ]
}

fn default_manifest_extensions() -> Vec<String> {
    vec!["m3u8".to_string()]
}
