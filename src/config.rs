//! Config — nested sections for each subsystem, stored as config.json next to the binary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::credentials::CredentialConfig;
use crate::provider::Provider;

// ── Sub-configs ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_active_provider")]
    pub active: Provider,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    #[serde(default = "default_bedrock_model")]
    pub bedrock_model: String,
    /// Request timeout for a single analysis call, in seconds. No retries.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            active: default_active_provider(),
            gemini_model: default_gemini_model(),
            bedrock_model: default_bedrock_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// A fixed capture rectangle in screen coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CaptureArea {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// "full" (whole primary screen) or "area" (use `area`).
    #[serde(default = "default_capture_mode")]
    pub mode: String,
    #[serde(default)]
    pub area: Option<CaptureArea>,
    /// Triggers arriving within this window of the previous accepted one are dropped.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            mode: default_capture_mode(),
            area: None,
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopupConfig {
    /// "cursor" or "fixed:x,y". Passed to the presenter as a placement hint.
    #[serde(default = "default_popup_position")]
    pub position: String,
    #[serde(default = "default_answers_per_line")]
    pub answers_per_line: usize,
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            position: default_popup_position(),
            answers_per_line: default_answers_per_line(),
        }
    }
}

/// Single letters combined with Alt. Delete (clear all) and Backquote (exit) are fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotkeyConfig {
    #[serde(default = "default_hotkey_capture")]
    pub capture: String,
    #[serde(default = "default_hotkey_results")]
    pub results: String,
    #[serde(default = "default_hotkey_history")]
    pub history: String,
    #[serde(default = "default_hotkey_reset")]
    pub reset: String,
    #[serde(default = "default_hotkey_switch")]
    pub switch: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            capture: default_hotkey_capture(),
            results: default_hotkey_results(),
            history: default_hotkey_history(),
            reset: default_hotkey_reset(),
            switch: default_hotkey_switch(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_answer_file")]
    pub file: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            file: default_answer_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

// ── Top-level config ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub credentials: CredentialConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub popup: PopupConfig,
    #[serde(default)]
    pub hotkeys: HotkeyConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub log: LogConfig,
}

// ── Defaults ───────────────────────────────────────────────────────────────

fn default_active_provider() -> Provider { Provider::Gemini }
fn default_gemini_model() -> String { "gemini-2.5-flash".into() }
fn default_bedrock_model() -> String { "us.anthropic.claude-3-5-sonnet-20240620-v1:0".into() }
fn default_timeout_secs() -> u64 { 30 }
fn default_capture_mode() -> String { "full".into() }
fn default_cooldown_secs() -> f64 { 2.0 }
fn default_popup_position() -> String { "cursor".into() }
fn default_answers_per_line() -> usize { 10 }
fn default_hotkey_capture() -> String { "z".into() }
fn default_hotkey_results() -> String { "x".into() }
fn default_hotkey_history() -> String { "c".into() }
fn default_hotkey_reset() -> String { "r".into() }
fn default_hotkey_switch() -> String { "p".into() }
fn default_log_level() -> String { "info".into() }
fn default_answer_file() -> PathBuf { exe_dir().join("logs").join("answers.log") }
fn default_log_file() -> PathBuf { exe_dir().join("logs").join("snapquiz.log") }

/// Directory of the running binary, or "." when it can't be resolved.
pub fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn config_path() -> PathBuf {
    exe_dir().join("config.json")
}

// ── Load / save ────────────────────────────────────────────────────────────

/// Load config.json from next to the binary.
///
/// A missing file yields defaults (first run, before `snapquiz setup`).
/// A file that exists but does not parse is fatal: running with silently
/// dropped credentials or a wrong active provider is worse than refusing
/// to start.
pub fn load_config() -> Result<Config> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => {
            log::info!("No config at {:?}, using defaults", path);
            return Ok(Config::default());
        }
    };
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse config file {:?}", path))
}

pub fn save_config(cfg: &Config) -> Result<()> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let contents = serde_json::to_string_pretty(cfg)?;
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write config file {:?}", path))
}
