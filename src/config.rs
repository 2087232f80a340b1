use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::engine::scoring::DEFAULT_PASS_PERCENT;
use crate::engine::session_builder::SessionSize;
use crate::session::timer::{DEFAULT_EXAM_SECS, DEFAULT_WARNING_SECS};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Question files on disk. Bundled content is used when empty.
    #[serde(default)]
    pub content_dir: String,
    #[serde(default = "default_exam_duration_secs")]
    pub exam_duration_secs: u64,
    #[serde(default = "default_exam_pass_percent")]
    pub exam_pass_percent: u32,
    #[serde(default = "default_session_size")]
    pub default_session_size: SessionSize,
    #[serde(default = "default_timer_warning_secs")]
    pub timer_warning_secs: u64,
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mindvault")
        .to_string_lossy()
        .to_string()
}
fn default_exam_duration_secs() -> u64 {
    DEFAULT_EXAM_SECS
}
fn default_exam_pass_percent() -> u32 {
    DEFAULT_PASS_PERCENT
}
fn default_session_size() -> SessionSize {
    SessionSize::Short
}
fn default_timer_warning_secs() -> u64 {
    DEFAULT_WARNING_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            content_dir: String::new(),
            exam_duration_secs: default_exam_duration_secs(),
            exam_pass_percent: default_exam_pass_percent(),
            default_session_size: default_session_size(),
            timer_warning_secs: default_timer_warning_secs(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };
        config.validate();
        Ok(config)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mindvault")
            .join("config.toml")
    }

    /// Pull out-of-range values back to something usable.
    pub fn validate(&mut self) {
        if self.exam_duration_secs == 0 {
            log::warn!("exam_duration_secs must be positive, using {DEFAULT_EXAM_SECS}");
            self.exam_duration_secs = DEFAULT_EXAM_SECS;
        }
        self.exam_pass_percent = self.exam_pass_percent.clamp(1, 100);
        self.timer_warning_secs = self.timer_warning_secs.min(self.exam_duration_secs);
        if self.data_dir.trim().is_empty() {
            self.data_dir = default_data_dir();
        }
    }

    pub fn content_dir(&self) -> Option<PathBuf> {
        let dir = self.content_dir.trim();
        (!dir.is_empty()).then(|| PathBuf::from(dir))
    }
}
