//! Layered engine configuration.
//!
//! Precedence, highest first: environment variables (`LOGWEAVE_*`), a
//! `logweave.toml` in the current directory, a user-level config under the
//! platform config directory, then built-in defaults. Unlike a generated
//! settings module, this is a small hand-written struct: the tunable surface
//! is a handful of engine constants rather than a large nested tree.

use crate::error::SessionError;
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub chunk_max_lines: usize,
    pub batch_size: usize,
    pub progress_min_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            chunk_max_lines: 5_000,
            batch_size: 1_000,
            progress_min_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmupSettings {
    pub target: usize,
    pub per_type_cap: Option<usize>,
}

impl Default for WarmupSettings {
    fn default() -> Self {
        Self {
            target: 500,
            per_type_cap: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimezoneSettings {
    pub jump_threshold_ms: i64,
    pub min_suspect_lines: usize,
    pub return_tolerance_ms: i64,
}

impl Default for TimezoneSettings {
    fn default() -> Self {
        Self {
            jump_threshold_ms: 30 * 60 * 1000,
            min_suspect_lines: 2,
            return_tolerance_ms: 60 * 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserSettings {
    pub gate_preflight_lines: usize,
    pub gate_threshold_pct: u8,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            gate_preflight_lines: 32,
            gate_threshold_pct: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcSettings {
    pub connect_attempts: u32,
    pub connect_min_delay: String,
    pub connect_max_delay: String,
    pub request_timeout: String,
    pub json: bool,
}

impl Default for IpcSettings {
    fn default() -> Self {
        Self {
            connect_attempts: 5,
            connect_min_delay: "100ms".to_string(),
            connect_max_delay: "1s".to_string(),
            request_timeout: "5s".to_string(),
            json: true,
        }
    }
}

impl IpcSettings {
    pub fn connect_min_delay(&self) -> Duration {
        parse_duration(&self.connect_min_delay).unwrap_or(Duration::from_millis(100))
    }

    pub fn connect_max_delay(&self) -> Duration {
        parse_duration(&self.connect_max_delay).unwrap_or(Duration::from_secs(1))
    }

    pub fn request_timeout(&self) -> Duration {
        parse_duration(&self.request_timeout).unwrap_or(Duration::from_secs(5))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSettings,
    pub warmup: WarmupSettings,
    pub timezone: TimezoneSettings,
    pub parser: ParserSettings,
    pub ipc: IpcSettings,
}

impl Settings {
    /// Load settings from the layered sources described above, falling back
    /// to defaults for anything not set anywhere.
    pub fn load() -> Result<Self> {
        let mut settings = Settings::default();

        if let Some(dir) = dirs::config_dir() {
            let user_path = dir.join("logweave").join("config.toml");
            settings.merge_file(&user_path)?;
        }

        settings.merge_file(Path::new("logweave.toml"))?;
        settings.apply_env();
        Ok(settings)
    }

    fn merge_file(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let text = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("reading {}", path.display()))?;
        let parsed: Settings = toml::from_str(&text)
            .into_diagnostic()
            .wrap_err_with(|| format!("parsing {}", path.display()))?;
        *self = parsed;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(Ok(v)) = std::env::var("LOGWEAVE_CHUNK_MAX_LINES").map(|v| v.parse()) {
            self.engine.chunk_max_lines = v;
        }
        if let Ok(Ok(v)) = std::env::var("LOGWEAVE_BATCH_SIZE").map(|v| v.parse()) {
            self.engine.batch_size = v;
        }
        if let Ok(Ok(v)) = std::env::var("LOGWEAVE_WARMUP_TARGET").map(|v| v.parse()) {
            self.warmup.target = v;
        }
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.engine.chunk_max_lines == 0 {
            return Err(SessionError::Config(
                "engine.chunk_max_lines must be > 0".to_string(),
            ));
        }
        if self.engine.batch_size == 0 {
            return Err(SessionError::Config(
                "engine.batch_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_duration(s: &str) -> Option<Duration> {
    humantime::parse_duration(s).ok()
}

pub fn default_state_dir() -> PathBuf {
    crate::env::LOGWEAVE_STATE_DIR.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = Settings::default();
        assert_eq!(s.engine.chunk_max_lines, 5_000);
        assert_eq!(s.engine.batch_size, 1_000);
        assert_eq!(s.warmup.target, 500);
        assert_eq!(s.timezone.jump_threshold_ms, 30 * 60 * 1000);
        assert_eq!(s.parser.gate_threshold_pct, 50);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("garbage"), None);
    }

    #[test]
    fn test_validate_rejects_zero() {
        let mut s = Settings::default();
        s.engine.batch_size = 0;
        assert!(s.validate().is_err());
    }
}
