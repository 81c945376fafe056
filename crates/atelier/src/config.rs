//! Layered runtime settings: defaults, then a JSON config file, then
//! `ATELIER_*` environment overrides (nested fields use `__`).

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, CoreResult};

/// Output format for structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive, e.g. `info` or `atelier=debug`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsSettings {
    /// Root directory of the run-scoped storage tree.
    pub root: PathBuf,
    /// When false, no run manifest is ever written.
    pub write_manifests: bool,
}

impl Default for ArtifactsSettings {
    fn default() -> Self {
        Self {
            root: home_relative(&["artifacts"]),
            write_manifests: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    /// Destructive tools are rejected unless this is set.
    pub allow_destructive: bool,
    /// Path roots tool file access is confined to; empty means unrestricted.
    pub allowed_paths: Vec<PathBuf>,
    /// Tool names allowed to run; empty means unrestricted.
    pub tool_allowlist: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub protocol_version: String,
    pub logging: LoggingSettings,
    pub artifacts: ArtifactsSettings,
    pub policy: PolicySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            protocol_version: atelier_protocol::PROTOCOL_VERSION.to_string(),
            logging: LoggingSettings::default(),
            artifacts: ArtifactsSettings::default(),
            policy: PolicySettings::default(),
        }
    }
}

impl Settings {
    /// Default location of the settings file.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".atelier").join("config.json"))
    }

    /// Load settings. An explicitly-given path must exist; the default path
    /// is optional and silently skipped when absent. Environment overrides
    /// are applied last.
    pub fn load(config_path: Option<&Path>) -> CoreResult<Self> {
        let mut settings = match config_path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Settings::default(),
            },
        };
        settings.apply_env();
        Ok(settings)
    }

    fn from_file(path: &Path) -> CoreResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|error| {
            CoreError::Internal(format!(
                "failed to read config file {}: {error}",
                path.display()
            ))
        })?;
        serde_json::from_str(&raw).map_err(|error| {
            CoreError::Internal(format!("invalid config file {}: {error}", path.display()))
        })
    }

    fn apply_env(&mut self) {
        if let Ok(value) = env::var("ATELIER_LOGGING__LEVEL") {
            self.logging.level = value;
        }
        if let Ok(value) = env::var("ATELIER_LOGGING__FORMAT") {
            match value.to_ascii_lowercase().as_str() {
                "json" => self.logging.format = LogFormat::Json,
                "text" => self.logging.format = LogFormat::Text,
                other => tracing::warn!("ignoring unknown log format '{other}'"),
            }
        }
        if let Ok(value) = env::var("ATELIER_ARTIFACTS__ROOT") {
            self.artifacts.root = PathBuf::from(value);
        }
        if let Ok(value) = env::var("ATELIER_ARTIFACTS__WRITE_MANIFESTS") {
            self.artifacts.write_manifests = parse_bool(&value);
        }
        if let Ok(value) = env::var("ATELIER_POLICY__ALLOW_DESTRUCTIVE") {
            self.policy.allow_destructive = parse_bool(&value);
        }
        if let Ok(value) = env::var("ATELIER_POLICY__ALLOWED_PATHS") {
            self.policy.allowed_paths = split_list(&value).map(PathBuf::from).collect();
        }
        if let Ok(value) = env::var("ATELIER_POLICY__TOOL_ALLOWLIST") {
            self.policy.tool_allowlist = split_list(&value).map(str::to_string).collect();
        }
    }

    /// SHA-256 over the canonical JSON serialization of the active settings,
    /// recorded on every run manifest.
    pub fn config_hash(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&bytes);
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}

fn home_relative(parts: &[&str]) -> PathBuf {
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".atelier");
    for part in parts {
        path.push(part);
    }
    path
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|part| !part.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_complete() {
        let settings = Settings::default();
        assert_eq!(settings.protocol_version, "1.0");
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert!(settings.artifacts.write_manifests);
        assert!(!settings.policy.allow_destructive);
        assert!(settings.policy.allowed_paths.is_empty());
        assert!(settings.policy.tool_allowlist.is_empty());
    }

    #[test]
    fn partial_config_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"{{"policy": {{"allow_destructive": true, "tool_allowlist": ["a.tool"]}}}}"#
        )
        .expect("write");

        let settings = Settings::from_file(file.path()).expect("load");
        assert!(settings.policy.allow_destructive);
        assert_eq!(settings.policy.tool_allowlist, vec!["a.tool".to_string()]);
        assert_eq!(settings.logging.level, "info");
        assert!(settings.artifacts.write_manifests);
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/atelier.json")))
            .expect_err("missing explicit config");
        assert!(matches!(err, CoreError::Internal(_)));
    }

    #[test]
    fn env_overrides_apply_last() {
        env::set_var("ATELIER_LOGGING__LEVEL", "debug");
        env::set_var("ATELIER_LOGGING__FORMAT", "text");
        env::set_var("ATELIER_POLICY__ALLOW_DESTRUCTIVE", "true");
        env::set_var("ATELIER_POLICY__TOOL_ALLOWLIST", "a.tool, b.tool ,");

        let mut settings = Settings::default();
        settings.apply_env();

        env::remove_var("ATELIER_LOGGING__LEVEL");
        env::remove_var("ATELIER_LOGGING__FORMAT");
        env::remove_var("ATELIER_POLICY__ALLOW_DESTRUCTIVE");
        env::remove_var("ATELIER_POLICY__TOOL_ALLOWLIST");

        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.format, LogFormat::Text);
        assert!(settings.policy.allow_destructive);
        assert_eq!(
            settings.policy.tool_allowlist,
            vec!["a.tool".to_string(), "b.tool".to_string()]
        );
    }

    #[test]
    fn config_hash_tracks_settings_changes() {
        let base = Settings::default();
        let mut changed = Settings::default();
        changed.policy.allow_destructive = true;

        assert_eq!(base.config_hash(), Settings::default().config_hash());
        assert_ne!(base.config_hash(), changed.config_hash());
        assert_eq!(base.config_hash().len(), 64);
    }
}
