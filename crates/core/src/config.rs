use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}

/// Canonical enforcement mode. `monitor`, `warn`, `redact`, `block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementMode {
    Monitor,
    Warn,
    Redact,
    Block,
}

impl EnforcementMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "monitor" => Some(Self::Monitor),
            "warn" => Some(Self::Warn),
            "redact" => Some(Self::Redact),
            "block" => Some(Self::Block),
            _ => None,
        }
    }
}

impl std::fmt::Display for EnforcementMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Monitor => "monitor",
            Self::Warn => "warn",
            Self::Redact => "redact",
            Self::Block => "block",
        };
        f.write_str(s)
    }
}

/// Settings pulled from the control plane and cached in an `ArcSwap` by the
/// caller. Everything here can change at any 10 s poll tick; nothing in this
/// struct should be assumed stable across a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_true")]
    pub proxy_enabled: bool,

    /// Canonical field. `None` means "absent or invalid on the wire" — the
    /// legacy booleans below take over per `effective_enforcement_mode`.
    #[serde(default, deserialize_with = "deserialize_enforcement_mode_opt")]
    pub enforcement_mode: Option<EnforcementMode>,

    #[serde(default)]
    pub inspect_attachments: bool,

    #[serde(default)]
    pub desktop_bypass: bool,

    #[serde(default)]
    pub full_audit_mode: bool,

    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    #[serde(default)]
    pub proxy_endpoint: String,

    #[serde(default)]
    pub block_high_risk: bool,

    #[serde(default)]
    pub redact_sensitive: bool,
}

fn default_true() -> bool {
    true
}

fn default_retention_days() -> u32 {
    30
}

fn deserialize_enforcement_mode_opt<'de, D>(
    deserializer: D,
) -> Result<Option<EnforcementMode>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| EnforcementMode::parse(&s)))
}

impl Settings {
    /// Settings in effect before the first successful control-plane pull.
    /// `inspect_attachments` stays false until a pull actually confirms it,
    /// per spec: a fresh proxy must never inspect attachments it was never
    /// told to inspect.
    pub fn bootstrap(hint: Option<EnforcementMode>) -> Self {
        Settings {
            proxy_enabled: true,
            enforcement_mode: hint,
            inspect_attachments: false,
            desktop_bypass: false,
            full_audit_mode: false,
            retention_days: default_retention_days(),
            proxy_endpoint: String::new(),
            block_high_risk: false,
            redact_sensitive: false,
        }
    }

    /// Resolves the mode actually enforced: canonical field wins; legacy
    /// booleans apply only when it is absent or failed to parse.
    pub fn effective_enforcement_mode(&self) -> EnforcementMode {
        if let Some(mode) = self.enforcement_mode {
            return mode;
        }
        if self.block_high_risk {
            return EnforcementMode::Block;
        }
        if self.redact_sensitive {
            return EnforcementMode::Redact;
        }
        EnforcementMode::Monitor
    }
}

/// Process-lifetime configuration derived from environment variables and CLI
/// flags at startup. Unlike `Settings`, this never changes after `main`
/// finishes parsing it.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub listen_port: u16,
    pub control_plane_api: String,
    pub workspace_id: String,
    pub monitor_mode_hint: Option<EnforcementMode>,
    pub enforcement_mode_hint: Option<EnforcementMode>,
    pub max_inspection_size_mb: u64,
    pub max_body_size_mb: u64,
    pub inspection_timeout_ms: u64,
    pub max_memory_mb: u64,
    pub fail_open: bool,
    pub strict_pin_mode: bool,
    pub trace_mode: bool,
    pub certs_dir: PathBuf,
    pub telemetry_dir: PathBuf,
}

/// CLI-sourced overrides. `None` fields mean "use the environment / default".
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub listen_port: Option<u16>,
    pub control_plane_api: Option<String>,
    pub workspace_id: Option<String>,
    pub certs_dir: Option<PathBuf>,
    pub telemetry_dir: Option<PathBuf>,
    pub fail_open: Option<bool>,
    pub trace_mode: Option<bool>,
    /// Optional `--config` path. Unlike the file this proxy's teacher
    /// required, this is never mandatory; a bare machine must still start.
    pub config_file: Option<PathBuf>,
}

/// Subset of `RuntimeConfig` a TOML file is allowed to fill in. Anything
/// it omits keeps the built-in default; anything the environment or CLI
/// also set overrides the file.
#[derive(Debug, Clone, Default, Deserialize)]
struct FileOverrides {
    listen_port: Option<u16>,
    control_plane_api: Option<String>,
    workspace_id: Option<String>,
    fail_open: Option<bool>,
    trace_mode: Option<bool>,
}

fn load_file_overrides(path: &std::path::Path) -> Result<FileOverrides, ConfigError> {
    config::Config::builder()
        .add_source(config::File::from(path.to_path_buf()))
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| ConfigError::InvalidValue {
            field: "config_file",
            message: e.to_string(),
        })
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn env_bool_opt(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Loads the layered runtime configuration: built-in defaults, then
/// `COMPLYZE_*` / legacy environment variables, then CLI overrides. There is
/// no required config file; everything here has a usable default so the
/// proxy starts on a bare machine.
pub fn load_runtime_config(overrides: ConfigOverrides) -> Result<RuntimeConfig, ConfigError> {
    let file = match &overrides.config_file {
        Some(path) => load_file_overrides(path)?,
        None => FileOverrides::default(),
    };

    let workspace_id = overrides.workspace_id.clone().unwrap_or_else(|| {
        let from_complyze = env::var("COMPLYZE_WORKSPACE").unwrap_or_default();
        if !from_complyze.is_empty() {
            return from_complyze;
        }
        let from_firebase = env::var("FIREBASE_UID").unwrap_or_default();
        if !from_firebase.is_empty() {
            return from_firebase;
        }
        file.workspace_id.clone().unwrap_or_else(|| "default".to_string())
    });

    let monitor_mode_hint = env::var("MONITOR_MODE").ok().and_then(|v| {
        match v.trim().to_ascii_lowercase().as_str() {
            "observe" => Some(EnforcementMode::Monitor),
            "enforce" => Some(EnforcementMode::Block),
            _ => None,
        }
    });

    let enforcement_mode_hint = env::var("ENFORCEMENT_MODE")
        .ok()
        .and_then(|v| EnforcementMode::parse(&v));

    let control_plane_api = overrides.control_plane_api.clone().unwrap_or_else(|| {
        env::var("COMPLYZE_API").unwrap_or_else(|_| {
            file.control_plane_api
                .clone()
                .unwrap_or_else(|| "http://localhost:3737/api/proxy/intercept".to_string())
        })
    });

    let listen_port = overrides
        .listen_port
        .or_else(|| env::var("COMPLYZE_PROXY_PORT").ok().and_then(|v| v.parse().ok()))
        .or(file.listen_port)
        .unwrap_or(8080);

    let certs_dir = overrides.certs_dir.clone().unwrap_or_else(|| {
        env::var("COMPLYZE_CERTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_state_dir().join("certs"))
    });

    let telemetry_dir = overrides.telemetry_dir.clone().unwrap_or_else(|| {
        env::var("COMPLYZE_TELEMETRY_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_state_dir().join("telemetry"))
    });

    Ok(RuntimeConfig {
        listen_port,
        control_plane_api,
        workspace_id,
        monitor_mode_hint,
        enforcement_mode_hint,
        max_inspection_size_mb: env_u64("MAX_INSPECTION_SIZE_MB", 15),
        max_body_size_mb: env_u64("MAX_BODY_SIZE_MB", 50),
        inspection_timeout_ms: env_u64("INSPECTION_TIMEOUT_MS", 3000),
        max_memory_mb: env_u64("MAX_MEMORY_MB", 512),
        fail_open: overrides
            .fail_open
            .unwrap_or_else(|| env_bool_opt("FAIL_OPEN").unwrap_or(file.fail_open.unwrap_or(true))),
        strict_pin_mode: env_bool("STRICT_PIN_MODE", false),
        trace_mode: overrides
            .trace_mode
            .unwrap_or_else(|| env_bool_opt("TRACE_MODE").unwrap_or(file.trace_mode.unwrap_or(false))),
        certs_dir,
        telemetry_dir,
    })
}

fn default_state_dir() -> PathBuf {
    env::var("COMPLYZE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".complyze"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enforcement_mode_priority_canonical_wins() {
        let s = Settings {
            enforcement_mode: Some(EnforcementMode::Warn),
            block_high_risk: true,
            redact_sensitive: true,
            ..Settings::bootstrap(None)
        };
        assert_eq!(s.effective_enforcement_mode(), EnforcementMode::Warn);
    }

    #[test]
    fn enforcement_mode_falls_back_to_block_high_risk() {
        let s = Settings {
            enforcement_mode: None,
            block_high_risk: true,
            redact_sensitive: true,
            ..Settings::bootstrap(None)
        };
        assert_eq!(s.effective_enforcement_mode(), EnforcementMode::Block);
    }

    #[test]
    fn enforcement_mode_falls_back_to_redact_sensitive() {
        let s = Settings {
            enforcement_mode: None,
            block_high_risk: false,
            redact_sensitive: true,
            ..Settings::bootstrap(None)
        };
        assert_eq!(s.effective_enforcement_mode(), EnforcementMode::Redact);
    }

    #[test]
    fn enforcement_mode_defaults_to_monitor() {
        let s = Settings::bootstrap(None);
        assert_eq!(s.effective_enforcement_mode(), EnforcementMode::Monitor);
    }

    #[test]
    fn bootstrap_never_inspects_attachments() {
        let s = Settings::bootstrap(Some(EnforcementMode::Block));
        assert!(!s.inspect_attachments);
    }

    #[test]
    fn workspace_id_prefers_complyze_workspace_over_firebase_uid() {
        env::set_var("COMPLYZE_WORKSPACE", "ws-primary");
        env::set_var("FIREBASE_UID", "fallback-uid");
        let cfg = load_runtime_config(ConfigOverrides::default()).unwrap();
        assert_eq!(cfg.workspace_id, "ws-primary");
        env::remove_var("COMPLYZE_WORKSPACE");
        env::remove_var("FIREBASE_UID");
    }

    #[test]
    fn enforcement_mode_parse_is_case_insensitive() {
        assert_eq!(EnforcementMode::parse("BLOCK"), Some(EnforcementMode::Block));
        assert_eq!(EnforcementMode::parse("bogus"), None);
    }

    #[test]
    fn config_file_fills_gaps_env_still_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("complyze.toml");
        std::fs::write(&path, "listen_port = 9090\nworkspace_id = \"from-file\"\n").unwrap();

        env::remove_var("COMPLYZE_WORKSPACE");
        env::remove_var("FIREBASE_UID");
        let cfg = load_runtime_config(ConfigOverrides {
            config_file: Some(path),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(cfg.listen_port, 9090);
        assert_eq!(cfg.workspace_id, "from-file");
    }
}
