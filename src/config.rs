use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use jsonschema::{JSONSchema, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{batch::FailurePolicy, resources::ResourceKind};

pub const PASSWORD_ENV_VAR: &str = "EDA_CONTROLLER_PASSWORD";

const BUNDLED_SCHEMA: &str = include_str!("../eda.schema.json");

/// A string that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub controller: ControllerSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub failure_policy: Option<FailurePolicy>,
    pub resources: ResourceBatch,
}

fn default_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControllerSettings {
    pub url: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<Secret>,
    /// TLS certificate verification; off unless asked for.
    #[serde(default)]
    pub validate_certs: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ControllerSettings {
    pub fn new(url: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: None,
            validate_certs: false,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Password from the run file, falling back to `EDA_CONTROLLER_PASSWORD`.
    pub fn password(&self) -> Result<Secret> {
        resolve_password(self.password.as_ref(), env::var(PASSWORD_ENV_VAR).ok())
    }
}

fn resolve_password(configured: Option<&Secret>, from_env: Option<String>) -> Result<Secret> {
    if let Some(secret) = configured.filter(|secret| !secret.is_empty()) {
        return Ok(secret.clone());
    }
    from_env
        .filter(|value| !value.is_empty())
        .map(Secret::new)
        .ok_or_else(|| {
            anyhow!("controller.password is not set and {PASSWORD_ENV_VAR} is empty or missing")
        })
}

/// One kind of desired item per run.
///
/// Items stay raw documents here; the batch parses them one at a time so a
/// malformed item fails on its own instead of rejecting the run file.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceBatch {
    pub kind: ResourceKind,
    pub items: Vec<Value>,
}

impl ResourceBatch {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn default_logging_dir() -> PathBuf {
    PathBuf::from("./logs/eda")
}

fn default_logging_filter() -> String {
    "info".to_string()
}

fn default_logging_retention_days() -> usize {
    14
}

fn default_enabled_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_logging_filter")]
    pub filter: String,
    #[serde(default = "default_logging_retention_days")]
    pub retention_days: usize,
    #[serde(default = "default_enabled_true")]
    pub stderr_warn_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_logging_dir(),
            filter: default_logging_filter(),
            retention_days: default_logging_retention_days(),
            stderr_warn_enabled: true,
        }
    }
}

impl RunConfig {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config_value: Value = json5::from_str(&config_content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        let config_base = config_path.parent().unwrap_or_else(|| Path::new("."));
        let schema = load_schema(config_base, &config_value)?;
        validate_against_schema(&config_value, &schema)?;

        let mut config: RunConfig =
            serde_json::from_value(config_value).context("failed to deserialize run config")?;

        if !config.logging.dir.is_absolute() {
            config.logging.dir = config_base.join(&config.logging.dir);
        }

        Ok(config)
    }
}

fn load_schema(config_base: &Path, config_value: &Value) -> Result<Value> {
    let schema_path = match config_value.get("$schema").and_then(|value| value.as_str()) {
        Some(path_text) => {
            let configured = PathBuf::from(path_text);
            Some(if configured.is_absolute() {
                configured
            } else {
                config_base.join(&configured)
            })
        }
        None => Some(config_base.join("eda.schema.json")).filter(|path| path.exists()),
    };

    let Some(schema_path) = schema_path else {
        return serde_json::from_str(BUNDLED_SCHEMA).context("failed to parse bundled schema");
    };

    let schema_content = fs::read_to_string(&schema_path)
        .with_context(|| format!("failed to read schema {}", schema_path.display()))?;
    serde_json::from_str(&schema_content)
        .with_context(|| format!("failed to parse schema {}", schema_path.display()))
}

fn validate_against_schema(config_value: &Value, schema: &Value) -> Result<()> {
    let compiled =
        JSONSchema::compile(schema).map_err(|e| anyhow!("failed to compile schema: {e}"))?;

    match compiled.validate(config_value) {
        Ok(()) => Ok(()),
        Err(errors_iter) => {
            let validation_errors: Vec<ValidationError> = errors_iter.collect();
            let messages: Vec<String> = validation_errors
                .into_iter()
                .map(|error| error.to_string())
                .collect();
            Err(anyhow!("config validation failed: {}", messages.join("; ")))
        }
    }
}
