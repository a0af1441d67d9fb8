#![forbid(unsafe_code)]
// Workspace clippy config forbids float types, but `serde` derive macros generate
// visitors that reference `f32`/`f64` even if our config structs do not use them.
#![allow(clippy::disallowed_types)]

use crate::confirm::ConfirmConfig;
use registry_core::Address;
use registry_program::processor::DEFAULT_IMMUNITY_PERIOD_SECS;
use registry_program::{ProgramConfig, REGISTRY_PROGRAM_ID};
use serde::Deserialize;
use std::fs;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryNodeConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    pub program: ProgramSection,
    #[serde(default)]
    pub confirm: ConfirmConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_path")]
    pub path: String,
}

fn default_ledger_path() -> String {
    "registry_db".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

/// Program identity and the collaborator authorities, as hex addresses.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgramSection {
    #[serde(default)]
    pub program_id: Option<String>,
    pub consensus_authority: String,
    pub staking_authority: String,
    #[serde(default = "default_immunity_period_secs")]
    pub immunity_period_secs: i64,
}

fn default_immunity_period_secs() -> i64 {
    DEFAULT_IMMUNITY_PERIOD_SECS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

/// `level` is an `EnvFilter` directive; `RUST_LOG` overrides it.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{key}: empty env: reference")]
    EmptyEnvRef { key: String },
    #[error("{key}: environment variable {var} is not set")]
    MissingEnv { key: String, var: String },
    #[error("failed to decode: {0}")]
    Decode(toml::de::Error),
    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Replace `"env:VAR"` string values in place; `key` is the dotted path so far.
fn resolve_env_refs(value: &mut toml::Value, key: &str) -> Result<(), ConfigError> {
    match value {
        toml::Value::String(s) => {
            let Some(var) = s.strip_prefix("env:").map(str::trim) else {
                return Ok(());
            };
            if var.is_empty() {
                return Err(ConfigError::EmptyEnvRef {
                    key: key.to_string(),
                });
            }
            let resolved = std::env::var(var).map_err(|_| ConfigError::MissingEnv {
                key: key.to_string(),
                var: var.to_string(),
            })?;
            *s = resolved;
        }
        toml::Value::Array(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                resolve_env_refs(item, &format!("{key}[{i}]"))?;
            }
        }
        toml::Value::Table(table) => {
            for (name, item) in table.iter_mut() {
                let child = if key.is_empty() {
                    name.clone()
                } else {
                    format!("{key}.{name}")
                };
                resolve_env_refs(item, &child)?;
            }
        }
        _ => {}
    }
    Ok(())
}

pub fn parse_config(raw: &str) -> Result<RegistryNodeConfig, ConfigError> {
    let mut value: toml::Value = toml::from_str(raw)?;
    resolve_env_refs(&mut value, "")?;
    value
        .try_into::<RegistryNodeConfig>()
        .map_err(ConfigError::Decode)
}

pub fn load_config(path: &str) -> Result<RegistryNodeConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    parse_config(&raw)
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, ConfigError> {
    Address::from_hex(value.trim()).map_err(|e| ConfigError::invalid(field, e))
}

impl RegistryNodeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.path.trim().is_empty() {
            return Err(ConfigError::invalid("ledger.path", "is empty"));
        }
        self.program_config()?;
        if self.program.immunity_period_secs < 0 {
            return Err(ConfigError::invalid(
                "program.immunity_period_secs",
                "must be >= 0",
            ));
        }
        if self.confirm.max_polls == 0 {
            return Err(ConfigError::invalid("confirm.max_polls", "must be >= 1"));
        }
        Ok(())
    }

    pub fn program_config(&self) -> Result<ProgramConfig, ConfigError> {
        let p = &self.program;
        let program_id = match p.program_id.as_deref() {
            Some(s) => parse_address("program.program_id", s)?,
            None => REGISTRY_PROGRAM_ID,
        };
        Ok(ProgramConfig {
            program_id,
            consensus_authority: parse_address(
                "program.consensus_authority",
                &p.consensus_authority,
            )?,
            staking_authority: parse_address("program.staking_authority", &p.staking_authority)?,
            immunity_period_secs: p.immunity_period_secs,
        })
    }
}
