//! Configuration module for llmprobe.
//!
//! Loads typed configuration from `~/.llmprobe/config.json`. Each provider
//! entry names a provider and a key; base URL, protocol and model fall back
//! to the builtin registry preset when omitted, so a minimal entry is just
//! `{"providerId": "openai", "apiKey": "sk-..."}`.
//!
//! The engine itself never reads or writes this file mid-run; a
//! configuration is resolved once per invocation and handed in.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::batch::DEFAULT_CONCURRENCY;
use crate::check::CheckConfig;
use crate::error::ConfigError;
use crate::registry;

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub concurrency: usize,
    pub providers: Vec<ProviderEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            providers: Vec::new(),
        }
    }
}

/// One configured provider.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderEntry {
    pub provider_id: String,
    pub name: Option<String>,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub protocol: Option<String>,
}

impl Config {
    /// Load configuration from the default path (`~/.llmprobe/config.json`).
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// Get the default config directory path.
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".llmprobe")
    }

    /// Write the default config template to disk.
    pub fn write_default_template() -> anyhow::Result<PathBuf> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = serde_json::json!({
            "concurrency": DEFAULT_CONCURRENCY,
            "providers": [
                {
                    "providerId": "openai",
                    "apiKey": "sk-YOUR_KEY_HERE"
                }
            ]
        });

        std::fs::write(&path, serde_json::to_string_pretty(&template)?)?;
        Ok(path)
    }

    /// Find a configured entry by provider id.
    pub fn find_provider(&self, provider_id: &str) -> Option<&ProviderEntry> {
        self.providers.iter().find(|p| p.provider_id == provider_id)
    }
}

impl ProviderEntry {
    /// Resolve this entry into a runnable [`CheckConfig`], filling gaps from
    /// the builtin registry.
    pub fn resolve(&self) -> Result<CheckConfig, ConfigError> {
        let preset = registry::find(&self.provider_id);

        let base_url = self
            .base_url
            .clone()
            .or_else(|| preset.map(|p| p.base_url.to_string()))
            .ok_or_else(|| ConfigError::UnknownProvider(self.provider_id.clone()))?;

        let protocol = match &self.protocol {
            Some(raw) => raw.parse()?,
            None => preset
                .map(|p| p.protocol)
                .ok_or_else(|| ConfigError::UnknownProvider(self.provider_id.clone()))?,
        };

        let model = self
            .model
            .clone()
            .or_else(|| preset.and_then(|p| p.models.first().map(|m| m.to_string())))
            .unwrap_or_default();

        let provider_name = self
            .name
            .clone()
            .or_else(|| preset.map(|p| p.name.to_string()))
            .unwrap_or_else(|| self.provider_id.clone());

        Ok(CheckConfig {
            provider_id: self.provider_id.clone(),
            provider_name,
            base_url,
            api_key: self.api_key.clone(),
            model,
            protocol,
        })
    }
}
