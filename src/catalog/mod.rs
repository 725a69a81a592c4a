//! Model catalog
//!
//! In-memory form of a swap-proxy model set: one launch command per display
//! name plus proxy and idle-unload settings. The set converts to and from the
//! YAML the proxy reads, and to JSON; reading and writing the file that holds
//! it is left to the caller.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::command::{
    clean_command, parse_command, update_field, CommandError, ConfigField, FieldValue,
};
use crate::types::config::ModelConfig;

/// Catalog errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Model not found: {0}")]
    UnknownModel(String),
    #[error("Command error: {0}")]
    Command(#[from] CommandError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// One model in the set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Raw launch command
    pub cmd: String,
    /// Upstream URL the proxy forwards requests to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Idle seconds before the model is unloaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
}

impl ModelEntry {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            ..Self::default()
        }
    }

    pub fn to_config(&self, name: &str) -> ModelConfig {
        let mut config = parse_command(name, &self.cmd);
        config.ttl = self.ttl;
        config.proxy = self.proxy.clone();
        config
    }
}

/// Models that are scheduled together
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelGroup {
    pub swap: bool,
    pub exclusive: bool,
    pub persistent: bool,
    pub members: Vec<String>,
}

/// A named set of model launch commands
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(default)]
    pub models: BTreeMap<String, ModelEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<String, ModelGroup>,
}

impl ConfigSet {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, CatalogError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse the proxy's YAML config
    pub fn from_yaml(yaml: &str) -> Result<Self, CatalogError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_yaml(&self) -> Result<String, CatalogError> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn entry(&self, name: &str) -> Result<&ModelEntry, CatalogError> {
        self.models
            .get(name)
            .ok_or_else(|| CatalogError::UnknownModel(name.to_string()))
    }

    /// Decoded configuration of the model called `name`
    pub fn model_config(&self, name: &str) -> Result<ModelConfig, CatalogError> {
        Ok(self.entry(name)?.to_config(name))
    }

    /// Decoded configurations of every model, in name order
    pub fn model_configs(&self) -> Vec<ModelConfig> {
        self.models
            .iter()
            .map(|(name, entry)| entry.to_config(name))
            .collect()
    }

    /// Set one field in the command of the model called `name`
    pub fn update_field(
        &mut self,
        name: &str,
        field: ConfigField,
        value: impl Into<FieldValue>,
    ) -> Result<(), CatalogError> {
        let entry = self
            .models
            .get_mut(name)
            .ok_or_else(|| CatalogError::UnknownModel(name.to_string()))?;
        entry.cmd = update_field(&entry.cmd, field, value)?;
        tracing::debug!("Updated {} for model {}", field, name);
        Ok(())
    }

    /// Normalize every command; returns how many changed
    pub fn clean_commands(&mut self) -> usize {
        let mut changed = 0;
        for (name, entry) in self.models.iter_mut() {
            let cleaned = clean_command(&entry.cmd);
            if cleaned != entry.cmd {
                tracing::debug!("Cleaned launch command for {}", name);
                entry.cmd = cleaned;
                changed += 1;
            }
        }
        changed
    }

    /// Groups that list `name` as a member
    pub fn groups_for(&self, name: &str) -> Vec<&str> {
        self.groups
            .iter()
            .filter(|(_, group)| group.members.iter().any(|member| member == name))
            .map(|(group_name, _)| group_name.as_str())
            .collect()
    }
}
