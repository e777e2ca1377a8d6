//! Plugin field-map configurations.
//!
//! A plugin may only read or write the attributes listed in its field map,
//! under the alias chosen here. Aliases are plain letters and unique within
//! one configuration, and every mapped attribute must exist in the context.

use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::model::FieldMapping;
use crate::error::{ConfigError, Result};
use crate::metadata::ConvertedMetadata;

lazy_static::lazy_static! {
    static ref ALIAS_RE: Regex = Regex::new(r"^[A-Za-z]+$").unwrap();
}

pub fn validate_alias(alias: &str) -> Result<()> {
    if ALIAS_RE.is_match(alias) {
        Ok(())
    } else {
        Err(ConfigError::validation(format!(
            "Plugin alias '{alias}' may only contain letters"
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfiguration {
    /// Instance id of the plugin element this configures.
    pub id: String,
    pub plugin_launch_url: String,
    #[serde(default)]
    pub field_map: Vec<FieldMapping>,
}

impl PluginConfiguration {
    pub fn new(id: impl Into<String>, plugin_launch_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            plugin_launch_url: plugin_launch_url.into(),
            field_map: Vec::new(),
        }
    }

    /// Map `id_from_app` to `alias`, replacing an earlier mapping of the same attribute.
    pub fn set_mapping(&mut self, id_from_app: &str, alias: &str) {
        match self.field_map.iter_mut().find(|m| m.id_from_app == id_from_app) {
            Some(mapping) => mapping.id_from_plugin = alias.to_string(),
            None => self
                .field_map
                .push(FieldMapping::attribute(id_from_app, alias)),
        }
    }

    pub fn remove_mapping(&mut self, id_from_app: &str) -> bool {
        let before = self.field_map.len();
        self.field_map.retain(|m| m.id_from_app != id_from_app);
        self.field_map.len() != before
    }

    pub fn validate(&self, metadata: &ConvertedMetadata) -> Result<()> {
        if self.id.is_empty() {
            return Err(ConfigError::validation("Plugin configuration is missing its id"));
        }
        if self.plugin_launch_url.trim().is_empty() {
            return Err(ConfigError::validation(format!(
                "Plugin configuration '{}' is missing its launch URL",
                self.id
            )));
        }

        let mut attributes = HashSet::new();
        let mut aliases = HashSet::new();
        for mapping in &self.field_map {
            if metadata.attribute(&mapping.id_from_app).is_none() {
                return Err(ConfigError::validation(format!(
                    "Attribute '{}' does not exist in {}",
                    mapping.id_from_app, metadata.display_name
                )));
            }
            validate_alias(&mapping.id_from_plugin)?;
            if !attributes.insert(mapping.id_from_app.as_str()) {
                return Err(ConfigError::validation(format!(
                    "Attribute '{}' is mapped more than once",
                    mapping.id_from_app
                )));
            }
            if !aliases.insert(mapping.id_from_plugin.as_str()) {
                return Err(ConfigError::validation(format!(
                    "Alias '{}' is used for more than one attribute",
                    mapping.id_from_plugin
                )));
            }
        }
        Ok(())
    }
}

/// Configurations keyed by plugin instance id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginConfigurations(BTreeMap<String, PluginConfiguration>);

impl PluginConfigurations {
    pub fn get(&self, instance_id: &str) -> Option<&PluginConfiguration> {
        self.0.get(instance_id)
    }

    pub fn insert(&mut self, configuration: PluginConfiguration) {
        self.0.insert(configuration.id.clone(), configuration);
    }

    pub fn remove(&mut self, instance_id: &str) -> Option<PluginConfiguration> {
        self.0.remove(instance_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
