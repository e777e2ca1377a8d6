//! Wire shape of the `dataEntryForms` document.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result};

/// Only tracked entity attributes can be handed to plugins today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectType {
    #[default]
    TrackedEntityAttribute,
}

/// Binds one app-side attribute to the alias the plugin reads it under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    #[serde(rename = "IdFromApp")]
    pub id_from_app: String,
    #[serde(rename = "IdFromPlugin")]
    pub id_from_plugin: String,
    #[serde(rename = "objectType", alias = "type", default)]
    pub object_type: ObjectType,
}

impl FieldMapping {
    pub fn attribute(id_from_app: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            id_from_app: id_from_app.into(),
            id_from_plugin: alias.into(),
            object_type: ObjectType::TrackedEntityAttribute,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginElement {
    /// Instance id, `<pluginId>_<millis>`.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_source: Option<String>,
    #[serde(default)]
    pub field_map: Vec<FieldMapping>,
}

/// One element of a stored section. Older records spell the plugin tag in capitals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FormElement {
    #[serde(rename = "TrackedEntityAttribute")]
    Attribute { id: String },
    #[serde(rename = "plugin", alias = "PLUGIN", alias = "Plugin")]
    Plugin(PluginElement),
}

impl FormElement {
    pub fn id(&self) -> &str {
        match self {
            FormElement::Attribute { id } => id,
            FormElement::Plugin(plugin) => &plugin.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSectionConfig {
    pub id: String,
    pub elements: Vec<FormElement>,
}

/// Every section configured for one context.
pub type ContextForm = Vec<FormSectionConfig>;

/// Checks the shape rules serde cannot express.
pub fn validate_context_form(sections: &[FormSectionConfig]) -> Result<()> {
    for section in sections {
        for element in &section.elements {
            match element {
                FormElement::Attribute { id } if id.is_empty() => {
                    return Err(ConfigError::validation(format!(
                        "Section '{}': attribute is missing its id",
                        section.id
                    )));
                }
                FormElement::Attribute { .. } => {}
                FormElement::Plugin(plugin) => {
                    if plugin.plugin_source.as_deref().is_none_or(str::is_empty) {
                        return Err(ConfigError::validation(format!(
                            "Section '{}': plugin '{}' is missing its plugin source",
                            section.id, plugin.id
                        )));
                    }
                    for mapping in &plugin.field_map {
                        if mapping.id_from_app.is_empty() || mapping.id_from_plugin.is_empty() {
                            return Err(ConfigError::validation(format!(
                                "Section '{}': plugin '{}' has an incomplete field map entry",
                                section.id, plugin.id
                            )));
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// Decode and validate one stored context entry.
pub fn parse_context_form(value: &Value) -> Result<ContextForm> {
    let sections: ContextForm = serde_json::from_value(value.clone())
        .map_err(|e| ConfigError::validation(e.to_string()))?;
    validate_context_form(&sections)?;
    Ok(sections)
}
