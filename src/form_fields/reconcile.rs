//! Initial form-field values: stored record + current metadata + plugin catalog.

use super::model::{FormElement, FormSectionConfig, PluginElement};
use super::plugin_config::{PluginConfiguration, PluginConfigurations};
use crate::layout::UNKNOWN_PLUGIN_LABEL;
use crate::metadata::{ConvertedMetadata, FormField};
use crate::moves::Draggable;
use crate::registry::{PluginCatalog, PluginInfo};

const LOCAL_PLUGIN_DESCRIPTION: &str = "A plugin that is hosted locally";

/// A placed plugin instance.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginField {
    /// Instance id, unique within the form.
    pub id: String,
    pub plugin_id: Option<String>,
    pub display_name: String,
    pub description: Option<String>,
    pub plugin_launch_url: String,
    pub missing_metadata: bool,
}

impl PluginField {
    pub(crate) fn from_info(instance_id: String, info: &PluginInfo) -> Self {
        Self {
            id: instance_id,
            plugin_id: Some(info.id.clone()),
            display_name: info.display_name.clone(),
            description: info.description.clone(),
            plugin_launch_url: info.plugin_launch_url.clone(),
            missing_metadata: false,
        }
    }

    fn local(element: &PluginElement, source: String) -> Self {
        Self {
            id: element.id.clone(),
            plugin_id: element.plugin_id.clone(),
            display_name: UNKNOWN_PLUGIN_LABEL.to_string(),
            description: Some(LOCAL_PLUGIN_DESCRIPTION.to_string()),
            plugin_launch_url: source,
            missing_metadata: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldItem {
    Attribute(FormField),
    Plugin(PluginField),
}

impl FieldItem {
    pub fn display_name(&self) -> &str {
        match self {
            FieldItem::Attribute(field) => &field.display_name,
            FieldItem::Plugin(plugin) => &plugin.display_name,
        }
    }

    pub fn as_plugin(&self) -> Option<&PluginField> {
        match self {
            FieldItem::Plugin(plugin) => Some(plugin),
            FieldItem::Attribute(_) => None,
        }
    }
}

impl Draggable for FieldItem {
    fn drag_id(&self) -> &str {
        match self {
            FieldItem::Attribute(field) => &field.id,
            FieldItem::Plugin(plugin) => &plugin.id,
        }
    }
}

impl Draggable for PluginInfo {
    fn drag_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditableSection {
    pub id: String,
    pub display_name: String,
    pub fields: Vec<FieldItem>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitialValues {
    pub sections: Vec<EditableSection>,
    pub configurations: PluginConfigurations,
}

/// Plugin id an instance was created from: the stored `pluginId`, or the
/// part of the instance id before the first underscore.
pub fn original_plugin_id(element: &PluginElement) -> &str {
    if let Some(id) = element.plugin_id.as_deref().filter(|id| !id.is_empty()) {
        return id;
    }
    element
        .id
        .split_once('_')
        .map_or(element.id.as_str(), |(prefix, _)| prefix)
}

fn sections_from_metadata(metadata: &ConvertedMetadata) -> Vec<EditableSection> {
    metadata
        .sections
        .iter()
        .map(|section| EditableSection {
            id: section.id.clone(),
            display_name: section.display_name.clone(),
            fields: section
                .attributes
                .iter()
                .cloned()
                .map(FieldItem::Attribute)
                .collect(),
        })
        .collect()
}

fn resolve_plugin(
    element: &PluginElement,
    catalog: &PluginCatalog,
    configurations: &mut PluginConfigurations,
) -> Option<PluginField> {
    let field = match catalog.find_by_id(original_plugin_id(element)) {
        Some(info) => PluginField::from_info(element.id.clone(), info),
        None => match element.plugin_source.as_deref().filter(|s| !s.is_empty()) {
            Some(source) => PluginField::local(element, source.to_string()),
            None => {
                tracing::debug!(plugin = %element.id, "Dropping plugin with no source and no installed app");
                return None;
            }
        },
    };

    configurations.insert(PluginConfiguration {
        id: element.id.clone(),
        plugin_launch_url: field.plugin_launch_url.clone(),
        field_map: element.field_map.clone(),
    });
    Some(field)
}

/// Without a stored record the form mirrors the metadata sections. With one,
/// stored sections and attributes that no longer exist in the metadata are dropped.
pub fn initial_values(
    existing: Option<&[FormSectionConfig]>,
    metadata: &ConvertedMetadata,
    catalog: &PluginCatalog,
) -> InitialValues {
    let Some(existing) = existing else {
        return InitialValues {
            sections: sections_from_metadata(metadata),
            configurations: PluginConfigurations::default(),
        };
    };

    let mut configurations = PluginConfigurations::default();
    let sections = existing
        .iter()
        .filter_map(|stored| {
            let Some(section) = metadata.section(&stored.id) else {
                tracing::debug!(section = %stored.id, "Dropping section missing from metadata");
                return None;
            };
            let fields = stored
                .elements
                .iter()
                .filter_map(|element| match element {
                    FormElement::Attribute { id } => {
                        metadata.attribute(id).cloned().map(FieldItem::Attribute)
                    }
                    FormElement::Plugin(plugin) => {
                        resolve_plugin(plugin, catalog, &mut configurations).map(FieldItem::Plugin)
                    }
                })
                .collect();
            Some(EditableSection {
                id: section.id.clone(),
                display_name: section.display_name.clone(),
                fields,
            })
        })
        .collect();

    InitialValues {
        sections,
        configurations,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::form_fields::model::FieldMapping;
    use crate::metadata::{Access, FormSection};
    use crate::registry::tests::sample_catalog;

    fn field(id: &str, name: &str) -> FormField {
        FormField {
            id: id.into(),
            display_name: name.into(),
            value_type: "TEXT".into(),
        }
    }

    /// Child programme with a Profile and a Contact section.
    pub(crate) fn sample_metadata() -> ConvertedMetadata {
        let profile = vec![field("w75KJ2mc4zz", "First name"), field("zDhUuAYrxNC", "Last name")];
        let contact = vec![field("P2cwLGskgxn", "Phone number")];
        ConvertedMetadata {
            id: "IpHINAT79UW".into(),
            display_name: "Child Programme".into(),
            access: Access::default(),
            attributes: profile
                .iter()
                .chain(contact.iter())
                .map(|f| (f.id.clone(), f.clone()))
                .collect(),
            sections: vec![
                FormSection {
                    id: "profile".into(),
                    display_name: "Profile".into(),
                    attributes: profile,
                },
                FormSection {
                    id: "contact".into(),
                    display_name: "Contact".into(),
                    attributes: contact,
                },
            ],
        }
    }

    fn plugin(id: &str, source: Option<&str>) -> FormElement {
        FormElement::Plugin(PluginElement {
            id: id.into(),
            plugin_id: None,
            plugin_source: source.map(str::to_string),
            field_map: vec![FieldMapping::attribute("w75KJ2mc4zz", "firstName")],
        })
    }

    fn ids(section: &EditableSection) -> Vec<&str> {
        section.fields.iter().map(|f| f.drag_id()).collect()
    }

    #[test]
    fn no_record_mirrors_metadata() {
        let values = initial_values(None, &sample_metadata(), &sample_catalog());
        assert_eq!(values.sections.len(), 2);
        assert_eq!(ids(&values.sections[0]), vec!["w75KJ2mc4zz", "zDhUuAYrxNC"]);
        assert!(values.configurations.is_empty());
    }

    #[test]
    fn stale_sections_and_attributes_are_dropped() {
        let stored = vec![
            FormSectionConfig {
                id: "profile".into(),
                elements: vec![
                    FormElement::Attribute { id: "zDhUuAYrxNC".into() },
                    FormElement::Attribute { id: "deleted".into() },
                ],
            },
            FormSectionConfig {
                id: "gone".into(),
                elements: vec![FormElement::Attribute { id: "P2cwLGskgxn".into() }],
            },
        ];
        let values = initial_values(Some(&stored), &sample_metadata(), &sample_catalog());
        assert_eq!(values.sections.len(), 1);
        assert_eq!(values.sections[0].display_name, "Profile");
        assert_eq!(ids(&values.sections[0]), vec!["zDhUuAYrxNC"]);
    }

    #[test]
    fn installed_plugin_resolves_from_instance_id() {
        let stored = vec![FormSectionConfig {
            id: "profile".into(),
            elements: vec![plugin("weight-plugin_1700000000000", None)],
        }];
        let values = initial_values(Some(&stored), &sample_metadata(), &sample_catalog());
        let FieldItem::Plugin(p) = &values.sections[0].fields[0] else {
            panic!("expected plugin");
        };
        assert_eq!(p.display_name, "Weight plugin");
        assert_eq!(p.plugin_id.as_deref(), Some("weight-plugin"));
        assert!(!p.missing_metadata);

        let config = values.configurations.get("weight-plugin_1700000000000").unwrap();
        assert_eq!(config.plugin_launch_url, "https://apps.example.org/weight/plugin.html");
        assert_eq!(config.field_map.len(), 1);
    }

    #[test]
    fn unknown_plugin_with_source_is_kept_as_local() {
        let stored = vec![FormSectionConfig {
            id: "profile".into(),
            elements: vec![
                plugin("mystery_1", Some("http://localhost:3000/plugin.html")),
                plugin("vanished_2", None),
            ],
        }];
        let values = initial_values(Some(&stored), &sample_metadata(), &sample_catalog());
        assert_eq!(values.sections[0].fields.len(), 1);
        let p = values.sections[0].fields[0].as_plugin().unwrap();
        assert_eq!(p.display_name, UNKNOWN_PLUGIN_LABEL);
        assert!(p.missing_metadata);
        assert_eq!(
            values.configurations.get("mystery_1").unwrap().plugin_launch_url,
            "http://localhost:3000/plugin.html"
        );
        assert!(values.configurations.get("vanished_2").is_none());
    }

    #[test]
    fn stored_plugin_id_wins_over_instance_prefix() {
        let element = PluginElement {
            id: "weight_plugin_17".into(),
            plugin_id: Some("weight-plugin".into()),
            plugin_source: None,
            field_map: vec![],
        };
        assert_eq!(original_plugin_id(&element), "weight-plugin");
        let bare = PluginElement {
            plugin_id: None,
            ..element
        };
        assert_eq!(original_plugin_id(&bare), "weight");
    }
}
