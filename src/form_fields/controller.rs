//! Form-field editor state.
//!
//! Sections hold attributes and plugin instances. The plugin pool is the
//! installed catalog and is never consumed: dropping a pool entry into a
//! section creates a fresh instance, and dropping an instance back onto the
//! pool removes it together with its configuration.

use super::plugin_config::{PluginConfiguration, PluginConfigurations};
use super::reconcile::{EditableSection, FieldItem, InitialValues, PluginField};
use crate::error::{ConfigError, Result};
use crate::metadata::ConvertedMetadata;
use crate::moves::{is_at, reorder, transfer, DragMove, MoveOutcome};
use crate::registry::{PluginCatalog, PluginInfo};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldList {
    Section(String),
    PluginPool,
}

#[derive(Debug, Clone)]
pub struct FormFieldController {
    metadata: ConvertedMetadata,
    catalog: PluginCatalog,
    sections: Vec<EditableSection>,
    configurations: PluginConfigurations,
}

impl FormFieldController {
    pub fn new(initial: InitialValues, metadata: ConvertedMetadata, catalog: PluginCatalog) -> Self {
        Self {
            metadata,
            catalog,
            sections: initial.sections,
            configurations: initial.configurations,
        }
    }

    pub fn metadata(&self) -> &ConvertedMetadata {
        &self.metadata
    }

    pub fn sections(&self) -> &[EditableSection] {
        &self.sections
    }

    pub fn plugin_pool(&self) -> &[PluginInfo] {
        self.catalog.plugins()
    }

    pub fn configurations(&self) -> &PluginConfigurations {
        &self.configurations
    }

    pub fn configuration(&self, instance_id: &str) -> Option<&PluginConfiguration> {
        self.configurations.get(instance_id)
    }

    fn section_index(&self, id: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.id == id)
    }

    fn contains_instance(&self, instance_id: &str) -> bool {
        self.plugin_fields().any(|p| p.id == instance_id)
    }

    pub fn plugin_fields(&self) -> impl Iterator<Item = &PluginField> {
        self.sections
            .iter()
            .flat_map(|s| s.fields.iter())
            .filter_map(FieldItem::as_plugin)
    }

    /// `<pluginId>_<millis>`, bumped until no placed instance uses it.
    fn new_instance_id(&self, plugin_id: &str) -> String {
        let mut millis = chrono::Utc::now().timestamp_millis();
        loop {
            let id = format!("{plugin_id}_{millis}");
            if !self.contains_instance(&id) {
                return id;
            }
            millis += 1;
        }
    }

    fn instantiate(&self, plugin_id: &str) -> Result<PluginField> {
        let info = self
            .catalog
            .find_by_id(plugin_id)
            .ok_or_else(|| ConfigError::NotFound(format!("Plugin '{plugin_id}' is not installed")))?;
        Ok(PluginField::from_info(self.new_instance_id(&info.id), info))
    }

    /// Append a new instance of `plugin_id` to the first section. Returns the instance id.
    pub fn add_plugin(&mut self, plugin_id: &str) -> Result<String> {
        if self.sections.is_empty() {
            return Err(ConfigError::validation("The form has no section to add a plugin to"));
        }
        let field = self.instantiate(plugin_id)?;
        let id = field.id.clone();
        self.sections[0].fields.push(FieldItem::Plugin(field));
        tracing::debug!(plugin_id, instance = %id, "Added plugin to form");
        Ok(id)
    }

    /// Remove the instance from every section and forget its configuration.
    pub fn remove_plugin(&mut self, instance_id: &str) -> bool {
        let mut removed = false;
        for section in &mut self.sections {
            let before = section.fields.len();
            section.fields.retain(|f| !matches!(f, FieldItem::Plugin(p) if p.id == instance_id));
            removed |= section.fields.len() != before;
        }
        self.configurations.remove(instance_id);
        removed
    }

    /// Store a validated field map for a placed plugin instance.
    pub fn configure_plugin(&mut self, configuration: PluginConfiguration) -> Result<()> {
        if !self.contains_instance(&configuration.id) {
            return Err(ConfigError::NotFound(format!(
                "Plugin field '{}' is not on the form",
                configuration.id
            )));
        }
        configuration.validate(&self.metadata)?;
        self.configurations.insert(configuration);
        Ok(())
    }

    pub fn on_drag_end(&mut self, mv: &DragMove<FieldList>) -> MoveOutcome {
        let Some(dest) = &mv.destination else {
            return MoveOutcome::NoDestination;
        };
        let item_id = mv.item_id.as_str();

        match (&mv.source.list, &dest.list) {
            (FieldList::PluginPool, FieldList::PluginPool) => MoveOutcome::Rejected,
            (FieldList::PluginPool, FieldList::Section(section_id)) => {
                if !is_at(self.catalog.plugins(), mv.source.index, item_id) {
                    return MoveOutcome::Stale;
                }
                let Some(target) = self.section_index(section_id) else {
                    return MoveOutcome::Rejected;
                };
                let Ok(field) = self.instantiate(item_id) else {
                    return MoveOutcome::Stale;
                };
                let fields = &mut self.sections[target].fields;
                let to = dest.index.min(fields.len());
                fields.insert(to, FieldItem::Plugin(field));
                MoveOutcome::Transferred
            }
            (FieldList::Section(section_id), FieldList::PluginPool) => {
                let Some(source) = self.section_index(section_id) else {
                    return MoveOutcome::Stale;
                };
                let fields = &self.sections[source].fields;
                if !is_at(fields, mv.source.index, item_id) {
                    return MoveOutcome::Stale;
                }
                if fields[mv.source.index].as_plugin().is_none() {
                    return MoveOutcome::Rejected;
                }
                self.sections[source].fields.remove(mv.source.index);
                self.configurations.remove(item_id);
                MoveOutcome::Transferred
            }
            (FieldList::Section(from), FieldList::Section(to)) if from == to => {
                let Some(index) = self.section_index(from) else {
                    return MoveOutcome::Stale;
                };
                reorder(&mut self.sections[index].fields, mv.source.index, dest.index, item_id)
            }
            (FieldList::Section(from), FieldList::Section(to)) => {
                let (Some(from), Some(to)) = (self.section_index(from), self.section_index(to)) else {
                    return MoveOutcome::Stale;
                };
                let (source, dest_section) = two_mut(&mut self.sections, from, to);
                transfer(
                    &mut source.fields,
                    mv.source.index,
                    &mut dest_section.fields,
                    dest.index,
                    item_id,
                )
            }
        }
    }
}

fn two_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(a, b);
    if a < b {
        let (left, right) = items.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form_fields::reconcile::initial_values;
    use crate::form_fields::reconcile::tests::sample_metadata;
    use crate::moves::{DragMove, Draggable, DropLocation};
    use crate::registry::tests::sample_catalog;

    fn controller() -> FormFieldController {
        let metadata = sample_metadata();
        let catalog = sample_catalog();
        let initial = initial_values(None, &metadata, &catalog);
        FormFieldController::new(initial, metadata, catalog)
    }

    fn section_ids(c: &FormFieldController, index: usize) -> Vec<String> {
        c.sections()[index]
            .fields
            .iter()
            .map(|f| f.drag_id().to_string())
            .collect()
    }

    fn drag(item: &str, from: (FieldList, usize), to: Option<(FieldList, usize)>) -> DragMove<FieldList> {
        DragMove {
            item_id: item.into(),
            source: DropLocation {
                list: from.0,
                index: from.1,
            },
            destination: to.map(|(list, index)| DropLocation { list, index }),
        }
    }

    #[test]
    fn add_plugin_appends_to_first_section_with_unique_ids() {
        let mut c = controller();
        let first = c.add_plugin("weight-plugin").unwrap();
        let second = c.add_plugin("weight-plugin").unwrap();
        assert_ne!(first, second);
        assert!(first.starts_with("weight-plugin_"));
        let ids = section_ids(&c, 0);
        assert_eq!(ids.len(), 4);
        assert_eq!(ids[2], first);
        assert_eq!(ids[3], second);
        // the pool is not consumed
        assert_eq!(c.plugin_pool().len(), 2);
    }

    #[test]
    fn add_unknown_plugin_fails() {
        let mut c = controller();
        assert!(matches!(c.add_plugin("nope"), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn remove_plugin_drops_configuration() {
        let mut c = controller();
        let id = c.add_plugin("weight-plugin").unwrap();
        let mut config = PluginConfiguration::new(&id, "https://apps.example.org/weight/plugin.html");
        config.set_mapping("w75KJ2mc4zz", "firstName");
        c.configure_plugin(config).unwrap();

        assert!(c.remove_plugin(&id));
        assert!(c.configuration(&id).is_none());
        assert!(!c.remove_plugin(&id));
        assert_eq!(section_ids(&c, 0), vec!["w75KJ2mc4zz", "zDhUuAYrxNC"]);
    }

    #[test]
    fn configure_requires_a_placed_instance() {
        let mut c = controller();
        let config = PluginConfiguration::new("ghost_1", "https://x");
        assert!(matches!(c.configure_plugin(config), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn configure_rejects_bad_alias() {
        let mut c = controller();
        let id = c.add_plugin("address").unwrap();
        let mut config = PluginConfiguration::new(&id, "https://apps.example.org/address/plugin.html");
        config.set_mapping("w75KJ2mc4zz", "first-name");
        assert!(matches!(c.configure_plugin(config), Err(ConfigError::Validation(_))));
        assert!(c.configuration(&id).is_none());
    }

    #[test]
    fn reorder_within_section() {
        let mut c = controller();
        let outcome = c.on_drag_end(&drag(
            "w75KJ2mc4zz",
            (FieldList::Section("profile".into()), 0),
            Some((FieldList::Section("profile".into()), 1)),
        ));
        assert_eq!(outcome, MoveOutcome::Reordered);
        assert_eq!(section_ids(&c, 0), vec!["zDhUuAYrxNC", "w75KJ2mc4zz"]);
    }

    #[test]
    fn move_between_sections_conserves_fields() {
        let mut c = controller();
        let outcome = c.on_drag_end(&drag(
            "P2cwLGskgxn",
            (FieldList::Section("contact".into()), 0),
            Some((FieldList::Section("profile".into()), 1)),
        ));
        assert_eq!(outcome, MoveOutcome::Transferred);
        assert_eq!(section_ids(&c, 0), vec!["w75KJ2mc4zz", "P2cwLGskgxn", "zDhUuAYrxNC"]);
        assert!(section_ids(&c, 1).is_empty());
    }

    #[test]
    fn pool_to_section_creates_instance() {
        let mut c = controller();
        let outcome = c.on_drag_end(&drag(
            "address",
            (FieldList::PluginPool, 1),
            Some((FieldList::Section("contact".into()), 0)),
        ));
        assert_eq!(outcome, MoveOutcome::Transferred);
        let placed = c.sections()[1].fields[0].as_plugin().unwrap();
        assert!(placed.id.starts_with("address_"));
        assert_eq!(placed.display_name, "Address lookup");
    }

    #[test]
    fn plugin_to_pool_removes_it_but_attribute_is_rejected() {
        let mut c = controller();
        let id = c.add_plugin("weight-plugin").unwrap();
        let outcome = c.on_drag_end(&drag(
            &id,
            (FieldList::Section("profile".into()), 2),
            Some((FieldList::PluginPool, 0)),
        ));
        assert_eq!(outcome, MoveOutcome::Transferred);
        assert_eq!(c.plugin_fields().count(), 0);

        let outcome = c.on_drag_end(&drag(
            "w75KJ2mc4zz",
            (FieldList::Section("profile".into()), 0),
            Some((FieldList::PluginPool, 0)),
        ));
        assert_eq!(outcome, MoveOutcome::Rejected);
        assert_eq!(section_ids(&c, 0), vec!["w75KJ2mc4zz", "zDhUuAYrxNC"]);
    }

    #[test]
    fn stale_and_undropped_moves_change_nothing() {
        let mut c = controller();
        let before = c.sections().to_vec();
        assert_eq!(
            c.on_drag_end(&drag("w75KJ2mc4zz", (FieldList::Section("profile".into()), 0), None)),
            MoveOutcome::NoDestination
        );
        assert_eq!(
            c.on_drag_end(&drag(
                "w75KJ2mc4zz",
                (FieldList::Section("profile".into()), 1),
                Some((FieldList::Section("contact".into()), 0)),
            )),
            MoveOutcome::Stale
        );
        assert_eq!(c.sections(), before.as_slice());
    }
}
