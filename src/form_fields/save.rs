//! Building and persisting a context's form-field record.

use super::controller::FormFieldController;
use super::model::{
    parse_context_form, validate_context_form, ContextForm, FormElement, FormSectionConfig, PluginElement,
};
use super::reconcile::FieldItem;
use super::DATA_ENTRY_FORMS_KEY;
use crate::datastore::DataStore;
use crate::error::{ConfigError, Result};
use crate::repository::DocumentRepository;

fn element_for(controller: &FormFieldController, field: &FieldItem) -> Result<FormElement> {
    match field {
        FieldItem::Attribute(attribute) => Ok(FormElement::Attribute {
            id: attribute.id.clone(),
        }),
        FieldItem::Plugin(plugin) => {
            let config = controller.configuration(&plugin.id).ok_or_else(|| {
                ConfigError::MissingPluginConfiguration {
                    field_id: plugin.id.clone(),
                    display_name: plugin.display_name.clone(),
                }
            })?;
            Ok(FormElement::Plugin(PluginElement {
                id: plugin.id.clone(),
                plugin_id: plugin.plugin_id.clone(),
                plugin_source: Some(config.plugin_launch_url.clone()),
                field_map: config.field_map.clone(),
            }))
        }
    }
}

/// Turn the editor state into the stored shape. Every plugin field must have
/// a configuration; the first one without aborts the build.
pub fn build_context_payload(controller: &FormFieldController) -> Result<ContextForm> {
    let mut sections = Vec::with_capacity(controller.sections().len());
    for section in controller.sections() {
        let elements = section
            .fields
            .iter()
            .map(|field| element_for(controller, field))
            .collect::<Result<Vec<_>>>()?;
        sections.push(FormSectionConfig {
            id: section.id.clone(),
            elements,
        });
    }
    Ok(sections)
}

pub async fn load_form_config<S: DataStore>(
    repo: &DocumentRepository<S>,
    context_id: &str,
) -> Result<Option<ContextForm>> {
    let doc = repo.get(DATA_ENTRY_FORMS_KEY).await?;
    doc.get(context_id).map(parse_context_form).transpose()
}

/// Build the record and run every check a save would, without writing.
pub fn validate_form_config(controller: &FormFieldController) -> Result<ContextForm> {
    let payload = build_context_payload(controller)?;
    validate_context_form(&payload)?;
    for config in controller.plugin_fields().filter_map(|p| controller.configuration(&p.id)) {
        config.validate(controller.metadata())?;
    }
    Ok(payload)
}

/// Validate and merge the record for `context_id`. Nothing is written when
/// validation fails.
pub async fn save_form_config<S: DataStore>(
    repo: &DocumentRepository<S>,
    context_id: &str,
    controller: &FormFieldController,
) -> Result<ContextForm> {
    let payload = validate_form_config(controller)?;
    repo.merge_entry(DATA_ENTRY_FORMS_KEY, context_id, serde_json::to_value(&payload)?)
        .await?;
    Ok(payload)
}

pub async fn delete_form_config<S: DataStore>(
    repo: &DocumentRepository<S>,
    context_id: &str,
) -> Result<bool> {
    repo.remove_entry(DATA_ENTRY_FORMS_KEY, context_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::MemoryDataStore;
    use crate::form_fields::plugin_config::PluginConfiguration;
    use crate::form_fields::reconcile::initial_values;
    use crate::form_fields::reconcile::tests::sample_metadata;
    use crate::registry::tests::sample_catalog;
    use serde_json::json;

    fn controller_for(existing: Option<&ContextForm>) -> FormFieldController {
        let metadata = sample_metadata();
        let catalog = sample_catalog();
        let initial = initial_values(existing.map(Vec::as_slice), &metadata, &catalog);
        FormFieldController::new(initial, metadata, catalog)
    }

    fn repo() -> DocumentRepository<MemoryDataStore> {
        DocumentRepository::new(MemoryDataStore::with_documents([(
            DATA_ENTRY_FORMS_KEY,
            json!({"A03MvHHogjR": [{"id": "default", "elements": []}]}),
        )]))
    }

    #[tokio::test]
    async fn unconfigured_plugin_aborts_without_writing() {
        let repo = repo();
        let mut c = controller_for(None);
        c.add_plugin("weight-plugin").unwrap();

        let err = save_form_config(&repo, "IpHINAT79UW", &c).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing plugin configuration for plugin field: Weight plugin"
        );
        assert!(repo.store().write_log().is_empty());
    }

    #[test]
    fn validation_alone_reports_the_payload() {
        let mut c = controller_for(None);
        let id = c.add_plugin("weight-plugin").unwrap();
        assert!(matches!(
            validate_form_config(&c),
            Err(ConfigError::MissingPluginConfiguration { ref field_id, .. }) if *field_id == id
        ));

        let mut config = PluginConfiguration::new(&id, "https://apps.example.org/weight/plugin.html");
        config.set_mapping("w75KJ2mc4zz", "firstName");
        c.configure_plugin(config).unwrap();
        let payload = validate_form_config(&c).unwrap();
        assert_eq!(payload.len(), c.sections().len());
    }

    #[tokio::test]
    async fn validation_never_touches_the_store() {
        let repo = repo();
        let c = controller_for(None);
        let loaded = load_form_config(&repo, "IpHINAT79UW").await.unwrap();
        assert!(loaded.is_none());
        validate_form_config(&c).unwrap();
        assert!(repo.store().write_log().is_empty());
        assert!(repo.store().snapshot(DATA_ENTRY_FORMS_KEY).unwrap().get("IpHINAT79UW").is_none());
    }

    #[tokio::test]
    async fn save_merges_next_to_other_contexts() {
        let repo = repo();
        let mut c = controller_for(None);
        let id = c.add_plugin("weight-plugin").unwrap();
        let mut config = PluginConfiguration::new(&id, "https://apps.example.org/weight/plugin.html");
        config.set_mapping("w75KJ2mc4zz", "firstName");
        c.configure_plugin(config).unwrap();

        save_form_config(&repo, "IpHINAT79UW", &c).await.unwrap();

        let doc = repo.store().snapshot(DATA_ENTRY_FORMS_KEY).unwrap();
        assert_eq!(doc["A03MvHHogjR"], json!([{"id": "default", "elements": []}]));
        let profile = &doc["IpHINAT79UW"][0];
        assert_eq!(profile["id"], "profile");
        assert_eq!(profile["elements"][0], json!({"type": "TrackedEntityAttribute", "id": "w75KJ2mc4zz"}));
        assert_eq!(profile["elements"][2]["type"], "plugin");
        assert_eq!(profile["elements"][2]["pluginId"], "weight-plugin");
        assert_eq!(
            profile["elements"][2]["pluginSource"],
            "https://apps.example.org/weight/plugin.html"
        );
        assert_eq!(profile["elements"][2]["fieldMap"][0]["IdFromPlugin"], "firstName");
    }

    #[tokio::test]
    async fn saved_record_reloads_into_the_same_form() {
        let repo = repo();
        let mut c = controller_for(None);
        let id = c.add_plugin("address").unwrap();
        c.configure_plugin(PluginConfiguration::new(&id, "https://apps.example.org/address/plugin.html"))
            .unwrap();
        let saved = save_form_config(&repo, "IpHINAT79UW", &c).await.unwrap();

        let loaded = load_form_config(&repo, "IpHINAT79UW").await.unwrap().unwrap();
        assert_eq!(loaded, saved);
        let reopened = controller_for(Some(&loaded));
        assert_eq!(reopened.sections(), c.sections());
        assert!(reopened.configuration(&id).is_some());
    }

    #[tokio::test]
    async fn permission_error_propagates() {
        let repo = repo();
        repo.store().fail_writes_with(Some(403));
        let c = controller_for(None);
        let err = save_form_config(&repo, "IpHINAT79UW", &c).await.unwrap_err();
        assert_eq!(err.status(), Some(403));
    }

    #[tokio::test]
    async fn delete_removes_only_the_context() {
        let repo = repo();
        assert!(delete_form_config(&repo, "A03MvHHogjR").await.unwrap());
        assert!(!delete_form_config(&repo, "A03MvHHogjR").await.unwrap());
        assert_eq!(repo.store().snapshot(DATA_ENTRY_FORMS_KEY).unwrap(), json!({}));
        assert_eq!(repo.store().write_log().len(), 1);
    }

    #[tokio::test]
    async fn rejected_save_leaves_the_session_editing() {
        use crate::session::{EditSession, Phase};

        let repo = repo();
        let mut session = EditSession::new();
        session.begin_edit(controller_for(None)).unwrap();
        let instance = session.draft_mut().unwrap().add_plugin("weight-plugin").unwrap();

        let draft = session.begin_save().unwrap();
        let result = save_form_config(&repo, "IpHINAT79UW", draft).await;
        assert!(session.finish_save(result).is_err());
        assert_eq!(session.phase(), Phase::Editing);
        assert!(repo.store().write_log().is_empty());

        let controller = session.draft_mut().unwrap();
        controller
            .configure_plugin(PluginConfiguration::new(
                &instance,
                "https://apps.example.org/weight/plugin.html",
            ))
            .unwrap();
        let draft = session.begin_save().unwrap();
        let result = save_form_config(&repo, "IpHINAT79UW", draft).await;
        session.finish_save(result).unwrap();
        assert_eq!(session.phase(), Phase::Viewing);
        assert_eq!(repo.store().write_log(), vec![DATA_ENTRY_FORMS_KEY]);
    }
}
