//! Opening an editor. Metadata, the plugin catalog and the stored record are
//! fetched concurrently; nothing is editable until all three have resolved.
//! The `import_*` variants start from a supplied record instead of the stored one.

use crate::datastore::DataStore;
use crate::dhis2::Dhis2Client;
use crate::error::{ConfigError, Result};
use crate::form_fields::{initial_values, load_form_config, FormFieldController, FormSectionConfig};
use crate::layout::{load_layout, reconcile, EditableLayout, EnrollmentPage, PageLayout};
use crate::metadata::{fetch_metadata, ConvertedMetadata, MetadataType};
use crate::registry::fetch_installed_plugins;
use crate::repository::DocumentRepository;

/// A stored record that fails validation is logged and replaced by the default.
fn tolerate_invalid<T>(record: Result<Option<T>>, context_id: &str) -> Result<Option<T>> {
    match record {
        Err(ConfigError::Validation(message)) => {
            tracing::warn!(context_id, "Ignoring invalid stored configuration: {message}");
            Ok(None)
        }
        other => other,
    }
}

pub struct LayoutEditor {
    pub metadata: ConvertedMetadata,
    pub layout: EditableLayout,
}

pub async fn open_layout_editor<S: DataStore>(
    client: &Dhis2Client,
    repo: &DocumentRepository<S>,
    program_id: &str,
    page: EnrollmentPage,
) -> Result<LayoutEditor> {
    let (metadata, catalog, stored) = tokio::try_join!(
        fetch_metadata(client, program_id, MetadataType::TrackerProgram),
        fetch_installed_plugins(client),
        async { tolerate_invalid(load_layout(repo, program_id, page).await, program_id) },
    )?;

    tracing::debug!(program_id, %page, stored = stored.is_some(), "Opened layout editor");
    Ok(LayoutEditor {
        metadata,
        layout: reconcile(stored.as_ref(), &catalog, page),
    })
}

pub async fn open_form_field_editor<S: DataStore>(
    client: &Dhis2Client,
    repo: &DocumentRepository<S>,
    context_id: &str,
    metadata_type: MetadataType,
) -> Result<FormFieldController> {
    let (metadata, catalog, stored) = tokio::try_join!(
        fetch_metadata(client, context_id, metadata_type),
        fetch_installed_plugins(client),
        async { tolerate_invalid(load_form_config(repo, context_id).await, context_id) },
    )?;

    let initial = initial_values(stored.as_deref(), &metadata, &catalog);
    tracing::debug!(
        context_id,
        %metadata_type,
        sections = initial.sections.len(),
        plugins = initial.configurations.len(),
        "Opened form-field editor"
    );
    Ok(FormFieldController::new(initial, metadata, catalog))
}

pub async fn import_layout_editor(
    client: &Dhis2Client,
    program_id: &str,
    page: EnrollmentPage,
    record: &PageLayout,
) -> Result<LayoutEditor> {
    let (metadata, catalog) = tokio::try_join!(
        fetch_metadata(client, program_id, MetadataType::TrackerProgram),
        fetch_installed_plugins(client),
    )?;
    Ok(LayoutEditor {
        metadata,
        layout: reconcile(Some(record), &catalog, page),
    })
}

/// Stale sections and attributes in `record` are dropped the same way as for a stored record.
pub async fn import_form_field_editor(
    client: &Dhis2Client,
    context_id: &str,
    metadata_type: MetadataType,
    record: &[FormSectionConfig],
) -> Result<FormFieldController> {
    let (metadata, catalog) = tokio::try_join!(
        fetch_metadata(client, context_id, metadata_type),
        fetch_installed_plugins(client),
    )?;
    let initial = initial_values(Some(record), &metadata, &catalog);
    Ok(FormFieldController::new(initial, metadata, catalog))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::MemoryDataStore;
    use crate::dhis2::Auth;
    use crate::form_fields::{FieldItem, DATA_ENTRY_FORMS_KEY};
    use crate::layout::{LayoutItem, UNKNOWN_PLUGIN_LABEL};
    use mockito::Matcher;
    use serde_json::json;
    use std::time::Duration;

    async fn server() -> mockito::ServerGuard {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/programs/IpHINAT79UW")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "id": "IpHINAT79UW",
                    "displayName": "Child Programme",
                    "access": {"read": true, "write": true, "data": {"read": true, "write": true}},
                    "programTrackedEntityAttributes": [
                        {"sortOrder": 1, "trackedEntityAttribute": {"id": "w75KJ2mc4zz", "displayName": "First name", "valueType": "TEXT"}}
                    ],
                    "programSections": []
                })
                .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("GET", "/api/apps")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"name":"Weight plugin","key":"weight-plugin","pluginLaunchUrl":"https://x/weight.html"}]"#)
            .create_async()
            .await;
        server
    }

    fn client(server: &mockito::ServerGuard) -> Dhis2Client {
        Dhis2Client::new(&server.url(), Auth::None, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn layout_editor_resolves_stored_plugins() {
        let server = server().await;
        let repo = DocumentRepository::new(MemoryDataStore::with_documents([(
            "enrollmentOverviewLayout",
            json!({"IpHINAT79UW": {"leftColumn": [
                {"type": "plugin", "source": "https://x/weight.html"},
                {"type": "plugin", "source": "http://localhost:3000/plugin.html"}
            ]}}),
        )]));

        let editor = open_layout_editor(&client(&server), &repo, "IpHINAT79UW", EnrollmentPage::Overview)
            .await
            .unwrap();
        assert_eq!(editor.metadata.display_name, "Child Programme");
        let titles: Vec<_> = editor.layout.left_column.iter().map(LayoutItem::title).collect();
        assert_eq!(titles, vec!["Weight plugin", UNKNOWN_PLUGIN_LABEL]);
        assert!(editor.layout.plugin_pool.is_empty());
    }

    #[tokio::test]
    async fn invalid_stored_layout_falls_back_to_default() {
        let server = server().await;
        let repo = DocumentRepository::new(MemoryDataStore::with_documents([(
            "enrollmentOverviewLayout",
            json!({"IpHINAT79UW": {"leftColumn": 42}}),
        )]));
        let editor = open_layout_editor(&client(&server), &repo, "IpHINAT79UW", EnrollmentPage::Overview)
            .await
            .unwrap();
        assert!(!editor.layout.left_column.is_empty());
        assert_eq!(editor.layout.plugin_pool.len(), 1);
    }

    #[tokio::test]
    async fn form_editor_starts_from_metadata() {
        let server = server().await;
        let repo = DocumentRepository::new(MemoryDataStore::with_documents([(
            DATA_ENTRY_FORMS_KEY,
            json!({}),
        )]));
        let controller =
            open_form_field_editor(&client(&server), &repo, "IpHINAT79UW", MetadataType::TrackerProgram)
                .await
                .unwrap();
        assert_eq!(controller.sections().len(), 1);
        assert!(matches!(controller.sections()[0].fields[0], FieldItem::Attribute(_)));
        assert_eq!(controller.plugin_pool().len(), 1);
    }

    #[tokio::test]
    async fn imported_records_are_reconciled() {
        let server = server().await;
        let layout = PageLayout::from_value(&json!({"leftColumn": [
            {"type": "component", "name": "NoSuchWidget"},
            {"type": "plugin", "source": "https://x/weight.html"}
        ]}))
        .unwrap();
        let editor = import_layout_editor(&client(&server), "IpHINAT79UW", EnrollmentPage::Overview, &layout)
            .await
            .unwrap();
        let titles: Vec<_> = editor.layout.left_column.iter().map(LayoutItem::title).collect();
        assert_eq!(titles, vec!["Weight plugin"]);

        let form = crate::form_fields::model::parse_context_form(&json!([
            {"id": "gone", "elements": []},
            {"id": "default", "elements": [{"type": "TrackedEntityAttribute", "id": "w75KJ2mc4zz"}]}
        ]))
        .unwrap();
        let controller =
            import_form_field_editor(&client(&server), "IpHINAT79UW", MetadataType::TrackerProgram, &form)
                .await
                .unwrap();
        assert_eq!(controller.sections().len(), 1);
        assert_eq!(controller.sections()[0].id, "default");
    }

    #[tokio::test]
    async fn a_failed_fetch_fails_the_whole_open() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/programs/missing")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"message":"Program not found"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/apps")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;
        let repo = DocumentRepository::new(MemoryDataStore::new());
        let result =
            open_form_field_editor(&client(&server), &repo, "missing", MetadataType::TrackerProgram).await;
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}
