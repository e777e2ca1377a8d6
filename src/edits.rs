//! Scripted editor actions.
//!
//! An edit script is a JSON array of actions, each tagged by `action`, applied
//! in order to an open editor. The first action that fails aborts the script
//! and nothing is saved.

use serde::Deserialize;

use crate::datastore::DataStore;
use crate::error::{ConfigError, Result};
use crate::form_fields::{
    save_form_config, validate_form_config, ContextForm, FieldList, FieldMapping, FormFieldController,
    PluginConfiguration,
};
use crate::layout::{save_layout, Column, EditableLayout, LayoutList, PageLayout, Settings};
use crate::moves::{DragMove, DropLocation, MoveOutcome};
use crate::repository::DocumentRepository;
use crate::session::EditSession;

/// Name of the pool list in move actions; anything else names a column or section.
const POOL: &str = "pool";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Slot {
    pub list: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum LayoutEdit {
    AddWidget {
        column: Column,
        name: String,
    },
    /// An installed plugin, taken from the pool.
    AddPlugin {
        column: Column,
        source: String,
    },
    AddLocalPlugin {
        column: Column,
        url: String,
    },
    Remove {
        column: Column,
        index: usize,
    },
    Settings {
        column: Column,
        index: usize,
        settings: Settings,
    },
    Move {
        #[serde(rename = "itemId")]
        item_id: String,
        from: Slot,
        #[serde(default)]
        to: Option<Slot>,
    },
    Title {
        #[serde(default)]
        title: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum FormEdit {
    /// New instance in the first section, configured right away.
    AddPlugin {
        #[serde(rename = "pluginId")]
        plugin_id: String,
        #[serde(default, rename = "fieldMap")]
        field_map: Vec<FieldMapping>,
    },
    RemovePlugin {
        id: String,
    },
    Configure {
        id: String,
        #[serde(default, rename = "pluginLaunchUrl")]
        plugin_launch_url: Option<String>,
        #[serde(default, rename = "fieldMap")]
        field_map: Vec<FieldMapping>,
    },
    Move {
        #[serde(rename = "itemId")]
        item_id: String,
        from: Slot,
        #[serde(default)]
        to: Option<Slot>,
    },
}

pub fn parse_layout_edits(text: &str) -> Result<Vec<LayoutEdit>> {
    serde_json::from_str(text).map_err(|e| ConfigError::validation(format!("Invalid layout edits: {e}")))
}

pub fn parse_form_edits(text: &str) -> Result<Vec<FormEdit>> {
    serde_json::from_str(text).map_err(|e| ConfigError::validation(format!("Invalid form edits: {e}")))
}

fn layout_list(name: &str) -> Result<LayoutList> {
    match name {
        "left" => Ok(LayoutList::Column(Column::Left)),
        "right" => Ok(LayoutList::Column(Column::Right)),
        POOL => Ok(LayoutList::PluginPool),
        other => Err(ConfigError::validation(format!(
            "Unknown layout list '{other}' (expected left, right or pool)"
        ))),
    }
}

fn field_list(name: &str) -> FieldList {
    if name == POOL {
        FieldList::PluginPool
    } else {
        FieldList::Section(name.to_string())
    }
}

fn drag_move<L>(item_id: &str, from: &Slot, to: Option<&Slot>, list: impl Fn(&str) -> Result<L>) -> Result<DragMove<L>> {
    Ok(DragMove {
        item_id: item_id.to_string(),
        source: DropLocation {
            list: list(&from.list)?,
            index: from.index,
        },
        destination: match to {
            Some(slot) => Some(DropLocation {
                list: list(&slot.list)?,
                index: slot.index,
            }),
            None => None,
        },
    })
}

/// A move that did nothing because the item was elsewhere or not welcome is an error here.
fn check_outcome(item_id: &str, outcome: MoveOutcome) -> Result<()> {
    match outcome {
        MoveOutcome::Stale => Err(ConfigError::validation(format!(
            "'{item_id}' is not at the given source position"
        ))),
        MoveOutcome::Rejected => Err(ConfigError::validation(format!(
            "'{item_id}' cannot be moved there"
        ))),
        MoveOutcome::NoDestination | MoveOutcome::Reordered | MoveOutcome::Transferred => Ok(()),
    }
}

pub fn apply_layout_edit(layout: &mut EditableLayout, edit: &LayoutEdit) -> Result<()> {
    match edit {
        LayoutEdit::AddWidget { column, name } => layout.add_widget(*column, name),
        LayoutEdit::AddPlugin { column, source } => layout.add_plugin(*column, source),
        LayoutEdit::AddLocalPlugin { column, url } => layout.add_local_plugin(*column, url),
        LayoutEdit::Remove { column, index } => layout
            .remove(*column, *index)
            .map(|_| ())
            .ok_or_else(|| ConfigError::validation(format!("No item at position {index}"))),
        LayoutEdit::Settings {
            column,
            index,
            settings,
        } => layout.update_settings(*column, *index, settings.clone()),
        LayoutEdit::Move { item_id, from, to } => {
            let mv = drag_move(item_id, from, to.as_ref(), layout_list)?;
            check_outcome(item_id, layout.apply_move(&mv))
        }
        LayoutEdit::Title { title } => {
            layout.title = title.clone().filter(|t| !t.trim().is_empty());
            Ok(())
        }
    }
}

fn configuration(id: &str, plugin_launch_url: String, field_map: &[FieldMapping]) -> PluginConfiguration {
    let mut configuration = PluginConfiguration::new(id, plugin_launch_url);
    for mapping in field_map {
        configuration.set_mapping(&mapping.id_from_app, &mapping.id_from_plugin);
    }
    configuration
}

pub fn apply_form_edit(controller: &mut FormFieldController, edit: &FormEdit) -> Result<()> {
    match edit {
        FormEdit::AddPlugin {
            plugin_id,
            field_map,
        } => {
            let instance = controller.add_plugin(plugin_id)?;
            let url = controller
                .plugin_fields()
                .find(|p| p.id == instance)
                .map(|p| p.plugin_launch_url.clone())
                .unwrap_or_default();
            let result = controller.configure_plugin(configuration(&instance, url, field_map));
            if result.is_err() {
                controller.remove_plugin(&instance);
            }
            result
        }
        FormEdit::RemovePlugin { id } => {
            if controller.remove_plugin(id) {
                Ok(())
            } else {
                Err(ConfigError::NotFound(format!("Plugin field '{id}' is not on the form")))
            }
        }
        FormEdit::Configure {
            id,
            plugin_launch_url,
            field_map,
        } => {
            let url = match plugin_launch_url {
                Some(url) => url.clone(),
                None => controller
                    .configuration(id)
                    .map(|c| c.plugin_launch_url.clone())
                    .or_else(|| {
                        controller
                            .plugin_fields()
                            .find(|p| p.id == *id)
                            .map(|p| p.plugin_launch_url.clone())
                    })
                    .unwrap_or_default(),
            };
            controller.configure_plugin(configuration(id, url, field_map))
        }
        FormEdit::Move { item_id, from, to } => {
            let mv = drag_move(item_id, from, to.as_ref(), |name| Ok(field_list(name)))?;
            check_outcome(item_id, controller.on_drag_end(&mv))
        }
    }
}

/// Apply `edits` in order, stopping at the first failure. The error names the
/// failing action by position.
pub fn apply_all<T, E>(target: &mut T, edits: &[E], apply: impl Fn(&mut T, &E) -> Result<()>) -> Result<()> {
    for (index, edit) in edits.iter().enumerate() {
        apply(target, edit).map_err(|e| match e {
            ConfigError::Validation(message) => ConfigError::validation(format!("Edit #{}: {message}", index + 1)),
            other => other,
        })?;
    }
    tracing::debug!(count = edits.len(), "Applied edits");
    Ok(())
}

// ---------------------------------------------------------------------------
// Edit sessions
// ---------------------------------------------------------------------------

fn editing<D>(session: &mut EditSession<D>) -> Result<&mut D> {
    session
        .draft_mut()
        .ok_or_else(|| ConfigError::validation("No draft is being edited"))
}

/// Edit `layout` through a session and save it for `program_id`.
pub async fn save_layout_edits<S: DataStore>(
    repo: &DocumentRepository<S>,
    program_id: &str,
    layout: EditableLayout,
    edits: &[LayoutEdit],
) -> Result<PageLayout> {
    let mut session = EditSession::new();
    session.begin_edit(layout)?;
    apply_all(editing(&mut session)?, edits, apply_layout_edit)?;

    let draft = session.begin_save()?;
    let result = save_layout(repo, program_id, draft).await;
    session.finish_save(result)
}

/// Edit the form through a session and save it for `context_id`.
pub async fn save_form_edits<S: DataStore>(
    repo: &DocumentRepository<S>,
    context_id: &str,
    controller: FormFieldController,
    edits: &[FormEdit],
) -> Result<ContextForm> {
    let mut session = EditSession::new();
    session.begin_edit(controller)?;
    apply_all(editing(&mut session)?, edits, apply_form_edit)?;

    let draft = session.begin_save()?;
    let result = save_form_config(repo, context_id, draft).await;
    session.finish_save(result)
}

/// Dry run of [`save_form_edits`]: the edited form is validated, nothing is written.
pub fn validate_form_edits(mut controller: FormFieldController, edits: &[FormEdit]) -> Result<ContextForm> {
    apply_all(&mut controller, edits, apply_form_edit)?;
    validate_form_config(&controller)
}
