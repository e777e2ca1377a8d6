//! Layout Reconciler: stored page layout + widget registry + plugin catalog
//! → editable layout.

use serde::Deserialize;

use super::model::{LayoutElement, PageLayout, Settings};
use super::widgets::{default_layout, find_widget, EnrollmentPage, NativeWidget, WIDGETS};
use crate::dhis2::validate_plugin_url;
use crate::error::{ConfigError, Result};
use crate::moves::{reorder, transfer, transfer_with, DragMove, Draggable, MoveOutcome};
use crate::registry::{PluginCatalog, PluginInfo};

/// Label shown for a plugin source no installed app claims.
pub const UNKNOWN_PLUGIN_LABEL: &str = "Unknown/local plugin";
const UNKNOWN_PLUGIN_DESCRIPTION: &str = "A plugin that is hosted locally";

#[derive(Debug, Clone, PartialEq)]
pub struct PluginItem {
    pub source: String,
    pub display_name: String,
    pub description: Option<String>,
    /// No installed app has this launch URL.
    pub missing_metadata: bool,
    pub settings: Option<Settings>,
}

impl PluginItem {
    fn from_info(info: &PluginInfo, settings: Option<Settings>) -> Self {
        Self {
            source: info.plugin_launch_url.clone(),
            display_name: info.display_name.clone(),
            description: info.description.clone(),
            missing_metadata: false,
            settings,
        }
    }

    fn unknown(source: String, settings: Option<Settings>) -> Self {
        Self {
            source,
            display_name: UNKNOWN_PLUGIN_LABEL.to_string(),
            description: Some(UNKNOWN_PLUGIN_DESCRIPTION.to_string()),
            missing_metadata: true,
            settings,
        }
    }

    /// Canonical metadata when the catalog still knows the source, a bare reference otherwise.
    fn resolve(catalog: &PluginCatalog, source: String, settings: Option<Settings>) -> Self {
        match catalog.find_by_launch_url(&source) {
            Some(info) => Self::from_info(info, settings),
            None => Self::unknown(source, settings),
        }
    }
}

impl Draggable for PluginItem {
    fn drag_id(&self) -> &str {
        &self.source
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutItem {
    Widget {
        widget: &'static NativeWidget,
        settings: Option<Settings>,
    },
    Plugin(PluginItem),
}

impl LayoutItem {
    fn to_element(&self) -> LayoutElement {
        match self {
            LayoutItem::Widget { widget, settings } => LayoutElement::Component {
                name: widget.name.to_string(),
                settings: settings.clone(),
            },
            LayoutItem::Plugin(plugin) => LayoutElement::Plugin {
                source: plugin.source.clone(),
                settings: plugin.settings.clone(),
            },
        }
    }

    pub fn title(&self) -> &str {
        match self {
            LayoutItem::Widget { widget, .. } => widget.title,
            LayoutItem::Plugin(plugin) => &plugin.display_name,
        }
    }
}

impl Draggable for LayoutItem {
    fn drag_id(&self) -> &str {
        match self {
            LayoutItem::Widget { widget, .. } => widget.name,
            LayoutItem::Plugin(plugin) => &plugin.source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Column {
    Left,
    Right,
}

/// Droppable lists of the layout editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutList {
    Column(Column),
    PluginPool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditableLayout {
    pub page: EnrollmentPage,
    pub title: Option<String>,
    pub left_column: Vec<LayoutItem>,
    pub right_column: Vec<LayoutItem>,
    /// Installed plugins not placed in either column.
    pub plugin_pool: Vec<PluginItem>,
    catalog: PluginCatalog,
}

fn resolve_element(element: &LayoutElement, catalog: &PluginCatalog, page: EnrollmentPage) -> Option<LayoutItem> {
    match element {
        LayoutElement::Component { name, settings } => match find_widget(name) {
            Some(widget) if widget.allowed_on(page) => Some(LayoutItem::Widget {
                widget,
                settings: settings.clone(),
            }),
            Some(_) => {
                tracing::debug!(widget = %name, %page, "Dropping widget not allowed on page");
                None
            }
            None => {
                tracing::debug!(widget = %name, "Dropping unknown widget");
                None
            }
        },
        LayoutElement::Plugin { source, settings } => Some(LayoutItem::Plugin(PluginItem::resolve(
            catalog,
            source.clone(),
            settings.clone(),
        ))),
    }
}

/// Build the editable layout from the stored record (or the page default).
pub fn reconcile(existing: Option<&PageLayout>, catalog: &PluginCatalog, page: EnrollmentPage) -> EditableLayout {
    let default;
    let layout = match existing {
        Some(layout) => layout,
        None => {
            default = default_layout(page);
            &default
        }
    };

    let resolve_column = |column: &Option<Vec<LayoutElement>>| -> Vec<LayoutItem> {
        column
            .iter()
            .flatten()
            .filter_map(|e| resolve_element(e, catalog, page))
            .collect()
    };
    let left_column = resolve_column(&layout.left_column);
    let right_column = resolve_column(&layout.right_column);

    let used = |source: &str| {
        left_column
            .iter()
            .chain(&right_column)
            .any(|item| matches!(item, LayoutItem::Plugin(p) if p.source == source))
    };
    let plugin_pool = catalog
        .plugins()
        .iter()
        .filter(|info| !used(&info.plugin_launch_url))
        .map(|info| PluginItem::from_info(info, None))
        .collect();

    EditableLayout {
        page,
        title: layout.title.clone(),
        left_column,
        right_column,
        plugin_pool,
        catalog: catalog.clone(),
    }
}

impl EditableLayout {
    fn items(&self) -> impl Iterator<Item = &LayoutItem> {
        self.left_column.iter().chain(&self.right_column)
    }

    pub fn column(&self, column: Column) -> &[LayoutItem] {
        match column {
            Column::Left => &self.left_column,
            Column::Right => &self.right_column,
        }
    }

    fn column_mut(&mut self, column: Column) -> &mut Vec<LayoutItem> {
        match column {
            Column::Left => &mut self.left_column,
            Column::Right => &mut self.right_column,
        }
    }

    fn uses_widget(&self, name: &str) -> bool {
        self.items()
            .any(|item| matches!(item, LayoutItem::Widget { widget, .. } if widget.name == name))
    }

    fn uses_plugin(&self, source: &str) -> bool {
        self.items()
            .any(|item| matches!(item, LayoutItem::Plugin(p) if p.source == source))
    }

    /// Registered widgets allowed on this page and not placed yet.
    pub fn available_widgets(&self) -> Vec<&'static NativeWidget> {
        WIDGETS
            .iter()
            .filter(|w| w.allowed_on(self.page) && !self.uses_widget(w.name))
            .collect()
    }

    pub fn available_plugins(&self) -> &[PluginItem] {
        &self.plugin_pool
    }

    pub fn add_widget(&mut self, column: Column, name: &str) -> Result<()> {
        let widget = find_widget(name)
            .ok_or_else(|| ConfigError::validation(format!("Unknown widget '{name}'")))?;
        if !widget.allowed_on(self.page) {
            return Err(ConfigError::validation(format!(
                "Widget '{name}' is not available on the {} page",
                self.page
            )));
        }
        if self.uses_widget(name) {
            return Err(ConfigError::validation(format!("Widget '{name}' is already placed")));
        }
        self.column_mut(column).insert(
            0,
            LayoutItem::Widget {
                widget,
                settings: None,
            },
        );
        Ok(())
    }

    /// Move an installed plugin from the pool to the head of `column`.
    pub fn add_plugin(&mut self, column: Column, source: &str) -> Result<()> {
        let index = self
            .plugin_pool
            .iter()
            .position(|p| p.source == source)
            .ok_or_else(|| ConfigError::validation(format!("Plugin '{source}' is not available")))?;
        let plugin = self.plugin_pool.remove(index);
        self.column_mut(column).insert(0, LayoutItem::Plugin(plugin));
        Ok(())
    }

    /// Place a plugin by its launch URL. Installed plugins come from the pool;
    /// anything else becomes an unknown/local placeholder.
    pub fn add_local_plugin(&mut self, column: Column, url: &str) -> Result<()> {
        validate_plugin_url(url)?;
        let url = url.trim();
        if self.uses_plugin(url) {
            return Err(ConfigError::validation(format!("Plugin '{url}' is already placed")));
        }
        if self.plugin_pool.iter().any(|p| p.source == url) {
            return self.add_plugin(column, url);
        }
        self.column_mut(column)
            .insert(0, LayoutItem::Plugin(PluginItem::unknown(url.to_string(), None)));
        Ok(())
    }

    /// Remove the item at `index`. Plugins go back to the pool.
    pub fn remove(&mut self, column: Column, index: usize) -> Option<LayoutItem> {
        let items = self.column_mut(column);
        if index >= items.len() {
            return None;
        }
        let removed = items.remove(index);
        if let LayoutItem::Plugin(plugin) = &removed {
            self.plugin_pool.push(PluginItem {
                settings: None,
                ..plugin.clone()
            });
        }
        Some(removed)
    }

    /// Replace the settings of the item at `index`. Widgets only accept the
    /// settings they declare; plugin settings are passed through untouched.
    pub fn update_settings(&mut self, column: Column, index: usize, settings: Settings) -> Result<()> {
        let item = self
            .column_mut(column)
            .get_mut(index)
            .ok_or_else(|| ConfigError::validation(format!("No item at position {index}")))?;

        match item {
            LayoutItem::Widget { widget, settings: current } => {
                for (key, value) in &settings {
                    let setting = widget.setting(key).ok_or_else(|| {
                        ConfigError::validation(format!("Widget '{}' has no setting '{key}'", widget.name))
                    })?;
                    if !setting.accepts(value) {
                        return Err(ConfigError::validation(format!(
                            "Setting '{}' of widget '{}' expects a boolean, got {value}",
                            setting.label, widget.name
                        )));
                    }
                }
                *current = (!settings.is_empty()).then_some(settings);
            }
            LayoutItem::Plugin(plugin) => {
                plugin.settings = (!settings.is_empty()).then_some(settings);
            }
        }
        Ok(())
    }

    /// Apply a drag/drop gesture. Only plugins may enter the pool.
    pub fn apply_move(&mut self, mv: &DragMove<LayoutList>) -> MoveOutcome {
        let Some(dest) = mv.destination else {
            return MoveOutcome::NoDestination;
        };
        let (from, to, id) = (mv.source.index, dest.index, mv.item_id.as_str());

        match (mv.source.list, dest.list) {
            (LayoutList::PluginPool, LayoutList::PluginPool) => reorder(&mut self.plugin_pool, from, to, id),
            (LayoutList::Column(a), LayoutList::Column(b)) if a == b => {
                reorder(self.column_mut(a), from, to, id)
            }
            (LayoutList::Column(a), LayoutList::Column(_)) => {
                let (source, dest) = match a {
                    Column::Left => (&mut self.left_column, &mut self.right_column),
                    Column::Right => (&mut self.right_column, &mut self.left_column),
                };
                transfer(source, from, dest, to, id)
            }
            (LayoutList::Column(a), LayoutList::PluginPool) => {
                let source = match a {
                    Column::Left => &mut self.left_column,
                    Column::Right => &mut self.right_column,
                };
                transfer_with(
                    source,
                    from,
                    &mut self.plugin_pool,
                    to,
                    id,
                    |item| matches!(item, LayoutItem::Plugin(_)),
                    // settings belong to the placement, not the pool entry
                    |item| match item {
                        LayoutItem::Plugin(plugin) => Ok(PluginItem {
                            settings: None,
                            ..plugin
                        }),
                        widget @ LayoutItem::Widget { .. } => Err(widget),
                    },
                )
            }
            (LayoutList::PluginPool, LayoutList::Column(b)) => {
                let (dest, catalog) = match b {
                    Column::Left => (&mut self.left_column, &self.catalog),
                    Column::Right => (&mut self.right_column, &self.catalog),
                };
                transfer_with(
                    &mut self.plugin_pool,
                    from,
                    dest,
                    to,
                    id,
                    |_| true,
                    |plugin| {
                        Ok(LayoutItem::Plugin(PluginItem::resolve(
                            catalog,
                            plugin.source,
                            plugin.settings,
                        )))
                    },
                )
            }
        }
    }

    /// Back to the stored wire shape.
    pub fn to_page_layout(&self) -> PageLayout {
        let column = |items: &[LayoutItem]| Some(items.iter().map(LayoutItem::to_element).collect());
        PageLayout {
            title: self.title.clone().filter(|t| !t.is_empty()),
            left_column: column(&self.left_column),
            right_column: column(&self.right_column),
        }
    }
}
