//! Enrollment page layouts: widget registry, stored model, reconciler and persistence.

pub mod model;
pub mod reconcile;
pub mod save;
pub mod widgets;

pub use model::{LayoutElement, PageLayout, Settings};
pub use reconcile::{
    reconcile, Column, EditableLayout, LayoutItem, LayoutList, PluginItem, UNKNOWN_PLUGIN_LABEL,
};
pub use save::{delete_layouts, load_layout, save_layout};
pub use widgets::{default_layout, find_widget, read_only_settings, EnrollmentPage, NativeWidget, WIDGETS};
