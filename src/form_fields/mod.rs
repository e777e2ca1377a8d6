//! Form-field configuration: which attributes and plugin instances appear in
//! each section of a context's data entry form.

pub mod controller;
pub mod model;
pub mod plugin_config;
pub mod reconcile;
pub mod save;

/// Data store key holding every context's form-field record.
pub const DATA_ENTRY_FORMS_KEY: &str = "dataEntryForms";

pub use controller::{FieldList, FormFieldController};
pub use model::{ContextForm, FieldMapping, FormElement, FormSectionConfig, PluginElement};
pub use plugin_config::{validate_alias, PluginConfiguration, PluginConfigurations};
pub use reconcile::{initial_values, EditableSection, FieldItem, InitialValues, PluginField};
pub use save::{
    build_context_payload, delete_form_config, load_form_config, save_form_config, validate_form_config,
};
