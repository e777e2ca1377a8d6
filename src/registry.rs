//! Plugin catalog: installed apps that expose a plugin launch URL.

use serde::{Deserialize, Serialize};

use crate::dhis2::Dhis2Client;
use crate::error::Result;
use crate::metadata::parse_payload;

const APP_FIELDS: &str = "name,key,pluginLaunchUrl,description,version";

/// A single app as returned by `/api/apps`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledApp {
    pub name: String,
    pub key: String,
    /// Only apps shipping a plugin entry point have this.
    #[serde(default)]
    pub plugin_launch_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// An installed plugin as the configurator sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    /// App key; also the prefix of form-field plugin instance ids.
    pub id: String,
    pub display_name: String,
    pub plugin_launch_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Keep apps with a non-empty launch URL.
pub fn plugins_from_apps(apps: Vec<InstalledApp>) -> Vec<PluginInfo> {
    apps.into_iter()
        .filter_map(|app| {
            let url = app.plugin_launch_url.filter(|u| !u.trim().is_empty())?;
            Some(PluginInfo {
                id: app.key,
                display_name: app.name,
                plugin_launch_url: url,
                description: app.description,
                version: app.version,
            })
        })
        .collect()
}

/// Fetch every installed app and keep the plugins.
pub async fn fetch_installed_plugins(client: &Dhis2Client) -> Result<PluginCatalog> {
    let value = client.get_value("apps", &[("fields", APP_FIELDS)]).await?;
    let apps: Vec<InstalledApp> = parse_payload("apps", value)?;
    let total = apps.len();
    let catalog = PluginCatalog::new(plugins_from_apps(apps));
    tracing::debug!(apps = total, plugins = catalog.len(), "Loaded plugin catalog");
    Ok(catalog)
}

/// Read-only lookup over the installed plugins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginCatalog {
    plugins: Vec<PluginInfo>,
}

impl PluginCatalog {
    pub fn new(plugins: Vec<PluginInfo>) -> Self {
        Self { plugins }
    }

    pub fn plugins(&self) -> &[PluginInfo] {
        &self.plugins
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&PluginInfo> {
        self.plugins.iter().find(|p| p.id == id)
    }

    pub fn find_by_launch_url(&self, url: &str) -> Option<&PluginInfo> {
        self.plugins.iter().find(|p| p.plugin_launch_url == url)
    }
}
