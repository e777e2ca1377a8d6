use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file name inside [`config_dir`].
pub(crate) const APP_CONFIG_FILE: &str = "config.json";

/// Get the config directory using platform-appropriate location.
///
/// - macOS: `~/Library/Application Support/capture-configurator/`
/// - Linux: `~/.config/capture-configurator/` (or `$XDG_CONFIG_HOME`)
/// - Windows: `%APPDATA%/capture-configurator/`
///
/// Falls back to `~/.capture-configurator/` if platform dir is unavailable.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("capture-configurator"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".capture-configurator")
        })
}

/// Load a JSON config file from `dir`, returning Default if missing or corrupt.
/// Logs warnings/errors when the file exists but cannot be read or parsed,
/// so corrupt files are visible in logs instead of silently resetting state.
pub(crate) fn load_json_config_from<T: DeserializeOwned + Default>(dir: &Path, filename: &str) -> T {
    let path = dir.join(filename);
    if !path.exists() {
        return T::default();
    }
    let content = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(path = %path.display(), "Could not read config: {e}");
            return T::default();
        }
    };
    match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(path = %path.display(), "Corrupt config: {e}. Using defaults.");
            T::default()
        }
    }
}

/// Save a JSON config file atomically (temp file + rename).
/// Sets 0600 permissions on Unix since the file may hold credentials.
pub(crate) fn save_json_config_to<T: Serialize>(dir: &Path, filename: &str, config: &T) -> Result<(), String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("Failed to create config directory: {e}"))?;

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {e}"))?;

    let target = dir.join(filename);
    let temp = dir.join(format!("{}.tmp.{}", filename, std::process::id()));

    std::fs::write(&temp, &json)
        .map_err(|e| format!("Failed to write temp config: {e}"))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&temp, perms)
            .map_err(|e| format!("Failed to set config permissions: {e}"))?;
    }

    // Atomic rename: either the old file or new file exists, never partial
    std::fs::rename(&temp, &target)
        .map_err(|e| {
            let _ = std::fs::remove_file(&temp);
            format!("Failed to commit config: {e}")
        })?;

    Ok(())
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Instance root, e.g. `https://play.dhis2.org/dev` (without `/api`)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Username for HTTP basic auth
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Personal access token; takes precedence over basic auth when set
    #[serde(default)]
    pub api_token: Option<String>,
    /// Data store namespace holding every configuration document
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// `tracing` filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_namespace() -> String {
    crate::datastore::DEFAULT_NAMESPACE.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            username: None,
            password: None,
            api_token: None,
            namespace: default_namespace(),
            request_timeout_secs: default_request_timeout_secs(),
            log_filter: default_log_filter(),
        }
    }
}

impl AppConfig {
    /// Reject configs that cannot possibly reach a server.
    pub fn validate(&self) -> Result<(), String> {
        let parsed = url::Url::parse(&self.base_url)
            .map_err(|e| format!("Invalid base URL \"{}\": {e}", self.base_url))?;
        match parsed.scheme() {
            "http" | "https" => {}
            scheme => return Err(format!("Scheme \"{scheme}\" is not supported for the base URL")),
        }
        if self.namespace.trim().is_empty() {
            return Err("namespace is empty".into());
        }
        if self.username.is_some() != self.password.is_some() {
            return Err("username and password must be set together".into());
        }
        Ok(())
    }
}

pub fn load_app_config() -> AppConfig {
    load_json_config_from(&config_dir(), APP_CONFIG_FILE)
}

pub fn save_app_config(config: &AppConfig) -> Result<(), String> {
    save_json_config_to(&config_dir(), APP_CONFIG_FILE, config)
}
