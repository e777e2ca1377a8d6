//! DataStore key provisioning: the documents this app reads and writes must
//! exist before anything else runs.

use serde_json::json;

use crate::datastore::DataStore;
use crate::error::Result;
use crate::form_fields::DATA_ENTRY_FORMS_KEY;
use crate::layout::EnrollmentPage;

/// Every key the configurator owns, in creation order.
pub fn required_keys() -> Vec<&'static str> {
    let mut keys = vec![DATA_ENTRY_FORMS_KEY];
    keys.extend(EnrollmentPage::ALL.iter().map(|p| p.datastore_key()));
    keys
}

/// Required keys absent from `existing`.
pub fn missing_keys(existing: &[String]) -> Vec<&'static str> {
    required_keys()
        .into_iter()
        .filter(|key| !existing.iter().any(|e| e == key))
        .collect()
}

/// Create every missing key as an empty object. Returns the keys created.
pub async fn ensure_keys<S: DataStore>(store: &S) -> Result<Vec<&'static str>> {
    let existing = store.keys().await?;
    let missing = missing_keys(&existing);
    if missing.is_empty() {
        tracing::debug!("All data store keys present");
        return Ok(missing);
    }

    for key in &missing {
        store.create(key, &json!({})).await?;
        tracing::info!(key, "Created data store key");
    }
    Ok(missing)
}
