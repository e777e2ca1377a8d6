//! Persisting page layouts into the per-page documents.

use futures_util::future::join_all;

use super::model::PageLayout;
use super::reconcile::EditableLayout;
use super::widgets::EnrollmentPage;
use crate::datastore::DataStore;
use crate::error::Result;
use crate::repository::DocumentRepository;

/// Stored layout of `program_id` on `page`. An entry that fails validation is an error.
pub async fn load_layout<S: DataStore>(
    repo: &DocumentRepository<S>,
    program_id: &str,
    page: EnrollmentPage,
) -> Result<Option<PageLayout>> {
    let doc = repo.get(page.datastore_key()).await?;
    doc.get(program_id).map(PageLayout::from_value).transpose()
}

/// Validate the edited layout and merge it into the page document.
pub async fn save_layout<S: DataStore>(
    repo: &DocumentRepository<S>,
    program_id: &str,
    layout: &EditableLayout,
) -> Result<PageLayout> {
    let payload = layout.to_page_layout();
    payload.validate()?;
    let value = serde_json::to_value(&payload)?;
    repo.merge_entry(layout.page.datastore_key(), program_id, value)
        .await?;
    Ok(payload)
}

/// Remove `program_id` from every page document that has it. Each document is
/// handled on its own; the first failure is reported once all have finished.
pub async fn delete_layouts<S: DataStore>(
    repo: &DocumentRepository<S>,
    program_id: &str,
) -> Result<Vec<EnrollmentPage>> {
    let results = join_all(EnrollmentPage::ALL.into_iter().map(|page| async move {
        let removed = repo.remove_entry(page.datastore_key(), program_id).await?;
        Ok::<_, crate::error::ConfigError>(removed.then_some(page))
    }))
    .await;

    let mut deleted = Vec::new();
    let mut first_error = None;
    for result in results {
        match result {
            Ok(Some(page)) => deleted.push(page),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(program_id, "Failed to delete layout: {e}");
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(deleted),
    }
}
