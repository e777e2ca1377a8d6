//! Listing of stored configurations.
//!
//! Enrollment layouts are reported per program with a defined/valid flag for
//! each page document. Form-field records are resolved against the metadata
//! catalog and grouped under their parent program; tracked entity types form
//! their own group.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::datastore::DataStore;
use crate::error::Result;
use crate::form_fields::model::{parse_context_form, FormElement};
use crate::form_fields::DATA_ENTRY_FORMS_KEY;
use crate::layout::{EnrollmentPage, PageLayout};
use crate::metadata::context::Reference;
use crate::metadata::{MetadataCatalog, ResolvedContext};
use crate::repository::{Document, DocumentRepository};

// ---------------------------------------------------------------------------
// Enrollment layouts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageStatus {
    pub defined: bool,
    pub valid: bool,
}

impl PageStatus {
    fn of(entry: Option<&Value>) -> Self {
        match entry {
            None => Self::default(),
            Some(value) => Self {
                defined: true,
                valid: PageLayout::from_value(value).is_ok(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentConfigRecord {
    pub program_id: String,
    /// `None` when the program no longer exists or is not visible.
    pub display_name: Option<String>,
    pub pages: BTreeMap<EnrollmentPage, PageStatus>,
}

pub type EnrollmentDocuments = BTreeMap<EnrollmentPage, Document>;

/// The three page documents, fetched together.
pub async fn load_enrollment_documents<S: DataStore>(
    repo: &DocumentRepository<S>,
) -> Result<EnrollmentDocuments> {
    let (overview, new_event, edit_event) = tokio::try_join!(
        repo.get(EnrollmentPage::Overview.datastore_key()),
        repo.get(EnrollmentPage::NewEvent.datastore_key()),
        repo.get(EnrollmentPage::EditEvent.datastore_key()),
    )?;
    Ok(BTreeMap::from([
        (EnrollmentPage::Overview, overview),
        (EnrollmentPage::NewEvent, new_event),
        (EnrollmentPage::EditEvent, edit_event),
    ]))
}

/// One record per program holding an entry in at least one page document, ordered by id.
pub fn enrollment_records(
    documents: &EnrollmentDocuments,
    catalog: &MetadataCatalog,
) -> Vec<EnrollmentConfigRecord> {
    let mut program_ids: Vec<&String> = documents.values().flat_map(|doc| doc.keys()).collect();
    program_ids.sort();
    program_ids.dedup();

    program_ids
        .into_iter()
        .map(|program_id| EnrollmentConfigRecord {
            program_id: program_id.clone(),
            display_name: catalog.program(program_id).map(|p| p.display_name.clone()),
            pages: EnrollmentPage::ALL
                .into_iter()
                .map(|page| {
                    let entry = documents.get(&page).and_then(|doc| doc.get(program_id));
                    (page, PageStatus::of(entry))
                })
                .collect(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Form fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormFieldRecord {
    pub context: ResolvedContext,
    pub valid: bool,
    pub sections: usize,
    pub plugins: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramGroup {
    /// The parent program, or the tracked entity type for type-level records.
    pub owner: Reference,
    pub records: Vec<FormFieldRecord>,
}

/// Records for every context id the catalog can resolve. Unresolvable ids are skipped.
pub fn form_field_records(document: &Document, catalog: &MetadataCatalog) -> Vec<FormFieldRecord> {
    document
        .iter()
        .filter_map(|(context_id, value)| {
            let context = match catalog.resolve_context(context_id) {
                Ok(context) => context,
                Err(e) => {
                    tracing::debug!(context_id, "Skipping form-field record: {e}");
                    return None;
                }
            };
            let record = match parse_context_form(value) {
                Ok(sections) => FormFieldRecord {
                    context,
                    valid: true,
                    plugins: sections
                        .iter()
                        .flat_map(|s| s.elements.iter())
                        .filter(|e| matches!(e, FormElement::Plugin(_)))
                        .count(),
                    sections: sections.len(),
                },
                Err(_) => FormFieldRecord {
                    context,
                    valid: false,
                    sections: 0,
                    plugins: 0,
                },
            };
            Some(record)
        })
        .collect()
}

/// Group records by owning program. A program stage lands only under its own
/// parent; a tracked entity type is its own owner.
pub fn group_by_program(records: Vec<FormFieldRecord>) -> Vec<ProgramGroup> {
    let mut groups: BTreeMap<String, ProgramGroup> = BTreeMap::new();
    for record in records {
        let owner = match &record.context.parent_program {
            Some(parent) => parent.clone(),
            None => Reference {
                id: record.context.id.clone(),
                display_name: record.context.display_name.clone(),
            },
        };
        groups
            .entry(owner.id.clone())
            .or_insert_with(|| ProgramGroup {
                owner,
                records: Vec::new(),
            })
            .records
            .push(record);
    }
    groups.into_values().collect()
}

pub async fn load_form_field_groups<S: DataStore>(
    repo: &DocumentRepository<S>,
    catalog: &MetadataCatalog,
) -> Result<Vec<ProgramGroup>> {
    let document = repo.get(DATA_ENTRY_FORMS_KEY).await?;
    Ok(group_by_program(form_field_records(&document, catalog)))
}
