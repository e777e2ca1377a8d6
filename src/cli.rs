//! Command-line surface.
//!
//! Connection flags (and their environment variables) override the values
//! loaded from `config.json`. Listings go to stdout as plain text, documents
//! as pretty-printed JSON; logs go to stderr.
//!
//! Records are changed either wholesale (`set-*` with a record file) or with
//! an edit script (`edit-*`, a JSON array of actions such as
//! `{"action": "addWidget", "column": "left", "name": "QuickActions"}`).

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::config::{load_app_config, save_app_config, AppConfig};
use crate::datastore::{DataStore, HttpDataStore};
use crate::dhis2::Dhis2Client;
use crate::edits::{
    parse_form_edits, parse_layout_edits, save_form_edits, save_layout_edits, validate_form_edits, FormEdit,
};
use crate::editor::{import_form_field_editor, import_layout_editor, open_form_field_editor, open_layout_editor};
use crate::error::ConfigError;
use crate::error_classification::{classify, user_message};
use crate::form_fields::model::parse_context_form;
use crate::form_fields::{build_context_payload, delete_form_config};
use crate::layout::{delete_layouts, EnrollmentPage, PageLayout};
use crate::metadata::{MetadataCatalog, MetadataType};
use crate::overview::{enrollment_records, load_enrollment_documents, load_form_field_groups};
use crate::provisioning::ensure_keys;
use crate::repository::DocumentRepository;

#[derive(Parser, Debug)]
#[command(name = "capture-configurator", version, about = "Configure tracker enrollment layouts and form-field plugins")]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Default)]
pub struct ConnectionArgs {
    /// Instance root URL, without `/api`
    #[arg(long, env = "DHIS2_BASE_URL", global = true)]
    pub base_url: Option<String>,

    #[arg(long, env = "DHIS2_USERNAME", global = true)]
    pub username: Option<String>,

    #[arg(long, env = "DHIS2_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Personal access token, used instead of username/password
    #[arg(long, env = "DHIS2_API_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Data store namespace
    #[arg(long, env = "CAPTURE_NAMESPACE", global = true)]
    pub namespace: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

impl ConnectionArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(username) = &self.username {
            config.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            config.password = Some(password.clone());
        }
        if let Some(token) = &self.token {
            config.api_token = Some(token.clone());
        }
        if let Some(namespace) = &self.namespace {
            config.namespace = namespace.clone();
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = timeout;
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Save the effective connection settings to the config file
    Configure,
    /// Create any missing configuration documents
    Provision,
    /// List programs with enrollment layouts
    Layouts,
    /// Show the reconciled layout of one program page
    ShowLayout {
        program: String,
        #[arg(long, default_value = "overview")]
        page: EnrollmentPage,
    },
    /// Replace a program's layout on one page with the record in a JSON file
    SetLayout {
        program: String,
        #[arg(long, default_value = "overview")]
        page: EnrollmentPage,
        #[arg(long)]
        file: PathBuf,
    },
    /// Apply an edit script to a program's layout on one page and save it
    EditLayout {
        program: String,
        #[arg(long, default_value = "overview")]
        page: EnrollmentPage,
        #[arg(long)]
        edits: PathBuf,
    },
    /// Delete a program's layouts from every page
    DeleteLayout { program: String },
    /// List form-field configurations grouped by program
    Forms,
    /// Show the reconciled form-field configuration of one context
    ShowForm {
        context: String,
        /// Skip the catalog lookup when the metadata type is known
        #[arg(long = "type")]
        metadata_type: Option<MetadataType>,
    },
    /// Replace one context's form-field configuration with the record in a JSON file
    SetForm {
        context: String,
        #[arg(long = "type")]
        metadata_type: Option<MetadataType>,
        #[arg(long)]
        file: PathBuf,
    },
    /// Apply an edit script to one context's form-field configuration and save it
    EditForm {
        context: String,
        #[arg(long = "type")]
        metadata_type: Option<MetadataType>,
        #[arg(long)]
        edits: PathBuf,
    },
    /// Check a form-field configuration, optionally after an edit script, without saving
    ValidateForm {
        context: String,
        #[arg(long = "type")]
        metadata_type: Option<MetadataType>,
        #[arg(long)]
        edits: Option<PathBuf>,
    },
    /// Delete one context's form-field configuration
    DeleteForm { context: String },
    /// Print a stored document as JSON
    Export { document: String },
}

/// Turn a library error into the message an administrator should see.
fn report(action: &'static str) -> impl Fn(ConfigError) -> anyhow::Error {
    move |e| {
        tracing::debug!(kind = classify(&e).as_str(), "{action} failed: {e}");
        anyhow!(user_message(&e, action))
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn read_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    serde_json::from_str(&read_file(path)?).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn read_form_edits(path: &Path) -> anyhow::Result<Vec<FormEdit>> {
    parse_form_edits(&read_file(path)?).map_err(report("read the edit script"))
}

/// The `--type` flag, or the catalog's answer for `context`.
async fn context_type(
    client: &Dhis2Client,
    context: &str,
    metadata_type: Option<MetadataType>,
) -> anyhow::Result<MetadataType> {
    if let Some(t) = metadata_type {
        return Ok(t);
    }
    let catalog = MetadataCatalog::fetch(client)
        .await
        .map_err(report("load metadata"))?;
    Ok(catalog
        .resolve_context(context)
        .map_err(report("load metadata"))?
        .metadata_type)
}

pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_app_config();
    cli.connection.apply(&mut config);
    config.validate().map_err(|e| anyhow!("Invalid configuration: {e}"))?;
    crate::app_logger::init(&config.log_filter);

    let client = Dhis2Client::from_config(&config).map_err(report("connect"))?;
    let store = HttpDataStore::new(client.clone(), config.namespace.clone());
    let repo = DocumentRepository::new(store);
    tracing::debug!(base_url = %config.base_url, namespace = %config.namespace, "Connected");

    run_command(cli.command, &config, &client, &repo).await
}

pub(crate) async fn run_command<S: DataStore>(
    command: Command,
    config: &AppConfig,
    client: &Dhis2Client,
    repo: &DocumentRepository<S>,
) -> anyhow::Result<()> {
    match command {
        Command::Configure => {
            save_app_config(config).map_err(|e| anyhow!(e))?;
            println!("Saved configuration to {}", crate::config::config_dir().display());
        }
        Command::Provision => {
            let created = ensure_keys(repo.store())
                .await
                .map_err(report("create data store keys"))?;
            if created.is_empty() {
                println!("All configuration documents already exist");
            } else {
                for key in created {
                    println!("created {key}");
                }
            }
        }
        Command::Layouts => {
            let (catalog, documents) = tokio::try_join!(
                MetadataCatalog::fetch(client),
                load_enrollment_documents(repo),
            )
            .map_err(report("load enrollment layouts"))?;
            for record in enrollment_records(&documents, &catalog) {
                let name = record.display_name.as_deref().unwrap_or("(unknown program)");
                println!("{}  {name}", record.program_id);
                for (page, status) in &record.pages {
                    println!(
                        "    {page:<10} defined={} valid={}",
                        yes_no(status.defined),
                        yes_no(status.valid)
                    );
                }
            }
        }
        Command::ShowLayout { program, page } => {
            let editor = open_layout_editor(client, repo, &program, page)
                .await
                .map_err(report("load the enrollment layout"))?;
            print_json(&editor.layout.to_page_layout())?;
        }
        Command::SetLayout { program, page, file } => {
            let record = PageLayout::from_value(&read_json(&file)?).map_err(report("read the layout record"))?;
            let editor = import_layout_editor(client, &program, page, &record)
                .await
                .map_err(report("load the enrollment layout"))?;
            let saved = save_layout_edits(repo, &program, editor.layout, &[])
                .await
                .map_err(report("save enrollment layout"))?;
            print_json(&saved)?;
        }
        Command::EditLayout { program, page, edits } => {
            let edits = parse_layout_edits(&read_file(&edits)?).map_err(report("read the edit script"))?;
            let editor = open_layout_editor(client, repo, &program, page)
                .await
                .map_err(report("load the enrollment layout"))?;
            let saved = save_layout_edits(repo, &program, editor.layout, &edits)
                .await
                .map_err(report("save enrollment layout"))?;
            print_json(&saved)?;
        }
        Command::DeleteLayout { program } => {
            let deleted = delete_layouts(repo, &program)
                .await
                .map_err(report("delete enrollment configuration"))?;
            if deleted.is_empty() {
                println!("No layouts stored for {program}");
            }
            for page in deleted {
                println!("deleted {program} from {}", page.datastore_key());
            }
        }
        Command::Forms => {
            let catalog = MetadataCatalog::fetch(client)
                .await
                .map_err(report("load metadata"))?;
            let groups = load_form_field_groups(repo, &catalog)
                .await
                .map_err(report("load form field configurations"))?;
            for group in groups {
                println!("{}  {}", group.owner.id, group.owner.display_name);
                for record in group.records {
                    println!(
                        "    {} {} ({}) sections={} plugins={} valid={}",
                        record.context.id,
                        record.context.display_name,
                        record.context.metadata_type.label(),
                        record.sections,
                        record.plugins,
                        yes_no(record.valid)
                    );
                }
            }
        }
        Command::ShowForm {
            context,
            metadata_type,
        } => {
            let metadata_type = context_type(client, &context, metadata_type).await?;
            let controller = open_form_field_editor(client, repo, &context, metadata_type)
                .await
                .map_err(report("load the form field configuration"))?;
            let payload = build_context_payload(&controller).map_err(report("build the form"))?;
            print_json(&payload)?;
        }
        Command::SetForm {
            context,
            metadata_type,
            file,
        } => {
            let record = parse_context_form(&read_json(&file)?).map_err(report("read the form record"))?;
            let metadata_type = context_type(client, &context, metadata_type).await?;
            let controller = import_form_field_editor(client, &context, metadata_type, &record)
                .await
                .map_err(report("load the form field configuration"))?;
            let saved = save_form_edits(repo, &context, controller, &[])
                .await
                .map_err(report("save form field configuration"))?;
            print_json(&saved)?;
        }
        Command::EditForm {
            context,
            metadata_type,
            edits,
        } => {
            let edits = read_form_edits(&edits)?;
            let metadata_type = context_type(client, &context, metadata_type).await?;
            let controller = open_form_field_editor(client, repo, &context, metadata_type)
                .await
                .map_err(report("load the form field configuration"))?;
            let saved = save_form_edits(repo, &context, controller, &edits)
                .await
                .map_err(report("save form field configuration"))?;
            print_json(&saved)?;
        }
        Command::ValidateForm {
            context,
            metadata_type,
            edits,
        } => {
            let edits = match edits {
                Some(path) => read_form_edits(&path)?,
                None => Vec::new(),
            };
            let metadata_type = context_type(client, &context, metadata_type).await?;
            let controller = open_form_field_editor(client, repo, &context, metadata_type)
                .await
                .map_err(report("load the form field configuration"))?;
            validate_form_edits(controller, &edits).map_err(report("validate the form"))?;
            println!("Validation successful - no errors found");
        }
        Command::DeleteForm { context } => {
            let deleted = delete_form_config(repo, &context)
                .await
                .map_err(report("delete form field configuration"))?;
            if deleted {
                println!("deleted form field configuration of {context}");
            } else {
                println!("No form field configuration stored for {context}");
            }
        }
        Command::Export { document } => {
            let value = repo
                .store()
                .read(&document)
                .await
                .map_err(report("read the document"))?
                .with_context(|| format!("Document '{document}' does not exist"))?;
            print_json(&value)?;
        }
    }
    Ok(())
}
