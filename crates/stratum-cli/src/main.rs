//! Stratum CLI
//!
//! The `stratum` command imports batches of field records into a project
//! store.
//!
//! ## Commands
//!
//! - `import`: validate, resolve and persist a batch all-or-nothing
//! - `validate`: run the per-document checks only, without a store

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use stratum_import::{validate_batch, ErrorTuple, ImportOptions, ImportReport, Importer, ProjectSchema};
use stratum_store::{DocumentStore, StoreConfig, SurrealDocumentStore};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "stratum")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bulk import of field records into a Stratum project", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a batch of records
    Import {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        mode: ModeArgs,

        /// Import every record into this operation
        #[arg(long)]
        operation: Option<String>,

        /// Relation targets are identifiers instead of ids
        #[arg(long)]
        identifiers: bool,

        /// User recorded on created/modified stamps
        #[arg(long, default_value = "anonymous")]
        user: String,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Check records against the schema without touching a store
    Validate {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        mode: ModeArgs,
    },
}

#[derive(Args)]
struct InputArgs {
    /// JSON file holding an array of records (or a single record)
    batch: PathBuf,

    /// Project schema (JSON)
    #[arg(short, long)]
    schema: PathBuf,
}

#[derive(Args)]
struct StoreArgs {
    /// Store URL (overrides STRATUM_DB_URL)
    #[arg(long)]
    db_url: Option<String>,

    /// Namespace (overrides STRATUM_DB_NAMESPACE)
    #[arg(long)]
    namespace: Option<String>,

    /// Database (overrides STRATUM_DB_DATABASE)
    #[arg(long)]
    database: Option<String>,
}

impl StoreArgs {
    fn apply(self, mut config: StoreConfig) -> StoreConfig {
        if let Some(url) = self.db_url {
            config.url = url;
        }
        if let Some(namespace) = self.namespace {
            config = config.with_namespace(namespace);
        }
        if let Some(database) = self.database {
            config = config.with_database(database);
        }
        config
    }
}

#[derive(Args)]
struct ModeArgs {
    /// Update existing resources matched by identifier
    #[arg(long)]
    merge: bool,

    /// With --merge: replace relations and delete fields set to null
    #[arg(long, requires = "merge")]
    permit_deletions: bool,

    /// With --merge: fail on records that match no existing resource
    #[arg(long, requires = "merge")]
    reject_unmatched: bool,
}

impl ModeArgs {
    fn apply(&self, mut options: ImportOptions) -> ImportOptions {
        if self.merge {
            options = options.merge();
        }
        if self.permit_deletions {
            options = options.permit_deletions();
        }
        if self.reject_unmatched {
            options = options.reject_unmatched();
        }
        options
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    stratum_import::init_tracing(cli.json, level);

    match cli.command {
        Commands::Import {
            input,
            mode,
            operation,
            identifiers,
            user,
            store,
        } => {
            let mut options = mode.apply(ImportOptions::new()).with_user(user);
            if let Some(operation) = operation {
                options = options.into_operation(operation);
            }
            if identifiers {
                options = options.with_identifiers();
            }

            let config = store.apply(StoreConfig::from_env());
            if config.is_in_memory() {
                warn!("store is in-memory; imported documents will not outlive this process");
            }
            let store = SurrealDocumentStore::connect(&config)
                .await
                .context("Failed to connect to Stratum store")?;

            let report = cmd_import(&store, &input, options).await?;
            print_json(&report)?;
            Ok(exit_code(report.errors.is_empty()))
        }
        Commands::Validate { input, mode } => {
            let errors = cmd_validate(&input, &mode.apply(ImportOptions::new()))?;
            print_json(&errors)?;
            Ok(exit_code(errors.is_empty()))
        }
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Read a batch file: a JSON array of records or a single record object.
fn load_records(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file: {:?}", path))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse batch file as JSON: {:?}", path))?;
    match value {
        Value::Array(records) => Ok(records),
        record @ Value::Object(_) => Ok(vec![record]),
        _ => bail!("Batch file must hold a JSON array or object: {:?}", path),
    }
}

fn load_schema(path: &Path) -> Result<ProjectSchema> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file: {:?}", path))?;
    ProjectSchema::from_json(&content)
        .with_context(|| format!("Failed to parse project schema: {:?}", path))
}

async fn cmd_import<S>(store: &S, input: &InputArgs, options: ImportOptions) -> Result<ImportReport>
where
    S: DocumentStore + ?Sized,
{
    let records = load_records(&input.batch)?;
    let schema = load_schema(&input.schema)?;
    info!(records = records.len(), merge = options.merge_mode, "importing batch");

    let importer = Importer::new(store, &schema, options);
    Ok(importer.import(records).await)
}

fn cmd_validate(input: &InputArgs, options: &ImportOptions) -> Result<Vec<ErrorTuple>> {
    let records = load_records(&input.batch)?;
    let schema = load_schema(&input.schema)?;
    let count = records.len();
    match validate_batch(records, &schema, options) {
        Ok(_) => {
            info!(records = count, "batch is valid");
            Ok(Vec::new())
        }
        Err(err) => Ok(vec![err.to_tuple()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use stratum_import::ErrorKind;
    use stratum_store::fakes::MemoryDocumentStore;

    const SCHEMA: &str = r#"{
        "types": [
            { "name": "Operation", "fields": [{ "name": "shortDescription" }] },
            { "name": "Trench", "parent": "Operation" }
        ]
    }"#;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn input(dir: &tempfile::TempDir, batch: &str) -> InputArgs {
        InputArgs {
            batch: write_file(dir, "batch.json", batch),
            schema: write_file(dir, "schema.json", SCHEMA),
        }
    }

    #[test]
    fn single_record_file_is_a_batch_of_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "one.json", r#"{"type": "Trench", "identifier": "t1"}"#);
        assert_eq!(load_records(&path).unwrap().len(), 1);
    }

    #[test]
    fn scalar_batch_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "bad.json", "42");
        assert!(load_records(&path).is_err());
    }

    #[test]
    fn mode_flags_map_to_options() {
        let mode = ModeArgs {
            merge: true,
            permit_deletions: true,
            reject_unmatched: false,
        };
        let options = mode.apply(ImportOptions::new());
        assert!(options.may_overwrite_relations());
    }

    #[test]
    fn store_flags_override_environment() {
        let store = StoreArgs {
            db_url: Some("surrealkv://.stratum/db".to_string()),
            namespace: None,
            database: Some("dig-2024".to_string()),
        };
        let config = store.apply(StoreConfig::in_memory());
        assert_eq!(config.url, "surrealkv://.stratum/db");
        assert_eq!(config.namespace, "stratum");
        assert_eq!(config.database, "dig-2024");
    }

    #[test]
    fn validate_reports_error_tuples() {
        let dir = tempfile::tempdir().unwrap();
        let args = input(&dir, r#"[{"type": "Spaceship", "identifier": "s1"}]"#);
        let errors = cmd_validate(&args, &ImportOptions::new()).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::UnknownType);
    }

    #[tokio::test]
    async fn import_against_memory_store() {
        let dir = tempfile::tempdir().unwrap();
        let args = input(
            &dir,
            r#"[{"type": "Trench", "identifier": "t1", "shortDescription": "Our Trench 1"}]"#,
        );
        let store = MemoryDocumentStore::new();
        let report = cmd_import(&store, &args, ImportOptions::new()).await.unwrap();
        assert_eq!(report.created_count, 1);
        assert_eq!(store.len(), 1);
    }
}
