//! SurrealDB schema initialization
//!
//! Sets up the `documents` table with its unique indexes. Safe to call
//! multiple times (idempotent).

use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all Stratum tables in SurrealDB
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing Stratum SurrealDB schema");
    init_documents_table(db).await?;
    info!("Stratum schema initialization complete");
    Ok(())
}

/// Initialize `documents` table with constraints and indexes
///
/// Schema:
/// ```text
/// TABLE documents {
///   doc_id:         STRING (unique)
///   identifier:     STRING (unique)
///   resource_type:  STRING (indexed)
///   body:           OBJECT (serialized Document)
///   created_at:     DATETIME
///   modified_at:    DATETIME
/// }
/// ```
async fn init_documents_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing documents table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS documents SCHEMALESS;

        DEFINE INDEX IF NOT EXISTS idx_doc_id ON TABLE documents COLUMNS doc_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_identifier ON TABLE documents COLUMNS identifier UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_resource_type ON TABLE documents COLUMNS resource_type;
    "#;

    db.query(sql).await?.check()?;
    debug!("documents table initialized");
    Ok(())
}
