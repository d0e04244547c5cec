//! SurrealDB-backed DocumentStore implementation
//!
//! Documents are stored as rows of the `documents` table. The full document
//! is kept as a JSON body next to the indexed `doc_id` and `identifier`
//! columns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::document::{Action, Document};
use crate::error::{StateError, StorageError};
use crate::migrations;
use crate::storage_traits::{require_id, DocumentStore, StorageResult};

/// Serialize chrono DateTime as a SurrealDB datetime
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// One row of the `documents` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocumentRow {
    doc_id: String,
    identifier: String,
    resource_type: String,
    body: serde_json::Value,
    #[serde(with = "surreal_datetime")]
    created_at: DateTime<Utc>,
    #[serde(with = "surreal_datetime")]
    modified_at: DateTime<Utc>,
}

impl DocumentRow {
    fn from_document(doc_id: String, document: &Document) -> StorageResult<Self> {
        let now = Utc::now();
        Ok(Self {
            doc_id,
            identifier: document.resource.identifier.clone(),
            resource_type: document.resource.resource_type.clone(),
            body: serde_json::to_value(document)?,
            created_at: document.created.as_ref().map(|a| a.date).unwrap_or(now),
            modified_at: document.modified.last().map(|a| a.date).unwrap_or(now),
        })
    }

    fn into_document(self) -> StorageResult<Document> {
        Ok(serde_json::from_value(self.body)?)
    }
}

/// SurrealDB-backed implementation of [`DocumentStore`].
pub struct SurrealDocumentStore {
    db: Surreal<Any>,
}

impl SurrealDocumentStore {
    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> crate::Result<Self> {
        Self::connect(&StoreConfig::in_memory()).await
    }

    /// Connect with an explicit configuration and initialize the schema.
    pub async fn connect(config: &StoreConfig) -> crate::Result<Self> {
        if let Some(path) = config.url.strip_prefix("surrealkv://") {
            std::fs::create_dir_all(path).map_err(|e| {
                StateError::Connection(format!(
                    "Failed to create database directory {}: {}",
                    path, e
                ))
            })?;
        }

        let db = surrealdb::engine::any::connect(&config.url)
            .await
            .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", config.url, e)))?;

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        migrations::init_schema(&db)
            .await
            .map_err(|e| StateError::SchemaSetup(e.to_string()))?;

        info!(url = %config.url, "SurrealDocumentStore connected");
        Ok(Self { db })
    }

    // -- private helpers -----------------------------------------------------

    /// Fetch at most one row matching `column = value`.
    async fn fetch_row(&self, column: &str, value: &str) -> StorageResult<Option<DocumentRow>> {
        let sql = format!("SELECT * FROM documents WHERE {column} = $value");
        let mut res = self
            .db
            .query(sql)
            .bind(("value", value.to_string()))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<DocumentRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(rows.into_iter().next())
    }

    async fn overwrite(&self, id: String, document: &Document) -> StorageResult<()> {
        let row = DocumentRow::from_document(id.clone(), document)?;
        self.db
            .query("UPDATE documents CONTENT $row WHERE doc_id = $id")
            .bind(("row", row))
            .bind(("id", id))
            .await
            .and_then(|res| res.check())
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SurrealDocumentStore {
    async fn get(&self, id: &str) -> StorageResult<Document> {
        self.fetch_row("doc_id", id)
            .await?
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })?
            .into_document()
    }

    async fn find_by_identifier(&self, identifier: &str) -> StorageResult<Option<Document>> {
        self.fetch_row("identifier", identifier)
            .await?
            .map(DocumentRow::into_document)
            .transpose()
    }

    async fn create(&self, mut document: Document, user: &str) -> StorageResult<Document> {
        let id = require_id(&document)?;
        if self.fetch_row("doc_id", &id).await?.is_some() {
            return Err(StorageError::Duplicate { id });
        }
        document.resource.id = Some(id.clone());
        document.created = Some(Action::now(user));

        debug!(doc_id = %id, identifier = %document.resource.identifier, "creating document");

        let row = DocumentRow::from_document(id, &document)?;
        let _created: Option<DocumentRow> = self
            .db
            .create("documents")
            .content(row)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(document)
    }

    async fn update(&self, mut document: Document, user: &str) -> StorageResult<Document> {
        let id = require_id(&document)?;
        if self.fetch_row("doc_id", &id).await?.is_none() {
            return Err(StorageError::NotFound { id });
        }
        document.modified.push(Action::now(user));

        debug!(doc_id = %id, "updating document");
        self.overwrite(id, &document).await?;
        Ok(document)
    }

    async fn restore(&self, document: &Document) -> StorageResult<()> {
        let id = require_id(document)?;
        if self.fetch_row("doc_id", &id).await?.is_none() {
            return Err(StorageError::NotFound { id });
        }

        debug!(doc_id = %id, "restoring document");
        self.overwrite(id, document).await
    }

    async fn remove(&self, document: &Document) -> StorageResult<()> {
        let id = require_id(document)?;
        debug!(doc_id = %id, "removing document");

        self.db
            .query("DELETE documents WHERE doc_id = $id")
            .bind(("id", id))
            .await
            .and_then(|res| res.check())
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn ids(&self) -> StorageResult<Vec<String>> {
        let mut res = self
            .db
            .query("SELECT * FROM documents ORDER BY doc_id ASC")
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<DocumentRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(rows.into_iter().map(|r| r.doc_id).collect())
    }
}
