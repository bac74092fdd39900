//! SQLite record store with migrations
//!
//! Holds uploaded documents, their requirement rows and one embedding per entry.
//! Corpus order (the ranker's tie-break order) is insertion order, i.e. `rowid`.

use super::RecordStore;
use crate::error::{Result, RfpError};
use crate::records::{
    is_usable_requirement, DocumentInfo, EffortRequired, EmbeddingEntry, QueryFilters,
    RecordMetadata, RequirementCategory, RequirementRecord, ResponseCategory,
};
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};
use std::path::Path;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Database manager with migration support
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (or create) the database file and run pending migrations
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RfpError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(8)
            .build(manager)
            .map_err(|e| RfpError::Pool(format!("Failed to create connection pool: {}", e)))?;

        Self::from_pool(pool, true)
    }

    /// Private in-memory database, mostly for tests and one-shot imports
    pub fn in_memory() -> Result<Self> {
        // every in-memory connection is its own database, so keep exactly one
        let pool = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())
            .map_err(|e| RfpError::Pool(format!("Failed to create connection pool: {}", e)))?;

        Self::from_pool(pool, false)
    }

    fn from_pool(pool: DbPool, wal: bool) -> Result<Self> {
        {
            let conn = pool
                .get()
                .map_err(|e| RfpError::Pool(format!("Failed to get connection: {}", e)))?;
            if wal {
                conn.execute_batch(
                    "
                    PRAGMA journal_mode = WAL;
                    PRAGMA synchronous = NORMAL;
                    PRAGMA busy_timeout = 5000;
                    ",
                )?;
            }
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        }

        let db = Self { pool };
        db.migrate()?;
        Ok(db)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| RfpError::Pool(format!("Failed to get connection: {}", e)))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )?;

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying migration {}", version);
                conn.execute_batch(migration)?;
                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    /// Register an uploaded document
    pub fn insert_document(&self, document: &DocumentInfo) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO documents (id, file_name, rfp_name, bank_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                document.id,
                document.file_name,
                document.rfp_name,
                document.bank_name,
                document.created_at
            ],
        )?;
        Ok(())
    }

    /// Store requirement rows; rows whose requirement is too short are skipped
    ///
    /// Returns the number of rows actually stored.
    pub fn insert_records(&self, records: &[RequirementRecord]) -> Result<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut stored = 0;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO requirements (id, document_id, product, requirement,
                    requirement_category, response_category, effort_required, comments,
                    sheet_name, file_name, rfp_name, bank_name, date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;

            for record in records {
                let f = &record.fields;
                if !is_usable_requirement(&f.requirement) {
                    tracing::warn!("Skipping record {}: requirement too short", record.id);
                    continue;
                }

                stmt.execute(params![
                    record.id,
                    record.document_id,
                    f.product,
                    f.requirement.trim(),
                    f.requirement_category.as_str(),
                    f.response_category.as_str(),
                    f.effort_required.as_ref().map(|e| e.as_str().to_string()),
                    f.comments,
                    f.sheet_name,
                    f.file_name,
                    f.rfp_name,
                    f.bank_name,
                    f.date
                ])?;
                stored += 1;
            }
        }

        tx.commit()?;
        Ok(stored)
    }

    /// Insert or replace the embedding for `entry.entry_id`
    ///
    /// Replacing keeps the entry's position in corpus order.
    pub fn upsert_embedding(&self, entry: &EmbeddingEntry, model: &str) -> Result<()> {
        let conn = self.get_conn()?;
        let metadata = serde_json::to_string(&entry.metadata).map_err(|e| RfpError::Json {
            source: e,
            context: format!("Failed to encode metadata for {}", entry.entry_id),
        })?;

        conn.execute(
            "INSERT INTO embeddings (entry_id, document_id, vector, dimension, model,
                product, response_category, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(entry_id) DO UPDATE SET
                document_id = excluded.document_id,
                vector = excluded.vector,
                dimension = excluded.dimension,
                model = excluded.model,
                product = excluded.product,
                response_category = excluded.response_category,
                metadata = excluded.metadata,
                created_at = excluded.created_at",
            params![
                entry.entry_id,
                entry.document_id,
                encode_vector(&entry.vector),
                entry.vector.len() as i64,
                model,
                entry.metadata.product,
                entry.metadata.response_category.as_str(),
                metadata,
                entry.created_at
            ],
        )?;
        Ok(())
    }

    /// Records that have no embedding yet, in corpus order
    pub fn records_missing_embeddings(&self) -> Result<Vec<RequirementRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM requirements r
             WHERE NOT EXISTS (SELECT 1 FROM embeddings e WHERE e.entry_id = r.id)
             ORDER BY r.rowid",
            RECORD_COLUMNS
        ))?;
        let records = stmt
            .query_map([], record_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Delete a document together with its records and embeddings
    pub fn delete_document(&self, document_id: &str) -> Result<()> {
        let conn = self.get_conn()?;
        let deleted = conn.execute("DELETE FROM documents WHERE id = ?1", params![document_id])?;
        if deleted == 0 {
            return Err(RfpError::DocumentNotFound {
                id: document_id.to_string(),
            });
        }
        tracing::info!("Deleted document {}", document_id);
        Ok(())
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.get_conn()?;

        let document_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        let record_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM requirements", [], |row| row.get(0))?;
        let embedding_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;

        let mut stmt = conn.prepare(
            "SELECT product, COUNT(*) AS n FROM requirements
             GROUP BY product ORDER BY n DESC, product ASC",
        )?;
        let product_distribution = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(StoreStats {
            document_count: document_count as usize,
            record_count: record_count as usize,
            embedding_count: embedding_count as usize,
            product_distribution,
        })
    }
}

impl RecordStore for Database {
    fn list_embeddings(&self, filters: Option<&QueryFilters>) -> Result<Vec<EmbeddingEntry>> {
        let conn = self.get_conn()?;
        let (clause, values) = filter_clause(filters, "product", "response_category");
        let mut stmt = conn.prepare(&format!(
            "SELECT entry_id, document_id, vector, metadata, created_at
             FROM embeddings{} ORDER BY rowid",
            clause
        ))?;

        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, DateTime<Utc>>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(entry_id, document_id, blob, metadata, created_at)| {
                let metadata: RecordMetadata =
                    serde_json::from_str(&metadata).map_err(|e| RfpError::Json {
                        source: e,
                        context: format!("Corrupt metadata for embedding {}", entry_id),
                    })?;
                Ok(EmbeddingEntry {
                    entry_id,
                    document_id,
                    vector: decode_vector(&blob),
                    metadata,
                    created_at,
                })
            })
            .collect()
    }

    fn list_records(&self, filters: Option<&QueryFilters>) -> Result<Vec<RequirementRecord>> {
        let conn = self.get_conn()?;
        let (clause, values) = filter_clause(filters, "product", "response_category");
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM requirements{} ORDER BY rowid",
            RECORD_COLUMNS, clause
        ))?;
        let records = stmt
            .query_map(params_from_iter(values), record_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub document_count: usize,
    pub record_count: usize,
    pub embedding_count: usize,
    pub product_distribution: Vec<(String, usize)>,
}

const RECORD_COLUMNS: &str = "id, document_id, product, requirement, requirement_category,
    response_category, effort_required, comments, sheet_name, file_name, rfp_name,
    bank_name, date";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<RequirementRecord> {
    Ok(RequirementRecord {
        id: row.get(0)?,
        document_id: row.get(1)?,
        fields: RecordMetadata {
            product: row.get(2)?,
            requirement: row.get(3)?,
            requirement_category: RequirementCategory::from(row.get::<_, String>(4)?),
            response_category: ResponseCategory::from(row.get::<_, String>(5)?),
            effort_required: row.get::<_, Option<String>>(6)?.map(EffortRequired::from),
            comments: row.get(7)?,
            sheet_name: row.get(8)?,
            file_name: row.get(9)?,
            rfp_name: row.get(10)?,
            bank_name: row.get(11)?,
            date: row.get(12)?,
        },
    })
}

/// Build a `WHERE` clause restricting the two filterable columns
fn filter_clause(
    filters: Option<&QueryFilters>,
    product_col: &str,
    category_col: &str,
) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if let Some(filters) = filters {
        for (column, allowed) in [
            (product_col, &filters.products),
            (category_col, &filters.response_categories),
        ] {
            if allowed.is_empty() {
                continue;
            }
            let placeholders = vec!["?"; allowed.len()].join(", ");
            conditions.push(format!("{} IN ({})", column, placeholders));
            values.extend(allowed.iter().cloned().map(Value::Text));
        }
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    CREATE TABLE documents (
        id TEXT PRIMARY KEY,
        file_name TEXT NOT NULL,
        rfp_name TEXT NOT NULL,
        bank_name TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE requirements (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        product TEXT NOT NULL,
        requirement TEXT NOT NULL CHECK (length(trim(requirement)) >= 3),
        requirement_category TEXT NOT NULL,
        response_category TEXT NOT NULL,
        effort_required TEXT,
        comments TEXT,
        sheet_name TEXT NOT NULL,
        file_name TEXT NOT NULL,
        rfp_name TEXT NOT NULL,
        bank_name TEXT NOT NULL,
        date TEXT NOT NULL,
        FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
    );

    CREATE INDEX idx_requirements_document ON requirements(document_id);
    CREATE INDEX idx_requirements_product ON requirements(product);

    CREATE TABLE embeddings (
        entry_id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        vector BLOB NOT NULL,
        dimension INTEGER NOT NULL,
        model TEXT NOT NULL,
        product TEXT NOT NULL,
        response_category TEXT NOT NULL,
        metadata TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
    );

    CREATE INDEX idx_embeddings_document ON embeddings(document_id);
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{sample_metadata, RowDraft};
    use tempfile::TempDir;

    fn document(id: &str) -> DocumentInfo {
        DocumentInfo {
            id: id.to_string(),
            file_name: "rfp.xlsx".to_string(),
            rfp_name: "Core Banking RFP".to_string(),
            bank_name: "Acme Bank".to_string(),
            created_at: Utc::now(),
        }
    }

    fn record(id: &str, doc: &str, product: &str, text: &str) -> RequirementRecord {
        RequirementRecord {
            id: id.to_string(),
            document_id: doc.to_string(),
            fields: sample_metadata(product, text),
        }
    }

    fn seeded() -> Database {
        let db = Database::in_memory().unwrap();
        db.insert_document(&document("doc-1")).unwrap();
        db.insert_records(&[
            record("r1", "doc-1", "Core", "Supports SMS alerts"),
            record("r2", "doc-1", "Cards", "Card hotlisting via IVR"),
            record("r3", "doc-1", "Core", "Daily interest accrual"),
        ])
        .unwrap();
        db
    }

    #[test]
    fn test_database_creation() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("test.db");

        let _db = Database::new(&db_path).unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn test_migrations() {
        let db = Database::in_memory().unwrap();
        let conn = db.get_conn().unwrap();
        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM _migrations", [], |row| row.get(0))
            .unwrap();

        assert_eq!(version, MIGRATIONS.len() as i32);
    }

    #[test]
    fn test_short_records_skipped() {
        let db = Database::in_memory().unwrap();
        db.insert_document(&document("doc-1")).unwrap();
        let stored = db
            .insert_records(&[
                record("r1", "doc-1", "Core", "ok?"),
                record("r2", "doc-1", "Core", " x "),
                record("r3", "doc-1", "Core", "Unnamed: 1: | Unnamed: 2:"),
                record("r4", "doc-1", "Core", "Unnamed: 3: ab"),
            ])
            .unwrap();
        assert_eq!(stored, 1);
        assert_eq!(db.list_records(None).unwrap()[0].id, "r1");
    }

    #[test]
    fn test_list_records_in_insertion_order_with_filters() {
        let db = seeded();

        let all = db.list_records(None).unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2", "r3"]);

        let filters = QueryFilters {
            products: vec!["Core".to_string()],
            response_categories: vec![],
        };
        let core = db.list_records(Some(&filters)).unwrap();
        assert_eq!(core.len(), 2);
        assert!(core.iter().all(|r| r.fields.product == "Core"));
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let db = seeded();
        let records = db.list_records(None).unwrap();
        for r in &records {
            db.upsert_embedding(&EmbeddingEntry::for_record(r, vec![1.0, 0.0]), "test")
                .unwrap();
        }

        db.upsert_embedding(
            &EmbeddingEntry::for_record(&records[0], vec![0.0, 1.0]),
            "test",
        )
        .unwrap();

        let entries = db.list_embeddings(None).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].entry_id, "r1");
        assert_eq!(entries[0].vector, vec![0.0, 1.0]);
        assert_eq!(entries[1].metadata.product, "Cards");
    }

    #[test]
    fn test_missing_embeddings() {
        let db = seeded();
        let records = db.list_records(None).unwrap();
        db.upsert_embedding(&EmbeddingEntry::for_record(&records[1], vec![1.0]), "test")
            .unwrap();

        let missing = db.records_missing_embeddings().unwrap();
        let ids: Vec<&str> = missing.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r3"]);
    }

    #[test]
    fn test_delete_document_cascades() {
        let db = seeded();
        db.insert_document(&document("doc-2")).unwrap();
        let kept = RowDraft {
            requirement: Some("Mobile banking app".to_string()),
            ..Default::default()
        }
        .into_record(&document("doc-2"))
        .unwrap();
        db.insert_records(&[kept.clone()]).unwrap();

        for r in db.list_records(None).unwrap() {
            db.upsert_embedding(&EmbeddingEntry::for_record(&r, vec![1.0]), "test")
                .unwrap();
        }

        db.delete_document("doc-1").unwrap();

        let records = db.list_records(None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, kept.id);
        assert_eq!(db.list_embeddings(None).unwrap().len(), 1);

        assert!(matches!(
            db.delete_document("doc-1"),
            Err(RfpError::DocumentNotFound { .. })
        ));
    }

    #[test]
    fn test_stats() {
        let db = seeded();
        let stats = db.stats().unwrap();
        assert_eq!(stats.document_count, 1);
        assert_eq!(stats.record_count, 3);
        assert_eq!(stats.embedding_count, 0);
        assert_eq!(stats.product_distribution[0], ("Core".to_string(), 2));
    }

    #[test]
    fn test_vector_encoding() {
        let vector = vec![0.5f32, -1.25, 3.0];
        assert_eq!(decode_vector(&encode_vector(&vector)), vector);
    }
}
