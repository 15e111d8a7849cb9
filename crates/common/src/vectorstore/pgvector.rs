//! PostgreSQL vectorstore using the pgvector extension
//!
//! Uses the LangChain PGVector table layout so existing collections can be
//! attached to as-is:
//! - `langchain_pg_collection(uuid, name, cmetadata)`
//! - `langchain_pg_embedding(id, collection_id, embedding, document, cmetadata)`

use super::{vector_literal, Document, ScoredDocument, VectorStore};
use crate::config::Settings;
use crate::db::DbPool;
use crate::embeddings::Embedder;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DbBackend, Statement, TransactionTrait};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const CREATE_EXTENSION: &str = "CREATE EXTENSION IF NOT EXISTS vector";

const CREATE_COLLECTION_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS langchain_pg_collection (
        uuid UUID PRIMARY KEY,
        name VARCHAR NOT NULL,
        cmetadata JSON
    )
"#;

const CREATE_EMBEDDING_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS langchain_pg_embedding (
        id VARCHAR PRIMARY KEY,
        collection_id UUID REFERENCES langchain_pg_collection (uuid) ON DELETE CASCADE,
        embedding VECTOR,
        document VARCHAR,
        cmetadata JSONB
    )
"#;

/// Vectorstore bound to one named collection
pub struct PgVectorStore {
    db: DbPool,
    embedder: Arc<dyn Embedder>,
    collection_name: String,
    collection_id: Uuid,
}

impl PgVectorStore {
    /// Ensure the schema and collection exist, then attach to the collection
    pub async fn initialize(
        db: DbPool,
        embedder: Arc<dyn Embedder>,
        collection_name: &str,
    ) -> Result<Self> {
        let conn = db.conn();

        conn.execute_unprepared(CREATE_EXTENSION).await?;
        conn.execute_unprepared(CREATE_COLLECTION_TABLE).await?;
        conn.execute_unprepared(CREATE_EMBEDDING_TABLE).await?;

        let existing = conn
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT uuid FROM langchain_pg_collection WHERE name = $1",
                vec![collection_name.into()],
            ))
            .await?;

        let collection_id = match existing {
            Some(row) => row.try_get::<Uuid>("", "uuid")?,
            None => {
                let id = Uuid::new_v4();
                conn.execute(Statement::from_sql_and_values(
                    DbBackend::Postgres,
                    "INSERT INTO langchain_pg_collection (uuid, name, cmetadata) VALUES ($1, $2, NULL)",
                    vec![id.into(), collection_name.into()],
                ))
                .await?;
                info!(collection = collection_name, %id, "Created vector collection");
                id
            }
        };

        info!(
            collection = collection_name,
            %collection_id,
            embedding_model = embedder.model_name(),
            "Vectorstore ready"
        );

        Ok(Self {
            db,
            embedder,
            collection_name: collection_name.to_string(),
            collection_id,
        })
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let embedding = self.embedder.embed(query).await?;

        let sql = r#"
            SELECT
                document,
                cmetadata,
                1 - (embedding <=> $1::vector) AS score
            FROM langchain_pg_embedding
            WHERE collection_id = $2
            ORDER BY embedding <=> $1::vector
            LIMIT $3
        "#;

        let rows = self
            .db
            .conn()
            .query_all(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                vec![
                    vector_literal(&embedding).into(),
                    self.collection_id.into(),
                    (k as i64).into(),
                ],
            ))
            .await
            .map_err(|e| AppError::VectorStore {
                message: format!("Similarity search failed: {}", e),
            })?;

        let results = rows
            .iter()
            .map(|row| {
                let content: Option<String> = row.try_get("", "document").unwrap_or_default();
                let metadata: Option<serde_json::Value> =
                    row.try_get("", "cmetadata").unwrap_or_default();
                let score: Option<f64> = row.try_get("", "score").unwrap_or_default();

                let mut document = Document::new(content.unwrap_or_default());
                if let Some(metadata) = metadata {
                    document.metadata = metadata;
                }
                ScoredDocument {
                    document,
                    // Zero-norm embeddings give NaN cosine distances
                    score: score.filter(|s| s.is_finite()).unwrap_or(0.0),
                }
            })
            .collect();

        Ok(results)
    }

    async fn add_documents(&self, documents: &[Document]) -> Result<Vec<String>> {
        let texts: Vec<String> = documents.iter().map(|d| d.page_content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let mut ids = Vec::with_capacity(documents.len());

        // All rows land together or none do; dropping the transaction on
        // error rolls it back.
        let txn = self.db.conn().begin().await?;

        for (document, embedding) in documents.iter().zip(embeddings) {
            let id = Uuid::new_v4().to_string();

            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                r#"
                INSERT INTO langchain_pg_embedding (
                    id, collection_id, embedding, document, cmetadata
                )
                VALUES ($1, $2, $3::vector, $4, $5)
                "#,
                vec![
                    id.clone().into(),
                    self.collection_id.into(),
                    vector_literal(&embedding).into(),
                    document.page_content.clone().into(),
                    document.metadata.clone().into(),
                ],
            );

            txn.execute(stmt).await?;
            ids.push(id);
        }

        txn.commit().await?;

        info!(
            collection = %self.collection_name,
            count = ids.len(),
            "Documents added"
        );

        Ok(ids)
    }
}

/// Connect the pool and attach to the configured collection
pub async fn initialize_vectorstore(
    settings: &Settings,
    embedder: Arc<dyn Embedder>,
) -> Result<PgVectorStore> {
    let db = DbPool::new(settings).await?;
    db.ping().await?;
    PgVectorStore::initialize(db, embedder, &settings.collection_name).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbedder;
    use sea_orm::{DatabaseConnection, DbErr, MockDatabase, MockExecResult};

    fn inserted() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    fn store_on(conn: Arc<DatabaseConnection>) -> PgVectorStore {
        PgVectorStore {
            db: DbPool::from_connection(conn),
            embedder: Arc::new(HashEmbedder::new(16)),
            collection_name: "documents".to_string(),
            collection_id: Uuid::new_v4(),
        }
    }

    fn docs() -> Vec<Document> {
        vec![Document::new("first"), Document::new("second")]
    }

    #[tokio::test]
    async fn test_add_documents_commits_one_transaction() {
        let conn = MockDatabase::new(DbBackend::Postgres)
            .append_exec_results([inserted(), inserted()])
            .into_connection();
        let conn = Arc::new(conn);
        let store = store_on(conn.clone());

        let ids = store.add_documents(&docs()).await.unwrap();
        assert_eq!(ids.len(), 2);

        drop(store);
        let conn = Arc::try_unwrap(conn).expect("store dropped");
        let log = conn.into_transaction_log();
        assert_eq!(log.len(), 1, "both inserts share a single transaction");
        let rendered = format!("{:?}", log);
        assert_eq!(rendered.matches("INSERT INTO langchain_pg_embedding").count(), 2);
        assert!(rendered.contains("COMMIT"));
    }

    #[tokio::test]
    async fn test_failed_insert_commits_nothing() {
        let conn = MockDatabase::new(DbBackend::Postgres)
            .append_exec_results([inserted()])
            .append_exec_errors([DbErr::Custom("invalid input for type json".into())])
            .into_connection();
        let conn = Arc::new(conn);
        let store = store_on(conn.clone());

        let err = store.add_documents(&docs()).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));

        drop(store);
        let conn = Arc::try_unwrap(conn).expect("store dropped");
        let rendered = format!("{:?}", conn.into_transaction_log());
        assert!(!rendered.contains("COMMIT"));
    }
}
