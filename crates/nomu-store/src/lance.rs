//! LanceDB storage for statute passages.
//!
//! One table, `statute_articles`, holds article chunks with their embeddings
//! (see [`nomu_core::corpus`]). The table is built offline; this store opens
//! it, optionally (re)creates it from a Parquet export, and serves filtered
//! vector search.

use std::path::Path;
use std::sync::Arc;

use arrow::array::RecordBatchIterator;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use nomu_core::{ArticleId, EvidenceRecord, corpus};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::{debug, info};

use crate::StoreError;
use crate::rows::{article_clause, records_from_batches, where_clause};
use crate::search::{EvidenceStore, QueryEmbedder, SearchRequest};

pub const STATUTE_ARTICLES_TABLE: &str = "statute_articles";

/// Upper bound on chunks fetched per requested article.
const ROWS_PER_ARTICLE: usize = 8;

/// LanceDB-backed evidence store.
pub struct LanceStore {
    db: lancedb::Connection,
    embedder: Arc<dyn QueryEmbedder>,
}

impl LanceStore {
    /// Open (or create) the LanceDB directory at `path`.
    pub async fn open(path: &Path, embedder: Arc<dyn QueryEmbedder>) -> Result<Self, StoreError> {
        let uri = path
            .to_str()
            .ok_or_else(|| StoreError::Other(format!("database path is not UTF-8: {}", path.display())))?;
        let db = lancedb::connect(uri).execute().await?;
        Ok(Self { db, embedder })
    }

    /// Create (or replace) the `statute_articles` table from a Parquet export.
    pub async fn create_statute_articles(&self, parquet_path: &Path) -> Result<(), StoreError> {
        if !parquet_path.exists() {
            return Err(StoreError::ParquetNotFound(parquet_path.to_path_buf()));
        }
        let batches = read_parquet(parquet_path)?;
        self.create_table_from_batches(STATUTE_ARTICLES_TABLE, batches)
            .await
    }

    /// Open the `statute_articles` table.
    pub async fn statute_articles(&self) -> Result<lancedb::Table, StoreError> {
        let table = self
            .db
            .open_table(STATUTE_ARTICLES_TABLE)
            .execute()
            .await?;
        Ok(table)
    }

    /// Count rows in the `statute_articles` table.
    pub async fn statute_articles_count(&self) -> Result<usize, StoreError> {
        let table = self.statute_articles().await?;
        let count = table.count_rows(None).await?;
        Ok(count)
    }

    /// Names of every table in the database.
    pub async fn table_names(&self) -> Result<Vec<String>, StoreError> {
        let names = self.db.table_names().execute().await?;
        Ok(names)
    }

    /// Write `batches` as `table_name`, dropping any table already there.
    pub async fn create_table_from_batches(
        &self,
        table_name: &str,
        batches: Vec<RecordBatch>,
    ) -> Result<(), StoreError> {
        if batches.is_empty() {
            return Err(StoreError::Other(format!("nothing to write to {table_name}")));
        }

        let total_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        let schema = batches[0].schema();
        let reader = RecordBatchIterator::new(batches.into_iter().map(Ok), schema);

        let existing = self.db.table_names().execute().await?;
        if existing.contains(&table_name.to_string()) {
            self.db.drop_table(table_name, &[]).await?;
        }

        self.db
            .create_table(table_name, Box::new(reader))
            .execute()
            .await?;

        info!(
            table = table_name,
            rows = total_rows,
            "table written"
        );
        Ok(())
    }
}

#[async_trait]
impl EvidenceStore for LanceStore {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<EvidenceRecord>, StoreError> {
        if request.top_k == 0 || request.query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed_query(&request.query).await?;
        let table = self.statute_articles().await?;

        let mut query = table
            .vector_search(vector)?
            .column(corpus::EMBEDDING)
            .limit(request.top_k);
        if let Some(filter) = where_clause(request) {
            query = query.only_if(filter);
        }

        let batches: Vec<RecordBatch> = query.execute().await?.try_collect().await?;
        let records = records_from_batches(&batches)?;
        debug!(
            top_k = request.top_k,
            sources = request.filter_sources.len(),
            hits = records.len(),
            "vector search"
        );
        Ok(records)
    }

    async fn search_by_article_ids(
        &self,
        ids: &[ArticleId],
        sources: &[String],
    ) -> Result<Vec<EvidenceRecord>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let table = self.statute_articles().await?;
        let batches: Vec<RecordBatch> = table
            .query()
            .only_if(article_clause(ids, sources))
            .limit(ids.len() * ROWS_PER_ARTICLE * sources.len().max(1))
            .execute()
            .await?
            .try_collect()
            .await?;
        records_from_batches(&batches)
    }
}

/// Every batch of a Parquet export, in file order.
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>, StoreError> {
    let file = std::fs::File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok(batches?)
}
