//! Corpus loading: embed statute passages and write the LanceDB table.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, ensure};
use arrow::array::{ArrayRef, FixedSizeListBuilder, Float32Builder, StringArray};
use arrow::record_batch::RecordBatch;
use nomu_ai::OpenAiClient;
use nomu_core::{EvidenceRecord, corpus};
use nomu_store::{LanceStore, STATUTE_ARTICLES_TABLE};

const EMBED_BATCH_SIZE: usize = 64;

pub struct LoadStats {
    pub total_rows: usize,
    pub embedding_dim: usize,
    pub elapsed_secs: f64,
}

/// Embed every record and (re)create `statute_articles` from the result.
pub async fn run_load_pipeline(
    lance: &LanceStore,
    client: &OpenAiClient,
    records: &[EvidenceRecord],
) -> anyhow::Result<LoadStats> {
    let start = Instant::now();
    let total_rows = records.len();
    ensure!(total_rows > 0, "corpus is empty");

    let mut batches = Vec::with_capacity(total_rows.div_ceil(EMBED_BATCH_SIZE));
    let mut embedding_dim = 0usize;
    let mut processed = 0usize;

    for chunk in records.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<&str> = chunk.iter().map(|r| r.text.as_str()).collect();
        let embeddings = client
            .embed_batch(&texts)
            .await
            .context("generating embeddings")?;
        if embedding_dim == 0 {
            embedding_dim = embeddings.first().map(Vec::len).unwrap_or(0);
        }
        batches.push(build_batch(chunk, &embeddings, embedding_dim)?);

        processed += chunk.len();
        eprint!(
            "\r  Embedded {processed}/{total_rows} ({:.1}%)",
            processed as f64 / total_rows as f64 * 100.0
        );
    }
    eprintln!();

    eprintln!("  Writing to LanceDB...");
    lance
        .create_table_from_batches(STATUTE_ARTICLES_TABLE, batches)
        .await
        .context("writing statute table to LanceDB")?;

    Ok(LoadStats {
        total_rows,
        embedding_dim,
        elapsed_secs: start.elapsed().as_secs_f64(),
    })
}

/// One `statute_articles` batch from records and their embeddings.
pub fn build_batch(
    records: &[EvidenceRecord],
    embeddings: &[Vec<f32>],
    dim: usize,
) -> anyhow::Result<RecordBatch> {
    ensure!(
        records.len() == embeddings.len(),
        "{} records but {} embeddings",
        records.len(),
        embeddings.len()
    );
    let width = i32::try_from(dim).context("embedding width out of range")?;
    ensure!(width > 0, "embedding width is zero");

    let mut emb_builder = FixedSizeListBuilder::new(Float32Builder::new(), width);
    for emb in embeddings {
        ensure!(emb.len() == dim, "embedding width {} differs from {dim}", emb.len());
        emb_builder.values().append_slice(emb);
        emb_builder.append(true);
    }

    let text = StringArray::from_iter_values(records.iter().map(|r| r.text.as_str()));
    let source = StringArray::from_iter_values(records.iter().map(|r| r.source.as_str()));
    let article_id: StringArray = records
        .iter()
        .map(|r| r.article_id.map(|id| id.to_string()))
        .collect();
    let chapter = StringArray::from_iter_values(records.iter().map(|r| r.chapter.as_str()));
    let section = StringArray::from_iter_values(records.iter().map(|r| r.section.as_str()));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(text),
        Arc::new(source),
        Arc::new(article_id),
        Arc::new(chapter),
        Arc::new(section),
        Arc::new(emb_builder.finish()),
    ];
    let schema = Arc::new(corpus::statute_articles_schema(width));
    Ok(RecordBatch::try_new(schema, columns)?)
}
