//! The evidence-store seam: how the pipeline asks for statute passages.

use async_trait::async_trait;
use nomu_core::law::{EXCLUDE_CHAPTERS_MAIN, EXCLUDE_SECTIONS_MAIN};
use nomu_core::{ArticleId, EvidenceRecord};

use crate::StoreError;

/// One ranked search over the corpus.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: usize,
    /// Allowed sources; empty means unrestricted.
    pub filter_sources: Vec<String>,
    pub exclude_sections: Vec<String>,
    pub exclude_chapters: Vec<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, top_k: usize) -> Self {
        Self {
            query: query.into(),
            top_k,
            ..Self::default()
        }
    }

    pub fn sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter_sources = sources.into_iter().map(Into::into).collect();
        self
    }

    /// Drop penalties, supplementary provisions, and the general chapter.
    pub fn excluding_main(mut self) -> Self {
        self.exclude_sections = EXCLUDE_SECTIONS_MAIN.iter().map(|s| s.to_string()).collect();
        self.exclude_chapters = EXCLUDE_CHAPTERS_MAIN.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Whether `record` passes the source filter and exclusions.
    pub fn admits(&self, record: &EvidenceRecord) -> bool {
        if !self.filter_sources.is_empty() && !self.filter_sources.contains(&record.source) {
            return false;
        }
        if self.exclude_sections.iter().any(|s| s == record.section.trim()) {
            return false;
        }
        !self.exclude_chapters.iter().any(|c| c == record.chapter.trim())
    }
}

/// Ranked retrieval over statute passages.
///
/// Implementations are shared read-only across sessions.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Nearest passages to `request.query`, closest first.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<EvidenceRecord>, StoreError>;

    /// Every passage for the given articles; `sources` empty means any source.
    async fn search_by_article_ids(
        &self,
        ids: &[ArticleId],
        sources: &[String],
    ) -> Result<Vec<EvidenceRecord>, StoreError>;
}

/// Turns query text into a vector for stores that search by embedding.
#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, StoreError>;
}
