//! Deadline wrappers for the store and model seams.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nomu_core::{ArticleId, EvidenceRecord};
use nomu_store::{EvidenceStore, SearchRequest, StoreError};
use tokio::time::timeout;

use crate::llm::{LanguageModel, LlmError, Prompt};

/// Evidence store whose calls fail with [`StoreError::Timeout`] past `limit`.
pub struct TimedStore {
    inner: Arc<dyn EvidenceStore>,
    limit: Duration,
}

impl TimedStore {
    pub fn new(inner: Arc<dyn EvidenceStore>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl EvidenceStore for TimedStore {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<EvidenceRecord>, StoreError> {
        timeout(self.limit, self.inner.search(request))
            .await
            .map_err(|_| StoreError::Timeout(self.limit))?
    }

    async fn search_by_article_ids(
        &self,
        ids: &[ArticleId],
        sources: &[String],
    ) -> Result<Vec<EvidenceRecord>, StoreError> {
        timeout(self.limit, self.inner.search_by_article_ids(ids, sources))
            .await
            .map_err(|_| StoreError::Timeout(self.limit))?
    }
}

/// Language model whose calls fail with [`LlmError::Timeout`] past `limit`.
pub struct TimedModel {
    inner: Arc<dyn LanguageModel>,
    limit: Duration,
}

impl TimedModel {
    pub fn new(inner: Arc<dyn LanguageModel>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl LanguageModel for TimedModel {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        timeout(self.limit, self.inner.complete(prompt))
            .await
            .map_err(|_| LlmError::Timeout(self.limit))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stalled;

    #[async_trait]
    impl LanguageModel for Stalled {
        async fn complete(&self, _prompt: &Prompt) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
    }

    #[async_trait]
    impl EvidenceStore for Stalled {
        async fn search(&self, _request: &SearchRequest) -> Result<Vec<EvidenceRecord>, StoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }

        async fn search_by_article_ids(
            &self,
            _ids: &[ArticleId],
            _sources: &[String],
        ) -> Result<Vec<EvidenceRecord>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn model_call_times_out() {
        let model = TimedModel::new(Arc::new(Stalled), Duration::from_millis(20));
        let result = model.complete(&Prompt::new("s", "u")).await;
        assert!(matches!(result, Err(LlmError::Timeout(d)) if d == Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn store_call_times_out() {
        let store = TimedStore::new(Arc::new(Stalled), Duration::from_millis(20));
        let result = store.search(&SearchRequest::new("해고", 3)).await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));
        assert!(store.search_by_article_ids(&[], &[]).await.unwrap().is_empty());
    }
}
