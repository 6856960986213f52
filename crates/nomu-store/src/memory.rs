//! In-memory evidence store with lexical ranking.
//!
//! Ranks passages by character-bigram overlap with the query. Korean words
//! inflect heavily ("해고" / "해고당했어요"), so bigrams match where whole
//! tokens would not. Used for offline runs over a JSON-lines corpus and as
//! the store in tests.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use nomu_core::{ArticleId, EvidenceRecord};
use tracing::info;

use crate::StoreError;
use crate::search::{EvidenceStore, SearchRequest};

pub struct MemoryStore {
    records: Vec<EvidenceRecord>,
    bigrams: Vec<HashSet<(char, char)>>,
}

impl MemoryStore {
    pub fn new(records: Vec<EvidenceRecord>) -> Self {
        let bigrams = records.iter().map(|r| bigrams(&r.text)).collect();
        Self { records, bigrams }
    }

    /// Load a JSON-lines corpus (see [`read_jsonl`]).
    pub fn from_jsonl(path: &Path) -> Result<Self, StoreError> {
        let records = read_jsonl(path)?;
        info!(path = %path.display(), rows = records.len(), "loaded in-memory corpus");
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn score(&self, index: usize, query: &HashSet<(char, char)>) -> f32 {
        if query.is_empty() {
            return 0.0;
        }
        let hits = query.intersection(&self.bigrams[index]).count();
        hits as f32 / query.len() as f32
    }
}

#[async_trait]
impl EvidenceStore for MemoryStore {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<EvidenceRecord>, StoreError> {
        let query = bigrams(&request.query);
        let mut scored: Vec<(f32, usize)> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| request.admits(r))
            .map(|(i, _)| (self.score(i, &query), i))
            .filter(|(s, _)| *s > 0.0)
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });

        Ok(scored
            .into_iter()
            .take(request.top_k)
            .map(|(score, i)| EvidenceRecord {
                distance: 1.0 - score,
                ..self.records[i].clone()
            })
            .collect())
    }

    async fn search_by_article_ids(
        &self,
        ids: &[ArticleId],
        sources: &[String],
    ) -> Result<Vec<EvidenceRecord>, StoreError> {
        let mut out = Vec::new();
        for id in ids {
            out.extend(
                self.records
                    .iter()
                    .filter(|r| r.article_id == Some(*id))
                    .filter(|r| sources.is_empty() || sources.contains(&r.source))
                    .cloned(),
            );
        }
        Ok(out)
    }
}

/// One JSON `EvidenceRecord` per line; blank lines are skipped.
pub fn read_jsonl(path: &Path) -> Result<Vec<EvidenceRecord>, StoreError> {
    let text = std::fs::read_to_string(path)?;
    let mut records = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        records.push(serde_json::from_str(line)?);
    }
    Ok(records)
}

fn bigrams(text: &str) -> HashSet<(char, char)> {
    let chars: Vec<char> = text
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}
