//! Retrieved statute passages and the dedup rule that governs merging them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::article::ArticleId;
use crate::law::{self, SourceKind};

/// One retrieved statute or regulation passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub text: String,
    /// Law name plus kind tag, e.g. "근로기준법(법률)".
    pub source: String,
    #[serde(default)]
    pub article_id: Option<ArticleId>,
    #[serde(default)]
    pub chapter: String,
    #[serde(default)]
    pub section: String,
    /// Similarity distance from the query; lower is closer.
    #[serde(default)]
    pub distance: f32,
}

/// Dedup identity of a record. The same article number under two laws is two keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EvidenceKey {
    Article(String, ArticleId),
    /// Records without an article id collapse only on identical text.
    Text(String, String),
}

impl EvidenceRecord {
    pub fn key(&self) -> EvidenceKey {
        match self.article_id {
            Some(id) => EvidenceKey::Article(self.source.clone(), id),
            None => EvidenceKey::Text(self.source.clone(), self.text.clone()),
        }
    }

    pub fn law_name(&self) -> &str {
        law::law_name(&self.source)
    }

    /// Law name with the tier kept for decrees and rules.
    pub fn citation_name(&self) -> String {
        law::citation_name(&self.source)
    }

    pub fn kind(&self) -> SourceKind {
        SourceKind::of(&self.source)
    }

    /// Context header: "[근로기준법] [제3장 임금] 제36조".
    pub fn header(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        let name = self.citation_name();
        if !name.is_empty() {
            parts.push(format!("[{name}]"));
        }
        if !self.chapter.is_empty() {
            parts.push(format!("[{}]", self.chapter));
        }
        if let Some(id) = self.article_id {
            parts.push(id.korean());
        }
        parts.join(" ")
    }
}

/// Order-preserving merge that drops records whose key was already seen.
#[derive(Debug, Default, Clone)]
pub struct EvidenceSet {
    records: Vec<EvidenceRecord>,
    seen: HashSet<EvidenceKey>,
}

impl EvidenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with `records`, deduplicating as they are added.
    pub fn from_records(records: impl IntoIterator<Item = EvidenceRecord>) -> Self {
        let mut set = Self::new();
        set.extend(records);
        set
    }

    /// Add a record; returns `false` when its key was already present.
    pub fn push(&mut self, record: EvidenceRecord) -> bool {
        if self.seen.insert(record.key()) {
            self.records.push(record);
            true
        } else {
            false
        }
    }

    /// Add records in order; returns how many were new.
    pub fn extend(&mut self, records: impl IntoIterator<Item = EvidenceRecord>) -> usize {
        let mut added = 0;
        for record in records {
            if self.push(record) {
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, record: &EvidenceRecord) -> bool {
        self.seen.contains(&record.key())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[EvidenceRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<EvidenceRecord> {
        self.records
    }
}

/// Deduplicate by `(source, article_id)`, keeping first occurrences in order.
pub fn dedup(records: impl IntoIterator<Item = EvidenceRecord>) -> Vec<EvidenceRecord> {
    EvidenceSet::from_records(records).into_records()
}

/// Number of distinct sources among `records`.
pub fn source_diversity(records: &[EvidenceRecord]) -> usize {
    records
        .iter()
        .map(|r| r.source.as_str())
        .collect::<HashSet<_>>()
        .len()
}
