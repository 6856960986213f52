//! Issue classification for a user's situation.
//!
//! Two paths, cheapest first:
//! - lexical: the vocabulary's labels and everyday synonyms found in the
//!   situation, accepted when retrieval backs at least one of them;
//! - model: a broad filtered search, then the model picks labels from the
//!   allow-list with the retrieved provisions as context.
//!
//! Model output is normalized through the vocabulary, so only allowed labels
//! leave this module.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use nomu_core::law::ALL_LABOR_LAW_SOURCES;
use nomu_core::{EvidenceRecord, Issue};
use nomu_store::SearchRequest;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::collector::EvidenceCollector;
use crate::context::render_context;
use crate::llm::{LanguageModel, Prompt};
use crate::prompts;
use crate::relevance::filter_by_relevance;

/// How the issues were found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Vocabulary match on the situation, confirmed by retrieval.
    Lexical,
    /// Model choice over retrieved provisions.
    Model,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lexical => "lexical",
            Self::Model => "model",
        }
    }
}

/// Classification result for one situation.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// Distinct issues, most relevant first.
    pub issues: Vec<Issue>,
    pub articles_by_issue: HashMap<Issue, Vec<EvidenceRecord>>,
    pub provenance: Option<Provenance>,
}

impl Classification {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn evidence(&self, issue: &Issue) -> &[EvidenceRecord] {
        self.articles_by_issue
            .get(issue)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn from_pairs(pairs: Vec<(Issue, Vec<EvidenceRecord>)>, provenance: Provenance) -> Self {
        let mut out = Self {
            provenance: Some(provenance),
            ..Self::default()
        };
        for (issue, records) in pairs {
            if out.issues.contains(&issue) {
                continue;
            }
            out.issues.push(issue.clone());
            out.articles_by_issue.insert(issue, records);
        }
        out
    }
}

pub struct IssueClassifier {
    collector: EvidenceCollector,
    model: Arc<dyn LanguageModel>,
}

impl IssueClassifier {
    pub fn new(collector: EvidenceCollector, model: Arc<dyn LanguageModel>) -> Self {
        Self { collector, model }
    }

    pub async fn classify(&self, situation: &str) -> Classification {
        let situation = situation.trim();
        if situation.is_empty() {
            return Classification::empty();
        }

        let candidates = self.lexical_candidates(situation);
        if !candidates.is_empty() {
            if let Some(found) = self.confirm_lexical(&candidates, situation).await {
                return found;
            }
            debug!(candidates = candidates.len(), "lexical candidates had no evidence");
        }

        let from_model = self.classify_with_model(situation).await;
        if !from_model.is_empty() {
            return from_model;
        }

        if !candidates.is_empty() {
            if let Some(found) = self.confirm_lexical(&candidates, situation).await {
                return found;
            }
            info!(issues = candidates.len(), "keeping unconfirmed lexical issues");
            return Classification::from_pairs(
                candidates.into_iter().map(|i| (i, Vec::new())).collect(),
                Provenance::Lexical,
            );
        }
        info!("no issue matched");
        Classification::empty()
    }

    fn lexical_candidates(&self, situation: &str) -> Vec<Issue> {
        let mut candidates = self.collector.vocabulary().match_situation(situation);
        candidates.truncate(self.collector.config().issue_search_top_n);
        candidates
    }

    /// Collect for every candidate concurrently; keep those with evidence.
    async fn confirm_lexical(&self, candidates: &[Issue], situation: &str) -> Option<Classification> {
        let collected = join_all(
            candidates
                .iter()
                .map(|issue| self.collector.collect(issue, Some(situation))),
        )
        .await;
        let confirmed: Vec<(Issue, Vec<EvidenceRecord>)> = candidates
            .iter()
            .cloned()
            .zip(collected)
            .filter(|(_, records)| !records.is_empty())
            .collect();
        if confirmed.is_empty() {
            return None;
        }
        info!(
            issues = confirmed.len(),
            provenance = Provenance::Lexical.as_str(),
            "classified"
        );
        Some(Classification::from_pairs(confirmed, Provenance::Lexical))
    }

    async fn classify_with_model(&self, situation: &str) -> Classification {
        let config = self.collector.config();
        let vocabulary = self.collector.vocabulary();

        let mut query = situation.to_string();
        for term in self.collector.xref().legal_terms_in(situation) {
            query.push(' ');
            query.push_str(term);
        }
        let request = SearchRequest::new(query, config.classification_top_k)
            .sources(ALL_LABOR_LAW_SOURCES.iter().copied())
            .excluding_main();
        let broad = self.collector.search(&request).await;
        if broad.is_empty() {
            warn!("classification search returned nothing");
            return Classification::empty();
        }

        let context = render_context(&broad, config.classification_context_chars);
        let prompt = Prompt::new(
            prompts::classification_system(),
            prompts::classification_user(situation, &context, vocabulary.labels()),
        )
        .max_tokens(Some(config.classification_max_tokens));
        let value = match self.model.complete_json(&prompt).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "issue classification call failed");
                return Classification::empty();
            }
        };

        let mut issues: Vec<Issue> = Vec::new();
        for label in label_strings(&value) {
            match vocabulary.normalize(&label) {
                Some(issue) if !issues.contains(&issue) => issues.push(issue),
                Some(_) => {}
                None => debug!(label = %label, "discarded label outside vocabulary"),
            }
        }
        if issues.is_empty() {
            return Classification::empty();
        }

        let collected = join_all(
            issues
                .iter()
                .map(|issue| self.collector.collect(issue, Some(situation))),
        )
        .await;
        let pairs = issues
            .into_iter()
            .zip(collected)
            .map(|(issue, records)| {
                if records.is_empty() {
                    let fallback =
                        filter_by_relevance(broad.clone(), &issue, vocabulary, config.filter_top_k);
                    (issue, fallback)
                } else {
                    (issue, records)
                }
            })
            .collect();
        let out = Classification::from_pairs(pairs, Provenance::Model);
        info!(
            issues = out.issues.len(),
            provenance = Provenance::Model.as_str(),
            "classified"
        );
        out
    }
}

/// Labels from a bare array or an object with an `issues` array.
fn label_strings(value: &Value) -> Vec<String> {
    let items = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => map
            .get("issues")
            .or_else(|| map.get("labels"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        Value::String(s) => return vec![s.clone()],
        _ => &[],
    };
    items
        .iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(o) => o
                .get("label")
                .or_else(|| o.get("issue"))
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}
