//! The consultation pipeline behind one shared handle.

use std::sync::Arc;

use nomu_core::{ChecklistItem, CounselConfig, EvidenceRecord, EvidenceSet, Issue, IssueVocabulary, QaPair};
use nomu_store::{EvidenceStore, XrefCache};
use serde::Serialize;
use tracing::debug;

use crate::adjudicator::{ContinuationAdjudicator, ContinuationDecision};
use crate::checklist::{ChecklistGenerator, ChecklistOutcome};
use crate::classifier::{Classification, IssueClassifier};
use crate::collector::EvidenceCollector;
use crate::conclusion::{ConclusionResult, ConclusionSynthesizer};
use crate::context::{render_context, truncate_chars};
use crate::expansion::query_variants;
use crate::llm::LanguageModel;
use crate::timeout::{TimedModel, TimedStore};

const NARROW_QUERY_CHARS: usize = 500;
const NO_CHECKLIST_REASON: &str = "체크리스트가 생성되지 않았습니다.";

/// A checklist round plus, for later rounds, the continuation verdict.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChecklistResponse {
    pub checklist: Vec<ChecklistItem>,
    pub evidence_used: Vec<EvidenceRecord>,
    pub should_continue: Option<bool>,
    pub continuation_reason: Option<String>,
    pub error: Option<String>,
}

/// Shared, read-only pipeline. Sessions hold it behind an `Arc`.
///
/// Every store and model call made through it is bounded by
/// `CounselConfig::call_timeout`.
pub struct Counsel {
    collector: EvidenceCollector,
    classifier: IssueClassifier,
    checklist: ChecklistGenerator,
    adjudicator: ContinuationAdjudicator,
    synthesizer: ConclusionSynthesizer,
    config: Arc<CounselConfig>,
}

impl Counsel {
    pub fn new(
        store: Arc<dyn EvidenceStore>,
        model: Arc<dyn LanguageModel>,
        vocabulary: Arc<IssueVocabulary>,
        xref: Arc<XrefCache>,
        config: CounselConfig,
    ) -> Self {
        let limit = config.call_timeout();
        let store: Arc<dyn EvidenceStore> = Arc::new(TimedStore::new(store, limit));
        let model: Arc<dyn LanguageModel> = Arc::new(TimedModel::new(model, limit));
        let config = Arc::new(config);
        let collector = EvidenceCollector::new(store, vocabulary, xref, config.clone());
        Self {
            classifier: IssueClassifier::new(collector.clone(), model.clone()),
            checklist: ChecklistGenerator::new(collector.clone(), model.clone()),
            adjudicator: ContinuationAdjudicator::new(
                model.clone(),
                config.continuation_context_chars,
                config.continuation_max_tokens,
            ),
            synthesizer: ConclusionSynthesizer::new(collector.clone(), model),
            collector,
            config,
        }
    }

    pub fn config(&self) -> &CounselConfig {
        &self.config
    }

    pub fn vocabulary(&self) -> &IssueVocabulary {
        self.collector.vocabulary()
    }

    pub async fn classify_issue(&self, situation: &str) -> Classification {
        self.classifier.classify(situation).await
    }

    /// One checklist round; adjudicates when answers from earlier rounds
    /// exist and the new round has questions. A later round with no
    /// questions is reported as a stop.
    pub async fn generate_checklist(
        &self,
        issue: &Issue,
        context_text: &str,
        prior_qa: &[QaPair],
        evidence: Option<Vec<EvidenceRecord>>,
    ) -> ChecklistResponse {
        let outcome = self.checklist_round(issue, evidence, prior_qa, context_text).await;
        let mut response = ChecklistResponse {
            checklist: outcome.checklist,
            evidence_used: outcome.evidence_used,
            error: outcome.error,
            ..ChecklistResponse::default()
        };
        if prior_qa.is_empty() {
            return response;
        }
        if response.checklist.is_empty() {
            response.should_continue = Some(false);
            response.continuation_reason = Some(NO_CHECKLIST_REASON.to_string());
        } else {
            let context = self.continuation_context(&response.evidence_used);
            let decision = self.adjudicate(issue, prior_qa, &context).await;
            response.should_continue = Some(decision.should_continue);
            response.continuation_reason = Some(decision.reason);
        }
        response
    }

    pub async fn synthesize_conclusion(
        &self,
        issue: &Issue,
        qa: &[QaPair],
        narrow_answers: &[String],
    ) -> ConclusionResult {
        self.synthesizer.conclude(issue, qa, narrow_answers).await
    }

    pub async fn checklist_round(
        &self,
        issue: &Issue,
        evidence: Option<Vec<EvidenceRecord>>,
        prior_qa: &[QaPair],
        context_text: &str,
    ) -> ChecklistOutcome {
        self.checklist.generate(issue, evidence, prior_qa, context_text).await
    }

    pub async fn adjudicate(&self, issue: &Issue, qa: &[QaPair], context: &str) -> ContinuationDecision {
        self.adjudicator.should_continue(issue, qa, context).await
    }

    /// Provisions summary handed to the adjudicator.
    pub fn continuation_context(&self, evidence: &[EvidenceRecord]) -> String {
        render_context(evidence, self.config.continuation_context_chars)
    }

    /// `previous` plus whatever a search on the free-text answers finds.
    pub async fn narrow_evidence(
        &self,
        issue: &Issue,
        previous: Vec<EvidenceRecord>,
        narrow_answers: &[String],
    ) -> Vec<EvidenceRecord> {
        let joined = narrow_answers.join(" ");
        let narrow = truncate_chars(joined.trim(), NARROW_QUERY_CHARS);
        if narrow.is_empty() {
            return previous;
        }
        let variants = query_variants(issue, Some(narrow), self.collector.vocabulary(), self.collector.xref());
        let found = self
            .collector
            .retrieve(issue, Some(narrow), &variants, self.config.conclusion_top_k)
            .await;
        let mut set = EvidenceSet::from_records(previous);
        let added = set.extend(found);
        debug!(issue = %issue, added, "narrow-answer search");
        set.into_records()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Route, ScriptedModel, corpus};
    use nomu_core::Answer;

    const ITEMS: &str = r#"[{"item": "서면 통지", "question": "해고 사유를 문서로 받았나요?"}]"#;

    fn counsel(model: Arc<ScriptedModel>) -> Counsel {
        Counsel::new(
            Arc::new(corpus()),
            model,
            Arc::new(IssueVocabulary::default()),
            Arc::new(XrefCache::empty()),
            CounselConfig::default(),
        )
    }

    fn dismissal() -> Issue {
        IssueVocabulary::default().issue("해고/징계").unwrap()
    }

    #[tokio::test]
    async fn first_round_is_not_adjudicated() {
        let model = Arc::new(
            ScriptedModel::new()
                .reply(Route::Checklist, ITEMS)
                .reply(Route::Continue, r#"{"should_continue": true, "reason": "x"}"#),
        );
        let c = counsel(model.clone());
        let response = c.generate_checklist(&dismissal(), "해고당했어요", &[], None).await;
        assert_eq!(response.checklist.len(), 1);
        assert_eq!(response.should_continue, None);
        assert_eq!(model.calls(Route::Continue), 0);
    }

    #[tokio::test]
    async fn later_round_carries_verdict() {
        let model = Arc::new(
            ScriptedModel::new()
                .reply(Route::Checklist, ITEMS)
                .reply(Route::Continue, r#"{"should_continue": false, "reason": "충분합니다"}"#),
        );
        let c = counsel(model.clone());
        let qa = [QaPair::new("해고 통보를 30일 전에 받았나요?", Answer::Yes)];
        let response = c.generate_checklist(&dismissal(), "해고당했어요", &qa, None).await;
        assert_eq!(response.should_continue, Some(false));
        assert_eq!(response.continuation_reason.as_deref(), Some("충분합니다"));
        assert_eq!(model.calls(Route::Continue), 1);
    }

    #[tokio::test]
    async fn empty_later_round_says_stop() {
        let model = Arc::new(
            ScriptedModel::new()
                .reply(Route::Checklist, "[]")
                .reply(Route::Continue, r#"{"should_continue": true, "reason": "x"}"#),
        );
        let c = counsel(model.clone());
        let qa = [QaPair::new("해고 통보를 30일 전에 받았나요?", Answer::Yes)];
        let response = c.generate_checklist(&dismissal(), "해고당했어요", &qa, None).await;
        assert!(response.checklist.is_empty());
        assert_eq!(response.should_continue, Some(false));
        assert_eq!(response.continuation_reason.as_deref(), Some(NO_CHECKLIST_REASON));
        assert_eq!(model.calls(Route::Continue), 0);
    }

    #[tokio::test]
    async fn narrow_evidence_adds_without_duplicates() {
        let c = counsel(Arc::new(ScriptedModel::new()));
        let issue = IssueVocabulary::default().issue("임금").unwrap();
        let previous = c.narrow_evidence(&issue, Vec::new(), &["월급을 두 달째 못 받았어요".to_string()]).await;
        assert!(!previous.is_empty());
        let again = c
            .narrow_evidence(&issue, previous.clone(), &["월급을 두 달째 못 받았어요".to_string()])
            .await;
        assert_eq!(again.len(), previous.len());

        let untouched = c.narrow_evidence(&issue, previous.clone(), &[]).await;
        assert_eq!(untouched, previous);
    }
}
