//! Checklist generation: yes / no / unsure questions that gather the facts
//! a conclusion needs.

use std::sync::Arc;

use nomu_core::{ChecklistItem, EvidenceRecord, EvidenceSet, Issue, QaPair};
use nomu_store::SearchRequest;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::collector::{Enrichment, EvidenceCollector};
use crate::context::{cap_round_robin, render_context, render_headers};
use crate::expansion::query_variants;
use crate::llm::{LanguageModel, Prompt};
use crate::prompts;

/// Words of the question used when the model gives no usable short label.
const DERIVED_LABEL_WORDS: usize = 4;
const DERIVED_LABEL_MAX_CHARS: usize = 24;

/// Result of one checklist round.
#[derive(Debug, Clone, Default)]
pub struct ChecklistOutcome {
    pub checklist: Vec<ChecklistItem>,
    /// Evidence the questions were drawn from, after capping.
    pub evidence_used: Vec<EvidenceRecord>,
    /// Set when no evidence could be found for the prompt.
    pub error: Option<String>,
}

pub struct ChecklistGenerator {
    collector: EvidenceCollector,
    model: Arc<dyn LanguageModel>,
}

impl ChecklistGenerator {
    pub fn new(collector: EvidenceCollector, model: Arc<dyn LanguageModel>) -> Self {
        Self { collector, model }
    }

    pub async fn generate(
        &self,
        issue: &Issue,
        evidence: Option<Vec<EvidenceRecord>>,
        prior_qa: &[QaPair],
        context_text: &str,
    ) -> ChecklistOutcome {
        let config = self.collector.config();
        let situation = Some(context_text).filter(|s| !s.trim().is_empty());

        let records = match evidence.filter(|e| !e.is_empty()) {
            Some(records) => self.collector.cross_reference(issue, records).await,
            None => {
                let variants = query_variants(
                    issue,
                    situation,
                    self.collector.vocabulary(),
                    self.collector.xref(),
                );
                self.collector
                    .retrieve(issue, situation, &variants, config.conclusion_top_k)
                    .await
            }
        };
        let mut records = cap_round_robin(records, config.max_checklist_articles);
        let mut context = render_context(&records, config.checklist_context_chars);

        if context.is_empty() {
            records = self.recover_evidence(issue, situation).await;
            context = render_context(&records, config.checklist_context_chars);
        }
        if context.is_empty() {
            warn!(issue = %issue, "no evidence for checklist");
            return ChecklistOutcome {
                error: Some(format!("no statute passages found for issue {issue}")),
                ..ChecklistOutcome::default()
            };
        }

        let summary = render_headers(&records);
        let system = prompts::checklist_system(config.max_checklist_items);
        let user = prompts::checklist_user(issue, &summary, &context, prior_qa);

        let mut checklist = Vec::new();
        for budget in [config.checklist_max_tokens, config.checklist_retry_max_tokens] {
            let prompt = Prompt::new(system.clone(), user.clone()).max_tokens(Some(budget));
            checklist = match self.model.complete_json(&prompt).await {
                Ok(value) => parse_checklist(&value, config.max_checklist_items, prior_qa),
                Err(e) => {
                    warn!(issue = %issue, max_tokens = budget, error = %e, "checklist call failed");
                    Vec::new()
                }
            };
            if !checklist.is_empty() {
                break;
            }
            debug!(issue = %issue, max_tokens = budget, "empty checklist");
        }

        info!(
            issue = %issue,
            follow_up = !prior_qa.is_empty(),
            items = checklist.len(),
            articles = records.len(),
            "checklist generated"
        );
        ChecklistOutcome {
            checklist,
            evidence_used: records,
            error: None,
        }
    }

    /// Enrichment, then a broad label query, until something is found.
    async fn recover_evidence(&self, issue: &Issue, situation: Option<&str>) -> Vec<EvidenceRecord> {
        let config = self.collector.config();
        let mut set = EvidenceSet::new();
        for strategy in Enrichment::ORDER {
            self.collector.enrich(strategy, issue, situation, &mut set).await;
            if !set.is_empty() {
                return cap_round_robin(set.into_records(), config.max_checklist_articles);
            }
        }
        let request = SearchRequest::new(issue.to_string(), config.conclusion_top_k).excluding_main();
        let records = self.collector.search(&request).await;
        cap_round_robin(records, config.max_checklist_articles)
    }
}

/// Normalize the shapes models return into checklist items.
///
/// Accepts a bare array or an object holding one under `checklist`, `items`,
/// or `questions`. Items may be strings or objects. Duplicates and questions
/// already answered in `asked` (both by lowercased question) are dropped, and
/// the result is capped at `max_items`.
pub fn parse_checklist(value: &Value, max_items: usize, asked: &[QaPair]) -> Vec<ChecklistItem> {
    let items: &[Value] = match value {
        Value::Array(items) => items,
        Value::Object(map) => ["checklist", "items", "questions"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array))
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    };

    let mut seen: Vec<String> = asked.iter().map(|qa| question_key(&qa.question)).collect();
    let mut out = Vec::new();
    for item in items {
        let Some(entry) = parse_item(item) else {
            continue;
        };
        let key = question_key(&entry.question_text);
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(entry);
        if out.len() == max_items {
            break;
        }
    }
    out
}

fn question_key(question: &str) -> String {
    question.trim().to_lowercase()
}

fn parse_item(item: &Value) -> Option<ChecklistItem> {
    let (question, label) = match item {
        Value::String(s) => (s.trim().to_string(), None),
        Value::Object(map) => {
            let field = |keys: &[&str]| {
                keys.iter()
                    .filter_map(|k| map.get(*k).and_then(Value::as_str))
                    .map(str::trim)
                    .find(|s| !s.is_empty())
                    .map(str::to_string)
            };
            let question = field(&["question", "q", "item", "label"])?;
            let label = field(&["item", "label", "short_label", "title"]).filter(|l| *l != question);
            (question, label)
        }
        _ => return None,
    };
    if question.is_empty() {
        return None;
    }
    let short_label = label
        .filter(|l| usable_label(l))
        .unwrap_or_else(|| derive_label(&question));
    Some(ChecklistItem {
        short_label,
        question_text: question,
    })
}

fn usable_label(label: &str) -> bool {
    let meaningful: String = label
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_ascii_punctuation())
        .collect();
    meaningful.chars().count() >= 2 && !meaningful.chars().all(|c| c.is_ascii_digit())
}

/// First few words of the question, without the trailing question mark.
fn derive_label(question: &str) -> String {
    let words: Vec<&str> = question
        .trim_end_matches(['?', '？', '.'])
        .split_whitespace()
        .take(DERIVED_LABEL_WORDS)
        .collect();
    let label = words.join(" ");
    match label.char_indices().nth(DERIVED_LABEL_MAX_CHARS) {
        Some((idx, _)) => label[..idx].to_string(),
        None => label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingStore, Route, ScriptedModel, corpus, record};
    use nomu_core::law::SOURCE_LAW;
    use nomu_core::{Answer, ArticleId, CounselConfig, IssueVocabulary};
    use nomu_store::{EvidenceStore, XrefCache};
    use serde_json::json;

    const ROUND_ONE: &str = r#"```json
[
  {"item": "해고 통보 시점", "question": "해고 통보를 30일 전에 받았나요?"},
  {"item": "서면 통지", "question": "해고 사유를 문서로 받았나요?"},
  {"item": "1", "question": "회사에서 일한 지 3개월이 넘었나요?"},
  {"item": "서면 통지", "question": "해고 사유를 문서로 받았나요?"}
]
```"#;

    fn generator(store: Arc<dyn EvidenceStore>, model: Arc<ScriptedModel>) -> ChecklistGenerator {
        let collector = EvidenceCollector::new(
            store,
            Arc::new(IssueVocabulary::default()),
            Arc::new(XrefCache::empty()),
            Arc::new(CounselConfig::default()),
        );
        ChecklistGenerator::new(collector, model)
    }

    fn dismissal() -> Issue {
        IssueVocabulary::default().issue("해고/징계").unwrap()
    }

    #[tokio::test]
    async fn round_one_from_supplied_evidence() {
        let model = Arc::new(ScriptedModel::new().reply(Route::Checklist, ROUND_ONE));
        let g = generator(Arc::new(corpus()), model.clone());
        let evidence = vec![record(SOURCE_LAW, "제26조", "사용자는 근로자를 해고하려면 적어도 30일 전에 예고를 하여야 한다.")];
        let out = g
            .generate(&dismissal(), Some(evidence), &[], "30일 통보 없이 해고당했어요")
            .await;
        assert!(out.error.is_none());
        assert_eq!(out.checklist.len(), 3);
        assert_eq!(out.checklist[0].short_label, "해고 통보 시점");
        assert_eq!(out.checklist[2].short_label, "회사에서 일한 지 3개월이");
        assert!(out.evidence_used.iter().any(|r| r.article_id == ArticleId::parse("제26조")));

        let prompt = &model.prompts(Route::Checklist)[0];
        assert_eq!(prompt.max_tokens, Some(4096));
        assert!(prompt.user.contains("Round 1"));
        assert!(prompt.user.contains("[근로기준법]"));
    }

    #[tokio::test]
    async fn retrieves_when_no_evidence_supplied() {
        let model = Arc::new(ScriptedModel::new().reply(Route::Checklist, ROUND_ONE));
        let g = generator(Arc::new(corpus()), model);
        let out = g.generate(&dismissal(), None, &[], "해고 예고 없이 해고").await;
        assert!(!out.evidence_used.is_empty());
        assert!(out.evidence_used.len() <= 10);
        assert!(!out.checklist.is_empty());
    }

    #[tokio::test]
    async fn empty_twice_then_gives_up_quietly() {
        let model = Arc::new(
            ScriptedModel::new()
                .reply(Route::Checklist, "죄송합니다")
                .reply(Route::Checklist, "[]"),
        );
        let g = generator(Arc::new(corpus()), model.clone());
        let out = g.generate(&dismissal(), None, &[], "해고당했어요").await;
        assert!(out.checklist.is_empty());
        assert!(out.error.is_none());
        let budgets: Vec<_> = model
            .prompts(Route::Checklist)
            .iter()
            .map(|p| p.max_tokens)
            .collect();
        assert_eq!(budgets, vec![Some(4096), Some(8192)]);
    }

    #[tokio::test]
    async fn retry_recovers() {
        let model = Arc::new(
            ScriptedModel::new()
                .fail(Route::Checklist)
                .reply(Route::Checklist, r#"{"questions": ["월급을 받지 못한 적이 있나요?"]}"#),
        );
        let g = generator(Arc::new(corpus()), model);
        let issue = IssueVocabulary::default().issue("임금").unwrap();
        let out = g.generate(&issue, None, &[], "월급을 못 받았어요").await;
        assert_eq!(out.checklist.len(), 1);
        assert_eq!(out.checklist[0].short_label, "월급을 받지 못한 적이");
    }

    #[tokio::test]
    async fn later_round_carries_prior_answers() {
        let model = Arc::new(ScriptedModel::new().reply(Route::Checklist, ROUND_ONE));
        let g = generator(Arc::new(corpus()), model.clone());
        let qa = [QaPair::new("해고 통보를 30일 전에 받았나요?", Answer::No)];
        let out = g.generate(&dismissal(), None, &qa, "해고").await;
        let prompt = &model.prompts(Route::Checklist)[0];
        assert!(prompt.user.contains("[Previous Q&A]"));
        assert!(prompt.user.contains("A: 아니요"));

        let questions: Vec<_> = out.checklist.iter().map(|i| i.question_text.as_str()).collect();
        assert_eq!(questions, vec!["해고 사유를 문서로 받았나요?", "회사에서 일한 지 3개월이 넘었나요?"]);
    }

    #[tokio::test]
    async fn round_of_only_answered_questions_comes_back_empty() {
        let model = Arc::new(
            ScriptedModel::new().reply(Route::Checklist, r#"["해고되기 30일 전에 미리 통보를 받았나요?"]"#),
        );
        let g = generator(Arc::new(corpus()), model.clone());
        let qa = [QaPair::new("해고되기 30일 전에 미리 통보를 받았나요? ", Answer::Yes)];
        let out = g.generate(&dismissal(), None, &qa, "해고").await;
        assert!(out.checklist.is_empty());
        assert!(out.error.is_none());
        assert_eq!(model.calls(Route::Checklist), 2);
    }

    #[tokio::test]
    async fn no_evidence_sets_error() {
        let model = Arc::new(ScriptedModel::new().reply(Route::Checklist, ROUND_ONE));
        let g = generator(Arc::new(FailingStore), model.clone());
        let out = g.generate(&dismissal(), None, &[], "해고").await;
        assert!(out.checklist.is_empty());
        assert!(out.error.is_some());
        assert_eq!(model.calls(Route::Checklist), 0);
    }

    #[test]
    fn parses_object_shapes() {
        let value = json!({"checklist": [
            "계약서를 작성했나요?",
            {"q": "수습 기간이 있었나요?", "label": "수습"},
            {"label": "라벨만"},
            {"question": "  "},
            42
        ]});
        let items = parse_checklist(&value, 7, &[]);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].short_label, "계약서를 작성했나요");
        assert_eq!(items[1].short_label, "수습");
        assert_eq!(items[2].question_text, "라벨만");
    }

    #[test]
    fn caps_and_dedups_case_insensitively() {
        let value = json!(["Did you sign?", "did you sign? ", "a1", "a2", "a3"]);
        let items = parse_checklist(&value, 3, &[]);
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].question_text, "a1");

        let asked = [QaPair::new("DID YOU SIGN?", Answer::Yes)];
        let items = parse_checklist(&value, 3, &asked);
        assert_eq!(items[0].question_text, "a1");
    }

    #[test]
    fn label_rules() {
        assert!(!usable_label("1"));
        assert!(!usable_label("12."));
        assert!(!usable_label("가"));
        assert!(usable_label("서면 통지"));
        assert_eq!(derive_label("해고 통보를 30일 전에 받았나요?"), "해고 통보를 30일 전에");
    }
}
