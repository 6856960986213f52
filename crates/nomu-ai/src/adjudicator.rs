//! Decides whether another checklist round is needed.

use std::sync::Arc;

use nomu_core::{Issue, QaPair};
use serde_json::Value;
use tracing::{debug, warn};

use crate::context::truncate_chars;
use crate::json::as_bool;
use crate::llm::{LanguageModel, Prompt};
use crate::prompts;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationDecision {
    pub should_continue: bool,
    pub reason: String,
}

impl ContinuationDecision {
    fn stop(reason: impl Into<String>) -> Self {
        Self {
            should_continue: false,
            reason: reason.into(),
        }
    }
}

pub struct ContinuationAdjudicator {
    model: Arc<dyn LanguageModel>,
    context_chars: usize,
    max_tokens: u32,
}

impl ContinuationAdjudicator {
    pub fn new(model: Arc<dyn LanguageModel>, context_chars: usize, max_tokens: u32) -> Self {
        Self {
            model,
            context_chars,
            max_tokens,
        }
    }

    /// Ask the model; any failure or unreadable reply means stop.
    pub async fn should_continue(&self, issue: &Issue, qa: &[QaPair], context: &str) -> ContinuationDecision {
        if qa.is_empty() {
            return ContinuationDecision::stop("no answers to judge");
        }
        let context = truncate_chars(context, self.context_chars);
        let prompt = Prompt::new(
            prompts::continuation_system(),
            prompts::continuation_user(issue, qa, context),
        )
        .max_tokens(Some(self.max_tokens))
        .low_effort();

        let value = match self.model.complete_json(&prompt).await {
            Ok(value) => value,
            Err(e) => {
                warn!(issue = %issue, error = %e, "continuation check failed");
                return ContinuationDecision::stop(format!("continuation check failed: {e}"));
            }
        };
        let decision = read_decision(&value);
        debug!(
            issue = %issue,
            should_continue = decision.should_continue,
            reason = %decision.reason,
            "continuation decided"
        );
        decision
    }
}

fn read_decision(value: &Value) -> ContinuationDecision {
    let should_continue = value
        .get("should_continue")
        .or_else(|| value.get("continue"))
        .and_then(as_bool);
    let reason = value
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    match should_continue {
        Some(flag) => ContinuationDecision {
            should_continue: flag,
            reason,
        },
        None => ContinuationDecision::stop("no decision in model reply"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Route, ScriptedModel};
    use nomu_core::{Answer, IssueVocabulary};
    use serde_json::json;

    fn adjudicator(model: Arc<ScriptedModel>) -> ContinuationAdjudicator {
        ContinuationAdjudicator::new(model, 800, 512)
    }

    fn qa() -> Vec<QaPair> {
        vec![QaPair::new("해고 통보를 30일 전에 받았나요?", Answer::No)]
    }

    fn issue() -> Issue {
        IssueVocabulary::default().issue("해고/징계").unwrap()
    }

    #[tokio::test]
    async fn continues_when_model_says_so() {
        let model = Arc::new(ScriptedModel::new().reply(
            Route::Continue,
            r#"{"should_continue": "true", "reason": "서면 통지 여부가 빠졌습니다"}"#,
        ));
        let a = adjudicator(model.clone());
        let context = "뷁".repeat(2000);
        let d = a.should_continue(&issue(), &qa(), &context).await;
        assert!(d.should_continue);
        assert_eq!(d.reason, "서면 통지 여부가 빠졌습니다");

        let prompt = &model.prompts(Route::Continue)[0];
        assert!(prompt.low_effort);
        assert_eq!(prompt.max_tokens, Some(512));
        assert_eq!(prompt.user.matches('뷁').count(), 800);
    }

    #[tokio::test]
    async fn failures_stop() {
        let model = Arc::new(ScriptedModel::new().fail(Route::Continue));
        let d = adjudicator(model).should_continue(&issue(), &qa(), "").await;
        assert!(!d.should_continue);
        assert!(d.reason.contains("failed"));

        let model = Arc::new(ScriptedModel::new().reply(Route::Continue, "계속하세요"));
        let d = adjudicator(model).should_continue(&issue(), &qa(), "").await;
        assert!(!d.should_continue);
    }

    #[tokio::test]
    async fn nothing_to_judge_skips_model() {
        let model = Arc::new(ScriptedModel::new().reply(Route::Continue, r#"{"should_continue": true}"#));
        let d = adjudicator(model.clone()).should_continue(&issue(), &[], "").await;
        assert!(!d.should_continue);
        assert_eq!(model.calls(Route::Continue), 0);
    }

    #[test]
    fn missing_flag_stops() {
        assert!(!read_decision(&json!({"reason": "x"})).should_continue);
        assert!(read_decision(&json!({"continue": "yes"})).should_continue);
    }
}
