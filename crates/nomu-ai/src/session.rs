//! One consultation: situation → checklist rounds → conclusion.
//!
//! The session owns all per-user state and is driven by its caller one step
//! at a time. Phases only move forward (`Input → Checklist → Conclusion`, or
//! straight to `Conclusion`) until [`Session::reset`]. The round cap lives
//! here: after `max_rounds` rounds the session concludes whatever the
//! adjudicator says.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use nomu_core::{Answer, ChecklistItem, EvidenceRecord, Issue, QaPair};
use thiserror::Error;
use tracing::info;

use crate::conclusion::ConclusionResult;
use crate::counsel::Counsel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Input,
    Checklist,
    Conclusion,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("not allowed in phase {actual:?} (expected {expected:?})")]
    Phase { expected: Phase, actual: Phase },

    #[error("{missing} checklist item(s) still unanswered")]
    Unanswered { missing: usize },

    #[error("no checklist item {index} (round has {len})")]
    Index { index: usize, len: usize },

    #[error("expected {expected} answers, got {got}")]
    AnswerCount { expected: usize, got: usize },
}

/// What a step produced.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// Nothing in the situation matched an issue; still in `Input`.
    NoIssue,
    /// A new round of questions to answer.
    Checklist { round: u32, items: Vec<ChecklistItem> },
    Concluded(Box<ConclusionResult>),
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub situation: String,
    pub issues: Vec<Issue>,
    pub selected_issue: Option<Issue>,
    pub articles_by_issue: HashMap<Issue, Vec<EvidenceRecord>>,
    pub checklist: Vec<ChecklistItem>,
    pub checklist_round: u32,
    /// Answers for the current round, one slot per checklist item.
    pub answers: Vec<Option<Answer>>,
    /// Every answered question across rounds, in order.
    pub all_qa: Vec<QaPair>,
    /// Evidence behind the current round's questions.
    pub evidence: Vec<EvidenceRecord>,
    pub phase: Phase,
    pub conclusion: Option<ConclusionResult>,
    pub started_at: DateTime<Utc>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            situation: String::new(),
            issues: Vec::new(),
            selected_issue: None,
            articles_by_issue: HashMap::new(),
            checklist: Vec::new(),
            checklist_round: 0,
            answers: Vec::new(),
            all_qa: Vec::new(),
            evidence: Vec::new(),
            phase: Phase::Input,
            conclusion: None,
            started_at: Utc::now(),
        }
    }
}

impl SessionState {
    /// Free-text answers given so far.
    pub fn narrow_answers(&self) -> Vec<String> {
        self.all_qa
            .iter()
            .filter_map(|qa| qa.answer.narrow_text())
            .map(str::to_string)
            .collect()
    }

    pub fn unanswered(&self) -> usize {
        self.answers.iter().filter(|a| a.is_none()).count()
    }
}

pub struct Session {
    counsel: Arc<Counsel>,
    state: SessionState,
}

impl Session {
    pub fn new(counsel: Arc<Counsel>) -> Self {
        Self {
            counsel,
            state: SessionState::default(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Classify the situation and open round 1.
    pub async fn submit_situation(&mut self, text: &str) -> Result<StepOutcome, SessionError> {
        self.expect(Phase::Input)?;
        let situation = text.trim().to_string();
        let classification = self.counsel.classify_issue(&situation).await;
        let Some(issue) = classification.issues.first().cloned() else {
            info!("no issue in situation");
            return Ok(StepOutcome::NoIssue);
        };
        info!(
            issue = %issue,
            candidates = classification.issues.len(),
            provenance = classification.provenance.map(|p| p.as_str()).unwrap_or_default(),
            "issue selected"
        );

        let evidence = classification.evidence(&issue).to_vec();
        self.state.situation = situation;
        self.state.issues = classification.issues;
        self.state.articles_by_issue = classification.articles_by_issue;
        self.state.selected_issue = Some(issue.clone());

        let outcome = self
            .counsel
            .checklist_round(&issue, Some(evidence), &[], &self.state.situation)
            .await;
        self.state.evidence = outcome.evidence_used;
        if outcome.checklist.is_empty() {
            return Ok(self.conclude(&issue).await);
        }
        Ok(self.open_round(1, outcome.checklist))
    }

    pub fn answer(&mut self, index: usize, answer: Answer) -> Result<(), SessionError> {
        self.expect(Phase::Checklist)?;
        let len = self.state.answers.len();
        let slot = self
            .state
            .answers
            .get_mut(index)
            .ok_or(SessionError::Index { index, len })?;
        *slot = Some(answer);
        Ok(())
    }

    /// Answer every item of the current round at once, in order.
    pub fn answer_all(&mut self, answers: Vec<Answer>) -> Result<(), SessionError> {
        self.expect(Phase::Checklist)?;
        let expected = self.state.checklist.len();
        if answers.len() != expected {
            return Err(SessionError::AnswerCount {
                expected,
                got: answers.len(),
            });
        }
        self.state.answers = answers.into_iter().map(Some).collect();
        Ok(())
    }

    /// Close the current round and either open the next one or conclude.
    pub async fn advance(&mut self) -> Result<StepOutcome, SessionError> {
        self.expect(Phase::Checklist)?;
        let missing = self.state.unanswered();
        if missing > 0 {
            return Err(SessionError::Unanswered { missing });
        }
        let Some(issue) = self.state.selected_issue.clone() else {
            return Err(SessionError::Phase {
                expected: Phase::Input,
                actual: self.state.phase,
            });
        };

        let answers = std::mem::take(&mut self.state.answers);
        for (item, answer) in self.state.checklist.iter().zip(answers) {
            if let Some(answer) = answer {
                self.state
                    .all_qa
                    .push(QaPair::new(item.question_text.clone(), answer));
            }
        }

        let round = self.state.checklist_round;
        if round >= self.counsel.config().max_rounds {
            info!(issue = %issue, round, "round cap reached");
            return Ok(self.conclude(&issue).await);
        }

        let context = self.counsel.continuation_context(&self.state.evidence);
        let decision = self
            .counsel
            .adjudicate(&issue, &self.state.all_qa, &context)
            .await;
        if !decision.should_continue {
            info!(issue = %issue, round, reason = %decision.reason, "enough facts gathered");
            return Ok(self.conclude(&issue).await);
        }

        let narrow = self.state.narrow_answers();
        let evidence = self
            .counsel
            .narrow_evidence(&issue, std::mem::take(&mut self.state.evidence), &narrow)
            .await;
        let outcome = self
            .counsel
            .checklist_round(&issue, Some(evidence), &self.state.all_qa, &self.state.situation)
            .await;
        self.state.evidence = outcome.evidence_used;
        if outcome.checklist.is_empty() {
            return Ok(self.conclude(&issue).await);
        }
        Ok(self.open_round(round + 1, outcome.checklist))
    }

    /// Drop everything and start over.
    pub fn reset(&mut self) {
        self.state = SessionState::default();
    }

    fn expect(&self, expected: Phase) -> Result<(), SessionError> {
        if self.state.phase == expected {
            Ok(())
        } else {
            Err(SessionError::Phase {
                expected,
                actual: self.state.phase,
            })
        }
    }

    fn open_round(&mut self, round: u32, items: Vec<ChecklistItem>) -> StepOutcome {
        info!(round, items = items.len(), "checklist round opened");
        self.state.checklist_round = round;
        self.state.answers = vec![None; items.len()];
        self.state.checklist = items.clone();
        self.state.phase = Phase::Checklist;
        StepOutcome::Checklist { round, items }
    }

    async fn conclude(&mut self, issue: &Issue) -> StepOutcome {
        let narrow = self.state.narrow_answers();
        let result = self
            .counsel
            .synthesize_conclusion(issue, &self.state.all_qa, &narrow)
            .await;
        self.state.checklist.clear();
        self.state.answers.clear();
        self.state.phase = Phase::Conclusion;
        self.state.conclusion = Some(result.clone());
        StepOutcome::Concluded(Box::new(result))
    }
}
