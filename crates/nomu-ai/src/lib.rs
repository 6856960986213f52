//! Consultation pipeline: issue classification, evidence collection,
//! checklist rounds, and citation-checked conclusions over an LLM.

pub mod adjudicator;
pub mod checklist;
pub mod citation;
pub mod classifier;
pub mod collector;
pub mod conclusion;
pub mod context;
pub mod counsel;
pub mod expansion;
pub mod json;
pub mod llm;
pub mod prompts;
pub mod relevance;
pub mod session;
pub mod timeout;

#[cfg(test)]
mod testing;

pub use adjudicator::{ContinuationAdjudicator, ContinuationDecision};
pub use checklist::{ChecklistGenerator, ChecklistOutcome};
pub use citation::{CitationReport, extract_citations, repair_law_names, validate};
pub use classifier::{Classification, IssueClassifier, Provenance};
pub use collector::EvidenceCollector;
pub use conclusion::{CONCLUSION_FAILED, ConclusionResult, ConclusionSynthesizer};
pub use counsel::{ChecklistResponse, Counsel};
pub use llm::{LanguageModel, LlmError, OpenAiClient, Prompt};
pub use prompts::NOT_IN_PROVIDED_DATA;
pub use session::{Phase, Session, SessionError, SessionState, StepOutcome};
