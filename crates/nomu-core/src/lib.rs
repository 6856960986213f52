pub mod article;
pub mod config;
pub mod dialogue;
pub mod evidence;
pub mod issue;
pub mod law;
pub mod relations;
pub mod schema;

pub use article::{ArticleId, ArticleIdError};
pub use config::{ConfigError, CounselConfig};
pub use dialogue::{Answer, ChecklistItem, QaPair, render_qa};
pub use evidence::{EvidenceKey, EvidenceRecord, EvidenceSet, dedup, source_diversity};
pub use issue::{Issue, IssueVocabulary, VocabularyError};
pub use law::{SourceKind, law_name};
pub use schema::corpus;
