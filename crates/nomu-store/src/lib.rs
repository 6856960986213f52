//! Evidence storage for nomu: LanceDB vector search over the statute corpus,
//! an in-memory lexical store, and the offline cross-reference caches.

mod error;
pub use error::StoreError;

pub mod memory;
pub mod rows;
pub mod search;
pub mod xref;

pub use memory::{MemoryStore, read_jsonl};
pub use search::{EvidenceStore, QueryEmbedder, SearchRequest};
pub use xref::{ArticleRef, PrecedentKind, PrecedentSnippet, XrefCache};

#[cfg(feature = "lancedb")]
mod lance;
#[cfg(feature = "lancedb")]
pub use lance::{LanceStore, STATUTE_ARTICLES_TABLE, read_parquet};
