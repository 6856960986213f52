//! Cross-reference caches built offline from the statute term API.
//!
//! Read-only at request time. Four lookups:
//! - legal term → articles that use it
//! - article → legal terms it defines or uses
//! - issue → preferred law sources
//! - everyday phrase → legal terms
//!
//! plus precedent / interpretation snippets keyed by issue.

use std::collections::HashMap;
use std::path::Path;

use nomu_core::{ArticleId, Issue};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::StoreError;

/// An article in a named law.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArticleRef {
    /// Law name without kind tag, e.g. "근로기준법".
    pub law: String,
    pub article: ArticleId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleTerms {
    pub law: String,
    pub article: ArticleId,
    pub terms: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrecedentKind {
    CourtRuling,
    CommissionDecision,
    MinistryInterpretation,
    LegislationInterpretation,
}

impl PrecedentKind {
    pub const ALL: [PrecedentKind; 4] = [
        Self::CourtRuling,
        Self::CommissionDecision,
        Self::MinistryInterpretation,
        Self::LegislationInterpretation,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::CourtRuling => "판례",
            Self::CommissionDecision => "노동위원회 결정례",
            Self::MinistryInterpretation => "고용노동부 법령해석",
            Self::LegislationInterpretation => "법령해석례",
        }
    }

    /// Snippets of this kind included in one conclusion.
    pub fn max_per_conclusion(&self) -> usize {
        match self {
            Self::CourtRuling => 3,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecedentSnippet {
    pub kind: PrecedentKind,
    pub title: String,
    pub summary: String,
}

/// On-disk layout of the cache.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct XrefFile {
    pub term_articles: HashMap<String, Vec<ArticleRef>>,
    pub article_terms: Vec<ArticleTerms>,
    pub issue_sources: HashMap<String, Vec<String>>,
    pub everyday_terms: HashMap<String, Vec<String>>,
    pub precedents: HashMap<String, Vec<PrecedentSnippet>>,
}

/// Indexed cross-reference cache.
#[derive(Debug, Default)]
pub struct XrefCache {
    term_articles: HashMap<String, Vec<ArticleRef>>,
    article_terms: HashMap<(String, ArticleId), Vec<String>>,
    issue_sources: HashMap<String, Vec<String>>,
    /// (compacted everyday phrase, legal terms), longest phrase first.
    everyday_terms: Vec<(String, Vec<String>)>,
    precedents: HashMap<String, Vec<PrecedentSnippet>>,
}

/// Summary statistics for a cache.
pub struct XrefSummary {
    pub terms: usize,
    pub articles: usize,
    pub issues_with_sources: usize,
    pub everyday_phrases: usize,
    pub precedents: usize,
}

impl XrefCache {
    /// An empty cache: every lookup misses.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path)?;
        let cache = Self::from_json_str(&text)?;
        let summary = cache.summary();
        info!(
            path = %path.display(),
            terms = summary.terms,
            articles = summary.articles,
            precedents = summary.precedents,
            "loaded cross-reference cache"
        );
        Ok(cache)
    }

    pub fn from_json_str(json: &str) -> Result<Self, StoreError> {
        let file: XrefFile = serde_json::from_str(json)?;
        Ok(Self::from(file))
    }

    pub fn articles_for_term(&self, term: &str) -> &[ArticleRef] {
        self.term_articles
            .get(term.trim())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Articles for several terms, deduplicated in first-seen order.
    pub fn articles_for_terms<'a>(&self, terms: impl IntoIterator<Item = &'a str>) -> Vec<ArticleRef> {
        let mut out: Vec<ArticleRef> = Vec::new();
        for term in terms {
            for r in self.articles_for_term(term) {
                if !out.contains(r) {
                    out.push(r.clone());
                }
            }
        }
        out
    }

    pub fn terms_for_article(&self, law: &str, article: ArticleId) -> &[String] {
        self.article_terms
            .get(&(law.to_string(), article))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn sources_for_issue(&self, issue: &Issue) -> Option<&[String]> {
        self.issue_sources
            .get(issue.as_str())
            .map(Vec::as_slice)
            .filter(|s| !s.is_empty())
    }

    /// Legal terms for every everyday phrase found in `text`, deduplicated.
    pub fn legal_terms_in(&self, text: &str) -> Vec<&str> {
        let haystack = compact(text);
        let mut out: Vec<&str> = Vec::new();
        for (phrase, terms) in &self.everyday_terms {
            if haystack.contains(phrase.as_str()) {
                for t in terms {
                    if !out.contains(&t.as_str()) {
                        out.push(t);
                    }
                }
            }
        }
        out
    }

    pub fn precedents_for(&self, issue: &Issue) -> &[PrecedentSnippet] {
        self.precedents
            .get(issue.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn summary(&self) -> XrefSummary {
        XrefSummary {
            terms: self.term_articles.len(),
            articles: self.article_terms.len(),
            issues_with_sources: self.issue_sources.len(),
            everyday_phrases: self.everyday_terms.len(),
            precedents: self.precedents.values().map(Vec::len).sum(),
        }
    }
}

impl From<XrefFile> for XrefCache {
    fn from(file: XrefFile) -> Self {
        let article_terms = file
            .article_terms
            .into_iter()
            .map(|a| ((a.law, a.article), a.terms))
            .collect();

        let mut everyday_terms: Vec<(String, Vec<String>)> = file
            .everyday_terms
            .into_iter()
            .map(|(phrase, terms)| (compact(&phrase), terms))
            .filter(|(phrase, terms)| !phrase.is_empty() && !terms.is_empty())
            .collect();
        everyday_terms.sort_by(|a, b| {
            b.0.chars()
                .count()
                .cmp(&a.0.chars().count())
                .then_with(|| a.0.cmp(&b.0))
        });

        Self {
            term_articles: file.term_articles,
            article_terms,
            issue_sources: file.issue_sources,
            everyday_terms,
            precedents: file.precedents,
        }
    }
}

fn compact(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
