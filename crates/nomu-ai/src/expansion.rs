//! Query expansion and law-source preference for an issue.

use nomu_core::law::ISSUE_TO_LAW_MAPPING;
use nomu_core::{Issue, IssueVocabulary};
use nomu_store::XrefCache;

/// Search queries for `issue`: the situation-anchored query first, then the
/// label expanded with statute vocabulary when that adds anything.
pub fn query_variants(
    issue: &Issue,
    situation: Option<&str>,
    vocabulary: &IssueVocabulary,
    xref: &XrefCache,
) -> Vec<String> {
    let situation = situation.map(str::trim).filter(|s| !s.is_empty());
    let primary = match situation {
        Some(s) => format!("{s} {issue}"),
        None => issue.to_string(),
    };

    let mut terms: Vec<&str> = vec![issue.as_str()];
    for keyword in vocabulary.category_keywords(issue) {
        push_unique(&mut terms, keyword);
    }
    if let Some(s) = situation {
        for term in xref.legal_terms_in(s) {
            push_unique(&mut terms, term);
        }
    }

    let mut variants = vec![primary];
    if terms.len() > 1 {
        let expanded = terms.join(" ");
        if !variants.contains(&expanded) {
            variants.push(expanded);
        }
    }
    variants
}

/// Legal terms behind `issue` and the situation, for cross-reference lookups.
pub fn lookup_terms<'a>(issue: &'a Issue, situation: Option<&str>, xref: &'a XrefCache) -> Vec<&'a str> {
    let mut terms: Vec<&str> = Vec::new();
    push_unique(&mut terms, issue.as_str());
    for part in issue.parts() {
        push_unique(&mut terms, part);
    }
    if let Some(s) = situation {
        for term in xref.legal_terms_in(s) {
            push_unique(&mut terms, term);
        }
    }
    terms
}

/// Preferred sources for `issue`: the cache's table, else the built-in mapping.
pub fn mapped_sources(issue: &Issue, xref: &XrefCache) -> Vec<String> {
    if let Some(sources) = xref.sources_for_issue(issue) {
        return sources.to_vec();
    }
    ISSUE_TO_LAW_MAPPING
        .iter()
        .find(|(label, _)| *label == issue.as_str())
        .map(|(_, sources)| sources.iter().map(|s| s.to_string()).collect())
        .unwrap_or_default()
}

/// Records per source when `total` is spread over `sources`.
pub fn k_per_law(total: usize, sources: usize) -> usize {
    if sources == 0 {
        total
    } else {
        total.div_ceil(sources)
    }
}

fn push_unique<'a>(terms: &mut Vec<&'a str>, term: &'a str) {
    let term = term.trim();
    if !term.is_empty() && !terms.contains(&term) {
        terms.push(term);
    }
}
