//! Keyword relevance of retrieved passages to an issue.
//!
//! Vector search over statute text drifts: a query about dismissal also pulls
//! in wage and leave articles. Passages are scored by the issue's own
//! vocabulary and re-ranked before they reach a prompt.

use nomu_core::{EvidenceRecord, Issue, IssueVocabulary};

/// Text contains the label or one of its `/`-separated parts.
pub const LABEL_SCORE: f32 = 1.0;
/// Text contains a category keyword or everyday synonym.
pub const KEYWORD_SCORE: f32 = 0.5;

/// Relevance of `text` to `issue`.
pub fn relevance_score(text: &str, issue: &Issue, vocabulary: &IssueVocabulary) -> f32 {
    let compact = compact(text);
    let label_hit = std::iter::once(issue.as_str())
        .chain(issue.parts())
        .map(compact_phrase)
        .any(|p| !p.is_empty() && compact.contains(&p));
    if label_hit {
        return LABEL_SCORE;
    }
    let keyword_hit = vocabulary
        .category_keywords(issue)
        .iter()
        .map(|k| compact_phrase(k))
        .chain(vocabulary.synonyms_of(issue).map(str::to_string))
        .any(|k| k.chars().count() >= 2 && compact.contains(&k));
    if keyword_hit { KEYWORD_SCORE } else { 0.0 }
}

/// Drop zero-scoring records, stable-sort by descending score, keep `top_k`.
pub fn filter_by_relevance(
    records: Vec<EvidenceRecord>,
    issue: &Issue,
    vocabulary: &IssueVocabulary,
    top_k: usize,
) -> Vec<EvidenceRecord> {
    let mut scored: Vec<(f32, EvidenceRecord)> = records
        .into_iter()
        .map(|r| (relevance_score(&r.text, issue, vocabulary), r))
        .filter(|(s, _)| *s > 0.0)
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(top_k).map(|(_, r)| r).collect()
}

/// Relevance filter that keeps the unfiltered list when nothing scores.
pub fn filter_or_keep(
    records: Vec<EvidenceRecord>,
    issue: &Issue,
    vocabulary: &IssueVocabulary,
    top_k: usize,
) -> Vec<EvidenceRecord> {
    let filtered = filter_by_relevance(records.clone(), issue, vocabulary, top_k);
    if filtered.is_empty() {
        records.into_iter().take(top_k).collect()
    } else {
        filtered
    }
}

fn compact(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn compact_phrase(s: &str) -> String {
    compact(s.trim())
}
