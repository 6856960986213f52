//! Article citations in generated text: extraction, validation against the
//! evidence, and law-name repair.
//!
//! Both spellings are recognized: `Art.36`, `Art.43-2`, `제36조`, `제43조의2`.
//! Numbers are matched greedily so `Art.13` never matches inside `Art.130`.

use std::collections::HashMap;
use std::sync::LazyLock;

use nomu_core::{ArticleId, EvidenceRecord, SourceKind};
use regex::Regex;
use serde::Serialize;

static CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Art\.(\d+)(?:-(\d+))?|제\s?(\d+)조(?:의(\d+))?").unwrap()
});

const LAW_SUFFIXES: &[&str] = &["법", "법률", "령", "규칙", "Act", "Law", "Decree", "Rule"];
const QUOTE_CHARS: &[char] = &['」', '』', '"', '\'', '“', '”', '’', ')', '）', ','];

/// What the citations in a conclusion look like against its evidence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CitationReport {
    pub has_citations: bool,
    /// Cited articles present in the evidence.
    pub matched_citations: Vec<ArticleId>,
    /// Cited articles the evidence does not contain.
    pub unmatched_citations: Vec<ArticleId>,
    /// Every cited article carries a law-name prefix at least once.
    pub has_law_names: bool,
    /// Evidence law names that appear in the text.
    pub law_names_mentioned: Vec<String>,
}

struct Occurrence {
    id: ArticleId,
    start: usize,
}

fn occurrences(text: &str) -> Vec<Occurrence> {
    CITATION
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let main = caps.get(1).or_else(|| caps.get(3))?.as_str().parse().ok()?;
            let sub = match caps.get(2).or_else(|| caps.get(4)) {
                Some(m) => Some(m.as_str().parse().ok()?),
                None => None,
            };
            Some(Occurrence {
                id: ArticleId::new(main, sub)?,
                start: whole.start(),
            })
        })
        .collect()
}

/// Distinct cited articles in first-appearance order.
pub fn extract_citations(text: &str) -> Vec<ArticleId> {
    let mut out: Vec<ArticleId> = Vec::new();
    for occ in occurrences(text) {
        if !out.contains(&occ.id) {
            out.push(occ.id);
        }
    }
    out
}

/// Article → citation name. Statute records are consulted before decrees
/// and rules, so a decree article never lends its number to the statute and
/// a statute article is never renamed to its decree. Within a tier the first
/// source wins.
fn article_laws(evidence: &[EvidenceRecord]) -> HashMap<ArticleId, String> {
    let implementing = |r: &&EvidenceRecord| matches!(r.kind(), SourceKind::Decree | SourceKind::Rule);
    let statutes = evidence.iter().filter(|r| !implementing(r));
    let mut map = HashMap::new();
    for record in statutes.chain(evidence.iter().filter(|r| implementing(r))) {
        if let Some(id) = record.article_id {
            let name = record.citation_name();
            if !name.is_empty() {
                map.entry(id).or_insert(name);
            }
        }
    }
    map
}

/// Whether the text right before `start` names a law.
fn is_prefixed(text: &str, start: usize, law: Option<&str>) -> bool {
    let before = text[..start].trim_end();
    if law.is_some_and(|law| before.ends_with(law)) {
        return true;
    }
    let token = before
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or_default()
        .trim_end_matches(QUOTE_CHARS);
    !token.is_empty() && LAW_SUFFIXES.iter().any(|s| token.ends_with(s))
}

pub fn validate(text: &str, evidence: &[EvidenceRecord]) -> CitationReport {
    let laws = article_laws(evidence);
    let occs = occurrences(text);
    let cited = extract_citations(text);

    let (matched, unmatched): (Vec<ArticleId>, Vec<ArticleId>) =
        cited.iter().partition(|id| laws.contains_key(*id));

    let has_law_names = !cited.is_empty()
        && cited.iter().all(|id| {
            occs.iter()
                .filter(|o| o.id == *id)
                .any(|o| is_prefixed(text, o.start, laws.get(id).map(String::as_str)))
        });

    let mut law_names_mentioned: Vec<String> = Vec::new();
    for record in evidence {
        let law = record.law_name();
        if !law.is_empty() && text.contains(law) && !law_names_mentioned.iter().any(|l| l == law) {
            law_names_mentioned.push(law.to_string());
        }
    }

    CitationReport {
        has_citations: !cited.is_empty(),
        matched_citations: matched,
        unmatched_citations: unmatched,
        has_law_names,
        law_names_mentioned,
    }
}

/// Prefix the first occurrence of each citation that never names its law.
///
/// Citations without a law in the evidence are left as they are. Applying
/// the repair twice changes nothing.
pub fn repair_law_names(text: &str, evidence: &[EvidenceRecord]) -> String {
    let laws = article_laws(evidence);
    let occs = occurrences(text);

    let mut inserts: Vec<(usize, &str)> = Vec::new();
    for id in extract_citations(text) {
        let Some(law) = laws.get(&id).map(String::as_str) else {
            continue;
        };
        let mut mine = occs.iter().filter(|o| o.id == id);
        let Some(first) = mine.next() else {
            continue;
        };
        let prefixed = is_prefixed(text, first.start, Some(law))
            || mine.any(|o| is_prefixed(text, o.start, Some(law)));
        if !prefixed {
            inserts.push((first.start, law));
        }
    }

    let mut out = text.to_string();
    inserts.sort_by(|a, b| b.0.cmp(&a.0));
    for (at, law) in inserts {
        out.insert_str(at, &format!("{law} "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::record;
    use nomu_core::law::{SOURCE_DECREE, SOURCE_LAW, SOURCE_MIN_WAGE_LAW};

    fn id(s: &str) -> ArticleId {
        ArticleId::parse(s).unwrap()
    }

    #[test]
    fn extraction_respects_digit_boundaries() {
        assert_eq!(
            extract_citations("see Art.13 and Art.3, then Art.13 again"),
            vec![id("Art.13"), id("Art.3")]
        );
        assert_eq!(extract_citations("Art.130"), vec![id("Art.130")]);
        assert_eq!(
            extract_citations("제43조의2와 제36조, 그리고 Art.43-2"),
            vec![id("제43조의2"), id("제36조")]
        );
        assert!(extract_citations("조항 없음").is_empty());
    }

    #[test]
    fn validate_splits_matched_and_unmatched() {
        let evidence = vec![
            record(SOURCE_LAW, "제26조", "해고의 예고"),
            record(SOURCE_MIN_WAGE_LAW, "제6조", "최저임금의 효력"),
        ];
        let report = validate("근로기준법 제26조에 따라 제99조를 보면", &evidence);
        assert!(report.has_citations);
        assert_eq!(report.matched_citations, vec![id("제26조")]);
        assert_eq!(report.unmatched_citations, vec![id("제99조")]);
        assert!(!report.has_law_names);
        assert_eq!(report.law_names_mentioned, vec!["근로기준법".to_string()]);

        let report = validate("인용 없음", &evidence);
        assert!(!report.has_citations);
        assert!(!report.has_law_names);
    }

    #[test]
    fn prefix_on_any_occurrence_counts() {
        let evidence = vec![record(SOURCE_LAW, "제36조", "금품 청산")];
        let text = "제36조에 따라 14일 이내에 지급해야 합니다. 근로기준법 제36조 위반입니다.";
        assert!(validate(text, &evidence).has_law_names);
        assert_eq!(repair_law_names(text, &evidence), text);
    }

    #[test]
    fn repairs_statute_names_idempotently() {
        let evidence = vec![record("LaborStandardsAct(statute)", "Art.36", "final payment")];
        let text = "Under Art.36 wages are due within 14 days; Art.36 also covers severance.";
        let repaired = repair_law_names(text, &evidence);
        assert_eq!(
            repaired,
            "Under LaborStandardsAct Art.36 wages are due within 14 days; Art.36 also covers severance."
        );
        assert_eq!(repair_law_names(&repaired, &evidence), repaired);

        let report = validate(&repaired, &evidence);
        assert!(report.has_law_names);
        assert_eq!(report.matched_citations, vec![id("Art.36")]);
    }

    #[test]
    fn repair_uses_first_source_and_leaves_unknowns() {
        let evidence = vec![
            record(SOURCE_LAW, "제26조", "해고의 예고"),
            record(SOURCE_DECREE, "제26조", "시행령 조문"),
            record(SOURCE_MIN_WAGE_LAW, "제6조", "최저임금의 효력"),
        ];
        let text = "제26조와 제6조, 그리고 제99조를 확인하세요.";
        let repaired = repair_law_names(text, &evidence);
        assert_eq!(
            repaired,
            "근로기준법 제26조와 최저임금법 제6조, 그리고 제99조를 확인하세요."
        );
        let report = validate(&repaired, &evidence);
        assert_eq!(report.unmatched_citations, vec![id("제99조")]);
        assert!(!report.has_law_names);
    }

    #[test]
    fn decree_articles_keep_their_tier() {
        let evidence = vec![
            record(SOURCE_DECREE, "제6조", "해고 예고의 방법"),
            record(SOURCE_DECREE, "제26조", "시행령 조문"),
            record(SOURCE_LAW, "제26조", "해고의 예고"),
        ];
        let text = "해고 예고는 제6조에 따라 서면으로, 제26조에 따라 30일 전에 해야 합니다.";
        let repaired = repair_law_names(text, &evidence);
        assert_eq!(
            repaired,
            "해고 예고는 근로기준법 시행령 제6조에 따라 서면으로, 근로기준법 제26조에 따라 30일 전에 해야 합니다."
        );
        assert!(!repaired.contains("근로기준법 제6조"));
        assert_eq!(repair_law_names(&repaired, &evidence), repaired);
        assert!(validate(&repaired, &evidence).has_law_names);
    }

    #[test]
    fn quoted_law_names_count_as_prefix() {
        let evidence = vec![record(SOURCE_LAW, "제23조", "해고 등의 제한")];
        let text = "「근로기준법」 제23조는 정당한 이유를 요구합니다.";
        assert!(validate(text, &evidence).has_law_names);
        assert_eq!(repair_law_names(text, &evidence), text);
    }
}
