//! Hand-curated article relationships: articles that should be read together.
//!
//! Keyed by law name, since article numbers collide across statutes
//! (근로기준법 제53조 and 산업안전보건법 제53조 are unrelated).

use crate::article::ArticleId;
use crate::evidence::EvidenceRecord;

type Relation = (&'static str, &'static [&'static str]);

const LABOR_STANDARDS: &[Relation] = &[
    // Dismissal: limits, redundancy, notice, written notice, remedy.
    ("23", &["24", "26", "27", "28"]),
    ("24", &["23", "26", "27", "28"]),
    ("26", &["23", "27", "28"]),
    ("27", &["23", "26", "28"]),
    ("28", &["23", "27", "30"]),
    ("30", &["23", "28"]),
    // Wages: settlement, payment, subcontracting, prescription.
    ("36", &["43", "44", "49"]),
    ("43", &["36", "43-2", "44", "49"]),
    ("49", &["36", "43"]),
    // Working hours and rest.
    ("50", &["53", "54", "56"]),
    ("53", &["50", "56", "59"]),
    ("54", &["50"]),
    ("55", &["56", "60"]),
    ("56", &["50", "53", "55"]),
    // Leave.
    ("60", &["61", "62", "55"]),
    ("61", &["60"]),
    ("62", &["60"]),
    // Maternity.
    ("74", &["74-2"]),
    // Workplace harassment.
    ("76-2", &["76-3"]),
    ("76-3", &["76-2"]),
];

const OCCUPATIONAL_SAFETY: &[Relation] = &[
    // Stop-work right and protection from retaliation.
    ("51", &["52", "53"]),
    ("52", &["51", "53", "54"]),
    ("53", &["51", "52", "54"]),
];

const TRADE_UNION: &[Relation] = &[
    // Unfair labor practices and remedy.
    ("81", &["82", "83", "84", "85", "86"]),
    ("82", &["81", "83", "84"]),
];

const TABLES: &[(&str, &[Relation])] = &[
    ("근로기준법", LABOR_STANDARDS),
    ("산업안전보건법", OCCUPATIONAL_SAFETY),
    ("노동조합 및 노동관계조정법", TRADE_UNION),
];

/// Articles related to `article` within the law named `law`.
pub fn related_articles(law: &str, article: ArticleId) -> Vec<ArticleId> {
    let Some((_, table)) = TABLES.iter().find(|(name, _)| *name == law) else {
        return Vec::new();
    };
    table
        .iter()
        .find(|(from, _)| ArticleId::parse(from) == Some(article))
        .map(|(_, to)| to.iter().filter_map(|s| ArticleId::parse(s)).collect())
        .unwrap_or_default()
}

/// Related articles for a list of records, deduplicated, in first-seen order.
///
/// Returns `(law name, article)` pairs so the caller can fetch from the right law.
pub fn related_for_records(records: &[EvidenceRecord]) -> Vec<(String, ArticleId)> {
    let mut out: Vec<(String, ArticleId)> = Vec::new();
    for record in records {
        let Some(id) = record.article_id else {
            continue;
        };
        let law = record.law_name();
        for rel in related_articles(law, id) {
            let pair = (law.to_string(), rel);
            if !out.contains(&pair) {
                out.push(pair);
            }
        }
    }
    out
}
