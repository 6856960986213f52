//! Terminal rendering for consultations.
//!
//! Every view is built as a string first so it can be tested, then printed.

use std::fmt::Write;

use nomu_ai::{Classification, ConclusionResult};
use nomu_core::{ChecklistItem, EvidenceRecord, Issue};

const MAX_EVIDENCE_ITEMS: usize = 10;
const SNIPPET_CHARS: usize = 80;

// ── Public API ──

pub fn print_classification(classification: &Classification) {
    print!("{}", render_classification(classification));
}

pub fn print_checklist(issue: &Issue, round: u32, items: &[ChecklistItem]) {
    print!("{}", render_checklist(issue, round, items));
}

pub fn print_conclusion(result: &ConclusionResult) {
    print!("{}", render_conclusion(result));
}

// ── Rendering ──

pub fn render_classification(classification: &Classification) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== 쟁점 분류 ===");
    if classification.is_empty() {
        let _ = writeln!(out, "  일치하는 쟁점이 없습니다.");
        return out;
    }
    if let Some(provenance) = classification.provenance {
        let _ = writeln!(out, "  {:<14} {}", "provenance", provenance.as_str());
    }
    let _ = writeln!(out);
    for (rank, issue) in classification.issues.iter().enumerate() {
        let evidence = classification.evidence(issue);
        let _ = writeln!(out, "  {}. {} ({} passages)", rank + 1, issue, evidence.len());
        for record in evidence.iter().take(3) {
            let _ = writeln!(out, "      {}", record.header());
        }
    }
    out
}

pub fn render_checklist(issue: &Issue, round: u32, items: &[ChecklistItem]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {issue} : 확인 질문 {round}회차 ===");
    let _ = writeln!(out);
    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(out, "  [{}] {}", i + 1, item.short_label);
        let _ = writeln!(out, "      {}", item.question_text);
    }
    let _ = writeln!(out);
    out
}

pub fn render_conclusion(result: &ConclusionResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== 결론 ===");
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", result.conclusion.trim_end());
    let _ = writeln!(out);

    if let Some(error) = &result.error {
        let _ = writeln!(out, "  {:<14} {}", "error", error);
        let _ = writeln!(out);
    }

    let report = &result.validation;
    if report.has_citations {
        let _ = writeln!(out, "Citations");
        let _ = writeln!(out, "  {:<14} {}", "matched", join_ids(&report.matched_citations));
        if !report.unmatched_citations.is_empty() {
            let _ = writeln!(out, "  {:<14} {}", "unmatched", join_ids(&report.unmatched_citations));
        }
        let _ = writeln!(out, "  {:<14} {}", "law names", report.law_names_mentioned.join(", "));
        let _ = writeln!(out);
    }

    if !result.related_article_ids.is_empty() {
        let _ = writeln!(out, "Related articles");
        let _ = writeln!(out, "  {}", join_ids(&result.related_article_ids));
        let _ = writeln!(out);
    }

    render_evidence(&mut out, "Primary evidence", &result.primary_evidence);
    render_evidence(&mut out, "Secondary evidence", &result.secondary_evidence);
    out
}

fn render_evidence(out: &mut String, header: &str, records: &[EvidenceRecord]) {
    if records.is_empty() {
        return;
    }
    let _ = writeln!(out, "{header} ({})", records.len());
    for record in records.iter().take(MAX_EVIDENCE_ITEMS) {
        let _ = writeln!(out, "  {}", record.header());
        let _ = writeln!(out, "      {}", snippet(&record.text));
    }
    if records.len() > MAX_EVIDENCE_ITEMS {
        let _ = writeln!(out, "  ... and {} more", records.len() - MAX_EVIDENCE_ITEMS);
    }
    let _ = writeln!(out);
}

fn join_ids<T: std::fmt::Display>(ids: &[T]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn snippet(text: &str) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= SNIPPET_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(SNIPPET_CHARS).collect();
        format!("{cut}…")
    }
}
