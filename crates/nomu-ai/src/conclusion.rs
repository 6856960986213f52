//! Conclusion synthesis: widen the evidence, ask the model once, and make the
//! citations in its answer line up with what was retrieved.
//!
//! Evidence comes in two tiers. Primary holds the statutes themselves;
//! secondary holds enforcement decrees and rules, rendered as a separate
//! block of the prompt.

use std::sync::Arc;

use nomu_core::law::{IMPLEMENTING_SOURCES, SECTION_PENALTIES, SECTION_SUPPLEMENTARY, SourceKind};
use nomu_core::relations::related_for_records;
use nomu_core::{ArticleId, EvidenceRecord, EvidenceSet, Issue, QaPair};
use nomu_store::{ArticleRef, PrecedentKind, SearchRequest};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::citation::{CitationReport, extract_citations, repair_law_names, validate};
use crate::collector::EvidenceCollector;
use crate::context::{render_context, truncate_chars};
use crate::expansion::query_variants;
use crate::llm::{LanguageModel, Prompt};
use crate::prompts::{self, ConclusionInputs, NOT_IN_PROVIDED_DATA};

/// Shown when the model call fails; distinct from the no-evidence answer.
pub const CONCLUSION_FAILED: &str =
    "결론을 생성하는 중 문제가 발생했습니다. 잠시 후 다시 시도해 주세요.";

const NARROW_QUERY_CHARS: usize = 500;
const RELATED_ARTICLES: usize = 5;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConclusionResult {
    pub conclusion: String,
    /// First distinct article ids of the primary evidence.
    pub related_article_ids: Vec<ArticleId>,
    pub primary_evidence: Vec<EvidenceRecord>,
    pub secondary_evidence: Vec<EvidenceRecord>,
    pub validation: CitationReport,
    pub error: Option<String>,
}

pub struct ConclusionSynthesizer {
    collector: EvidenceCollector,
    model: Arc<dyn LanguageModel>,
}

impl ConclusionSynthesizer {
    pub fn new(collector: EvidenceCollector, model: Arc<dyn LanguageModel>) -> Self {
        Self { collector, model }
    }

    pub async fn conclude(&self, issue: &Issue, qa: &[QaPair], narrow_answers: &[String]) -> ConclusionResult {
        let config = self.collector.config();
        let narrow = narrow_answers.join(" ");
        let situation = Some(truncate_chars(narrow.trim(), NARROW_QUERY_CHARS)).filter(|s| !s.is_empty());
        let variants = query_variants(issue, situation, self.collector.vocabulary(), self.collector.xref());

        let retrieved = self
            .collector
            .retrieve(issue, situation, &variants, config.conclusion_top_k)
            .await;
        let retrieved = self.collector.ensure_quality(issue, situation, retrieved).await;

        let (mut primary, mut secondary): (Vec<_>, Vec<_>) =
            retrieved.into_iter().partition(|r| !is_implementing(r));

        let (widened, widened_implementing): (Vec<_>, Vec<_>) = self
            .widen(issue, &primary)
            .await
            .into_iter()
            .partition(|r| !is_implementing(r));
        primary = merge(primary, widened);
        secondary = merge(secondary, widened_implementing);

        let decree_query = variants.first().map(String::as_str).unwrap_or(issue.as_str());
        let request = SearchRequest::new(decree_query, config.decree_top_k)
            .sources(IMPLEMENTING_SOURCES.iter().copied())
            .excluding_main();
        secondary = merge(secondary, self.collector.search(&request).await);

        if primary.is_empty() && secondary.is_empty() {
            info!(issue = %issue, "no evidence, answering with the not-covered notice");
            return ConclusionResult {
                conclusion: NOT_IN_PROVIDED_DATA.to_string(),
                ..ConclusionResult::default()
            };
        }

        let related_article_ids = first_article_ids(&primary, RELATED_ARTICLES);
        let context = render_context(&primary, config.conclusion_context_chars);
        let decree_context = render_context(&secondary, config.decree_context_chars);
        let precedents = self.precedent_block(issue);
        let related_hint = related_hint(&primary);
        let law_names = law_names(primary.iter().chain(&secondary));

        let prompt = Prompt::new(
            prompts::conclusion_system(),
            prompts::conclusion_user(&ConclusionInputs {
                issue,
                qa,
                context: &context,
                decree_context: &decree_context,
                precedents: &precedents,
                related_hint: &related_hint,
                law_names: &law_names,
            }),
        )
        .max_tokens(config.conclusion_max_tokens);

        let text = match self.model.complete(&prompt).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => return failed(issue, "empty conclusion", related_article_ids, primary, secondary),
            Err(e) => return failed(issue, &e.to_string(), related_article_ids, primary, secondary),
        };

        let evidence: Vec<EvidenceRecord> = primary.iter().chain(&secondary).cloned().collect();
        let mut validation = validate(&text, &evidence);
        let mut conclusion = text;
        if validation.has_citations && !validation.has_law_names {
            let repaired = repair_law_names(&conclusion, &evidence);
            if repaired != conclusion {
                debug!(issue = %issue, "added law names to citations");
                validation = validate(&repaired, &evidence);
                conclusion = repaired;
            }
        }
        if !validation.unmatched_citations.is_empty() {
            warn!(
                issue = %issue,
                unmatched = ?validation.unmatched_citations,
                "conclusion cites articles outside the evidence"
            );
        }

        info!(
            issue = %issue,
            primary = primary.len(),
            secondary = secondary.len(),
            citations = validation.matched_citations.len(),
            has_law_names = validation.has_law_names,
            "conclusion synthesized"
        );
        ConclusionResult {
            conclusion,
            related_article_ids,
            primary_evidence: primary,
            secondary_evidence: secondary,
            validation,
            error: None,
        }
    }

    /// Related articles from the relation table, then penalties and
    /// supplementary provisions that cite the confirmed articles.
    async fn widen(&self, issue: &Issue, primary: &[EvidenceRecord]) -> Vec<EvidenceRecord> {
        if primary.is_empty() {
            return Vec::new();
        }
        let refs: Vec<ArticleRef> = related_for_records(primary)
            .into_iter()
            .map(|(law, article)| ArticleRef { law, article })
            .collect();
        let mut out = self.collector.fetch_refs(&refs).await;

        let confirmed: Vec<ArticleId> = primary.iter().filter_map(|r| r.article_id).collect();
        let mut sources: Vec<String> = Vec::new();
        for record in primary {
            if !sources.contains(&record.source) {
                sources.push(record.source.clone());
            }
        }
        let cited: Vec<String> = confirmed.iter().map(ArticleId::korean).collect();
        let query = format!("{} {SECTION_PENALTIES}", cited.join(" "));
        let request = SearchRequest::new(query, self.collector.config().conclusion_top_k).sources(sources);
        let penalties: Vec<EvidenceRecord> = self
            .collector
            .search(&request)
            .await
            .into_iter()
            .filter(is_penalty_or_supplementary)
            .filter(|r| extract_citations(&r.text).iter().any(|id| confirmed.contains(id)))
            .collect();
        debug!(
            issue = %issue,
            related = out.len(),
            penalties = penalties.len(),
            "widened conclusion evidence"
        );
        out.extend(penalties);
        out
    }

    /// Precedent and interpretation snippets for the issue, capped per kind.
    fn precedent_block(&self, issue: &Issue) -> String {
        let snippets = self.collector.xref().precedents_for(issue);
        let limit = self.collector.config().precedent_snippet_chars;
        let mut blocks = Vec::new();
        for kind in PrecedentKind::ALL {
            for snippet in snippets
                .iter()
                .filter(|s| s.kind == kind)
                .take(kind.max_per_conclusion())
            {
                blocks.push(format!(
                    "[{}] {}\n{}",
                    kind.label(),
                    snippet.title.trim(),
                    truncate_chars(snippet.summary.trim(), limit)
                ));
            }
        }
        blocks.join("\n\n")
    }
}

fn is_implementing(record: &EvidenceRecord) -> bool {
    matches!(record.kind(), SourceKind::Decree | SourceKind::Rule)
}

fn is_penalty_or_supplementary(record: &EvidenceRecord) -> bool {
    [SECTION_PENALTIES, SECTION_SUPPLEMENTARY]
        .iter()
        .any(|s| record.section.trim() == *s || record.chapter.contains(s))
}

fn merge(base: Vec<EvidenceRecord>, extra: Vec<EvidenceRecord>) -> Vec<EvidenceRecord> {
    let mut set = EvidenceSet::from_records(base);
    set.extend(extra);
    set.into_records()
}

fn first_article_ids(records: &[EvidenceRecord], n: usize) -> Vec<ArticleId> {
    let mut out: Vec<ArticleId> = Vec::new();
    for id in records.iter().filter_map(|r| r.article_id) {
        if out.len() == n {
            break;
        }
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// Relation-table neighbours that made it into the evidence, e.g. "근로기준법 제27조".
fn related_hint(primary: &[EvidenceRecord]) -> Vec<String> {
    related_for_records(primary)
        .into_iter()
        .filter(|(law, id)| {
            primary
                .iter()
                .any(|r| r.article_id == Some(*id) && r.law_name() == law.as_str())
        })
        .take(RELATED_ARTICLES)
        .map(|(law, id)| format!("{law} {}", id.korean()))
        .collect()
}

fn law_names<'a>(records: impl Iterator<Item = &'a EvidenceRecord>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for record in records {
        let law = record.citation_name();
        if !law.is_empty() && !out.contains(&law) {
            out.push(law);
        }
    }
    out
}

fn failed(
    issue: &Issue,
    error: &str,
    related_article_ids: Vec<ArticleId>,
    primary: Vec<EvidenceRecord>,
    secondary: Vec<EvidenceRecord>,
) -> ConclusionResult {
    warn!(issue = %issue, error, "conclusion generation failed");
    ConclusionResult {
        conclusion: CONCLUSION_FAILED.to_string(),
        related_article_ids,
        primary_evidence: primary,
        secondary_evidence: secondary,
        validation: CitationReport::default(),
        error: Some(error.to_string()),
    }
}
