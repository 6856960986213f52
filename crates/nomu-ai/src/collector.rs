//! Evidence collection for one issue.
//!
//! Retrieval runs in stages:
//! 1. expand the query (situation-anchored + statute vocabulary)
//! 2. spread `total_k` across the issue's preferred law sources, one
//!    concurrent query per (source, variant)
//! 3. top up across every labor-law source when retrieval came back thin
//! 4. dedup by (source, article)
//! 5. enrich when the quality gate fails (cross references, relation table,
//!    broad query, in that order)
//! 6. re-rank by issue relevance
//!
//! Store failures are logged and treated as empty results.

use std::sync::Arc;

use futures::future::join_all;
use nomu_core::law::{ALL_LABOR_LAW_SOURCES, SourceKind, law_name, sources_of_law};
use nomu_core::relations::related_for_records;
use nomu_core::{ArticleId, CounselConfig, EvidenceRecord, EvidenceSet, Issue, IssueVocabulary, dedup, source_diversity};
use nomu_store::{ArticleRef, EvidenceStore, SearchRequest, XrefCache};
use tracing::{debug, info, warn};

use crate::expansion::{k_per_law, lookup_terms, mapped_sources, query_variants};
use crate::relevance::filter_or_keep;

/// Records examined by the relation-table strategy.
const RELATION_SEED_RECORDS: usize = 5;
/// Extra records requested by the broad-query strategy.
const BROAD_QUERY_EXTRA: usize = 5;

/// Outcome of the evidence quality gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quality {
    pub count: usize,
    pub diversity: usize,
    pub score: f32,
}

impl Quality {
    pub fn of(records: &[EvidenceRecord]) -> Self {
        let count = records.len();
        let diversity = source_diversity(records);
        let score = (count as f32 / 10.0 * 0.6 + diversity as f32 / 3.0 * 0.4).min(1.0);
        Self {
            count,
            diversity,
            score,
        }
    }

    pub fn needs_enrichment(&self) -> bool {
        self.count < 8 || self.diversity < 1 || self.score < 0.6
    }
}

/// Ways to widen a thin evidence set, tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enrichment {
    /// Articles that use the issue's legal terms.
    TermCrossReference,
    /// Articles the relation table links to the top records.
    RelationTable,
    /// An unrestricted query for more of the same.
    BroadQuery,
}

impl Enrichment {
    pub const ORDER: [Enrichment; 3] = [
        Self::TermCrossReference,
        Self::RelationTable,
        Self::BroadQuery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TermCrossReference => "term_xref",
            Self::RelationTable => "relation_table",
            Self::BroadQuery => "broad_query",
        }
    }
}

/// Shared retrieval machinery. Cheap to clone.
#[derive(Clone)]
pub struct EvidenceCollector {
    store: Arc<dyn EvidenceStore>,
    vocabulary: Arc<IssueVocabulary>,
    xref: Arc<XrefCache>,
    config: Arc<CounselConfig>,
}

impl EvidenceCollector {
    pub fn new(
        store: Arc<dyn EvidenceStore>,
        vocabulary: Arc<IssueVocabulary>,
        xref: Arc<XrefCache>,
        config: Arc<CounselConfig>,
    ) -> Self {
        Self {
            store,
            vocabulary,
            xref,
            config,
        }
    }

    pub fn vocabulary(&self) -> &IssueVocabulary {
        &self.vocabulary
    }

    pub fn xref(&self) -> &XrefCache {
        &self.xref
    }

    pub fn config(&self) -> &CounselConfig {
        &self.config
    }

    /// Full collection for `issue`: retrieval, quality gate, relevance filter.
    pub async fn collect(&self, issue: &Issue, situation: Option<&str>) -> Vec<EvidenceRecord> {
        let variants = query_variants(issue, situation, &self.vocabulary, &self.xref);
        let records = self
            .retrieve(issue, situation, &variants, self.config.main_top_k)
            .await;
        let records = self.ensure_quality(issue, situation, records).await;
        let filtered = self.filter(records, issue);
        info!(issue = %issue, count = filtered.len(), "collected evidence");
        filtered
    }

    /// Source-balanced retrieval with top-up and dedup, no quality gate.
    pub async fn retrieve(
        &self,
        issue: &Issue,
        situation: Option<&str>,
        variants: &[String],
        total_k: usize,
    ) -> Vec<EvidenceRecord> {
        let sources = self.preferred_sources(issue, situation).await;
        let mut set = EvidenceSet::from_records(self.balanced(&sources, variants, total_k).await);

        if set.len() < total_k / 2 {
            let Some(query) = variants.first() else {
                return set.into_records();
            };
            let remainder = total_k - set.len();
            let request = SearchRequest::new(query.clone(), remainder)
                .sources(ALL_LABOR_LAW_SOURCES.iter().copied())
                .excluding_main();
            let added = set.extend(self.search(&request).await);
            debug!(issue = %issue, added, "top-up across all labor-law sources");
        }
        set.into_records()
    }

    /// Issue's preferred sources, plus sources inferred from term→article
    /// cross references.
    pub async fn preferred_sources(&self, issue: &Issue, situation: Option<&str>) -> Vec<String> {
        let mut sources = mapped_sources(issue, &self.xref);
        let refs = self
            .xref
            .articles_for_terms(lookup_terms(issue, situation, &self.xref));
        if refs.is_empty() {
            return sources;
        }
        for record in self.fetch_refs(&refs).await {
            if record.kind() == SourceKind::Statute && !sources.contains(&record.source) {
                sources.push(record.source);
            }
        }
        sources
    }

    async fn balanced(
        &self,
        sources: &[String],
        variants: &[String],
        total_k: usize,
    ) -> Vec<EvidenceRecord> {
        match sources {
            [] => {
                let requests: Vec<SearchRequest> = variants
                    .iter()
                    .map(|q| SearchRequest::new(q.clone(), total_k).excluding_main())
                    .collect();
                self.search_all(&requests).await
            }
            [only] => {
                let bare = law_name(only).to_string();
                let requests: Vec<SearchRequest> = variants
                    .iter()
                    .map(|q| {
                        SearchRequest::new(q.clone(), total_k)
                            .sources([only.clone(), bare.clone()])
                            .excluding_main()
                    })
                    .collect();
                self.search_all(&requests).await
            }
            many => {
                let k = k_per_law(total_k, many.len());
                let requests: Vec<SearchRequest> = many
                    .iter()
                    .flat_map(|source| {
                        variants.iter().map(move |q| {
                            SearchRequest::new(q.clone(), k)
                                .sources([source.clone()])
                                .excluding_main()
                        })
                    })
                    .collect();
                debug!(sources = many.len(), k_per_law = k, "source-balanced retrieval");
                self.search_all(&requests).await
            }
        }
    }

    /// Run the enrichment strategies in order until the gate passes.
    pub async fn ensure_quality(
        &self,
        issue: &Issue,
        situation: Option<&str>,
        records: Vec<EvidenceRecord>,
    ) -> Vec<EvidenceRecord> {
        let before = Quality::of(&records);
        if !before.needs_enrichment() {
            return records;
        }
        let mut set = EvidenceSet::from_records(records);
        for strategy in Enrichment::ORDER {
            let added = self.enrich(strategy, issue, situation, &mut set).await;
            let now = Quality::of(set.records());
            debug!(
                issue = %issue,
                strategy = strategy.as_str(),
                added,
                count = now.count,
                score = now.score,
                "enrichment"
            );
            if !now.needs_enrichment() {
                break;
            }
        }
        set.into_records()
    }

    /// Apply one strategy; returns the number of new records.
    pub async fn enrich(
        &self,
        strategy: Enrichment,
        issue: &Issue,
        situation: Option<&str>,
        set: &mut EvidenceSet,
    ) -> usize {
        let limit = self.config.max_additional;
        let candidates = match strategy {
            Enrichment::TermCrossReference => {
                let refs = self
                    .xref
                    .articles_for_terms(lookup_terms(issue, situation, &self.xref));
                main_stage(self.fetch_refs(&refs).await)
            }
            Enrichment::RelationTable => {
                let seeds = &set.records()[..set.len().min(RELATION_SEED_RECORDS)];
                let refs: Vec<ArticleRef> = related_for_records(seeds)
                    .into_iter()
                    .map(|(law, article)| ArticleRef { law, article })
                    .collect();
                main_stage(self.fetch_refs(&refs).await)
            }
            Enrichment::BroadQuery => {
                let query = match situation.map(str::trim).filter(|s| !s.is_empty()) {
                    Some(s) => format!("{s} {issue}"),
                    None => issue.to_string(),
                };
                let request = SearchRequest::new(query, set.len() + BROAD_QUERY_EXTRA)
                    .excluding_main();
                self.search(&request).await
            }
        };
        let fresh: Vec<EvidenceRecord> = candidates
            .into_iter()
            .filter(|r| !set.contains(r))
            .take(limit)
            .collect();
        set.extend(fresh)
    }

    /// Add cross-referenced articles for the issue and the top records'
    /// defined terms.
    pub async fn cross_reference(&self, issue: &Issue, records: Vec<EvidenceRecord>) -> Vec<EvidenceRecord> {
        let mut terms: Vec<&str> = lookup_terms(issue, None, &self.xref);
        for record in records.iter().take(3) {
            if let Some(id) = record.article_id {
                for term in self.xref.terms_for_article(record.law_name(), id) {
                    if !terms.contains(&term.as_str()) {
                        terms.push(term);
                    }
                }
            }
        }
        let refs = self.xref.articles_for_terms(terms);
        let mut set = EvidenceSet::from_records(records);
        if refs.is_empty() {
            return set.into_records();
        }
        let fresh: Vec<EvidenceRecord> = main_stage(self.fetch_refs(&refs).await)
            .into_iter()
            .filter(|r| !set.contains(r))
            .take(self.config.max_additional)
            .collect();
        let added = set.extend(fresh);
        debug!(issue = %issue, added, "cross-referenced articles");
        set.into_records()
    }

    /// Re-rank by relevance; keep the unfiltered list when nothing scores.
    pub fn filter(&self, records: Vec<EvidenceRecord>, issue: &Issue) -> Vec<EvidenceRecord> {
        filter_or_keep(records, issue, &self.vocabulary, self.config.filter_top_k)
    }

    /// Passages of the referenced articles, keeping only the referenced law's.
    ///
    /// One lookup per law, restricted to that law's sources, so a popular
    /// article number in other statutes cannot crowd the wanted row out.
    /// Sections and chapters are not excluded; main-stage callers pass the
    /// result through [`main_stage`].
    pub async fn fetch_refs(&self, refs: &[ArticleRef]) -> Vec<EvidenceRecord> {
        let mut laws: Vec<&str> = Vec::new();
        for r in refs {
            if !laws.contains(&r.law.as_str()) {
                laws.push(&r.law);
            }
        }
        let lookups = laws.into_iter().map(|law| {
            let mut ids: Vec<ArticleId> = Vec::new();
            for r in refs.iter().filter(|r| r.law == law) {
                if !ids.contains(&r.article) {
                    ids.push(r.article);
                }
            }
            let sources = sources_of_law(law);
            async move { self.fetch_articles(&ids, &sources).await }
        });
        let records = join_all(lookups).await;
        dedup(records.into_iter().flatten().filter(|record| {
            record.article_id.is_some_and(|id| {
                refs.iter()
                    .any(|r| r.article == id && r.law == record.law_name())
            })
        }))
    }

    pub async fn fetch_articles(&self, ids: &[ArticleId], sources: &[String]) -> Vec<EvidenceRecord> {
        if ids.is_empty() {
            return Vec::new();
        }
        match self.store.search_by_article_ids(ids, sources).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, ids = ids.len(), "article lookup failed");
                Vec::new()
            }
        }
    }

    /// One store query; failures are logged and yield nothing.
    pub async fn search(&self, request: &SearchRequest) -> Vec<EvidenceRecord> {
        match self.store.search(request).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, top_k = request.top_k, "evidence search failed");
                Vec::new()
            }
        }
    }

    /// Concurrent queries merged in request order, deduplicated.
    pub async fn search_all(&self, requests: &[SearchRequest]) -> Vec<EvidenceRecord> {
        let results = join_all(requests.iter().map(|r| self.search(r))).await;
        dedup(results.into_iter().flatten())
    }
}

/// Drop penalties, supplementary provisions, and the general chapter.
pub fn main_stage(records: Vec<EvidenceRecord>) -> Vec<EvidenceRecord> {
    let main = SearchRequest::default().excluding_main();
    records.into_iter().filter(|r| main.admits(r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{corpus, record, store_with};
    use nomu_core::law::{SOURCE_LAW, SOURCE_MIN_WAGE_LAW, SOURCE_SAFETY_LAW};
    use nomu_store::MemoryStore;

    fn collector(store: Arc<dyn EvidenceStore>, xref: XrefCache) -> EvidenceCollector {
        EvidenceCollector::new(
            store,
            Arc::new(IssueVocabulary::default()),
            Arc::new(xref),
            Arc::new(CounselConfig::default()),
        )
    }

    fn issue(label: &str) -> Issue {
        IssueVocabulary::default().issue(label).unwrap()
    }

    #[test]
    fn quality_formula() {
        let few = vec![record(SOURCE_LAW, "제1조", "a"); 1];
        let q = Quality::of(&few);
        assert!((q.score - (0.06 + 0.4 / 3.0)).abs() < 1e-6);
        assert!(q.needs_enrichment());

        let many: Vec<_> = (1..=10)
            .map(|n| record(if n % 2 == 0 { SOURCE_LAW } else { SOURCE_MIN_WAGE_LAW }, &format!("제{n}조"), "a"))
            .collect();
        let q = Quality::of(&many);
        assert_eq!(q.diversity, 2);
        assert!(!q.needs_enrichment());
        assert!(Quality::of(&[]).needs_enrichment());
    }

    #[tokio::test]
    async fn dismissal_collection_finds_notice_article() {
        let c = collector(Arc::new(corpus()), XrefCache::empty());
        let records = c
            .collect(&issue("해고/징계"), Some("회사에서 30일 통보 없이 해고당했어요"))
            .await;
        assert!(records.iter().any(|r| r.article_id == ArticleId::parse("제26조")));
        assert!(records.iter().all(|r| r.section != "벌칙" && r.section != "부칙"));
        assert!(records.iter().all(|r| r.chapter != "제1장 총칙"));
    }

    #[tokio::test]
    async fn balances_across_mapped_sources() {
        let c = collector(Arc::new(corpus()), XrefCache::empty());
        let min_wage = issue("최저임금");
        let variants = vec!["최저임금 수습 임금".to_string()];
        let records = c.retrieve(&min_wage, None, &variants, 10).await;
        assert!(records.iter().any(|r| r.source == SOURCE_MIN_WAGE_LAW));
        assert!(records.iter().any(|r| r.source == SOURCE_LAW));
    }

    #[tokio::test]
    async fn top_up_when_thin() {
        // The mapped source has nothing relevant; top-up draws from the rest.
        let store = store_with(vec![
            record(SOURCE_SAFETY_LAW, "제52조", "근로자는 산업재해가 발생할 급박한 위험이 있는 경우 작업을 중지하고 대피할 수 있다."),
            record(SOURCE_SAFETY_LAW, "제51조", "사업주는 산업재해가 발생할 급박한 위험이 있을 때에는 즉시 작업을 중지시켜야 한다."),
        ]);
        let c = collector(Arc::new(store), XrefCache::empty());
        let records = c
            .retrieve(&issue("노조"), None, &["작업 중지 위험".to_string()], 10)
            .await;
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn infers_sources_from_cross_references() {
        let xref = XrefCache::from_json_str(
            r#"{"term_articles": {"임금": [{"law": "최저임금법", "article": "제6조"}]}}"#,
        )
        .unwrap();
        let c = collector(Arc::new(corpus()), xref);
        let sources = c.preferred_sources(&issue("임금"), None).await;
        assert_eq!(sources, vec![SOURCE_LAW.to_string(), SOURCE_MIN_WAGE_LAW.to_string()]);
        let sources = c.preferred_sources(&issue("근로시간"), None).await;
        assert_eq!(sources, vec![SOURCE_LAW.to_string()]);
    }

    #[tokio::test]
    async fn relation_table_enrichment_adds_linked_articles() {
        let c = collector(Arc::new(corpus()), XrefCache::empty());
        let mut set = EvidenceSet::from_records(vec![record(SOURCE_LAW, "제26조", "해고의 예고")]);
        let added = c
            .enrich(Enrichment::RelationTable, &issue("해고/징계"), None, &mut set)
            .await;
        assert!(added > 0);
        assert!(set.records().iter().any(|r| r.article_id == ArticleId::parse("제27조")));
    }

    #[tokio::test]
    async fn enrichment_respects_limit() {
        let many: Vec<_> = (1..=60)
            .map(|n| record(SOURCE_LAW, &format!("제{}조", 100 + n), "해고 관련 조문"))
            .collect();
        let c = EvidenceCollector::new(
            Arc::new(MemoryStore::new(many)),
            Arc::new(IssueVocabulary::default()),
            Arc::new(XrefCache::empty()),
            Arc::new(CounselConfig {
                max_additional: 4,
                ..CounselConfig::default()
            }),
        );
        let mut set = EvidenceSet::new();
        set.push(record(SOURCE_LAW, "제101조", "해고 관련 조문"));
        let added = c
            .enrich(Enrichment::BroadQuery, &issue("해고/징계"), None, &mut set)
            .await;
        assert_eq!(added, 4);
    }

    #[tokio::test]
    async fn cross_reference_uses_article_terms() {
        let xref = XrefCache::from_json_str(
            r#"{
                "term_articles": {"통상임금": [{"law": "근로기준법", "article": "제36조"}]},
                "article_terms": [{"law": "근로기준법", "article": "제26조", "terms": ["통상임금"]}]
            }"#,
        )
        .unwrap();
        let c = collector(Arc::new(corpus()), xref);
        let out = c
            .cross_reference(&issue("해고/징계"), vec![record(SOURCE_LAW, "제26조", "해고의 예고")])
            .await;
        assert!(out.iter().any(|r| r.article_id == ArticleId::parse("제36조")));
    }

    const DISMISSAL_XREF: &str = r#"{"term_articles": {"해고": [
        {"law": "근로기준법", "article": "제110조"},
        {"law": "근로기준법", "article": "제1조"},
        {"law": "근로기준법", "article": "제27조"}
    ]}}"#;

    fn outside_main_stage(r: &EvidenceRecord) -> bool {
        r.section == "벌칙" || r.chapter == "제1장 총칙"
    }

    #[tokio::test]
    async fn term_enrichment_skips_penalties_and_general_provisions() {
        let c = collector(Arc::new(corpus()), XrefCache::from_json_str(DISMISSAL_XREF).unwrap());
        let mut set = EvidenceSet::from_records(vec![record(SOURCE_LAW, "제26조", "해고의 예고")]);
        let added = c
            .enrich(Enrichment::TermCrossReference, &issue("해고/징계"), None, &mut set)
            .await;
        assert_eq!(added, 1);
        assert!(set.records().iter().any(|r| r.article_id == ArticleId::parse("제27조")));
        assert!(!set.records().iter().any(outside_main_stage));
    }

    #[tokio::test]
    async fn cross_reference_skips_penalties_and_general_provisions() {
        let c = collector(Arc::new(corpus()), XrefCache::from_json_str(DISMISSAL_XREF).unwrap());
        let out = c
            .cross_reference(&issue("해고/징계"), vec![record(SOURCE_LAW, "제26조", "해고의 예고")])
            .await;
        assert!(out.iter().any(|r| r.article_id == ArticleId::parse("제27조")));
        assert!(!out.iter().any(outside_main_stage));
    }

    #[tokio::test]
    async fn quality_pass_keeps_main_stage_only() {
        let c = collector(Arc::new(corpus()), XrefCache::from_json_str(DISMISSAL_XREF).unwrap());
        let records = c.ensure_quality(&issue("해고/징계"), None, Vec::new()).await;
        assert!(!records.is_empty());
        assert!(!records.iter().any(outside_main_stage));
    }

    /// Returns at most one row per requested article, like a row-limited table scan.
    struct OneRowPerArticle(MemoryStore);

    #[async_trait::async_trait]
    impl EvidenceStore for OneRowPerArticle {
        async fn search(&self, request: &SearchRequest) -> Result<Vec<EvidenceRecord>, nomu_store::StoreError> {
            self.0.search(request).await
        }

        async fn search_by_article_ids(
            &self,
            ids: &[ArticleId],
            sources: &[String],
        ) -> Result<Vec<EvidenceRecord>, nomu_store::StoreError> {
            let mut rows = self.0.search_by_article_ids(ids, sources).await?;
            rows.truncate(ids.len());
            Ok(rows)
        }
    }

    #[tokio::test]
    async fn article_lookup_is_scoped_to_the_referenced_law() {
        let store = OneRowPerArticle(store_with(vec![
            record(SOURCE_SAFETY_LAW, "제27조", "산업안전보건법 제27조"),
            record(SOURCE_MIN_WAGE_LAW, "제27조", "최저임금법 제27조"),
            record(SOURCE_LAW, "제27조", "해고사유 등의 서면통지"),
            record(SOURCE_MIN_WAGE_LAW, "제6조", "최저임금의 효력"),
        ]));
        let c = collector(Arc::new(store), XrefCache::empty());
        let refs = [
            ArticleRef { law: "근로기준법".into(), article: ArticleId::parse("제27조").unwrap() },
            ArticleRef { law: "최저임금법".into(), article: ArticleId::parse("제6조").unwrap() },
        ];
        let records = c.fetch_refs(&refs).await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().any(|r| r.source == SOURCE_LAW && r.text == "해고사유 등의 서면통지"));
        assert!(records.iter().any(|r| r.source == SOURCE_MIN_WAGE_LAW && r.article_id == ArticleId::parse("제6조")));
    }

    #[tokio::test]
    async fn store_failure_is_swallowed() {
        let c = collector(Arc::new(crate::testing::FailingStore), XrefCache::empty());
        assert!(c.collect(&issue("임금"), Some("월급을 못 받았어요")).await.is_empty());
    }
}
