//! Conversions between corpus rows and evidence records.
//!
//! Record batches come back from LanceDB with the `statute_articles` columns
//! plus `_distance` for vector searches. Filters are SQL predicates passed to
//! `only_if`.

use arrow::array::{Array, Float32Array, LargeStringArray, StringArray};
use arrow::record_batch::RecordBatch;
use nomu_core::{ArticleId, EvidenceRecord, corpus};

use crate::StoreError;
use crate::search::SearchRequest;

/// Convert result batches into evidence records, in row order.
pub fn records_from_batches(batches: &[RecordBatch]) -> Result<Vec<EvidenceRecord>, StoreError> {
    let mut out = Vec::new();
    for batch in batches {
        let text_col = batch
            .column_by_name(corpus::TEXT)
            .ok_or(StoreError::MissingColumn(corpus::TEXT))?;
        let source_col = batch
            .column_by_name(corpus::SOURCE)
            .ok_or(StoreError::MissingColumn(corpus::SOURCE))?;
        let article_col = batch.column_by_name(corpus::ARTICLE_ID);
        let chapter_col = batch.column_by_name(corpus::CHAPTER);
        let section_col = batch.column_by_name(corpus::SECTION);
        let distance_col = batch
            .column_by_name(corpus::DISTANCE)
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

        for row in 0..batch.num_rows() {
            let Some(text) = get_string(text_col.as_ref(), row) else {
                continue;
            };
            let source = get_string(source_col.as_ref(), row).unwrap_or_default();
            let article_id = article_col
                .and_then(|c| get_string(c.as_ref(), row))
                .and_then(|s| ArticleId::parse(&s));
            let chapter = chapter_col
                .and_then(|c| get_string(c.as_ref(), row))
                .unwrap_or_default();
            let section = section_col
                .and_then(|c| get_string(c.as_ref(), row))
                .unwrap_or_default();
            let distance = distance_col
                .filter(|c| !c.is_null(row))
                .map(|c| c.value(row))
                .unwrap_or(0.0);

            out.push(EvidenceRecord {
                text,
                source,
                article_id,
                chapter,
                section,
                distance,
            });
        }
    }
    Ok(out)
}

/// SQL predicate for a search request, or `None` when unrestricted.
pub fn where_clause(request: &SearchRequest) -> Option<String> {
    let mut clauses = Vec::new();
    if !request.filter_sources.is_empty() {
        clauses.push(format!(
            "{} IN ({})",
            corpus::SOURCE,
            sql_list(&request.filter_sources)
        ));
    }
    if !request.exclude_sections.is_empty() {
        clauses.push(format!(
            "({col} IS NULL OR {col} NOT IN ({list}))",
            col = corpus::SECTION,
            list = sql_list(&request.exclude_sections)
        ));
    }
    if !request.exclude_chapters.is_empty() {
        clauses.push(format!(
            "({col} IS NULL OR {col} NOT IN ({list}))",
            col = corpus::CHAPTER,
            list = sql_list(&request.exclude_chapters)
        ));
    }
    (!clauses.is_empty()).then(|| clauses.join(" AND "))
}

/// SQL predicate selecting articles by normalized id.
pub fn article_clause(ids: &[ArticleId], sources: &[String]) -> String {
    let ids: Vec<String> = ids.iter().map(ArticleId::to_string).collect();
    let mut clause = format!("{} IN ({})", corpus::ARTICLE_ID, sql_list(&ids));
    if !sources.is_empty() {
        clause.push_str(&format!(" AND {} IN ({})", corpus::SOURCE, sql_list(sources)));
    }
    clause
}

fn sql_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("'{}'", sql_escape(v)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escape a string for use in SQL single-quoted literals.
fn sql_escape(s: &str) -> String {
    s.replace('\'', "''")
}

fn get_string(col: &dyn Array, row: usize) -> Option<String> {
    if col.is_null(row) {
        return None;
    }
    col.as_any()
        .downcast_ref::<StringArray>()
        .map(|arr| arr.value(row).to_string())
        .or_else(|| {
            col.as_any()
                .downcast_ref::<LargeStringArray>()
                .map(|arr| arr.value(row).to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{DataType, Field, Schema};
    use nomu_core::law::SOURCE_LAW;
    use std::sync::Arc;

    fn batch(rows: &[(&str, &str, Option<&str>, Option<&str>, f32)]) -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new(corpus::TEXT, DataType::Utf8, false),
            Field::new(corpus::SOURCE, DataType::Utf8, false),
            Field::new(corpus::ARTICLE_ID, DataType::Utf8, true),
            Field::new(corpus::SECTION, DataType::Utf8, true),
            Field::new(corpus::DISTANCE, DataType::Float32, true),
        ]);
        let text: StringArray = rows.iter().map(|r| Some(r.0)).collect();
        let source: StringArray = rows.iter().map(|r| Some(r.1)).collect();
        let article: StringArray = rows.iter().map(|r| r.2).collect();
        let section: StringArray = rows.iter().map(|r| r.3).collect();
        let distance: Float32Array = rows.iter().map(|r| Some(r.4)).collect();
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(text),
                Arc::new(source),
                Arc::new(article),
                Arc::new(section),
                Arc::new(distance),
            ],
        )
        .unwrap()
    }

    #[test]
    fn converts_rows() {
        let b = batch(&[
            ("해고의 예고", SOURCE_LAW, Some("제26조(해고의 예고)"), None, 0.12),
            ("벌칙 본문", SOURCE_LAW, None, Some("벌칙"), 0.5),
        ]);
        let records = records_from_batches(&[b]).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].article_id, ArticleId::parse("Art.26"));
        assert_eq!(records[0].chapter, "");
        assert!((records[0].distance - 0.12).abs() < 1e-6);
        assert_eq!(records[1].article_id, None);
        assert_eq!(records[1].section, "벌칙");
    }

    #[test]
    fn missing_text_column_errors() {
        let schema = Schema::new(vec![Field::new(corpus::SOURCE, DataType::Utf8, false)]);
        let source: StringArray = vec![Some(SOURCE_LAW)].into_iter().collect();
        let b = RecordBatch::try_new(Arc::new(schema), vec![Arc::new(source)]).unwrap();
        assert!(matches!(
            records_from_batches(&[b]),
            Err(StoreError::MissingColumn("text"))
        ));
    }

    #[test]
    fn where_clause_combines_filters() {
        let req = SearchRequest::new("q", 5)
            .sources([SOURCE_LAW])
            .excluding_main();
        let clause = where_clause(&req).unwrap();
        assert_eq!(
            clause,
            "source IN ('근로기준법(법률)') AND (section IS NULL OR section NOT IN ('벌칙', '부칙')) \
             AND (chapter IS NULL OR chapter NOT IN ('제1장 총칙'))"
        );
        assert!(where_clause(&SearchRequest::new("q", 5)).is_none());
    }

    #[test]
    fn article_clause_escapes() {
        let ids = [ArticleId::parse("제43조의2").unwrap()];
        let clause = article_clause(&ids, &["O'Law(statute)".to_string()]);
        assert_eq!(
            clause,
            "article_id IN ('Art.43-2') AND source IN ('O''Law(statute)')"
        );
    }
}
