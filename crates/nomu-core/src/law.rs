//! Law sources: the statutes the corpus is built from and how to read their names.
//!
//! A source string is the law name followed by a kind tag, e.g.
//! "근로기준법(법률)" or "근로기준법(시행령)". The kind tag distinguishes the
//! statute from its enforcement decree and rule.

use std::collections::HashMap;

/// Sections that carry no actionable rule for classification or checklists.
/// They are reintroduced only for the conclusion.
pub const SECTION_PENALTIES: &str = "벌칙";
pub const SECTION_SUPPLEMENTARY: &str = "부칙";
pub const EXCLUDE_SECTIONS_MAIN: &[&str] = &[SECTION_PENALTIES, SECTION_SUPPLEMENTARY];

/// General-definitions chapter, excluded from main retrieval.
pub const CHAPTER_GENERAL: &str = "제1장 총칙";
pub const EXCLUDE_CHAPTERS_MAIN: &[&str] = &[CHAPTER_GENERAL];

// ── Individual labor relations ──
pub const SOURCE_LAW: &str = "근로기준법(법률)";
pub const SOURCE_DECREE: &str = "근로기준법(시행령)";
pub const SOURCE_RULE: &str = "근로기준법(시행규칙)";
pub const SOURCE_MIN_WAGE_LAW: &str = "최저임금법(법률)";
pub const SOURCE_RETIREMENT_LAW: &str = "근로자퇴직급여 보장법(법률)";
pub const SOURCE_GENDER_EQUALITY_LAW: &str =
    "남녀고용평등과 일·가정 양립 지원에 관한 법률(법률)";
pub const SOURCE_PART_TIME_LAW: &str = "기간제 및 단시간근로자 보호 등에 관한 법률(법률)";

// ── Collective labor relations ──
pub const SOURCE_UNION_LAW: &str = "노동조합 및 노동관계조정법(법률)";
pub const SOURCE_PARTICIPATION_LAW: &str = "근로자참여 및 협력증진에 관한 법률(법률)";

// ── Labor market ──
pub const SOURCE_SAFETY_LAW: &str = "산업안전보건법(법률)";
pub const SOURCE_EMPLOYMENT_INSURANCE_LAW: &str = "고용보험법(법률)";
pub const SOURCE_JOB_STABILITY_LAW: &str = "직업안정법(법률)";
pub const SOURCE_INDUSTRIAL_ACCIDENT_LAW: &str = "산업재해보상보험법(법률)";

/// Every statute-tier source searched by default.
pub const ALL_LABOR_LAW_SOURCES: &[&str] = &[
    SOURCE_LAW,
    SOURCE_MIN_WAGE_LAW,
    SOURCE_RETIREMENT_LAW,
    SOURCE_GENDER_EQUALITY_LAW,
    SOURCE_PART_TIME_LAW,
    SOURCE_UNION_LAW,
    SOURCE_PARTICIPATION_LAW,
    SOURCE_SAFETY_LAW,
    SOURCE_EMPLOYMENT_INSURANCE_LAW,
    SOURCE_JOB_STABILITY_LAW,
    SOURCE_INDUSTRIAL_ACCIDENT_LAW,
];

/// Implementing regulations kept in a separate context block for conclusions.
pub const IMPLEMENTING_SOURCES: &[&str] = &[SOURCE_DECREE, SOURCE_RULE];

/// Built-in issue → preferred sources. The cross-reference cache may override.
pub const ISSUE_TO_LAW_MAPPING: &[(&str, &[&str])] = &[
    ("최저임금", &[SOURCE_MIN_WAGE_LAW, SOURCE_LAW]),
    (
        "산재",
        &[SOURCE_INDUSTRIAL_ACCIDENT_LAW, SOURCE_SAFETY_LAW, SOURCE_LAW],
    ),
    ("산업안전", &[SOURCE_SAFETY_LAW, SOURCE_INDUSTRIAL_ACCIDENT_LAW]),
    ("노조", &[SOURCE_UNION_LAW]),
    ("남녀고용평등", &[SOURCE_GENDER_EQUALITY_LAW, SOURCE_LAW]),
    ("육아휴직", &[SOURCE_GENDER_EQUALITY_LAW, SOURCE_LAW]),
    ("퇴직금", &[SOURCE_RETIREMENT_LAW, SOURCE_LAW]),
    ("고용보험", &[SOURCE_EMPLOYMENT_INSURANCE_LAW, SOURCE_LAW]),
    ("임금", &[SOURCE_LAW]),
    ("근로시간", &[SOURCE_LAW]),
    ("직장 내 괴롭힘", &[SOURCE_LAW]),
    ("해고/징계", &[SOURCE_LAW]),
    ("휴일/휴가", &[SOURCE_LAW]),
    ("근로계약", &[SOURCE_LAW, SOURCE_PART_TIME_LAW]),
];

/// Tier of a source, read from its kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Statute,
    Decree,
    Rule,
    Other,
}

impl SourceKind {
    pub fn of(source: &str) -> Self {
        match kind_tag(source) {
            Some("법률" | "statute") => Self::Statute,
            Some("시행령" | "decree") => Self::Decree,
            Some("시행규칙" | "rule") => Self::Rule,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Statute => "statute",
            Self::Decree => "decree",
            Self::Rule => "rule",
            Self::Other => "other",
        }
    }
}

/// Law name without its kind tag: "근로기준법(법률)" → "근로기준법".
pub fn law_name(source: &str) -> &str {
    let source = source.trim();
    match (source.strip_suffix(')'), kind_tag(source)) {
        (Some(_), Some(tag)) => source[..source.len() - tag.len() - 2].trim_end(),
        _ => source,
    }
}

/// Name to cite a source's articles by. Statutes use the bare law name;
/// decrees and rules keep their tier: "근로기준법(시행령)" → "근로기준법 시행령".
pub fn citation_name(source: &str) -> String {
    let law = law_name(source);
    match (SourceKind::of(source), kind_tag(source)) {
        (SourceKind::Decree | SourceKind::Rule, Some(tag)) => format!("{law} {tag}"),
        _ => law.to_string(),
    }
}

/// Kind tags a source may carry after its law name.
const KIND_TAGS: &[&str] = &["법률", "시행령", "시행규칙", "statute", "decree", "rule"];

/// Every source spelling under `law`: the bare name and each tagged form.
pub fn sources_of_law(law: &str) -> Vec<String> {
    let law = law.trim();
    std::iter::once(law.to_string())
        .chain(KIND_TAGS.iter().map(|tag| format!("{law}({tag})")))
        .collect()
}

fn kind_tag(source: &str) -> Option<&str> {
    let inner = source.trim().strip_suffix(')')?;
    let open = inner.rfind('(')?;
    let tag = &inner[open + 1..];
    (!tag.is_empty()).then_some(tag)
}

/// Built-in issue → preferred sources as owned strings.
pub fn default_issue_sources() -> HashMap<String, Vec<String>> {
    ISSUE_TO_LAW_MAPPING
        .iter()
        .map(|(issue, sources)| {
            (
                issue.to_string(),
                sources.iter().map(|s| s.to_string()).collect(),
            )
        })
        .collect()
}
