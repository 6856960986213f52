//! The closed issue vocabulary.
//!
//! An [`Issue`] can only be obtained from an [`IssueVocabulary`], so every
//! issue that reaches retrieval, prompts, or session state is already on the
//! allow-list. Free-text phrases (user situations, model output) go through
//! [`IssueVocabulary::normalize`] or [`IssueVocabulary::match_situation`].

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error("vocabulary has no labels")]
    Empty,
    #[error("synonym {phrase:?} maps to unknown label {label:?}")]
    UnknownLabel { phrase: String, label: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A canonical issue label from the allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Issue(String);

impl Issue {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Slash-separated parts of a compound label: "해고/징계" → ["해고", "징계"].
    pub fn parts(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').map(str::trim).filter(|p| !p.is_empty())
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Default primary labels, in display order.
const DEFAULT_LABELS: &[&str] = &[
    "퇴직금",
    "임금",
    "해고/징계",
    "근로계약",
    "휴일/휴가",
    "근로시간",
    "직장 내 괴롭힘",
    "산재",
    "산업안전",
    "노조",
    "최저임금",
    "남녀고용평등",
    "육아휴직",
    "고용보험",
];

/// Everyday phrase → label.
const DEFAULT_SYNONYMS: &[(&str, &str)] = &[
    ("퇴직급여", "퇴직금"),
    ("퇴직연금", "퇴직금"),
    ("퇴직 수당", "퇴직금"),
    ("월급", "임금"),
    ("급여", "임금"),
    ("급료", "임금"),
    ("임금체불", "임금"),
    ("체불", "임금"),
    ("밀린 돈", "임금"),
    ("돈을 못 받", "임금"),
    ("수당", "임금"),
    ("주휴수당", "임금"),
    ("상여금", "임금"),
    ("해고", "해고/징계"),
    ("짤렸", "해고/징계"),
    ("잘렸", "해고/징계"),
    ("나가라고", "해고/징계"),
    ("권고사직", "해고/징계"),
    ("징계", "해고/징계"),
    ("정직", "해고/징계"),
    ("감봉", "해고/징계"),
    ("해고예고", "해고/징계"),
    ("부당해고", "해고/징계"),
    ("계약서", "근로계약"),
    ("근로계약서", "근로계약"),
    ("수습", "근로계약"),
    ("계약직", "근로계약"),
    ("기간제", "근로계약"),
    ("계약 만료", "근로계약"),
    ("계약 갱신", "근로계약"),
    ("휴가", "휴일/휴가"),
    ("연차", "휴일/휴가"),
    ("휴일", "휴일/휴가"),
    ("공휴일", "휴일/휴가"),
    ("연차수당", "휴일/휴가"),
    ("야근", "근로시간"),
    ("연장근로", "근로시간"),
    ("초과근무", "근로시간"),
    ("휴게시간", "근로시간"),
    ("야간근로", "근로시간"),
    ("주 52시간", "근로시간"),
    ("괴롭힘", "직장 내 괴롭힘"),
    ("폭언", "직장 내 괴롭힘"),
    ("갑질", "직장 내 괴롭힘"),
    ("따돌림", "직장 내 괴롭힘"),
    ("욕설", "직장 내 괴롭힘"),
    ("산업재해", "산재"),
    ("업무상 재해", "산재"),
    ("직업병", "산재"),
    ("일하다 다쳤", "산재"),
    ("안전장비", "산업안전"),
    ("위험한 작업", "산업안전"),
    ("작업중지", "산업안전"),
    ("안전교육", "산업안전"),
    ("노동조합", "노조"),
    ("단체교섭", "노조"),
    ("파업", "노조"),
    ("부당노동행위", "노조"),
    ("최저시급", "최저임금"),
    ("성차별", "남녀고용평등"),
    ("남녀차별", "남녀고용평등"),
    ("성희롱", "남녀고용평등"),
    ("출산휴가", "남녀고용평등"),
    ("육아 휴직", "육아휴직"),
    ("육아기 근로시간 단축", "육아휴직"),
    ("실업급여", "고용보험"),
    ("구직급여", "고용보험"),
];

/// Label → statute vocabulary used for query expansion and relevance scoring.
const DEFAULT_CATEGORIES: &[(&str, &[&str])] = &[
    ("퇴직금", &["퇴직급여", "계속근로기간", "평균임금", "퇴직금 지급"]),
    ("임금", &["임금 지급", "금품 청산", "임금체불", "지연이자", "가산임금"]),
    (
        "해고/징계",
        &["해고", "해고의 예고", "해고사유 등의 서면통지", "부당해고등의 구제신청", "정당한 이유"],
    ),
    ("근로계약", &["근로조건의 명시", "근로계약", "수습", "기간제근로자"]),
    ("휴일/휴가", &["연차 유급휴가", "주휴일", "휴일", "사용 촉진"]),
    ("근로시간", &["근로시간", "연장 근로", "휴게", "야간근로", "가산임금"]),
    (
        "직장 내 괴롭힘",
        &["직장 내 괴롭힘의 금지", "직장 내 괴롭힘 발생 시 조치", "불리한 처우"],
    ),
    ("산재", &["업무상 재해", "요양급여", "휴업급여", "근로복지공단"]),
    ("산업안전", &["작업중지", "안전조치", "보건조치", "불리한 처우"]),
    ("노조", &["부당노동행위", "노동조합", "단체교섭", "구제신청"]),
    ("최저임금", &["최저임금", "최저임금의 효력", "수습 사용 중에 있는 자"]),
    ("남녀고용평등", &["차별의 금지", "직장 내 성희롱", "출산전후휴가"]),
    ("육아휴직", &["육아휴직", "육아기 근로시간 단축", "불리한 처우"]),
    ("고용보험", &["구직급여", "실업급여", "피보험자격"]),
];

/// On-disk vocabulary override.
#[derive(Debug, Deserialize)]
pub struct VocabularyFile {
    pub labels: Vec<String>,
    #[serde(default)]
    pub synonyms: HashMap<String, String>,
    #[serde(default)]
    pub categories: HashMap<String, Vec<String>>,
}

/// Closed issue vocabulary with synonym and category tables.
#[derive(Debug, Clone)]
pub struct IssueVocabulary {
    labels: Vec<String>,
    /// (compacted phrase, label), longest phrase first.
    phrases: Vec<(String, String)>,
    categories: HashMap<String, Vec<String>>,
}

/// Summary statistics for a vocabulary.
pub struct VocabularySummary {
    pub labels: usize,
    pub synonyms: usize,
    pub labels_with_categories: usize,
}

impl Default for IssueVocabulary {
    fn default() -> Self {
        let file = VocabularyFile {
            labels: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
            synonyms: DEFAULT_SYNONYMS
                .iter()
                .map(|(p, l)| (p.to_string(), l.to_string()))
                .collect(),
            categories: DEFAULT_CATEGORIES
                .iter()
                .map(|(l, terms)| (l.to_string(), terms.iter().map(|t| t.to_string()).collect()))
                .collect(),
        };
        Self::assemble(file)
    }
}

impl IssueVocabulary {
    /// Build and check a vocabulary: every synonym and category must name a label.
    pub fn build(file: VocabularyFile) -> Result<Self, VocabularyError> {
        if file.labels.is_empty() {
            return Err(VocabularyError::Empty);
        }
        for (phrase, label) in &file.synonyms {
            if !file.labels.contains(label) {
                return Err(VocabularyError::UnknownLabel {
                    phrase: phrase.clone(),
                    label: label.clone(),
                });
            }
        }
        for label in file.categories.keys() {
            if !file.labels.contains(label) {
                return Err(VocabularyError::UnknownLabel {
                    phrase: String::new(),
                    label: label.clone(),
                });
            }
        }
        Ok(Self::assemble(file))
    }

    fn assemble(file: VocabularyFile) -> Self {
        let mut phrases: Vec<(String, String)> = Vec::new();
        for label in &file.labels {
            phrases.push((compact(label), label.clone()));
        }
        for (phrase, label) in &file.synonyms {
            let key = compact(phrase);
            if !key.is_empty() {
                phrases.push((key, label.clone()));
            }
        }

        // Longest first so "최저임금" wins over "임금"; ties broken by text for determinism.
        phrases.sort_by(|a, b| {
            b.0.chars()
                .count()
                .cmp(&a.0.chars().count())
                .then_with(|| a.0.cmp(&b.0))
        });
        phrases.dedup_by(|a, b| a.0 == b.0);

        Self {
            labels: file.labels,
            phrases,
            categories: file.categories,
        }
    }

    /// Load a vocabulary override from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, VocabularyError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(json: &str) -> Result<Self, VocabularyError> {
        let file: VocabularyFile = serde_json::from_str(json)?;
        Self::build(file)
    }

    /// Allowed labels in display order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The issue for an exact allowed label.
    pub fn issue(&self, label: &str) -> Option<Issue> {
        let label = label.trim();
        self.labels
            .iter()
            .find(|l| l.as_str() == label)
            .map(|l| Issue(l.clone()))
    }

    /// Map a free-text phrase onto the vocabulary.
    ///
    /// Tries the exact label, then an exact synonym (whitespace-insensitive),
    /// then a phrase that contains exactly one label's vocabulary.
    pub fn normalize(&self, phrase: &str) -> Option<Issue> {
        if let Some(issue) = self.issue(phrase) {
            return Some(issue);
        }
        let key = compact(phrase);
        if key.is_empty() {
            return None;
        }
        if let Some((_, label)) = self.phrases.iter().find(|(p, _)| *p == key) {
            return Some(Issue(label.clone()));
        }
        let matched = self.match_situation(phrase);
        match matched.as_slice() {
            [only] => Some(only.clone()),
            _ => None,
        }
    }

    /// Issues whose label or synonyms occur in `text`, in order of first occurrence.
    ///
    /// Longer phrases claim their span first, so a shorter phrase inside an
    /// already-matched one ("임금" inside "최저임금") does not add a second issue.
    pub fn match_situation(&self, text: &str) -> Vec<Issue> {
        let haystack: Vec<char> = compact(text).chars().collect();
        let mut claimed = vec![false; haystack.len()];
        let mut first_seen: Vec<(usize, &str)> = Vec::new();

        for (phrase, label) in &self.phrases {
            let needle: Vec<char> = phrase.chars().collect();
            if needle.is_empty() || needle.len() > haystack.len() {
                continue;
            }
            for start in 0..=haystack.len() - needle.len() {
                let end = start + needle.len();
                if haystack[start..end] != needle[..] || claimed[start..end].iter().any(|c| *c) {
                    continue;
                }
                claimed[start..end].iter_mut().for_each(|c| *c = true);
                match first_seen.iter_mut().find(|(_, l)| *l == label.as_str()) {
                    Some(entry) => entry.0 = entry.0.min(start),
                    None => first_seen.push((start, label.as_str())),
                }
            }
        }

        first_seen.sort_by_key(|(pos, _)| *pos);
        first_seen
            .into_iter()
            .map(|(_, label)| Issue(label.to_string()))
            .collect()
    }

    /// Statute vocabulary for `issue` (query expansion).
    pub fn category_keywords(&self, issue: &Issue) -> &[String] {
        self.categories
            .get(issue.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Everyday synonyms that resolve to `issue`, in compacted form.
    pub fn synonyms_of<'a>(&'a self, issue: &'a Issue) -> impl Iterator<Item = &'a str> + 'a {
        self.phrases
            .iter()
            .filter(move |(p, l)| l == issue.as_str() && *p != compact(l))
            .map(|(p, _)| p.as_str())
    }

    /// Summary statistics.
    pub fn summary(&self) -> VocabularySummary {
        VocabularySummary {
            labels: self.labels.len(),
            synonyms: self.phrases.len().saturating_sub(self.labels.len()),
            labels_with_categories: self.categories.len(),
        }
    }
}

/// Lowercase with all whitespace removed.
fn compact(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(issues: &[Issue]) -> Vec<&str> {
        issues.iter().map(Issue::as_str).collect()
    }

    #[test]
    fn default_vocabulary_builds() {
        let vocab = IssueVocabulary::default();
        let summary = vocab.summary();
        assert_eq!(summary.labels, 14);
        assert!(summary.synonyms > 40);
        assert_eq!(summary.labels_with_categories, 14);
    }

    #[test]
    fn normalize_is_identity_on_labels() {
        let vocab = IssueVocabulary::default();
        for label in vocab.labels() {
            let issue = vocab.normalize(label).unwrap();
            assert_eq!(issue.as_str(), label);
        }
    }

    #[test]
    fn normalize_is_idempotent() {
        let vocab = IssueVocabulary::default();
        for phrase in ["월급", "부당해고", "직장내괴롭힘", " 육아 휴직 ", "실업급여", "임금"] {
            let once = vocab.normalize(phrase).unwrap();
            let twice = vocab.normalize(once.as_str()).unwrap();
            assert_eq!(once, twice, "{phrase:?}");
        }
    }

    #[test]
    fn normalize_rejects_unknown_phrases() {
        let vocab = IssueVocabulary::default();
        assert!(vocab.normalize("").is_none());
        assert!(vocab.normalize("세금 신고").is_none());
        assert!(vocab.normalize("근로자 보호").is_none());
    }

    #[test]
    fn normalize_contained_single_label() {
        let vocab = IssueVocabulary::default();
        assert_eq!(vocab.normalize("퇴직금 문제").unwrap().as_str(), "퇴직금");
        // Two different issues in one phrase is ambiguous.
        assert!(vocab.normalize("월급도 못 받고 해고").is_none());
    }

    #[test]
    fn situation_matches_dismissal() {
        let vocab = IssueVocabulary::default();
        let found = vocab.match_situation("회사에서 30일 통보 없이 해고당했어요");
        assert_eq!(labels(&found), vec!["해고/징계"]);
    }

    #[test]
    fn situation_order_follows_text() {
        let vocab = IssueVocabulary::default();
        let found = vocab.match_situation("폭언을 듣고 월급도 밀렸어요");
        assert_eq!(labels(&found), vec!["직장 내 괴롭힘", "임금"]);
    }

    #[test]
    fn longer_phrase_claims_span() {
        let vocab = IssueVocabulary::default();
        let found = vocab.match_situation("수습인데 최저임금보다 적게 받아요");
        assert_eq!(labels(&found), vec!["근로계약", "최저임금"]);
    }

    #[test]
    fn same_issue_twice_collapses() {
        let vocab = IssueVocabulary::default();
        let found = vocab.match_situation("월급이 밀리고 급여 명세서도 없어요");
        assert_eq!(labels(&found), vec!["임금"]);
    }

    #[test]
    fn every_match_is_in_allow_list() {
        let vocab = IssueVocabulary::default();
        let found = vocab.match_situation("산재 신청했더니 징계하고 연차도 안 줘요 노조 가입도 막아요");
        assert!(found.len() >= 4);
        for issue in &found {
            assert!(vocab.labels().iter().any(|l| l == issue.as_str()));
        }
    }

    #[test]
    fn issue_parts_split_compound_label() {
        let vocab = IssueVocabulary::default();
        let issue = vocab.issue("해고/징계").unwrap();
        assert_eq!(issue.parts().collect::<Vec<_>>(), vec!["해고", "징계"]);
    }

    #[test]
    fn synonyms_of_excludes_label() {
        let vocab = IssueVocabulary::default();
        let issue = vocab.issue("육아휴직").unwrap();
        let syns: Vec<&str> = vocab.synonyms_of(&issue).collect();
        assert!(syns.contains(&"육아기근로시간단축"));
        assert!(!syns.contains(&"육아휴직"));
    }

    #[test]
    fn override_from_json() {
        let vocab = IssueVocabulary::from_json_str(
            r#"{"labels": ["dismissal", "wages"], "synonyms": {"fired": "dismissal"}}"#,
        )
        .unwrap();
        assert_eq!(vocab.normalize("Fired").unwrap().as_str(), "dismissal");
        assert!(vocab.issue("해고/징계").is_none());
    }

    #[test]
    fn override_rejects_dangling_synonym() {
        let err = IssueVocabulary::from_json_str(
            r#"{"labels": ["wages"], "synonyms": {"fired": "dismissal"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, VocabularyError::UnknownLabel { .. }));
    }

    #[test]
    fn override_rejects_empty() {
        let err = IssueVocabulary::from_json_str(r#"{"labels": []}"#).unwrap_err();
        assert!(matches!(err, VocabularyError::Empty));
    }
}
