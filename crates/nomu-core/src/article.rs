//! Article identifiers for Korean statutes.
//!
//! Statute text arrives with article headings in several spellings
//! ("제36조(금품 청산)", "제43조의2", "Art.43-2", "36"). Everything downstream
//! works with one normalized form so that citations, dedup keys, and relation
//! lookups agree.
//!
//! # Numbering conventions
//!
//! - Plain article: 제36조 → `Art.36`
//! - Branch article (inserted by amendment): 제43조의2 → `Art.43-2`, sorts
//!   between 제43조 and 제44조

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("not an article identifier: {0:?}")]
pub struct ArticleIdError(pub String);

/// Normalized article number: main number plus optional branch number.
///
/// Displays as `Art.N` / `Art.N-M`; [`ArticleId::korean`] gives `제N조` /
/// `제N조의M`. Ordering follows document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArticleId {
    main: u32,
    sub: Option<u32>,
}

impl ArticleId {
    pub fn new(main: u32, sub: Option<u32>) -> Option<Self> {
        if main == 0 || sub == Some(0) {
            return None;
        }
        Some(Self { main, sub })
    }

    /// Parse any of the accepted spellings. Returns `None` for anything else.
    ///
    /// A parenthesised title after the Korean form is ignored, so raw headings
    /// like "제36조(금품 청산)" parse directly.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();

        if let Some(rest) = strip_art_prefix(s) {
            let (main, rest) = leading_number(rest.trim_start())?;
            let (sub, rest) = match rest.strip_prefix('-') {
                Some(r) => {
                    let (n, r) = leading_number(r)?;
                    (Some(n), r)
                }
                None => (None, rest),
            };
            if rest.starts_with(|c: char| c.is_alphanumeric()) {
                return None;
            }
            return Self::new(main, sub);
        }

        if let Some(rest) = s.strip_prefix('제') {
            let (main, rest) = leading_number(rest.trim_start())?;
            let rest = rest.trim_start().strip_prefix('조')?;
            let sub = match rest.strip_prefix('의') {
                Some(r) => leading_number(r).map(|(n, _)| n),
                None => None,
            };
            return Self::new(main, sub);
        }

        // Bare number: "36", "43-2", "43의2".
        let (main, rest) = leading_number(s)?;
        let sub = if rest.is_empty() {
            None
        } else {
            let r = rest.strip_prefix('-').or_else(|| rest.strip_prefix('의'))?;
            let (n, r) = leading_number(r)?;
            if !r.is_empty() {
                return None;
            }
            Some(n)
        };
        Self::new(main, sub)
    }

    pub fn main(&self) -> u32 {
        self.main
    }

    pub fn sub(&self) -> Option<u32> {
        self.sub
    }

    /// Korean citation form: "제36조", "제43조의2".
    pub fn korean(&self) -> String {
        match self.sub {
            Some(sub) => format!("제{}조의{}", self.main, sub),
            None => format!("제{}조", self.main),
        }
    }

    /// Lexicographically sortable key: "043.000", "043.002".
    pub fn sort_key(&self) -> String {
        format!("{:03}.{:03}", self.main, self.sub.unwrap_or(0))
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sub {
            Some(sub) => write!(f, "Art.{}-{}", self.main, sub),
            None => write!(f, "Art.{}", self.main),
        }
    }
}

impl FromStr for ArticleId {
    type Err = ArticleIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ArticleIdError(s.to_string()))
    }
}

impl TryFrom<String> for ArticleId {
    type Error = ArticleIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ArticleId> for String {
    fn from(id: ArticleId) -> Self {
        id.to_string()
    }
}

fn strip_art_prefix(s: &str) -> Option<&str> {
    let head = s.get(..4)?;
    if head.eq_ignore_ascii_case("art.") {
        return s.get(4..);
    }
    None
}

/// Split leading ASCII digits off `s`.
fn leading_number(s: &str) -> Option<(u32, &str)> {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    let n = s[..end].parse().ok()?;
    Some((n, &s[end..]))
}
