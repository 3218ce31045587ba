//! Revision ordering and dynamic revision matching.
//!
//! Revisions are ordered the way Maven orders versions:
//! - tokens are split on `.` and `-`
//! - numeric tokens compare as numbers; trailing zeros are insignificant
//! - well-known qualifiers rank
//!   `alpha` < `beta` < `milestone` < `rc` < `snapshot` < release < `sp`
//! - any other text sorts below a number and below a release
//!
//! A requested revision is *dynamic* when it names a set of revisions rather
//! than one: a range (`[1.0,2.0)`), a prefix (`1.+`), or a `latest.<status>`
//! selector.

use std::cmp::Ordering;
use std::fmt;

/// A parsed, totally ordered revision string.
#[derive(Debug, Clone)]
pub struct Version {
    original: String,
    tokens: Vec<Token>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
enum Token {
    Number(u64),
    Qualifier(Qualifier),
    Text(String),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
enum Qualifier {
    Alpha,
    Beta,
    Milestone,
    Rc,
    Snapshot,
    Release,
    Sp,
}

impl Version {
    pub fn parse(revision: &str) -> Self {
        let tokens = revision
            .split(['.', '-'])
            .filter(|t| !t.is_empty())
            .map(Token::classify)
            .collect();
        Self {
            original: revision.to_string(),
            tokens,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }

    pub fn is_snapshot(&self) -> bool {
        self.original.ends_with("-SNAPSHOT")
    }
}

impl Token {
    fn classify(token: &str) -> Self {
        if let Ok(n) = token.parse::<u64>() {
            return Token::Number(n);
        }
        let qualifier = match token.to_ascii_lowercase().as_str() {
            "alpha" | "a" => Qualifier::Alpha,
            "beta" | "b" => Qualifier::Beta,
            "milestone" | "m" => Qualifier::Milestone,
            "rc" | "cr" => Qualifier::Rc,
            "snapshot" => Qualifier::Snapshot,
            "ga" | "final" | "release" => Qualifier::Release,
            "sp" => Qualifier::Sp,
            _ => return Token::Text(token.to_string()),
        };
        Token::Qualifier(qualifier)
    }

    /// How this token compares against a missing token at the same position.
    fn cmp_to_absent(&self) -> Ordering {
        match self {
            Token::Number(n) => n.cmp(&0),
            Token::Qualifier(q) => q.cmp(&Qualifier::Release),
            Token::Text(_) => Ordering::Less,
        }
    }

    fn cmp_token(&self, other: &Token) -> Ordering {
        match (self, other) {
            (Token::Number(a), Token::Number(b)) => a.cmp(b),
            (Token::Qualifier(a), Token::Qualifier(b)) => a.cmp(b),
            (Token::Text(a), Token::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
            (Token::Number(_), _) => Ordering::Greater,
            (_, Token::Number(_)) => Ordering::Less,
            (Token::Qualifier(q), Token::Text(_)) => {
                if *q >= Qualifier::Release {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (Token::Text(_), Token::Qualifier(_)) => other.cmp_token(self).reverse(),
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.tokens.len().max(other.tokens.len());
        (0..len)
            .map(|i| match (self.tokens.get(i), other.tokens.get(i)) {
                (Some(a), Some(b)) => a.cmp_token(b),
                (Some(a), None) => a.cmp_to_absent(),
                (None, Some(b)) => b.cmp_to_absent().reverse(),
                (None, None) => Ordering::Equal,
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

/// A bracketed revision range: `[1.0,2.0)`, `[1.0,)`, `(,2.0]`, `[1.5]`.
#[derive(Debug, Clone)]
pub struct VersionRange {
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
}

#[derive(Debug, Clone)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

impl Bound {
    fn parse(text: &str, inclusive: bool) -> Option<Self> {
        let text = text.trim();
        (!text.is_empty()).then(|| Bound {
            version: Version::parse(text),
            inclusive,
        })
    }
}

impl VersionRange {
    /// Parse a range; `None` if `spec` is not bracketed.
    pub fn parse(spec: &str) -> Option<Self> {
        let s = spec.trim();
        let lower_inclusive = match s.chars().next()? {
            '[' => true,
            '(' => false,
            _ => return None,
        };
        let upper_inclusive = match s.chars().last()? {
            ']' => true,
            ')' => false,
            _ => return None,
        };
        if s.len() < 2 {
            return None;
        }
        let inner = &s[1..s.len() - 1];

        match inner.split_once(',') {
            Some((lower, upper)) => Some(Self {
                lower: Bound::parse(lower, lower_inclusive),
                upper: Bound::parse(upper, upper_inclusive),
            }),
            None => {
                let exact = Bound::parse(inner, true)?;
                Some(Self {
                    lower: Some(exact.clone()),
                    upper: Some(exact),
                })
            }
        }
    }

    pub fn contains(&self, version: &Version) -> bool {
        let above_lower = self.lower.as_ref().map_or(true, |b| match version.cmp(&b.version) {
            Ordering::Greater => true,
            Ordering::Equal => b.inclusive,
            Ordering::Less => false,
        });
        let below_upper = self.upper.as_ref().map_or(true, |b| match version.cmp(&b.version) {
            Ordering::Less => true,
            Ordering::Equal => b.inclusive,
            Ordering::Greater => false,
        });
        above_lower && below_upper
    }
}

/// A requested revision that selects among several concrete revisions.
#[derive(Debug, Clone)]
pub enum DynamicRevision {
    /// `[1.0,2.0)` and friends.
    Range(VersionRange),
    /// `1.+`: any revision starting with `1.`.
    Prefix(String),
    /// `latest.integration` (anything) or `latest.release` (no snapshots).
    Latest { release_only: bool },
}

impl DynamicRevision {
    /// Classify a requested revision; `None` if it names exactly one revision.
    pub fn parse(revision: &str) -> Option<Self> {
        let revision = revision.trim();
        if let Some(range) = VersionRange::parse(revision) {
            return Some(Self::Range(range));
        }
        if let Some(prefix) = revision.strip_suffix('+') {
            return Some(Self::Prefix(prefix.to_string()));
        }
        match revision {
            "latest.integration" | "latest.milestone" => Some(Self::Latest {
                release_only: false,
            }),
            "latest.release" => Some(Self::Latest { release_only: true }),
            _ => None,
        }
    }

    pub fn matches(&self, candidate: &Version) -> bool {
        match self {
            Self::Range(range) => range.contains(candidate),
            Self::Prefix(prefix) => candidate.as_str().starts_with(prefix.as_str()),
            Self::Latest { release_only } => !release_only || !candidate.is_snapshot(),
        }
    }

    /// The highest of `candidates` this selector accepts.
    pub fn select<'a, I>(&self, candidates: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates
            .into_iter()
            .map(|c| (c, Version::parse(c)))
            .filter(|(_, v)| self.matches(v))
            .max_by(|(_, a), (_, b)| a.cmp(b))
            .map(|(c, _)| c)
    }
}

/// Whether a requested revision is dynamic.
pub fn is_dynamic(revision: &str) -> bool {
    DynamicRevision::parse(revision).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s)
    }

    #[test]
    fn numeric_ordering() {
        assert!(v("1.0") < v("2.0"));
        assert!(v("1.9") < v("1.10"));
        assert!(v("1.0.1") < v("1.1"));
    }

    #[test]
    fn qualifier_ordering() {
        assert!(v("1.0-alpha") < v("1.0-beta"));
        assert!(v("1.0-beta") < v("1.0-rc"));
        assert!(v("1.0-rc") < v("1.0-SNAPSHOT"));
        assert!(v("1.0-SNAPSHOT") < v("1.0"));
        assert!(v("1.0") < v("1.0-sp"));
    }

    #[test]
    fn trailing_zeros_are_insignificant() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("2"), v("2.0.0.0"));
    }

    #[test]
    fn text_sorts_below_numbers() {
        assert!(v("1.0.0-jre") < v("1.0.0"));
        assert!(v("31.0-jre") < v("32.0-jre"));
    }

    #[test]
    fn range_bounds() {
        let range = VersionRange::parse("[1.0,2.0)").unwrap();
        assert!(range.contains(&v("1.0")));
        assert!(range.contains(&v("1.9.9")));
        assert!(!range.contains(&v("2.0")));
        assert!(!range.contains(&v("0.9")));

        let open = VersionRange::parse("(1.0,]").unwrap();
        assert!(!open.contains(&v("1.0")));
        assert!(open.contains(&v("99")));
    }

    #[test]
    fn exact_range() {
        let range = VersionRange::parse("[1.5]").unwrap();
        assert!(range.contains(&v("1.5")));
        assert!(!range.contains(&v("1.6")));
    }

    #[test]
    fn bare_revision_is_static() {
        assert!(VersionRange::parse("1.0").is_none());
        assert!(!is_dynamic("1.0"));
        assert!(!is_dynamic("1.0-SNAPSHOT"));
    }

    #[test]
    fn dynamic_classification() {
        assert!(matches!(
            DynamicRevision::parse("[1.0,2.0)"),
            Some(DynamicRevision::Range(_))
        ));
        assert!(matches!(
            DynamicRevision::parse("1.+"),
            Some(DynamicRevision::Prefix(p)) if p == "1."
        ));
        assert!(matches!(
            DynamicRevision::parse("latest.release"),
            Some(DynamicRevision::Latest { release_only: true })
        ));
    }

    #[test]
    fn select_picks_highest_match() {
        let available = ["1.0", "1.2", "1.10", "2.0", "2.1-SNAPSHOT"];
        let prefix = DynamicRevision::parse("1.+").unwrap();
        assert_eq!(prefix.select(available), Some("1.10"));

        let range = DynamicRevision::parse("[1.0,2.0]").unwrap();
        assert_eq!(range.select(available), Some("2.0"));

        let release = DynamicRevision::parse("latest.release").unwrap();
        assert_eq!(release.select(available), Some("2.0"));

        let integration = DynamicRevision::parse("latest.integration").unwrap();
        assert_eq!(integration.select(available), Some("2.1-SNAPSHOT"));

        let none = DynamicRevision::parse("[5.0,)").unwrap();
        assert_eq!(none.select(available), None);
    }
}
