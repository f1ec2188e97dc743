//! Luhmann-style identifiers embedded in note filenames
//!
//! Identifier format:
//! - Sequence: `{n}(.{n})*` (e.g., `21`, `21.1`, `21.2.3`)
//! - Branch: a sequence followed by lowercase letters (e.g., `21a`, `21.1b`)
//!
//! The numeric path sets the level of a note. The letter suffix marks a
//! digression from its base sequence and does not add a level, so `21a`
//! sits on the same level as `21` and hangs off it as a child.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)*[a-z]*").unwrap());

#[derive(Debug, Error, PartialEq)]
pub enum IdentifierError {
    #[error("Empty identifier")]
    Empty,

    #[error("Invalid identifier format: expected '{{n}}(.{{n}})*[a-z]*', got '{0}'")]
    InvalidFormat(String),

    #[error("Invalid sequence segment: '{0}' (segments are positive integers without leading zeros)")]
    InvalidSegment(String),

    #[error("Invalid branch suffix: '{0}' (only lowercase letters are allowed)")]
    InvalidSuffix(String),
}

/// Whether a note continues a sequence or branches off it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Sequence,
    Branch,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Sequence => "sequence",
            NodeKind::Branch => "branch",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single identifier found inside a larger string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierMatch {
    /// Byte range of the match in the scanned string
    pub range: Range<usize>,
    pub identifier: Identifier,
}

/// Zettel identifier: a numeric sequence path plus an optional branch suffix
///
/// `21.1b` has the path `[21, 1]` and the suffix `b`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier {
    segments: Vec<u32>,
    suffix: String,
}

impl Identifier {
    /// Creates an identifier from its parts, validating both
    pub fn new(segments: Vec<u32>, suffix: impl Into<String>) -> Result<Self, IdentifierError> {
        let suffix = suffix.into();
        if segments.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if let Some(zero) = segments.iter().find(|s| **s == 0) {
            return Err(IdentifierError::InvalidSegment(zero.to_string()));
        }
        if !suffix.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(IdentifierError::InvalidSuffix(suffix));
        }
        Ok(Self { segments, suffix })
    }

    /// Scans a string for identifiers, left to right, without overlap
    ///
    /// Substrings that look numeric but are not valid identifiers
    /// (zero segments, leading zeros, overflow) are skipped.
    pub fn matches(raw: &str) -> Vec<IdentifierMatch> {
        IDENTIFIER_RE
            .find_iter(raw)
            .filter_map(|m| {
                m.as_str().parse().ok().map(|identifier| IdentifierMatch {
                    range: m.range(),
                    identifier,
                })
            })
            .collect()
    }

    /// Returns every identifier found in a string, in order of appearance
    pub fn parse_all(raw: &str) -> Vec<Identifier> {
        Self::matches(raw)
            .into_iter()
            .map(|m| m.identifier)
            .collect()
    }

    /// Returns the numeric sequence path
    pub fn segments(&self) -> &[u32] {
        &self.segments
    }

    /// Returns the branch suffix (empty for sequence identifiers)
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn kind(&self) -> NodeKind {
        if self.suffix.is_empty() {
            NodeKind::Sequence
        } else {
            NodeKind::Branch
        }
    }

    pub fn is_branch(&self) -> bool {
        !self.suffix.is_empty()
    }

    pub fn is_sequence(&self) -> bool {
        self.suffix.is_empty()
    }

    /// Returns the level: the number of path segments
    pub fn level(&self) -> usize {
        self.segments.len()
    }

    /// Returns the identifier with the branch suffix removed
    pub fn base(&self) -> Identifier {
        Identifier {
            segments: self.segments.clone(),
            suffix: String::new(),
        }
    }

    /// Returns the structural parent, or None for a top-level sequence
    ///
    /// - Branch: the suffix is stripped (`21.1b` -> `21.1`)
    /// - Sequence: the last segment is dropped (`21.1` -> `21`)
    pub fn parent(&self) -> Option<Identifier> {
        if self.is_branch() {
            return Some(self.base());
        }
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Identifier {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
            suffix: String::new(),
        })
    }

    /// Creates the sequence child `{self}.{sequence}`
    ///
    /// Branch identifiers cannot take sequence children.
    pub fn child(&self, sequence: u32) -> Option<Identifier> {
        if self.is_branch() || sequence == 0 {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.push(sequence);
        Some(Identifier {
            segments,
            suffix: String::new(),
        })
    }

    /// Creates the branch `{base}{suffix}` of this identifier's base
    pub fn branch(&self, suffix: &str) -> Result<Identifier, IdentifierError> {
        Identifier::new(self.segments.clone(), suffix)
    }

    /// True iff `self` equals `ancestor` or its text starts with `{ancestor}.`
    pub fn is_descendant_or_equal(&self, ancestor: &Identifier) -> bool {
        let this = self.to_string();
        let prefix = ancestor.to_string();
        this == prefix
            || this
                .strip_prefix(&prefix)
                .is_some_and(|rest| rest.starts_with('.'))
    }

    /// True if `self` is `root`, a dotted descendant of it, or one of its branches
    ///
    /// This is the set of identifiers rewritten when `root` moves.
    pub fn in_subtree_of(&self, root: &Identifier) -> bool {
        self.is_descendant_or_equal(root)
            || (root.is_sequence() && self.is_branch() && self.segments == root.segments)
    }

    /// Substitutes the `old_root` prefix with `new_root`
    ///
    /// Returns None when `self` is outside the subtree of `old_root`, or when
    /// the result cannot be expressed (a descendant under a branch root).
    pub fn rebase(&self, old_root: &Identifier, new_root: &Identifier) -> Option<Identifier> {
        if self == old_root {
            return Some(new_root.clone());
        }
        if !self.in_subtree_of(old_root) || new_root.is_branch() {
            return None;
        }
        let mut segments = new_root.segments.clone();
        segments.extend_from_slice(&self.segments[old_root.segments.len()..]);
        Some(Identifier {
            segments,
            suffix: self.suffix.clone(),
        })
    }

    /// Returns the next free identifier continuing this sequence
    ///
    /// Works on the base path: `21.1` and `21.1a` both continue as `21.2`
    /// (or the first higher number not in `existing`). None once the last
    /// segment runs past `u32::MAX`.
    pub fn next_sequential(&self, existing: &HashSet<Identifier>) -> Option<Identifier> {
        let mut candidate = self.base();
        loop {
            let last = candidate.segments.last_mut()?;
            *last = last.checked_add(1)?;
            if !existing.contains(&candidate) {
                return Some(candidate);
            }
        }
    }

    /// Returns the first free branch of this identifier's base
    ///
    /// Suffixes are tried in shortlex order: `a` … `z`, `aa`, `ab`, …
    pub fn next_branch(&self, existing: &HashSet<Identifier>) -> Identifier {
        (0..)
            .map(|n| Identifier {
                segments: self.segments.clone(),
                suffix: suffix_for(n),
            })
            .find(|candidate| !existing.contains(candidate))
            .unwrap_or_else(|| self.base())
    }
}

/// Deterministic sibling order: numeric segments, then branch suffix
pub fn compare_siblings(a: &Identifier, b: &Identifier) -> Ordering {
    a.cmp(b)
}

/// Bijective base-26 suffix: 0 -> `a`, 25 -> `z`, 26 -> `aa`
fn suffix_for(mut n: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'a' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments
            .cmp(&other.segments)
            .then_with(|| self.suffix.len().cmp(&other.suffix.len()))
            .then_with(|| self.suffix.cmp(&other.suffix))
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", seg)?;
        }
        f.write_str(&self.suffix)
    }
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdentifierError::Empty);
        }

        let split = s
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(s.len());
        let (path, suffix) = s.split_at(split);

        if path.is_empty() {
            return Err(IdentifierError::InvalidFormat(s.to_string()));
        }
        if !suffix.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(IdentifierError::InvalidSuffix(suffix.to_string()));
        }

        let segments: Result<Vec<u32>, _> = path
            .split('.')
            .map(|p| {
                let valid = !p.is_empty()
                    && p.chars().all(|c| c.is_ascii_digit())
                    && !p.starts_with('0');
                if !valid {
                    return Err(IdentifierError::InvalidSegment(p.to_string()));
                }
                p.parse::<u32>()
                    .map_err(|_| IdentifierError::InvalidSegment(p.to_string()))
            })
            .collect();

        Ok(Self {
            segments: segments?,
            suffix: suffix.to_string(),
        })
    }
}

impl TryFrom<String> for Identifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(s: &str) -> Identifier {
        s.parse().unwrap()
    }

    #[test]
    fn parses_sequence_identifier() {
        let parsed = id("21.1");
        assert_eq!(parsed.segments(), &[21, 1]);
        assert_eq!(parsed.suffix(), "");
        assert_eq!(parsed.kind(), NodeKind::Sequence);
        assert_eq!(parsed.level(), 2);
    }

    #[test]
    fn parses_branch_identifier() {
        let parsed = id("21.1b");
        assert_eq!(parsed.segments(), &[21, 1]);
        assert_eq!(parsed.suffix(), "b");
        assert_eq!(parsed.kind(), NodeKind::Branch);
        assert_eq!(parsed.level(), 2);
    }

    #[test]
    fn rejects_invalid_format() {
        assert_eq!("".parse::<Identifier>(), Err(IdentifierError::Empty));
        assert!("abc".parse::<Identifier>().is_err());
        assert!("21.".parse::<Identifier>().is_err());
        assert!("21..1".parse::<Identifier>().is_err());
        assert!("021".parse::<Identifier>().is_err());
        assert!("0".parse::<Identifier>().is_err());
        assert!("21A".parse::<Identifier>().is_err());
        assert!("21a1".parse::<Identifier>().is_err());
        assert!("99999999999".parse::<Identifier>().is_err());
    }

    #[test]
    fn scans_identifiers_out_of_filenames() {
        assert_eq!(Identifier::parse_all("21 - Intro"), vec![id("21")]);
        assert_eq!(Identifier::parse_all("21.1b Aside"), vec![id("21.1b")]);
        assert_eq!(
            Identifier::parse_all("21 see 22a and 3.4"),
            vec![id("21"), id("22a"), id("3.4")]
        );
        assert!(Identifier::parse_all("Inbox").is_empty());
    }

    #[test]
    fn scan_skips_malformed_numbers() {
        // leading zeros are not valid segments
        assert_eq!(Identifier::parse_all("2024-01-05 log"), vec![id("2024")]);
    }

    #[test]
    fn uppercase_letters_never_form_a_suffix() {
        assert_eq!(Identifier::parse_all("21A Notes"), vec![id("21")]);
    }

    #[test]
    fn match_ranges_point_into_the_source() {
        let raw = "Note 21.1b - Detail";
        let found = Identifier::matches(raw);
        assert_eq!(found.len(), 1);
        assert_eq!(&raw[found[0].range.clone()], "21.1b");
    }

    #[test]
    fn parent_of_branch_strips_suffix() {
        assert_eq!(id("21.1b").parent(), Some(id("21.1")));
        assert_eq!(id("21ab").parent(), Some(id("21")));
    }

    #[test]
    fn parent_of_sequence_drops_last_segment() {
        assert_eq!(id("21.1").parent(), Some(id("21")));
        assert_eq!(id("21.2.3").parent(), Some(id("21.2")));
    }

    #[test]
    fn single_segment_sequence_has_no_parent() {
        assert_eq!(id("21").parent(), None);
    }

    #[test]
    fn branch_parent_shares_the_level() {
        let branch = id("21.1b");
        assert_eq!(branch.parent().map(|p| p.level()), Some(branch.level()));
    }

    #[test]
    fn descendant_or_equal_uses_dot_boundary() {
        assert!(id("21").is_descendant_or_equal(&id("21")));
        assert!(id("21.1").is_descendant_or_equal(&id("21")));
        assert!(id("21.1.3b").is_descendant_or_equal(&id("21")));
        assert!(!id("21").is_descendant_or_equal(&id("21.1")));
        assert!(!id("210").is_descendant_or_equal(&id("21")));
        assert!(!id("21a").is_descendant_or_equal(&id("21")));
    }

    #[test]
    fn subtree_includes_branches_of_the_root() {
        assert!(id("21a").in_subtree_of(&id("21")));
        assert!(id("21.1").in_subtree_of(&id("21")));
        assert!(!id("21a").in_subtree_of(&id("21b")));
        assert!(!id("22").in_subtree_of(&id("21")));
    }

    #[test]
    fn rebase_substitutes_prefix() {
        let old = id("22");
        let new = id("21.1");
        assert_eq!(id("22").rebase(&old, &new), Some(id("21.1")));
        assert_eq!(id("22.1").rebase(&old, &new), Some(id("21.1.1")));
        assert_eq!(id("22.3.2c").rebase(&old, &new), Some(id("21.1.3.2c")));
        assert_eq!(id("22a").rebase(&old, &new), Some(id("21.1a")));
        assert_eq!(id("23").rebase(&old, &new), None);
    }

    #[test]
    fn rebase_under_branch_root_only_moves_the_root() {
        let old = id("5.1");
        let new = id("21a");
        assert_eq!(id("5.1").rebase(&old, &new), Some(id("21a")));
        assert_eq!(id("5.1.1").rebase(&old, &new), None);
    }

    #[test]
    fn siblings_order_numerically_then_by_suffix() {
        let mut ids = vec![id("21.10"), id("21.2"), id("21b"), id("21"), id("21aa"), id("21z")];
        ids.sort_by(compare_siblings);
        let rendered: Vec<_> = ids.iter().map(|i| i.to_string()).collect();
        assert_eq!(rendered, vec!["21", "21b", "21z", "21aa", "21.2", "21.10"]);
    }

    #[test]
    fn child_of_branch_is_rejected() {
        assert_eq!(id("21").child(1), Some(id("21.1")));
        assert_eq!(id("21a").child(1), None);
    }

    #[test]
    fn next_sequential_skips_taken_numbers() {
        let existing: HashSet<_> = [id("21"), id("22"), id("23")].into_iter().collect();
        assert_eq!(id("21").next_sequential(&existing), Some(id("24")));
        assert_eq!(id("21.1a").next_sequential(&existing), Some(id("21.2")));
    }

    #[test]
    fn next_sequential_stops_at_the_end_of_the_range() {
        let max = id("4294967295");
        let existing: HashSet<_> = [max.clone()].into_iter().collect();
        assert_eq!(max.next_sequential(&existing), None);
        assert_eq!(id("21.4294967294").next_sequential(&existing), Some(id("21.4294967295")));

        let near: HashSet<_> = [id("4294967294"), max.clone()].into_iter().collect();
        assert_eq!(id("4294967293").next_sequential(&near), None);
    }

    #[test]
    fn next_branch_walks_letters_in_shortlex_order() {
        let mut existing: HashSet<_> = [id("21"), id("21a"), id("21b")].into_iter().collect();
        assert_eq!(id("21").next_branch(&existing), id("21c"));

        for n in 0..26 {
            existing.insert(id("21").branch(&suffix_for(n)).unwrap());
        }
        assert_eq!(id("21a").next_branch(&existing), id("21aa"));
    }

    #[test]
    fn suffix_sequence_is_bijective() {
        assert_eq!(suffix_for(0), "a");
        assert_eq!(suffix_for(25), "z");
        assert_eq!(suffix_for(26), "aa");
        assert_eq!(suffix_for(27), "ab");
        assert_eq!(suffix_for(701), "zz");
        assert_eq!(suffix_for(702), "aaa");
    }

    #[test]
    fn serde_roundtrip_identifier() {
        let original = id("21.1b");
        let json = serde_json::to_string(&original).unwrap();
        assert_eq!(json, "\"21.1b\"");
        let parsed: Identifier = serde_json::from_str(&json).unwrap();
        assert_eq!(original, parsed);
    }

    fn identifier_text(max_depth: usize) -> impl Strategy<Value = String> {
        (
            prop::collection::vec(1u32..100_000, 1..=max_depth),
            "[a-z]{0,3}",
        )
            .prop_map(|(segments, suffix)| {
                let path: Vec<_> = segments.iter().map(|s| s.to_string()).collect();
                format!("{}{}", path.join("."), suffix)
            })
    }

    proptest! {
        #[test]
        fn format_is_inverse_of_parse(raw in identifier_text(5)) {
            let parsed: Identifier = raw.parse().unwrap();
            prop_assert_eq!(parsed.to_string(), raw.clone());
            prop_assert_eq!(Identifier::parse_all(&raw), vec![parsed]);
        }

        #[test]
        fn sequence_parent_is_one_level_up(
            segments in prop::collection::vec(1u32..1000, 1..=5)
        ) {
            let child = Identifier::new(segments, "").unwrap();
            if let Some(parent) = child.parent() {
                prop_assert_eq!(parent.level(), child.level() - 1);
                prop_assert!(child.is_descendant_or_equal(&parent));
            } else {
                prop_assert_eq!(child.level(), 1);
            }
        }
    }
}
