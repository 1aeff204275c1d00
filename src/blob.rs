//! Git object ids as they appear in raw diff records and diff headers.
//!
//! The raw diff stream is requested with `--abbrev=40` while the diff text
//! carries whatever abbreviation git picks for its `index` lines, so ids
//! from the two streams are compared by prefix rather than equality.

use std::fmt;

/// Length of a full SHA-1 object id in hex characters.
pub const OID_HEX_LEN: usize = 40;

/// A (possibly abbreviated) hex object id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlobId(String);

impl BlobId {
    /// Build an id from hex text, keeping at most [`OID_HEX_LEN`] characters.
    pub fn new(hex: &str) -> Self {
        Self(hex.chars().take(OID_HEX_LEN).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All zeros: no object (added or deleted side) or a worktree file git
    /// has not hashed.
    pub fn is_null(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b == b'0')
    }

    /// True if either id is a prefix of the other. Empty ids never match.
    pub fn matches(&self, other: &BlobId) -> bool {
        if self.0.is_empty() || other.0.is_empty() {
            return false;
        }
        self.0.starts_with(&other.0) || other.0.starts_with(&self.0)
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlobId {
    fn from(hex: &str) -> Self {
        Self::new(hex)
    }
}

/// The `from -> to` object ids a file change covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlobPair {
    pub from: BlobId,
    pub to: BlobId,
}

impl BlobPair {
    pub fn new(from: impl Into<BlobId>, to: impl Into<BlobId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Prefix match on both sides.
    pub fn matches(&self, other: &BlobPair) -> bool {
        self.from.matches(&other.from) && self.to.matches(&other.to)
    }
}

impl fmt::Display for BlobPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.from, self.to)
    }
}

/// Outcome of looking up a blob pair among several candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairMatch<T> {
    /// Nothing matched.
    Missing,
    /// Exactly one candidate, or several with identical ids of which the
    /// first in order was taken.
    Unique(T),
    /// Candidates with differing ids all matched by prefix.
    Ambiguous(Vec<T>),
}

impl<T> PairMatch<T> {
    /// Resolve a list of `(pair, item)` candidates collected in order.
    pub fn resolve(candidates: Vec<(&BlobPair, T)>) -> Self {
        let mut iter = candidates.into_iter();
        let Some((first_pair, first)) = iter.next() else {
            return PairMatch::Missing;
        };

        let rest: Vec<(&BlobPair, T)> = iter.collect();
        if rest.iter().all(|(pair, _)| *pair == first_pair) {
            return PairMatch::Unique(first);
        }

        let mut all = vec![first];
        all.extend(rest.into_iter().map(|(_, item)| item));
        PairMatch::Ambiguous(all)
    }
}
