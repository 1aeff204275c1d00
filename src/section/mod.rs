pub mod pending;
pub mod scan;

pub use pending::PendingHeaderCache;
pub use scan::{ScanEvent, SectionScanner};

use crate::blob::BlobPair;
use crate::changes::RecordId;
use crate::raw::FileChangeRecord;
use std::ops::RangeInclusive;

/// Stable handle of a [`DiffSection`] within one change set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId(pub(crate) usize);

impl SectionId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Start of one file's portion of the diff text, as announced by the
/// diff text stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    pub blobs: BlobPair,
    /// Destination path from the `diff --git` line, when known
    pub path: Option<String>,
    /// Line of the diff text the header starts on (0-based)
    pub first_line: usize,
}

impl SectionHeader {
    pub fn new(blobs: BlobPair, first_line: usize) -> Self {
        Self {
            blobs,
            path: None,
            first_line,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Whether this header covers `record`.
    ///
    /// Ids are compared by prefix on both sides. A record whose destination
    /// id is null while ours is not comes from an unhashed worktree file;
    /// it still matches when the source ids agree and the paths are equal.
    pub fn matches_record(&self, record: &FileChangeRecord) -> bool {
        if self.blobs.matches(&record.blobs) {
            return true;
        }

        record.blobs.to.is_null()
            && !self.blobs.to.is_null()
            && self.blobs.from.matches(&record.blobs.from)
            && self.path.as_deref() == Some(record.display_path())
    }
}

/// A parsed diff section with its rendered visibility and owning record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSection {
    pub header: SectionHeader,
    pub(crate) last_line: Option<usize>,
    pub(crate) visible: bool,
    pub(crate) owner: Option<RecordId>,
}

impl DiffSection {
    pub fn new(header: SectionHeader) -> Self {
        Self {
            header,
            last_line: None,
            visible: false,
            owner: None,
        }
    }

    pub fn blobs(&self) -> &BlobPair {
        &self.header.blobs
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn owner(&self) -> Option<RecordId> {
        self.owner
    }

    pub fn first_line(&self) -> usize {
        self.header.first_line
    }

    /// `None` while the section is still being streamed.
    pub fn last_line(&self) -> Option<usize> {
        self.last_line
    }

    /// Diff text lines covered, once the section has ended.
    pub fn lines(&self) -> Option<RangeInclusive<usize>> {
        self.last_line.map(|last| self.header.first_line..=last)
    }
}
