//! Parsing for `git diff --raw` records into [`FileChangeRecord`]s.
//!
//! # Format
//!
//! ```text
//! :<oldmode> [:<oldmode> ...] <newmode> <from> [<from> ...] <to> <status>\t<path>[\t<new path>]
//! ```
//!
//! One leading `:` per parent. A record with `k` parents carries `3 + 2k`
//! space separated fields: `k` old modes, the new mode, `k` source ids, the
//! destination id, and a final field holding the status and path(s) split
//! by tabs. Only the first parent's source id is used for matching.
//!
//! Lines that do not have this shape are not records and are skipped.
//!
//! # Examples
//!
//! ```
//! use revision_changes::raw::{parse_raw_line, FileStatus};
//!
//! let record = parse_raw_line(":100644 100644 aaaaaaaa bbbbbbbb M\tfoo.txt").unwrap();
//! assert_eq!(record.blobs.from.as_str(), "aaaaaaaa");
//! assert_eq!(record.blobs.to.as_str(), "bbbbbbbb");
//! assert_eq!(record.status, FileStatus::Modified);
//! assert_eq!(record.path, "foo.txt");
//!
//! assert!(parse_raw_line("").is_none());
//! assert!(parse_raw_line("Merge branch 'topic'").is_none());
//! ```

use crate::blob::BlobPair;
use crate::section::SectionId;
use nom::{IResult, Parser, character::complete::char, multi::many0_count};

/// How a file changed, derived from the first status letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileStatus {
    New,
    Modified,
    Deleted,
}

impl FileStatus {
    /// `A` is new, `D` is deleted, everything else (including renames,
    /// copies and type changes) counts as modified.
    pub fn from_detail(detail: &str) -> Self {
        match detail.chars().next() {
            Some('A') => FileStatus::New,
            Some('D') => FileStatus::Deleted,
            _ => FileStatus::Modified,
        }
    }

    pub fn marker(self) -> char {
        match self {
            FileStatus::New => 'A',
            FileStatus::Modified => 'M',
            FileStatus::Deleted => 'D',
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FileStatus::New => "new",
            FileStatus::Modified => "modified",
            FileStatus::Deleted => "deleted",
        }
    }
}

/// One changed file of a commit's diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChangeRecord {
    /// First parent's source id and the destination id
    pub blobs: BlobPair,
    pub status: FileStatus,
    /// Raw status text such as `M`, `R100` or `MM`
    pub status_detail: String,
    /// Number of parents the record was computed against
    pub parents: usize,
    pub path: String,
    /// Destination path of a rename or copy
    pub new_path: Option<String>,
    pub(crate) visible: bool,
    pub(crate) section: Option<SectionId>,
}

impl FileChangeRecord {
    pub fn new(blobs: BlobPair, status_detail: &str, path: impl Into<String>) -> Self {
        Self {
            blobs,
            status: FileStatus::from_detail(status_detail),
            status_detail: status_detail.to_string(),
            parents: 1,
            path: path.into(),
            new_path: None,
            visible: false,
            section: None,
        }
    }

    /// Whether the linked section is currently shown. Always false while
    /// unlinked.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn section(&self) -> Option<SectionId> {
        self.section
    }

    pub fn is_linked(&self) -> bool {
        self.section.is_some()
    }

    /// Path the file has after the change.
    pub fn display_path(&self) -> &str {
        self.new_path.as_deref().unwrap_or(&self.path)
    }
}

/// Count the leading `:` parent markers.
fn parent_markers(input: &str) -> IResult<&str, usize> {
    many0_count(char(':')).parse(input)
}

/// Parse one raw diff line. Returns `None` for anything that is not a
/// file change record.
pub fn parse_raw_line(line: &str) -> Option<FileChangeRecord> {
    let (rest, parents) = parent_markers(line).ok()?;
    if parents == 0 {
        return None;
    }

    let field_count = 3 + 2 * parents;
    let fields: Vec<&str> = rest.splitn(field_count, ' ').collect();
    if fields.len() != field_count {
        return None;
    }

    let from = fields[parents + 1];
    let to = fields[field_count - 2];

    let mut names = fields[field_count - 1].split('\t');
    let status_detail = names.next()?;
    let path = names.next()?;
    let new_path = names.next().map(str::to_string);

    Some(FileChangeRecord {
        parents,
        new_path,
        ..FileChangeRecord::new(BlobPair::new(from, to), status_detail, path)
    })
}

/// Parse a batch of lines, skipping everything that is not a record.
pub fn parse_raw_lines<'a, I>(lines: I) -> impl Iterator<Item = FileChangeRecord>
where
    I: IntoIterator<Item = &'a str>,
{
    lines.into_iter().filter_map(parse_raw_line)
}
