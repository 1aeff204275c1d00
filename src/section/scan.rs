//! Finds file sections in streamed `git diff` / `git show` text.
//!
//! A section begins at a `diff --git` (or combined `diff --cc`) line and is
//! announced once its `index <from>..<to>` line has been seen, since that is
//! where the blob ids live. Headers without an index line (pure renames,
//! mode changes) never produce a section.

use super::SectionHeader;
use crate::blob::BlobPair;
use nom::{
    IResult, Parser,
    bytes::complete::{tag, take_while1},
    character::complete::char,
    multi::separated_list1,
    sequence::separated_pair,
};

/// What a pushed line did to the section structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A new section header carrying a blob pair was completed.
    Started(SectionHeader),
    /// The most recently started section ended on `last_line`.
    Ended { last_line: usize },
}

#[derive(Debug)]
struct OpenHeader {
    first_line: usize,
    path: Option<String>,
}

/// Line-at-a-time scanner; feed it every line of the diff text in order.
#[derive(Debug, Default)]
pub struct SectionScanner {
    line: usize,
    header: Option<OpenHeader>,
    section_open: bool,
}

impl SectionScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of lines pushed so far.
    pub fn lines_seen(&self) -> usize {
        self.line
    }

    pub fn push_line(&mut self, text: &str) -> Option<ScanEvent> {
        let line = self.line;
        self.line += 1;

        if let Some(path) = file_header(text) {
            self.header = Some(OpenHeader {
                first_line: line,
                path,
            });
            if std::mem::take(&mut self.section_open) {
                return Some(ScanEvent::Ended {
                    last_line: line.saturating_sub(1),
                });
            }
            return None;
        }

        if self.header.is_none() {
            return None;
        }

        if ends_header(text) {
            self.header = None;
            return None;
        }

        if let Ok((_, (froms, to))) = index_line(text)
            && let Some(from) = froms.first()
            && let Some(header) = self.header.take()
        {
            self.section_open = true;
            return Some(ScanEvent::Started(SectionHeader {
                blobs: BlobPair::new(*from, to),
                path: header.path,
                first_line: header.first_line,
            }));
        }

        None
    }

    /// Close the stream, ending any section still open.
    pub fn finish(&mut self) -> Option<ScanEvent> {
        self.header = None;
        if std::mem::take(&mut self.section_open) {
            Some(ScanEvent::Ended {
                last_line: self.line.saturating_sub(1),
            })
        } else {
            None
        }
    }

    /// Push a whole batch, collecting the events.
    pub fn push_lines<'a, I>(&mut self, lines: I) -> Vec<ScanEvent>
    where
        I: IntoIterator<Item = &'a str>,
    {
        lines
            .into_iter()
            .filter_map(|line| self.push_line(line))
            .collect()
    }
}

/// `Some(path)` for a file header line, where `path` is the destination
/// path if it can be read off the line.
fn file_header(line: &str) -> Option<Option<String>> {
    if let Some(rest) = line.strip_prefix("diff --git ") {
        return Some(rest.rsplit_once(" b/").map(|(_, path)| path.to_string()));
    }

    line.strip_prefix("diff --cc ")
        .or_else(|| line.strip_prefix("diff --combined "))
        .map(|path| Some(path.to_string()))
}

fn ends_header(line: &str) -> bool {
    line.starts_with("@@")
        || line.starts_with("--- ")
        || line.starts_with("+++ ")
        || line.starts_with("Binary files ")
}

fn hex(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_hexdigit()).parse(input)
}

/// `index <from>[,<from>...]..<to>[ <mode>]`
fn index_line(input: &str) -> IResult<&str, (Vec<&str>, &str)> {
    (
        tag("index "),
        separated_pair(separated_list1(char(','), hex), tag(".."), hex),
    )
        .map(|(_, ids)| ids)
        .parse(input)
}
