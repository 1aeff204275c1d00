//! Presenting change sets to whatever draws the file list.

use crate::changes::RecordId;
use crate::raw::FileChangeRecord;
use crate::section::DiffSection;

/// Receives the records of a change set one at a time.
pub trait FileRecordRenderer {
    fn render(&mut self, id: RecordId, record: &FileChangeRecord, section: Option<&DiffSection>);
}

impl<F> FileRecordRenderer for F
where
    F: FnMut(RecordId, &FileChangeRecord, Option<&DiffSection>),
{
    fn render(&mut self, id: RecordId, record: &FileChangeRecord, section: Option<&DiffSection>) {
        self(id, record, section)
    }
}

/// List filter: a record is listed once its diff section has been found.
pub fn listed(record: &FileChangeRecord) -> bool {
    record.is_linked()
}

/// List filter that keeps every record.
pub fn everything(_: &FileChangeRecord) -> bool {
    true
}

/// Renders one line per record.
///
/// ```text
/// M src/lib.rs [5-40]
/// A docs/new.md [41-] (hidden)
/// M old.rs -> new.rs (no diff)
/// ```
#[derive(Debug, Default)]
pub struct TextRenderer {
    out: String,
}

impl TextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

impl FileRecordRenderer for TextRenderer {
    fn render(&mut self, _id: RecordId, record: &FileChangeRecord, section: Option<&DiffSection>) {
        self.out
            .push_str(&format!("{} {}", record.status.marker(), record.path));
        if let Some(new_path) = &record.new_path {
            self.out.push_str(&format!(" -> {new_path}"));
        }

        match section {
            Some(section) => {
                match section.last_line() {
                    Some(last) => self
                        .out
                        .push_str(&format!(" [{}-{}]", section.first_line(), last)),
                    None => self.out.push_str(&format!(" [{}-]", section.first_line())),
                }
                if !record.is_visible() {
                    self.out.push_str(" (hidden)");
                }
            }
            None => self.out.push_str(" (no diff)"),
        }
        self.out.push('\n');
    }
}
