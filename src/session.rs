//! Per-commit lifecycle of the two streams feeding a [`FileChangeSet`].
//!
//! Showing a revision hands out one [`StreamToken`] per stream. Tokens carry
//! the generation they were issued for, so callbacks from a stream that was
//! superseded by a newer [`Session::show`] are dropped on arrival instead of
//! mutating the new commit's state.

use crate::changes::{FileChangeSet, RecordId, Reconciliation};
use crate::raw::parse_raw_line;
use crate::revision::Revision;
use crate::section::{ScanEvent, SectionId, SectionScanner};
use crate::selection::{SelectionError, SelectionVisibilityController};
use tracing::debug;

/// The two line streams of a revision view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// Full diff text; yields section starts
    DiffText,
    /// `--raw` diff records; yields file change records
    RawIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamToken {
    generation: u64,
    stream: Stream,
}

impl StreamToken {
    pub fn stream(self) -> Stream {
        self.stream
    }
}

/// Tokens for the streams of one shown revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Streams {
    pub diff: StreamToken,
    pub files: StreamToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamStatus {
    Idle,
    Pending,
    Running,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Empty,
    /// `files` / `diff` are true while that stream is outstanding
    Loading { files: bool, diff: bool },
    Ready,
}

/// Notifications for whatever renders the file list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    RecordAdded(RecordId),
    /// Link or visibility of the record changed
    RecordUpdated(RecordId),
    AmbiguousRecord { record: RecordId, candidates: usize },
    AmbiguousSection { section: SectionId, candidates: usize },
}

#[derive(Debug)]
pub struct Session {
    generation: u64,
    revision: Option<Revision>,
    changes: FileChangeSet,
    selection: SelectionVisibilityController,
    scanner: SectionScanner,
    raw: StreamStatus,
    text: StreamStatus,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            generation: 0,
            revision: None,
            changes: FileChangeSet::new(),
            selection: SelectionVisibilityController::new(),
            scanner: SectionScanner::new(),
            raw: StreamStatus::Idle,
            text: StreamStatus::Idle,
        }
    }

    pub fn revision(&self) -> Option<&Revision> {
        self.revision.as_ref()
    }

    pub fn changes(&self) -> &FileChangeSet {
        &self.changes
    }

    pub fn selection(&self) -> &SelectionVisibilityController {
        &self.selection
    }

    pub fn state(&self) -> LoadState {
        if self.revision.is_none() {
            return LoadState::Empty;
        }
        match (self.raw, self.text) {
            (StreamStatus::Done, StreamStatus::Done) => LoadState::Ready,
            (raw, text) => LoadState::Loading {
                files: raw != StreamStatus::Done,
                diff: text != StreamStatus::Done,
            },
        }
    }

    /// Switch to `revision`, discarding everything from the previous one.
    /// Returns the tokens the new streams must report with, or `None` when
    /// nothing is shown.
    pub fn show(&mut self, revision: Option<Revision>) -> Option<Streams> {
        self.cancel();
        let revision = revision?;

        debug!(generation = self.generation, %revision, "showing revision");
        self.revision = Some(revision);
        self.raw = StreamStatus::Pending;
        self.text = StreamStatus::Pending;
        Some(Streams {
            diff: self.token(Stream::DiffText),
            files: self.token(Stream::RawIndex),
        })
    }

    /// Drop all state and invalidate outstanding tokens.
    pub fn cancel(&mut self) {
        if self.revision.is_some() {
            debug!(generation = self.generation, records = self.changes.len(), "clearing session");
        }
        self.generation += 1;
        self.revision = None;
        self.changes.clear();
        self.selection.clear();
        self.scanner = SectionScanner::new();
        self.raw = StreamStatus::Idle;
        self.text = StreamStatus::Idle;
    }

    pub fn begin_loading(&mut self, token: StreamToken) -> bool {
        if !self.is_current(token) {
            return false;
        }
        let status = self.status_mut(token.stream);
        if *status != StreamStatus::Pending {
            debug!(stream = ?token.stream, "stream already started");
            return false;
        }
        *status = StreamStatus::Running;
        true
    }

    pub fn update<S: AsRef<str>>(&mut self, token: StreamToken, lines: &[S]) -> Vec<ChangeEvent> {
        if !self.is_running(token) {
            return Vec::new();
        }

        let lines = lines.iter().map(AsRef::as_ref);
        match token.stream {
            Stream::RawIndex => self.add_records(lines),
            Stream::DiffText => self.add_sections(lines),
        }
    }

    /// A stream finished. A cancelled stream of the current revision empties
    /// the session. Ending the diff text closes its last section, which
    /// updates the record owning it.
    pub fn end_loading(&mut self, token: StreamToken, cancelled: bool) -> Vec<ChangeEvent> {
        if !self.is_current(token) {
            return Vec::new();
        }
        if cancelled {
            debug!(stream = ?token.stream, "stream cancelled");
            self.cancel();
            return Vec::new();
        }

        let status = self.status_mut(token.stream);
        if *status == StreamStatus::Done {
            return Vec::new();
        }
        *status = StreamStatus::Done;

        let mut events = Vec::new();
        if token.stream == Stream::DiffText
            && let Some(ScanEvent::Ended { last_line }) = self.scanner.finish()
            && let Some(owner) = self.changes.end_section(last_line)
        {
            events.push(ChangeEvent::RecordUpdated(owner));
        }

        debug!(
            stream = ?token.stream,
            records = self.changes.len(),
            pending = self.changes.pending().len(),
            "stream finished"
        );
        events
    }

    /// The file list selection changed.
    pub fn selection_changed<I>(&mut self, selected: I) -> Result<Vec<ChangeEvent>, SelectionError>
    where
        I: IntoIterator<Item = RecordId>,
    {
        Ok(self
            .selection
            .selection_changed(&mut self.changes, selected)?
            .into_iter()
            .map(ChangeEvent::RecordUpdated)
            .collect())
    }

    fn add_records<'a>(&mut self, lines: impl Iterator<Item = &'a str>) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        for record in lines.filter_map(parse_raw_line) {
            let (id, outcome) = self.changes.append(record);
            match outcome {
                Reconciliation::Linked { record, .. } => {
                    self.selection.refresh(&mut self.changes, record);
                }
                Reconciliation::Ambiguous { candidates } => {
                    events.push(ChangeEvent::AmbiguousRecord {
                        record: id,
                        candidates,
                    });
                    self.relinked(&mut events);
                }
                Reconciliation::Deferred => {}
            }
            events.push(ChangeEvent::RecordAdded(id));
        }
        events
    }

    fn add_sections<'a>(&mut self, lines: impl Iterator<Item = &'a str>) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        for line in lines {
            match self.scanner.push_line(line) {
                Some(ScanEvent::Started(header)) => {
                    let (section, outcome) = self.changes.on_section_started(header);
                    match outcome {
                        Reconciliation::Linked { record, .. } => {
                            self.selection.refresh(&mut self.changes, record);
                            events.push(ChangeEvent::RecordUpdated(record));
                        }
                        Reconciliation::Ambiguous { candidates } => {
                            events.push(ChangeEvent::AmbiguousSection {
                                section,
                                candidates,
                            });
                            self.relinked(&mut events);
                        }
                        Reconciliation::Deferred => {}
                    }
                }
                Some(ScanEvent::Ended { last_line }) => {
                    if let Some(owner) = self.changes.end_section(last_line) {
                        events.push(ChangeEvent::RecordUpdated(owner));
                    }
                }
                None => {}
            }
        }
        events
    }

    /// Records that lost or changed their section to an ambiguity.
    fn relinked(&mut self, events: &mut Vec<ChangeEvent>) {
        for record in self.changes.take_relinked() {
            self.selection.refresh(&mut self.changes, record);
            events.push(ChangeEvent::RecordUpdated(record));
        }
    }

    fn token(&self, stream: Stream) -> StreamToken {
        StreamToken {
            generation: self.generation,
            stream,
        }
    }

    fn is_current(&self, token: StreamToken) -> bool {
        let current = token.generation == self.generation && self.revision.is_some();
        if !current {
            debug!(stream = ?token.stream, "ignoring stale stream callback");
        }
        current
    }

    fn is_running(&self, token: StreamToken) -> bool {
        self.is_current(token)
            && match token.stream {
                Stream::RawIndex => self.raw == StreamStatus::Running,
                Stream::DiffText => self.text == StreamStatus::Running,
            }
    }

    fn status_mut(&mut self, stream: Stream) -> &mut StreamStatus {
        match stream {
            Stream::RawIndex => &mut self.raw,
            Stream::DiffText => &mut self.text,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    const RAW: &[&str] = &[
        "",
        ":100644 100644 abc1234000000000000000000000000000000000 def5678000000000000000000000000000000000 M\tflake.nix",
        ":000000 100644 0000000000000000000000000000000000000000 2223333000000000000000000000000000000000 A\tgtk.nix",
    ];

    const TEXT: &[&str] = &[
        "Add debug flag",
        "",
        "diff --git a/flake.nix b/flake.nix",
        "index abc1234..def5678 100644",
        "--- a/flake.nix",
        "+++ b/flake.nix",
        "@@ -136,0 +137 @@",
        "+      debug = true;",
        "diff --git a/gtk.nix b/gtk.nix",
        "new file mode 100644",
        "index 0000000..2223333",
        "--- /dev/null",
        "+++ b/gtk.nix",
        "@@ -0,0 +1 @@",
        "+    gtk.cursorTheme.size = 24;",
    ];

    fn commit() -> Revision {
        Revision::Commit("1234567".to_string())
    }

    fn started(session: &mut Session) -> Streams {
        let streams = session.show(Some(commit())).unwrap();
        assert!(session.begin_loading(streams.diff));
        assert!(session.begin_loading(streams.files));
        streams
    }

    fn id(session: &Session, index: usize) -> RecordId {
        session.changes().id_at(index).unwrap()
    }

    fn linked_paths(session: &Session) -> Vec<(String, bool)> {
        session
            .changes()
            .iter()
            .map(|(_, r)| (r.path.clone(), r.is_linked()))
            .collect()
    }

    #[test]
    fn state_machine() {
        let mut session = Session::new();
        assert_eq!(session.state(), LoadState::Empty);

        let streams = session.show(Some(commit())).unwrap();
        assert_eq!(session.state(), LoadState::Loading { files: true, diff: true });

        session.begin_loading(streams.diff);
        session.begin_loading(streams.files);
        session.update(streams.files, RAW);
        session.end_loading(streams.files, false);
        assert_eq!(session.state(), LoadState::Loading { files: false, diff: true });

        session.update(streams.diff, TEXT);
        session.end_loading(streams.diff, false);
        assert_eq!(session.state(), LoadState::Ready);

        session.show(None);
        assert_eq!(session.state(), LoadState::Empty);
    }

    #[test]
    fn records_first_then_text() {
        let mut session = Session::new();
        let streams = started(&mut session);

        let events = session.update(streams.files, RAW);
        let (flake, gtk) = (id(&session, 0), id(&session, 1));
        assert_eq!(
            events,
            vec![ChangeEvent::RecordAdded(flake), ChangeEvent::RecordAdded(gtk)]
        );

        // linked, then closed by the next header, then the second one linked
        let events = session.update(streams.diff, TEXT);
        assert_eq!(
            events,
            vec![
                ChangeEvent::RecordUpdated(flake),
                ChangeEvent::RecordUpdated(flake),
                ChangeEvent::RecordUpdated(gtk)
            ]
        );
        assert_eq!(session.changes().section_of(gtk).unwrap().last_line(), None);

        let events = session.end_loading(streams.diff, false);
        assert_eq!(events, vec![ChangeEvent::RecordUpdated(gtk)]);

        assert_eq!(
            linked_paths(&session),
            vec![("flake.nix".to_string(), true), ("gtk.nix".to_string(), true)]
        );
        let changes = session.changes();
        assert_eq!(changes.section_of(flake).unwrap().lines(), Some(2..=7));
        assert_eq!(changes.section_of(gtk).unwrap().lines(), Some(8..=14));
    }

    #[test]
    fn closing_an_unlinked_section_reports_nothing() {
        let mut session = Session::new();
        let streams = started(&mut session);
        session.update(streams.diff, TEXT);
        assert!(session.end_loading(streams.diff, false).is_empty());
        assert!(session.end_loading(streams.diff, false).is_empty());
    }

    #[test]
    fn text_first_then_records() {
        let mut session = Session::new();
        let streams = started(&mut session);

        assert!(session.update(streams.diff, TEXT).is_empty());
        assert_eq!(session.changes().pending().len(), 2);

        session.update(streams.files, RAW);
        assert!(session.changes().pending().is_empty());
        assert!(session.changes().iter().all(|(_, r)| r.is_visible()));
    }

    #[test]
    fn interleaved_batches() {
        let mut session = Session::new();
        let streams = started(&mut session);

        session.update(streams.diff, &TEXT[..6]);
        session.update(streams.files, &RAW[..1]);
        session.update(streams.files, &RAW[1..2]);
        session.update(streams.diff, &TEXT[6..]);
        session.update(streams.files, &RAW[2..]);
        session.end_loading(streams.files, false);
        session.end_loading(streams.diff, false);

        assert_eq!(
            linked_paths(&session),
            vec![("flake.nix".to_string(), true), ("gtk.nix".to_string(), true)]
        );
        assert_eq!(session.state(), LoadState::Ready);
    }

    #[test]
    fn stale_tokens_are_ignored() {
        let mut session = Session::new();
        let old = started(&mut session);
        session.update(old.files, &RAW[..2]);

        let new = started(&mut session);
        assert!(session.changes().is_empty());

        assert!(session.update(old.files, RAW).is_empty());
        assert!(session.update(old.diff, TEXT).is_empty());
        session.end_loading(old.files, true);
        assert!(session.changes().is_empty());
        assert_eq!(session.changes().sections().count(), 0);
        assert_eq!(session.state(), LoadState::Loading { files: true, diff: true });

        session.update(new.files, RAW);
        assert_eq!(session.changes().len(), 2);
    }

    #[test]
    fn updates_need_begin() {
        let mut session = Session::new();
        let streams = session.show(Some(commit())).unwrap();
        assert!(session.update(streams.files, RAW).is_empty());
        assert!(session.changes().is_empty());

        assert!(session.begin_loading(streams.files));
        assert!(!session.begin_loading(streams.files));
        assert_eq!(session.update(streams.files, RAW).len(), 2);
    }

    #[test]
    fn cancelled_stream_empties_session() {
        let mut session = Session::new();
        let streams = started(&mut session);
        session.update(streams.files, RAW);
        session.update(streams.diff, &TEXT[..4]);

        session.end_loading(streams.diff, true);
        assert_eq!(session.state(), LoadState::Empty);
        assert!(session.changes().is_empty());
        assert!(session.changes().pending().is_empty());
        assert!(session.update(streams.files, RAW).is_empty());
    }

    #[test]
    fn selection_drives_visibility() {
        let mut session = Session::new();
        let streams = started(&mut session);
        session.update(streams.files, RAW);
        session.update(streams.diff, TEXT);

        let (flake, gtk) = (id(&session, 0), id(&session, 1));
        let events = session.selection_changed([gtk]).unwrap();
        assert_eq!(events, vec![ChangeEvent::RecordUpdated(flake)]);
        assert!(session.selection_changed([gtk]).unwrap().is_empty());

        assert!(matches!(
            session.selection_changed([RecordId { epoch: gtk.epoch, index: 5 }]),
            Err(SelectionError::UnknownRecord { index: 5 })
        ));
    }

    #[test]
    fn ids_from_an_earlier_revision_are_rejected() {
        let mut session = Session::new();
        let streams = started(&mut session);
        session.update(streams.files, RAW);
        session.update(streams.diff, TEXT);
        let old = id(&session, 1);

        let streams = started(&mut session);
        session.update(streams.files, RAW);
        session.update(streams.diff, TEXT);

        assert!(matches!(
            session.selection_changed([old]),
            Err(SelectionError::UnknownRecord { index: 1 })
        ));
        assert_eq!(session.selection().selected().count(), 0);
        assert!(session.changes().iter().all(|(_, r)| r.is_visible()));
        assert!(session.selection_changed([id(&session, 1)]).is_ok());
    }

    #[test]
    fn ambiguity_hides_a_linked_record() {
        const SHARED: &[&str] = &[
            ":100644 100644 abc1234100000000000000000000000000000000 def5678000000000000000000000000000000000 M\ta.nix",
            ":100644 100644 abc1234200000000000000000000000000000000 def5678000000000000000000000000000000000 M\tb.nix",
        ];
        let mut session = Session::new();
        let streams = started(&mut session);
        session.update(streams.files, &SHARED[..1]);
        session.update(streams.diff, &TEXT[..8]);
        let first = id(&session, 0);
        assert!(session.changes().get(first).unwrap().is_visible());

        let events = session.update(streams.files, &SHARED[1..]);
        let second = id(&session, 1);
        assert_eq!(
            events,
            vec![
                ChangeEvent::AmbiguousRecord { record: second, candidates: 2 },
                ChangeEvent::RecordUpdated(first),
                ChangeEvent::RecordAdded(second)
            ]
        );
        assert!(!session.changes().get(first).unwrap().is_linked());
        assert!(!session.changes().get(first).unwrap().is_visible());
        assert!(session.changes().sections().all(|(s, _)| session.changes().is_ambiguous_section(s)));
    }

    #[test]
    fn record_linked_after_selection_follows_it() {
        let mut session = Session::new();
        let streams = started(&mut session);
        session.update(streams.files, RAW);
        session.update(streams.diff, &TEXT[..8]);

        let (flake, gtk) = (id(&session, 0), id(&session, 1));
        session.selection_changed([flake]).unwrap();
        session.update(streams.diff, &TEXT[8..]);

        let changes = session.changes();
        assert!(changes.get(flake).unwrap().is_visible());
        assert!(changes.get(gtk).unwrap().is_linked());
        assert!(!changes.get(gtk).unwrap().is_visible());
    }

    #[test]
    fn new_revision_clears_selection() {
        let mut session = Session::new();
        let streams = started(&mut session);
        session.update(streams.files, RAW);
        session.update(streams.diff, TEXT);
        session.selection_changed([id(&session, 0)]).unwrap();

        let streams = started(&mut session);
        assert_eq!(session.selection().selected().count(), 0);
        session.update(streams.diff, TEXT);
        session.update(streams.files, RAW);
        assert!(session.changes().iter().all(|(_, r)| r.is_visible()));
    }
}
