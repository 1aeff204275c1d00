//! The changed files of one commit and their links to diff sections.
//!
//! Records come from the raw diff stream, sections from the diff text
//! stream. Either may arrive first: a record looks for its section among
//! the pending headers, a section looks for its record among the unlinked
//! records and waits in the [`PendingHeaderCache`] otherwise.
//!
//! Each record owns at most one section and each section belongs to at
//! most one record. A section matched by records with differing ids, or a
//! record matched by sections with differing ids, is ambiguous: it is never
//! linked, and a link it already had is dropped. Whether something is
//! ambiguous depends only on what has arrived, not on the order.

use crate::blob::{BlobPair, PairMatch};
use crate::raw::FileChangeRecord;
use crate::render::FileRecordRenderer;
use crate::section::{DiffSection, PendingHeaderCache, SectionHeader, SectionId};
use tracing::{trace, warn};

/// Stable handle of a record within one change set. Handles issued before
/// a [`FileChangeSet::clear`] are rejected afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    pub(crate) epoch: u64,
    pub(crate) index: usize,
}

impl RecordId {
    /// Position in the set.
    pub fn index(self) -> usize {
        self.index
    }
}

/// What happened when a record or section was added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Linked to its counterpart.
    Linked { record: RecordId, section: SectionId },
    /// No counterpart yet. Sections wait in the pending cache.
    Deferred,
    /// Counterparts with differing ids matched by prefix; nothing was
    /// linked. `candidates` counts the matches of the ambiguous side.
    Ambiguous { candidates: usize },
}

/// Counterparts matched so far by one record or section.
#[derive(Debug, Clone, Default)]
struct Matches {
    /// Pair shared by every counterpart while they agree
    pair: Option<BlobPair>,
    count: usize,
    ambiguous: bool,
}

impl Matches {
    /// Count another matching counterpart. True if this one made it
    /// ambiguous.
    fn add(&mut self, pair: &BlobPair) -> bool {
        self.count += 1;
        if self.ambiguous {
            return false;
        }
        match &self.pair {
            None => {
                self.pair = Some(pair.clone());
                false
            }
            Some(seen) if seen == pair => false,
            Some(_) => {
                self.ambiguous = true;
                true
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct FileChangeSet {
    epoch: u64,
    records: Vec<FileChangeRecord>,
    record_matches: Vec<Matches>,
    sections: Vec<DiffSection>,
    section_matches: Vec<Matches>,
    pending: PendingHeaderCache,
    relinked: Vec<RecordId>,
}

impl FileChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: RecordId) -> bool {
        id.epoch == self.epoch && id.index < self.records.len()
    }

    /// Handle of the record at position `index`.
    pub fn id_at(&self, index: usize) -> Option<RecordId> {
        (index < self.records.len()).then(|| self.record_id(index))
    }

    pub fn get(&self, id: RecordId) -> Option<&FileChangeRecord> {
        if id.epoch != self.epoch {
            return None;
        }
        self.records.get(id.index)
    }

    pub fn section(&self, id: SectionId) -> Option<&DiffSection> {
        self.sections.get(id.0)
    }

    /// Section linked to `id`, if any.
    pub fn section_of(&self, id: RecordId) -> Option<&DiffSection> {
        self.get(id)?.section.and_then(|section| self.section(section))
    }

    pub fn is_ambiguous_record(&self, id: RecordId) -> bool {
        self.contains(id)
            && self
                .record_matches
                .get(id.index)
                .is_some_and(|m| m.ambiguous)
    }

    pub fn is_ambiguous_section(&self, id: SectionId) -> bool {
        self.section_matches.get(id.0).is_some_and(|m| m.ambiguous)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &FileChangeRecord)> {
        let epoch = self.epoch;
        self.records
            .iter()
            .enumerate()
            .map(move |(index, record)| (RecordId { epoch, index }, record))
    }

    pub fn ids(&self) -> impl Iterator<Item = RecordId> + use<> {
        let epoch = self.epoch;
        (0..self.records.len()).map(move |index| RecordId { epoch, index })
    }

    pub fn sections(&self) -> impl Iterator<Item = (SectionId, &DiffSection)> {
        self.sections
            .iter()
            .enumerate()
            .map(|(index, section)| (SectionId(index), section))
    }

    pub fn pending(&self) -> &PendingHeaderCache {
        &self.pending
    }

    /// Records whose link was dropped or moved by a later arrival since the
    /// last call, in set order.
    pub fn take_relinked(&mut self) -> Vec<RecordId> {
        let mut relinked = std::mem::take(&mut self.relinked);
        relinked.sort();
        relinked.dedup();
        relinked
    }

    /// Add a record, linking it to a pending section if one covers it.
    pub fn append(&mut self, mut record: FileChangeRecord) -> (RecordId, Reconciliation) {
        record.visible = false;
        record.section = None;

        let id = self.record_id(self.records.len());
        let matching: Vec<SectionId> = self
            .sections()
            .filter(|(_, section)| section.header.matches_record(&record))
            .map(|(section, _)| section)
            .collect();
        let blobs = record.blobs.clone();
        self.records.push(record);

        let mut matches = Matches::default();
        for &section in &matching {
            if let Some(s) = self.sections.get(section.0) {
                matches.add(&s.header.blobs);
            }
            let became_ambiguous = self
                .section_matches
                .get_mut(section.0)
                .is_some_and(|m| m.add(&blobs));
            if became_ambiguous {
                self.section_became_ambiguous(section);
            }
        }
        let ambiguous = matches.ambiguous.then_some(matches.count);
        self.record_matches.push(matches);

        if let Some(candidates) = ambiguous {
            warn!(record = id.index, %blobs, candidates, "ambiguous sections for record");
            return (id, Reconciliation::Ambiguous { candidates });
        }

        if let Some(section) = self.take_pending_for(id) {
            self.link(id, section);
            return (id, Reconciliation::Linked { record: id, section });
        }

        let blocked = matching
            .iter()
            .filter_map(|section| self.section_matches.get(section.0))
            .find(|m| m.ambiguous);
        match blocked {
            Some(m) => (id, Reconciliation::Ambiguous { candidates: m.count }),
            None => (id, Reconciliation::Deferred),
        }
    }

    /// Records whose ids prefix-match `pair`, in set order.
    pub fn find_by_blob_pair(&self, pair: &BlobPair) -> PairMatch<RecordId> {
        PairMatch::resolve(
            self.iter()
                .filter(|(_, record)| record.blobs.matches(pair))
                .map(|(id, record)| (&record.blobs, id))
                .collect(),
        )
    }

    /// First record whose source or destination path is `path`.
    pub fn find_by_path(&self, path: &str) -> Option<RecordId> {
        self.iter()
            .find(|(_, record)| record.path == path || record.new_path.as_deref() == Some(path))
            .map(|(id, _)| id)
    }

    /// A section started in the diff text: link it to its record, or keep
    /// it pending until the record arrives.
    pub fn on_section_started(&mut self, header: SectionHeader) -> (SectionId, Reconciliation) {
        let id = SectionId(self.sections.len());
        let matching: Vec<RecordId> = self
            .iter()
            .filter(|(_, record)| header.matches_record(record))
            .map(|(record, _)| record)
            .collect();
        let blobs = header.blobs.clone();
        self.sections.push(DiffSection::new(header));

        let mut matches = Matches::default();
        for &record in &matching {
            if let Some(r) = self.records.get(record.index) {
                matches.add(&r.blobs);
            }
            let became_ambiguous = self
                .record_matches
                .get_mut(record.index)
                .is_some_and(|m| m.add(&blobs));
            if became_ambiguous {
                self.record_became_ambiguous(record);
            }
        }
        let ambiguous = matches.ambiguous.then_some(matches.count);
        self.section_matches.push(matches);

        if let Some(candidates) = ambiguous {
            warn!(section = id.0, %blobs, candidates, "ambiguous records for section");
            return (id, Reconciliation::Ambiguous { candidates });
        }

        if let Some(record) = matching.iter().copied().find(|r| self.is_free_record(*r)) {
            self.link(record, id);
            return (
                id,
                Reconciliation::Linked {
                    record,
                    section: id,
                },
            );
        }

        self.pending.insert(blobs, id);
        let blocked = matching
            .iter()
            .filter_map(|record| self.record_matches.get(record.index))
            .find(|m| m.ambiguous);
        match blocked {
            Some(m) => (id, Reconciliation::Ambiguous { candidates: m.count }),
            None => (id, Reconciliation::Deferred),
        }
    }

    /// The most recently started section ended on `last_line`. Returns the
    /// record owning it when this closed it.
    pub fn end_section(&mut self, last_line: usize) -> Option<RecordId> {
        let section = self.sections.last_mut()?;
        if section.last_line.is_some() {
            return None;
        }
        section.last_line = Some(last_line);
        section.owner
    }

    /// Set the rendered visibility of a linked record and its section.
    /// Returns whether anything changed; unlinked records are left alone.
    pub(crate) fn set_visible(&mut self, id: RecordId, visible: bool) -> bool {
        if id.epoch != self.epoch {
            return false;
        }
        let Some(record) = self.records.get_mut(id.index) else {
            return false;
        };
        let Some(section) = record.section.and_then(|s| self.sections.get_mut(s.0)) else {
            return false;
        };
        if record.visible == visible && section.visible == visible {
            return false;
        }
        record.visible = visible;
        section.visible = visible;
        true
    }

    /// Drop every record, section and pending header. Handles issued so far
    /// stop being valid.
    pub fn clear(&mut self) {
        self.epoch += 1;
        self.records.clear();
        self.record_matches.clear();
        self.sections.clear();
        self.section_matches.clear();
        self.pending.clear();
        self.relinked.clear();
    }

    /// Hand every record accepted by `predicate` to `renderer`, in order.
    pub fn render<P, R>(&self, predicate: P, renderer: &mut R)
    where
        P: Fn(&FileChangeRecord) -> bool,
        R: FileRecordRenderer + ?Sized,
    {
        for (id, record) in self.iter().filter(|(_, record)| predicate(record)) {
            renderer.render(id, record, self.section_of(id));
        }
    }

    fn record_id(&self, index: usize) -> RecordId {
        RecordId {
            epoch: self.epoch,
            index,
        }
    }

    fn is_free_record(&self, id: RecordId) -> bool {
        !self.is_ambiguous_record(id) && self.get(id).is_some_and(|r| !r.is_linked())
    }

    /// Take the oldest pending, unambiguous section covering `id`.
    fn take_pending_for(&mut self, id: RecordId) -> Option<SectionId> {
        let record = self.records.get(id.index)?;
        let blobs = record.blobs.clone();
        let sections = &self.sections;
        let section_matches = &self.section_matches;
        let found = self.pending.take_matching(&blobs, |section| {
            section_matches.get(section.0).is_some_and(|m| !m.ambiguous)
                && sections
                    .get(section.0)
                    .is_some_and(|s| s.header.matches_record(record))
        });
        match found {
            PairMatch::Unique(section) => Some(section),
            PairMatch::Missing | PairMatch::Ambiguous(_) => None,
        }
    }

    fn section_became_ambiguous(&mut self, section: SectionId) {
        self.pending.remove_section(section);
        let Some(owner) = self.unlink(section) else {
            return;
        };
        self.relinked.push(owner);
        if !self.is_ambiguous_record(owner)
            && let Some(next) = self.take_pending_for(owner)
        {
            self.link(owner, next);
        }
    }

    fn record_became_ambiguous(&mut self, record: RecordId) {
        let Some(section) = self.records.get(record.index).and_then(|r| r.section) else {
            return;
        };
        self.unlink(section);
        self.relinked.push(record);

        let Some(header) = self.sections.get(section.0).map(|s| s.header.clone()) else {
            return;
        };
        let next = self
            .iter()
            .find(|(id, r)| !r.is_linked() && !self.is_ambiguous_record(*id) && header.matches_record(r))
            .map(|(id, _)| id);
        match next {
            Some(owner) => {
                self.link(owner, section);
                self.relinked.push(owner);
            }
            None => self.pending.insert(header.blobs, section),
        }
    }

    /// Break the link of `section`, returning its former owner.
    fn unlink(&mut self, section: SectionId) -> Option<RecordId> {
        let s = self.sections.get_mut(section.0)?;
        let owner = s.owner.take()?;
        s.visible = false;
        if let Some(r) = self.records.get_mut(owner.index) {
            r.section = None;
            r.visible = false;
        }
        trace!(record = owner.index, section = section.0, "unlinked");
        Some(owner)
    }

    fn link(&mut self, record: RecordId, section: SectionId) {
        if let Some(r) = self.records.get_mut(record.index) {
            r.section = Some(section);
            r.visible = true;
            trace!(record = record.index, section = section.0, path = %r.path, "linked");
        }
        if let Some(s) = self.sections.get_mut(section.0) {
            s.owner = Some(record);
            s.visible = true;
        }
    }
}
