use crate::changes::{FileChangeSet, RecordId};
use error_set::error_set;
use std::collections::BTreeSet;

error_set! {
    /// Errors from applying a file list selection
    SelectionError := {
        /// The selection names a record that is not in the current set
        #[display("Record {index} is not part of the current change set")]
        UnknownRecord { index: usize },
    }
}

/// Keeps diff section visibility in step with the file list selection.
///
/// With nothing selected every linked record is shown; otherwise exactly the
/// selected ones are. Records without a section are never touched.
#[derive(Debug, Default, Clone)]
pub struct SelectionVisibilityController {
    selected: BTreeSet<RecordId>,
}

impl SelectionVisibilityController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.selected.iter().copied()
    }

    /// Visibility `id` should have under the current selection.
    pub fn wants_visible(&self, id: RecordId) -> bool {
        self.selected.is_empty() || self.selected.contains(&id)
    }

    /// Replace the selection and recompute visibility. Returns the records
    /// whose visibility changed.
    pub fn selection_changed<I>(
        &mut self,
        set: &mut FileChangeSet,
        selected: I,
    ) -> Result<Vec<RecordId>, SelectionError>
    where
        I: IntoIterator<Item = RecordId>,
    {
        let selected: BTreeSet<RecordId> = selected.into_iter().collect();
        if let Some(unknown) = selected.iter().find(|id| !set.contains(**id)) {
            return Err(SelectionError::UnknownRecord {
                index: unknown.index(),
            });
        }

        self.selected = selected;
        Ok(self.apply(set))
    }

    /// Recompute visibility for every linked record under the current
    /// selection.
    pub fn apply(&self, set: &mut FileChangeSet) -> Vec<RecordId> {
        set.ids()
            .filter(|id| set.set_visible(*id, self.wants_visible(*id)))
            .collect()
    }

    /// Bring a single record in line with the selection, e.g. right after
    /// it was linked. Returns whether it changed.
    pub fn refresh(&self, set: &mut FileChangeSet, id: RecordId) -> bool {
        set.set_visible(id, self.wants_visible(id))
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }
}
