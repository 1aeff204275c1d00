//! Reconciles the two git streams behind a revision view: the `--raw` diff
//! records listing the changed files and the full diff text, whose per-file
//! sections are matched back to those records by blob id.
//!
//! ```no_run
//! # use revision_changes::{Repository, Revision, Session};
//! let repo = Repository::new(".");
//! let mut session = Session::new();
//! repo.load(&mut session, Revision::Staged);
//! for (_, record) in session.changes().iter() {
//!     println!("{} {}", record.status.marker(), record.display_path());
//! }
//! ```

use error_set::error_set;
use std::process::Command;
use tracing::{debug, warn};

pub mod blob;
pub mod changes;
pub mod raw;
pub mod render;
pub mod revision;
pub mod section;
pub mod selection;
pub mod session;

pub use blob::{BlobId, BlobPair, PairMatch};
pub use changes::{FileChangeSet, Reconciliation, RecordId};
pub use raw::{FileChangeRecord, FileStatus, parse_raw_line, parse_raw_lines};
pub use render::{FileRecordRenderer, TextRenderer};
pub use revision::Revision;
pub use section::{DiffSection, SectionHeader, SectionId};
pub use selection::{SelectionError, SelectionVisibilityController};
pub use session::{ChangeEvent, LoadState, Session, Stream, StreamToken, Streams};

/// Lines per delivered batch when nothing else is configured.
pub const DEFAULT_BATCH_SIZE: usize = 2000;

error_set! {
    /// Top-level error for revision-changes operations
    RevisionChangesError := {
        #[display("No changed file named {path}")]
        UnknownPath { path: String },
        SelectionError(SelectionError),
    } || GitCommandError

    /// Errors from git command execution
    GitCommandError := {
        #[display("Failed to run git: {message}")]
        SpawnFailed { message: String },
        #[display("git failed: {stderr}")]
        ExitError { stderr: String },
        #[display("Invalid UTF-8 in git output: {message}")]
        InvalidUtf8 { message: String },
    }
}

/// Runs git in one repository and feeds its output to a [`Session`].
#[derive(Debug, Clone, Copy)]
pub struct Repository<'a> {
    repo_path: &'a str,
    batch_size: usize,
}

impl<'a> Repository<'a> {
    pub fn new(repo_path: &'a str) -> Self {
        Self {
            repo_path,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Deliver output in batches of `batch_size` lines (at least one).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Run `git -C <repo> <args>` and return its stdout.
    pub fn run<S: AsRef<str>>(&self, args: &[S]) -> Result<String, GitCommandError> {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        debug!(repo = self.repo_path, ?args, "running git");

        let output = Command::new("git")
            .arg("-C")
            .arg(self.repo_path)
            .args(&args)
            .output()
            .map_err(|e| GitCommandError::SpawnFailed {
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitCommandError::ExitError {
                stderr: stderr.trim_end().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|e| GitCommandError::InvalidUtf8 {
            message: e.to_string(),
        })
    }

    /// Full object id of `HEAD`
    pub fn head(&self) -> Result<String, GitCommandError> {
        Ok(self.run(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    /// Resolve a user-supplied revision to a commit.
    ///
    /// # Examples
    /// ```no_run
    /// # use revision_changes::Repository;
    /// let repo = Repository::new(".");
    /// let previous = repo.resolve("HEAD~1").unwrap();
    /// ```
    pub fn resolve(&self, rev: &str) -> Result<Revision, GitCommandError> {
        let commit = format!("{rev}^{{commit}}");
        let sha = self.run(&["rev-parse", "--verify", commit.as_str()])?;
        Ok(Revision::Commit(sha.trim().to_string()))
    }

    /// Show `revision` in `session`, running both git commands and handing
    /// their lines over as interleaved batches.
    ///
    /// A failing git command is logged and its stream simply ends without
    /// lines; the other stream is still delivered.
    pub fn load(&self, session: &mut Session, revision: Revision) -> Vec<ChangeEvent> {
        let text = self.capture(&revision.diff_text_args());
        let raw = self.raw_output(&revision);

        let Some(streams) = session.show(Some(revision)) else {
            return Vec::new();
        };
        session.begin_loading(streams.diff);
        session.begin_loading(streams.files);

        let text: Vec<&str> = text.lines().collect();
        let raw: Vec<&str> = raw.lines().collect();
        let mut text_batches = text.chunks(self.batch_size);
        let mut raw_batches = raw.chunks(self.batch_size);

        let mut events = Vec::new();
        loop {
            let (text_batch, raw_batch) = (text_batches.next(), raw_batches.next());
            if text_batch.is_none() && raw_batch.is_none() {
                break;
            }
            if let Some(batch) = text_batch {
                events.extend(session.update(streams.diff, batch));
            }
            if let Some(batch) = raw_batch {
                events.extend(session.update(streams.files, batch));
            }
        }

        events.extend(session.end_loading(streams.diff, false));
        events.extend(session.end_loading(streams.files, false));
        events
    }

    fn raw_output(&self, revision: &Revision) -> String {
        let head = if revision.needs_head() {
            match self.head() {
                Ok(head) => head,
                Err(e) => {
                    warn!(error = %e, "could not resolve HEAD");
                    return String::new();
                }
            }
        } else {
            String::new()
        };
        self.capture(&revision.raw_diff_args(&head))
    }

    fn capture(&self, args: &[String]) -> String {
        self.run(args).unwrap_or_else(|e| {
            warn!(error = %e, ?args, "git command failed");
            String::new()
        })
    }
}

/// Select the records named by `paths`, matching either side of a rename.
pub fn select_paths<S: AsRef<str>>(
    session: &mut Session,
    paths: &[S],
) -> Result<Vec<ChangeEvent>, RevisionChangesError> {
    let ids = paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            session
                .changes()
                .find_by_path(path)
                .ok_or_else(|| RevisionChangesError::UnknownPath {
                    path: path.to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(session.selection_changed(ids)?)
}
