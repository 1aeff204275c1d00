//! Which revision a view shows, and the git invocations feeding it.

use std::fmt;

/// Pretty format for the commit message preceding the diff text.
const MESSAGE_FORMAT: &str = "--pretty=format:%s%n%n%b";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revision {
    /// Changes in the index relative to `HEAD`
    Staged,
    /// Changes in the worktree
    Unstaged,
    /// A commit, by full object id
    Commit(String),
}

impl Revision {
    /// Whether the raw stream needs `HEAD` resolved first.
    pub fn needs_head(&self) -> bool {
        !matches!(self, Revision::Commit(_))
    }

    /// Arguments for the diff text stream.
    pub fn diff_text_args(&self) -> Vec<String> {
        let base: &[&str] = match self {
            Revision::Staged => &["diff", "--cached", "-M", "--no-color", "--no-ext-diff"],
            Revision::Unstaged => &["diff", "-M", "--no-color", "--no-ext-diff"],
            Revision::Commit(_) => &[
                "show",
                "-M",
                MESSAGE_FORMAT,
                "--encoding=UTF-8",
                "--no-color",
                "--no-ext-diff",
            ],
        };

        let mut args: Vec<String> = base.iter().map(|s| s.to_string()).collect();
        if let Revision::Commit(sha) = self {
            args.push(sha.clone());
        }
        args
    }

    /// Arguments for the raw diff stream. `head` is only used for staged
    /// and unstaged changes.
    pub fn raw_diff_args(&self, head: &str) -> Vec<String> {
        let args: Vec<&str> = match self {
            Revision::Staged => vec!["diff-index", "--raw", "-M", "--abbrev=40", head, "--cached"],
            Revision::Unstaged => vec!["diff-index", "--raw", "-M", "--abbrev=40", head],
            Revision::Commit(sha) => vec![
                "show",
                "--encoding=UTF-8",
                "--raw",
                "-M",
                "--pretty=format:",
                "--abbrev=40",
                sha.as_str(),
            ],
        };
        args.into_iter().map(str::to_string).collect()
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revision::Staged => f.write_str("staged changes"),
            Revision::Unstaged => f.write_str("unstaged changes"),
            Revision::Commit(sha) => f.write_str(sha),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn commit_streams() {
        let rev = Revision::Commit("abc123".to_string());
        assert!(!rev.needs_head());
        assert_eq!(
            rev.diff_text_args(),
            [
                "show",
                "-M",
                "--pretty=format:%s%n%n%b",
                "--encoding=UTF-8",
                "--no-color",
                "--no-ext-diff",
                "abc123"
            ]
        );
        assert_eq!(
            rev.raw_diff_args("ignored"),
            [
                "show",
                "--encoding=UTF-8",
                "--raw",
                "-M",
                "--pretty=format:",
                "--abbrev=40",
                "abc123"
            ]
        );
    }

    #[test]
    fn staged_streams() {
        let rev = Revision::Staged;
        assert!(rev.needs_head());
        assert_eq!(
            rev.diff_text_args(),
            ["diff", "--cached", "-M", "--no-color", "--no-ext-diff"]
        );
        assert_eq!(
            rev.raw_diff_args("f00"),
            ["diff-index", "--raw", "-M", "--abbrev=40", "f00", "--cached"]
        );
    }

    #[test]
    fn unstaged_streams() {
        let rev = Revision::Unstaged;
        assert_eq!(rev.diff_text_args(), ["diff", "-M", "--no-color", "--no-ext-diff"]);
        assert_eq!(
            rev.raw_diff_args("f00"),
            ["diff-index", "--raw", "-M", "--abbrev=40", "f00"]
        );
    }
}
