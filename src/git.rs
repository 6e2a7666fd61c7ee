//! Git operations needed to maintain the release branch.
//!
//! Each operation is safe to repeat: the release branch is rebuilt from the
//! triggering commit on every run, so nothing here tries to preserve its
//! previous history.
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::error::Result;

/// Name and email recorded on release commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitterIdentity {
    pub name: String,
    pub email: String,
}

impl Default for CommitterIdentity {
    fn default() -> Self {
        Self {
            name: "github-actions[bot]".into(),
            email: "github-actions[bot]@users.noreply.github.com".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushOptions {
    pub force: bool,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Git: Send + Sync {
    /// Configure the identity used for subsequent commits.
    async fn setup_user(&self, identity: &CommitterIdentity) -> Result<()>;

    /// Check out `branch`, creating it from the current commit when it
    /// exists neither locally nor on the remote.
    async fn switch_to_maybe_existing_branch(&self, branch: &str)
    -> Result<()>;

    /// Hard reset the current branch to `commit_ref`.
    async fn reset(&self, commit_ref: &str) -> Result<()>;

    /// True when the working tree has no uncommitted or untracked changes.
    async fn check_if_clean(&self) -> Result<bool>;

    /// Stage every change in the working tree and commit it.
    async fn commit_all(&self, message: &str) -> Result<()>;

    async fn push(&self, branch: &str, options: PushOptions) -> Result<()>;
}
