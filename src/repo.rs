//! libgit2 backed implementation of [`Git`] for a local checkout.
//!
//! Push credentials come from the forge token through libgit2 callbacks, and
//! the committer identity is written to the repository's own config, so
//! nothing outside the checkout is modified.
use async_trait::async_trait;
use color_eyre::eyre::eyre;
use git2::{
    BranchType, IndexAddOption, RemoteCallbacks, ResetType, StatusOptions,
    build::CheckoutBuilder,
};
use log::*;
use secrecy::{ExposeSecret, SecretString};
use std::path::Path;
use tokio::sync::Mutex;

use crate::{
    error::Result,
    git::{CommitterIdentity, Git, PushOptions},
};

/// Remote that release branches are pushed to.
pub const DEFAULT_REMOTE: &str = "origin";

/// Username paired with a token for https authentication.
const TOKEN_USER: &str = "x-access-token";

fn get_auth_callbacks<'r>(token: String) -> RemoteCallbacks<'r> {
    let mut callbacks = git2::RemoteCallbacks::new();
    callbacks.credentials(move |_url, _username, _allowed| {
        git2::Cred::userpass_plaintext(TOKEN_USER, &token)
    });
    callbacks.push_update_reference(|refname, status| match status {
        Some(msg) => Err(git2::Error::from_str(&format!(
            "remote rejected {refname}: {msg}"
        ))),
        None => Ok(()),
    });
    callbacks
}

pub struct Repository {
    repo: Mutex<git2::Repository>,
    token: SecretString,
}

impl Repository {
    /// Open the repository containing `path`.
    pub fn open(path: &Path, token: SecretString) -> Result<Self> {
        let repo = git2::Repository::discover(path)?;
        Ok(Self {
            repo: Mutex::new(repo),
            token,
        })
    }
}

#[async_trait]
impl Git for Repository {
    async fn setup_user(&self, identity: &CommitterIdentity) -> Result<()> {
        info!("setting git user: {} <{}>", identity.name, identity.email);
        let repo = self.repo.lock().await;
        let mut config = repo.config()?;
        config.set_str("user.name", &identity.name)?;
        config.set_str("user.email", &identity.email)?;
        Ok(())
    }

    async fn switch_to_maybe_existing_branch(
        &self,
        branch: &str,
    ) -> Result<()> {
        let repo = self.repo.lock().await;

        if repo.find_branch(branch, BranchType::Local).is_ok() {
            info!("switching to existing branch: {branch}");
        } else if let Ok(remote_branch) = repo.find_branch(
            &format!("{DEFAULT_REMOTE}/{branch}"),
            BranchType::Remote,
        ) {
            info!("creating branch {branch} from {DEFAULT_REMOTE}/{branch}");
            let commit = remote_branch.get().peel_to_commit()?;
            let mut local = repo.branch(branch, &commit, false)?;
            local.set_upstream(Some(&format!("{DEFAULT_REMOTE}/{branch}")))?;
        } else {
            info!("creating branch: {branch}");
            let commit = repo.head()?.peel_to_commit()?;
            repo.branch(branch, &commit, false)?;
        }

        let ref_name = format!("refs/heads/{branch}");
        let target_obj = repo.revparse_single(&ref_name)?;
        repo.checkout_tree(&target_obj, None)?;
        repo.set_head(&ref_name)?;

        Ok(())
    }

    async fn reset(&self, commit_ref: &str) -> Result<()> {
        info!("resetting to: {commit_ref}");
        let repo = self.repo.lock().await;
        let target = repo.revparse_single(commit_ref)?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        repo.reset(&target, ResetType::Hard, Some(&mut checkout))?;
        Ok(())
    }

    async fn check_if_clean(&self) -> Result<bool> {
        let repo = self.repo.lock().await;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        let statuses = repo.statuses(Some(&mut opts))?;
        debug!("working tree has {} changed entries", statuses.len());
        Ok(statuses.is_empty())
    }

    async fn commit_all(&self, message: &str) -> Result<()> {
        debug!("committing changes with msg: {message}");
        let repo = self.repo.lock().await;

        let mut index = repo.index()?;
        index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"], None)?;
        index.write()?;

        let config = repo.config()?.snapshot()?;
        let user = config.get_str("user.name")?;
        let email = config.get_str("user.email")?;
        let committer = git2::Signature::now(user, email)?;

        let oid = index.write_tree()?;
        let tree = repo.find_tree(oid)?;
        let parent_commit = repo.head()?.peel_to_commit()?;

        repo.commit(
            Some("HEAD"),
            &committer,
            &committer,
            message,
            &tree,
            &[&parent_commit],
        )?;

        Ok(())
    }

    async fn push(&self, branch: &str, options: PushOptions) -> Result<()> {
        info!("pushing branch {branch} (force: {})", options.force);
        let repo = self.repo.lock().await;

        let callbacks =
            get_auth_callbacks(self.token.expose_secret().to_string());
        let mut push_opts = git2::PushOptions::default();
        push_opts.remote_callbacks(callbacks);

        let mut remote = repo.find_remote(DEFAULT_REMOTE).map_err(|err| {
            eyre!("unable to find remote {DEFAULT_REMOTE}: {err}")
        })?;

        // + indicates "force" push
        let force = if options.force { "+" } else { "" };
        let ref_spec = format!("{force}refs/heads/{branch}:refs/heads/{branch}");
        remote.push(&[ref_spec], Some(&mut push_opts))?;

        Ok(())
    }
}
