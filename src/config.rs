//! Immutable configuration threaded into the workflow engines.
use clap::ValueEnum;
use derive_builder::Builder;
use secrecy::SecretString;
use std::path::PathBuf;

use crate::{
    error::{ReleaseError, Result},
    git::CommitterIdentity,
};

pub const DEFAULT_VERSION_COMMAND: &str = "yarn changeset version";
pub const DEFAULT_PR_TITLE: &str = "Version Packages";
pub const DEFAULT_COMMIT_MESSAGE: &str = "Version Packages";

/// How a changed or published package without a changelog entry is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ChangelogPolicy {
    /// Missing entries abort the run.
    #[default]
    Required,
    /// Missing entries are logged and the package is left out.
    Optional,
}

#[derive(Debug, Clone, Builder)]
#[builder(setter(into), build_fn(private, name = "_build"))]
pub struct RunConfigParams {
    /// Workspace root the external tools run in.
    pub cwd: PathBuf,
    /// Branch the release pull request targets.
    #[builder(setter(into, strip_option), default)]
    pub base_branch: Option<String>,
    /// Commit that triggered the run. The release branch is reset to it.
    #[builder(setter(into, strip_option), default)]
    pub sha: Option<String>,
    #[builder(default = "DEFAULT_VERSION_COMMAND.into()")]
    pub version_command: String,
    #[builder(default = "DEFAULT_PR_TITLE.into()")]
    pub pr_title: String,
    #[builder(default = "DEFAULT_COMMIT_MESSAGE.into()")]
    pub commit_message: String,
    #[builder(default)]
    pub auto_publish: bool,
    #[builder(default)]
    pub dedupe: bool,
    #[builder(default)]
    pub changelog_policy: ChangelogPolicy,
    #[builder(default)]
    pub identity: CommitterIdentity,
    #[builder(setter(into, strip_option), default)]
    pub npm_token: Option<SecretString>,
}

impl RunConfigParamsBuilder {
    pub fn build(&self) -> Result<RunConfig> {
        let params = self._build().map_err(|e| {
            ReleaseError::invalid_config(format!(
                "Failed to build run config: {}",
                e
            ))
        })?;
        RunConfig::new(params)
    }
}

/// Settings for a single run, produced once by the setup step.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub cwd: PathBuf,
    pub base_branch: Option<String>,
    pub sha: Option<String>,
    pub version_command: String,
    pub pr_title: String,
    pub commit_message: String,
    pub auto_publish: bool,
    pub dedupe: bool,
    pub changelog_policy: ChangelogPolicy,
    pub identity: CommitterIdentity,
    pub npm_token: Option<SecretString>,
}

impl RunConfig {
    pub fn builder() -> RunConfigParamsBuilder {
        RunConfigParamsBuilder::default()
    }

    pub fn new(params: RunConfigParams) -> Result<Self> {
        if params.version_command.trim().is_empty() {
            return Err(ReleaseError::invalid_config(
                "version command must not be empty",
            ));
        }

        Ok(Self {
            cwd: params.cwd,
            base_branch: params.base_branch.filter(|b| !b.is_empty()),
            sha: params.sha.filter(|s| !s.is_empty()),
            version_command: params.version_command,
            pr_title: params.pr_title,
            commit_message: params.commit_message,
            auto_publish: params.auto_publish,
            dedupe: params.dedupe,
            changelog_policy: params.changelog_policy,
            identity: params.identity,
            npm_token: params.npm_token,
        })
    }
}
