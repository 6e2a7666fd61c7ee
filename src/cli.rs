//! CLI argument parsing and the setup step that turns flags and the
//! GitHub Actions environment into run configuration.
use clap::Parser;
use git_url_parse::GitUrl;
use secrecy::SecretString;
use std::{env, path::PathBuf};

use crate::{
    config::{
        ChangelogPolicy, DEFAULT_COMMIT_MESSAGE, DEFAULT_PR_TITLE,
        DEFAULT_VERSION_COMMAND, RunConfig,
    },
    error::{ReleaseError, Result},
    forge::config::RemoteConfig,
};

const DEFAULT_SERVER_URL: &str = "https://github.com";

/// Open or refresh the release pull request, or publish once it is merged.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[arg(long, default_value = DEFAULT_VERSION_COMMAND)]
    /// Command that bumps versions and writes changelogs.
    pub version_command: String,

    #[arg(long, default_value = DEFAULT_PR_TITLE)]
    /// Title of the release pull request.
    pub title: String,

    #[arg(long, default_value = DEFAULT_COMMIT_MESSAGE)]
    /// Commit message used for the version bump.
    pub commit: String,

    #[arg(long, default_value_t = false)]
    /// Publish packages when no changesets are pending.
    pub auto_publish: bool,

    #[arg(long, default_value_t = false)]
    /// Run `yarn dedupe` after updating the lock file.
    pub dedupe: bool,

    #[arg(long)]
    /// Workspace root. Defaults to the current directory.
    pub cwd: Option<PathBuf>,

    #[arg(long, default_value = "")]
    /// GitHub repository URL (https://github.com/owner/repo). Falls back to
    /// GITHUB_SERVER_URL and GITHUB_REPOSITORY.
    pub github_repo: String,

    #[arg(long, default_value = "")]
    /// GitHub access token. Falls back to GITHUB_TOKEN env var.
    pub github_token: String,

    #[arg(long, default_value = "")]
    /// npm registry token. Falls back to NPM_TOKEN env var.
    pub npm_token: String,

    #[arg(long, default_value = "")]
    /// Branch the release pull request targets. Falls back to GITHUB_REF.
    pub base_branch: String,

    #[arg(long, default_value = "")]
    /// Triggering commit. Falls back to GITHUB_SHA.
    pub sha: String,

    #[arg(long)]
    /// File receiving run outputs. Falls back to GITHUB_OUTPUT.
    pub output_file: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ChangelogPolicy::Required)]
    /// Whether a missing changelog entry aborts the run.
    pub changelog_policy: ChangelogPolicy,

    #[arg(long, default_value_t = false)]
    /// Enable debug logging.
    pub debug: bool,
}

/// Everything the binary needs after setup.
#[derive(Debug)]
pub struct Setup {
    pub run: RunConfig,
    pub remote: RemoteConfig,
    pub output_file: Option<PathBuf>,
}

impl Args {
    /// Resolve flags against the process environment.
    pub fn resolve(&self) -> Result<Setup> {
        self.resolve_with(|key| env::var(key).ok())
    }

    /// Resolve flags against `lookup`. Empty values count as unset.
    pub fn resolve_with<F>(&self, lookup: F) -> Result<Setup>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let remote = self.get_remote(&var)?;

        let cwd = match &self.cwd {
            Some(cwd) => std::path::absolute(cwd)?,
            None => env::current_dir()?,
        };

        let base_branch = non_empty(&self.base_branch)
            .or_else(|| var("GITHUB_REF").and_then(|r| branch_from_ref(&r)));

        let sha = non_empty(&self.sha).or_else(|| var("GITHUB_SHA"));

        let npm_token = non_empty(&self.npm_token).or_else(|| var("NPM_TOKEN"));

        let mut builder = RunConfig::builder();
        builder
            .cwd(cwd)
            .version_command(self.version_command.clone())
            .pr_title(self.title.clone())
            .commit_message(self.commit.clone())
            .auto_publish(self.auto_publish)
            .dedupe(self.dedupe)
            .changelog_policy(self.changelog_policy);

        if let Some(base_branch) = base_branch {
            builder.base_branch(base_branch);
        }

        if let Some(sha) = sha {
            builder.sha(sha);
        }

        if let Some(token) = npm_token {
            builder.npm_token(SecretString::from(token));
        }

        let output_file = self
            .output_file
            .clone()
            .or_else(|| var("GITHUB_OUTPUT").map(PathBuf::from));

        Ok(Setup {
            run: builder.build()?,
            remote,
            output_file,
        })
    }

    /// Configure the GitHub remote from the repo URL and token.
    fn get_remote<F>(&self, var: &F) -> Result<RemoteConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let repo_url = match non_empty(&self.github_repo) {
            Some(url) => url,
            None => {
                let repository = var("GITHUB_REPOSITORY").ok_or_else(|| {
                    ReleaseError::invalid_config(
                        "must set --github-repo or GITHUB_REPOSITORY",
                    )
                })?;
                let server = var("GITHUB_SERVER_URL")
                    .unwrap_or_else(|| DEFAULT_SERVER_URL.into());
                format!("{}/{}", server.trim_end_matches('/'), repository)
            }
        };

        let parsed = GitUrl::parse(&repo_url)?;

        validate_scheme(parsed.scheme)?;

        let mut token = self.github_token.clone();

        if token.is_empty()
            && let Some(parsed_token) = parsed.token
        {
            token = parsed_token;
        }

        if token.is_empty()
            && let Some(env_var_token) = var("GITHUB_TOKEN")
        {
            token = env_var_token;
        }

        if token.is_empty() {
            return Err(ReleaseError::missing_credential(
                "Please add the GITHUB_TOKEN to the changesets action",
            ));
        }

        let host = parsed.host.ok_or_else(|| {
            ReleaseError::invalid_config("unable to parse host from github repo")
        })?;

        let owner = parsed.owner.ok_or_else(|| {
            ReleaseError::invalid_config(
                "unable to parse owner from github repo",
            )
        })?;

        Ok(RemoteConfig {
            host,
            scheme: parsed.scheme.to_string(),
            owner,
            repo: parsed.name,
            token: SecretString::from(token),
            api_url: var("GITHUB_API_URL"),
        })
    }
}

/// Validate repository URL uses HTTP or HTTPS scheme.
fn validate_scheme(scheme: git_url_parse::Scheme) -> Result<()> {
    match scheme {
        git_url_parse::Scheme::Http => Ok(()),
        git_url_parse::Scheme::Https => Ok(()),
        _ => Err(ReleaseError::invalid_config(
            "only http and https schemes are supported for repo urls",
        )),
    }
}

/// Branch name of a `refs/heads/*` ref. Tag and pull request refs have none.
fn branch_from_ref(git_ref: &str) -> Option<String> {
    git_ref.strip_prefix("refs/heads/").map(str::to_string)
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
