//! Opens or refreshes the release pull request for pending changesets.
use futures_util::future::try_join_all;
use log::*;
use serde::Serialize;
use std::io::ErrorKind;
use tokio::fs;

use crate::{
    changelog::{
        get_changelog_entry,
        ordering::{ReleaseSection, sort_sections},
    },
    changeset::{ChangesetState, read_changeset_state},
    config::ChangelogPolicy,
    error::{ReleaseError, Result},
    exec::ExternalCommand,
    forge::{
        config::release_branch,
        request::{CreatePrRequest, GetPrRequest, UpdatePrRequest},
    },
    git::PushOptions,
    orchestrator::Orchestrator,
    workspace::{Package, Workspace, changed_packages},
};

const PR_BODY_TEMPLATE: &str = r#"This PR was opened by the [Changesets release](https://github.com/changesets/action) GitHub action. When you're ready to do a release, you can merge this and {% if auto_publish %}the packages will be published to npm automatically{% else %}publish to npm yourself or [setup this action to publish automatically](https://github.com/changesets/action#with-publishing){% endif %}. If you're not ready to do a release yet, that's fine, whenever you add more changesets to {{ base_branch }}, this PR will be updated.
{% if pre_tag %}
⚠️⚠️⚠️⚠️⚠️⚠️

`{{ base_branch }}` is currently in **pre mode** so this branch has prereleases rather than normal releases. If you want to exit prereleases, run `changeset pre exit` on `{{ base_branch }}`.

⚠️⚠️⚠️⚠️⚠️⚠️
{% endif %}
# Releases
{% for section in sections %}{% if not loop.first %}

{% endif %}## {{ section.name }}@{{ section.version }}

{{ section.content }}{% endfor %}
"#;

/// The release pull request as left by the version workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionOutcome {
    pub number: u64,
    pub title: String,
    pub body: String,
    /// False when an existing open pull request was updated.
    pub created: bool,
}

#[derive(Serialize)]
struct PrBodyContext<'a> {
    auto_publish: bool,
    base_branch: &'a str,
    pre_tag: Option<&'a str>,
    sections: &'a [ReleaseSection],
}

/// Render the release PR body. Sections must already be ordered.
pub fn render_pr_body(
    sections: &[ReleaseSection],
    auto_publish: bool,
    base_branch: &str,
    state: &ChangesetState,
) -> Result<String> {
    let context = tera::Context::from_serialize(PrBodyContext {
        auto_publish,
        base_branch,
        pre_tag: state.pre_state.as_ref().map(|p| p.tag.as_str()),
        sections,
    })?;

    Ok(tera::Tera::one_off(PR_BODY_TEMPLATE, &context, false)?)
}

/// Append ` (<tag>)` in pre-release mode.
pub fn with_pre_tag(text: &str, state: &ChangesetState) -> String {
    match &state.pre_state {
        Some(pre) => format!("{text} ({})", pre.tag),
        None => text.to_string(),
    }
}

impl Orchestrator {
    /// Rebuild the release branch from the triggering commit, run the
    /// version tool and sync the release pull request with the result.
    pub async fn run_version(&self) -> Result<VersionOutcome> {
        let cwd = &self.config.cwd;

        let base_branch = self.config.base_branch.as_deref().ok_or_else(|| {
            ReleaseError::invalid_config(
                "base branch is required to open a release pull request",
            )
        })?;

        let sha = self.config.sha.as_deref().ok_or_else(|| {
            ReleaseError::invalid_config(
                "triggering commit sha is required to open a release pull request",
            )
        })?;

        let state = read_changeset_state(cwd).await?;
        let version_branch = release_branch(base_branch);

        self.git
            .switch_to_maybe_existing_branch(&version_branch)
            .await?;
        self.git.reset(sha).await?;

        let before = Workspace::load(cwd).await?.snapshot();

        let version_command =
            ExternalCommand::parse(&self.config.version_command, cwd)?;
        self.runner.output(version_command).await?;

        self.update_lockfile().await?;

        let workspace = Workspace::load(cwd).await?;
        let changed = changed_packages(&before, &workspace.packages);

        info!(
            "changed packages: {:?}",
            changed.iter().map(|p| p.release_identity()).collect::<Vec<_>>()
        );

        let sections =
            try_join_all(changed.iter().map(|pkg| self.release_section(pkg)))
                .await?;

        let mut sections: Vec<ReleaseSection> =
            sections.into_iter().flatten().collect();
        sort_sections(&mut sections);

        let title = with_pre_tag(&self.config.pr_title, &state);
        let body = render_pr_body(
            &sections,
            self.config.auto_publish,
            base_branch,
            &state,
        )?;

        // the version command may have committed on its own
        if !self.git.check_if_clean().await? {
            let message = with_pre_tag(&self.config.commit_message, &state);
            self.git.commit_all(&message).await?;
        }

        self.git
            .push(&version_branch, PushOptions { force: true })
            .await?;

        let existing = self
            .forge
            .get_open_release_pr(GetPrRequest {
                head_branch: version_branch.clone(),
                base_branch: base_branch.to_string(),
            })
            .await?;

        if let Some(pr) = existing {
            info!("pull request found: #{}", pr.number);
            self.forge
                .update_pr(UpdatePrRequest {
                    pr_number: pr.number,
                    title: title.clone(),
                    body: body.clone(),
                })
                .await?;

            return Ok(VersionOutcome {
                number: pr.number,
                title,
                body,
                created: false,
            });
        }

        info!("creating pull request");
        let pr = self
            .forge
            .create_pr(CreatePrRequest {
                head_branch: version_branch,
                base_branch: base_branch.to_string(),
                title: title.clone(),
                body: body.clone(),
            })
            .await?;

        Ok(VersionOutcome {
            number: pr.number,
            title,
            body,
            created: true,
        })
    }

    async fn update_lockfile(&self) -> Result<()> {
        let cwd = &self.config.cwd;

        self.runner
            .output(ExternalCommand::new(
                "yarn",
                ["config", "set", "enableImmutableInstalls", "false"],
                cwd,
            ))
            .await?;

        self.runner
            .output(ExternalCommand::new(
                "yarn",
                ["install", "--mode=update-lockfile"],
                cwd,
            ))
            .await?;

        if self.config.dedupe {
            self.runner
                .output(ExternalCommand::new("yarn", ["dedupe"], cwd))
                .await?;
        }

        Ok(())
    }

    /// Changelog section for a changed package. `None` only when the
    /// changelog policy allows leaving the package out.
    async fn release_section(
        &self,
        pkg: &Package,
    ) -> Result<Option<ReleaseSection>> {
        let changelog = match fs::read_to_string(pkg.changelog_path()).await {
            Ok(content) => Some(content),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };

        let entry = changelog
            .as_deref()
            .and_then(|content| get_changelog_entry(content, &pkg.version));

        match (entry, self.config.changelog_policy) {
            (Some(entry), _) => Ok(Some(ReleaseSection {
                name: pkg.name.clone(),
                version: pkg.version.clone(),
                content: entry.content,
                highest_level: entry.highest_level,
                private: pkg.private,
            })),
            (None, ChangelogPolicy::Required) => Err(
                ReleaseError::missing_changelog_entry(&pkg.name, &pkg.version),
            ),
            (None, ChangelogPolicy::Optional) => {
                warn!(
                    "no changelog entry for {}, leaving it out of the pull request",
                    pkg.release_identity()
                );
                Ok(None)
            }
        }
    }
}
