//! Publishes unpublished workspace packages and cuts GitHub releases for
//! them.
use futures_util::future::join_all;
use log::*;
use secrecy::ExposeSecret;
use std::io::ErrorKind;
use tokio::fs;

use crate::{
    changelog::get_changelog_entry,
    config::ChangelogPolicy,
    error::{ReleaseError, Result},
    exec::ExternalCommand,
    forge::request::CreateReleaseRequest,
    orchestrator::Orchestrator,
    publish_output::{PublishedPackage, resolve_published},
    workspace::{Package, Tool, Workspace},
};

/// Packages the publish run reported as published, in report order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishResult {
    pub published_packages: Vec<PublishedPackage>,
}

impl PublishResult {
    pub fn published(&self) -> bool {
        !self.published_packages.is_empty()
    }
}

/// Whether a version carries a pre-release component, e.g. `1.0.0-beta.1`.
pub fn is_prerelease(version: &str) -> bool {
    match semver::Version::parse(version) {
        Ok(parsed) => !parsed.pre.is_empty(),
        Err(_) => version.contains('-'),
    }
}

impl Orchestrator {
    pub async fn run_publish(&self) -> Result<PublishResult> {
        let cwd = &self.config.cwd;

        let npm_token = self.config.npm_token.as_ref().ok_or_else(|| {
            ReleaseError::missing_credential(
                "Please add the NPM_TOKEN to the changesets action",
            )
        })?;

        let workspace = Workspace::load(cwd).await?;

        if workspace.tool != Tool::Yarn {
            return Err(ReleaseError::UnsupportedTool(
                "Only Yarn is supported".into(),
            ));
        }

        self.runner
            .output(
                ExternalCommand::new(
                    "yarn",
                    ["config", "set", "npmAuthToken", npm_token.expose_secret()],
                    cwd,
                )
                .sensitive(),
            )
            .await?;

        let output = self
            .runner
            .output(ExternalCommand::new(
                "yarn",
                [
                    "workspaces",
                    "foreach",
                    "-itv",
                    "--no-private",
                    "npm",
                    "publish",
                    "--tolerate-republish",
                ],
                cwd,
            ))
            .await?;

        let identifiers = self.detector.detect(&output.combined());
        let published = resolve_published(&identifiers, &workspace.index())?;

        info!(
            "published packages: {:?}",
            published.iter().map(|p| p.release_identity()).collect::<Vec<_>>()
        );

        // every release request runs to completion before the first failure
        // is reported
        join_all(
            published
                .iter()
                .map(|pkg| self.create_package_release(pkg)),
        )
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

        Ok(PublishResult {
            published_packages: published
                .iter()
                .map(PublishedPackage::from)
                .collect(),
        })
    }

    /// Cut a GitHub release for `pkg` from its changelog entry. Packages
    /// without a changelog file are skipped.
    async fn create_package_release(&self, pkg: &Package) -> Result<()> {
        let tag_name = pkg.release_identity();

        let changelog = match fs::read_to_string(pkg.changelog_path()).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("no changelog for {tag_name}, skipping release");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        let Some(entry) = get_changelog_entry(&changelog, &pkg.version) else {
            return match self.config.changelog_policy {
                ChangelogPolicy::Required => Err(
                    ReleaseError::missing_changelog_entry(&pkg.name, &pkg.version),
                ),
                ChangelogPolicy::Optional => {
                    warn!("no changelog entry for {tag_name}, skipping release");
                    Ok(())
                }
            };
        };

        self.forge
            .create_release(CreateReleaseRequest {
                tag_name: tag_name.clone(),
                name: tag_name,
                body: entry.content,
                prerelease: is_prerelease(&pkg.version),
            })
            .await
    }
}
