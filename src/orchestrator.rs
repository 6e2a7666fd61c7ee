use derive_builder::Builder;
use log::*;
use std::rc::Rc;

use crate::{
    changeset::read_changeset_state,
    config::RunConfig,
    error::{ReleaseError, Result},
    exec::CommandRunner,
    forge::traits::Forge,
    git::Git,
    outputs::{GithubOutput, HAS_CHANGESETS, PUBLISHED, PUBLISHED_PACKAGES},
    publish_output::{PublishDetector, YarnPublishDetector},
};

pub mod publish;
pub mod version;

pub use publish::PublishResult;
pub use version::VersionOutcome;

#[derive(Builder)]
#[builder(pattern = "owned", build_fn(private, name = "_build"))]
pub struct OrchestratorParams {
    #[builder(setter(into))]
    pub config: Rc<RunConfig>,
    pub forge: Box<dyn Forge>,
    pub git: Box<dyn Git>,
    pub runner: Box<dyn CommandRunner>,
    #[builder(
        default = "Box::new(YarnPublishDetector::new()) as Box<dyn PublishDetector>"
    )]
    pub detector: Box<dyn PublishDetector>,
}

impl OrchestratorParamsBuilder {
    pub fn build(self) -> Result<Orchestrator> {
        let params = self._build().map_err(|e| {
            ReleaseError::invalid_config(format!(
                "Failed to build orchestrator: {}",
                e
            ))
        })?;
        Ok(Orchestrator::new(params))
    }
}

/// What a single run ended up doing.
#[derive(Debug)]
pub enum RunOutcome {
    /// Pending changesets were turned into a release pull request.
    Versioned(VersionOutcome),
    /// No changesets were pending and auto-publish ran.
    Published(PublishResult),
    /// No changesets were pending and auto-publish is off.
    Idle,
}

pub struct Orchestrator {
    config: Rc<RunConfig>,
    forge: Box<dyn Forge>,
    git: Box<dyn Git>,
    runner: Box<dyn CommandRunner>,
    detector: Box<dyn PublishDetector>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorParamsBuilder {
        OrchestratorParamsBuilder::default()
    }

    pub fn new(params: OrchestratorParams) -> Self {
        Self {
            config: params.config,
            forge: params.forge,
            git: params.git,
            runner: params.runner,
            detector: params.detector,
        }
    }

    /// Choose between the version and publish workflows based on the
    /// pending changesets, recording the run outputs along the way.
    ///
    /// Default outputs are written before either workflow starts so a
    /// failed run leaves `published=false` behind.
    pub async fn run(&self, outputs: &GithubOutput) -> Result<RunOutcome> {
        self.git.setup_user(&self.config.identity).await?;

        let state = read_changeset_state(&self.config.cwd).await?;
        let has_changesets = state.has_changesets();

        outputs.set(PUBLISHED, "false").await?;
        outputs.set(PUBLISHED_PACKAGES, "[]").await?;
        outputs
            .set(HAS_CHANGESETS, &has_changesets.to_string())
            .await?;

        if has_changesets {
            let outcome = self.run_version().await?;
            return Ok(RunOutcome::Versioned(outcome));
        }

        info!("No changesets found");

        if !self.config.auto_publish {
            return Ok(RunOutcome::Idle);
        }

        info!("Attempting to publish any unpublished packages to npm");

        let result = self.run_publish().await?;

        if result.published() {
            outputs.set(PUBLISHED, "true").await?;
            outputs
                .set(
                    PUBLISHED_PACKAGES,
                    &serde_json::to_string(&result.published_packages)?,
                )
                .await?;
        }

        Ok(RunOutcome::Published(result))
    }
}
