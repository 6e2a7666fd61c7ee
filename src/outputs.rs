//! Named results exposed to the invoking workflow.
use log::*;
use std::path::PathBuf;
use tokio::{fs::OpenOptions, io::AsyncWriteExt};

use crate::error::Result;

pub const PUBLISHED: &str = "published";
pub const PUBLISHED_PACKAGES: &str = "publishedPackages";
pub const HAS_CHANGESETS: &str = "hasChangesets";

const MULTILINE_DELIMITER: &str = "ghadelimiter_changeset_release";

/// Writes step outputs in the `GITHUB_OUTPUT` file format. Later values for
/// the same name override earlier ones.
#[derive(Debug, Default)]
pub struct GithubOutput {
    file: Option<PathBuf>,
}

impl GithubOutput {
    pub fn new(file: Option<PathBuf>) -> Self {
        Self { file }
    }

    pub async fn set(&self, name: &str, value: &str) -> Result<()> {
        let Some(path) = &self.file else {
            info!("output {name}={value}");
            return Ok(());
        };

        debug!("writing output {name} to {}", path.display());

        let line = if value.contains('\n') {
            format!("{name}<<{MULTILINE_DELIMITER}\n{value}\n{MULTILINE_DELIMITER}\n")
        } else {
            format!("{name}={value}\n")
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}
