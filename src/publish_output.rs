//! Detection of the packages an external publish run actually published.
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::{
    error::{ReleaseError, Result},
    workspace::{Package, WorkspaceIndex},
};

static ANSI_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\x1b|\\u001b)\[[0-9;]*[A-Za-z]").unwrap()
});

static YARN_PUBLISHED_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(?<identifier>.+)\]:.*Package archive published").unwrap()
});

/// A package confirmed as published, as reported in the run outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedPackage {
    pub name: String,
    pub version: String,
}

/// Turns raw publish output into the ordered identifiers of the packages
/// that were published.
pub trait PublishDetector: Send + Sync {
    fn detect(&self, output: &str) -> Vec<String>;
}

/// Recognizes `yarn workspaces foreach ... npm publish` confirmation lines,
/// e.g. `[my-pkg]: Package archive published`.
#[derive(Debug, Default)]
pub struct YarnPublishDetector {}

impl YarnPublishDetector {
    pub fn new() -> Self {
        Self {}
    }
}

impl PublishDetector for YarnPublishDetector {
    fn detect(&self, output: &str) -> Vec<String> {
        output
            .lines()
            .filter_map(|line| {
                let line = strip_ansi(line);
                YARN_PUBLISHED_REGEX
                    .captures(&line)
                    .map(|caps| caps["identifier"].to_string())
            })
            .collect()
    }
}

pub fn strip_ansi(line: &str) -> String {
    ANSI_REGEX.replace_all(line, "").to_string()
}

/// Map detected identifiers to workspace packages. An identifier with no
/// matching package means the detector and the publish tool disagree.
pub fn resolve_published(
    identifiers: &[String],
    index: &WorkspaceIndex,
) -> Result<Vec<Package>> {
    identifiers
        .iter()
        .map(|identifier| {
            index.get(identifier).cloned().ok_or_else(|| {
                ReleaseError::PublishOutputMismatch {
                    identifier: identifier.clone(),
                }
            })
        })
        .collect()
}

impl From<&Package> for PublishedPackage {
    fn from(pkg: &Package) -> Self {
        Self {
            name: pkg.name.clone(),
            version: pkg.version.clone(),
        }
    }
}
