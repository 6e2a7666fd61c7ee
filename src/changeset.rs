//! Reads pending changesets and pre-release state from `.changeset/`.
use log::*;
use regex::Regex;
use serde::Deserialize;
use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::LazyLock,
};
use tokio::fs;

use crate::{
    changelog::BumpLevel,
    error::{ReleaseError, Result},
};

pub const CHANGESET_DIR: &str = ".changeset";
const PRE_STATE_FILE: &str = "pre.json";
const README_FILE: &str = "README.md";

static FRONT_MATTER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*---\r?\n(?<releases>.*?)\r?\n?---\s*(?<summary>.*)$")
        .unwrap()
});

static RELEASE_LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*["']?(?<name>[^"']+?)["']?\s*:\s*(?<bump>\w+)\s*$"#)
        .unwrap()
});

/// A package release requested by a changeset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangesetRelease {
    pub name: String,
    pub bump: BumpLevel,
}

/// A pending, author-supplied description of an unreleased change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changeset {
    pub id: String,
    pub summary: String,
    pub releases: Vec<ChangesetRelease>,
}

/// Present when the workspace is in pre-release mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreReleaseState {
    pub tag: String,
}

/// Snapshot of pending changesets, recomputed on every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangesetState {
    pub changesets: Vec<Changeset>,
    pub pre_state: Option<PreReleaseState>,
}

impl ChangesetState {
    pub fn has_changesets(&self) -> bool {
        !self.changesets.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct PreStateFile {
    mode: String,
    tag: String,
    #[serde(default, rename = "initialVersions")]
    _initial_versions: HashMap<String, String>,
    #[serde(default)]
    changesets: Vec<String>,
}

/// Load the changeset state for the workspace rooted at `cwd`.
///
/// In pre-release mode, changesets already consumed by an earlier
/// pre-release (listed in `pre.json`) are not considered pending.
pub async fn read_changeset_state(cwd: &Path) -> Result<ChangesetState> {
    let dir = cwd.join(CHANGESET_DIR);

    if !dir.is_dir() {
        debug!("no {CHANGESET_DIR} directory found in {}", cwd.display());
        return Ok(ChangesetState::default());
    }

    let pre = read_pre_state(&dir).await?;
    let mut changesets = read_changesets(&dir).await?;

    let pre_state = match pre {
        Some(pre) if pre.mode == "pre" => {
            let consumed: HashSet<String> =
                pre.changesets.into_iter().collect();
            changesets.retain(|c| !consumed.contains(&c.id));
            Some(PreReleaseState { tag: pre.tag })
        }
        _ => None,
    };

    info!(
        "found {} pending changesets{}",
        changesets.len(),
        pre_state
            .as_ref()
            .map(|p| format!(" (pre mode: {})", p.tag))
            .unwrap_or_default()
    );

    Ok(ChangesetState {
        changesets,
        pre_state,
    })
}

async fn read_pre_state(dir: &Path) -> Result<Option<PreStateFile>> {
    let path = dir.join(PRE_STATE_FILE);

    if !path.is_file() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path).await?;
    let pre: PreStateFile = serde_json::from_str(&content)?;

    Ok(Some(pre))
}

async fn read_changesets(dir: &Path) -> Result<Vec<Changeset>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut changesets = vec![];

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();

        let is_markdown = path.extension().is_some_and(|ext| ext == "md");
        let is_readme = path.file_name().is_some_and(|n| n == README_FILE);

        if !path.is_file() || !is_markdown || is_readme {
            continue;
        }

        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let content = fs::read_to_string(&path).await?;
        let changeset = parse_changeset(&id, &content).map_err(|reason| {
            ReleaseError::invalid_changeset(path.display().to_string(), reason)
        })?;

        changesets.push(changeset);
    }

    changesets.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(changesets)
}

fn parse_changeset(
    id: &str,
    content: &str,
) -> std::result::Result<Changeset, String> {
    let captures = FRONT_MATTER_REGEX
        .captures(content)
        .ok_or("missing front matter")?;

    let mut releases = vec![];

    for line in captures["releases"].lines() {
        if line.trim().is_empty() {
            continue;
        }

        let release = RELEASE_LINE_REGEX
            .captures(line)
            .ok_or(format!("unable to parse release line: {line}"))?;

        // "none" releases are recorded by changesets but never bump
        if &release["bump"] == "none" {
            continue;
        }

        let bump = BumpLevel::from_name(&release["bump"])
            .ok_or(format!("unknown bump type: {}", &release["bump"]))?;

        releases.push(ChangesetRelease {
            name: release["name"].trim().to_string(),
            bump,
        });
    }

    Ok(Changeset {
        id: id.to_string(),
        summary: captures["summary"].trim().to_string(),
        releases,
    })
}
