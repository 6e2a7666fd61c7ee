//! Workspace package discovery for yarn-style monorepos.
//!
//! Packages are discovered from the `workspaces` globs declared in the root
//! `package.json`. A root without `workspaces` is treated as a single-package
//! workspace whose only package is the root itself. Manifests without a
//! `version` (private apps, docs sites) are not releasable and are skipped.
use log::*;
use serde::Deserialize;
use serde_json::Value;
use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};
use tokio::fs;

use crate::error::{ReleaseError, Result};

const MANIFEST_FILE: &str = "package.json";
const YARN_LOCK_FILE: &str = "yarn.lock";

/// A package discovered in the workspace. Identity is its directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub version: String,
    /// Absolute path to the package directory.
    pub dir: PathBuf,
    /// Path of the package directory relative to the workspace root.
    pub relative_dir: PathBuf,
    pub private: bool,
}

impl Package {
    /// Release identity used for git tags and release titles.
    pub fn release_identity(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    pub fn changelog_path(&self) -> PathBuf {
        self.dir.join("CHANGELOG.md")
    }
}

/// Package manager owning the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Yarn,
    Unknown,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    private: bool,
    workspaces: Option<Value>,
}

/// Mapping from package directory (relative to the workspace root) to the
/// version recorded in its manifest.
pub type VersionSnapshot = HashMap<PathBuf, String>;

/// Loaded view of the workspace at a single point in time.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub tool: Tool,
    pub packages: Vec<Package>,
}

impl Workspace {
    /// Read the root manifest and every workspace package manifest.
    pub async fn load(root: &Path) -> Result<Self> {
        let root_manifest_path = root.join(MANIFEST_FILE);
        let root_manifest = read_manifest(&root_manifest_path).await?;

        let tool = if root.join(YARN_LOCK_FILE).exists() {
            Tool::Yarn
        } else {
            Tool::Unknown
        };

        let patterns = match &root_manifest.workspaces {
            Some(value) => workspace_patterns(value, &root_manifest_path)?,
            None => vec![],
        };

        let packages = if patterns.is_empty() {
            debug!("no workspaces declared: treating root as the only package");
            to_package(root, root, root_manifest, &root_manifest_path)?
                .into_iter()
                .collect::<Vec<_>>()
        } else {
            let mut packages = vec![];
            for dir in expand_patterns(root, &patterns)? {
                let manifest_path = dir.join(MANIFEST_FILE);
                let manifest = read_manifest(&manifest_path).await?;
                if let Some(package) =
                    to_package(root, &dir, manifest, &manifest_path)?
                {
                    packages.push(package);
                }
            }
            packages
        };

        debug!(
            "discovered {} workspace packages in {}",
            packages.len(),
            root.display()
        );

        Ok(Self {
            root: root.to_path_buf(),
            tool,
            packages,
        })
    }

    /// Versions of every package keyed by relative directory.
    pub fn snapshot(&self) -> VersionSnapshot {
        self.packages
            .iter()
            .map(|p| (p.relative_dir.clone(), p.version.clone()))
            .collect()
    }

    pub fn index(&self) -> WorkspaceIndex {
        WorkspaceIndex::new(&self.packages)
    }
}

/// Lookup of workspace packages by name, built once per workspace load.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceIndex {
    by_name: HashMap<String, Package>,
}

impl WorkspaceIndex {
    pub fn new(packages: &[Package]) -> Self {
        Self {
            by_name: packages
                .iter()
                .map(|p| (p.name.clone(), p.clone()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Package> {
        self.by_name.get(name)
    }
}

/// Packages whose current version differs from the one recorded in
/// `before`. Packages absent from `before` count as changed. Order follows
/// workspace discovery order.
pub fn changed_packages(
    before: &VersionSnapshot,
    packages: &[Package],
) -> Vec<Package> {
    packages
        .iter()
        .filter(|pkg| before.get(&pkg.relative_dir) != Some(&pkg.version))
        .cloned()
        .collect()
}

async fn read_manifest(path: &Path) -> Result<Manifest> {
    let content = fs::read_to_string(path).await.map_err(|err| {
        ReleaseError::invalid_manifest(path.display().to_string(), err.to_string())
    })?;
    let manifest = serde_json::from_str(&content).map_err(|err| {
        ReleaseError::invalid_manifest(path.display().to_string(), err.to_string())
    })?;
    Ok(manifest)
}

fn workspace_patterns(value: &Value, path: &Path) -> Result<Vec<String>> {
    let list = match value {
        Value::Array(_) => value,
        Value::Object(obj) => obj.get("packages").unwrap_or(&Value::Null),
        _ => &Value::Null,
    };

    let Some(items) = list.as_array() else {
        return Err(ReleaseError::invalid_manifest(
            path.display().to_string(),
            "workspaces must be an array or an object with a packages array",
        ));
    };

    Ok(items
        .iter()
        .filter_map(|v| v.as_str().map(String::from))
        .collect())
}

fn expand_patterns(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut excluded: HashSet<PathBuf> = HashSet::new();

    for pattern in patterns.iter().filter_map(|p| p.strip_prefix('!')) {
        for dir in glob_dirs(root, pattern)? {
            excluded.insert(dir);
        }
    }

    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut dirs = vec![];

    for pattern in patterns.iter().filter(|p| !p.starts_with('!')) {
        for dir in glob_dirs(root, pattern)? {
            if excluded.contains(&dir) || !seen.insert(dir.clone()) {
                continue;
            }
            if dir.join(MANIFEST_FILE).is_file() {
                dirs.push(dir);
            }
        }
    }

    Ok(dirs)
}

fn glob_dirs(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern = pattern.trim_end_matches('/');
    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&root.display().to_string()),
        pattern
    );

    Ok(glob::glob(&full)?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_dir())
        .collect())
}

fn to_package(
    root: &Path,
    dir: &Path,
    manifest: Manifest,
    manifest_path: &Path,
) -> Result<Option<Package>> {
    let path = manifest_path.display().to_string();

    let name = manifest
        .name
        .ok_or_else(|| ReleaseError::invalid_manifest(&path, "missing name"))?;

    let Some(version) = manifest.version else {
        debug!("skipping {name}: {path} has no version");
        return Ok(None);
    };

    let relative_dir = dir
        .strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| dir.to_path_buf());

    Ok(Some(Package {
        name,
        version,
        dir: dir.to_path_buf(),
        relative_dir,
        private: manifest.private,
    }))
}
