//! Common test helper functions shared across test modules.
//!
//! Provides on-disk workspace fixtures and package constructors so the
//! workspace, changeset and orchestrator suites don't each rebuild them.
use std::{
    fs,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

use crate::workspace::Package;

/// Creates a test Package rooted under `/repo`.
///
/// # Example
/// ```ignore
/// let pkg = create_test_package("pkg-a", "1.0.0", "packages/pkg-a", false);
/// ```
pub fn create_test_package(
    name: &str,
    version: &str,
    relative_dir: &str,
    private: bool,
) -> Package {
    Package {
        name: name.into(),
        version: version.into(),
        dir: Path::new("/repo").join(relative_dir),
        relative_dir: PathBuf::from(relative_dir),
        private,
    }
}

pub fn write_package_json(dir: &Path, content: &str) {
    fs::write(dir.join("package.json"), content).unwrap();
}

fn manifest(name: &str, version: &str, private: bool) -> String {
    format!(
        r#"{{
  "name": "{name}",
  "version": "{version}",
  "private": {private}
}}
"#
    )
}

/// A temporary yarn workspace on disk.
pub struct WorkspaceFixture {
    dir: TempDir,
}

impl WorkspaceFixture {
    /// Workspace whose root manifest declares `patterns` as its workspaces.
    pub fn new(patterns: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        let workspaces = patterns
            .iter()
            .map(|p| format!("\"{p}\""))
            .collect::<Vec<_>>()
            .join(", ");

        write_package_json(
            dir.path(),
            &format!(
                r#"{{
  "name": "root",
  "private": true,
  "workspaces": [{workspaces}]
}}
"#
            ),
        );
        fs::write(dir.path().join("yarn.lock"), "").unwrap();

        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn add_package(
        &self,
        relative_dir: &str,
        name: &str,
        version: &str,
        private: bool,
    ) -> PathBuf {
        let pkg_dir = self.root().join(relative_dir);
        fs::create_dir_all(&pkg_dir).unwrap();
        write_package_json(&pkg_dir, &manifest(name, version, private));
        pkg_dir
    }

    pub fn write_changelog(&self, relative_dir: &str, content: &str) {
        fs::write(self.root().join(relative_dir).join("CHANGELOG.md"), content)
            .unwrap();
    }

    pub fn add_changeset(&self, id: &str, content: &str) {
        let dir = self.root().join(".changeset");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{id}.md")), content).unwrap();
    }

    pub fn write_pre_state(&self, content: &str) {
        let dir = self.root().join(".changeset");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("pre.json"), content).unwrap();
    }

    pub fn remove_yarn_lock(&self) {
        fs::remove_file(self.root().join("yarn.lock")).unwrap();
    }
}
