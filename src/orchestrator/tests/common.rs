//! Common test utilities for orchestrator tests.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use crate::{
    config::RunConfig,
    exec::{CommandOutput, ExternalCommand, MockCommandRunner},
    forge::traits::MockForge,
    git::MockGit,
    orchestrator::Orchestrator,
    test_helpers::{WorkspaceFixture, write_package_json},
};

pub const BASE_BRANCH: &str = "main";
pub const SHA: &str = "abc123";
pub const RELEASE_BRANCH: &str = "changeset-release/main";

pub const CHANGESET: &str = r#"---
"pkg-a": minor
"pkg-b": patch
---

Add a feature to pkg-a and fix pkg-b
"#;

/// Commands seen by a mock runner, rendered with `Display`.
pub type CommandLog = Arc<Mutex<Vec<String>>>;

/// Creates a test Orchestrator from mocks. Expectations must be set on the
/// mocks before calling this.
pub fn create_test_orchestrator(
    config: RunConfig,
    forge: MockForge,
    git: MockGit,
    runner: MockCommandRunner,
) -> Orchestrator {
    Orchestrator::builder()
        .config(config)
        .forge(Box::new(forge))
        .git(Box::new(git))
        .runner(Box::new(runner))
        .build()
        .unwrap()
}

/// Run config for a version run against `main` at [`SHA`].
pub fn test_config(root: &Path) -> RunConfig {
    RunConfig::builder()
        .cwd(root)
        .base_branch(BASE_BRANCH)
        .sha(SHA)
        .build()
        .unwrap()
}

/// Git mock where every operation succeeds and the tree is dirty after the
/// version command.
pub fn permissive_git() -> MockGit {
    let mut git = MockGit::new();
    git.expect_setup_user().returning(|_| Ok(()));
    git.expect_switch_to_maybe_existing_branch()
        .returning(|_| Ok(()));
    git.expect_reset().returning(|_| Ok(()));
    git.expect_check_if_clean().returning(|| Ok(false));
    git.expect_commit_all().returning(|_| Ok(()));
    git.expect_push().returning(|_, _| Ok(()));
    git
}

pub fn write_manifest(
    root: &Path,
    relative_dir: &str,
    name: &str,
    version: &str,
    private: bool,
) {
    let dir = root.join(relative_dir);
    fs::create_dir_all(&dir).unwrap();
    write_package_json(
        &dir,
        &format!(
            r#"{{ "name": "{name}", "version": "{version}", "private": {private} }}"#
        ),
    );
}

pub fn write_changelog(root: &Path, relative_dir: &str, content: &str) {
    fs::write(root.join(relative_dir).join("CHANGELOG.md"), content).unwrap();
}

pub fn changelog(name: &str, version: &str, category: &str, note: &str) -> String {
    format!(
        "# {name}\n\n## {version}\n\n### {category} Changes\n\n- {note}\n\n## 0.0.1\n\n### Major Changes\n\n- initial release\n"
    )
}

/// Two packages at their pre-release versions plus a pending changeset.
pub fn two_package_workspace() -> WorkspaceFixture {
    let fixture = WorkspaceFixture::new(&["packages/*"]);
    fixture.add_package("packages/pkg-a", "pkg-a", "1.0.0", false);
    fixture.add_package("packages/pkg-b", "pkg-b", "2.0.0", false);
    fixture.add_changeset("brave-cats-dance", CHANGESET);
    fixture
}

/// Three packages where discovery order differs from severity order.
pub fn three_package_workspace() -> WorkspaceFixture {
    let fixture = WorkspaceFixture::new(&["packages/*"]);
    fixture.add_package("packages/pkg-a", "pkg-a", "1.0.0", false);
    fixture.add_package("packages/pkg-b", "pkg-b", "1.0.0", true);
    fixture.add_package("packages/pkg-c", "pkg-c", "1.0.0", false);
    fixture.add_changeset("quiet-owls-sing", CHANGESET);
    fixture
}

/// Restore the manifests written by [`two_package_workspace`].
pub fn restore_two_packages(root: &Path) {
    write_manifest(root, "packages/pkg-a", "pkg-a", "1.0.0", false);
    write_manifest(root, "packages/pkg-b", "pkg-b", "2.0.0", false);
}

/// What the version tool writes for [`CHANGESET`]: pkg-a minor, pkg-b
/// patch.
pub fn bump_two_packages(root: &Path) {
    write_manifest(root, "packages/pkg-a", "pkg-a", "1.1.0", false);
    write_changelog(
        root,
        "packages/pkg-a",
        &changelog("pkg-a", "1.1.0", "Minor", "brave-cats-dance: add a feature"),
    );
    write_manifest(root, "packages/pkg-b", "pkg-b", "2.0.1", false);
    write_changelog(
        root,
        "packages/pkg-b",
        &changelog("pkg-b", "2.0.1", "Patch", "brave-cats-dance: fix a bug"),
    );
}

fn is_version_command(command: &ExternalCommand) -> bool {
    command.program == "yarn"
        && command.args.first().map(String::as_str) == Some("changeset")
}

/// Runner that applies `bump` when the version command runs, records every
/// command in `log` and succeeds with empty output.
pub fn version_runner<F>(root: &Path, log: CommandLog, bump: F) -> MockCommandRunner
where
    F: Fn(&Path) + Send + 'static,
{
    let root: PathBuf = root.to_path_buf();
    let mut runner = MockCommandRunner::new();
    runner.expect_output().returning(move |command| {
        log.lock().unwrap().push(command.to_string());
        if is_version_command(&command) {
            bump(&root);
        }
        Ok(CommandOutput::default())
    });
    runner
}

/// Runner whose publish command prints `publish_output`.
pub fn publish_runner(log: CommandLog, publish_output: &str) -> MockCommandRunner {
    let publish_output = publish_output.to_string();
    let mut runner = MockCommandRunner::new();
    runner.expect_output().returning(move |command| {
        log.lock().unwrap().push(command.to_string());
        if command.args.iter().any(|arg| arg == "publish") {
            return Ok(CommandOutput {
                stdout: publish_output.clone(),
                stderr: String::new(),
            });
        }
        Ok(CommandOutput::default())
    });
    runner
}

pub fn logged(log: &CommandLog) -> Vec<String> {
    log.lock().unwrap().clone()
}
