//! Tests for the version workflow.
//!
//! Tests for:
//! - Creating new release PRs vs updating existing ones
//! - Release branch preparation and commit behavior
//! - PR body ordering and idempotence
//! - Changelog policy and failure handling

use std::sync::{Arc, Mutex};

use super::common::*;
use crate::{
    config::{ChangelogPolicy, RunConfig},
    error::ReleaseError,
    exec::MockCommandRunner,
    forge::{request::PullRequest, traits::MockForge},
    git::MockGit,
};

fn forge_creating_pr(number: u64) -> MockForge {
    let mut forge = MockForge::new();
    forge
        .expect_get_open_release_pr()
        .withf(|req| {
            req.head_branch == RELEASE_BRANCH && req.base_branch == BASE_BRANCH
        })
        .returning(|_| Ok(None))
        .times(1);
    forge
        .expect_create_pr()
        .returning(move |req| {
            Ok(PullRequest {
                number,
                title: req.title,
                body: req.body,
            })
        })
        .times(1);
    forge.expect_update_pr().times(0);
    forge
}

#[tokio::test]
async fn creates_pr_when_none_is_open() {
    let fixture = two_package_workspace();
    let log = CommandLog::default();

    let mut forge = MockForge::new();
    forge
        .expect_get_open_release_pr()
        .returning(|_| Ok(None))
        .times(1);
    forge
        .expect_create_pr()
        .withf(|req| {
            req.head_branch == RELEASE_BRANCH
                && req.base_branch == BASE_BRANCH
                && req.title == "Version Packages"
                && req.body.contains("## pkg-a@1.1.0")
        })
        .returning(|req| {
            Ok(PullRequest {
                number: 7,
                title: req.title,
                body: req.body,
            })
        })
        .times(1);
    forge.expect_update_pr().times(0);

    let orchestrator = create_test_orchestrator(
        test_config(fixture.root()),
        forge,
        permissive_git(),
        version_runner(fixture.root(), log, bump_two_packages),
    );

    let outcome = orchestrator.run_version().await.unwrap();

    assert!(outcome.created);
    assert_eq!(outcome.number, 7);
    assert_eq!(outcome.title, "Version Packages");
}

#[tokio::test]
async fn updates_existing_open_pr() {
    let fixture = two_package_workspace();
    let log = CommandLog::default();

    let mut forge = MockForge::new();
    forge
        .expect_get_open_release_pr()
        .returning(|_| {
            Ok(Some(PullRequest {
                number: 42,
                title: "Version Packages".into(),
                body: "stale body".into(),
            }))
        })
        .times(1);
    forge
        .expect_update_pr()
        .withf(|req| {
            req.pr_number == 42
                && req.title == "Version Packages"
                && req.body.contains("## pkg-b@2.0.1")
        })
        .returning(|_| Ok(()))
        .times(1);
    forge.expect_create_pr().times(0);

    let orchestrator = create_test_orchestrator(
        test_config(fixture.root()),
        forge,
        permissive_git(),
        version_runner(fixture.root(), log, bump_two_packages),
    );

    let outcome = orchestrator.run_version().await.unwrap();

    assert!(!outcome.created);
    assert_eq!(outcome.number, 42);
}

#[tokio::test]
async fn lists_higher_severity_packages_first() {
    let fixture = two_package_workspace();
    let log = CommandLog::default();

    let orchestrator = create_test_orchestrator(
        test_config(fixture.root()),
        forge_creating_pr(1),
        permissive_git(),
        version_runner(fixture.root(), log, bump_two_packages),
    );

    let outcome = orchestrator.run_version().await.unwrap();

    let a = outcome.body.find("## pkg-a@1.1.0").unwrap();
    let b = outcome.body.find("## pkg-b@2.0.1").unwrap();
    assert!(a < b);
    assert!(outcome.body.contains(
        "## pkg-a@1.1.0\n\n### Minor Changes\n\n- brave-cats-dance: add a feature\n\n## pkg-b@2.0.1"
    ));
}

#[tokio::test]
async fn severity_overrides_discovery_order_and_private_packages_go_last() {
    let fixture = three_package_workspace();
    let log = CommandLog::default();

    let bump = |root: &std::path::Path| {
        write_manifest(root, "packages/pkg-a", "pkg-a", "1.0.1", false);
        write_changelog(
            root,
            "packages/pkg-a",
            &changelog("pkg-a", "1.0.1", "Patch", "fix"),
        );
        write_manifest(root, "packages/pkg-b", "pkg-b", "1.0.1", true);
        write_changelog(
            root,
            "packages/pkg-b",
            &changelog("pkg-b", "1.0.1", "Patch", "internal fix"),
        );
        write_manifest(root, "packages/pkg-c", "pkg-c", "2.0.0", false);
        write_changelog(
            root,
            "packages/pkg-c",
            &changelog("pkg-c", "2.0.0", "Major", "breaking"),
        );
    };

    let orchestrator = create_test_orchestrator(
        test_config(fixture.root()),
        forge_creating_pr(1),
        permissive_git(),
        version_runner(fixture.root(), log, bump),
    );

    let body = orchestrator.run_version().await.unwrap().body;

    let c = body.find("## pkg-c@2.0.0").unwrap();
    let a = body.find("## pkg-a@1.0.1").unwrap();
    let b = body.find("## pkg-b@1.0.1").unwrap();
    assert!(c < a);
    assert!(a < b);
}

#[tokio::test]
async fn repeated_runs_produce_identical_bodies() {
    let fixture = two_package_workspace();
    let root = fixture.root().to_path_buf();

    let mut git = MockGit::new();
    git.expect_switch_to_maybe_existing_branch()
        .returning(|_| Ok(()));
    // resetting to the triggering commit restores the pre-bump manifests
    git.expect_reset().returning(move |_| {
        restore_two_packages(&root);
        Ok(())
    });
    git.expect_check_if_clean().returning(|| Ok(false));
    git.expect_commit_all().returning(|_| Ok(()));
    git.expect_push().returning(|_, _| Ok(()));

    let mut forge = MockForge::new();
    let opened = Arc::new(Mutex::new(None::<u64>));
    let seen = Arc::clone(&opened);
    forge.expect_get_open_release_pr().returning(move |_| {
        Ok(seen.lock().unwrap().map(|number| PullRequest {
            number,
            title: "Version Packages".into(),
            body: String::new(),
        }))
    });
    let created = Arc::clone(&opened);
    forge
        .expect_create_pr()
        .returning(move |req| {
            *created.lock().unwrap() = Some(3);
            Ok(PullRequest {
                number: 3,
                title: req.title,
                body: req.body,
            })
        })
        .times(1);
    forge.expect_update_pr().returning(|_| Ok(())).times(1);

    let orchestrator = create_test_orchestrator(
        test_config(fixture.root()),
        forge,
        git,
        version_runner(fixture.root(), CommandLog::default(), bump_two_packages),
    );

    let first = orchestrator.run_version().await.unwrap();
    let second = orchestrator.run_version().await.unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.number, second.number);
    assert_eq!(first.body, second.body);
}

#[tokio::test]
async fn prepares_release_branch_from_triggering_commit() {
    let fixture = two_package_workspace();

    let mut git = MockGit::new();
    let mut seq = mockall::Sequence::new();
    git.expect_switch_to_maybe_existing_branch()
        .withf(|branch| branch == RELEASE_BRANCH)
        .returning(|_| Ok(()))
        .times(1)
        .in_sequence(&mut seq);
    git.expect_reset()
        .withf(|commit_ref| commit_ref == SHA)
        .returning(|_| Ok(()))
        .times(1)
        .in_sequence(&mut seq);
    git.expect_check_if_clean()
        .returning(|| Ok(false))
        .times(1)
        .in_sequence(&mut seq);
    git.expect_commit_all()
        .withf(|message| message == "Version Packages")
        .returning(|_| Ok(()))
        .times(1)
        .in_sequence(&mut seq);
    git.expect_push()
        .withf(|branch, options| branch == RELEASE_BRANCH && options.force)
        .returning(|_, _| Ok(()))
        .times(1)
        .in_sequence(&mut seq);

    let orchestrator = create_test_orchestrator(
        test_config(fixture.root()),
        forge_creating_pr(1),
        git,
        version_runner(fixture.root(), CommandLog::default(), bump_two_packages),
    );

    orchestrator.run_version().await.unwrap();
}

#[tokio::test]
async fn skips_commit_when_version_tool_already_committed() {
    let fixture = two_package_workspace();

    let mut git = MockGit::new();
    git.expect_switch_to_maybe_existing_branch()
        .returning(|_| Ok(()));
    git.expect_reset().returning(|_| Ok(()));
    git.expect_check_if_clean().returning(|| Ok(true)).times(1);
    git.expect_commit_all().times(0);
    git.expect_push().returning(|_, _| Ok(())).times(1);

    let orchestrator = create_test_orchestrator(
        test_config(fixture.root()),
        forge_creating_pr(1),
        git,
        version_runner(fixture.root(), CommandLog::default(), bump_two_packages),
    );

    orchestrator.run_version().await.unwrap();
}

#[tokio::test]
async fn runs_version_and_lockfile_commands_in_order() {
    let fixture = two_package_workspace();
    let log = CommandLog::default();

    let config = RunConfig::builder()
        .cwd(fixture.root())
        .base_branch(BASE_BRANCH)
        .sha(SHA)
        .version_command("yarn changeset version --snapshot")
        .dedupe(true)
        .build()
        .unwrap();

    let orchestrator = create_test_orchestrator(
        config,
        forge_creating_pr(1),
        permissive_git(),
        version_runner(fixture.root(), Arc::clone(&log), bump_two_packages),
    );

    orchestrator.run_version().await.unwrap();

    assert_eq!(
        logged(&log),
        vec![
            "yarn changeset version --snapshot",
            "yarn config set enableImmutableInstalls false",
            "yarn install --mode=update-lockfile",
            "yarn dedupe",
        ]
    );
}

#[tokio::test]
async fn dedupe_is_skipped_by_default() {
    let fixture = two_package_workspace();
    let log = CommandLog::default();

    let orchestrator = create_test_orchestrator(
        test_config(fixture.root()),
        forge_creating_pr(1),
        permissive_git(),
        version_runner(fixture.root(), Arc::clone(&log), bump_two_packages),
    );

    orchestrator.run_version().await.unwrap();

    assert!(!logged(&log).iter().any(|c| c == "yarn dedupe"));
}

#[tokio::test]
async fn pre_mode_tags_title_commit_and_body() {
    let fixture = two_package_workspace();
    fixture.write_pre_state(
        r#"{ "mode": "pre", "tag": "beta", "initialVersions": {}, "changesets": [] }"#,
    );

    let mut git = MockGit::new();
    git.expect_switch_to_maybe_existing_branch()
        .returning(|_| Ok(()));
    git.expect_reset().returning(|_| Ok(()));
    git.expect_check_if_clean().returning(|| Ok(false));
    git.expect_commit_all()
        .withf(|message| message == "Version Packages (beta)")
        .returning(|_| Ok(()))
        .times(1);
    git.expect_push().returning(|_, _| Ok(()));

    let orchestrator = create_test_orchestrator(
        test_config(fixture.root()),
        forge_creating_pr(1),
        git,
        version_runner(fixture.root(), CommandLog::default(), bump_two_packages),
    );

    let outcome = orchestrator.run_version().await.unwrap();

    assert_eq!(outcome.title, "Version Packages (beta)");
    assert!(outcome.body.contains("**pre mode**"));
}

#[tokio::test]
async fn missing_changelog_entry_is_fatal_by_default() {
    let fixture = two_package_workspace();

    let mut git = MockGit::new();
    git.expect_switch_to_maybe_existing_branch()
        .returning(|_| Ok(()));
    git.expect_reset().returning(|_| Ok(()));
    git.expect_check_if_clean().times(0);
    git.expect_commit_all().times(0);
    git.expect_push().times(0);

    let mut forge = MockForge::new();
    forge.expect_get_open_release_pr().times(0);
    forge.expect_create_pr().times(0);

    // pkg-b is bumped without a changelog
    let bump = |root: &std::path::Path| {
        bump_two_packages(root);
        std::fs::remove_file(root.join("packages/pkg-b/CHANGELOG.md")).unwrap();
    };

    let orchestrator = create_test_orchestrator(
        test_config(fixture.root()),
        forge,
        git,
        version_runner(fixture.root(), CommandLog::default(), bump),
    );

    let err = orchestrator.run_version().await.unwrap_err();

    assert!(matches!(
        err,
        ReleaseError::MissingChangelogEntry { ref name, ref version }
            if name == "pkg-b" && version == "2.0.1"
    ));
}

#[tokio::test]
async fn optional_policy_leaves_packages_without_entries_out() {
    let fixture = two_package_workspace();

    let bump = |root: &std::path::Path| {
        bump_two_packages(root);
        write_changelog(
            root,
            "packages/pkg-b",
            &changelog("pkg-b", "2.0.0", "Patch", "older release"),
        );
    };

    let config = RunConfig::builder()
        .cwd(fixture.root())
        .base_branch(BASE_BRANCH)
        .sha(SHA)
        .changelog_policy(ChangelogPolicy::Optional)
        .build()
        .unwrap();

    let orchestrator = create_test_orchestrator(
        config,
        forge_creating_pr(1),
        permissive_git(),
        version_runner(fixture.root(), CommandLog::default(), bump),
    );

    let body = orchestrator.run_version().await.unwrap().body;

    assert!(body.contains("## pkg-a@1.1.0"));
    assert!(!body.contains("pkg-b@"));
}

#[tokio::test]
async fn missing_base_branch_aborts_before_touching_git() {
    let fixture = two_package_workspace();

    let config = RunConfig::builder()
        .cwd(fixture.root())
        .sha(SHA)
        .build()
        .unwrap();

    // no expectations: any git, forge or runner call panics
    let orchestrator = create_test_orchestrator(
        config,
        MockForge::new(),
        MockGit::new(),
        MockCommandRunner::new(),
    );

    let err = orchestrator.run_version().await.unwrap_err();

    assert!(matches!(err, ReleaseError::InvalidConfig(_)));
}

#[tokio::test]
async fn version_command_failure_aborts_the_run() {
    let fixture = two_package_workspace();

    let mut git = MockGit::new();
    git.expect_switch_to_maybe_existing_branch()
        .returning(|_| Ok(()));
    git.expect_reset().returning(|_| Ok(()));
    git.expect_push().times(0);

    let mut runner = MockCommandRunner::new();
    runner
        .expect_output()
        .returning(|command| {
            Err(ReleaseError::CommandFailed {
                command: command.to_string(),
                code: Some(1),
                stderr: "no changesets cli".into(),
            })
        })
        .times(1);

    let orchestrator = create_test_orchestrator(
        test_config(fixture.root()),
        MockForge::new(),
        git,
        runner,
    );

    let err = orchestrator.run_version().await.unwrap_err();

    assert!(matches!(err, ReleaseError::CommandFailed { code: Some(1), .. }));
}
