use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
    time::Duration,
};

use proptest::{
    prelude::*,
    test_runner::{Config, TestRunner},
};
use tempfile::TempDir;
use time::OffsetDateTime;

use super::{GitHistory, HistoryError, HistoryReader, StaticHistory, parse_log};
use crate::types::Timestamp;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success())
}

fn git(dir: &Path, args: &[&str], date: Option<&str>) {
    let mut cmd = Command::new("git");
    cmd.args([
        "-c",
        "user.name=Test",
        "-c",
        "user.email=test@example.com",
        "-c",
        "commit.gpgsign=false",
    ])
    .args(args)
    .current_dir(dir);
    if let Some(date) = date {
        cmd.env("GIT_AUTHOR_DATE", date)
            .env("GIT_COMMITTER_DATE", date);
    }
    let out = cmd.output().expect("git runs");
    assert!(out.status.success(), "git {args:?}: {out:?}");
}

fn commit_file(dir: &Path, rel: &str, body: &str, date: &str) {
    let full = dir.join(rel);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&full, body).unwrap();
    git(dir, &["add", rel], None);
    git(dir, &["commit", "-q", "-m", body], Some(date));
}

#[test]
fn parse_log_reverses_into_chronological_order() {
    let out = "2021-01-01T00:00:00+00:00\n2020-06-01T00:00:00+00:00\n\n2020-01-01T00:00:00+00:00";
    let stamps = parse_log(out).unwrap();
    let expected: Vec<_> = ["2020-01-01", "2020-06-01", "2021-01-01"]
        .into_iter()
        .map(|d| Timestamp::parse(d).unwrap())
        .collect();
    assert_eq!(stamps, expected);
}

#[test]
fn parse_log_empty_output_is_empty_history() {
    assert!(parse_log("").unwrap().is_empty());
    assert!(parse_log("\n  \n").unwrap().is_empty());
}

#[test]
fn parse_log_rejects_unknown_lines() {
    let err = parse_log("2020-01-01T00:00:00Z\nnot a date\n").unwrap_err();
    assert!(matches!(err, HistoryError::Malformed(line) if line == "not a date"));
}

#[test]
fn static_history_sorts_on_insert() {
    let mut runner = TestRunner::new(Config {
        cases: 32,
        failure_persistence: None,
        ..Config::default()
    });
    runner
        .run(
            &proptest::collection::vec(0i64..4_000_000_000, 0..8),
            |secs| {
                let stamps: Vec<Timestamp> = secs
                    .iter()
                    .map(|s| OffsetDateTime::from_unix_timestamp(*s).unwrap().into())
                    .collect();
                let history = StaticHistory::new().with("post.markdown", stamps.clone());
                let got = history.history(Path::new("post.markdown")).unwrap();

                let mut expected = stamps;
                expected.sort();
                prop_assert_eq!(got, expected);
                Ok(())
            },
        )
        .unwrap();
}

#[test]
fn static_history_unknown_path_is_empty() {
    let history = StaticHistory::new();
    assert!(history.history(&PathBuf::from("nope.md")).unwrap().is_empty());
}

#[cfg(unix)]
#[test]
fn slow_command_times_out() {
    let mut cmd = Command::new("sleep");
    cmd.arg("5");
    let started = std::time::Instant::now();
    let err = super::run_with_timeout(cmd, Duration::from_millis(50)).unwrap_err();
    assert!(matches!(err, HistoryError::TimedOut(_)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn missing_binary_is_an_io_error() {
    let cmd = Command::new("gitmatter-no-such-binary");
    let err = super::run_with_timeout(cmd, Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, HistoryError::Io(_)));
}

#[test]
fn git_history_reads_commits_earliest_first() {
    if !git_available() {
        return;
    }
    let tmp = TempDir::new().unwrap();
    git(tmp.path(), &["init", "-q"], None);
    commit_file(tmp.path(), "posts/hello.markdown", "one", "2020-01-01T00:00:00+00:00");
    commit_file(tmp.path(), "posts/hello.markdown", "two", "2020-06-01T00:00:00+00:00");
    commit_file(tmp.path(), "posts/other.markdown", "x", "2020-07-01T00:00:00+00:00");
    commit_file(tmp.path(), "posts/hello.markdown", "three", "2021-01-01T00:00:00+00:00");

    let stamps = GitHistory::new(tmp.path())
        .history(Path::new("posts/hello.markdown"))
        .unwrap();
    let expected: Vec<_> = ["2020-01-01", "2020-06-01", "2021-01-01"]
        .into_iter()
        .map(|d| Timestamp::parse(d).unwrap())
        .collect();
    assert_eq!(stamps, expected);
}

#[test]
fn git_history_accepts_absolute_paths() {
    if !git_available() {
        return;
    }
    let tmp = TempDir::new().unwrap();
    git(tmp.path(), &["init", "-q"], None);
    commit_file(tmp.path(), "a.md", "a", "2022-03-04T05:06:07+00:00");

    let stamps = GitHistory::new(tmp.path())
        .history(&tmp.path().join("a.md"))
        .unwrap();
    assert_eq!(stamps, vec![Timestamp::parse("2022-03-04T05:06:07Z").unwrap()]);
}

#[test]
fn git_history_of_untracked_file_is_empty() {
    if !git_available() {
        return;
    }
    let tmp = TempDir::new().unwrap();
    git(tmp.path(), &["init", "-q"], None);
    commit_file(tmp.path(), "a.md", "a", "2022-01-01T00:00:00+00:00");
    fs::write(tmp.path().join("draft.md"), "draft").unwrap();

    let stamps = GitHistory::new(tmp.path())
        .history(Path::new("draft.md"))
        .unwrap();
    assert!(stamps.is_empty());
}

#[test]
fn git_history_outside_a_repository_fails() {
    if !git_available() {
        return;
    }
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.md"), "a").unwrap();
    let inside_repo = Command::new("git")
        .args(["rev-parse", "--git-dir"])
        .current_dir(tmp.path())
        .output()
        .is_ok_and(|o| o.status.success());
    if inside_repo {
        return;
    }

    let err = GitHistory::new(tmp.path())
        .with_timeout(Duration::from_secs(30))
        .history(Path::new("a.md"))
        .unwrap_err();
    assert!(matches!(err, HistoryError::Command { .. }));
}
