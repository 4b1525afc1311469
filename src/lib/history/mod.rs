//! Commit timestamps for source files.
//!
//! [`HistoryReader`] is the only view the extractor has of version control.
//! [`GitHistory`] shells out to `git log`, and [`StaticHistory`] serves a
//! fixed index, which is handy in tests or when history was collected ahead
//! of time.
use std::{
    collections::HashMap,
    io::{self, Read},
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Output, Stdio},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use thiserror::Error;
use tracing::debug;

use crate::{config::DEFAULT_HISTORY_TIMEOUT, types::Timestamp};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("could not run history command: {0}")]
    Io(#[source] io::Error),
    #[error("history command exited with {status}: {stderr}")]
    Command { status: ExitStatus, stderr: String },
    #[error("history query timed out after {0:?}")]
    TimedOut(Duration),
    #[error("unrecognised timestamp `{0}` in history output")]
    Malformed(String),
}

/// Resolves every commit timestamp touching a path, earliest first.
///
/// An empty sequence means the path has no history yet (e.g. it is untracked).
/// Implementations must be safe to call from several threads at once.
pub trait HistoryReader: Send + Sync {
    fn history(&self, path: &Path) -> Result<Vec<Timestamp>, HistoryError>;
}

impl<H: HistoryReader + ?Sized> HistoryReader for &H {
    fn history(&self, path: &Path) -> Result<Vec<Timestamp>, HistoryError> {
        (**self).history(path)
    }
}

/// Reads history with `git log --follow`, one process per query.
#[derive(Clone, Debug)]
pub struct GitHistory {
    repo_dir: PathBuf,
    timeout: Duration,
}

impl GitHistory {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            timeout: DEFAULT_HISTORY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl HistoryReader for GitHistory {
    fn history(&self, path: &Path) -> Result<Vec<Timestamp>, HistoryError> {
        let mut command = Command::new("git");
        command
            .args(["log", "--follow", "--format=%aI", "--"])
            .arg(path)
            .current_dir(&self.repo_dir);

        let output = run_with_timeout(command, self.timeout)?;
        if !output.status.success() {
            return Err(HistoryError::Command {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stamps = parse_log(&String::from_utf8_lossy(&output.stdout))?;
        debug!(path = %path.display(), commits = stamps.len(), "read git history");
        Ok(stamps)
    }
}

/// `git log` prints newest first; the reader contract is earliest first.
pub(crate) fn parse_log(stdout: &str) -> Result<Vec<Timestamp>, HistoryError> {
    let mut stamps = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| Timestamp::parse(line).ok_or_else(|| HistoryError::Malformed(line.into())))
        .collect::<Result<Vec<_>, _>>()?;
    stamps.reverse();
    Ok(stamps)
}

pub(crate) fn run_with_timeout(
    mut command: Command,
    timeout: Duration,
) -> Result<Output, HistoryError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(HistoryError::Io)?;

    // Drain both pipes while waiting so a chatty child can't fill a pipe
    // buffer and stall.
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait().map_err(HistoryError::Io)? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                _ = child.kill();
                _ = child.wait();
                return Err(HistoryError::TimedOut(timeout));
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    };

    Ok(Output {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain(mut pipe: impl Read + Send + 'static) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Fixed history index keyed by path.
#[derive(Clone, Debug, Default)]
pub struct StaticHistory {
    entries: HashMap<PathBuf, Vec<Timestamp>>,
}

impl StaticHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the commits for `path`, kept in chronological order.
    pub fn insert(&mut self, path: impl Into<PathBuf>, mut stamps: Vec<Timestamp>) {
        stamps.sort();
        self.entries.insert(path.into(), stamps);
    }

    pub fn with(mut self, path: impl Into<PathBuf>, stamps: Vec<Timestamp>) -> Self {
        self.insert(path, stamps);
        self
    }
}

impl HistoryReader for StaticHistory {
    fn history(&self, path: &Path) -> Result<Vec<Timestamp>, HistoryError> {
        Ok(self.entries.get(path).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests;
