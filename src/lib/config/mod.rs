use std::{path::PathBuf, time::Duration};

use crate::extract::HistoryPolicy;

pub const POSTS_DIR: &str = "posts";

// Only these sources are run through the extractor; everything else under the
// posts directory is left to the site generator.
pub const SOURCE_EXTENSIONS: &[&str] = &["markdown", "md"];

/// Title used when a post has no top-level heading.
pub const MISSING_TITLE: &str = "None";

pub const TOP_HEADING_SELECTOR: &str = "h1";
pub const PARAGRAPH_SELECTOR: &str = "p";

pub const DEFAULT_HISTORY_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-run settings for a batch build.
#[derive(Clone, Debug)]
pub struct BuildOptions {
    /// Directory holding post sources, relative to the build root.
    pub posts_dir: PathBuf,
    pub history_policy: HistoryPolicy,
    pub history_timeout: Duration,
    /// Abort on the first post that fails instead of collecting failures.
    pub fail_fast: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            posts_dir: PathBuf::from(POSTS_DIR),
            history_policy: HistoryPolicy::default(),
            history_timeout: DEFAULT_HISTORY_TIMEOUT,
            fail_fast: false,
        }
    }
}
