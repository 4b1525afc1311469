use std::{env::current_dir, path::PathBuf, time::Duration};

use clap::Parser;
use color_eyre::{Section, eyre::eyre};
use libgitmatter::{
    config::{BuildOptions, DEFAULT_HISTORY_TIMEOUT, POSTS_DIR},
    extract::HistoryPolicy,
    pipeline::build_at,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Extract post metadata from markdown sources and their git history.
#[derive(Debug, Parser)]
#[command(name = "gitmatter", version)]
struct Cli {
    /// Site root; must be (inside) the git repository holding the posts.
    root: Option<PathBuf>,

    /// Posts directory, relative to the root.
    #[arg(long, default_value = POSTS_DIR)]
    posts_dir: PathBuf,

    /// Fail a post when its history can't be read instead of dating it now.
    #[arg(long)]
    strict_history: bool,

    /// Stop at the first failing post.
    #[arg(long)]
    fail_fast: bool,

    /// Seconds to wait for each history query.
    #[arg(long, default_value_t = DEFAULT_HISTORY_TIMEOUT.as_secs())]
    history_timeout: u64,

    /// Pretty-print the JSON report.
    #[arg(long)]
    pretty: bool,
}

impl Cli {
    fn options(&self) -> BuildOptions {
        BuildOptions {
            posts_dir: self.posts_dir.clone(),
            history_policy: if self.strict_history {
                HistoryPolicy::Strict
            } else {
                HistoryPolicy::SubstituteNow
            },
            history_timeout: Duration::from_secs(self.history_timeout),
            fail_fast: self.fail_fast,
        }
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => current_dir().with_note(|| "While getting the current working directory")?,
    };

    let report = build_at(&root, &cli.options())
        .with_note(|| format!("While extracting posts under {}", root.display()))?;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");

    if !report.failures.is_empty() {
        return Err(eyre!("{} post(s) failed", report.failures.len()));
    }

    Ok(())
}
