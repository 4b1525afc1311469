use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::{Section, eyre::eyre};
use itertools::Itertools;
use pulldown_cmark::{Options, Parser};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::{
    category::{Categorized, group_by_category},
    config::{BuildOptions, SOURCE_EXTENSIONS},
    extract::{Extractor, PostMetadata, SourceDocument, Warning},
    front_matter,
    history::GitHistory,
    html::ScraperParser,
    types::Category,
};

/// One post with its extracted metadata and front-matter categorisation.
#[derive(Clone, Debug, Serialize)]
pub struct Post {
    /// Source path relative to the posts directory.
    pub path: PathBuf,
    pub metadata: PostMetadata,
    pub category: Option<Category>,
    pub tags: Vec<String>,
    pub warnings: Vec<Warning>,
}

impl Categorized for Post {
    fn category(&self) -> Option<&Category> {
        self.category.as_ref()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CategoryGroup {
    pub category: Option<Category>,
    pub posts: Vec<PathBuf>,
}

/// A post that could not be processed, with its error chain flattened.
#[derive(Clone, Debug, Serialize)]
pub struct Failure {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct BuildReport {
    /// Newest first, then by title.
    pub posts: Vec<Post>,
    pub categories: Vec<CategoryGroup>,
    pub failures: Vec<Failure>,
}

/// Run every post under `root` through the extractor.
pub fn build_at(root: &Path, options: &BuildOptions) -> color_eyre::Result<BuildReport> {
    let ctx = BuildCtx::load_at(root, options);

    Ok(Pipeline::new(ctx).discover()?.parse()?.extract()?.report())
}

struct BuildCtx {
    root: PathBuf,
    posts_dir: PathBuf,
    options: BuildOptions,
    parser_options: Options,
}

impl BuildCtx {
    fn load_at(root: &Path, options: &BuildOptions) -> Self {
        let mut parser_options = Options::empty();
        parser_options.insert(Options::ENABLE_TABLES);
        parser_options.insert(Options::ENABLE_FOOTNOTES);
        parser_options.insert(Options::ENABLE_STRIKETHROUGH);
        parser_options.insert(Options::ENABLE_SMART_PUNCTUATION);

        Self {
            root: root.to_path_buf(),
            posts_dir: root.join(&options.posts_dir),
            options: options.clone(),
            parser_options,
        }
    }

    /// Record a failed post, or abort the build when running fail-fast.
    fn fail(&self, path: PathBuf, error: color_eyre::Report) -> color_eyre::Result<Failure> {
        if self.options.fail_fast {
            return Err(error.with_note(|| format!("While processing {}", path.display())));
        }
        let message = error.chain().map(ToString::to_string).join(": ");
        warn!(path = %path.display(), "{message}");
        Ok(Failure { path, message })
    }
}

pub fn render_markdown(markdown: &str, options: Options) -> String {
    let mut rendered = String::new();
    pulldown_cmark::html::push_html(&mut rendered, Parser::new_ext(markdown, options));
    rendered
}

fn is_source(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

/// A post source located under the posts directory.
struct SourcePath {
    /// Path handed to git, relative to the build root.
    repo_path: PathBuf,
    /// Path reported to callers, relative to the posts directory.
    rel_path: PathBuf,
    full_path: PathBuf,
}

/// Only an unwalkable posts tree stops the build here; unreadable files are
/// charged to their own post in the parse stage.
fn discover_sources(ctx: &BuildCtx) -> color_eyre::Result<Vec<SourcePath>> {
    let (entries, walk_errors): (Vec<walkdir::DirEntry>, Vec<walkdir::Error>) =
        WalkDir::new(&ctx.posts_dir).into_iter().partition_result();

    if !walk_errors.is_empty() {
        return Err(eyre!("Failed to walk posts directory: {walk_errors:?}"))
            .with_note(|| format!("While discovering posts in {}", ctx.posts_dir.display()));
    }

    let sources = entries
        .into_iter()
        .filter(|e| e.file_type().is_file() && is_source(e.path()))
        .filter_map(|e| {
            let full_path = e.into_path();
            let rel_path = full_path.strip_prefix(&ctx.posts_dir).ok()?.to_path_buf();
            let repo_path = full_path
                .strip_prefix(&ctx.root)
                .map_or_else(|_| full_path.clone(), ToOwned::to_owned);
            Some(SourcePath {
                repo_path,
                rel_path,
                full_path,
            })
        })
        .sorted_by(|a, b| a.rel_path.cmp(&b.rel_path))
        .collect::<Vec<_>>();

    info!(count = sources.len(), dir = %ctx.posts_dir.display(), "discovered post sources");
    Ok(sources)
}

/// A source split into front matter and rendered HTML.
struct ParsedPost {
    source: SourcePath,
    front_matter: front_matter::FrontMatter,
    html: String,
}

fn read_and_render(
    ctx: &BuildCtx,
    source: &SourcePath,
) -> color_eyre::Result<(front_matter::FrontMatter, String)> {
    let content = fs::read_to_string(&source.full_path)
        .with_note(|| format!("While reading {}", source.full_path.display()))?;
    let (front_matter, markdown) = front_matter::split(&content)?;
    Ok((front_matter, render_markdown(&markdown, ctx.parser_options)))
}

fn parse_sources(
    ctx: &BuildCtx,
    sources: Vec<SourcePath>,
) -> color_eyre::Result<(Vec<ParsedPost>, Vec<Failure>)> {
    let mut parsed = Vec::with_capacity(sources.len());
    let mut failures = Vec::new();

    for source in sources {
        match read_and_render(ctx, &source) {
            Ok((front_matter, html)) => parsed.push(ParsedPost {
                source,
                front_matter,
                html,
            }),
            Err(e) => failures.push(ctx.fail(source.rel_path, e)?),
        }
    }

    Ok((parsed, failures))
}

fn extract_posts(
    ctx: &BuildCtx,
    parsed: Vec<ParsedPost>,
) -> color_eyre::Result<(Vec<Post>, Vec<Failure>)> {
    let history = GitHistory::new(&ctx.root).with_timeout(ctx.options.history_timeout);
    let extractor = Extractor::new(ScraperParser, history).with_policy(ctx.options.history_policy);

    let outcomes: Vec<Result<Post, (PathBuf, color_eyre::Report)>> = parsed
        .into_par_iter()
        .map(|post| {
            let doc = SourceDocument::new(post.html, post.source.repo_path);
            match extractor.extract(&doc) {
                Ok(extraction) => Ok(Post {
                    path: post.source.rel_path,
                    metadata: extraction.metadata,
                    category: post.front_matter.category(),
                    tags: post.front_matter.tags(),
                    warnings: extraction.warnings,
                }),
                Err(e) => Err((post.source.rel_path, color_eyre::Report::new(e))),
            }
        })
        .collect();

    let mut posts = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(post) => posts.push(post),
            Err((path, e)) => failures.push(ctx.fail(path, e)?),
        }
    }

    Ok((posts, failures))
}

fn build_report(mut posts: Vec<Post>, failures: Vec<Failure>) -> BuildReport {
    posts.sort_by(|a, b| {
        b.metadata
            .first_draft_at
            .cmp(&a.metadata.first_draft_at)
            .then_with(|| a.metadata.title.cmp(&b.metadata.title))
    });

    let categories = group_by_category(posts.iter())
        .into_iter()
        .map(|(category, grouped)| CategoryGroup {
            category,
            posts: grouped.into_iter().map(|p| p.path.clone()).collect(),
        })
        .collect();

    info!(
        posts = posts.len(),
        failures = failures.len(),
        "extracted post metadata"
    );

    BuildReport {
        posts,
        categories,
        failures,
    }
}

trait PipelineStage {}
/// Pipeline typestate driver
struct Pipeline<S: PipelineStage> {
    ctx: BuildCtx,
    state: S,
}

// initial state
impl Pipeline<()> {
    fn new(ctx: BuildCtx) -> Self {
        Self { ctx, state: () }
    }

    fn discover(self) -> color_eyre::Result<Pipeline<Discovered>> {
        let docs = discover_sources(&self.ctx)?;
        Ok(Pipeline {
            ctx: self.ctx,
            state: Discovered(docs),
        })
    }
}

struct Discovered(Vec<SourcePath>);
impl PipelineStage for Discovered {}
struct Parsed {
    posts: Vec<ParsedPost>,
    failures: Vec<Failure>,
}
impl PipelineStage for Parsed {}
struct Extracted {
    posts: Vec<Post>,
    failures: Vec<Failure>,
}
impl PipelineStage for Extracted {}
impl PipelineStage for () {}

impl Pipeline<Discovered> {
    fn parse(self) -> color_eyre::Result<Pipeline<Parsed>> {
        let (posts, failures) = parse_sources(&self.ctx, self.state.0)?;
        Ok(Pipeline {
            ctx: self.ctx,
            state: Parsed { posts, failures },
        })
    }
}

impl Pipeline<Parsed> {
    fn extract(self) -> color_eyre::Result<Pipeline<Extracted>> {
        let Parsed {
            posts,
            mut failures,
        } = self.state;
        let (posts, extract_failures) = extract_posts(&self.ctx, posts)?;
        failures.extend(extract_failures);
        Ok(Pipeline {
            ctx: self.ctx,
            state: Extracted { posts, failures },
        })
    }
}

impl Pipeline<Extracted> {
    fn report(self) -> BuildReport {
        build_report(self.state.posts, self.state.failures)
    }
}
