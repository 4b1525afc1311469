//! Post metadata extraction.
//!
//! [`Extractor::extract`] turns one rendered post into a [`PostMetadata`]
//! record: the title comes from the first `h1`, the lead from the first `<p>`,
//! the body is everything except that heading, and the first-draft and
//! updated dates come from the source file's commit history.
//!
//! Extraction is all-or-nothing. Either a complete record is produced or an
//! [`ExtractError`] names the post that failed. Recoverable problems are
//! reported as [`Warning`]s next to the record and logged through `tracing`.
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    config::MISSING_TITLE,
    history::{HistoryError, HistoryReader},
    html::{Markup, MarkupError, MarkupParser},
    types::Timestamp,
};

/// Rendered HTML of one post together with the path of its source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceDocument {
    html: String,
    path: PathBuf,
}

impl SourceDocument {
    pub fn new(html: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            html: html.into(),
            path: path.into(),
        }
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Where a record's dates came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateProvenance {
    /// Earliest and latest commits touching the source file.
    History,
    /// The file has no commits yet; both dates are the extraction time.
    NoHistory,
    /// The history reader failed; both dates are the extraction time.
    ReaderFailed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PostMetadata {
    pub title: String,
    pub first_draft_at: Timestamp,
    pub updated_at: Timestamp,
    pub lead_paragraph: Option<String>,
    pub body: String,
    pub dates: DateProvenance,
}

impl PostMetadata {
    /// Publication date of the post, which is its first draft.
    pub fn date(&self) -> Timestamp {
        self.first_draft_at
    }
}

/// Non-fatal problem found while extracting a post.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    MissingHeading { path: PathBuf },
    HistoryUnavailable { path: PathBuf, cause: String },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::MissingHeading { path } => write!(f, "no h1 found in {}", path.display()),
            Warning::HistoryUnavailable { path, cause } => {
                write!(f, "history unavailable for {}: {cause}", path.display())
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("could not parse rendered HTML of {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: MarkupError,
    },
    #[error("commit history unavailable for {}", path.display())]
    HistoryUnavailable {
        path: PathBuf,
        #[source]
        cause: HistoryError,
    },
}

impl ExtractError {
    pub fn path(&self) -> &Path {
        match self {
            ExtractError::Parse { path, .. } | ExtractError::HistoryUnavailable { path, .. } => {
                path
            }
        }
    }
}

/// What to do when the history reader itself fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HistoryPolicy {
    /// Fail the post with [`ExtractError::HistoryUnavailable`].
    Strict,
    /// Use the extraction time for both dates and record a warning.
    #[default]
    SubstituteNow,
}

/// A successful extraction and the warnings raised along the way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extraction {
    pub metadata: PostMetadata,
    pub warnings: Vec<Warning>,
}

pub struct Extractor<P, H> {
    parser: P,
    history: H,
    policy: HistoryPolicy,
}

impl<P, H> Extractor<P, H>
where
    P: MarkupParser,
    H: HistoryReader,
{
    pub fn new(parser: P, history: H) -> Self {
        Self {
            parser,
            history,
            policy: HistoryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: HistoryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn extract(&self, doc: &SourceDocument) -> Result<Extraction, ExtractError> {
        let path = doc.path();
        let markup = self
            .parser
            .parse(doc.html())
            .map_err(|source| ExtractError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let mut warnings = Vec::new();

        let title = markup.first_heading_text().unwrap_or_else(|| {
            let warning = Warning::MissingHeading {
                path: path.to_path_buf(),
            };
            warn!("{warning}");
            warnings.push(warning);
            MISSING_TITLE.to_string()
        });

        let (first_draft_at, updated_at, dates) = self.resolve_dates(path, &mut warnings)?;

        Ok(Extraction {
            metadata: PostMetadata {
                title,
                first_draft_at,
                updated_at,
                lead_paragraph: markup.first_paragraph_html(),
                body: markup.without_first_heading(),
                dates,
            },
            warnings,
        })
    }

    fn resolve_dates(
        &self,
        path: &Path,
        warnings: &mut Vec<Warning>,
    ) -> Result<(Timestamp, Timestamp, DateProvenance), ExtractError> {
        match self.history.history(path) {
            Ok(stamps) => match (stamps.iter().min(), stamps.iter().max()) {
                (Some(first), Some(last)) => Ok((*first, *last, DateProvenance::History)),
                _ => {
                    debug!(path = %path.display(), "no commits yet, dating post now");
                    let now = Timestamp::now();
                    Ok((now, now, DateProvenance::NoHistory))
                }
            },
            Err(cause) => match self.policy {
                HistoryPolicy::Strict => Err(ExtractError::HistoryUnavailable {
                    path: path.to_path_buf(),
                    cause,
                }),
                HistoryPolicy::SubstituteNow => {
                    let warning = Warning::HistoryUnavailable {
                        path: path.to_path_buf(),
                        cause: cause.to_string(),
                    };
                    warn!("{warning}");
                    warnings.push(warning);
                    let now = Timestamp::now();
                    Ok((now, now, DateProvenance::ReaderFailed))
                }
            },
        }
    }
}
