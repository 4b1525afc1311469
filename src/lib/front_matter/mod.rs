use color_eyre::Section;
use gray_matter::{Matter, engine::YAML};
use serde::Deserialize;

use crate::types::Category;

/// Per-post metadata authored at the top of a source file.
///
/// Only the fields that feed categorisation are read; anything else in the
/// block belongs to the site generator and is ignored.
#[derive(Deserialize, Default, Debug)]
pub struct FrontMatter {
    category: Option<Scalar>,
    tags: Option<TagsField>,
}

/// A YAML scalar read as text, so `category: 2020` is the category `"2020"`.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Integer(n) => n.to_string(),
            Self::Float(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

/// `tags: [a, b]` or `tags: a, b`.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum TagsField {
    Many(Vec<Scalar>),
    One(Scalar),
}

impl TryFrom<&str> for FrontMatter {
    type Error = color_eyre::Report;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        split(value).map(|(front_matter, _)| front_matter)
    }
}

/// Separate the front matter from the markdown that follows it.
pub fn split(source: &str) -> color_eyre::Result<(FrontMatter, String)> {
    let matter = Matter::<YAML>::new();
    matter
        .parse::<FrontMatter>(source)
        .with_note(|| "While parsing frontmatter.")
        .map(|res| (res.data.unwrap_or_default(), res.content))
}

impl FrontMatter {
    pub fn category(&self) -> Option<Category> {
        self.category
            .as_ref()
            .and_then(|c| Category::parse(&c.to_text()))
    }

    pub fn tags(&self) -> Vec<String> {
        let raw = match &self.tags {
            None => Vec::new(),
            Some(TagsField::Many(tags)) => tags.iter().map(Scalar::to_text).collect(),
            Some(TagsField::One(tags)) => tags
                .to_text()
                .split(',')
                .map(ToOwned::to_owned)
                .collect(),
        };
        raw.iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(ToOwned::to_owned)
            .collect()
    }
}
