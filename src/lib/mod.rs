//! Derives post metadata (title, lead paragraph, body and first-draft/updated
//! dates) from rendered HTML and the source file's commit history, and groups
//! posts by their front-matter category.
pub mod category;
pub mod config;
pub mod extract;
pub mod front_matter;
pub mod history;
pub mod html;
pub mod pipeline;
pub mod types;
