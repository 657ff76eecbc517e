use std::path::Path;
use std::str::Utf8Error;

use chrono::NaiveDate;
use serde_yaml_ng::{Mapping, Value};
use spdlog::debug;
use thiserror::Error;

use crate::markdown::render_markdown;
use crate::post::{Author, Post};
use crate::text_utils::{file_stem, parse_pub_date};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("invalid front-matter: {0}")]
    FrontMatter(String),

    #[error("invalid encoding: {0}")]
    Encoding(#[from] Utf8Error),
}

impl ParseError {
    pub fn reason(&self) -> &'static str {
        match self {
            ParseError::InvalidDate(_) => "invalid date",
            ParseError::FrontMatter(_) => "invalid front-matter",
            ParseError::Encoding(_) => "invalid encoding",
        }
    }
}

/// Example of post
/// ---
/// title: "Hello"
/// slug: hello-world
/// summary: First post
/// tags: [rust, blog]
/// date: 2023-5-1
/// author:
///   name: Jane
///   website: https://example.com
/// ---
///
/// # Hi
pub fn parse_post(source_path: &Path, raw: &[u8]) -> Result<Post, ParseError> {
    let source = std::str::from_utf8(raw)?;
    let rendered = render_markdown(source);

    let meta = match rendered.front_matter {
        Some(ref yaml) => parse_front_matter(yaml)?,
        None => Mapping::new(),
    };

    let pub_date = match meta.get("date") {
        None => NaiveDate::default(),
        Some(Value::String(date)) => parse_pub_date(date).map_err(ParseError::InvalidDate)?,
        Some(_) => return Err(ParseError::InvalidDate("value should be a string".to_string())),
    };

    let slug = match get_string(&meta, "slug") {
        slug if !slug.is_empty() => slug,
        _ => file_stem(&source_path.to_string_lossy()).to_string(),
    };

    let author = match meta.get("author") {
        Some(Value::Mapping(author)) => Some(Author {
            name: get_string(author, "name"),
            website: get_string(author, "website"),
        }),
        _ => None,
    };

    let post = Post {
        id: 0,
        slug,
        title: get_string(&meta, "title"),
        pub_date,
        summary: get_string(&meta, "summary"),
        content: source.to_string(),
        html: rendered.html,
        author,
        tags: get_strings(&meta, "tags"),
        file_path: source_path.to_path_buf(),
    };

    debug!("Parsed post: {} -- {:?}", post, meta);
    Ok(post)
}

fn parse_front_matter(yaml: &str) -> Result<Mapping, ParseError> {
    let value: Value = serde_yaml_ng::from_str(yaml).map_err(|e| ParseError::FrontMatter(e.to_string()))?;
    match value {
        Value::Mapping(meta) => Ok(meta),
        Value::Null => Ok(Mapping::new()),
        _ => Err(ParseError::FrontMatter("expected a key-value block".to_string())),
    }
}

fn get_string(meta: &Mapping, key: &str) -> String {
    match meta.get(key) {
        Some(Value::String(s)) => s.clone(),
        _ => "".to_string(),
    }
}

fn get_strings(meta: &Mapping, key: &str) -> Vec<String> {
    match meta.get(key) {
        Some(Value::Sequence(items)) => items.iter()
            .filter_map(|item| item.as_str())
            .map(|s| s.to_string())
            .collect(),
        _ => vec![],
    }
}
