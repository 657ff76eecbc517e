use std::fmt;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// HTML that is emitted without escaping.
///
/// Only the markdown renderer creates these. Raw HTML in the source document
/// passes through verbatim, so uploaded documents are trusted content.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TrustedHtml(String);

impl TrustedHtml {
    pub(crate) fn new(html: String) -> Self {
        TrustedHtml(html)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Author {
    pub name: String,
    pub website: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub pub_date: NaiveDate,
    pub summary: String,
    pub content: String,
    pub html: TrustedHtml,
    pub author: Option<Author>,
    pub tags: Vec<String>,
    #[serde(rename = "source")]
    pub file_path: PathBuf,
}

impl Post {
    pub fn year(&self) -> i32 {
        self.pub_date.year()
    }

    /// 2006-01-02, for `datetime` attributes
    pub fn pub_date_for_attribute(&self) -> String {
        self.pub_date.format("%Y-%m-%d").to_string()
    }

    /// Jan 2
    pub fn pub_date_month_day(&self) -> String {
        self.pub_date.format("%b %-d").to_string()
    }

    /// January 2, 2006
    pub fn pub_date_long(&self) -> String {
        self.pub_date.format("%B %-d, %Y").to_string()
    }

    /// Canonical URL path of the post.
    pub fn link(&self) -> String {
        format!("/{}/{}", self.year(), self.slug)
    }
}

impl Display for Post {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "slug={}, date={}, title={}, tags={:?}, source={}",
               self.slug,
               self.pub_date,
               self.title,
               self.tags,
               self.file_path.display(),
        )
    }
}
