use std::io;
use std::io::ErrorKind;

use ramhorns::Template;

use crate::config::Site;
use crate::post::Post;
use crate::view::{view_navigation, ViewNav};

#[derive(ramhorns::Content)]
struct ViewTag<'a> {
    tag: &'a str,
}

#[derive(ramhorns::Content)]
struct ViewAuthor<'a> {
    name: &'a str,
    website: &'a str,
}

#[derive(ramhorns::Content)]
struct ViewItem<'a> {
    site_title: &'a str,
    navigation: Vec<ViewNav<'a>>,
    this_year: i32,
    year: i32,
    slug: &'a str,
    title: &'a str,
    summary: &'a str,
    author: Option<ViewAuthor<'a>>,
    tags: Vec<ViewTag<'a>>,
    date_attr: String,
    date_long: String,
    content: &'a str,
}

pub struct PostRenderer<'a> {
    pub template: Template<'a>,
}

impl<'a> PostRenderer<'a> {
    pub fn new(view_tpl_src: impl Into<String>) -> io::Result<PostRenderer<'a>> {
        let template = match Template::new(view_tpl_src.into()) {
            Ok(x) => x,
            Err(e) => {
                return Err(io::Error::new(ErrorKind::InvalidInput, format!("Error parsing post view template: {}", e)));
            }
        };

        Ok(PostRenderer {
            template,
        })
    }

    pub fn render(&self, site: &Site, this_year: i32, post: &Post) -> String {
        let tags = post.tags.iter().map(|t| ViewTag { tag: t.as_str() }).collect();
        let author = post.author.as_ref().map(|a| ViewAuthor {
            name: a.name.as_str(),
            website: a.website.as_str(),
        });

        self.template.render(&ViewItem {
            site_title: site.title.as_str(),
            navigation: view_navigation(&site.navigation),
            this_year,
            year: post.year(),
            slug: post.slug.as_str(),
            title: post.title.as_str(),
            summary: post.summary.as_str(),
            author,
            tags,
            date_attr: post.pub_date_for_attribute(),
            date_long: post.pub_date_long(),
            // Rendered unescaped with {{{content}}}
            content: post.html.as_str(),
        })
    }
}
