use std::io;
use std::io::ErrorKind;

use ramhorns::Template;

use crate::config::Site;
use crate::post::Post;
use crate::post_index::Index;
use crate::view::{view_navigation, ViewNav};

#[derive(ramhorns::Content)]
struct ListPage<'a> {
    site_title: &'a str,
    navigation: Vec<ViewNav<'a>>,
    this_year: i32,
    heading: &'a str,
    sections: Vec<ViewSection<'a>>,
    drafts: Vec<PostItem<'a>>,
    show_drafts: bool,
}

#[derive(ramhorns::Content)]
struct ViewSection<'a> {
    year: &'a str,
    posts: Vec<PostItem<'a>>,
}

#[derive(ramhorns::Content)]
struct PostItem<'a> {
    date: String,
    date_attr: String,
    link: String,
    title: &'a str,
    summary: &'a str,
}

impl<'a> From<&'a Post> for PostItem<'a> {
    fn from(post: &'a Post) -> Self {
        PostItem {
            date: post.pub_date_month_day(),
            date_attr: post.pub_date_for_attribute(),
            link: post.link(),
            title: post.title.as_str(),
            summary: post.summary.as_str(),
        }
    }
}

pub struct ListRenderer<'a> {
    pub template: Template<'a>,
}

impl<'a> ListRenderer<'a> {
    pub fn new(list_tpl_src: impl Into<String>) -> io::Result<ListRenderer<'a>> {
        let template = match Template::new(list_tpl_src.into()) {
            Ok(x) => x,
            Err(e) => {
                return Err(io::Error::new(ErrorKind::InvalidInput, format!("Error parsing list template: {}", e)));
            }
        };

        Ok(ListRenderer {
            template,
        })
    }

    /// Renders every section of `index`, or only the one for `year`.
    /// Drafts are listed in development mode only.
    pub fn render(&self, site: &Site, this_year: i32, index: &Index, year: Option<i32>) -> String {
        let heading = year.map(|y| y.to_string()).unwrap_or_default();

        let sections = index.sections.iter()
            .filter(|s| year.map_or(true, |y| s.sort_order == y))
            .map(|s| ViewSection {
                year: s.slug.as_str(),
                posts: s.posts.iter().map(|p| PostItem::from(p.as_ref())).collect(),
            })
            .collect();

        let show_drafts = site.development && year.is_none() && !index.drafts.is_empty();
        let drafts = if show_drafts {
            index.drafts.iter().map(|p| PostItem::from(p.as_ref())).collect()
        } else {
            vec![]
        };

        self.template.render(&ListPage {
            site_title: site.title.as_str(),
            navigation: view_navigation(&site.navigation),
            this_year,
            heading: heading.as_str(),
            sections,
            drafts,
            show_drafts,
        })
    }
}
