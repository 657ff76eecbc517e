use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::post::Post;

/// Published posts of one year.
#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub slug: String,
    pub sort_order: i32,
    pub posts: Vec<Arc<Post>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Index {
    pub sections: Vec<Section>,
    pub drafts: Vec<Arc<Post>>,
}

/// A post is a draft when its date, taken at midnight, is after `now`.
pub fn is_draft(now: NaiveDateTime, post: &Post) -> bool {
    post.pub_date > now.date()
}

/// Splits posts into year sections, newest year first, and drafts.
///
/// Posts keep the order they come in, both inside a section and in drafts.
pub fn build_index<I>(now: NaiveDateTime, posts: I) -> Index
where
    I: IntoIterator<Item=Arc<Post>>,
{
    let mut drafts = vec![];
    let mut sections: HashMap<i32, Section> = HashMap::new();

    for post in posts {
        if is_draft(now, &post) {
            drafts.push(post);
            continue;
        }
        let year = post.year();
        sections.entry(year)
            .or_insert_with(|| Section {
                slug: year.to_string(),
                sort_order: year,
                posts: vec![],
            })
            .posts
            .push(post);
    }

    let mut sections: Vec<Section> = sections.into_values().collect();
    sections.sort_by(|a, b| b.sort_order.cmp(&a.sort_order));

    Index {
        sections,
        drafts,
    }
}

impl Index {
    /// Newest first inside every section and in drafts. Stable, so posts of
    /// the same day keep their relative order.
    pub fn sort_posts_by_date(&mut self) {
        for section in self.sections.iter_mut() {
            section.posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
        }
        self.drafts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
    }

    pub fn section(&self, year: i32) -> Option<&Section> {
        self.sections.iter().find(|s| s.sort_order == year)
    }

    pub fn post_count(&self) -> usize {
        self.sections.iter().map(|s| s.posts.len()).sum::<usize>() + self.drafts.len()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::NaiveDate;

    use crate::post::TrustedHtml;

    use super::*;

    fn post(slug: &str, y: i32, m: u32, d: u32) -> Arc<Post> {
        Arc::new(Post {
            id: 0,
            slug: slug.to_string(),
            title: slug.to_string(),
            pub_date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            summary: "".to_string(),
            content: "".to_string(),
            html: TrustedHtml::default(),
            author: None,
            tags: vec![],
            file_path: PathBuf::from(format!("posts/{}.md", slug)),
        })
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 6, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn slugs(posts: &[Arc<Post>]) -> Vec<&str> {
        posts.iter().map(|p| p.slug.as_str()).collect()
    }

    #[test]
    fn test_partition() {
        let posts = vec![
            post("a", 2021, 3, 1),
            post("future", 2023, 6, 2),
            post("b", 2023, 1, 5),
            post("c", 2021, 12, 24),
            post("d", 2022, 7, 7),
            post("far-future", 2099, 1, 1),
        ];
        let index = build_index(now(), posts);

        let orders: Vec<i32> = index.sections.iter().map(|s| s.sort_order).collect();
        assert_eq!(orders, vec![2023, 2022, 2021]);
        let section_slugs: Vec<&str> = index.sections.iter().map(|s| s.slug.as_str()).collect();
        assert_eq!(section_slugs, vec!["2023", "2022", "2021"]);

        assert_eq!(slugs(&index.sections[0].posts), vec!["b"]);
        assert_eq!(slugs(&index.sections[1].posts), vec!["d"]);
        assert_eq!(slugs(&index.sections[2].posts), vec!["a", "c"]);
        assert_eq!(slugs(&index.drafts), vec!["future", "far-future"]);

        for section in index.sections.iter() {
            assert!(section.posts.iter().all(|p| p.year() == section.sort_order));
        }
        assert_eq!(index.post_count(), 6);
    }

    #[test]
    fn test_today_is_published() {
        // Midnight of today is not after now
        let index = build_index(now(), vec![post("today", 2023, 6, 1)]);
        assert!(index.drafts.is_empty());
        assert_eq!(index.sections.len(), 1);

        let midnight = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let index = build_index(midnight, vec![post("today", 2023, 6, 1)]);
        assert!(index.drafts.is_empty());
    }

    #[test]
    fn test_epoch_date_is_published() {
        let index = build_index(now(), vec![post("undated", 1970, 1, 1)]);
        assert_eq!(index.sections[0].slug, "1970");
    }

    #[test]
    fn test_empty() {
        let index = build_index(now(), vec![]);
        assert!(index.sections.is_empty());
        assert!(index.drafts.is_empty());
    }

    #[test]
    fn test_idempotent() {
        let posts = vec![
            post("a", 2020, 1, 1),
            post("b", 2020, 5, 1),
            post("c", 2019, 1, 1),
            post("d", 2020, 2, 1),
        ];
        let first = build_index(now(), posts.clone());
        let second = build_index(now(), posts);
        assert_eq!(first.sections.len(), second.sections.len());
        for (a, b) in first.sections.iter().zip(second.sections.iter()) {
            assert_eq!(a.sort_order, b.sort_order);
            assert_eq!(slugs(&a.posts), slugs(&b.posts));
        }
        assert_eq!(slugs(&first.sections[0].posts), vec!["a", "b", "d"]);
    }

    #[test]
    fn test_sort_posts_by_date() {
        let posts = vec![
            post("a", 2020, 1, 1),
            post("b", 2020, 5, 1),
            post("same-day-1", 2020, 2, 1),
            post("same-day-2", 2020, 2, 1),
            post("draft-1", 2030, 1, 1),
            post("draft-2", 2031, 1, 1),
        ];
        let mut index = build_index(now(), posts);
        index.sort_posts_by_date();
        assert_eq!(slugs(&index.sections[0].posts), vec!["b", "same-day-1", "same-day-2", "a"]);
        assert_eq!(slugs(&index.drafts), vec!["draft-2", "draft-1"]);
    }

    #[test]
    fn test_section_lookup() {
        let index = build_index(now(), vec![post("a", 2020, 1, 1), post("b", 2021, 1, 1)]);
        assert_eq!(index.section(2020).map(|s| s.posts.len()), Some(1));
        assert!(index.section(2019).is_none());
    }
}
