use std::io;
use std::io::Cursor;

use chrono::NaiveDate;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::post_index::Index;

/* Example
<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url>
    <loc>https://jeffhui.net/2023/hello</loc>
    <lastmod>2023-05-01</lastmod>
    <changefreq>monthly</changefreq>
    <priority>0.5</priority>
  </url>
</urlset>
*/

pub const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ChangeFreq {
    Always,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Never,
}

impl ChangeFreq {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeFreq::Always => "always",
            ChangeFreq::Hourly => "hourly",
            ChangeFreq::Daily => "daily",
            ChangeFreq::Weekly => "weekly",
            ChangeFreq::Monthly => "monthly",
            ChangeFreq::Yearly => "yearly",
            ChangeFreq::Never => "never",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SitemapUrl {
    pub loc: String,
    pub lastmod: Option<NaiveDate>,
    pub changefreq: Option<ChangeFreq>,
    pub priority: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sitemap {
    pub urls: Vec<SitemapUrl>,
}

impl Sitemap {
    /// The list page, one page per year and every published post.
    /// Drafts are left out.
    pub fn from_index(base_url: &str, index: &Index) -> Sitemap {
        let mut urls = vec![];

        urls.push(SitemapUrl {
            loc: full_link(base_url, "/"),
            lastmod: index.sections.iter().flat_map(|s| s.posts.iter()).map(|p| p.pub_date).max(),
            changefreq: Some(ChangeFreq::Daily),
            priority: Some(1.0),
        });

        for section in index.sections.iter() {
            urls.push(SitemapUrl {
                loc: full_link(base_url, &format!("/{}/", section.slug)),
                lastmod: section.posts.iter().map(|p| p.pub_date).max(),
                changefreq: Some(ChangeFreq::Monthly),
                priority: Some(0.8),
            });
        }

        for post in index.sections.iter().flat_map(|s| s.posts.iter()) {
            urls.push(SitemapUrl {
                loc: full_link(base_url, &post.link()),
                lastmod: Some(post.pub_date),
                changefreq: Some(ChangeFreq::Yearly),
                priority: Some(0.5),
            });
        }

        Sitemap { urls }
    }

    pub fn render(&self) -> io::Result<Vec<u8>> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        // <?xml version="1.0" encoding="UTF-8"?>
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        // <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
        let mut urlset = BytesStart::new("urlset");
        urlset.push_attribute(("xmlns", SITEMAP_NS));
        writer.write_event(Event::Start(urlset))?;

        for url in self.urls.iter() {
            writer.write_event(Event::Start(BytesStart::new("url")))?;

            push_text(&mut writer, "loc", &url.loc)?;
            if let Some(lastmod) = url.lastmod {
                push_text(&mut writer, "lastmod", &lastmod.format("%Y-%m-%d").to_string())?;
            }
            if let Some(changefreq) = url.changefreq {
                push_text(&mut writer, "changefreq", changefreq.as_str())?;
            }
            if let Some(priority) = url.priority {
                push_text(&mut writer, "priority", &format!("{:.1}", priority))?;
            }

            writer.write_event(Event::End(BytesEnd::new("url")))?;
        }

        // </urlset>
        writer.write_event(Event::End(BytesEnd::new("urlset")))?;

        let mut xml = writer.into_inner().into_inner();
        xml.push(b'\n');
        Ok(xml)
    }
}

fn full_link(base_url: &str, link: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), link)
}

fn push_text(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, text: &str) -> io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}
