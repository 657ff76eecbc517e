use std::fs;
use std::io;
use std::path::Path;

use spdlog::info;

use crate::config::NavLink;
use crate::view::list_renderer::ListRenderer;
use crate::view::post_renderer::PostRenderer;

pub mod list_renderer;
pub mod post_renderer;

pub const LIST_TEMPLATE: &str = "post_list.html";
pub const DETAIL_TEMPLATE: &str = "post_detail.html";

const BUILTIN_LIST: &str = include_str!("../../res/template/post_list.html");
const BUILTIN_DETAIL: &str = include_str!("../../res/template/post_detail.html");

#[derive(ramhorns::Content)]
pub(crate) struct ViewNav<'a> {
    title: &'a str,
    link: &'a str,
    rel: &'a str,
}

pub(crate) fn view_navigation(links: &[NavLink]) -> Vec<ViewNav<'_>> {
    links.iter()
        .map(|l| ViewNav {
            title: l.title.as_str(),
            link: l.link.as_str(),
            rel: l.rel.as_str(),
        })
        .collect()
}

/// Parsed page templates, built once at startup.
pub struct Templates {
    pub list: ListRenderer<'static>,
    pub detail: PostRenderer<'static>,
}

impl Templates {
    /// Loads the built-in templates. Files found in `template_dir` replace
    /// the built-in template of the same name.
    pub fn load(template_dir: Option<&Path>) -> io::Result<Templates> {
        let list = read_template(template_dir, LIST_TEMPLATE, BUILTIN_LIST)?;
        let detail = read_template(template_dir, DETAIL_TEMPLATE, BUILTIN_DETAIL)?;
        Ok(Templates {
            list: ListRenderer::new(list)?,
            detail: PostRenderer::new(detail)?,
        })
    }
}

fn read_template(template_dir: Option<&Path>, name: &str, builtin: &'static str) -> io::Result<String> {
    let Some(dir) = template_dir else {
        return Ok(builtin.to_string());
    };

    let path = dir.join(name);
    if !path.exists() {
        return Ok(builtin.to_string());
    }

    info!("Using template {}", path.display());
    match fs::read_to_string(&path) {
        Ok(src) => Ok(src),
        Err(e) => Err(io::Error::new(e.kind(), format!("Error reading template {}: {}", path.display(), e))),
    }
}
