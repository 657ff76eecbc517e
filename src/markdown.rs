use lazy_static::lazy_static;
use pulldown_cmark::html::push_html;
use pulldown_cmark::{CodeBlockKind, CowStr, Event, LinkType, Options, Parser, Tag, TagEnd, TextMergeStream};
use pulldown_cmark_escape::escape_html;
use regex::Regex;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Color, Theme, ThemeSet};
use syntect::html::{styled_line_to_highlighted_html, IncludeBackground};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

use crate::post::TrustedHtml;

const THEME_NAME: &str = "InspiredGitHub";
const CODE_BACKGROUND: Color = Color { r: 0xff, g: 0xff, b: 0xee, a: 0xff };

lazy_static! {
    static ref SYNTAX_SET: SyntaxSet = SyntaxSet::load_defaults_newlines();
    static ref THEME: Theme = {
        let mut theme = ThemeSet::load_defaults().themes.remove(THEME_NAME).unwrap_or_default();
        theme.settings.background = Some(CODE_BACKGROUND);
        theme
    };
    static ref URL_REGEX: Regex = Regex::new(r#"https?://[^\s<>"'`]+"#).unwrap();
}

pub struct RenderedMarkdown {
    /// Raw YAML of the `---` block at the top of the document, if any.
    pub front_matter: Option<String>,
    pub html: TrustedHtml,
}

fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_DEFINITION_LIST
        | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS
}

/// Renders a whole document. Raw HTML in the source is kept as is.
pub fn render_markdown(source: &str) -> RenderedMarkdown {
    let parser = TextMergeStream::new(Parser::new_ext(source, markdown_options()));

    let mut front_matter: Option<String> = None;
    let mut in_metadata = false;
    // Language and body of the fenced block being collected
    let mut code_block: Option<(Option<String>, String)> = None;
    // Links and images already own their text
    let mut link_depth = 0usize;

    let mut events: Vec<Event> = Vec::new();
    for event in parser {
        match event {
            Event::Start(Tag::MetadataBlock(_)) => in_metadata = true,
            Event::End(TagEnd::MetadataBlock(_)) => in_metadata = false,
            Event::Text(text) if in_metadata => {
                front_matter.get_or_insert_with(String::new).push_str(&text);
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => fence_language(&info),
                    CodeBlockKind::Indented => None,
                };
                code_block = Some((lang, String::new()));
            }
            Event::Text(text) if code_block.is_some() => {
                if let Some((_, ref mut code)) = code_block {
                    code.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((lang, code)) = code_block.take() {
                    events.push(Event::Html(highlight_code(lang.as_deref(), &code).into()));
                }
            }
            Event::Start(tag @ (Tag::Link { .. } | Tag::Image { .. })) => {
                link_depth += 1;
                events.push(Event::Start(tag));
            }
            Event::End(tag @ (TagEnd::Link | TagEnd::Image)) => {
                link_depth = link_depth.saturating_sub(1);
                events.push(Event::End(tag));
            }
            Event::Text(text) if link_depth == 0 => autolink(text, &mut events),
            other => events.push(other),
        }
    }

    let mut html = String::with_capacity(source.len() * 2);
    push_html(&mut html, events.into_iter());

    RenderedMarkdown {
        front_matter,
        html: TrustedHtml::new(html),
    }
}

/// `rust,ignore` and `rust {.numberLines}` both mean rust.
fn fence_language(info: &str) -> Option<String> {
    info.split(|c: char| c == ',' || c.is_whitespace())
        .next()
        .filter(|lang| !lang.is_empty())
        .map(|lang| lang.to_string())
}

/// Turns bare http(s) URLs of a text run into links.
fn autolink<'a>(text: CowStr<'a>, events: &mut Vec<Event<'a>>) {
    if !URL_REGEX.is_match(&text) {
        events.push(Event::Text(text));
        return;
    }

    let mut last = 0;
    for found in URL_REGEX.find_iter(&text) {
        let url = found.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?', ')']);
        if url.ends_with("://") {
            continue;
        }
        let start = found.start();
        let end = start + url.len();
        if start > last {
            events.push(Event::Text(text[last..start].to_string().into()));
        }
        events.push(Event::Start(Tag::Link {
            link_type: LinkType::Autolink,
            dest_url: url.to_string().into(),
            title: "".into(),
            id: "".into(),
        }));
        events.push(Event::Text(url.to_string().into()));
        events.push(Event::End(TagEnd::Link));
        last = end;
    }
    if last < text.len() {
        events.push(Event::Text(text[last..].to_string().into()));
    }
}

/// Escaped copy of a line the highlighter could not style.
fn push_plain_line(html: &mut String, line: &str) {
    // Writing into a String never fails
    let _ = escape_html(html, line);
}

/// Highlighted `<pre>` block with line numbers. Unknown languages fall back
/// to first line detection (shebangs, modelines), then to plain text.
fn highlight_code(lang: Option<&str>, code: &str) -> String {
    let syntax = lang
        .and_then(|l| SYNTAX_SET.find_syntax_by_token(l))
        .or_else(|| SYNTAX_SET.find_syntax_by_first_line(code))
        .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text());

    let mut html = format!(
        "<pre class=\"highlight\" style=\"background-color:#{:02x}{:02x}{:02x};\"><code>",
        CODE_BACKGROUND.r, CODE_BACKGROUND.g, CODE_BACKGROUND.b,
    );

    let mut highlighter = HighlightLines::new(syntax, &THEME);
    for (num, line) in LinesWithEndings::from(code).enumerate() {
        html.push_str(&format!("<span class=\"ln\">{}</span>", num + 1));
        let styled = highlighter.highlight_line(line, &SYNTAX_SET)
            .and_then(|regions| styled_line_to_highlighted_html(&regions, IncludeBackground::No));
        match styled {
            Ok(line_html) => html.push_str(&line_html),
            Err(_) => push_plain_line(&mut html, line),
        }
    }

    html.push_str("</code></pre>\n");
    html
}
