//! Post body rendering: markdown to HTML, then allow-list sanitization.
//!
//! The sanitizer is the only thing standing between a post body and every
//! visitor's browser, so the allow-lists below are kept deliberately small.

use std::collections::{HashMap, HashSet};

const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "b", "blockquote", "code", "em", "i", "li", "ol", "strong", "ul", "p",
    "br", "pre", "h1", "h2", "h3", "h4", "h5", "h6", "img", "table", "thead", "tbody", "tr", "th",
    "td",
];

const GENERIC_ATTRIBUTES: &[&str] = &["class"];

const TAG_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href", "title", "rel", "target"]),
    ("img", &["src", "alt", "title"]),
    ("th", &["colspan", "rowspan"]),
    ("td", &["colspan", "rowspan"]),
];

const URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Bodies larger than this skip markdown parsing.
pub const MAX_MARKDOWN_BYTES: usize = 1024 * 1024;

/// How a body will be turned into HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStrategy {
    /// Markdown, sanitized against the allow-lists
    Markdown,
    /// Escaped text with line breaks; for bodies the markdown path won't take
    PlainText,
}

impl RenderStrategy {
    /// Inspect the raw body and pick a strategy up front.
    pub fn select(body: &str) -> Self {
        let has_control = body.chars().any(is_c0_control);
        if has_control || body.len() > MAX_MARKDOWN_BYTES {
            RenderStrategy::PlainText
        } else {
            RenderStrategy::Markdown
        }
    }
}

/// Render a stored post body to HTML that is safe to embed in a page.
pub fn render(body: &str) -> String {
    match RenderStrategy::select(body) {
        RenderStrategy::Markdown => render_markdown(body),
        RenderStrategy::PlainText => {
            tracing::debug!(len = body.len(), "Rendering post body as plain text");
            render_plain(body)
        }
    }
}

fn render_markdown(body: &str) -> String {
    let mut options = comrak::Options::default();
    options.extension.table = true;
    // No strikethrough or tasklists: `<del>` and `<input>` are not allowed
    options.extension.autolink = true;
    options.render.hardbreaks = true;
    // Raw HTML goes through so the sanitizer can strip it rather than
    // have it shown escaped
    options.render.unsafe_ = true;

    let html = comrak::markdown_to_html(body, &options);
    sanitize(&html)
}

/// Strip every tag and attribute that is not on the allow-lists.
pub fn sanitize(html: &str) -> String {
    let tag_attributes: HashMap<&str, HashSet<&str>> = TAG_ATTRIBUTES
        .iter()
        .map(|(tag, attrs)| (*tag, attrs.iter().copied().collect()))
        .collect();

    ammonia::Builder::default()
        .tags(ALLOWED_TAGS.iter().copied().collect())
        .generic_attributes(GENERIC_ATTRIBUTES.iter().copied().collect())
        .tag_attributes(tag_attributes)
        .link_rel(None)
        .url_schemes(URL_SCHEMES.iter().copied().collect())
        .clean(html)
        .to_string()
}

/// C0 control characters other than tab, newline and carriage return.
fn is_c0_control(c: char) -> bool {
    c < ' ' && !matches!(c, '\n' | '\r' | '\t')
}

fn render_plain(body: &str) -> String {
    let mut out = String::with_capacity(body.len() + body.len() / 8);
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("<br>\n");
            }
            '\n' => out.push_str("<br>\n"),
            '\t' => out.push('\t'),
            c if is_c0_control(c) => {}
            c => out.push(c),
        }
    }
    out
}
