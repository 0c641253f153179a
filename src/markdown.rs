//! Markdown to HTML rendering.
//!
//! Wraps [pulldown-cmark](https://docs.rs/pulldown-cmark) with the extensions
//! a content site expects (GFM tables, footnotes, task lists, `^sup^` and
//! `~sub~` among them), plus passes over the event stream:
//!
//! - **Heading ids**: every heading without an explicit `{#id}` gets a slug of
//!   its text, de-duplicated with `-1`, `-2`, … suffixes.
//! - **Code highlighting**: fenced and indented code blocks are highlighted
//!   with [syntect](https://docs.rs/syntect) using inline styles, so no extra
//!   stylesheet has to ship with the site.
//! - **Marks**: `==marked==` and `++inserted++` text becomes `<mark>` and
//!   `<ins>`.
//! - **Emoji**: `:shortcode:` sequences in text become the Unicode emoji.
//! - **Autolinks**: bare `https://…` URLs and email addresses in text become
//!   links. Text already inside a link or image is left alone.
//!
//! The front-matter block is stripped before parsing; metadata is the
//! [`metadata`](crate::metadata) module's job.
//!
//! A [`MarkdownRenderer`] is built once per run from [`MarkdownConfig`] and
//! shared read-only by every page (syntax and theme sets are expensive to
//! load).

use crate::config::{MarkdownConfig, parse_hex_color};
use crate::metadata::split_front_matter;
use linkify::{LinkFinder, LinkKind};
use pulldown_cmark::{
    CodeBlockKind, CowStr, Event, LinkType, Options, Parser, Tag, TagEnd, TextMergeStream, html,
};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Color, Theme, ThemeSet};
use syntect::html::{IncludeBackground, start_highlighted_html_snippet, styled_line_to_highlighted_html};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use thiserror::Error;

static MARK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"==(\S(?:[^=]*?\S)?)==|\+\+(\S(?:[^+]*?\S)?)\+\+").expect("mark regex")
});

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("unknown highlight theme {name:?}; available: {available}")]
    UnknownTheme { name: String, available: String },
    #[error("invalid highlight background {0:?}")]
    InvalidBackground(String),
}

pub struct MarkdownRenderer {
    syntaxes: SyntaxSet,
    theme: Theme,
    line_numbers: bool,
    emoji: bool,
}

impl MarkdownRenderer {
    pub fn new(config: &MarkdownConfig) -> Result<Self, RenderError> {
        let mut themes = ThemeSet::load_defaults();
        let mut theme = themes
            .themes
            .remove(&config.highlight_theme)
            .ok_or_else(|| RenderError::UnknownTheme {
                name: config.highlight_theme.clone(),
                available: themes.themes.keys().cloned().collect::<Vec<_>>().join(", "),
            })?;

        if let Some(bg) = config.background() {
            let (r, g, b) =
                parse_hex_color(bg).ok_or_else(|| RenderError::InvalidBackground(bg.to_string()))?;
            theme.settings.background = Some(Color { r, g, b, a: 0xff });
        }

        Ok(Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            theme,
            line_numbers: config.line_numbers,
            emoji: config.emoji,
        })
    }

    /// Render a Markdown document (front matter included) to an HTML fragment.
    pub fn render(&self, document: &str) -> String {
        let (_, body) = split_front_matter(document);
        let events: Vec<Event> = TextMergeStream::new(Parser::new_ext(body, options())).collect();
        let events = assign_heading_ids(events);
        let events = self.highlight_code_blocks(events);
        let events = inline_marks(events);
        let events = if self.emoji {
            replace_emoji(events)
        } else {
            events
        };
        let events = autolink(events);

        let mut out = String::with_capacity(body.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());
        out
    }

    fn highlight_code_blocks<'a>(&self, events: Vec<Event<'a>>) -> Vec<Event<'a>> {
        let mut out = Vec::with_capacity(events.len());
        let mut code: Option<(Option<String>, String)> = None;

        for event in events {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => info
                            .split_whitespace()
                            .next()
                            .map(str::to_string),
                        CodeBlockKind::Indented => None,
                    };
                    code = Some((lang, String::new()));
                }
                Event::Text(text) if code.is_some() => {
                    if let Some((_, buf)) = code.as_mut() {
                        buf.push_str(&text);
                    }
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((lang, source)) = code.take() {
                        out.push(Event::Html(self.highlight(lang.as_deref(), &source).into()));
                    }
                }
                other => out.push(other),
            }
        }
        out
    }

    fn find_syntax(&self, lang: Option<&str>, source: &str) -> &SyntaxReference {
        lang.and_then(|l| self.syntaxes.find_syntax_by_token(l))
            .or_else(|| {
                source
                    .lines()
                    .next()
                    .and_then(|first| self.syntaxes.find_syntax_by_first_line(first))
            })
            .unwrap_or_else(|| self.syntaxes.find_syntax_plain_text())
    }

    /// Highlight one code block into a `<pre>` with inline styles.
    fn highlight(&self, lang: Option<&str>, source: &str) -> String {
        let syntax = self.find_syntax(lang, source);
        let mut highlighter = HighlightLines::new(syntax, &self.theme);
        let (mut out, _) = start_highlighted_html_snippet(&self.theme);
        out.push_str("<code>");

        for (i, line) in LinesWithEndings::from(source).enumerate() {
            if self.line_numbers {
                out.push_str(&format!(
                    "<span class=\"ln\" style=\"user-select:none;opacity:.5;margin-right:1em\">{:>3}</span>",
                    i + 1
                ));
            }
            let highlighted = highlighter
                .highlight_line(line, &self.syntaxes)
                .and_then(|ranges| styled_line_to_highlighted_html(&ranges, IncludeBackground::No));
            match highlighted {
                Ok(html) => out.push_str(&html),
                Err(err) => {
                    tracing::warn!("syntax highlighting failed, emitting plain line: {err}");
                    out.push_str(&escape(line));
                }
            }
        }

        out.push_str("</code></pre>\n");
        out
    }
}

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_SMART_PUNCTUATION
        | Options::ENABLE_HEADING_ATTRIBUTES
        | Options::ENABLE_DEFINITION_LIST
        | Options::ENABLE_SUPERSCRIPT
        | Options::ENABLE_SUBSCRIPT
}

fn escape(text: &str) -> String {
    maud::html! { (text) }.into_string()
}

/// Turn heading text into an id: lowercase alphanumerics, runs of anything
/// else collapsed to a single `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("heading");
    }
    slug
}

fn assign_heading_ids(mut events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut i = 0;
    while i < events.len() {
        let needs_id = matches!(&events[i], Event::Start(Tag::Heading { id: None, .. }));
        if needs_id {
            let mut text = String::new();
            for event in &events[i + 1..] {
                match event {
                    Event::End(TagEnd::Heading(_)) => break,
                    Event::Text(t) | Event::Code(t) => text.push_str(t),
                    _ => {}
                }
            }
            let base = slugify(&text);
            let count = seen.entry(base.clone()).or_insert(0);
            let id = if *count == 0 {
                base
            } else {
                format!("{base}-{count}")
            };
            *count += 1;

            if let Event::Start(Tag::Heading { id: slot, .. }) = &mut events[i] {
                *slot = Some(CowStr::from(id));
            }
        } else if let Event::Start(Tag::Heading { id: Some(id), .. }) = &events[i] {
            *seen.entry(id.to_string()).or_insert(0) += 1;
        }
        i += 1;
    }
    events
}

fn inline_marks(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut out = Vec::with_capacity(events.len());
    for event in events {
        let Event::Text(text) = &event else {
            out.push(event);
            continue;
        };
        if !MARK_RE.is_match(text) {
            out.push(event);
            continue;
        }

        let mut last = 0;
        for caps in MARK_RE.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let (tag, inner) = match (caps.get(1), caps.get(2)) {
                (Some(m), _) => ("mark", m),
                (None, Some(m)) => ("ins", m),
                (None, None) => continue,
            };
            if whole.start() > last {
                out.push(Event::Text(text[last..whole.start()].to_string().into()));
            }
            out.push(Event::InlineHtml(format!("<{tag}>").into()));
            out.push(Event::Text(inner.as_str().to_string().into()));
            out.push(Event::InlineHtml(format!("</{tag}>").into()));
            last = whole.end();
        }
        if last < text.len() {
            out.push(Event::Text(text[last..].to_string().into()));
        }
    }
    out
}

/// Link bare URLs and email addresses found in text outside links and images.
fn autolink(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let finder = LinkFinder::new();
    let mut out = Vec::with_capacity(events.len());
    let mut depth = 0usize;

    for event in events {
        match &event {
            Event::Start(Tag::Link { .. } | Tag::Image { .. }) => depth += 1,
            Event::End(TagEnd::Link | TagEnd::Image) => depth = depth.saturating_sub(1),
            Event::Text(text) if depth == 0 => {
                let links: Vec<_> = finder.links(text).collect();
                if !links.is_empty() {
                    let mut last = 0;
                    for link in links {
                        let link_type = match link.kind() {
                            LinkKind::Email => LinkType::Email,
                            _ => LinkType::Autolink,
                        };
                        if link.start() > last {
                            out.push(Event::Text(text[last..link.start()].to_string().into()));
                        }
                        out.push(Event::Start(Tag::Link {
                            link_type,
                            dest_url: link.as_str().to_string().into(),
                            title: CowStr::Borrowed(""),
                            id: CowStr::Borrowed(""),
                        }));
                        out.push(Event::Text(link.as_str().to_string().into()));
                        out.push(Event::End(TagEnd::Link));
                        last = link.end();
                    }
                    if last < text.len() {
                        out.push(Event::Text(text[last..].to_string().into()));
                    }
                    continue;
                }
            }
            _ => {}
        }
        out.push(event);
    }
    out
}

fn replace_emoji(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    events
        .into_iter()
        .map(|event| match event {
            Event::Text(text) if text.contains(':') => Event::Text(emojify(&text).into()),
            other => other,
        })
        .collect()
}

/// Replace `:shortcode:` with the matching emoji; unknown codes stay as-is.
pub fn emojify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(':') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-')));
        match end {
            Some(end) if end > 0 && after[end..].starts_with(':') => {
                let code = &after[..end];
                match emojis::get_by_shortcode(code) {
                    Some(emoji) => {
                        out.push_str(emoji.as_str());
                        rest = &after[end + 1..];
                    }
                    None => {
                        out.push(':');
                        rest = after;
                    }
                }
            }
            _ => {
                out.push(':');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
