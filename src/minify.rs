//! Final-pass minification of composed pages.
//!
//! The run talks to the minifier through the [`Minifier`] trait so the walker
//! can be driven with a different implementation (tests inject one that
//! always fails). [`HtmlMinifier`] is the real one: `minify-html` with inline
//! `<style>` and `<script>` minification switched on, so one call covers the
//! HTML, CSS and JavaScript of a page.

use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MinifyError {
    #[error("minifier aborted: {0}")]
    Panicked(String),
    #[error("minifier produced invalid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// A whole-document HTML minifier.
pub trait Minifier: Send + Sync {
    fn minify(&self, html: &str) -> Result<String, MinifyError>;
}

/// `minify-html` with embedded CSS/JS minification.
pub struct HtmlMinifier {
    cfg: minify_html::Cfg,
}

impl HtmlMinifier {
    pub fn new() -> Self {
        let mut cfg = minify_html::Cfg::new();
        cfg.keep_closing_tags = true;
        cfg.keep_html_and_head_opening_tags = true;
        cfg.keep_comments = false;
        cfg.minify_css = true;
        cfg.minify_js = true;
        cfg.remove_bangs = true;
        cfg.remove_processing_instructions = true;
        Self { cfg }
    }
}

impl Default for HtmlMinifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Minifier for HtmlMinifier {
    fn minify(&self, html: &str) -> Result<String, MinifyError> {
        // The embedded CSS/JS minifiers panic on some malformed input; that
        // must fail the page, not the worker thread.
        let bytes = panic::catch_unwind(AssertUnwindSafe(|| {
            minify_html::minify(html.as_bytes(), &self.cfg)
        }))
        .map_err(|payload| MinifyError::Panicked(panic_message(payload.as_ref())))?;
        Ok(String::from_utf8(bytes)?)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_between_blocks() {
        let html = "<html>\n  <head>\n  </head>\n  <body>\n    <p>Hello</p>\n  </body>\n</html>";
        let out = HtmlMinifier::new().minify(html).unwrap();
        assert!(!out.contains("\n  "));
        assert!(out.contains("<p>Hello</p>"));
    }

    #[test]
    fn minifies_inline_css() {
        let html = "<html><head><style>\n  h1 {\n    color: red;\n  }\n</style></head><body></body></html>";
        let out = HtmlMinifier::new().minify(html).unwrap();
        assert!(out.contains("color:red"));
        assert!(!out.contains("\n    color"));
    }

    #[test]
    fn drops_comments() {
        let out = HtmlMinifier::new()
            .minify("<html><head></head><body><!-- note --><p>x</p></body></html>")
            .unwrap();
        assert!(!out.contains("note"));
    }

    #[test]
    fn panic_payloads_become_messages() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
