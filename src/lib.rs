//! # Goose
//!
//! A static site generator that composes Markdown pages into HTML templates.
//! Pages carry YAML front matter; the front matter picks the page's
//! template, stylesheets and scripts, and its values can be pulled into
//! page bodies, including from other pages.
//!
//! # Architecture: Plan, Then Build
//!
//! ```text
//! 1. Reset   build/ cleared, static/ copied
//! 2. Plan    pages/**.md  →  (source, metadata, output path) | skipped
//! 3. Build   per page, in parallel:
//!            render → substitute placeholders → gather assets
//!            → compose into template → minify → write
//! ```
//!
//! Planning runs over the complete page set before anything is written, so
//! pretty-URL collisions (`a.md` against `a/index.md`) are decided the same
//! way whatever order pages are built in.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `goose.toml` loading, layering with CLI flags, validation |
//! | [`scan`] | Discovers every Markdown page under the pages directory |
//! | [`metadata`] | Front matter extraction, merged over the configured defaults |
//! | [`plan`] | Output paths: pretty URLs, drafts, collisions |
//! | [`markdown`] | Markdown to HTML with highlighted code and heading ids |
//! | [`placeholders`] | `{{ .meta.KEY }}` and `{{ from PATH .meta.KEY }}` in page bodies |
//! | [`assets`] | Per-page stylesheets, scripts and template selection |
//! | [`compose`] | DOM-level composition of template, assets and body |
//! | [`minify`] | Final HTML/CSS/JS minification |
//! | [`generate`] | Runs the pipeline over the site |
//! | [`output`] | Progress lines for the CLI |
//!
//! # Design Decisions
//!
//! ## Composition on a Parsed Tree
//!
//! Templates are parsed with html5ever and modified as a DOM instead of by
//! string replacement. The rendered body is spliced in place of a
//! `<markdown>` element, so a page whose text mentions the placeholder can't
//! corrupt its own output. A sloppy template is repaired the way a browser
//! would repair it.
//!
//! ## Placeholders Fail Open
//!
//! An unknown key, a missing referenced page or a reference outside the
//! pages directory leaves the placeholder verbatim in the output. A typo is
//! visible on the page instead of silently rendering as nothing.
//!
//! ## Inline Assets
//!
//! Stylesheets and scripts are inlined into each page rather than linked.
//! Every output file is self-contained, and the minifier sees the page's CSS
//! and JavaScript together with its markup.

pub mod assets;
pub mod compose;
pub mod config;
pub mod generate;
pub mod markdown;
pub mod metadata;
pub mod minify;
pub mod output;
pub mod placeholders;
pub mod plan;
pub mod scan;

#[cfg(test)]
pub(crate) mod test_helpers;
