//! CLI progress output.
//!
//! Progress lines go to stdout and read as one line per page source:
//!
//! ```text
//! File found: index.md... generated → build/index.html
//! File found: about.md... generated → build/about/index.html
//! File found: about/team.md... skipped (draft)
//! File found: a.md... skipped (collides with a/index.md)
//! File found: broken.md... failed
//!
//! Generated 2 pages, skipped 2, failed 1
//! ```
//!
//! Warnings and errors never appear here; they go to stderr through
//! `tracing`, so stdout stays a clean inventory of what was built.
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure.

use crate::generate::{BuildEvent, SitePlan, Summary};
use std::path::Path;

fn found(source: &Path) -> String {
    format!("File found: {}...", source.display())
}

fn plural(count: usize, one: &str, many: &str) -> String {
    format!("{count} {}", if count == 1 { one } else { many })
}

// ============================================================================
// generate
// ============================================================================

/// Format a single build progress event as display lines.
pub fn format_build_event(event: &BuildEvent) -> Vec<String> {
    match event {
        BuildEvent::Generated { source, output } => {
            vec![format!("{} generated → {}", found(source), output.display())]
        }
        BuildEvent::Skipped { source, reason } => {
            vec![format!("{} skipped ({reason})", found(source))]
        }
        BuildEvent::Failed { source, .. } => vec![format!("{} failed", found(source))],
    }
}

pub fn format_summary(summary: &Summary) -> Vec<String> {
    vec![
        String::new(),
        format!(
            "Generated {}, skipped {}, failed {}",
            plural(summary.generated, "page", "pages"),
            summary.skipped,
            summary.failed
        ),
    ]
}

pub fn print_build_event(event: &BuildEvent) {
    for line in format_build_event(event) {
        println!("{line}");
    }
}

pub fn print_summary(summary: &Summary) {
    for line in format_summary(summary) {
        println!("{line}");
    }
}

// ============================================================================
// check
// ============================================================================

/// Format the output plan: every page with where it would be written.
pub fn format_plan(plan: &SitePlan) -> Vec<String> {
    let mut lines = Vec::new();

    if !plan.pages.is_empty() {
        lines.push("Pages".to_string());
        for page in &plan.pages {
            lines.push(format!("    {} → {}", page.source.display(), page.output.display()));
            let title = crate::metadata::title(&page.metadata);
            if !title.is_empty() {
                lines.push(format!("        Title: {title}"));
            }
        }
    }

    if !plan.skipped.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Skipped".to_string());
        for (source, reason) in &plan.skipped {
            lines.push(format!("    {} ({reason})", source.display()));
        }
    }

    if !plan.failed.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Unreadable".to_string());
        for (source, error) in &plan.failed {
            lines.push(format!("    {}: {error}", source.display()));
        }
    }

    if lines.is_empty() {
        lines.push("No pages found".to_string());
    }
    lines
}

pub fn print_plan(plan: &SitePlan) {
    for line in format_plan(plan) {
        println!("{line}");
    }
}
