//! Output path planning.
//!
//! Maps a page's source path to the file it is written to:
//!
//! ```text
//! source (pages/)     pretty URLs           flat
//! index.md            index.html            index.html
//! about.md            about/index.html      about.html
//! blog/index.md       blog/index.html       blog/index.html
//! blog/post.md        blog/post/index.html  blog/post.html
//! ```
//!
//! With pretty URLs `about.md` and `about/index.md` would both claim
//! `about/index.html`. The directory form wins and `about.md` is skipped
//! with a warning; it is never written over the other page.
//!
//! Drafts are skipped before any of this unless drafts are included.

use crate::scan::{PageTree, is_markdown};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("{0} is not a Markdown page")]
    NotMarkdown(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputPlan {
    Write(PathBuf),
    Skip(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Draft,
    /// A `name/index.md` sibling owns the pretty URL.
    Collision { sibling: PathBuf },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Draft => f.write_str("draft"),
            SkipReason::Collision { sibling } => {
                write!(f, "collides with {}", sibling.display())
            }
        }
    }
}

/// Output policy for one run.
#[derive(Debug, Clone, Copy)]
pub struct Planner<'a> {
    pub tree: &'a PageTree,
    pub build_root: &'a Path,
    pub pretty_urls: bool,
    pub include_drafts: bool,
}

impl Planner<'_> {
    /// Plan one page given its path relative to the pages root.
    pub fn plan(&self, relative: &Path, is_draft: bool) -> Result<OutputPlan, PlanError> {
        let stem = match relative.file_stem().and_then(|s| s.to_str()) {
            Some(stem) if is_markdown(relative) => stem,
            _ => return Err(PlanError::NotMarkdown(relative.to_path_buf())),
        };

        if is_draft && !self.include_drafts {
            return Ok(OutputPlan::Skip(SkipReason::Draft));
        }

        let parent = relative.parent().unwrap_or(Path::new(""));
        let out_dir = self.build_root.join(parent);

        if !self.pretty_urls {
            return Ok(OutputPlan::Write(out_dir.join(format!("{stem}.html"))));
        }
        if stem == "index" {
            return Ok(OutputPlan::Write(out_dir.join("index.html")));
        }

        let sibling = parent.join(stem).join("index.md");
        if self.tree.contains(&sibling) {
            tracing::warn!(
                "Both {} and {} exist; skipping {}",
                relative.display(),
                sibling.display(),
                relative.display()
            );
            return Ok(OutputPlan::Skip(SkipReason::Collision { sibling }));
        }
        Ok(OutputPlan::Write(out_dir.join(stem).join("index.html")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(pages: &[&str]) -> PageTree {
        PageTree::from_relative("/site/pages", pages.iter().map(PathBuf::from))
    }

    fn planner(tree: &PageTree, pretty_urls: bool, include_drafts: bool) -> Planner<'_> {
        Planner {
            tree,
            build_root: Path::new("/site/build"),
            pretty_urls,
            include_drafts,
        }
    }

    fn write(path: &str) -> OutputPlan {
        OutputPlan::Write(PathBuf::from(path))
    }

    #[test]
    fn pretty_urls_nest_non_index_pages() {
        let t = tree(&["about.md", "index.md", "blog/post.md", "blog/index.md"]);
        let p = planner(&t, true, false);
        assert_eq!(p.plan(Path::new("about.md"), false).unwrap(), write("/site/build/about/index.html"));
        assert_eq!(p.plan(Path::new("index.md"), false).unwrap(), write("/site/build/index.html"));
        assert_eq!(
            p.plan(Path::new("blog/post.md"), false).unwrap(),
            write("/site/build/blog/post/index.html")
        );
        assert_eq!(
            p.plan(Path::new("blog/index.md"), false).unwrap(),
            write("/site/build/blog/index.html")
        );
    }

    #[test]
    fn flat_urls_replace_extension() {
        let t = tree(&["about.md", "blog/post.md"]);
        let p = planner(&t, false, false);
        assert_eq!(p.plan(Path::new("about.md"), false).unwrap(), write("/site/build/about.html"));
        assert_eq!(
            p.plan(Path::new("blog/post.md"), false).unwrap(),
            write("/site/build/blog/post.html")
        );
    }

    #[test]
    fn directory_index_wins_pretty_url_collision() {
        let t = tree(&["a.md", "a/index.md"]);
        let p = planner(&t, true, false);
        assert_eq!(
            p.plan(Path::new("a.md"), false).unwrap(),
            OutputPlan::Skip(SkipReason::Collision {
                sibling: PathBuf::from("a/index.md")
            })
        );
        assert_eq!(p.plan(Path::new("a/index.md"), false).unwrap(), write("/site/build/a/index.html"));
    }

    #[test]
    fn no_collision_in_flat_mode() {
        let t = tree(&["a.md", "a/index.md"]);
        let p = planner(&t, false, false);
        assert_eq!(p.plan(Path::new("a.md"), false).unwrap(), write("/site/build/a.html"));
    }

    #[test]
    fn collision_only_checks_same_parent() {
        let t = tree(&["docs/a.md", "a/index.md"]);
        let p = planner(&t, true, false);
        assert_eq!(
            p.plan(Path::new("docs/a.md"), false).unwrap(),
            write("/site/build/docs/a/index.html")
        );
    }

    #[test]
    fn drafts_skipped_unless_included() {
        let t = tree(&["wip.md"]);
        assert_eq!(
            planner(&t, true, false).plan(Path::new("wip.md"), true).unwrap(),
            OutputPlan::Skip(SkipReason::Draft)
        );
        assert_eq!(
            planner(&t, true, true).plan(Path::new("wip.md"), true).unwrap(),
            write("/site/build/wip/index.html")
        );
    }

    #[test]
    fn non_markdown_paths_are_rejected() {
        let t = tree(&[]);
        let result = planner(&t, true, false).plan(Path::new("image.png"), false);
        assert!(matches!(result, Err(PlanError::NotMarkdown(_))));
    }

    #[test]
    fn skip_reasons_display() {
        assert_eq!(SkipReason::Draft.to_string(), "draft");
        assert_eq!(
            SkipReason::Collision {
                sibling: PathBuf::from("a/index.md")
            }
            .to_string(),
            "collides with a/index.md"
        );
    }
}
