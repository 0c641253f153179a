//! Page discovery.
//!
//! Walks the pages directory once, before anything is rendered, and records
//! every Markdown source by its path relative to the pages root:
//!
//! ```text
//! pages/                    PageTree
//! ├── index.md         ──►    index.md
//! ├── about.md                about.md
//! ├── blog/                   blog/index.md
//! │   ├── index.md            blog/post.md
//! │   ├── post.md
//! │   └── cover.png           (not Markdown, ignored)
//! ```
//!
//! Output planning needs to know whether `name/index.md` exists next to
//! `name.md`; having the complete set up front makes that question
//! independent of the order pages are processed in.
//!
//! Only files with the exact extension `.md` are pages. Directories, other
//! files and unreadable entries are skipped.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("pages directory {0} does not exist or is not a directory")]
    MissingRoot(PathBuf),
}

/// Every page source under one pages root.
#[derive(Debug, Clone)]
pub struct PageTree {
    root: PathBuf,
    /// Relative paths, sorted.
    pages: Vec<PathBuf>,
    index: HashSet<PathBuf>,
}

impl PageTree {
    /// Build a tree from already-known relative paths.
    pub fn from_relative(root: impl Into<PathBuf>, pages: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut pages: Vec<PathBuf> = pages.into_iter().collect();
        pages.sort();
        pages.dedup();
        let index = pages.iter().cloned().collect();
        Self {
            root: root.into(),
            pages,
            index,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pages(&self) -> &[PathBuf] {
        &self.pages
    }

    /// Whether `relative` names a page in this tree.
    pub fn contains(&self, relative: &Path) -> bool {
        self.index.contains(relative)
    }

    pub fn absolute(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }
}

/// Walk `root` and collect every `.md` file.
pub fn scan(root: &Path) -> Result<PageTree, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::MissingRoot(root.to_path_buf()));
    }

    let mut pages = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!("skipping unreadable entry under {}: {err}", root.display());
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_markdown(entry.path()) {
            continue;
        }
        match entry.path().strip_prefix(root) {
            Ok(relative) => pages.push(relative.to_path_buf()),
            Err(_) => tracing::debug!("{} is outside {}", entry.path().display(), root.display()),
        }
    }

    tracing::debug!("found {} pages under {}", pages.len(), root.display());
    Ok(PageTree::from_relative(root, pages))
}

pub fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "md")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn finds_markdown_recursively_and_sorted() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "zeta.md");
        touch(tmp.path(), "blog/post.md");
        touch(tmp.path(), "blog/index.md");
        touch(tmp.path(), "about.md");

        let tree = scan(tmp.path()).unwrap();
        assert_eq!(
            tree.pages(),
            &[
                PathBuf::from("about.md"),
                PathBuf::from("blog/index.md"),
                PathBuf::from("blog/post.md"),
                PathBuf::from("zeta.md"),
            ]
        );
    }

    #[test]
    fn ignores_other_files_and_directories() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "page.md");
        touch(tmp.path(), "cover.png");
        touch(tmp.path(), "notes.MD");
        touch(tmp.path(), "readme.markdown");
        fs::create_dir_all(tmp.path().join("dir.md")).unwrap();

        let tree = scan(tmp.path()).unwrap();
        assert_eq!(tree.pages(), &[PathBuf::from("page.md")]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let result = scan(&tmp.path().join("nope"));
        assert!(matches!(result, Err(ScanError::MissingRoot(_))));
    }

    #[test]
    fn contains_uses_relative_paths() {
        let tree = PageTree::from_relative("/site/pages", [PathBuf::from("a/index.md")]);
        assert!(tree.contains(Path::new("a/index.md")));
        assert!(!tree.contains(Path::new("a.md")));
        assert_eq!(
            tree.absolute(Path::new("a/index.md")),
            PathBuf::from("/site/pages/a/index.md")
        );
    }
}
