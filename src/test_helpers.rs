//! Shared test utilities for the goose test suite.
//!
//! [`SiteFixture`] lays out a throw-away site in a temp directory and hands
//! back a [`SiteConfig`] pointing at it.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let site = SiteFixture::new()
//!     .page("index.md", "---\ntitle: Home\n---\n# Hi")
//!     .style("x.css", "h1 { color: red }")
//!     .template("default.html", BASIC_TEMPLATE);
//!
//! generate(&site.config(), None).unwrap();
//! assert!(site.read_build("index.html").contains("<title>Home</title>"));
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::SiteConfig;
use crate::minify::{MinifyError, Minifier};

/// A minimal template with a body placeholder.
pub const BASIC_TEMPLATE: &str = "<!DOCTYPE html><html><head></head>\
    <body><main><markdown></markdown></main></body></html>";

// =========================================================================
// Site fixture
// =========================================================================

/// A site under `<tmp>/source`, building into `<tmp>/build`.
pub struct SiteFixture {
    tmp: TempDir,
}

impl SiteFixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("source/pages")).unwrap();
        Self { tmp }
    }

    /// Add a file relative to the source directory.
    pub fn file(self, relative: &str, content: &str) -> Self {
        self.write(self.source_root().join(relative), content);
        self
    }

    pub fn page(self, relative: &str, content: &str) -> Self {
        self.file(&format!("pages/{relative}"), content)
    }

    pub fn style(self, name: &str, content: &str) -> Self {
        self.file(&format!("styles/{name}"), content)
    }

    pub fn script(self, name: &str, content: &str) -> Self {
        self.file(&format!("scripts/{name}"), content)
    }

    pub fn template(self, name: &str, content: &str) -> Self {
        self.file(&format!("templates/{name}"), content)
    }

    /// Write `content` to an absolute path, creating parent directories.
    pub fn write(&self, path: impl AsRef<Path>, content: &str) {
        let path = path.as_ref();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn source_root(&self) -> PathBuf {
        self.root().join("source")
    }

    pub fn build_root(&self) -> PathBuf {
        self.root().join("build")
    }

    pub fn page_path(&self, relative: &str) -> PathBuf {
        self.source_root().join("pages").join(relative)
    }

    pub fn build_path(&self, relative: &str) -> PathBuf {
        self.build_root().join(relative)
    }

    /// Read a generated file. Panics with the list of built files on miss.
    pub fn read_build(&self, relative: &str) -> String {
        let path = self.build_path(relative);
        fs::read_to_string(&path).unwrap_or_else(|_| {
            panic!(
                "{} not generated. Built files: {:?}",
                path.display(),
                self.built_files()
            )
        })
    }

    /// All files under the build directory, relative and sorted.
    pub fn built_files(&self) -> Vec<String> {
        let root = self.build_root();
        let mut files: Vec<String> = walkdir::WalkDir::new(&root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                e.path()
                    .strip_prefix(&root)
                    .ok()
                    .map(|p| p.to_string_lossy().into_owned())
            })
            .collect();
        files.sort();
        files
    }

    /// Stock config pointed at this site, minification off so output stays
    /// easy to assert on.
    pub fn config(&self) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.dirs.source = self.source_root();
        config.dirs.build = self.build_root();
        config.output.minify = false;
        config
    }
}

// =========================================================================
// Minifier doubles
// =========================================================================

/// Fails every page.
pub struct FailingMinifier;

impl Minifier for FailingMinifier {
    fn minify(&self, _html: &str) -> Result<String, MinifyError> {
        Err(MinifyError::Panicked("refusing to minify".into()))
    }
}
