//! Per-page stylesheets, scripts and templates.
//!
//! A page picks its assets through front matter:
//!
//! ```text
//! ---
//! styles: [blog, code.css]   # <styles>/blog.css, <styles>/code.css
//! scripts: search            # a scalar is a one-element list
//! template: wide             # <templates>/wide.html
//! ---
//! ```
//!
//! Page entries are reduced to their base filename and get the canonical
//! extension appended, so a page can never reach outside the asset
//! directory. Duplicates are dropped keeping the first occurrence. When a
//! page names no list of its own the configured defaults are used instead,
//! taken as paths relative to the asset directory.
//!
//! A missing file is logged and skipped. A file that passed the existence
//! check and then fails to read is [`AssetError::Vanished`], which aborts the
//! run.

use crate::metadata::Metadata;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("{kind} {path} exists but could not be read: {source}")]
    Vanished {
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Style,
    Script,
}

impl AssetKind {
    /// Front-matter key holding the page's own list.
    pub fn metadata_key(self) -> &'static str {
        match self {
            AssetKind::Style => "styles",
            AssetKind::Script => "scripts",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            AssetKind::Style => ".css",
            AssetKind::Script => ".js",
        }
    }

    fn label(self) -> &'static str {
        match self {
            AssetKind::Style => "stylesheet",
            AssetKind::Script => "script",
        }
    }
}

/// The ordered file contents to inline for one asset kind.
pub fn resolve_assets(
    metadata: &Metadata,
    kind: AssetKind,
    asset_dir: &Path,
    defaults: &[String],
) -> Result<Vec<String>, AssetError> {
    let paths: Vec<PathBuf> = match metadata
        .get(kind.metadata_key())
        .and_then(|value| value.as_string_list())
    {
        Some(entries) => page_asset_names(&entries, kind)
            .into_iter()
            .map(|name| asset_dir.join(name))
            .collect(),
        None => defaults.iter().map(|name| asset_dir.join(name)).collect(),
    };

    let mut blocks = Vec::with_capacity(paths.len());
    for path in paths {
        if !path.is_file() {
            tracing::warn!("{} {} not found, skipping", kind.label(), path.display());
            continue;
        }
        blocks.push(read_existing(&path, kind.label())?);
    }
    Ok(blocks)
}

/// Concatenate style blocks, each followed by a newline.
pub fn stylesheet(blocks: &[String]) -> String {
    let mut css = String::with_capacity(blocks.iter().map(|b| b.len() + 1).sum());
    for block in blocks {
        css.push_str(block);
        css.push('\n');
    }
    css
}

/// Normalize a page's own asset list: base filename, canonical extension,
/// first occurrence wins.
fn page_asset_names(entries: &[String], kind: AssetKind) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(name) = base_name(entry, kind.extension()) else {
            tracing::warn!("ignoring {} entry {entry:?}", kind.label());
            continue;
        };
        if seen.insert(name.clone()) {
            names.push(name);
        }
    }
    names
}

fn base_name(entry: &str, extension: &str) -> Option<String> {
    let name = Path::new(entry.trim()).file_name()?.to_str()?;
    if name.ends_with(extension) {
        Some(name.to_string())
    } else {
        Some(format!("{name}{extension}"))
    }
}

fn read_existing(path: &Path, kind: &'static str) -> Result<String, AssetError> {
    let bytes = fs::read(path).map_err(|source| AssetError::Vanished {
        kind,
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// ============================================================================
// Templates
// ============================================================================

/// Pick the template text for a page.
///
/// Order: the page's `template` key (base name, `.html` appended), then the
/// configured default, then `None` meaning "use the built-in fallback".
pub fn resolve_template(
    metadata: &Metadata,
    templates_dir: &Path,
    default_template: &str,
) -> Result<Option<String>, AssetError> {
    if let Some(requested) = metadata.get("template").map(ToString::to_string)
        && !requested.trim().is_empty()
    {
        match base_name(&requested, ".html") {
            Some(name) => {
                let path = templates_dir.join(name);
                if path.is_file() {
                    return read_existing(&path, "template").map(Some);
                }
                tracing::warn!("page template {} not found, using default", path.display());
            }
            None => tracing::warn!("ignoring template entry {requested:?}"),
        }
    }

    let path = templates_dir.join(default_template);
    if path.is_file() {
        return read_existing(&path, "template").map(Some);
    }
    tracing::warn!(
        "default template {} not found, using built-in fallback",
        path.display()
    );
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{self, MetaValue};
    use tempfile::TempDir;

    fn asset_dir(files: &[(&str, &str)]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(tmp.path().join(name), content).unwrap();
        }
        tmp
    }

    fn defaults(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_page_list_uses_defaults_in_order() {
        let dir = asset_dir(&[("a.css", "A"), ("b.css", "B")]);
        let blocks = resolve_assets(
            &Metadata::new(),
            AssetKind::Style,
            dir.path(),
            &defaults(&["b.css", "missing.css", "a.css"]),
        )
        .unwrap();
        assert_eq!(blocks, vec!["B", "A"]);
    }

    #[test]
    fn page_list_is_deduplicated_in_first_occurrence_order() {
        let dir = asset_dir(&[("x.css", "X"), ("y.css", "Y")]);
        let meta = metadata::front_matter("---\nstyles: [y, x, y.css, x]\n---\n");
        let blocks =
            resolve_assets(&meta, AssetKind::Style, dir.path(), &defaults(&["x.css"])).unwrap();
        assert_eq!(blocks, vec!["Y", "X"]);
    }

    #[test]
    fn page_entries_are_reduced_to_base_names() {
        let dir = asset_dir(&[("app.js", "app();")]);
        let meta = metadata::front_matter("---\nscripts: ../../etc/app\n---\n");
        let blocks = resolve_assets(&meta, AssetKind::Script, dir.path(), &[]).unwrap();
        assert_eq!(blocks, vec!["app();"]);
    }

    #[test]
    fn missing_page_assets_are_skipped() {
        let dir = asset_dir(&[("x.css", "X")]);
        let meta = metadata::front_matter("---\nstyles: [nope, x]\n---\n");
        let blocks = resolve_assets(&meta, AssetKind::Style, dir.path(), &[]).unwrap();
        assert_eq!(blocks, vec!["X"]);
    }

    #[test]
    fn explicit_empty_list_disables_defaults() {
        let dir = asset_dir(&[("default.css", "D")]);
        let meta = metadata::front_matter("---\nstyles: []\n---\n");
        let blocks =
            resolve_assets(&meta, AssetKind::Style, dir.path(), &defaults(&["default.css"]))
                .unwrap();
        assert!(blocks.is_empty());
    }

    #[test]
    fn null_list_falls_back_to_defaults() {
        let dir = asset_dir(&[("default.js", "D")]);
        let mut meta = Metadata::new();
        meta.insert("scripts".into(), MetaValue::Null);
        let blocks =
            resolve_assets(&meta, AssetKind::Script, dir.path(), &defaults(&["default.js"]))
                .unwrap();
        assert_eq!(blocks, vec!["D"]);
    }

    #[test]
    fn stylesheet_separates_blocks_with_newlines() {
        assert_eq!(stylesheet(&["a{}".into(), "b{}".into()]), "a{}\nb{}\n");
        assert_eq!(stylesheet(&[]), "");
    }

    #[test]
    fn template_prefers_page_override() {
        let dir = asset_dir(&[("wide.html", "WIDE"), ("default.html", "DEFAULT")]);
        let meta = metadata::front_matter("---\ntemplate: wide\n---\n");
        let text = resolve_template(&meta, dir.path(), "default.html").unwrap();
        assert_eq!(text.as_deref(), Some("WIDE"));
    }

    #[test]
    fn missing_override_falls_back_to_default_template() {
        let dir = asset_dir(&[("default.html", "DEFAULT")]);
        let meta = metadata::front_matter("---\ntemplate: nope.html\n---\n");
        let text = resolve_template(&meta, dir.path(), "default.html").unwrap();
        assert_eq!(text.as_deref(), Some("DEFAULT"));
    }

    #[test]
    fn no_templates_means_builtin_fallback() {
        let dir = asset_dir(&[]);
        let text = resolve_template(&Metadata::new(), dir.path(), "default.html").unwrap();
        assert_eq!(text, None);
    }

    #[test]
    fn failed_read_after_existence_check_is_vanished() {
        let dir = asset_dir(&[]);
        let err = read_existing(&dir.path().join("gone.css"), "stylesheet").unwrap_err();
        assert!(matches!(err, AssetError::Vanished { kind: "stylesheet", .. }));
        assert!(err.to_string().starts_with("stylesheet "));
    }
}
