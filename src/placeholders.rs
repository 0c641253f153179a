//! Metadata placeholders in rendered page bodies.
//!
//! Two placeholder forms are recognized in the HTML produced from a page's
//! Markdown, and are rewritten in a single left-to-right pass:
//!
//! ```text
//! {{ .meta.KEY }}              KEY from the current page
//! {{ from PATH .meta.KEY }}    KEY from another page's metadata
//! ```
//!
//! `KEY` is `[a-zA-Z0-9_-]+`. `PATH` is a single token resolved against the
//! current page's directory, with `.md` appended when missing.
//!
//! A placeholder that cannot be resolved (unknown key, unreadable file, path
//! outside the pages root) is left verbatim so the author can spot it in the
//! output. Substituted values are HTML-escaped and never re-scanned, so a
//! value that itself looks like a placeholder stays literal.

use crate::metadata::{self, Metadata};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

/// Both grammars in one alternation, so a substituted value is never scanned
/// again. Group 1 is the `from` path (absent for local references), group 2
/// the key.
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(?:from\s+(\S+)\s+)?\.meta\.([a-zA-Z0-9_-]+)\s*\}\}")
        .expect("placeholder regex")
});

/// Where cross-file references are resolved from, and what they may reach.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    /// Directory of the page being rendered.
    pub current_dir: &'a Path,
    /// The pages root; references resolving outside it are refused.
    pub root_dir: &'a Path,
}

/// Rewrite every placeholder in `body`.
///
/// Returns the input unchanged (borrowed) when it holds no placeholders.
pub fn substitute<'b>(
    body: &'b str,
    current: &Metadata,
    defaults: &Metadata,
    scope: Scope<'_>,
) -> Cow<'b, str> {
    let mut lookups = CrossFileLookups::new(defaults, scope);
    PLACEHOLDER_RE.replace_all(body, |caps: &Captures| {
        let key = &caps[2];
        let value = match caps.get(1) {
            None => current.get(key).map(|v| escape(&v.to_string())),
            Some(reference) => lookups.value(reference.as_str(), key),
        };
        value.unwrap_or_else(|| caps[0].to_string())
    })
}

/// Resolves cross-file references, reading each referenced page at most once
/// per body.
struct CrossFileLookups<'a> {
    defaults: &'a Metadata,
    scope: Scope<'a>,
    cache: HashMap<PathBuf, Option<Metadata>>,
}

impl<'a> CrossFileLookups<'a> {
    fn new(defaults: &'a Metadata, scope: Scope<'a>) -> Self {
        Self {
            defaults,
            scope,
            cache: HashMap::new(),
        }
    }

    fn value(&mut self, reference: &str, key: &str) -> Option<String> {
        let target = resolve_reference(reference, self.scope)?;
        let defaults = self.defaults;
        let meta = self
            .cache
            .entry(target.clone())
            .or_insert_with(|| match fs::read_to_string(&target) {
                Ok(text) => Some(metadata::resolve(&text, defaults)),
                Err(err) => {
                    tracing::warn!("cannot read referenced page {}: {err}", target.display());
                    None
                }
            })
            .as_ref()?;

        match meta.get(key) {
            Some(value) => Some(escape(&value.to_string())),
            None => {
                tracing::debug!("{} has no metadata key {key:?}", target.display());
                None
            }
        }
    }
}

/// Resolve a reference token to a file path inside the pages root.
///
/// Returns `None` (and logs) when the path escapes the root, either lexically
/// through `..`/absolute paths or physically through symlinks.
pub fn resolve_reference(reference: &str, scope: Scope<'_>) -> Option<PathBuf> {
    let mut relative = reference.to_string();
    if !relative.ends_with(".md") {
        relative.push_str(".md");
    }

    let target = normalize(&scope.current_dir.join(&relative));
    let root = normalize(scope.root_dir);
    if !target.starts_with(&root) {
        tracing::warn!(
            "refusing reference {reference:?}: {} is outside the pages root {}",
            target.display(),
            root.display()
        );
        return None;
    }

    if let (Ok(real_target), Ok(real_root)) = (target.canonicalize(), root.canonicalize())
        && !real_target.starts_with(&real_root)
    {
        tracing::warn!(
            "refusing reference {reference:?}: {} resolves outside the pages root",
            target.display()
        );
        return None;
    }

    Some(target)
}

/// Lexically resolve `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn escape(value: &str) -> String {
    maud::html! { (value) }.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetaValue;
    use tempfile::TempDir;

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), MetaValue::from(*v)))
            .collect()
    }

    fn scope<'a>(current: &'a Path, root: &'a Path) -> Scope<'a> {
        Scope {
            current_dir: current,
            root_dir: root,
        }
    }

    #[test]
    fn body_without_placeholders_is_unchanged() {
        let body = "<p>Nothing {here} to {{ see }}</p>";
        let out = substitute(body, &meta(&[("a", "b")]), &Metadata::new(), scope(Path::new("p"), Path::new("p")));
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out, body);
    }

    #[test]
    fn local_placeholders_are_replaced() {
        let out = substitute(
            "<h1>Hi {{ .meta.title }}</h1><p>{{.meta.title}}</p>",
            &meta(&[("title", "Hi")]),
            &Metadata::new(),
            scope(Path::new("p"), Path::new("p")),
        );
        assert_eq!(out, "<h1>Hi Hi</h1><p>Hi</p>");
    }

    #[test]
    fn unknown_local_key_is_left_verbatim() {
        let body = "<p>{{ .meta.tilte }}</p>";
        let out = substitute(body, &meta(&[("title", "x")]), &Metadata::new(), scope(Path::new("p"), Path::new("p")));
        assert_eq!(out, body);
    }

    #[test]
    fn values_are_escaped_and_not_resubstituted() {
        let out = substitute(
            "{{ .meta.a }}",
            &meta(&[("a", "<b>{{ .meta.a }}</b>")]),
            &Metadata::new(),
            scope(Path::new("p"), Path::new("p")),
        );
        assert_eq!(out, "&lt;b&gt;{{ .meta.a }}&lt;/b&gt;");
    }

    #[test]
    fn local_value_shaped_like_a_reference_stays_literal() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("other.md"), "---\nk: leaked\n---\n").unwrap();
        let out = substitute(
            "{{ .meta.a }}",
            &meta(&[("a", "{{ from other .meta.k }}")]),
            &Metadata::new(),
            scope(tmp.path(), tmp.path()),
        );
        assert_eq!(out, "{{ from other .meta.k }}");
    }

    #[test]
    fn non_string_values_are_stringified() {
        let mut current = Metadata::new();
        current.insert("n".into(), MetaValue::Integer(7));
        current.insert("draft".into(), MetaValue::Bool(false));
        let out = substitute("{{ .meta.n }}/{{ .meta.draft }}", &current, &Metadata::new(), scope(Path::new("p"), Path::new("p")));
        assert_eq!(out, "7/false");
    }

    #[test]
    fn cross_file_reference_reads_other_page() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("pages");
        fs::create_dir_all(root.join("blog")).unwrap();
        fs::write(root.join("other.md"), "---\nauthor: Jane\n---\nbody").unwrap();

        let out = substitute(
            "<p>{{ from ../other .meta.author }}</p>",
            &Metadata::new(),
            &Metadata::new(),
            scope(&root.join("blog"), &root),
        );
        assert_eq!(out, "<p>Jane</p>");
    }

    #[test]
    fn cross_file_reference_uses_defaults_for_missing_keys() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("other.md"), "no front matter").unwrap();

        let out = substitute(
            "{{ from other.md .meta.site }}",
            &Metadata::new(),
            &meta(&[("site", "Goose")]),
            scope(root, root),
        );
        assert_eq!(out, "Goose");
    }

    #[test]
    fn missing_referenced_file_leaves_placeholder() {
        let tmp = TempDir::new().unwrap();
        let body = "{{ from other .meta.author }}";
        let out = substitute(body, &Metadata::new(), &Metadata::new(), scope(tmp.path(), tmp.path()));
        assert_eq!(out, body);
    }

    #[test]
    fn reference_outside_root_is_refused() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("pages");
        fs::create_dir_all(&root).unwrap();
        fs::write(tmp.path().join("secret.md"), "---\nkey: leaked\n---\n").unwrap();

        let body = "{{ from ../secret .meta.key }}";
        let out = substitute(body, &Metadata::new(), &Metadata::new(), scope(&root, &root));
        assert_eq!(out, body);
        assert_eq!(resolve_reference("../secret", scope(&root, &root)), None);
    }

    #[test]
    fn sibling_directory_with_root_prefix_is_refused() {
        let root = Path::new("/site/pages");
        assert_eq!(
            resolve_reference("../pages-private/x", scope(root, root)),
            None
        );
    }

    #[test]
    fn absolute_reference_is_refused() {
        let root = Path::new("/site/pages");
        assert_eq!(resolve_reference("/etc/passwd", scope(root, root)), None);
    }

    #[test]
    fn dot_segments_inside_root_are_allowed() {
        let root = Path::new("/site/pages");
        assert_eq!(
            resolve_reference("./a/../b", scope(&root.join("blog"), root)),
            Some(PathBuf::from("/site/pages/blog/b.md"))
        );
    }

    #[test]
    fn normalize_resolves_parent_segments() {
        assert_eq!(normalize(Path::new("a/b/../c/./d")), PathBuf::from("a/c/d"));
        assert_eq!(normalize(Path::new("../x")), PathBuf::from("../x"));
        assert_eq!(normalize(Path::new("/../x")), PathBuf::from("/x"));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_leading_out_of_root_is_refused() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("pages");
        fs::create_dir_all(&root).unwrap();
        fs::write(tmp.path().join("secret.md"), "---\nkey: leaked\n---\n").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("secret.md"), root.join("link.md")).unwrap();
        std::os::unix::fs::symlink(tmp.path(), root.join("up")).unwrap();

        assert_eq!(resolve_reference("link", scope(&root, &root)), None);
        assert_eq!(resolve_reference("up/secret", scope(&root, &root)), None);

        let body = "{{ from link .meta.key }} {{ from up/secret .meta.key }}";
        let out = substitute(body, &Metadata::new(), &Metadata::new(), scope(&root, &root));
        assert_eq!(out, body);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_within_root_is_followed() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("pages");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("real.md"), "---\nauthor: Jane\n---\n").unwrap();
        std::os::unix::fs::symlink(root.join("real.md"), root.join("alias.md")).unwrap();

        let out = substitute(
            "{{ from alias .meta.author }}",
            &Metadata::new(),
            &Metadata::new(),
            scope(&root, &root),
        );
        assert_eq!(out, "Jane");
    }
}
