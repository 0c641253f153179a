//! Page metadata extraction and resolution.
//!
//! Every page carries a metadata mapping built from two layers:
//!
//! ## Layers
//!
//! - **Defaults**: the `[default_metadata]` table from `goose.toml`. Lives for
//!   the whole run and is shared read-only by every page.
//! - **Front matter**: a YAML block at the very top of the Markdown source,
//!   fenced by `---` lines.
//!
//! ```text
//! ---
//! title: Hello
//! styles: [blog, code]
//! draft: true
//! ---
//! # Body starts here
//! ```
//!
//! ## Resolution
//!
//! Defaults are copied first, then every front-matter key overwrites its
//! default. A key missing from both layers is simply absent; callers decide
//! what "unset" means for them (the placeholder engine leaves the token in
//! place, the asset aggregator falls back to the configured lists).
//!
//! Extraction never renders the body. Cross-file placeholder lookups only
//! need the referenced page's metadata, so [`resolve`] stops after the
//! front-matter block.
//!
//! ## Values
//!
//! Front matter is loosely typed. [`MetaValue`] is the small sum type every
//! value is normalized into, and [`MetaValue`]'s `Display` impl is the one
//! canonical stringification used for placeholders and page titles.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Resolved metadata for one page: key → value.
pub type Metadata = BTreeMap<String, MetaValue>;

/// A dynamically typed metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<MetaValue>),
    Map(BTreeMap<String, MetaValue>),
}

impl MetaValue {
    /// Interpret the value as a list of strings.
    ///
    /// A scalar is treated as a one-element list so `styles: blog` and
    /// `styles: [blog]` mean the same thing. `Null` and maps yield `None`.
    pub fn as_string_list(&self) -> Option<Vec<String>> {
        match self {
            MetaValue::List(items) => Some(items.iter().map(ToString::to_string).collect()),
            MetaValue::Null | MetaValue::Map(_) => None,
            scalar => Some(vec![scalar.to_string()]),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetaValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert a parsed YAML node. Never fails: tagged values are unwrapped
    /// and non-string map keys are stringified.
    pub fn from_yaml(value: serde_yaml::Value) -> Self {
        use serde_yaml::Value;
        match value {
            Value::Null => MetaValue::Null,
            Value::Bool(b) => MetaValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => MetaValue::Integer(i),
                None => MetaValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => MetaValue::String(s),
            Value::Sequence(seq) => MetaValue::List(seq.into_iter().map(Self::from_yaml).collect()),
            Value::Mapping(map) => MetaValue::Map(
                map.into_iter()
                    .map(|(k, v)| (yaml_key(k), Self::from_yaml(v)))
                    .collect(),
            ),
            Value::Tagged(tagged) => Self::from_yaml(tagged.value),
        }
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        other => MetaValue::from_yaml(other).to_string(),
    }
}

/// Canonical textual form.
///
/// - strings as-is, `Null` as the empty string
/// - lists joined with `", "`
/// - maps as `key: value` pairs joined with `", "`
impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Null => Ok(()),
            MetaValue::Bool(b) => write!(f, "{b}"),
            MetaValue::Integer(i) => write!(f, "{i}"),
            MetaValue::Float(x) => write!(f, "{x}"),
            MetaValue::String(s) => f.write_str(s),
            MetaValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            MetaValue::Map(map) => {
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::String(s.to_string())
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        MetaValue::Bool(b)
    }
}

/// Split a document into its raw front-matter YAML and the Markdown body.
///
/// Front matter must start on the first line with exactly `---` and end with
/// a line that is exactly `---` or `...`. Anything else means "no front
/// matter" and the whole input is the body.
pub fn split_front_matter(input: &str) -> (Option<&str>, &str) {
    let text = input.strip_prefix('\u{feff}').unwrap_or(input);
    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return (None, input);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed == "---" || trimmed == "..." {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }
    (None, input)
}

/// Parse a document's own front matter, without the default layer.
///
/// Malformed YAML, or YAML whose top level is not a mapping, is logged and
/// treated as an empty front matter.
pub fn front_matter(input: &str) -> Metadata {
    let Some(yaml) = split_front_matter(input).0 else {
        return Metadata::new();
    };
    if yaml.trim().is_empty() {
        return Metadata::new();
    }
    match serde_yaml::from_str::<serde_yaml::Value>(yaml) {
        Ok(serde_yaml::Value::Mapping(map)) => map
            .into_iter()
            .map(|(k, v)| (yaml_key(k), MetaValue::from_yaml(v)))
            .collect(),
        Ok(serde_yaml::Value::Null) => Metadata::new(),
        Ok(_) => {
            tracing::warn!("front matter is not a key/value mapping; ignoring it");
            Metadata::new()
        }
        Err(err) => {
            tracing::warn!("malformed front matter: {err}");
            Metadata::new()
        }
    }
}

/// Resolve a page's metadata: defaults first, front matter on top.
pub fn resolve(input: &str, defaults: &Metadata) -> Metadata {
    let mut merged = defaults.clone();
    merged.extend(front_matter(input));
    merged
}

/// The page title: the stringified `title` key, or empty when unset.
pub fn title(metadata: &Metadata) -> String {
    metadata
        .get("title")
        .map(ToString::to_string)
        .unwrap_or_default()
}

/// Whether the page is flagged `draft: true`. Only a real boolean counts.
pub fn is_draft(metadata: &Metadata) -> bool {
    metadata
        .get("draft")
        .and_then(MetaValue::as_bool)
        .unwrap_or(false)
}
