//! Site configuration module.
//!
//! Handles loading, validating, and layering `goose.toml`. Configuration is
//! resolved once per run and then passed around read-only:
//!
//! ```text
//! stock defaults  <  goose.toml  <  command-line flags
//! ```
//!
//! ## Config File Location
//!
//! When `--config` is not given, the first of these that exists is used:
//!
//! ```text
//! ./goose.toml
//! $HOME/.goose/goose.toml
//! ```
//!
//! No config file at all is fine: the stock defaults describe the layout
//! produced by a fresh site.
//!
//! ## Configuration Options
//!
//! ```toml
//! [dirs]
//! source = "source"          # Site sources
//! build = "build"            # Output, wiped at the start of every run
//! pages = "pages"            # Markdown pages (relative to source)
//! styles = "styles"
//! scripts = "scripts"
//! templates = "templates"
//! static = "static"          # Copied verbatim to build/static
//!
//! [markdown]
//! highlight_theme = "InspiredGitHub"
//! # highlight_background = "#3e4451"
//! line_numbers = true
//! emoji = true
//!
//! [page]
//! template = "default.html"
//! styles = ["default.css"]
//! scripts = ["default.js"]
//! placeholder_tag = "markdown"
//!
//! [output]
//! minify = true
//! include_drafts = false
//! pretty_urls = true
//!
//! [htmx]
//! enable = true
//! boost_links = true
//! source_url = "https://unpkg.com/htmx.org@2.0.4"
//!
//! [default_metadata]
//! author = "Jane"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::metadata::Metadata;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "goose.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `goose.toml`.
///
/// All fields have defaults. Config files need only specify the values they
/// want to override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Directory layout of the site sources and the build output.
    pub dirs: DirsConfig,
    /// Markdown rendering and syntax highlighting.
    pub markdown: MarkdownConfig,
    /// Template and asset defaults applied to pages that do not override them.
    pub page: PageConfig,
    /// Output policy: minification, drafts, URL layout.
    pub output: OutputConfig,
    /// htmx progressive enhancement.
    pub htmx: HtmxConfig,
    /// Parallel rendering settings.
    pub processing: ProcessingConfig,
    /// Metadata every page inherits unless its front matter overrides a key.
    pub default_metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirsConfig {
    pub source: PathBuf,
    pub build: PathBuf,
    pub pages: PathBuf,
    pub styles: PathBuf,
    pub scripts: PathBuf,
    pub templates: PathBuf,
    #[serde(rename = "static")]
    pub static_dir: PathBuf,
}

impl Default for DirsConfig {
    fn default() -> Self {
        Self {
            source: "source".into(),
            build: "build".into(),
            pages: "pages".into(),
            styles: "styles".into(),
            scripts: "scripts".into(),
            templates: "templates".into(),
            static_dir: "static".into(),
        }
    }
}

impl DirsConfig {
    pub fn pages_dir(&self) -> PathBuf {
        self.source.join(&self.pages)
    }

    pub fn styles_dir(&self) -> PathBuf {
        self.source.join(&self.styles)
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.source.join(&self.scripts)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.source.join(&self.templates)
    }

    pub fn static_source_dir(&self) -> PathBuf {
        self.source.join(&self.static_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkdownConfig {
    /// syntect theme name used for fenced code blocks.
    pub highlight_theme: String,
    /// Optional `#rrggbb` background overriding the theme's own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_background: Option<String>,
    /// Prefix highlighted code lines with line numbers.
    pub line_numbers: bool,
    /// Replace `:shortcode:` emoji in text.
    pub emoji: bool,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            highlight_theme: "InspiredGitHub".to_string(),
            highlight_background: None,
            line_numbers: true,
            emoji: true,
        }
    }
}

impl MarkdownConfig {
    /// The background override, if one is set and non-empty.
    pub fn background(&self) -> Option<&str> {
        self.highlight_background
            .as_deref()
            .filter(|bg| !bg.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageConfig {
    /// Template file (in the templates directory) used when a page names none.
    pub template: String,
    /// Stylesheets inlined into pages without a `styles` list.
    pub styles: Vec<String>,
    /// Scripts inlined into pages without a `scripts` list.
    pub scripts: Vec<String>,
    /// Element name in the template that is replaced by the page body.
    pub placeholder_tag: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            template: "default.html".to_string(),
            styles: vec!["default.css".to_string()],
            scripts: vec!["default.js".to_string()],
            placeholder_tag: "markdown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub minify: bool,
    pub include_drafts: bool,
    /// Write `page.md` as `page/index.html` instead of `page.html`.
    pub pretty_urls: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            minify: true,
            include_drafts: false,
            pretty_urls: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HtmxConfig {
    /// Add a `<script src=...>` for htmx to every page head.
    pub enable: bool,
    /// Mark every anchor with `hx-boost="true"`.
    pub boost_links: bool,
    pub source_url: String,
}

impl Default for HtmxConfig {
    fn default() -> Self {
        Self {
            enable: true,
            boost_links: true,
            source_url: "https://unpkg.com/htmx.org@2.0.4".to_string(),
        }
    }
}

impl HtmxConfig {
    /// The external script to reference, when htmx is enabled.
    pub fn script_url(&self) -> Option<&str> {
        self.enable.then_some(self.source_url.as_str())
    }
}

/// Parallel rendering settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of pages rendered in parallel.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

impl SiteConfig {
    /// Validate config values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dirs = [
            ("dirs.source", &self.dirs.source),
            ("dirs.build", &self.dirs.build),
            ("dirs.pages", &self.dirs.pages),
            ("dirs.styles", &self.dirs.styles),
            ("dirs.scripts", &self.dirs.scripts),
            ("dirs.templates", &self.dirs.templates),
            ("dirs.static", &self.dirs.static_dir),
        ];
        for (key, dir) in dirs {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        let tag = &self.page.placeholder_tag;
        if tag.is_empty() {
            return Err(ConfigError::Validation(
                "page.placeholder_tag must not be empty".into(),
            ));
        }
        if !tag.starts_with(|c: char| c.is_ascii_lowercase())
            || !tag
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ConfigError::Validation(format!(
                "page.placeholder_tag must be a lowercase element name, got {tag:?}"
            )));
        }
        if self.htmx.enable && self.htmx.source_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "htmx.source_url must be set when htmx.enable is true".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        match self.markdown.highlight_background.as_deref() {
            Some(bg) if bg.trim().is_empty() => {
                tracing::warn!(
                    "markdown.highlight_background is set but empty; using the theme background"
                );
            }
            Some(bg) if parse_hex_color(bg).is_none() => {
                return Err(ConfigError::Validation(format!(
                    "markdown.highlight_background must be #rgb or #rrggbb, got {bg:?}"
                )));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Parse `#rgb` or `#rrggbb` into its components.
pub fn parse_hex_color(value: &str) -> Option<(u8, u8, u8)> {
    let hex = value.trim().strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut parts = hex.chars().map(|c| channel(&format!("{c}{c}")));
            Some((parts.next()??, parts.next()??, parts.next()??))
        }
        6 => Some((channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
        _ => None,
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer every other layer is merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Find the config file to use when none was given explicitly.
pub fn find_config_file(cwd: &Path, home: Option<&Path>) -> Option<PathBuf> {
    let local = cwd.join(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    let global = home?.join(".goose").join(CONFIG_FILE_NAME);
    global.is_file().then_some(global)
}

/// Merge each layer in order onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(layers: impl IntoIterator<Item = toml::Value>) -> Result<SiteConfig, ConfigError> {
    let merged = layers
        .into_iter()
        .fold(stock_defaults_value(), merge_toml);
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the site config: stock defaults, then `config_file` if any, then the
/// command-line overlay.
pub fn load_config(
    config_file: Option<&Path>,
    cli_overlay: toml::Value,
) -> Result<SiteConfig, ConfigError> {
    let mut layers = Vec::with_capacity(2);
    match config_file {
        Some(path) => {
            tracing::info!("using config file {}", path.display());
            layers.push(load_raw_config(path)?);
        }
        None => tracing::info!("no {CONFIG_FILE_NAME} found, using defaults and flags"),
    }
    layers.push(cli_overlay);
    resolve_config(layers)
}

/// Returns a fully-commented stock `goose.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Goose Configuration
# ===================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Command-line flags override this file; this file overrides the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Directory layout
# ---------------------------------------------------------------------------
[dirs]
# Site sources and build output (relative to the working directory).
source = "source"
build = "build"

# The remaining directories are relative to `source`.
pages = "pages"
styles = "styles"
scripts = "scripts"
templates = "templates"
# Copied verbatim to <build>/static.
static = "static"

# ---------------------------------------------------------------------------
# Markdown rendering
# ---------------------------------------------------------------------------
[markdown]
# Any theme bundled with syntect, e.g. "InspiredGitHub", "base16-ocean.dark",
# "Solarized (light)".
highlight_theme = "InspiredGitHub"

# Override the theme's code block background.
# highlight_background = "#3e4451"

line_numbers = true

# Replace :shortcode: emoji in page text.
emoji = true

# ---------------------------------------------------------------------------
# Page defaults (a page's front matter may override template/styles/scripts)
# ---------------------------------------------------------------------------
[page]
template = "default.html"
styles = ["default.css"]
scripts = ["default.js"]

# The template element replaced by the rendered page body: <markdown></markdown>
placeholder_tag = "markdown"

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
minify = true

# Pages with `draft: true` are skipped unless this is set.
include_drafts = false

# Write page.md as page/index.html instead of page.html.
pretty_urls = true

# ---------------------------------------------------------------------------
# htmx
# ---------------------------------------------------------------------------
[htmx]
enable = true
# Adds hx-boost="true" to every link.
boost_links = true
source_url = "https://unpkg.com/htmx.org@2.0.4"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum pages rendered in parallel.
# Omit to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Metadata inherited by every page
# ---------------------------------------------------------------------------
[default_metadata]
# author = "Jane Doe"
"##
}
