//! Site generation.
//!
//! One run turns the pages directory into the build directory:
//!
//! ```text
//! source/                          build/
//! ├── pages/                       ├── index.html
//! │   ├── index.md          ──►    ├── about/index.html
//! │   └── about.md                 └── static/...
//! ├── styles/  scripts/  templates/    (inlined into pages)
//! └── static/                  ──►  copied verbatim
//! ```
//!
//! ## Phases
//!
//! 1. **Reset**: once the renderer is configured and the pages directory has
//!    been scanned, the build directory is removed and recreated, then the
//!    static directory is copied into it. There is no atomic publish; readers
//!    of the build directory during a run see a partial tree.
//! 2. **Plan**: every page is read once, its metadata resolved and its output
//!    path planned, sequentially and against the complete page set, so
//!    collision decisions never depend on processing order.
//! 3. **Build**: planned pages are rendered, composed, minified and written in
//!    parallel on the rayon pool. Planned destinations are distinct, so no two
//!    workers write the same file.
//!
//! ## Failures
//!
//! A page that cannot be read, minified or written is reported and skipped
//! ([`PageError`]); the run goes on. A [`GenerateError`] aborts the run: a
//! missing pages directory or an unusable build directory (both detected
//! before anything is deleted), a failed static copy, or an asset or
//! template that disappeared between its existence check and its read.
//!
//! Progress goes to the optional event channel as [`BuildEvent`]s;
//! diagnostics go through `tracing`.

use crate::assets::{self, AssetError, AssetKind};
use crate::compose::{self, ComposeError, Composition};
use crate::config::{DirsConfig, SiteConfig};
use crate::markdown::{MarkdownRenderer, RenderError};
use crate::metadata::{self, Metadata};
use crate::minify::{HtmlMinifier, MinifyError, Minifier};
use crate::placeholders::{self, Scope};
use crate::plan::{OutputPlan, PlanError, Planner, SkipReason};
use crate::scan::{self, PageTree, ScanError};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

/// Errors that abort the whole run.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("refusing to use build directory {build}: it overlaps the source directory {source_dir}")]
    UnsafeBuildDir { build: PathBuf, source_dir: PathBuf },
    #[error("cannot create build directory {path}: {source}")]
    BuildDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot copy static files to {path}: {source}")]
    StaticCopy {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
}

/// Errors that skip one page.
#[derive(Error, Debug)]
pub enum PageError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("minification failed: {0}")]
    Minify(#[from] MinifyError),
    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// Per-page progress, in completion order.
#[derive(Debug)]
pub enum BuildEvent {
    Generated { source: PathBuf, output: PathBuf },
    Skipped { source: PathBuf, reason: SkipReason },
    Failed { source: PathBuf, error: String },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// A page that survived planning.
#[derive(Debug)]
pub struct PlannedPage {
    /// Relative to the pages root.
    pub source: PathBuf,
    pub text: String,
    pub metadata: Metadata,
    pub output: PathBuf,
}

/// Result of the planning phase.
#[derive(Debug, Default)]
pub struct SitePlan {
    pub pages: Vec<PlannedPage>,
    pub skipped: Vec<(PathBuf, SkipReason)>,
    pub failed: Vec<(PathBuf, PageError)>,
}

/// Run a full build with the minifier chosen by `output.minify`.
pub fn generate(
    config: &SiteConfig,
    events: Option<Sender<BuildEvent>>,
) -> Result<Summary, GenerateError> {
    let minifier = HtmlMinifier::new();
    let minifier = config
        .output
        .minify
        .then_some(&minifier as &dyn Minifier);
    generate_with(config, minifier, events)
}

/// Run a full build with an explicit minifier (`None` disables it).
pub fn generate_with(
    config: &SiteConfig,
    minifier: Option<&dyn Minifier>,
    events: Option<Sender<BuildEvent>>,
) -> Result<Summary, GenerateError> {
    let renderer = MarkdownRenderer::new(&config.markdown)?;
    let tree = scan::scan(&config.dirs.pages_dir())?;

    reset_build_dir(&config.dirs)?;
    copy_static(&config.dirs.static_source_dir(), &config.dirs.build.join("static"))?;

    let plan = plan_site(config, &tree);

    let emit = |event: BuildEvent| {
        if let Some(tx) = &events {
            tx.send(event).ok();
        }
    };

    let summary = Summary {
        skipped: plan.skipped.len(),
        failed: plan.failed.len(),
        ..Summary::default()
    };
    for (source, reason) in plan.skipped {
        emit(BuildEvent::Skipped { source, reason });
    }
    for (source, error) in plan.failed {
        tracing::error!("{}: {error}", source.display());
        emit(BuildEvent::Failed {
            source,
            error: error.to_string(),
        });
    }

    let ctx = PageContext {
        config,
        renderer: &renderer,
        minifier,
        pages_root: tree.root(),
        fallback_template: compose::fallback_template(&config.page.placeholder_tag),
    };
    let generated = AtomicUsize::new(0);
    let failed = AtomicUsize::new(summary.failed);

    plan.pages.par_iter().try_for_each(|page| {
        match build_page(page, &ctx) {
            Ok(()) => {
                generated.fetch_add(1, Ordering::Relaxed);
                emit(BuildEvent::Generated {
                    source: page.source.clone(),
                    output: page.output.clone(),
                });
            }
            Err(PageFailure::Skip(error)) => {
                failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!("{}: {error}", page.source.display());
                emit(BuildEvent::Failed {
                    source: page.source.clone(),
                    error: error.to_string(),
                });
            }
            Err(PageFailure::Abort(error)) => return Err(error),
        }
        Ok(())
    })?;

    Ok(Summary {
        generated: generated.into_inner(),
        failed: failed.into_inner(),
        ..summary
    })
}

/// Read every page, resolve its metadata and plan its output path.
///
/// Writes nothing; `goose check` prints the result as is.
pub fn plan_site(config: &SiteConfig, tree: &PageTree) -> SitePlan {
    let planner = Planner {
        tree,
        build_root: &config.dirs.build,
        pretty_urls: config.output.pretty_urls,
        include_drafts: config.output.include_drafts,
    };

    let mut plan = SitePlan::default();
    for relative in tree.pages() {
        let path = tree.absolute(relative);
        let text = match fs::read(&path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(source) => {
                plan.failed
                    .push((relative.clone(), PageError::Read { path, source }));
                continue;
            }
        };
        let metadata = metadata::resolve(&text, &config.default_metadata);

        match planner.plan(relative, metadata::is_draft(&metadata)) {
            Ok(OutputPlan::Write(output)) => plan.pages.push(PlannedPage {
                source: relative.clone(),
                text,
                metadata,
                output,
            }),
            Ok(OutputPlan::Skip(reason)) => plan.skipped.push((relative.clone(), reason)),
            Err(err) => plan.failed.push((relative.clone(), err.into())),
        }
    }
    plan
}

// ============================================================================
// Per-page pipeline
// ============================================================================

struct PageContext<'a> {
    config: &'a SiteConfig,
    renderer: &'a MarkdownRenderer,
    minifier: Option<&'a dyn Minifier>,
    pages_root: &'a Path,
    fallback_template: String,
}

enum PageFailure {
    Skip(PageError),
    Abort(GenerateError),
}

impl From<AssetError> for PageFailure {
    fn from(err: AssetError) -> Self {
        PageFailure::Abort(err.into())
    }
}

impl From<ComposeError> for PageFailure {
    fn from(err: ComposeError) -> Self {
        PageFailure::Abort(err.into())
    }
}

impl PageFailure {
    fn skip(err: impl Into<PageError>) -> Self {
        PageFailure::Skip(err.into())
    }
}

fn build_page(page: &PlannedPage, ctx: &PageContext<'_>) -> Result<(), PageFailure> {
    let config = ctx.config;
    let meta = &page.metadata;

    let rendered = ctx.renderer.render(&page.text);
    let source_dir = ctx.pages_root.join(page.source.parent().unwrap_or(Path::new("")));
    let body = placeholders::substitute(
        &rendered,
        meta,
        &config.default_metadata,
        Scope {
            current_dir: &source_dir,
            root_dir: ctx.pages_root,
        },
    );

    let styles = assets::resolve_assets(
        meta,
        AssetKind::Style,
        &config.dirs.styles_dir(),
        &config.page.styles,
    )?;
    let scripts = assets::resolve_assets(
        meta,
        AssetKind::Script,
        &config.dirs.scripts_dir(),
        &config.page.scripts,
    )?;
    let template = assets::resolve_template(meta, &config.dirs.templates_dir(), &config.page.template)?;

    let css = assets::stylesheet(&styles);
    let title = metadata::title(meta);
    let html = compose::compose(
        template.as_deref().unwrap_or(&ctx.fallback_template),
        &Composition {
            title: &title,
            css: &css,
            scripts: &scripts,
            external_script: config.htmx.script_url(),
            boost_links: config.htmx.boost_links,
            body: &body,
            placeholder_tag: &config.page.placeholder_tag,
        },
    )?;

    let html = match ctx.minifier {
        Some(minifier) => minifier.minify(&html).map_err(PageFailure::skip)?,
        None => html,
    };

    if let Some(parent) = page.output.parent() {
        fs::create_dir_all(parent).map_err(|source| {
            PageFailure::skip(PageError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })
        })?;
    }
    fs::write(&page.output, html).map_err(|source| {
        PageFailure::skip(PageError::Write {
            path: page.output.clone(),
            source,
        })
    })?;
    Ok(())
}

// ============================================================================
// Build directory
// ============================================================================

/// Refuse a build directory that contains the source tree or sits inside
/// one of the directories pages and assets are read from.
fn check_build_dir(dirs: &DirsConfig) -> Result<(), GenerateError> {
    let build = real_path(&dirs.build);
    let unsafe_dir = |source_dir: PathBuf| GenerateError::UnsafeBuildDir {
        build: dirs.build.clone(),
        source_dir,
    };

    if real_path(&dirs.source).starts_with(&build) {
        return Err(unsafe_dir(dirs.source.clone()));
    }
    let inputs = [
        dirs.pages_dir(),
        dirs.static_source_dir(),
        dirs.styles_dir(),
        dirs.scripts_dir(),
        dirs.templates_dir(),
    ];
    for input in inputs {
        let real = real_path(&input);
        if real.starts_with(&build) || build.starts_with(&real) {
            return Err(unsafe_dir(input));
        }
    }
    Ok(())
}

/// Canonicalize the longest existing prefix of `path`, keeping the rest.
fn real_path(path: &Path) -> PathBuf {
    if let Ok(real) = path.canonicalize() {
        return real;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            real_path(parent).join(name)
        }
        _ => path.to_path_buf(),
    }
}

fn reset_build_dir(dirs: &DirsConfig) -> Result<(), GenerateError> {
    check_build_dir(dirs)?;
    let build = &dirs.build;
    if build.exists()
        && let Err(err) = fs::remove_dir_all(build)
    {
        tracing::warn!("could not clear build directory {}: {err}", build.display());
    }
    fs::create_dir_all(build).map_err(|source| GenerateError::BuildDir {
        path: build.to_path_buf(),
        source,
    })
}

/// Copy `src` recursively into `dst`. A missing `src` copies nothing.
fn copy_static(src: &Path, dst: &Path) -> Result<(), GenerateError> {
    if !src.is_dir() {
        tracing::debug!("no static directory at {}", src.display());
        return Ok(());
    }
    let fail = |path: &Path, source: std::io::Error| GenerateError::StaticCopy {
        path: path.to_path_buf(),
        source,
    };

    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|err| fail(dst, err.into()))?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|err| fail(&target, err))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|err| fail(&target, err))?;
        }
    }
    Ok(())
}
