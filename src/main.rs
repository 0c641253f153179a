use clap::{Parser, Subcommand};
use goose::{config, generate, output, scan};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Shared flags for commands that plan output paths.
#[derive(clap::Args, Clone, Default)]
struct PlanArgs {
    /// Build pages marked `draft: true`
    #[arg(long)]
    drafts: bool,

    /// Write `page.html` instead of `page/index.html`
    #[arg(long)]
    flat_urls: bool,
}

#[derive(Parser)]
#[command(name = "goose")]
#[command(about = "Static site generator: Markdown pages composed into HTML templates")]
#[command(long_about = "\
Static site generator: Markdown pages composed into HTML templates

Site structure:

  source/
  ├── pages/                       # Markdown pages → build/ (mirrored)
  │   ├── index.md                 # → build/index.html
  │   ├── about.md                 # → build/about/index.html
  │   └── blog/
  │       ├── index.md             # → build/blog/index.html
  │       └── first-post.md        # → build/blog/first-post/index.html
  ├── styles/default.css           # Inlined into every page's <head>
  ├── scripts/default.js
  ├── templates/default.html       # <markdown></markdown> marks the body
  └── static/                      # Copied verbatim to build/static

Front matter (all keys optional):

  ---
  title: Hello                     # <title>, and {{ .meta.title }}
  styles: [blog, code]             # styles/blog.css, styles/code.css
  scripts: [search]
  template: wide                   # templates/wide.html
  draft: true                      # skipped unless --drafts
  ---

Page bodies may reference metadata: {{ .meta.KEY }} for the page itself,
{{ from ../other .meta.KEY }} for another page under pages/.

Run 'goose gen-config' to generate a documented goose.toml.")]
#[command(version)]
struct Cli {
    /// Site source directory [default: source]
    #[arg(short, long, global = true)]
    source: Option<PathBuf>,

    /// Output directory, cleared on every build [default: build]
    #[arg(short, long, global = true)]
    build: Option<PathBuf>,

    /// Config file [default: ./goose.toml, then ~/.goose/goose.toml]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the site
    Generate {
        #[command(flatten)]
        plan: PlanArgs,

        /// Write pages without minifying them
        #[arg(long)]
        no_minify: bool,
    },
    /// Show where every page would be written, without building
    Check(PlanArgs),
    /// Print a stock goose.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("goose=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::Generate { plan, no_minify } => {
            let site_config = load_config(&cli, plan, *no_minify)?;
            init_thread_pool(&site_config.processing);

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_build_event(&event);
                }
            });
            let result = generate::generate(&site_config, Some(tx));
            printer.join().ok();

            let summary = result?;
            output::print_summary(&summary);
        }
        Command::Check(plan) => {
            let site_config = load_config(&cli, plan, false)?;
            let tree = scan::scan(&site_config.dirs.pages_dir())?;
            let site_plan = generate::plan_site(&site_config, &tree);
            output::print_plan(&site_plan);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn load_config(
    cli: &Cli,
    plan: &PlanArgs,
    no_minify: bool,
) -> Result<config::SiteConfig, config::ConfigError> {
    let config_file = match &cli.config {
        Some(path) => Some(path.clone()),
        None => {
            let cwd = std::env::current_dir().map_err(|source| config::ConfigError::Io {
                path: PathBuf::from("."),
                source,
            })?;
            let home = std::env::var_os("HOME").map(PathBuf::from);
            config::find_config_file(&cwd, home.as_deref())
        }
    };
    config::load_config(
        config_file.as_deref(),
        cli_overlay(cli.source.as_deref(), cli.build.as_deref(), plan, no_minify),
    )
}

/// Command-line flags as a config layer. Only flags actually given appear,
/// so an absent flag never masks the config file.
fn cli_overlay(
    source: Option<&Path>,
    build: Option<&Path>,
    plan: &PlanArgs,
    no_minify: bool,
) -> toml::Value {
    let path_value = |p: &Path| toml::Value::String(p.to_string_lossy().into_owned());

    let mut dirs = toml::Table::new();
    if let Some(source) = source {
        dirs.insert("source".into(), path_value(source));
    }
    if let Some(build) = build {
        dirs.insert("build".into(), path_value(build));
    }

    let mut out = toml::Table::new();
    if plan.drafts {
        out.insert("include_drafts".into(), toml::Value::Boolean(true));
    }
    if plan.flat_urls {
        out.insert("pretty_urls".into(), toml::Value::Boolean(false));
    }
    if no_minify {
        out.insert("minify".into(), toml::Value::Boolean(false));
    }

    let mut overlay = toml::Table::new();
    if !dirs.is_empty() {
        overlay.insert("dirs".into(), toml::Value::Table(dirs));
    }
    if !out.is_empty() {
        overlay.insert("output".into(), toml::Value::Table(out));
    }
    toml::Value::Table(overlay)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
