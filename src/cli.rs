//! Command-line interface for par-markdown.
//!
//! `render` turns a markdown file into HTML with its diagrams drawn,
//! `export` writes one diagram block as SVG or PNG, and `config` manages the
//! configuration file.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;

use crate::config::RenderConfig;
use crate::diagram::DiagramStatus;
use crate::export::ExportFormat;
use crate::renderer::DocumentRenderer;

/// par-markdown - Markdown to HTML with cached diagram blocks
#[derive(Parser)]
#[command(name = "par-markdown")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Use this config file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Set debug log level (overrides RUST_LOG)
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevelArg>,
}

/// Log level argument for CLI
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LogLevelArg {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevelArg {
    /// Convert to `log::LevelFilter`
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevelArg::Off => log::LevelFilter::Off,
            LogLevelArg::Error => log::LevelFilter::Error,
            LogLevelArg::Warn => log::LevelFilter::Warn,
            LogLevelArg::Info => log::LevelFilter::Info,
            LogLevelArg::Debug => log::LevelFilter::Debug,
            LogLevelArg::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Export format argument for CLI
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum FormatArg {
    Png,
    Svg,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Png => ExportFormat::Png,
            FormatArg::Svg => ExportFormat::Svg,
        }
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Render a markdown file (or `-` for stdin) to HTML
    Render {
        input: PathBuf,

        /// Document id used for the diagram cache (defaults to the input path)
        #[arg(long)]
        id: Option<String>,

        /// Write HTML here instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Leave diagram blocks as source
        #[arg(long)]
        no_diagrams: bool,

        /// Wrap the fragment in a complete HTML page
        #[arg(long)]
        standalone: bool,
    },

    /// Export one diagram block of a markdown file
    Export {
        input: PathBuf,

        /// Block position (ordinal among all fenced blocks, from 0)
        #[arg(long)]
        block: usize,

        #[arg(long, value_enum, default_value = "svg")]
        format: FormatArg,

        /// Directory to write into (defaults to the configured export dir)
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
    },

    /// Show or create the configuration file
    Config {
        /// Print the config file path
        #[arg(long)]
        path: bool,

        /// Write the default config if none exists
        #[arg(long)]
        init: bool,
    },
}

/// Runtime options passed from CLI to the command runner
#[derive(Clone, Debug)]
pub struct RuntimeOptions {
    pub command: Commands,
    /// Explicit config file
    pub config_path: Option<PathBuf>,
    /// Log level override from CLI
    pub log_level: Option<log::LevelFilter>,
}

/// Result of CLI processing
pub enum CliResult {
    /// Run a rendering command with these options
    Continue(RuntimeOptions),
    /// Exit with the given code (subcommand completed)
    Exit(i32),
}

/// Process CLI arguments and handle subcommands that need no runtime
pub fn process_cli() -> CliResult {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { path, init } => {
            let result = config_command(cli.config.as_deref(), path, init);
            if let Err(e) = &result {
                eprintln!("par-markdown: error: {e:#}");
            }
            CliResult::Exit(if result.is_ok() { 0 } else { 1 })
        }
        command => CliResult::Continue(RuntimeOptions {
            command,
            config_path: cli.config,
            log_level: cli.log_level.map(|l| l.to_level_filter()),
        }),
    }
}

fn config_command(explicit: Option<&Path>, show_path: bool, init: bool) -> anyhow::Result<()> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(RenderConfig::config_path);

    if init {
        if path.exists() {
            println!("Config already exists: {}", path.display());
        } else {
            RenderConfig::default().save_to(&path)?;
            println!("Wrote default config to {}", path.display());
        }
    }
    if show_path || !init {
        println!("{}", path.display());
    }
    Ok(())
}

/// Load the config named on the command line, or the default one.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<RenderConfig> {
    match explicit {
        Some(path) => RenderConfig::load_from(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => RenderConfig::load().or_else(|e| {
            log::warn!("Using default config: {e:#}");
            Ok(RenderConfig::default())
        }),
    }
}

/// Execute a `render` or `export` command.
pub fn run(options: RuntimeOptions, runtime: &Runtime) -> anyhow::Result<()> {
    let mut config = load_config(options.config_path.as_deref())?;

    match options.command {
        Commands::Render {
            input,
            id,
            output,
            no_diagrams,
            standalone,
        } => {
            if no_diagrams {
                config.diagrams.enabled = false;
            }
            let text = read_input(&input)?;
            let id = id.unwrap_or_else(|| input.display().to_string());
            let renderer = DocumentRenderer::new(config);
            let rendered = render_resolved(&renderer, &text, &id, runtime);
            report_failures(&renderer, &id, &rendered);

            let html = if standalone {
                standalone_page(&id, &rendered.html)
            } else {
                rendered.html
            };
            match output {
                Some(path) => std::fs::write(&path, html)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => io::stdout().write_all(html.as_bytes())?,
            }
            Ok(())
        }
        Commands::Export {
            input,
            block,
            format,
            out_dir,
        } => {
            let text = read_input(&input)?;
            let id = input.display().to_string();
            let dir = out_dir.unwrap_or_else(|| config.export.resolved_output_dir());
            let renderer = DocumentRenderer::new(config);
            let rendered = render_resolved(&renderer, &text, &id, runtime);
            report_failures(&renderer, &id, &rendered);

            let file = renderer.export_to(&id, block, format.into(), &dir)?;
            println!("{}", file.path.display());
            Ok(())
        }
        Commands::Config { .. } => Ok(()),
    }
}

fn read_input(input: &Path) -> anyhow::Result<String> {
    if input.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))
}

/// HTML after every queued diagram has been drawn.
pub struct ResolvedRender {
    pub html: String,
    /// Positions whose render failed.
    pub failed: Vec<usize>,
}

/// Render, run the queued diagrams concurrently, then render again so the
/// finished markup is embedded from the cache.
pub fn render_resolved(
    renderer: &DocumentRenderer,
    text: &str,
    document_id: &str,
    runtime: &Runtime,
) -> ResolvedRender {
    let first = renderer.render(text, document_id);
    let mut rx = renderer.spawn_pending(document_id, runtime.handle());

    let failed = runtime.block_on(async {
        let mut failed = Vec::new();
        while let Some(patch) = rx.recv().await {
            if patch.status == DiagramStatus::Failed {
                failed.push(patch.position);
            }
        }
        failed
    });

    let html = if renderer
        .cache_stats(document_id)
        .is_some_and(|stats| stats.entry_count > 0)
    {
        renderer.render(text, document_id)
    } else {
        first
    };
    ResolvedRender { html, failed }
}

fn report_failures(renderer: &DocumentRenderer, document_id: &str, rendered: &ResolvedRender) {
    for position in &rendered.failed {
        let reason = renderer
            .store()
            .with_existing(document_id, |state| {
                state.cache.get(*position).and_then(|e| e.error.clone())
            })
            .flatten()
            .unwrap_or_else(|| "unknown error".to_string());
        eprintln!("par-markdown: diagram block {position} failed: {reason}");
    }
}

fn standalone_page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{body}</body>\n</html>\n",
        crate::markdown::html::escape_html(title)
    )
}
