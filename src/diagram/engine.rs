//! Diagram engines: turn diagram source into SVG markup.
//!
//! Backends, selected by `diagrams.engine`:
//!
//! - **Native**: pure-Rust mermaid rendering via `mermaid-rs-renderer`
//!   (mermaid only, no external tools).
//! - **Local CLI**: runs a local tool (`mmdc`, `plantuml`, `dot`, `d2`) with
//!   SVG output.
//! - **Kroki**: POSTs the source to a Kroki server and reads SVG back.
//! - **Auto**: native, then local CLI, then Kroki; first success wins.
//! - **Disabled**: every render fails, so diagram blocks show their source.
//!
//! Engines are explicit-invocation only. The scheduler calls them outside
//! any document lock, from blocking worker threads.

use std::io::Write;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::process::{Command, Stdio};
use std::sync::{Arc, OnceLock};

use par_markdown_config::{DiagramConfig, DiagramEngineKind};
use thiserror::Error;

use super::languages::DiagramLanguage;

/// Why a diagram engine could not produce markup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiagramError {
    /// The diagram source is not valid for its grammar.
    #[error("diagram parse error: {0}")]
    Parse(String),
    /// The engine cannot draw this language.
    #[error("{engine} engine does not support {language}")]
    Unsupported { engine: String, language: String },
    /// A local tool was missing or exited unsuccessfully.
    #[error("command `{command}` failed: {reason}")]
    CommandFailed { command: String, reason: String },
    /// The Kroki request failed.
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },
    /// The engine reported success but produced nothing.
    #[error("engine produced empty output")]
    EmptyOutput,
    /// Diagram rendering is turned off.
    #[error("diagram rendering is disabled")]
    Disabled,
}

/// Converts diagram source into displayable SVG markup.
pub trait DiagramEngine: Send + Sync {
    fn render(&self, source: &str, language: &DiagramLanguage) -> Result<String, DiagramError>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> DiagramEngine for F
where
    F: Fn(&str, &DiagramLanguage) -> Result<String, DiagramError> + Send + Sync,
{
    fn render(&self, source: &str, language: &DiagramLanguage) -> Result<String, DiagramError> {
        self(source, language)
    }
}

fn non_empty(markup: String) -> Result<String, DiagramError> {
    if markup.trim().is_empty() {
        Err(DiagramError::EmptyOutput)
    } else {
        Ok(markup)
    }
}

// ---------------------------------------------------------------------------
// Native mermaid
// ---------------------------------------------------------------------------

/// Renders mermaid natively using `mermaid-rs-renderer`.
#[cfg(feature = "mermaid")]
pub struct NativeMermaidEngine {
    theme: mermaid_rs_renderer::Theme,
}

#[cfg(feature = "mermaid")]
impl NativeMermaidEngine {
    pub fn new(config: &par_markdown_config::DiagramThemeConfig) -> Self {
        Self {
            theme: super::svg_utils::mermaid_theme(config),
        }
    }
}

#[cfg(feature = "mermaid")]
impl DiagramEngine for NativeMermaidEngine {
    fn render(&self, source: &str, language: &DiagramLanguage) -> Result<String, DiagramError> {
        if !language.is_mermaid() {
            return Err(DiagramError::Unsupported {
                engine: self.name().to_string(),
                language: language.tag.clone(),
            });
        }

        let opts = mermaid_rs_renderer::RenderOptions {
            theme: self.theme.clone(),
            layout: mermaid_rs_renderer::LayoutConfig::default(),
        };

        // A layout panic on hostile input must stay confined to this block.
        let rendered = catch_unwind(AssertUnwindSafe(|| {
            mermaid_rs_renderer::render_with_options(source, opts)
        }))
        .map_err(|_| DiagramError::Parse("mermaid renderer panicked".to_string()))?;

        match rendered {
            Ok(svg) => {
                crate::debug_info!("DIAGRAM", "Native Mermaid SVG generated ({} bytes)", svg.len());
                non_empty(svg)
            }
            Err(e) => {
                crate::debug_info!("DIAGRAM", "Native Mermaid render failed: {e}");
                Err(DiagramError::Parse(e.to_string()))
            }
        }
    }

    fn name(&self) -> &str {
        "native"
    }
}

// ---------------------------------------------------------------------------
// Local CLI
// ---------------------------------------------------------------------------

/// Renders diagrams by running the language's local CLI tool.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalCliEngine;

impl DiagramEngine for LocalCliEngine {
    /// Some tools (like `mmdc`) don't support stdout piping and require file
    /// output, so `/dev/stdin` / `/dev/stdout` placeholders in the argument
    /// list are swapped for files in a scratch directory that is removed when
    /// this call returns. Without placeholders the source is piped through
    /// stdin and the SVG read from stdout.
    fn render(&self, source: &str, language: &DiagramLanguage) -> Result<String, DiagramError> {
        let Some(cmd) = language.local_command.as_deref() else {
            return Err(DiagramError::Unsupported {
                engine: self.name().to_string(),
                language: language.tag.clone(),
            });
        };
        let failed = |reason: String| DiagramError::CommandFailed {
            command: cmd.to_string(),
            reason,
        };

        let scratch = tempfile::tempdir().map_err(|e| failed(e.to_string()))?;
        let input_path = scratch.path().join("input.txt");
        let output_path = scratch.path().join("output.svg");

        let uses_input_file = language.local_args.iter().any(|a| a == "/dev/stdin");
        let uses_output_file = language.local_args.iter().any(|a| a == "/dev/stdout");

        if uses_input_file {
            std::fs::write(&input_path, source).map_err(|e| failed(e.to_string()))?;
        }

        let args: Vec<String> = language
            .local_args
            .iter()
            .map(|a| match a.as_str() {
                "/dev/stdin" => input_path.to_string_lossy().into_owned(),
                "/dev/stdout" => output_path.to_string_lossy().into_owned(),
                other => other.to_string(),
            })
            .collect();

        let mut child = Command::new(cmd)
            .args(&args)
            .stdin(if uses_input_file {
                Stdio::null()
            } else {
                Stdio::piped()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| failed(e.to_string()))?;

        // Feed stdin from its own thread so a tool that writes before it has
        // read everything cannot fill both pipes.
        let writer = child.stdin.take().map(|mut stdin| {
            let input = source.to_owned();
            std::thread::spawn(move || stdin.write_all(input.as_bytes()))
        });

        let output = child.wait_with_output().map_err(|e| failed(e.to_string()))?;
        match writer.map(|w| w.join()) {
            Some(Ok(Err(e))) => {
                crate::debug_log!("DIAGRAM", "{cmd} stopped reading its input: {e}");
            }
            Some(Err(_)) => return Err(failed("stdin writer panicked".to_string())),
            _ => {}
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!("{}: {}", output.status, stderr.trim())));
        }

        let svg = if uses_output_file {
            std::fs::read_to_string(&output_path).map_err(|e| failed(e.to_string()))?
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };
        crate::debug_info!("DIAGRAM", "{cmd} produced {} bytes of SVG", svg.len());
        non_empty(svg)
    }

    fn name(&self) -> &str {
        "local"
    }
}

// ---------------------------------------------------------------------------
// Kroki
// ---------------------------------------------------------------------------

/// Renders diagrams through the Kroki HTTP API.
#[derive(Debug, Clone)]
pub struct KrokiEngine {
    server: String,
}

impl KrokiEngine {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into().trim_end_matches('/').to_string(),
        }
    }
}

impl DiagramEngine for KrokiEngine {
    fn render(&self, source: &str, language: &DiagramLanguage) -> Result<String, DiagramError> {
        let Some(kroki_type) = language.kroki_type.as_deref() else {
            return Err(DiagramError::Unsupported {
                engine: self.name().to_string(),
                language: language.tag.clone(),
            });
        };
        let url = format!("{}/{kroki_type}/svg", self.server);
        let network = |reason: String| DiagramError::Network {
            url: url.clone(),
            reason,
        };

        // ureq may panic if TLS provider isn't available at runtime;
        // catch_unwind ensures we fall back gracefully instead of crashing.
        let result = catch_unwind(AssertUnwindSafe(|| -> Result<String, String> {
            let response = ureq::post(&url)
                .header("Content-Type", "text/plain")
                .header("Accept", "image/svg+xml")
                .send(source.as_bytes())
                .map_err(|e| e.to_string())?;
            response
                .into_body()
                .read_to_string()
                .map_err(|e| e.to_string())
        }))
        .map_err(|_| network("HTTP client panicked".to_string()))?;

        non_empty(result.map_err(network)?)
    }

    fn name(&self) -> &str {
        "kroki"
    }
}

// ---------------------------------------------------------------------------
// Auto / disabled
// ---------------------------------------------------------------------------

/// Tries each engine in order; the first success wins.
pub struct AutoEngine {
    engines: Vec<Box<dyn DiagramEngine>>,
}

impl AutoEngine {
    pub fn new(engines: Vec<Box<dyn DiagramEngine>>) -> Self {
        Self { engines }
    }
}

impl DiagramEngine for AutoEngine {
    fn render(&self, source: &str, language: &DiagramLanguage) -> Result<String, DiagramError> {
        let mut last_error = DiagramError::Unsupported {
            engine: self.name().to_string(),
            language: language.tag.clone(),
        };
        for engine in &self.engines {
            match engine.render(source, language) {
                Ok(svg) => return Ok(svg),
                Err(e) => {
                    crate::debug_log!(
                        "DIAGRAM",
                        "{} engine failed for {}: {e}",
                        engine.name(),
                        language.tag
                    );
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    fn name(&self) -> &str {
        "auto"
    }
}

/// Engine used when diagram rendering is turned off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledEngine;

impl DiagramEngine for DisabledEngine {
    fn render(&self, _source: &str, _language: &DiagramLanguage) -> Result<String, DiagramError> {
        Err(DiagramError::Disabled)
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

/// Construct the engine selected by `config`.
pub fn build_engine(config: &DiagramConfig) -> Arc<dyn DiagramEngine> {
    let kind = if config.enabled {
        config.engine
    } else {
        DiagramEngineKind::Disabled
    };
    crate::debug_info!("DIAGRAM", "Building {kind:?} diagram engine");

    match kind {
        DiagramEngineKind::Disabled => Arc::new(DisabledEngine),
        DiagramEngineKind::Local => Arc::new(LocalCliEngine),
        DiagramEngineKind::Kroki => Arc::new(KrokiEngine::new(&config.kroki_server)),
        #[cfg(feature = "mermaid")]
        DiagramEngineKind::Native => Arc::new(NativeMermaidEngine::new(&config.theme)),
        #[cfg(not(feature = "mermaid"))]
        DiagramEngineKind::Native => {
            crate::debug_error!("DIAGRAM", "Built without the `mermaid` feature");
            Arc::new(DisabledEngine)
        }
        DiagramEngineKind::Auto => {
            let mut engines: Vec<Box<dyn DiagramEngine>> = Vec::new();
            #[cfg(feature = "mermaid")]
            engines.push(Box::new(NativeMermaidEngine::new(&config.theme)));
            engines.push(Box::new(LocalCliEngine));
            engines.push(Box::new(KrokiEngine::new(&config.kroki_server)));
            Arc::new(AutoEngine::new(engines))
        }
    }
}

static SHARED_ENGINE: OnceLock<Arc<dyn DiagramEngine>> = OnceLock::new();

/// Process-wide engine, built once from the first configuration seen.
///
/// Later calls return the same instance regardless of `config`; hosts that
/// need a different engine pass one to `DocumentRenderer::with_engine`.
pub fn shared_engine(config: &DiagramConfig) -> Arc<dyn DiagramEngine> {
    SHARED_ENGINE.get_or_init(|| build_engine(config)).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::languages::default_diagram_languages;

    fn language(tag: &str) -> DiagramLanguage {
        default_diagram_languages()
            .into_iter()
            .find(|l| l.tag == tag)
            .unwrap()
    }

    #[test]
    fn test_closure_engine() {
        let engine = |source: &str, _: &DiagramLanguage| -> Result<String, DiagramError> {
            Ok(format!("<svg>{source}</svg>"))
        };
        assert_eq!(
            engine.render("A", &language("mermaid")).unwrap(),
            "<svg>A</svg>"
        );
        assert_eq!(DiagramEngine::name(&engine), "custom");
    }

    #[test]
    fn test_disabled_engine() {
        assert_eq!(
            DisabledEngine.render("graph TD", &language("mermaid")),
            Err(DiagramError::Disabled)
        );
    }

    #[test]
    fn test_auto_engine_falls_through() {
        let failing = |_: &str, l: &DiagramLanguage| -> Result<String, DiagramError> {
            Err(DiagramError::Unsupported {
                engine: "first".into(),
                language: l.tag.clone(),
            })
        };
        let working =
            |_: &str, _: &DiagramLanguage| -> Result<String, DiagramError> { Ok("<svg/>".into()) };
        let auto = AutoEngine::new(vec![Box::new(failing), Box::new(working)]);
        assert_eq!(auto.render("x", &language("d2")).unwrap(), "<svg/>");
    }

    #[test]
    fn test_auto_engine_reports_last_error() {
        let failing = |_: &str, _: &DiagramLanguage| -> Result<String, DiagramError> {
            Err(DiagramError::EmptyOutput)
        };
        let auto = AutoEngine::new(vec![Box::new(failing)]);
        assert_eq!(
            auto.render("x", &language("d2")),
            Err(DiagramError::EmptyOutput)
        );
        let empty = AutoEngine::new(Vec::new());
        assert!(matches!(
            empty.render("x", &language("d2")),
            Err(DiagramError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_local_engine_missing_tool() {
        let lang = DiagramLanguage {
            tag: "nothing".into(),
            display_name: "Nothing".into(),
            kroki_type: None,
            local_command: Some("par-markdown-no-such-tool".into()),
            local_args: vec!["-Tsvg".into()],
        };
        assert!(matches!(
            LocalCliEngine.render("x", &lang),
            Err(DiagramError::CommandFailed { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_local_engine_streams_large_input() {
        let lang = DiagramLanguage {
            tag: "echo".into(),
            display_name: "Echo".into(),
            kroki_type: None,
            local_command: Some("cat".into()),
            local_args: Vec::new(),
        };
        // Far larger than a pipe buffer; `cat` writes while still reading.
        let source = format!("<svg>{}</svg>", "x".repeat(1 << 20));
        let svg = LocalCliEngine.render(&source, &lang).unwrap();
        assert_eq!(svg.len(), source.len());
    }

    #[test]
    fn test_kroki_requires_type() {
        let lang = DiagramLanguage {
            tag: "custom".into(),
            display_name: "Custom".into(),
            kroki_type: None,
            local_command: None,
            local_args: Vec::new(),
        };
        assert!(matches!(
            KrokiEngine::new("http://localhost:1/").render("x", &lang),
            Err(DiagramError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_build_engine_respects_enabled_flag() {
        let config = DiagramConfig {
            enabled: false,
            engine: DiagramEngineKind::Kroki,
            ..DiagramConfig::default()
        };
        assert_eq!(build_engine(&config).name(), "disabled");

        let config = DiagramConfig {
            engine: DiagramEngineKind::Local,
            ..DiagramConfig::default()
        };
        assert_eq!(build_engine(&config).name(), "local");
    }

    #[cfg(feature = "mermaid")]
    #[test]
    fn test_native_rejects_other_languages() {
        let engine = NativeMermaidEngine::new(&Default::default());
        assert!(matches!(
            engine.render("digraph { a -> b }", &language("dot")),
            Err(DiagramError::Unsupported { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_local_engine_pipes_stdin_to_stdout() {
        // `cat` echoes the piped source back, standing in for an SVG tool.
        let lang = DiagramLanguage {
            tag: "echo".into(),
            display_name: "Echo".into(),
            kroki_type: None,
            local_command: Some("cat".into()),
            local_args: Vec::new(),
        };
        assert_eq!(LocalCliEngine.render("<svg/>", &lang).unwrap(), "<svg/>");
    }
}
