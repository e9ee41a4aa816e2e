//! Diagram language registry: supported diagram types and their metadata.

use std::collections::{BTreeMap, HashMap};

/// A supported diagram language with rendering metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramLanguage {
    /// The fenced code block tag (e.g., "mermaid", "plantuml", "dot").
    pub tag: String,
    /// Display name (e.g., "Mermaid", "PlantUML").
    pub display_name: String,
    /// Kroki API type identifier (if supported by Kroki).
    pub kroki_type: Option<String>,
    /// Local CLI command that renders this language to SVG.
    pub local_command: Option<String>,
    /// Arguments for the local CLI command. `/dev/stdin` and `/dev/stdout`
    /// are replaced with scratch file paths; without them the source is piped
    /// through stdin and the SVG read from stdout.
    pub local_args: Vec<String>,
}

impl DiagramLanguage {
    fn new(tag: &str, display_name: &str, kroki_type: &str) -> Self {
        Self {
            tag: tag.into(),
            display_name: display_name.into(),
            kroki_type: Some(kroki_type.into()),
            local_command: None,
            local_args: Vec::new(),
        }
    }

    fn with_command(mut self, command: &str, args: &[&str]) -> Self {
        self.local_command = Some(command.into());
        self.local_args = args.iter().map(|a| (*a).to_string()).collect();
        self
    }

    /// Whether the native (pure-Rust) engine can draw this language.
    pub fn is_mermaid(&self) -> bool {
        self.tag == "mermaid"
    }
}

/// Return the default set of diagram languages.
pub fn default_diagram_languages() -> Vec<DiagramLanguage> {
    vec![
        DiagramLanguage::new("mermaid", "Mermaid", "mermaid").with_command(
            "mmdc",
            &["-i", "/dev/stdin", "-o", "/dev/stdout", "-e", "svg"],
        ),
        DiagramLanguage::new("plantuml", "PlantUML", "plantuml")
            .with_command("plantuml", &["-tsvg", "-pipe"]),
        DiagramLanguage::new("graphviz", "GraphViz", "graphviz").with_command("dot", &["-Tsvg"]),
        DiagramLanguage::new("dot", "GraphViz", "graphviz").with_command("dot", &["-Tsvg"]),
        DiagramLanguage::new("d2", "D2", "d2").with_command("d2", &["-", "-"]),
    ]
}

/// Characters that end the language tag at the head of an info string.
fn is_tag_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '{' | '}' | ',' | ';' | ':' | '(')
}

/// Registered diagram languages plus tag aliases.
#[derive(Debug, Clone)]
pub struct DiagramLanguages {
    languages: HashMap<String, DiagramLanguage>,
    aliases: HashMap<String, String>,
}

impl Default for DiagramLanguages {
    fn default() -> Self {
        Self::new(&BTreeMap::new())
    }
}

impl DiagramLanguages {
    /// Build the registry from the defaults and configured aliases.
    ///
    /// Aliases pointing at an unknown language are skipped with a log line.
    pub fn new(aliases: &BTreeMap<String, String>) -> Self {
        let mut registry = Self {
            languages: HashMap::new(),
            aliases: HashMap::new(),
        };
        for lang in default_diagram_languages() {
            registry.add_language(lang);
        }
        for (alias, target) in aliases {
            if registry.languages.contains_key(target.as_str()) {
                registry
                    .aliases
                    .insert(alias.to_ascii_lowercase(), target.clone());
            } else {
                crate::debug_error!(
                    "DIAGRAM",
                    "Alias {alias:?} points at unknown diagram language {target:?}"
                );
            }
        }
        registry
    }

    /// Add a custom diagram language to the registry.
    pub fn add_language(&mut self, lang: DiagramLanguage) {
        self.languages.insert(lang.tag.clone(), lang);
    }

    /// Number of registered languages (aliases excluded).
    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    /// Look up a language by its exact tag or alias.
    pub fn get(&self, tag: &str) -> Option<&DiagramLanguage> {
        let tag = tag.to_ascii_lowercase();
        let tag = self.aliases.get(&tag).unwrap_or(&tag);
        self.languages.get(tag.as_str())
    }

    /// Match a fence info string against the registry.
    ///
    /// The info string matches when it equals a tag, or starts with a tag
    /// immediately followed by a delimiter (`mermaid {theme: dark}`,
    /// `dot,engine=neato`).
    pub fn match_info(&self, info: &str) -> Option<&DiagramLanguage> {
        let info = info.trim();
        if info.is_empty() {
            return None;
        }
        let head = info.split(is_tag_delimiter).next().unwrap_or(info);
        self.get(head)
    }
}
