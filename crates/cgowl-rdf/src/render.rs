//! Two-stage rendering.
//!
//! A graph is first written in canonical line form (one statement per line,
//! absolute IRIs outside the well-known vocabularies). Line-based edits run on
//! that text: artifact stripping, then optional prefix compaction. The edited
//! text is parsed back and written in the requested format, so whatever the
//! edits did, the output is a valid document in that format.

use regex::Regex;
use thiserror::Error;

use crate::graph::Graph;
use crate::parse::{parse_str, InputFormat};
use crate::serialize::{write_canonical, SerializeOptions, SerializerRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    /// Writing the canonical text.
    Intermediate,
    /// Re-parsing the edited text or writing the target format.
    Final,
}

impl RenderStage {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderStage::Intermediate => "intermediate",
            RenderStage::Final => "final",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{code}] {} stage: {message}", .stage.as_str())]
pub struct RenderError {
    pub stage: RenderStage,
    pub code: &'static str,
    pub message: String,
}

impl RenderError {
    pub const INTERMEDIATE: &'static str = "E_INTERMEDIATE";
    pub const FINAL: &'static str = "E_FINAL";
    pub const FORMAT: &'static str = "E_FORMAT";

    fn intermediate(message: impl ToString) -> Self {
        Self {
            stage: RenderStage::Intermediate,
            code: Self::INTERMEDIATE,
            message: message.to_string(),
        }
    }

    fn final_stage(message: impl ToString) -> Self {
        Self {
            stage: RenderStage::Final,
            code: Self::FINAL,
            message: message.to_string(),
        }
    }
}

/// Matches the declaration and label lines that conversion leaves behind for
/// concepts of one namespace.
#[derive(Debug, Clone)]
pub struct ArtifactFilter {
    declaration: Option<Regex>,
    label: Regex,
}

impl ArtifactFilter {
    /// Class and property declarations plus labels.
    pub fn for_namespace(namespace: &str) -> Result<Self, regex::Error> {
        let ns = regex::escape(namespace);
        Ok(Self {
            declaration: Some(Regex::new(&format!(
                r"^<{ns}[^>]*> a owl:(?:Class|ObjectProperty|DatatypeProperty|AnnotationProperty) \.$"
            ))?),
            label: label_re(&ns)?,
        })
    }

    /// Labels only; declarations are kept.
    pub fn labels_for_namespace(namespace: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            declaration: None,
            label: label_re(&regex::escape(namespace))?,
        })
    }

    pub fn is_artifact(&self, line: &str) -> bool {
        let line = line.trim_end();
        self.label.is_match(line) || self.declaration.as_ref().is_some_and(|re| re.is_match(line))
    }

    /// Drop artifact lines from canonical text; returns the kept text and the
    /// number of lines removed.
    pub fn strip(&self, text: &str) -> (String, usize) {
        let mut removed = 0;
        let mut out = String::with_capacity(text.len());
        for line in text.lines() {
            if self.is_artifact(line) {
                removed += 1;
                continue;
            }
            out.push_str(line);
            out.push('\n');
        }
        (out, removed)
    }
}

fn label_re(escaped_ns: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"^<{escaped_ns}[^>]*> rdfs:label .* \.$"))
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// A name registered in the serializer registry.
    pub format: String,
    pub compact_prefixes: bool,
    pub strip_artifacts: Option<ArtifactFilter>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            format: "turtle".to_string(),
            compact_prefixes: false,
            strip_artifacts: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Renderer {
    registry: SerializerRegistry,
}

impl Renderer {
    pub fn new(registry: SerializerRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SerializerRegistry {
        &self.registry
    }

    pub fn render(&self, graph: &Graph, options: &RenderOptions) -> Result<String, RenderError> {
        if self.registry.get(&options.format).is_none() {
            return Err(RenderError {
                stage: RenderStage::Final,
                code: RenderError::FORMAT,
                message: format!(
                    "unknown output format `{}` (available: {})",
                    options.format,
                    self.registry.names().join(", ")
                ),
            });
        }

        let mut text = write_canonical(graph).map_err(RenderError::intermediate)?;

        if let Some(filter) = &options.strip_artifacts {
            let (kept, removed) = filter.strip(&text);
            tracing::debug!(removed, "stripped artifact lines");
            text = kept;
        }
        if options.compact_prefixes {
            text = graph.namespaces().compact_text(&text);
        }

        let reparsed = parse_str(&text, InputFormat::Turtle).map_err(RenderError::final_stage)?;
        self.registry
            .serialize(
                &reparsed,
                &options.format,
                &SerializeOptions {
                    compact_iris: options.compact_prefixes,
                },
            )
            .map_err(RenderError::final_stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{Literal, Node, Statement};
    use crate::vocab;

    const SCT: &str = "http://snomed.info/id/";
    const WHO: &str = "http://id.who.int/icd/entity/";

    fn converted() -> Graph {
        let mut g = Graph::new();
        g.namespaces_mut().bind("sctid", SCT).unwrap();
        g.namespaces_mut().bind("who", WHO).unwrap();
        let who100 = Node::iri(format!("{WHO}100"));
        let sct = Node::iri(format!("{SCT}73211009"));
        g.insert(Statement::new(who100.clone(), vocab::RDFS_SUBCLASS_OF, sct.clone()));
        g.insert(Statement::new(who100, vocab::RDF_TYPE, Node::iri(vocab::OWL_CLASS)));
        g.insert(Statement::new(sct.clone(), vocab::RDF_TYPE, Node::iri(vocab::OWL_CLASS)));
        g.insert(Statement::new(sct, vocab::RDFS_LABEL, Literal::simple("Diabetes mellitus")));
        g
    }

    #[test]
    fn strip_removes_only_foreign_declarations_and_labels() {
        let options = RenderOptions {
            format: "nt".to_string(),
            compact_prefixes: false,
            strip_artifacts: Some(ArtifactFilter::for_namespace(SCT).unwrap()),
        };
        let out = Renderer::default().render(&converted(), &options).unwrap();
        let lines: Vec<&str> = out.lines().filter(|l| !l.trim().is_empty()).collect();
        assert_eq!(lines.len(), 2, "{out}");
        assert!(out.contains(&format!("<{WHO}100> <{}> <{SCT}73211009>", vocab::RDFS_SUBCLASS_OF)));
        assert!(!out.contains("Diabetes mellitus"));
    }

    #[test]
    fn compaction_shortens_final_turtle() {
        let options = RenderOptions {
            compact_prefixes: true,
            ..RenderOptions::default()
        };
        let out = Renderer::default().render(&converted(), &options).unwrap();
        assert!(out.contains("who:100"));
        assert!(out.contains("sctid:73211009"));
    }

    #[test]
    fn unknown_format_fails_before_any_work() {
        let options = RenderOptions {
            format: "json-ld".to_string(),
            ..RenderOptions::default()
        };
        let err = Renderer::default().render(&converted(), &options).unwrap_err();
        assert_eq!(err.code, RenderError::FORMAT);
    }

    #[test]
    fn unserializable_iri_fails_in_intermediate_stage() {
        let mut g = Graph::new();
        g.insert(Statement::new(
            Node::iri("http://example.org/a b"),
            vocab::RDF_TYPE,
            Node::iri(vocab::OWL_CLASS),
        ));
        let err = Renderer::default()
            .render(&g, &RenderOptions::default())
            .unwrap_err();
        assert_eq!(err.stage, RenderStage::Intermediate);
        assert_eq!(err.code, RenderError::INTERMEDIATE);
    }

    #[test]
    fn filter_ignores_other_namespaces() {
        let filter = ArtifactFilter::for_namespace(SCT).unwrap();
        assert!(filter.is_artifact(&format!("<{SCT}1> a owl:Class .")));
        assert!(filter.is_artifact(&format!("<{SCT}1> rdfs:label \"x\"@en .")));
        assert!(!filter.is_artifact(&format!("<{WHO}1> a owl:Class .")));
        assert!(!filter.is_artifact(&format!("<{SCT}1> rdfs:subClassOf <{SCT}2> .")));
    }

    #[test]
    fn label_filter_keeps_declarations() {
        let options = RenderOptions {
            format: "nt".to_string(),
            compact_prefixes: false,
            strip_artifacts: Some(ArtifactFilter::labels_for_namespace(SCT).unwrap()),
        };
        let out = Renderer::default().render(&converted(), &options).unwrap();
        assert!(out.contains(&format!("<{SCT}73211009> <{}> <{}>", vocab::RDF_TYPE, vocab::OWL_CLASS)));
        assert!(!out.contains("Diabetes mellitus"));
        assert_eq!(out.lines().filter(|l| !l.trim().is_empty()).count(), 3, "{out}");
    }
}
