//! Parsing serialized documents into a [`Graph`].
//!
//! Turtle (and N3 documents that stay inside the Turtle subset), N-Triples
//! and RDF/XML are read with the `rio_*` parsers. Prefix bindings survive a
//! round trip: Turtle ones come from the parser, RDF/XML ones from the
//! `xmlns:` attributes.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use rio_api::model::{Literal as RioLiteral, Subject, Term, Triple};
use rio_api::parser::TriplesParser;
use rio_turtle::{NTriplesParser, TurtleError, TurtleParser};
use rio_xml::{RdfXmlError, RdfXmlParser};
use thiserror::Error;

use crate::graph::Graph;
use crate::term::{Literal, Node, Object, Statement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Turtle,
    NTriples,
    RdfXml,
}

impl InputFormat {
    pub fn parse_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "turtle" | "ttl" | "n3" => Some(Self::Turtle),
            "nt" | "ntriples" | "n-triples" => Some(Self::NTriples),
            "xml" | "rdfxml" | "rdf/xml" | "rdf" | "owl" | "pretty-xml" => Some(Self::RdfXml),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        Self::parse_name(ext)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Turtle => "turtle",
            Self::NTriples => "ntriples",
            Self::RdfXml => "rdf/xml",
        }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{format} syntax error: {message}")]
    Syntax {
        format: &'static str,
        message: String,
    },

    #[error("invalid base IRI <{iri}>: {message}")]
    InvalidBase { iri: String, message: String },

    #[error("unsupported RDF construct: {0}")]
    Unsupported(String),

    #[error("cannot determine RDF format of {0}")]
    UnknownFormat(String),
}

impl From<TurtleError> for ParseError {
    fn from(value: TurtleError) -> Self {
        ParseError::Syntax {
            format: "turtle",
            message: value.to_string(),
        }
    }
}

impl From<RdfXmlError> for ParseError {
    fn from(value: RdfXmlError) -> Self {
        ParseError::Syntax {
            format: "rdf/xml",
            message: value.to_string(),
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse a whole document into a fresh graph.
///
/// Nothing is returned on error, so callers never observe a half-loaded graph.
pub fn parse_graph(bytes: &[u8], format: InputFormat, base: Option<&str>) -> ParseResult<Graph> {
    let base_iri = base
        .map(|iri| {
            oxiri::Iri::parse(iri.to_string()).map_err(|e| ParseError::InvalidBase {
                iri: iri.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()?;

    let mut loader = Loader::default();
    let declared: Vec<(String, String)> = match format {
        InputFormat::Turtle => {
            let mut parser = TurtleParser::new(bytes, base_iri);
            parser.parse_all(&mut |t| loader.push(t))?;
            parser
                .prefixes()
                .iter()
                .map(|(prefix, iri)| (prefix.clone(), iri.clone()))
                .collect()
        }
        InputFormat::NTriples => {
            NTriplesParser::new(bytes).parse_all(&mut |t| loader.push(t))?;
            Vec::new()
        }
        InputFormat::RdfXml => {
            RdfXmlParser::new(bytes, base_iri).parse_all(&mut |t| loader.push(t))?;
            xml_namespaces(&String::from_utf8_lossy(bytes))
        }
    };

    let mut graph = Graph::new();
    for (prefix, iri) in declared {
        if let Err(err) = graph.namespaces_mut().bind(prefix, iri) {
            tracing::debug!(error = %err, "skipping namespace declaration");
        }
    }
    loader.finish(&mut graph);

    tracing::debug!(
        format = format.name(),
        statements = graph.len(),
        "parsed RDF document"
    );
    Ok(graph)
}

pub fn parse_str(text: &str, format: InputFormat) -> ParseResult<Graph> {
    parse_graph(text.as_bytes(), format, None)
}

pub fn parse_file(path: &Path, format: Option<InputFormat>) -> ParseResult<Graph> {
    let format = format
        .or_else(|| InputFormat::from_path(path))
        .ok_or_else(|| ParseError::UnknownFormat(path.display().to_string()))?;
    let bytes = std::fs::read(path)?;
    parse_graph(&bytes, format, None)
}

/// `xmlns:` declarations of an RDF/XML document, in document order.
pub fn xml_namespaces(text: &str) -> Vec<(String, String)> {
    xmlns_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let prefix = caps.name("prefix")?.as_str();
            let iri = caps.name("iri").or_else(|| caps.name("iri2"))?.as_str();
            Some((prefix.to_string(), iri.to_string()))
        })
        .collect()
}

fn xmlns_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"xmlns:(?P<prefix>[A-Za-z_][\w.\-]*)\s*=\s*(?:"(?P<iri>[^"]*)"|'(?P<iri2>[^']*)')"#)
            .expect("xmlns regex")
    })
}

/// Collects rio triples as owned statements, giving every document blank
/// node its own label.
#[derive(Default)]
struct Loader {
    statements: Vec<Statement>,
    blanks: HashMap<String, usize>,
}

impl Loader {
    fn push(&mut self, t: Triple<'_>) -> ParseResult<()> {
        let subject = match t.subject {
            Subject::NamedNode(n) => Node::iri(n.iri),
            Subject::BlankNode(b) => self.blank(b.id),
            #[allow(unreachable_patterns)]
            _ => return Err(ParseError::Unsupported("quoted triple in subject".to_string())),
        };
        let object = match t.object {
            Term::NamedNode(n) => Object::Node(Node::iri(n.iri)),
            Term::BlankNode(b) => Object::Node(self.blank(b.id)),
            Term::Literal(RioLiteral::Simple { value }) => Object::Literal(Literal::simple(value)),
            Term::Literal(RioLiteral::LanguageTaggedString { value, language }) => {
                Object::Literal(Literal::lang(value, language))
            }
            Term::Literal(RioLiteral::Typed { value, datatype }) => {
                Object::Literal(Literal::typed(value, datatype.iri))
            }
            #[allow(unreachable_patterns)]
            _ => return Err(ParseError::Unsupported("quoted triple in object".to_string())),
        };
        self.statements
            .push(Statement::new(subject, t.predicate.iri, object));
        Ok(())
    }

    /// Placeholder label, replaced with a graph-fresh label in `finish`.
    fn blank(&mut self, id: &str) -> Node {
        let next = self.blanks.len();
        let n = *self.blanks.entry(id.to_string()).or_insert(next);
        Node::Blank(n.to_string())
    }

    fn finish(self, graph: &mut Graph) {
        let fresh: Vec<Node> = (0..self.blanks.len()).map(|_| graph.fresh_blank()).collect();
        let relabel = |node: Node| match node {
            Node::Blank(n) => n
                .parse::<usize>()
                .ok()
                .and_then(|i| fresh.get(i).cloned())
                .unwrap_or(Node::Blank(n)),
            iri => iri,
        };
        for st in self.statements {
            let object = match st.object {
                Object::Node(node) => Object::Node(relabel(node)),
                lit => lit,
            };
            graph.insert(Statement {
                subject: relabel(st.subject),
                predicate: st.predicate,
                object,
            });
        }
    }
}
