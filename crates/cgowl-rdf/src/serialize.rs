//! Serializers and the registry that names them.
//!
//! The registry is the single source of truth for which output formats
//! exist: callers list `names()` rather than hardcoding format strings.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::io;
use std::sync::Arc;

use rio_api::formatter::TriplesFormatter;
use rio_api::model::{BlankNode, Literal as RioLiteral, NamedNode, Subject, Term, Triple};
use rio_turtle::NTriplesFormatter;
use rio_xml::RdfXmlFormatter;
use thiserror::Error;

use crate::graph::Graph;
use crate::namespace::{is_valid_prefix, Compactor, NamespaceTable};
use crate::term::{escape_literal, Literal, Node, Object, Statement};
use crate::vocab;

#[derive(Error, Debug)]
pub enum SerializeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("cannot write {term} as {format}: {reason}")]
    Unrepresentable {
        format: &'static str,
        term: String,
        reason: &'static str,
    },

    #[error("unknown output format `{requested}` (available: {available})")]
    UnknownFormat { requested: String, available: String },

    #[error("serializer produced invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub type SerializeResult<T> = Result<T, SerializeError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Abbreviate IRIs with every namespace of the graph, not only the
    /// well-known vocabularies.
    pub compact_iris: bool,
}

pub trait GraphSerializer: Send + Sync {
    fn serialize(&self, graph: &Graph, options: &SerializeOptions) -> SerializeResult<String>;
}

#[derive(Clone)]
pub struct SerializerRegistry {
    entries: BTreeMap<String, Arc<dyn GraphSerializer>>,
}

impl Default for SerializerRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        let turtle: Arc<dyn GraphSerializer> = Arc::new(TurtleSerializer);
        registry.register("turtle", turtle.clone());
        registry.register("ttl", turtle.clone());
        registry.register("n3", turtle);
        let nt: Arc<dyn GraphSerializer> = Arc::new(NTriplesSerializer);
        registry.register("nt", nt.clone());
        registry.register("ntriples", nt);
        registry.register("xml", Arc::new(RdfXmlSerializer { indentation: None }));
        registry.register("pretty-xml", Arc::new(RdfXmlSerializer { indentation: Some(2) }));
        registry
    }
}

impl SerializerRegistry {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, serializer: Arc<dyn GraphSerializer>) {
        self.entries.insert(name.into().to_ascii_lowercase(), serializer);
    }

    pub fn get(&self, name: &str) -> Option<&dyn GraphSerializer> {
        self.entries
            .get(&name.trim().to_ascii_lowercase())
            .map(|s| s.as_ref())
    }

    /// Registered format names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(|k| k.as_str()).collect()
    }

    pub fn serialize(
        &self,
        graph: &Graph,
        format: &str,
        options: &SerializeOptions,
    ) -> SerializeResult<String> {
        let serializer = self.get(format).ok_or_else(|| SerializeError::UnknownFormat {
            requested: format.to_string(),
            available: self.names().join(", "),
        })?;
        serializer.serialize(graph, options)
    }
}

impl std::fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializerRegistry")
            .field("formats", &self.names())
            .finish()
    }
}

// ============================================================================
// Turtle
// ============================================================================

/// Subject-grouped Turtle with deterministic ordering.
pub struct TurtleSerializer;

impl GraphSerializer for TurtleSerializer {
    fn serialize(&self, graph: &Graph, options: &SerializeOptions) -> SerializeResult<String> {
        let effective = effective_namespaces(graph);
        let abbreviations = if options.compact_iris {
            effective.clone()
        } else {
            well_known_subset(&effective)
        };
        let mut writer = TermWriter::new("turtle", &abbreviations);

        let mut body = String::new();
        let mut statements = graph.iter().peekable();
        while let Some(first) = statements.next() {
            let mut group: Vec<&Statement> = vec![first];
            while let Some(next) = statements.next_if(|st| st.subject == first.subject) {
                group.push(next);
            }
            write_subject_group(&mut writer, &mut body, &group)?;
        }

        let mut out = String::new();
        for prefix in &writer.used {
            if let Some(iri) = effective.get(prefix) {
                let _ = writeln!(out, "@prefix {prefix}: <{iri}> .");
            }
        }
        if !writer.used.is_empty() {
            out.push('\n');
        }
        out.push_str(&body);
        Ok(out)
    }
}

fn write_subject_group(
    writer: &mut TermWriter<'_>,
    out: &mut String,
    group: &[&Statement],
) -> SerializeResult<()> {
    let subject = writer.node(&group[0].subject)?;
    let mut by_predicate: Vec<(&str, Vec<&Object>)> = Vec::new();
    for st in group {
        match by_predicate.last_mut() {
            Some((p, objs)) if *p == st.predicate => objs.push(&st.object),
            _ => by_predicate.push((st.predicate.as_str(), vec![&st.object])),
        }
    }

    let _ = write!(out, "{subject}");
    let multi = by_predicate.len() > 1;
    for (i, (predicate, objects)) in by_predicate.iter().enumerate() {
        let predicate = writer.predicate(predicate)?;
        let objects = objects
            .iter()
            .map(|o| writer.object(o))
            .collect::<SerializeResult<Vec<_>>>()?;
        if i == 0 {
            out.push(' ');
        } else {
            out.push_str(" ;\n    ");
        }
        let _ = write!(out, "{predicate} {}", objects.join(", "));
    }
    out.push_str(" .\n");
    if multi {
        out.push('\n');
    }
    Ok(())
}

/// Line-oriented Turtle: a `@prefix` header for every namespace of the graph
/// followed by exactly one statement per line. Only the well-known
/// vocabularies are abbreviated.
pub fn write_canonical(graph: &Graph) -> SerializeResult<String> {
    let effective = effective_namespaces(graph);
    let abbreviations = well_known_subset(&effective);
    let mut writer = TermWriter::new("canonical turtle", &abbreviations);

    let mut out = String::new();
    for (prefix, iri) in effective.iter() {
        if !is_valid_iri_ref(iri) {
            tracing::debug!(prefix, iri, "namespace not declarable in turtle, skipping");
            continue;
        }
        let _ = writeln!(out, "@prefix {prefix}: <{iri}> .");
    }
    out.push('\n');
    for st in graph.iter() {
        let line = format!(
            "{} {} {} .",
            writer.node(&st.subject)?,
            writer.predicate(&st.predicate)?,
            writer.object(&st.object)?
        );
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

/// Graph namespaces plus any well-known vocabulary the graph does not bind.
fn effective_namespaces(graph: &Graph) -> NamespaceTable {
    let mut table = NamespaceTable::new();
    for (prefix, iri) in graph.namespaces().iter() {
        if is_valid_prefix(prefix) {
            // Valid names always bind.
            let _ = table.bind(prefix, iri);
        }
    }
    for (prefix, iri) in vocab::WELL_KNOWN {
        if table.get(prefix).is_none() {
            let _ = table.bind(prefix, iri);
        }
    }
    table
}

fn well_known_subset(table: &NamespaceTable) -> NamespaceTable {
    let mut subset = NamespaceTable::new();
    for (prefix, iri) in vocab::WELL_KNOWN {
        if table.get(prefix) == Some(iri) {
            let _ = subset.bind(prefix, iri);
        }
    }
    subset
}

struct TermWriter<'t> {
    format: &'static str,
    abbreviations: Compactor<'t>,
    used: BTreeSet<String>,
}

impl<'t> TermWriter<'t> {
    fn new(format: &'static str, abbreviations: &'t NamespaceTable) -> Self {
        Self {
            format,
            abbreviations: abbreviations.compactor(),
            used: BTreeSet::new(),
        }
    }

    fn iri(&mut self, iri: &str) -> SerializeResult<String> {
        if !is_valid_iri_ref(iri) {
            return Err(self.unrepresentable(format!("<{iri}>"), "IRI contains characters not allowed in an IRI reference"));
        }
        if let Some(short) = self.abbreviations.compact_iri(iri) {
            if let Some((prefix, _)) = short.split_once(':') {
                self.used.insert(prefix.to_string());
            }
            return Ok(short);
        }
        Ok(format!("<{iri}>"))
    }

    fn predicate(&mut self, iri: &str) -> SerializeResult<String> {
        if iri == vocab::RDF_TYPE {
            return Ok("a".to_string());
        }
        self.iri(iri)
    }

    fn node(&mut self, node: &Node) -> SerializeResult<String> {
        match node {
            Node::Iri(iri) => self.iri(iri),
            Node::Blank(id) => {
                if is_valid_blank_label(id) {
                    Ok(format!("_:{id}"))
                } else {
                    Err(self.unrepresentable(format!("_:{id}"), "invalid blank node label"))
                }
            }
        }
    }

    fn object(&mut self, object: &Object) -> SerializeResult<String> {
        match object {
            Object::Node(node) => self.node(node),
            Object::Literal(lit) => self.literal(lit),
        }
    }

    fn literal(&mut self, lit: &Literal) -> SerializeResult<String> {
        let quoted = format!("\"{}\"", escape_literal(&lit.lexical));
        if let Some(lang) = &lit.language {
            if !is_valid_language_tag(lang) {
                return Err(self.unrepresentable(lit.to_string(), "invalid language tag"));
            }
            return Ok(format!("{quoted}@{lang}"));
        }
        match &lit.datatype {
            Some(dt) => Ok(format!("{quoted}^^{}", self.iri(dt)?)),
            None => Ok(quoted),
        }
    }

    fn unrepresentable(&self, term: String, reason: &'static str) -> SerializeError {
        SerializeError::Unrepresentable {
            format: self.format,
            term,
            reason,
        }
    }
}

pub fn is_valid_iri_ref(iri: &str) -> bool {
    !iri.chars().any(|c| {
        c <= ' ' || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\')
    })
}

fn is_valid_blank_label(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !id.starts_with(['-', '.'])
        && !id.ends_with('.')
}

fn is_valid_language_tag(tag: &str) -> bool {
    let mut parts = tag.split('-');
    let primary_ok = parts
        .next()
        .is_some_and(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_alphabetic()));
    primary_ok && parts.all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_alphanumeric()))
}

// ============================================================================
// N-Triples / RDF/XML (rio formatters)
// ============================================================================

pub struct NTriplesSerializer;

impl GraphSerializer for NTriplesSerializer {
    fn serialize(&self, graph: &Graph, _options: &SerializeOptions) -> SerializeResult<String> {
        let mut out = Vec::new();
        {
            let mut formatter = NTriplesFormatter::new(&mut out);
            for st in graph.iter() {
                formatter.format(&rio_triple(st))?;
            }
        }
        Ok(String::from_utf8(out)?)
    }
}

pub struct RdfXmlSerializer {
    pub indentation: Option<usize>,
}

impl GraphSerializer for RdfXmlSerializer {
    fn serialize(&self, graph: &Graph, _options: &SerializeOptions) -> SerializeResult<String> {
        let mut out = Vec::new();
        {
            let mut formatter = match self.indentation {
                Some(n) => RdfXmlFormatter::with_indentation(&mut out, n)?,
                None => RdfXmlFormatter::new(&mut out)?,
            };
            for st in graph.iter() {
                formatter.format(&rio_triple(st))?;
            }
            formatter.finish()?;
        }
        Ok(String::from_utf8(out)?)
    }
}

fn rio_triple(st: &Statement) -> Triple<'_> {
    let subject = match &st.subject {
        Node::Iri(iri) => Subject::NamedNode(NamedNode { iri }),
        Node::Blank(id) => Subject::BlankNode(BlankNode { id }),
    };
    let object = match &st.object {
        Object::Node(Node::Iri(iri)) => Term::NamedNode(NamedNode { iri }),
        Object::Node(Node::Blank(id)) => Term::BlankNode(BlankNode { id }),
        Object::Literal(lit) => Term::Literal(match (&lit.language, &lit.datatype) {
            (Some(language), _) => RioLiteral::LanguageTaggedString {
                value: &lit.lexical,
                language,
            },
            (None, Some(datatype)) => RioLiteral::Typed {
                value: &lit.lexical,
                datatype: NamedNode { iri: datatype },
            },
            (None, None) => RioLiteral::Simple {
                value: &lit.lexical,
            },
        }),
    };
    Triple {
        subject,
        predicate: NamedNode { iri: &st.predicate },
        object,
    }
}
