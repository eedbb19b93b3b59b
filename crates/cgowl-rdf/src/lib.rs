//! # cgowl-rdf
//!
//! RDF plumbing for the CG-to-OWL converter:
//!
//! - [`term`] / [`graph`]: owned triples in a deterministic set
//! - [`namespace`]: prefix tables with expansion and compaction
//! - [`parse`]: Turtle, N-Triples and RDF/XML input via `rio`
//! - [`serialize`]: named output formats behind a registry
//! - [`render`]: the canonical-text, edit, re-parse pipeline used for output

#![allow(clippy::module_name_repetitions)]

pub mod graph;
pub mod namespace;
pub mod parse;
pub mod render;
pub mod serialize;
pub mod term;
pub mod vocab;

pub use graph::{Graph, MergeStats};
pub use namespace::{Compactor, NamespaceError, NamespaceTable, PrefixConflict, PrefixConflictPolicy};
pub use parse::{parse_file, parse_graph, parse_str, InputFormat, ParseError};
pub use render::{ArtifactFilter, RenderError, RenderOptions, RenderStage, Renderer};
pub use serialize::{GraphSerializer, SerializeError, SerializeOptions, SerializerRegistry};
pub use term::{Literal, Node, Object, Statement};
