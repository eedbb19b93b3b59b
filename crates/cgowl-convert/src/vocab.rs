//! Namespaces of the ICD-11 / SNOMED CT conversion.

use cgowl_rdf::term::{Node, Statement};
use cgowl_rdf::vocab::{OWL_ONTOLOGY, RDFS_LABEL, RDF_TYPE};
use cgowl_rdf::{Literal, NamespaceTable};

pub const WHO_NS: &str = "http://id.who.int/icd/entity/";
pub const SCTID_NS: &str = "http://snomed.info/id/";
/// Definitions maintained by WHO (post-coordinated rows).
pub const ICDCG_NS: &str = "http://who.int/icd/cg/";
/// Definitions destined for SNOMED CT (pre-coordinated rows).
pub const SCTCG_NS: &str = "http://snomed.info/cg/";

/// Annotation property holding the grammar expression in ICD-11 exports.
pub const COMMENT_PREDICATE: &str = "http://who.int/field/Description.entity.en.Comments";

/// Prefix used to expand bare numeric identifiers.
pub const DEFAULT_PREFIX: &str = "who";

pub const LABEL_PREFIX: &str = "ICDCG  ";

/// Well-known vocabularies plus the conversion namespaces.
pub fn namespace_table() -> NamespaceTable {
    let mut table = NamespaceTable::with_well_known();
    for (prefix, iri) in [
        ("who", WHO_NS),
        ("sctid", SCTID_NS),
        ("icdcg", ICDCG_NS),
        ("sctcg", SCTCG_NS),
    ] {
        if let Err(err) = table.bind(prefix, iri) {
            tracing::error!(error = %err, "invalid built-in prefix");
        }
    }
    table.set_default_prefix(DEFAULT_PREFIX);
    table
}

/// Ontology header of a generated definitions file.
pub fn ontology_header() -> Vec<Statement> {
    vec![
        Statement::new(Node::iri(ICDCG_NS), RDF_TYPE, Node::iri(OWL_ONTOLOGY)),
        Statement::new(
            Node::iri(ICDCG_NS),
            RDFS_LABEL,
            Literal::simple("ICD-11 compositional grammar definitions"),
        ),
    ]
}
