//! Tab-separated expression tables.
//!
//! Columns (by header name): `icd11`, `icdrubric`, `expression`, `maptype`.
//! `maptype` `A` marks a definition owned by WHO; anything else is owned by
//! SNOMED CT.

use std::io::BufRead;

use anyhow::{bail, Context, Result};
use cgowl_gateway::{CgParser, ParseRequest};
use cgowl_rdf::term::{Literal, Node, Statement};
use cgowl_rdf::vocab::{OWL_EQUIVALENT_CLASS, RDFS_LABEL};
use cgowl_rdf::{ArtifactFilter, Graph, NamespaceTable, RenderOptions};

use crate::error::ConvertResult;
use crate::pipeline::{convert_one, CancelFlag, ModePolicy, Step};
use crate::report::{ConversionReport, FailureKind};
use crate::vocab;

pub const WHO_OWNED: &str = "A";

const COLUMNS: [&str; 4] = ["icd11", "icdrubric", "expression", "maptype"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TsvRow {
    /// Line number in the source, for messages.
    pub line: usize,
    pub icd11: String,
    pub rubric: String,
    pub expression: String,
    pub map_type: String,
}

impl TsvRow {
    pub fn who_owned(&self) -> bool {
        self.map_type.trim() == WHO_OWNED
    }

    /// Local identifier of the ICD-11 entity this row defines.
    pub fn entity_id(&self, namespaces: &NamespaceTable) -> Option<String> {
        let iri = namespaces.expand(&self.icd11);
        let local = iri.strip_prefix(vocab::WHO_NS)?;
        (!local.is_empty()).then(|| local.to_string())
    }
}

pub fn read_rows(reader: impl BufRead) -> Result<Vec<TsvRow>> {
    let mut lines = reader.lines().enumerate();
    let header = loop {
        match lines.next() {
            Some((_, line)) => {
                let line = line.context("reading header")?;
                if !line.trim().is_empty() {
                    break line;
                }
            }
            None => bail!("empty expression table"),
        }
    };
    let names: Vec<&str> = header.split('\t').map(str::trim).collect();
    let mut index = [0usize; 4];
    for (slot, column) in index.iter_mut().zip(COLUMNS) {
        *slot = names
            .iter()
            .position(|n| *n == column)
            .with_context(|| format!("missing column `{column}` in header"))?;
    }

    let mut rows = Vec::new();
    for (i, line) in lines {
        let number = i + 1;
        let line = line.with_context(|| format!("reading line {number}"))?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let field = |col: usize| -> Result<String> {
            fields
                .get(index[col])
                .map(|f| f.trim().to_string())
                .with_context(|| format!("line {number}: missing `{}` field", COLUMNS[col]))
        };
        rows.push(TsvRow {
            line: number,
            icd11: field(0)?,
            rubric: field(1)?,
            expression: field(2)?,
            map_type: field(3)?,
        });
    }
    Ok(rows)
}

/// Output options for a converted table: compacted, SNOMED CT labels removed,
/// SNOMED CT class declarations kept.
pub fn render_options(format: &str) -> Result<RenderOptions, regex::Error> {
    Ok(RenderOptions {
        format: format.to_string(),
        compact_prefixes: true,
        strip_artifacts: Some(ArtifactFilter::labels_for_namespace(vocab::SCTID_NS)?),
    })
}

pub struct TsvConversion<'p> {
    parser: &'p dyn CgParser,
    cancel: CancelFlag,
    namespaces: NamespaceTable,
}

impl<'p> TsvConversion<'p> {
    pub fn new(parser: &'p dyn CgParser) -> Self {
        Self {
            parser,
            cancel: CancelFlag::new(),
            namespaces: vocab::namespace_table(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Convert every row into a fresh definitions graph. When `map_graph` is
    /// given, each converted row also links the ICD-11 entity to its
    /// definition with `owl:equivalentClass`.
    pub fn run(
        &self,
        rows: &[TsvRow],
        mut map_graph: Option<&mut Graph>,
    ) -> ConvertResult<(Graph, ConversionReport)> {
        let mut graph = Graph::with_namespaces(self.namespaces.clone());
        graph.extend(vocab::ontology_header());
        let mut report = ConversionReport::default();

        for row in rows {
            if self.cancel.is_cancelled() {
                tracing::warn!(line = row.line, "cancelled, keeping rows converted so far");
                report.cancelled = true;
                break;
            }
            let Some(entity) = row.entity_id(&self.namespaces) else {
                tracing::warn!(line = row.line, icd11 = %row.icd11, "not an ICD-11 entity");
                report.record_failure(
                    &row.icd11,
                    &row.expression,
                    FailureKind::InvalidSubject {
                        reason: format!("line {}: not in {}", row.line, vocab::WHO_NS),
                    },
                );
                continue;
            };
            let ns = if row.who_owned() {
                vocab::ICDCG_NS
            } else {
                vocab::SCTCG_NS
            };
            let subject = format!("{ns}{entity}");
            let mode = ModePolicy::InferFromExpression.mode_for(&row.expression);
            let request = ParseRequest::new(&subject, mode, &row.expression);

            match convert_one(self.parser, &request, &row.expression, &mut graph, &mut report)? {
                Step::Converted => {
                    graph.insert(Statement::new(
                        Node::iri(&subject),
                        RDFS_LABEL,
                        Literal::simple(format!("{}{}", vocab::LABEL_PREFIX, row.rubric)),
                    ));
                    if let Some(map) = map_graph.as_deref_mut() {
                        map.insert(Statement::new(
                            Node::iri(format!("{}{entity}", vocab::WHO_NS)),
                            OWL_EQUIVALENT_CLASS,
                            Node::iri(&subject),
                        ));
                    }
                }
                Step::Failed => {
                    tracing::warn!(line = row.line, icd11 = %row.icd11, "conversion failure");
                }
            }
        }
        Ok((graph, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgowl_gateway::{DefinitionMode, GatewayError};
    use parking_lot::Mutex;

    const TABLE: &str = "icd11\ticdrubric\texpression\tmaptype\n\
        http://id.who.int/icd/entity/100\tType 1 diabetes\t46635009 |Diabetes mellitus type 1|\tA\n\
        http://id.who.int/icd/entity/200\tAppendicitis\t18526009 |Disorder of appendix| + 302168000 |Inflammation|\tE\n\
        \n\
        http://example.org/300\tElsewhere\t1 |x|\tA\n";

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<ParseRequest>>,
    }

    impl CgParser for Recording {
        fn parse(&self, request: &ParseRequest) -> Result<String, GatewayError> {
            self.seen.lock().push(request.clone());
            Ok(format!(
                "<{}> <http://www.w3.org/2000/01/rdf-schema#subClassOf> <http://snomed.info/id/64572001> .",
                request.subject
            ))
        }
    }

    #[test]
    fn reads_rows_by_header_name() {
        let rows = read_rows(TABLE.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].rubric, "Type 1 diabetes");
        assert!(rows[0].who_owned());
        assert!(!rows[1].who_owned());
        assert_eq!(rows[2].line, 5);
    }

    #[test]
    fn missing_column_is_an_error() {
        let err = read_rows("icd11\texpression\n1\t2\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("icdrubric"));
    }

    #[test]
    fn rows_pick_namespace_mode_and_label() {
        let rows = read_rows(TABLE.as_bytes()).unwrap();
        let parser = Recording::default();
        let mut map = Graph::new();
        let (graph, report) = TsvConversion::new(&parser).run(&rows, Some(&mut map)).unwrap();

        let seen = parser.seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].subject, format!("{}100", vocab::ICDCG_NS));
        assert_eq!(seen[0].mode, DefinitionMode::Primitive);
        assert_eq!(seen[1].subject, format!("{}200", vocab::SCTCG_NS));
        assert_eq!(seen[1].mode, DefinitionMode::FullyDefined);

        assert_eq!(report.converted, 2);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].kind, FailureKind::InvalidSubject { .. }));

        let label = graph
            .objects(&Node::iri(format!("{}100", vocab::ICDCG_NS)), RDFS_LABEL)
            .next()
            .and_then(|o| o.as_literal())
            .map(|l| l.lexical.clone());
        assert_eq!(label.as_deref(), Some("ICDCG  Type 1 diabetes"));
        assert_eq!(map.subject_objects(OWL_EQUIVALENT_CLASS).count(), 2);
    }

    #[test]
    fn short_form_identifiers_are_accepted() {
        let rows = vec![TsvRow {
            line: 2,
            icd11: "who:42".into(),
            rubric: "r".into(),
            expression: "1 |x|".into(),
            map_type: "A".into(),
        }];
        let parser = Recording::default();
        let (_, report) = TsvConversion::new(&parser).run(&rows, None).unwrap();
        assert_eq!(report.converted, 1);
    }

    /// Answers like the converter does, with a declaration and label for the
    /// referenced concept.
    struct Declaring;

    impl CgParser for Declaring {
        fn parse(&self, request: &ParseRequest) -> Result<String, GatewayError> {
            Ok(format!(
                "@prefix sctid: <http://snomed.info/id/> .\n\
                 @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .\n\
                 @prefix owl: <http://www.w3.org/2002/07/owl#> .\n\
                 <{}> rdfs:subClassOf sctid:7 .\n\
                 sctid:7 a owl:Class ;\n    rdfs:label \"Seven\" .\n",
                request.subject
            ))
        }
    }

    #[test]
    fn rendering_drops_snomed_labels_but_keeps_declarations() {
        let rows = read_rows(TABLE.as_bytes()).unwrap();
        let (graph, _) = TsvConversion::new(&Declaring).run(&rows, None).unwrap();
        let out = cgowl_rdf::Renderer::default()
            .render(&graph, &render_options("nt").unwrap())
            .unwrap();
        let rendered = cgowl_rdf::parse_str(&out, cgowl_rdf::InputFormat::NTriples).unwrap();

        let seven = Node::iri(format!("{}7", vocab::SCTID_NS));
        assert!(rendered.contains(&Statement::new(
            seven.clone(),
            cgowl_rdf::vocab::RDF_TYPE,
            Node::iri(cgowl_rdf::vocab::OWL_CLASS),
        )));
        assert_eq!(rendered.objects(&seven, RDFS_LABEL).count(), 0);
        assert_eq!(
            rendered
                .objects(&Node::iri(format!("{}100", vocab::ICDCG_NS)), RDFS_LABEL)
                .count(),
            1
        );
    }
}
