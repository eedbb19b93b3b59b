use cgowl_rdf::namespace::NamespaceTable;
use cgowl_rdf::{parse_str, InputFormat, RenderOptions, Renderer};
use proptest::prelude::*;

const WHO: &str = "http://id.who.int/icd/entity/";
const SCT: &str = "http://snomed.info/id/";

fn table() -> NamespaceTable {
    let mut t = NamespaceTable::with_well_known();
    t.bind("who", WHO).unwrap();
    t.bind("sctid", SCT).unwrap();
    t.bind("sctcg", "http://snomed.info/cg/").unwrap();
    t
}

fn local() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9][A-Za-z0-9_]{0,12}").unwrap()
}

fn namespace() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just(WHO),
        Just(SCT),
        Just("http://snomed.info/cg/"),
        Just("http://unregistered.example.org/"),
    ]
}

fn iri() -> impl Strategy<Value = String> {
    (namespace(), local()).prop_map(|(ns, l)| format!("{ns}{l}"))
}

fn statement_line() -> impl Strategy<Value = String> {
    (iri(), iri(), iri()).prop_map(|(s, p, o)| format!("<{s}> <{p}> <{o}> ."))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn compact_text_is_idempotent(lines in proptest::collection::vec(statement_line(), 0..12)) {
        let t = table();
        let text = lines.join("\n");
        let once = t.compact_text(&text);
        prop_assert_eq!(t.compact_text(&once), once);
    }

    #[test]
    fn compacted_iri_expands_back(iri in iri()) {
        let t = table();
        match t.compact_iri(&iri) {
            Some(short) => prop_assert_eq!(t.expand(&short), iri),
            None => prop_assert!(iri.starts_with("http://unregistered.example.org/")),
        }
    }

    #[test]
    fn compacted_document_denotes_same_graph(lines in proptest::collection::vec(statement_line(), 1..8)) {
        let t = table();
        let header: String = t
            .iter()
            .map(|(p, ns)| format!("@prefix {p}: <{ns}> .\n"))
            .collect();
        let body = lines.join("\n");
        let plain = parse_str(&format!("{header}{body}\n"), InputFormat::Turtle).unwrap();
        let compacted =
            parse_str(&format!("{header}{}\n", t.compact_text(&body)), InputFormat::Turtle).unwrap();
        prop_assert_eq!(
            plain.iter().collect::<Vec<_>>(),
            compacted.iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn rendering_preserves_statements(lines in proptest::collection::vec(statement_line(), 1..8), compact in any::<bool>()) {
        let t = table();
        let header: String = t
            .iter()
            .map(|(p, ns)| format!("@prefix {p}: <{ns}> .\n"))
            .collect();
        let graph = parse_str(&format!("{header}{}\n", lines.join("\n")), InputFormat::Turtle).unwrap();
        let options = RenderOptions { compact_prefixes: compact, ..RenderOptions::default() };
        let out = Renderer::default().render(&graph, &options).unwrap();
        let back = parse_str(&out, InputFormat::Turtle).unwrap();
        prop_assert_eq!(graph.iter().collect::<Vec<_>>(), back.iter().collect::<Vec<_>>());
    }
}
