//! Namespace table: prefix expansion and compaction.
//!
//! Compaction always picks the longest registered namespace that leaves a
//! valid Turtle local name, so overlapping namespaces (one IRI a prefix of
//! another) never depend on registration order.

use std::collections::BTreeMap;
use thiserror::Error;

use crate::vocab;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamespaceError {
    #[error("invalid prefix name: `{0}`")]
    InvalidPrefix(String),

    #[error("prefix `{prefix}` is bound to <{existing}>, refusing to rebind it to <{incoming}>")]
    Conflict {
        prefix: String,
        existing: String,
        incoming: String,
    },
}

/// What to do when a merge brings a prefix already bound to another IRI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrefixConflictPolicy {
    /// Keep the destination binding; the collision is logged and reported.
    #[default]
    KeepExisting,
    /// Take the incoming binding; the collision is logged and reported.
    Replace,
    /// Fail the merge without changing the destination.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixConflict {
    pub prefix: String,
    pub existing: String,
    pub incoming: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceTable {
    prefixes: BTreeMap<String, String>,
    /// Prefix whose namespace receives purely numeric tokens in `expand`.
    default_prefix: Option<String>,
}

impl NamespaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table pre-populated with rdf, rdfs, owl and xsd.
    pub fn with_well_known() -> Self {
        let mut table = Self::new();
        for (prefix, iri) in vocab::WELL_KNOWN {
            table.prefixes.insert(prefix.to_string(), iri.to_string());
        }
        table
    }

    /// Bind `prefix` to `iri`, returning the previous binding.
    pub fn bind(
        &mut self,
        prefix: impl Into<String>,
        iri: impl Into<String>,
    ) -> Result<Option<String>, NamespaceError> {
        let prefix = prefix.into();
        if !is_valid_prefix(&prefix) {
            return Err(NamespaceError::InvalidPrefix(prefix));
        }
        Ok(self.prefixes.insert(prefix, iri.into()))
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|s| s.as_str())
    }

    pub fn set_default_prefix(&mut self, prefix: impl Into<String>) {
        self.default_prefix = Some(prefix.into());
    }

    pub fn default_namespace(&self) -> Option<&str> {
        self.default_prefix.as_deref().and_then(|p| self.get(p))
    }

    /// Bindings in prefix order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, iri)| (p.as_str(), iri.as_str()))
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Union `other` into `self` under `policy`.
    ///
    /// With `Reject`, either every binding is merged or none is.
    pub fn merge(
        &mut self,
        other: &NamespaceTable,
        policy: PrefixConflictPolicy,
    ) -> Result<Vec<PrefixConflict>, NamespaceError> {
        let conflicts: Vec<PrefixConflict> = other
            .iter()
            .filter_map(|(prefix, incoming)| match self.get(prefix) {
                Some(existing) if existing != incoming => Some(PrefixConflict {
                    prefix: prefix.to_string(),
                    existing: existing.to_string(),
                    incoming: incoming.to_string(),
                }),
                _ => None,
            })
            .collect();

        if policy == PrefixConflictPolicy::Reject {
            if let Some(c) = conflicts.first() {
                return Err(NamespaceError::Conflict {
                    prefix: c.prefix.clone(),
                    existing: c.existing.clone(),
                    incoming: c.incoming.clone(),
                });
            }
        }

        for c in &conflicts {
            tracing::warn!(
                prefix = %c.prefix,
                existing = %c.existing,
                incoming = %c.incoming,
                ?policy,
                "namespace prefix collision"
            );
        }

        for (prefix, incoming) in other.iter() {
            match self.prefixes.get(prefix) {
                None => {
                    self.prefixes.insert(prefix.to_string(), incoming.to_string());
                }
                Some(existing) if existing != incoming => {
                    if policy == PrefixConflictPolicy::Replace {
                        self.prefixes.insert(prefix.to_string(), incoming.to_string());
                    }
                }
                Some(_) => {}
            }
        }

        if self.default_prefix.is_none() {
            self.default_prefix = other.default_prefix.clone();
        }

        Ok(conflicts)
    }

    /// Resolve a user supplied identifier to an absolute IRI.
    ///
    /// - `prefix:local` (no `//`) with a registered prefix is expanded;
    ///   an unregistered prefix leaves the token unchanged.
    /// - A purely numeric token lands in the default namespace.
    /// - Anything else is returned unchanged.
    pub fn expand(&self, token: &str) -> String {
        let token = token.trim();
        if !token.contains("//") {
            if let Some((prefix, local)) = token.split_once(':') {
                return match self.get(prefix) {
                    Some(ns) => format!("{ns}{local}"),
                    None => token.to_string(),
                };
            }
        }
        if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
            if let Some(ns) = self.default_namespace() {
                return format!("{ns}{token}");
            }
        }
        token.to_string()
    }

    /// Shorten one absolute IRI to `prefix:local`, longest namespace first.
    pub fn compact_iri(&self, iri: &str) -> Option<String> {
        self.compactor().compact_iri(iri)
    }

    /// Rewrite `<absolute>` references to their prefixed form, line by line.
    ///
    /// Prefix and base declaration lines are left alone, as is anything inside
    /// a string literal. The rewrite is idempotent.
    pub fn compact_text(&self, text: &str) -> String {
        self.compactor().compact_text(text)
    }

    /// Namespaces ordered for compaction, for shortening many IRIs in a row.
    pub fn compactor(&self) -> Compactor<'_> {
        let mut entries: Vec<(&str, &str)> = self.iter().filter(|(_, ns)| !ns.is_empty()).collect();
        entries.sort_by(|(pa, a), (pb, b)| b.len().cmp(&a.len()).then_with(|| pa.cmp(pb)));
        Compactor { entries }
    }
}

/// Snapshot of a [`NamespaceTable`] sorted longest namespace first.
#[derive(Debug, Clone)]
pub struct Compactor<'t> {
    entries: Vec<(&'t str, &'t str)>,
}

impl Compactor<'_> {
    pub fn compact_iri(&self, iri: &str) -> Option<String> {
        self.entries.iter().find_map(|(prefix, ns)| {
            let local = iri.strip_prefix(ns)?;
            is_valid_local(local).then(|| format!("{prefix}:{local}"))
        })
    }

    pub fn compact_text(&self, text: &str) -> String {
        text.split('\n')
            .map(|line| {
                if is_declaration_line(line) {
                    line.to_string()
                } else {
                    self.compact_line(line)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn compact_line(&self, line: &str) -> String {
        let mut out = String::with_capacity(line.len());
        let mut rest = line;
        while let Some(pos) = rest.find(['<', '"']) {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if tail.starts_with('"') {
                let end = string_literal_end(tail);
                out.push_str(&tail[..end]);
                rest = &tail[end..];
                continue;
            }
            match tail.find('>') {
                Some(close) if is_iri_ref_body(&tail[1..close]) => {
                    let iri = &tail[1..close];
                    match self.compact_iri(iri) {
                        Some(short) => out.push_str(&short),
                        None => out.push_str(&tail[..=close]),
                    }
                    rest = &tail[close + 1..];
                }
                _ => {
                    out.push('<');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}

fn is_declaration_line(line: &str) -> bool {
    let t = line.trim_start();
    if t.starts_with("@prefix") || t.starts_with("@base") {
        return true;
    }
    let head: String = t.chars().take(7).collect::<String>().to_ascii_uppercase();
    head.starts_with("PREFIX ") || head.starts_with("BASE ")
}

/// Byte length of the string literal that starts `s` (including quotes).
/// An unterminated literal runs to the end of the line.
fn string_literal_end(s: &str) -> usize {
    if let Some(body) = s.strip_prefix("\"\"\"") {
        return body.find("\"\"\"").map(|i| i + 6).unwrap_or(s.len());
    }
    let mut escaped = false;
    for (i, c) in s.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return i + 1;
        }
    }
    s.len()
}

fn is_iri_ref_body(s: &str) -> bool {
    !s.is_empty() && !s.contains(|c: char| c.is_whitespace() || matches!(c, '<' | '"'))
}

/// Conservative subset of Turtle's PN_PREFIX (the empty prefix is allowed).
pub fn is_valid_prefix(prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    let mut chars = prefix.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    first_ok
        && prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !prefix.ends_with('.')
}

/// Conservative subset of Turtle's PN_LOCAL.
pub fn is_valid_local(local: &str) -> bool {
    if local.is_empty() {
        return true;
    }
    local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !local.starts_with(['-', '.'])
        && !local.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> NamespaceTable {
        let mut t = NamespaceTable::with_well_known();
        t.bind("who", "http://id.who.int/icd/entity/").unwrap();
        t.bind("sctid", "http://snomed.info/id/").unwrap();
        t.set_default_prefix("who");
        t
    }

    #[test]
    fn expand_registered_prefix() {
        assert_eq!(table().expand("who:12345"), "http://id.who.int/icd/entity/12345");
    }

    #[test]
    fn expand_leaves_unknown_prefix_and_absolute_iris() {
        let t = table();
        assert_eq!(t.expand("foo:bar"), "foo:bar");
        assert_eq!(
            t.expand("http://snomed.info/id/1"),
            "http://snomed.info/id/1"
        );
        assert_eq!(t.expand("plain"), "plain");
    }

    #[test]
    fn expand_numeric_uses_default_namespace() {
        assert_eq!(t_expand("100"), "http://id.who.int/icd/entity/100");
        let mut no_default = NamespaceTable::with_well_known();
        no_default.bind("who", "http://id.who.int/icd/entity/").unwrap();
        assert_eq!(no_default.expand("100"), "100");
    }

    fn t_expand(token: &str) -> String {
        table().expand(token)
    }

    #[test]
    fn compact_prefers_longest_namespace() {
        let mut t = NamespaceTable::new();
        t.bind("ex", "http://example.org/").unwrap();
        t.bind("exa", "http://example.org/a/").unwrap();
        assert_eq!(t.compact_iri("http://example.org/a/b"), Some("exa:b".to_string()));
        assert_eq!(t.compact_iri("http://example.org/c"), Some("ex:c".to_string()));
    }

    #[test]
    fn compact_falls_back_when_local_is_not_a_name() {
        let mut t = NamespaceTable::new();
        t.bind("ex", "http://example.org/").unwrap();
        t.bind("exa", "http://example.org/a/").unwrap();
        assert_eq!(t.compact_iri("http://example.org/a/b/c"), None);
        assert_eq!(t.compact_iri("http://other.org/x"), None);
    }

    #[test]
    fn compact_text_skips_declarations_and_literals() {
        let text = "@prefix sctid: <http://snomed.info/id/> .\n\
                    <http://snomed.info/id/1> <http://www.w3.org/2000/01/rdf-schema#label> \"<http://snomed.info/id/2>\" .";
        let out = table().compact_text(text);
        assert_eq!(
            out,
            "@prefix sctid: <http://snomed.info/id/> .\n\
             sctid:1 rdfs:label \"<http://snomed.info/id/2>\" ."
        );
    }

    #[test]
    fn compact_text_is_idempotent_on_mixed_text() {
        let t = table();
        let text = "<http://id.who.int/icd/entity/9> a <http://unknown.org/x#y> . x < y";
        let once = t.compact_text(text);
        assert_eq!(once, "who:9 a <http://unknown.org/x#y> . x < y");
        assert_eq!(t.compact_text(&once), once);
    }

    #[test]
    fn compactor_matches_table_compaction() {
        let t = table();
        let compactor = t.compactor();
        for iri in [
            "http://id.who.int/icd/entity/9",
            "http://snomed.info/id/73211009",
            "http://www.w3.org/2002/07/owl#Class",
            "http://unknown.org/x",
        ] {
            assert_eq!(compactor.compact_iri(iri), t.compact_iri(iri));
        }
    }

    #[test]
    fn merge_keep_existing_reports_conflict() {
        let mut dst = table();
        let mut src = NamespaceTable::new();
        src.bind("sctid", "http://example.org/sct/").unwrap();
        src.bind("new", "http://example.org/new/").unwrap();

        let conflicts = dst.merge(&src, PrefixConflictPolicy::KeepExisting).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(dst.get("sctid"), Some("http://snomed.info/id/"));
        assert_eq!(dst.get("new"), Some("http://example.org/new/"));
    }

    #[test]
    fn merge_replace_takes_incoming() {
        let mut dst = table();
        let mut src = NamespaceTable::new();
        src.bind("sctid", "http://example.org/sct/").unwrap();
        dst.merge(&src, PrefixConflictPolicy::Replace).unwrap();
        assert_eq!(dst.get("sctid"), Some("http://example.org/sct/"));
    }

    #[test]
    fn merge_reject_leaves_destination_untouched() {
        let mut dst = table();
        let before = dst.clone();
        let mut src = NamespaceTable::new();
        src.bind("aaa", "http://example.org/aaa/").unwrap();
        src.bind("sctid", "http://example.org/sct/").unwrap();
        let err = dst.merge(&src, PrefixConflictPolicy::Reject).unwrap_err();
        assert!(matches!(err, NamespaceError::Conflict { .. }));
        assert_eq!(dst, before);
    }

    #[test]
    fn bind_rejects_malformed_prefix() {
        let mut t = NamespaceTable::new();
        assert!(t.bind("1abc", "http://example.org/").is_err());
        assert!(t.bind("", "http://example.org/").is_ok());
    }
}
