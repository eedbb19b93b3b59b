//! In-memory graph: an ordered statement set plus its namespace table.

use std::collections::{BTreeSet, HashMap};

use sha2::{Digest, Sha256};

use crate::namespace::{NamespaceError, NamespaceTable, PrefixConflict, PrefixConflictPolicy};
use crate::term::{Node, Object, Statement};

#[derive(Debug, Clone)]
pub struct Graph {
    statements: BTreeSet<Statement>,
    namespaces: NamespaceTable,
    conflict_policy: PrefixConflictPolicy,
    next_blank: u64,
}

/// Outcome of [`Graph::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Statements that were not already present.
    pub added: usize,
    pub conflicts: Vec<PrefixConflict>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Empty graph with the well-known vocabularies bound.
    pub fn new() -> Self {
        Self::with_namespaces(NamespaceTable::with_well_known())
    }

    pub fn with_namespaces(namespaces: NamespaceTable) -> Self {
        Self {
            statements: BTreeSet::new(),
            namespaces,
            conflict_policy: PrefixConflictPolicy::default(),
            next_blank: 0,
        }
    }

    pub fn set_conflict_policy(&mut self, policy: PrefixConflictPolicy) {
        self.conflict_policy = policy;
    }

    pub fn conflict_policy(&self) -> PrefixConflictPolicy {
        self.conflict_policy
    }

    pub fn namespaces(&self) -> &NamespaceTable {
        &self.namespaces
    }

    pub fn namespaces_mut(&mut self) -> &mut NamespaceTable {
        &mut self.namespaces
    }

    pub fn insert(&mut self, statement: Statement) -> bool {
        self.note_blank(&statement.subject);
        if let Object::Node(node) = &statement.object {
            self.note_blank(node);
        }
        self.statements.insert(statement)
    }

    pub fn contains(&self, statement: &Statement) -> bool {
        self.statements.contains(statement)
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Statements in their total order.
    pub fn iter(&self) -> impl Iterator<Item = &Statement> {
        self.statements.iter()
    }

    /// A blank node label not used anywhere in this graph yet.
    pub fn fresh_blank(&mut self) -> Node {
        let node = Node::Blank(format!("b{}", self.next_blank));
        self.next_blank += 1;
        node
    }

    pub fn subject_objects<'a>(
        &'a self,
        predicate: &'a str,
    ) -> impl Iterator<Item = (&'a Node, &'a Object)> + 'a {
        self.statements
            .iter()
            .filter(move |st| st.predicate == predicate)
            .map(|st| (&st.subject, &st.object))
    }

    pub fn objects<'a>(
        &'a self,
        subject: &'a Node,
        predicate: &'a str,
    ) -> impl Iterator<Item = &'a Object> + 'a {
        self.statements
            .iter()
            .filter(move |st| &st.subject == subject && st.predicate == predicate)
            .map(|st| &st.object)
    }

    /// Set-union `other` into `self`.
    ///
    /// Namespace tables are merged under this graph's conflict policy; a
    /// rejected merge leaves `self` untouched. Blank nodes of `other` are
    /// relabeled from a digest of `other`'s content, so they cannot collide
    /// with blank nodes of other merged graphs and the merged statements do
    /// not depend on the order in which graphs are merged.
    pub fn merge(&mut self, other: &Graph) -> Result<MergeStats, NamespaceError> {
        let conflicts = self.namespaces.merge(&other.namespaces, self.conflict_policy)?;

        let digest = other.content_digest();
        let mut relabel: HashMap<String, Node> = HashMap::new();
        let mut added = 0;
        for st in other.iter() {
            let subject = relabeled(&digest, &st.subject, &mut relabel);
            let object = match &st.object {
                Object::Node(node) => Object::Node(relabeled(&digest, node, &mut relabel)),
                Object::Literal(lit) => Object::Literal(lit.clone()),
            };
            if self.insert(Statement {
                subject,
                predicate: st.predicate.clone(),
                object,
            }) {
                added += 1;
            }
        }

        Ok(MergeStats { added, conflicts })
    }

    /// SHA-256 over the N-Triples lines in statement order.
    fn content_digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for st in &self.statements {
            hasher.update(st.to_string().as_bytes());
            hasher.update(b"\n");
        }
        hasher.finalize().into()
    }

    fn note_blank(&mut self, node: &Node) {
        if let Node::Blank(id) = node {
            if let Some(n) = id.strip_prefix('b').and_then(|n| n.parse::<u64>().ok()) {
                self.next_blank = self.next_blank.max(n + 1);
            }
        }
    }
}

fn relabeled(digest: &[u8; 32], node: &Node, relabel: &mut HashMap<String, Node>) -> Node {
    match node {
        Node::Iri(_) => node.clone(),
        Node::Blank(id) => relabel
            .entry(id.clone())
            .or_insert_with(|| {
                let mut hasher = Sha256::new();
                hasher.update(digest);
                hasher.update(id.as_bytes());
                let hash: [u8; 32] = hasher.finalize().into();
                let hex: String = hash[..10].iter().map(|b| format!("{b:02x}")).collect();
                Node::Blank(format!("g{hex}"))
            })
            .clone(),
    }
}

impl Extend<Statement> for Graph {
    fn extend<T: IntoIterator<Item = Statement>>(&mut self, iter: T) {
        for st in iter {
            self.insert(st);
        }
    }
}
