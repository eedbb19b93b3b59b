//! Per-run outcome summary, serializable for `--report`.

use cgowl_rdf::PrefixConflict;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// No expression could be located.
    Unmapped,
    /// The row does not name a resource the conversion can place.
    InvalidSubject { reason: String },
    /// The converter failed, including after its one retry.
    Translation { error: String },
    /// The converter answered but the repaired answer does not parse.
    RepairMismatch { error: String },
    /// The answer rebinds a prefix and the run rejects collisions; nothing
    /// from it was merged.
    PrefixConflict {
        prefix: String,
        existing: String,
        incoming: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionFailure {
    pub subject: String,
    pub text: String,
    #[serde(flatten)]
    pub kind: FailureKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedConflict {
    pub prefix: String,
    pub existing: String,
    pub incoming: String,
}

impl From<PrefixConflict> for ReportedConflict {
    fn from(c: PrefixConflict) -> Self {
        Self {
            prefix: c.prefix,
            existing: c.existing,
            incoming: c.incoming,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionReport {
    pub converted: usize,
    pub statements_added: usize,
    pub failures: Vec<ExpressionFailure>,
    pub prefix_conflicts: Vec<ReportedConflict>,
    pub cancelled: bool,
}

impl ConversionReport {
    pub fn record_success(&mut self, added: usize, conflicts: Vec<PrefixConflict>) {
        self.converted += 1;
        self.statements_added += added;
        self.prefix_conflicts
            .extend(conflicts.into_iter().map(ReportedConflict::from));
    }

    pub fn record_failure(&mut self, subject: impl Into<String>, text: impl Into<String>, kind: FailureKind) {
        self.failures.push(ExpressionFailure {
            subject: subject.into(),
            text: text.into(),
            kind,
        });
    }

    pub fn count(&self, pred: impl Fn(&FailureKind) -> bool) -> usize {
        self.failures.iter().filter(|f| pred(&f.kind)).count()
    }

    pub fn has_repair_mismatch(&self) -> bool {
        self.count(|k| matches!(k, FailureKind::RepairMismatch { .. })) > 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
