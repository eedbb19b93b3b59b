//! Annotation conversion: every comment carrying an expression becomes OWL
//! merged into a copy of the source graph.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cgowl_gateway::{CgParser, DefinitionMode, ParseRequest};
use cgowl_rdf::{Graph, NamespaceError, Node, PrefixConflict, PrefixConflictPolicy};
use rayon::prelude::*;

use crate::error::{ConvertError, ConvertResult};
use crate::locator::{classify, Coordination, ExpressionLocator};
use crate::report::{ConversionReport, FailureKind};
use crate::translate::{translate_and_merge, Merge};
use crate::vocab;

/// Shared stop request, checked between expressions.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// The underlying flag, for signal handlers.
    pub fn as_atomic(&self) -> Arc<AtomicBool> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModePolicy {
    Fixed(DefinitionMode),
    /// Single-concept expressions are primitive, anything else fully defined.
    InferFromExpression,
}

impl ModePolicy {
    pub fn mode_for(self, expression: &str) -> DefinitionMode {
        match self {
            ModePolicy::Fixed(mode) => mode,
            ModePolicy::InferFromExpression => match classify(expression) {
                Coordination::SingleConcept => DefinitionMode::Primitive,
                Coordination::Compound => DefinitionMode::FullyDefined,
            },
        }
    }
}

/// Outcome of one expression, fed into the report.
pub(crate) enum Step {
    Converted,
    Failed,
}

/// Translate one request and account for it in `report`.
///
/// Only errors that should stop the whole run are returned; everything else
/// is recorded and the run goes on.
pub(crate) fn convert_one(
    parser: &dyn CgParser,
    request: &ParseRequest,
    text: &str,
    destination: &mut Graph,
    report: &mut ConversionReport,
) -> ConvertResult<Step> {
    match translate_and_merge(parser, request, destination) {
        Ok(Merge::Merged { added, conflicts }) => {
            report.record_success(added, conflicts);
            Ok(Step::Converted)
        }
        Ok(Merge::Unconverted { reason }) => {
            tracing::error!(
                subject = %request.subject,
                expression = %request.expression,
                error = %reason,
                "conversion error"
            );
            report.record_failure(
                &request.subject,
                text,
                FailureKind::Translation {
                    error: reason.to_string(),
                },
            );
            Ok(Step::Failed)
        }
        Err(ConvertError::RepairMismatch { message, .. }) => {
            report.record_failure(&request.subject, text, FailureKind::RepairMismatch { error: message });
            Ok(Step::Failed)
        }
        Err(ConvertError::Namespace(NamespaceError::Conflict {
            prefix,
            existing,
            incoming,
        })) => {
            tracing::error!(
                subject = %request.subject,
                prefix = %prefix,
                existing = %existing,
                incoming = %incoming,
                "prefix collision, fragment rejected"
            );
            report.record_failure(
                &request.subject,
                text,
                FailureKind::PrefixConflict {
                    prefix,
                    existing,
                    incoming,
                },
            );
            Ok(Step::Failed)
        }
        Err(other) => Err(other),
    }
}

pub struct AnnotationConversion<'p> {
    parser: &'p dyn CgParser,
    locator: ExpressionLocator,
    mode: ModePolicy,
    conflict_policy: PrefixConflictPolicy,
    cancel: CancelFlag,
}

impl<'p> AnnotationConversion<'p> {
    pub fn new(parser: &'p dyn CgParser) -> ConvertResult<Self> {
        Ok(Self {
            parser,
            locator: ExpressionLocator::standard()?,
            mode: ModePolicy::Fixed(DefinitionMode::Primitive),
            conflict_policy: PrefixConflictPolicy::default(),
            cancel: CancelFlag::new(),
        })
    }

    pub fn with_mode(mut self, mode: ModePolicy) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_locator(mut self, locator: ExpressionLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_conflict_policy(mut self, policy: PrefixConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Copy `source`, then convert and merge each located expression.
    pub fn run(&self, source: &Graph) -> ConvertResult<(Graph, ConversionReport)> {
        let mut target = source.clone();
        target.set_conflict_policy(self.conflict_policy);
        let conversion_table = Graph::with_namespaces(vocab::namespace_table());
        let conflicts = match target.merge(&conversion_table) {
            Ok(stats) => stats.conflicts,
            // Rejected as a whole: the source keeps its own bindings.
            Err(NamespaceError::Conflict {
                prefix,
                existing,
                incoming,
            }) => {
                tracing::warn!(prefix = %prefix, existing = %existing, "source binds a conversion prefix differently");
                vec![PrefixConflict {
                    prefix,
                    existing,
                    incoming,
                }]
            }
            Err(other) => return Err(other.into()),
        };

        let mut report = ConversionReport::default();
        report.prefix_conflicts.extend(conflicts.into_iter().map(Into::into));

        let comments: Vec<(String, String)> = source
            .subject_objects(vocab::COMMENT_PREDICATE)
            .filter_map(|(subject, object)| {
                let text = object.as_literal()?.lexical.clone();
                match subject {
                    Node::Iri(iri) => Some((iri.clone(), text)),
                    Node::Blank(id) => {
                        tracing::debug!(blank = %id, "skipping comment on blank node");
                        None
                    }
                }
            })
            .collect();

        let located: Vec<Option<String>> = comments
            .par_iter()
            .map(|(_, text)| self.locator.extract(text))
            .collect();

        tracing::info!(
            comments = comments.len(),
            with_expression = located.iter().filter(|e| e.is_some()).count(),
            "located expressions"
        );

        for ((subject, text), expression) in comments.iter().zip(located) {
            if self.cancel.is_cancelled() {
                tracing::warn!("cancelled, keeping expressions converted so far");
                report.cancelled = true;
                break;
            }
            let Some(expression) = expression else {
                tracing::warn!(subject = %subject, text = %text, "no conversion available");
                report.record_failure(subject, text, FailureKind::Unmapped);
                continue;
            };
            let request = ParseRequest::new(subject, self.mode.mode_for(&expression), expression);
            convert_one(self.parser, &request, text, &mut target, &mut report)?;
        }

        tracing::info!(
            converted = report.converted,
            failed = report.failures.len(),
            "annotation conversion finished"
        );
        Ok((target, report))
    }
}
