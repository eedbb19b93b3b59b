//! # cgowl-convert
//!
//! Turns compositional-grammar expressions into OWL:
//!
//! - [`locator`]: ordered rules that pull expressions out of annotation text
//! - [`translate`]: one converter call, base repair and graph merge
//! - [`pipeline`]: whole-document annotation conversion with cancellation
//! - [`tsv`]: row-per-expression tables with equivalence maps
//! - [`service`]: single-expression request/response contract

pub mod error;
pub mod locator;
pub mod pipeline;
pub mod report;
pub mod service;
pub mod translate;
pub mod tsv;
pub mod vocab;

pub use error::{ConvertError, ConvertResult};
pub use locator::{classify, Coordination, ExpressionLocator, ExtractionRule};
pub use pipeline::{AnnotationConversion, CancelFlag, ModePolicy};
pub use report::{ConversionReport, ExpressionFailure, FailureKind};
pub use service::{parse_flag, ConversionRequest, ConversionService, ServiceFailure};
pub use translate::{repair_base_declaration, translate_and_merge, Merge};
pub use tsv::{read_rows, render_options as tsv_render_options, TsvConversion, TsvRow};
