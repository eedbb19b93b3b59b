use cgowl_rdf::{NamespaceError, ParseError, RenderError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    /// The converter's output still fails to parse after the base repair.
    #[error("repaired fragment for <{subject}> does not parse: {message}")]
    RepairMismatch { subject: String, message: String },

    #[error("namespace merge failed: {0}")]
    Namespace(#[from] NamespaceError),

    #[error("cannot read input graph: {0}")]
    Input(#[from] ParseError),

    #[error("cannot render output: {0}")]
    Render(#[from] RenderError),

    #[error("invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type ConvertResult<T> = Result<T, ConvertError>;
