//! Parse one expression through the converter and merge the answer.

use std::borrow::Cow;
use std::sync::OnceLock;

use cgowl_gateway::{CgParser, GatewayError, ParseRequest};
use cgowl_rdf::{parse_str, Graph, InputFormat, PrefixConflict};
use regex::Regex;

use crate::error::{ConvertError, ConvertResult};

#[derive(Debug)]
pub enum Merge {
    Merged {
        added: usize,
        conflicts: Vec<PrefixConflict>,
    },
    /// The destination was not touched.
    Unconverted { reason: GatewayError },
}

/// The converter emits `@base <...#>`; the trailing `#` is dropped from the
/// first such declaration.
pub fn repair_base_declaration(fragment: &str) -> Cow<'_, str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?m)^(@base <.*)#>").expect("base repair regex"));
    re.replacen(fragment, 1, "${1}>")
}

pub fn translate_and_merge(
    parser: &dyn CgParser,
    request: &ParseRequest,
    destination: &mut Graph,
) -> ConvertResult<Merge> {
    let fragment = match parser.parse(request) {
        Ok(fragment) => fragment,
        Err(reason) => return Ok(Merge::Unconverted { reason }),
    };

    let repaired = repair_base_declaration(&fragment);
    let scratch = parse_str(&repaired, InputFormat::Turtle).map_err(|err| {
        tracing::error!(
            subject = %request.subject,
            error = %err,
            "converter output does not parse after repair"
        );
        ConvertError::RepairMismatch {
            subject: request.subject.clone(),
            message: err.to_string(),
        }
    })?;

    let stats = destination.merge(&scratch)?;
    tracing::debug!(subject = %request.subject, added = stats.added, "merged fragment");
    Ok(Merge::Merged {
        added: stats.added,
        conflicts: stats.conflicts,
    })
}
