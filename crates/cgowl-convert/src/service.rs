//! Request/response contract of the interactive converter.
//!
//! A front end hands over a [`ConversionRequest`] and gets back either the
//! rendered document or a [`ServiceFailure`] carrying an HTTP-style status.

use std::collections::HashMap;

use cgowl_gateway::{CgParser, DefinitionMode, ParseRequest};
use cgowl_rdf::{ArtifactFilter, Graph, NamespaceTable, RenderOptions, Renderer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::translate::{translate_and_merge, Merge};
use crate::vocab;

pub const UNABLE_TO_CONVERT: &str = "Unable to convert supplied expression";
pub const DEFAULT_FORMAT: &str = "n3";

const TRUE_VALUES: [&str; 6] = ["y", "yes", "true", "1", "on", "yup"];
const FALSE_VALUES: [&str; 6] = ["n", "no", "false", "0", "off", "nope"];

/// Parse a textual flag; `None` when the value is in neither vocabulary.
pub fn parse_flag(value: &str) -> Option<bool> {
    let v = value.trim().to_ascii_lowercase();
    if TRUE_VALUES.contains(&v.as_str()) {
        Some(true)
    } else if FALSE_VALUES.contains(&v.as_str()) {
        Some(false)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// Absolute IRI, `prefix:local` or a bare WHO entity number.
    pub subject: String,
    pub expression: String,
    pub primitive: bool,
    pub format: String,
    pub shorten_uris: bool,
    pub strip_artifacts: bool,
}

impl ConversionRequest {
    pub fn new(subject: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            expression: expression.into(),
            primitive: false,
            format: DEFAULT_FORMAT.to_string(),
            shorten_uris: false,
            strip_artifacts: false,
        }
    }

    /// Build from form fields (`subject`, `expr`, `primitive`, `shorturis`,
    /// `removesct`, `format`). Unrecognised flag values count as false.
    pub fn from_form(params: &HashMap<String, String>) -> Self {
        let text = |key: &str| params.get(key).cloned().unwrap_or_default();
        let flag = |key: &str| {
            let raw = text(key);
            parse_flag(&raw).unwrap_or_else(|| {
                if !raw.is_empty() {
                    tracing::debug!(key, value = %raw, "unrecognised flag value, treating as false");
                }
                false
            })
        };
        let format = text("format");
        Self {
            subject: text("subject"),
            expression: text("expr"),
            primitive: flag("primitive"),
            format: if format.trim().is_empty() {
                DEFAULT_FORMAT.to_string()
            } else {
                format
            },
            shorten_uris: flag("shorturis"),
            strip_artifacts: flag("removesct"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{status}: {message}")]
pub struct ServiceFailure {
    pub status: u16,
    pub message: String,
}

impl ServiceFailure {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            message: message.into(),
        }
    }
}

pub struct ConversionService<P: CgParser> {
    parser: P,
    renderer: Renderer,
    namespaces: NamespaceTable,
    artifacts: ArtifactFilter,
}

impl<P: CgParser> ConversionService<P> {
    pub fn new(parser: P) -> Result<Self, regex::Error> {
        Ok(Self {
            parser,
            renderer: Renderer::default(),
            namespaces: vocab::namespace_table(),
            artifacts: ArtifactFilter::for_namespace(vocab::SCTID_NS)?,
        })
    }

    pub fn with_renderer(mut self, renderer: Renderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    /// Output formats a request may ask for.
    pub fn formats(&self) -> Vec<&str> {
        self.renderer.registry().names()
    }

    pub fn convert(&self, request: &ConversionRequest) -> Result<String, ServiceFailure> {
        let subject = self.namespaces.expand(&request.subject);
        let expression: String = request.expression.split_whitespace().collect();
        let parse = ParseRequest::new(
            subject,
            DefinitionMode::from_primitive(request.primitive),
            expression,
        );

        let mut graph = Graph::with_namespaces(self.namespaces.clone());
        match translate_and_merge(&self.parser, &parse, &mut graph) {
            Ok(Merge::Merged { .. }) => {}
            Ok(Merge::Unconverted { reason }) => {
                tracing::warn!(subject = %parse.subject, error = %reason, "service conversion failed");
                return Err(ServiceFailure::bad_request(UNABLE_TO_CONVERT));
            }
            Err(err) => {
                tracing::error!(subject = %parse.subject, error = %err, "service conversion failed");
                return Err(ServiceFailure::bad_request(UNABLE_TO_CONVERT));
            }
        }

        let options = RenderOptions {
            format: request.format.clone(),
            compact_prefixes: request.shorten_uris,
            strip_artifacts: request.strip_artifacts.then(|| self.artifacts.clone()),
        };
        self.renderer
            .render(&graph, &options)
            .map_err(|err| ServiceFailure::bad_request(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgowl_gateway::GatewayError;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Capture {
        last: Mutex<Option<ParseRequest>>,
        refuse: bool,
    }

    impl CgParser for Capture {
        fn parse(&self, request: &ParseRequest) -> Result<String, GatewayError> {
            *self.last.lock() = Some(request.clone());
            if self.refuse {
                return Err(GatewayError::NoResult);
            }
            Ok(format!(
                "@base <http://snomed.info/id/#> .\n\
                 <{}> <http://www.w3.org/2002/07/owl#equivalentClass> <http://snomed.info/id/64572001> .\n\
                 <http://snomed.info/id/64572001> a <http://www.w3.org/2002/07/owl#Class> .\n",
                request.subject
            ))
        }
    }

    #[test]
    fn flags_follow_yes_no_vocabulary() {
        for v in ["y", "YES", "true", "1", "on", "yup"] {
            assert_eq!(parse_flag(v), Some(true), "{v}");
        }
        for v in ["n", "No", "false", "0", "off", "nope"] {
            assert_eq!(parse_flag(v), Some(false), "{v}");
        }
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn form_fields_map_onto_request() {
        let params: HashMap<String, String> = [
            ("subject", "who:12345"),
            ("expr", "1 |x|"),
            ("primitive", "yes"),
            ("shorturis", "maybe"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let req = ConversionRequest::from_form(&params);
        assert!(req.primitive);
        assert!(!req.shorten_uris);
        assert_eq!(req.format, DEFAULT_FORMAT);
    }

    #[test]
    fn subject_is_expanded_and_whitespace_removed() {
        let service = ConversionService::new(Capture::default()).unwrap();
        let mut req = ConversionRequest::new("who:12345", "64572001 | Disease |:\n\t{ 1 = 2 }");
        req.format = "nt".into();
        service.convert(&req).unwrap();
        let seen = service.parser().last.lock().clone().unwrap();
        assert_eq!(seen.subject, format!("{}12345", vocab::WHO_NS));
        assert_eq!(seen.expression, "64572001|Disease|:{1=2}");
        assert_eq!(seen.mode, DefinitionMode::FullyDefined);
    }

    #[test]
    fn converter_failure_is_400() {
        let service = ConversionService::new(Capture {
            refuse: true,
            ..Capture::default()
        })
        .unwrap();
        let err = service.convert(&ConversionRequest::new("1", "x")).unwrap_err();
        assert_eq!(err, ServiceFailure::bad_request(UNABLE_TO_CONVERT));
    }

    #[test]
    fn unknown_format_is_400() {
        let service = ConversionService::new(Capture::default()).unwrap();
        let mut req = ConversionRequest::new("1", "x");
        req.format = "json-ld".into();
        let err = service.convert(&req).unwrap_err();
        assert_eq!(err.status, 400);
        assert!(err.message.contains("E_FORMAT"));
    }

    #[test]
    fn options_shorten_and_strip() {
        let service = ConversionService::new(Capture::default()).unwrap();
        let mut req = ConversionRequest::new("12345", "64572001");
        req.format = "turtle".into();
        req.shorten_uris = true;
        req.strip_artifacts = true;
        let out = service.convert(&req).unwrap();
        assert!(out.contains("who:12345"));
        assert!(out.contains("sctid:64572001"));
        assert!(!out.contains("owl:Class"));
        assert!(service.formats().contains(&"pretty-xml"));
    }
}
