//! Finding grammar expressions inside free-text annotations.
//!
//! Rules are tried in order and the first one whose pattern matches decides
//! the outcome, even when what it extracts turns out to be empty. When a
//! comment carries several markers, the marker rules read from the last one
//! they can use.

use std::sync::OnceLock;

use regex::Regex;

const MARKER: &str = r"Expression \((?:pre|post)[-_]coordinated\)";

pub trait ExtractionRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Raw captured text when the rule applies, untrimmed.
    fn try_extract<'t>(&self, text: &'t str) -> Option<&'t str>;
}

/// Marker followed by the expression and then a reference URL, which is
/// dropped together with everything after it.
pub struct MarkerBeforeUrl {
    re: Regex,
}

impl MarkerBeforeUrl {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            re: Regex::new(&format!(r"[\s\S]*{MARKER}\s*([\s\S]*?)https?://"))?,
        })
    }
}

impl ExtractionRule for MarkerBeforeUrl {
    fn name(&self) -> &'static str {
        "marker-before-url"
    }

    fn try_extract<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.re.captures(text)?.get(1).map(|m| m.as_str())
    }
}

/// Marker followed by the expression up to the end of the text.
pub struct MarkerToEnd {
    re: Regex,
}

impl MarkerToEnd {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            re: Regex::new(&format!(r"[\s\S]*{MARKER}\s*([\s\S]*)"))?,
        })
    }
}

impl ExtractionRule for MarkerToEnd {
    fn name(&self) -> &'static str {
        "marker-to-end"
    }

    fn try_extract<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.re.captures(text)?.get(1).map(|m| m.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub rule: &'static str,
    pub expression: String,
}

pub struct ExpressionLocator {
    rules: Vec<Box<dyn ExtractionRule>>,
}

impl ExpressionLocator {
    /// The two marker rules, URL-bounded first.
    pub fn standard() -> Result<Self, regex::Error> {
        Ok(Self::with_rules(vec![
            Box::new(MarkerBeforeUrl::new()?),
            Box::new(MarkerToEnd::new()?),
        ]))
    }

    pub fn with_rules(rules: Vec<Box<dyn ExtractionRule>>) -> Self {
        Self { rules }
    }

    pub fn push_rule(&mut self, rule: Box<dyn ExtractionRule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn locate(&self, text: &str) -> Option<Extraction> {
        let (rule, raw) = self
            .rules
            .iter()
            .find_map(|rule| rule.try_extract(text).map(|raw| (rule.name(), raw)))?;
        let expression = raw.trim();
        if expression.is_empty() {
            tracing::debug!(rule, "rule matched but extracted nothing");
            return None;
        }
        Some(Extraction {
            rule,
            expression: expression.to_string(),
        })
    }

    pub fn extract(&self, text: &str) -> Option<String> {
        self.locate(text).map(|e| e.expression)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coordination {
    /// A single `id |term|` reference.
    SingleConcept,
    Compound,
}

pub fn classify(expression: &str) -> Coordination {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^\s*\d+\s*\|[^|]+\|\s*$").expect("single concept regex"));
    if re.is_match(expression) {
        Coordination::SingleConcept
    } else {
        Coordination::Compound
    }
}
