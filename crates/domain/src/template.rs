//! Template parser for `{{path}}` references.
//!
//! A template is parsed once into a sequence of literal and reference
//! segments; evaluation against a [`VariableScope`](crate::variables::VariableScope)
//! happens separately and never mutates the template.

/// A parsed template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

/// One piece of a [`Template`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied verbatim to the output.
    Literal(String),
    /// A `{{path}}` reference to a scope variable.
    Reference(Reference),
}

/// A variable reference such as `{{device.battery}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    raw: String,
    path: Vec<String>,
}

impl Reference {
    /// The reference exactly as written, braces included.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Dot-separated path segments; the first one names the variable.
    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// The path joined back with dots, whitespace removed.
    #[must_use]
    pub fn dotted(&self) -> String {
        self.path.join(".")
    }
}

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

impl Template {
    /// Parse `input` into literal and reference segments.
    ///
    /// Unterminated `{{` and empty `{{}}` are kept as literal text.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = input;

        while let Some(open) = rest.find(OPEN) {
            let after_open = &rest[open + OPEN.len()..];
            let Some(close) = after_open.find(CLOSE) else {
                break;
            };
            let inner = &after_open[..close];

            // `{{ a {{b}}`: the innermost opening brace wins.
            if let Some(nested) = inner.rfind(OPEN) {
                let skip = open + OPEN.len() + nested;
                literal.push_str(&rest[..skip]);
                rest = &rest[skip..];
                continue;
            }

            let raw_end = open + OPEN.len() + close + CLOSE.len();
            let raw = &rest[open..raw_end];
            let trimmed = inner.trim();

            literal.push_str(&rest[..open]);
            if trimmed.is_empty() {
                literal.push_str(raw);
            } else {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Reference(Reference {
                    raw: raw.to_string(),
                    path: trimmed.split('.').map(|s| s.trim().to_string()).collect(),
                }));
            }
            rest = &rest[raw_end..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    /// Segments in source order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether the template contains at least one reference.
    #[must_use]
    pub fn has_references(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Reference(_)))
    }

    /// The reference when the whole template is a single `{{path}}`.
    #[must_use]
    pub fn as_single_reference(&self) -> Option<&Reference> {
        match self.segments.as_slice() {
            [Segment::Reference(reference)] => Some(reference),
            _ => None,
        }
    }
}
