#![forbid(unsafe_code)]

//! One diagnostic shape for every stage, so reports can be sorted, rendered
//! and serialized without caring where a problem was found.

use std::fmt;

use miette::{GraphicalReportHandler, GraphicalTheme, LabeledSpan, NamedSource};
use sable_ast::Span;
use sable_core::SemanticError;
use sable_lex::LexError;
use sable_parse::ParseError;
use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn display(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Label {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(serialize_with = "span_range")]
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable kind name, e.g. `TypeError` or `ImportCycle`.
    pub kind: &'static str,
    /// miette code, e.g. `sable::type_error`.
    pub code: String,
    pub message: String,
    /// Primary location; diagnostics are ordered by its offset.
    #[serde(serialize_with = "span_range")]
    pub span: Span,
    pub labels: Vec<Label>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        kind: &'static str,
        code: impl Into<String>,
        message: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            severity,
            kind,
            code: code.into(),
            message: message.into(),
            span,
            labels: vec![Label {
                message: None,
                span,
            }],
            help: None,
        }
    }

    pub fn with_label(mut self, message: impl Into<String>) -> Self {
        if let Some(first) = self.labels.first_mut() {
            first.message = Some(message.into());
        }
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Copy code, labels and help out of a stage's own diagnostic.
    fn capture(
        source: &dyn miette::Diagnostic,
        severity: Severity,
        kind: &'static str,
        span: Span,
    ) -> Self {
        let labels: Vec<Label> = source
            .labels()
            .into_iter()
            .flatten()
            .map(|l| Label {
                message: l.label().map(str::to_string),
                span: *l.inner(),
            })
            .collect();
        Self {
            severity,
            kind,
            code: source.code().map(|c| c.to_string()).unwrap_or_default(),
            message: source.to_string(),
            span,
            labels,
            help: source.help().map(|h| h.to_string()),
        }
    }
}

impl From<&LexError> for Diagnostic {
    fn from(err: &LexError) -> Self {
        Diagnostic::capture(err, Severity::Error, "LexError", err.span)
    }
}

impl From<&ParseError> for Diagnostic {
    fn from(err: &ParseError) -> Self {
        Diagnostic::capture(err, Severity::Error, "ParseError", err.span)
    }
}

impl From<&SemanticError> for Diagnostic {
    fn from(err: &SemanticError) -> Self {
        let severity = if err.is_warning() {
            Severity::Warning
        } else {
            Severity::Error
        };
        Diagnostic::capture(err, severity, err.kind(), err.span())
    }
}

impl miette::Diagnostic for Diagnostic {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        if self.code.is_empty() {
            None
        } else {
            Some(Box::new(&self.code) as Box<dyn fmt::Display + 'a>)
        }
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(match self.severity {
            Severity::Error => miette::Severity::Error,
            Severity::Warning => miette::Severity::Warning,
            Severity::Info => miette::Severity::Advice,
        })
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display + 'a>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        Some(Box::new(
            self.labels
                .iter()
                .map(|l| LabeledSpan::new_with_span(l.message.clone(), l.span)),
        ))
    }
}

/// Order by position; ties keep their original order.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by_key(|d| d.span.offset());
}

/// Render diagnostics against their source with miette's graphical
/// handler, without colors.
pub fn render_diagnostics(name: &str, source: &str, diagnostics: &[Diagnostic]) -> String {
    let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
    let mut out = String::new();
    for diagnostic in diagnostics {
        let report = miette::Report::new(diagnostic.clone())
            .with_source_code(NamedSource::new(name, source.to_string()));
        if handler.render_report(&mut out, &*report).is_err() {
            out.push_str(&format!("{}: {}\n", diagnostic.severity.display(), diagnostic));
        }
    }
    out
}

#[derive(Serialize)]
struct SpanRange {
    offset: usize,
    len: usize,
}

fn span_range<S: Serializer>(span: &Span, serializer: S) -> Result<S::Ok, S::Error> {
    SpanRange {
        offset: span.offset(),
        len: span.len(),
    }
    .serialize(serializer)
}
