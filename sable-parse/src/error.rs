#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use miette::Diagnostic;
use sable_ast::Span;
use thiserror::Error;

#[derive(Clone, Debug, Error, Diagnostic)]
#[error("parse error: expected {expected}, found {found}")]
#[diagnostic(code(sable::parse))]
#[allow(unused_assignments)]
pub struct ParseError {
    pub expected: String,
    pub found: String,
    #[label("expected {expected}")]
    pub span: Span,
}
