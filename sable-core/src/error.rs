#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use miette::Diagnostic;
use sable_ast::Span;
use thiserror::Error;

/// Errors and warnings produced after parsing: name resolution, type
/// checking, capability resolution and match analysis.
#[derive(Clone, Debug, Error, Diagnostic)]
pub enum SemanticError {
    #[error("unresolved name `{name}`")]
    #[diagnostic(code(sable::unresolved_name))]
    UnresolvedName {
        name: String,
        #[label("not found in this scope")]
        span: Span,
    },

    #[error("duplicate declaration of `{name}`")]
    #[diagnostic(code(sable::duplicate_declaration))]
    DuplicateDeclaration {
        name: String,
        #[label("declared again here")]
        span: Span,
        #[label("first declared here")]
        previous: Span,
    },

    #[error("`{name}` cannot be public without a preceding `def` signature")]
    #[diagnostic(
        code(sable::visibility),
        help("add `def pub {name} = <type>` before the binding")
    )]
    Visibility {
        name: String,
        #[label]
        span: Span,
    },

    #[error("type error: {message}")]
    #[diagnostic(code(sable::type_error))]
    Type {
        message: String,
        #[label]
        span: Span,
    },

    #[error("unsupported length expression: {message}")]
    #[diagnostic(
        code(sable::unsupported_length),
        help("lengths are literals, variables, or a variable plus or minus a literal")
    )]
    UnsupportedLengthExpr {
        message: String,
        #[label]
        span: Span,
    },

    #[error("type `{ty}` does not implement capability `{capability}`")]
    #[diagnostic(code(sable::missing_capability))]
    MissingCapability {
        ty: String,
        capability: String,
        #[label("`{capability}` required here")]
        span: Span,
    },

    #[error("ambiguous use of capability `{capability}`: {message}")]
    #[diagnostic(code(sable::ambiguous_capability))]
    AmbiguousCapability {
        capability: String,
        message: String,
        #[label]
        span: Span,
    },

    #[error("non-exhaustive match: missing {}", .missing.join(", "))]
    #[diagnostic(code(sable::exhaustiveness))]
    Exhaustiveness {
        missing: Vec<String>,
        #[label("patterns not covered")]
        span: Span,
    },

    #[error("unreachable pattern `{pattern}`")]
    #[diagnostic(code(sable::unreachable_pattern), severity(Warning))]
    UnreachablePattern {
        pattern: String,
        #[label("earlier arms already cover this")]
        span: Span,
    },

    #[error("recursion limit of {limit} exceeded in {context}")]
    #[diagnostic(
        code(sable::recursion_limit),
        help("raise `recursion-limit` in the checker configuration")
    )]
    RecursionLimitExceeded {
        limit: usize,
        context: String,
        #[label]
        span: Span,
    },
}

impl SemanticError {
    pub fn span(&self) -> Span {
        match self {
            SemanticError::UnresolvedName { span, .. }
            | SemanticError::DuplicateDeclaration { span, .. }
            | SemanticError::Visibility { span, .. }
            | SemanticError::Type { span, .. }
            | SemanticError::UnsupportedLengthExpr { span, .. }
            | SemanticError::MissingCapability { span, .. }
            | SemanticError::AmbiguousCapability { span, .. }
            | SemanticError::Exhaustiveness { span, .. }
            | SemanticError::UnreachablePattern { span, .. }
            | SemanticError::RecursionLimitExceeded { span, .. } => *span,
        }
    }

    /// Stable, machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            SemanticError::UnresolvedName { .. } => "UnresolvedName",
            SemanticError::DuplicateDeclaration { .. } => "DuplicateDeclaration",
            SemanticError::Visibility { .. } => "Visibility",
            SemanticError::Type { .. } => "TypeError",
            SemanticError::UnsupportedLengthExpr { .. } => "UnsupportedLengthExpr",
            SemanticError::MissingCapability { .. } => "MissingCapability",
            SemanticError::AmbiguousCapability { .. } => "AmbiguousCapability",
            SemanticError::Exhaustiveness { .. } => "Exhaustiveness",
            SemanticError::UnreachablePattern { .. } => "UnreachablePattern",
            SemanticError::RecursionLimitExceeded { .. } => "RecursionLimitExceeded",
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, SemanticError::UnreachablePattern { .. })
    }

    pub(crate) fn ty(message: impl Into<String>, span: Span) -> Self {
        SemanticError::Type {
            message: message.into(),
            span,
        }
    }
}
