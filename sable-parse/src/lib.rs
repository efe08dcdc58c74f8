#![forbid(unsafe_code)]

mod error;
mod fmt;
mod parser;

use miette::IntoDiagnostic;
use sable_ast::{Expr, Module, TypeExpr};
use sable_lex::{LexError, Lexer};
use tracing::debug;

pub use error::ParseError;
pub use fmt::{format_expr, format_module, format_pattern, format_type, format_type_decl};
pub use parser::Parser;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseConfig {
    /// Maximum syntactic nesting of expressions, types and patterns. Each
    /// binary operator, field access or `,` call in a chain counts as one
    /// level.
    pub max_depth: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self { max_depth: 40 }
    }
}

/// Best-effort result of parsing a module that may contain errors.
#[derive(Clone, Debug)]
pub struct ParseOutput {
    pub module: Module,
    pub lex_errors: Vec<LexError>,
    pub parse_errors: Vec<ParseError>,
}

impl ParseOutput {
    pub fn has_errors(&self) -> bool {
        !self.lex_errors.is_empty() || !self.parse_errors.is_empty()
    }
}

pub fn parse_source(src: &str) -> miette::Result<Module> {
    parse_source_with_config(src, &ParseConfig::default())
}

pub fn parse_source_with_config(src: &str, config: &ParseConfig) -> miette::Result<Module> {
    let tokens = Lexer::new(src).lex().into_diagnostic()?;
    let mut parser = Parser::new_with_config(&tokens, config);
    parser.parse_module().into_diagnostic()
}

/// Parse a module while recovering from lexical and syntax errors.
///
/// Lines that fail to lex are dropped; declarations that fail to parse are
/// skipped up to the next top-level declaration.
pub fn parse_source_with_recovery(src: &str, config: &ParseConfig) -> ParseOutput {
    let (tokens, lex_errors) = Lexer::new(src).lex_with_recovery();
    let mut parser = Parser::new_with_config(&tokens, config);
    let (module, parse_errors) = parser.parse_module_with_recovery();
    debug!(
        target: "sable::parse",
        items = module.items.len(),
        lex_errors = lex_errors.len(),
        parse_errors = parse_errors.len(),
        "parsed module"
    );
    ParseOutput {
        module,
        lex_errors,
        parse_errors,
    }
}

pub fn parse_type(src: &str) -> miette::Result<TypeExpr> {
    let tokens = Lexer::new(src).lex().into_diagnostic()?;
    let mut parser = Parser::new(&tokens);
    parser.parse_type_eof().into_diagnostic()
}

pub fn parse_expr(src: &str) -> miette::Result<Expr> {
    let tokens = Lexer::new(src).lex().into_diagnostic()?;
    let mut parser = Parser::new(&tokens);
    parser.parse_expr_eof().into_diagnostic()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_ast::{ExprKind, ItemKind, PatternKind, TypeBody, TypeExprKind};

    #[test]
    fn pipe_call_puts_subject_first() {
        let expr = parse_expr("a f b").unwrap();
        let ExprKind::Call { callee, args } = &expr.kind else {
            panic!("expected call, got {expr:?}");
        };
        assert!(matches!(&callee.kind, ExprKind::Var { path, .. } if path.name.node == "f"));
        assert_eq!(args.len(), 2);
        assert!(matches!(&args[0].kind, ExprKind::Var { path, .. } if path.name.node == "a"));
    }

    #[test]
    fn comma_chains_left_to_right() {
        let expr = parse_expr("x foo, bar").unwrap();
        assert_eq!(format_expr(&expr), "(x foo) bar");
        let ExprKind::Call { callee, args } = &expr.kind else {
            panic!("expected call");
        };
        assert!(matches!(&callee.kind, ExprKind::Var { path, .. } if path.name.node == "bar"));
        assert!(matches!(&args[0].kind, ExprKind::Call { .. }));
    }

    #[test]
    fn arithmetic_precedence() {
        let expr = parse_expr("1 + 2 * 3 - 4").unwrap();
        assert_eq!(format_expr(&expr), "1 + 2 * 3 - 4");
        let expr = parse_expr("(1 + 2) * 3").unwrap();
        assert_eq!(format_expr(&expr), "(1 + 2) * 3");
    }

    #[test]
    fn pipe_binds_tighter_than_arithmetic() {
        let expr = parse_expr("a f + b g").unwrap();
        let ExprKind::Binary { lhs, rhs, .. } = &expr.kind else {
            panic!("expected binary");
        };
        assert!(matches!(lhs.kind, ExprKind::Call { .. }));
        assert!(matches!(rhs.kind, ExprKind::Call { .. }));
    }

    #[test]
    fn brace_forms() {
        assert!(matches!(parse_expr("{}").unwrap().kind, ExprKind::Tuple(ref v) if v.is_empty()));
        assert!(matches!(parse_expr("{1; 2}").unwrap().kind, ExprKind::Tuple(ref v) if v.len() == 2));
        assert!(matches!(parse_expr("{x 1,}").unwrap().kind, ExprKind::Record(ref v) if v.len() == 1));
        assert!(matches!(parse_expr("{x 1, y 2}").unwrap().kind, ExprKind::Record(ref v) if v.len() == 2));
        assert!(matches!(parse_expr("{a f; b}").unwrap().kind, ExprKind::Tuple(ref v) if v.len() == 2));
    }

    #[test]
    fn record_field_pun() {
        let expr = parse_expr("{x, y}").unwrap();
        let ExprKind::Record(fields) = &expr.kind else {
            panic!("expected record");
        };
        assert!(matches!(&fields[1].value.kind, ExprKind::Var { path, .. } if path.name.node == "y"));
    }

    #[test]
    fn commas_inside_lists_separate_elements() {
        let expr = parse_expr("[a f, b]").unwrap();
        assert!(matches!(expr.kind, ExprKind::List(ref v) if v.len() == 2));
    }

    #[test]
    fn tags_and_qualified_values() {
        let expr = parse_expr("Some 1").unwrap();
        assert!(matches!(expr.kind, ExprKind::Tag { payload: Some(_), .. }));
        let expr = parse_expr("Geo.origin").unwrap();
        assert!(matches!(&expr.kind, ExprKind::Var { path, .. } if path.qualifier.is_some()));
        let expr = parse_expr("Geo.Circle 1.0").unwrap();
        assert!(matches!(&expr.kind, ExprKind::Tag { path, payload: Some(_), .. } if path.qualifier.is_some()));
    }

    #[test]
    fn field_access_is_postfix() {
        let expr = parse_expr("p.x f").unwrap();
        let ExprKind::Call { args, .. } = &expr.kind else {
            panic!("expected call");
        };
        assert!(matches!(args[0].kind, ExprKind::Field { .. }));
    }

    #[test]
    fn rest_patterns() {
        let module = parse_source("f = xs -> xs : | [a, ..rest] -> a | [] -> 0\n").unwrap();
        let ItemKind::Value(decl) = &module.items[0].kind else {
            panic!("expected value");
        };
        let ExprKind::Lambda { body, .. } = &decl.value.kind else {
            panic!("expected lambda");
        };
        let ExprKind::Match { arms, .. } = &body.kind else {
            panic!("expected match");
        };
        assert!(matches!(
            &arms[0].pattern.kind,
            PatternKind::List { items, rest: Some(r) } if items.len() == 1 && r.name.is_some()
        ));
    }

    #[test]
    fn length_family_declaration() {
        let src = "typ pub Vec T {len U32} = len : | 0 -> {} | len -> {T; Vec T {len (len sub 1)}}\n";
        let module = parse_source(src).unwrap();
        let ItemKind::Type(decl) = &module.items[0].kind else {
            panic!("expected type decl");
        };
        assert!(decl.vis.is_public());
        assert_eq!(decl.params.len(), 2);
        let TypeBody::LengthMatch(m) = &decl.body else {
            panic!("expected length match");
        };
        assert_eq!(m.arms.len(), 2);
        let TypeExprKind::Tuple(items) = &m.arms[1].body.kind else {
            panic!("expected tuple arm");
        };
        assert!(matches!(&items[1].kind, TypeExprKind::Named { args, .. } if args.len() == 2));
        assert_eq!(format_type_decl(decl), src.trim_end());
    }

    #[test]
    fn function_types_flatten() {
        let ty = parse_type("A -> (A -> B) -> B").unwrap();
        let TypeExprKind::Function { params, .. } = &ty.kind else {
            panic!("expected function");
        };
        assert_eq!(params.len(), 2);
        assert_eq!(format_type(&ty), "A -> (A -> B) -> B");
    }

    #[test]
    fn nesting_limit_is_enforced() {
        let src = format!("x = {}1{}\n", "(".repeat(20), ")".repeat(20));
        let config = ParseConfig { max_depth: 16 };
        let err = parse_source_with_config(&src, &config).unwrap_err();
        assert!(err.to_string().contains("shallower"), "{err}");
        parse_source(&src).unwrap();
    }
}
