#![forbid(unsafe_code)]

use sable_ast::{
    BinOp, Block, BlockItemKind, Constraint, Expr, ExprKind, Item, ItemKind, LengthArg,
    LengthExpr, LengthExprKind, LengthPattern, Module, Pattern, PatternKind, RestPattern, TypeArg,
    TypeBody, TypeDecl, TypeExpr, TypeExprKind, TypeParam, UnaryOp,
};
use sable_lex::TokenKind;

const INDENT: &str = "    ";

pub fn format_module(module: &Module) -> String {
    let mut out = String::new();
    for (i, item) in module.items.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        fmt_item(&mut out, item);
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

pub fn format_type(ty: &TypeExpr) -> String {
    let mut out = String::new();
    fmt_type(&mut out, ty);
    out
}

pub fn format_type_decl(decl: &TypeDecl) -> String {
    let mut out = String::new();
    fmt_type_decl(&mut out, decl);
    out
}

pub fn format_expr(expr: &Expr) -> String {
    let mut out = String::new();
    fmt_expr(&mut out, 0, expr, Prec::Lowest);
    out
}

pub fn format_pattern(pattern: &Pattern) -> String {
    let mut out = String::new();
    fmt_pattern(&mut out, pattern, false);
    out
}

fn fmt_item(out: &mut String, item: &Item) {
    for doc in &item.docs {
        out.push_str("doc ");
        out.push_str(&TokenKind::Str(doc.node.clone()).to_source());
        out.push('\n');
    }

    match &item.kind {
        ItemKind::Import(decl) => {
            out.push_str("import ");
            out.push_str(&decl.alias.node);
            out.push(' ');
            out.push_str(&TokenKind::Str(decl.path.node.clone()).to_source());
        }
        ItemKind::Type(decl) => fmt_type_decl(out, decl),
        ItemKind::Signature(decl) => {
            out.push_str("def ");
            if decl.vis.is_public() {
                out.push_str("pub ");
            }
            out.push_str(&decl.name.node);
            out.push_str(" = ");
            fmt_type(out, &decl.ty);
            fmt_constraints(out, &decl.constraints);
        }
        ItemKind::Value(decl) => {
            if decl.explicit_let {
                out.push_str("let ");
                if decl.vis.is_public() {
                    out.push_str("pub ");
                }
            }
            out.push_str(&decl.name.node);
            out.push_str(" = ");
            fmt_expr(out, 0, &decl.value, Prec::Lowest);
        }
        ItemKind::Capability(decl) => {
            out.push_str("has ");
            if decl.vis.is_public() {
                out.push_str("pub ");
            }
            out.push_str(&decl.name.node);
            out.push_str(" =");
            for op in &decl.ops {
                out.push('\n');
                out.push_str(INDENT);
                out.push_str(&op.name.node);
                out.push_str(" => ");
                fmt_type(out, &op.ty);
            }
        }
        ItemKind::Implementation(decl) => {
            out.push_str("trait ");
            out.push_str(&decl.capability.to_string());
            out.push(' ');
            fmt_type_arm(out, &decl.target);
            out.push_str(" =");
            for member in &decl.members {
                out.push('\n');
                out.push_str(INDENT);
                out.push_str(&member.name.node);
                out.push_str(" = ");
                fmt_expr(out, 1, &member.value, Prec::Lowest);
            }
        }
        ItemKind::Test(test) => {
            out.push_str("test ");
            out.push_str(&TokenKind::Str(test.name.node.clone()).to_source());
            out.push(' ');
            fmt_expr(out, 0, &test.body, Prec::Lowest);
        }
    }
}

fn fmt_constraints(out: &mut String, constraints: &[Constraint]) {
    for (i, c) in constraints.iter().enumerate() {
        out.push_str(if i == 0 { " where " } else { ", " });
        fmt_type_atom(out, &c.ty);
        out.push_str(" has ");
        out.push_str(&c.capability.to_string());
    }
}

fn fmt_type_decl(out: &mut String, decl: &TypeDecl) {
    out.push_str("typ ");
    if decl.vis.is_public() {
        out.push_str("pub ");
    }
    out.push_str(&decl.name.node);
    for param in &decl.params {
        out.push(' ');
        match param {
            TypeParam::Type(name) => out.push_str(&name.node),
            TypeParam::Value { name, ty, .. } => {
                out.push('{');
                out.push_str(&name.node);
                out.push(' ');
                fmt_type(out, ty);
                out.push('}');
            }
        }
    }
    out.push_str(" = ");

    match &decl.body {
        TypeBody::Alias(ty) => fmt_type(out, ty),
        TypeBody::LengthMatch(m) => {
            out.push_str(&m.scrutinee.node);
            out.push_str(" :");
            for arm in &m.arms {
                out.push_str(" | ");
                match &arm.pattern {
                    LengthPattern::Literal(n) => out.push_str(&n.node.to_string()),
                    LengthPattern::Bind(name) => out.push_str(&name.node),
                    LengthPattern::Wildcard(_) => out.push('_'),
                }
                out.push_str(" -> ");
                if matches!(arm.body.kind, TypeExprKind::Union(_)) {
                    fmt_parens(out, |out| fmt_type(out, &arm.body));
                } else {
                    fmt_type(out, &arm.body);
                }
            }
        }
    }
}

fn fmt_type(out: &mut String, ty: &TypeExpr) {
    match &ty.kind {
        TypeExprKind::Function { params, ret } => {
            for param in params {
                if matches!(
                    param.kind,
                    TypeExprKind::Function { .. } | TypeExprKind::Union(_)
                ) {
                    fmt_parens(out, |out| fmt_type(out, param));
                } else {
                    fmt_type_arm(out, param);
                }
                out.push_str(" -> ");
            }
            if matches!(
                ret.kind,
                TypeExprKind::Function { .. } | TypeExprKind::Union(_)
            ) {
                fmt_parens(out, |out| fmt_type(out, ret));
            } else {
                fmt_type_arm(out, ret);
            }
        }
        _ => fmt_type_arm(out, ty),
    }
}

fn fmt_type_arm(out: &mut String, ty: &TypeExpr) {
    match &ty.kind {
        TypeExprKind::Union(variants) => {
            for (i, v) in variants.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str("| ");
                out.push_str(&v.tag.node);
                if let Some(payload) = &v.payload {
                    out.push(' ');
                    fmt_type_atom(out, payload);
                }
            }
        }
        TypeExprKind::Named { path, args, .. } => {
            out.push_str(&path.to_string());
            for arg in args {
                out.push(' ');
                match arg {
                    TypeArg::Type(t) => fmt_type_atom(out, t),
                    TypeArg::Length(len) => fmt_length_arg(out, len),
                }
            }
        }
        TypeExprKind::DependentVec {
            family, elem, len, ..
        } => {
            out.push_str(&family.to_string());
            out.push(' ');
            fmt_type_atom(out, elem);
            out.push(' ');
            fmt_length_arg(out, len);
        }
        TypeExprKind::Function { .. } => fmt_parens(out, |out| fmt_type(out, ty)),
        _ => fmt_type_atom(out, ty),
    }
}

fn fmt_type_atom(out: &mut String, ty: &TypeExpr) {
    match &ty.kind {
        TypeExprKind::SelfType => out.push_str("Self"),
        TypeExprKind::Named { path, args, .. } if args.is_empty() => {
            out.push_str(&path.to_string());
        }
        TypeExprKind::Tuple(items) => {
            out.push('{');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str("; ");
                }
                fmt_type(out, item);
            }
            out.push('}');
        }
        TypeExprKind::Record(fields) => {
            out.push('{');
            for (i, field) in fields.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&field.name.node);
                out.push(' ');
                fmt_type(out, &field.ty);
            }
            out.push('}');
        }
        TypeExprKind::List(elem) => {
            out.push('[');
            fmt_type(out, elem);
            out.push(']');
        }
        _ => fmt_parens(out, |out| fmt_type(out, ty)),
    }
}

fn fmt_length_arg(out: &mut String, arg: &LengthArg) {
    out.push('{');
    match &arg.param {
        Some(param) => {
            out.push_str(&param.node);
            out.push(' ');
            fmt_length_atom(out, &arg.value);
        }
        None => fmt_length_atom(out, &arg.value),
    }
    out.push('}');
}

fn fmt_length_atom(out: &mut String, len: &LengthExpr) {
    match &len.kind {
        LengthExprKind::Lit(n) => out.push_str(&n.to_string()),
        LengthExprKind::Var(name) => out.push_str(&name.node),
        LengthExprKind::Apply { op, lhs, rhs } => {
            out.push('(');
            fmt_length_atom(out, lhs);
            out.push(' ');
            out.push_str(&op.node);
            out.push(' ');
            fmt_length_atom(out, rhs);
            out.push(')');
        }
    }
}

fn fmt_parens(out: &mut String, f: impl FnOnce(&mut String)) {
    out.push('(');
    f(out);
    out.push(')');
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Prec {
    Lowest,
    Chain,
    Cmp,
    Add,
    Mul,
    Unary,
    Pipe,
    Postfix,
}

fn expr_prec(expr: &Expr) -> Prec {
    match &expr.kind {
        ExprKind::Lambda { .. } | ExprKind::Match { .. } => Prec::Lowest,
        ExprKind::Binary { op, .. } if op.is_comparison() => Prec::Cmp,
        ExprKind::Binary {
            op: BinOp::Add | BinOp::Sub,
            ..
        } => Prec::Add,
        ExprKind::Binary { .. } => Prec::Mul,
        ExprKind::Unary { .. } => Prec::Unary,
        ExprKind::Call { .. } => Prec::Pipe,
        ExprKind::Tag {
            payload: Some(_), ..
        } => Prec::Pipe,
        _ => Prec::Postfix,
    }
}

fn fmt_expr(out: &mut String, indent: usize, expr: &Expr, min: Prec) {
    // A bare tag swallows a following atom as its payload.
    let bare_tag = matches!(expr.kind, ExprKind::Tag { payload: None, .. }) && min >= Prec::Pipe;
    if expr_prec(expr) < min || bare_tag {
        out.push('(');
        fmt_expr_inner(out, indent, expr);
        out.push(')');
    } else {
        fmt_expr_inner(out, indent, expr);
    }
}

fn fmt_expr_inner(out: &mut String, indent: usize, expr: &Expr) {
    match &expr.kind {
        ExprKind::Int(n) => out.push_str(&n.to_string()),
        ExprKind::Float(x) => out.push_str(&TokenKind::Float(*x).to_source()),
        ExprKind::Str(s) => out.push_str(&TokenKind::Str(s.clone()).to_source()),
        ExprKind::Var { path, .. } => out.push_str(&path.to_string()),
        ExprKind::Tag { path, payload, .. } => {
            out.push_str(&path.to_string());
            if let Some(payload) = payload {
                out.push(' ');
                fmt_expr(out, indent, payload, Prec::Postfix);
            }
        }
        ExprKind::Call { callee, args } => {
            let Some((subject, rest)) = args.split_first() else {
                fmt_expr(out, indent, callee, Prec::Postfix);
                return;
            };
            fmt_expr(out, indent, subject, Prec::Postfix);
            out.push(' ');
            fmt_expr(out, indent, callee, Prec::Postfix);
            for arg in rest {
                out.push(' ');
                fmt_expr(out, indent, arg, Prec::Postfix);
            }
        }
        ExprKind::Lambda { params, body } => {
            for p in params {
                out.push_str(&p.name.node);
                out.push(' ');
            }
            out.push_str("-> ");
            fmt_expr(out, indent, body, Prec::Lowest);
        }
        ExprKind::Match { scrutinee, arms } => {
            fmt_expr(out, indent, scrutinee, Prec::Chain);
            out.push_str(" :");
            for arm in arms {
                out.push_str(" | ");
                fmt_pattern(out, &arm.pattern, false);
                out.push_str(" -> ");
                // Arm results stop at the next `|`, so nested matches need parentheses.
                let min = match &arm.body.kind {
                    ExprKind::Lambda { .. } | ExprKind::Match { .. } => Prec::Chain,
                    _ => Prec::Lowest,
                };
                fmt_expr(out, indent, &arm.body, min);
            }
        }
        ExprKind::Tuple(items) => {
            out.push('{');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str("; ");
                }
                fmt_expr(out, indent, item, Prec::Lowest);
            }
            out.push('}');
        }
        ExprKind::Record(fields) => {
            out.push('{');
            for (i, field) in fields.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&field.name.node);
                out.push(' ');
                fmt_expr(out, indent, &field.value, Prec::Lowest);
            }
            if fields.len() == 1 {
                out.push(',');
            }
            out.push('}');
        }
        ExprKind::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                fmt_expr(out, indent, item, Prec::Lowest);
            }
            out.push(']');
        }
        ExprKind::Field { base, field } => {
            fmt_expr(out, indent, base, Prec::Postfix);
            out.push('.');
            out.push_str(&field.node);
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let (left, right) = match op {
                op if op.is_comparison() => (Prec::Add, Prec::Add),
                BinOp::Add | BinOp::Sub => (Prec::Add, Prec::Mul),
                _ => (Prec::Mul, Prec::Unary),
            };
            fmt_expr(out, indent, lhs, left);
            out.push(' ');
            out.push_str(op.symbol());
            out.push(' ');
            fmt_expr(out, indent, rhs, right);
        }
        ExprKind::Unary { op, expr } => {
            match op {
                UnaryOp::Neg => out.push('-'),
            }
            fmt_expr(out, indent, expr, Prec::Pipe);
        }
        ExprKind::Block(block) => fmt_block(out, indent, block),
    }
}

fn fmt_block(out: &mut String, indent: usize, block: &Block) {
    out.push_str("(\n");
    let inner = indent + 1;
    for item in &block.items {
        indent_line(out, inner);
        match &item.kind {
            BlockItemKind::Let { name, value, .. } => {
                out.push_str("let ");
                out.push_str(&name.node);
                out.push_str(" = ");
                fmt_expr(out, inner, value, Prec::Lowest);
            }
            BlockItemKind::Bind { name, value, .. } => {
                out.push_str(&name.node);
                out.push_str(" <- ");
                fmt_expr(out, inner, value, Prec::Lowest);
            }
            BlockItemKind::Assert(e) => {
                out.push_str("assert ");
                fmt_expr(out, inner, e, Prec::Lowest);
            }
            BlockItemKind::Expr(e) => fmt_expr(out, inner, e, Prec::Lowest),
        }
        out.push('\n');
    }
    indent_line(out, inner);
    fmt_expr(out, inner, &block.result, Prec::Lowest);
    out.push(')');
}

fn indent_line(out: &mut String, indent: usize) {
    for _ in 0..indent {
        out.push_str(INDENT);
    }
}

fn fmt_pattern(out: &mut String, pattern: &Pattern, as_payload: bool) {
    match &pattern.kind {
        PatternKind::Wildcard => out.push('_'),
        PatternKind::Binding { name, .. } => out.push_str(&name.node),
        PatternKind::Int { value, negative } => {
            if *negative && as_payload {
                out.push_str(&format!("(-{value})"));
            } else if *negative {
                out.push_str(&format!("-{value}"));
            } else {
                out.push_str(&value.to_string());
            }
        }
        PatternKind::Float(x) => {
            let text = TokenKind::Float(x.abs()).to_source();
            match (x.is_sign_negative(), as_payload) {
                (true, true) => out.push_str(&format!("(-{text})")),
                (true, false) => out.push_str(&format!("-{text}")),
                _ => out.push_str(&text),
            }
        }
        PatternKind::Str(s) => out.push_str(&TokenKind::Str(s.clone()).to_source()),
        PatternKind::Tuple { items, rest } => {
            out.push('{');
            fmt_pattern_seq(out, items, rest.as_ref(), "; ");
            out.push('}');
        }
        PatternKind::Record(fields) => {
            out.push('{');
            for (i, field) in fields.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&field.name.node);
                if !field.punned {
                    out.push(' ');
                    fmt_pattern(out, &field.pattern, false);
                }
            }
            if fields.len() == 1 {
                out.push(',');
            }
            out.push('}');
        }
        PatternKind::Tag { path, payload, .. } => {
            let nested = as_payload && payload.is_some();
            if nested {
                out.push('(');
            }
            out.push_str(&path.to_string());
            if let Some(payload) = payload {
                out.push(' ');
                fmt_pattern(out, payload, true);
            }
            if nested {
                out.push(')');
            }
        }
        PatternKind::List { items, rest } => {
            out.push('[');
            fmt_pattern_seq(out, items, rest.as_ref(), ", ");
            out.push(']');
        }
    }
}

fn fmt_pattern_seq(out: &mut String, items: &[Pattern], rest: Option<&RestPattern>, sep: &str) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        fmt_pattern(out, item, false);
    }
    if let Some(rest) = rest {
        if !items.is_empty() {
            out.push_str(sep);
        }
        out.push_str("..");
        if let Some(name) = &rest.name {
            out.push_str(&name.node);
        }
    }
}
