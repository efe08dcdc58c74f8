#![forbid(unsafe_code)]

//! Name resolution: binds every identifier to a declaration, rewrites family
//! applications to `DependentVec`, and enforces declaration rules.

use std::collections::HashMap;

use sable_ast::{
    BindingId, BlockItemKind, Expr, ExprKind, Ident, ItemKind, LengthExpr, LengthExprKind,
    LengthPattern, Module, Path, Pattern, PatternKind, Prim, QualName, RestPattern, Span, TagRes,
    TypeArg, TypeBody, TypeExpr, TypeExprKind, TypeParam, TypeRes, Visibility,
};
use tracing::debug;

use crate::error::SemanticError;
use crate::interface::Imports;
use crate::types::{PRELUDE, TypeDefKind, prelude_bool};

#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
    pub name: String,
    pub kind: BindingKind,
    pub vis: Visibility,
    pub scope: BindingScope,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BindingKind {
    /// A top-level `let`.
    Value,
    Param,
    /// A block `let` or `<-`.
    Local,
    PatternVar,
    CapabilityOp { capability: QualName, index: usize },
    /// A value exported by another module.
    Imported { qual: QualName },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingScope {
    Module,
    Local,
}

/// A module with every name occurrence resolved.
#[derive(Clone, Debug)]
pub struct ResolvedModule {
    pub name: String,
    pub module: Module,
    pub bindings: Vec<Binding>,
    /// Item index of the `def` that annotates a top-level value.
    pub signatures: HashMap<BindingId, usize>,
}

pub fn resolve_module(
    name: &str,
    mut module: Module,
    imports: &Imports,
) -> (ResolvedModule, Vec<SemanticError>) {
    let mut r = Resolver::new(name, imports);
    r.collect_imports(&module);
    r.collect_declarations(&mut module);
    let signatures = r.pair_signatures(&module);
    r.resolve_items(&mut module);
    debug!(
        target: "sable::resolve",
        module = name,
        bindings = r.bindings.len(),
        errors = r.errors.len(),
        "names resolved"
    );
    (
        ResolvedModule {
            name: name.to_string(),
            module,
            bindings: r.bindings,
            signatures,
        },
        r.errors,
    )
}

/// Type variables are a capital letter optionally followed by digits.
pub fn is_type_var_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase()) && chars.all(|c| c.is_ascii_digit())
}

struct LocalType {
    span: Span,
    is_family: bool,
}

/// Which names a type expression may use.
struct TypeScope<'s> {
    params: &'s [String],
    /// `None` lets any length variable through.
    lengths: Option<&'s [String]>,
    allow_self: bool,
}

struct Resolver<'a> {
    module_name: &'a str,
    imports: &'a Imports,
    /// Import alias to path; `None` when the import itself failed.
    aliases: HashMap<String, (Option<String>, Span)>,
    types: HashMap<String, LocalType>,
    capabilities: HashMap<String, Span>,
    tags: HashMap<String, (TagRes, Span)>,
    bindings: Vec<Binding>,
    scopes: Vec<HashMap<String, BindingId>>,
    imported: HashMap<QualName, BindingId>,
    errors: Vec<SemanticError>,
}

impl<'a> Resolver<'a> {
    fn new(module_name: &'a str, imports: &'a Imports) -> Self {
        let mut tags = HashMap::new();
        let bool_def = prelude_bool();
        if let TypeDefKind::Union(variants) = &bool_def.kind {
            for (index, v) in variants.iter().enumerate() {
                let res = TagRes {
                    ty: bool_def.name.clone(),
                    index,
                };
                tags.insert(v.tag.clone(), (res, sable_ast::span(0, 0)));
            }
        }
        Self {
            module_name,
            imports,
            aliases: HashMap::new(),
            types: HashMap::new(),
            capabilities: HashMap::new(),
            tags,
            bindings: Vec::new(),
            scopes: vec![HashMap::new()],
            imported: HashMap::new(),
            errors: Vec::new(),
        }
    }

    fn qual(&self, name: &str) -> QualName {
        QualName::new(self.module_name, name)
    }

    fn duplicate(&mut self, name: &Ident, previous: Span) {
        self.errors.push(SemanticError::DuplicateDeclaration {
            name: name.node.clone(),
            span: name.span,
            previous,
        });
    }

    fn unresolved(&mut self, name: impl Into<String>, span: Span) {
        self.errors.push(SemanticError::UnresolvedName {
            name: name.into(),
            span,
        });
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn add_binding(
        &mut self,
        name: &Ident,
        kind: BindingKind,
        vis: Visibility,
        scope: BindingScope,
    ) -> BindingId {
        let id = BindingId(self.bindings.len() as u32);
        self.bindings.push(Binding {
            name: name.node.clone(),
            kind,
            vis,
            scope,
            span: name.span,
        });
        id
    }

    /// Bind `name` in the innermost scope. Shadowing an outer scope is fine.
    fn define_val(&mut self, name: &Ident, kind: BindingKind) -> BindingId {
        let id = self.add_binding(name, kind, Visibility::Private, BindingScope::Local);
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.node.clone(), id);
        }
        id
    }

    fn define_top(&mut self, name: &Ident, kind: BindingKind, vis: Visibility) -> BindingId {
        if let Some(&prev) = self.scopes[0].get(&name.node) {
            let previous = self.bindings[prev.0 as usize].span;
            self.duplicate(name, previous);
        }
        let id = self.add_binding(name, kind, vis, BindingScope::Module);
        self.scopes[0].insert(name.node.clone(), id);
        id
    }

    fn lookup_val(&self, name: &str) -> Option<BindingId> {
        self.scopes.iter().rev().find_map(|s| s.get(name).copied())
    }

    fn collect_imports(&mut self, module: &Module) {
        for item in &module.items {
            let ItemKind::Import(import) = &item.kind else {
                continue;
            };
            if let Some((_, prev)) = self.aliases.get(&import.alias.node) {
                let prev = *prev;
                self.duplicate(&import.alias, prev);
                continue;
            }
            let path = if self.imports.contains_key(&import.path.node) {
                Some(import.path.node.clone())
            } else {
                self.unresolved(import.path.node.clone(), import.path.span);
                None
            };
            self.aliases
                .insert(import.alias.node.clone(), (path, import.alias.span));
        }
    }

    fn collect_declarations(&mut self, module: &mut Module) {
        for item in &mut module.items {
            match &mut item.kind {
                ItemKind::Type(decl) => {
                    if let Some(prev) = self.types.get(&decl.name.node) {
                        let prev = prev.span;
                        self.duplicate(&decl.name, prev);
                        continue;
                    }
                    let is_family = matches!(decl.body, TypeBody::LengthMatch(_));
                    self.types.insert(
                        decl.name.node.clone(),
                        LocalType {
                            span: decl.name.span,
                            is_family,
                        },
                    );
                    if let TypeBody::Alias(TypeExpr {
                        kind: TypeExprKind::Union(variants),
                        ..
                    }) = &decl.body
                    {
                        let ty = QualName::new(self.module_name, decl.name.node.clone());
                        for (index, variant) in variants.iter().enumerate() {
                            if let Some((prev, span)) = self.tags.get(&variant.tag.node)
                                && prev.ty.module != PRELUDE
                            {
                                let span = *span;
                                self.duplicate(&variant.tag, span);
                                continue;
                            }
                            let res = TagRes {
                                ty: ty.clone(),
                                index,
                            };
                            self.tags
                                .insert(variant.tag.node.clone(), (res, variant.tag.span));
                        }
                    }
                }
                ItemKind::Capability(decl) => {
                    if let Some(&prev) = self.capabilities.get(&decl.name.node) {
                        self.duplicate(&decl.name, prev);
                        continue;
                    }
                    self.capabilities
                        .insert(decl.name.node.clone(), decl.name.span);
                    let capability = self.qual(&decl.name.node);
                    for (index, op) in decl.ops.iter_mut().enumerate() {
                        let kind = BindingKind::CapabilityOp {
                            capability: capability.clone(),
                            index,
                        };
                        op.binding = Some(self.define_top(&op.name, kind, decl.vis));
                    }
                }
                ItemKind::Value(decl) => {
                    decl.binding =
                        Some(self.define_top(&decl.name, BindingKind::Value, Visibility::Private));
                }
                _ => {}
            }
        }
    }

    /// Attach each `def` to the value binding that follows it and settle
    /// the binding's visibility.
    fn pair_signatures(&mut self, module: &Module) -> HashMap<BindingId, usize> {
        let mut signatures = HashMap::new();
        let mut seen: HashMap<String, Span> = HashMap::new();
        let mut annotated: HashMap<BindingId, Visibility> = HashMap::new();
        for (idx, item) in module.items.iter().enumerate() {
            let ItemKind::Signature(sig) = &item.kind else {
                continue;
            };
            if let Some(&prev) = seen.get(&sig.name.node) {
                self.duplicate(&sig.name, prev);
                continue;
            }
            seen.insert(sig.name.node.clone(), sig.name.span);
            let target = module.items[idx + 1..].iter().find_map(|it| match &it.kind {
                ItemKind::Value(v) if v.name.node == sig.name.node => v.binding,
                _ => None,
            });
            match target {
                Some(id) => {
                    signatures.insert(id, idx);
                    annotated.insert(id, sig.vis);
                }
                None => self.unresolved(sig.name.node.clone(), sig.name.span),
            }
        }
        for item in &module.items {
            let ItemKind::Value(decl) = &item.kind else {
                continue;
            };
            let Some(id) = decl.binding else {
                continue;
            };
            let vis = match annotated.get(&id) {
                Some(sig_vis) if sig_vis.is_public() || decl.vis.is_public() => {
                    Visibility::Public
                }
                Some(_) => Visibility::Private,
                None => {
                    if decl.vis.is_public() {
                        self.errors.push(SemanticError::Visibility {
                            name: decl.name.node.clone(),
                            span: decl.name.span,
                        });
                    }
                    Visibility::Private
                }
            };
            self.bindings[id.0 as usize].vis = vis;
        }
        signatures
    }

    fn resolve_items(&mut self, module: &mut Module) {
        for item in &mut module.items {
            match &mut item.kind {
                ItemKind::Import(_) => {}
                ItemKind::Type(decl) => {
                    let mut params = Vec::new();
                    let mut lengths = Vec::new();
                    for param in &mut decl.params {
                        match param {
                            TypeParam::Type(name) => params.push(name.node.clone()),
                            TypeParam::Value { name, ty, .. } => {
                                lengths.push(name.node.clone());
                                let scope = TypeScope {
                                    params: &[],
                                    lengths: Some(&[]),
                                    allow_self: false,
                                };
                                self.resolve_type(ty, &scope);
                            }
                        }
                    }
                    match &mut decl.body {
                        TypeBody::Alias(ty) => {
                            let scope = TypeScope {
                                params: &params,
                                lengths: Some(&lengths),
                                allow_self: false,
                            };
                            self.resolve_type(ty, &scope);
                        }
                        TypeBody::LengthMatch(m) => {
                            for arm in &mut m.arms {
                                let mut arm_lengths = lengths.clone();
                                if let LengthPattern::Bind(name) = &arm.pattern {
                                    arm_lengths.push(name.node.clone());
                                }
                                let scope = TypeScope {
                                    params: &params,
                                    lengths: Some(&arm_lengths),
                                    allow_self: false,
                                };
                                self.resolve_type(&mut arm.body, &scope);
                            }
                        }
                    }
                }
                ItemKind::Signature(sig) => {
                    let scope = TypeScope {
                        params: &[],
                        lengths: None,
                        allow_self: false,
                    };
                    self.resolve_type(&mut sig.ty, &scope);
                    for c in &mut sig.constraints {
                        self.resolve_type(&mut c.ty, &scope);
                        c.res = self.resolve_capability(&c.capability);
                    }
                }
                ItemKind::Value(decl) => self.resolve_expr(&mut decl.value),
                ItemKind::Capability(decl) => {
                    let scope = TypeScope {
                        params: &[],
                        lengths: None,
                        allow_self: true,
                    };
                    for op in &mut decl.ops {
                        self.resolve_type(&mut op.ty, &scope);
                    }
                }
                ItemKind::Implementation(decl) => {
                    decl.capability_res = self.resolve_capability(&decl.capability);
                    let scope = TypeScope {
                        params: &[],
                        lengths: None,
                        allow_self: false,
                    };
                    self.resolve_type(&mut decl.target, &scope);
                    let mut seen: HashMap<String, Span> = HashMap::new();
                    for member in &mut decl.members {
                        if let Some(&prev) = seen.get(&member.name.node) {
                            self.duplicate(&member.name, prev);
                        }
                        seen.insert(member.name.node.clone(), member.name.span);
                        self.resolve_expr(&mut member.value);
                    }
                }
                ItemKind::Test(test) => self.resolve_expr(&mut test.body),
            }
        }
    }

    fn resolve_capability(&mut self, path: &Path) -> Option<QualName> {
        match &path.qualifier {
            None => {
                if self.capabilities.contains_key(&path.name.node) {
                    return Some(self.qual(&path.name.node));
                }
            }
            Some(alias) => match self.aliases.get(&alias.node) {
                Some((None, _)) => return None,
                Some((Some(module), _)) => {
                    if let Some(cap) = self.imports[module].public_capability(&path.name.node) {
                        return Some(cap.name.clone());
                    }
                }
                None => {}
            },
        }
        self.unresolved(path.to_string(), path.span);
        None
    }

    fn resolve_type(&mut self, ty: &mut TypeExpr, scope: &TypeScope<'_>) {
        let span = ty.span;
        match &mut ty.kind {
            TypeExprKind::Named { path, args, res } => {
                for arg in args.iter_mut() {
                    match arg {
                        TypeArg::Type(t) => self.resolve_type(t, scope),
                        TypeArg::Length(l) => self.check_length(&l.value, scope),
                    }
                }
                let (resolved, is_family) = self.resolve_type_name(path, scope);
                *res = resolved;
                if is_family {
                    self.rewrite_family(ty);
                }
            }
            TypeExprKind::Tuple(items) => {
                for item in items {
                    self.resolve_type(item, scope);
                }
            }
            TypeExprKind::DependentVec { elem, len, .. } => {
                self.resolve_type(elem, scope);
                self.check_length(&len.value, scope);
            }
            TypeExprKind::Union(variants) => {
                for variant in variants {
                    if let Some(payload) = &mut variant.payload {
                        self.resolve_type(payload, scope);
                    }
                }
            }
            TypeExprKind::Record(fields) => {
                let mut seen: HashMap<String, Span> = HashMap::new();
                for field in fields {
                    if let Some(&prev) = seen.get(&field.name.node) {
                        self.duplicate(&field.name, prev);
                    }
                    seen.insert(field.name.node.clone(), field.name.span);
                    self.resolve_type(&mut field.ty, scope);
                }
            }
            TypeExprKind::Function { params, ret } => {
                for param in params {
                    self.resolve_type(param, scope);
                }
                self.resolve_type(ret, scope);
            }
            TypeExprKind::List(elem) => self.resolve_type(elem, scope),
            TypeExprKind::SelfType => {
                if !scope.allow_self {
                    self.errors.push(SemanticError::ty(
                        "`Self` is only allowed in capability operations",
                        span,
                    ));
                }
            }
        }
    }

    /// Returns the resolution and whether it names a length-indexed family.
    fn resolve_type_name(
        &mut self,
        path: &Path,
        scope: &TypeScope<'_>,
    ) -> (Option<TypeRes>, bool) {
        let name = &path.name.node;
        if let Some(alias) = &path.qualifier {
            match self.aliases.get(&alias.node) {
                Some((None, _)) => return (None, false),
                Some((Some(module), _)) => {
                    if let Some(def) = self.imports[module].public_type(name) {
                        let is_family = matches!(def.kind, TypeDefKind::Family(_));
                        return (Some(TypeRes::Decl(def.name.clone())), is_family);
                    }
                }
                None => {}
            }
            self.unresolved(path.to_string(), path.span);
            return (None, false);
        }
        if scope.params.iter().any(|p| p == name) {
            return (Some(TypeRes::Var(name.clone())), false);
        }
        if let Some(local) = self.types.get(name) {
            return (Some(TypeRes::Decl(self.qual(name))), local.is_family);
        }
        if let Some(prim) = Prim::from_name(name) {
            return (Some(TypeRes::Prim(prim)), false);
        }
        if name == "Bool" {
            return (Some(TypeRes::Decl(QualName::new(PRELUDE, "Bool"))), false);
        }
        if is_type_var_name(name) {
            return (Some(TypeRes::Var(name.clone())), false);
        }
        self.unresolved(name.clone(), path.span);
        (None, false)
    }

    /// `Vec T {len}` written as a named application becomes a `DependentVec`.
    fn rewrite_family(&mut self, ty: &mut TypeExpr) {
        let TypeExprKind::Named { path, args, res } = &mut ty.kind else {
            return;
        };
        let family = match res {
            Some(TypeRes::Decl(q)) => q.clone(),
            _ => return,
        };
        let mut taken = std::mem::take(args).into_iter();
        match (taken.next(), taken.next(), taken.next()) {
            (Some(TypeArg::Type(elem)), Some(TypeArg::Length(len)), None) => {
                ty.kind = TypeExprKind::DependentVec {
                    family: path.clone(),
                    elem: Box::new(elem),
                    len,
                    res: Some(family),
                };
            }
            _ => {
                self.errors.push(SemanticError::ty(
                    format!(
                        "`{}` takes an element type and a length, as in `{} T {{n}}`",
                        path, path
                    ),
                    ty.span,
                ));
                *res = None;
            }
        }
    }

    fn check_length(&mut self, len: &LengthExpr, scope: &TypeScope<'_>) {
        match &len.kind {
            LengthExprKind::Lit(_) => {}
            LengthExprKind::Var(name) => {
                if let Some(allowed) = scope.lengths
                    && !allowed.iter().any(|n| *n == name.node)
                {
                    self.unresolved(name.node.clone(), name.span);
                }
            }
            LengthExprKind::Apply { lhs, rhs, .. } => {
                self.check_length(lhs, scope);
                self.check_length(rhs, scope);
            }
        }
    }

    fn resolve_value_path(&mut self, path: &Path) -> Option<BindingId> {
        let name = &path.name.node;
        let Some(alias) = &path.qualifier else {
            let found = self.lookup_val(name);
            if found.is_none() {
                self.unresolved(name.clone(), path.span);
            }
            return found;
        };
        let module = match self.aliases.get(&alias.node) {
            Some((None, _)) => return None,
            Some((Some(module), _)) => module.clone(),
            None => {
                self.unresolved(path.to_string(), path.span);
                return None;
            }
        };
        let imports = self.imports;
        let interface = &imports[&module];
        let kind = if interface.values.contains_key(name) {
            BindingKind::Imported {
                qual: QualName::new(module.clone(), name.clone()),
            }
        } else if let Some((cap, index)) = interface.operation(name) {
            BindingKind::CapabilityOp {
                capability: cap.name.clone(),
                index,
            }
        } else {
            self.unresolved(path.to_string(), path.span);
            return None;
        };
        let qual = QualName::new(module, name.clone());
        if let Some(&id) = self.imported.get(&qual) {
            return Some(id);
        }
        let id = self.add_binding(&path.name, kind, Visibility::Private, BindingScope::Module);
        self.imported.insert(qual, id);
        Some(id)
    }

    fn resolve_tag(&mut self, path: &Path) -> Option<TagRes> {
        let name = &path.name.node;
        match &path.qualifier {
            None => {
                if let Some((res, _)) = self.tags.get(name) {
                    return Some(res.clone());
                }
            }
            Some(alias) => match self.aliases.get(&alias.node) {
                Some((None, _)) => return None,
                Some((Some(module), _)) => {
                    if let Some(res) = self.imports[module].tags.get(name) {
                        return Some(res.clone());
                    }
                }
                None => {}
            },
        }
        self.unresolved(path.to_string(), path.span);
        None
    }

    fn resolve_expr(&mut self, expr: &mut Expr) {
        match &mut expr.kind {
            ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Str(_) => {}
            ExprKind::Var { path, res } => *res = self.resolve_value_path(path),
            ExprKind::Tag { path, payload, res } => {
                *res = self.resolve_tag(path);
                if let Some(payload) = payload {
                    self.resolve_expr(payload);
                }
            }
            ExprKind::Call { callee, args } => {
                self.resolve_expr(callee);
                for arg in args {
                    self.resolve_expr(arg);
                }
            }
            ExprKind::Lambda { params, body } => {
                self.push_scope();
                let mut seen: HashMap<String, Span> = HashMap::new();
                for param in params.iter_mut() {
                    if let Some(&prev) = seen.get(&param.name.node) {
                        self.duplicate(&param.name, prev);
                    }
                    seen.insert(param.name.node.clone(), param.name.span);
                    param.binding = Some(self.define_val(&param.name, BindingKind::Param));
                }
                self.resolve_expr(body);
                self.pop_scope();
            }
            ExprKind::Match { scrutinee, arms } => {
                self.resolve_expr(scrutinee);
                for arm in arms {
                    self.push_scope();
                    let mut seen = HashMap::new();
                    self.resolve_pattern(&mut arm.pattern, &mut seen);
                    self.resolve_expr(&mut arm.body);
                    self.pop_scope();
                }
            }
            ExprKind::Tuple(items) | ExprKind::List(items) => {
                for item in items {
                    self.resolve_expr(item);
                }
            }
            ExprKind::Record(fields) => {
                let mut seen: HashMap<String, Span> = HashMap::new();
                for field in fields {
                    if let Some(&prev) = seen.get(&field.name.node) {
                        self.duplicate(&field.name, prev);
                    }
                    seen.insert(field.name.node.clone(), field.name.span);
                    self.resolve_expr(&mut field.value);
                }
            }
            ExprKind::Field { base, .. } => self.resolve_expr(base),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.resolve_expr(lhs);
                self.resolve_expr(rhs);
            }
            ExprKind::Unary { expr, .. } => self.resolve_expr(expr),
            ExprKind::Block(block) => {
                self.push_scope();
                for item in &mut block.items {
                    match &mut item.kind {
                        BlockItemKind::Let {
                            name,
                            binding,
                            value,
                        }
                        | BlockItemKind::Bind {
                            name,
                            binding,
                            value,
                        } => {
                            self.resolve_expr(value);
                            *binding = Some(self.define_val(name, BindingKind::Local));
                        }
                        BlockItemKind::Assert(e) | BlockItemKind::Expr(e) => self.resolve_expr(e),
                    }
                }
                self.resolve_expr(&mut block.result);
                self.pop_scope();
            }
        }
    }

    fn resolve_pattern(&mut self, pattern: &mut Pattern, seen: &mut HashMap<String, Span>) {
        match &mut pattern.kind {
            PatternKind::Wildcard
            | PatternKind::Int { .. }
            | PatternKind::Float(_)
            | PatternKind::Str(_) => {}
            PatternKind::Binding { name, binding } => {
                *binding = Some(self.bind_pattern_var(name, seen));
            }
            PatternKind::Tuple { items, rest } | PatternKind::List { items, rest } => {
                for item in items {
                    self.resolve_pattern(item, seen);
                }
                if let Some(rest) = rest {
                    self.resolve_rest(rest, seen);
                }
            }
            PatternKind::Record(fields) => {
                let mut names: HashMap<String, Span> = HashMap::new();
                for field in fields {
                    if let Some(&prev) = names.get(&field.name.node) {
                        self.duplicate(&field.name, prev);
                    }
                    names.insert(field.name.node.clone(), field.name.span);
                    self.resolve_pattern(&mut field.pattern, seen);
                }
            }
            PatternKind::Tag { path, payload, res } => {
                *res = self.resolve_tag(path);
                if let Some(payload) = payload {
                    self.resolve_pattern(payload, seen);
                }
            }
        }
    }

    fn resolve_rest(&mut self, rest: &mut RestPattern, seen: &mut HashMap<String, Span>) {
        if let Some(name) = &rest.name {
            let name = name.clone();
            rest.binding = Some(self.bind_pattern_var(&name, seen));
        }
    }

    fn bind_pattern_var(&mut self, name: &Ident, seen: &mut HashMap<String, Span>) -> BindingId {
        if let Some(&prev) = seen.get(&name.node) {
            self.duplicate(name, prev);
        }
        seen.insert(name.node.clone(), name.span);
        self.define_val(name, BindingKind::PatternVar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_variable_names() {
        assert!(is_type_var_name("A"));
        assert!(is_type_var_name("T2"));
        assert!(!is_type_var_name("Ab"));
        assert!(!is_type_var_name("a"));
        assert!(!is_type_var_name(""));
    }
}
