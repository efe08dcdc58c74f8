#![forbid(unsafe_code)]

//! Lowering of written types to [`Ty`], and of type declarations and
//! signatures to their checked forms.

use std::collections::HashMap;

use sable_ast::{
    BindingId, ItemKind, LengthArm, LengthExpr, LengthExprKind, LengthMatch, LengthPattern, Prim,
    QualName, TypeArg, TypeBody, TypeDecl, TypeExpr, TypeExprKind, TypeParam, TypeRes,
};

use crate::check::ModuleChecker;
use crate::error::SemanticError;
use crate::types::{FamilyDef, Len, LenBase, Scheme, Ty, TypeDef, TypeDefKind, VariantDef, prelude_bool};

/// How unbound variable names are treated while lowering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VarMode {
    /// Quantified: each new name gets the next `Gen` index.
    Generic,
    /// Only names bound up front are allowed.
    Closed,
}

pub(crate) struct LowerCtx {
    mode: VarMode,
    ty_vars: Vec<(String, Ty)>,
    len_vars: Vec<(String, Len)>,
    self_ty: Option<Ty>,
    next_ty: u32,
    next_len: u32,
}

impl LowerCtx {
    fn new(mode: VarMode) -> Self {
        Self {
            mode,
            ty_vars: Vec::new(),
            len_vars: Vec::new(),
            self_ty: None,
            next_ty: 0,
            next_len: 0,
        }
    }

    pub fn generic() -> Self {
        Self::new(VarMode::Generic)
    }

    /// Declaration bodies: `params` become `Gen(0..)`.
    pub fn closed(params: &[String]) -> Self {
        let mut ctx = Self::new(VarMode::Closed);
        for (i, p) in params.iter().enumerate() {
            ctx.ty_vars.push((p.clone(), Ty::Gen(i as u32)));
        }
        ctx
    }

    /// Capability operations: `Self` is `Gen(0)`.
    pub fn with_self(mut self) -> Self {
        self.self_ty = Some(Ty::Gen(self.next_ty));
        self.ty_vars.push(("Self".to_string(), Ty::Gen(self.next_ty)));
        self.next_ty += 1;
        self
    }

    /// Names of the quantified type variables, by index.
    pub fn ty_names(&self) -> Vec<String> {
        let mut names: Vec<(u32, &String)> = self
            .ty_vars
            .iter()
            .filter_map(|(n, t)| match t {
                Ty::Gen(i) => Some((*i, n)),
                _ => None,
            })
            .collect();
        names.sort();
        names.into_iter().map(|(_, n)| n.clone()).collect()
    }

    pub fn len_names(&self) -> Vec<String> {
        let mut names: Vec<(u32, &String)> = self
            .len_vars
            .iter()
            .filter_map(|(n, l)| match l.base {
                LenBase::Gen(i) if l.offset == 0 => Some((i, n)),
                _ => None,
            })
            .collect();
        names.sort();
        names.dedup_by_key(|(i, _)| *i);
        names.into_iter().map(|(_, n)| n.clone()).collect()
    }
}

impl ModuleChecker<'_> {
    fn lookup_ty_var(&mut self, name: &str, ctx: &mut LowerCtx) -> Option<Ty> {
        if let Some((_, ty)) = ctx.ty_vars.iter().rev().find(|(n, _)| n == name) {
            return Some(ty.clone());
        }
        let ty = match ctx.mode {
            VarMode::Generic => {
                let ty = Ty::Gen(ctx.next_ty);
                ctx.next_ty += 1;
                ty
            }
            VarMode::Closed => return None,
        };
        ctx.ty_vars.push((name.to_string(), ty.clone()));
        Some(ty)
    }

    fn lookup_len_var(&mut self, name: &str, ctx: &mut LowerCtx) -> Option<Len> {
        if let Some((_, len)) = ctx.len_vars.iter().rev().find(|(n, _)| n == name) {
            return Some(*len);
        }
        let base = match ctx.mode {
            VarMode::Generic => {
                let base = LenBase::Gen(ctx.next_len);
                ctx.next_len += 1;
                base
            }
            VarMode::Closed => return None,
        };
        let len = Len::of(base);
        ctx.len_vars.push((name.to_string(), len));
        Some(len)
    }

    pub(crate) fn lower_type(&mut self, te: &TypeExpr, ctx: &mut LowerCtx) -> Ty {
        match &te.kind {
            TypeExprKind::Named { path, args, res } => match res {
                None => Ty::Error,
                Some(TypeRes::Prim(prim)) => {
                    if !args.is_empty() {
                        self.error(format!("`{prim}` takes no arguments"), te.span);
                    }
                    Ty::Prim(*prim)
                }
                Some(TypeRes::Var(name)) => {
                    if !args.is_empty() {
                        self.error("type variables take no arguments", te.span);
                    }
                    match self.lookup_ty_var(name, ctx) {
                        Some(ty) => ty,
                        None => {
                            self.error(format!("unknown type variable `{name}`"), path.span);
                            Ty::Error
                        }
                    }
                }
                Some(TypeRes::SelfType) => ctx.self_ty.clone().unwrap_or(Ty::Error),
                Some(TypeRes::Decl(name)) => self.lower_applied(te, name, args, ctx),
            },
            TypeExprKind::Tuple(items) => {
                Ty::Tuple(items.iter().map(|t| self.lower_type(t, ctx)).collect())
            }
            TypeExprKind::DependentVec { elem, len, res, .. } => {
                let Some(name) = res else {
                    return Ty::Error;
                };
                let elem = self.lower_type(elem, ctx);
                let len = self.lower_len(&len.value, ctx);
                Ty::Family {
                    name: name.clone(),
                    elem: Box::new(elem),
                    len,
                }
            }
            TypeExprKind::Union(_) => {
                self.error(
                    "union types must be declared with `typ` before they are used",
                    te.span,
                );
                Ty::Error
            }
            TypeExprKind::Record(fields) => Ty::record(
                fields
                    .iter()
                    .map(|f| (f.name.node.clone(), self.lower_type(&f.ty, ctx)))
                    .collect(),
            ),
            TypeExprKind::Function { params, ret } => {
                let params = params.iter().map(|p| self.lower_type(p, ctx)).collect();
                let ret = self.lower_type(ret, ctx);
                Ty::Fn(params, Box::new(ret))
            }
            TypeExprKind::List(elem) => Ty::List(Box::new(self.lower_type(elem, ctx))),
            TypeExprKind::SelfType => ctx.self_ty.clone().unwrap_or(Ty::Error),
        }
    }

    fn lower_applied(
        &mut self,
        te: &TypeExpr,
        name: &QualName,
        args: &[TypeArg],
        ctx: &mut LowerCtx,
    ) -> Ty {
        let Some(arity) = self.uni.defs.get(name).map(|d| d.params.len()) else {
            return Ty::Error;
        };
        let mut tys = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                TypeArg::Type(t) => tys.push(self.lower_type(t, ctx)),
                TypeArg::Length(l) => {
                    self.error(format!("`{}` takes no length arguments", name.name), l.span)
                }
            }
        }
        if tys.len() != arity {
            self.error(
                format!(
                    "`{}` expects {arity} type argument(s), found {}",
                    name.name,
                    tys.len()
                ),
                te.span,
            );
            return Ty::Error;
        }
        Ty::Con {
            name: name.clone(),
            args: tys,
        }
    }

    pub(crate) fn lower_len(&mut self, le: &LengthExpr, ctx: &mut LowerCtx) -> Len {
        match &le.kind {
            LengthExprKind::Lit(n) => Len::lit(*n),
            LengthExprKind::Var(name) => match self.lookup_len_var(&name.node, ctx) {
                Some(len) => len,
                None => {
                    self.errors.push(SemanticError::UnresolvedName {
                        name: name.node.clone(),
                        span: name.span,
                    });
                    Len::lit(0)
                }
            },
            LengthExprKind::Apply { op, lhs, rhs } => {
                let l = self.lower_len(lhs, ctx);
                let r = self.lower_len(rhs, ctx);
                let Some(k) = r.as_literal() else {
                    self.unsupported_len(
                        format!("`{}` only accepts a literal on its right", op.node),
                        le,
                    );
                    return l;
                };
                match op.node.as_str() {
                    "add" => l.plus(k),
                    "sub" if l.offset >= k => Len {
                        base: l.base,
                        offset: l.offset - k,
                    },
                    "sub" => {
                        self.unsupported_len(
                            format!("`{}` may be negative", length_text(le)),
                            le,
                        );
                        l
                    }
                    other => {
                        self.unsupported_len(
                            format!("unknown length operator `{other}`; use `add` or `sub`"),
                            le,
                        );
                        l
                    }
                }
            }
        }
    }

    fn unsupported_len(&mut self, message: String, le: &LengthExpr) {
        self.errors.push(SemanticError::UnsupportedLengthExpr {
            message,
            span: le.span,
        });
    }

    /// Register every visible type: the prelude, imported interfaces, then
    /// this module's declarations in two passes so bodies may refer to any
    /// of them.
    pub(crate) fn collect_types(&mut self) {
        let bool_def = prelude_bool();
        self.uni.defs.insert(bool_def.name.clone(), bool_def);
        let imports = self.imports;
        for iface in imports.values() {
            for def in iface.types.values() {
                self.uni.defs.insert(def.name.clone(), def.clone());
            }
        }

        let module = self.module;
        let mut decls: Vec<(QualName, &TypeDecl)> = Vec::new();
        for item in &module.items {
            let ItemKind::Type(decl) = &item.kind else {
                continue;
            };
            let name = QualName::new(self.name, decl.name.node.as_str());
            if decls.iter().any(|(q, _)| *q == name) {
                continue;
            }
            let params = type_params(decl);
            let kind = match &decl.body {
                TypeBody::LengthMatch(_) => TypeDefKind::Family(FamilyDef {
                    len_param: String::new(),
                    len_ty: Prim::U64,
                    zero: Vec::new(),
                    succ: Vec::new(),
                }),
                TypeBody::Alias(TypeExpr {
                    kind: TypeExprKind::Union(_),
                    ..
                }) => TypeDefKind::Union(Vec::new()),
                TypeBody::Alias(_) => TypeDefKind::Alias(Ty::Error),
            };
            self.uni.defs.insert(
                name.clone(),
                TypeDef {
                    name: name.clone(),
                    public: decl.vis.is_public(),
                    params,
                    kind,
                },
            );
            decls.push((name, decl));
        }

        for (name, decl) in decls {
            let kind = self.lower_type_decl(decl);
            if let Some(def) = self.uni.defs.get_mut(&name) {
                def.kind = kind;
            }
        }
    }

    fn lower_type_decl(&mut self, decl: &TypeDecl) -> TypeDefKind {
        let params = type_params(decl);
        match &decl.body {
            TypeBody::Alias(body) => {
                if let Some(TypeParam::Value { name, .. }) = decl
                    .params
                    .iter()
                    .find(|p| matches!(p, TypeParam::Value { .. }))
                {
                    self.error(
                        format!(
                            "value parameter `{}` is only allowed on a length-indexed family",
                            name.node
                        ),
                        name.span,
                    );
                }
                let mut ctx = LowerCtx::closed(&params);
                match &body.kind {
                    TypeExprKind::Union(variants) => TypeDefKind::Union(
                        variants
                            .iter()
                            .map(|v| VariantDef {
                                tag: v.tag.node.clone(),
                                payload: v.payload.as_ref().map(|p| self.lower_type(p, &mut ctx)),
                            })
                            .collect(),
                    ),
                    _ => TypeDefKind::Alias(self.lower_type(body, &mut ctx)),
                }
            }
            TypeBody::LengthMatch(m) => self.lower_family(decl, &params, m),
        }
    }

    /// A family declaration has one element type, one unsigned length, a
    /// `0` arm and a successor arm whose tuples differ in size.
    fn lower_family(&mut self, decl: &TypeDecl, params: &[String], m: &LengthMatch) -> TypeDefKind {
        let failed = TypeDefKind::Alias(Ty::Error);
        let values: Vec<(&sable_ast::Ident, &TypeExpr)> = decl
            .params
            .iter()
            .filter_map(|p| match p {
                TypeParam::Value { name, ty, .. } => Some((name, ty)),
                TypeParam::Type(_) => None,
            })
            .collect();
        let [(len_name, len_ty)] = values.as_slice() else {
            self.error(
                format!(
                    "`{}` must take exactly one type parameter and one length parameter, as in `typ {} T {{len U32}}`",
                    decl.name.node, decl.name.node
                ),
                decl.name.span,
            );
            return failed;
        };
        if params.len() != 1 {
            self.error(
                format!(
                    "`{}` must take exactly one type parameter and one length parameter, as in `typ {} T {{len U32}}`",
                    decl.name.node, decl.name.node
                ),
                decl.name.span,
            );
            return failed;
        }

        let len_prim = match self.lower_type(len_ty, &mut LowerCtx::closed(&[])) {
            Ty::Prim(p) if p.is_unsigned() => p,
            Ty::Error => Prim::U64,
            other => {
                let message = format!(
                    "length parameter `{}` must have an unsigned integer type, found {}",
                    len_name.node,
                    self.uni.show(&other)
                );
                self.error(message, len_ty.span);
                Prim::U64
            }
        };
        if m.scrutinee.node != len_name.node {
            self.error(
                format!("a family must match on its length parameter `{}`", len_name.node),
                m.scrutinee.span,
            );
            return failed;
        }

        let mut zero: Option<&LengthArm> = None;
        let mut succ: Option<&LengthArm> = None;
        for arm in &m.arms {
            match &arm.pattern {
                LengthPattern::Literal(n) if n.node == 0 => {
                    if zero.is_some() {
                        self.error("duplicate `0` arm", arm.span);
                    }
                    zero = Some(arm);
                }
                LengthPattern::Literal(n) => {
                    self.errors.push(SemanticError::UnsupportedLengthExpr {
                        message: format!(
                            "family arms match `0` or bind the successor; `{}` cannot be matched",
                            n.node
                        ),
                        span: n.span,
                    });
                }
                LengthPattern::Bind(_) | LengthPattern::Wildcard(_) => {
                    if succ.is_some() {
                        self.error("duplicate successor arm", arm.span);
                    }
                    succ = Some(arm);
                }
            }
        }
        let (Some(zero), Some(succ)) = (zero, succ) else {
            self.error(
                "a family needs a `0` arm and an arm for every other length",
                m.span,
            );
            return failed;
        };

        let mut ctx = LowerCtx::closed(params);
        ctx.len_vars.push((len_name.node.clone(), Len::lit(0)));
        let zero_ty = self.lower_type(&zero.body, &mut ctx);

        // In the successor arm the length is `pred + 1`, with `pred` bound
        // as the family's single length generic.
        let n = Len {
            base: LenBase::Gen(0),
            offset: 1,
        };
        let mut ctx = LowerCtx::closed(params);
        ctx.len_vars.push((len_name.node.clone(), n));
        if let LengthPattern::Bind(binder) = &succ.pattern {
            ctx.len_vars.push((binder.node.clone(), n));
        }
        let succ_ty = self.lower_type(&succ.body, &mut ctx);

        match (zero_ty, succ_ty) {
            (Ty::Tuple(zero), Ty::Tuple(succ)) if zero.len() != succ.len() => {
                TypeDefKind::Family(FamilyDef {
                    len_param: len_name.node.clone(),
                    len_ty: len_prim,
                    zero,
                    succ,
                })
            }
            (Ty::Tuple(_), Ty::Tuple(_)) => {
                self.error(
                    "the arms of a family must be tuples of different sizes",
                    m.span,
                );
                failed
            }
            (Ty::Error, _) | (_, Ty::Error) => failed,
            _ => {
                self.error("each arm of a family must be a tuple type", m.span);
                failed
            }
        }
    }

    /// Lower every `def` to a scheme for the value it annotates.
    pub(crate) fn collect_signatures(&mut self, signatures: &HashMap<BindingId, usize>) {
        let by_item: HashMap<usize, BindingId> =
            signatures.iter().map(|(id, idx)| (*idx, *id)).collect();
        let module = self.module;
        for (idx, item) in module.items.iter().enumerate() {
            let ItemKind::Signature(sig) = &item.kind else {
                continue;
            };
            let Some(id) = by_item.get(&idx) else {
                continue;
            };
            let mut ctx = LowerCtx::generic();
            let ty = self.lower_type(&sig.ty, &mut ctx);
            let mut constraints = Vec::new();
            for c in &sig.constraints {
                let target = self.lower_type(&c.ty, &mut ctx);
                let Some(capability) = &c.res else {
                    continue;
                };
                match target {
                    Ty::Gen(i) => {
                        if !constraints.contains(&(i, capability.clone())) {
                            constraints.push((i, capability.clone()));
                        }
                    }
                    Ty::Error => {}
                    _ => self.error("a `where` constraint must name a type variable", c.ty.span),
                }
            }
            let scheme = Scheme {
                ty_names: ctx.ty_names(),
                len_names: ctx.len_names(),
                constraints,
                ty,
            };
            self.signatures.insert(*id, scheme);
        }
    }
}

fn type_params(decl: &TypeDecl) -> Vec<String> {
    decl.params
        .iter()
        .filter_map(|p| match p {
            TypeParam::Type(name) => Some(name.node.clone()),
            TypeParam::Value { .. } => None,
        })
        .collect()
}

fn length_text(le: &LengthExpr) -> String {
    match &le.kind {
        LengthExprKind::Lit(n) => n.to_string(),
        LengthExprKind::Var(name) => name.node.clone(),
        LengthExprKind::Apply { op, lhs, rhs } => {
            format!("{} {} {}", length_text(lhs), op.node, length_text(rhs))
        }
    }
}
