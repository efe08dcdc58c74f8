#![forbid(unsafe_code)]

//! Type inference and checking for one resolved module.
//!
//! Top-level values are inferred on demand in dependency order and
//! generalized; locals stay monomorphic. Each top-level binding owns a
//! [`Frame`] collecting capability requirements and literal range checks
//! that are settled once its type is known.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use sable_ast::{
    BinOp, BindingId, Block, BlockItemKind, Expr, ExprKind, ItemKind, MatchArm, Module, NodeId,
    Pattern, PatternKind, Prim, QualName, RestPattern, Span, TagRes, TestBlock, UnaryOp, ValueDecl,
};
use tracing::debug;

use crate::error::SemanticError;
use crate::interface::{CapabilityDef, CapabilityUse, ImplDef, Imports, ModuleInterface};
use crate::pattern_compiler::{Ctor, Decision, Pat, ShapeOracle, compile_match, describe};
use crate::resolve::{Binding, BindingKind, resolve_module};
use crate::types::{Len, LenBase, LenVar, RigidId, Scheme, Ty, TyVar, TypeDefKind, letter_name};
use crate::unify::{Unfold, Unifier, UnifyError, VarKind};
use crate::{CancelToken, Cancelled, CheckConfig};

/// A module after name resolution and type checking.
#[derive(Clone, Debug)]
pub struct TypedModule {
    pub name: String,
    pub module: Module,
    pub bindings: Vec<Binding>,
    pub expr_types: HashMap<NodeId, Ty>,
    pub pattern_types: HashMap<NodeId, Ty>,
    /// Types of parameters, locals and pattern variables.
    pub binding_types: HashMap<BindingId, Ty>,
    /// Schemes of every top-level value, by name.
    pub schemes: BTreeMap<String, Scheme>,
    /// Compiled decision trees, keyed by the match expression.
    pub decisions: HashMap<NodeId, Decision>,
    pub capability_uses: Vec<CapabilityUse>,
    pub interface: Arc<ModuleInterface>,
}

impl TypedModule {
    pub fn scheme(&self, name: &str) -> Option<&Scheme> {
        self.schemes.get(name)
    }
}

#[derive(Debug)]
pub struct CheckOutcome {
    pub typed: TypedModule,
    /// Errors and warnings in discovery order.
    pub errors: Vec<SemanticError>,
}

impl CheckOutcome {
    /// Warnings do not count.
    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(|e| !e.is_warning())
    }
}

#[derive(Clone, Debug, Default)]
pub struct Checker {
    config: CheckConfig,
}

impl Checker {
    pub fn new(config: CheckConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    pub fn check(&self, name: &str, module: Module, imports: &Imports) -> CheckOutcome {
        self.run(name, module, imports, &|| false).0
    }

    /// Like [`Checker::check`], giving up between declarations once `token`
    /// is cancelled.
    pub fn check_cancellable(
        &self,
        name: &str,
        module: Module,
        imports: &Imports,
        token: &CancelToken,
    ) -> Result<CheckOutcome, Cancelled> {
        match self.run(name, module, imports, &|| token.is_cancelled()) {
            (_, true) => Err(Cancelled),
            (outcome, false) => Ok(outcome),
        }
    }

    fn run(
        &self,
        name: &str,
        module: Module,
        imports: &Imports,
        cancelled: &dyn Fn() -> bool,
    ) -> (CheckOutcome, bool) {
        let span = tracing::debug_span!(target: "sable::check", "check_module", module = name);
        let _guard = span.enter();

        let (resolved, errors) = resolve_module(name, module, imports);
        let module = resolved.module;
        let mut mc = ModuleChecker::new(&self.config, name, &module, resolved.bindings, imports);
        mc.errors = errors;
        let stopped = mc.run(&resolved.signatures, cancelled);
        let parts = mc.finish();
        debug!(
            target: "sable::check",
            errors = parts.errors.len(),
            values = parts.schemes.len(),
            "module checked"
        );

        let typed = TypedModule {
            name: name.to_string(),
            module,
            bindings: parts.bindings,
            expr_types: parts.expr_types,
            pattern_types: parts.pattern_types,
            binding_types: parts.binding_types,
            schemes: parts.schemes,
            decisions: parts.decisions,
            capability_uses: parts.capability_uses,
            interface: Arc::new(parts.interface),
        };
        (
            CheckOutcome {
                typed,
                errors: parts.errors,
            },
            stopped,
        )
    }
}

pub(crate) enum TopState {
    InProgress(Ty),
    Done(Scheme),
}

pub(crate) struct PendingCapability {
    pub ty: Ty,
    pub capability: QualName,
    pub span: Span,
}

struct LiteralCheck {
    ty: Ty,
    value: u64,
    negative: bool,
    span: Span,
}

/// Deferred obligations of one top-level binding, impl member or test.
#[derive(Default)]
pub(crate) struct Frame {
    pub constraints: Vec<PendingCapability>,
    numeric: Vec<TyVar>,
    literals: Vec<LiteralCheck>,
    /// Capabilities a signature's `where` clause grants its rigid variables.
    pub given: Vec<(RigidId, QualName)>,
}

struct Parts {
    bindings: Vec<Binding>,
    expr_types: HashMap<NodeId, Ty>,
    pattern_types: HashMap<NodeId, Ty>,
    binding_types: HashMap<BindingId, Ty>,
    schemes: BTreeMap<String, Scheme>,
    decisions: HashMap<NodeId, Decision>,
    capability_uses: Vec<CapabilityUse>,
    interface: ModuleInterface,
    errors: Vec<SemanticError>,
}

pub(crate) struct ModuleChecker<'a> {
    pub config: &'a CheckConfig,
    pub name: &'a str,
    pub module: &'a Module,
    pub imports: &'a Imports,
    pub uni: Unifier,
    pub bindings: Vec<Binding>,
    values: HashMap<BindingId, &'a ValueDecl>,
    pub signatures: HashMap<BindingId, Scheme>,
    top: HashMap<BindingId, TopState>,
    /// Types of the top-level bindings currently being inferred.
    in_progress: Vec<Ty>,
    pub capabilities: HashMap<QualName, CapabilityDef>,
    pub impls: Vec<ImplDef>,
    /// Implementations declared by this module, with their spans.
    pub local_impls: Vec<(ImplDef, Span)>,
    /// Lowered implementation targets by item index, with their variable names.
    pub impl_targets: HashMap<usize, (Ty, Vec<String>, Vec<String>)>,
    binding_types: HashMap<BindingId, Ty>,
    pub frames: Vec<Frame>,
    expr_types: HashMap<NodeId, Ty>,
    pattern_types: HashMap<NodeId, Ty>,
    decisions: HashMap<NodeId, Decision>,
    pub capability_uses: Vec<CapabilityUse>,
    pub errors: Vec<SemanticError>,
    /// Set once the recursion limit is hit; checking winds down quietly.
    fatal: bool,
    depth: usize,
}

impl<'a> ModuleChecker<'a> {
    fn new(
        config: &'a CheckConfig,
        name: &'a str,
        module: &'a Module,
        bindings: Vec<Binding>,
        imports: &'a Imports,
    ) -> Self {
        let mut values = HashMap::new();
        for item in &module.items {
            if let ItemKind::Value(decl) = &item.kind {
                if let Some(id) = decl.binding {
                    values.insert(id, decl);
                }
            }
        }
        Self {
            config,
            name,
            module,
            imports,
            uni: Unifier::new(HashMap::new(), config.recursion_limit),
            bindings,
            values,
            signatures: HashMap::new(),
            top: HashMap::new(),
            in_progress: Vec::new(),
            capabilities: HashMap::new(),
            impls: Vec::new(),
            local_impls: Vec::new(),
            impl_targets: HashMap::new(),
            binding_types: HashMap::new(),
            frames: Vec::new(),
            expr_types: HashMap::new(),
            pattern_types: HashMap::new(),
            decisions: HashMap::new(),
            capability_uses: Vec::new(),
            errors: Vec::new(),
            fatal: false,
            depth: 0,
        }
    }

    /// Returns `true` when stopped by cancellation.
    fn run(&mut self, signatures: &HashMap<BindingId, usize>, cancelled: &dyn Fn() -> bool) -> bool {
        self.collect_types();
        self.collect_capabilities();
        self.collect_signatures(signatures);
        self.collect_impls();

        let module = self.module;
        for (idx, item) in module.items.iter().enumerate() {
            if cancelled() {
                debug!(target: "sable::check", module = self.name, "cancelled");
                return true;
            }
            if self.fatal {
                break;
            }
            match &item.kind {
                ItemKind::Value(decl) => {
                    if let Some(id) = decl.binding {
                        self.ensure_value(id);
                    }
                }
                ItemKind::Implementation(decl) => self.check_impl(idx, decl),
                ItemKind::Test(test) => self.check_test(test),
                _ => {}
            }
        }
        false
    }

    fn finish(mut self) -> Parts {
        let module = self.module;
        let mut schemes = BTreeMap::new();
        let mut interface = ModuleInterface {
            name: self.name.to_string(),
            ..ModuleInterface::default()
        };
        for item in &module.items {
            let ItemKind::Value(decl) = &item.kind else {
                continue;
            };
            let Some(id) = decl.binding else {
                continue;
            };
            let scheme = match self.top.get(&id) {
                Some(TopState::Done(scheme)) => scheme.clone(),
                _ => continue,
            };
            if self.bindings[id.0 as usize].vis.is_public() {
                interface.values.insert(decl.name.node.clone(), scheme.clone());
            }
            schemes.entry(decl.name.node.clone()).or_insert(scheme);
        }
        for def in self.uni.defs.values() {
            if def.name.module != self.name {
                continue;
            }
            if def.public {
                if let TypeDefKind::Union(variants) = &def.kind {
                    for (index, v) in variants.iter().enumerate() {
                        let res = TagRes {
                            ty: def.name.clone(),
                            index,
                        };
                        interface.tags.insert(v.tag.clone(), res);
                    }
                }
            }
            interface.types.insert(def.name.name.clone(), def.clone());
        }
        for cap in self.capabilities.values() {
            if cap.name.module == self.name {
                interface.capabilities.insert(cap.name.name.clone(), cap.clone());
            }
        }
        interface.impls = self.local_impls.iter().map(|(i, _)| i.clone()).collect();

        let uni = &self.uni;
        let zonk = |m: HashMap<NodeId, Ty>| -> HashMap<NodeId, Ty> {
            m.into_iter().map(|(k, t)| (k, uni.resolve(&t))).collect()
        };
        let expr_types = zonk(std::mem::take(&mut self.expr_types));
        let pattern_types = zonk(std::mem::take(&mut self.pattern_types));
        let binding_types = std::mem::take(&mut self.binding_types)
            .into_iter()
            .map(|(k, t)| (k, uni.resolve(&t)))
            .collect();

        Parts {
            bindings: self.bindings,
            expr_types,
            pattern_types,
            binding_types,
            schemes,
            decisions: self.decisions,
            capability_uses: self.capability_uses,
            interface,
            errors: self.errors,
        }
    }

    // ---------------------------------------------------------------------
    // Top-level values

    fn ensure_value(&mut self, id: BindingId) {
        if !self.top.contains_key(&id) {
            self.infer_value(id);
        }
    }

    fn infer_value(&mut self, id: BindingId) {
        let Some(decl) = self.values.get(&id).copied() else {
            return;
        };
        self.frames.push(Frame::default());

        if let Some(scheme) = self.signatures.get(&id).cloned() {
            self.top.insert(id, TopState::InProgress(Ty::Error));
            let (expected, given) = self.skolemize(&scheme);
            if let Some(frame) = self.frames.last_mut() {
                frame.given = given;
            }
            self.check_expr(&decl.value, &expected);
            self.finish_frame(None);
            self.top.insert(id, TopState::Done(scheme));
            return;
        }

        let pre = match &decl.value.kind {
            ExprKind::Lambda { params, .. } => {
                let params = params.iter().map(|_| self.uni.fresh_ty()).collect();
                Ty::Fn(params, Box::new(self.uni.fresh_ty()))
            }
            _ => self.uni.fresh_ty(),
        };
        self.top.insert(id, TopState::InProgress(pre.clone()));
        self.in_progress.push(pre.clone());
        self.check_expr(&decl.value, &pre);
        self.in_progress.pop();

        let kept = self.finish_frame(Some(&pre));
        let scheme = self.generalize(&pre, &kept);
        debug!(target: "sable::check", name = %decl.name.node, scheme = %scheme, "inferred");
        self.top.insert(id, TopState::Done(scheme));
    }

    fn check_test(&mut self, test: &TestBlock) {
        self.frames.push(Frame::default());
        self.infer(&test.body);
        self.finish_frame(None);
    }

    /// Settle a frame's obligations. Capability constraints on variables
    /// that stay free in `ty` are returned so generalization can keep them.
    pub(crate) fn finish_frame(&mut self, ty: Option<&Ty>) -> Vec<(TyVar, QualName)> {
        let Some(frame) = self.frames.pop() else {
            return Vec::new();
        };

        for v in &frame.numeric {
            if let Ty::Var(w) = self.uni.shallow(&Ty::Var(*v)) {
                match self.uni.kind(w) {
                    VarKind::Numeric => self.uni.bind_var(w, Ty::Prim(self.config.default_int)),
                    VarKind::Fractional => {
                        self.uni.bind_var(w, Ty::Prim(self.config.default_float))
                    }
                    VarKind::General => {}
                }
            }
        }

        let (env, _) = self.env_vars();
        let in_type: HashSet<TyVar> = match ty {
            Some(ty) => self.free_vars(ty).0.into_iter().collect(),
            None => HashSet::new(),
        };

        let mut kept = Vec::new();
        for c in frame.constraints {
            let ty = self.uni.view(&c.ty).unwrap_or(Ty::Error);
            match ty {
                Ty::Error => {}
                Ty::Var(v) if env.contains(&v) => match self.frames.last_mut() {
                    Some(parent) => parent.constraints.push(c),
                    None => self.ambiguous(&c),
                },
                Ty::Var(v) if in_type.contains(&v) => {
                    if !kept.contains(&(v, c.capability.clone())) {
                        kept.push((v, c.capability));
                    }
                }
                Ty::Var(_) => self.ambiguous(&c),
                Ty::Rigid(r) => {
                    let granted = frame
                        .given
                        .iter()
                        .any(|(g, cap)| *g == r && *cap == c.capability);
                    if !granted {
                        self.errors.push(SemanticError::MissingCapability {
                            ty: self.uni.show(&ty),
                            capability: c.capability.name.clone(),
                            span: c.span,
                        });
                    }
                }
                _ => self.resolve_impl(&c.ty, &c.capability, c.span),
            }
        }

        for lit in &frame.literals {
            self.check_literal(lit);
        }
        kept
    }

    fn ambiguous(&mut self, c: &PendingCapability) {
        self.errors.push(SemanticError::AmbiguousCapability {
            capability: c.capability.name.clone(),
            message: "the type it is used at cannot be determined; add a signature".to_string(),
            span: c.span,
        });
    }

    fn check_literal(&mut self, lit: &LiteralCheck) {
        let Ty::Prim(prim) = self.uni.resolve(&lit.ty) else {
            return;
        };
        let Some(bits) = prim.int_bits() else {
            return;
        };
        let (max_pos, max_neg): (u128, u128) = if prim.is_unsigned() {
            ((1u128 << bits) - 1, 0)
        } else {
            ((1u128 << (bits - 1)) - 1, 1u128 << (bits - 1))
        };
        let value = lit.value as u128;
        let fits = if lit.negative {
            value <= max_neg
        } else {
            value <= max_pos
        };
        if !fits {
            let sign = if lit.negative { "-" } else { "" };
            self.error(
                format!("integer literal `{sign}{}` does not fit in {prim}", lit.value),
                lit.span,
            );
        }
    }

    /// Variables free in the types of bindings still being inferred.
    fn env_vars(&self) -> (HashSet<TyVar>, HashSet<LenVar>) {
        let mut tys = HashSet::new();
        let mut lens = HashSet::new();
        for ty in &self.in_progress {
            let (t, l) = self.free_vars(ty);
            tys.extend(t);
            lens.extend(l);
        }
        (tys, lens)
    }

    /// Free variables of `ty` in order of first appearance.
    fn free_vars(&self, ty: &Ty) -> (Vec<TyVar>, Vec<LenVar>) {
        let mut tys = Vec::new();
        let mut lens = Vec::new();
        self.uni.resolve(ty).walk(&mut |t| match t {
            Ty::Var(v) if !tys.contains(v) => tys.push(*v),
            Ty::Family { len, .. } => {
                if let LenBase::Var(l) = len.base {
                    if !lens.contains(&l) {
                        lens.push(l);
                    }
                }
            }
            _ => {}
        });
        (tys, lens)
    }

    fn generalize(&mut self, ty: &Ty, kept: &[(TyVar, QualName)]) -> Scheme {
        let ty = self.uni.resolve(ty);
        let (env_tys, env_lens) = self.env_vars();

        let mut ty_map: HashMap<TyVar, u32> = HashMap::new();
        let mut len_map: HashMap<LenVar, u32> = HashMap::new();
        let mut ty_names = Vec::new();
        let mut len_names: Vec<String> = Vec::new();
        let families = &self.uni;
        ty.walk(&mut |t| match t {
            Ty::Var(v) if !env_tys.contains(v) && !ty_map.contains_key(v) => {
                ty_map.insert(*v, ty_names.len() as u32);
                ty_names.push(letter_name(ty_names.len()));
            }
            Ty::Family { name, len, .. } => {
                if let LenBase::Var(l) = len.base {
                    if !env_lens.contains(&l) && !len_map.contains_key(&l) {
                        let base = families
                            .family(name)
                            .map(|f| f.len_param.clone())
                            .unwrap_or_else(|| "n".to_string());
                        let mut candidate = base.clone();
                        let mut suffix = 1;
                        while len_names.contains(&candidate) {
                            candidate = format!("{base}{suffix}");
                            suffix += 1;
                        }
                        len_map.insert(l, len_names.len() as u32);
                        len_names.push(candidate);
                    }
                }
            }
            _ => {}
        });

        let body = ty.map(
            &mut |t| match t {
                Ty::Var(v) => ty_map.get(v).map(|i| Ty::Gen(*i)),
                _ => None,
            },
            &mut |l| match l.base {
                LenBase::Var(v) => match len_map.get(&v) {
                    Some(j) => Len {
                        base: LenBase::Gen(*j),
                        offset: l.offset,
                    },
                    None => l,
                },
                _ => l,
            },
        );
        let mut constraints = Vec::new();
        for (v, cap) in kept {
            if let Some(i) = ty_map.get(v) {
                let c = (*i, cap.clone());
                if !constraints.contains(&c) {
                    constraints.push(c);
                }
            }
        }
        Scheme {
            ty_names,
            len_names,
            constraints,
            ty: body,
        }
    }

    pub(crate) fn instantiate(&mut self, scheme: &Scheme, span: Span) -> Ty {
        let tys: Vec<Ty> = scheme.ty_names.iter().map(|_| self.uni.fresh_ty()).collect();
        let lens: Vec<Len> = scheme.len_names.iter().map(|_| self.uni.fresh_len()).collect();
        for (i, cap) in &scheme.constraints {
            if let Some(ty) = tys.get(*i as usize) {
                self.require_capability(ty.clone(), cap.clone(), span);
            }
        }
        scheme.ty.instantiate(&tys, &lens)
    }

    /// Replace a scheme's variables by rigid ones, for checking a body
    /// against its declared signature.
    fn skolemize(&mut self, scheme: &Scheme) -> (Ty, Vec<(RigidId, QualName)>) {
        let rigids: Vec<RigidId> = scheme
            .ty_names
            .iter()
            .map(|n| self.uni.fresh_rigid(n.clone()))
            .collect();
        let lens: Vec<Len> = scheme
            .len_names
            .iter()
            .map(|n| Len::of(LenBase::Rigid(self.uni.fresh_rigid(n.clone()))))
            .collect();
        let tys: Vec<Ty> = rigids.iter().map(|r| Ty::Rigid(*r)).collect();
        let given = scheme
            .constraints
            .iter()
            .filter_map(|(i, cap)| rigids.get(*i as usize).map(|r| (*r, cap.clone())))
            .collect();
        (scheme.ty.instantiate(&tys, &lens), given)
    }

    /// A recursive use of a binding under inference shares its element types
    /// but may be applied at another length.
    fn freshen_lengths(&mut self, ty: &Ty) -> Ty {
        let ty = self.uni.resolve(ty);
        let mut fresh: HashMap<LenVar, Len> = HashMap::new();
        let uni = &mut self.uni;
        ty.map(&mut |_| None, &mut |l| match l.base {
            LenBase::Var(v) => {
                let base = *fresh.entry(v).or_insert_with(|| uni.fresh_len());
                base.plus(l.offset)
            }
            _ => l,
        })
    }

    fn type_of_binding(&mut self, id: BindingId, span: Span) -> Ty {
        let Some(binding) = self.bindings.get(id.0 as usize) else {
            return Ty::Error;
        };
        match binding.kind.clone() {
            BindingKind::Param | BindingKind::Local | BindingKind::PatternVar => {
                self.binding_types.get(&id).cloned().unwrap_or(Ty::Error)
            }
            BindingKind::Value => {
                if let Some(scheme) = self.signatures.get(&id).cloned() {
                    return self.instantiate(&scheme, span);
                }
                self.ensure_value(id);
                match self.top.get(&id) {
                    Some(TopState::Done(scheme)) => {
                        let scheme = scheme.clone();
                        self.instantiate(&scheme, span)
                    }
                    Some(TopState::InProgress(ty)) => {
                        let ty = ty.clone();
                        self.freshen_lengths(&ty)
                    }
                    None => Ty::Error,
                }
            }
            BindingKind::CapabilityOp { capability, index } => {
                let scheme = self
                    .capabilities
                    .get(&capability)
                    .and_then(|c| c.ops.get(index))
                    .map(|op| op.scheme.clone());
                match scheme {
                    Some(scheme) => self.instantiate(&scheme, span),
                    None => Ty::Error,
                }
            }
            BindingKind::Imported { qual } => {
                let scheme = self
                    .imports
                    .get(&qual.module)
                    .and_then(|i| i.values.get(&qual.name))
                    .cloned();
                match scheme {
                    Some(scheme) => self.instantiate(&scheme, span),
                    None => Ty::Error,
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Helpers

    pub(crate) fn error(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(SemanticError::ty(message, span));
    }

    fn expect_ty(&mut self, expected: &Ty, found: &Ty, span: Span) {
        if let Err(err) = self.uni.unify(expected, found) {
            self.report_unify(err, expected, found, span);
        }
    }

    fn report_unify(&mut self, err: UnifyError, expected: &Ty, found: &Ty, span: Span) {
        match err {
            UnifyError::Mismatch => {
                let message = format!(
                    "type mismatch: expected {}, found {}",
                    self.uni.show(expected),
                    self.uni.show(found)
                );
                self.error(message, span);
            }
            UnifyError::Message(message) => self.error(message, span),
            UnifyError::RecursionLimit => {
                self.errors.push(SemanticError::RecursionLimitExceeded {
                    limit: self.config.recursion_limit,
                    context: "type alias expansion".to_string(),
                    span,
                });
            }
        }
    }

    fn view(&self, ty: &Ty) -> Ty {
        self.uni.view(ty).unwrap_or(Ty::Error)
    }

    fn enter(&mut self, span: Span) -> bool {
        if self.fatal {
            return false;
        }
        if self.depth >= self.config.recursion_limit {
            self.fatal = true;
            self.errors.push(SemanticError::RecursionLimitExceeded {
                limit: self.config.recursion_limit,
                context: "expression nesting".to_string(),
                span,
            });
            return false;
        }
        self.depth += 1;
        true
    }

    pub(crate) fn require_capability(&mut self, ty: Ty, capability: QualName, span: Span) {
        let pending = PendingCapability {
            ty,
            capability,
            span,
        };
        match self.frames.last_mut() {
            Some(frame) => frame.constraints.push(pending),
            None => self.errors.push(SemanticError::AmbiguousCapability {
                capability: pending.capability.name,
                message: "used outside any declaration".to_string(),
                span,
            }),
        }
    }

    fn track_numeric(&mut self, v: TyVar) {
        if let Some(frame) = self.frames.last_mut() {
            frame.numeric.push(v);
        }
    }

    fn literal(&mut self, value: u64, negative: bool, span: Span) -> Ty {
        let v = self.uni.fresh(VarKind::Numeric);
        self.track_numeric(v);
        if let Some(frame) = self.frames.last_mut() {
            frame.literals.push(LiteralCheck {
                ty: Ty::Var(v),
                value,
                negative,
                span,
            });
        }
        Ty::Var(v)
    }

    fn require_numeric(&mut self, ty: &Ty, op: &str, span: Span) {
        match self.view(ty) {
            Ty::Var(v) => {
                self.uni.require_kind(v, VarKind::Numeric);
                self.track_numeric(v);
            }
            Ty::Prim(p) if p.is_numeric() => {}
            Ty::Error => {}
            other => {
                let message = format!(
                    "operator `{op}` expects numeric operands, found {}",
                    self.uni.show(&other)
                );
                self.error(message, span);
            }
        }
    }

    // ---------------------------------------------------------------------
    // Expressions

    pub(crate) fn infer(&mut self, expr: &Expr) -> Ty {
        if !self.enter(expr.span) {
            return Ty::Error;
        }
        let ty = self.infer_inner(expr);
        self.depth -= 1;
        self.expr_types.insert(expr.id, ty.clone());
        ty
    }

    pub(crate) fn check_expr(&mut self, expr: &Expr, expected: &Ty) {
        if !self.enter(expr.span) {
            return;
        }
        self.check_inner(expr, expected);
        self.depth -= 1;
        self.expr_types.insert(expr.id, expected.clone());
    }

    fn infer_inner(&mut self, expr: &Expr) -> Ty {
        match &expr.kind {
            ExprKind::Int(value) => self.literal(*value, false, expr.span),
            ExprKind::Float(_) => {
                let v = self.uni.fresh(VarKind::Fractional);
                self.track_numeric(v);
                Ty::Var(v)
            }
            ExprKind::Str(_) => Ty::Prim(Prim::Str),
            ExprKind::Var { res, .. } => match res {
                Some(id) => self.type_of_binding(*id, expr.span),
                None => Ty::Error,
            },
            ExprKind::Tag { res, payload, .. } => match res {
                Some(res) => self.infer_tag(res, payload.as_deref(), expr.span),
                None => {
                    if let Some(payload) = payload {
                        self.infer(payload);
                    }
                    Ty::Error
                }
            },
            ExprKind::Call { callee, args } => {
                let callee_ty = self.infer(callee);
                self.apply(callee_ty, args, expr.span)
            }
            ExprKind::Lambda { params, body } => {
                let params = params
                    .iter()
                    .map(|p| {
                        let ty = self.uni.fresh_ty();
                        if let Some(id) = p.binding {
                            self.binding_types.insert(id, ty.clone());
                        }
                        ty
                    })
                    .collect();
                let ret = self.infer(body);
                Ty::Fn(params, Box::new(ret))
            }
            ExprKind::Match { scrutinee, arms } => self.check_match(expr, scrutinee, arms, None),
            ExprKind::Tuple(items) => Ty::Tuple(items.iter().map(|e| self.infer(e)).collect()),
            ExprKind::Record(fields) => Ty::record(
                fields
                    .iter()
                    .map(|f| (f.name.node.clone(), self.infer(&f.value)))
                    .collect(),
            ),
            ExprKind::List(items) => {
                let elem = self.uni.fresh_ty();
                for item in items {
                    self.check_expr(item, &elem);
                }
                Ty::List(Box::new(elem))
            }
            ExprKind::Field { base, field } => {
                let base_ty = self.infer(base);
                self.field_type(&base_ty, &field.node, field.span)
            }
            ExprKind::Binary { op, lhs, rhs } => self.infer_binary(*op, lhs, rhs, expr.span),
            ExprKind::Unary {
                op: UnaryOp::Neg,
                expr: inner,
            } => {
                if let ExprKind::Int(value) = inner.kind {
                    let ty = self.literal(value, true, expr.span);
                    self.expr_types.insert(inner.id, ty.clone());
                    ty
                } else {
                    let ty = self.infer(inner);
                    self.require_numeric(&ty, "-", expr.span);
                    ty
                }
            }
            ExprKind::Block(block) => {
                self.check_block_items(block);
                self.infer(&block.result)
            }
        }
    }

    fn check_inner(&mut self, expr: &Expr, expected: &Ty) {
        match &expr.kind {
            ExprKind::Lambda { params, body } => {
                if let Some((param_tys, ret)) = self.split_fn(expected, params.len(), expr.span) {
                    for (p, ty) in params.iter().zip(param_tys) {
                        if let Some(id) = p.binding {
                            self.binding_types.insert(id, ty);
                        }
                    }
                    self.check_expr(body, &ret);
                    return;
                }
            }
            ExprKind::Match { scrutinee, arms } => {
                self.check_match(expr, scrutinee, arms, Some(expected));
                return;
            }
            ExprKind::Tuple(items) => {
                if let Some(tys) = self.tuple_view(expected, items.len()) {
                    for (item, ty) in items.iter().zip(&tys) {
                        self.check_expr(item, ty);
                    }
                    return;
                }
            }
            ExprKind::Record(fields) => {
                if let Ty::Record(tys) = self.view(expected) {
                    let same_fields = tys.len() == fields.len()
                        && fields.iter().all(|f| tys.iter().any(|(n, _)| *n == f.name.node));
                    if same_fields {
                        for f in fields {
                            if let Some((_, ty)) = tys.iter().find(|(n, _)| *n == f.name.node) {
                                self.check_expr(&f.value, ty);
                            }
                        }
                        return;
                    }
                }
            }
            ExprKind::List(items) => {
                if let Ty::List(elem) = self.view(expected) {
                    for item in items {
                        self.check_expr(item, &elem);
                    }
                    return;
                }
            }
            ExprKind::Block(block) => {
                self.check_block_items(block);
                self.check_expr(&block.result, expected);
                return;
            }
            _ => {}
        }
        let found = self.infer_inner(expr);
        self.expect_ty(expected, &found, expr.span);
    }

    /// View `expected` as a function of at least `n` parameters, splitting
    /// curried and multi-parameter shapes as needed.
    fn split_fn(&mut self, expected: &Ty, n: usize, span: Span) -> Option<(Vec<Ty>, Ty)> {
        let mut params = Vec::with_capacity(n);
        let mut current = expected.clone();
        while params.len() < n {
            match self.view(&current) {
                Ty::Fn(ps, ret) => {
                    let need = n - params.len();
                    if ps.len() <= need {
                        params.extend(ps);
                        current = *ret;
                    } else {
                        params.extend(ps[..need].iter().cloned());
                        current = Ty::Fn(ps[need..].to_vec(), ret);
                    }
                }
                Ty::Var(_) => {
                    let rest: Vec<Ty> = (params.len()..n).map(|_| self.uni.fresh_ty()).collect();
                    let ret = self.uni.fresh_ty();
                    let shape = Ty::Fn(rest.clone(), Box::new(ret.clone()));
                    self.expect_ty(&current, &shape, span);
                    params.extend(rest);
                    current = ret;
                }
                _ => return None,
            }
        }
        Some((params, current))
    }

    /// Element types of a tuple literal checked against `expected`.
    fn tuple_view(&mut self, expected: &Ty, n: usize) -> Option<Vec<Ty>> {
        match self.view(expected) {
            Ty::Tuple(tys) if tys.len() == n => Some(tys),
            Ty::Family { name, elem, len } => match self.uni.unfold(&name, &elem, len) {
                Unfold::Items(tys) if tys.len() == n => Some(tys),
                _ => None,
            },
            _ => None,
        }
    }

    fn apply(&mut self, callee: Ty, args: &[Expr], span: Span) -> Ty {
        let mut fn_ty = callee;
        let mut rest = args;
        while !rest.is_empty() {
            match self.view(&fn_ty) {
                Ty::Fn(params, ret) => {
                    let n = params.len().min(rest.len());
                    for (arg, param) in rest[..n].iter().zip(&params) {
                        self.check_expr(arg, param);
                    }
                    rest = &rest[n..];
                    fn_ty = if n < params.len() {
                        Ty::Fn(params[n..].to_vec(), ret)
                    } else {
                        *ret
                    };
                }
                Ty::Var(_) => {
                    let params = rest.iter().map(|a| self.infer(a)).collect();
                    let ret = self.uni.fresh_ty();
                    let shape = Ty::Fn(params, Box::new(ret.clone()));
                    self.expect_ty(&fn_ty, &shape, span);
                    return ret;
                }
                Ty::Error => {
                    for arg in rest {
                        self.infer(arg);
                    }
                    return Ty::Error;
                }
                other => {
                    let message = format!(
                        "`{}` is not a function, but it is applied to {} more argument(s)",
                        self.uni.show(&other),
                        rest.len()
                    );
                    self.error(message, span);
                    for arg in rest {
                        self.infer(arg);
                    }
                    return Ty::Error;
                }
            }
        }
        fn_ty
    }

    fn infer_tag(&mut self, res: &TagRes, payload: Option<&Expr>, span: Span) -> Ty {
        let found = self.uni.defs.get(&res.ty).map(|def| {
            let variant = def.variants().and_then(|v| v.get(res.index)).cloned();
            (def.params.len(), variant)
        });
        let Some((arity, Some(variant))) = found else {
            if let Some(payload) = payload {
                self.infer(payload);
            }
            return Ty::Error;
        };
        let args: Vec<Ty> = (0..arity).map(|_| self.uni.fresh_ty()).collect();
        let con = Ty::Con {
            name: res.ty.clone(),
            args: args.clone(),
        };
        match (variant.payload, payload) {
            (Some(template), Some(payload)) => {
                let expected = template.instantiate(&args, &[]);
                self.check_expr(payload, &expected);
                con
            }
            (None, None) => con,
            (Some(template), None) => Ty::Fn(vec![template.instantiate(&args, &[])], Box::new(con)),
            (None, Some(payload)) => {
                self.error(format!("tag `{}` carries no payload", variant.tag), span);
                self.infer(payload);
                con
            }
        }
    }

    fn field_type(&mut self, base: &Ty, field: &str, span: Span) -> Ty {
        match self.view(base) {
            Ty::Record(fields) => match fields.iter().find(|(n, _)| n == field) {
                Some((_, ty)) => ty.clone(),
                None => {
                    let message = format!("type `{}` has no field `{field}`", self.uni.show(base));
                    self.error(message, span);
                    Ty::Error
                }
            },
            Ty::Error => Ty::Error,
            Ty::Var(_) => {
                self.error(
                    format!("the type must be known before accessing `.{field}`; add a signature"),
                    span,
                );
                Ty::Error
            }
            other => {
                let message = format!("type `{}` has no field `{field}`", self.uni.show(&other));
                self.error(message, span);
                Ty::Error
            }
        }
    }

    fn infer_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr, span: Span) -> Ty {
        let ty = self.infer(lhs);
        self.check_expr(rhs, &ty);
        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
                self.require_numeric(&ty, op.symbol(), span);
                ty
            }
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                self.require_numeric(&ty, op.symbol(), span);
                Ty::bool()
            }
            BinOp::Eq | BinOp::Ne => Ty::bool(),
        }
    }

    fn check_block_items(&mut self, block: &Block) {
        for item in &block.items {
            match &item.kind {
                BlockItemKind::Let { binding, value, .. }
                | BlockItemKind::Bind { binding, value, .. } => {
                    let ty = self.infer(value);
                    if let Some(id) = binding {
                        self.binding_types.insert(*id, ty);
                    }
                }
                BlockItemKind::Assert(cond) => self.check_expr(cond, &Ty::bool()),
                BlockItemKind::Expr(expr) => {
                    self.infer(expr);
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Matches

    fn check_match(
        &mut self,
        expr: &Expr,
        scrutinee: &Expr,
        arms: &[MatchArm],
        expected: Option<&Ty>,
    ) -> Ty {
        let scrutinee_ty = self.infer(scrutinee);
        self.infer_family_from_arms(&scrutinee_ty, arms, scrutinee.span);
        let result = match expected {
            Some(ty) => ty.clone(),
            None => self.uni.fresh_ty(),
        };
        self.seed_match_result(&scrutinee_ty, arms, &result);

        let mut pats = Vec::with_capacity(arms.len());
        let mut pattern_failed = false;
        for arm in arms {
            let mark = self.uni.refinement_mark();
            let before = self.errors.len();
            let pat = self.check_pattern(&arm.pattern, &scrutinee_ty);
            pattern_failed |= self.errors.len() != before;
            self.check_expr(&arm.body, &result);
            self.uni.truncate_refinements(mark);
            pats.push(pat);
        }

        let scrutinee_ty = self.uni.resolve(&scrutinee_ty);
        if !pattern_failed && !self.fatal && !scrutinee_ty.is_error() {
            let compiled = compile_match(&scrutinee_ty, &pats, self);
            if !compiled.missing.is_empty() {
                self.errors.push(SemanticError::Exhaustiveness {
                    missing: compiled.missing,
                    span: expr.span,
                });
            }
            for i in compiled.unreachable {
                let bindings = &self.bindings;
                let pattern = describe(&pats[i], &|id: BindingId| {
                    bindings
                        .get(id.0 as usize)
                        .map(|b| b.name.clone())
                        .unwrap_or_else(|| "_".to_string())
                });
                self.errors.push(SemanticError::UnreachablePattern {
                    pattern,
                    span: arms[i].pattern.span,
                });
            }
            self.decisions.insert(expr.id, compiled.decision);
        }
        result
    }

    /// A scrutinee of unknown type matched by tuple patterns of two sizes is
    /// taken to be the family whose arms have those sizes.
    fn infer_family_from_arms(&mut self, scrutinee: &Ty, arms: &[MatchArm], span: Span) {
        let Ty::Var(var) = self.uni.shallow(scrutinee) else {
            return;
        };
        let mut arities: Vec<usize> = Vec::new();
        for arm in arms {
            if let PatternKind::Tuple { items, rest: None } = &arm.pattern.kind {
                if !arities.contains(&items.len()) {
                    arities.push(items.len());
                }
            }
        }
        if arities.len() < 2 {
            return;
        }
        let mut candidates: Vec<QualName> = self
            .uni
            .defs
            .values()
            .filter(|def| {
                def.as_family().is_some_and(|f| {
                    arities
                        .iter()
                        .all(|a| *a == f.zero.len() || *a == f.succ.len())
                })
            })
            .map(|def| def.name.clone())
            .collect();
        candidates.sort();
        match candidates.as_slice() {
            [] => {}
            [name] => {
                let family = Ty::Family {
                    name: name.clone(),
                    elem: Box::new(self.uni.fresh_ty()),
                    len: self.uni.fresh_len(),
                };
                self.expect_ty(scrutinee, &family, span);
            }
            several => {
                let names: Vec<String> = several.iter().map(|q| q.name.clone()).collect();
                self.error(
                    format!(
                        "these patterns fit several length-indexed families ({}); add a signature",
                        names.join(", ")
                    ),
                    span,
                );
                self.uni.bind_var(var, Ty::Error);
            }
        }
    }

    /// When every arm rebuilds a tuple of its pattern's size, the match
    /// produces the scrutinee's family at the same length.
    fn seed_match_result(&mut self, scrutinee: &Ty, arms: &[MatchArm], result: &Ty) {
        if arms.is_empty() || !matches!(self.uni.shallow(result), Ty::Var(_)) {
            return;
        }
        let Ty::Family { name, len, .. } = self.view(scrutinee) else {
            return;
        };
        let rebuilds = arms.iter().all(|arm| match (&arm.pattern.kind, &arm.body.kind) {
            (PatternKind::Tuple { items, rest: None }, ExprKind::Tuple(body)) => {
                items.len() == body.len()
            }
            _ => false,
        });
        if rebuilds {
            let seeded = Ty::Family {
                name,
                elem: Box::new(self.uni.fresh_ty()),
                len,
            };
            let _ = self.uni.unify(result, &seeded);
        }
    }

    // ---------------------------------------------------------------------
    // Patterns

    fn check_pattern(&mut self, pattern: &Pattern, expected: &Ty) -> Pat {
        self.pattern_types.insert(pattern.id, expected.clone());
        match &pattern.kind {
            PatternKind::Wildcard => Pat::Wild,
            PatternKind::Binding { binding, .. } => match binding {
                Some(id) => {
                    self.binding_types.insert(*id, expected.clone());
                    Pat::Bind(*id)
                }
                None => Pat::Wild,
            },
            PatternKind::Int { value, negative } => {
                let ty = self.literal(*value, *negative, pattern.span);
                self.expect_ty(expected, &ty, pattern.span);
                let key = if *negative {
                    format!("-{value}")
                } else {
                    value.to_string()
                };
                Pat::ctor(Ctor::Lit(key), Vec::new())
            }
            PatternKind::Float(value) => {
                let v = self.uni.fresh(VarKind::Fractional);
                self.track_numeric(v);
                self.expect_ty(expected, &Ty::Var(v), pattern.span);
                Pat::ctor(Ctor::Lit(value.to_string()), Vec::new())
            }
            PatternKind::Str(value) => {
                self.expect_ty(expected, &Ty::Prim(Prim::Str), pattern.span);
                Pat::ctor(Ctor::Lit(format!("{value:?}")), Vec::new())
            }
            PatternKind::Tuple { items, rest } => {
                self.check_tuple_pattern(pattern, items, rest.as_ref(), expected)
            }
            PatternKind::Record(fields) => {
                let field_tys: Vec<(String, Ty)> = match self.view(expected) {
                    Ty::Record(tys) => tys,
                    Ty::Var(_) => {
                        let shape = Ty::record(
                            fields
                                .iter()
                                .map(|f| (f.name.node.clone(), self.uni.fresh_ty()))
                                .collect(),
                        );
                        self.expect_ty(expected, &shape, pattern.span);
                        match shape {
                            Ty::Record(tys) => tys,
                            _ => Vec::new(),
                        }
                    }
                    Ty::Error => {
                        for f in fields {
                            self.check_pattern(&f.pattern, &Ty::Error);
                        }
                        return Pat::Wild;
                    }
                    other => {
                        let message =
                            format!("expected {}, found a record pattern", self.uni.show(&other));
                        self.error(message, pattern.span);
                        for f in fields {
                            self.check_pattern(&f.pattern, &Ty::Error);
                        }
                        return Pat::Wild;
                    }
                };
                let mut args = vec![Pat::Wild; field_tys.len()];
                for f in fields {
                    match field_tys.iter().position(|(n, _)| *n == f.name.node) {
                        Some(i) => {
                            let ty = field_tys[i].1.clone();
                            args[i] = self.check_pattern(&f.pattern, &ty);
                        }
                        None => {
                            let message = format!(
                                "type `{}` has no field `{}`",
                                self.uni.show(expected),
                                f.name.node
                            );
                            self.error(message, f.name.span);
                            self.check_pattern(&f.pattern, &Ty::Error);
                        }
                    }
                }
                let names = field_tys.into_iter().map(|(n, _)| n).collect();
                Pat::ctor(Ctor::Record(names), args)
            }
            PatternKind::Tag { payload, res, .. } => {
                self.check_tag_pattern(pattern, res.as_ref(), payload.as_deref(), expected)
            }
            PatternKind::List { items, rest } => {
                let elem = match self.view(expected) {
                    Ty::List(elem) => *elem,
                    Ty::Error => Ty::Error,
                    _ => {
                        let elem = self.uni.fresh_ty();
                        self.expect_ty(expected, &Ty::List(Box::new(elem.clone())), pattern.span);
                        elem
                    }
                };
                let tail = match rest {
                    Some(rest) => match rest.binding {
                        Some(id) => {
                            self.binding_types
                                .insert(id, Ty::List(Box::new(elem.clone())));
                            Pat::Bind(id)
                        }
                        None => Pat::Wild,
                    },
                    None => Pat::ctor(Ctor::Nil, Vec::new()),
                };
                let heads: Vec<Pat> = items.iter().map(|p| self.check_pattern(p, &elem)).collect();
                heads
                    .into_iter()
                    .rev()
                    .fold(tail, |tail, head| Pat::ctor(Ctor::Cons, vec![head, tail]))
            }
        }
    }

    fn check_tag_pattern(
        &mut self,
        pattern: &Pattern,
        res: Option<&TagRes>,
        payload: Option<&Pattern>,
        expected: &Ty,
    ) -> Pat {
        let found = res.and_then(|res| {
            self.uni.defs.get(&res.ty).map(|def| {
                let variant = def.variants().and_then(|v| v.get(res.index)).cloned();
                (res.clone(), def.params.len(), variant)
            })
        });
        let Some((res, arity, Some(variant))) = found else {
            if let Some(payload) = payload {
                self.check_pattern(payload, &Ty::Error);
            }
            return Pat::Wild;
        };
        let args: Vec<Ty> = (0..arity).map(|_| self.uni.fresh_ty()).collect();
        let con = Ty::Con {
            name: res.ty.clone(),
            args: args.clone(),
        };
        self.expect_ty(expected, &con, pattern.span);
        let sub = match (&variant.payload, payload) {
            (Some(template), Some(payload)) => {
                let ty = template.instantiate(&args, &[]);
                vec![self.check_pattern(payload, &ty)]
            }
            (Some(_), None) => {
                self.error(
                    format!(
                        "tag `{0}` carries a payload; match it with `{0} _`",
                        variant.tag
                    ),
                    pattern.span,
                );
                vec![Pat::Wild]
            }
            (None, Some(payload)) => {
                self.error(format!("tag `{}` carries no payload", variant.tag), pattern.span);
                self.check_pattern(payload, &Ty::Error);
                Vec::new()
            }
            (None, None) => Vec::new(),
        };
        Pat::ctor(
            Ctor::Tag {
                index: res.index,
                name: variant.tag.clone(),
                arity: usize::from(variant.payload.is_some()),
            },
            sub,
        )
    }

    fn check_tuple_pattern(
        &mut self,
        pattern: &Pattern,
        items: &[Pattern],
        rest: Option<&RestPattern>,
        expected: &Ty,
    ) -> Pat {
        match self.view(expected) {
            Ty::Family { name, elem, len } => {
                self.check_family_pattern(pattern, &name, &elem, len, items, rest)
            }
            Ty::Tuple(tys) => self.positional(pattern, Ctor::Tuple(tys.len()), &tys, items, rest),
            Ty::Var(_) if rest.is_none() => {
                let tys: Vec<Ty> = items.iter().map(|_| self.uni.fresh_ty()).collect();
                self.expect_ty(expected, &Ty::Tuple(tys.clone()), pattern.span);
                self.positional(pattern, Ctor::Tuple(tys.len()), &tys, items, rest)
            }
            Ty::Error => {
                self.erase(items, rest);
                Pat::Wild
            }
            Ty::Var(_) => {
                self.error(
                    "the type of a tuple pattern with `..` must be known; add a signature",
                    pattern.span,
                );
                self.erase(items, rest);
                Pat::Wild
            }
            other => {
                let message = format!("expected {}, found a tuple pattern", self.uni.show(&other));
                self.error(message, pattern.span);
                self.erase(items, rest);
                Pat::Wild
            }
        }
    }

    /// Matching a family value selects its zero or successor shape by the
    /// pattern's size and refines the length for the arm.
    fn check_family_pattern(
        &mut self,
        pattern: &Pattern,
        name: &QualName,
        elem: &Ty,
        len: Len,
        items: &[Pattern],
        rest: Option<&RestPattern>,
    ) -> Pat {
        let Some(family) = self.uni.family(name).cloned() else {
            self.erase(items, rest);
            return Pat::Wild;
        };
        let (zero_n, succ_n) = (family.zero.len(), family.succ.len());
        let k = items.len();
        let is_zero = match rest {
            None if k == zero_n => Some(true),
            None if k == succ_n => Some(false),
            None => None,
            Some(_) => match (k <= zero_n, k <= succ_n) {
                (true, false) => Some(true),
                (false, true) => Some(false),
                _ => None,
            },
        };
        let Some(is_zero) = is_zero else {
            let message = if rest.is_some() && k <= zero_n {
                format!(
                    "this pattern could match either shape of `{}`; list the elements",
                    name.name
                )
            } else {
                format!(
                    "a `{}` is a tuple of {zero_n} or {succ_n} elements, but this pattern has {k}",
                    name.name
                )
            };
            self.error(message, pattern.span);
            self.erase(items, rest);
            return Pat::Wild;
        };

        let len = self.uni.resolve_len(len);
        let tys = if is_zero {
            match (len.base, len.offset) {
                (LenBase::Zero, 0) => {}
                (_, at_least) if at_least > 0 => {
                    self.error(
                        format!(
                            "this `{}` has at least {at_least} element(s), so the empty shape never matches",
                            name.name
                        ),
                        pattern.span,
                    );
                    self.erase(items, rest);
                    return Pat::Wild;
                }
                (base, _) => self.uni.refine(base, Len::lit(0)),
            }
            family.zero_items(elem)
        } else {
            let pred = match (len.base, len.offset) {
                (LenBase::Zero, 0) => {
                    self.error(
                        format!(
                            "this `{}` is empty, so a non-empty shape never matches",
                            name.name
                        ),
                        pattern.span,
                    );
                    self.erase(items, rest);
                    return Pat::Wild;
                }
                (base, k) if k > 0 => Len {
                    base,
                    offset: k - 1,
                },
                (base, _) => {
                    let m = self.uni.fresh_rigid(format!("{}'", family.len_param));
                    let pred = Len::of(LenBase::Rigid(m));
                    self.uni.refine(base, pred.plus(1));
                    pred
                }
            };
            family.succ_items(elem, pred)
        };
        let ctor = if is_zero {
            Ctor::Zero(zero_n)
        } else {
            Ctor::Succ(succ_n)
        };
        self.positional(pattern, ctor, &tys, items, rest)
    }

    fn positional(
        &mut self,
        pattern: &Pattern,
        ctor: Ctor,
        tys: &[Ty],
        items: &[Pattern],
        rest: Option<&RestPattern>,
    ) -> Pat {
        let fits = match rest {
            None => items.len() == tys.len(),
            Some(_) => items.len() <= tys.len(),
        };
        if !fits {
            self.error(
                format!(
                    "this pattern has {} element(s) but the value has {}",
                    items.len(),
                    tys.len()
                ),
                pattern.span,
            );
            self.erase(items, rest);
            return Pat::Wild;
        }
        let mut args: Vec<Pat> = items
            .iter()
            .zip(tys)
            .map(|(p, ty)| self.check_pattern(p, ty))
            .collect();
        args.resize(tys.len(), Pat::Wild);
        let rest = rest.and_then(|r| {
            let id = r.binding?;
            self.binding_types
                .insert(id, Ty::Tuple(tys[items.len()..].to_vec()));
            Some((items.len(), id))
        });
        Pat::Ctor { ctor, args, rest }
    }

    /// Check sub-patterns against nothing, so their binders still get types.
    fn erase(&mut self, items: &[Pattern], rest: Option<&RestPattern>) {
        for item in items {
            self.check_pattern(item, &Ty::Error);
        }
        if let Some(id) = rest.and_then(|r| r.binding) {
            self.binding_types.insert(id, Ty::Error);
        }
    }
}

impl ShapeOracle for ModuleChecker<'_> {
    fn constructors(&mut self, ty: &Ty) -> Option<Vec<Ctor>> {
        match self.view(ty) {
            Ty::Tuple(tys) => Some(vec![Ctor::Tuple(tys.len())]),
            Ty::Record(fields) => Some(vec![Ctor::Record(
                fields.into_iter().map(|(n, _)| n).collect(),
            )]),
            Ty::Con { name, .. } => {
                let variants = self.uni.defs.get(&name)?.variants()?;
                Some(
                    variants
                        .iter()
                        .enumerate()
                        .map(|(index, v)| Ctor::Tag {
                            index,
                            name: v.tag.clone(),
                            arity: usize::from(v.payload.is_some()),
                        })
                        .collect(),
                )
            }
            Ty::Family { name, len, .. } => {
                let family = self.uni.family(&name)?;
                let zero = Ctor::Zero(family.zero.len());
                let succ = Ctor::Succ(family.succ.len());
                let len = self.uni.resolve_len(len);
                Some(match (len.base, len.offset) {
                    (LenBase::Zero, 0) => vec![zero],
                    (_, k) if k > 0 => vec![succ],
                    _ => vec![zero, succ],
                })
            }
            Ty::List(_) => Some(vec![Ctor::Nil, Ctor::Cons]),
            _ => None,
        }
    }

    fn field_types(&mut self, ty: &Ty, ctor: &Ctor) -> Vec<Ty> {
        match (self.view(ty), ctor) {
            (Ty::Tuple(tys), _) => tys,
            (Ty::Record(fields), _) => fields.into_iter().map(|(_, t)| t).collect(),
            (Ty::Con { name, args }, Ctor::Tag { index, .. }) => self
                .uni
                .defs
                .get(&name)
                .and_then(|d| d.variants())
                .and_then(|v| v.get(*index))
                .and_then(|v| v.payload.as_ref())
                .map(|p| vec![p.instantiate(&args, &[])])
                .unwrap_or_default(),
            (Ty::Family { name, elem, .. }, Ctor::Zero(_)) => self
                .uni
                .family(&name)
                .map(|f| f.zero_items(&elem))
                .unwrap_or_default(),
            (Ty::Family { name, elem, len }, Ctor::Succ(_)) => {
                let len = self.uni.resolve_len(len);
                let pred = if len.offset > 0 {
                    Len {
                        base: len.base,
                        offset: len.offset - 1,
                    }
                } else {
                    self.uni.fresh_len()
                };
                self.uni
                    .family(&name)
                    .map(|f| f.succ_items(&elem, pred))
                    .unwrap_or_default()
            }
            (Ty::List(elem), Ctor::Cons) => vec![(*elem).clone(), Ty::List(elem)],
            _ => Vec::new(),
        }
    }
}
