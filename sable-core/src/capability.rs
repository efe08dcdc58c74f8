#![forbid(unsafe_code)]

//! Capability declarations, the implementation registry and
//! implementation checking.

use sable_ast::{ImplDecl, ItemKind, QualName, Span};
use tracing::trace;

use crate::check::{Frame, ModuleChecker};
use crate::error::SemanticError;
use crate::interface::{CapabilityDef, CapabilityUse, HeadKey, ImplDef, OpDef};
use crate::lower::LowerCtx;
use crate::types::{Len, LenBase, Scheme, Ty};

impl ModuleChecker<'_> {
    /// Imported capabilities, then this module's declarations.
    pub(crate) fn collect_capabilities(&mut self) {
        let imports = self.imports;
        for iface in imports.values() {
            for cap in iface.capabilities.values() {
                self.capabilities.insert(cap.name.clone(), cap.clone());
            }
        }

        let module = self.module;
        for item in &module.items {
            let ItemKind::Capability(decl) = &item.kind else {
                continue;
            };
            let name = QualName::new(self.name, decl.name.node.as_str());
            if self.capabilities.contains_key(&name) {
                continue;
            }
            let mut ops = Vec::with_capacity(decl.ops.len());
            for op in &decl.ops {
                let mut ctx = LowerCtx::generic().with_self();
                let ty = self.lower_type(&op.ty, &mut ctx);
                let takes_self = matches!(&ty, Ty::Fn(params, _) if params.first() == Some(&Ty::Gen(0)));
                if !takes_self && !ty.is_error() {
                    self.error(
                        format!(
                            "the first parameter of operation `{}` must be `Self`",
                            op.name.node
                        ),
                        op.ty.span,
                    );
                }
                ops.push(OpDef {
                    name: op.name.node.clone(),
                    scheme: Scheme {
                        ty_names: ctx.ty_names(),
                        len_names: ctx.len_names(),
                        constraints: vec![(0, name.clone())],
                        ty,
                    },
                });
            }
            self.capabilities.insert(
                name.clone(),
                CapabilityDef {
                    name,
                    public: decl.vis.is_public(),
                    ops,
                },
            );
        }
    }

    /// Build the registry: imported implementations plus local ones, keyed
    /// by capability and target head.
    pub(crate) fn collect_impls(&mut self) {
        let imports = self.imports;
        for iface in imports.values() {
            self.impls.extend(iface.impls.iter().cloned());
        }

        let module = self.module;
        for (idx, item) in module.items.iter().enumerate() {
            let ItemKind::Implementation(decl) = &item.kind else {
                continue;
            };
            let Some(capability) = &decl.capability_res else {
                continue;
            };
            let mut ctx = LowerCtx::generic();
            let target = self.lower_type(&decl.target, &mut ctx);
            if target.is_error() {
                continue;
            }
            let Some(head) = self.head_of(&target) else {
                let message = format!(
                    "cannot implement `{}` for `{}`: the target needs a concrete outer type",
                    capability.name,
                    self.uni.show(&target)
                );
                self.error(message, decl.target.span);
                continue;
            };
            let previous = self
                .local_impls
                .iter()
                .find(|(i, _)| i.capability == *capability && i.head == head)
                .map(|(_, span)| *span);
            if let Some(previous) = previous {
                self.errors.push(SemanticError::DuplicateDeclaration {
                    name: format!("{} for {}", capability.name, head),
                    span: decl.span,
                    previous,
                });
                continue;
            }
            let def = ImplDef {
                capability: capability.clone(),
                head,
                module: self.name.to_string(),
            };
            self.impls.push(def.clone());
            self.local_impls.push((def, decl.span));
            self.impl_targets
                .insert(idx, (target, ctx.ty_names(), ctx.len_names()));
        }
    }

    pub(crate) fn head_of(&self, ty: &Ty) -> Option<HeadKey> {
        match self.uni.view(ty).ok()? {
            Ty::Prim(p) => Some(HeadKey::Prim(p)),
            Ty::Con { name, .. } => Some(HeadKey::Con(name)),
            Ty::Family { name, .. } => Some(HeadKey::Family(name)),
            Ty::List(_) => Some(HeadKey::List),
            Ty::Tuple(items) => Some(HeadKey::Tuple(items.len())),
            Ty::Record(fields) => Some(HeadKey::Record(
                fields.into_iter().map(|(n, _)| n).collect(),
            )),
            Ty::Fn(params, _) => Some(HeadKey::Fn(params.len())),
            Ty::Var(_) | Ty::Gen(_) | Ty::Rigid(_) | Ty::Error => None,
        }
    }

    /// Find the single implementation of `capability` for a concrete type.
    pub(crate) fn resolve_impl(&mut self, ty: &Ty, capability: &QualName, span: Span) {
        let missing = |this: &Self| SemanticError::MissingCapability {
            ty: this.uni.show(ty),
            capability: capability.name.clone(),
            span,
        };
        let Some(head) = self.head_of(ty) else {
            let err = missing(self);
            self.errors.push(err);
            return;
        };
        let modules: Vec<String> = self
            .impls
            .iter()
            .filter(|i| i.capability == *capability && i.head == head)
            .map(|i| i.module.clone())
            .collect();
        match modules.as_slice() {
            [] => {
                let err = missing(self);
                self.errors.push(err);
            }
            [module] => {
                trace!(target: "sable::check", capability = %capability, head = %head, module = %module, "capability resolved");
                self.capability_uses.push(CapabilityUse {
                    span,
                    capability: capability.clone(),
                    head,
                    module: module.clone(),
                });
            }
            several => {
                self.errors.push(SemanticError::AmbiguousCapability {
                    capability: capability.name.clone(),
                    message: format!(
                        "{} implementations apply to `{}` (from {})",
                        several.len(),
                        self.uni.show(ty),
                        several.join(", ")
                    ),
                    span,
                });
            }
        }
    }

    /// Check an implementation's members against the capability's
    /// operations with `Self` replaced by the target.
    pub(crate) fn check_impl(&mut self, idx: usize, decl: &ImplDecl) {
        let Some((target, ty_names, len_names)) = self.impl_targets.get(&idx).cloned() else {
            return;
        };
        let Some(cap) = decl
            .capability_res
            .as_ref()
            .and_then(|c| self.capabilities.get(c))
            .cloned()
        else {
            return;
        };
        let tys: Vec<Ty> = ty_names
            .iter()
            .map(|n| Ty::Rigid(self.uni.fresh_rigid(n.clone())))
            .collect();
        let lens: Vec<Len> = len_names
            .iter()
            .map(|n| Len::of(LenBase::Rigid(self.uni.fresh_rigid(n.clone()))))
            .collect();
        let target = target.instantiate(&tys, &lens);

        for member in &decl.members {
            if !cap.ops.iter().any(|op| op.name == member.name.node) {
                self.error(
                    format!(
                        "`{}` is not an operation of `{}`",
                        member.name.node, cap.name.name
                    ),
                    member.name.span,
                );
            }
        }
        for op in &cap.ops {
            let Some(member) = decl.members.iter().find(|m| m.name.node == op.name) else {
                let message = format!(
                    "implementation of `{}` for `{}` is missing operation `{}`",
                    cap.name.name,
                    self.uni.show(&target),
                    op.name
                );
                self.error(message, decl.span);
                continue;
            };
            let mut op_tys = vec![target.clone()];
            for name in op.scheme.ty_names.iter().skip(1) {
                op_tys.push(Ty::Rigid(self.uni.fresh_rigid(name.clone())));
            }
            let op_lens: Vec<Len> = op
                .scheme
                .len_names
                .iter()
                .map(|n| Len::of(LenBase::Rigid(self.uni.fresh_rigid(n.clone()))))
                .collect();
            let expected = op.scheme.ty.instantiate(&op_tys, &op_lens);

            self.frames.push(Frame::default());
            self.check_expr(&member.value, &expected);
            self.finish_frame(None);
        }
    }
}
