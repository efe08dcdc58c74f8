#![forbid(unsafe_code)]

use std::collections::HashMap;

use sable_ast::{Prim, QualName};

use crate::types::{Len, LenBase, LenVar, RigidId, Ty, TyNames, TyVar, TypeDef, TypeDefKind, render};

/// Literal classes carried by type variables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum VarKind {
    General,
    Numeric,
    Fractional,
}

impl VarKind {
    fn label(self) -> &'static str {
        match self {
            VarKind::General => "_",
            VarKind::Numeric => "{number}",
            VarKind::Fractional => "{float}",
        }
    }

    fn admits(self, prim: Prim) -> bool {
        match self {
            VarKind::General => true,
            VarKind::Numeric => prim.is_numeric(),
            VarKind::Fractional => prim.is_float(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum UnifyError {
    Mismatch,
    Message(String),
    RecursionLimit,
}

/// Result of looking through a family application at its current length.
pub(crate) enum Unfold {
    Items(Vec<Ty>),
    /// Length is an unsolved variable with no offset.
    Unknown(LenVar),
    /// Length is a rigid variable nobody has matched on.
    Stuck,
}

struct TyVarSlot {
    bound: Option<Ty>,
    kind: VarKind,
}

/// Substitution state shared by one module's checking pass.
pub(crate) struct Unifier {
    pub defs: HashMap<QualName, TypeDef>,
    pub rigid_names: Vec<String>,
    tys: Vec<TyVarSlot>,
    lens: Vec<Option<Len>>,
    /// Arm-local facts learned by matching on a length, innermost last.
    refinements: Vec<(LenBase, Len)>,
    limit: usize,
}

impl Unifier {
    pub fn new(defs: HashMap<QualName, TypeDef>, limit: usize) -> Self {
        Self {
            defs,
            rigid_names: Vec::new(),
            tys: Vec::new(),
            lens: Vec::new(),
            refinements: Vec::new(),
            limit,
        }
    }

    pub fn fresh(&mut self, kind: VarKind) -> TyVar {
        self.tys.push(TyVarSlot { bound: None, kind });
        TyVar(self.tys.len() as u32 - 1)
    }

    pub fn fresh_ty(&mut self) -> Ty {
        Ty::Var(self.fresh(VarKind::General))
    }

    pub fn fresh_len(&mut self) -> Len {
        self.lens.push(None);
        Len::of(LenBase::Var(LenVar(self.lens.len() as u32 - 1)))
    }

    pub fn fresh_rigid(&mut self, name: impl Into<String>) -> RigidId {
        self.rigid_names.push(name.into());
        RigidId(self.rigid_names.len() as u32 - 1)
    }

    pub fn kind(&self, v: TyVar) -> VarKind {
        self.tys[v.0 as usize].kind
    }

    /// Raise a variable's literal class.
    pub fn require_kind(&mut self, v: TyVar, kind: VarKind) {
        let slot = &mut self.tys[v.0 as usize];
        slot.kind = slot.kind.max(kind);
    }

    pub fn bind_var(&mut self, v: TyVar, ty: Ty) {
        self.tys[v.0 as usize].bound = Some(ty);
    }

    pub fn refinement_mark(&self) -> usize {
        self.refinements.len()
    }

    pub fn refine(&mut self, base: LenBase, len: Len) {
        self.refinements.push((base, len));
    }

    pub fn truncate_refinements(&mut self, mark: usize) {
        self.refinements.truncate(mark);
    }

    /// Follow variable bindings at the head of `ty`.
    pub fn shallow(&self, ty: &Ty) -> Ty {
        let mut ty = ty.clone();
        while let Ty::Var(v) = ty {
            match &self.tys[v.0 as usize].bound {
                Some(bound) => ty = bound.clone(),
                None => break,
            }
        }
        ty
    }

    /// Apply the substitution everywhere in `ty`. Refinements are not applied.
    pub fn resolve(&self, ty: &Ty) -> Ty {
        ty.map(
            &mut |t| match t {
                Ty::Var(v) => Some(match &self.tys[v.0 as usize].bound {
                    Some(bound) => self.resolve(bound),
                    None => t.clone(),
                }),
                _ => None,
            },
            &mut |l| self.resolve_len_raw(l),
        )
    }

    pub fn resolve_len_raw(&self, mut len: Len) -> Len {
        while let LenBase::Var(v) = len.base {
            match self.lens[v.0 as usize] {
                Some(bound) => len = bound.plus(len.offset),
                None => break,
            }
        }
        len
    }

    /// Resolve through the substitution and the active refinements.
    pub fn resolve_len(&self, len: Len) -> Len {
        let mut len = self.resolve_len_raw(len);
        for _ in 0..=self.refinements.len() {
            let refined = self
                .refinements
                .iter()
                .rev()
                .find(|(base, _)| *base == len.base)
                .map(|(_, to)| *to);
            match refined {
                Some(to) => len = self.resolve_len_raw(to.plus(len.offset)),
                None => break,
            }
        }
        len
    }

    /// Expand an alias application one step.
    pub fn expand(&self, ty: &Ty) -> Option<Ty> {
        let Ty::Con { name, args } = ty else {
            return None;
        };
        match &self.defs.get(name)?.kind {
            TypeDefKind::Alias(body) => Some(body.instantiate(args, &[])),
            _ => None,
        }
    }

    /// Head of `ty` with variables followed and aliases expanded.
    pub fn view(&self, ty: &Ty) -> Result<Ty, UnifyError> {
        let mut ty = self.shallow(ty);
        for _ in 0..self.limit {
            match self.expand(&ty) {
                Some(next) => ty = self.shallow(&next),
                None => return Ok(ty),
            }
        }
        Err(UnifyError::RecursionLimit)
    }

    pub fn family(&self, name: &QualName) -> Option<&crate::types::FamilyDef> {
        self.defs.get(name).and_then(TypeDef::as_family)
    }

    pub fn unfold(&self, name: &QualName, elem: &Ty, len: Len) -> Unfold {
        let Some(family) = self.family(name) else {
            return Unfold::Items(Vec::new());
        };
        let len = self.resolve_len(len);
        match (len.base, len.offset) {
            (LenBase::Zero, 0) => Unfold::Items(family.zero_items(elem)),
            (base, k) if k > 0 => Unfold::Items(family.succ_items(
                elem,
                Len {
                    base,
                    offset: k - 1,
                },
            )),
            (LenBase::Var(v), _) => Unfold::Unknown(v),
            _ => Unfold::Stuck,
        }
    }

    pub fn unify(&mut self, a: &Ty, b: &Ty) -> Result<(), UnifyError> {
        self.unify_at(a, b, 0)
    }

    fn unify_at(&mut self, a: &Ty, b: &Ty, depth: usize) -> Result<(), UnifyError> {
        if depth > self.limit {
            return Err(UnifyError::RecursionLimit);
        }
        let depth = depth + 1;
        let a = self.shallow(a);
        let b = self.shallow(b);
        match (&a, &b) {
            (Ty::Error, _) | (_, Ty::Error) => Ok(()),
            (Ty::Var(x), Ty::Var(y)) if x == y => Ok(()),
            (Ty::Var(x), _) => self.bind_ty(*x, &b),
            (_, Ty::Var(y)) => self.bind_ty(*y, &a),
            (Ty::Gen(i), Ty::Gen(j)) if i == j => Ok(()),
            (Ty::Rigid(x), Ty::Rigid(y)) if x == y => Ok(()),
            (Ty::Prim(p), Ty::Prim(q)) if p == q => Ok(()),
            (Ty::Con { name: n1, args: a1 }, Ty::Con { name: n2, args: a2 })
                if n1 == n2 && a1.len() == a2.len() =>
            {
                for (x, y) in a1.iter().zip(a2) {
                    self.unify_at(x, y, depth)?;
                }
                Ok(())
            }
            (Ty::Con { .. }, _) if self.expand(&a).is_some() => {
                let a = self.expand(&a).unwrap_or(Ty::Error);
                self.unify_at(&a, &b, depth)
            }
            (_, Ty::Con { .. }) if self.expand(&b).is_some() => {
                let b = self.expand(&b).unwrap_or(Ty::Error);
                self.unify_at(&a, &b, depth)
            }
            (
                Ty::Family {
                    name: n1,
                    elem: e1,
                    len: l1,
                },
                Ty::Family {
                    name: n2,
                    elem: e2,
                    len: l2,
                },
            ) if n1 == n2 => {
                self.unify_at(e1, e2, depth)?;
                self.unify_len(*l1, *l2)
            }
            (Ty::Family { name, elem, len }, Ty::Tuple(items))
            | (Ty::Tuple(items), Ty::Family { name, elem, len }) => {
                self.unify_family_tuple(name, elem, *len, items, depth)
            }
            (Ty::Tuple(xs), Ty::Tuple(ys)) if xs.len() == ys.len() => {
                for (x, y) in xs.iter().zip(ys) {
                    self.unify_at(x, y, depth)?;
                }
                Ok(())
            }
            (Ty::Record(xs), Ty::Record(ys))
                if xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| x.0 == y.0) =>
            {
                for ((_, x), (_, y)) in xs.iter().zip(ys) {
                    self.unify_at(x, y, depth)?;
                }
                Ok(())
            }
            (Ty::List(x), Ty::List(y)) => self.unify_at(x, y, depth),
            (Ty::Fn(p1, r1), Ty::Fn(p2, r2)) => {
                let n = p1.len().min(p2.len());
                for (x, y) in p1.iter().zip(p2).take(n) {
                    self.unify_at(x, y, depth)?;
                }
                // Functions are curried: `A -> B -> C` is `A -> (B -> C)`.
                match p1.len().cmp(&p2.len()) {
                    std::cmp::Ordering::Equal => self.unify_at(r1, r2, depth),
                    std::cmp::Ordering::Greater => {
                        let rest = Ty::Fn(p1[n..].to_vec(), r1.clone());
                        self.unify_at(&rest, r2, depth)
                    }
                    std::cmp::Ordering::Less => {
                        let rest = Ty::Fn(p2[n..].to_vec(), r2.clone());
                        self.unify_at(r1, &rest, depth)
                    }
                }
            }
            _ => Err(UnifyError::Mismatch),
        }
    }

    fn unify_family_tuple(
        &mut self,
        name: &QualName,
        elem: &Ty,
        len: Len,
        items: &[Ty],
        depth: usize,
    ) -> Result<(), UnifyError> {
        let unfolded = match self.unfold(name, elem, len) {
            Unfold::Items(expected) => expected,
            Unfold::Unknown(v) => {
                let Some(family) = self.family(name).cloned() else {
                    return Err(UnifyError::Mismatch);
                };
                // An unknown length is fixed by the arity of the tuple.
                if family.zero.len() == items.len() {
                    self.lens[v.0 as usize] = Some(Len::lit(0));
                    family.zero_items(elem)
                } else if family.succ.len() == items.len() {
                    let pred = self.fresh_len();
                    self.lens[v.0 as usize] = Some(pred.plus(1));
                    family.succ_items(elem, pred)
                } else {
                    return Err(UnifyError::Mismatch);
                }
            }
            Unfold::Stuck => {
                return Err(UnifyError::Message(format!(
                    "the length of this `{}` is not known here; match on it to learn its shape",
                    name.name
                )));
            }
        };
        if unfolded.len() != items.len() {
            return Err(UnifyError::Mismatch);
        }
        for (x, y) in unfolded.iter().zip(items) {
            self.unify_at(x, y, depth)?;
        }
        Ok(())
    }

    pub fn unify_len(&mut self, a: Len, b: Len) -> Result<(), UnifyError> {
        let a = self.resolve_len(a);
        let b = self.resolve_len(b);
        if a == b {
            return Ok(());
        }
        match (a.base, b.base) {
            (LenBase::Var(v), _) if a.offset <= b.offset => {
                if b.base == a.base {
                    return Err(UnifyError::Message("length would be infinite".to_string()));
                }
                self.lens[v.0 as usize] = Some(Len {
                    base: b.base,
                    offset: b.offset - a.offset,
                });
                Ok(())
            }
            (_, LenBase::Var(w)) if b.offset <= a.offset => {
                if a.base == b.base {
                    return Err(UnifyError::Message("length would be infinite".to_string()));
                }
                self.lens[w.0 as usize] = Some(Len {
                    base: a.base,
                    offset: a.offset - b.offset,
                });
                Ok(())
            }
            _ => Err(UnifyError::Mismatch),
        }
    }

    fn bind_ty(&mut self, v: TyVar, ty: &Ty) -> Result<(), UnifyError> {
        if self.occurs(v, ty) {
            return Err(UnifyError::Message("type would be infinite".to_string()));
        }
        let kind = self.kind(v);
        match ty {
            Ty::Var(w) => self.require_kind(*w, kind),
            Ty::Prim(p) if kind.admits(*p) => {}
            Ty::Error => {}
            _ if kind == VarKind::General => {}
            _ => {
                let view = self.view(ty)?;
                match view {
                    Ty::Prim(p) if kind.admits(p) => {}
                    Ty::Var(w) => self.require_kind(w, kind),
                    _ => return Err(UnifyError::Mismatch),
                }
            }
        }
        self.bind_var(v, ty.clone());
        Ok(())
    }

    fn occurs(&self, v: TyVar, ty: &Ty) -> bool {
        let mut found = false;
        self.resolve(ty).walk(&mut |t| {
            if *t == Ty::Var(v) {
                found = true;
            }
        });
        found
    }

    /// Render a type for messages. Unsolved variables print as `_`, or as
    /// `{number}` and `{float}` when a literal constrains them.
    pub fn show(&self, ty: &Ty) -> String {
        let ty = self.resolve(ty);
        let vars: Vec<&'static str> = self.tys.iter().map(|slot| slot.kind.label()).collect();
        let names = TyNames {
            vars: &vars,
            ty: &[],
            len: &[],
            rigid: &self.rigid_names,
        };
        render(&ty, &names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FamilyDef, TypeDef};

    fn vec_name() -> QualName {
        QualName::new("m", "Vec")
    }

    fn unifier() -> Unifier {
        let def = TypeDef {
            name: vec_name(),
            public: true,
            params: vec!["T".into()],
            kind: TypeDefKind::Family(FamilyDef {
                len_param: "len".into(),
                len_ty: Prim::U32,
                zero: Vec::new(),
                succ: vec![
                    Ty::Gen(0),
                    Ty::Family {
                        name: vec_name(),
                        elem: Box::new(Ty::Gen(0)),
                        len: Len::of(LenBase::Gen(0)),
                    },
                ],
            }),
        };
        let mut defs = HashMap::new();
        defs.insert(vec_name(), def);
        Unifier::new(defs, 64)
    }

    fn vec_of(elem: Ty, len: Len) -> Ty {
        Ty::Family {
            name: vec_name(),
            elem: Box::new(elem),
            len,
        }
    }

    #[test]
    fn literal_lengths_unfold_to_nested_tuples() {
        let mut u = unifier();
        let two = vec_of(Ty::Prim(Prim::I64), Len::lit(2));
        let nested = Ty::Tuple(vec![
            Ty::Prim(Prim::I64),
            Ty::Tuple(vec![Ty::Prim(Prim::I64), Ty::Tuple(Vec::new())]),
        ]);
        assert_eq!(u.unify(&two, &nested), Ok(()));
        let short = Ty::Tuple(vec![Ty::Prim(Prim::I64), Ty::Tuple(Vec::new())]);
        assert_eq!(u.unify(&two, &short), Err(UnifyError::Mismatch));
    }

    #[test]
    fn unknown_lengths_are_solved_by_arity() {
        let mut u = unifier();
        let len = u.fresh_len();
        let v = vec_of(Ty::Prim(Prim::I64), len);
        assert_eq!(u.unify(&v, &Ty::Tuple(Vec::new())), Ok(()));
        assert_eq!(u.resolve_len(len).as_literal(), Some(0));
    }

    #[test]
    fn refinements_are_scoped() {
        let mut u = unifier();
        let len = u.fresh_len();
        let LenBase::Var(_) = len.base else {
            panic!("expected a variable");
        };
        let mark = u.refinement_mark();
        u.refine(len.base, Len::lit(0));
        assert_eq!(u.resolve_len(len).as_literal(), Some(0));
        u.truncate_refinements(mark);
        assert_eq!(u.resolve_len(len), len);
    }

    #[test]
    fn length_offsets_cancel() {
        let mut u = unifier();
        let n = u.fresh_len();
        let m = u.fresh_len();
        assert_eq!(u.unify_len(n.plus(1), m.plus(3)), Ok(()));
        assert_eq!(u.resolve_len(n), m.plus(2));
        assert_eq!(u.unify_len(Len::lit(1), m.plus(3)), Err(UnifyError::Mismatch));
    }

    #[test]
    fn numeric_variables_reject_strings() {
        let mut u = unifier();
        let v = Ty::Var(u.fresh(VarKind::Numeric));
        assert_eq!(u.unify(&v, &Ty::Prim(Prim::Str)), Err(UnifyError::Mismatch));
        assert_eq!(u.unify(&v, &Ty::Prim(Prim::U8)), Ok(()));
    }

    #[test]
    fn curried_functions_unify_across_arities() {
        let mut u = unifier();
        let i = Ty::Prim(Prim::I64);
        let flat = Ty::Fn(vec![i.clone(), i.clone()], Box::new(i.clone()));
        let nested = Ty::Fn(
            vec![i.clone()],
            Box::new(Ty::Fn(vec![i.clone()], Box::new(i.clone()))),
        );
        assert_eq!(u.unify(&flat, &nested), Ok(()));
    }
}
