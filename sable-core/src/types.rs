#![forbid(unsafe_code)]

use std::fmt;

use sable_ast::{Prim, QualName};

/// Unification variable for types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TyVar(pub u32);

/// Unification variable for lengths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LenVar(pub u32);

/// A skolem: a variable that only unifies with itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RigidId(pub u32);

#[derive(Clone, Debug, PartialEq)]
pub enum Ty {
    Var(TyVar),
    /// Quantified variable of a scheme or declaration template.
    Gen(u32),
    Rigid(RigidId),
    Prim(Prim),
    /// A declared type: a union, or an alias expanded on demand.
    Con {
        name: QualName,
        args: Vec<Ty>,
    },
    /// A length-indexed family applied to its element type and length.
    Family {
        name: QualName,
        elem: Box<Ty>,
        len: Len,
    },
    Tuple(Vec<Ty>),
    /// Fields sorted by name.
    Record(Vec<(String, Ty)>),
    List(Box<Ty>),
    Fn(Vec<Ty>, Box<Ty>),
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LenBase {
    Zero,
    Var(LenVar),
    Gen(u32),
    Rigid(RigidId),
}

/// A length of the form `base + offset`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Len {
    pub base: LenBase,
    pub offset: u64,
}

impl Len {
    pub fn lit(n: u64) -> Self {
        Len {
            base: LenBase::Zero,
            offset: n,
        }
    }

    pub fn of(base: LenBase) -> Self {
        Len { base, offset: 0 }
    }

    pub fn plus(self, k: u64) -> Self {
        Len {
            base: self.base,
            offset: self.offset.saturating_add(k),
        }
    }

    pub fn as_literal(self) -> Option<u64> {
        match self.base {
            LenBase::Zero => Some(self.offset),
            _ => None,
        }
    }
}

pub const PRELUDE: &str = "prelude";

impl Ty {
    pub fn bool() -> Ty {
        Ty::Con {
            name: QualName::new(PRELUDE, "Bool"),
            args: Vec::new(),
        }
    }

    pub fn record(mut fields: Vec<(String, Ty)>) -> Ty {
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        Ty::Record(fields)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Ty::Error)
    }

    /// Replace quantified variables: `Gen(i)` by `tys[i]`, length `Gen(j)`
    /// by `lens[j]` plus the local offset.
    pub fn instantiate(&self, tys: &[Ty], lens: &[Len]) -> Ty {
        match self {
            Ty::Gen(i) => tys.get(*i as usize).cloned().unwrap_or(Ty::Error),
            Ty::Var(_) | Ty::Rigid(_) | Ty::Prim(_) | Ty::Error => self.clone(),
            Ty::Con { name, args } => Ty::Con {
                name: name.clone(),
                args: args.iter().map(|a| a.instantiate(tys, lens)).collect(),
            },
            Ty::Family { name, elem, len } => Ty::Family {
                name: name.clone(),
                elem: Box::new(elem.instantiate(tys, lens)),
                len: instantiate_len(*len, lens),
            },
            Ty::Tuple(items) => Ty::Tuple(items.iter().map(|t| t.instantiate(tys, lens)).collect()),
            Ty::Record(fields) => Ty::Record(
                fields
                    .iter()
                    .map(|(n, t)| (n.clone(), t.instantiate(tys, lens)))
                    .collect(),
            ),
            Ty::List(elem) => Ty::List(Box::new(elem.instantiate(tys, lens))),
            Ty::Fn(params, ret) => Ty::Fn(
                params.iter().map(|t| t.instantiate(tys, lens)).collect(),
                Box::new(ret.instantiate(tys, lens)),
            ),
        }
    }

    /// Rebuild the type bottom-up, applying `ty` to every node and `len` to
    /// every length. `ty` returning `Some` replaces the node outright.
    pub(crate) fn map(
        &self,
        ty: &mut impl FnMut(&Ty) -> Option<Ty>,
        len: &mut impl FnMut(Len) -> Len,
    ) -> Ty {
        if let Some(t) = ty(self) {
            return t;
        }
        match self {
            Ty::Var(_) | Ty::Gen(_) | Ty::Rigid(_) | Ty::Prim(_) | Ty::Error => self.clone(),
            Ty::Con { name, args } => Ty::Con {
                name: name.clone(),
                args: args.iter().map(|a| a.map(ty, len)).collect(),
            },
            Ty::Family {
                name,
                elem,
                len: l,
            } => Ty::Family {
                name: name.clone(),
                elem: Box::new(elem.map(ty, len)),
                len: len(*l),
            },
            Ty::Tuple(items) => Ty::Tuple(items.iter().map(|t| t.map(ty, len)).collect()),
            Ty::Record(fields) => Ty::Record(
                fields
                    .iter()
                    .map(|(n, t)| (n.clone(), t.map(ty, len)))
                    .collect(),
            ),
            Ty::List(elem) => Ty::List(Box::new(elem.map(ty, len))),
            Ty::Fn(params, ret) => Ty::Fn(
                params.iter().map(|t| t.map(ty, len)).collect(),
                Box::new(ret.map(ty, len)),
            ),
        }
    }

    /// Visit every node in left-to-right order.
    pub(crate) fn walk(&self, f: &mut impl FnMut(&Ty)) {
        f(self);
        match self {
            Ty::Var(_) | Ty::Gen(_) | Ty::Rigid(_) | Ty::Prim(_) | Ty::Error => {}
            Ty::Con { args, .. } => args.iter().for_each(|a| a.walk(f)),
            Ty::Family { elem, .. } => elem.walk(f),
            Ty::Tuple(items) => items.iter().for_each(|t| t.walk(f)),
            Ty::Record(fields) => fields.iter().for_each(|(_, t)| t.walk(f)),
            Ty::List(elem) => elem.walk(f),
            Ty::Fn(params, ret) => {
                params.iter().for_each(|t| t.walk(f));
                ret.walk(f);
            }
        }
    }
}

fn instantiate_len(len: Len, lens: &[Len]) -> Len {
    match len.base {
        LenBase::Gen(j) => match lens.get(j as usize) {
            Some(l) => l.plus(len.offset),
            None => len,
        },
        _ => len,
    }
}

/// A possibly polymorphic type: `Gen` variables are quantified.
#[derive(Clone, Debug, PartialEq)]
pub struct Scheme {
    pub ty_names: Vec<String>,
    pub len_names: Vec<String>,
    /// `(Gen index, capability)` pairs the instantiation must satisfy.
    pub constraints: Vec<(u32, QualName)>,
    pub ty: Ty,
}

impl Scheme {
    pub fn mono(ty: Ty) -> Self {
        Scheme {
            ty_names: Vec::new(),
            len_names: Vec::new(),
            constraints: Vec::new(),
            ty,
        }
    }

    pub fn is_polymorphic(&self) -> bool {
        !self.ty_names.is_empty() || !self.len_names.is_empty()
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = TyNames {
            vars: &[],
            ty: &self.ty_names,
            len: &self.len_names,
            rigid: &[],
        };
        f.write_str(&render(&self.ty, &names))?;
        for (i, (var, cap)) in self.constraints.iter().enumerate() {
            let sep = if i == 0 { " where " } else { ", " };
            let var = self
                .ty_names
                .get(*var as usize)
                .map(String::as_str)
                .unwrap_or("_");
            write!(f, "{sep}{var} has {cap}")?;
        }
        Ok(())
    }
}

/// Name used for the `i`th generalized type variable: `A`..`Z`, then `A1`..
pub fn letter_name(i: usize) -> String {
    let letter = char::from(b'A' + (i % 26) as u8);
    match i / 26 {
        0 => letter.to_string(),
        n => format!("{letter}{n}"),
    }
}

pub(crate) struct TyNames<'a> {
    /// Labels for unsolved variables, by index; missing ones print as `_`.
    pub vars: &'a [&'static str],
    pub ty: &'a [String],
    pub len: &'a [String],
    pub rigid: &'a [String],
}

pub(crate) fn render(ty: &Ty, names: &TyNames<'_>) -> String {
    let mut out = String::new();
    write_ty(&mut out, ty, names, false);
    out
}

/// `atom` requests parentheses around anything that is not a single token
/// or bracketed form.
fn write_ty(out: &mut String, ty: &Ty, names: &TyNames<'_>, atom: bool) {
    match ty {
        Ty::Var(v) => out.push_str(names.vars.get(v.0 as usize).copied().unwrap_or("_")),
        Ty::Gen(i) => match names.ty.get(*i as usize) {
            Some(n) => out.push_str(n),
            None => out.push_str(&letter_name(*i as usize)),
        },
        Ty::Rigid(r) => match names.rigid.get(r.0 as usize) {
            Some(n) => out.push_str(n),
            None => out.push('_'),
        },
        Ty::Prim(p) => out.push_str(p.name()),
        Ty::Error => out.push_str("<error>"),
        Ty::Con { name, args } => {
            if args.is_empty() {
                out.push_str(&name.name);
                return;
            }
            if atom {
                out.push('(');
            }
            out.push_str(&name.name);
            for arg in args {
                out.push(' ');
                write_ty(out, arg, names, true);
            }
            if atom {
                out.push(')');
            }
        }
        Ty::Family { name, elem, len } => {
            if atom {
                out.push('(');
            }
            out.push_str(&name.name);
            out.push(' ');
            write_ty(out, elem, names, true);
            out.push_str(" {");
            write_len(out, *len, names);
            out.push('}');
            if atom {
                out.push(')');
            }
        }
        Ty::Tuple(items) => {
            out.push('{');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str("; ");
                }
                write_ty(out, item, names, false);
            }
            out.push('}');
        }
        Ty::Record(fields) => {
            out.push('{');
            for (i, (name, t)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(name);
                out.push(' ');
                write_ty(out, t, names, false);
            }
            out.push('}');
        }
        Ty::List(elem) => {
            out.push('[');
            write_ty(out, elem, names, false);
            out.push(']');
        }
        Ty::Fn(params, ret) => {
            if atom {
                out.push('(');
            }
            for param in params {
                if matches!(param, Ty::Fn(..)) {
                    out.push('(');
                    write_ty(out, param, names, false);
                    out.push(')');
                } else {
                    write_ty(out, param, names, false);
                }
                out.push_str(" -> ");
            }
            write_ty(out, ret, names, false);
            if atom {
                out.push(')');
            }
        }
    }
}

fn write_len(out: &mut String, len: Len, names: &TyNames<'_>) {
    let base = match len.base {
        LenBase::Zero => {
            out.push_str(&len.offset.to_string());
            return;
        }
        LenBase::Var(_) => "?".to_string(),
        LenBase::Gen(j) => names
            .len
            .get(j as usize)
            .cloned()
            .unwrap_or_else(|| format!("n{j}")),
        LenBase::Rigid(r) => names
            .rigid
            .get(r.0 as usize)
            .cloned()
            .unwrap_or_else(|| "?".to_string()),
    };
    if len.offset == 0 {
        out.push_str(&base);
    } else {
        out.push_str(&format!("({base} add {})", len.offset));
    }
}

/// A declared type, in template form: `Gen(i)` is the `i`th type parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeDef {
    pub name: QualName,
    pub public: bool,
    pub params: Vec<String>,
    pub kind: TypeDefKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeDefKind {
    Alias(Ty),
    Union(Vec<VariantDef>),
    Family(FamilyDef),
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariantDef {
    pub tag: String,
    pub payload: Option<Ty>,
}

/// `len : | 0 -> {..} | len -> {..}`: the zero arm and the successor arm.
/// In `succ`, length `Gen(0)` is the predecessor.
#[derive(Clone, Debug, PartialEq)]
pub struct FamilyDef {
    pub len_param: String,
    pub len_ty: Prim,
    pub zero: Vec<Ty>,
    pub succ: Vec<Ty>,
}

impl FamilyDef {
    pub fn zero_items(&self, elem: &Ty) -> Vec<Ty> {
        self.zero
            .iter()
            .map(|t| t.instantiate(std::slice::from_ref(elem), &[]))
            .collect()
    }

    pub fn succ_items(&self, elem: &Ty, pred: Len) -> Vec<Ty> {
        self.succ
            .iter()
            .map(|t| t.instantiate(std::slice::from_ref(elem), &[pred]))
            .collect()
    }
}

impl TypeDef {
    pub fn as_family(&self) -> Option<&FamilyDef> {
        match &self.kind {
            TypeDefKind::Family(f) => Some(f),
            _ => None,
        }
    }

    pub fn variants(&self) -> Option<&[VariantDef]> {
        match &self.kind {
            TypeDefKind::Union(v) => Some(v),
            _ => None,
        }
    }
}

/// The built-in `typ Bool = | True | False`.
pub fn prelude_bool() -> TypeDef {
    TypeDef {
        name: QualName::new(PRELUDE, "Bool"),
        public: true,
        params: Vec::new(),
        kind: TypeDefKind::Union(vec![
            VariantDef {
                tag: "False".to_string(),
                payload: None,
            },
            VariantDef {
                tag: "True".to_string(),
                payload: None,
            },
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec_family() -> FamilyDef {
        FamilyDef {
            len_param: "len".to_string(),
            len_ty: Prim::U32,
            zero: Vec::new(),
            succ: vec![
                Ty::Gen(0),
                Ty::Family {
                    name: QualName::new("m", "Vec"),
                    elem: Box::new(Ty::Gen(0)),
                    len: Len::of(LenBase::Gen(0)),
                },
            ],
        }
    }

    #[test]
    fn schemes_print_with_their_names() {
        let vec_of = |elem: u32| Ty::Family {
            name: QualName::new("m", "Vec"),
            elem: Box::new(Ty::Gen(elem)),
            len: Len::of(LenBase::Gen(0)),
        };
        let scheme = Scheme {
            ty_names: vec!["A".into(), "B".into()],
            len_names: vec!["len".into()],
            constraints: Vec::new(),
            ty: Ty::Fn(
                vec![vec_of(0), Ty::Fn(vec![Ty::Gen(0)], Box::new(Ty::Gen(1)))],
                Box::new(vec_of(1)),
            ),
        };
        assert_eq!(scheme.to_string(), "Vec A {len} -> (A -> B) -> Vec B {len}");
    }

    #[test]
    fn constraints_print_after_where() {
        let scheme = Scheme {
            ty_names: vec!["A".into()],
            len_names: Vec::new(),
            constraints: vec![(0, QualName::new("m", "Order"))],
            ty: Ty::Fn(vec![Ty::Gen(0), Ty::Gen(0)], Box::new(Ty::Gen(0))),
        };
        assert_eq!(scheme.to_string(), "A -> A -> A where A has Order");
    }

    #[test]
    fn successor_arm_substitutes_the_predecessor() {
        let family = vec_family();
        let items = family.succ_items(&Ty::Prim(Prim::I64), Len::lit(2));
        assert_eq!(items[0], Ty::Prim(Prim::I64));
        let Ty::Family { len, .. } = &items[1] else {
            panic!("expected a family");
        };
        assert_eq!(len.as_literal(), Some(2));
        assert!(family.zero_items(&Ty::Prim(Prim::I64)).is_empty());
    }

    #[test]
    fn nested_compound_types_are_parenthesized() {
        let ty = Ty::Con {
            name: QualName::new("m", "Option"),
            args: vec![Ty::Con {
                name: QualName::new("m", "Option"),
                args: vec![Ty::Prim(Prim::I64)],
            }],
        };
        let names = TyNames {
            vars: &[],
            ty: &[],
            len: &[],
            rigid: &[],
        };
        assert_eq!(render(&ty, &names), "Option (Option I64)");
        assert_eq!(letter_name(27), "B1");
    }
}
