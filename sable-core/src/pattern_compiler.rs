#![forbid(unsafe_code)]

//! Match analysis over normalized patterns.
//!
//! Arms are lowered to rows of a pattern matrix and analysed with the
//! usefulness algorithm: a match is exhaustive when a wildcard row is not
//! useful after all arms, and an arm is unreachable when it is not useful
//! after the arms above it. The same matrix is compiled into a decision
//! tree for later stages.

use sable_ast::BindingId;
use tracing::trace;

use crate::types::Ty;

/// A constructor, with enough information to know its arity.
#[derive(Clone, Debug, PartialEq)]
pub enum Ctor {
    Tuple(usize),
    /// Field names in sorted order.
    Record(Vec<String>),
    Tag {
        index: usize,
        name: String,
        arity: usize,
    },
    /// Zero arm of a length-indexed family, with its tuple arity.
    Zero(usize),
    /// Successor arm of a length-indexed family, with its tuple arity.
    Succ(usize),
    Nil,
    Cons,
    /// A literal, keyed by its source text.
    Lit(String),
}

impl Ctor {
    pub fn arity(&self) -> usize {
        match self {
            Ctor::Tuple(n) | Ctor::Zero(n) | Ctor::Succ(n) => *n,
            Ctor::Record(names) => names.len(),
            Ctor::Tag { arity, .. } => *arity,
            Ctor::Nil | Ctor::Lit(_) => 0,
            Ctor::Cons => 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Pat {
    Wild,
    Bind(BindingId),
    Ctor {
        ctor: Ctor,
        args: Vec<Pat>,
        /// `..rest`: binds the sub-tuple starting at the given position.
        rest: Option<(usize, BindingId)>,
    },
}

impl Pat {
    pub fn ctor(ctor: Ctor, args: Vec<Pat>) -> Pat {
        Pat::Ctor {
            ctor,
            args,
            rest: None,
        }
    }

    fn head(&self) -> Option<&Ctor> {
        match self {
            Pat::Ctor { ctor, .. } => Some(ctor),
            _ => None,
        }
    }
}

/// Supplies constructor sets and field types while analysing a match.
pub trait ShapeOracle {
    /// Every constructor of `ty`, or `None` when the set is open.
    fn constructors(&mut self, ty: &Ty) -> Option<Vec<Ctor>>;

    /// Types of the sub-values a constructor carries.
    fn field_types(&mut self, ty: &Ty, ctor: &Ctor) -> Vec<Ty>;
}

/// Path from the scrutinee to a sub-value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Occurrence(pub Vec<Step>);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Step {
    Field(usize),
    /// The sub-tuple from this position on.
    Tail(usize),
}

impl Occurrence {
    fn child(&self, step: Step) -> Occurrence {
        let mut path = self.0.clone();
        path.push(step);
        Occurrence(path)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Decision {
    Leaf {
        arm: usize,
        bindings: Vec<(BindingId, Occurrence)>,
    },
    Switch {
        occurrence: Occurrence,
        cases: Vec<(Ctor, Decision)>,
        default: Option<Box<Decision>>,
    },
    Fail,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompiledMatch {
    pub decision: Decision,
    /// Witnesses of values no arm matches.
    pub missing: Vec<String>,
    /// Arms no value can reach.
    pub unreachable: Vec<usize>,
}

pub fn compile_match(
    scrutinee: &Ty,
    arms: &[Pat],
    oracle: &mut dyn ShapeOracle,
) -> CompiledMatch {
    let tys = vec![scrutinee.clone()];
    let mut unreachable = Vec::new();
    let mut matrix = PatternMatrix::default();
    for (i, pat) in arms.iter().enumerate() {
        if !matrix.useful(std::slice::from_ref(pat), &tys, oracle) {
            unreachable.push(i);
        }
        matrix.rows.push(vec![pat.clone()]);
    }
    let missing: Vec<String> = matrix
        .missing(&tys, oracle)
        .into_iter()
        .filter_map(|mut w| w.pop())
        .map(|w| w.to_string())
        .collect();

    let rows = arms
        .iter()
        .enumerate()
        .map(|(arm, pat)| Row {
            cells: vec![(Occurrence::default(), pat.clone())],
            arm,
            bindings: Vec::new(),
        })
        .collect();
    let decision = compile_rows(rows, scrutinee, oracle);
    trace!(
        target: "sable::match",
        arms = arms.len(),
        missing = ?missing,
        unreachable = ?unreachable,
        "match compiled"
    );
    CompiledMatch {
        decision,
        missing,
        unreachable,
    }
}

/// Rows are match arms, columns are scrutinee positions.
#[derive(Debug, Default)]
struct PatternMatrix {
    rows: Vec<Vec<Pat>>,
}

fn wilds(n: usize) -> Vec<Pat> {
    vec![Pat::Wild; n]
}

/// Rows whose head is `ctor` (or a wildcard), with the head replaced by
/// its sub-patterns.
fn specialize(rows: &[Vec<Pat>], ctor: &Ctor) -> Vec<Vec<Pat>> {
    let arity = ctor.arity();
    rows.iter()
        .filter_map(|row| {
            let (head, tail) = row.split_first()?;
            let mut out = match head {
                Pat::Ctor { ctor: c, args, .. } if c == ctor => args.clone(),
                Pat::Ctor { .. } => return None,
                Pat::Wild | Pat::Bind(_) => wilds(arity),
            };
            out.extend_from_slice(tail);
            Some(out)
        })
        .collect()
}

/// Rows whose head matches anything, with the head removed.
fn default_rows(rows: &[Vec<Pat>]) -> Vec<Vec<Pat>> {
    rows.iter()
        .filter_map(|row| {
            let (head, tail) = row.split_first()?;
            head.head().is_none().then(|| tail.to_vec())
        })
        .collect()
}

fn head_ctors(rows: &[Vec<Pat>]) -> Vec<Ctor> {
    let mut seen: Vec<Ctor> = Vec::new();
    for row in rows {
        if let Some(c) = row.first().and_then(Pat::head)
            && !seen.contains(c)
        {
            seen.push(c.clone());
        }
    }
    seen
}

/// The full constructor set when the heads cover all of it.
fn complete_signature(ty: &Ty, heads: &[Ctor], oracle: &mut dyn ShapeOracle) -> Option<Vec<Ctor>> {
    if heads.is_empty() {
        return None;
    }
    let all = oracle.constructors(ty)?;
    all.iter().all(|c| heads.contains(c)).then_some(all)
}

impl PatternMatrix {
    fn useful(&self, v: &[Pat], tys: &[Ty], oracle: &mut dyn ShapeOracle) -> bool {
        useful(&self.rows, v, tys, oracle)
    }

    fn missing(&self, tys: &[Ty], oracle: &mut dyn ShapeOracle) -> Vec<Vec<Witness>> {
        missing(&self.rows, tys, oracle)
    }
}

fn useful(rows: &[Vec<Pat>], v: &[Pat], tys: &[Ty], oracle: &mut dyn ShapeOracle) -> bool {
    let Some((head, tail)) = v.split_first() else {
        return rows.is_empty();
    };
    let ty = &tys[0];
    match head {
        Pat::Ctor { ctor, args, .. } => {
            let mut sub_tys = oracle.field_types(ty, ctor);
            sub_tys.resize(ctor.arity(), Ty::Error);
            sub_tys.extend_from_slice(&tys[1..]);
            let mut sub_v = args.clone();
            sub_v.extend_from_slice(tail);
            useful(&specialize(rows, ctor), &sub_v, &sub_tys, oracle)
        }
        Pat::Wild | Pat::Bind(_) => {
            let heads = head_ctors(rows);
            match complete_signature(ty, &heads, oracle) {
                Some(all) => all.iter().any(|ctor| {
                    let mut sub_tys = oracle.field_types(ty, ctor);
                    sub_tys.resize(ctor.arity(), Ty::Error);
                    sub_tys.extend_from_slice(&tys[1..]);
                    let mut sub_v = wilds(ctor.arity());
                    sub_v.extend_from_slice(tail);
                    useful(&specialize(rows, ctor), &sub_v, &sub_tys, oracle)
                }),
                None => useful(&default_rows(rows), tail, &tys[1..], oracle),
            }
        }
    }
}

/// A value shape no row matches, printed like a pattern.
#[derive(Clone, Debug, PartialEq)]
enum Witness {
    Wild,
    Ctor(Ctor, Vec<Witness>),
}

/// Witness vectors (one per uncovered shape) for the given columns.
fn missing(rows: &[Vec<Pat>], tys: &[Ty], oracle: &mut dyn ShapeOracle) -> Vec<Vec<Witness>> {
    let Some(ty) = tys.first() else {
        return if rows.is_empty() {
            vec![Vec::new()]
        } else {
            Vec::new()
        };
    };
    let heads = head_ctors(rows);
    if let Some(all) = complete_signature(ty, &heads, oracle) {
        let mut out = Vec::new();
        for ctor in all {
            let arity = ctor.arity();
            let mut sub_tys = oracle.field_types(ty, &ctor);
            sub_tys.resize(arity, Ty::Error);
            sub_tys.extend_from_slice(&tys[1..]);
            for mut w in missing(&specialize(rows, &ctor), &sub_tys, oracle) {
                let rest = w.split_off(arity);
                let mut rebuilt = vec![Witness::Ctor(ctor.clone(), w)];
                rebuilt.extend(rest);
                out.push(rebuilt);
            }
        }
        return out;
    }
    let below = missing(&default_rows(rows), &tys[1..], oracle);
    if below.is_empty() {
        return below;
    }
    let absent: Vec<Ctor> = if heads.is_empty() {
        Vec::new()
    } else {
        oracle
            .constructors(ty)
            .map(|all| all.into_iter().filter(|c| !heads.contains(c)).collect())
            .unwrap_or_default()
    };
    let mut out = Vec::new();
    for w in below {
        if absent.is_empty() {
            let mut row = vec![Witness::Wild];
            row.extend(w);
            out.push(row);
        } else {
            for ctor in &absent {
                let mut row = vec![Witness::Ctor(ctor.clone(), vec![Witness::Wild; ctor.arity()])];
                row.extend(w.iter().cloned());
                out.push(row);
            }
        }
    }
    out
}

impl Witness {
    fn is_atomic(&self) -> bool {
        match self {
            Witness::Wild => true,
            Witness::Ctor(Ctor::Tag { arity, .. }, _) => *arity == 0,
            Witness::Ctor(_, _) => true,
        }
    }
}

impl std::fmt::Display for Witness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Witness::Ctor(ctor, args) = self else {
            return f.write_str("_");
        };
        let list = |f: &mut std::fmt::Formatter<'_>, sep: &str| -> std::fmt::Result {
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    f.write_str(sep)?;
                }
                write!(f, "{a}")?;
            }
            Ok(())
        };
        match ctor {
            Ctor::Tuple(_) | Ctor::Zero(_) | Ctor::Succ(_) => {
                f.write_str("{")?;
                list(f, "; ")?;
                f.write_str("}")
            }
            Ctor::Record(names) => {
                f.write_str("{")?;
                for (i, (name, a)) in names.iter().zip(args).enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name} {a}")?;
                }
                f.write_str("}")
            }
            Ctor::Tag { name, .. } => {
                f.write_str(name)?;
                for a in args {
                    if a.is_atomic() {
                        write!(f, " {a}")?;
                    } else {
                        write!(f, " ({a})")?;
                    }
                }
                Ok(())
            }
            Ctor::Nil => f.write_str("[]"),
            Ctor::Cons => {
                let head = args.first().cloned().unwrap_or(Witness::Wild);
                write!(f, "[{head}, ..")?;
                match args.get(1) {
                    Some(Witness::Wild) | None => f.write_str("_]"),
                    Some(tail) => write!(f, "{tail}]"),
                }
            }
            Ctor::Lit(text) => f.write_str(text),
        }
    }
}

/// Print a pattern the way it would be written. Nested binders print as
/// `_`; a top-level binder prints through `name`.
pub fn describe(pat: &Pat, name: &dyn Fn(BindingId) -> String) -> String {
    match pat {
        Pat::Bind(id) => name(*id),
        _ => to_witness(pat).to_string(),
    }
}

fn to_witness(pat: &Pat) -> Witness {
    match pat {
        Pat::Wild | Pat::Bind(_) => Witness::Wild,
        Pat::Ctor { ctor, args, .. } => Witness::Ctor(ctor.clone(), args.iter().map(to_witness).collect()),
    }
}

struct Row {
    cells: Vec<(Occurrence, Pat)>,
    arm: usize,
    bindings: Vec<(BindingId, Occurrence)>,
}

fn compile_rows(mut rows: Vec<Row>, scrutinee: &Ty, oracle: &mut dyn ShapeOracle) -> Decision {
    let Some(first) = rows.first() else {
        return Decision::Fail;
    };
    let Some(col) = first.cells.iter().position(|(_, p)| p.head().is_some()) else {
        let first = rows.swap_remove(0);
        let mut bindings = first.bindings;
        for (occ, pat) in first.cells {
            if let Pat::Bind(id) = pat {
                bindings.push((id, occ));
            }
        }
        return Decision::Leaf {
            arm: first.arm,
            bindings,
        };
    };
    let occurrence = first.cells[col].0.clone();

    let mut ctors: Vec<Ctor> = Vec::new();
    for row in &rows {
        if let Some(c) = row.cells[col].1.head()
            && !ctors.contains(c)
        {
            ctors.push(c.clone());
        }
    }

    let mut cases = Vec::new();
    for ctor in &ctors {
        let arity = ctor.arity();
        let specialized: Vec<Row> = rows
            .iter()
            .filter_map(|row| {
                let (occ, pat) = &row.cells[col];
                let mut bindings = row.bindings.clone();
                let subs: Vec<Pat> = match pat {
                    Pat::Ctor { ctor: c, args, rest } if c == ctor => {
                        if let Some((from, id)) = rest {
                            bindings.push((*id, occ.child(Step::Tail(*from))));
                        }
                        args.clone()
                    }
                    Pat::Ctor { .. } => return None,
                    Pat::Bind(id) => {
                        bindings.push((*id, occ.clone()));
                        wilds(arity)
                    }
                    Pat::Wild => wilds(arity),
                };
                let mut cells: Vec<(Occurrence, Pat)> = Vec::with_capacity(row.cells.len() + arity);
                cells.extend(row.cells[..col].iter().cloned());
                cells.extend(
                    subs.into_iter()
                        .enumerate()
                        .map(|(i, p)| (occ.child(Step::Field(i)), p)),
                );
                cells.extend(row.cells[col + 1..].iter().cloned());
                Some(Row {
                    cells,
                    arm: row.arm,
                    bindings,
                })
            })
            .collect();
        cases.push((ctor.clone(), compile_rows(specialized, scrutinee, oracle)));
    }

    // Sub-column types are not tracked here; only the scrutinee itself
    // can prove a switch complete.
    let complete = occurrence.0.is_empty()
        && oracle
            .constructors(scrutinee)
            .is_some_and(|all| all.iter().all(|c| ctors.contains(c)));
    let default = if complete {
        None
    } else {
        let fallback: Vec<Row> = rows
            .into_iter()
            .filter_map(|mut row| {
                let (occ, pat) = row.cells.remove(col);
                match pat {
                    Pat::Ctor { .. } => None,
                    Pat::Bind(id) => {
                        row.bindings.push((id, occ));
                        Some(row)
                    }
                    Pat::Wild => Some(row),
                }
            })
            .collect();
        Some(Box::new(compile_rows(fallback, scrutinee, oracle)))
    };
    Decision::Switch {
        occurrence,
        cases,
        default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Oracle over a single three-tag union with no payloads and tuples.
    struct Colors;

    fn tag(index: usize) -> Ctor {
        let name = ["Red", "Green", "Blue"][index].to_string();
        Ctor::Tag {
            index,
            name,
            arity: 0,
        }
    }

    impl ShapeOracle for Colors {
        fn constructors(&mut self, ty: &Ty) -> Option<Vec<Ctor>> {
            match ty {
                Ty::Tuple(items) => Some(vec![Ctor::Tuple(items.len())]),
                Ty::Con { .. } => Some((0..3).map(tag).collect()),
                _ => None,
            }
        }

        fn field_types(&mut self, ty: &Ty, _ctor: &Ctor) -> Vec<Ty> {
            match ty {
                Ty::Tuple(items) => items.clone(),
                _ => Vec::new(),
            }
        }
    }

    fn color() -> Ty {
        Ty::Con {
            name: sable_ast::QualName::new("m", "Color"),
            args: Vec::new(),
        }
    }

    #[test]
    fn missing_tags_are_reported_by_name() {
        let arms = [Pat::ctor(tag(0), Vec::new()), Pat::ctor(tag(2), Vec::new())];
        let compiled = compile_match(&color(), &arms, &mut Colors);
        assert_eq!(compiled.missing, ["Green"]);
        assert!(compiled.unreachable.is_empty());
    }

    #[test]
    fn arms_after_a_wildcard_are_unreachable() {
        let arms = [Pat::Wild, Pat::ctor(tag(1), Vec::new())];
        let compiled = compile_match(&color(), &arms, &mut Colors);
        assert!(compiled.missing.is_empty());
        assert_eq!(compiled.unreachable, [1]);
    }

    #[test]
    fn tuple_columns_are_checked_pairwise() {
        let pair = Ty::Tuple(vec![color(), color()]);
        let arms = [
            Pat::ctor(Ctor::Tuple(2), vec![Pat::ctor(tag(0), Vec::new()), Pat::Wild]),
            Pat::ctor(Ctor::Tuple(2), vec![Pat::Wild, Pat::ctor(tag(1), Vec::new())]),
        ];
        let compiled = compile_match(&pair, &arms, &mut Colors);
        assert_eq!(
            compiled.missing,
            ["{Green; Red}", "{Blue; Red}", "{Green; Blue}", "{Blue; Blue}"]
        );
    }

    #[test]
    fn decision_tree_binds_variables_at_their_occurrence() {
        let arms = [Pat::ctor(tag(0), Vec::new()), Pat::Bind(BindingId(7))];
        let compiled = compile_match(&color(), &arms, &mut Colors);
        let Decision::Switch { cases, default, .. } = compiled.decision else {
            panic!("expected a switch");
        };
        assert_eq!(cases.len(), 1);
        let Some(default) = default else {
            panic!("expected a default branch");
        };
        assert_eq!(
            *default,
            Decision::Leaf {
                arm: 1,
                bindings: vec![(BindingId(7), Occurrence::default())],
            }
        );
    }
}
