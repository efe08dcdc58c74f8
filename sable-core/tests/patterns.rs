use sable_core::pattern_compiler::Decision;
use sable_core::{CheckOutcome, Checker, Imports, SemanticError};
use sable_parse::parse_source;

fn check(src: &str) -> CheckOutcome {
    let module = parse_source(src).expect("parse");
    Checker::default().check("main", module, &Imports::new())
}

fn missing(outcome: &CheckOutcome) -> Vec<String> {
    outcome
        .errors
        .iter()
        .filter_map(|e| match e {
            SemanticError::Exhaustiveness { missing, .. } => Some(missing.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

const LETTER: &str = "typ Letter = | A | B | C\n";
const VEC: &str = "typ Vec T {len U32} = len : | 0 -> {} | len -> {T; Vec T {len (len sub 1)}}\n";

#[test]
fn missing_tag_is_named() {
    let outcome = check(&format!("{LETTER}rank = l -> l : | A -> 1 | C -> 3\n"));
    assert_eq!(missing(&outcome), ["B"]);
    assert_eq!(outcome.errors.len(), 1);
}

#[test]
fn all_tags_covered() {
    let outcome = check(&format!("{LETTER}rank = l -> l : | A -> 1 | B -> 2 | C -> 3\n"));
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    assert_eq!(outcome.typed.decisions.len(), 1);
}

#[test]
fn both_vector_shapes_are_exhaustive() {
    let src = format!(
        "{VEC}def size = Vec I64 {{n}} -> I64\nsize = v -> v : | {{}} -> 0 | {{x; rest}} -> 1 + (rest size)\n"
    );
    let outcome = check(&src);
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
}

#[test]
fn empty_arm_alone_misses_the_successor() {
    let src = format!("{VEC}def size = Vec I64 {{n}} -> I64\nsize = v -> v : | {{}} -> 0\n");
    let outcome = check(&src);
    assert_eq!(missing(&outcome), ["{_; _}"]);
}

#[test]
fn known_lengths_need_only_their_shape() {
    let src = format!("{VEC}def head = Vec I64 {{3}} -> I64\nhead = v -> v : | {{x; rest}} -> x\n");
    let outcome = check(&src);
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
}

#[test]
fn impossible_shapes_are_type_errors() {
    let src = format!("{VEC}def head = Vec I64 {{3}} -> I64\nhead = v -> v : | {{}} -> 0 | {{x; rest}} -> x\n");
    let outcome = check(&src);
    assert_eq!(
        outcome.errors.iter().map(|e| e.kind()).collect::<Vec<_>>(),
        ["TypeError"]
    );
}

#[test]
fn unreachable_arm_is_a_warning() {
    let outcome = check(&format!("{LETTER}rank = l -> l : | _ -> 0 | A -> 1\n"));
    assert!(!outcome.has_errors());
    match outcome.errors.as_slice() {
        [SemanticError::UnreachablePattern { pattern, .. }] => assert_eq!(pattern, "A"),
        other => panic!("unexpected diagnostics {other:?}"),
    }
}

#[test]
fn integer_matches_need_a_fallback() {
    let outcome = check("name = n -> n : | 0 -> \"zero\" | 1 -> \"one\"\n");
    assert_eq!(missing(&outcome), ["_"]);

    let outcome = check("name = n -> n : | 0 -> \"zero\" | _ -> \"many\"\n");
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
}

#[test]
fn bools_are_a_two_tag_union() {
    let outcome = check("flip = b -> b : | True -> False\n");
    assert_eq!(missing(&outcome), ["False"]);
}

#[test]
fn lists_match_empty_and_cons() {
    let outcome = check("first = xs -> xs : | [] -> 0 | [x, ..rest] -> x\n");
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);

    let outcome = check("first = xs -> xs : | [x, ..rest] -> x\n");
    assert_eq!(missing(&outcome), ["[]"]);
}

#[test]
fn records_destructure_by_name() {
    let src = "\
typ Point = {x I64, y I64}
def sum = Point -> I64
sum = p -> p : | {y, x} -> x + y
";
    let outcome = check(src);
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
}

#[test]
fn tag_payloads_bind_their_types() {
    let src = "\
typ Shape = | Circle F64 | Square F64
def area = Shape -> F64
area = s -> s : | Circle r -> r * r * 3.14 | Square w -> w * w
";
    let outcome = check(src);
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
}

#[test]
fn pattern_errors_skip_exhaustiveness() {
    let outcome = check(&format!("{LETTER}bad = l -> l : | A 1 -> 0\n"));
    assert_eq!(
        outcome.errors.iter().map(|e| e.kind()).collect::<Vec<_>>(),
        ["TypeError"]
    );
}

#[test]
fn decision_tree_switches_on_tags() {
    let outcome = check(&format!("{LETTER}rank = l -> l : | A -> 1 | _ -> 0\n"));
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    let decision = outcome.typed.decisions.values().next().expect("decision");
    let Decision::Switch { cases, default, .. } = decision else {
        panic!("expected a switch, got {decision:?}");
    };
    assert_eq!(cases.len(), 1);
    assert!(default.is_some());
}
