use sable_core::{CheckOutcome, Checker, HeadKey, Imports, SemanticError};
use sable_parse::parse_source;

fn check(src: &str) -> CheckOutcome {
    let module = parse_source(src).expect("parse");
    Checker::default().check("main", module, &Imports::new())
}

fn kinds(outcome: &CheckOutcome) -> Vec<&'static str> {
    outcome.errors.iter().map(|e| e.kind()).collect()
}

const ORDER: &str = "\
has pub Order =
    greater => Self -> Self -> Bool
";

#[test]
fn missing_implementation_names_type_and_capability() {
    let outcome = check(&format!("{ORDER}bad = \"x\" greater \"y\"\n"));
    assert_eq!(kinds(&outcome), ["MissingCapability"]);
    match &outcome.errors[0] {
        SemanticError::MissingCapability { ty, capability, .. } => {
            assert_eq!(ty, "Str");
            assert_eq!(capability, "Order");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn aliases_are_named_as_written() {
    let src = format!(
        "{ORDER}typ Point = {{x I64, y I64}}\ndef bigger = Point -> Point -> Bool\nbigger = a b -> a greater b\n"
    );
    let outcome = check(&src);
    match outcome.errors.as_slice() {
        [SemanticError::MissingCapability { ty, .. }] => assert_eq!(ty, "Point"),
        other => panic!("unexpected errors {other:?}"),
    }
}

#[test]
fn registered_implementation_is_used() {
    let src = format!("{ORDER}trait Order Str = greater = a b -> a == b\nok = \"x\" greater \"y\"\n");
    let outcome = check(&src);
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    assert_eq!(outcome.typed.capability_uses.len(), 1);
    assert_eq!(
        outcome.typed.capability_uses[0].head,
        HeadKey::Prim(sable_ast::Prim::Str)
    );
}

#[test]
fn constraints_generalize_and_resolve_at_use() {
    let src = format!(
        "{ORDER}\
trait Order I64 = greater = a b -> a > b
max = a b -> (a greater b) : | True -> a | False -> b
top = 1 max 2
"
    );
    let outcome = check(&src);
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    assert_eq!(
        outcome.typed.scheme("max").map(ToString::to_string).as_deref(),
        Some("A -> A -> A where A has Order")
    );
    assert_eq!(
        outcome.typed.scheme("top").map(ToString::to_string).as_deref(),
        Some("I64")
    );
}

#[test]
fn signatures_grant_their_constraints() {
    let src = "\
has Show = show => Self -> Str
def describe = A -> Str where A has Show
describe = x -> x show
def label = A -> Str
label = x -> x show
";
    let outcome = check(src);
    match outcome.errors.as_slice() {
        [SemanticError::MissingCapability { ty, capability, .. }] => {
            assert_eq!(ty, "A");
            assert_eq!(capability, "Show");
        }
        other => panic!("unexpected errors {other:?}"),
    }
}

#[test]
fn duplicate_implementations_are_rejected() {
    let src = "\
has Show = show => Self -> Str
trait Show I64 = show = n -> \"n\"
trait Show I64 = show = n -> \"m\"
";
    let outcome = check(src);
    assert_eq!(kinds(&outcome), ["DuplicateDeclaration"]);
}

#[test]
fn implementation_members_are_checked_against_operations() {
    let src = "\
has Show = show => Self -> Str
trait Show I64 = show = n -> n + 1
";
    let outcome = check(src);
    assert_eq!(kinds(&outcome), ["TypeError"]);
}

#[test]
fn unknown_members_are_reported() {
    let src = "\
has Show = show => Self -> Str
trait Show I64 =
    show = n -> \"n\"
    print = n -> \"n\"
";
    let outcome = check(src);
    assert_eq!(kinds(&outcome), ["TypeError"]);
    assert!(outcome.errors[0].to_string().contains("`print`"));
}

#[test]
fn operations_must_take_self_first() {
    let outcome = check("has Make = make => I64 -> Self\n");
    assert_eq!(kinds(&outcome), ["TypeError"]);
}

#[test]
fn unresolved_constraint_is_ambiguous() {
    let src = "\
has Make = make => Self -> I64
trait Make I64 = make = n -> n
trait Make Str = make = s -> 0
test \"which\" (x -> x make) == (y -> y make)
";
    let outcome = check(src);
    assert!(
        outcome
            .errors
            .iter()
            .any(|e| e.kind() == "AmbiguousCapability"),
        "{:?}",
        outcome.errors
    );
}
