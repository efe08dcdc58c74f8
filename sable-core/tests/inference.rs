use proptest::prelude::*;
use sable_core::{CancelToken, CheckConfig, CheckOutcome, Checker, Imports};
use sable_parse::parse_source;

fn check(src: &str) -> CheckOutcome {
    check_with(src, CheckConfig::default())
}

fn check_with(src: &str, config: CheckConfig) -> CheckOutcome {
    let module = parse_source(src).expect("parse");
    Checker::new(config).check("main", module, &Imports::new())
}

fn kinds(outcome: &CheckOutcome) -> Vec<&'static str> {
    outcome.errors.iter().map(|e| e.kind()).collect()
}

fn scheme(outcome: &CheckOutcome, name: &str) -> String {
    outcome
        .typed
        .scheme(name)
        .unwrap_or_else(|| panic!("no scheme for `{name}`"))
        .to_string()
}

const VEC: &str = "typ pub Vec T {len U32} = len : | 0 -> {} | len -> {T; Vec T {len (len sub 1)}}\n";

#[test]
fn map_over_a_length_indexed_vector() {
    let src = format!(
        "{VEC}map = items mapper -> items : | {{first; rest}} -> {{first mapper; rest map mapper}} | {{}} -> {{}}\n"
    );
    let outcome = check(&src);
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    assert_eq!(
        scheme(&outcome, "map"),
        "Vec A {len} -> (A -> B) -> Vec B {len}"
    );
}

#[test]
fn literals_default_to_configured_types() {
    let outcome = check("count = 1\nratio = 1.5\nsum = 1 + 2\n");
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    assert_eq!(scheme(&outcome, "count"), "I64");
    assert_eq!(scheme(&outcome, "ratio"), "F64");
    assert_eq!(scheme(&outcome, "sum"), "I64");

    let config = CheckConfig {
        default_int: sable_ast::Prim::I32,
        ..CheckConfig::default()
    };
    let outcome = check_with("count = 1\n", config);
    assert_eq!(scheme(&outcome, "count"), "I32");
}

#[test]
fn literals_take_the_type_of_their_use() {
    let outcome = check("def small = U8\nsmall = 7\nbigger = small + 1\n");
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    assert_eq!(scheme(&outcome, "bigger"), "U8");
}

#[test]
fn out_of_range_literal_is_a_type_error() {
    let outcome = check("def small = U8\nsmall = 300\n");
    assert_eq!(kinds(&outcome), ["TypeError"]);
    assert!(
        outcome.errors[0].to_string().contains("`300` does not fit in U8"),
        "{}",
        outcome.errors[0]
    );
}

#[test]
fn top_level_values_are_polymorphic() {
    let outcome = check("id = x -> x\npair = {1 id; \"s\" id}\n");
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    assert_eq!(scheme(&outcome, "id"), "A -> A");
    assert_eq!(scheme(&outcome, "pair"), "{I64; Str}");
}

#[test]
fn values_may_be_used_before_their_declaration() {
    let outcome = check("twice = x -> x double\ndouble = x -> x + x\n");
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    assert_eq!(scheme(&outcome, "double"), "I64 -> I64");
    assert_eq!(scheme(&outcome, "twice"), "I64 -> I64");
}

#[test]
fn mismatch_names_both_types() {
    let outcome = check("def n = I64\nn = \"text\"\n");
    assert_eq!(kinds(&outcome), ["TypeError"]);
    assert!(
        outcome.errors[0]
            .to_string()
            .contains("expected I64, found Str"),
        "{}",
        outcome.errors[0]
    );
}

#[test]
fn unsolved_literals_are_named_in_mismatches() {
    let outcome = check("def r = {I64; Str}\nr = {\"s\"; 1}\n");
    let messages: Vec<String> = outcome.errors.iter().map(ToString::to_string).collect();
    assert!(
        messages.iter().any(|m| m.contains("expected Str, found {number}")),
        "{messages:?}"
    );
    assert!(messages.iter().all(|m| !m.contains("found _")), "{messages:?}");

    let outcome = check("def s = Str\ns = 1.5\n");
    let messages: Vec<String> = outcome.errors.iter().map(ToString::to_string).collect();
    assert!(messages.iter().any(|m| m.contains("found {float}")), "{messages:?}");
}

#[test]
fn arithmetic_needs_numbers() {
    let outcome = check("bad = \"a\" + \"b\"\n");
    assert_eq!(kinds(&outcome), ["TypeError"]);
    assert!(outcome.errors[0].to_string().contains("numeric operands"));
}

#[test]
fn records_and_fields() {
    let src = "\
typ Point = {x I64, y I64}
def origin = Point
origin = {y 0, x 0}
def getx = Point -> I64
getx = p -> p.x
";
    let outcome = check(src);
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
}

#[test]
fn unions_with_parameters() {
    let src = "\
typ Option T = | Some T | None
wrap = x -> Some x
nothing = None
";
    let outcome = check(src);
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    assert_eq!(scheme(&outcome, "wrap"), "A -> Option A");
    assert_eq!(scheme(&outcome, "nothing"), "Option A");
}

#[test]
fn fixed_length_vector_literals() {
    let ok = check(&format!("{VEC}def pair = Vec I64 {{2}}\npair = {{1; {{2; {{}}}}}}\n"));
    assert!(ok.errors.is_empty(), "{:?}", ok.errors);

    let short = check(&format!("{VEC}def pair = Vec I64 {{2}}\npair = {{1; {{}}}}\n"));
    assert_eq!(kinds(&short), ["TypeError"]);
}

#[test]
fn signatures_check_recursive_functions() {
    let src = format!(
        "{VEC}\
def total = Vec I64 {{n}} -> I64
total = items -> items :
    | {{}} -> 0
    | {{first; rest}} -> first + (rest total)
"
    );
    let outcome = check(&src);
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    assert_eq!(scheme(&outcome, "total"), "Vec I64 {n} -> I64");
}

#[test]
fn subtraction_that_may_go_negative_is_unsupported() {
    let src = format!("{VEC}def shrink = Vec I64 {{n}} -> Vec I64 {{n sub 1}}\nshrink = v -> v\n");
    let outcome = check(&src);
    assert_eq!(kinds(&outcome), ["UnsupportedLengthExpr"]);
}

#[test]
fn family_arms_must_differ_in_size() {
    let outcome = check("typ Bad T {len U32} = len : | 0 -> {T} | len -> {T}\n");
    assert_eq!(kinds(&outcome), ["TypeError"]);
}

#[test]
fn unresolved_names_are_reported_once() {
    let outcome = check("f = x -> y\n");
    assert_eq!(kinds(&outcome), ["UnresolvedName"]);
}

#[test]
fn pub_without_signature_is_a_single_visibility_error() {
    let outcome = check("let pub answer = 42\n");
    assert_eq!(kinds(&outcome), ["Visibility"]);
}

#[test]
fn deep_nesting_hits_the_recursion_limit() {
    let config = CheckConfig {
        recursion_limit: 8,
        ..CheckConfig::default()
    };
    let outcome = check_with("deep = [[[[[[[[[[[[1]]]]]]]]]]]]\nafter = 1\n", config);
    assert_eq!(kinds(&outcome), ["RecursionLimitExceeded"]);
}

#[test]
fn blocks_and_asserts() {
    let src = "\
main = x -> (
    let y = x + 1
    z <- y
    assert z > 0
    z)
";
    let outcome = check(src);
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    assert_eq!(scheme(&outcome, "main"), "I64 -> I64");
}

#[test]
fn test_blocks_are_checked() {
    let outcome = check("test \"sum\" (1 + 2) == 3\ntest \"bad\" 1 + \"x\"\n");
    assert_eq!(kinds(&outcome), ["TypeError"]);
}

#[test]
fn cancelled_checks_publish_nothing() {
    let module = parse_source("a = 1\n").expect("parse");
    let token = CancelToken::new();
    token.cancel();
    let result = Checker::default().check_cancellable("main", module, &Imports::new(), &token);
    assert!(result.is_err());
}

proptest! {
    #[test]
    fn u8_literals_fit_up_to_255(n in 0u64..1000) {
        let outcome = check(&format!("def small = U8\nsmall = {n}\n"));
        prop_assert_eq!(outcome.has_errors(), n > 255);
    }
}
