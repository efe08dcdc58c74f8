use sable_ast::ItemKind;
use sable_parse::{ParseConfig, parse_source_with_recovery};

#[test]
fn recovery_collects_multiple_errors() {
    let src = "\
a = 1 +
b = 2
typ = I64
c = 3
";
    let out = parse_source_with_recovery(src, &ParseConfig::default());
    assert_eq!(out.parse_errors.len(), 2, "{:?}", out.parse_errors);
    let names: Vec<_> = out
        .module
        .items
        .iter()
        .filter_map(|item| item.name().map(|n| n.node.clone()))
        .collect();
    assert_eq!(names, ["b", "c"]);
}

#[test]
fn recovery_skips_the_rest_of_an_indented_body() {
    let src = "\
has Order =
    greater => Self ->
    equal => Self -> Self -> Bool
x = 1
";
    let out = parse_source_with_recovery(src, &ParseConfig::default());
    assert_eq!(out.parse_errors.len(), 1, "{:?}", out.parse_errors);
    assert_eq!(out.module.items.len(), 1);
    assert!(matches!(out.module.items[0].kind, ItemKind::Value(_)));
}

#[test]
fn lex_errors_drop_only_their_line() {
    let src = "a = \"unterminated\nb = 2\n";
    let out = parse_source_with_recovery(src, &ParseConfig::default());
    assert_eq!(out.lex_errors.len(), 1);
    assert!(out.parse_errors.is_empty());
    assert_eq!(out.module.items.len(), 1);
    assert!(out.has_errors());
}

#[test]
fn error_spans_point_at_the_offending_token() {
    let src = "a = 1\nb = )\n";
    let out = parse_source_with_recovery(src, &ParseConfig::default());
    assert_eq!(out.parse_errors.len(), 1);
    let err = &out.parse_errors[0];
    assert_eq!(err.span.offset(), 10);
    assert_eq!(err.found, "`)`");
}

#[test]
fn an_overlong_chain_does_not_poison_later_declarations() {
    let terms = vec!["1"; 10_000].join(" + ");
    let src = format!("a = {terms}\nb = (((1)))\nc = 1 + 2 + 3\n");
    let out = parse_source_with_recovery(&src, &ParseConfig::default());
    assert_eq!(out.parse_errors.len(), 1, "{:?}", out.parse_errors);
    assert_eq!(out.module.items.len(), 2);
}
