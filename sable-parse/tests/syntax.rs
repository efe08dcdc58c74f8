use sable_ast::{
    BlockItemKind, ExprKind, ItemKind, PatternKind, TypeBody, TypeExprKind, TypeParam,
};
use sable_parse::parse_source;

#[test]
fn chained_comparisons_are_rejected() {
    let src = "a = x < y < z\n";
    let err = parse_source(src).expect_err("expected parse error");
    let msg = err.to_string();
    assert!(
        msg.contains("chained comparisons"),
        "unexpected error message: {msg}"
    );
}

#[test]
fn declarations_of_every_kind_parse() {
    let src = r#"
import Geo "geometry"

doc "Ordering of values."
has pub Order =
    greater => Self -> Self -> Bool
    equal => Self -> Self -> Bool

trait Order I64 =
    greater = a b -> a > b
    equal = a b -> a == b

typ pub Shape = | Circle F64 | Rect {w F64, h F64}

def pub area = Shape -> F64
let pub area = s -> s :
    | Circle r -> r * r * 3.14
    | Rect {w, h} -> w * h

test "area of unit square" (Rect {w 1.0, h 1.0}) area == 1.0
"#;
    let module = parse_source(src).expect("parse");
    let kinds: Vec<&str> = module
        .items
        .iter()
        .map(|item| match &item.kind {
            ItemKind::Import(_) => "import",
            ItemKind::Type(_) => "typ",
            ItemKind::Signature(_) => "def",
            ItemKind::Value(_) => "let",
            ItemKind::Capability(_) => "has",
            ItemKind::Implementation(_) => "trait",
            ItemKind::Test(_) => "test",
        })
        .collect();
    assert_eq!(kinds, ["import", "has", "trait", "typ", "def", "let", "test"]);

    assert_eq!(module.items[1].docs.len(), 1);
    assert_eq!(module.items[1].docs[0].node, "Ordering of values.");
    let ItemKind::Capability(cap) = &module.items[1].kind else {
        unreachable!()
    };
    assert_eq!(cap.ops.len(), 2);
    assert_eq!(module.tests().count(), 1);
}

#[test]
fn members_may_share_a_line() {
    let src = "has Show = show => Self -> Str; debug => Self -> Str\n";
    let module = parse_source(src).expect("parse");
    let ItemKind::Capability(cap) = &module.items[0].kind else {
        panic!("expected capability");
    };
    assert_eq!(cap.ops.len(), 2);
}

#[test]
fn signature_with_where_clause() {
    let src = "def max = A -> A -> A where A has Order, B has Show\n";
    let module = parse_source(src).expect("parse");
    let ItemKind::Signature(sig) = &module.items[0].kind else {
        panic!("expected signature");
    };
    assert_eq!(sig.constraints.len(), 2);
    assert_eq!(sig.constraints[0].capability.name.node, "Order");
    assert!(matches!(sig.ty.kind, TypeExprKind::Function { ref params, .. } if params.len() == 2));
}

#[test]
fn match_arms_on_continuation_lines() {
    let src = "f = n -> n : | 0 -> 1\n| _ -> 2\ng = 3\n";
    let module = parse_source(src).expect("parse");
    assert_eq!(module.items.len(), 2);
    let ItemKind::Value(decl) = &module.items[0].kind else {
        panic!("expected value");
    };
    let ExprKind::Lambda { body, .. } = &decl.value.kind else {
        panic!("expected lambda");
    };
    assert!(matches!(&body.kind, ExprKind::Match { arms, .. } if arms.len() == 2));
}

#[test]
fn indented_body_and_arms() {
    let src = "\
classify =
    n -> n :
        | 0 -> \"zero\"
        | 1 -> \"one\"
        | _ -> \"many\"
";
    let module = parse_source(src).expect("parse");
    let ItemKind::Value(decl) = &module.items[0].kind else {
        panic!("expected value");
    };
    let ExprKind::Lambda { body, .. } = &decl.value.kind else {
        panic!("expected lambda");
    };
    assert!(matches!(&body.kind, ExprKind::Match { arms, .. } if arms.len() == 3));
}

#[test]
fn blocks_with_bindings_and_asserts() {
    let src = "\
main = x -> (
    let y = x + 1
    z <- y f
    assert z > 0
    z)
";
    let module = parse_source(src).expect("parse");
    let ItemKind::Value(decl) = &module.items[0].kind else {
        panic!("expected value");
    };
    let ExprKind::Lambda { body, .. } = &decl.value.kind else {
        panic!("expected lambda");
    };
    let ExprKind::Block(block) = &body.kind else {
        panic!("expected block, got {body:?}");
    };
    assert_eq!(block.items.len(), 3);
    assert!(matches!(block.items[0].kind, BlockItemKind::Let { .. }));
    assert!(matches!(block.items[1].kind, BlockItemKind::Bind { .. }));
    assert!(matches!(block.items[2].kind, BlockItemKind::Assert(_)));
    assert!(matches!(block.result.kind, ExprKind::Var { .. }));
}

#[test]
fn block_must_end_with_an_expression() {
    let src = "main = (\n    let y = 1\n)\n";
    let err = parse_source(src).expect_err("expected parse error");
    assert!(err.to_string().contains("end of the block"), "{err}");
}

#[test]
fn record_and_tuple_patterns() {
    let src = "f = p -> p : | {x, y 0} -> x | {a; b; ..rest} -> a | {} -> 0\n";
    let module = parse_source(src).expect("parse");
    let ItemKind::Value(decl) = &module.items[0].kind else {
        panic!("expected value");
    };
    let ExprKind::Lambda { body, .. } = &decl.value.kind else {
        panic!("expected lambda");
    };
    let ExprKind::Match { arms, .. } = &body.kind else {
        panic!("expected match");
    };
    let PatternKind::Record(fields) = &arms[0].pattern.kind else {
        panic!("expected record pattern");
    };
    assert!(fields[0].punned);
    assert!(!fields[1].punned);
    assert!(matches!(
        &arms[1].pattern.kind,
        PatternKind::Tuple { items, rest: Some(_) } if items.len() == 2
    ));
    assert!(matches!(
        &arms[2].pattern.kind,
        PatternKind::Tuple { items, rest: None } if items.is_empty()
    ));
}

#[test]
fn negative_and_tag_patterns() {
    let src = "f = v -> v : | Some (-1) -> 0 | Some n -> n | None -> 0\n";
    let module = parse_source(src).expect("parse");
    let ItemKind::Value(decl) = &module.items[0].kind else {
        panic!("expected value");
    };
    let ExprKind::Lambda { body, .. } = &decl.value.kind else {
        panic!("expected lambda");
    };
    let ExprKind::Match { arms, .. } = &body.kind else {
        panic!("expected match");
    };
    let PatternKind::Tag {
        payload: Some(payload),
        ..
    } = &arms[0].pattern.kind
    else {
        panic!("expected tag pattern");
    };
    assert!(matches!(
        payload.kind,
        PatternKind::Int {
            value: 1,
            negative: true
        }
    ));
    assert!(matches!(arms[2].pattern.kind, PatternKind::Tag { payload: None, .. }));
}

#[test]
fn type_params_include_value_params() {
    let src = "typ Matrix T {rows U8} = [T]\n";
    let module = parse_source(src).expect("parse");
    let ItemKind::Type(decl) = &module.items[0].kind else {
        panic!("expected type");
    };
    assert!(matches!(decl.params[0], TypeParam::Type(_)));
    assert!(matches!(decl.params[1], TypeParam::Value { .. }));
    assert!(matches!(decl.body, TypeBody::Alias(_)));
}

#[test]
fn length_arms_may_be_indented() {
    let src = "\
typ Vec T {len U32} =
    len :
        | 0 -> {}
        | len -> {T; Vec T {len (len sub 1)}}
";
    let module = parse_source(src).expect("parse");
    let ItemKind::Type(decl) = &module.items[0].kind else {
        panic!("expected type");
    };
    let TypeBody::LengthMatch(m) = &decl.body else {
        panic!("expected length match");
    };
    assert_eq!(m.scrutinee.node, "len");
    assert_eq!(m.arms.len(), 2);
}

#[test]
fn errors_name_expected_and_found() {
    let err = parse_source("typ = I64\n").expect_err("expected parse error");
    let msg = err.to_string();
    assert!(msg.contains("expected a capitalized name"), "{msg}");
    assert!(msg.contains("found `=`"), "{msg}");
}

#[test]
fn bare_length_arithmetic_is_not_a_named_argument() {
    use sable_ast::{LengthExprKind, TypeArg};

    let src = "typ Vec T {len U32} = len : | 0 -> {} | len -> {T; Vec T {len sub 1}}\n";
    let module = parse_source(src).expect("parse");
    let ItemKind::Type(decl) = &module.items[0].kind else {
        panic!("expected type");
    };
    let TypeBody::LengthMatch(m) = &decl.body else {
        panic!("expected length match");
    };
    let TypeExprKind::Tuple(items) = &m.arms[1].body.kind else {
        panic!("expected tuple arm");
    };
    let TypeExprKind::Named { args, .. } = &items[1].kind else {
        panic!("expected named type");
    };
    let TypeArg::Length(arg) = &args[1] else {
        panic!("expected length argument");
    };
    assert!(arg.param.is_none());
    assert!(matches!(
        &arg.value.kind,
        LengthExprKind::Apply { op, .. } if op.node == "sub"
    ));

    let named = parse_source("typ Vec T {len U32} = len : | 0 -> {} | len -> {T; Vec T {len len sub 1}}\n")
        .expect("parse");
    let ItemKind::Type(decl) = &named.items[0].kind else {
        panic!("expected type");
    };
    let TypeBody::LengthMatch(m) = &decl.body else {
        panic!("expected length match");
    };
    let TypeExprKind::Tuple(items) = &m.arms[1].body.kind else {
        panic!("expected tuple arm");
    };
    let TypeExprKind::Named { args, .. } = &items[1].kind else {
        panic!("expected named type");
    };
    let TypeArg::Length(arg) = &args[1] else {
        panic!("expected length argument");
    };
    assert_eq!(arg.param.as_ref().map(|p| p.node.as_str()), Some("len"));
}

#[test]
fn nesting_just_under_the_default_limit_parses() {
    use sable_parse::ParseConfig;

    let depth = ParseConfig::default().max_depth - 1;
    let src = format!("x = {}1{}\n", "(".repeat(depth), ")".repeat(depth));
    parse_source(&src).expect("parse");

    let depth = ParseConfig::default().max_depth;
    let src = format!("x = {}1{}\n", "(".repeat(depth), ")".repeat(depth));
    let err = parse_source(&src).expect_err("expected parse error");
    assert!(err.to_string().contains("shallower"), "{err}");
}

#[test]
fn long_operator_chains_are_rejected_without_overflowing() {
    let terms = vec!["1"; 100_000].join(" + ");
    let err = parse_source(&format!("x = {terms}\n")).expect_err("expected parse error");
    assert!(err.to_string().contains("shorter operator chain"), "{err}");

    let fields = ".f".repeat(100_000);
    let err = parse_source(&format!("x = r{fields}\n")).expect_err("expected parse error");
    assert!(err.to_string().contains("shorter field chain"), "{err}");

    let negations = "-".repeat(100_000);
    assert!(parse_source(&format!("x = {negations}1\n")).is_err());
}

#[test]
fn chains_within_the_limit_still_parse() {
    let terms = vec!["1"; 30].join(" + ");
    parse_source(&format!("x = {terms}\ny = a * b * c - d\n")).expect("parse");
}
