use proptest::prelude::*;
use sable_ast::ItemKind;
use sable_parse::{format_expr, format_module, format_type_decl, parse_expr, parse_source};

#[derive(Clone, Copy, Debug, PartialEq)]
enum Shape {
    Atom,
    App,
    Fn,
    Union,
}

#[derive(Clone, Debug)]
struct Ty {
    text: String,
    shape: Shape,
}

impl Ty {
    fn atom(&self) -> String {
        match self.shape {
            Shape::Atom => self.text.clone(),
            _ => format!("({})", self.text),
        }
    }

    fn arm(&self) -> String {
        match self.shape {
            Shape::Fn | Shape::Union => format!("({})", self.text),
            _ => self.text.clone(),
        }
    }
}

const FIELDS: [&str; 3] = ["x", "size", "name"];
const TAGS: [&str; 3] = ["Red", "Leaf", "Node"];

fn leaf() -> impl Strategy<Value = Ty> {
    prop::sample::select(vec!["I64", "U8", "F32", "Str", "Bool", "A", "B2", "Self", "Point"]).prop_map(
        |name| Ty {
            text: name.to_string(),
            shape: Shape::Atom,
        },
    )
}

fn length_arg() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "{n}",
        "{3}",
        "{len 3}",
        "{len (len sub 1)}",
        "{(n add 2)}",
    ])
    .prop_map(str::to_string)
}

fn ty() -> impl Strategy<Value = Ty> {
    leaf().prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(|items| Ty {
                text: format!(
                    "{{{}}}",
                    items.iter().map(|t| t.text.clone()).collect::<Vec<_>>().join("; ")
                ),
                shape: Shape::Atom,
            }),
            prop::collection::vec(inner.clone(), 1..3).prop_map(|fields| Ty {
                text: format!(
                    "{{{}}}",
                    fields
                        .iter()
                        .enumerate()
                        .map(|(i, t)| format!("{} {}", FIELDS[i], t.text))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                shape: Shape::Atom,
            }),
            inner.clone().prop_map(|t| Ty {
                text: format!("[{}]", t.text),
                shape: Shape::Atom,
            }),
            (
                prop::sample::select(vec!["Pair", "Map", "Vec"]),
                prop::collection::vec(
                    prop_oneof![inner.clone().prop_map(|t| t.atom()), length_arg()],
                    1..3
                )
            )
                .prop_map(|(head, args)| Ty {
                    text: format!("{head} {}", args.join(" ")),
                    shape: Shape::App,
                }),
            (prop::collection::vec(inner.clone(), 1..3), inner.clone()).prop_map(|(params, ret)| {
                let mut parts: Vec<String> = params.iter().map(Ty::arm).collect();
                parts.push(ret.arm());
                Ty {
                    text: parts.join(" -> "),
                    shape: Shape::Fn,
                }
            }),
            prop::collection::vec(prop::option::of(inner), 1..3).prop_map(|variants| Ty {
                text: variants
                    .iter()
                    .enumerate()
                    .map(|(i, payload)| match payload {
                        Some(p) => format!("| {} {}", TAGS[i], p.atom()),
                        None => format!("| {}", TAGS[i]),
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
                shape: Shape::Union,
            }),
        ]
    })
}

proptest! {
    #[test]
    fn type_declarations_round_trip_through_the_printer(t in ty()) {
        let src = format!("typ T = {}", t.text);
        let module = parse_source(&format!("{src}\n")).unwrap();
        let ItemKind::Type(decl) = &module.items[0].kind else {
            panic!("expected a type declaration");
        };
        let printed = format_type_decl(decl);
        prop_assert_eq!(&printed, &src);

        let reparsed = parse_source(&format!("{printed}\n")).unwrap();
        let ItemKind::Type(again) = &reparsed.items[0].kind else {
            panic!("expected a type declaration");
        };
        prop_assert_eq!(format_type_decl(again), printed);
    }
}

#[test]
fn family_declaration_round_trips() {
    let src = "typ pub Vec T {len U32} = len : | 0 -> {} | len -> {T; Vec T {len (len sub 1)}}";
    let module = parse_source(&format!("{src}\n")).unwrap();
    let ItemKind::Type(decl) = &module.items[0].kind else {
        panic!("expected a type declaration");
    };
    assert_eq!(format_type_decl(decl), src);
}

#[test]
fn expressions_print_in_reparseable_form() {
    for src in [
        "items mapper -> items : | {first; rest} -> {first mapper; rest map mapper} | {} -> {}",
        "(x foo) bar 1 2",
        "-(a + b) * c",
        "(None) f",
        "Some (Some 1)",
        "{x 1,}",
        "[1, 2, 3]",
        "p.x + p.y",
        "a b -> a == b",
    ] {
        let expr = parse_expr(src).unwrap();
        assert_eq!(format_expr(&expr), src);
    }
}

#[test]
fn modules_print_in_reparseable_form() {
    let src = "\
doc \"Ordering.\"
has pub Order =
    greater => Self -> Self -> Bool

trait Order I64 =
    greater = a b -> a > b

def pub max = A -> A -> A where A has Order

let pub max = a b -> (
    let bigger = a greater b
    bigger : | True -> a | False -> b)

test \"max\" 1 max 2 == 2
";
    let module = parse_source(src).unwrap();
    let printed = format_module(&module);
    assert_eq!(printed, src);
}
