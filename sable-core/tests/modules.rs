use std::sync::Arc;

use sable_core::{CheckOutcome, Checker, Imports};
use sable_parse::parse_source;

const GEOMETRY: &str = "\
typ pub Shape = | Circle F64 | Square F64
def pub area = Shape -> F64
area = s -> s : | Circle r -> r * r * 3.14 | Square w -> w * w
has pub Show = show => Self -> Str
trait Show Shape = show = s -> \"shape\"
hidden = 1
";

fn check(name: &str, src: &str, imports: &Imports) -> CheckOutcome {
    let module = parse_source(src).expect("parse");
    Checker::default().check(name, module, imports)
}

fn geometry() -> Imports {
    let outcome = check("geometry", GEOMETRY, &Imports::new());
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    let mut imports = Imports::new();
    imports.insert("geometry".to_string(), Arc::clone(&outcome.typed.interface));
    imports
}

#[test]
fn interface_exports_public_items_only() {
    let outcome = check("geometry", GEOMETRY, &Imports::new());
    let iface = &outcome.typed.interface;
    assert!(iface.values.contains_key("area"));
    assert!(!iface.values.contains_key("hidden"));
    assert_eq!(iface.impls.len(), 1);
}

#[test]
fn imported_values_keep_their_schemes() {
    let src = "\
import Geo \"geometry\"
total = s -> s Geo.area
";
    let outcome = check("main", src, &geometry());
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    assert_eq!(
        outcome.typed.scheme("total").map(ToString::to_string).as_deref(),
        Some("Shape -> F64")
    );
}

#[test]
fn imported_implementations_resolve() {
    let src = "\
import Geo \"geometry\"
def describe = Geo.Shape -> Str
describe = s -> s Geo.show
";
    let outcome = check("main", src, &geometry());
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    assert_eq!(outcome.typed.capability_uses.len(), 1);
    assert_eq!(outcome.typed.capability_uses[0].module, "geometry");
}

#[test]
fn private_values_are_not_importable() {
    let src = "\
import Geo \"geometry\"
peek = Geo.hidden
";
    let outcome = check("main", src, &geometry());
    assert_eq!(
        outcome.errors.iter().map(|e| e.kind()).collect::<Vec<_>>(),
        ["UnresolvedName"]
    );
}

#[test]
fn missing_modules_are_unresolved() {
    let outcome = check("main", "import Geo \"geometry\"\n", &Imports::new());
    assert_eq!(
        outcome.errors.iter().map(|e| e.kind()).collect::<Vec<_>>(),
        ["UnresolvedName"]
    );
}
