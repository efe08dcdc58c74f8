use sable::{CancelToken, Imports, ModuleSource, Session, SessionConfig, Severity};

const GEOMETRY: &str = "\
typ pub Shape = | Circle F64 | Square F64
def pub area = Shape -> F64
area = s -> s : | Circle r -> r * r * 3.14 | Square w -> w * w
";

const MAIN: &str = "\
import Geo \"geometry\"
total = s -> s Geo.area
";

fn kinds(report: &sable::ModuleReport) -> Vec<&'static str> {
    report.diagnostics.iter().map(|d| d.kind).collect()
}

#[test]
fn clean_source_yields_a_typed_module() {
    let report = Session::default().check_source("main", "id = x -> x\n", &Imports::new());
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    let typed = report.typed.as_ref().expect("typed module");
    assert_eq!(typed.scheme("id").map(ToString::to_string).as_deref(), Some("A -> A"));
}

#[test]
fn syntax_errors_skip_checking() {
    let report = Session::default().check_source("main", "typ = 1\n", &Imports::new());
    assert!(report.has_errors());
    assert!(report.typed.is_none());
    assert!(!report.diagnostics.is_empty());
    assert!(kinds(&report).iter().all(|k| *k == "ParseError"));
}

#[test]
fn errors_drop_the_typed_module_and_sort_by_position() {
    let src = "def a = I64\na = \"x\"\ndef b = Str\nb = 1.5\nc = d\n";
    let report = Session::default().check_source("main", src, &Imports::new());
    assert!(report.typed.is_none());
    assert_eq!(report.errors().count(), 3);
    assert!(
        report
            .diagnostics
            .windows(2)
            .all(|w| w[0].span.offset() <= w[1].span.offset())
    );
}

#[test]
fn warnings_keep_the_typed_module() {
    let src = "typ Letter = | A | B\nrank = l -> l : | _ -> 0 | A -> 1\n";
    let report = Session::default().check_source("main", src, &Imports::new());
    assert!(!report.has_errors());
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].severity, Severity::Warning);
    assert!(report.typed.is_some());
}

#[test]
fn configuration_reaches_the_checker() {
    let config = SessionConfig::from_toml("[check]\ndefault-int = \"I32\"\n").expect("config");
    let report = Session::new(config).check_source("main", "n = 1\n", &Imports::new());
    let typed = report.typed.as_ref().expect("typed module");
    assert_eq!(typed.scheme("n").map(ToString::to_string).as_deref(), Some("I32"));
}

#[test]
fn batches_check_dependencies_first_and_keep_input_order() {
    let reports = Session::default().check_modules(vec![
        ModuleSource::new("main", MAIN),
        ModuleSource::new("geometry", GEOMETRY),
    ]);
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].module, "main");
    assert_eq!(reports[1].module, "geometry");
    for report in &reports {
        assert!(report.diagnostics.is_empty(), "{}: {:?}", report.module, report.diagnostics);
    }
    let typed = reports[0].typed.as_ref().expect("typed module");
    assert_eq!(
        typed.scheme("total").map(ToString::to_string).as_deref(),
        Some("Shape -> F64")
    );
}

#[test]
fn import_cycles_are_reported_on_both_imports() {
    let reports = Session::default().check_modules(vec![
        ModuleSource::new("a", "import B \"b\"\nx = 1\n"),
        ModuleSource::new("b", "import A \"a\"\ny = 2\n"),
    ]);
    assert_eq!(kinds(&reports[0]), ["ImportCycle"]);
    assert_eq!(kinds(&reports[1]), ["ImportCycle"]);
    assert_eq!(reports[0].diagnostics[0].message, "import cycle: a -> b -> a");
}

#[test]
fn modules_beyond_a_cycle_still_get_checked() {
    let reports = Session::default().check_modules(vec![
        ModuleSource::new("a", "import B \"b\"\nx = 1\n"),
        ModuleSource::new("b", "import A \"a\"\ny = 2\n"),
        ModuleSource::new("c", "z = 3\n"),
    ]);
    assert!(reports[2].diagnostics.is_empty());
    assert!(reports[2].typed.is_some());
}

#[test]
fn failed_dependencies_are_reported_on_the_import() {
    let reports = Session::default().check_modules(vec![
        ModuleSource::new("geometry", "def pub n = I64\nn = \"x\"\n"),
        ModuleSource::new("main", "import Geo \"geometry\"\nm = Geo.n\n"),
    ]);
    assert_eq!(kinds(&reports[0]), ["TypeError"]);
    assert_eq!(kinds(&reports[1]), ["FailedDependency"]);
}

#[test]
fn unknown_modules_are_unresolved() {
    let reports = Session::default().check_modules(vec![ModuleSource::new("main", MAIN)]);
    assert_eq!(kinds(&reports[0]), ["UnresolvedName"]);
}

#[test]
fn cancelled_batches_publish_nothing() {
    let token = CancelToken::new();
    token.cancel();
    let result = Session::default()
        .check_modules_cancellable(vec![ModuleSource::new("geometry", GEOMETRY)], &token);
    assert!(result.is_err());
}

#[test]
fn json_reports_carry_schemes_and_diagnostics() {
    let report = Session::default().check_source("main", "id = x -> x\nbad = y\n", &Imports::new());
    let json: serde_json::Value =
        serde_json::from_str(&report.to_json().expect("json")).expect("valid json");
    assert_eq!(json["module"], "main");
    assert_eq!(json["ok"], false);
    assert_eq!(json["diagnostics"][0]["kind"], "UnresolvedName");

    let report = Session::default().check_source("main", "id = x -> x\n", &Imports::new());
    let json: serde_json::Value =
        serde_json::from_str(&report.to_json().expect("json")).expect("valid json");
    assert_eq!(json["schemes"]["id"], "A -> A");
}

#[test]
fn rendering_shows_messages_against_the_source() {
    let report = Session::default().check_source("main", "bad = y\n", &Imports::new());
    let rendered = report.render();
    assert!(rendered.contains("unresolved name `y`"), "{rendered}");
}
