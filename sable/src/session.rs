#![forbid(unsafe_code)]

//! Checking sessions: one source at a time, or a batch of modules checked
//! in parallel waves that follow their imports.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use rayon::prelude::*;
use sable_ast::{ItemKind, Module, Span};
use sable_core::{
    CancelToken, Cancelled, Checker, Imports, ModuleInterface, SemanticError, TypedModule,
};
use sable_parse::{ParseOutput, parse_source_with_recovery};
use serde::Serialize;
use tracing::{debug, trace};

use crate::config::SessionConfig;
use crate::diagnostics::{Diagnostic, Severity, render_diagnostics, sort_diagnostics};

/// A named module source, as handed to [`Session::check_modules`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleSource {
    pub name: String,
    pub source: String,
}

impl ModuleSource {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ModuleReport {
    pub module: String,
    pub source: String,
    /// Sorted by position.
    pub diagnostics: Vec<Diagnostic>,
    /// Present only when no diagnostic is an error.
    pub typed: Option<TypedModule>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    module: &'a str,
    ok: bool,
    diagnostics: &'a [Diagnostic],
    schemes: BTreeMap<&'a str, String>,
}

impl ModuleReport {
    fn new(module: &str, source: &str, mut diagnostics: Vec<Diagnostic>, typed: Option<TypedModule>) -> Self {
        sort_diagnostics(&mut diagnostics);
        let typed = typed.filter(|_| !diagnostics.iter().any(Diagnostic::is_error));
        Self {
            module: module.to_string(),
            source: source.to_string(),
            diagnostics,
            typed,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn interface(&self) -> Option<&Arc<ModuleInterface>> {
        self.typed.as_ref().map(|t| &t.interface)
    }

    pub fn render(&self) -> String {
        render_diagnostics(&self.module, &self.source, &self.diagnostics)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let schemes = self
            .typed
            .iter()
            .flat_map(|t| t.schemes.iter())
            .map(|(name, scheme)| (name.as_str(), scheme.to_string()))
            .collect();
        serde_json::to_string_pretty(&JsonReport {
            module: &self.module,
            ok: !self.has_errors(),
            diagnostics: &self.diagnostics,
            schemes,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct Session {
    config: SessionConfig,
}

/// A parsed batch member waiting for its imports.
struct Pending {
    index: usize,
    name: String,
    source: String,
    output: ParseOutput,
    /// Import paths with the span of each path literal.
    imports: Vec<(String, Span)>,
}

/// Why an import could not be supplied to the checker.
enum Blocked {
    Cycle(Vec<String>),
    Failed,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Parse and check one module against already-published interfaces.
    pub fn check_source(&self, name: &str, source: &str, imports: &Imports) -> ModuleReport {
        let output = parse_source_with_recovery(source, &self.config.parse);
        self.check_parsed(name, source, output, imports, None, &HashMap::new())
            .unwrap_or_else(|Cancelled| ModuleReport::new(name, source, Vec::new(), None))
    }

    pub fn check_source_cancellable(
        &self,
        name: &str,
        source: &str,
        imports: &Imports,
        token: &CancelToken,
    ) -> Result<ModuleReport, Cancelled> {
        let output = parse_source_with_recovery(source, &self.config.parse);
        self.check_parsed(name, source, output, imports, Some(token), &HashMap::new())
    }

    /// Check a batch whose modules import each other by name. Reports come
    /// back in input order.
    pub fn check_modules(&self, modules: Vec<ModuleSource>) -> Vec<ModuleReport> {
        self.run_batch(modules, None).unwrap_or_default()
    }

    pub fn check_modules_cancellable(
        &self,
        modules: Vec<ModuleSource>,
        token: &CancelToken,
    ) -> Result<Vec<ModuleReport>, Cancelled> {
        self.run_batch(modules, Some(token))
    }

    fn check_parsed(
        &self,
        name: &str,
        source: &str,
        output: ParseOutput,
        imports: &Imports,
        token: Option<&CancelToken>,
        blocked: &HashMap<String, Blocked>,
    ) -> Result<ModuleReport, Cancelled> {
        let mut diagnostics: Vec<Diagnostic> = output
            .lex_errors
            .iter()
            .map(Diagnostic::from)
            .chain(output.parse_errors.iter().map(Diagnostic::from))
            .collect();
        if !diagnostics.is_empty() {
            debug!(target: "sable::driver", module = name, errors = diagnostics.len(), "syntax errors; skipping type checking");
            return Ok(ModuleReport::new(name, source, diagnostics, None));
        }

        let blocked_spans = blocked_imports(name, &output.module, blocked, &mut diagnostics);
        let checker = Checker::new(self.config.check.clone());
        let outcome = match token {
            Some(token) => checker.check_cancellable(name, output.module, imports, token)?,
            None => checker.check(name, output.module, imports),
        };
        diagnostics.extend(
            outcome
                .errors
                .iter()
                .filter(|e| !explained(e, &blocked_spans))
                .map(Diagnostic::from),
        );
        debug!(
            target: "sable::driver",
            module = name,
            diagnostics = diagnostics.len(),
            "module checked"
        );
        Ok(ModuleReport::new(name, source, diagnostics, Some(outcome.typed)))
    }

    fn run_batch(
        &self,
        modules: Vec<ModuleSource>,
        token: Option<&CancelToken>,
    ) -> Result<Vec<ModuleReport>, Cancelled> {
        let parse = &self.config.parse;
        let mut pending: Vec<Pending> = modules
            .into_par_iter()
            .enumerate()
            .map(|(index, m)| {
                let output = parse_source_with_recovery(&m.source, parse);
                let imports = import_paths(&output.module);
                Pending {
                    index,
                    name: m.name,
                    source: m.source,
                    output,
                    imports,
                }
            })
            .collect();

        let mut reports: Vec<Option<ModuleReport>> = (0..pending.len()).map(|_| None).collect();
        let mut published: HashMap<String, Arc<ModuleInterface>> = HashMap::new();
        let mut failed: HashSet<String> = HashSet::new();
        let mut cut: HashMap<(String, String), Vec<String>> = HashMap::new();
        let mut wave = 0usize;

        while !pending.is_empty() {
            if token.is_some_and(CancelToken::is_cancelled) {
                return Err(Cancelled);
            }
            let waiting: HashSet<String> = pending.iter().map(|p| p.name.clone()).collect();
            let is_ready = |p: &Pending| {
                p.imports.iter().all(|(path, _)| {
                    !waiting.contains(path)
                        || cut.contains_key(&(p.name.clone(), path.clone()))
                })
            };
            let (ready, rest): (Vec<Pending>, Vec<Pending>) =
                pending.into_iter().partition(|p| is_ready(p));
            pending = rest;

            if ready.is_empty() {
                for (edge, path) in cycle_edges(&pending, &cut) {
                    trace!(target: "sable::driver", from = %edge.0, to = %edge.1, "import cycle");
                    cut.insert(edge, path);
                }
                continue;
            }

            debug!(target: "sable::driver", wave, modules = ready.len(), "checking wave");
            let checked: Vec<(usize, String, Result<ModuleReport, Cancelled>)> = ready
                .into_par_iter()
                .map(|p| {
                    let mut imports = Imports::new();
                    let mut blocked = HashMap::new();
                    for (path, _) in &p.imports {
                        if let Some(cycle) = cut.get(&(p.name.clone(), path.clone())) {
                            blocked.insert(path.clone(), Blocked::Cycle(cycle.clone()));
                        } else if let Some(iface) = published.get(path) {
                            imports.insert(path.clone(), Arc::clone(iface));
                        } else if failed.contains(path) {
                            blocked.insert(path.clone(), Blocked::Failed);
                        }
                    }
                    let report =
                        self.check_parsed(&p.name, &p.source, p.output, &imports, token, &blocked);
                    (p.index, p.name, report)
                })
                .collect();

            for (index, name, report) in checked {
                let report = report?;
                match report.interface() {
                    Some(iface) => {
                        published.insert(name, Arc::clone(iface));
                    }
                    None => {
                        failed.insert(name);
                    }
                }
                reports[index] = Some(report);
            }
            wave += 1;
        }

        Ok(reports.into_iter().flatten().collect())
    }
}

fn import_paths(module: &Module) -> Vec<(String, Span)> {
    module
        .items
        .iter()
        .filter_map(|item| match &item.kind {
            ItemKind::Import(import) => Some((import.path.node.clone(), import.path.span)),
            _ => None,
        })
        .collect()
}

/// Report each blocked import on its path literal; returns the spans the
/// checker's own unresolved-import errors should be dropped for.
fn blocked_imports(
    name: &str,
    module: &Module,
    blocked: &HashMap<String, Blocked>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Span> {
    let mut spans = Vec::new();
    for (path, span) in import_paths(module) {
        let Some(reason) = blocked.get(&path) else {
            continue;
        };
        let diagnostic = match reason {
            Blocked::Cycle(cycle) => Diagnostic::new(
                Severity::Error,
                "ImportCycle",
                "sable::import_cycle",
                format!("import cycle: {name} -> {}", cycle.join(" -> ")),
                span,
            )
            .with_label("this import closes the cycle"),
            Blocked::Failed => Diagnostic::new(
                Severity::Error,
                "FailedDependency",
                "sable::failed_dependency",
                format!("module `{path}` has errors, so its items are unavailable"),
                span,
            ),
        };
        diagnostics.push(diagnostic);
        spans.push(span);
    }
    spans
}

fn explained(err: &SemanticError, blocked: &[Span]) -> bool {
    matches!(err, SemanticError::UnresolvedName { span, .. } if blocked.contains(span))
}

/// Edges that lie on an import cycle among the waiting modules, each with
/// the path that leads back to its source.
fn cycle_edges(
    pending: &[Pending],
    cut: &HashMap<(String, String), Vec<String>>,
) -> Vec<((String, String), Vec<String>)> {
    let names: HashSet<&str> = pending.iter().map(|p| p.name.as_str()).collect();
    let edges: HashMap<&str, Vec<&str>> = pending
        .iter()
        .map(|p| {
            let targets = p
                .imports
                .iter()
                .map(|(path, _)| path.as_str())
                .filter(|t| names.contains(t) && !cut.contains_key(&(p.name.clone(), t.to_string())))
                .collect();
            (p.name.as_str(), targets)
        })
        .collect();

    let mut found = Vec::new();
    for p in pending {
        for &target in edges.get(p.name.as_str()).into_iter().flatten() {
            if let Some(back) = shortest_path(&edges, target, &p.name) {
                found.push(((p.name.clone(), target.to_string()), back));
            }
        }
    }
    found
}

fn shortest_path(edges: &HashMap<&str, Vec<&str>>, from: &str, to: &str) -> Option<Vec<String>> {
    let mut previous: HashMap<&str, &str> = HashMap::new();
    let mut queue = VecDeque::from([from]);
    let mut seen: HashSet<&str> = HashSet::from([from]);
    while let Some(node) = queue.pop_front() {
        if node == to {
            let mut path = vec![node.to_string()];
            let mut cur = node;
            while let Some(&prev) = previous.get(cur) {
                path.push(prev.to_string());
                cur = prev;
            }
            path.reverse();
            return Some(path);
        }
        for &next in edges.get(node).into_iter().flatten() {
            if seen.insert(next) {
                previous.insert(next, node);
                queue.push_back(next);
            }
        }
    }
    None
}
