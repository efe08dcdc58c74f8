#![forbid(unsafe_code)]

//! Checking sessions for Sable modules.
//!
//! A [`Session`] parses and checks sources with a [`SessionConfig`],
//! producing one [`ModuleReport`] per module: diagnostics sorted by
//! position plus, when nothing went wrong, the typed module and its
//! interface. Batches of modules that import each other are checked in
//! parallel, dependencies first.

mod config;
mod diagnostics;
mod session;

pub use config::{ConfigError, SessionConfig};
pub use diagnostics::{Diagnostic, Label, Severity, render_diagnostics, sort_diagnostics};
pub use session::{ModuleReport, ModuleSource, Session};

pub use sable_core::{CancelToken, Cancelled, CheckConfig, Imports, ModuleInterface, TypedModule};
pub use sable_parse::ParseConfig;
