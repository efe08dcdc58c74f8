#![forbid(unsafe_code)]

mod capability;
mod check;
mod error;
mod interface;
mod lower;
pub mod pattern_compiler;
mod resolve;
mod types;
mod unify;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sable_ast::Prim;

pub use check::{CheckOutcome, Checker, TypedModule};
pub use error::SemanticError;
pub use interface::{
    CapabilityDef, CapabilityUse, HeadKey, ImplDef, Imports, ModuleInterface, OpDef,
};
pub use resolve::{Binding, BindingKind, BindingScope, ResolvedModule, is_type_var_name, resolve_module};
pub use types::{
    FamilyDef, Len, LenBase, LenVar, RigidId, Scheme, Ty, TyVar, TypeDef, TypeDefKind, VariantDef,
    letter_name, prelude_bool,
};

/// Knobs for one checking pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckConfig {
    /// Integer literals whose type is still open default to this.
    pub default_int: Prim,
    /// Float literals whose type is still open default to this.
    pub default_float: Prim,
    /// Bound on expression nesting and alias expansion.
    pub recursion_limit: usize,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            default_int: Prim::I64,
            default_float: Prim::F64,
            recursion_limit: 256,
        }
    }
}

/// Cooperative cancellation, observed between top-level declarations.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("checking was cancelled")]
pub struct Cancelled;
