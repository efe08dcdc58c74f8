#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use sable_ast::{Prim, QualName, TagRes};

use crate::types::{Scheme, TypeDef};

/// What a checked module exposes to the modules that import it.
#[derive(Clone, Debug, Default)]
pub struct ModuleInterface {
    pub name: String,
    /// Public values with their schemes.
    pub values: BTreeMap<String, Scheme>,
    /// Every type declared by the module; `public` marks the nameable ones.
    pub types: BTreeMap<String, TypeDef>,
    pub capabilities: BTreeMap<String, CapabilityDef>,
    /// Implementations are always exported.
    pub impls: Vec<ImplDef>,
    /// Tags of public unions.
    pub tags: BTreeMap<String, TagRes>,
}

/// Interfaces of the modules a module may import, keyed by import path.
pub type Imports = BTreeMap<String, Arc<ModuleInterface>>;

impl ModuleInterface {
    pub fn public_type(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name).filter(|t| t.public)
    }

    pub fn public_capability(&self, name: &str) -> Option<&CapabilityDef> {
        self.capabilities.get(name).filter(|c| c.public)
    }

    /// Find a capability operation by name among the public capabilities.
    pub fn operation(&self, name: &str) -> Option<(&CapabilityDef, usize)> {
        self.capabilities
            .values()
            .filter(|c| c.public)
            .find_map(|c| c.ops.iter().position(|op| op.name == name).map(|i| (c, i)))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CapabilityDef {
    pub name: QualName,
    pub public: bool,
    pub ops: Vec<OpDef>,
}

/// An operation signature. `Gen(0)` is `Self`, constrained by the capability.
#[derive(Clone, Debug, PartialEq)]
pub struct OpDef {
    pub name: String,
    pub scheme: Scheme,
}

/// Capability implementations are selected by the head of the target type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum HeadKey {
    Prim(Prim),
    Con(QualName),
    Family(QualName),
    List,
    Tuple(usize),
    Record(Vec<String>),
    Fn(usize),
}

impl std::fmt::Display for HeadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeadKey::Prim(p) => write!(f, "{p}"),
            HeadKey::Con(q) | HeadKey::Family(q) => write!(f, "{q}"),
            HeadKey::List => f.write_str("[_]"),
            HeadKey::Tuple(n) => write!(f, "{}-tuple", n),
            HeadKey::Record(names) => write!(f, "{{{}}}", names.join(", ")),
            HeadKey::Fn(n) => write!(f, "{}-argument function", n),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImplDef {
    pub capability: QualName,
    pub head: HeadKey,
    /// Module that declared the implementation.
    pub module: String,
}

/// A resolved capability use: which implementation serves an operation call.
#[derive(Clone, Debug, PartialEq)]
pub struct CapabilityUse {
    pub span: sable_ast::Span,
    pub capability: QualName,
    pub head: HeadKey,
    pub module: String,
}
