#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use std::fs;
use std::path::Path;
use std::str::FromStr;

use miette::Diagnostic;
use sable_ast::Prim;
use sable_core::CheckConfig;
use sable_parse::ParseConfig;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("cannot read session config: {0}")]
    #[diagnostic(code(sable::config::io))]
    Io(#[from] std::io::Error),

    #[error("invalid session config: {0}")]
    #[diagnostic(code(sable::config::syntax))]
    Syntax(#[from] toml::de::Error),

    #[error("`{key}` names unknown type `{name}`")]
    #[diagnostic(
        code(sable::config::unknown_type),
        help("use one of I8, I16, I32, I64, U8, U16, U32, U64, F32, F64")
    )]
    UnknownType { key: &'static str, name: String },

    #[error("`{key}` must be {expected} type, found `{name}`")]
    #[diagnostic(code(sable::config::wrong_type))]
    WrongType {
        key: &'static str,
        name: String,
        expected: &'static str,
    },

    #[error("`{key}` must be greater than zero")]
    #[diagnostic(code(sable::config::zero))]
    Zero { key: &'static str },
}

/// Settings for a checking session.
///
/// ```toml
/// [check]
/// default-int = "I32"
/// default-float = "F64"
/// recursion-limit = 128
///
/// [parse]
/// max-depth = 32
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub check: CheckConfig,
    pub parse: ParseConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    check: RawCheck,
    parse: RawParse,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
struct RawCheck {
    default_int: Option<String>,
    default_float: Option<String>,
    recursion_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
struct RawParse {
    max_depth: Option<usize>,
}

impl SessionConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text)?;
        let mut config = SessionConfig::default();

        if let Some(name) = raw.check.default_int {
            config.check.default_int =
                numeric("check.default-int", name, Prim::is_integer, "an integer")?;
        }
        if let Some(name) = raw.check.default_float {
            config.check.default_float =
                numeric("check.default-float", name, Prim::is_float, "a float")?;
        }
        if let Some(limit) = raw.check.recursion_limit {
            config.check.recursion_limit = positive("check.recursion-limit", limit)?;
        }
        if let Some(depth) = raw.parse.max_depth {
            config.parse.max_depth = positive("parse.max-depth", depth)?;
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }
}

impl FromStr for SessionConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_toml(s)
    }
}

fn numeric(
    key: &'static str,
    name: String,
    accept: fn(Prim) -> bool,
    expected: &'static str,
) -> Result<Prim, ConfigError> {
    match Prim::from_name(&name) {
        Some(prim) if accept(prim) => Ok(prim),
        Some(_) => Err(ConfigError::WrongType {
            key,
            name,
            expected,
        }),
        None => Err(ConfigError::UnknownType { key, name }),
    }
}

fn positive(key: &'static str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        Err(ConfigError::Zero { key })
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = SessionConfig::from_toml("").expect("config");
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.check.default_int, Prim::I64);
    }

    #[test]
    fn check_table_overrides_defaults() {
        let config: SessionConfig = "[check]\ndefault-int = \"I32\"\nrecursion-limit = 64\n"
            .parse()
            .expect("config");
        assert_eq!(config.check.default_int, Prim::I32);
        assert_eq!(config.check.default_float, Prim::F64);
        assert_eq!(config.check.recursion_limit, 64);
    }

    #[test]
    fn parse_depth_is_configurable() {
        let config = SessionConfig::from_toml("[parse]\nmax-depth = 12\n").expect("config");
        assert_eq!(config.parse.max_depth, 12);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            SessionConfig::from_toml("[check]\ndefault-int = \"Int\"\n"),
            Err(ConfigError::UnknownType { .. })
        ));
        assert!(matches!(
            SessionConfig::from_toml("[check]\ndefault-int = \"F32\"\n"),
            Err(ConfigError::WrongType { .. })
        ));
        assert!(matches!(
            SessionConfig::from_toml("[check]\ndefault-float = \"Str\"\n"),
            Err(ConfigError::WrongType { .. })
        ));
        assert!(matches!(
            SessionConfig::from_toml("[check]\nrecursion-limit = 0\n"),
            Err(ConfigError::Zero { .. })
        ));
        assert!(matches!(
            SessionConfig::from_toml("[check]\nunknown = 1\n"),
            Err(ConfigError::Syntax(_))
        ));
    }
}
