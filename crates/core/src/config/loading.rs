//! Configuration loading from files and environment variables.
//!
//! Implements the `@include:` file composition described in spec §9 as a
//! preprocessing pass over the raw TOML document: every array element of the
//! form `"@include:relative/path.toml"` is resolved (relative to the
//! including file's directory) and spliced into the array in place, before
//! the document is ever handed to a deserializer. This models the source's
//! include-plus-list-literal algebra without carrying its runtime monkey-
//! patching into the core.

use crate::error::{Error, Result};
use config::{Config as ConfigLib, Environment, File};
use serde::Deserialize;
use std::path::Path;

use super::Config;

const INCLUDE_PREFIX: &str = "@include:";

/// Resolve all `@include:` directives in `value`, reading referenced files
/// relative to `base_dir`. Returns the fully-spliced document.
fn resolve_includes(value: toml::Value, base_dir: &Path, depth: usize) -> Result<toml::Value> {
    if depth > 16 {
        return Err(Error::config(
            "@include: nesting exceeds the maximum depth of 16 (likely a cycle)",
        ));
    }

    match value {
        toml::Value::Array(items) => {
            let mut resolved = Vec::with_capacity(items.len());
            for item in items {
                if let toml::Value::String(s) = &item {
                    if let Some(rel_path) = s.strip_prefix(INCLUDE_PREFIX) {
                        let included = load_include(base_dir, rel_path, depth)?;
                        match included {
                            toml::Value::Array(mut included_items) => {
                                resolved.append(&mut included_items);
                            }
                            other => resolved.push(other),
                        }
                        continue;
                    }
                    reject_bracket_literal(s)?;
                }
                resolved.push(resolve_includes(item, base_dir, depth)?);
            }
            Ok(toml::Value::Array(resolved))
        }
        toml::Value::Table(table) => {
            let mut resolved = toml::map::Map::with_capacity(table.len());
            for (key, val) in table {
                resolved.insert(key, resolve_includes(val, base_dir, depth)?);
            }
            Ok(toml::Value::Table(resolved))
        }
        toml::Value::String(s) => {
            reject_bracket_literal(&s)?;
            Ok(toml::Value::String(s))
        }
        other => Ok(other),
    }
}

/// The source forbids nested list/bracket syntax inside plain string values
/// (spec §9); a literal `[` or `]` in a scalar string is almost always a
/// malformed include or a copy-paste of list syntax into the wrong place.
fn reject_bracket_literal(s: &str) -> Result<()> {
    if s.contains('[') || s.contains(']') {
        return Err(Error::config(format!(
            "string value contains a literal bracket, which is forbidden outside of \
             @include directives: {s:?}"
        )));
    }
    Ok(())
}

fn load_include(base_dir: &Path, rel_path: &str, depth: usize) -> Result<toml::Value> {
    let path = base_dir.join(rel_path);
    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::config(format!("failed to read include {}: {e}", path.display())))?;
    let parsed: toml::Value = toml::from_str(&content)
        .map_err(|e| Error::config(format!("failed to parse include {}: {e}", path.display())))?;
    let next_base = path.parent().unwrap_or(base_dir).to_path_buf();
    resolve_includes(parsed, &next_base, depth + 1)
}

impl Config {
    /// Loads configuration from a TOML file with environment variable
    /// overrides, resolving `@include:` directives first.
    ///
    /// Environment variables are prefixed with `SEAD_RECONCILE_` and use
    /// double underscores for nested values, e.g.
    /// `SEAD_RECONCILE_RETRIEVAL__BLEND_ALPHA=0.6`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let resolved_toml = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| Error::config(format!("failed to read {}: {e}", path.display())))?;
            let raw: toml::Value = toml::from_str(&content)
                .map_err(|e| Error::config(format!("failed to parse {}: {e}", path.display())))?;
            let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
            let resolved = resolve_includes(raw, base_dir, 0)?;
            Some(
                toml::to_string(&resolved)
                    .map_err(|e| Error::config(format!("failed to re-serialize config: {e}")))?,
            )
        } else {
            None
        };

        let mut builder = ConfigLib::builder();
        if let Some(toml_str) = resolved_toml {
            builder = builder.add_source(File::from_str(&toml_str, config::FileFormat::Toml));
        }
        builder = builder.add_source(
            Environment::with_prefix("SEAD_RECONCILE")
                .separator("__")
                .try_parsing(true),
        );

        let built = builder
            .build()
            .map_err(|e| Error::config(format!("failed to build config: {e}")))?;

        built
            .try_deserialize()
            .map_err(|e| Error::config(format!("failed to deserialize config: {e}")))
    }

    /// Creates a config from a TOML string, resolving `@include:` directives
    /// relative to `base_dir` (useful for testing).
    pub fn from_toml_str_with_base(content: &str, base_dir: &Path) -> Result<Self> {
        let raw: toml::Value =
            toml::from_str(content).map_err(|e| Error::config(format!("failed to parse TOML: {e}")))?;
        let resolved = resolve_includes(raw, base_dir, 0)?;
        Config::deserialize(resolved)
            .map_err(|e| Error::config(format!("failed to deserialize config: {e}")))
    }

    /// Creates a config from a TOML string with no include resolution.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("failed to parse TOML: {e}")))
    }

    /// Load configuration from a single file.
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Config file, with `@include:` directives resolved
    /// 3. Environment variables (`SEAD_RECONCILE_*`)
    pub fn load(config_path: &Path) -> Result<Self> {
        Self::from_file(config_path)
    }
}
