//! Sweep declaration file
//!
//! A sweep is declared in YAML, one document per target file:
//!
//! ```yaml
//! path: train.py
//! configurations:
//!   - line_number: 1
//!     variable: LEARNING_RATE
//!     value: [0.1, 0.2, 0.3]
//! ---
//! path: eval.py
//! configurations:
//!   - line_number: 4
//!     variable: SEED
//!     value: 42
//! ```
//!
//! Documents deserialize into a statically-typed [`SweepConfig`] which is
//! validated once at the boundary, before any expansion begins.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// A scalar value that can be spliced into source text.
///
/// Variant order matters for untagged deserialization: `true` must become a
/// bool and `2` an integer before the float fallback gets a chance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl LiteralValue {
    /// Render the value as source text.
    ///
    /// Integers render as-is, floats always keep a decimal point or exponent
    /// so they re-parse as floats, booleans render lowercase, and strings are
    /// double-quoted with `\` and `"` escaped.
    pub fn render(&self) -> String {
        match self {
            LiteralValue::Bool(b) => b.to_string(),
            LiteralValue::Int(i) => i.to_string(),
            LiteralValue::Float(f) => {
                let s = f.to_string();
                if s.contains('.') || s.contains('e') || s.contains('E') || s.contains("inf") || s.contains("NaN") {
                    s
                } else {
                    format!("{s}.0")
                }
            }
            LiteralValue::Str(s) => {
                format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            }
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// The `value:` key accepts either a bare scalar or a list of scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueList {
    One(LiteralValue),
    Many(Vec<LiteralValue>),
}

impl ValueList {
    pub fn as_slice(&self) -> &[LiteralValue] {
        match self {
            ValueList::One(v) => std::slice::from_ref(v),
            ValueList::Many(vs) => vs,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// One declared (line, variable, candidate values) rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditRule {
    /// 1-based line number in the target file.
    pub line_number: usize,

    /// Name of the variable assigned on that line.
    pub variable: String,

    /// Candidate values; a bare scalar counts as a one-element list.
    pub value: ValueList,
}

/// One target file and the rules that apply to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileTarget {
    pub path: PathBuf,
    pub configurations: Vec<EditRule>,
}

/// The whole sweep declaration: an ordered list of file targets.
///
/// Read-only input owned by the caller. Target paths are resolved lazily at
/// run time; validation here only covers the declaration itself.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub targets: Vec<FileTarget>,
}

impl SweepConfig {
    /// Validate the declaration before any expansion begins.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        for target in &self.targets {
            if target.configurations.is_empty() {
                return Err(ConfigError::NoRules {
                    path: target.path.clone(),
                });
            }
            for rule in &target.configurations {
                if rule.line_number == 0 {
                    return Err(ConfigError::BadLineNumber {
                        path: target.path.clone(),
                        variable: rule.variable.clone(),
                    });
                }
                if rule.value.is_empty() {
                    return Err(ConfigError::NoValues {
                        path: target.path.clone(),
                        variable: rule.variable.clone(),
                        line_number: rule.line_number,
                    });
                }
            }
        }
        Ok(())
    }

    /// Total number of combinations the declaration expands to.
    pub fn combination_count(&self) -> usize {
        self.targets
            .iter()
            .flat_map(|t| t.configurations.iter())
            .map(|r| r.value.len())
            .product()
    }
}

/// A structurally invalid declaration. Fatal: aborts the sweep before any
/// run starts.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The declaration contains no file targets.
    NoTargets,
    /// A target declares no rules.
    NoRules { path: PathBuf },
    /// A rule declares an empty value list.
    NoValues {
        path: PathBuf,
        variable: String,
        line_number: usize,
    },
    /// Line numbers are 1-based; zero can never match a line.
    BadLineNumber { path: PathBuf, variable: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoTargets => {
                write!(f, "sweep declaration contains no file targets")
            }
            ConfigError::NoRules { path } => {
                write!(f, "target {} declares no rules", path.display())
            }
            ConfigError::NoValues {
                path,
                variable,
                line_number,
            } => write!(
                f,
                "rule for {} on {}:{} has an empty value list",
                variable,
                path.display(),
                line_number
            ),
            ConfigError::BadLineNumber { path, variable } => write!(
                f,
                "rule for {} in {} uses line number 0 (line numbers are 1-based)",
                variable,
                path.display()
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load a sweep declaration from a YAML file.
///
/// Each `---`-separated document is one file target. Structural problems
/// (missing keys, wrong types) surface here; declaration-level rules are
/// checked separately by [`SweepConfig::validate`].
pub fn load_sweep_file(path: &Path) -> Result<SweepConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read sweep file: {}", path.display()))?;

    parse_sweep_file(&text).with_context(|| format!("Failed to parse sweep file: {}", path.display()))
}

/// Parse the YAML text of a sweep declaration.
pub fn parse_sweep_file(text: &str) -> Result<SweepConfig> {
    let mut targets = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let target = FileTarget::deserialize(document).context("Invalid sweep document")?;
        targets.push(target);
    }
    Ok(SweepConfig { targets })
}
