//! `simline.conf` settings file parser.
//!
//! One `name = value` setting per line:
//!
//! | Setting | Value |
//! |---------|-------|
//! | `interactive` | boolean: print results and loop values |
//! | `redefine` | `strict` or `permissive` command redefinition |
//! | `strip-markup` | boolean: drop `<b>`-style tags from reported messages |
//! | `traceback-depth` | frames shown for internal errors |
//! | `prompt` | REPL prompt text |
//! | `tech-preview` | comma-separated gates enabled at startup |
//! | `unsupported` | comma-separated gates enabled at startup |
//! | `startup` | script file run at startup; may repeat |
//!
//! Lines starting with `#` are comments.  Unknown settings and bad values
//! are reported but never stop the rest of the file from loading.

use std::path::{Path, PathBuf};

use crate::script::registry::Redefine;

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub interactive: bool,
    pub redefine: Redefine,
    pub strip_markup: bool,
    pub traceback_depth: usize,
    pub prompt: String,
    pub tech_preview: Vec<String>,
    pub unsupported: Vec<String>,
    pub startup: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            interactive: false,
            redefine: Redefine::Strict,
            strip_markup: true,
            traceback_depth: 8,
            prompt: "simline> ".to_owned(),
            tech_preview: Vec::new(),
            unsupported: Vec::new(),
            startup: Vec::new(),
        }
    }
}

impl Settings {
    /// Parse settings text.  Returns the settings and any per-line errors.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut settings = Settings::default();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((name, value)) = line.split_once('=') else {
                errors.push(ConfigError { line: lineno, message: format!("expected 'name = value', got '{line}'") });
                continue;
            };
            if let Err(message) = settings.apply(name.trim(), unquote(value.trim())) {
                errors.push(ConfigError { line: lineno, message });
            }
        }

        (settings, errors)
    }

    /// Read and parse a settings file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    fn apply(&mut self, name: &str, value: &str) -> Result<(), String> {
        match name.replace('_', "-").as_str() {
            "interactive" => self.interactive = parse_bool(name, value)?,
            "strip-markup" => self.strip_markup = parse_bool(name, value)?,
            "redefine" => {
                self.redefine = match value {
                    "strict" => Redefine::Strict,
                    "permissive" => Redefine::Permissive,
                    other => return Err(format!("redefine: expected 'strict' or 'permissive', got '{other}'")),
                }
            }
            "traceback-depth" => {
                self.traceback_depth =
                    value.parse().map_err(|_| format!("traceback-depth: invalid number '{value}'"))?;
            }
            "prompt" => self.prompt = value.to_owned(),
            "tech-preview" => self.tech_preview.extend(split_list(value)),
            "unsupported" => self.unsupported.extend(split_list(value)),
            "startup" => self.startup.push(PathBuf::from(value)),
            _ => return Err(format!("unknown setting '{name}'")),
        }
        Ok(())
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn parse_bool(name: &str, value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(format!("{name}: expected a boolean, got '{value}'")),
    }
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
