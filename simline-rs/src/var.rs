//! Variable scopes and execution contexts.
//!
//! A [`Scope`] is one link in a chain of variable tables: a lookup walks
//! outwards to the global scope, an assignment writes to the nearest scope
//! that already holds the name (or the global one), and `local` always writes
//! to the innermost scope.  Scopes are shared between the main evaluator and
//! script branches, so each table sits behind a mutex.
//!
//! [`CmdInfo`] frames form the call stack used for error locations and
//! tracebacks.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{CliError, Location};
use crate::script::value::Value;

// ── Scope ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Scope {
    vars: Mutex<HashMap<String, Value>>,
    parent: Option<Arc<Scope>>,
}

/// Reject names the host reserves for itself.
pub fn check_name(name: &str) -> Result<(), CliError> {
    if name.starts_with("__") {
        return Err(CliError::Value(format!("variable names starting with '__' are reserved: {name}")));
    }
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CliError::Value(format!("invalid variable name '{name}'")));
    }
    Ok(())
}

impl Scope {
    pub fn root() -> Arc<Scope> {
        Arc::new(Scope::default())
    }

    pub fn child(parent: &Arc<Scope>) -> Arc<Scope> {
        Arc::new(Scope { vars: Mutex::default(), parent: Some(parent.clone()) })
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.vars.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn chain(&self) -> impl Iterator<Item = &Scope> {
        std::iter::successors(Some(self), |s| s.parent.as_deref())
    }

    /// Look a variable up, innermost scope first.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.chain().find_map(|s| s.table().get(name).cloned())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.chain().any(|s| s.table().contains_key(name))
    }

    /// Assign to the nearest scope holding `name`, else the global scope.
    pub fn set(&self, name: &str, value: Value) {
        let target = self
            .chain()
            .find(|s| s.table().contains_key(name))
            .or_else(|| self.chain().last())
            .unwrap_or(self);
        target.table().insert(name.to_owned(), value);
    }

    /// Assign in this scope only.
    pub fn set_local(&self, name: &str, value: Value) {
        self.table().insert(name.to_owned(), value);
    }

    /// Remove from the nearest scope holding `name`.  Returns `true` if it existed.
    pub fn remove(&self, name: &str) -> bool {
        self.chain().any(|s| s.table().remove(name).is_some())
    }

    /// Every visible variable, inner definitions shadowing outer ones.
    pub fn visible(&self) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        for s in self.chain() {
            for (k, v) in s.table().iter() {
                out.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        out
    }
}

// ── CmdInfo ───────────────────────────────────────────────────────────────────

/// One frame of the command call stack.
#[derive(Debug, Clone, Default)]
pub struct CmdInfo {
    pub file: Option<Arc<str>>,
    pub line: u32,
    /// Command executing in this frame.
    pub command: Option<String>,
    /// Running on the main evaluator rather than inside a script branch.
    pub sync: bool,
    /// Tracebacks stop at this frame.
    pub boundary: bool,
    pub parent: Option<Arc<CmdInfo>>,
}

impl CmdInfo {
    pub fn root() -> Arc<CmdInfo> {
        Arc::new(CmdInfo { sync: true, boundary: true, ..CmdInfo::default() })
    }

    pub fn push(parent: &Arc<CmdInfo>, file: Option<Arc<str>>, line: u32, command: Option<String>) -> Arc<CmdInfo> {
        Arc::new(CmdInfo { file, line, command, sync: parent.sync, boundary: false, parent: Some(parent.clone()) })
    }

    pub fn location(&self) -> Location {
        Location { file: self.file.as_deref().map(str::to_owned), line: self.line }
    }

    /// Frames from this one outwards, stopping after the first boundary.
    pub fn frames(&self) -> Vec<&CmdInfo> {
        let mut out = Vec::new();
        let mut cur = Some(self);
        while let Some(frame) = cur {
            out.push(frame);
            if frame.boundary {
                break;
            }
            cur = frame.parent.as_deref();
        }
        out
    }

    /// Traceback lines, outermost first, at most `depth` of them.
    pub fn traceback(&self, depth: usize) -> Vec<String> {
        let mut lines: Vec<String> = self
            .frames()
            .into_iter()
            .filter_map(|f| {
                let cmd = f.command.as_deref()?;
                Some(format!("  in '{cmd}' at {}", f.location()))
            })
            .take(depth)
            .collect();
        lines.reverse();
        lines
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
