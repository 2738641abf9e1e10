//! Command descriptors and the command registry.
//!
//! A [`Command`] is built with a small builder API and handed to
//! [`Registry::register`], which validates it and indexes it by name and
//! aliases, either globally or under a class or interface namespace.
//! Commands tied to a feature gate stay invisible until the gate is enabled.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::error::CliError;
use crate::host::HostObjectModel;

use super::binder::Args;
use super::interp::Interp;
use super::token::ReturnMode;
use super::types::{self, TypeRef};
use super::value::Value;

// ── Handler plumbing ──────────────────────────────────────────────────────────

/// Value returned by a command handler, with its print annotation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reply {
    pub value: Value,
    pub mode: Option<ReturnMode>,
}

impl Reply {
    pub fn quiet(value: impl Into<Value>) -> Self {
        Reply { value: value.into(), mode: Some(ReturnMode::Quiet) }
    }

    pub fn verbose(value: impl Into<Value>) -> Self {
        Reply { value: value.into(), mode: Some(ReturnMode::Verbose) }
    }

    /// Return `value` but print `message` instead of it.
    pub fn message(value: impl Into<Value>, message: impl Into<String>) -> Self {
        Reply { value: value.into(), mode: Some(ReturnMode::Message(message.into())) }
    }

    pub fn nil() -> Self {
        Reply::quiet(Value::Nil)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply { value, mode: None }
    }
}

pub type Handler = Arc<dyn Fn(&mut Interp, &Args) -> Result<Reply, CliError> + Send + Sync>;

/// Completion override for one argument: partial text to candidates.
pub type Expander = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

// ── Arguments ─────────────────────────────────────────────────────────────────

/// Cardinality of an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spec {
    /// `1`
    One,
    /// `?`
    Optional,
    /// `*`
    Many,
    /// `+`
    OneOrMore,
}

impl Spec {
    pub fn is_optional(self) -> bool {
        matches!(self, Spec::Optional | Spec::Many)
    }

    pub fn is_variadic(self) -> bool {
        matches!(self, Spec::Many | Spec::OneOrMore)
    }

    /// Cardinality once the argument has been named explicitly.
    pub fn when_named(self) -> Spec {
        match self {
            Spec::Optional => Spec::One,
            Spec::Many => Spec::OneOrMore,
            other => other,
        }
    }
}

#[derive(Clone)]
pub struct Arg {
    pub types: Vec<TypeRef>,
    /// One name per type for polymorphic arguments.
    pub names: Vec<String>,
    pub spec: Spec,
    pub default: Value,
    pub expander: Option<Expander>,
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arg")
            .field("names", &self.names)
            .field("types", &self.types.iter().map(|t| t.desc()).collect::<Vec<_>>())
            .field("spec", &self.spec)
            .field("default", &self.default)
            .finish()
    }
}

impl Arg {
    pub fn new(ty: TypeRef, name: &str) -> Self {
        Arg { types: vec![ty], names: vec![name.to_owned()], spec: Spec::One, default: Value::Nil, expander: None }
    }

    /// Polymorphic argument; variants are tried in order.
    pub fn poly(alts: Vec<(TypeRef, &str)>) -> Self {
        let (types, names) = alts.into_iter().map(|(t, n)| (t, n.to_owned())).unzip();
        Arg { types, names, spec: Spec::One, default: Value::Nil, expander: None }
    }

    /// Boolean flag argument, `name` with its leading dash.
    pub fn flag(name: &str) -> Self {
        Arg {
            types: vec![types::flag(name)],
            names: vec![name.to_owned()],
            spec: Spec::Optional,
            default: Value::Bool(false),
            expander: None,
        }
    }

    pub fn optional(mut self, default: impl Into<Value>) -> Self {
        self.spec = Spec::Optional;
        self.default = default.into();
        self
    }

    pub fn many(mut self) -> Self {
        self.spec = Spec::Many;
        self.default = Value::List(Vec::new());
        self
    }

    pub fn one_or_more(mut self) -> Self {
        self.spec = Spec::OneOrMore;
        self
    }

    pub fn expander<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
    {
        self.expander = Some(Arc::new(f));
        self
    }

    pub fn name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or("")
    }

    pub fn is_poly(&self) -> bool {
        self.types.len() > 1
    }

    /// Every variant is a flag: never bound positionally.
    pub fn is_flag_only(&self) -> bool {
        self.types.iter().all(|t| t.flag_name().is_some())
    }

    pub fn flag_variant(&self, flag: &str) -> Option<usize> {
        self.types.iter().position(|t| t.flag_name() == Some(flag))
    }

    /// Variant declared under `name` (a plain name, never a flag).
    pub fn variant_named(&self, name: &str) -> Option<usize> {
        self.names
            .iter()
            .zip(&self.types)
            .position(|(n, t)| n == name && t.flag_name().is_none())
    }

    pub fn synopsis(&self) -> String {
        let body = if self.is_poly() {
            format!("({})", self.names.join("|"))
        } else {
            self.name().to_owned()
        };
        match self.spec {
            Spec::One => body,
            Spec::Optional => format!("[{body}]"),
            Spec::Many => format!("[{body} ...]"),
            Spec::OneOrMore => format!("{body} ..."),
        }
    }
}

// ── Command ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Namespace {
    Global,
    Class(String),
    Iface(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateKind {
    TechPreview,
    Unsupported,
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateKind::TechPreview => write!(f, "tech-preview"),
            GateKind::Unsupported => write!(f, "unsupported feature"),
        }
    }
}

/// Categories every registry knows about; hosts may add more.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "CLI",
    "Configuration",
    "Debugging",
    "Help",
    "Inspection",
    "Memory",
    "Processors",
    "Registers",
    "Files",
    "Execution",
    "Matching",
];

/// Names no command may take: language keywords and built-in object aliases.
pub const RESERVED_NAMES: &[&str] = &[
    "if", "else", "while", "foreach", "in", "try", "except", "script-branch", "local", "break", "continue", "TRUE",
    "FALSE", "NIL", "sim", "conf",
];

pub struct Command {
    pub name: String,
    pub handler: Handler,
    pub repeat: Option<Handler>,
    pub args: Vec<Arg>,
    pub aliases: Vec<String>,
    pub class: Option<String>,
    pub iface: Option<String>,
    pub pri: i32,
    pub infix: bool,
    pub short: String,
    pub doc: String,
    pub see_also: Vec<String>,
    pub categories: Vec<String>,
    pub hidden: bool,
    /// Replacement command for a deprecated one.
    pub deprecated: Option<String>,
    /// Replacement command for a legacy one.
    pub legacy: Option<String>,
    pub gate: Option<(GateKind, String)>,
    pub doc_with: Option<String>,
    pub check_args: bool,
    warned: AtomicBool,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.display_name())
            .field("args", &self.args)
            .field("pri", &self.pri)
            .field("infix", &self.infix)
            .finish_non_exhaustive()
    }
}

impl Command {
    pub fn new<F>(name: &str, handler: F) -> Self
    where
        F: Fn(&mut Interp, &Args) -> Result<Reply, CliError> + Send + Sync + 'static,
    {
        Command {
            name: name.to_owned(),
            handler: Arc::new(handler),
            repeat: None,
            args: Vec::new(),
            aliases: Vec::new(),
            class: None,
            iface: None,
            pri: 0,
            infix: false,
            short: String::new(),
            doc: String::new(),
            see_also: Vec::new(),
            categories: Vec::new(),
            hidden: false,
            deprecated: None,
            legacy: None,
            gate: None,
            doc_with: None,
            check_args: true,
            warned: AtomicBool::new(false),
        }
    }

    pub fn arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_owned());
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.class = Some(class.to_owned());
        self
    }

    pub fn iface(mut self, iface: &str) -> Self {
        self.iface = Some(iface.to_owned());
        self
    }

    pub fn pri(mut self, pri: i32) -> Self {
        self.pri = pri;
        self
    }

    /// Make this an infix operator at priority `pri`.
    pub fn infix(mut self, pri: i32) -> Self {
        self.infix = true;
        self.pri = pri;
        self
    }

    pub fn short(mut self, text: &str) -> Self {
        self.short = text.to_owned();
        self
    }

    pub fn doc(mut self, text: &str) -> Self {
        self.doc = text.to_owned();
        self
    }

    pub fn see_also(mut self, name: &str) -> Self {
        self.see_also.push(name.to_owned());
        self
    }

    pub fn category(mut self, cat: &str) -> Self {
        self.categories.push(cat.to_owned());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn deprecated(mut self, replacement: &str) -> Self {
        self.deprecated = Some(replacement.to_owned());
        self
    }

    pub fn legacy(mut self, replacement: &str) -> Self {
        self.legacy = Some(replacement.to_owned());
        self
    }

    pub fn tech_preview(mut self, gate: &str) -> Self {
        self.gate = Some((GateKind::TechPreview, gate.to_owned()));
        self
    }

    pub fn unsupported(mut self, gate: &str) -> Self {
        self.gate = Some((GateKind::Unsupported, gate.to_owned()));
        self
    }

    pub fn doc_with(mut self, name: &str) -> Self {
        self.doc_with = Some(name.to_owned());
        self
    }

    /// Leave surplus tokens unbound instead of failing.
    pub fn no_arg_check(mut self) -> Self {
        self.check_args = false;
        self
    }

    /// Handler used instead of the normal one when the same line is repeated interactively.
    pub fn repeat<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Interp, &Args) -> Result<Reply, CliError> + Send + Sync + 'static,
    {
        self.repeat = Some(Arc::new(handler));
        self
    }

    pub fn namespace(&self) -> Namespace {
        match (&self.class, &self.iface) {
            (Some(c), _) => Namespace::Class(c.clone()),
            (None, Some(i)) => Namespace::Iface(i.clone()),
            (None, None) => Namespace::Global,
        }
    }

    /// Namespace-qualified name: `<class>.name` or plain `name`.
    pub fn display_name(&self) -> String {
        match self.namespace() {
            Namespace::Global => self.name.clone(),
            Namespace::Class(ns) | Namespace::Iface(ns) => format!("<{ns}>.{}", self.name),
        }
    }

    /// Symbol-only names (`+`, `->`) sort after alphabetic ones.
    pub fn is_symbolic(&self) -> bool {
        !self.name.starts_with(|c: char| c.is_alphanumeric() || c == '_')
    }

    fn sort_key(&self) -> (bool, String) {
        (self.is_symbolic(), self.display_name())
    }

    pub fn synopsis(&self) -> String {
        let mut parts = vec![self.display_name()];
        parts.extend(self.args.iter().map(Arg::synopsis));
        parts.join(" ")
    }

    /// One-time deprecation/legacy notice; `None` after the first call.
    pub fn take_warning(&self) -> Option<String> {
        let text = match (&self.deprecated, &self.legacy) {
            (Some(r), _) => format!("'{}' is deprecated, use '{r}' instead", self.display_name()),
            (None, Some(r)) => format!("'{}' is a legacy command, use '{r}' instead", self.display_name()),
            (None, None) => return None,
        };
        if self.warned.swap(true, AtomicOrdering::Relaxed) {
            None
        } else {
            Some(text)
        }
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.display_name() == other.display_name()
    }
}

impl Eq for Command {}

impl PartialOrd for Command {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Command {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// What happens when a name is registered twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Redefine {
    #[default]
    Strict,
    /// Replace the old command and log a warning.
    Permissive,
}

fn name_pattern() -> Result<&'static Regex, CliError> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(?:[A-Za-z_][A-Za-z0-9_-]*|[[:punct:]]+)$"))
        .as_ref()
        .map_err(|e| CliError::Value(format!("command name pattern: {e}")))
}

pub struct Registry {
    commands: Vec<Arc<Command>>,
    /// Name or alias to command, per namespace.
    index: HashMap<Namespace, HashMap<String, Arc<Command>>>,
    gates: HashMap<(GateKind, String), bool>,
    categories: BTreeSet<String>,
    pub redefine: Redefine,
}

impl Default for Registry {
    fn default() -> Self {
        Registry {
            commands: Vec::new(),
            index: HashMap::new(),
            gates: HashMap::new(),
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            redefine: Redefine::Strict,
        }
    }
}

impl Registry {
    pub fn new(redefine: Redefine) -> Self {
        Registry { redefine, ..Registry::default() }
    }

    pub fn add_category(&mut self, name: &str) {
        self.categories.insert(name.to_owned());
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(String::as_str)
    }

    // ── Gates ─────────────────────────────────────────────────────────────────

    pub fn declare_gate(&mut self, kind: GateKind, name: &str) {
        self.gates.entry((kind, name.to_owned())).or_insert(false);
    }

    pub fn set_gate(&mut self, kind: GateKind, name: &str, enabled: bool) -> Result<(), CliError> {
        match self.gates.get_mut(&(kind, name.to_owned())) {
            Some(state) => {
                *state = enabled;
                log::debug!("{kind} '{name}' {}", if enabled { "enabled" } else { "disabled" });
                Ok(())
            }
            None => Err(CliError::Argument(format!("no {kind} named '{name}'"))),
        }
    }

    pub fn gate_enabled(&self, kind: GateKind, name: &str) -> bool {
        self.gates.get(&(kind, name.to_owned())).copied().unwrap_or(false)
    }

    /// Declared gates of `kind`, sorted.
    pub fn gates(&self, kind: GateKind) -> Vec<String> {
        let mut out: Vec<String> = self.gates.keys().filter(|(k, _)| *k == kind).map(|(_, n)| n.clone()).collect();
        out.sort();
        out
    }

    fn visible(&self, cmd: &Command) -> bool {
        match &cmd.gate {
            Some((kind, name)) => self.gate_enabled(*kind, name),
            None => true,
        }
    }

    // ── Registration ──────────────────────────────────────────────────────────

    pub fn register(&mut self, cmd: Command) -> Result<(), CliError> {
        self.validate(&cmd)?;
        let ns = cmd.namespace();
        let names: Vec<String> = std::iter::once(cmd.name.clone()).chain(cmd.aliases.iter().cloned()).collect();
        let existing: Vec<Arc<Command>> = {
            let table = self.index.get(&ns);
            let mut seen: Vec<Arc<Command>> = Vec::new();
            for n in &names {
                if let Some(old) = table.and_then(|t| t.get(n)) {
                    if !seen.iter().any(|s| Arc::ptr_eq(s, old)) {
                        seen.push(old.clone());
                    }
                }
            }
            seen
        };
        if let Some(old) = existing.first() {
            match self.redefine {
                Redefine::Strict => {
                    return Err(CliError::Ambiguous(format!(
                        "command '{}' conflicts with existing command '{}'",
                        cmd.display_name(),
                        old.display_name()
                    )));
                }
                Redefine::Permissive => {
                    for old in &existing {
                        log::warn!("redefining command '{}'", old.display_name());
                        self.remove(old);
                    }
                }
            }
        }
        let cmd = Arc::new(cmd);
        let table = self.index.entry(ns).or_default();
        for n in names {
            table.insert(n, cmd.clone());
        }
        log::debug!("registered command '{}'", cmd.display_name());
        self.commands.push(cmd);
        Ok(())
    }

    fn remove(&mut self, old: &Arc<Command>) {
        self.commands.retain(|c| !Arc::ptr_eq(c, old));
        if let Some(table) = self.index.get_mut(&old.namespace()) {
            table.retain(|_, c| !Arc::ptr_eq(c, old));
        }
    }

    fn validate(&self, cmd: &Command) -> Result<(), CliError> {
        let pattern = name_pattern()?;
        let bad = |what: String| Err(CliError::Argument(what));
        for n in std::iter::once(&cmd.name).chain(&cmd.aliases) {
            if !pattern.is_match(n) {
                return bad(format!("invalid command name '{n}'"));
            }
            if cmd.namespace() == Namespace::Global && RESERVED_NAMES.contains(&n.as_str()) {
                return bad(format!("'{n}' is a reserved name"));
            }
        }
        if let (Some(c), Some(i)) = (&cmd.class, &cmd.iface) {
            if c != i {
                return bad(format!("command '{}' cannot belong to both a class and an interface", cmd.name));
            }
        }
        let mut seen = HashSet::new();
        for arg in &cmd.args {
            if arg.names.len() != arg.types.len() {
                return bad(format!("command '{}': argument needs one name per type", cmd.name));
            }
            for n in &arg.names {
                if !seen.insert(n.clone()) {
                    return bad(format!("command '{}': duplicate argument name '{n}'", cmd.name));
                }
            }
            if arg.is_flag_only() && arg.spec != Spec::Optional {
                return bad(format!("command '{}': flag '{}' must be optional", cmd.name, arg.name()));
            }
        }
        if cmd.infix && cmd.args.is_empty() {
            return bad(format!("infix command '{}' needs an argument", cmd.name));
        }
        if let Some(target) = &cmd.doc_with {
            if !self.commands.iter().any(|c| c.name == *target || c.display_name() == *target) {
                return bad(format!("doc-with target '{target}' is not registered"));
            }
        }
        if let Some((kind, name)) = &cmd.gate {
            if !self.gates.contains_key(&(*kind, name.clone())) {
                return bad(format!("{kind} '{name}' has not been declared"));
            }
        }
        if let Some(cat) = cmd.categories.iter().find(|c| !self.categories.contains(*c)) {
            return bad(format!("unknown command category '{cat}'"));
        }
        Ok(())
    }

    // ── Lookup ────────────────────────────────────────────────────────────────

    /// Visible global command by name or alias.
    pub fn lookup(&self, name: &str) -> Option<Arc<Command>> {
        self.lookup_in(&Namespace::Global, name)
    }

    pub fn lookup_in(&self, ns: &Namespace, name: &str) -> Option<Arc<Command>> {
        self.index.get(ns)?.get(name).filter(|c| self.visible(c)).cloned()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Every visible command, sorted.
    pub fn all(&self) -> Vec<Arc<Command>> {
        let mut out: Vec<Arc<Command>> = self.commands.iter().filter(|c| self.visible(c)).cloned().collect();
        out.sort();
        out
    }

    /// Visible global symbol-only names, used to split punctuation runs.
    pub fn symbols(&self) -> HashSet<String> {
        self.index
            .get(&Namespace::Global)
            .map(|t| {
                t.iter()
                    .filter(|(n, c)| !n.starts_with(|ch: char| ch.is_alphanumeric() || ch == '_') && self.visible(c))
                    .map(|(n, _)| n.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Commands of `class` and its superclasses, nearest class first.
    pub fn commands_for_class(&self, class: &str, host: &dyn HostObjectModel) -> Vec<Arc<Command>> {
        let mut out: Vec<Arc<Command>> = Vec::new();
        for c in host.class_chain(class) {
            let mut here = self.namespace_commands(&Namespace::Class(c));
            here.retain(|cmd| !out.iter().any(|o| o.name == cmd.name));
            out.extend(here);
        }
        out
    }

    pub fn commands_for_interface(&self, iface: &str) -> Vec<Arc<Command>> {
        self.namespace_commands(&Namespace::Iface(iface.to_owned()))
    }

    fn namespace_commands(&self, ns: &Namespace) -> Vec<Arc<Command>> {
        let mut out: Vec<Arc<Command>> =
            self.commands.iter().filter(|c| c.namespace() == *ns && self.visible(c)).cloned().collect();
        out.sort();
        out
    }

    /// All commands available on an object of `class`: class commands
    /// (including superclasses), then commands of every implemented interface.
    pub fn object_commands(&self, class: &str, host: &dyn HostObjectModel) -> Vec<Arc<Command>> {
        let mut out = self.commands_for_class(class, host);
        for iface in host.all_interfaces(class) {
            for cmd in self.commands_for_interface(&iface) {
                if !out.iter().any(|o| o.name == cmd.name) {
                    out.push(cmd);
                }
            }
        }
        out
    }

    /// Resolve `method` on an object of `class`, class namespaces first.
    pub fn resolve_method(&self, class: &str, method: &str, host: &dyn HostObjectModel) -> Option<Arc<Command>> {
        for c in host.class_chain(class) {
            if let Some(cmd) = self.lookup_in(&Namespace::Class(c), method) {
                return Some(cmd);
            }
        }
        host.all_interfaces(class)
            .into_iter()
            .find_map(|i| self.lookup_in(&Namespace::Iface(i), method))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
