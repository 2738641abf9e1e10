//! The interpreter handle.
//!
//! An [`Interp`] owns the per-thread evaluation state (current variable
//! scope, `CmdInfo` call stack, object namespace) and shares everything else
//! (registry, host, settings, output, branch scheduler) with the interpreters
//! running script branches.  Each script branch gets its own `Interp`, so
//! the "current scope" handoff between threads is just ownership.
//!
//! Statement reduction lives in `eval.rs`; tab completion in `complete.rs`.

use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::branch::{BranchInfo, BranchLink, Scheduler, Wait};
use crate::config::Settings;
use crate::error::{CliError, Location};
use crate::host::{strip_markup, HostObject, HostObjectModel, Output};
use crate::var::{check_name, CmdInfo, Scope};

use super::binder::{bind_call, Args, Bound};
use super::builtins;
use super::lexer::tokenize;
use super::registry::{Command, GateKind, Registry};
use super::token::{statements, ReturnMode, Token};
use super::types::TypeCtx;
use super::value::Value;

// ── Shared state ──────────────────────────────────────────────────────────────

struct Sink {
    out: Box<dyn Output>,
    /// Active `run_capture` buffers, innermost last.
    captures: Vec<String>,
}

/// State shared by the main interpreter and every script branch.
struct Shared {
    registry: RwLock<Registry>,
    host: Arc<dyn HostObjectModel>,
    settings: RwLock<Settings>,
    aliases: RwLock<Arc<HashMap<String, String>>>,
    output: Mutex<Sink>,
    scheduler: Scheduler,
}

/// Outcome of [`Interp::report`], for front ends that must not fail.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub ok: bool,
    /// `false` for a quiet interruption.
    pub is_error: bool,
    pub message: String,
    pub value: Value,
}

// ── Interp ────────────────────────────────────────────────────────────────────

pub struct Interp {
    shared: Arc<Shared>,
    pub(crate) scope: Arc<Scope>,
    pub(crate) cmdinfo: Arc<CmdInfo>,
    branch: Option<BranchLink>,
    namespace: Option<String>,
    last_error: Option<String>,
    /// Running a line typed by the user: loop values are printed.
    pub(crate) interactive: bool,
    /// Head command word of a line that repeats the previous one.
    pub(crate) repeating: Option<String>,
    last_line: Option<String>,
    pub(crate) file: Option<Arc<str>>,
    pub(crate) line: u32,
    root: bool,
}

impl Interp {
    /// Create an interpreter with the core commands registered.
    pub fn new(host: Arc<dyn HostObjectModel>, settings: Settings, output: Box<dyn Output>) -> Result<Self, CliError> {
        let mut registry = Registry::new(settings.redefine);
        builtins::register_all(&mut registry)?;
        let shared = Shared {
            registry: RwLock::new(registry),
            host,
            settings: RwLock::new(settings),
            aliases: RwLock::default(),
            output: Mutex::new(Sink { out: output, captures: Vec::new() }),
            scheduler: Scheduler::new(),
        };
        Ok(Interp {
            shared: Arc::new(shared),
            scope: Scope::root(),
            cmdinfo: CmdInfo::root(),
            branch: None,
            namespace: None,
            last_error: None,
            interactive: false,
            repeating: None,
            last_line: None,
            file: None,
            line: 0,
            root: true,
        })
    }

    // ── Shared state access ───────────────────────────────────────────────────

    pub fn registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.shared.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn registry_mut(&self) -> RwLockWriteGuard<'_, Registry> {
        self.shared.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, cmd: Command) -> Result<(), CliError> {
        self.registry_mut().register(cmd)
    }

    pub fn host(&self) -> &Arc<dyn HostObjectModel> {
        &self.shared.host
    }

    pub fn settings(&self) -> RwLockReadGuard<'_, Settings> {
        self.shared.settings.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn settings_mut(&self) -> RwLockWriteGuard<'_, Settings> {
        self.shared.settings.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enable the feature gates named in the settings.  Call after the host
    /// has declared its gates; returns one error per unknown gate.
    pub fn enable_configured_gates(&self) -> Vec<CliError> {
        let (tech, unsupported) = {
            let s = self.settings();
            (s.tech_preview.clone(), s.unsupported.clone())
        };
        let mut reg = self.registry_mut();
        let wanted = tech.iter().map(|g| (GateKind::TechPreview, g)).chain(unsupported.iter().map(|g| (GateKind::Unsupported, g)));
        wanted.filter_map(|(kind, gate)| reg.set_gate(kind, gate, true).err()).collect()
    }

    pub(crate) fn symbols(&self) -> std::collections::HashSet<String> {
        self.registry().symbols()
    }

    pub(crate) fn tokenize(&self, text: &str) -> Result<Vec<Token>, CliError> {
        tokenize(text, &self.symbols())
    }

    // ── Output ────────────────────────────────────────────────────────────────

    fn sink(&self) -> MutexGuard<'_, Sink> {
        self.shared.output.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Print one line through the output sink, or into the innermost capture.
    pub fn print(&self, text: &str) {
        let mut sink = self.sink();
        match sink.captures.last_mut() {
            Some(buf) => {
                buf.push_str(text);
                buf.push('\n');
            }
            None => sink.out.print(text),
        }
    }

    /// Print a statement result according to its return annotation.
    pub(crate) fn print_result(&self, tok: &Token) {
        match &tok.ret {
            Some(ReturnMode::Quiet) => {}
            Some(ReturnMode::Message(m)) => self.print(m),
            _ => match tok.as_value() {
                None | Some(Value::Nil) => {}
                Some(v) => self.print(&v.to_string()),
            },
        }
    }

    fn report_error(&self, e: &CliError) {
        if e.is_quiet() {
            return;
        }
        self.print(&e.to_string());
        for frame in e.traceback() {
            self.print(frame);
        }
    }

    // ── Entry points ──────────────────────────────────────────────────────────

    /// Location of the statement being evaluated.
    pub(crate) fn location(&self) -> Location {
        Location { file: self.file.as_deref().map(str::to_owned), line: self.line }
    }

    /// Evaluate top-level statements; `print` echoes each result.
    pub(crate) fn eval_top(&mut self, tokens: Vec<Token>, print: bool) -> Result<Token, CliError> {
        let mut last = Token::nil(self.line);
        for stmt in statements(tokens) {
            let tok = self.eval_statement(stmt).map_err(|u| u.into_error().at(self.location()))?;
            if print {
                self.print_result(&tok);
            }
            last = tok;
        }
        Ok(last)
    }

    /// Run `text` to completion and return its value.
    pub fn run(&mut self, text: &str) -> Result<Value, CliError> {
        let tokens = self.tokenize(text)?;
        let tok = self.eval_top(tokens, false)?;
        Ok(tok.as_value().unwrap_or_default())
    }

    /// Run `text` and collect everything it prints.
    pub fn run_capture(&mut self, text: &str) -> Result<(Value, String), CliError> {
        self.sink().captures.push(String::new());
        let result = self.run(text);
        let captured = self.sink().captures.pop().unwrap_or_default();
        result.map(|v| (v, captured))
    }

    /// Run `text`, never failing.
    pub fn report(&mut self, text: &str) -> Report {
        match self.run(text) {
            Ok(value) => Report { ok: true, is_error: false, message: String::new(), value },
            Err(e) => {
                let mut message = e.to_string();
                if self.settings().strip_markup {
                    message = strip_markup(&message);
                }
                Report { ok: false, is_error: !e.is_quiet(), message, value: Value::Nil }
            }
        }
    }

    /// Run a line typed by the user, printing results and errors.  Returns
    /// `false` if the line failed.
    pub fn run_interactive(&mut self, line: &str) -> bool {
        let repeated = !line.trim().is_empty() && self.last_line.as_deref() == Some(line);
        self.last_line = Some(line.to_owned());
        let was = std::mem::replace(&mut self.interactive, true);
        let result = self.tokenize(line).and_then(|t| {
            if repeated {
                self.repeating = t.first().and_then(Token::as_word).map(str::to_owned);
            }
            self.eval_top(t, true)
        });
        self.interactive = was;
        self.repeating = None;
        match result {
            Ok(_) => true,
            Err(e) => {
                self.report_error(&e);
                false
            }
        }
    }

    /// Run a script file in a new variable scope and `CmdInfo` frame.
    pub fn run_file(&mut self, path: &Path) -> Result<Value, CliError> {
        let name = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|e| CliError::Io(format!("{name}: {e}")))?;
        let file: Arc<str> = Arc::from(name.as_str());
        let tokens = self
            .tokenize(&text)
            .map_err(|e| e.at(Location { file: Some(name.clone()), line: 0 }))?;
        log::debug!("running script {name}");
        let child = Scope::child(&self.scope);
        let saved_scope = std::mem::replace(&mut self.scope, child);
        let frame = CmdInfo::push(&self.cmdinfo, Some(file.clone()), 0, Some(format!("run-script {name}")));
        let saved_info = std::mem::replace(&mut self.cmdinfo, frame);
        let saved_file = self.file.replace(file);
        let saved_line = self.line;
        let saved_interactive = std::mem::replace(&mut self.interactive, false);
        let result = self.eval_top(tokens, false);
        self.scope = saved_scope;
        self.cmdinfo = saved_info;
        self.file = saved_file;
        self.line = saved_line;
        self.interactive = saved_interactive;
        result.map(|t| t.as_value().unwrap_or_default())
    }

    /// Call a command programmatically with positional and keyword values.
    /// `name` may be `object.method`.
    pub fn call(&mut self, name: &str, positional: &[Value], keywords: &[(String, Value)]) -> Result<Value, CliError> {
        let (cmd, object) = self.resolve_callable(name)?;
        let mut ctx = self.type_ctx();
        let bound = bind_call(&cmd, positional, keywords, &mut ctx)?;
        self.flush_notices(ctx);
        let tok = self.invoke(&cmd, bound, object)?;
        Ok(tok.as_value().unwrap_or_default())
    }

    fn resolve_callable(&self, name: &str) -> Result<(Arc<Command>, Option<Value>), CliError> {
        if let Some(cmd) = self.registry().lookup(name) {
            return Ok((cmd, None));
        }
        self.resolve_method(name)
            .map(|(cmd, obj)| (cmd, Some(Value::Object(obj.name))))
            .ok_or_else(|| CliError::UnknownCommand(name.to_owned()))
    }

    /// `obj.method`: a namespace command on the object named before the last dot.
    pub(crate) fn resolve_method(&self, name: &str) -> Option<(Arc<Command>, HostObject)> {
        let (obj, method) = name.rsplit_once('.')?;
        let obj = self.resolve_object(obj)?;
        let cmd = self.registry().resolve_method(&obj.class, method, self.host().as_ref())?;
        Some((cmd, obj))
    }

    // ── Invocation ────────────────────────────────────────────────────────────

    pub(crate) fn type_ctx(&self) -> TypeCtx {
        let mut ctx = TypeCtx::new(self.shared.host.clone());
        ctx.namespace = self.namespace.clone();
        ctx.aliases = self.shared.aliases.read().unwrap_or_else(PoisonError::into_inner).clone();
        ctx
    }

    pub(crate) fn flush_notices(&self, ctx: TypeCtx) {
        for notice in ctx.notices {
            self.print(&format!("Warning: {notice}"));
        }
    }

    /// Run `cmd`'s handler with bound arguments.
    pub(crate) fn invoke(&mut self, cmd: &Arc<Command>, bound: Vec<Bound>, object: Option<Value>) -> Result<Token, CliError> {
        let repeating = self.repeating.as_deref().is_some_and(|head| invoked_as(cmd, head));
        if repeating {
            self.repeating = None;
        } else {
            if let Some(warning) = cmd.take_warning() {
                log::warn!("{warning}");
                self.print(&format!("Warning: {warning}"));
            }
        }
        let handler = match (&cmd.repeat, repeating) {
            (Some(repeat), true) => repeat.clone(),
            _ => cmd.handler.clone(),
        };
        let args = Args::new(cmd, bound, object);
        let line = self.line;
        let frame = CmdInfo::push(&self.cmdinfo, self.file.clone(), line, Some(cmd.display_name()));
        let saved = std::mem::replace(&mut self.cmdinfo, frame.clone());
        log::debug!("invoking '{}'", cmd.display_name());
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(self, &args)));
        self.cmdinfo = saved;
        self.line = line;
        let depth = self.settings().traceback_depth;
        let loc = self.location();
        match outcome {
            Ok(Ok(reply)) => Ok(Token::from_value(reply.value, line).with_ret(reply.mode)),
            Ok(Err(CliError::Runtime { message, traceback })) if traceback.is_empty() => {
                Err(CliError::Runtime { message, traceback: frame.traceback(depth) }.at(loc))
            }
            Ok(Err(e)) => Err(e.at(loc)),
            Err(payload) => {
                let what = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_owned());
                log::error!("command '{}' panicked: {what}", cmd.display_name());
                let message = format!("internal error in '{}': {what}", cmd.display_name());
                Err(CliError::Runtime { message, traceback: frame.traceback(depth) }.at(loc))
            }
        }
    }

    // ── Variables ─────────────────────────────────────────────────────────────

    pub fn get_var(&self, name: &str) -> Option<Value> {
        self.scope.get(name)
    }

    pub fn set_var(&self, name: &str, value: Value) -> Result<(), CliError> {
        check_name(name)?;
        self.scope.set(name, value);
        Ok(())
    }

    /// Remove a variable; `Ok(false)` if it was not defined.
    pub fn remove_var(&self, name: &str) -> Result<bool, CliError> {
        check_name(name)?;
        Ok(self.scope.remove(name))
    }

    pub fn variables(&self) -> BTreeMap<String, Value> {
        self.scope.visible()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn set_last_error(&mut self, message: String) {
        self.last_error = Some(message);
    }

    // ── Objects and namespaces ────────────────────────────────────────────────

    /// Resolve an object name: absolute, relative to the current namespace,
    /// then object alias.
    pub fn resolve_object(&self, name: &str) -> Option<HostObject> {
        self.type_ctx().resolve_object(name)
    }

    pub fn set_object_alias(&self, alias: &str, object: &str) -> Result<(), CliError> {
        if self.shared.host.lookup(object).is_none() {
            return Err(CliError::Argument(format!("no object named '{object}'")));
        }
        let mut aliases = self.shared.aliases.write().unwrap_or_else(PoisonError::into_inner);
        Arc::make_mut(&mut aliases).insert(alias.to_owned(), object.to_owned());
        Ok(())
    }

    pub fn current_namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn set_current_namespace(&mut self, namespace: Option<String>) {
        self.namespace = namespace;
    }

    // ── Script branches ───────────────────────────────────────────────────────

    /// Start a script branch running `body`.  It runs until it first
    /// suspends or finishes before this returns.
    pub fn spawn_branch(&mut self, body: Vec<Token>, desc: &str) -> Result<u64, CliError> {
        let shared = self.shared.clone();
        let scope = Scope::child(&self.scope);
        let cmdinfo = Arc::new(CmdInfo {
            file: self.file.clone(),
            line: self.line,
            command: Some("script-branch".to_owned()),
            sync: false,
            boundary: true,
            parent: Some(self.cmdinfo.clone()),
        });
        let namespace = self.namespace.clone();
        let file = self.file.clone();
        let line = self.line;
        self.shared.scheduler.spawn(desc.to_owned(), move |link| {
            let id = link.id();
            let mut interp = Interp {
                shared,
                scope,
                cmdinfo,
                branch: Some(link),
                namespace,
                last_error: None,
                interactive: false,
                repeating: None,
                last_line: None,
                file,
                line,
                root: false,
            };
            match interp.eval_top(body, false) {
                Ok(_) => {}
                Err(e) if e.is_quiet() => log::debug!("script branch {id} interrupted"),
                Err(e) => {
                    log::debug!("script branch {id} failed: {e}");
                    interp.print(&format!("Error in script branch {id}: {e}"));
                }
            }
        })
    }

    /// Suspend the current script branch until `wait` is satisfied.
    pub fn suspend(&mut self, wait: Wait) -> Result<Value, CliError> {
        let link = self
            .branch
            .as_mut()
            .ok_or_else(|| CliError::Usage("wait-for commands can only be used in script branches".to_owned()))?;
        link.suspend(&self.shared.scheduler, wait)
    }

    pub fn in_branch(&self) -> Option<u64> {
        self.branch.as_ref().map(BranchLink::id)
    }

    pub fn interrupt_branch(&self, id: u64) -> Result<(), CliError> {
        self.shared.scheduler.interrupt(id)
    }

    pub fn resume_branch(&self, id: u64, value: Value) -> Result<(), CliError> {
        self.shared.scheduler.wake(id, value)
    }

    /// Advance simulated time; returns the number of branches woken.
    pub fn advance_time(&self, seconds: f64) -> usize {
        self.shared.scheduler.advance_time(seconds)
    }

    /// Simulated time in seconds.
    pub fn now(&self) -> f64 {
        self.shared.scheduler.now()
    }

    /// Wake branches waiting for `signal`; returns how many.
    pub fn notify(&self, signal: &str) -> usize {
        self.shared.scheduler.notify(signal)
    }

    pub fn branches(&self) -> Vec<BranchInfo> {
        self.shared.scheduler.list()
    }
}

/// `head` names `cmd` directly, by alias, or as `object.method`.
fn invoked_as(cmd: &Command, head: &str) -> bool {
    let name = head.rsplit_once('.').map_or(head, |(_, method)| method);
    cmd.name == name || cmd.aliases.iter().any(|a| a == name)
}

impl Drop for Interp {
    fn drop(&mut self) {
        if !self.root {
            return;
        }
        for id in self.shared.scheduler.ids() {
            if let Err(e) = self.shared.scheduler.interrupt(id) {
                log::debug!("cannot interrupt script branch {id}: {e}");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{BufferOutput, StaticHost};
    use crate::script::registry::{Arg, Reply};
    use crate::script::types;

    fn interp() -> (Interp, BufferOutput) {
        let out = BufferOutput::new();
        let host = StaticHost::new();
        host.add_class("processor", None, &[]).add_object("cpu0", "processor");
        let i = Interp::new(Arc::new(host), Settings::default(), Box::new(out.clone())).unwrap();
        (i, out)
    }

    #[test]
    fn variables_api() {
        let (i, _) = interp();
        i.set_var("x", Value::Int(1)).unwrap();
        assert_eq!(i.get_var("x"), Some(Value::Int(1)));
        assert!(i.set_var("__x", Value::Nil).is_err());
        assert!(i.remove_var("x").unwrap());
        assert!(!i.remove_var("x").unwrap());
    }

    #[test]
    fn capture_nests() {
        let (mut i, out) = interp();
        let (_, captured) = i.run_capture("echo 1; echo 2").unwrap();
        assert_eq!(captured, "1\n2\n");
        assert_eq!(out.contents(), "");
        i.run("echo 3").unwrap();
        assert_eq!(out.contents(), "3\n");
    }

    #[test]
    fn report_never_fails() {
        let (mut i, _) = interp();
        let r = i.report("no-such-command");
        assert!(!r.ok && r.is_error);
        assert!(r.message.contains("Unknown command 'no-such-command'"));
        let r = i.report("1 + 2");
        assert!(r.ok);
        assert_eq!(r.value, Value::Int(3));
    }

    #[test]
    fn interactive_prints_results() {
        let (mut i, out) = interp();
        assert!(i.run_interactive("1 + 2; $x = 5"));
        assert_eq!(out.contents(), "3\n");
        assert!(!i.run_interactive("bogus"));
        assert!(out.contents().ends_with("Unknown command 'bogus'\n"));
    }

    #[test]
    fn repeat_handler_runs_for_repeated_lines() {
        let (mut i, out) = interp();
        i.register(
            Command::new("step", |i, _| {
                i.print("step");
                Ok(Reply::nil())
            })
            .repeat(|i, _| {
                i.print("again");
                Ok(Reply::nil())
            }),
        )
        .unwrap();
        i.run_interactive("step");
        i.run_interactive("step");
        assert_eq!(out.contents(), "step\nagain\n");
    }

    #[test]
    fn operators_leave_the_repeat_to_the_head_command() {
        let (mut i, out) = interp();
        i.register(
            Command::new("step", |i, a| {
                i.print(&format!("step {}", a.int(0)?));
                Ok(Reply::nil())
            })
            .arg(Arg::new(types::integer(), "count"))
            .repeat(|i, _| {
                i.print("again");
                Ok(Reply::nil())
            }),
        )
        .unwrap();
        i.run_interactive("step 1 + 2");
        i.run_interactive("step 1 + 2");
        assert_eq!(out.contents(), "step 3\nagain\n");
    }

    #[test]
    fn programmatic_calls() {
        let (mut i, _) = interp();
        i.register(
            Command::new("scale", |_, a| Ok(Reply::from(Value::Int(a.int(0)? * a.int(1)?))))
                .arg(Arg::new(types::integer(), "value"))
                .arg(Arg::new(types::integer(), "factor").optional(2i64)),
        )
        .unwrap();
        assert_eq!(i.call("scale", &[Value::Int(4)], &[]).unwrap(), Value::Int(8));
        let kw = [("factor".to_string(), Value::Int(3))];
        assert_eq!(i.call("scale", &[Value::Int(4)], &kw).unwrap(), Value::Int(12));
        assert!(matches!(i.call("nope", &[], &[]), Err(CliError::UnknownCommand(_))));
    }

    #[test]
    fn methods_resolve_through_objects() {
        let (mut i, _) = interp();
        i.register(
            Command::new("info", |_, a| Ok(Reply::from(a.object().cloned().unwrap_or_default()))).class("processor"),
        )
        .unwrap();
        assert_eq!(i.call("cpu0.info", &[], &[]).unwrap(), Value::Object("cpu0".into()));
        assert_eq!(i.run("cpu0.info").unwrap(), Value::Object("cpu0".into()));
    }

    #[test]
    fn panics_become_runtime_errors() {
        let (mut i, _) = interp();
        i.register(Command::new("boom", |_, _| panic!("kaboom"))).unwrap();
        let e = i.run("boom").unwrap_err();
        assert!(e.message().contains("internal error in 'boom': kaboom"));
        assert_eq!(e.traceback(), ["  in 'boom' at line 1"]);
    }

    #[test]
    fn object_aliases() {
        let (i, _) = interp();
        assert!(i.set_object_alias("c", "nope").is_err());
        i.set_object_alias("c", "cpu0").unwrap();
        assert_eq!(i.resolve_object("c").unwrap().name, "cpu0");
    }
}
