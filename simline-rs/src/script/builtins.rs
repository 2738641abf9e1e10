//! Core commands: operators, attribute and index access, and the commands
//! the language itself relies on.
//!
//! Hosts register their own commands on top of these through
//! [`Interp::register`](super::interp::Interp::register).

use std::cmp::Ordering;
use std::path::PathBuf;

use crate::branch::Wait;
use crate::error::CliError;
use crate::host::HostObject;

use super::binder::Args;
use super::eval::element;
use super::interp::Interp;
use super::lexer::INLINE_EVAL;
use super::registry::{Arg, Command, GateKind, Registry, Reply};
use super::types;
use super::value::Value;

type BinaryOp = fn(&Value, &Value) -> Result<Value, CliError>;

/// Register every core command.
pub fn register_all(reg: &mut Registry) -> Result<(), CliError> {
    for cmd in operators().into_iter().chain(language()).chain(gates()).chain(branches()) {
        reg.register(cmd)?;
    }
    Ok(())
}

// ── Operators ─────────────────────────────────────────────────────────────────

fn binary(name: &str, pri: i32, short: &str, op: BinaryOp) -> Command {
    Command::new(name, move |_, a| Ok(Reply::from(op(a.get(0), a.get(1))?)))
        .infix(pri)
        .arg(Arg::new(types::any(), "a"))
        .arg(Arg::new(types::any(), "b"))
        .short(short)
        .category("CLI")
}

fn compare(name: &str, want: fn(Ordering) -> bool) -> Command {
    Command::new(name, move |_, a| Ok(Reply::from(Value::Bool(want(a.get(0).compare(a.get(1))?)))))
        .infix(200)
        .arg(Arg::new(types::any(), "a"))
        .arg(Arg::new(types::any(), "b"))
        .short("compare two values")
        .category("CLI")
}

fn bitwise(name: &'static str, pri: i32, short: &str) -> Command {
    Command::new(name, move |_, a| Ok(Reply::from(a.get(0).bitwise(a.get(1), name)?)))
        .infix(pri)
        .arg(Arg::new(types::integer(), "a"))
        .arg(Arg::new(types::integer(), "b"))
        .short(short)
        .category("CLI")
}

fn operators() -> Vec<Command> {
    vec![
        binary("+", 500, "addition; also joins strings and lists", Value::arith_add),
        binary("-", 500, "subtraction", Value::arith_sub),
        binary("*", 600, "multiplication", Value::arith_mul),
        binary("/", 600, "division; integer division for integers", Value::arith_div),
        binary("%", 600, "remainder", Value::arith_rem),
        binary("==", 200, "equality", |a, b| Ok(Value::Bool(a.loose_eq(b)))),
        binary("!=", 200, "inequality", |a, b| Ok(Value::Bool(!a.loose_eq(b)))),
        compare("<", Ordering::is_lt),
        compare("<=", Ordering::is_le),
        compare(">", Ordering::is_gt),
        compare(">=", Ordering::is_ge),
        bitwise("|", 300, "bitwise or"),
        bitwise("^", 310, "bitwise exclusive or"),
        bitwise("&", 320, "bitwise and"),
        bitwise("<<", 400, "left shift"),
        bitwise(">>", 400, "right shift"),
        binary("and", 110, "logical and", |a, b| Ok(Value::Bool(a.as_bool() && b.as_bool()))),
        binary("or", 100, "logical or", |a, b| Ok(Value::Bool(a.as_bool() || b.as_bool()))),
        Command::new("not", |_, a| Ok(Reply::from(Value::Bool(!a.get(0).as_bool()))))
            .pri(150)
            .arg(Arg::new(types::any(), "value"))
            .short("logical negation")
            .category("CLI"),
        Command::new("->", attribute)
            .infix(800)
            .arg(Arg::new(types::any(), "object"))
            .arg(Arg::new(types::string(), "attribute"))
            .arg(
                Arg::poly(vec![(types::flag("-w"), "-w"), (types::flag("-i"), "-i"), (types::flag("-d"), "-d")])
                    .optional(false),
            )
            .arg(Arg::new(types::any(), "value").optional(Value::Nil))
            .short("read or write an object attribute")
            .doc("<tt>obj->attr</tt> reads an attribute; <tt>obj->attr = value</tt> writes it.")
            .category("Inspection"),
        Command::new("[", |_, a| Ok(Reply::from(element(a.get(0), a.list(1))?)))
            .infix(900)
            .arg(Arg::new(types::any(), "value"))
            .arg(Arg::new(types::any_list(), "indices"))
            .short("list or string element")
            .hidden(),
    ]
}

fn object_arg(i: &Interp, value: &Value) -> Result<HostObject, CliError> {
    let name = match value {
        Value::Object(n) | Value::Str(n) => n,
        other => return Err(CliError::Type(format!("expected an object, got {}", other.type_name()))),
    };
    i.resolve_object(name)
        .ok_or_else(|| CliError::Argument(format!("no object named '{name}'")))
}

fn attribute(i: &mut Interp, a: &Args) -> Result<Reply, CliError> {
    let obj = object_arg(i, a.get(0))?;
    let attr = a.str(1)?;
    if !a.supplied(2) {
        return Ok(Reply::from(i.host().get_attr(&obj, attr)?));
    }
    let value = a.get(3);
    let new = match a.variant(2) {
        0 => value.clone(),
        1 => i.host().get_attr(&obj, attr)?.arith_add(value)?,
        _ => i.host().get_attr(&obj, attr)?.arith_sub(value)?,
    };
    i.host().set_attr(&obj, attr, new.clone())?;
    Ok(Reply::quiet(new))
}

// ── Language commands ─────────────────────────────────────────────────────────

fn language() -> Vec<Command> {
    vec![
        Command::new(INLINE_EVAL, |i, a| {
            let text = a.str(0)?.to_owned();
            Ok(Reply::from(i.run(&text)?))
        })
        .arg(Arg::new(types::string(), "expression"))
        .short("evaluate a back-quoted expression")
        .hidden(),
        Command::new("echo", |i, a| {
            let value = a.get(0).clone();
            i.print(&if a.supplied(0) { value.to_string() } else { String::new() });
            Ok(Reply::quiet(value))
        })
        .arg(Arg::new(types::any(), "value").optional(Value::Nil))
        .short("print a value")
        .category("CLI"),
        Command::new("help", help)
            .alias("h")
            .alias("man")
            .arg(Arg::new(types::string(), "topic").optional(""))
            .short("help on commands and categories")
            .category("Help"),
        Command::new("run-script", |i, a| {
            let path = PathBuf::from(a.str(0)?);
            Ok(Reply::quiet(i.run_file(&path)?))
        })
        .arg(Arg::new(types::existing_file(), "file"))
        .short("run a script file")
        .doc("Runs <var>file</var> with its own variable scope.")
        .category("Files"),
        Command::new("get-error-message", |i, _| {
            i.last_error()
                .map(|m| Reply::from(Value::from(m)))
                .ok_or_else(|| CliError::Usage("no error has been caught".to_owned()))
        })
        .short("message of the last error caught by try")
        .see_also("try")
        .category("CLI"),
        Command::new("defined", |i, a| Ok(Reply::from(Value::Bool(i.get_var(a.str(0)?).is_some()))))
            .arg(Arg::new(types::string(), "variable"))
            .short("check whether a variable is defined")
            .category("CLI"),
        Command::new("unset", |i, a| {
            for name in a.list(0) {
                let name = name.as_str().unwrap_or_default();
                if !i.remove_var(name)? {
                    return Err(CliError::Argument(format!("no variable '{name}'")));
                }
            }
            Ok(Reply::nil())
        })
        .arg(Arg::new(types::string(), "variables").one_or_more())
        .short("remove variables")
        .category("CLI"),
        Command::new("list-variables", |i, a| {
            let filter = a.str(0).unwrap_or_default();
            for (name, value) in i.variables() {
                if name.contains(filter) {
                    i.print(&format!("{name} = {}", value.repr()));
                }
            }
            Ok(Reply::nil())
        })
        .arg(Arg::new(types::string(), "substring").optional(""))
        .short("list visible variables")
        .category("CLI"),
        Command::new("change-namespace", |i, a| {
            let ns = match a.get(0) {
                Value::Nil => None,
                v => Some(object_arg(i, v)?.name),
            };
            i.set_current_namespace(ns);
            Ok(Reply::nil())
        })
        .alias("cd")
        .arg(Arg::new(types::object(), "object").optional(Value::Nil))
        .short("set the namespace for relative object names")
        .category("CLI"),
        Command::new("current-namespace", |i, _| {
            Ok(Reply::from(i.current_namespace().map_or(Value::Nil, Value::from)))
        })
        .alias("pwd")
        .short("namespace for relative object names")
        .category("CLI"),
    ]
}

fn help(i: &mut Interp, a: &Args) -> Result<Reply, CliError> {
    let topic = a.str(0).unwrap_or_default().trim().to_owned();
    let lines = {
        let reg = i.registry();
        if topic.is_empty() {
            let mut lines = vec!["Categories:".to_owned()];
            lines.extend(reg.categories().map(|c| format!("    {c}")));
            lines.push("Use 'help <command>' or 'help <category>' for more.".to_owned());
            lines
        } else if let Some(cmd) = reg.lookup(&topic).or_else(|| reg.all().into_iter().find(|c| c.display_name() == topic)) {
            let documented = cmd.doc_with.as_deref().and_then(|t| reg.lookup(t)).unwrap_or_else(|| cmd.clone());
            let mut lines = vec![format!("{} - {}", cmd.display_name(), documented.short), String::new()];
            lines.push(format!("    {}", cmd.synopsis()));
            if !cmd.aliases.is_empty() {
                lines.push(format!("Aliases: {}", cmd.aliases.join(", ")));
            }
            if !documented.doc.is_empty() {
                lines.push(String::new());
                lines.push(documented.doc.clone());
            }
            if !cmd.see_also.is_empty() {
                lines.push(format!("See also: {}", cmd.see_also.join(", ")));
            }
            lines
        } else if reg.categories().any(|c| c.eq_ignore_ascii_case(&topic)) {
            reg.all()
                .iter()
                .filter(|c| !c.hidden && c.categories.iter().any(|cat| cat.eq_ignore_ascii_case(&topic)))
                .map(|c| format!("{:<24} {}", c.display_name(), c.short))
                .collect()
        } else {
            let matches: Vec<String> = reg
                .all()
                .iter()
                .filter(|c| !c.hidden && c.display_name().contains(&topic))
                .map(|c| c.display_name())
                .collect();
            if matches.is_empty() {
                return Err(CliError::Argument(format!("no help topic matching '{topic}'")));
            }
            matches
        }
    };
    for line in lines {
        i.print(&line);
    }
    Ok(Reply::nil())
}

// ── Feature gates ─────────────────────────────────────────────────────────────

fn gate_command(name: &str, kind: GateKind, enable: bool) -> Command {
    Command::new(name, move |i, a| {
        if let Some(gate) = a.get(0).as_str() {
            i.registry_mut().set_gate(kind, gate, enable)?;
            log::debug!("{kind} '{gate}' {}", if enable { "enabled" } else { "disabled" });
            return Ok(Reply::nil());
        }
        let states: Vec<(String, bool)> = {
            let reg = i.registry();
            reg.gates(kind).into_iter().map(|g| {
                let on = reg.gate_enabled(kind, &g);
                (g, on)
            }).collect()
        };
        if states.is_empty() {
            i.print(&format!("No {kind}s are declared."));
        }
        for (gate, on) in states {
            i.print(&format!("{gate:<24} {}", if on { "enabled" } else { "disabled" }));
        }
        Ok(Reply::nil())
    })
    .arg(Arg::new(types::string(), "feature").optional(Value::Nil))
    .category("Configuration")
}

fn gates() -> Vec<Command> {
    vec![
        gate_command("enable-tech-preview", GateKind::TechPreview, true).short("enable a tech-preview feature"),
        gate_command("disable-tech-preview", GateKind::TechPreview, false).short("disable a tech-preview feature"),
        gate_command("enable-unsupported-feature", GateKind::Unsupported, true).short("enable an unsupported feature"),
        gate_command("disable-unsupported-feature", GateKind::Unsupported, false)
            .short("disable an unsupported feature"),
    ]
}

// ── Script branches ───────────────────────────────────────────────────────────

fn branches() -> Vec<Command> {
    vec![
        Command::new("wait-for-time", |i, a| {
            let secs = a.get(0).as_float().unwrap_or_default();
            if secs < 0.0 {
                return Err(CliError::Value(format!("cannot wait a negative time ({secs})")));
            }
            let deadline = i.now() + secs;
            i.suspend(Wait::Time(deadline))?;
            Ok(Reply::nil())
        })
        .arg(Arg::new(types::float(), "seconds"))
        .short("suspend the script branch for simulated time")
        .category("Execution"),
        Command::new("wait-for-signal", |i, a| {
            let signal = a.str(0)?.to_owned();
            Ok(Reply::quiet(i.suspend(Wait::Signal(signal))?))
        })
        .arg(Arg::new(types::string(), "signal"))
        .short("suspend the script branch until a signal")
        .see_also("signal")
        .category("Execution"),
        Command::new("signal", |i, a| Ok(Reply::quiet(i.notify(a.str(0)?))))
            .arg(Arg::new(types::string(), "signal"))
            .short("wake branches waiting for a signal")
            .category("Execution"),
        Command::new("list-script-branches", |i, _| {
            let list = i.branches();
            if list.is_empty() {
                i.print("No script branches.");
            }
            for b in list {
                i.print(&format!("{:>4}  {:<28} {}", b.id, b.state.to_string(), b.desc));
            }
            Ok(Reply::nil())
        })
        .short("list suspended script branches")
        .category("Execution"),
        Command::new("interrupt-script-branch", |i, a| {
            let id = u64::try_from(a.int(0)?).map_err(|_| CliError::Value("invalid branch id".to_owned()))?;
            i.interrupt_branch(id)?;
            Ok(Reply::nil())
        })
        .arg(Arg::new(types::uint64(), "id"))
        .short("interrupt a script branch")
        .category("Execution"),
    ]
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::Settings;
    use crate::host::{BufferOutput, StaticHost};

    fn interp() -> (Interp, BufferOutput) {
        let out = BufferOutput::new();
        let host = StaticHost::new();
        host.add_class("processor", None, &[]).add_object("cpu0", "processor");
        let i = Interp::new(Arc::new(host), Settings::default(), Box::new(out.clone())).unwrap();
        (i, out)
    }

    #[test]
    fn arithmetic_and_comparison() {
        let (mut i, _) = interp();
        assert_eq!(i.run("7 / 2").unwrap(), Value::Int(3));
        assert_eq!(i.run("7 % 4").unwrap(), Value::Int(3));
        assert_eq!(i.run("\"a\" + \"b\"").unwrap(), Value::Str("ab".into()));
        assert_eq!(i.run("2 <= 2").unwrap(), Value::Bool(true));
        assert_eq!(i.run("1 << 4 | 1").unwrap(), Value::Int(17));
        assert_eq!(i.run("0 or 1").unwrap(), Value::Bool(true));
    }

    #[test]
    fn echo_prints_and_is_quiet() {
        let (mut i, out) = interp();
        assert!(i.run_interactive("echo \"hi there\""));
        assert!(i.run_interactive("echo"));
        assert_eq!(out.contents(), "hi there\n\n");
    }

    #[test]
    fn inline_eval() {
        let (mut i, _) = interp();
        assert_eq!(i.run("`1 + 2` * 2").unwrap(), Value::Int(6));
    }

    #[test]
    fn defined_and_unset() {
        let (mut i, _) = interp();
        i.run("$a = 1; $b = 2").unwrap();
        assert_eq!(i.run("defined a").unwrap(), Value::Bool(true));
        i.run("unset a b").unwrap();
        assert_eq!(i.run("defined b").unwrap(), Value::Bool(false));
        assert!(i.run("unset a").is_err());
        assert!(i.run("unset").is_err());
    }

    #[test]
    fn list_variables_filters() {
        let (mut i, _) = interp();
        i.run("$apple = 1; $banana = \"x\"").unwrap();
        let (_, out) = i.run_capture("list-variables app").unwrap();
        assert_eq!(out, "apple = 1\n");
    }

    #[test]
    fn gate_commands() {
        let (mut i, out) = interp();
        i.registry_mut().declare_gate(GateKind::TechPreview, "turbo");
        i.register(Command::new("turbo-run", |_, _| Ok(Reply::nil())).tech_preview("turbo")).unwrap();
        assert!(i.run("turbo-run").is_err());
        i.run("enable-tech-preview turbo").unwrap();
        assert!(i.run("turbo-run").is_ok());
        i.run("enable-tech-preview").unwrap();
        assert!(out.contents().contains("turbo"));
        assert!(i.run("enable-tech-preview nope").is_err());
    }

    #[test]
    fn help_topics() {
        let (mut i, _) = interp();
        let (_, out) = i.run_capture("help echo").unwrap();
        assert!(out.starts_with("echo - print a value"));
        let (_, out) = i.run_capture("help Execution").unwrap();
        assert!(out.contains("wait-for-time"));
        assert!(i.run("help zzz-nothing").is_err());
    }

    #[test]
    fn namespaces_make_names_relative() {
        let (mut i, _) = interp();
        i.run("change-namespace cpu0").unwrap();
        assert_eq!(i.run("current-namespace").unwrap(), Value::Str("cpu0".into()));
        i.run("cd").unwrap();
        assert_eq!(i.current_namespace(), None);
    }

    #[test]
    fn waits_need_a_branch() {
        let (mut i, _) = interp();
        let e = i.run("wait-for-time 1").unwrap_err();
        assert!(matches!(e.inner(), CliError::Usage(_)));
    }
}
