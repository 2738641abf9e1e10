//! End-to-end tests driving the interpreter through its public API.

use std::io::Write;
use std::sync::Arc;

use simline::config::Settings;
use simline::error::CliError;
use simline::host::{BufferOutput, StaticHost};
use simline::script::registry::{Arg, Command, Reply};
use simline::script::types;
use simline::script::{Interp, Value};

fn interp() -> (Interp, BufferOutput) {
    let out = BufferOutput::new();
    let host = StaticHost::new();
    host.add_class("processor", None, &[])
        .add_object("cpu0", "processor")
        .init_attr("cpu0", "freq", Value::Int(100));
    let i = Interp::new(Arc::new(host), Settings::default(), Box::new(out.clone())).unwrap();
    (i, out)
}

fn noop(_: &mut Interp, _: &simline::script::binder::Args) -> Result<Reply, CliError> {
    Ok(Reply::nil())
}

#[test]
fn echo_prints_and_returns_its_argument() {
    let (mut i, out) = interp();
    assert_eq!(i.run("echo \"hi there\"").unwrap(), Value::Str("hi there".into()));
    assert_eq!(out.contents(), "hi there\n");
}

#[test]
fn foreach_value_is_the_last_iteration() {
    let (mut i, out) = interp();
    assert_eq!(i.run("foreach $x in [1, 2, 3] { $x }").unwrap(), Value::Int(3));
    assert_eq!(out.contents(), "");
}

#[test]
fn interactive_loops_print_each_value() {
    let (mut i, out) = interp();
    assert!(i.run_interactive("foreach $x in [1, 2, 3] { $x }"));
    assert_eq!(out.contents(), "1\n2\n3\n");
}

#[test]
fn attribute_reads_combine_with_operators() {
    let (mut i, _) = interp();
    assert_eq!(i.run("cpu0->freq + 1").unwrap(), Value::Int(101));
    assert_eq!(i.run("1 + cpu0->freq").unwrap(), Value::Int(101));
}

#[test]
fn member_access_binds_before_addition() {
    let (mut i, _) = interp();
    i.run("$a = cpu0; $b = \"freq\"").unwrap();
    assert_eq!(i.run("$a -> $b + 1").unwrap(), Value::Int(101));
    assert_eq!(i.run("1 + $a -> $b").unwrap(), Value::Int(101));
}

#[test]
fn modulo_range_wraps_huge_literals() {
    let (mut i, _) = interp();
    i.register(
        Command::new("set-sbyte", |_, a| Ok(Reply::from(Value::Int(a.int(0)?))))
            .arg(Arg::new(types::modulo_range(-128, 127), "value")),
    )
    .unwrap();
    assert_eq!(i.run("set-sbyte 170141183460469231731687303715884105727").unwrap(), Value::Int(-1));
}

#[test]
fn integer_division_overflow_is_an_error() {
    let (mut i, _) = interp();
    i.run("$min = (0 - 170141183460469231731687303715884105727 - 1)").unwrap();
    let e = i.run("$min / -1").unwrap_err();
    assert_eq!(e.message(), "integer overflow");
    assert!(i.run("$min % -1").is_err());
}

#[test]
fn element_assignment_appends_at_the_end() {
    let (mut i, _) = interp();
    i.run("$l = [1, 2]").unwrap();
    i.run("$l[1] = 5").unwrap();
    assert_eq!(i.get_var("l"), Some(Value::List(vec![Value::Int(1), Value::Int(5)])));
    i.run("$l[2] = 7").unwrap();
    assert_eq!(i.run("$l[2]").unwrap(), Value::Int(7));
}

#[test]
fn one_or_more_needs_a_value() {
    let (mut i, _) = interp();
    i.register(
        Command::new("total", |_, a| {
            let sum: i128 = a.list(0).iter().filter_map(Value::as_int).sum();
            Ok(Reply::from(Value::Int(sum)))
        })
        .arg(Arg::new(types::integer(), "values").one_or_more()),
    )
    .unwrap();
    assert_eq!(i.run("total 1 2 3").unwrap(), Value::Int(6));
    assert!(i.run("total").is_err());
}

#[test]
fn modulo_range_wraps_with_a_warning() {
    let (mut i, out) = interp();
    i.register(
        Command::new("set-byte", |_, a| Ok(Reply::from(Value::Int(a.int(0)?))))
            .arg(Arg::new(types::modulo_range(0, 255), "value")),
    )
    .unwrap();
    assert_eq!(i.run("set-byte -1").unwrap(), Value::Int(255));
    assert!(out.contents().starts_with("Warning: value -1 is outside [0, 255]"));
}

#[test]
fn branches_wait_for_simulated_time() {
    let (mut i, _) = interp();
    i.run("$done = 0; script-branch { wait-for-time 2; $done = 1 }").unwrap();
    assert_eq!(i.branches().len(), 1);
    assert_eq!(i.advance_time(1.0), 0);
    assert_eq!(i.get_var("done"), Some(Value::Int(0)));
    assert_eq!(i.advance_time(1.0), 1);
    assert_eq!(i.get_var("done"), Some(Value::Int(1)));
    assert!(i.branches().is_empty());
}

#[test]
fn branches_wait_for_signals() {
    let (mut i, _) = interp();
    i.run("script-branch { $got = (wait-for-signal ready) }").unwrap();
    assert_eq!(i.get_var("got"), None);
    assert_eq!(i.run("signal ready").unwrap(), Value::Int(1));
    assert_eq!(i.get_var("got"), Some(Value::Str("ready".into())));
}

#[test]
fn interrupts_are_not_caught_by_try() {
    let (mut i, out) = interp();
    let id = i
        .run("script-branch { try { wait-for-signal go } except { $caught = 1 }; $after = 1 }")
        .unwrap();
    let Value::Int(id) = id else {
        panic!("script-branch returned {id:?}");
    };
    i.run(&format!("interrupt-script-branch {id}")).unwrap();
    assert_eq!(i.get_var("caught"), None);
    assert_eq!(i.get_var("after"), None);
    assert!(i.branches().is_empty());
    assert_eq!(out.contents(), "");
}

#[test]
fn interrupting_a_timed_wait_stops_the_branch() {
    let (mut i, out) = interp();
    let id = i.run("script-branch { wait-for-time 5; $after = 1 }").unwrap();
    assert_eq!(i.run("list-script-branches").unwrap(), Value::Nil);
    assert!(out.contents().contains("wait-for-time 5"));
    let Value::Int(id) = id else {
        panic!("script-branch returned {id:?}");
    };
    i.interrupt_branch(id as u64).unwrap();
    assert!(i.branches().is_empty());
    assert_eq!(i.advance_time(10.0), 0);
    assert_eq!(i.get_var("after"), None);
}

#[test]
fn completes_command_names() {
    let (mut i, _) = interp();
    i.register(Command::new("my-command", noop)).unwrap();
    i.register(Command::new("my-count", noop)).unwrap();
    let (candidates, filenames) = i.complete("my-co");
    assert_eq!(candidates, vec!["my-command", "my-count"]);
    assert!(!filenames);
}

#[test]
fn report_never_fails() {
    let (mut i, _) = interp();
    let r = i.report("no-such-command");
    assert!(!r.ok && r.is_error);
    assert!(r.message.contains("Unknown command 'no-such-command'"));
    let r = i.report("1 + 1");
    assert!(r.ok);
    assert_eq!(r.value, Value::Int(2));
}

#[test]
fn script_files_run_with_locations() {
    let (mut i, _) = interp();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "$a = 2\n$a * 3").unwrap();
    assert_eq!(i.run_file(file.path()).unwrap(), Value::Int(6));
    assert_eq!(i.get_var("a"), Some(Value::Int(2)));

    let mut bad = tempfile::NamedTempFile::new().unwrap();
    writeln!(bad, "echo 1\nno-such-command").unwrap();
    let e = i.run_file(bad.path()).unwrap_err();
    let loc = e.location().unwrap();
    assert_eq!(loc.line, 2);
    assert_eq!(loc.file.as_deref(), Some(bad.path().display().to_string().as_str()));
    assert!(matches!(e.inner(), CliError::UnknownCommand(_)));
}

#[test]
fn run_script_command_reads_files() {
    let (mut i, _) = interp();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "$from_file = \"yes\"").unwrap();
    i.run(&format!("run-script \"{}\"", file.path().display())).unwrap();
    assert_eq!(i.get_var("from_file"), Some(Value::Str("yes".into())));
}
