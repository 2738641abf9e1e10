use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use simline::cli::{self, CliArgs, ConfigFile};
use simline::config::Settings;
use simline::error::CliError;
use simline::host::{StaticHost, StdoutOutput};
use simline::script::registry::{Arg, Command, Reply};
use simline::script::types;
use simline::script::{Interp, Value};

fn main() {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("simline: {e}");
            eprintln!("Usage: simline [-f[<file>]] [-c<cmd>] [-x<script>] [-bd] [--complete <text>]");
            std::process::exit(1);
        }
    };

    let level = if args.debug { log::LevelFilter::Debug } else { log::LevelFilter::Warn };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();

    let settings = load_settings(&args.config);
    let quit = Arc::new(AtomicBool::new(false));
    let mut interp = match Interp::new(Arc::new(demo_host()), settings, Box::new(StdoutOutput)) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("simline: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = register_frontend(&interp, quit.clone()) {
        eprintln!("simline: {e}");
        std::process::exit(1);
    }
    for e in interp.enable_configured_gates() {
        eprintln!("simline: warning: {e}");
    }

    if !run_startup(&mut interp, &args) {
        std::process::exit(1);
    }

    if let Some(text) = &args.complete {
        let (candidates, _) = interp.complete(text);
        for c in candidates {
            println!("{c}");
        }
        return;
    }

    if args.batch || quit.load(Ordering::Relaxed) {
        return;
    }
    repl(&mut interp, &quit);
}

fn load_settings(config: &ConfigFile) -> Settings {
    let path = match config {
        ConfigFile::Skip => return Settings::default(),
        ConfigFile::Explicit(path) => Some(path.clone()),
        ConfigFile::Search => cli::find_user_config(),
    };
    let Some(path) = path else {
        return Settings::default();
    };
    match Settings::load_file(&path) {
        Ok((settings, errors)) => {
            for e in errors {
                eprintln!("simline: {}: {e}", path.display());
            }
            settings
        }
        Err(e) => {
            eprintln!("simline: warning: {}: {e}", path.display());
            Settings::default()
        }
    }
}

/// A small machine to try commands against.
fn demo_host() -> StaticHost {
    let host = StaticHost::new();
    host.add_class("processor", None, &["processor_info"])
        .add_class("memory-space", None, &[])
        .add_object("cpu0", "processor")
        .add_object("cpu1", "processor")
        .add_object("phys_mem", "memory-space")
        .init_attr("cpu0", "freq", Value::Int(2000))
        .init_attr("cpu1", "freq", Value::Int(2000))
        .set_register("pc", Value::Int(0));
    host
}

fn register_frontend(interp: &Interp, quit: Arc<AtomicBool>) -> Result<(), CliError> {
    interp.register(
        Command::new("quit", move |_, _| {
            quit.store(true, Ordering::Relaxed);
            Ok(Reply::nil())
        })
        .alias("q")
        .category("CLI")
        .short("leave the command line"),
    )?;
    interp.register(
        Command::new("advance-time", |i, a| {
            let seconds = a.get(0).as_float().unwrap_or(0.0);
            let woken = i.advance_time(seconds);
            Ok(Reply::quiet(Value::Int(woken as i128)))
        })
        .arg(Arg::new(types::float(), "seconds"))
        .category("Execution")
        .short("move simulated time forward")
        .doc("Advance the simulated clock by <var>seconds</var> and run every script branch whose wait has expired."),
    )?;
    Ok(())
}

/// Startup scripts, then `-x` files, then `-c` commands.  Returns `false`
/// if any of them failed.
fn run_startup(interp: &mut Interp, args: &CliArgs) -> bool {
    let startup = interp.settings().startup.clone();
    for path in startup.iter().chain(&args.scripts) {
        if let Err(e) = interp.run_file(path) {
            if !e.is_quiet() {
                eprintln!("simline: {e}");
            }
            return false;
        }
    }
    args.commands.iter().all(|cmd| interp.run_interactive(cmd))
}

fn repl(interp: &mut Interp, quit: &AtomicBool) {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    while !quit.load(Ordering::Relaxed) {
        let prompt = interp.settings().prompt.clone();
        print!("{prompt}");
        let _ = std::io::stdout().flush();
        match lines.next() {
            Some(Ok(line)) => {
                interp.run_interactive(&line);
            }
            Some(Err(e)) => {
                eprintln!("simline: {e}");
                break;
            }
            None => {
                println!();
                break;
            }
        }
    }
}
