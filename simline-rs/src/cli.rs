//! Command-line argument parsing.
//!
//! Usage:
//!   simline [-f[<file>]] [-c<cmd>] [-x<script>] [-bd] [--complete <text>]

use std::path::PathBuf;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Settings-file specification.
    pub config: ConfigFile,
    /// Commands to run after startup scripts (`-c<cmd>`, repeatable).
    pub commands: Vec<String>,
    /// Script files to run (`-x<file>`, repeatable).
    pub scripts: Vec<PathBuf>,
    /// Batch mode: exit instead of starting the REPL (`-b`).
    pub batch: bool,
    /// Debug logging (`-d`).
    pub debug: bool,
    /// Print completions for this text and exit (`--complete <text>`).
    pub complete: Option<String>,
}

/// How to choose the settings file.
#[derive(Debug, Default, PartialEq)]
pub enum ConfigFile {
    /// `$SIMLINE_CONFIG`, the user config directory, then `./.simlinerc`.
    #[default]
    Search,
    /// `-f` with no file argument: skip the settings file.
    Skip,
    /// `-f<file>`: load this specific file.
    Explicit(PathBuf),
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(raw.get(1..).unwrap_or(&[]))
}

/// Value for a flag: the rest of this argument, or the next argument.
fn flag_value(chars: &[char], j: &mut usize, argv: &[String], i: &mut usize, flag: char) -> Result<String, String> {
    if *j + 1 < chars.len() {
        let s: String = chars[*j + 1..].iter().collect();
        *j = chars.len();
        Ok(s)
    } else if *i + 1 < argv.len() {
        *i += 1;
        Ok(argv[*i].clone())
    } else {
        Err(format!("-{flag} requires an argument"))
    }
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        if arg == "--complete" {
            i += 1;
            let text = argv.get(i).ok_or("--complete requires a text argument")?;
            args.complete = Some(text.clone());
            i += 1;
            continue;
        }

        if !arg.starts_with('-') || arg == "-" {
            return Err(format!("unexpected argument: {arg}"));
        }

        // Flag argument: iterate over characters after the leading `-`.
        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            match chars[j] {
                'b' => args.batch = true,
                'd' => args.debug = true,

                // -f[<file>]
                'f' => {
                    if j + 1 < chars.len() {
                        let file: String = chars[j + 1..].iter().collect();
                        args.config = ConfigFile::Explicit(PathBuf::from(file));
                        j = chars.len();
                    } else if i + 1 < argv.len() && !argv[i + 1].starts_with('-') {
                        i += 1;
                        args.config = ConfigFile::Explicit(PathBuf::from(&argv[i]));
                    } else {
                        args.config = ConfigFile::Skip;
                    }
                }

                'c' => {
                    let cmd = flag_value(&chars, &mut j, argv, &mut i, 'c')?;
                    args.commands.push(cmd);
                }

                'x' => {
                    let file = flag_value(&chars, &mut j, argv, &mut i, 'x')?;
                    args.scripts.push(PathBuf::from(file));
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    Ok(args)
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Locate the settings file: `$SIMLINE_CONFIG`, then
/// `<config dir>/simline.conf`, then `./.simlinerc`.  Returns the first
/// path that exists.
pub fn find_user_config() -> Option<PathBuf> {
    let from_env = std::env::var_os("SIMLINE_CONFIG").map(PathBuf::from);
    let from_dirs = directories::ProjectDirs::from("", "", "simline").map(|d| d.config_dir().join("simline.conf"));
    from_env
        .into_iter()
        .chain(from_dirs)
        .chain(std::iter::once(PathBuf::from("./.simlinerc")))
        .find(|p| p.exists())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
