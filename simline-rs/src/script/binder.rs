//! Argument binding: matching tokens (or programmatic values) to a command's
//! declared arguments.
//!
//! The textual path ([`bind`]) walks the token list once.  At each step it
//! tries, in order: a `name = value` named argument, a flag, and finally the
//! next positional argument in declaration order.  Reaching a completion
//! token unwinds with the candidates for the argument being typed.
//!
//! The programmatic path ([`bind_call`]) maps positional and keyword values
//! onto the declared arguments and validates each through `normalize`.

use std::collections::HashSet;

use crate::error::{CliError, EvalResult, Unwind};

use super::complete::Completions;
use super::registry::{Arg, Command, Spec};
use super::token::{Kind, Partial, Token};
use super::types::TypeCtx;
use super::value::Value;

// ── Bound arguments ───────────────────────────────────────────────────────────

/// One bound argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub value: Value,
    /// Index of the polymorphic variant that matched.
    pub variant: usize,
    /// `false` when the value is the declared default.
    pub supplied: bool,
}

impl Bound {
    fn default_for(arg: &Arg) -> Bound {
        Bound { value: arg.default.clone(), variant: 0, supplied: false }
    }
}

static NIL: Value = Value::Nil;

/// Bound arguments as seen by a command handler.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<Bound>,
    names: Vec<Vec<String>>,
    object: Option<Value>,
}

impl Args {
    pub fn new(cmd: &Command, values: Vec<Bound>, object: Option<Value>) -> Self {
        Args { values, names: cmd.args.iter().map(|a| a.names.clone()).collect(), object }
    }

    /// Object a namespace command was invoked on.
    pub fn object(&self) -> Option<&Value> {
        self.object.as_ref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> &Value {
        self.values.get(index).map(|b| &b.value).unwrap_or(&NIL)
    }

    pub fn bound(&self, index: usize) -> Option<&Bound> {
        self.values.get(index)
    }

    pub fn variant(&self, index: usize) -> usize {
        self.values.get(index).map(|b| b.variant).unwrap_or(0)
    }

    pub fn supplied(&self, index: usize) -> bool {
        self.values.get(index).is_some_and(|b| b.supplied)
    }

    /// Value of the argument declaring `name` (any variant).
    pub fn by_name(&self, name: &str) -> Option<&Value> {
        let idx = self.names.iter().position(|ns| ns.iter().any(|n| n == name))?;
        self.values.get(idx).map(|b| &b.value)
    }

    /// `true` when the flag `name` was given.
    pub fn flag(&self, name: &str) -> bool {
        let Some(idx) = self.names.iter().position(|ns| ns.iter().any(|n| n == name)) else {
            return false;
        };
        self.values.get(idx).is_some_and(|b| {
            b.supplied && b.value.as_bool() && self.names[idx].get(b.variant).is_some_and(|n| n == name)
        })
    }

    pub fn str(&self, index: usize) -> Result<&str, CliError> {
        self.get(index)
            .as_str()
            .ok_or_else(|| CliError::Type(format!("argument {} is not a string", index + 1)))
    }

    pub fn int(&self, index: usize) -> Result<i128, CliError> {
        self.get(index)
            .as_int()
            .ok_or_else(|| CliError::Type(format!("argument {} is not an integer", index + 1)))
    }

    pub fn list(&self, index: usize) -> &[Value] {
        match self.get(index) {
            Value::List(items) => items,
            _ => &[],
        }
    }
}

// ── Textual binding ───────────────────────────────────────────────────────────

struct Binder<'c> {
    cmd: &'c Command,
    slots: Vec<Option<Bound>>,
    named: Vec<bool>,
    flagged: Vec<bool>,
}

fn with_context(cmd: &Command, idx: usize, e: CliError) -> CliError {
    let arg = &cmd.args[idx];
    let prefix = format!("argument {} ({}) of '{}'", idx + 1, arg.names.join("|"), cmd.display_name());
    match e {
        CliError::Type(msg) => CliError::Type(format!("{prefix}: {msg}")),
        CliError::Value(msg) => CliError::Value(format!("{prefix}: {msg}")),
        other => other,
    }
}

fn parse_variant(
    arg: &Arg,
    variant: Option<usize>,
    tokens: &[Token],
    ctx: &mut TypeCtx,
) -> Result<(usize, Value, usize), CliError> {
    if let Some(v) = variant {
        let (val, n) = arg.types[v].parse(tokens, ctx)?;
        return Ok((v, val, n));
    }
    for (i, ty) in arg.types.iter().enumerate().filter(|(_, t)| t.flag_name().is_none()) {
        match ty.parse(tokens, ctx) {
            Ok((val, n)) => return Ok((i, val, n)),
            Err(e) if e.is_type_mismatch() => continue,
            Err(e) => return Err(e),
        }
    }
    let descs: Vec<String> = arg.types.iter().filter(|t| t.flag_name().is_none()).map(|t| t.desc()).collect();
    let got = tokens.first().map(|t| format!(", got '{}'", t.to_source())).unwrap_or_default();
    Err(CliError::Type(format!("expected {}{got}", descs.join(" or "))))
}

fn normalize_variant(
    arg: &Arg,
    variant: Option<usize>,
    value: &Value,
    ctx: &mut TypeCtx,
) -> Result<(usize, Value), CliError> {
    if let Some(v) = variant {
        return Ok((v, arg.types[v].normalize(value, ctx)?));
    }
    let mut last = None;
    for (i, ty) in arg.types.iter().enumerate() {
        match ty.normalize(value, ctx) {
            Ok(v) => return Ok((i, v)),
            Err(e) => last = Some(e),
        }
    }
    Err(last.unwrap_or_else(|| CliError::Value(format!("cannot bind {}", value.repr()))))
}

impl<'c> Binder<'c> {
    fn new(cmd: &'c Command) -> Self {
        let n = cmd.args.len();
        Binder { cmd, slots: vec![None; n], named: vec![false; n], flagged: vec![false; n] }
    }

    /// `name =` at `pos`, naming a declared argument: `(arg index, variant)`.
    fn named_at(&self, tokens: &[Token], pos: usize) -> Option<(usize, usize)> {
        let name = tokens.get(pos)?.as_word()?;
        if !tokens.get(pos + 1)?.is_word("=") {
            return None;
        }
        self.cmd.args.iter().enumerate().find_map(|(i, a)| a.variant_named(name).map(|v| (i, v)))
    }

    fn flag_at(&self, flag: &str) -> Option<(usize, usize)> {
        self.cmd.args.iter().enumerate().find_map(|(i, a)| a.flag_variant(flag).map(|v| (i, v)))
    }

    fn ends_run(&self, tokens: &[Token], pos: usize) -> bool {
        match tokens.get(pos).map(|t| &t.kind) {
            None | Some(Kind::Complete(_)) => true,
            Some(Kind::Flag(f)) => self.flag_at(f).is_some(),
            Some(_) => self.named_at(tokens, pos).is_some(),
        }
    }

    fn next_positional(&self, from: usize) -> Option<usize> {
        (from..self.cmd.args.len()).find(|&i| self.slots[i].is_none() && !self.cmd.args[i].is_flag_only())
    }

    /// Elements of a literal list token standing in for a run of values.
    fn substitute_list(&self, arg: &Arg, variant: Option<usize>, token: &Token, ctx: &mut TypeCtx) -> Option<Vec<Value>> {
        let Kind::List(items) = &token.kind else {
            return None;
        };
        items.iter().map(|v| normalize_variant(arg, variant, v, ctx).ok().map(|(_, v)| v)).collect()
    }

    fn consume(
        &self,
        idx: usize,
        variant: Option<usize>,
        spec: Spec,
        tokens: &[Token],
        ctx: &mut TypeCtx,
    ) -> Result<(Bound, usize), CliError> {
        let arg = &self.cmd.args[idx];
        if !spec.is_variadic() {
            if tokens.first().map_or(true, |t| matches!(t.kind, Kind::Complete(_))) {
                return Err(CliError::Argument(format!("argument '{}' needs a value", arg.name())));
            }
            let (v, value, used) = parse_variant(arg, variant, tokens, ctx)?;
            return Ok((Bound { value, variant: v, supplied: true }, used));
        }
        let mut values = Vec::new();
        let mut first_variant = None;
        let mut used = 0;
        let mut mismatch = None;
        while !self.ends_run(tokens, used) {
            match parse_variant(arg, variant, &tokens[used..], ctx) {
                Ok((v, value, n)) => {
                    values.push(value);
                    first_variant.get_or_insert(v);
                    used += n;
                }
                Err(e) if e.is_type_mismatch() => {
                    if used == 0 {
                        if let Some(list) = self.substitute_list(arg, variant, &tokens[0], ctx) {
                            values = list;
                            used = 1;
                        } else {
                            mismatch = Some(e);
                        }
                    }
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        if values.is_empty() && spec == Spec::OneOrMore {
            return Err(mismatch.unwrap_or_else(|| {
                CliError::Argument(format!("argument '{}' needs at least one value", arg.name()))
            }));
        }
        let supplied = used > 0;
        Ok((Bound { value: Value::List(values), variant: first_variant.unwrap_or(0), supplied }, used))
    }

    fn candidates(&self, partial: &Partial, target: Option<usize>, names: bool, ctx: &TypeCtx) -> Completions {
        let mut out = Vec::new();
        if names && !partial.quoted {
            for (i, arg) in self.cmd.args.iter().enumerate() {
                if self.slots[i].is_some() {
                    continue;
                }
                for (name, ty) in arg.names.iter().zip(&arg.types) {
                    match ty.flag_name() {
                        Some(f) => out.push(f.to_owned()),
                        None if !name.is_empty() => out.push(format!("{name}=")),
                        None => {}
                    }
                }
            }
        }
        let mut filenames = false;
        if let Some(arg) = target.map(|i| &self.cmd.args[i]) {
            match &arg.expander {
                Some(expand) => out.extend(expand(&partial.text)),
                None => {
                    for ty in arg.types.iter().filter(|t| t.flag_name().is_none()) {
                        out.extend(ty.expand(&partial.text, ctx));
                        filenames |= ty.is_filename();
                    }
                }
            }
        }
        out.retain(|c| c.starts_with(&partial.text));
        Completions { candidates: out, filenames }
    }

    fn run(mut self, tokens: &[Token], infix: bool, ctx: &mut TypeCtx) -> EvalResult<(Vec<Bound>, usize)> {
        let cmd = self.cmd;
        let mut pos = 0;
        let mut next = 0;
        let mut open: Option<usize> = None;
        while let Some(tok) = tokens.get(pos) {
            if let Kind::Complete(p) = &tok.kind {
                let target = open.or_else(|| self.next_positional(next));
                return Err(Unwind::Complete(self.candidates(p, target, true, ctx)));
            }
            open = None;
            if let Some((idx, variant)) = self.named_at(tokens, pos) {
                if self.named[idx] {
                    return Err(CliError::Argument(format!("argument '{}' given twice", cmd.args[idx].names[variant])).into());
                }
                self.named[idx] = true;
                pos += 2;
                if let Some(Kind::Complete(p)) = tokens.get(pos).map(|t| &t.kind) {
                    return Err(Unwind::Complete(self.candidates(p, Some(idx), false, ctx)));
                }
                let spec = cmd.args[idx].spec.when_named();
                let (bound, used) =
                    self.consume(idx, Some(variant), spec, &tokens[pos..], ctx).map_err(|e| with_context(cmd, idx, e))?;
                self.slots[idx] = Some(bound);
                pos += used;
                continue;
            }
            if let Kind::Flag(f) = &tok.kind {
                if let Some((idx, variant)) = self.flag_at(f) {
                    if self.flagged[idx] {
                        let prev = self.slots[idx].as_ref().map(|b| b.variant).unwrap_or(variant);
                        let msg = if prev == variant {
                            format!("flag '{f}' given twice")
                        } else {
                            format!("flags '{}' and '{f}' are mutually exclusive", cmd.args[idx].names[prev])
                        };
                        return Err(CliError::Argument(msg).into());
                    }
                    self.flagged[idx] = true;
                    self.slots[idx] = Some(Bound { value: Value::Bool(true), variant, supplied: true });
                    pos += 1;
                    continue;
                }
            }
            let Some(idx) = self.next_positional(next) else {
                break;
            };
            let arg = &cmd.args[idx];
            match self.consume(idx, None, arg.spec, &tokens[pos..], ctx) {
                Ok((bound, used)) => {
                    self.slots[idx] = Some(bound);
                    pos += used;
                    if arg.spec.is_variadic() && matches!(tokens.get(pos).map(|t| &t.kind), Some(Kind::Complete(_))) {
                        open = Some(idx);
                    }
                }
                Err(e) if e.is_type_mismatch() && arg.spec.is_optional() => {
                    self.slots[idx] = Some(Bound::default_for(arg));
                }
                Err(e) => return Err(with_context(cmd, idx, e).into()),
            }
            next = idx + 1;
        }
        if pos < tokens.len() && !infix && cmd.check_args {
            let msg = match &tokens[pos].kind {
                Kind::Flag(f) => format!("unknown flag '{f}' for '{}'", cmd.display_name()),
                _ => format!(
                    "too many arguments for '{}': unexpected '{}'",
                    cmd.display_name(),
                    tokens[pos].to_source()
                ),
            };
            return Err(CliError::Argument(msg).into());
        }
        let values = self.finish()?;
        Ok((values, pos))
    }

    fn finish(self) -> Result<Vec<Bound>, CliError> {
        let cmd = self.cmd;
        self.slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| match slot {
                Some(b) => Ok(b),
                None => missing(cmd, i),
            })
            .collect()
    }
}

fn missing(cmd: &Command, idx: usize) -> Result<Bound, CliError> {
    let arg = &cmd.args[idx];
    match arg.spec {
        Spec::Optional | Spec::Many => Ok(Bound::default_for(arg)),
        Spec::One | Spec::OneOrMore => Err(CliError::Argument(format!(
            "argument {} ({}) missing for '{}'",
            idx + 1,
            arg.names.join("|"),
            cmd.display_name()
        ))),
    }
}

/// Bind `tokens` to `cmd`'s arguments.  Returns the bound values and how
/// many tokens were consumed.  In `infix` mode surplus tokens are left for
/// the caller.
pub fn bind(cmd: &Command, tokens: &[Token], infix: bool, ctx: &mut TypeCtx) -> EvalResult<(Vec<Bound>, usize)> {
    Binder::new(cmd).run(tokens, infix, ctx)
}

// ── Programmatic binding ──────────────────────────────────────────────────────

/// Python keywords; argument names colliding with them get a `_` suffix.
const RESERVED_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del",
    "elif", "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda", "nonlocal",
    "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

/// An externally visible keyword for programmatic calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct External {
    pub name: String,
    pub arg: usize,
    /// Specific polymorphic variant, or `None` to try all in order.
    pub variant: Option<usize>,
}

/// Keyword names for programmatic calls: dashes become underscores, leading
/// dashes are dropped, and collisions get `_` appended until unique.
pub fn external_names(cmd: &Command) -> Vec<External> {
    let mut used: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for (i, arg) in cmd.args.iter().enumerate() {
        let collapsed = arg.is_poly() && arg.names.iter().all(|n| n.is_empty() || *n == arg.names[0]);
        let variants: Vec<(Option<usize>, String)> = if collapsed || !arg.is_poly() {
            let name = if arg.name().is_empty() { format!("arg{}", i + 1) } else { arg.name().to_owned() };
            vec![(None, name)]
        } else {
            arg.names.iter().enumerate().map(|(v, n)| (Some(v), n.clone())).collect()
        };
        for (variant, raw) in variants {
            let mut name = raw.trim_start_matches('-').replace('-', "_");
            while RESERVED_KEYWORDS.contains(&name.as_str()) || used.contains(&name) {
                name.push('_');
            }
            used.insert(name.clone());
            out.push(External { name, arg: i, variant });
        }
    }
    out
}

/// Bind programmatic positional and keyword values to `cmd`.
pub fn bind_call(
    cmd: &Command,
    positional: &[Value],
    keywords: &[(String, Value)],
    ctx: &mut TypeCtx,
) -> Result<Vec<Bound>, CliError> {
    let n = cmd.args.len();
    if positional.len() > n {
        return Err(CliError::Argument(format!(
            "'{}' takes at most {n} arguments, {} given",
            cmd.display_name(),
            positional.len()
        )));
    }
    let mut given: Vec<Option<(Option<usize>, Value)>> = vec![None; n];
    let mut via_keyword: Vec<Option<String>> = vec![None; n];
    for (i, v) in positional.iter().enumerate() {
        given[i] = Some((None, v.clone()));
    }
    let externals = external_names(cmd);
    for (key, value) in keywords {
        let ext = externals
            .iter()
            .find(|e| e.name == *key)
            .ok_or_else(|| CliError::Argument(format!("'{}' has no argument '{key}'", cmd.display_name())))?;
        let arg = &cmd.args[ext.arg];
        if arg.is_flag_only() && !value.as_bool() {
            continue;
        }
        if given[ext.arg].is_some() {
            let msg = match &via_keyword[ext.arg] {
                Some(prev) if prev != key => format!("only one of '{prev}' and '{key}' may be given"),
                _ => format!("argument '{key}' given twice"),
            };
            return Err(CliError::Argument(msg));
        }
        given[ext.arg] = Some((ext.variant, value.clone()));
        via_keyword[ext.arg] = Some(key.clone());
    }
    let mut out = Vec::with_capacity(n);
    for (i, slot) in given.into_iter().enumerate() {
        let arg = &cmd.args[i];
        let Some((variant, value)) = slot else {
            out.push(missing(cmd, i)?);
            continue;
        };
        let bound = if arg.spec.is_variadic() {
            let Value::List(items) = &value else {
                return Err(with_context(cmd, i, CliError::Value(format!("expected a list, got {}", value.repr()))));
            };
            if items.is_empty() && arg.spec == Spec::OneOrMore {
                return Err(CliError::Argument(format!("argument '{}' needs at least one value", arg.name())));
            }
            let mut first = None;
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                let (v, val) = normalize_variant(arg, variant, item, ctx).map_err(|e| with_context(cmd, i, e))?;
                first.get_or_insert(v);
                values.push(val);
            }
            Bound { value: Value::List(values), variant: first.unwrap_or(0), supplied: true }
        } else {
            let (v, val) = normalize_variant(arg, variant, &value, ctx).map_err(|e| with_context(cmd, i, e))?;
            Bound { value: val, variant: v, supplied: true }
        };
        out.push(bound);
    }
    Ok(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::host::StaticHost;
    use crate::script::registry::Reply;
    use crate::script::types;

    fn ctx() -> TypeCtx {
        TypeCtx::new(Arc::new(StaticHost::new()))
    }

    fn cmd(name: &str) -> Command {
        Command::new(name, |_, _| Ok(Reply::nil()))
    }

    fn t(kind: Kind) -> Token {
        Token::new(kind, 1)
    }

    fn w(s: &str) -> Token {
        Token::word(s, 1)
    }

    fn values(r: EvalResult<(Vec<Bound>, usize)>) -> Vec<Value> {
        match r {
            Ok((b, _)) => b.into_iter().map(|b| b.value).collect(),
            Err(e) => panic!("bind failed: {:?}", e),
        }
    }

    fn err(r: EvalResult<(Vec<Bound>, usize)>) -> CliError {
        match r {
            Err(Unwind::Error(e)) => e,
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn positional_in_order() {
        let c = cmd("c").arg(Arg::new(types::integer(), "a")).arg(Arg::new(types::string(), "b"));
        let got = values(bind(&c, &[t(Kind::Int(1)), w("x")], false, &mut ctx()));
        assert_eq!(got, vec![Value::Int(1), Value::from("x")]);
    }

    #[test]
    fn named_arguments() {
        let c = cmd("c").arg(Arg::new(types::integer(), "a")).arg(Arg::new(types::integer(), "b"));
        let toks = [w("b"), w("="), t(Kind::Int(2)), t(Kind::Int(1))];
        assert_eq!(values(bind(&c, &toks, false, &mut ctx())), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn named_twice_is_an_error_but_positional_then_named_is_not() {
        let c = cmd("c").arg(Arg::new(types::integer(), "a"));
        let twice = [w("a"), w("="), t(Kind::Int(1)), w("a"), w("="), t(Kind::Int(2))];
        assert!(matches!(err(bind(&c, &twice, false, &mut ctx())), CliError::Argument(_)));
        let c = cmd("c").arg(Arg::new(types::integer(), "a")).arg(Arg::new(types::integer(), "b").optional(0i64));
        let mixed = [t(Kind::Int(1)), w("a"), w("="), t(Kind::Int(5))];
        assert_eq!(values(bind(&c, &mixed, false, &mut ctx())), vec![Value::Int(5), Value::Int(0)]);
    }

    #[test]
    fn optional_mismatch_falls_back_to_default() {
        let c = cmd("c").arg(Arg::new(types::integer(), "n").optional(7i64)).arg(Arg::new(types::string(), "s"));
        assert_eq!(values(bind(&c, &[w("x")], false, &mut ctx())), vec![Value::Int(7), Value::from("x")]);
    }

    #[test]
    fn flags() {
        let c = cmd("c").arg(Arg::flag("-v")).arg(Arg::new(types::string(), "s"));
        let (b, _) = bind(&c, &[w("x"), t(Kind::Flag("-v".into()))], false, &mut ctx()).unwrap();
        let args = Args::new(&c, b, None);
        assert!(args.flag("-v"));
        let (b, _) = bind(&c, &[w("x")], false, &mut ctx()).unwrap();
        assert!(!Args::new(&c, b, None).flag("-v"));
        let e = err(bind(&c, &[w("x"), t(Kind::Flag("-q".into()))], false, &mut ctx()));
        assert!(e.to_string().contains("unknown flag"));
    }

    #[test]
    fn exclusive_poly_flags() {
        let c = cmd("c").arg(Arg::poly(vec![(types::flag("-r"), "-r"), (types::flag("-w"), "-w")]).optional(false));
        let toks = [t(Kind::Flag("-r".into())), t(Kind::Flag("-w".into()))];
        assert!(err(bind(&c, &toks, false, &mut ctx())).to_string().contains("mutually exclusive"));
        let (b, _) = bind(&c, &toks[1..], false, &mut ctx()).unwrap();
        let args = Args::new(&c, b, None);
        assert!(args.flag("-w"));
        assert!(!args.flag("-r"));
    }

    #[test]
    fn one_or_more_needs_a_value() {
        let c = cmd("c").arg(Arg::new(types::integer(), "n").one_or_more());
        assert!(bind(&c, &[], false, &mut ctx()).is_err());
        assert!(bind(&c, &[w("x")], false, &mut ctx()).is_err());
        let got = values(bind(&c, &[t(Kind::Int(3)), t(Kind::Int(1)), t(Kind::Int(2))], false, &mut ctx()));
        assert_eq!(got, vec![Value::List(vec![Value::Int(3), Value::Int(1), Value::Int(2)])]);
    }

    #[test]
    fn variadic_stops_at_mismatch_and_named_boundary() {
        let c = cmd("c")
            .arg(Arg::new(types::integer(), "n").many())
            .arg(Arg::new(types::string(), "s").optional("none"))
            .arg(Arg::new(types::integer(), "k").optional(0i64));
        let toks = [t(Kind::Int(1)), t(Kind::Int(2)), w("x"), w("k"), w("="), t(Kind::Int(9))];
        let got = values(bind(&c, &toks, false, &mut ctx()));
        assert_eq!(got, vec![
            Value::List(vec![Value::Int(1), Value::Int(2)]),
            Value::from("x"),
            Value::Int(9)
        ]);
    }

    #[test]
    fn list_token_substitutes_for_a_run() {
        let c = cmd("c").arg(Arg::new(types::integer(), "n").one_or_more());
        let toks = [t(Kind::List(vec![Value::Int(4), Value::Int(5)]))];
        assert_eq!(values(bind(&c, &toks, false, &mut ctx())), vec![Value::List(vec![Value::Int(4), Value::Int(5)])]);
    }

    #[test]
    fn too_many_arguments() {
        let c = cmd("c").arg(Arg::new(types::integer(), "n"));
        let toks = [t(Kind::Int(1)), t(Kind::Int(2))];
        assert!(err(bind(&c, &toks, false, &mut ctx())).to_string().contains("too many"));
        let (_, used) = bind(&c, &toks, true, &mut ctx()).unwrap();
        assert_eq!(used, 1);
        let lax = cmd("c").arg(Arg::new(types::integer(), "n")).no_arg_check();
        assert!(bind(&lax, &toks, false, &mut ctx()).is_ok());
    }

    #[test]
    fn mismatch_names_the_position() {
        let c = cmd("c").arg(Arg::new(types::integer(), "a")).arg(Arg::new(types::integer(), "b"));
        let e = err(bind(&c, &[t(Kind::Int(1)), w("x")], false, &mut ctx()));
        assert!(e.is_type_mismatch());
        assert!(e.to_string().starts_with("argument 2 (b)"));
    }

    #[test]
    fn missing_required() {
        let c = cmd("c").arg(Arg::new(types::integer(), "a"));
        assert!(err(bind(&c, &[], false, &mut ctx())).to_string().contains("missing"));
    }

    #[test]
    fn completion_lists_names_then_values() {
        let c = cmd("c")
            .arg(Arg::new(types::string_set(&["fast", "slow"]), "mode"))
            .arg(Arg::flag("-v"));
        let toks = [t(Kind::Complete(Partial::default()))];
        match bind(&c, &toks, false, &mut ctx()) {
            Err(Unwind::Complete(c)) => assert_eq!(c.candidates, vec!["mode=", "-v", "fast", "slow"]),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn completion_after_name() {
        let c = cmd("c").arg(Arg::new(types::boolean(), "on"));
        let toks = [w("on"), w("="), t(Kind::Complete(Partial { text: "T".into(), quoted: false }))];
        match bind(&c, &toks, false, &mut ctx()) {
            Err(Unwind::Complete(c)) => assert_eq!(c.candidates, vec!["TRUE"]),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn external_name_mangling() {
        let c = cmd("c")
            .arg(Arg::new(types::integer(), "from"))
            .arg(Arg::flag("-from"))
            .arg(Arg::new(types::string(), "file-name"));
        let names: Vec<String> = external_names(&c).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["from_", "from__", "file_name"]);
    }

    #[test]
    fn bind_call_positional_and_keywords() {
        let c = cmd("c")
            .arg(Arg::new(types::integer(), "a"))
            .arg(Arg::new(types::string(), "b").optional("d"))
            .arg(Arg::flag("-all"));
        let b = bind_call(&c, &[Value::Int(1)], &[("all".into(), Value::Bool(true))], &mut ctx()).unwrap();
        let args = Args::new(&c, b, None);
        assert_eq!(args.get(0), &Value::Int(1));
        assert_eq!(args.get(1), &Value::from("d"));
        assert!(args.flag("-all"));
        let e = bind_call(&c, &[Value::Int(1)], &[("a".into(), Value::Int(2))], &mut ctx()).unwrap_err();
        assert!(e.to_string().contains("twice"));
        assert!(bind_call(&c, &[], &[("zzz".into(), Value::Nil)], &mut ctx()).is_err());
    }

    #[test]
    fn bind_call_rejects_two_poly_variants() {
        let c = cmd("c").arg(Arg::poly(vec![(types::integer(), "count"), (types::string(), "name")]));
        let kw = [("count".to_string(), Value::Int(1)), ("name".to_string(), Value::from("x"))];
        let e = bind_call(&c, &[], &kw, &mut ctx()).unwrap_err();
        assert!(e.to_string().contains("only one of"));
        let b = bind_call(&c, &[], &kw[1..], &mut ctx()).unwrap();
        assert_eq!(b[0].variant, 1);
    }

    #[test]
    fn bind_call_normalizes() {
        let c = cmd("c").arg(Arg::new(types::uint8(), "b"));
        assert!(bind_call(&c, &[Value::Int(300)], &[], &mut ctx()).is_err());
        let c = cmd("c").arg(Arg::new(types::integer(), "n").one_or_more());
        assert!(bind_call(&c, &[Value::List(vec![])], &[], &mut ctx()).is_err());
    }
}
