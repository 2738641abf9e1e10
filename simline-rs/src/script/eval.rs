//! Statement evaluation.
//!
//! A statement is a token run.  Control constructs (`if`, `while`, `foreach`,
//! `try`, `script-branch`, `local`) are recognised by their leading word;
//! everything else is *reduced*: sub-expressions and variables are resolved
//! to values, then the highest-priority command in the run is applied and its
//! result spliced back in, until a single token is left.

use std::sync::Arc;

use crate::error::{CliError, EvalResult, Unwind};
use crate::var::{check_name, Scope};

use super::binder::{bind, Bound};
use super::interp::Interp;
use super::registry::Command;
use super::token::{render, statements, AssignOp, AssignTarget, Kind, ReturnMode, Token};
use super::value::Value;

/// Words with a meaning of their own at the start of a statement.
pub const KEYWORDS: &[&str] = &["if", "else", "while", "foreach", "in", "try", "except", "script-branch", "local", "break", "continue"];

/// Commands whose arguments are taken as one raw topic string.
const HELP_COMMANDS: &[&str] = &["help", "h", "man"];

fn syntax(msg: impl Into<String>) -> Unwind {
    CliError::Syntax(msg.into()).into()
}

/// The operation chosen for the next reduction step.
enum Op {
    /// Command at position 0, optionally a method on an object.
    Prefix { cmd: Arc<Command>, object: Option<Value> },
    /// Infix command at this position.
    Infix { pos: usize, cmd: Arc<Command> },
    /// A run of `[..]` index tokens starting here.
    Index { pos: usize, cmd: Arc<Command> },
}

impl Interp {
    // ── Statements ────────────────────────────────────────────────────────────

    /// Evaluate statements in the current scope; the value of the last wins.
    pub(crate) fn eval_sequence(&mut self, tokens: Vec<Token>) -> EvalResult<Token> {
        let mut last = Token::nil(self.line);
        for stmt in statements(tokens) {
            last = self.eval_statement(stmt)?;
        }
        Ok(last)
    }

    /// Evaluate a `{ ... }` body in a child scope.
    pub(crate) fn eval_block(&mut self, body: &[Token]) -> EvalResult<Token> {
        let child = Scope::child(&self.scope);
        let saved = std::mem::replace(&mut self.scope, child);
        let result = self.eval_sequence(body.to_vec());
        self.scope = saved;
        result
    }

    pub(crate) fn eval_statement(&mut self, mut tokens: Vec<Token>) -> EvalResult<Token> {
        let Some(first) = tokens.first() else {
            return Ok(Token::nil(self.line));
        };
        self.line = first.line;
        log::trace!("eval: {}", render(&tokens));
        if let Some(word) = first.as_word() {
            match word {
                "if" => return self.eval_if(&tokens),
                "while" => return self.eval_while(&tokens),
                "foreach" => return self.eval_foreach(&tokens),
                "try" => return self.eval_try(&tokens),
                "script-branch" => return self.eval_branch(&tokens),
                "local" => return self.eval_local(&tokens),
                "break" if tokens.len() == 1 => return Err(Unwind::Break),
                "continue" if tokens.len() == 1 => return Err(Unwind::Continue),
                "else" => return Err(syntax("'else' without 'if'")),
                "except" => return Err(syntax("'except' without 'try'")),
                w if HELP_COMMANDS.contains(&w) && self.registry().exists(w) => tokens = help_topic(tokens),
                _ => {}
            }
        }
        self.reduce(tokens)
    }

    // ── Control constructs ────────────────────────────────────────────────────

    /// Reduce `tokens` and take the result as a condition.
    fn condition(&mut self, tokens: &[Token]) -> EvalResult<bool> {
        Ok(self.reduce_value(tokens.to_vec())?.as_bool())
    }

    fn eval_if(&mut self, tokens: &[Token]) -> EvalResult<Token> {
        let b = block_after(tokens, 1, "if")?;
        let Kind::Block(body) = &tokens[b].kind else {
            return Err(syntax("if: missing block"));
        };
        let rest = &tokens[b + 1..];
        let otherwise = match rest {
            [] => None,
            [e, ..] if !e.is_word("else") => return Err(syntax(format!("unexpected '{}' after if block", e.to_source()))),
            [_, blk] if matches!(blk.kind, Kind::Block(_)) => Some(rest[1..].to_vec()),
            [_, i, ..] if i.is_word("if") => Some(rest[1..].to_vec()),
            _ => return Err(syntax("else: expected '{' or 'if'")),
        };
        if self.condition(&tokens[1..b])? {
            return self.eval_block(body);
        }
        match otherwise.as_deref() {
            None => Ok(Token::nil(self.line)),
            Some([Token { kind: Kind::Block(body), .. }]) => self.eval_block(body),
            Some(chain) => self.eval_if(chain),
        }
    }

    /// Run one loop body; `Ok(false)` means the loop was broken.
    fn loop_body(&mut self, body: &[Token], last: &mut Option<Token>) -> EvalResult<bool> {
        if let Some(prev) = last.take() {
            if self.interactive {
                self.print_result(&prev);
            }
        }
        match self.eval_block(body) {
            Ok(tok) => {
                *last = Some(tok);
                Ok(true)
            }
            Err(Unwind::Break) => Ok(false),
            Err(Unwind::Continue) => Ok(true),
            Err(e) => Err(e),
        }
    }

    fn eval_while(&mut self, tokens: &[Token]) -> EvalResult<Token> {
        let b = block_after(tokens, 1, "while")?;
        let Kind::Block(body) = &tokens[b].kind else {
            return Err(syntax("while: missing block"));
        };
        if let Some(extra) = tokens.get(b + 1) {
            return Err(syntax(format!("unexpected '{}' after while block", extra.to_source())));
        }
        let mut last = None;
        while self.condition(&tokens[1..b])? {
            if !self.loop_body(body, &mut last)? {
                break;
            }
        }
        Ok(last.unwrap_or_else(|| Token::nil(self.line)))
    }

    fn eval_foreach(&mut self, tokens: &[Token]) -> EvalResult<Token> {
        let Some(Kind::Var(var)) = tokens.get(1).map(|t| &t.kind) else {
            return Err(syntax("foreach: expected a '$variable'"));
        };
        if !tokens.get(2).is_some_and(|t| t.is_word("in")) {
            return Err(syntax("foreach: expected 'in'"));
        }
        let b = block_after(tokens, 3, "foreach")?;
        let Kind::Block(body) = &tokens[b].kind else {
            return Err(syntax("foreach: missing block"));
        };
        if let Some(extra) = tokens.get(b + 1) {
            return Err(syntax(format!("unexpected '{}' after foreach block", extra.to_source())));
        }
        check_name(var)?;
        let items = match self.reduce_value(tokens[3..b].to_vec())? {
            Value::List(items) => items,
            other => return Err(CliError::Type(format!("foreach: expected a list, got {}", other.type_name())).into()),
        };

        let child = Scope::child(&self.scope);
        let saved = std::mem::replace(&mut self.scope, child);
        let mut last = None;
        let mut result = Ok(());
        for item in items {
            self.scope.set_local(var, item);
            match self.loop_body(body, &mut last) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        self.scope = saved;
        result?;
        Ok(last.unwrap_or_else(|| Token::nil(self.line)))
    }

    fn eval_try(&mut self, tokens: &[Token]) -> EvalResult<Token> {
        let (Some(Kind::Block(body)), true, Some(Kind::Block(handler)), 4) = (
            tokens.get(1).map(|t| &t.kind),
            tokens.get(2).is_some_and(|t| t.is_word("except")),
            tokens.get(3).map(|t| &t.kind),
            tokens.len(),
        ) else {
            return Err(syntax("expected 'try { ... } except { ... }'"));
        };
        match self.eval_block(body) {
            Err(Unwind::Error(e)) if !e.is_quiet() => {
                log::debug!("try: caught {e}");
                self.set_last_error(e.message());
                self.eval_block(handler)
            }
            other => other,
        }
    }

    /// `script-branch ["description"] { body }`
    fn eval_branch(&mut self, tokens: &[Token]) -> EvalResult<Token> {
        let (desc, body) = match tokens {
            [_, Token { kind: Kind::Block(body), .. }] => ("script-branch".to_owned(), body),
            [_, d, Token { kind: Kind::Block(body), .. }] => match &d.kind {
                Kind::Quoted(s) | Kind::Word(s) => (s.clone(), body),
                _ => return Err(syntax("script-branch: description must be a string")),
            },
            _ => return Err(syntax("expected 'script-branch { ... }'")),
        };
        let id = self.spawn_branch(body.clone(), &desc)?;
        Ok(Token::from_value(Value::from(id as i128), self.line).with_ret(Some(ReturnMode::Quiet)))
    }

    /// `local $v` or `local $v = expr`
    fn eval_local(&mut self, tokens: &[Token]) -> EvalResult<Token> {
        let (name, value) = match tokens.get(1).map(|t| &t.kind) {
            Some(Kind::Var(name)) if tokens.len() == 2 => (name.clone(), Value::Nil),
            Some(Kind::Assign { target: AssignTarget::Var(name), op: AssignOp::Set }) if tokens.len() > 2 => {
                (name.clone(), self.reduce_value(tokens[2..].to_vec())?)
            }
            _ => return Err(syntax("expected 'local $name' or 'local $name = value'")),
        };
        check_name(&name)?;
        self.scope.set_local(&name, value.clone());
        Ok(Token::from_value(value, self.line).with_ret(Some(ReturnMode::Quiet)))
    }

    // ── Reduction ─────────────────────────────────────────────────────────────

    pub(crate) fn reduce_value(&mut self, tokens: Vec<Token>) -> EvalResult<Value> {
        if tokens.is_empty() {
            return Err(syntax("missing value"));
        }
        let tok = self.reduce(tokens)?;
        tok.as_value()
            .ok_or_else(|| syntax(format!("expected a value, got '{}'", tok.to_source())))
    }

    /// Reduce a statement to a single token.
    pub(crate) fn reduce(&mut self, mut tokens: Vec<Token>) -> EvalResult<Token> {
        if matches!(tokens.first().map(|t| &t.kind), Some(Kind::Assign { .. })) {
            return self.eval_assign(&tokens);
        }
        if let Some(result) = self.index_assignment(&tokens) {
            return result;
        }
        self.resolve_operands(&mut tokens)?;
        loop {
            fuse_members(&mut tokens);
            let Some((op, others)) = self.next_op(&tokens) else { break };
            self.apply(&mut tokens, op, others)?;
        }
        self.finish(tokens)
    }

    /// Evaluate sub-expressions, list literals, variables and registers.
    fn resolve_operands(&mut self, tokens: &mut Vec<Token>) -> EvalResult<()> {
        for i in 0..tokens.len() {
            let replacement = match &tokens[i].kind {
                Kind::Expr(inner) => Some(self.eval_sequence(inner.clone())?),
                Kind::ListLit(elems) => {
                    let mut items = Vec::with_capacity(elems.len());
                    for elem in elems.clone() {
                        items.push(self.reduce_value(elem)?);
                    }
                    Some(Token::from_value(Value::List(items), tokens[i].line))
                }
                Kind::Var(name) => {
                    let value = self
                        .get_var(name)
                        .ok_or_else(|| CliError::Value(format!("No CLI variable '{name}'")))?;
                    Some(Token::from_value(value, tokens[i].line))
                }
                Kind::Reg(name) => Some(Token::from_value(self.host().read_register(name)?, tokens[i].line)),
                Kind::Stray(c) => return Err(syntax(format!("unexpected '{c}'"))),
                Kind::Unicode(w) => {
                    log::warn!("identifier '{w}' contains non-ASCII characters");
                    None
                }
                _ => None,
            };
            if let Some(mut tok) = replacement {
                tok.spaced = tokens[i].spaced;
                tok.line = tokens[i].line;
                tokens[i] = tok;
            }
        }

        let mut i = 0;
        while i < tokens.len() {
            if let Kind::AddrPrefix(space) = &tokens[i].kind {
                let Some(offset) = tokens.get(i + 1).and_then(|t| t.as_value()).and_then(|v| v.as_int()) else {
                    return Err(syntax(format!("address prefix '{space}:' needs an integer offset")));
                };
                tokens[i].kind = Kind::Address { space: space.clone(), offset };
                tokens.remove(i + 1);
            }
            i += 1;
        }
        Ok(())
    }

    /// Pick the highest-priority operation; ties go to the leftmost.  The
    /// flag reports whether any other candidate exists.
    fn next_op(&self, tokens: &[Token]) -> Option<(Op, bool)> {
        let mut best: Option<(i32, Op)> = None;
        let mut count = 0;
        for (i, tok) in tokens.iter().enumerate() {
            let candidate = match &tok.kind {
                Kind::Word(w) if i == 0 => {
                    let found = self.registry().lookup(w);
                    match found {
                        Some(cmd) if !cmd.infix => Some((cmd.pri, Op::Prefix { cmd, object: None })),
                        Some(_) => None,
                        None if self.resolve_object(w).is_some() => None,
                        None => self
                            .resolve_method(w)
                            .map(|(cmd, obj)| (cmd.pri, Op::Prefix { cmd, object: Some(Value::Object(obj.name)) })),
                    }
                }
                Kind::Word(w) => {
                    let found = self.registry().lookup(w);
                    found.filter(|c| c.infix).map(|cmd| (cmd.pri, Op::Infix { pos: i, cmd }))
                }
                Kind::Index(_) if i > 0 && !matches!(tokens[i - 1].kind, Kind::Index(_)) => {
                    let found = self.registry().lookup("[");
                    found.map(|cmd| (cmd.pri, Op::Index { pos: i, cmd }))
                }
                _ => None,
            };
            if let Some((pri, op)) = candidate {
                count += 1;
                if best.as_ref().map_or(true, |(p, _)| pri > *p) {
                    best = Some((pri, op));
                }
            }
        }
        best.map(|(_, op)| (op, count > 1))
    }

    fn apply(&mut self, tokens: &mut Vec<Token>, op: Op, others: bool) -> EvalResult<()> {
        let line = tokens.first().map_or(self.line, |t| t.line);
        match op {
            Op::Prefix { cmd, object } => {
                let (bound, used) = self.bind_tokens(&cmd, &tokens[1..], others)?;
                let result = self.invoke(&cmd, bound, object)?;
                tokens.splice(0..1 + used, [result]);
            }
            Op::Infix { pos, cmd } => {
                if pos == 0 {
                    return Err(syntax(format!("missing left operand for '{}'", cmd.name)));
                }
                // A plain `obj->attr` read takes exactly the attribute name.
                let read = cmd.name == "->" && !self.attribute_write(tokens, pos)?;
                let take = if read { 1 } else { tokens.len() };
                let mut args = Vec::with_capacity(tokens.len() - pos);
                args.push(tokens[pos - 1].clone());
                args.extend(tokens[pos + 1..].iter().take(take).cloned());
                let (bound, used) = self.bind_tokens(&cmd, &args, true)?;
                let result = self.invoke(&cmd, bound, None)?;
                tokens.splice(pos - 1..pos + used.max(1), [result]);
            }
            Op::Index { pos, cmd } => {
                let mut end = pos;
                let mut indices = Vec::new();
                while let Some(Kind::Index(elems)) = tokens.get(end).map(|t| t.kind.clone()) {
                    for elem in elems {
                        indices.push(self.reduce_value(elem)?);
                    }
                    end += 1;
                }
                let args = [tokens[pos - 1].clone(), Token::from_value(Value::List(indices), line)];
                let (bound, _) = self.bind_tokens(&cmd, &args, false)?;
                let result = self.invoke(&cmd, bound, None)?;
                tokens.splice(pos - 1..end, [result]);
            }
        }
        Ok(())
    }

    fn bind_tokens(&mut self, cmd: &Command, tokens: &[Token], lenient: bool) -> EvalResult<(Vec<Bound>, usize)> {
        let mut ctx = self.type_ctx();
        let result = bind(cmd, tokens, lenient, &mut ctx);
        self.flush_notices(ctx);
        result
    }

    /// `obj->attr = value` (and `+=`, `-=`): the whole rest of the statement
    /// is the value, passed to `->` as `-w`, `-i` or `-d`.  Returns `false`
    /// for a plain read.
    fn attribute_write(&mut self, tokens: &mut Vec<Token>, pos: usize) -> EvalResult<bool> {
        let Some(op) = tokens.get(pos + 2).and_then(Token::as_word).and_then(AssignOp::from_symbol) else {
            return Ok(false);
        };
        let line = tokens[pos].line;
        let rest = tokens.split_off(pos + 3);
        let value = self.reduce_value(rest)?;
        tokens.truncate(pos + 2);
        let flag = match op {
            AssignOp::Set => "-w",
            AssignOp::Add => "-i",
            AssignOp::Sub => "-d",
        };
        tokens.push(Token::new(Kind::Flag(flag.to_owned()), line));
        tokens.push(Token::from_value(value, line));
        Ok(true)
    }

    /// What is left after no more commands apply.
    fn finish(&mut self, tokens: Vec<Token>) -> EvalResult<Token> {
        let Some(first) = tokens.first() else {
            return Ok(Token::nil(self.line));
        };
        if let Kind::Word(w) | Kind::Unicode(w) = &first.kind {
            match self.resolve_object(w) {
                Some(obj) if tokens.len() == 1 => {
                    return Ok(Token::from_value(Value::Object(obj.name), first.line));
                }
                Some(_) => {}
                None => return Err(CliError::UnknownCommand(w.clone()).into()),
            }
        }
        if let Some(extra) = tokens.get(1) {
            if let Kind::Complete(partial) = &extra.kind {
                return Err(syntax(format!("cannot complete '{}' here", partial.text)));
            }
            return Err(syntax(format!("unexpected '{}'", extra.to_source())));
        }
        match &first.kind {
            Kind::Block(_) => Err(syntax("unexpected '{' block")),
            Kind::Flag(f) => Err(syntax(format!("unexpected flag '{f}'"))),
            _ => Ok(tokens.into_iter().next().unwrap_or_else(|| Token::nil(self.line))),
        }
    }

    // ── Assignment ────────────────────────────────────────────────────────────

    fn eval_assign(&mut self, tokens: &[Token]) -> EvalResult<Token> {
        let Kind::Assign { target, op } = &tokens[0].kind else {
            return Err(syntax("expected an assignment"));
        };
        if tokens.len() == 1 {
            return Err(syntax(format!("missing value after '{}'", tokens[0].to_source())));
        }
        let value = self.reduce_value(tokens[1..].to_vec())?;
        let new = match target {
            AssignTarget::Var(name) => {
                check_name(name)?;
                let new = match op {
                    AssignOp::Set => value,
                    _ => {
                        let cur = self
                            .get_var(name)
                            .ok_or_else(|| CliError::Value(format!("No CLI variable '{name}'")))?;
                        combine(*op, &cur, &value)?
                    }
                };
                self.scope.set(name, new.clone());
                new
            }
            AssignTarget::Reg(name) => {
                let new = match op {
                    AssignOp::Set => value,
                    _ => combine(*op, &self.host().read_register(name)?, &value)?,
                };
                self.host().write_register(name, new.clone())?;
                new
            }
        };
        Ok(Token::from_value(new, tokens[0].line).with_ret(Some(ReturnMode::Quiet)))
    }

    /// `$v[i][j] = value` at the start of a statement.
    fn index_assignment(&mut self, tokens: &[Token]) -> Option<EvalResult<Token>> {
        let Kind::Var(name) = &tokens.first()?.kind else { return None };
        let depth = tokens[1..].iter().take_while(|t| matches!(t.kind, Kind::Index(_))).count();
        if depth == 0 {
            return None;
        }
        let op = tokens.get(1 + depth).and_then(Token::as_word).and_then(AssignOp::from_symbol)?;
        Some(self.assign_element(name, &tokens[1..1 + depth], op, tokens[2 + depth..].to_vec()))
    }

    fn assign_element(&mut self, name: &str, index: &[Token], op: AssignOp, rest: Vec<Token>) -> EvalResult<Token> {
        let mut path = Vec::new();
        for tok in index {
            if let Kind::Index(elems) = &tok.kind {
                for elem in elems.clone() {
                    path.push(self.reduce_value(elem)?);
                }
            }
        }
        let value = self.reduce_value(rest)?;
        let mut root = self
            .get_var(name)
            .ok_or_else(|| CliError::Value(format!("No CLI variable '{name}'")))?;
        let new = set_path(&mut root, &path, op, value)?;
        self.scope.set(name, root);
        Ok(Token::from_value(new, self.line).with_ret(Some(ReturnMode::Quiet)))
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Index of the first block at or after `from`.
fn block_after(tokens: &[Token], from: usize, what: &str) -> EvalResult<usize> {
    let b = tokens[from.min(tokens.len())..]
        .iter()
        .position(|t| matches!(t.kind, Kind::Block(_)))
        .map(|p| p + from)
        .ok_or_else(|| syntax(format!("{what}: missing '{{' block")))?;
    if b == from {
        return Err(syntax(format!("{what}: missing condition")));
    }
    Ok(b)
}

/// `help foo bar` looks up the topic "foo bar"; flags stay flags.
fn help_topic(tokens: Vec<Token>) -> Vec<Token> {
    let mut iter = tokens.into_iter();
    let Some(head) = iter.next() else { return Vec::new() };
    let line = head.line;
    let mut out = vec![head];
    let mut topic = String::new();
    for tok in iter {
        match &tok.kind {
            Kind::Flag(_) | Kind::Complete(_) => out.push(tok),
            Kind::Quoted(s) => topic.push_str(s),
            _ => {
                if !topic.is_empty() && tok.spaced {
                    topic.push(' ');
                }
                topic.push_str(&tok.to_source());
            }
        }
    }
    if !topic.is_empty() {
        out.push(Token { spaced: true, ..Token::new(Kind::Quoted(topic), line) });
    }
    out
}

/// Glue `.name` onto the token before it, and `name.` onto the token after.
fn fuse_members(tokens: &mut Vec<Token>) {
    let mut i = 1;
    while i < tokens.len() {
        let fused = match (&tokens[i - 1].kind, &tokens[i].kind) {
            _ if tokens[i].spaced => None,
            (_, Kind::Word(w)) if w.starts_with('.') => tokens[i - 1].name_text().map(|p| format!("{p}{w}")),
            (Kind::Word(w), _) if w.ends_with('.') => tokens[i].name_text().map(|s| format!("{w}{s}")),
            _ => None,
        };
        match fused {
            Some(name) => {
                tokens[i - 1].kind = Kind::Word(name);
                tokens.remove(i);
            }
            None => i += 1,
        }
    }
}

fn combine(op: AssignOp, cur: &Value, value: &Value) -> Result<Value, CliError> {
    match op {
        AssignOp::Set => Ok(value.clone()),
        AssignOp::Add => cur.arith_add(value),
        AssignOp::Sub => cur.arith_sub(value),
    }
}

fn index_of(idx: &Value, len: usize) -> Result<usize, CliError> {
    let i = idx
        .as_int()
        .ok_or_else(|| CliError::Type(format!("list index must be an integer, got {}", idx.type_name())))?;
    usize::try_from(i)
        .ok()
        .filter(|&i| i < len)
        .ok_or_else(|| CliError::Value(format!("list index {i} out of range")))
}

/// Element of `value` at `path`; strings index by character.
pub(crate) fn element(value: &Value, path: &[Value]) -> Result<Value, CliError> {
    let Some((idx, rest)) = path.split_first() else {
        return Ok(value.clone());
    };
    match value {
        Value::List(items) => element(&items[index_of(idx, items.len())?], rest),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let c = chars[index_of(idx, chars.len())?];
            element(&Value::Str(c.to_string()), rest)
        }
        other => Err(CliError::Type(format!("cannot index a value of type {}", other.type_name()))),
    }
}

/// Update the element at `path` in place; an index one past the end of a
/// list appends.  Returns the element's new value.
fn set_path(target: &mut Value, path: &[Value], op: AssignOp, value: Value) -> Result<Value, CliError> {
    let Some((idx, rest)) = path.split_first() else {
        let new = combine(op, target, &value)?;
        *target = new.clone();
        return Ok(new);
    };
    let Value::List(items) = target else {
        return Err(CliError::Type(format!("cannot assign into a value of type {}", target.type_name())));
    };
    if rest.is_empty() && op == AssignOp::Set && idx.as_int() == i128::try_from(items.len()).ok() {
        items.push(value.clone());
        return Ok(value);
    }
    let i = index_of(idx, items.len())?;
    set_path(&mut items[i], rest, op, value)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::host::{BufferOutput, StaticHost};

    fn interp() -> (Interp, BufferOutput) {
        let out = BufferOutput::new();
        let host = StaticHost::new();
        host.add_class("processor", None, &[])
            .add_object("cpu0", "processor")
            .init_attr("cpu0", "freq", Value::Int(100))
            .set_register("pc", Value::Int(0x1000));
        let i = Interp::new(Arc::new(host), Settings::default(), Box::new(out.clone())).unwrap();
        (i, out)
    }

    fn run(i: &mut Interp, text: &str) -> Value {
        i.run(text).unwrap_or_else(|e| panic!("{text}: {e}"))
    }

    #[test]
    fn operator_priorities() {
        let (mut i, _) = interp();
        assert_eq!(run(&mut i, "1 + 2 * 3"), Value::Int(7));
        assert_eq!(run(&mut i, "(1 + 2) * 3"), Value::Int(9));
        assert_eq!(run(&mut i, "10 - 2 - 3"), Value::Int(5));
        assert_eq!(run(&mut i, "1 + 1 == 2 and 3 > 2"), Value::Bool(true));
        assert_eq!(run(&mut i, "not 1 == 2"), Value::Bool(true));
    }

    #[test]
    fn variables_and_assignment_forms() {
        let (mut i, _) = interp();
        run(&mut i, "$x = 5");
        run(&mut i, "$x += 2");
        assert_eq!(run(&mut i, "$x"), Value::Int(7));
        run(&mut i, "$x -= 10");
        assert_eq!(i.get_var("x"), Some(Value::Int(-3)));
        assert!(i.run("$y += 1").is_err());
        assert!(i.run("echo $nope").unwrap_err().message().contains("No CLI variable 'nope'"));
    }

    #[test]
    fn registers() {
        let (mut i, _) = interp();
        assert_eq!(run(&mut i, "%pc + 4"), Value::Int(0x1004));
        run(&mut i, "%pc += 0x10");
        assert_eq!(i.host().read_register("pc").unwrap(), Value::Int(0x1010));
    }

    #[test]
    fn if_else_chains() {
        let (mut i, _) = interp();
        let prog = "$r = 0; if $x == 1 { $r = 10 } else if $x == 2 { $r = 20 } else { $r = 30 }; $r";
        for (x, want) in [(1, 10), (2, 20), (3, 30)] {
            i.set_var("x", Value::Int(x)).unwrap();
            assert_eq!(run(&mut i, prog), Value::Int(want));
        }
        assert!(i.run("if { }").is_err());
        assert!(i.run("else { }").is_err());
    }

    #[test]
    fn loops_break_and_continue() {
        let (mut i, _) = interp();
        let prog = "$n = 0; $s = 0\nwhile $n < 10 { $n += 1; if $n == 3 { continue }; if $n == 6 { break }; $s += $n }\n$s";
        assert_eq!(run(&mut i, prog), Value::Int(1 + 2 + 4 + 5));
        assert!(i.run("break").unwrap_err().message().contains("outside of a loop"));
    }

    #[test]
    fn foreach_scopes_its_variable() {
        let (mut i, _) = interp();
        run(&mut i, "$t = 0; foreach $v in [1, 2, 3] { $t += $v }");
        assert_eq!(i.get_var("t"), Some(Value::Int(6)));
        assert_eq!(i.get_var("v"), None);
        assert!(i.run("foreach $v in 5 { }").is_err());
    }

    #[test]
    fn local_shadows_in_blocks() {
        let (mut i, _) = interp();
        run(&mut i, "$x = 1; if TRUE { local $x = 2; $y = $x }");
        assert_eq!(i.get_var("x"), Some(Value::Int(1)));
        assert_eq!(i.get_var("y"), Some(Value::Int(2)));
    }

    #[test]
    fn try_except_records_message() {
        let (mut i, _) = interp();
        let v = run(&mut i, "try { bogus-command } except { get-error-message }");
        assert_eq!(v, Value::Str("Unknown command 'bogus-command'".into()));
    }

    #[test]
    fn attributes_and_object_names() {
        let (mut i, _) = interp();
        assert_eq!(run(&mut i, "cpu0"), Value::Object("cpu0".into()));
        assert_eq!(run(&mut i, "cpu0->freq"), Value::Int(100));
        run(&mut i, "cpu0->freq = 1 + 2");
        assert_eq!(run(&mut i, "cpu0->freq"), Value::Int(3));
        run(&mut i, "cpu0->freq += 7");
        assert_eq!(run(&mut i, "cpu0->freq"), Value::Int(10));
    }

    #[test]
    fn indexing_and_element_assignment() {
        let (mut i, _) = interp();
        run(&mut i, "$l = [1, [2, 3], 4]");
        assert_eq!(run(&mut i, "$l[1][0]"), Value::Int(2));
        run(&mut i, "$l[1][1] = 9");
        run(&mut i, "$l[0] += 1");
        assert_eq!(run(&mut i, "$l"), Value::List(vec![Value::Int(2), Value::List(vec![Value::Int(2), Value::Int(9)]), Value::Int(4)]));
        run(&mut i, "$l[3] = 5");
        assert_eq!(run(&mut i, "$l[3]"), Value::Int(5));
        assert!(i.run("$l[9] = 1").is_err());
        assert_eq!(run(&mut i, "\"abc\"[1]"), Value::Str("b".into()));
    }

    #[test]
    fn member_fusion() {
        let (mut i, _) = interp();
        i.set_var("o", Value::Object("cpu0".into())).unwrap();
        assert!(matches!(i.run("($o).bogus"), Err(e) if matches!(e.inner(), CliError::UnknownCommand(n) if n == "cpu0.bogus")));
    }

    #[test]
    fn addresses() {
        let (mut i, _) = interp();
        i.set_var("a", Value::Int(0x40)).unwrap();
        assert_eq!(run(&mut i, "p:$a"), Value::Address { space: "p".into(), offset: 0x40 });
    }

    #[test]
    fn leftovers_are_syntax_errors() {
        let (mut i, _) = interp();
        assert!(matches!(i.run("1 2").unwrap_err().inner(), CliError::Syntax(_)));
        assert!(matches!(i.run("echo )").unwrap_err().inner(), CliError::Syntax(_)));
        assert!(matches!(i.run("nosuch 1 2").unwrap_err().inner(), CliError::UnknownCommand(_)));
    }

    #[test]
    fn help_topic_rewrite() {
        let toks = help_topic(vec![Token::word("help", 1), Token::word("list", 1), Token { spaced: true, ..Token::word("variables", 1) }]);
        assert_eq!(toks.len(), 2);
        assert_eq!(toks[1].kind, Kind::Quoted("list variables".into()));
    }

    #[test]
    fn element_lookup() {
        let v = Value::List(vec![Value::Int(1), Value::List(vec![Value::Int(2)])]);
        assert_eq!(element(&v, &[Value::Int(1), Value::Int(0)]).unwrap(), Value::Int(2));
        assert!(element(&v, &[Value::Int(5)]).is_err());
        assert!(element(&Value::Int(1), &[Value::Int(0)]).is_err());
    }
}
