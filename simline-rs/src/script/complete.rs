//! Tab completion.
//!
//! The line is tokenized with [`COMPLETION_MARK`] appended, so the word being
//! typed comes out as a [`Kind::Complete`] token closing the innermost open
//! statement.  In command position it completes against command names,
//! keywords, object names and `object.method` forms.  After a command the
//! statement is handed to the binder, which answers with
//! [`Unwind::Complete`] when it reaches the marker.

use crate::error::Unwind;

use super::binder::bind;
use super::eval::KEYWORDS;
use super::interp::Interp;
use super::lexer::COMPLETION_MARK;
use super::token::{statements, Kind, Token};
use super::value::Value;

/// Candidate list carried by [`Unwind::Complete`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completions {
    pub candidates: Vec<String>,
    /// Candidates are file names (the front end may append `/` or quote).
    pub filenames: bool,
}

/// Keywords that may open a statement.
const LEADING_KEYWORDS: &[&str] = &["if", "while", "foreach", "try", "script-branch", "local", "break", "continue"];

impl Interp {
    /// Sorted completions for `partial`, the text left of the cursor, and
    /// whether they are file names.
    pub fn complete(&mut self, partial: &str) -> (Vec<String>, bool) {
        let text = format!("{partial}{COMPLETION_MARK}");
        let tokens = match self.tokenize(&text) {
            Ok(tokens) => tokens,
            Err(e) => {
                log::debug!("no completions for {partial:?}: {e}");
                return (Vec::new(), false);
            }
        };
        let Some(stmt) = innermost(tokens) else {
            return (Vec::new(), false);
        };
        let Completions { mut candidates, filenames } = self.candidates(&stmt);
        sort_candidates(&mut candidates);
        (candidates, filenames)
    }

    fn candidates(&mut self, stmt: &[Token]) -> Completions {
        let Some((last, head)) = stmt.split_last() else {
            return Completions::default();
        };
        let Kind::Complete(partial) = &last.kind else {
            return Completions::default();
        };
        if !partial.quoted {
            if let Some(prefix) = partial.text.strip_prefix('$') {
                return self.variable_names(prefix, "$");
            }
            if !last.spaced && head.last().is_some_and(|t| t.is_word("$")) {
                return self.variable_names(&partial.text, "");
            }
        }

        let keywords_only = head.iter().all(|t| t.as_word().is_some_and(|w| KEYWORDS.contains(&w)));
        if keywords_only && !partial.quoted {
            return Completions { candidates: self.command_names(&partial.text), filenames: false };
        }

        let Some(word) = head.first().and_then(Token::as_word) else {
            return Completions::default();
        };
        let found = self.registry().lookup(word);
        let cmd = match found {
            Some(cmd) if !cmd.infix => cmd,
            Some(_) => return Completions::default(),
            None => match self.resolve_method(word) {
                Some((cmd, _)) => cmd,
                None => return Completions::default(),
            },
        };
        let mut args: Vec<Token> = head[1..].iter().map(|t| self.placeholder(t)).collect();
        args.push(last.clone());
        let mut ctx = self.type_ctx();
        match bind(&cmd, &args, true, &mut ctx) {
            Err(Unwind::Complete(found)) => found,
            Err(Unwind::Error(e)) => {
                log::debug!("completion stopped: {e}");
                Completions::default()
            }
            _ => Completions::default(),
        }
    }

    /// Stand-in for a token the binder should not evaluate.
    fn placeholder(&self, tok: &Token) -> Token {
        let value = match &tok.kind {
            Kind::Expr(_) | Kind::Reg(_) | Kind::Index(_) => Value::Nil,
            Kind::ListLit(_) => Value::List(Vec::new()),
            Kind::Var(name) => self.get_var(name).unwrap_or_default(),
            _ => return tok.clone(),
        };
        Token { spaced: tok.spaced, ..Token::from_value(value, tok.line) }
    }

    fn variable_names(&self, prefix: &str, sigil: &str) -> Completions {
        let candidates = self
            .variables()
            .into_keys()
            .filter(|name| name.starts_with(prefix))
            .map(|name| format!("{sigil}{name}"))
            .collect();
        Completions { candidates, filenames: false }
    }

    /// Names valid in command position.
    fn command_names(&self, prefix: &str) -> Vec<String> {
        let mut out = Vec::new();
        if let Some((obj, _)) = prefix.rsplit_once('.') {
            if let Some(o) = self.resolve_object(obj) {
                let methods = self.registry().object_commands(&o.class, self.host().as_ref());
                out.extend(methods.iter().filter(|c| !c.hidden).map(|c| format!("{obj}.{}", c.name)));
            }
        }
        for cmd in self.registry().all() {
            if cmd.hidden || cmd.infix || cmd.class.is_some() || cmd.iface.is_some() {
                continue;
            }
            out.push(cmd.name.clone());
            out.extend(cmd.aliases.iter().cloned());
        }
        out.extend(LEADING_KEYWORDS.iter().map(|k| (*k).to_owned()));
        out.extend(self.host().object_names());
        out.retain(|c| c.starts_with(prefix));
        out
    }
}

/// The statement holding the completion marker, looking inside open
/// groups.
fn innermost(tokens: Vec<Token>) -> Option<Vec<Token>> {
    let stmt = statements(tokens).pop()?;
    match &stmt.last()?.kind {
        Kind::Complete(_) => Some(stmt),
        Kind::Expr(inner) | Kind::Block(inner) => innermost(inner.clone()),
        Kind::ListLit(elems) | Kind::Index(elems) => innermost(elems.last()?.clone()),
        _ => None,
    }
}

/// Alphabetic candidates first, then symbolic ones; no duplicates.
fn sort_candidates(candidates: &mut Vec<String>) {
    candidates.sort_by(|a, b| {
        let symbolic = |s: &str| !s.starts_with(|c: char| c.is_alphanumeric() || c == '_');
        (symbolic(a), a).cmp(&(symbolic(b), b))
    });
    candidates.dedup();
}

// ── Tests ─────────────────────────────────────────────────────────────────────
