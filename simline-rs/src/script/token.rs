//! Token model shared by the lexer, binder and evaluator.

use super::value::{quote, Value};

/// Annotation attached to a token produced as a command's result.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnMode {
    /// Never printed at top level.
    Quiet,
    /// Printed at top level when interactive.
    Verbose,
    /// Print this message instead of the value.
    Message(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Set => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
        }
    }

    pub fn from_symbol(s: &str) -> Option<Self> {
        match s {
            "=" => Some(AssignOp::Set),
            "+=" => Some(AssignOp::Add),
            "-=" => Some(AssignOp::Sub),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Var(String),
    Reg(String),
}

/// Partially typed text at the completion marker.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Partial {
    pub text: String,
    pub quoted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    /// `;` or newline.
    Separator,
    /// `{ ... }`
    Block(Vec<Token>),
    /// `( ... )`
    Expr(Vec<Token>),
    /// `[a, b]` after whitespace: a list literal, one token run per element.
    ListLit(Vec<Vec<Token>>),
    /// `[i]` directly after another token: indexing sugar.
    Index(Vec<Vec<Token>>),
    /// `,` inside brackets; only seen while the lexer builds elements.
    Comma,
    /// `-name`, stored with the leading dash.
    Flag(String),
    Var(String),
    Reg(String),
    /// `$x =`, `$x +=`, `%reg -=` ...
    Assign { target: AssignTarget, op: AssignOp },
    /// `p:` not followed by a literal offset.
    AddrPrefix(String),
    Int(i128),
    Float(f64),
    Bool(bool),
    Nil,
    Quoted(String),
    /// Unquoted identifier, name or operator symbol.
    Word(String),
    /// Unquoted identifier containing non-ASCII characters.
    Unicode(String),
    Address { space: String, offset: i128 },
    /// Evaluated list.
    List(Vec<Value>),
    /// Evaluated object reference.
    Object(String),
    /// Unmatched closing bracket.
    Stray(char),
    /// Text before the completion marker.
    Complete(Partial),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: Kind,
    pub line: u32,
    /// Preceded by whitespace (or the start of its group).
    pub spaced: bool,
    pub ret: Option<ReturnMode>,
}

impl Token {
    pub fn new(kind: Kind, line: u32) -> Self {
        Token { kind, line, spaced: true, ret: None }
    }

    pub fn word(text: impl Into<String>, line: u32) -> Self {
        Token::new(Kind::Word(text.into()), line)
    }

    pub fn nil(line: u32) -> Self {
        Token::new(Kind::Nil, line)
    }

    /// Wrap an evaluated value back into a token.
    pub fn from_value(value: Value, line: u32) -> Self {
        let kind = match value {
            Value::Nil => Kind::Nil,
            Value::Bool(b) => Kind::Bool(b),
            Value::Int(n) => Kind::Int(n),
            Value::Float(x) => Kind::Float(x),
            Value::Str(s) => Kind::Quoted(s),
            Value::List(items) => Kind::List(items),
            Value::Object(name) => Kind::Object(name),
            Value::Address { space, offset } => Kind::Address { space, offset },
        };
        Token::new(kind, line)
    }

    pub fn with_ret(mut self, ret: Option<ReturnMode>) -> Self {
        self.ret = ret;
        self
    }

    /// The value carried by a value-kind token.  Names are not values.
    pub fn as_value(&self) -> Option<Value> {
        Some(match &self.kind {
            Kind::Nil => Value::Nil,
            Kind::Bool(b) => Value::Bool(*b),
            Kind::Int(n) => Value::Int(*n),
            Kind::Float(x) => Value::Float(*x),
            Kind::Quoted(s) => Value::Str(s.clone()),
            Kind::List(items) => Value::List(items.clone()),
            Kind::Object(name) => Value::Object(name.clone()),
            Kind::Address { space, offset } => Value::Address { space: space.clone(), offset: *offset },
            _ => return None,
        })
    }

    pub fn is_value(&self) -> bool {
        self.as_value().is_some()
    }

    /// Text of an unquoted word.
    pub fn as_word(&self) -> Option<&str> {
        match &self.kind {
            Kind::Word(w) | Kind::Unicode(w) => Some(w),
            _ => None,
        }
    }

    pub fn is_word(&self, text: &str) -> bool {
        self.as_word() == Some(text)
    }

    pub fn is_separator(&self) -> bool {
        matches!(self.kind, Kind::Separator)
    }

    /// Text usable as part of a dotted name.
    pub fn name_text(&self) -> Option<String> {
        match &self.kind {
            Kind::Word(w) | Kind::Unicode(w) | Kind::Quoted(w) | Kind::Object(w) => Some(w.clone()),
            Kind::Int(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Render the token back to source text.
    pub fn to_source(&self) -> String {
        match &self.kind {
            Kind::Separator => ";".to_owned(),
            Kind::Block(inner) => format!("{{{}}}", render(inner)),
            Kind::Expr(inner) => format!("({})", render(inner)),
            Kind::ListLit(elems) | Kind::Index(elems) => {
                let parts: Vec<String> = elems.iter().map(|e| render(e)).collect();
                format!("[{}]", parts.join(", "))
            }
            Kind::Comma => ",".to_owned(),
            Kind::Flag(f) => f.clone(),
            Kind::Var(v) => format!("${v}"),
            Kind::Reg(r) => format!("%{r}"),
            Kind::Assign { target, op } => match target {
                AssignTarget::Var(v) => format!("${v} {}", op.symbol()),
                AssignTarget::Reg(r) => format!("%{r} {}", op.symbol()),
            },
            Kind::AddrPrefix(p) => format!("{p}:"),
            Kind::Quoted(s) => quote(s),
            Kind::Word(w) | Kind::Unicode(w) => w.clone(),
            Kind::Stray(c) => c.to_string(),
            Kind::Complete(p) => p.text.clone(),
            _ => self.as_value().map(|v| v.repr()).unwrap_or_default(),
        }
    }
}

/// Render a token run back to source text, keeping the original spacing.
pub fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (i, t) in tokens.iter().enumerate() {
        if i > 0 && t.spaced {
            out.push(' ');
        }
        out.push_str(&t.to_source());
    }
    out
}

/// Split a token run into statements at separators, dropping empty ones.
pub fn statements(tokens: Vec<Token>) -> Vec<Vec<Token>> {
    let mut out = Vec::new();
    let mut cur = Vec::new();
    for t in tokens {
        if t.is_separator() {
            if !cur.is_empty() {
                out.push(std::mem::take(&mut cur));
            }
        } else {
            cur.push(t);
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_round_trip() {
        for v in [
            Value::Nil,
            Value::Int(-3),
            Value::from("x"),
            Value::List(vec![Value::Int(1)]),
            Value::Object("cpu0".into()),
        ] {
            assert_eq!(Token::from_value(v.clone(), 1).as_value(), Some(v));
        }
    }

    #[test]
    fn words_are_not_values() {
        assert_eq!(Token::word("foo", 1).as_value(), None);
    }

    #[test]
    fn statements_split_on_separators() {
        let toks = vec![
            Token::new(Kind::Separator, 1),
            Token::word("a", 1),
            Token::new(Kind::Separator, 1),
            Token::new(Kind::Separator, 1),
            Token::word("b", 2),
            Token::word("c", 2),
        ];
        let stmts = statements(toks);
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[1].len(), 2);
    }

    #[test]
    fn render_keeps_spacing() {
        let mut b = Token::word("b", 1);
        b.spaced = false;
        let toks = vec![Token::word("a", 1), b, Token::new(Kind::Quoted("x y".into()), 1)];
        assert_eq!(render(&toks), "ab \"x y\"");
    }
}
