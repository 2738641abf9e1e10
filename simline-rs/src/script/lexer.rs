//! Tokenizer for the command language.
//!
//! Turns a command line into a token tree: brackets, braces and parentheses
//! become nested [`Kind::ListLit`]/[`Kind::Index`], [`Kind::Block`] and
//! [`Kind::Expr`] tokens.  Runs of punctuation are split using the set of
//! registered symbol-only command names (`+`, `->`, `<<`, ...) passed in by
//! the caller, so the lexer itself never touches the registry.
//!
//! Input ending in [`COMPLETION_MARK`] never fails on unterminated groups: the
//! text before the marker becomes a [`Kind::Complete`] token and every open
//! group is closed.

use std::collections::HashSet;

use crate::error::CliError;

use super::token::{AssignOp, AssignTarget, Kind, Partial, Token};

/// Sentinel appended to a partial line by the completion driver.
pub const COMPLETION_MARK: char = '\u{1}';

/// Name of the inline-evaluation command that back-quotes are rewritten to.
pub const INLINE_EVAL: &str = "`";

pub const ADDRESS_SPACES: &[&str] = &["p", "v", "l", "ld", "li", "ps", "cs", "ds", "es", "fs", "gs", "ss"];

/// Symbols recognised whether or not a command of that name is registered.
const FIXED_SYMBOLS: &[&str] = &["=", "+=", "-="];

/// Tokenize `src`, splitting punctuation runs by `symbols`.
pub fn tokenize(src: &str, symbols: &HashSet<String>) -> Result<Vec<Token>, CliError> {
    let mut lexer = Lexer::new(src, symbols);
    lexer.sequence(Group::Top)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Group {
    Top,
    Block,
    Paren,
    Bracket,
}

impl Group {
    fn close(self) -> Option<char> {
        match self {
            Group::Top => None,
            Group::Block => Some('}'),
            Group::Paren => Some(')'),
            Group::Bracket => Some(']'),
        }
    }

    /// Newlines separate statements only outside parentheses and brackets.
    fn newline_separates(self) -> bool {
        matches!(self, Group::Top | Group::Block)
    }
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    symbols: &'a HashSet<String>,
    completing: bool,
}

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || matches!(c, '_' | '.' | '/' | '~' | '@') || (!c.is_ascii() && !c.is_whitespace())
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
        || matches!(c, '_' | '-' | '.' | '/' | ':' | '@' | '~')
        || (!c.is_ascii() && !c.is_whitespace())
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_run_char(c: char) -> bool {
    c.is_ascii_punctuation() && !"(){}[];\"`$#,_./~@".contains(c)
}

/// Classify a numeric-looking run.  `None` means it is a name (`1.2.3`).
pub fn classify_number(text: &str) -> Option<Kind> {
    let (neg, body) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let clean: String = body.chars().filter(|c| *c != '_').collect();
    let radix = [("0x", 16), ("0X", 16), ("0b", 2), ("0B", 2), ("0o", 8), ("0O", 8)]
        .iter()
        .find_map(|(p, r)| clean.strip_prefix(p).map(|rest| (rest, *r)));
    let int = match radix {
        Some((digits, r)) => i128::from_str_radix(digits, r).ok(),
        None if !clean.is_empty() && clean.bytes().all(|b| b.is_ascii_digit()) => clean.parse().ok(),
        None => None,
    };
    if let Some(n) = int {
        return Some(Kind::Int(if neg { -n } else { n }));
    }
    let floaty = clean.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        && clean.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        && clean.matches('.').count() <= 1
        && radix.is_none();
    if floaty {
        if let Ok(x) = clean.parse::<f64>() {
            return Some(Kind::Float(if neg { -x } else { x }));
        }
    }
    None
}

impl<'a> Lexer<'a> {
    fn new(src: &str, symbols: &'a HashSet<String>) -> Self {
        Lexer { chars: src.chars().collect(), pos: 0, line: 1, symbols, completing: false }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn text(&self, start: usize, end: usize) -> String {
        self.chars[start..end].iter().collect()
    }

    /// Skip blanks and comments; returns whether anything was skipped.
    fn skip_blanks(&mut self, group: Group) -> bool {
        let mut skipped = false;
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r') => {
                    self.pos += 1;
                }
                Some('\\') if self.peek_at(1) == Some('\n') => {
                    self.pos += 2;
                    self.line += 1;
                }
                Some('\n') if !group.newline_separates() => {
                    self.bump();
                }
                Some('#') => {
                    while self.peek().is_some_and(|c| c != '\n' && c != COMPLETION_MARK) {
                        self.pos += 1;
                    }
                }
                _ => return skipped,
            }
            skipped = true;
        }
    }

    fn sequence(&mut self, group: Group) -> Result<Vec<Token>, CliError> {
        let open_line = self.line;
        let mut out: Vec<Token> = Vec::new();
        let mut at_start = true;
        loop {
            if self.completing {
                return Ok(out);
            }
            let spaced = self.skip_blanks(group) || at_start;
            at_start = false;
            let Some(c) = self.peek() else {
                return match group.close() {
                    Some(close) => Err(CliError::Syntax(format!(
                        "unterminated expression: missing '{close}' for group opened on line {open_line}"
                    ))),
                    None => Ok(out),
                };
            };
            let line = self.line;
            let start = self.pos;
            let kind = match c {
                COMPLETION_MARK => {
                    self.pos += 1;
                    self.completing = true;
                    Kind::Complete(Partial::default())
                }
                '\n' | ';' => {
                    self.bump();
                    at_start = true;
                    Kind::Separator
                }
                c if Some(c) == group.close() => {
                    self.pos += 1;
                    return Ok(out);
                }
                ')' | ']' | '}' => {
                    self.pos += 1;
                    Kind::Stray(c)
                }
                '{' => {
                    self.pos += 1;
                    Kind::Block(self.sequence(Group::Block)?)
                }
                '(' => {
                    self.pos += 1;
                    Kind::Expr(self.sequence(Group::Paren)?)
                }
                '[' => {
                    self.pos += 1;
                    let elems = self.elements()?;
                    let follows = !spaced && out.last().is_some_and(|t| !t.is_separator());
                    if follows {
                        Kind::Index(elems)
                    } else {
                        Kind::ListLit(elems)
                    }
                }
                ',' if group == Group::Bracket => {
                    self.pos += 1;
                    Kind::Comma
                }
                '"' => self.quoted()?,
                '`' => self.backquote()?,
                '$' => self.sigil('$')?,
                '%' if self.peek_at(1).is_some_and(|c| c.is_ascii_alphabetic() || c == '_') => self.sigil('%')?,
                '-' if spaced && self.peek_at(1).is_some_and(char::is_alphabetic) => match self.flag() {
                    Some(kind) => kind,
                    None => self.word(),
                },
                '-' | '+' if spaced && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.number(),
                '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.number(),
                c if c.is_ascii_digit() => self.number(),
                c if is_word_start(c) => self.word(),
                _ => {
                    self.symbol_run(&mut out, spaced, line)?;
                    continue;
                }
            };
            let kind = match kind {
                Kind::Word(_) | Kind::Unicode(_) | Kind::Int(_) | Kind::Float(_) | Kind::Bool(_) | Kind::Nil
                | Kind::Flag(_) | Kind::Var(_) | Kind::Reg(_) | Kind::Address { .. } | Kind::AddrPrefix(_)
                    if self.peek() == Some(COMPLETION_MARK) =>
                {
                    let text = self.text(start, self.pos);
                    self.pos += 1;
                    self.completing = true;
                    Kind::Complete(Partial { text, quoted: false })
                }
                other => other,
            };
            out.push(Token { kind, line, spaced, ret: None });
        }
    }

    /// Elements of a bracketed list, split at top-level commas.
    fn elements(&mut self) -> Result<Vec<Vec<Token>>, CliError> {
        let tokens = self.sequence(Group::Bracket)?;
        let mut elems = Vec::new();
        let mut cur = Vec::new();
        let mut saw_comma = false;
        for t in tokens {
            if matches!(t.kind, Kind::Comma) {
                if cur.is_empty() {
                    return Err(CliError::Syntax("empty list element".into()));
                }
                elems.push(std::mem::take(&mut cur));
                saw_comma = true;
            } else {
                cur.push(t);
            }
        }
        if !cur.is_empty() {
            elems.push(cur);
        } else if saw_comma && !self.completing {
            return Err(CliError::Syntax("trailing ',' in list".into()));
        }
        Ok(elems)
    }

    fn flag(&mut self) -> Option<Kind> {
        let mut end = self.pos + 1;
        while self.chars.get(end).is_some_and(|c| is_ident_char(*c) || *c == '-') {
            end += 1;
        }
        let bounded = match self.chars.get(end) {
            None => true,
            Some(c) => c.is_whitespace() || matches!(*c, ')' | ';' | ']' | '}' | ',' | COMPLETION_MARK),
        };
        if !bounded {
            return None;
        }
        let text = self.text(self.pos, end);
        self.pos = end;
        Some(Kind::Flag(text))
    }

    fn number(&mut self) -> Kind {
        let start = self.pos;
        self.pos += 1;
        while let Some(c) = self.peek() {
            let exponent_sign = matches!(c, '+' | '-')
                && matches!(self.chars.get(self.pos - 1), Some('e' | 'E'))
                && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())
                && !self.text(start, self.pos).to_ascii_lowercase().contains('x');
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || exponent_sign {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = self.text(start, self.pos);
        match classify_number(&text) {
            Some(kind) => kind,
            None => {
                while self.peek().is_some_and(|c| is_word_char(c) && !self.arrow_ahead(c)) {
                    self.pos += 1;
                }
                Kind::Word(self.text(start, self.pos))
            }
        }
    }

    fn arrow_ahead(&self, c: char) -> bool {
        c == '-' && matches!(self.peek_at(1), Some('>' | '='))
    }

    fn word(&mut self) -> Kind {
        let start = self.pos;
        self.pos += 1;
        while self.peek().is_some_and(|c| is_word_char(c) && !self.arrow_ahead(c)) {
            self.pos += 1;
        }
        let text = self.text(start, self.pos);
        match text.as_str() {
            "TRUE" => return Kind::Bool(true),
            "FALSE" => return Kind::Bool(false),
            "NIL" => return Kind::Nil,
            _ => {}
        }
        if let Some((space, rest)) = text.split_once(':') {
            if ADDRESS_SPACES.contains(&space) {
                if rest.is_empty() {
                    return Kind::AddrPrefix(space.to_owned());
                }
                if let Some(Kind::Int(offset)) = classify_number(rest) {
                    return Kind::Address { space: space.to_owned(), offset };
                }
            }
        }
        if text.is_ascii() {
            Kind::Word(text)
        } else {
            Kind::Unicode(text)
        }
    }

    /// `$name` / `%name`, attaching a following `=`, `+=` or `-=`.
    fn sigil(&mut self, sigil: char) -> Result<Kind, CliError> {
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if start == self.pos {
            return match self.peek() {
                Some(COMPLETION_MARK) => Ok(Kind::Word(sigil.to_string())),
                _ => Err(CliError::Syntax(format!("stray '{sigil}'"))),
            };
        }
        let name = self.text(start, self.pos);
        let mut ahead = self.pos;
        while matches!(self.chars.get(ahead), Some(' ' | '\t')) {
            ahead += 1;
        }
        let op = match (self.chars.get(ahead), self.chars.get(ahead + 1)) {
            (Some('='), next) if next != Some(&'=') => Some((AssignOp::Set, 1)),
            (Some('+'), Some('=')) => Some((AssignOp::Add, 2)),
            (Some('-'), Some('=')) => Some((AssignOp::Sub, 2)),
            _ => None,
        };
        Ok(match (op, sigil) {
            (Some((op, len)), '$') => {
                self.pos = ahead + len;
                Kind::Assign { target: AssignTarget::Var(name), op }
            }
            (Some((op, len)), _) => {
                self.pos = ahead + len;
                Kind::Assign { target: AssignTarget::Reg(name), op }
            }
            (None, '$') => Kind::Var(name),
            (None, _) => Kind::Reg(name),
        })
    }

    fn quoted(&mut self) -> Result<Kind, CliError> {
        let open_line = self.line;
        self.pos += 1;
        let mut s = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(CliError::Syntax(format!("unterminated string starting on line {open_line}")));
            };
            match c {
                '"' => return Ok(Kind::Quoted(s)),
                COMPLETION_MARK => {
                    self.completing = true;
                    return Ok(Kind::Complete(Partial { text: s, quoted: true }));
                }
                '\\' => {
                    if let Some(ch) = self.escape()? {
                        s.push(ch);
                    }
                }
                c => s.push(c),
            }
        }
    }

    fn escape(&mut self) -> Result<Option<char>, CliError> {
        let Some(e) = self.bump() else {
            return Err(CliError::Syntax("unterminated string".into()));
        };
        let ch = match e {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'a' => '\x07',
            'b' => '\x08',
            'f' => '\x0c',
            'v' => '\x0b',
            'e' => '\x1b',
            '\\' | '"' | '\'' => e,
            '\n' => return Ok(None),
            '0'..='7' => {
                let mut n = e.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            n = n * 8 + d;
                            self.pos += 1;
                        }
                        None => break,
                    }
                }
                char::from_u32(n).ok_or_else(|| CliError::Syntax(format!("invalid octal escape \\{n:o}")))?
            }
            'x' => self.hex_escape(2)?,
            'u' => self.hex_escape(4)?,
            'U' => self.hex_escape(8)?,
            COMPLETION_MARK => {
                self.pos -= 1;
                return Ok(None);
            }
            other => return Err(CliError::Syntax(format!("unknown escape sequence '\\{other}'"))),
        };
        Ok(Some(ch))
    }

    fn hex_escape(&mut self, digits: usize) -> Result<char, CliError> {
        let end = self.pos + digits;
        let text = self.chars.get(self.pos..end).map(|s| s.iter().collect::<String>());
        let code = text
            .as_deref()
            .filter(|t| t.chars().all(|c| c.is_ascii_hexdigit()))
            .and_then(|t| u32::from_str_radix(t, 16).ok())
            .ok_or_else(|| CliError::Syntax(format!("escape needs {digits} hex digits")))?;
        self.pos = end;
        char::from_u32(code).ok_or_else(|| CliError::Syntax(format!("invalid code point U+{code:X}")))
    }

    /// `` `cmd args` `` becomes `` (` "cmd args") ``.
    fn backquote(&mut self) -> Result<Kind, CliError> {
        let line = self.line;
        self.pos += 1;
        let start = self.pos;
        loop {
            match self.peek() {
                None => return Err(CliError::Syntax(format!("unterminated '`' starting on line {line}"))),
                Some('`') => break,
                Some(COMPLETION_MARK) => {
                    let inner = self.text(start, self.pos + 1);
                    let tokens = tokenize(&inner, self.symbols)?;
                    self.pos += 1;
                    self.completing = true;
                    return Ok(Kind::Expr(tokens));
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        let body = self.text(start, self.pos);
        self.pos += 1;
        Ok(Kind::Expr(vec![
            Token::word(INLINE_EVAL, line),
            Token::new(Kind::Quoted(body), line),
        ]))
    }

    /// Split a punctuation run greedily by known symbols.
    fn symbol_run(&mut self, out: &mut Vec<Token>, spaced: bool, line: u32) -> Result<(), CliError> {
        let start = self.pos;
        while self.peek().is_some_and(is_run_char) {
            self.pos += 1;
        }
        if self.pos == start {
            // Not punctuation we understand; keep it as a one-character word.
            self.pos += 1;
        }
        let run = self.text(start, self.pos);
        let mut rest = run.as_str();
        let mut first = true;
        while !rest.is_empty() {
            let piece = (1..=rest.len())
                .rev()
                .filter(|n| rest.is_char_boundary(*n))
                .map(|n| &rest[..n])
                .find(|p| FIXED_SYMBOLS.contains(p) || self.symbols.contains(*p));
            let piece = match piece {
                Some(p) => p,
                None if rest.starts_with('%') => return Err(CliError::Syntax("stray '%'".into())),
                None => rest,
            };
            out.push(Token { kind: Kind::Word(piece.to_owned()), line, spaced: spaced && first, ret: None });
            rest = &rest[piece.len()..];
            first = false;
        }
        if self.peek() == Some(COMPLETION_MARK) {
            self.pos += 1;
            self.completing = true;
            if let Some(last) = out.last_mut() {
                let text = last.to_source();
                last.kind = Kind::Complete(Partial { text, quoted: false });
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn syms() -> HashSet<String> {
        ["+", "-", "*", "/", "%", "->", "==", "!=", "<", "<=", ">", ">=", "<<", ">>", "&", "|", "^", "[", "`"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn lex(src: &str) -> Vec<Kind> {
        tokenize(src, &syms()).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn word(s: &str) -> Kind {
        Kind::Word(s.to_owned())
    }

    #[test]
    fn words_and_quoted() {
        assert_eq!(lex(r#"echo "hi there""#), vec![word("echo"), Kind::Quoted("hi there".into())]);
    }

    #[test]
    fn flags_need_a_boundary() {
        assert_eq!(lex("cmd -all"), vec![word("cmd"), Kind::Flag("-all".into())]);
        assert_eq!(lex("(cmd -x)"), vec![Kind::Expr(vec![word("cmd"), Kind::Flag("-x".into())])]);
        assert_eq!(lex("cmd -a.b"), vec![word("cmd"), word("-a.b")]);
    }

    #[test]
    fn negative_numbers_in_operand_position() {
        assert_eq!(lex("-5"), vec![Kind::Int(-5)]);
        assert_eq!(lex("1-2"), vec![Kind::Int(1), word("-"), Kind::Int(2)]);
        assert_eq!(lex("1 - 2"), vec![Kind::Int(1), word("-"), Kind::Int(2)]);
    }

    #[test]
    fn number_forms() {
        assert_eq!(lex("0x1f 0b101 0o17 1_000"), vec![
            Kind::Int(31),
            Kind::Int(5),
            Kind::Int(15),
            Kind::Int(1000)
        ]);
        assert_eq!(lex("1.5 1e3 .25"), vec![Kind::Float(1.5), Kind::Float(1000.0), Kind::Float(0.25)]);
        assert_eq!(lex("1.2.3"), vec![word("1.2.3")]);
    }

    #[test]
    fn variable_assignment_lookahead() {
        assert_eq!(lex("$x = 1"), vec![
            Kind::Assign { target: AssignTarget::Var("x".into()), op: AssignOp::Set },
            Kind::Int(1)
        ]);
        assert_eq!(lex("$x == 1"), vec![Kind::Var("x".into()), word("=="), Kind::Int(1)]);
        assert_eq!(lex("$x += 2"), vec![
            Kind::Assign { target: AssignTarget::Var("x".into()), op: AssignOp::Add },
            Kind::Int(2)
        ]);
        assert_eq!(lex("%pc"), vec![Kind::Reg("pc".into())]);
    }

    #[test]
    fn stray_sigils_are_errors() {
        assert!(tokenize("echo $", &syms()).is_err());
        assert!(tokenize("echo %", &HashSet::new()).is_err());
    }

    #[test]
    fn address_prefixes() {
        assert_eq!(lex("p:0x1000"), vec![Kind::Address { space: "p".into(), offset: 0x1000 }]);
        assert_eq!(lex("v:$a"), vec![Kind::AddrPrefix("v".into()), Kind::Var("a".into())]);
        assert_eq!(lex("board:port"), vec![word("board:port")]);
    }

    #[test]
    fn escapes() {
        assert_eq!(lex(r#""a\tb\x41é\101\n""#), vec![Kind::Quoted("a\tbAé\u{41}\n".into())]);
        assert!(tokenize(r#""\q""#, &syms()).is_err());
        assert!(tokenize(r#""abc"#, &syms()).is_err());
    }

    #[test]
    fn backquote_rewrites_to_inline_eval() {
        assert_eq!(lex("echo `1 + 2`"), vec![
            word("echo"),
            Kind::Expr(vec![word(INLINE_EVAL), Kind::Quoted("1 + 2".into())])
        ]);
    }

    #[test]
    fn index_versus_list_literal() {
        let toks = lex("$l[0] [1, 2]");
        assert!(matches!(&toks[1], Kind::Index(e) if e.len() == 1));
        assert!(matches!(&toks[2], Kind::ListLit(e) if e.len() == 2));
        assert!(matches!(&lex("[]")[0], Kind::ListLit(e) if e.is_empty()));
    }

    #[test]
    fn punctuation_split_by_symbols() {
        assert_eq!(lex("$a->b"), vec![Kind::Var("a".into()), word("->"), word("b")]);
        assert_eq!(lex("obj->attr"), vec![word("obj"), word("->"), word("attr")]);
        assert_eq!(lex("1<<2"), vec![Kind::Int(1), word("<<"), Kind::Int(2)]);
        assert_eq!(lex("a == -1"), vec![word("a"), word("=="), Kind::Int(-1)]);
    }

    #[test]
    fn separators_and_comments() {
        let toks = lex("a; b # comment\nc");
        assert_eq!(toks, vec![word("a"), Kind::Separator, word("b"), Kind::Separator, word("c")]);
        assert_eq!(lex("(a\nb)"), vec![Kind::Expr(vec![word("a"), word("b")])]);
    }

    #[test]
    fn unterminated_groups() {
        assert!(tokenize("(a", &syms()).is_err());
        assert!(tokenize("{a", &syms()).is_err());
        assert_eq!(lex("a )"), vec![word("a"), Kind::Stray(')')]);
    }

    #[test]
    fn keywords_and_unicode() {
        assert_eq!(lex("TRUE FALSE NIL"), vec![Kind::Bool(true), Kind::Bool(false), Kind::Nil]);
        assert_eq!(lex("grüße"), vec![Kind::Unicode("grüße".into())]);
    }

    #[test]
    fn completion_marker_closes_groups() {
        let toks = lex("if (my-co\u{1}");
        let Kind::Expr(inner) = &toks[1] else { panic!("expected expression") };
        assert_eq!(inner[0].kind, Kind::Complete(Partial { text: "my-co".into(), quoted: false }));
    }

    #[test]
    fn completion_in_quoted_string() {
        assert_eq!(lex("run-script \"/tm\u{1}"), vec![
            word("run-script"),
            Kind::Complete(Partial { text: "/tm".into(), quoted: true })
        ]);
    }

    #[test]
    fn line_numbers_track_newlines() {
        let toks = tokenize("a\nb\n\nc", &syms()).unwrap();
        let lines: Vec<u32> = toks.iter().filter(|t| !t.is_separator()).map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 2, 4]);
    }

    #[test]
    fn spacing_is_recorded() {
        let toks = tokenize("(x).name", &syms()).unwrap();
        assert!(!toks[1].spaced);
        assert_eq!(toks[1].kind, word(".name"));
    }
}
