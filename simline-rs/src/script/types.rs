//! Argument type handlers.
//!
//! Each handler knows how to turn the leading tokens of an argument list into
//! a [`Value`] (`parse`), how to validate a value passed programmatically
//! (`normalize`), and optionally how to suggest completions (`expand`).
//!
//! `parse` reports a mismatch with [`CliError::Type`]; polymorphic types and
//! variadic arguments treat that as "try the next alternative".  `normalize`
//! reports out-of-domain input with [`CliError::Value`].

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::CliError;
use crate::host::{HostObject, HostObjectModel};

use super::token::{Kind, Token};
use super::value::Value;

// ── TypeCtx ───────────────────────────────────────────────────────────────────

/// What a type handler may consult while parsing.
pub struct TypeCtx {
    pub host: Arc<dyn HostObjectModel>,
    /// Current object namespace for relative names.
    pub namespace: Option<String>,
    pub aliases: Arc<HashMap<String, String>>,
    /// Deprecation notices raised while parsing; the caller reports them.
    pub notices: Vec<String>,
}

impl TypeCtx {
    pub fn new(host: Arc<dyn HostObjectModel>) -> Self {
        TypeCtx { host, namespace: None, aliases: Arc::default(), notices: Vec::new() }
    }

    pub fn notice(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        log::warn!("{msg}");
        self.notices.push(msg);
    }

    /// Resolve an object name: absolute, then relative, then alias.
    pub fn resolve_object(&self, name: &str) -> Option<HostObject> {
        if let Some(obj) = self.host.lookup(name) {
            return Some(obj);
        }
        if let Some(ns) = &self.namespace {
            if let Some(obj) = self.host.lookup(&format!("{ns}.{name}")) {
                return Some(obj);
            }
        }
        self.aliases.get(name).and_then(|target| self.host.lookup(target))
    }
}

// ── ArgType ───────────────────────────────────────────────────────────────────

pub trait ArgType: Send + Sync + fmt::Debug {
    fn desc(&self) -> String;

    /// Parse a value from the front of `tokens`; returns it and the count consumed.
    fn parse(&self, tokens: &[Token], ctx: &mut TypeCtx) -> Result<(Value, usize), CliError>;

    /// Validate and canonicalise a programmatic value.
    fn normalize(&self, value: &Value, ctx: &mut TypeCtx) -> Result<Value, CliError>;

    fn expand(&self, _partial: &str, _ctx: &TypeCtx) -> Vec<String> {
        Vec::new()
    }

    /// Flag name (with leading dash) when this is a flag type.
    fn flag_name(&self) -> Option<&str> {
        None
    }

    fn is_filename(&self) -> bool {
        false
    }
}

pub type TypeRef = Arc<dyn ArgType>;

fn head(tokens: &[Token]) -> Option<&Token> {
    tokens.first()
}

fn mismatch(desc: &str, tokens: &[Token]) -> CliError {
    match head(tokens) {
        Some(t) => CliError::Type(format!("expected {desc}, got '{}'", t.to_source())),
        None => CliError::Type(format!("expected {desc}")),
    }
}

fn bad_value(desc: &str, value: &Value) -> CliError {
    CliError::Value(format!("expected {desc}, got {} {}", value.type_name(), value.repr()))
}

// ── Strings ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct StrT;

impl ArgType for StrT {
    fn desc(&self) -> String {
        "string".into()
    }

    fn parse(&self, tokens: &[Token], _ctx: &mut TypeCtx) -> Result<(Value, usize), CliError> {
        match head(tokens).map(|t| &t.kind) {
            Some(Kind::Quoted(s) | Kind::Word(s) | Kind::Unicode(s)) => Ok((Value::Str(s.clone()), 1)),
            _ => Err(mismatch("string", tokens)),
        }
    }

    fn normalize(&self, value: &Value, _ctx: &mut TypeCtx) -> Result<Value, CliError> {
        match value {
            Value::Str(s) | Value::Object(s) => Ok(Value::Str(s.clone())),
            other => Err(bad_value("string", other)),
        }
    }
}

#[derive(Debug)]
struct StrSetT {
    choices: Vec<String>,
}

impl ArgType for StrSetT {
    fn desc(&self) -> String {
        format!("one of {}", self.choices.join(", "))
    }

    fn parse(&self, tokens: &[Token], ctx: &mut TypeCtx) -> Result<(Value, usize), CliError> {
        let (v, n) = StrT.parse(tokens, ctx).map_err(|_| mismatch(&self.desc(), tokens))?;
        self.normalize(&v, ctx).map(|v| (v, n)).map_err(|_| mismatch(&self.desc(), tokens))
    }

    fn normalize(&self, value: &Value, _ctx: &mut TypeCtx) -> Result<Value, CliError> {
        match value {
            Value::Str(s) if self.choices.contains(s) => Ok(value.clone()),
            other => Err(bad_value(&self.desc(), other)),
        }
    }

    fn expand(&self, partial: &str, _ctx: &TypeCtx) -> Vec<String> {
        self.choices.iter().filter(|c| c.starts_with(partial)).cloned().collect()
    }
}

// ── Integers ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct RangeT {
    label: Option<String>,
    min: i128,
    max: i128,
    modulo: bool,
}

impl RangeT {
    fn fit(&self, v: i128, ctx: &mut TypeCtx) -> Option<i128> {
        if (self.min..=self.max).contains(&v) {
            return Some(v);
        }
        if !self.modulo {
            return None;
        }
        // (v - min) mod span, computed without overflowing i128.
        let span = self.max.checked_sub(self.min)?.checked_add(1)?;
        let offset = (v.rem_euclid(span) - self.min.rem_euclid(span)).rem_euclid(span);
        let wrapped = self.min + offset;
        ctx.notice(format!(
            "value {v} is outside [{}, {}] and was wrapped to {wrapped}; this is deprecated",
            self.min, self.max
        ));
        Some(wrapped)
    }
}

impl ArgType for RangeT {
    fn desc(&self) -> String {
        match &self.label {
            Some(l) => l.clone(),
            None => format!("integer in [{}, {}]", self.min, self.max),
        }
    }

    fn parse(&self, tokens: &[Token], ctx: &mut TypeCtx) -> Result<(Value, usize), CliError> {
        match head(tokens).map(|t| &t.kind) {
            Some(Kind::Int(n)) => match self.fit(*n, ctx) {
                Some(v) => Ok((Value::Int(v), 1)),
                None => Err(CliError::Type(format!("{n} is out of range for {}", self.desc()))),
            },
            _ => Err(mismatch(&self.desc(), tokens)),
        }
    }

    fn normalize(&self, value: &Value, ctx: &mut TypeCtx) -> Result<Value, CliError> {
        match value {
            Value::Int(n) => self
                .fit(*n, ctx)
                .map(Value::Int)
                .ok_or_else(|| CliError::Value(format!("{n} is out of range for {}", self.desc()))),
            other => Err(bad_value(&self.desc(), other)),
        }
    }
}

// ── Other scalars ─────────────────────────────────────────────────────────────

#[derive(Debug)]
struct FloatT;

impl ArgType for FloatT {
    fn desc(&self) -> String {
        "float".into()
    }

    fn parse(&self, tokens: &[Token], _ctx: &mut TypeCtx) -> Result<(Value, usize), CliError> {
        match head(tokens).map(|t| &t.kind) {
            Some(Kind::Float(x)) => Ok((Value::Float(*x), 1)),
            Some(Kind::Int(n)) => Ok((Value::Float(*n as f64), 1)),
            _ => Err(mismatch("float", tokens)),
        }
    }

    fn normalize(&self, value: &Value, _ctx: &mut TypeCtx) -> Result<Value, CliError> {
        value.as_float().map(Value::Float).ok_or_else(|| bad_value("float", value))
    }
}

#[derive(Debug)]
struct BoolT;

impl ArgType for BoolT {
    fn desc(&self) -> String {
        "boolean".into()
    }

    fn parse(&self, tokens: &[Token], _ctx: &mut TypeCtx) -> Result<(Value, usize), CliError> {
        match head(tokens).map(|t| &t.kind) {
            Some(Kind::Bool(b)) => Ok((Value::Bool(*b), 1)),
            Some(Kind::Word(w)) if w.eq_ignore_ascii_case("true") => Ok((Value::Bool(true), 1)),
            Some(Kind::Word(w)) if w.eq_ignore_ascii_case("false") => Ok((Value::Bool(false), 1)),
            _ => Err(mismatch("boolean", tokens)),
        }
    }

    fn normalize(&self, value: &Value, _ctx: &mut TypeCtx) -> Result<Value, CliError> {
        match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::Int(0) => Ok(Value::Bool(false)),
            Value::Int(1) => Ok(Value::Bool(true)),
            other => Err(bad_value("boolean", other)),
        }
    }

    fn expand(&self, partial: &str, _ctx: &TypeCtx) -> Vec<String> {
        ["FALSE", "TRUE"].iter().filter(|c| c.starts_with(partial)).map(|c| c.to_string()).collect()
    }
}

#[derive(Debug)]
struct FlagT {
    name: String,
}

impl ArgType for FlagT {
    fn desc(&self) -> String {
        format!("flag {}", self.name)
    }

    fn parse(&self, tokens: &[Token], _ctx: &mut TypeCtx) -> Result<(Value, usize), CliError> {
        match head(tokens).map(|t| &t.kind) {
            Some(Kind::Flag(f)) if *f == self.name => Ok((Value::Bool(true), 1)),
            _ => Err(mismatch(&self.desc(), tokens)),
        }
    }

    fn normalize(&self, value: &Value, _ctx: &mut TypeCtx) -> Result<Value, CliError> {
        match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::Int(n) => Ok(Value::Bool(*n != 0)),
            other => Err(bad_value(&self.desc(), other)),
        }
    }

    fn flag_name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

#[derive(Debug)]
struct NilT;

impl ArgType for NilT {
    fn desc(&self) -> String {
        "NIL".into()
    }

    fn parse(&self, tokens: &[Token], _ctx: &mut TypeCtx) -> Result<(Value, usize), CliError> {
        match head(tokens).map(|t| &t.kind) {
            Some(Kind::Nil) => Ok((Value::Nil, 1)),
            _ => Err(mismatch("NIL", tokens)),
        }
    }

    fn normalize(&self, value: &Value, _ctx: &mut TypeCtx) -> Result<Value, CliError> {
        match value {
            Value::Nil => Ok(Value::Nil),
            other => Err(bad_value("NIL", other)),
        }
    }
}

#[derive(Debug)]
struct AddrT;

impl ArgType for AddrT {
    fn desc(&self) -> String {
        "address".into()
    }

    fn parse(&self, tokens: &[Token], ctx: &mut TypeCtx) -> Result<(Value, usize), CliError> {
        match head(tokens).map(|t| &t.kind) {
            Some(Kind::Address { .. } | Kind::Int(_)) => {
                let v = head(tokens).and_then(Token::as_value).unwrap_or_default();
                Ok((self.normalize(&v, ctx)?, 1))
            }
            _ => Err(mismatch("address", tokens)),
        }
    }

    fn normalize(&self, value: &Value, _ctx: &mut TypeCtx) -> Result<Value, CliError> {
        match value {
            Value::Address { offset, .. } | Value::Int(offset) if *offset < 0 => {
                Err(CliError::Value(format!("negative address {offset}")))
            }
            Value::Address { .. } => Ok(value.clone()),
            Value::Int(n) => Ok(Value::Address { space: String::new(), offset: *n }),
            other => Err(bad_value("address", other)),
        }
    }
}

// ── Lists ─────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct ListT {
    elem: Option<TypeRef>,
}

impl ArgType for ListT {
    fn desc(&self) -> String {
        match &self.elem {
            Some(e) => format!("list of {}", e.desc()),
            None => "list".into(),
        }
    }

    fn parse(&self, tokens: &[Token], ctx: &mut TypeCtx) -> Result<(Value, usize), CliError> {
        match head(tokens).and_then(Token::as_value) {
            Some(v @ Value::List(_)) => {
                let v = self.normalize(&v, ctx).map_err(|e| CliError::Type(e.message()))?;
                Ok((v, 1))
            }
            _ => Err(mismatch(&self.desc(), tokens)),
        }
    }

    fn normalize(&self, value: &Value, ctx: &mut TypeCtx) -> Result<Value, CliError> {
        let Value::List(items) = value else {
            return Err(bad_value(&self.desc(), value));
        };
        let Some(elem) = &self.elem else {
            return Ok(value.clone());
        };
        let items = items
            .iter()
            .enumerate()
            .map(|(i, v)| {
                elem.normalize(v, ctx)
                    .map_err(|e| CliError::Value(format!("list element {i}: {}", e.message())))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::List(items))
    }

    fn expand(&self, partial: &str, ctx: &TypeCtx) -> Vec<String> {
        self.elem.as_ref().map(|e| e.expand(partial, ctx)).unwrap_or_default()
    }
}

// ── Polymorphic ───────────────────────────────────────────────────────────────

/// Ordered alternatives; the first handler that accepts wins.
#[derive(Debug)]
pub struct PolyT {
    alts: Vec<TypeRef>,
}

impl PolyT {
    pub fn new(alts: Vec<TypeRef>) -> Self {
        PolyT { alts }
    }

    /// Parse and report which alternative matched.
    pub fn parse_tagged(&self, tokens: &[Token], ctx: &mut TypeCtx) -> Result<(usize, Value, usize), CliError> {
        for (i, alt) in self.alts.iter().enumerate() {
            match alt.parse(tokens, ctx) {
                Ok((v, n)) => return Ok((i, v, n)),
                Err(e) if e.is_type_mismatch() => continue,
                Err(e) => return Err(e),
            }
        }
        Err(mismatch(&self.desc(), tokens))
    }

    pub fn normalize_tagged(&self, value: &Value, ctx: &mut TypeCtx) -> Result<(usize, Value), CliError> {
        for (i, alt) in self.alts.iter().enumerate() {
            if let Ok(v) = alt.normalize(value, ctx) {
                return Ok((i, v));
            }
        }
        Err(bad_value(&self.desc(), value))
    }
}

impl ArgType for PolyT {
    fn desc(&self) -> String {
        let descs: Vec<String> = self.alts.iter().map(|a| a.desc()).collect();
        descs.join(" or ")
    }

    fn parse(&self, tokens: &[Token], ctx: &mut TypeCtx) -> Result<(Value, usize), CliError> {
        self.parse_tagged(tokens, ctx).map(|(_, v, n)| (v, n))
    }

    fn normalize(&self, value: &Value, ctx: &mut TypeCtx) -> Result<Value, CliError> {
        self.normalize_tagged(value, ctx).map(|(_, v)| v)
    }

    fn expand(&self, partial: &str, ctx: &TypeCtx) -> Vec<String> {
        self.alts.iter().flat_map(|a| a.expand(partial, ctx)).collect()
    }
}

// ── Objects ───────────────────────────────────────────────────────────────────

/// Boolean expression over class/interface names, e.g. `(a|b)&c`.
#[derive(Debug, Clone, PartialEq)]
pub enum Cap {
    Name(String),
    All(Vec<Cap>),
    Any(Vec<Cap>),
}

impl Cap {
    pub fn parse(expr: &str) -> Result<Cap, CliError> {
        let chars: Vec<char> = expr.chars().filter(|c| !c.is_whitespace()).collect();
        let mut pos = 0;
        let cap = cap_or(&chars, &mut pos)?;
        if pos != chars.len() {
            return Err(CliError::Value(format!("malformed capability expression '{expr}'")));
        }
        Ok(cap)
    }

    pub fn matches(&self, host: &dyn HostObjectModel, obj: &HostObject) -> bool {
        match self {
            Cap::Name(n) => host.has_capability(obj, n),
            Cap::All(parts) => parts.iter().all(|p| p.matches(host, obj)),
            Cap::Any(parts) => parts.iter().any(|p| p.matches(host, obj)),
        }
    }
}

fn cap_or(chars: &[char], pos: &mut usize) -> Result<Cap, CliError> {
    let mut parts = vec![cap_and(chars, pos)?];
    while chars.get(*pos) == Some(&'|') {
        *pos += 1;
        parts.push(cap_and(chars, pos)?);
    }
    Ok(if parts.len() == 1 { parts.remove(0) } else { Cap::Any(parts) })
}

fn cap_and(chars: &[char], pos: &mut usize) -> Result<Cap, CliError> {
    let mut parts = vec![cap_atom(chars, pos)?];
    while chars.get(*pos) == Some(&'&') {
        *pos += 1;
        parts.push(cap_atom(chars, pos)?);
    }
    Ok(if parts.len() == 1 { parts.remove(0) } else { Cap::All(parts) })
}

fn cap_atom(chars: &[char], pos: &mut usize) -> Result<Cap, CliError> {
    if chars.get(*pos) == Some(&'(') {
        *pos += 1;
        let inner = cap_or(chars, pos)?;
        if chars.get(*pos) != Some(&')') {
            return Err(CliError::Value("unbalanced '(' in capability expression".into()));
        }
        *pos += 1;
        return Ok(inner);
    }
    let start = *pos;
    while chars.get(*pos).is_some_and(|c| c.is_alphanumeric() || *c == '_' || *c == '-') {
        *pos += 1;
    }
    if start == *pos {
        return Err(CliError::Value("expected a class or interface name".into()));
    }
    Ok(Cap::Name(chars[start..*pos].iter().collect()))
}

#[derive(Debug)]
struct ObjT {
    filter: Option<(String, Cap)>,
    with_port: bool,
}

impl ObjT {
    fn check(&self, name: &str, ctx: &TypeCtx) -> Result<HostObject, String> {
        let obj = ctx.resolve_object(name).ok_or_else(|| format!("no object named '{name}'"))?;
        if let Some((text, cap)) = &self.filter {
            if !cap.matches(ctx.host.as_ref(), &obj) {
                return Err(format!("object '{}' does not match '{text}'", obj.name));
            }
        }
        Ok(obj)
    }

    fn accept(&self, name: &str, port: Option<&str>, ctx: &TypeCtx) -> Result<Value, String> {
        let obj = self.check(name, ctx)?;
        if !self.with_port {
            return Ok(Value::Object(obj.name));
        }
        let port = match port {
            Some(p) if ctx.host.ports(&obj).iter().any(|q| q == p) => Value::Str(p.to_owned()),
            Some(p) => return Err(format!("object '{}' has no port '{p}'", obj.name)),
            None => Value::Nil,
        };
        Ok(Value::List(vec![Value::Object(obj.name), port]))
    }

    fn accept_text(&self, text: &str, ctx: &TypeCtx) -> Result<Value, String> {
        if self.with_port && ctx.resolve_object(text).is_none() {
            if let Some((name, port)) = text.rsplit_once(':') {
                return self.accept(name, Some(port), ctx);
            }
        }
        self.accept(text, None, ctx)
    }
}

impl ArgType for ObjT {
    fn desc(&self) -> String {
        let base = match &self.filter {
            Some((text, _)) => format!("object ({text})"),
            None => "object".into(),
        };
        if self.with_port {
            format!("{base}[:port]")
        } else {
            base
        }
    }

    fn parse(&self, tokens: &[Token], ctx: &mut TypeCtx) -> Result<(Value, usize), CliError> {
        let text = match head(tokens).map(|t| &t.kind) {
            Some(Kind::Object(s) | Kind::Word(s) | Kind::Quoted(s) | Kind::Unicode(s)) => s.clone(),
            _ => return Err(mismatch(&self.desc(), tokens)),
        };
        self.accept_text(&text, ctx).map(|v| (v, 1)).map_err(CliError::Type)
    }

    fn normalize(&self, value: &Value, ctx: &mut TypeCtx) -> Result<Value, CliError> {
        let result = match value {
            Value::Object(s) | Value::Str(s) => self.accept_text(s, ctx),
            Value::List(parts) if self.with_port && parts.len() == 2 => match (&parts[0], &parts[1]) {
                (Value::Object(n) | Value::Str(n), Value::Str(p)) => self.accept(n, Some(p), ctx),
                (Value::Object(n) | Value::Str(n), Value::Nil) => self.accept(n, None, ctx),
                _ => Err(String::new()),
            },
            _ => Err(String::new()),
        };
        result.map_err(|msg| if msg.is_empty() { bad_value(&self.desc(), value) } else { CliError::Value(msg) })
    }

    fn expand(&self, partial: &str, ctx: &TypeCtx) -> Vec<String> {
        ctx.host
            .object_names()
            .into_iter()
            .filter(|n| n.starts_with(partial))
            .filter(|n| self.check(n, ctx).is_ok())
            .collect()
    }
}

// ── Filenames ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct FilenameT {
    must_exist: bool,
}

impl ArgType for FilenameT {
    fn desc(&self) -> String {
        if self.must_exist {
            "existing file".into()
        } else {
            "filename".into()
        }
    }

    fn parse(&self, tokens: &[Token], ctx: &mut TypeCtx) -> Result<(Value, usize), CliError> {
        let (v, n) = StrT.parse(tokens, ctx).map_err(|_| mismatch(&self.desc(), tokens))?;
        let v = self.normalize(&v, ctx).map_err(|e| CliError::Type(e.message()))?;
        Ok((v, n))
    }

    fn normalize(&self, value: &Value, _ctx: &mut TypeCtx) -> Result<Value, CliError> {
        let Value::Str(path) = value else {
            return Err(bad_value(&self.desc(), value));
        };
        if self.must_exist && !Path::new(path).exists() {
            return Err(CliError::Value(format!("file not found: {path}")));
        }
        Ok(value.clone())
    }

    fn expand(&self, partial: &str, _ctx: &TypeCtx) -> Vec<String> {
        let (dir, prefix) = match partial.rfind('/') {
            Some(i) => (&partial[..=i], &partial[i + 1..]),
            None => ("", partial),
        };
        let read_from = if dir.is_empty() { "." } else { dir };
        let Ok(entries) = std::fs::read_dir(read_from) else {
            return Vec::new();
        };
        let mut out: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                if !name.starts_with(prefix) || (prefix.is_empty() && name.starts_with('.')) {
                    return None;
                }
                let slash = if e.path().is_dir() { "/" } else { "" };
                Some(format!("{dir}{name}{slash}"))
            })
            .collect();
        out.sort();
        out
    }

    fn is_filename(&self) -> bool {
        true
    }
}

// ── Constructors ──────────────────────────────────────────────────────────────

pub fn string() -> TypeRef {
    Arc::new(StrT)
}

pub fn string_set(choices: &[&str]) -> TypeRef {
    Arc::new(StrSetT { choices: choices.iter().map(|s| s.to_string()).collect() })
}

pub fn range(min: i128, max: i128) -> TypeRef {
    Arc::new(RangeT { label: None, min, max, modulo: false })
}

/// Out-of-range values wrap into `[min, max]` with a deprecation notice.
pub fn modulo_range(min: i128, max: i128) -> TypeRef {
    Arc::new(RangeT { label: None, min, max, modulo: true })
}

/// Sign-invariant N-bit integer: accepts the union of the signed and unsigned ranges.
pub fn int_n(bits: u32) -> TypeRef {
    let bits = bits.clamp(1, 64);
    Arc::new(RangeT {
        label: Some(format!("{bits}-bit integer")),
        min: -(1i128 << (bits - 1)),
        max: (1i128 << bits) - 1,
        modulo: false,
    })
}

pub fn uint_n(bits: u32) -> TypeRef {
    let bits = bits.clamp(1, 64);
    Arc::new(RangeT {
        label: Some(format!("{bits}-bit unsigned integer")),
        min: 0,
        max: (1i128 << bits) - 1,
        modulo: false,
    })
}

pub fn sint_n(bits: u32) -> TypeRef {
    let bits = bits.clamp(1, 64);
    Arc::new(RangeT {
        label: Some(format!("{bits}-bit signed integer")),
        min: -(1i128 << (bits - 1)),
        max: (1i128 << (bits - 1)) - 1,
        modulo: false,
    })
}

/// The general integer type (sign-invariant 64-bit).
pub fn integer() -> TypeRef {
    Arc::new(RangeT {
        label: Some("integer".into()),
        min: -(1i128 << 63),
        max: (1i128 << 64) - 1,
        modulo: false,
    })
}

pub fn uint8() -> TypeRef {
    uint_n(8)
}

pub fn int8() -> TypeRef {
    int_n(8)
}

pub fn uint64() -> TypeRef {
    uint_n(64)
}

pub fn float() -> TypeRef {
    Arc::new(FloatT)
}

pub fn boolean() -> TypeRef {
    Arc::new(BoolT)
}

/// Flag type; `name` includes the leading dash.
pub fn flag(name: &str) -> TypeRef {
    Arc::new(FlagT { name: name.to_owned() })
}

pub fn nil() -> TypeRef {
    Arc::new(NilT)
}

pub fn address() -> TypeRef {
    Arc::new(AddrT)
}

pub fn list(elem: TypeRef) -> TypeRef {
    Arc::new(ListT { elem: Some(elem) })
}

/// List with elements of any type.
pub fn any_list() -> TypeRef {
    Arc::new(ListT { elem: None })
}

pub fn poly(alts: Vec<TypeRef>) -> TypeRef {
    Arc::new(PolyT::new(alts))
}

pub fn object() -> TypeRef {
    Arc::new(ObjT { filter: None, with_port: false })
}

/// Object restricted by a capability expression such as `(a|b)&c`.
pub fn object_of(expr: &str) -> Result<TypeRef, CliError> {
    let cap = Cap::parse(expr)?;
    Ok(Arc::new(ObjT { filter: Some((expr.to_owned(), cap)), with_port: false }))
}

/// Object with an optional `:port` suffix, yielding `[object, port-or-NIL]`.
pub fn object_port() -> TypeRef {
    Arc::new(ObjT { filter: None, with_port: true })
}

pub fn filename() -> TypeRef {
    Arc::new(FilenameT { must_exist: false })
}

pub fn existing_file() -> TypeRef {
    Arc::new(FilenameT { must_exist: true })
}

/// Any value: integer, float, address, string, list, boolean, NIL, object,
/// tried in that order.
pub fn any() -> TypeRef {
    poly(vec![integer(), float(), address(), string(), any_list(), boolean(), nil(), object()])
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::StaticHost;

    fn ctx() -> TypeCtx {
        let host = StaticHost::new();
        host.add_class("device", None, &["io"])
            .add_class("processor", Some("device"), &["exec"])
            .add_class("memory", Some("device"), &[])
            .add_object("board", "device")
            .add_object("board.cpu0", "processor")
            .add_object("board.mem", "memory")
            .add_port("board.cpu0", "RESET");
        TypeCtx::new(Arc::new(host))
    }

    fn tok(kind: Kind) -> Vec<Token> {
        vec![Token::new(kind, 1)]
    }

    #[test]
    fn modulo_range_wraps_with_notice() {
        let mut c = ctx();
        let t = modulo_range(0, 255);
        assert_eq!(t.normalize(&Value::Int(-1), &mut c).unwrap(), Value::Int(255));
        assert_eq!(c.notices.len(), 1);
        assert_eq!(t.normalize(&Value::Int(256), &mut c).unwrap(), Value::Int(0));
        assert_eq!(t.normalize(&Value::Int(7), &mut c).unwrap(), Value::Int(7));
        assert_eq!(c.notices.len(), 2);
    }

    #[test]
    fn modulo_range_wraps_extreme_values() {
        let mut c = ctx();
        let t = modulo_range(-128, 127);
        assert_eq!(t.normalize(&Value::Int(i128::MAX), &mut c).unwrap(), Value::Int(-1));
        assert_eq!(t.normalize(&Value::Int(i128::MIN), &mut c).unwrap(), Value::Int(0));
        assert_eq!(t.normalize(&Value::Int(-129), &mut c).unwrap(), Value::Int(127));
        let (v, _) = t.parse(&tok(Kind::Int(i128::MAX)), &mut c).unwrap();
        assert_eq!(v, Value::Int(-1));
    }

    #[test]
    fn plain_range_rejects() {
        let mut c = ctx();
        let t = range(0, 255);
        assert!(matches!(t.normalize(&Value::Int(256), &mut c), Err(CliError::Value(_))));
        assert!(t.parse(&tok(Kind::Int(-1)), &mut c).unwrap_err().is_type_mismatch());
    }

    #[test]
    fn sign_invariant_bounds() {
        let mut c = ctx();
        let t = int_n(8);
        assert!(t.normalize(&Value::Int(-128), &mut c).is_ok());
        assert!(t.normalize(&Value::Int(255), &mut c).is_ok());
        assert!(t.normalize(&Value::Int(256), &mut c).is_err());
        assert!(t.normalize(&Value::Int(-129), &mut c).is_err());
        assert!(integer().normalize(&Value::Int(u64::MAX as i128), &mut c).is_ok());
    }

    #[test]
    fn poly_first_match_wins() {
        let mut c = ctx();
        let p = PolyT::new(vec![integer(), float(), string()]);
        let (tag, v, n) = p.parse_tagged(&tok(Kind::Int(3)), &mut c).unwrap();
        assert_eq!((tag, v, n), (0, Value::Int(3), 1));
        let (tag, v, _) = p.parse_tagged(&tok(Kind::Float(0.5)), &mut c).unwrap();
        assert_eq!((tag, v), (1, Value::Float(0.5)));
        let (tag, _, _) = p.parse_tagged(&tok(Kind::Word("x".into())), &mut c).unwrap();
        assert_eq!(tag, 2);
        assert!(p.parse_tagged(&tok(Kind::Nil), &mut c).is_err());
    }

    #[test]
    fn any_prefers_strings_over_objects() {
        let mut c = ctx();
        let (v, _) = any().parse(&tok(Kind::Word("board".into())), &mut c).unwrap();
        assert_eq!(v, Value::Str("board".into()));
        let (v, _) = any().parse(&tok(Kind::Object("board".into())), &mut c).unwrap();
        assert_eq!(v, Value::Object("board".into()));
    }

    #[test]
    fn list_checks_elements() {
        let mut c = ctx();
        let t = list(integer());
        let good = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(t.normalize(&good, &mut c).unwrap(), good);
        let bad = Value::List(vec![Value::Int(1), Value::from("x")]);
        assert!(t.normalize(&bad, &mut c).is_err());
    }

    #[test]
    fn object_filters() {
        let mut c = ctx();
        let t = object_of("(processor|memory)&device").unwrap();
        assert!(t.parse(&tok(Kind::Word("board.cpu0".into())), &mut c).is_ok());
        assert!(t.parse(&tok(Kind::Word("board.mem".into())), &mut c).is_ok());
        assert!(t.parse(&tok(Kind::Word("board".into())), &mut c).is_err());
        assert!(object_of("(a|b").is_err());
        assert_eq!(t.expand("board.", &c), vec!["board.cpu0", "board.mem"]);
    }

    #[test]
    fn relative_and_aliased_objects() {
        let mut c = ctx();
        c.namespace = Some("board".into());
        c.aliases = Arc::new(HashMap::from([("cpu".to_string(), "board.cpu0".to_string())]));
        let (v, _) = object().parse(&tok(Kind::Word("mem".into())), &mut c).unwrap();
        assert_eq!(v, Value::Object("board.mem".into()));
        let (v, _) = object().parse(&tok(Kind::Word("cpu".into())), &mut c).unwrap();
        assert_eq!(v, Value::Object("board.cpu0".into()));
    }

    #[test]
    fn object_ports() {
        let mut c = ctx();
        let t = object_port();
        let (v, _) = t.parse(&tok(Kind::Word("board.cpu0:RESET".into())), &mut c).unwrap();
        assert_eq!(v, Value::List(vec![Value::Object("board.cpu0".into()), Value::from("RESET")]));
        assert!(t.parse(&tok(Kind::Word("board.cpu0:NMI".into())), &mut c).is_err());
        let (v, _) = t.parse(&tok(Kind::Word("board.mem".into())), &mut c).unwrap();
        assert_eq!(v, Value::List(vec![Value::Object("board.mem".into()), Value::Nil]));
    }

    #[test]
    fn addresses() {
        let mut c = ctx();
        let (v, _) = address().parse(&tok(Kind::Int(16)), &mut c).unwrap();
        assert_eq!(v, Value::Address { space: String::new(), offset: 16 });
        assert!(address().normalize(&Value::Int(-1), &mut c).is_err());
    }

    #[test]
    fn filename_expansion_lists_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("boot.simics"), "").unwrap();
        std::fs::create_dir(dir.path().join("bin")).unwrap();
        let c = ctx();
        let base = format!("{}/b", dir.path().display());
        let got = filename().expand(&base, &c);
        let root = dir.path().display();
        assert_eq!(got, vec![format!("{root}/bin/"), format!("{root}/boot.simics")]);
        assert!(filename().is_filename());
    }

    #[test]
    fn string_sets() {
        let mut c = ctx();
        let t = string_set(&["fast", "slow"]);
        assert!(t.parse(&tok(Kind::Word("fast".into())), &mut c).is_ok());
        assert!(t.parse(&tok(Kind::Word("medium".into())), &mut c).is_err());
        assert_eq!(t.expand("s", &c), vec!["slow"]);
    }
}
