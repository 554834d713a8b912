// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Template rendering with a restricted expression language
//!
//! Sink templates are strings with `{expr}` placeholders (`{{` and `}}`
//! escape literal braces). Expressions support string literals, dotted
//! event field access, calls into a fixed helper table, `==`/`!=`
//! comparison and `cond ? a : b`. Context scripts are `name = expr` lines
//! evaluated into named bindings, either once at sink construction
//! (`template_context_init`, no event in scope) or once per event
//! (`template_context`).

use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};

use crate::events::{format, WatchedEvent};

#[derive(Debug, Clone)]
enum Expr {
    Str(String),
    /// `event`, `event.message`, or a context binding name
    Path(Vec<String>),
    Call(String, Vec<Expr>),
    Cmp {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        negated: bool,
    },
    Cond {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

#[derive(Debug)]
enum Segment {
    Literal(String),
    Expr(Expr),
}

/// A parsed sink template, ready to render against events.
#[derive(Debug)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(src: &str) -> Result<Self> {
        let chars: Vec<char> = src.chars().collect();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '{' if chars.get(i + 1) == Some(&'{') => {
                    literal.push('{');
                    i += 2;
                }
                '}' if chars.get(i + 1) == Some(&'}') => {
                    literal.push('}');
                    i += 2;
                }
                '{' => {
                    let end = find_placeholder_end(&chars, i + 1)
                        .ok_or_else(|| anyhow!("unterminated '{{' in template"))?;
                    let inner: String = chars[i + 1..end].iter().collect();
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Expr(
                        parse_expr(&inner).with_context(|| format!("in placeholder {{{}}}", inner))?,
                    ));
                    i = end + 1;
                }
                '}' => bail!("unmatched '}}' in template"),
                c => {
                    literal.push(c);
                    i += 1;
                }
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    pub fn render(
        &self,
        bindings: &HashMap<String, String>,
        event: Option<&WatchedEvent>,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Expr(e) => out.push_str(&eval(e, bindings, event, now)?.into_str()?),
            }
        }
        Ok(out)
    }
}

/// Find the `}` closing a placeholder, skipping over quoted strings.
fn find_placeholder_end(chars: &[char], mut i: usize) -> Option<usize> {
    while i < chars.len() {
        match chars[i] {
            '}' => return Some(i),
            q @ ('\'' | '"') => {
                i += 1;
                while i < chars.len() && chars[i] != q {
                    i += 1;
                }
                if i == chars.len() {
                    return None;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    None
}

/// A `name = expr` script producing context bindings in order, so later
/// assignments can reference earlier ones.
#[derive(Debug)]
pub struct ContextScript {
    assigns: Vec<(String, Expr)>,
}

impl ContextScript {
    pub fn parse(src: &str) -> Result<Self> {
        let mut assigns = Vec::new();

        for line in src.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (name, expr_src) = split_assignment(line)
                .ok_or_else(|| anyhow!("expected 'name = expression', got '{}'", line))?;
            if !is_ident(name) {
                bail!("invalid binding name '{}'", name);
            }
            let expr =
                parse_expr(expr_src).with_context(|| format!("in assignment to '{}'", name))?;
            assigns.push((name.to_string(), expr));
        }

        Ok(Self { assigns })
    }

    pub fn eval_into(
        &self,
        bindings: &mut HashMap<String, String>,
        event: Option<&WatchedEvent>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        for (name, expr) in &self.assigns {
            let value = eval(expr, bindings, event, now)?
                .into_str()
                .with_context(|| format!("in assignment to '{}'", name))?;
            bindings.insert(name.clone(), value);
        }
        Ok(())
    }
}

/// Split on the first `=` that is not part of `==` or `!=`.
fn split_assignment(line: &str) -> Option<(&str, &str)> {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'=' {
            if bytes.get(i + 1) == Some(&b'=') {
                i += 2;
                continue;
            }
            if i > 0 && bytes[i - 1] == b'!' {
                i += 1;
                continue;
            }
            return Some((line[..i].trim(), line[i + 1..].trim()));
        }
        i += 1;
    }
    None
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    Comma,
    Dot,
    Question,
    Colon,
    EqEq,
    NotEq,
}

fn lex(src: &str) -> Result<Vec<Tok>> {
    let chars: Vec<char> = src.chars().collect();
    let mut toks = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            ',' => {
                toks.push(Tok::Comma);
                i += 1;
            }
            '.' => {
                toks.push(Tok::Dot);
                i += 1;
            }
            '?' => {
                toks.push(Tok::Question);
                i += 1;
            }
            ':' => {
                toks.push(Tok::Colon);
                i += 1;
            }
            '=' => {
                if chars.get(i + 1) != Some(&'=') {
                    bail!("single '=' is not valid in an expression, use '=='");
                }
                toks.push(Tok::EqEq);
                i += 2;
            }
            '!' => {
                if chars.get(i + 1) != Some(&'=') {
                    bail!("'!' is only valid as part of '!='");
                }
                toks.push(Tok::NotEq);
                i += 2;
            }
            '\'' | '"' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    s.push(chars[i]);
                    i += 1;
                }
                if i == chars.len() {
                    bail!("unterminated string literal");
                }
                toks.push(Tok::Str(s));
                i += 1;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut s = String::new();
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_')
                {
                    s.push(chars[i]);
                    i += 1;
                }
                toks.push(Tok::Ident(s));
            }
            other => bail!("unexpected character '{}' in expression", other),
        }
    }

    Ok(toks)
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok) -> Result<()> {
        if self.eat(&tok) {
            Ok(())
        } else {
            bail!("expected {:?}, found {:?}", tok, self.peek())
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.toks.get(self.pos) {
            Some(Tok::Ident(s)) => {
                let s = s.clone();
                self.pos += 1;
                Ok(s)
            }
            other => bail!("expected identifier, found {:?}", other),
        }
    }

    // ternary := cmp ('?' ternary ':' ternary)?
    fn ternary(&mut self) -> Result<Expr> {
        let cond = self.cmp()?;
        if self.eat(&Tok::Question) {
            let then = self.ternary()?;
            self.expect(Tok::Colon)?;
            let otherwise = self.ternary()?;
            return Ok(Expr::Cond {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(cond)
    }

    // cmp := primary (('==' | '!=') primary)?
    fn cmp(&mut self) -> Result<Expr> {
        let lhs = self.primary()?;
        let negated = match self.peek() {
            Some(Tok::EqEq) => false,
            Some(Tok::NotEq) => true,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.primary()?;
        Ok(Expr::Cmp {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            negated,
        })
    }

    // primary := string | '(' ternary ')' | ident '(' args ')' | path
    fn primary(&mut self) -> Result<Expr> {
        match self.toks.get(self.pos) {
            Some(Tok::Str(s)) => {
                let s = s.clone();
                self.pos += 1;
                Ok(Expr::Str(s))
            }
            Some(Tok::LParen) => {
                self.pos += 1;
                let inner = self.ternary()?;
                self.expect(Tok::RParen)?;
                Ok(inner)
            }
            Some(Tok::Ident(_)) => {
                let name = self.expect_ident()?;
                if self.eat(&Tok::LParen) {
                    let mut args = Vec::new();
                    if !self.eat(&Tok::RParen) {
                        loop {
                            args.push(self.ternary()?);
                            if self.eat(&Tok::RParen) {
                                break;
                            }
                            self.expect(Tok::Comma)?;
                        }
                    }
                    return Ok(Expr::Call(name, args));
                }
                let mut path = vec![name];
                while self.eat(&Tok::Dot) {
                    path.push(self.expect_ident()?);
                }
                Ok(Expr::Path(path))
            }
            other => bail!("expected expression, found {:?}", other),
        }
    }
}

fn parse_expr(src: &str) -> Result<Expr> {
    let mut parser = Parser { toks: lex(src)?, pos: 0 };
    let expr = parser.ternary()?;
    if parser.pos != parser.toks.len() {
        bail!("trailing tokens after expression");
    }
    Ok(expr)
}

enum Value<'a> {
    Str(String),
    Event(&'a WatchedEvent),
}

impl Value<'_> {
    fn into_str(self) -> Result<String> {
        match self {
            Value::Str(s) => Ok(s),
            Value::Event(_) => {
                bail!("the event object cannot be used as a string; use a field like event.message")
            }
        }
    }
}

fn eval<'a>(
    expr: &Expr,
    bindings: &HashMap<String, String>,
    event: Option<&'a WatchedEvent>,
    now: DateTime<Utc>,
) -> Result<Value<'a>> {
    match expr {
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Path(path) => {
            if path[0] == "event" {
                let ev =
                    event.ok_or_else(|| anyhow!("'event' is not available in this context"))?;
                if path.len() == 1 {
                    return Ok(Value::Event(ev));
                }
                let field = path[1..].join(".");
                let value = ev
                    .field(&field)
                    .ok_or_else(|| anyhow!("unknown event field '{}'", field))?;
                return Ok(Value::Str(value));
            }
            if path.len() == 1 {
                if let Some(v) = bindings.get(&path[0]) {
                    return Ok(Value::Str(v.clone()));
                }
            }
            bail!("unknown name '{}'", path.join("."))
        }
        Expr::Call(name, args) => {
            let args = args
                .iter()
                .map(|a| eval(a, bindings, event, now))
                .collect::<Result<Vec<_>>>()?;
            call_helper(name, args, now)
        }
        Expr::Cmp { lhs, rhs, negated } => {
            let l = eval(lhs, bindings, event, now)?.into_str()?;
            let r = eval(rhs, bindings, event, now)?.into_str()?;
            let result = (l == r) != *negated;
            Ok(Value::Str(if result { "true" } else { "false" }.to_string()))
        }
        Expr::Cond { cond, then, otherwise } => {
            let c = eval(cond, bindings, event, now)?.into_str()?;
            if !c.is_empty() && c != "false" {
                eval(then, bindings, event, now)
            } else {
                eval(otherwise, bindings, event, now)
            }
        }
    }
}

/// Pre-registered helper table; the only functions templates can call.
fn call_helper<'a>(name: &str, mut args: Vec<Value<'a>>, now: DateTime<Utc>) -> Result<Value<'a>> {
    fn one<'a>(name: &str, args: &mut Vec<Value<'a>>) -> Result<Value<'a>> {
        if args.len() != 1 {
            bail!("{}() takes exactly one argument, got {}", name, args.len());
        }
        Ok(args.remove(0))
    }

    let arg = one(name, &mut args)?;

    let out = match name {
        "escape_json" => escape_json(&arg.into_str()?),
        "lower" => arg.into_str()?.to_lowercase(),
        "trim" => arg.into_str()?.trim().to_string(),
        "format_involved_object" => format::involved_object_label(&as_event(name, arg)?.raw),
        "format_involved_object_kind" => format::involved_object_kind(&as_event(name, arg)?.raw),
        "format_event_age" => format::age_summary(&as_event(name, arg)?.raw, now),
        "format_event_source" => format::source_label(&as_event(name, arg)?.raw),
        _ => bail!("unknown helper function '{}'", name),
    };

    Ok(Value::Str(out))
}

fn as_event<'a>(helper: &str, value: Value<'a>) -> Result<&'a WatchedEvent> {
    match value {
        Value::Event(ev) => Ok(ev),
        Value::Str(_) => bail!("{}() expects the event object", helper),
    }
}

/// JSON-escape a string without the surrounding quotes, for embedding into
/// template-built JSON documents.
pub fn escape_json(s: &str) -> String {
    match serde_json::to_string(s) {
        Ok(quoted) => quoted[1..quoted.len() - 1].to_string(),
        Err(_) => s.to_string(),
    }
}

/// A sink's complete rendering setup: parsed template, static bindings from
/// the one-time init script, and the per-event context script.
#[derive(Debug)]
pub struct Renderer {
    template: Template,
    static_bindings: HashMap<String, String>,
    context: Option<ContextScript>,
}

impl Renderer {
    /// Parse everything up front; the init script runs here, once, with no
    /// event in scope, so a broken template or an init script referencing
    /// the event fails at startup rather than on first delivery.
    pub fn new(template: &str, init: Option<&str>, context: Option<&str>) -> Result<Self> {
        let template = Template::parse(template)?;

        let mut static_bindings = HashMap::new();
        if let Some(src) = init {
            ContextScript::parse(src)?
                .eval_into(&mut static_bindings, None, Utc::now())
                .context("evaluating template_context_init")?;
        }

        let context = context.map(ContextScript::parse).transpose()?;

        Ok(Self { template, static_bindings, context })
    }

    pub fn render(&self, event: &WatchedEvent) -> Result<String> {
        let now = Utc::now();
        let mut bindings = self.static_bindings.clone();
        if let Some(script) = &self.context {
            script.eval_into(&mut bindings, Some(event), now)?;
        }
        self.template.render(&bindings, Some(event), now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::test_event;

    fn sample() -> WatchedEvent {
        WatchedEvent::new(test_event(
            "Pod",
            Some("default"),
            "web-1",
            "Failed",
            "kubelet",
            Some("node1"),
        ))
    }

    #[test]
    fn test_render_field_access() {
        let r = Renderer::new("{event.reason}: {event.message}", None, None).unwrap();
        assert_eq!(r.render(&sample()).unwrap(), "Failed: Failed happened");
    }

    #[test]
    fn test_render_brace_escapes() {
        let r = Renderer::new(r#"{{"reason": "{event.reason}"}}"#, None, None).unwrap();
        assert_eq!(r.render(&sample()).unwrap(), r#"{"reason": "Failed"}"#);
    }

    #[test]
    fn test_render_helper_calls() {
        let r = Renderer::new("{format_involved_object(event)} via {format_event_source(event)}", None, None)
            .unwrap();
        assert_eq!(r.render(&sample()).unwrap(), "default/web-1 via kubelet/node1");
    }

    #[test]
    fn test_render_context_script() {
        let context = "obj = format_involved_object(event)\nwho = lower(event.reason)";
        let r = Renderer::new("{obj} {who}", None, Some(context)).unwrap();
        assert_eq!(r.render(&sample()).unwrap(), "default/web-1 failed");
    }

    #[test]
    fn test_context_script_later_lines_see_earlier_bindings() {
        let context = "a = event.reason\nb = lower(a)";
        let r = Renderer::new("{b}", None, Some(context)).unwrap();
        assert_eq!(r.render(&sample()).unwrap(), "failed");
    }

    #[test]
    fn test_render_ternary() {
        let context = "color = lower(event.type) == 'warning' ? 'warning' : 'good'";
        let r = Renderer::new("{color}", None, Some(context)).unwrap();

        let mut ev = sample();
        assert_eq!(r.render(&ev).unwrap(), "good");
        ev.raw.type_ = Some("Warning".to_string());
        assert_eq!(r.render(&ev).unwrap(), "warning");
    }

    #[test]
    fn test_escape_json() {
        assert_eq!(escape_json(r#"a "quoted" line"#), r#"a \"quoted\" line"#);
        assert_eq!(escape_json("line\nbreak"), r#"line\nbreak"#);
        assert_eq!(escape_json("plain"), "plain");
    }

    #[test]
    fn test_unknown_binding_is_render_error() {
        let r = Renderer::new("{nope}", None, None).unwrap();
        assert!(r.render(&sample()).unwrap_err().to_string().contains("unknown name"));
    }

    #[test]
    fn test_unknown_field_is_render_error() {
        let r = Renderer::new("{event.bogus}", None, None).unwrap();
        assert!(r.render(&sample()).unwrap_err().to_string().contains("unknown event field"));
    }

    #[test]
    fn test_init_script_referencing_event_fails_at_construction() {
        let err = Renderer::new("{x}", Some("x = event.reason"), None).unwrap_err();
        assert!(err.to_string().contains("template_context_init"));
    }

    #[test]
    fn test_init_script_bindings_available_per_event() {
        let r = Renderer::new("{prefix}{event.reason}", Some("prefix = '>> '"), None).unwrap();
        assert_eq!(r.render(&sample()).unwrap(), ">> Failed");
    }

    #[test]
    fn test_parse_errors() {
        assert!(Template::parse("{unclosed").is_err());
        assert!(Template::parse("}").is_err());
        assert!(Renderer::new("{event.reason", None, None).is_err());
        assert!(ContextScript::parse("not an assignment").is_err());
        assert!(ContextScript::parse("1bad = 'x'").is_err());
    }

    #[test]
    fn test_assignment_split_ignores_comparison_operators() {
        let script = "ok = event.reason == 'Failed' ? 'yes' : 'no'";
        let r = Renderer::new("{ok}", None, Some(script)).unwrap();
        assert_eq!(r.render(&sample()).unwrap(), "yes");
    }
}
