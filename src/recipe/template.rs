//! Rendering of the Jinja2 subset used in `meta.yaml` files.
//!
//! Only what recipes actually rely on is supported: `{% set %}` bindings,
//! `{{ }}` substitutions with a handful of filters and string methods, and
//! `{# #}` comments. Control-flow tags are dropped and undefined names render
//! as empty strings, so unfamiliar templates degrade instead of failing.

use std::collections::HashMap;

use super::lexer::{tokenize, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Str(String),
    Int(i64),
    List(Vec<Value>),
}

impl Value {
    pub fn render(&self) -> String {
        match self {
            Value::Undefined => String::new(),
            Value::Str(s) => s.clone(),
            Value::Int(n) => n.to_string(),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(|v| format!("'{}'", v.render())).collect();
                format!("[{}]", inner.join(", "))
            }
        }
    }

    fn as_str(&self) -> String {
        self.render()
    }
}

/// Failure while rendering, positioned by 1-based line number.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateError {
    pub line: usize,
    pub message: String,
}

pub type Context = HashMap<String, Value>;

/// Render `source`, returning the text and the variables bound by `{% set %}`.
pub fn render(source: &str) -> Result<(String, Context), TemplateError> {
    let mut context = Context::new();
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    let mut line = 1;

    while let Some(start) = find_tag_start(rest) {
        let (before, tag) = rest.split_at(start);
        out.push_str(before);
        line += before.matches('\n').count();

        let close = match &tag[..2] {
            "{{" => "}}",
            "{%" => "%}",
            _ => "#}",
        };
        let end = tag[2..].find(close).ok_or_else(|| TemplateError {
            line,
            message: format!("unterminated '{}' tag", &tag[..2]),
        })?;
        let body = &tag[2..2 + end];
        let inner = body.trim_matches('-').trim();

        match &tag[..2] {
            "{{" => {
                let value = eval_expression(inner, &context)
                    .map_err(|message| TemplateError { line, message })?;
                out.push_str(&value.render());
            }
            "{%" => {
                if let Some(binding) = inner.strip_prefix("set ") {
                    let (name, value) = eval_set(binding, &context)
                        .map_err(|message| TemplateError { line, message })?;
                    context.insert(name, value);
                }
            }
            _ => {}
        }

        line += body.matches('\n').count();
        rest = &tag[2 + end + 2..];
    }
    out.push_str(rest);

    Ok((out, context))
}

fn find_tag_start(text: &str) -> Option<usize> {
    ["{{", "{%", "{#"]
        .iter()
        .filter_map(|open| text.find(open))
        .min()
}

fn eval_set(binding: &str, context: &Context) -> Result<(String, Value), String> {
    let (name, expr) = binding
        .split_once('=')
        .ok_or_else(|| format!("malformed set statement: 'set {binding}'"))?;
    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(format!("invalid variable name in set statement: '{name}'"));
    }
    let value = eval_expression(expr.trim(), context)?;
    Ok((name.to_string(), value))
}

/// Evaluate a single expression against the bound variables.
pub fn eval_expression(expr: &str, context: &Context) -> Result<Value, String> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Ok(Value::Undefined);
    }
    let mut parser = ExprParser {
        tokens: &tokens,
        pos: 0,
        context,
    };
    let value = parser.concat()?;
    if parser.pos != tokens.len() {
        return Err(format!("unexpected trailing input in expression '{expr}'"));
    }
    Ok(value)
}

struct ExprParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    context: &'a Context,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        match self.advance() {
            Some(ref token) if *token == expected => Ok(()),
            other => Err(format!("expected {expected:?}, found {other:?}")),
        }
    }

    fn concat(&mut self) -> Result<Value, String> {
        let mut value = self.filtered()?;
        loop {
            match self.peek() {
                Some(Token::Tilde) => {
                    self.pos += 1;
                    let rhs = self.filtered()?;
                    value = Value::Str(value.as_str() + &rhs.as_str());
                }
                Some(Token::Plus) => {
                    self.pos += 1;
                    let rhs = self.filtered()?;
                    value = match (value, rhs) {
                        (Value::Int(a), Value::Int(b)) => Value::Int(a.saturating_add(b)),
                        (a, b) => Value::Str(a.as_str() + &b.as_str()),
                    };
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    let rhs = self.filtered()?;
                    value = match (value, rhs) {
                        (Value::Int(a), Value::Int(b)) => Value::Int(a.saturating_sub(b)),
                        _ => Value::Undefined,
                    };
                }
                _ => return Ok(value),
            }
        }
    }

    fn filtered(&mut self) -> Result<Value, String> {
        let mut value = self.postfix()?;
        while self.peek() == Some(&Token::Pipe) {
            self.pos += 1;
            let name = match self.advance() {
                Some(Token::Ident(name)) => name,
                other => return Err(format!("expected filter name, found {other:?}")),
            };
            let args = if self.peek() == Some(&Token::LParen) {
                self.call_args()?
            } else {
                Vec::new()
            };
            value = apply_method(&name, value, &args);
        }
        Ok(value)
    }

    fn postfix(&mut self) -> Result<Value, String> {
        let mut value = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::LBracket) => {
                    self.pos += 1;
                    value = self.subscript(value)?;
                }
                Some(Token::Dot) => {
                    self.pos += 1;
                    let name = match self.advance() {
                        Some(Token::Ident(name)) => name,
                        other => return Err(format!("expected attribute name, found {other:?}")),
                    };
                    value = if self.peek() == Some(&Token::LParen) {
                        let args = self.call_args()?;
                        apply_method(&name, value, &args)
                    } else {
                        Value::Undefined
                    };
                }
                _ => return Ok(value),
            }
        }
    }

    fn subscript(&mut self, value: Value) -> Result<Value, String> {
        let start = match self.peek() {
            Some(Token::Colon) => None,
            _ => Some(self.concat()?),
        };
        if self.peek() == Some(&Token::Colon) {
            self.pos += 1;
            let end = match self.peek() {
                Some(Token::RBracket) => None,
                _ => Some(self.concat()?),
            };
            self.expect(Token::RBracket)?;
            return Ok(slice(value, start.as_ref(), end.as_ref()));
        }
        self.expect(Token::RBracket)?;
        Ok(match start {
            Some(index) => index_value(value, &index),
            None => Value::Undefined,
        })
    }

    fn call_args(&mut self) -> Result<Vec<Value>, String> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            // keyword arguments are accepted and ignored
            if matches!(self.peek(), Some(Token::Ident(_)))
                && self.tokens.get(self.pos + 1) == Some(&Token::Assign)
            {
                self.pos += 2;
                self.concat()?;
            } else {
                args.push(self.concat()?);
            }
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                other => return Err(format!("expected ',' or ')', found {other:?}")),
            }
        }
    }

    fn primary(&mut self) -> Result<Value, String> {
        match self.advance() {
            Some(Token::Str(s)) => Ok(Value::Str(s)),
            Some(Token::Int(n)) => Ok(Value::Int(n)),
            Some(Token::Minus) => match self.postfix()? {
                Value::Int(n) => Ok(Value::Int(n.saturating_neg())),
                Value::Undefined => Ok(Value::Undefined),
                other => Err(format!("cannot negate '{}'", other.render())),
            },
            Some(Token::LParen) => {
                let value = self.concat()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                if self.peek() == Some(&Token::RBracket) {
                    self.pos += 1;
                    return Ok(Value::List(items));
                }
                loop {
                    items.push(self.concat()?);
                    match self.advance() {
                        Some(Token::Comma) => continue,
                        Some(Token::RBracket) => return Ok(Value::List(items)),
                        other => return Err(format!("expected ',' or ']', found {other:?}")),
                    }
                }
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    // compiler('c'), pin_subpackage(...) and friends
                    self.call_args()?;
                    return Ok(Value::Undefined);
                }
                Ok(self
                    .context
                    .get(&name)
                    .cloned()
                    .unwrap_or(Value::Undefined))
            }
            other => Err(format!("unexpected token {other:?}")),
        }
    }
}

fn apply_method(name: &str, value: Value, args: &[Value]) -> Value {
    if value == Value::Undefined {
        return Value::Undefined;
    }
    match name {
        "lower" => Value::Str(value.as_str().to_lowercase()),
        "upper" => Value::Str(value.as_str().to_uppercase()),
        "trim" | "strip" => Value::Str(value.as_str().trim().to_string()),
        "string" => Value::Str(value.as_str()),
        "replace" => match args {
            [from, to, ..] => Value::Str(value.as_str().replace(&from.as_str(), &to.as_str())),
            _ => value,
        },
        "int" => value
            .as_str()
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .unwrap_or(Value::Int(0)),
        "split" => {
            let text = value.as_str();
            let parts: Vec<Value> = match args.first() {
                Some(sep) => text
                    .split(sep.as_str().as_str())
                    .map(|s| Value::Str(s.to_string()))
                    .collect(),
                None => text
                    .split_whitespace()
                    .map(|s| Value::Str(s.to_string()))
                    .collect(),
            };
            Value::List(parts)
        }
        "join" => match value {
            Value::List(items) => {
                let sep = args.first().map(Value::as_str).unwrap_or_default();
                let parts: Vec<String> = items.iter().map(Value::as_str).collect();
                Value::Str(parts.join(&sep))
            }
            other => other,
        },
        "first" => index_value(value, &Value::Int(0)),
        "last" => index_value(value, &Value::Int(-1)),
        "length" => match value {
            Value::List(items) => Value::Int(items.len() as i64),
            other => Value::Int(other.as_str().chars().count() as i64),
        },
        _ => Value::Undefined,
    }
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let resolved = if index < 0 { len + index } else { index };
    (0..len).contains(&resolved).then_some(resolved as usize)
}

fn clamp_bound(bound: Option<&Value>, len: usize, default: usize) -> usize {
    match bound {
        Some(Value::Int(n)) => {
            let len_i = len as i64;
            let resolved = if *n < 0 { len_i + n } else { *n };
            resolved.clamp(0, len_i) as usize
        }
        _ => default,
    }
}

fn index_value(value: Value, index: &Value) -> Value {
    let Value::Int(i) = index else {
        return Value::Undefined;
    };
    match value {
        Value::List(items) => resolve_index(*i, items.len())
            .and_then(|idx| items.into_iter().nth(idx))
            .unwrap_or(Value::Undefined),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            resolve_index(*i, chars.len())
                .map(|idx| Value::Str(chars[idx].to_string()))
                .unwrap_or(Value::Undefined)
        }
        _ => Value::Undefined,
    }
}

fn slice(value: Value, start: Option<&Value>, end: Option<&Value>) -> Value {
    match value {
        Value::List(items) => {
            let from = clamp_bound(start, items.len(), 0);
            let to = clamp_bound(end, items.len(), items.len()).max(from);
            Value::List(items[from..to].to_vec())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let from = clamp_bound(start, chars.len(), 0);
            let to = clamp_bound(end, chars.len(), chars.len()).max(from);
            Value::Str(chars[from..to].iter().collect())
        }
        Value::Int(n) => slice(Value::Str(n.to_string()), start, end),
        Value::Undefined => Value::Undefined,
    }
}
