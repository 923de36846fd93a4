//! Conda line selectors (`  - foo  # [osx]`).
//!
//! Selectors are evaluated for a linux-64 build host running Python 3.11.

use super::lexer::{tokenize, Token};

const TRUE_IDENTS: &[&str] = &["linux", "linux64", "unix", "x86_64", "py3k"];
const FALSE_IDENTS: &[&str] = &[
    "osx", "win", "win32", "win64", "aarch64", "arm64", "ppc64le", "x86", "linux32", "py2k",
    "py27",
];
const PY: i64 = 311;
const TARGET_PLATFORM: &str = "linux-64";

/// Split a line into its content and selector expression, if it carries one.
pub fn split_selector(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim_end();
    let without_bracket = trimmed.strip_suffix(']')?;
    let open = without_bracket.rfind('[')?;
    let before = without_bracket[..open].trim_end();
    let content = before.strip_suffix('#')?;
    Some((content, &without_bracket[open + 1..]))
}

/// Drop every line whose selector evaluates false.
///
/// Malformed selectors keep their line.
pub fn apply_selectors(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        match split_selector(line) {
            Some((_, expr)) if !evaluate(expr).unwrap_or(true) => {}
            _ => out.push_str(line),
        }
    }
    out
}

pub fn evaluate(expr: &str) -> Result<bool, String> {
    let tokens = tokenize(expr)?;
    let mut parser = SelectorParser { tokens, pos: 0 };
    let value = parser.or_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!("unexpected trailing input in selector '{expr}'"));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Bool(bool),
    Int(i64),
    Str(String),
}

struct SelectorParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl SelectorParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(word)) if word == keyword)
    }

    fn or_expr(&mut self) -> Result<bool, String> {
        let mut value = self.and_expr()?;
        while self.peek_keyword("or") {
            self.pos += 1;
            let rhs = self.and_expr()?;
            value = value || rhs;
        }
        Ok(value)
    }

    fn and_expr(&mut self) -> Result<bool, String> {
        let mut value = self.not_expr()?;
        while self.peek_keyword("and") {
            self.pos += 1;
            let rhs = self.not_expr()?;
            value = value && rhs;
        }
        Ok(value)
    }

    fn not_expr(&mut self) -> Result<bool, String> {
        if self.peek_keyword("not") {
            self.pos += 1;
            return Ok(!self.not_expr()?);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<bool, String> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let value = self.or_expr()?;
            if self.tokens.get(self.pos) != Some(&Token::RParen) {
                return Err("expected ')' in selector".to_string());
            }
            self.pos += 1;
            return Ok(value);
        }

        let lhs = self.operand()?;
        let op = match self.peek() {
            Some(
                token @ (Token::Eq | Token::Ne | Token::Lt | Token::Le | Token::Gt | Token::Ge),
            ) => token.clone(),
            _ => {
                return Ok(match lhs {
                    Operand::Bool(b) => b,
                    Operand::Int(n) => n != 0,
                    Operand::Str(s) => !s.is_empty(),
                })
            }
        };
        self.pos += 1;
        let rhs = self.operand()?;

        Ok(match (lhs, rhs) {
            (Operand::Int(a), Operand::Int(b)) => compare(&op, a.cmp(&b)),
            (Operand::Str(a), Operand::Str(b)) => compare(&op, a.cmp(&b)),
            _ => false,
        })
    }

    fn operand(&mut self) -> Result<Operand, String> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        match token {
            Some(Token::Int(n)) => Ok(Operand::Int(n)),
            Some(Token::Str(s)) => Ok(Operand::Str(s)),
            Some(Token::Ident(name)) => Ok(lookup(&name)),
            other => Err(format!("unexpected token in selector: {other:?}")),
        }
    }
}

fn lookup(name: &str) -> Operand {
    match name {
        "py" => Operand::Int(PY),
        "target_platform" => Operand::Str(TARGET_PLATFORM.to_string()),
        "True" | "true" => Operand::Bool(true),
        "False" | "false" => Operand::Bool(false),
        _ if TRUE_IDENTS.contains(&name) => Operand::Bool(true),
        _ if FALSE_IDENTS.contains(&name) => Operand::Bool(false),
        _ => Operand::Bool(false),
    }
}

fn compare(op: &Token, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        Token::Eq => ordering == Equal,
        Token::Ne => ordering != Equal,
        Token::Lt => ordering == Less,
        Token::Le => ordering != Greater,
        Token::Gt => ordering == Greater,
        Token::Ge => ordering != Less,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_selector() {
        assert_eq!(
            split_selector("  - llvm-openmp  # [osx]\n"),
            Some(("  - llvm-openmp  ", "osx"))
        );
        assert_eq!(split_selector("  skip: True #[py2k]"), Some(("  skip: True ", "py2k")));
        assert_eq!(split_selector("  - [a, b]"), None);
        assert_eq!(split_selector("plain: line"), None);
    }

    #[test]
    fn test_platform_identifiers() {
        assert!(evaluate("linux").unwrap());
        assert!(!evaluate("osx").unwrap());
        assert!(evaluate("not win").unwrap());
        assert!(evaluate("linux and not aarch64").unwrap());
        assert!(evaluate("osx or unix").unwrap());
        assert!(!evaluate("(osx or win) and linux").unwrap());
    }

    #[test]
    fn test_python_comparisons() {
        assert!(evaluate("py >= 36").unwrap());
        assert!(!evaluate("py < 38").unwrap());
        assert!(evaluate("py3k and py != 27").unwrap());
        assert!(evaluate("target_platform == 'linux-64'").unwrap());
    }

    #[test]
    fn test_apply_selectors_drops_false_lines() {
        let text = "requirements:\n  host:\n    - zlib\n    - llvm-openmp  # [osx]\n    - libgomp  # [linux]\n";
        let filtered = apply_selectors(text);
        assert!(filtered.contains("zlib"));
        assert!(filtered.contains("libgomp"));
        assert!(!filtered.contains("llvm-openmp"));
    }

    #[test]
    fn test_malformed_selector_keeps_line() {
        let text = "  - thing  # [linux and]\n";
        assert_eq!(apply_selectors(text), text);
    }

    #[test]
    fn test_unknown_identifier_is_false() {
        assert!(!evaluate("emscripten").unwrap());
        assert!(evaluate("not emscripten").unwrap());
        assert!(evaluate("emscripten or linux").unwrap());

        let text = "build:\n  number: 0\n  skip: True  # [emscripten]\n  noarch: generic  # [not s390x]\n";
        let filtered = apply_selectors(text);
        assert!(!filtered.contains("skip"));
        assert!(filtered.contains("noarch: generic"));
    }
}
