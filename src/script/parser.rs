//! Tokenizer and recursive-descent parser for bridge scripts.

use serde_json::{Number, Value};

use crate::script::ScriptError;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Name(String),
    List(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign(String, Expr),
    Expr(Expr),
}

/// A statement and the line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub line: usize,
    pub stmt: Stmt,
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Num(Number),
    Str(String),
    Punct(&'static str),
    Sep,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: usize,
}

const PUNCT: [&str; 14] = ["==", "!=", ".", ",", ":", "=", "+", "-", "(", ")", "[", "]", "{", "}"];

fn syntax(line: usize, message: impl Into<String>) -> ScriptError {
    ScriptError::Syntax {
        line,
        message: message.into(),
    }
}

fn tokenize(src: &str) -> Result<Vec<Token>, ScriptError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut depth = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' | ';' => {
                // Newlines inside brackets do not end a statement.
                if c == ';' || depth == 0 {
                    tokens.push(Token { tok: Tok::Sep, line });
                }
                if c == '\n' {
                    line += 1;
                }
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '"' | '\'' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    let Some(&ch) = chars.get(i) else {
                        return Err(syntax(line, "unterminated string"));
                    };
                    i += 1;
                    match ch {
                        ch if ch == quote => break,
                        '\n' => return Err(syntax(line, "unterminated string")),
                        '\\' => {
                            let escaped = chars.get(i).copied().ok_or_else(|| syntax(line, "unterminated string"))?;
                            i += 1;
                            text.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                'r' => '\r',
                                other => other,
                            });
                        }
                        ch => text.push(ch),
                    }
                }
                tokens.push(Token { tok: Tok::Str(text), line });
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || matches!(chars[i], '.' | 'e' | 'E'))
                    || (i > start && matches!(chars[i - 1], 'e' | 'E') && matches!(chars.get(i), Some('+') | Some('-')))
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number = serde_json::from_str::<Number>(&text)
                    .map_err(|_| syntax(line, format!("invalid number '{}'", text)))?;
                tokens.push(Token { tok: Tok::Num(number), line });
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token {
                    tok: Tok::Ident(chars[start..i].iter().collect()),
                    line,
                });
            }
            _ => {
                let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
                let punct = PUNCT
                    .iter()
                    .find(|p| rest.starts_with(**p))
                    .ok_or_else(|| syntax(line, format!("unexpected character '{}'", c)))?;
                match *punct {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => depth = depth.saturating_sub(1),
                    _ => {}
                }
                tokens.push(Token { tok: Tok::Punct(*punct), line });
                i += punct.len();
            }
        }
    }

    Ok(tokens)
}

/// Deepest expression tree a script may build.
///
/// Counts nesting and chained operators alike, since both deepen the tree
/// the evaluator walks recursively.
const MAX_DEPTH: usize = 128;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn peek_at(&self, offset: usize) -> Option<&Tok> {
        self.tokens.get(self.pos + offset).map(|t| &t.tok)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).map(|t| t.tok.clone());
        self.pos += 1;
        tok
    }

    fn eat(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Punct(p)) if *p == punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), ScriptError> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(syntax(self.line(), format!("expected '{}'", punct)))
        }
    }

    fn descend(&mut self) -> Result<(), ScriptError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(syntax(self.line(), "nesting too deep"));
        }
        Ok(())
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(Tok::Sep)) {
            self.pos += 1;
        }
    }

    fn program(&mut self) -> Result<Vec<Statement>, ScriptError> {
        let mut statements = Vec::new();
        self.skip_separators();
        while self.peek().is_some() {
            let line = self.line();
            let stmt = self.statement()?;
            statements.push(Statement { line, stmt });
            match self.peek() {
                None => break,
                Some(Tok::Sep) => self.skip_separators(),
                Some(_) => return Err(syntax(self.line(), "expected end of statement")),
            }
        }
        Ok(statements)
    }

    fn statement(&mut self) -> Result<Stmt, ScriptError> {
        if let (Some(Tok::Ident(name)), Some(Tok::Punct("="))) = (self.peek(), self.peek_at(1)) {
            let name = name.clone();
            self.pos += 2;
            return Ok(Stmt::Assign(name, self.expr()?));
        }
        Ok(Stmt::Expr(self.expr()?))
    }

    fn expr(&mut self) -> Result<Expr, ScriptError> {
        let base = self.depth;
        self.descend()?;
        let mut lhs = self.additive()?;
        loop {
            let op = if self.eat("==") {
                BinOp::Eq
            } else if self.eat("!=") {
                BinOp::Ne
            } else {
                self.depth = base;
                return Ok(lhs);
            };
            self.descend()?;
            let rhs = self.additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn additive(&mut self) -> Result<Expr, ScriptError> {
        let base = self.depth;
        let mut lhs = self.unary()?;
        while self.eat("+") {
            self.descend()?;
            let rhs = self.unary()?;
            lhs = Expr::Binary(BinOp::Add, Box::new(lhs), Box::new(rhs));
        }
        self.depth = base;
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        if self.eat("-") {
            let base = self.depth;
            self.descend()?;
            let operand = self.unary()?;
            self.depth = base;
            return Ok(Expr::Neg(Box::new(operand)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        let base = self.depth;
        let mut expr = self.primary()?;
        loop {
            if matches!(self.peek(), Some(Tok::Punct("." | "["))) {
                self.descend()?;
            }
            if self.eat(".") {
                match self.next() {
                    Some(Tok::Ident(field)) => expr = Expr::Member(Box::new(expr), field),
                    _ => return Err(syntax(self.line(), "expected a field name after '.'")),
                }
            } else if self.eat("[") {
                let index = self.expr()?;
                self.expect("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                self.depth = base;
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        let line = self.line();
        match self.next() {
            Some(Tok::Num(n)) => Ok(Expr::Literal(Value::Number(n))),
            Some(Tok::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Tok::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                _ if self.eat("(") => Ok(Expr::Call(name, self.items(")")?)),
                _ => Ok(Expr::Name(name)),
            },
            Some(Tok::Punct("(")) => {
                let inner = self.expr()?;
                self.expect(")")?;
                Ok(inner)
            }
            Some(Tok::Punct("[")) => Ok(Expr::List(self.items("]")?)),
            Some(Tok::Punct("{")) => {
                let mut entries = Vec::new();
                while !self.eat("}") {
                    let key = match self.next() {
                        Some(Tok::Ident(k)) | Some(Tok::Str(k)) => k,
                        _ => return Err(syntax(self.line(), "expected an object key")),
                    };
                    self.expect(":")?;
                    entries.push((key, self.expr()?));
                    if !self.eat(",") {
                        self.expect("}")?;
                        break;
                    }
                }
                Ok(Expr::Object(entries))
            }
            Some(Tok::Sep) | None => Err(syntax(line, "unexpected end of input")),
            Some(Tok::Punct(p)) => Err(syntax(line, format!("unexpected '{}'", p))),
        }
    }

    /// Comma-separated expressions up to `close`; a trailing comma is allowed.
    fn items(&mut self, close: &str) -> Result<Vec<Expr>, ScriptError> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.expr()?);
            if !self.eat(",") {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }
}

/// Parse a script into statements.
pub fn parse(src: &str) -> Result<Vec<Statement>, ScriptError> {
    let tokens = tokenize(src)?;
    Parser {
        tokens,
        pos: 0,
        depth: 0,
    }
    .program()
}
