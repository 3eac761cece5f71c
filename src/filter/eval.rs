// src/filter/eval.rs
//
// Parses a canonical filter predicate into a small AST and interprets it
// against server records. Errors here never reach the client; the query
// path logs them and falls back to matching every server.

use std::cmp::Ordering;
use std::fmt;

use crate::models::server::{self, FieldValue, GameServer};

#[derive(Debug)]
pub enum EvalError {
    Parse(String),
    UnknownField(String),
    Type(String),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "parse error: {}", msg),
            Self::UnknownField(name) => write!(f, "unknown or non-filterable property: {}", name),
            Self::Type(msg) => write!(f, "type error: {}", msg),
        }
    }
}

impl std::error::Error for EvalError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Like,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Bool(bool),
    Op(CmpOp),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(String),
    Text(String),
    Number(i64),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Cmp {
        lhs: Operand,
        op: CmpOp,
        rhs: Operand,
        negate: bool,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

// Ok(None) means a blank filter: match every server.
pub fn parse(filter: &str) -> Result<Option<Expr>, EvalError> {
    if filter.trim().is_empty() {
        return Ok(None);
    }
    let tokens = lex(filter)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(EvalError::Parse("trailing input after predicate".to_string()));
    }
    Ok(Some(expr))
}

fn lex(input: &str) -> Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '\'' | '"' => {
                let q = c;
                let mut body = String::new();
                i += 1;
                while i < chars.len() && chars[i] != q {
                    body.push(chars[i]);
                    i += 1;
                }
                if i < chars.len() {
                    i += 1; // closing quote; an unterminated literal runs to the end
                }
                tokens.push(Token::Quoted(body));
            }
            '=' | '!' | '<' | '>' => {
                let mut text = String::new();
                while i < chars.len() && matches!(chars[i], '=' | '!' | '<' | '>') {
                    text.push(chars[i]);
                    i += 1;
                }
                let op = match text.as_str() {
                    "=" | "==" => CmpOp::Eq,
                    "!=" | "<>" => CmpOp::Ne,
                    "<" => CmpOp::Lt,
                    ">" => CmpOp::Gt,
                    "<=" => CmpOp::Le,
                    ">=" => CmpOp::Ge,
                    other => {
                        return Err(EvalError::Parse(format!("unknown operator {:?}", other)))
                    }
                };
                tokens.push(Token::Op(op));
            }
            _ => {
                let mut word = String::new();
                while i < chars.len()
                    && !chars[i].is_whitespace()
                    && !matches!(chars[i], '(' | ')' | '\'' | '"' | '=' | '!' | '<' | '>')
                {
                    word.push(chars[i]);
                    i += 1;
                }
                match word.to_ascii_lowercase().as_str() {
                    "and" => tokens.push(Token::And),
                    "or" => tokens.push(Token::Or),
                    "not" => tokens.push(Token::Not),
                    "like" => tokens.push(Token::Op(CmpOp::Like)),
                    "true" => tokens.push(Token::Bool(true)),
                    "false" => tokens.push(Token::Bool(false)),
                    _ => tokens.push(Token::Word(word)),
                }
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn or_expr(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.and_expr()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.pos += 1;
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.unary()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, EvalError> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, EvalError> {
        match self.next() {
            Some(Token::LParen) => {
                let expr = self.or_expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(expr),
                    _ => Err(EvalError::Parse("missing closing parenthesis".to_string())),
                }
            }
            Some(tok @ (Token::Word(_) | Token::Quoted(_) | Token::Bool(_))) => {
                let lhs = operand(tok);
                // "not" may sit between operand and comparison: `x not like 'y'`.
                let negate = if matches!(self.peek(), Some(Token::Not)) {
                    self.pos += 1;
                    true
                } else {
                    false
                };
                let op = match self.next() {
                    Some(Token::Op(op)) => op,
                    _ => return Err(EvalError::Parse("expected a comparison operator".to_string())),
                };
                let rhs = match self.next() {
                    Some(tok @ (Token::Word(_) | Token::Quoted(_) | Token::Bool(_))) => operand(tok),
                    _ => return Err(EvalError::Parse("expected a comparison operand".to_string())),
                };
                Ok(Expr::Cmp {
                    lhs,
                    op,
                    rhs,
                    negate,
                })
            }
            other => Err(EvalError::Parse(format!("unexpected token {:?}", other))),
        }
    }
}

fn operand(tok: Token) -> Operand {
    match tok {
        Token::Word(w) => match w.parse::<i64>() {
            Ok(n) => Operand::Number(n),
            Err(_) => Operand::Field(w),
        },
        Token::Quoted(s) => Operand::Text(s),
        Token::Bool(b) => Operand::Bool(b),
        _ => unreachable!(),
    }
}

impl Expr {
    pub fn matches(&self, srv: &GameServer) -> Result<bool, EvalError> {
        match self {
            Self::And(a, b) => Ok(a.matches(srv)? && b.matches(srv)?),
            Self::Or(a, b) => Ok(a.matches(srv)? || b.matches(srv)?),
            Self::Not(e) => Ok(!e.matches(srv)?),
            Self::Cmp {
                lhs,
                op,
                rhs,
                negate,
            } => {
                let l = resolve(lhs, srv)?;
                let r = resolve(rhs, srv)?;
                let hit = compare(&l, *op, &r)?;
                Ok(hit != *negate)
            }
        }
    }
}

fn resolve(operand: &Operand, srv: &GameServer) -> Result<FieldValue, EvalError> {
    match operand {
        Operand::Field(name) => {
            let spec = server::field(name)
                .filter(|f| f.filterable)
                .ok_or_else(|| EvalError::UnknownField(name.clone()))?;
            Ok((spec.get)(srv))
        }
        Operand::Text(s) => Ok(FieldValue::Text(s.clone())),
        Operand::Number(n) => Ok(FieldValue::Int(*n)),
        Operand::Bool(b) => Ok(FieldValue::Flag(*b)),
    }
}

fn compare(lhs: &FieldValue, op: CmpOp, rhs: &FieldValue) -> Result<bool, EvalError> {
    use FieldValue::{Flag, Int, Text};

    if op == CmpOp::Like {
        let text = lhs.render().to_ascii_lowercase();
        let pattern = rhs.render().to_ascii_lowercase();
        return Ok(glob_match(&pattern, &text));
    }

    match (lhs, rhs) {
        (Int(a), Int(b)) => Ok(ordered(op, a.cmp(b))),
        (Int(a), Text(s)) => Ok(ordered(op, a.cmp(&parse_int(s)?))),
        (Text(s), Int(b)) => Ok(ordered(op, parse_int(s)?.cmp(b))),
        (Flag(a), Flag(b)) => equality(op, a == b),
        (Flag(a), Text(s)) => equality(op, *a == parse_bool(s)?),
        (Text(s), Flag(b)) => equality(op, parse_bool(s)? == *b),
        (Flag(a), Int(n)) | (Int(n), Flag(a)) => equality(op, *a == (*n != 0)),
        (Text(a), Text(b)) => Ok(ordered(op, a.as_str().cmp(b.as_str()))),
    }
}

fn ordered(op: CmpOp, ord: Ordering) -> bool {
    match op {
        CmpOp::Eq => ord == Ordering::Equal,
        CmpOp::Ne => ord != Ordering::Equal,
        CmpOp::Lt => ord == Ordering::Less,
        CmpOp::Gt => ord == Ordering::Greater,
        CmpOp::Le => ord != Ordering::Greater,
        CmpOp::Ge => ord != Ordering::Less,
        CmpOp::Like => unreachable!(),
    }
}

fn equality(op: CmpOp, eq: bool) -> Result<bool, EvalError> {
    match op {
        CmpOp::Eq => Ok(eq),
        CmpOp::Ne => Ok(!eq),
        _ => Err(EvalError::Type(
            "boolean values only support equality".to_string(),
        )),
    }
}

fn parse_int(s: &str) -> Result<i64, EvalError> {
    s.trim()
        .parse()
        .map_err(|_| EvalError::Type(format!("expected a number, got {:?}", s)))
}

fn parse_bool(s: &str) -> Result<bool, EvalError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => Err(EvalError::Type(format!(
            "expected a boolean, got {:?}",
            other
        ))),
    }
}

// SQL LIKE style globbing: '%' matches any run, '_' one character, and
// '[...]' a character class (ranges allowed; "[[]" is a literal '[').
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    glob(&p, &t)
}

fn glob(p: &[char], t: &[char]) -> bool {
    if p.is_empty() {
        return t.is_empty();
    }
    match p[0] {
        '%' => glob(&p[1..], t) || (!t.is_empty() && glob(p, &t[1..])),
        '_' => !t.is_empty() && glob(&p[1..], &t[1..]),
        '[' => match p.iter().skip(1).position(|&c| c == ']') {
            Some(off) => {
                let end = off + 1;
                !t.is_empty() && class_contains(&p[1..end], t[0]) && glob(&p[end + 1..], &t[1..])
            }
            // Unclosed class: treat the bracket literally.
            None => !t.is_empty() && t[0] == '[' && glob(&p[1..], &t[1..]),
        },
        c => !t.is_empty() && t[0] == c && glob(&p[1..], &t[1..]),
    }
}

fn class_contains(class: &[char], c: char) -> bool {
    let mut i = 0;
    while i < class.len() {
        if i + 2 < class.len() && class[i + 1] == '-' {
            if class[i] <= c && c <= class[i + 2] {
                return true;
            }
            i += 3;
        } else {
            if class[i] == c {
                return true;
            }
            i += 1;
        }
    }
    false
}
