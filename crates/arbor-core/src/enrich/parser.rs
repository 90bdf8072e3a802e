// Recursive-descent parser for enrichment rules.
//
//   program    := sep* (assignment (sep+ assignment)*)? sep* EOF
//   assignment := IDENT '=' expr
//   expr       := term ('+' term)*
//   term       := STRING | NUMBER | true | false | null | baseUrl
//               | $IDENT | IDENT '(' args ')' | path | '(' expr ')'
//   path       := ('record' '.')? IDENT ('.' IDENT)*

use std::collections::HashSet;
use std::str::FromStr;

use serde_json::{Number, Value};
use strum::{Display, EnumString};

use super::RuleError;
use super::lexer::{Spanned, Token, syntax, tokenize};
use crate::model::CHILDREN_FIELD;

/// Built-in functions callable from a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum Func {
    Concat,
    Upper,
    Lower,
    Trim,
    Coalesce,
    Default,
    Url,
    Len,
}

impl Func {
    /// Minimum and (if bounded) maximum argument count.
    fn arity(self) -> (usize, Option<usize>) {
        match self {
            Self::Upper | Self::Lower | Self::Trim | Self::Len => (1, Some(1)),
            Self::Default => (2, Some(2)),
            Self::Concat | Self::Coalesce => (1, None),
            Self::Url => (2, None),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    BaseUrl,
    /// Field path; the first segment is a record field, the rest index
    /// into nested objects.
    Field(Vec<String>),
    Output(String),
    Call(Func, Vec<Expr>),
    Add(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Assignment {
    pub target: String,
    pub expr: Expr,
}

pub(crate) fn parse(src: &str) -> Result<Vec<Assignment>, RuleError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        assigned: HashSet::new(),
    };
    parser.program()
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    assigned: HashSet<String>,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map_or(&Token::Eof, |s| &s.token)
    }

    fn position(&self) -> (usize, usize) {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or((1, 1), |s| (s.line, s.column))
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> RuleError {
        let (line, column) = self.position();
        syntax(line, column, message)
    }

    fn expect(&mut self, want: &Token, what: &str) -> Result<(), RuleError> {
        if self.peek() == want {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {what}, found {}", describe(self.peek()))))
        }
    }

    fn skip_separators(&mut self) -> usize {
        let mut n = 0;
        while *self.peek() == Token::Separator {
            self.advance();
            n += 1;
        }
        n
    }

    fn program(&mut self) -> Result<Vec<Assignment>, RuleError> {
        let mut out = Vec::new();
        self.skip_separators();
        while *self.peek() != Token::Eof {
            out.push(self.assignment()?);
            if self.skip_separators() == 0 && *self.peek() != Token::Eof {
                return Err(self.error(format!(
                    "expected end of statement, found {}",
                    describe(self.peek())
                )));
            }
        }
        Ok(out)
    }

    fn assignment(&mut self) -> Result<Assignment, RuleError> {
        let target = match self.advance() {
            Token::Ident(name) if is_reserved(&name) => {
                self.pos -= 1;
                return Err(self.error(format!("'{name}' cannot be assigned")));
            }
            Token::Ident(name) => name,
            other => {
                self.pos -= 1;
                return Err(self.error(format!(
                    "expected an output name, found {}",
                    describe(&other)
                )));
            }
        };
        self.expect(&Token::Assign, "'='")?;
        let expr = self.expr()?;
        self.assigned.insert(target.clone());
        Ok(Assignment { target, expr })
    }

    fn expr(&mut self) -> Result<Expr, RuleError> {
        let mut lhs = self.term()?;
        while *self.peek() == Token::Plus {
            self.advance();
            let rhs = self.term()?;
            lhs = Expr::Add(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, RuleError> {
        let (line, column) = self.position();
        match self.advance() {
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Num(n) => Ok(Expr::Literal(number(n))),
            Token::Output(name) => {
                if self.assigned.contains(&name) {
                    Ok(Expr::Output(name))
                } else {
                    Err(RuleError::UnknownOutput { name })
                }
            }
            Token::LParen => {
                let inner = self.expr()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                "baseUrl" => Ok(Expr::BaseUrl),
                _ if *self.peek() == Token::LParen => self.call(name, line, column),
                _ => self.path(name),
            },
            other => Err(syntax(
                line,
                column,
                format!("expected a value, found {}", describe(&other)),
            )),
        }
    }

    fn call(&mut self, name: String, line: usize, column: usize) -> Result<Expr, RuleError> {
        let func = Func::from_str(&name).map_err(|_| RuleError::UnknownFunction {
            name: name.clone(),
        })?;
        self.expect(&Token::LParen, "'('")?;

        let mut args = Vec::new();
        if *self.peek() != Token::RParen {
            loop {
                args.push(self.expr()?);
                if *self.peek() == Token::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::RParen, "')'")?;

        let (min, max) = func.arity();
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            let expected = match max {
                Some(max) if max == min => min.to_string(),
                Some(max) => format!("{min}..{max}"),
                None => format!("at least {min}"),
            };
            return Err(RuleError::Arity {
                function: func.to_string(),
                expected,
                got: args.len(),
            }
            .at(line, column));
        }
        Ok(Expr::Call(func, args))
    }

    fn path(&mut self, head: String) -> Result<Expr, RuleError> {
        let mut segments = Vec::new();
        if head == "record" && *self.peek() == Token::Dot {
            self.advance();
            segments.push(self.segment()?);
        } else {
            segments.push(head);
        }
        while *self.peek() == Token::Dot {
            self.advance();
            segments.push(self.segment()?);
        }
        Ok(Expr::Field(segments))
    }

    fn segment(&mut self) -> Result<String, RuleError> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            other => {
                self.pos -= 1;
                Err(self.error(format!(
                    "expected a field name after '.', found {}",
                    describe(&other)
                )))
            }
        }
    }
}

/// Names a rule may not assign. `children` holds the child list.
fn is_reserved(name: &str) -> bool {
    matches!(name, "true" | "false" | "null" | "baseUrl" | "record") || name == CHILDREN_FIELD
}

/// Integral literals stay integers so `1 + 2` renders as `3`, not `3.0`.
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(name) => format!("'{name}'"),
        Token::Output(name) => format!("'${name}'"),
        Token::Str(_) => "a string".into(),
        Token::Num(n) => format!("'{n}'"),
        Token::Plus => "'+'".into(),
        Token::LParen => "'('".into(),
        Token::RParen => "')'".into(),
        Token::Comma => "','".into(),
        Token::Dot => "'.'".into(),
        Token::Assign => "'='".into(),
        Token::Separator => "end of statement".into(),
        Token::Eof => "end of rule".into(),
    }
}
