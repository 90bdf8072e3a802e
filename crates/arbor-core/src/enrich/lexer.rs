// Tokenizer for enrichment rules.

use super::RuleError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    /// `$name`: an output assigned earlier in the same rule.
    Output(String),
    Str(String),
    Num(f64),
    Plus,
    LParen,
    RParen,
    Comma,
    Dot,
    Assign,
    /// Newline or `;`.
    Separator,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl Cursor<'_> {
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>, RuleError> {
    let mut cur = Cursor {
        chars: src.chars().peekable(),
        line: 1,
        column: 1,
    };
    let mut out = Vec::new();

    while let Some(c) = cur.peek() {
        let (line, column) = (cur.line, cur.column);
        let token = match c {
            '\n' | ';' => {
                cur.bump();
                Token::Separator
            }
            c if c.is_whitespace() => {
                cur.bump();
                continue;
            }
            '#' => {
                cur.take_while(|c| c != '\n');
                continue;
            }
            '+' => single(&mut cur, Token::Plus),
            '(' => single(&mut cur, Token::LParen),
            ')' => single(&mut cur, Token::RParen),
            ',' => single(&mut cur, Token::Comma),
            '.' => single(&mut cur, Token::Dot),
            '=' => single(&mut cur, Token::Assign),
            '"' | '\'' => Token::Str(string_literal(&mut cur, line, column)?),
            '$' => {
                cur.bump();
                let name = cur.take_while(is_ident_char);
                if name.is_empty() {
                    return Err(syntax(line, column, "expected an output name after '$'"));
                }
                Token::Output(name)
            }
            c if c.is_ascii_digit() => {
                let text = cur.take_while(|c| c.is_ascii_digit() || c == '.');
                let value = text
                    .parse::<f64>()
                    .map_err(|_| syntax(line, column, format!("invalid number '{text}'")))?;
                Token::Num(value)
            }
            c if is_ident_start(c) => Token::Ident(cur.take_while(is_ident_char)),
            other => {
                return Err(syntax(line, column, format!("unexpected character '{other}'")));
            }
        };
        out.push(Spanned {
            token,
            line,
            column,
        });
    }

    out.push(Spanned {
        token: Token::Eof,
        line: cur.line,
        column: cur.column,
    });
    Ok(out)
}

fn single(cur: &mut Cursor<'_>, token: Token) -> Token {
    cur.bump();
    token
}

fn string_literal(cur: &mut Cursor<'_>, line: usize, column: usize) -> Result<String, RuleError> {
    let quote = cur.bump().unwrap_or('"');
    let mut out = String::new();
    loop {
        match cur.bump() {
            None | Some('\n') => return Err(syntax(line, column, "unterminated string")),
            Some(c) if c == quote => return Ok(out),
            Some('\\') => match cur.bump() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(c @ ('\\' | '"' | '\'')) => out.push(c),
                Some(other) => {
                    return Err(syntax(
                        cur.line,
                        cur.column,
                        format!("unknown escape '\\{other}'"),
                    ));
                }
                None => return Err(syntax(line, column, "unterminated string")),
            },
            Some(c) => out.push(c),
        }
    }
}

pub(crate) fn syntax(line: usize, column: usize, message: impl Into<String>) -> RuleError {
    RuleError::Syntax {
        line,
        column,
        message: message.into(),
    }
}
