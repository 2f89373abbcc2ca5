use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use super::CompileError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Question,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Power,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Match,
    NotMatch,
    And,
    Or,
    Not,
    In,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Token::Number(n) => return write!(f, "{n}"),
            Token::Str(s) => return write!(f, "{s:?}"),
            Token::Ident(name) => return write!(f, "{name}"),
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Dot => ".",
            Token::Question => "?",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Power => "**",
            Token::Eq => "==",
            Token::NotEq => "!=",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::Match => "=~",
            Token::NotMatch => "!~",
            Token::And => "&&",
            Token::Or => "||",
            Token::Not => "!",
            Token::In => "in",
        };
        f.write_str(symbol)
    }
}

/// A token together with its byte offset in the source.
pub(crate) type Spanned = (usize, Token);

pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>, CompileError> {
    let mut lexer = Lexer {
        src,
        chars: src.char_indices().peekable(),
    };
    let mut tokens = Vec::new();

    while let Some(spanned) = lexer.next_token()? {
        tokens.push(spanned);
    }

    Ok(tokens)
}

struct Lexer<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl Lexer<'_> {
    fn next_token(&mut self) -> Result<Option<Spanned>, CompileError> {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

        let Some((offset, c)) = self.chars.next() else {
            return Ok(None);
        };

        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '.' => Token::Dot,
            '?' => Token::Question,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '*' => {
                if self.eat('*') {
                    Token::Power
                } else {
                    Token::Star
                }
            }
            '=' => {
                if self.eat('=') {
                    Token::Eq
                } else if self.eat('~') {
                    Token::Match
                } else {
                    return Err(CompileError::UnexpectedChar { ch: c, offset });
                }
            }
            '!' => {
                if self.eat('=') {
                    Token::NotEq
                } else if self.eat('~') {
                    Token::NotMatch
                } else {
                    Token::Not
                }
            }
            '<' => {
                if self.eat('=') {
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '&' if self.eat('&') => Token::And,
            '|' if self.eat('|') => Token::Or,
            '"' | '\'' => Token::Str(self.quoted(c, offset)?),
            '`' => Token::Str(self.raw(offset)?),
            c if c.is_ascii_digit() => self.number(offset)?,
            c if c.is_alphabetic() || c == '_' => {
                let ident = self.ident(offset);
                if ident == "in" {
                    Token::In
                } else {
                    Token::Ident(ident)
                }
            }
            _ => return Err(CompileError::UnexpectedChar { ch: c, offset }),
        };

        Ok(Some((offset, token)))
    }

    fn eat(&mut self, expected: char) -> bool {
        self.chars.next_if(|(_, c)| *c == expected).is_some()
    }

    fn end_of(&mut self) -> usize {
        self.chars.peek().map(|(i, _)| *i).unwrap_or(self.src.len())
    }

    fn number(&mut self, start: usize) -> Result<Token, CompileError> {
        while self.chars.next_if(|(_, c)| c.is_ascii_digit()).is_some() {}

        // A fraction needs a digit after the dot, otherwise the dot is member access.
        let mut lookahead = self.chars.clone();
        if matches!(lookahead.next(), Some((_, '.')))
            && matches!(lookahead.next(), Some((_, d)) if d.is_ascii_digit())
        {
            self.chars.next();
            while self.chars.next_if(|(_, c)| c.is_ascii_digit()).is_some() {}
        }

        if self.chars.next_if(|(_, c)| *c == 'e' || *c == 'E').is_some() {
            self.chars.next_if(|(_, c)| *c == '+' || *c == '-');
            while self.chars.next_if(|(_, c)| c.is_ascii_digit()).is_some() {}
        }

        let end = self.end_of();
        let text = &self.src[start..end];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| CompileError::InvalidNumber {
                text: text.to_string(),
                offset: start,
            })
    }

    fn ident(&mut self, start: usize) -> String {
        while self
            .chars
            .next_if(|(_, c)| c.is_alphanumeric() || *c == '_')
            .is_some()
        {}
        let end = self.end_of();
        self.src[start..end].to_string()
    }

    fn quoted(&mut self, quote: char, offset: usize) -> Result<String, CompileError> {
        let mut out = String::new();
        loop {
            let Some((_, c)) = self.chars.next() else {
                return Err(CompileError::UnterminatedString { offset });
            };
            match c {
                c if c == quote => return Ok(out),
                '\\' => {
                    let Some((_, escaped)) = self.chars.next() else {
                        return Err(CompileError::UnterminatedString { offset });
                    };
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                }
                c => out.push(c),
            }
        }
    }

    fn raw(&mut self, offset: usize) -> Result<String, CompileError> {
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some((_, '`')) => return Ok(out),
                Some((_, c)) => out.push(c),
                None => return Err(CompileError::UnterminatedString { offset }),
            }
        }
    }
}
