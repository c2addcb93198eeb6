//! Tokenizer for the expression language.

use super::error::{ExprError, Result};
use std::fmt;

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Bang,
    Question,
    Colon,
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Number(n) => return write!(f, "number {n}"),
            Self::Str(s) => return write!(f, "string {s:?}"),
            Self::Ident(name) => return write!(f, "identifier '{name}'"),
            Self::True => "'true'",
            Self::False => "'false'",
            Self::Null => "'null'",
            Self::Plus => "'+'",
            Self::Minus => "'-'",
            Self::Star => "'*'",
            Self::Slash => "'/'",
            Self::Percent => "'%'",
            Self::Eq => "'=='",
            Self::NotEq => "'!='",
            Self::Lt => "'<'",
            Self::LtEq => "'<='",
            Self::Gt => "'>'",
            Self::GtEq => "'>='",
            Self::And => "'&&'",
            Self::Or => "'||'",
            Self::Bang => "'!'",
            Self::Question => "'?'",
            Self::Colon => "':'",
            Self::Dot => "'.'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::Comma => "','",
        };
        f.write_str(repr)
    }
}

/// Splits an expression source into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        if ch.is_whitespace() {
            i += 1;
            continue;
        }

        if ch.is_ascii_digit()
            || (ch == '.' && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()))
        {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let value = text
                .parse::<f64>()
                .map_err(|_| ExprError::InvalidNumber(text.clone()))?;
            tokens.push(Token::Number(value));
            continue;
        }

        if ch == '"' || ch == '\'' {
            let (literal, next) = read_string(&chars, i)?;
            tokens.push(Token::Str(literal));
            i = next;
            continue;
        }

        if ch.is_alphabetic() || ch == '_' || ch == '$' {
            let start = i;
            while i < chars.len()
                && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
            {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            tokens.push(match word.as_str() {
                "true" => Token::True,
                "false" => Token::False,
                "null" | "undefined" => Token::Null,
                _ => Token::Ident(word),
            });
            continue;
        }

        let next = chars.get(i + 1).copied();
        let (token, width) = match (ch, next) {
            ('=', Some('=')) => {
                // `===` and `==` are the same operator here.
                let width = if chars.get(i + 2) == Some(&'=') { 3 } else { 2 };
                (Token::Eq, width)
            }
            ('!', Some('=')) => {
                let width = if chars.get(i + 2) == Some(&'=') { 3 } else { 2 };
                (Token::NotEq, width)
            }
            ('<', Some('=')) => (Token::LtEq, 2),
            ('>', Some('=')) => (Token::GtEq, 2),
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('!', _) => (Token::Bang, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('?', _) => (Token::Question, 1),
            (':', _) => (Token::Colon, 1),
            ('.', _) => (Token::Dot, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (',', _) => (Token::Comma, 1),
            _ => return Err(ExprError::UnexpectedChar { ch, offset: i }),
        };
        tokens.push(token);
        i += width;
    }

    Ok(tokens)
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize)> {
    let quote = chars[start];
    let mut literal = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        match chars[i] {
            c if c == quote => return Ok((literal, i + 1)),
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or(ExprError::UnterminatedString(start))?;
                literal.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => *other,
                });
                i += 2;
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }

    Err(ExprError::UnterminatedString(start))
}
