//! Lexer for the formula DSL (`spec.md` §4.2 "Lexical").
//!
//! Numeric literals, identifiers (which double as reference tokens — see
//! `modelcore_common::reference`), the operator set `+ - * / ^ % > < >= <= =
//! != & |`, parens and commas. Whitespace is insignificant and dropped at the
//! lexer stage rather than threaded through the parser.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    Ident,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    And,
    Or,
    LParen,
    RParen,
    Comma,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenizerError {
    pub message: String,
    pub pos: usize,
}

impl fmt::Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tokenizer error at {}: {}", self.pos, self.message)
    }
}

impl std::error::Error for TokenizerError {}

pub struct Tokenizer<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, TokenizerError> {
        let mut out = Vec::new();
        loop {
            self.skip_whitespace();
            if self.pos >= self.src.len() {
                out.push(Token {
                    kind: TokenKind::Eof,
                    text: String::new(),
                    pos: self.pos,
                });
                break;
            }
            out.push(self.next_token()?);
        }
        Ok(out)
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.src.len() && (self.src[self.pos] as char).is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn next_token(&mut self) -> Result<Token, TokenizerError> {
        let start = self.pos;
        let c = self.peek().unwrap() as char;

        macro_rules! single {
            ($kind:expr) => {{
                self.pos += 1;
                Ok(Token {
                    kind: $kind,
                    text: c.to_string(),
                    pos: start,
                })
            }};
        }

        match c {
            '+' => single!(TokenKind::Plus),
            '-' => single!(TokenKind::Minus),
            '*' => single!(TokenKind::Star),
            '/' => single!(TokenKind::Slash),
            '^' => single!(TokenKind::Caret),
            '%' => single!(TokenKind::Percent),
            '&' => single!(TokenKind::And),
            '|' => single!(TokenKind::Or),
            '(' => single!(TokenKind::LParen),
            ')' => single!(TokenKind::RParen),
            ',' => single!(TokenKind::Comma),
            '>' => {
                if self.peek_at(1) == Some(b'=') {
                    self.pos += 2;
                    Ok(Token {
                        kind: TokenKind::Ge,
                        text: ">=".into(),
                        pos: start,
                    })
                } else {
                    self.pos += 1;
                    Ok(Token {
                        kind: TokenKind::Gt,
                        text: ">".into(),
                        pos: start,
                    })
                }
            }
            '<' => {
                if self.peek_at(1) == Some(b'=') {
                    self.pos += 2;
                    Ok(Token {
                        kind: TokenKind::Le,
                        text: "<=".into(),
                        pos: start,
                    })
                } else {
                    self.pos += 1;
                    Ok(Token {
                        kind: TokenKind::Lt,
                        text: "<".into(),
                        pos: start,
                    })
                }
            }
            '=' => {
                self.pos += 1;
                Ok(Token {
                    kind: TokenKind::Eq,
                    text: "=".into(),
                    pos: start,
                })
            }
            '!' => {
                if self.peek_at(1) == Some(b'=') {
                    self.pos += 2;
                    Ok(Token {
                        kind: TokenKind::Ne,
                        text: "!=".into(),
                        pos: start,
                    })
                } else {
                    Err(TokenizerError {
                        message: "expected '!=' ".into(),
                        pos: start,
                    })
                }
            }
            c if c.is_ascii_digit() || c == '.' => self.lex_number(start),
            c if c.is_ascii_alphabetic() || c == '_' => self.lex_ident(start),
            other => Err(TokenizerError {
                message: format!("unexpected character '{other}'"),
                pos: start,
            }),
        }
    }

    fn lex_number(&mut self, start: usize) -> Result<Token, TokenizerError> {
        while let Some(c) = self.peek() {
            let c = c as char;
            if c.is_ascii_digit() || c == '.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        // optional exponent: 1e10, 1.5e-3
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let save = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            if self.peek().map(|c| (c as char).is_ascii_digit()) == Some(true) {
                while self.peek().map(|c| (c as char).is_ascii_digit()) == Some(true) {
                    self.pos += 1;
                }
            } else {
                self.pos = save;
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos])
            .unwrap()
            .to_string();
        if text.parse::<f64>().is_err() {
            return Err(TokenizerError {
                message: format!("invalid numeric literal '{text}'"),
                pos: start,
            });
        }
        Ok(Token {
            kind: TokenKind::Number,
            text,
            pos: start,
        })
    }

    fn lex_ident(&mut self, start: usize) -> Result<Token, TokenizerError> {
        while let Some(c) = self.peek() {
            let c = c as char;
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos])
            .unwrap()
            .to_string();
        Ok(Token {
            kind: TokenKind::Ident,
            text,
            pos: start,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Tokenizer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_simple_binary() {
        assert_eq!(
            kinds("R1 + R2"),
            vec![TokenKind::Ident, TokenKind::Plus, TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn lexes_comparisons() {
        assert_eq!(
            kinds("R1>=R2"),
            vec![TokenKind::Ident, TokenKind::Ge, TokenKind::Ident, TokenKind::Eof]
        );
        assert_eq!(
            kinds("R1!=R2"),
            vec![TokenKind::Ident, TokenKind::Ne, TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn lexes_function_call() {
        assert_eq!(
            kinds("MAX(R1,R2)"),
            vec![
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::Ident,
                TokenKind::Comma,
                TokenKind::Ident,
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn rejects_stray_char() {
        assert!(Tokenizer::new("R1 @ R2").tokenize().is_err());
    }
}
