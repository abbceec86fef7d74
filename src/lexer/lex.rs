use std::collections::VecDeque;
use std::fmt;

use anyhow::Result;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use crate::error::LexError;

lazy_static! {
    static ref COMMENT_RE: Regex = Regex::new(r"^#[^\n]*").unwrap();
    static ref STRING_RE: Regex = Regex::new(r#"^"[^"]*""#).unwrap();
    static ref KEYWORD_RE: Regex = Regex::new(
        r"^var\b|^loop\b|^while\b|^if\b|^elif\b|^else\b|^break\b|^continue\b|^Device\b|^HASH\b",
    )
    .unwrap();
    static ref HEX_RE: Regex = Regex::new(r"^\$[0-9A-Fa-f]+\b").unwrap();
    static ref BINARY_RE: Regex = Regex::new(r"^%[01_]+\b").unwrap();
    static ref NUMBER_RE: Regex = Regex::new(r"^([0-9]+(\.[0-9]+)?|\.[0-9]+)").unwrap();
    static ref PUNCTUATION_DOUBLE_RE: Regex = Regex::new(r"^==|^!=|^>=|^<=|^&&|^\|\|").unwrap();
    static ref PUNCTUATION_RE: Regex = Regex::new(r"^[-+*/(){}\[\],.;:?!=<>]").unwrap();
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^[a-zA-Z_]\w*").unwrap();
}

/// 1-based source position of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

pub struct Lexer {
    src: String,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(src: String) -> Lexer {
        Lexer {
            src,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            column: self.column,
        }
    }

    fn advance_by(&mut self, len: usize) {
        for ch in self.src[self.pos..self.pos + len].chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.pos += len;
    }
}

impl Iterator for Lexer {
    type Item = Result<SpannedToken>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.src[self.pos..];
        let whitespace = rest.len() - rest.trim_start().len();
        self.advance_by(whitespace);

        let span = self.span();

        match scan(&self.src[self.pos..], span) {
            None => None,
            Some(Err(e)) => {
                // Stop after the first error.
                self.pos = self.src.len();
                Some(Err(e.into()))
            }
            Some(Ok((token, len))) => {
                self.advance_by(len);
                Some(Ok(SpannedToken { token, span }))
            }
        }
    }
}

fn scan(src: &str, span: Span) -> Option<Result<(Token, usize), LexError>> {
    if src.is_empty() {
        return None;
    }

    let scanned = if let Some(m) = COMMENT_RE.find(src) {
        let text = m.as_str()[1..].trim().to_owned();
        (Token::Comment(text), m.as_str().len())
    } else if src.starts_with('"') {
        match STRING_RE.find(src) {
            Some(m) => {
                let s = m.as_str();
                (
                    Token::StringLiteral(s[1..s.len() - 1].to_owned()),
                    s.len(),
                )
            }
            None => return Some(Err(LexError::UnterminatedString { span })),
        }
    } else if let Some(m) = KEYWORD_RE.find(src) {
        let token = match m.as_str() {
            "var" => Token::Var,
            "loop" => Token::Loop,
            "while" => Token::While,
            "if" => Token::If,
            "elif" => Token::Elif,
            "else" => Token::Else,
            "break" => Token::Break,
            "continue" => Token::Continue,
            "Device" => Token::Device,
            "HASH" => Token::Hash,
            _ => unreachable!(),
        };
        (token, m.as_str().len())
    } else if let Some(m) = HEX_RE
        .find(src)
        .or_else(|| BINARY_RE.find(src))
        .or_else(|| NUMBER_RE.find(src))
    {
        (Token::Number(m.as_str().to_owned()), m.as_str().len())
    } else if let Some(m) = PUNCTUATION_DOUBLE_RE.find(src) {
        let token = match m.as_str() {
            "==" => Token::DoubleEqual,
            "!=" => Token::BangEqual,
            ">=" => Token::GreaterEqual,
            "<=" => Token::LessEqual,
            "&&" => Token::DoubleAmpersand,
            "||" => Token::DoublePipe,
            _ => unreachable!(),
        };
        (token, 2)
    } else if let Some(m) = PUNCTUATION_RE.find(src) {
        let token = match m.as_str() {
            "+" => Token::Plus,
            "-" => Token::Hyphen,
            "*" => Token::Star,
            "/" => Token::Slash,
            "(" => Token::LParen,
            ")" => Token::RParen,
            "{" => Token::LBrace,
            "}" => Token::RBrace,
            "[" => Token::LBracket,
            "]" => Token::RBracket,
            "," => Token::Comma,
            "." => Token::Dot,
            ";" => Token::Semicolon,
            ":" => Token::Colon,
            "?" => Token::QuestionMark,
            "!" => Token::Bang,
            "=" => Token::Equal,
            "<" => Token::Less,
            ">" => Token::Greater,
            _ => unreachable!(),
        };
        (token, 1)
    } else if let Some(m) = IDENTIFIER_RE.find(src) {
        (Token::Identifier(m.as_str().to_owned()), m.as_str().len())
    } else {
        let ch = src.chars().next().unwrap_or_default();
        return Some(Err(LexError::UnexpectedCharacter { ch, span }));
    };

    Some(Ok(scanned))
}

/// Scans the whole source, stopping at the first lexical error.
pub fn tokenize(src: &str) -> Result<VecDeque<SpannedToken>> {
    let tokens = Lexer::new(src.to_owned()).collect::<Result<VecDeque<_>>>()?;
    debug!("lexed {} tokens", tokens.len());
    Ok(tokens)
}

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Var,
    Loop,
    While,
    If,
    Elif,
    Else,
    Break,
    Continue,
    Device,
    Hash,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Semicolon,
    Colon,
    QuestionMark,
    Bang,
    Equal,
    DoubleEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Plus,
    Hyphen,
    Star,
    Slash,
    DoubleAmpersand,
    DoublePipe,
    Identifier(String),
    Number(String),
    StringLiteral(String),
    Comment(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Token::Identifier(s) => return write!(f, "identifier '{}'", s),
            Token::Number(s) => return write!(f, "number '{}'", s),
            Token::StringLiteral(s) => return write!(f, "string \"{}\"", s),
            Token::Comment(_) => return write!(f, "comment"),
            Token::Var => "var",
            Token::Loop => "loop",
            Token::While => "while",
            Token::If => "if",
            Token::Elif => "elif",
            Token::Else => "else",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::Device => "Device",
            Token::Hash => "HASH",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Semicolon => ";",
            Token::Colon => ":",
            Token::QuestionMark => "?",
            Token::Bang => "!",
            Token::Equal => "=",
            Token::DoubleEqual => "==",
            Token::BangEqual => "!=",
            Token::Less => "<",
            Token::LessEqual => "<=",
            Token::Greater => ">",
            Token::GreaterEqual => ">=",
            Token::Plus => "+",
            Token::Hyphen => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::DoubleAmpersand => "&&",
            Token::DoublePipe => "||",
        };
        write!(f, "'{}'", symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn lexes_declaration() {
        assert_eq!(
            kinds("var a = 2 + 3.5;"),
            vec![
                Token::Var,
                Token::Identifier("a".to_owned()),
                Token::Equal,
                Token::Number("2".to_owned()),
                Token::Plus,
                Token::Number("3.5".to_owned()),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn lexes_prefixed_numbers() {
        assert_eq!(
            kinds("$1F %1010_0101 .5"),
            vec![
                Token::Number("$1F".to_owned()),
                Token::Number("%1010_0101".to_owned()),
                Token::Number(".5".to_owned()),
            ]
        );
    }

    #[test]
    fn minus_is_never_part_of_a_number() {
        assert_eq!(
            kinds("a-1"),
            vec![
                Token::Identifier("a".to_owned()),
                Token::Hyphen,
                Token::Number("1".to_owned()),
            ]
        );
    }

    #[test]
    fn keywords_need_a_word_boundary() {
        assert_eq!(
            kinds("iffy if"),
            vec![Token::Identifier("iffy".to_owned()), Token::If]
        );
    }

    #[test]
    fn double_punctuation_wins_over_single() {
        assert_eq!(
            kinds("a<=b != c && d || !e"),
            vec![
                Token::Identifier("a".to_owned()),
                Token::LessEqual,
                Token::Identifier("b".to_owned()),
                Token::BangEqual,
                Token::Identifier("c".to_owned()),
                Token::DoubleAmpersand,
                Token::Identifier("d".to_owned()),
                Token::DoublePipe,
                Token::Bang,
                Token::Identifier("e".to_owned()),
            ]
        );
    }

    #[test]
    fn comments_and_spans() {
        let tokens = tokenize("# heading\n  d0.On").unwrap();
        assert_eq!(tokens[0].token, Token::Comment("heading".to_owned()));
        assert_eq!(tokens[1].token, Token::Identifier("d0".to_owned()));
        assert_eq!(tokens[1].span, Span { line: 2, column: 3 });
        assert_eq!(tokens[2].token, Token::Dot);
        assert_eq!(tokens[3].span, Span { line: 2, column: 6 });
    }

    #[test]
    fn strings_keep_their_contents() {
        assert_eq!(
            kinds(r#"HASH("Furnace 1")"#),
            vec![
                Token::Hash,
                Token::LParen,
                Token::StringLiteral("Furnace 1".to_owned()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = tokenize("var a = \"oops;").unwrap_err();
        assert_eq!(
            err.downcast_ref::<LexError>(),
            Some(&LexError::UnterminatedString {
                span: Span { line: 1, column: 9 }
            })
        );
    }

    #[test]
    fn unexpected_character_is_an_error() {
        let err = tokenize("var a = 1 @ 2;").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LexError>(),
            Some(LexError::UnexpectedCharacter { ch: '@', .. })
        ));
    }
}
