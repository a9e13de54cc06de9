//! USDA tokenizer.
//!
//! Splits text into identifiers, literals and punctuation, tracking the line
//! each token starts on. `#` comments (including the `#usda 1.0` magic line)
//! are skipped here; the header check lives in [`crate::usd::parse_usda`].

use super::parser::{ParseError, ParseResult};

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    /// Identifier, keyword or namespaced name (`xformOp:translate`).
    Ident(String),
    String(String),
    Number(f64),
    /// Contents of `<...>`.
    Path(String),
    /// Contents of `@...@` or `@@@...@@@`.
    Asset(String),
    Punct(char),
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("'{}'", s),
            Token::String(s) => format!("string \"{}\"", s),
            Token::Number(n) => format!("number {}", n),
            Token::Path(p) => format!("path <{}>", p),
            Token::Asset(a) => format!("asset @{}@", a),
            Token::Punct(c) => format!("'{}'", c),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

const PUNCTUATION: &[char] = &['(', ')', '[', ']', '{', '}', '=', ',', '.', ':', ';'];

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    src: &'a str,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            chars: src.char_indices().peekable(),
            src,
            line: 1,
        }
    }

    /// Tokenize the whole input.
    pub fn tokenize(mut self) -> ParseResult<Vec<Spanned>> {
        let mut tokens = Vec::new();
        while let Some(spanned) = self.next_token()? {
            tokens.push(spanned);
        }
        Ok(tokens)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Parse {
            line: self.line,
            message: message.into(),
        }
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn rest(&mut self) -> &'a str {
        match self.chars.peek() {
            Some(&(i, _)) => &self.src[i..],
            None => "",
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> ParseResult<Option<Spanned>> {
        self.skip_trivia();
        let line = self.line;
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let token = match c {
            '"' | '\'' => Token::String(self.string(c)?),
            '<' => Token::Path(self.delimited('<', '>')?),
            '@' => Token::Asset(self.asset()?),
            c if c.is_ascii_digit() => Token::Number(self.number(1.0)?),
            '-' | '+' => {
                self.bump();
                let sign = if c == '-' { -1.0 } else { 1.0 };
                match self.peek() {
                    Some(d) if d.is_ascii_digit() || d == '.' => Token::Number(self.number(sign)?),
                    Some(a) if a.is_ascii_alphabetic() => match self.ident().as_str() {
                        "inf" => Token::Number(sign * f64::INFINITY),
                        "nan" => Token::Number(f64::NAN),
                        other => return Err(self.error(format!("unexpected '{}{}'", c, other))),
                    },
                    _ => return Err(self.error(format!("unexpected '{}'", c))),
                }
            }
            '.' if self.rest()[1..].starts_with(|d: char| d.is_ascii_digit()) => {
                Token::Number(self.number(1.0)?)
            }
            c if c.is_alphabetic() || c == '_' => {
                let word = self.ident();
                match word.as_str() {
                    "inf" => Token::Number(f64::INFINITY),
                    "nan" => Token::Number(f64::NAN),
                    _ => Token::Ident(word),
                }
            }
            c if PUNCTUATION.contains(&c) => {
                self.bump();
                Token::Punct(c)
            }
            other => return Err(self.error(format!("unexpected character '{}'", other))),
        };

        Ok(Some(Spanned { token, line }))
    }

    fn ident(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == ':' {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        word
    }

    fn number(&mut self, sign: f64) -> ParseResult<f64> {
        let mut text = String::new();
        let mut prev = ' ';
        while let Some(c) = self.peek() {
            let accept = c.is_ascii_digit()
                || c == '.'
                || c == 'e'
                || c == 'E'
                || ((c == '-' || c == '+') && (prev == 'e' || prev == 'E'));
            if !accept {
                break;
            }
            text.push(c);
            prev = c;
            self.bump();
        }
        text.parse::<f64>()
            .map(|n| sign * n)
            .map_err(|_| ParseError::InvalidNumber(text))
    }

    fn string(&mut self, quote: char) -> ParseResult<String> {
        let start = self.line;
        let triple: String = std::iter::repeat(quote).take(3).collect();
        let is_triple = self.rest().starts_with(&triple);
        let skip = if is_triple { 3 } else { 1 };
        for _ in 0..skip {
            self.bump();
        }

        let mut out = String::new();
        loop {
            if is_triple && self.rest().starts_with(&triple) {
                for _ in 0..3 {
                    self.bump();
                }
                return Ok(out);
            }
            let Some(c) = self.bump() else {
                return Err(ParseError::UnclosedBlock(start));
            };
            match c {
                '\\' => {
                    let escaped = self.bump().ok_or(ParseError::UnexpectedEof)?;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                }
                '\n' if !is_triple => {
                    return Err(ParseError::Parse {
                        line: start,
                        message: "unterminated string".to_string(),
                    })
                }
                c if c == quote && !is_triple => return Ok(out),
                c => out.push(c),
            }
        }
    }

    fn delimited(&mut self, open: char, close: char) -> ParseResult<String> {
        let start = self.line;
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == close => return Ok(out),
                Some('\n') | None => {
                    return Err(ParseError::Parse {
                        line: start,
                        message: format!("unterminated '{}'", open),
                    })
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn asset(&mut self) -> ParseResult<String> {
        if !self.rest().starts_with("@@@") {
            return self.delimited('@', '@');
        }
        let start = self.line;
        for _ in 0..3 {
            self.bump();
        }
        let mut out = String::new();
        loop {
            if self.rest().starts_with("@@@") {
                for _ in 0..3 {
                    self.bump();
                }
                return Ok(out);
            }
            match self.bump() {
                Some(c) => out.push(c),
                None => return Err(ParseError::UnclosedBlock(start)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_property_statement() {
        assert_eq!(
            tokens("double3 xformOp:translate = (0, 75, -1.5e1)"),
            vec![
                Token::Ident("double3".into()),
                Token::Ident("xformOp:translate".into()),
                Token::Punct('='),
                Token::Punct('('),
                Token::Number(0.0),
                Token::Punct(','),
                Token::Number(75.0),
                Token::Punct(','),
                Token::Number(-15.0),
                Token::Punct(')'),
            ]
        );
    }

    #[test]
    fn test_connection_and_path() {
        assert_eq!(
            tokens("token outputs:surface.connect = </Mat/Shader.outputs:surface>"),
            vec![
                Token::Ident("token".into()),
                Token::Ident("outputs:surface".into()),
                Token::Punct('.'),
                Token::Ident("connect".into()),
                Token::Punct('='),
                Token::Path("/Mat/Shader.outputs:surface".into()),
            ]
        );
    }

    #[test]
    fn test_comments_and_lines() {
        let spanned = Lexer::new("#usda 1.0\n# note\n\ndef \"A\"").tokenize().unwrap();
        assert_eq!(spanned.len(), 2);
        assert_eq!(spanned[0].line, 4);
        assert_eq!(spanned[1].token, Token::String("A".into()));
    }

    #[test]
    fn test_strings_and_assets() {
        assert_eq!(
            tokens("\"a\\\"b\" '''multi\nline''' @tex.png@ @@@odd@name@@@"),
            vec![
                Token::String("a\"b".into()),
                Token::String("multi\nline".into()),
                Token::Asset("tex.png".into()),
                Token::Asset("odd@name".into()),
            ]
        );
    }

    #[test]
    fn test_special_numbers() {
        let toks = tokens("inf -inf .5");
        assert_eq!(toks[0], Token::Number(f64::INFINITY));
        assert_eq!(toks[1], Token::Number(f64::NEG_INFINITY));
        assert_eq!(toks[2], Token::Number(0.5));
    }

    #[test]
    fn test_unterminated_string_reports_line() {
        let err = Lexer::new("\n\"open").tokenize().unwrap_err();
        assert!(err.to_string().contains("line 2"), "{}", err);
    }
}
