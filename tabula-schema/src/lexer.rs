//! Tokenizer for the schema language.
//!
//! The lexer hands out one [`Token`] per call to [`Lexer::next_token`]. End
//! of input and lexical errors are sticky: once either is returned, every
//! further call returns it again.

use smol_str::SmolStr;

use crate::diag::{Diagnostics, Position};

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Letters followed by letters and digits.
    Ident(SmolStr),
    /// Signed 64-bit integer.
    Integer(i64),
    /// Number containing a decimal point.
    Decimal(f64),
    /// Double-quoted text with the quotes removed.
    Literal(String),
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `;`
    Semicolon,
    /// `,`
    Comma,
    /// `.`
    Period,
    /// `:`
    Colon,
    /// End of input.
    Eof,
    /// Lexical error; a diagnostic has been recorded.
    Error,
}

impl Token {
    /// Whether this token ends all parsing.
    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Eof | Self::Error)
    }

    /// The identifier text, if this is an identifier.
    pub fn ident(&self) -> Option<&str> {
        match self {
            Self::Ident(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this is the given keyword, ignoring case.
    pub fn is_keyword(&self, kw: &str) -> bool {
        self.ident().is_some_and(|s| s.eq_ignore_ascii_case(kw))
    }
}

/// Character-level scanner over one input.
#[derive(Debug)]
pub struct Lexer<'a> {
    src: &'a [u8],
    offset: usize,
    fname: SmolStr,
    line: usize,
    column: usize,
    stopped: Option<Token>,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over `src`, reporting positions in `fname`.
    pub fn new(fname: impl Into<SmolStr>, src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            offset: 0,
            fname: fname.into(),
            line: 1,
            column: 0,
            stopped: None,
        }
    }

    /// Position of the next unread character.
    pub fn position(&self) -> Position {
        Position::new(self.fname.clone(), self.line, self.column + 1)
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.offset += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn stop(&mut self, tok: Token) -> Token {
        self.stopped = Some(tok.clone());
        tok
    }

    fn fail(&mut self, pos: &Position, diag: &mut Diagnostics, text: &str) -> Token {
        diag.error(pos, text);
        self.stop(Token::Error)
    }

    /// Read the next token and the position where it starts.
    pub fn next_token(&mut self, diag: &mut Diagnostics) -> (Token, Position) {
        if let Some(tok) = &self.stopped {
            return (tok.clone(), self.position());
        }

        loop {
            while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
                self.bump();
            }
            if self.peek() != Some(b'#') {
                break;
            }
            while let Some(c) = self.bump() {
                if c == b'\n' {
                    break;
                }
            }
        }

        let start = self.position();
        let Some(mut c) = self.bump() else {
            return (self.stop(Token::Eof), start);
        };

        let mut minus = false;
        if c == b'-' {
            match self.bump() {
                Some(d) if d.is_ascii_digit() => {
                    minus = true;
                    c = d;
                }
                Some(_) => return (self.fail(&start, diag, "expected digit"), start),
                None => return (self.fail(&start, diag, "unexpected end of input"), start),
            }
        }

        let tok = match c {
            b'{' => Token::LBrace,
            b'}' => Token::RBrace,
            b';' => Token::Semicolon,
            b',' => Token::Comma,
            b'.' => Token::Period,
            b':' => Token::Colon,
            b'"' => self.literal(&start, diag),
            c if c.is_ascii_digit() => self.number(c, minus, &start, diag),
            c if c.is_ascii_alphabetic() => self.identifier(),
            _ => self.fail(&start, diag, "unknown input token"),
        };
        (tok, start)
    }

    fn literal(&mut self, start: &Position, diag: &mut Diagnostics) -> Token {
        let mut buf: Vec<u8> = Vec::new();
        let mut last = b' ';
        loop {
            let Some(c) = self.bump() else {
                return self.fail(start, diag, "unterminated quoted string");
            };
            if c == b'"' && last != b'\\' {
                break;
            }
            if last == b'\r' && c == b'\n' {
                buf.pop();
            }
            buf.push(c);
            last = c;
        }
        Token::Literal(String::from_utf8_lossy(&buf).into_owned())
    }

    fn number(&mut self, first: u8, minus: bool, start: &Position, diag: &mut Diagnostics) -> Token {
        let mut buf = String::new();
        if minus {
            buf.push('-');
        }
        buf.push(first as char);

        let mut has_dot = false;
        while let Some(c) = self.peek() {
            if c == b'.' {
                if has_dot {
                    break;
                }
                has_dot = true;
            } else if !c.is_ascii_digit() {
                break;
            }
            buf.push(c as char);
            self.bump();
        }

        if has_dot {
            match buf.parse::<f64>() {
                Ok(v) if v.is_finite() => Token::Decimal(v),
                _ => self.fail(start, diag, "malformed decimal"),
            }
        } else {
            match buf.parse::<i64>() {
                Ok(v) if v != i64::MIN => Token::Integer(v),
                _ => self.fail(start, diag, "malformed integer"),
            }
        }
    }

    fn identifier(&mut self) -> Token {
        let begin = self.offset - 1;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric()) {
            self.bump();
        }
        // Only ASCII alphanumerics were consumed.
        let text = std::str::from_utf8(&self.src[begin..self.offset]).unwrap_or_default();
        Token::Ident(SmolStr::new(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lex_all(src: &str) -> (Vec<Token>, Diagnostics) {
        let mut diag = Diagnostics::new();
        let mut lexer = Lexer::new("test.ort", src);
        let mut out = Vec::new();
        loop {
            let (tok, _) = lexer.next_token(&mut diag);
            let stop = tok.is_stop();
            out.push(tok);
            if stop {
                break;
            }
        }
        (out, diag)
    }

    // ==================== Token Tests ====================

    #[test]
    fn test_punctuation_and_identifiers() {
        let (toks, diag) = lex_all("struct user { field id int; };");
        assert!(diag.is_empty());
        assert_eq!(
            toks,
            vec![
                Token::Ident("struct".into()),
                Token::Ident("user".into()),
                Token::LBrace,
                Token::Ident("field".into()),
                Token::Ident("id".into()),
                Token::Ident("int".into()),
                Token::Semicolon,
                Token::RBrace,
                Token::Semicolon,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let (toks, _) = lex_all("42 -7 3.25 -0.5");
        assert_eq!(
            toks,
            vec![
                Token::Integer(42),
                Token::Integer(-7),
                Token::Decimal(3.25),
                Token::Decimal(-0.5),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_second_dot_ends_number() {
        let (toks, _) = lex_all("1.2.3");
        assert_eq!(
            toks,
            vec![
                Token::Decimal(1.2),
                Token::Period,
                Token::Integer(3),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_date_lexes_as_negative_parts() {
        let (toks, _) = lex_all("2020-01-31");
        assert_eq!(
            toks,
            vec![
                Token::Integer(2020),
                Token::Integer(-1),
                Token::Integer(-31),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_literal_keeps_escapes_and_strips_crlf() {
        let (toks, _) = lex_all("\"say \\\"hi\\\"\r\nnow\"");
        assert_eq!(
            toks,
            vec![Token::Literal("say \\\"hi\\\"\nnow".to_string()), Token::Eof]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let (toks, _) = lex_all("# leading\nenum # trailing\n;# no newline");
        assert_eq!(
            toks,
            vec![Token::Ident("enum".into()), Token::Semicolon, Token::Eof]
        );
    }

    // ==================== Position Tests ====================

    #[test]
    fn test_token_positions() {
        let mut diag = Diagnostics::new();
        let mut lexer = Lexer::new("p.ort", "a\n  bc");
        let (_, p1) = lexer.next_token(&mut diag);
        let (_, p2) = lexer.next_token(&mut diag);
        assert_eq!((p1.line, p1.column), (1, 1));
        assert_eq!((p2.line, p2.column), (2, 3));
    }

    // ==================== Error Tests ====================

    #[test]
    fn test_minus_requires_digit() {
        let (toks, diag) = lex_all("-x");
        assert_eq!(toks, vec![Token::Error]);
        assert_eq!(diag.messages()[0].text, "expected digit");
    }

    #[test]
    fn test_trailing_minus_is_an_error() {
        let (toks, diag) = lex_all("field x int default -");
        assert_eq!(toks.last(), Some(&Token::Error));
        assert_eq!(diag.error_count(), 1);
        assert_eq!(diag.messages()[0].to_string(), "test.ort:1:21: error: unexpected end of input");
    }

    #[test]
    fn test_unknown_character() {
        let (toks, diag) = lex_all("field @");
        assert_eq!(toks.last(), Some(&Token::Error));
        assert_eq!(diag.messages()[0].text, "unknown input token");
        assert_eq!(diag.messages()[0].position.as_ref().map(|p| p.column), Some(7));
    }

    #[test]
    fn test_integer_overflow() {
        let (toks, diag) = lex_all("99999999999999999999");
        assert_eq!(toks, vec![Token::Error]);
        assert_eq!(diag.messages()[0].text, "malformed integer");
    }

    #[test]
    fn test_unterminated_literal() {
        let (toks, diag) = lex_all("\"open");
        assert_eq!(toks, vec![Token::Error]);
        assert_eq!(diag.error_count(), 1);
    }

    #[test]
    fn test_stop_tokens_are_sticky() {
        let mut diag = Diagnostics::new();
        let mut lexer = Lexer::new("s.ort", "@ ok");
        assert_eq!(lexer.next_token(&mut diag).0, Token::Error);
        assert_eq!(lexer.next_token(&mut diag).0, Token::Error);
        assert_eq!(diag.error_count(), 1);

        let mut lexer = Lexer::new("s.ort", "");
        assert_eq!(lexer.next_token(&mut diag).0, Token::Eof);
        assert_eq!(lexer.next_token(&mut diag).0, Token::Eof);
    }
}
