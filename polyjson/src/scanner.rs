//! Low-level JSON scanner that finds token boundaries without materializing values.
//!
//! The scanner identifies where tokens are in a buffer, not what they mean.
//! Strings come back as indices plus a `has_escapes` flag, numbers as indices.
//! Decoding is left to whoever actually needs the content, which for this
//! crate is almost never: the lookahead pass only compares one property name
//! and reads one string value.
//!
//! Unlike a general streaming tokenizer, this scanner keeps no state between
//! calls. When the buffer ends in the middle of a token it rewinds to the
//! token's first byte and reports [`Token::NeedMore`]; the caller retries the
//! whole lookahead once more bytes are available.

use core::fmt;

/// A byte range in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Offset of the first byte.
    pub offset: usize,
    /// Length in bytes.
    pub len: usize,
}

impl Span {
    /// Create a span from an offset and a length.
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// Offset one past the last byte.
    pub const fn end(self) -> usize {
        self.offset + self.len
    }

    /// The same span moved `by` bytes to the right.
    pub const fn shifted(self, by: usize) -> Self {
        Self {
            offset: self.offset + by,
            len: self.len,
        }
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        (span.offset, span.len).into()
    }
}

/// Token kinds with minimal data - strings and numbers are just indices into the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// `{`
    ObjectStart,
    /// `}`
    ObjectEnd,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `:`
    Colon,
    /// `,`
    Comma,
    /// `null`
    Null,
    /// `true`
    True,
    /// `false`
    False,
    /// A string literal - indices point to content (excluding quotes)
    String {
        /// Start index of string content (after opening quote)
        start: usize,
        /// End index of string content (before closing quote)
        end: usize,
        /// True if the string contains escape sequences
        has_escapes: bool,
    },
    /// A number literal - indices point to the raw number text
    Number {
        /// Start index of number
        start: usize,
        /// End index of number
        end: usize,
    },
    /// End of input reached
    Eof,
    /// Buffer exhausted mid-token (or before any token) and more input may follow
    NeedMore,
}

impl Token {
    /// Short human-readable name, used in error messages.
    pub const fn describe(&self) -> &'static str {
        match self {
            Token::ObjectStart => "'{'",
            Token::ObjectEnd => "'}'",
            Token::ArrayStart => "'['",
            Token::ArrayEnd => "']'",
            Token::Colon => "':'",
            Token::Comma => "','",
            Token::Null => "null",
            Token::True | Token::False => "boolean",
            Token::String { .. } => "string",
            Token::Number { .. } => "number",
            Token::Eof => "end of input",
            Token::NeedMore => "incomplete input",
        }
    }
}

/// Spanned token with location information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpannedToken {
    /// The token
    pub token: Token,
    /// Source span
    pub span: Span,
}

/// Scanner error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanError {
    /// The error kind
    pub kind: ScanErrorKind,
    /// Source span
    pub span: Span,
}

/// Types of scanner errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanErrorKind {
    /// Unexpected character
    UnexpectedChar(char),
    /// Input ended for good inside a token
    UnexpectedEof(&'static str),
}

impl fmt::Display for ScanErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanErrorKind::UnexpectedChar(c) => write!(f, "unexpected character {c:?}"),
            ScanErrorKind::UnexpectedEof(ctx) => write!(f, "unexpected end of input {ctx}"),
        }
    }
}

/// Result type for scanner operations
pub type ScanResult = Result<SpannedToken, ScanError>;

/// JSON token scanner.
///
/// `is_final` tells the scanner whether the end of `buf` is the end of the
/// input. When it is not, anything cut off by the end of the buffer becomes
/// [`Token::NeedMore`] and the position is left at the token's first byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scanner {
    pos: usize,
}

impl Scanner {
    /// Create a scanner starting at a specific position
    pub const fn at_position(pos: usize) -> Self {
        Self { pos }
    }

    /// Current position in the buffer
    pub const fn pos(&self) -> usize {
        self.pos
    }

    /// Scan the next token from the buffer.
    pub fn next_token(&mut self, buf: &[u8], is_final: bool) -> ScanResult {
        self.skip_whitespace(buf);

        let start = self.pos;
        let Some(&byte) = buf.get(self.pos) else {
            let token = if is_final { Token::Eof } else { Token::NeedMore };
            return Ok(SpannedToken {
                token,
                span: Span::new(start, 0),
            });
        };

        let punct = match byte {
            b'{' => Some(Token::ObjectStart),
            b'}' => Some(Token::ObjectEnd),
            b'[' => Some(Token::ArrayStart),
            b']' => Some(Token::ArrayEnd),
            b':' => Some(Token::Colon),
            b',' => Some(Token::Comma),
            _ => None,
        };
        if let Some(token) = punct {
            self.pos += 1;
            return Ok(SpannedToken {
                token,
                span: Span::new(start, 1),
            });
        }

        match byte {
            b'"' => self.scan_string(buf, start, is_final),
            b'-' | b'0'..=b'9' => self.scan_number(buf, start, is_final),
            b't' => self.scan_literal(buf, start, b"true", Token::True, is_final),
            b'f' => self.scan_literal(buf, start, b"false", Token::False, is_final),
            b'n' => self.scan_literal(buf, start, b"null", Token::Null, is_final),
            _ => Err(ScanError {
                kind: ScanErrorKind::UnexpectedChar(byte as char),
                span: Span::new(start, 1),
            }),
        }
    }

    fn skip_whitespace(&mut self, buf: &[u8]) {
        let mut pos = self.pos;
        while let Some(&b) = buf.get(pos) {
            match b {
                b' ' | b'\t' | b'\n' | b'\r' => pos += 1,
                _ => break,
            }
        }
        self.pos = pos;
    }

    /// Rewind to `start` and report that the token did not fit in the buffer.
    fn need_more(&mut self, buf: &[u8], start: usize, is_final: bool, ctx: &'static str) -> ScanResult {
        if is_final {
            return Err(ScanError {
                kind: ScanErrorKind::UnexpectedEof(ctx),
                span: Span::new(start, buf.len() - start),
            });
        }
        self.pos = start;
        Ok(SpannedToken {
            token: Token::NeedMore,
            span: Span::new(start, buf.len() - start),
        })
    }

    /// Scan a string, finding its boundaries and noting if it has escapes.
    fn scan_string(&mut self, buf: &[u8], start: usize, is_final: bool) -> ScanResult {
        // SIMD-friendly fast path: 16 bytes at a time looking for quotes/backslashes
        const STEP_SIZE: usize = 16;
        type Window = u128;
        type Chunk = [u8; STEP_SIZE];

        let content_start = start + 1;
        let mut pos = content_start;
        let mut has_escapes = false;

        loop {
            while let Some(Ok(chunk)) = buf
                .get(pos..)
                .and_then(|s| s.get(..STEP_SIZE))
                .map(Chunk::try_from)
            {
                let window = Window::from_ne_bytes(chunk);
                if contains_byte(window, b'"') || contains_byte(window, b'\\') {
                    break;
                }
                pos += STEP_SIZE;
            }

            match buf.get(pos) {
                Some(b'"') => {
                    self.pos = pos + 1;
                    return Ok(SpannedToken {
                        token: Token::String {
                            start: content_start,
                            end: pos,
                            has_escapes,
                        },
                        span: Span::new(start, self.pos - start),
                    });
                }
                // The escaped byte is never a closing quote; `\uXXXX` digits
                // contain neither quotes nor backslashes.
                Some(b'\\') => {
                    has_escapes = true;
                    if pos + 1 >= buf.len() {
                        return self.need_more(buf, start, is_final, "in string");
                    }
                    pos += 2;
                }
                Some(_) => pos += 1,
                None => return self.need_more(buf, start, is_final, "in string"),
            }
        }
    }

    /// Scan a number, finding its boundaries.
    fn scan_number(&mut self, buf: &[u8], start: usize, is_final: bool) -> ScanResult {
        let mut pos = start;
        if buf.get(pos) == Some(&b'-') {
            pos += 1;
        }

        let digits = |mut pos: usize| {
            while buf.get(pos).is_some_and(u8::is_ascii_digit) {
                pos += 1;
            }
            pos
        };

        pos = digits(pos);
        if buf.get(pos) == Some(&b'.') {
            pos = digits(pos + 1);
        }
        if matches!(buf.get(pos), Some(b'e') | Some(b'E')) {
            pos += 1;
            if matches!(buf.get(pos), Some(b'+') | Some(b'-')) {
                pos += 1;
            }
            pos = digits(pos);
        }

        // A number only ends at a delimiter; at the end of a growable buffer
        // the next chunk may still hold more digits.
        if pos == buf.len() && !is_final {
            return self.need_more(buf, start, is_final, "in number");
        }

        let body = &buf[start..pos];
        if body.is_empty() || body == b"-" {
            return Err(ScanError {
                kind: match buf.get(pos) {
                    Some(&b) => ScanErrorKind::UnexpectedChar(b as char),
                    None => ScanErrorKind::UnexpectedEof("in number"),
                },
                span: Span::new(start, pos - start),
            });
        }

        self.pos = pos;
        Ok(SpannedToken {
            token: Token::Number { start, end: pos },
            span: Span::new(start, pos - start),
        })
    }

    /// Scan a literal keyword (true, false, null)
    fn scan_literal(
        &mut self,
        buf: &[u8],
        start: usize,
        expected: &'static [u8],
        token: Token,
        is_final: bool,
    ) -> ScanResult {
        for (i, &want) in expected.iter().enumerate() {
            match buf.get(start + i) {
                Some(&b) if b == want => {}
                Some(&b) => {
                    return Err(ScanError {
                        kind: ScanErrorKind::UnexpectedChar(b as char),
                        span: Span::new(start + i, 1),
                    });
                }
                None => return self.need_more(buf, start, is_final, "in literal"),
            }
        }

        self.pos = start + expected.len();
        Ok(SpannedToken {
            token,
            span: Span::new(start, expected.len()),
        })
    }
}

/// Check if a 128-bit window contains a specific byte (SIMD-friendly)
#[inline]
const fn contains_byte(window: u128, byte: u8) -> bool {
    let pattern = u128::from_ne_bytes([byte; 16]);
    let xor = window ^ pattern;
    let has_zero = (xor.wrapping_sub(0x01010101010101010101010101010101))
        & !xor
        & 0x80808080808080808080808080808080;
    has_zero != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &[u8], is_final: bool) -> Vec<Token> {
        let mut scanner = Scanner::default();
        let mut out = Vec::new();
        loop {
            let token = scanner.next_token(input, is_final).unwrap().token;
            out.push(token);
            if matches!(token, Token::Eof | Token::NeedMore) {
                return out;
            }
        }
    }

    #[test]
    fn test_simple_tokens() {
        polyjson_testhelpers::setup();
        assert_eq!(
            tokens(b" { } [ ] , : ", true),
            vec![
                Token::ObjectStart,
                Token::ObjectEnd,
                Token::ArrayStart,
                Token::ArrayEnd,
                Token::Comma,
                Token::Colon,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_string_boundaries() {
        polyjson_testhelpers::setup();
        let input = br#""a long enough string to hit the fast path" "with \"escapes\"""#;
        let mut scanner = Scanner::default();

        let first = scanner.next_token(input, true).unwrap();
        assert_eq!(
            first.token,
            Token::String {
                start: 1,
                end: 42,
                has_escapes: false
            }
        );
        assert_eq!(first.span, Span::new(0, 43));

        let second = scanner.next_token(input, true).unwrap();
        let Token::String {
            start,
            end,
            has_escapes,
        } = second.token
        else {
            panic!("expected string, got {second:?}");
        };
        assert!(has_escapes);
        assert_eq!(&input[start..end], br#"with \"escapes\""#);
    }

    #[test]
    fn test_truncated_tokens_rewind() {
        polyjson_testhelpers::setup();
        let cases: [(&[u8], usize); 5] = [
            (b"  \"unterminated", 2),
            (b"tr", 0),
            (b"nul", 0),
            (b"\"ends in escape\\", 0),
            (b"-12", 0),
        ];
        for (input, rewound_to) in cases {
            let mut scanner = Scanner::default();
            let token = scanner.next_token(input, false).unwrap();
            assert_eq!(token.token, Token::NeedMore, "input {input:?}");
            assert_eq!(scanner.pos(), rewound_to, "input {input:?}");
        }
    }

    #[test]
    fn test_truncated_tokens_on_final_input() {
        polyjson_testhelpers::setup();
        let mut scanner = Scanner::default();
        let err = scanner.next_token(b"\"open", true).unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::UnexpectedEof("in string"));

        // A number is complete at the true end of input
        let mut scanner = Scanner::default();
        let token = scanner.next_token(b"-12.5e3", true).unwrap();
        assert_eq!(token.token, Token::Number { start: 0, end: 7 });
    }

    #[test]
    fn test_numbers_and_literals() {
        polyjson_testhelpers::setup();
        assert_eq!(
            tokens(b"[1, -2.5, 3e10, true, false, null]", true),
            vec![
                Token::ArrayStart,
                Token::Number { start: 1, end: 2 },
                Token::Comma,
                Token::Number { start: 4, end: 8 },
                Token::Comma,
                Token::Number { start: 10, end: 14 },
                Token::Comma,
                Token::True,
                Token::Comma,
                Token::False,
                Token::Comma,
                Token::Null,
                Token::ArrayEnd,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_unexpected_char() {
        polyjson_testhelpers::setup();
        let mut scanner = Scanner::default();
        let err = scanner.next_token(b"  @", true).unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::UnexpectedChar('@'));
        assert_eq!(err.span, Span::new(2, 1));

        let err = Scanner::default().next_token(b"nope", true).unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::UnexpectedChar('o'));
    }
}
