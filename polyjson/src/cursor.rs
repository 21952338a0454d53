//! Forkable token cursor over a shared input buffer.
//!
//! A [`TokenCursor`] is a borrowed view of the input plus its own read
//! offset. Forking copies the offset and nothing else, so a lookahead pass
//! can run on a fork while the caller's cursor stays exactly where it was.
//! Only [`TokenCursor::commit`] moves a cursor to a fork's position.

use std::borrow::Cow;

use crate::error::{PolyError, PolyErrorKind, Result, SyntaxError};
use crate::options::DEFAULT_MAX_DEPTH;
use crate::scanner::{Scanner, Span, SpannedToken, Token};
use crate::trace;

/// Outcome of [`TokenCursor::skip_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skipped {
    /// The whole value was skipped; the span covers it
    Done(Span),
    /// The buffer ended inside the value; the cursor did not move
    NeedMore,
}

/// A cursor over a JSON buffer that may still grow.
#[derive(Debug, Clone, Copy)]
pub struct TokenCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    is_final: bool,
    max_depth: usize,
}

impl<'a> TokenCursor<'a> {
    /// Cursor at the start of `buf`.
    ///
    /// `is_final` says whether `buf` holds the rest of the input, or whether
    /// more bytes may arrive later.
    pub const fn new(buf: &'a [u8], is_final: bool) -> Self {
        Self::at(buf, 0, is_final)
    }

    /// Cursor at byte offset `pos` of `buf`.
    pub const fn at(buf: &'a [u8], pos: usize, is_final: bool) -> Self {
        Self {
            buf,
            pos,
            is_final,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Limit the nesting depth accepted by [`skip_value`](Self::skip_value).
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Current read offset into the buffer.
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Whether the end of the buffer is the end of the input.
    pub const fn is_final(&self) -> bool {
        self.is_final
    }

    /// The whole underlying buffer.
    pub const fn input(&self) -> &'a [u8] {
        self.buf
    }

    /// An independent cursor over the same buffer at the same position.
    pub const fn fork(&self) -> Self {
        *self
    }

    /// Move this cursor to where `fork` ended up.
    pub fn commit(&mut self, fork: TokenCursor<'a>) {
        debug_assert!(core::ptr::eq(self.buf, fork.buf), "fork of another buffer");
        debug_assert!(fork.pos >= self.pos, "commit would move backwards");
        self.pos = fork.pos;
    }

    /// Read the next token.
    ///
    /// [`Token::NeedMore`] leaves the position unchanged. On final input the
    /// scanner reports [`Token::Eof`] instead, and a token cut off by the end
    /// of input is an error.
    pub fn next_token(&mut self) -> Result<SpannedToken> {
        let mut scanner = Scanner::at_position(self.pos);
        let token = scanner.next_token(self.buf, self.is_final)?;
        if token.token != Token::NeedMore {
            self.pos = scanner.pos();
        }
        Ok(token)
    }

    /// Skip one complete value (scalar, object or array) without looking inside.
    ///
    /// Brackets are matched and nesting is bounded by the cursor's depth
    /// limit; everything else inside a container is taken on trust, the
    /// codec that eventually decodes the bytes validates them.
    pub fn skip_value(&mut self) -> Result<Skipped> {
        let start = self.pos;
        let mut open: Vec<bool> = Vec::new();
        let mut value_start = None;

        loop {
            let spanned = self.next_token()?;
            match spanned.token {
                Token::NeedMore => {
                    trace!(start, depth = open.len(), "skip ran out of input");
                    self.pos = start;
                    return Ok(Skipped::NeedMore);
                }
                Token::ObjectStart | Token::ArrayStart => {
                    if open.len() >= self.max_depth {
                        return Err(PolyError::syntax(
                            SyntaxError::DepthLimitExceeded {
                                max_depth: self.max_depth,
                            },
                            spanned.span,
                        ));
                    }
                    open.push(spanned.token == Token::ObjectStart);
                }
                Token::ObjectEnd | Token::ArrayEnd => match open.pop() {
                    Some(is_object) if is_object == (spanned.token == Token::ObjectEnd) => {}
                    Some(true) => return Err(unexpected(spanned, "'}'")),
                    Some(false) => return Err(unexpected(spanned, "']'")),
                    None => return Err(unexpected(spanned, "value")),
                },
                Token::Colon | Token::Comma if open.is_empty() => {
                    return Err(unexpected(spanned, "value"));
                }
                Token::Eof => {
                    let expected = if open.is_empty() { "value" } else { "end of value" };
                    return Err(unexpected(spanned, expected));
                }
                _ => {}
            }

            let value_start = *value_start.get_or_insert(spanned.span.offset);
            if open.is_empty() {
                return Ok(Skipped::Done(Span::new(value_start, self.pos - value_start)));
            }
        }
    }

    /// Whether a string token's decoded content equals `expected`.
    ///
    /// Strings without escapes are compared in place.
    pub fn str_eq(&self, spanned: &SpannedToken, expected: &str) -> Result<bool> {
        match spanned.token {
            Token::String {
                start,
                end,
                has_escapes: false,
            } => Ok(&self.buf[start..end] == expected.as_bytes()),
            _ => Ok(self.read_str(spanned)? == expected),
        }
    }

    /// Decode a string token, borrowing from the buffer when it has no escapes.
    pub fn read_str(&self, spanned: &SpannedToken) -> Result<Cow<'a, str>> {
        let Token::String {
            start,
            end,
            has_escapes,
        } = spanned.token
        else {
            return Err(unexpected(*spanned, "string"));
        };

        let invalid = || PolyError::syntax(SyntaxError::InvalidString, spanned.span);
        if has_escapes {
            // The span includes both quotes, which is what the codec expects.
            serde_json::from_slice::<String>(&self.buf[start - 1..end + 1])
                .map(Cow::Owned)
                .map_err(|_| invalid())
        } else {
            core::str::from_utf8(&self.buf[start..end])
                .map(Cow::Borrowed)
                .map_err(|_| invalid())
        }
    }
}

/// Error for a token that does not fit the grammar at this point.
///
/// Running into the real end of input is reported as a protocol error
/// rather than a syntax error: the input was cut short, not malformed.
pub(crate) fn unexpected(spanned: SpannedToken, expected: &'static str) -> PolyError {
    let kind = match spanned.token {
        Token::Eof => PolyErrorKind::Protocol { expected },
        other => PolyErrorKind::Syntax(SyntaxError::UnexpectedToken {
            got: other.describe(),
            expected,
        }),
    };
    PolyError::new(kind, spanned.span)
}
