//! Decoding from a [`std::io::Read`] source.
//!
//! Every decode step runs against whatever is buffered. When a step reports
//! [`Progress::NeedMore`], the buffer drops the bytes already consumed, reads
//! more (growing if the unfinished object fills it) and the step runs again
//! from the same position.

use std::io::Read;

use crate::cursor::{TokenCursor, unexpected};
use crate::deserialize::{Decoder, Progress};
use crate::error::{PolyError, Result, SyntaxError};
use crate::options::DecodeOptions;
use crate::registry::Registry;
use crate::scan_buffer::ScanBuffer;
use crate::scanner::{SpannedToken, Token};
use crate::trace;

/// Decodes polymorphic values from a reader, refilling as needed.
pub struct StreamDeserializer<'r, R> {
    reader: R,
    buffer: ScanBuffer,
    /// Read offset into the buffer
    pos: usize,
    /// Bytes dropped from the front of the buffer so far
    discarded: usize,
    registry: &'r Registry,
    options: DecodeOptions,
}

impl<R: Read> StreamDeserializer<'static, R> {
    /// Decode from `reader` with the process-wide registry and default options.
    pub fn new(reader: R) -> Self {
        Self::with_registry(reader, Registry::global(), DecodeOptions::default())
    }
}

impl<'r, R: Read> StreamDeserializer<'r, R> {
    /// Decode from `reader` with an explicit registry and options.
    pub fn with_registry(reader: R, registry: &'r Registry, options: DecodeOptions) -> Self {
        Self {
            reader,
            buffer: ScanBuffer::with_capacity(options.buffer_capacity),
            pos: 0,
            discarded: 0,
            registry,
            options,
        }
    }

    /// Absolute byte offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.discarded + self.pos
    }

    /// Decode one `B` object.
    pub fn decode<B: 'static>(&mut self) -> Result<B> {
        let decoder = self.registry.decoder::<B>()?;
        self.decode_with(&decoder)
    }

    /// Decode one object with a decoder obtained earlier.
    pub fn decode_with<B: 'static>(&mut self, decoder: &Decoder<B>) -> Result<B> {
        self.drive(|cursor| decoder.decode(cursor))
    }

    /// Decode a JSON array whose elements are all `B` objects.
    pub fn decode_array<B: 'static>(&mut self) -> Result<Vec<B>> {
        let decoder = self.registry.decoder::<B>()?;

        let open = self.next_token()?;
        if open.token != Token::ArrayStart {
            return Err(self.unexpected(open, "'['"));
        }

        let mut items = Vec::new();
        if self.peek_token()?.token == Token::ArrayEnd {
            self.next_token()?;
            return Ok(items);
        }

        loop {
            items.push(self.decode_with(&decoder)?);
            let separator = self.next_token()?;
            match separator.token {
                Token::Comma => {}
                Token::ArrayEnd => break,
                _ => return Err(self.unexpected(separator, "',' or ']'")),
            }
        }

        trace!(len = items.len(), "decoded polymorphic array");
        Ok(items)
    }

    /// Check that nothing but whitespace is left in the input.
    pub fn end(&mut self) -> Result<()> {
        let token = self.peek_token()?;
        if token.token == Token::Eof {
            Ok(())
        } else {
            Err(PolyError::syntax(SyntaxError::TrailingCharacters, token.span)
                .shifted(self.discarded))
        }
    }

    /// The underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn next_token(&mut self) -> Result<SpannedToken> {
        self.drive(|cursor| token_step(cursor))
    }

    fn peek_token(&mut self) -> Result<SpannedToken> {
        self.drive(|cursor| token_step(&mut cursor.fork()))
    }

    fn unexpected(&self, spanned: SpannedToken, expected: &'static str) -> PolyError {
        unexpected(spanned, expected).shifted(self.discarded)
    }

    /// Run `step` until it completes, refilling the buffer in between.
    fn drive<T>(
        &mut self,
        mut step: impl FnMut(&mut TokenCursor<'_>) -> Result<Progress<T>>,
    ) -> Result<T> {
        loop {
            let mut cursor = TokenCursor::at(self.buffer.data(), self.pos, self.buffer.is_eof())
                .with_max_depth(self.options.max_depth);
            match step(&mut cursor) {
                Ok(Progress::Complete(value)) => {
                    self.pos = cursor.position();
                    return Ok(value);
                }
                Ok(Progress::NeedMore) => self.fill()?,
                Err(err) => return Err(err.shifted(self.discarded)),
            }
        }
    }

    fn fill(&mut self) -> Result<()> {
        if self.pos > 0 {
            self.buffer.consume(self.pos);
            self.discarded += self.pos;
            self.pos = 0;
        }
        if self.buffer.is_full() {
            self.buffer.grow();
        }
        let _read = self.buffer.refill(&mut self.reader)?;
        trace!(
            read = _read,
            filled = self.buffer.filled(),
            capacity = self.buffer.capacity(),
            "refilled stream buffer"
        );
        Ok(())
    }
}

fn token_step(cursor: &mut TokenCursor<'_>) -> Result<Progress<SpannedToken>> {
    let spanned = cursor.next_token()?;
    Ok(match spanned.token {
        Token::NeedMore => Progress::NeedMore,
        _ => Progress::Complete(spanned),
    })
}

/// Decode a single `B` object from `reader` using the process-wide registry.
///
/// Only whitespace may follow the object.
pub fn from_reader<R: Read, B: 'static>(reader: R) -> Result<B> {
    let mut stream = StreamDeserializer::new(reader);
    let value = stream.decode()?;
    stream.end()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolyErrorKind;
    use crate::registry::BaseType;
    use crate::scanner::Span;
    use serde::Deserialize;
    use std::io;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Up {
        by: i32,
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct Down {
        by: i32,
    }

    #[derive(Debug, PartialEq)]
    enum Step {
        Up(Up),
        Down(Down),
    }

    impl From<Up> for Step {
        fn from(value: Up) -> Self {
            Step::Up(value)
        }
    }
    impl From<Down> for Step {
        fn from(value: Down) -> Self {
            Step::Down(value)
        }
    }

    /// Hands out at most `chunk` bytes per read.
    struct Trickle<'a> {
        data: &'a [u8],
        chunk: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.chunk.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    fn registry() -> Registry {
        let registry = Registry::new();
        registry
            .register(
                BaseType::<Step>::new("dir")
                    .subtype::<Up>("up")
                    .subtype::<Down>("down"),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_array_with_tiny_buffer_and_chunks() {
        polyjson_testhelpers::setup();
        let registry = registry();
        let input = br#" [ {"by":1,"dir":"up"}, {"dir":"down","by":2} ,{"by":3,"dir":"up"} ] "#;

        for chunk in [1, 2, 3, 7, 64] {
            let reader = Trickle { data: input, chunk };
            let options = DecodeOptions::new().buffer_capacity(4);
            let mut stream = StreamDeserializer::with_registry(reader, &registry, options);
            let steps: Vec<Step> = stream.decode_array().unwrap();
            assert_eq!(
                steps,
                vec![
                    Step::Up(Up { by: 1 }),
                    Step::Down(Down { by: 2 }),
                    Step::Up(Up { by: 3 }),
                ],
                "chunk size {chunk}"
            );
            assert_eq!(stream.position(), input.len() - 1);
            stream.end().unwrap();
        }
    }

    #[test]
    fn test_empty_array() {
        polyjson_testhelpers::setup();
        let registry = registry();
        let reader = Trickle {
            data: b"[ ]",
            chunk: 1,
        };
        let mut stream = StreamDeserializer::with_registry(reader, &registry, DecodeOptions::new());
        assert!(stream.decode_array::<Step>().unwrap().is_empty());
        stream.end().unwrap();
    }

    #[test]
    fn test_concatenated_objects() {
        polyjson_testhelpers::setup();
        let registry = registry();
        let input = br#"{"dir":"up","by":1}{"dir":"down","by":5}"#;
        let reader = Trickle {
            data: input,
            chunk: 5,
        };
        let mut stream = StreamDeserializer::with_registry(reader, &registry, DecodeOptions::new());
        assert_eq!(stream.decode::<Step>().unwrap(), Step::Up(Up { by: 1 }));
        assert_eq!(stream.position(), 19);
        assert_eq!(stream.decode::<Step>().unwrap(), Step::Down(Down { by: 5 }));
        stream.end().unwrap();
    }

    #[test]
    fn test_error_spans_are_absolute() {
        polyjson_testhelpers::setup();
        let registry = registry();
        let input = br#"[{"dir":"up","by":1}, {"dir":"sideways","by":1}]"#;
        let reader = Trickle {
            data: input,
            chunk: 3,
        };
        let options = DecodeOptions::new().buffer_capacity(8);
        let mut stream = StreamDeserializer::with_registry(reader, &registry, options);
        let err = stream.decode_array::<Step>().unwrap_err();
        assert!(err.is_discriminator(), "{err}");
        assert_eq!(err.span, Some(Span::new(22, 1)));
    }

    #[test]
    fn test_truncated_stream() {
        polyjson_testhelpers::setup();
        let registry = registry();
        let reader = Trickle {
            data: br#"{"dir":"up","by""#,
            chunk: 4,
        };
        let mut stream = StreamDeserializer::with_registry(reader, &registry, DecodeOptions::new());
        let err = stream.decode::<Step>().unwrap_err();
        assert!(err.is_protocol(), "{err}");
    }

    #[test]
    fn test_reader_errors_surface() {
        polyjson_testhelpers::setup();
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("wire cut"))
            }
        }

        let registry = registry();
        let mut stream = StreamDeserializer::with_registry(Broken, &registry, DecodeOptions::new());
        let err = stream.decode::<Step>().unwrap_err();
        assert!(matches!(err.kind, PolyErrorKind::Io(_)), "{err}");
    }
}
