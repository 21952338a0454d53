//! Decoding a polymorphic base type from a token cursor.

use std::sync::Arc;

use crate::cursor::{Skipped, TokenCursor};
use crate::error::{ConfigError, PolyError, PolyErrorKind, Result, SyntaxError};
use crate::options::DecodeOptions;
use crate::probe::{Probe, finish_object, probe};
use crate::registry::{Decoders, Family, Observed, Registry, TypeKey};
use crate::scanner::{Span, Token};
use crate::{debug, trace};

/// Result of one decode attempt over input that may still grow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress<T> {
    /// The value was decoded and the cursor moved past it
    Complete(T),
    /// The buffered input ends inside the value; the cursor did not move
    NeedMore,
}

impl<T> Progress<T> {
    /// Whether more input is needed.
    pub const fn is_need_more(&self) -> bool {
        matches!(self, Progress::NeedMore)
    }

    /// The decoded value, if complete.
    pub fn complete(self) -> Option<T> {
        match self {
            Progress::Complete(value) => Some(value),
            Progress::NeedMore => None,
        }
    }
}

/// Decoder for the registered base type `B`.
///
/// Holds the family's tables, so repeated decodes skip the registry lookup.
pub struct Decoder<B> {
    family: Arc<Family>,
    decoders: Arc<Decoders<B>>,
}

impl<B> Clone for Decoder<B> {
    fn clone(&self) -> Self {
        Self {
            family: Arc::clone(&self.family),
            decoders: Arc::clone(&self.decoders),
        }
    }
}

impl<B> core::fmt::Debug for Decoder<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Decoder")
            .field("family", &self.family)
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// A decoder for the base type `B`, which must be registered.
    pub fn decoder<B: 'static>(&self) -> Result<Decoder<B>> {
        let family = self.family(TypeKey::of::<B>())?;
        let decoders = family.decoders::<B>()?;
        Ok(Decoder { family, decoders })
    }
}

impl<B: 'static> Decoder<B> {
    /// The registered family this decoder picks concrete types from.
    pub fn family(&self) -> &Family {
        &self.family
    }

    /// Decode one object at the cursor as the concrete type its
    /// discriminator names, and upcast it into `B`.
    ///
    /// The lookahead runs on a fork. The cursor only moves once the whole
    /// object has been decoded; on [`Progress::NeedMore`] and on errors it
    /// stays where it was.
    pub fn decode(&self, cursor: &mut TokenCursor<'_>) -> Result<Progress<B>> {
        let descriptor = self.family.descriptor();
        let mut lookahead = cursor.fork();

        let probed = probe(&mut lookahead, descriptor.property_name())?;
        let (ty, body) = match probed {
            Probe::NeedMore => return need_more(cursor),
            Probe::NotFound { object } => {
                // The probe already walked to the end of the object.
                let ty = self.resolve(cursor, Observed::Absent)?;
                (ty, (object, lookahead))
            }
            ref found => {
                let observed = found.observed().unwrap_or(Observed::Absent);
                let ty = self.resolve(cursor, observed)?;
                // The lookahead stopped right after the discriminator value.
                let object_start = cursor.fork().next_token()?.span.offset;
                match finish_object(&mut lookahead, object_start)? {
                    Skipped::Done(object) => (ty, (object, lookahead)),
                    Skipped::NeedMore => return need_more(cursor),
                }
            }
        };

        let (object, after) = body;
        let decode = self.decoders.get(ty).ok_or_else(|| {
            PolyError::config(ConfigError::NotDeclaredSubtype {
                ty,
                ancestor: descriptor.base(),
            })
        })?;
        let value = decode(&cursor.input()[object.offset..object.end()])
            .map_err(|err| PolyError::new(PolyErrorKind::Json(err), object))?;

        trace!(%ty, ?object, "decoded polymorphic object");
        cursor.commit(after);
        Ok(Progress::Complete(value))
    }

    fn resolve(&self, cursor: &TokenCursor<'_>, observed: Observed<'_>) -> Result<TypeKey> {
        self.family.resolve(observed).map_err(|err| match err.span {
            Some(_) => err,
            None => at_object(err, cursor),
        })
    }
}

/// Point a span-less error at the opening brace of the object.
fn at_object(mut err: PolyError, cursor: &TokenCursor<'_>) -> PolyError {
    if let Ok(open) = cursor.fork().next_token() {
        err.span = Some(open.span);
    }
    err
}

fn need_more<B>(cursor: &TokenCursor<'_>) -> Result<Progress<B>> {
    if cursor.is_final() {
        return Err(PolyError::new(
            PolyErrorKind::Protocol {
                expected: "end of object",
            },
            Span::new(cursor.input().len(), 0),
        ));
    }
    trace!(at = cursor.position(), "need more input");
    Ok(Progress::NeedMore)
}

/// Decode a `B` from a complete JSON document, using the process-wide
/// registry.
///
/// Only whitespace may follow the object.
pub fn from_slice<B: 'static>(input: &[u8]) -> Result<B> {
    from_slice_with(input, Registry::global(), &DecodeOptions::default())
}

/// Decode a `B` from a complete JSON document, using the process-wide
/// registry.
pub fn from_str<B: 'static>(input: &str) -> Result<B> {
    from_slice(input.as_bytes())
}

/// Decode a `B` from a complete JSON document with an explicit registry and
/// options.
pub fn from_slice_with<B: 'static>(
    input: &[u8],
    registry: &Registry,
    options: &DecodeOptions,
) -> Result<B> {
    let decoder = registry.decoder::<B>()?;
    let mut cursor = TokenCursor::new(input, true).with_max_depth(options.max_depth);

    let value = match decoder.decode(&mut cursor)? {
        Progress::Complete(value) => value,
        Progress::NeedMore => {
            return Err(PolyError::new(
                PolyErrorKind::Protocol {
                    expected: "end of object",
                },
                Span::new(input.len(), 0),
            ));
        }
    };

    let trailing = cursor.next_token()?;
    if trailing.token != Token::Eof {
        debug!(at = trailing.span.offset, "rejecting trailing characters");
        return Err(PolyError::syntax(SyntaxError::TrailingCharacters, trailing.span));
    }
    Ok(value)
}
