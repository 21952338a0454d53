//! Lookahead for the discriminator property of an object.
//!
//! The probe walks the top-level members of one object in a single forward
//! pass. Member values that are not the discriminator are skipped whole, so
//! the discriminator may appear anywhere among its siblings.

use std::borrow::Cow;

use crate::cursor::{Skipped, TokenCursor, unexpected};
use crate::error::{DiscriminatorError, PolyError, PolyErrorKind, Result};
use crate::registry::Observed;
use crate::scanner::{Span, Token};
use crate::trace;

/// What the lookahead found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<'a> {
    /// The discriminator holds this string
    Found(Cow<'a, str>),
    /// The discriminator is present and `null`
    FoundNull,
    /// The object has no discriminator; `object` spans the whole object
    NotFound {
        /// The complete object, braces included
        object: Span,
    },
    /// The input ended inside the object before the question was settled
    NeedMore,
}

impl Probe<'_> {
    /// The observation the registry resolves a concrete type from.
    ///
    /// `None` for [`Probe::NeedMore`].
    pub fn observed(&self) -> Option<Observed<'_>> {
        match self {
            Probe::Found(value) => Some(Observed::Value(&**value)),
            Probe::FoundNull => Some(Observed::Null),
            Probe::NotFound { .. } => Some(Observed::Absent),
            Probe::NeedMore => None,
        }
    }
}

/// Look for `property` among the top-level members of the object at the
/// cursor.
///
/// The cursor is expected to be a fork: it is left wherever the probe
/// stopped, which is of no use to the caller except after
/// [`Probe::NotFound`], where it sits right after the object.
pub fn probe<'a>(cursor: &mut TokenCursor<'a>, property: &str) -> Result<Probe<'a>> {
    macro_rules! next {
        () => {{
            let spanned = cursor.next_token()?;
            if spanned.token == Token::NeedMore {
                trace!(at = cursor.position(), "probe ran out of input");
                return Ok(Probe::NeedMore);
            }
            spanned
        }};
    }

    let open = next!();
    if open.token != Token::ObjectStart {
        return Err(unexpected(open, "'{'"));
    }
    let object_start = open.span.offset;

    let mut first = true;
    loop {
        let key = next!();
        match key.token {
            Token::ObjectEnd if first => {
                return Ok(not_found(cursor, object_start));
            }
            Token::String { .. } => {}
            _ if first => return Err(unexpected(key, "property name or '}'")),
            _ => return Err(unexpected(key, "property name")),
        }
        first = false;

        let colon = next!();
        if colon.token != Token::Colon {
            return Err(unexpected(colon, "':'"));
        }

        if cursor.str_eq(&key, property)? {
            let value = next!();
            return match value.token {
                Token::String { .. } => {
                    let found = cursor.read_str(&value)?;
                    trace!(property, value = %found, "discriminator found");
                    Ok(Probe::Found(found))
                }
                Token::Null => Ok(Probe::FoundNull),
                Token::Eof | Token::ObjectEnd | Token::ArrayEnd | Token::Colon | Token::Comma => {
                    Err(unexpected(value, "value"))
                }
                other => Err(PolyError::new(
                    PolyErrorKind::Discriminator(DiscriminatorError::InvalidType {
                        property: property.to_owned(),
                        got: json_type(other),
                    }),
                    value.span,
                )),
            };
        }

        if cursor.skip_value()? == Skipped::NeedMore {
            return Ok(Probe::NeedMore);
        }

        let separator = next!();
        match separator.token {
            Token::Comma => {}
            Token::ObjectEnd => return Ok(not_found(cursor, object_start)),
            _ => return Err(unexpected(separator, "',' or '}'")),
        }
    }
}

/// Walk the rest of an object to its closing brace, starting right after
/// one of its member values.
///
/// `object_start` is the offset of the object's `{`; the returned span covers
/// the whole object. On [`Skipped::NeedMore`] the cursor may have moved and
/// should be dropped.
pub(crate) fn finish_object(
    cursor: &mut TokenCursor<'_>,
    object_start: usize,
) -> Result<Skipped> {
    macro_rules! next {
        () => {{
            let spanned = cursor.next_token()?;
            if spanned.token == Token::NeedMore {
                return Ok(Skipped::NeedMore);
            }
            spanned
        }};
    }

    loop {
        let separator = next!();
        match separator.token {
            Token::Comma => {}
            Token::ObjectEnd => {
                let object = Span::new(object_start, cursor.position() - object_start);
                return Ok(Skipped::Done(object));
            }
            _ => return Err(unexpected(separator, "',' or '}'")),
        }

        let key = next!();
        if !matches!(key.token, Token::String { .. }) {
            return Err(unexpected(key, "property name"));
        }
        let colon = next!();
        if colon.token != Token::Colon {
            return Err(unexpected(colon, "':'"));
        }
        if cursor.skip_value()? == Skipped::NeedMore {
            return Ok(Skipped::NeedMore);
        }
    }
}

fn not_found(cursor: &TokenCursor<'_>, object_start: usize) -> Probe<'static> {
    let object = Span::new(object_start, cursor.position() - object_start);
    trace!(?object, "object has no discriminator");
    Probe::NotFound { object }
}

fn json_type(token: Token) -> &'static str {
    match token {
        Token::ObjectStart => "object",
        Token::ArrayStart => "array",
        Token::True | Token::False => "boolean",
        Token::Number { .. } => "number",
        other => other.describe(),
    }
}
