//! Encoding polymorphic values.
//!
//! A value is written through its own runtime type's `Serialize`; the
//! discriminator is an ordinary field of that type (see [`Tag`](crate::Tag)).
//! Nothing here inspects or buffers the output.

use std::io::Write;

use serde::Serialize;

use crate::error::{PolyError, PolyErrorKind, Result};

fn json(err: serde_json::Error) -> PolyError {
    if err.is_io() {
        PolyError::without_span(PolyErrorKind::Io(err.into()))
    } else {
        PolyError::without_span(PolyErrorKind::Json(err))
    }
}

/// Serialize a value to a JSON string.
pub fn to_string<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(json)
}

/// Serialize a value to an indented JSON string.
pub fn to_string_pretty<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(json)
}

/// Serialize a value to JSON bytes.
pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(json)
}

/// Serialize a value as JSON into a writer.
pub fn to_writer<W: Write, T: Serialize + ?Sized>(writer: W, value: &T) -> Result<()> {
    serde_json::to_writer(writer, value).map_err(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct Full;

    impl Write for Full {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writer_errors_are_io() {
        polyjson_testhelpers::setup();
        let err = to_writer(Full, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err.kind, PolyErrorKind::Io(_)), "{err}");
    }

    #[test]
    fn test_plain_values_pass_through() {
        polyjson_testhelpers::setup();
        assert_eq!(to_string(&vec![Some(1), None]).unwrap(), "[1,null]");
        assert_eq!(to_vec("hi").unwrap(), br#""hi""#);
    }
}
