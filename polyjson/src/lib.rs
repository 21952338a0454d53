#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

/// Trace-level logging macro that forwards to `tracing::trace!` when the `tracing` feature is enabled.
#[cfg(feature = "tracing")]
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => {
        ::tracing::trace!($($arg)*)
    };
}

/// Trace-level logging macro (no-op when `tracing` feature is disabled).
#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

/// Debug-level logging macro that forwards to `tracing::debug!` when the `tracing` feature is enabled.
#[cfg(feature = "tracing")]
#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => {
        ::tracing::debug!($($arg)*)
    };
}

/// Debug-level logging macro (no-op when `tracing` feature is disabled).
#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => {};
}

#[allow(unused_imports)]
pub(crate) use debug;
#[allow(unused_imports)]
pub(crate) use trace;

mod cursor;
mod deserialize;
mod discriminator;
mod error;
mod options;
mod probe;
mod registry;
mod scan_buffer;
mod scanner;
mod serialize;
mod snapshot;
mod stream;
mod tag;

pub use cursor::{Skipped, TokenCursor};
pub use deserialize::{Decoder, Progress, from_slice, from_slice_with, from_str};
pub use discriminator::{DiscriminatorValue, discriminator_value};
pub use error::{
    ConfigError, DiscriminatorError, PolyError, PolyErrorKind, Result, SyntaxError,
};
pub use options::{DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_DEPTH, DecodeOptions};
pub use probe::{Probe, probe};
pub use registry::{
    BaseType, BaseTypeDescriptor, Family, Observed, Registry, SubtypeMapping, TypeKey, register,
};
pub use scan_buffer::ScanBuffer;
pub use scanner::{ScanError, ScanErrorKind, Span, SpannedToken, Token};
pub use serialize::{to_string, to_string_pretty, to_vec, to_writer};
pub use stream::{StreamDeserializer, from_reader};
pub use tag::Tag;
