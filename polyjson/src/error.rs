//! Error types for polymorphic decoding and encoding.

use core::fmt::{self, Display};

use crate::registry::TypeKey;
use crate::scanner::{ScanError, ScanErrorKind, Span};

/// Error type for everything this crate does.
#[derive(Debug)]
pub struct PolyError {
    /// The specific kind of error
    pub kind: PolyErrorKind,
    /// Source span where the error occurred, if it points into the input
    pub span: Option<Span>,
}

impl Display for PolyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(span) = self.span {
            write!(f, " at offset {}", span.offset)?;
        }
        Ok(())
    }
}

impl std::error::Error for PolyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            PolyErrorKind::Json(e) => Some(e),
            PolyErrorKind::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl PolyError {
    /// Create a new error with span information
    pub const fn new(kind: PolyErrorKind, span: Span) -> Self {
        PolyError {
            kind,
            span: Some(span),
        }
    }

    /// Create an error without span information
    pub const fn without_span(kind: PolyErrorKind) -> Self {
        PolyError { kind, span: None }
    }

    pub(crate) fn config(err: ConfigError) -> Self {
        Self::without_span(PolyErrorKind::Configuration(err))
    }

    pub(crate) fn syntax(err: SyntaxError, span: Span) -> Self {
        Self::new(PolyErrorKind::Syntax(err), span)
    }

    /// Move the span (if any) `by` bytes to the right.
    ///
    /// Streaming decoders discard consumed input, so spans produced against
    /// the current buffer window are rebased to absolute stream offsets.
    pub fn shifted(mut self, by: usize) -> Self {
        self.span = self.span.map(|span| span.shifted(by));
        self
    }

    /// True for invalid registrations and lookups of unregistered types.
    pub const fn is_configuration(&self) -> bool {
        matches!(self.kind, PolyErrorKind::Configuration(_))
    }

    /// True when the discriminator value itself was the problem.
    pub const fn is_discriminator(&self) -> bool {
        matches!(self.kind, PolyErrorKind::Discriminator(_))
    }

    /// True when final input ended before an object was complete.
    pub const fn is_protocol(&self) -> bool {
        matches!(self.kind, PolyErrorKind::Protocol { .. })
    }
}

/// Specific error kinds.
#[derive(Debug)]
pub enum PolyErrorKind {
    /// Invalid registration or a type the registry knows nothing about
    Configuration(ConfigError),
    /// The discriminator was found but cannot be used
    Discriminator(DiscriminatorError),
    /// Input ended for good before the value was complete
    Protocol {
        /// What was being read when the input ran out
        expected: &'static str,
    },
    /// Malformed JSON seen by the lookahead scanner
    Syntax(SyntaxError),
    /// The concrete type's own (de)serialization failed
    Json(serde_json::Error),
    /// Reading from the underlying reader failed
    Io(std::io::Error),
}

impl Display for PolyErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolyErrorKind::Configuration(e) => write!(f, "configuration error: {e}"),
            PolyErrorKind::Discriminator(e) => write!(f, "discriminator error: {e}"),
            PolyErrorKind::Protocol { expected } => {
                write!(f, "input ended unexpectedly, expected {expected}")
            }
            PolyErrorKind::Syntax(e) => write!(f, "syntax error: {e}"),
            PolyErrorKind::Json(e) => write!(f, "json error: {e}"),
            PolyErrorKind::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl PolyErrorKind {
    /// Get an error code for this kind of error.
    pub const fn code(&self) -> &'static str {
        match self {
            PolyErrorKind::Configuration(_) => "polyjson::configuration",
            PolyErrorKind::Discriminator(_) => "polyjson::discriminator",
            PolyErrorKind::Protocol { .. } => "polyjson::protocol",
            PolyErrorKind::Syntax(_) => "polyjson::syntax",
            PolyErrorKind::Json(_) => "polyjson::json",
            PolyErrorKind::Io(_) => "polyjson::io",
        }
    }

    /// Get a label describing what the span points to.
    pub fn label(&self) -> String {
        match self {
            PolyErrorKind::Configuration(_) => "configuration error".into(),
            PolyErrorKind::Discriminator(DiscriminatorError::Unmapped { value, .. }) => {
                format!("unmapped discriminator {value:?}")
            }
            PolyErrorKind::Discriminator(DiscriminatorError::InvalidType { got, .. }) => {
                format!("expected string or null, got {got}")
            }
            PolyErrorKind::Discriminator(DiscriminatorError::NullWithoutFallback { .. }) => {
                "null discriminator".into()
            }
            PolyErrorKind::Protocol { expected } => format!("expected {expected}"),
            PolyErrorKind::Syntax(e) => e.to_string(),
            PolyErrorKind::Json(_) => "while decoding this object".into(),
            PolyErrorKind::Io(_) => "I/O error".into(),
        }
    }
}

/// Invalid registrations and failed type lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The discriminator property name is empty
    EmptyPropertyName {
        /// The base type being registered
        base: TypeKey,
    },
    /// A fallback type or subtype is the base type itself
    SelfReference {
        /// The base type being registered
        base: TypeKey,
        /// Which slot named the base type (`"default type"`, `"subtype"`, ...)
        role: &'static str,
    },
    /// Two subtypes share a discriminator value
    DuplicateValue {
        /// The base type being registered
        base: TypeKey,
        /// The repeated discriminator value
        value: String,
    },
    /// The base type was registered before
    AlreadyRegistered {
        /// The base type
        base: TypeKey,
    },
    /// The base type was never registered
    NotRegistered {
        /// The base type
        base: TypeKey,
    },
    /// A type would get two different parents in the hierarchy table
    ParentConflict {
        /// The child type
        child: TypeKey,
        /// The parent already on record
        existing: TypeKey,
        /// The parent that was requested now
        requested: TypeKey,
    },
    /// A parent link would close a cycle
    HierarchyCycle {
        /// The type where the cycle was detected
        child: TypeKey,
    },
    /// No discriminator and neither an undefined nor a default type
    NoFallbackForAbsent {
        /// The base type
        base: TypeKey,
        /// The discriminator property name
        property: String,
    },
    /// Neither the type nor any of its ancestors is a registered base type
    NoMarkedAncestor {
        /// The type being looked up
        ty: TypeKey,
    },
    /// The nearest registered ancestor does not list the type
    NotDeclaredSubtype {
        /// The type being looked up
        ty: TypeKey,
        /// Its nearest registered ancestor
        ancestor: TypeKey,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyPropertyName { base } => {
                write!(f, "the discriminator property name of {base} must not be empty")
            }
            ConfigError::SelfReference { base, role } => {
                write!(f, "{base} cannot be its own {role}")
            }
            ConfigError::DuplicateValue { base, value } => {
                write!(f, "discriminator value {value:?} is declared twice on {base}")
            }
            ConfigError::AlreadyRegistered { base } => {
                write!(f, "{base} is already registered")
            }
            ConfigError::NotRegistered { base } => {
                write!(f, "{base} is not a registered polymorphic base type")
            }
            ConfigError::ParentConflict {
                child,
                existing,
                requested,
            } => write!(
                f,
                "{child} already derives from {existing} and cannot also derive from {requested}"
            ),
            ConfigError::HierarchyCycle { child } => {
                write!(f, "the type hierarchy of {child} contains a cycle")
            }
            ConfigError::NoFallbackForAbsent { base, property } => write!(
                f,
                "discriminator property {property:?} was not found and {base} has no default type"
            ),
            ConfigError::NoMarkedAncestor { ty } => write!(
                f,
                "neither {ty} nor any of its ancestors is a registered polymorphic base type"
            ),
            ConfigError::NotDeclaredSubtype { ty, ancestor } => {
                write!(f, "{ty} is not a declared subtype of {ancestor}")
            }
        }
    }
}

/// Problems with a discriminator value found in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscriminatorError {
    /// The value is not mapped and there is no unknown or default type
    Unmapped {
        /// The base type
        base: TypeKey,
        /// The discriminator value that was read
        value: String,
    },
    /// The property holds something other than a string or null
    InvalidType {
        /// The discriminator property name
        property: String,
        /// The JSON type that was found
        got: &'static str,
    },
    /// The property is `null` and the base type has no fallback for it
    NullWithoutFallback {
        /// The base type
        base: TypeKey,
        /// The discriminator property name
        property: String,
    },
}

impl Display for DiscriminatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscriminatorError::Unmapped { base, value } => {
                write!(f, "{value:?} is not a valid discriminator value for {base}")
            }
            DiscriminatorError::InvalidType { property, got } => write!(
                f,
                "expected a string discriminator in {property:?}, got {got}"
            ),
            DiscriminatorError::NullWithoutFallback { base, property } => write!(
                f,
                "discriminator property {property:?} is null and {base} has no default type"
            ),
        }
    }
}

/// Malformed input found by the lookahead scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    /// Scanner-level error
    Scan(ScanErrorKind),
    /// A token that does not fit the grammar at this point
    UnexpectedToken {
        /// The token that was found
        got: &'static str,
        /// What was expected instead
        expected: &'static str,
    },
    /// Nesting deeper than the configured limit
    DepthLimitExceeded {
        /// The configured limit
        max_depth: usize,
    },
    /// A string that is not valid UTF-8 or has a broken escape
    InvalidString,
    /// Non-whitespace input after the value
    TrailingCharacters,
}

impl Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxError::Scan(e) => write!(f, "{e}"),
            SyntaxError::UnexpectedToken { got, expected } => {
                write!(f, "unexpected {got}, expected {expected}")
            }
            SyntaxError::DepthLimitExceeded { max_depth } => {
                write!(f, "nesting deeper than {max_depth} levels")
            }
            SyntaxError::InvalidString => write!(f, "invalid string"),
            SyntaxError::TrailingCharacters => write!(f, "trailing characters"),
        }
    }
}

impl From<ScanError> for PolyError {
    fn from(err: ScanError) -> Self {
        let kind = match err.kind {
            ScanErrorKind::UnexpectedEof(ctx) => PolyErrorKind::Protocol {
                expected: match ctx {
                    "in string" => "end of string",
                    "in number" => "end of number",
                    _ => "end of literal",
                },
            },
            other => PolyErrorKind::Syntax(SyntaxError::Scan(other)),
        };
        PolyError::new(kind, err.span)
    }
}

impl From<serde_json::Error> for PolyError {
    fn from(err: serde_json::Error) -> Self {
        PolyError::without_span(PolyErrorKind::Json(err))
    }
}

impl From<std::io::Error> for PolyError {
    fn from(err: std::io::Error) -> Self {
        PolyError::without_span(PolyErrorKind::Io(err))
    }
}

impl miette::Diagnostic for PolyError {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new(self.kind.code()))
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        let span = self.span?;
        Some(Box::new(std::iter::once(miette::LabeledSpan::at(
            span,
            self.kind.label(),
        ))))
    }
}

/// Result type for this crate
pub type Result<T> = core::result::Result<T, PolyError>;
