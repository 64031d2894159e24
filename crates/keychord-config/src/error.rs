use std::fmt;

use keychord_core::ComboError;
use miette::{Diagnostic, LabeledSpan, SourceSpan};
use thiserror::Error;

/// Position of a node or value in the bindings file
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SourceLocation {
    /// 1-indexed line
    pub line: usize,
    /// 1-indexed column
    pub column: usize,
    /// Byte offset into the source
    pub offset: usize,
    /// Byte length of the span
    pub len: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize, offset: usize, len: usize) -> Self {
        Self {
            line,
            column,
            offset,
            len,
        }
    }

    pub fn span(&self) -> SourceSpan {
        SourceSpan::from((self.offset, self.len))
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// An unrecognized key name found in a binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidKey {
    pub key: String,
    /// Keys of the binding the name appeared in, as written
    pub binding: String,
    pub location: SourceLocation,
}

impl InvalidKey {
    fn label(&self) -> LabeledSpan {
        LabeledSpan::new_with_span(
            Some(format!("unknown key \"{}\"", self.key)),
            self.location.span(),
        )
    }
}

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Failed to parse KDL")]
    #[diagnostic(code(keychord::config::parse_error))]
    ParseError {
        #[source_code]
        src: String,
        #[label("here")]
        span: SourceSpan,
        #[source]
        source: kdl::KdlError,
    },

    #[error("{} unrecognized key name(s) in bindings", .invalid_keys.len())]
    #[diagnostic(
        code(keychord::config::invalid_keys),
        help("Key names are lowercase, e.g. `ctrl`, `shift`, `a`, `f5`, `pageup`, `num_1`, `/`")
    )]
    InvalidKeys {
        #[source_code]
        src: String,
        #[label(collection)]
        labels: Vec<LabeledSpan>,
        invalid_keys: Vec<InvalidKey>,
    },

    #[error("Invalid value for `{node}`: {message}")]
    #[diagnostic(code(keychord::config::invalid_value))]
    InvalidValue {
        node: String,
        message: String,
        #[source_code]
        src: String,
        #[label("{message}")]
        span: SourceSpan,
    },

    #[error("Invalid combo '{keys}'")]
    #[diagnostic(code(keychord::config::invalid_combo))]
    InvalidCombo {
        keys: String,
        #[source_code]
        src: String,
        #[label("defined here")]
        span: SourceSpan,
        #[source]
        source: ComboError,
    },

    #[error("Missing required field: {field}")]
    #[diagnostic(code(keychord::config::missing_field))]
    MissingField {
        field: String,
        #[source_code]
        src: String,
        #[label("in this node")]
        span: SourceSpan,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub(crate) fn invalid_keys(src: &str, invalid_keys: Vec<InvalidKey>) -> Self {
        ConfigError::InvalidKeys {
            src: src.to_string(),
            labels: invalid_keys.iter().map(InvalidKey::label).collect(),
            invalid_keys,
        }
    }

    pub(crate) fn invalid_value(
        src: &str,
        node: &str,
        location: SourceLocation,
        message: impl Into<String>,
    ) -> Self {
        ConfigError::InvalidValue {
            node: node.to_string(),
            message: message.into(),
            src: src.to_string(),
            span: location.span(),
        }
    }
}
