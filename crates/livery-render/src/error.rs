//! Error types for compiling and rendering.
//!
//! Three error types cover the three phases a response goes through:
//!
//! - [`ConfigError`]: loading [`Options`](crate::Options) from a config file.
//! - [`CompileError`]: building a [`TemplateSet`](crate::TemplateSet) at
//!   startup (or per request in development). Callers decide whether this
//!   aborts the process.
//! - [`RenderError`]: a single render call. The HTTP layer turns these into
//!   a 500 response whose body is the error text.

use std::io;
use std::path::PathBuf;

/// Error type for a single render or serialization call.
///
/// Wraps the underlying engine and serializer errors as text so the public
/// API does not leak their types.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Template syntax or runtime error (including `yield` without a layout).
    #[error("template error: {0}")]
    Template(String),

    /// No template with the requested name.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// The value could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error while writing rendered output.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Other operational error.
    #[error("{0}")]
    Operation(String),
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        RenderError::Serialization(err.to_string())
    }
}

impl From<quick_xml::DeError> for RenderError {
    fn from(err: quick_xml::DeError) -> Self {
        RenderError::Serialization(err.to_string())
    }
}

impl From<minijinja::Error> for RenderError {
    fn from(err: minijinja::Error) -> Self {
        use minijinja::ErrorKind;

        match err.kind() {
            ErrorKind::TemplateNotFound => RenderError::TemplateNotFound(err.to_string()),
            ErrorKind::BadSerialization => RenderError::Serialization(err.to_string()),
            ErrorKind::WriteFailure => RenderError::Operation(err.to_string()),
            _ => RenderError::Template(err.to_string()),
        }
    }
}

/// Error type for building a template set.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// A template file matched but could not be read.
    #[error("failed to read template {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A template failed to parse.
    #[error("failed to parse template \"{name}\" ({}): {source}", path.display())]
    Parse {
        name: String,
        path: PathBuf,
        #[source]
        source: minijinja::Error,
    },

    /// Walking the template directory failed.
    #[error("failed to walk template directory {}: {source}", root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// The configured delimiters are not a valid syntax.
    #[error("invalid template delimiters: {0}")]
    Syntax(#[source] minijinja::Error),

    /// A configured content type or charset is not a valid header value.
    #[error("invalid header value: {0:?}")]
    InvalidHeader(String),
}

/// Error type for loading options from configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
