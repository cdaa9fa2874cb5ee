use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    /// True if this error was caused by a cooperative abort rather than a
    /// fault.
    pub fn is_interrupted(&self) -> bool {
        matches!(self.kind(), ErrorKind::Interrupted { .. })
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error(ErrorKind::InvalidOperation { name: name.into() }.into())
    }

    pub fn unsupported(kind: impl Into<String>, criterion: impl Into<String>) -> Error {
        Error(
            ErrorKind::Unsupported {
                kind: kind.into(),
                criterion: criterion.into(),
            }
            .into(),
        )
    }

    pub fn not_found(what: impl Into<String>, name: impl Into<String>) -> Error {
        Error(
            ErrorKind::NotFound {
                what: what.into(),
                name: name.into(),
            }
            .into(),
        )
    }

    pub fn interrupted(context: impl Into<String>) -> Error {
        Error(
            ErrorKind::Interrupted {
                context: context.into(),
            }
            .into(),
        )
    }

    pub fn invalid_format(element: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidFormat {
                element: element.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    /// A criterion that exists but cannot be applied to the requested result
    /// kind (e.g. grouping documents by a hit-only criterion).
    #[error("criterion '{criterion}' is not supported for {kind} results")]
    Unsupported { kind: String, criterion: String },

    #[error("{what} '{name}' not found")]
    NotFound { what: String, name: String },

    /// Cooperative abort observed at a batch boundary. Never a data fault.
    #[error("operation interrupted during {context}")]
    Interrupted { context: String },

    #[error("invalid stored data for '{element}': {message}")]
    InvalidFormat { element: String, message: String },

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(_: std::convert::Infallible) -> Self {
        Error::invalid_operation("conversion")
    }
}
