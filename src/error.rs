use thiserror::Error;

/// Errors raised by [`Library`](crate::Library) operations.
///
/// `Open` and `SymbolNotFound` display the loader's own diagnostic string,
/// unmodified.
#[derive(Debug, Error)]
pub enum Error {
    /// The OS loader failed to map the requested library.
    #[error("{message}")]
    Open {
        name: Option<String>,
        message: String,
    },

    /// The requested symbol is not exported by the open library.
    #[error("{message}")]
    SymbolNotFound {
        symbol: String,
        message: String,
    },

    /// A lookup was attempted after `close()`.
    #[error("library {} is closed", .name.as_deref().unwrap_or("<current process>"))]
    Closed { name: Option<String> },

    /// The platform identifier is not in the suffix table.
    #[error("Platform {0} is not supported")]
    UnknownPlatform(String),
}

impl Error {
    /// The loader-provided diagnostic, if this error carries one.
    pub fn message(&self) -> Option<&str> {
        match self {
            Error::Open { message, .. } | Error::SymbolNotFound { message, .. } => Some(message),
            Error::Closed { .. } | Error::UnknownPlatform(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_displays_loader_message() {
        let e = Error::Open {
            name: Some("libmissing.so".to_string()),
            message: "libmissing.so: cannot open shared object file".to_string(),
        };
        assert_eq!(e.to_string(), "libmissing.so: cannot open shared object file");
        assert_eq!(e.message(), Some("libmissing.so: cannot open shared object file"));
    }

    #[test]
    fn closed_names_the_current_process() {
        let e = Error::Closed { name: None };
        assert_eq!(e.to_string(), "library <current process> is closed");
        assert_eq!(e.message(), None);
    }
}
