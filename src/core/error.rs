//! Error types for the streaming loader

use thiserror::Error;

/// Main error type for catalog ingestion and streaming
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(String),

    /// Malformed catalog node (missing required child, bad attribute value).
    #[error("Catalog error in <{node}>: {message}")]
    Catalog { node: String, message: String },

    /// A non-sector reference to a name that was never ingested.
    #[error("Unknown {kind} '{name}' referenced from '{from}'")]
    DanglingReference {
        kind: &'static str,
        name: String,
        from: String,
    },

    #[error("Duplicate {kind} '{name}' in sector '{sector}'")]
    DuplicateName {
        kind: &'static str,
        name: String,
        sector: String,
    },

    #[error("Unknown sector '{0}'")]
    UnknownSector(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Engine error: {0}")]
    Engine(String),
}

impl Error {
    /// Shorthand for a malformed-node error.
    pub fn catalog(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Catalog {
            node: node.into(),
            message: message.into(),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}
