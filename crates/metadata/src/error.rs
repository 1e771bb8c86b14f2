//! Metadata Error Types

use derive_more::{Display, Error};

/// A metadata error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for metadata operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No parser (native or plugin) is registered for this extension.
    #[display("no parser registered for extension: {_0}")]
    UnsupportedExtension(#[error(not(source))] String),
    /// A plugin tried to claim an extension that is natively supported.
    #[display("extension is reserved for a native parser: {_0}")]
    ReservedExtension(#[error(not(source))] String),
    /// The file content does not match the MIME types the plugin declared.
    #[display("expected one of [{}], found {found}", expected.join(", "))]
    MimeMismatch {
        /// MIME types the plugin accepts.
        expected: Vec<String>,
        /// MIME type sniffed from the content.
        found: String,
    },
    /// The file could not be parsed into metadata.
    #[display("failed to parse metadata: {_0}")]
    Parse(#[error(not(source))] String),
    /// A plugin (parser, converter or enricher) failed.
    #[display("plugin {plugin} failed")]
    Plugin {
        /// Plugin identity, as `scope/id`.
        plugin: String,
    },
    /// A sidecar document is not valid JSON or has an unsupported version.
    #[display("invalid sidecar document")]
    InvalidSidecar,
    /// A value could not be serialized.
    #[display("failed to serialize {_0}")]
    Serialize(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Plugins run in an external host that may recover, everything else
        // is a property of the bytes on disk.
        matches!(self, ErrorKind::Plugin { .. })
    }
}
