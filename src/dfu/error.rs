//! Error types for firmware resolution and upload sessions.

use thiserror::Error;

/// Result type alias for upload operations.
pub type DfuResult<T> = Result<T, DfuError>;

/// Reasons a file is not a usable legacy firmware package.
///
/// Every variant means "not this format"; the resolver falls back to the
/// SUIT envelope parser on any of them.
#[derive(Debug, Error)]
pub enum PackageError {
    /// Content is neither a ZIP container nor an MCUboot image.
    #[error("Unrecognized package format")]
    UnrecognizedFormat,

    /// ZIP container error.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Error reading an entry out of the in-memory container.
    #[error("Corrupt package entry: {0}")]
    Corrupt(#[from] std::io::Error),

    /// JSON parsing error for manifest.json.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Required file missing from the package.
    #[error("Missing file in package: {filename}")]
    MissingFile { filename: String },

    /// Manifest parsed but its content is unusable.
    #[error("Invalid manifest: {reason}")]
    InvalidManifest { reason: String },

    /// MCUboot image header or TLV area is malformed.
    #[error("Invalid image {name}: {reason}")]
    InvalidImage { name: String, reason: String },

    /// MCUboot image carries no SHA-256 TLV.
    #[error("Image {name} has no SHA-256 hash")]
    MissingHash { name: String },

    /// Declared SHA-256 does not match the image content.
    #[error("Hash mismatch in image {name}")]
    HashMismatch { name: String },
}

/// Reasons a file is not a usable SUIT envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// CBOR decoding error.
    #[error("CBOR error: {0}")]
    Cbor(#[from] minicbor::decode::Error),

    /// CBOR is well formed but not a SUIT envelope.
    #[error("Not a SUIT envelope: {reason}")]
    NotAnEnvelope { reason: String },

    /// Envelope has no authentication wrapper.
    #[error("Envelope has no authentication wrapper")]
    MissingAuthentication,

    /// Envelope has no manifest.
    #[error("Envelope has no manifest")]
    MissingManifest,

    /// Authentication wrapper does not start with a digest.
    #[error("Envelope has no digest")]
    MissingDigest,
}

/// Errors surfaced by the upload session controller.
#[derive(Debug, Error)]
pub enum DfuError {
    /// The selected file could not be read at all.
    #[error("Unable to read {file}: {source}")]
    FileRead {
        file: String,
        #[source]
        source: std::io::Error,
    },

    /// The selected file matches neither supported container format.
    #[error("{file} is not a supported firmware file ({package}; {envelope})")]
    FormatParse {
        file: String,
        package: PackageError,
        envelope: EnvelopeError,
    },

    /// Envelope declares no digest algorithm this uploader supports.
    #[error("Envelope has no supported digest (declared: {declared:?})")]
    DigestUnsupported { declared: Vec<i64> },

    /// A package image was requested that does not exist.
    #[error("Image {index} out of range (package has {count} images)")]
    ImageOutOfRange { index: usize, count: usize },

    /// A command arrived in a state that does not accept it.
    #[error("Cannot {operation} while {state}")]
    SessionBusy {
        operation: &'static str,
        state: String,
    },

    /// Configuration text could not be parsed.
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// The uploader refused to start the transfer.
    #[error("Failed to start upload: {reason}")]
    TransportSubmit { reason: String },

    /// The uploader reported an error mid-transfer.
    #[error("Upload failed: {reason}")]
    TransportFailure { reason: String },
}

impl DfuError {
    /// Whether the error came from parsing the selected file.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, DfuError::FileRead { .. } | DfuError::FormatParse { .. })
    }

    /// Get a user-friendly error code for support purposes.
    pub fn error_code(&self) -> &'static str {
        match self {
            DfuError::FileRead { .. } => "UPL-001",
            DfuError::FormatParse { .. } => "UPL-010",
            DfuError::DigestUnsupported { .. } => "UPL-020",
            DfuError::ImageOutOfRange { .. } => "UPL-030",
            DfuError::SessionBusy { .. } => "UPL-031",
            DfuError::InvalidConfiguration { .. } => "UPL-040",
            DfuError::TransportSubmit { .. } => "UPL-050",
            DfuError::TransportFailure { .. } => "UPL-051",
        }
    }
}
