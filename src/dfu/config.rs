//! Configuration constants and the user-tunable upload configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DfuError;

// ============================================================================
// MCUboot Image Format
// ============================================================================

/// Magic number at the start of every MCUboot image header (little endian).
pub const IMAGE_MAGIC: u32 = 0x96F3_B83D;

/// Size of the fixed MCUboot image header in bytes.
pub const IMAGE_HEADER_SIZE: usize = 32;

/// Magic of the unprotected TLV info block.
pub const IMAGE_TLV_INFO_MAGIC: u16 = 0x6907;

/// Magic of the protected TLV info block.
pub const IMAGE_TLV_PROT_INFO_MAGIC: u16 = 0x6908;

/// Size of a TLV info block header (magic + total length).
pub const IMAGE_TLV_INFO_SIZE: usize = 4;

/// Size of a single TLV entry header (type + length).
pub const IMAGE_TLV_ENTRY_SIZE: usize = 4;

/// TLV type carrying the SHA-256 of header, body and protected TLVs.
pub const IMAGE_TLV_SHA256: u16 = 0x10;

/// Length of a SHA-256 digest.
pub const SHA256_LEN: usize = 32;

// ============================================================================
// Package Container
// ============================================================================

/// ZIP local file header signature.
pub const ZIP_LOCAL_HEADER_MAGIC: &[u8] = b"PK\x03\x04";

/// ZIP end of central directory signature (empty archive).
pub const ZIP_EMPTY_ARCHIVE_MAGIC: &[u8] = b"PK\x05\x06";

/// Name of the package manifest inside the ZIP container.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

// ============================================================================
// SUIT Envelope
// ============================================================================

/// CBOR tag identifying a SUIT envelope.
pub const SUIT_ENVELOPE_TAG: u64 = 107;

/// Envelope map key of the authentication wrapper.
pub const SUIT_AUTHENTICATION_WRAPPER: i64 = 2;

/// Envelope map key of the manifest.
pub const SUIT_MANIFEST: i64 = 3;

/// Manifest map key of the sequence number.
pub const SUIT_MANIFEST_SEQUENCE_NUMBER: i64 = 2;

/// COSE digest algorithms a SUIT envelope may declare.
///
/// Only SHA-256 is supported for upload. The remaining identifiers are
/// optional in SUIT and recognized so they can be reported by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum CoseAlgorithm {
    Sha256 = -16,
    Shake128 = -18,
    Sha384 = -43,
    Sha512 = -44,
    Shake256 = -45,
}

impl CoseAlgorithm {
    /// Look up a COSE algorithm by its numeric identifier.
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            -16 => Some(CoseAlgorithm::Sha256),
            -18 => Some(CoseAlgorithm::Shake128),
            -43 => Some(CoseAlgorithm::Sha384),
            -44 => Some(CoseAlgorithm::Sha512),
            -45 => Some(CoseAlgorithm::Shake256),
            _ => None,
        }
    }

    pub fn id(self) -> i64 {
        self as i64
    }

    pub fn is_supported(self) -> bool {
        self == CoseAlgorithm::Sha256
    }

    pub fn name(self) -> &'static str {
        match self {
            CoseAlgorithm::Sha256 => "SHA-256",
            CoseAlgorithm::Shake128 => "SHAKE128",
            CoseAlgorithm::Sha384 => "SHA-384",
            CoseAlgorithm::Sha512 => "SHA-512",
            CoseAlgorithm::Shake256 => "SHAKE256",
        }
    }
}

// ============================================================================
// Upload Configuration
// ============================================================================

/// Buffer counts offered to the user. The first one means "no pipelining".
pub const BUFFER_COUNT_CHOICES: &[u32] = &[2, 3, 4, 5, 6, 7, 8];

/// Default pipeline depth: a single chunk in flight.
pub const DEFAULT_PIPELINE_DEPTH: u32 = 1;

/// Byte alignment applied to transferred chunk boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ByteAlignment {
    #[default]
    Disabled,
    TwoByte,
    FourByte,
    EightByte,
    SixteenByte,
}

impl ByteAlignment {
    pub const ALL: [ByteAlignment; 5] = [
        ByteAlignment::Disabled,
        ByteAlignment::TwoByte,
        ByteAlignment::FourByte,
        ByteAlignment::EightByte,
        ByteAlignment::SixteenByte,
    ];

    /// Alignment in bytes, 0 when disabled.
    pub fn bytes(self) -> u64 {
        match self {
            ByteAlignment::Disabled => 0,
            ByteAlignment::TwoByte => 2,
            ByteAlignment::FourByte => 4,
            ByteAlignment::EightByte => 8,
            ByteAlignment::SixteenByte => 16,
        }
    }
}

impl fmt::Display for ByteAlignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteAlignment::Disabled => f.write_str("Disabled"),
            other => write!(f, "{}-byte", other.bytes()),
        }
    }
}

impl FromStr for ByteAlignment {
    type Err = DfuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_ascii_lowercase();
        let value = value.trim_end_matches("-byte");
        match value {
            "disabled" | "0" => Ok(ByteAlignment::Disabled),
            "2" => Ok(ByteAlignment::TwoByte),
            "4" => Ok(ByteAlignment::FourByte),
            "8" => Ok(ByteAlignment::EightByte),
            "16" => Ok(ByteAlignment::SixteenByte),
            _ => Err(DfuError::InvalidConfiguration {
                reason: format!("unsupported byte alignment '{}'", s),
            }),
        }
    }
}

/// Settings handed to the uploader when a session starts.
///
/// No cross-field validation happens here; the uploader decides whether a
/// combination is usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadConfiguration {
    /// Number of in-flight chunks minus one. 0 and 1 both mean no pipelining.
    pub pipeline_depth: u32,
    pub byte_alignment: ByteAlignment,
    /// Reassembly buffer (chunk) size. 0 defers to the transport's MTU.
    pub reassembly_buffer_size: u64,
}

impl Default for UploadConfiguration {
    fn default() -> Self {
        Self {
            pipeline_depth: DEFAULT_PIPELINE_DEPTH,
            byte_alignment: ByteAlignment::Disabled,
            reassembly_buffer_size: 0,
        }
    }
}

impl UploadConfiguration {
    pub fn set_pipeline_depth(&mut self, depth: u32) {
        self.pipeline_depth = depth;
    }

    /// Apply a buffer count picked from [`BUFFER_COUNT_CHOICES`].
    ///
    /// The smallest choice disables pipelining (depth 0); any other count
    /// `n` allows `n - 1` chunks in flight.
    pub fn set_buffer_count(&mut self, buffers: u32) {
        self.pipeline_depth = if buffers <= BUFFER_COUNT_CHOICES[0] {
            0
        } else {
            buffers - 1
        };
    }

    pub fn set_byte_alignment(&mut self, alignment: ByteAlignment) {
        self.byte_alignment = alignment;
    }

    pub fn set_reassembly_buffer_size(&mut self, size: u64) {
        self.reassembly_buffer_size = size;
    }

    /// Set the chunk size from free-form user input.
    ///
    /// Anything that does not parse as an unsigned integer becomes 0.
    pub fn set_chunk_size(&mut self, input: &str) {
        self.set_reassembly_buffer_size(input.trim().parse().unwrap_or(0));
    }

    pub fn is_pipelining_enabled(&self) -> bool {
        self.pipeline_depth > 1
    }

    /// Label for the number-of-buffers setting.
    pub fn buffers_label(&self) -> String {
        if self.is_pipelining_enabled() {
            (self.pipeline_depth + 1).to_string()
        } else {
            "Disabled".to_string()
        }
    }

    pub fn alignment_label(&self) -> String {
        self.byte_alignment.to_string()
    }

    pub fn chunk_size_label(&self) -> String {
        self.reassembly_buffer_size.to_string()
    }
}
