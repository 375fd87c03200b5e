//! MCUboot image parsing.
//!
//! An MCUboot image is laid out as:
//! - 32-byte header (magic, load address, header size, sizes, flags, version)
//! - image body (`img_size` bytes, starting at `hdr_size`)
//! - optional protected TLV area (`protect_tlv_size` bytes, magic 0x6908)
//! - TLV area (magic 0x6907) holding, among others, the SHA-256 entry
//!
//! The SHA-256 covers the header, the body and the protected TLV area.

use sha2::{Digest, Sha256};

use super::config::{
    IMAGE_HEADER_SIZE, IMAGE_MAGIC, IMAGE_TLV_ENTRY_SIZE, IMAGE_TLV_INFO_MAGIC,
    IMAGE_TLV_INFO_SIZE, IMAGE_TLV_PROT_INFO_MAGIC, IMAGE_TLV_SHA256, SHA256_LEN,
};
use super::error::PackageError;

/// A single image ready to hand to the uploader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescriptor {
    /// Target image slot on the device.
    pub index: u32,
    /// Digest the device uses to verify the image.
    pub expected_hash: Vec<u8>,
    /// Raw bytes to transfer.
    pub payload: Vec<u8>,
}

/// Image version from the MCUboot header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageVersion {
    pub major: u8,
    pub minor: u8,
    pub revision: u16,
    pub build: u32,
}

impl std::fmt::Display for ImageVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}+{}",
            self.major, self.minor, self.revision, self.build
        )
    }
}

/// Parsed MCUboot image header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeader {
    pub load_address: u32,
    pub header_size: u16,
    pub protected_tlv_size: u16,
    pub image_size: u32,
    pub flags: u32,
    pub version: ImageVersion,
}

/// A validated MCUboot image.
#[derive(Debug, Clone)]
pub struct McuBootImage {
    pub header: ImageHeader,
    /// SHA-256 declared in the TLV area, verified against the content.
    pub hash: Vec<u8>,
}

/// Whether `data` begins with the MCUboot image magic.
pub fn has_image_magic(data: &[u8]) -> bool {
    read_u32(data, 0) == Some(IMAGE_MAGIC)
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

impl McuBootImage {
    /// Parse and verify an MCUboot image.
    ///
    /// # Arguments
    /// * `name` - Name used in error messages
    /// * `data` - Complete image file contents
    pub fn parse(name: &str, data: &[u8]) -> Result<Self, PackageError> {
        let invalid = |reason: &str| PackageError::InvalidImage {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if data.len() < IMAGE_HEADER_SIZE {
            return Err(invalid("shorter than the image header"));
        }
        if !has_image_magic(data) {
            return Err(invalid("bad image magic"));
        }

        // Bounds were checked above, the header fields are always present.
        let header = ImageHeader {
            load_address: read_u32(data, 4).unwrap_or_default(),
            header_size: read_u16(data, 8).unwrap_or_default(),
            protected_tlv_size: read_u16(data, 10).unwrap_or_default(),
            image_size: read_u32(data, 12).unwrap_or_default(),
            flags: read_u32(data, 16).unwrap_or_default(),
            version: ImageVersion {
                major: data[20],
                minor: data[21],
                revision: read_u16(data, 22).unwrap_or_default(),
                build: read_u32(data, 24).unwrap_or_default(),
            },
        };

        if (header.header_size as usize) < IMAGE_HEADER_SIZE {
            return Err(invalid("header size smaller than the fixed header"));
        }

        let body_end = header.header_size as usize + header.image_size as usize;
        let hashed_end = body_end + header.protected_tlv_size as usize;
        if data.len() < hashed_end {
            return Err(invalid("truncated image body"));
        }

        if header.protected_tlv_size > 0 {
            let magic = read_u16(data, body_end);
            if magic != Some(IMAGE_TLV_PROT_INFO_MAGIC) {
                return Err(invalid("bad protected TLV magic"));
            }
        }

        let hash = find_tlv(data, hashed_end, IMAGE_TLV_SHA256)
            .map_err(|reason| invalid(reason.as_str()))?
            .ok_or_else(|| PackageError::MissingHash {
                name: name.to_string(),
            })?;

        if hash.len() != SHA256_LEN {
            return Err(invalid("SHA-256 TLV has the wrong length"));
        }

        let computed = Sha256::digest(&data[..hashed_end]);
        if computed.as_slice() != hash {
            return Err(PackageError::HashMismatch {
                name: name.to_string(),
            });
        }

        Ok(Self {
            header,
            hash: hash.to_vec(),
        })
    }
}

/// Scan the unprotected TLV area starting at `offset` for `tlv_type`.
fn find_tlv(data: &[u8], offset: usize, tlv_type: u16) -> Result<Option<&[u8]>, String> {
    let magic = read_u16(data, offset).ok_or("missing TLV area")?;
    if magic != IMAGE_TLV_INFO_MAGIC {
        return Err(format!("bad TLV magic 0x{:04X}", magic));
    }
    let total = read_u16(data, offset + 2).ok_or("missing TLV length")? as usize;
    let end = offset + total;
    if end > data.len() {
        return Err("truncated TLV area".to_string());
    }

    let mut cursor = offset + IMAGE_TLV_INFO_SIZE;
    while cursor + IMAGE_TLV_ENTRY_SIZE <= end {
        let kind = read_u16(data, cursor).ok_or("truncated TLV entry")?;
        let len = read_u16(data, cursor + 2).ok_or("truncated TLV entry")? as usize;
        let value_start = cursor + IMAGE_TLV_ENTRY_SIZE;
        let value = data
            .get(value_start..value_start + len)
            .filter(|_| value_start + len <= end)
            .ok_or("TLV entry overruns the TLV area")?;
        if kind == tlv_type {
            return Ok(Some(value));
        }
        cursor = value_start + len;
    }

    Ok(None)
}
