//! SUIT envelope parsing.
//!
//! Only the parts needed to upload the envelope are decoded:
//! - the authentication wrapper, for the declared digests
//! - the manifest, for its sequence number
//!
//! Signatures inside the authentication wrapper are not verified; the device
//! does that. The envelope itself is what gets uploaded.

use minicbor::data::Type;
use minicbor::Decoder;

use super::config::{
    CoseAlgorithm, SUIT_AUTHENTICATION_WRAPPER, SUIT_ENVELOPE_TAG, SUIT_MANIFEST,
    SUIT_MANIFEST_SEQUENCE_NUMBER,
};
use super::error::{DfuError, DfuResult, EnvelopeError};
use super::image::ImageDescriptor;

/// A digest declared by the envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuitDigest {
    /// COSE algorithm identifier.
    pub algorithm: i64,
    pub hash: Vec<u8>,
}

impl SuitDigest {
    pub fn algorithm_name(&self) -> String {
        match CoseAlgorithm::from_id(self.algorithm) {
            Some(algorithm) => algorithm.name().to_string(),
            None => format!("alg {}", self.algorithm),
        }
    }

    pub fn is_supported(&self) -> bool {
        CoseAlgorithm::from_id(self.algorithm).is_some_and(CoseAlgorithm::is_supported)
    }
}

/// A parsed SUIT envelope.
#[derive(Debug, Clone)]
pub struct SuitEnvelope {
    /// Digests in declaration order.
    pub digests: Vec<SuitDigest>,
    /// Manifest sequence number, when present.
    pub sequence_number: Option<u64>,
    /// Complete envelope bytes, uploaded as-is.
    pub data: Vec<u8>,
}

impl SuitEnvelope {
    /// Parse an envelope from the file contents.
    pub fn parse(data: &[u8]) -> Result<Self, EnvelopeError> {
        let mut decoder = Decoder::new(data);

        if decoder.datatype()? == Type::Tag {
            let tag = decoder.tag()?;
            if tag.as_u64() != SUIT_ENVELOPE_TAG {
                return Err(not_an_envelope(format!("unexpected tag {}", tag.as_u64())));
            }
        }

        let entries = decode_map_len(&mut decoder)?;
        let mut digests = None;
        let mut sequence_number = None;
        let mut has_manifest = false;

        for _ in 0..entries {
            match decode_int_key(&mut decoder)? {
                Some(SUIT_AUTHENTICATION_WRAPPER) => {
                    digests = Some(parse_authentication(decoder.bytes()?)?);
                }
                Some(SUIT_MANIFEST) => {
                    sequence_number = parse_sequence_number(decoder.bytes()?)?;
                    has_manifest = true;
                }
                _ => decoder.skip()?,
            }
        }

        if decoder.position() != data.len() {
            return Err(not_an_envelope("trailing data after envelope"));
        }

        let digests = digests.ok_or(EnvelopeError::MissingAuthentication)?;
        if !has_manifest {
            return Err(EnvelopeError::MissingManifest);
        }

        Ok(Self {
            digests,
            sequence_number,
            data: data.to_vec(),
        })
    }

    /// First digest using a supported algorithm.
    pub fn supported_digest(&self) -> Option<&SuitDigest> {
        self.digests.iter().find(|d| d.is_supported())
    }

    /// Build the single image to upload for this envelope.
    ///
    /// Fails when no declared digest uses a supported algorithm.
    pub fn image(&self) -> DfuResult<ImageDescriptor> {
        let digest = self
            .supported_digest()
            .ok_or_else(|| DfuError::DigestUnsupported {
                declared: self.digests.iter().map(|d| d.algorithm).collect(),
            })?;

        Ok(ImageDescriptor {
            index: 0,
            expected_hash: digest.hash.clone(),
            payload: self.data.clone(),
        })
    }

    pub fn size_string(&self) -> String {
        format!("{} bytes", self.data.len())
    }

    /// One line per digest: `"<ALG>: <hex>"`.
    pub fn hash_string(&self) -> String {
        self.digests
            .iter()
            .map(|d| format!("{}: {}", d.algorithm_name(), hex::encode_upper(&d.hash)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn not_an_envelope(reason: impl Into<String>) -> EnvelopeError {
    EnvelopeError::NotAnEnvelope {
        reason: reason.into(),
    }
}

fn decode_map_len(decoder: &mut Decoder<'_>) -> Result<u64, EnvelopeError> {
    if decoder.datatype()? != Type::Map {
        return Err(not_an_envelope("top level is not a map"));
    }
    decoder
        .map()?
        .ok_or_else(|| not_an_envelope("indefinite-length map"))
}

/// Decode a map key, returning `None` (and consuming it) for non-integer keys.
fn decode_int_key(decoder: &mut Decoder<'_>) -> Result<Option<i64>, EnvelopeError> {
    match decoder.datatype()? {
        Type::U8
        | Type::U16
        | Type::U32
        | Type::U64
        | Type::I8
        | Type::I16
        | Type::I32
        | Type::I64 => Ok(Some(decoder.i64()?)),
        _ => {
            decoder.skip()?;
            Ok(None)
        }
    }
}

/// Parse `[ bstr .cbor SUIT_Digest, * bstr .cbor SUIT_Authentication_Block ]`.
///
/// The first entry must be a digest. Later entries that also decode as
/// digests are collected; signature blocks are skipped.
fn parse_authentication(wrapper: &[u8]) -> Result<Vec<SuitDigest>, EnvelopeError> {
    let mut decoder = Decoder::new(wrapper);
    let count = decoder
        .array()?
        .ok_or_else(|| not_an_envelope("indefinite-length authentication wrapper"))?;
    if count == 0 {
        return Err(EnvelopeError::MissingDigest);
    }

    let first = decoder.bytes()?;
    let mut digests = vec![parse_digest(first).ok_or(EnvelopeError::MissingDigest)?];

    for _ in 1..count {
        if decoder.datatype()? == Type::Bytes {
            if let Some(digest) = parse_digest(decoder.bytes()?) {
                digests.push(digest);
            }
        } else {
            decoder.skip()?;
        }
    }

    Ok(digests)
}

/// Parse `SUIT_Digest = [ algorithm-id: int, digest-bytes: bstr ]`.
fn parse_digest(bytes: &[u8]) -> Option<SuitDigest> {
    let mut decoder = Decoder::new(bytes);
    if decoder.array().ok()? != Some(2) {
        return None;
    }
    let algorithm = decoder.i64().ok()?;
    let hash = decoder.bytes().ok()?.to_vec();
    if decoder.position() != bytes.len() {
        return None;
    }
    Some(SuitDigest { algorithm, hash })
}

fn parse_sequence_number(manifest: &[u8]) -> Result<Option<u64>, EnvelopeError> {
    let mut decoder = Decoder::new(manifest);
    let entries = decoder
        .map()?
        .ok_or_else(|| not_an_envelope("indefinite-length manifest"))?;

    for _ in 0..entries {
        match decode_int_key(&mut decoder)? {
            Some(SUIT_MANIFEST_SEQUENCE_NUMBER) => return Ok(Some(decoder.u64()?)),
            _ => decoder.skip()?,
        }
    }

    Ok(None)
}
