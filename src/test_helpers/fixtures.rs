use std::io::{Cursor, Write};

use minicbor::data::Tag;
use minicbor::Encoder;
use serde_json::json;
use sha2::{Digest, Sha256};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::dfu::config::{
    IMAGE_HEADER_SIZE, IMAGE_MAGIC, IMAGE_TLV_INFO_MAGIC, IMAGE_TLV_PROT_INFO_MAGIC,
    IMAGE_TLV_SHA256, MANIFEST_FILE_NAME, SUIT_ENVELOPE_TAG,
};

fn push_tlv(out: &mut Vec<u8>, kind: u16, value: &[u8]) {
    out.extend_from_slice(&kind.to_le_bytes());
    out.extend_from_slice(&(value.len() as u16).to_le_bytes());
    out.extend_from_slice(value);
}

fn tlv_area(magic: u16, entries: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (kind, value) in entries {
        push_tlv(&mut body, *kind, value);
    }
    let mut out = Vec::with_capacity(body.len() + 4);
    out.extend_from_slice(&magic.to_le_bytes());
    out.extend_from_slice(&((body.len() + 4) as u16).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

/// Builder for signed-looking MCUboot images with a valid SHA-256 TLV
pub struct McuBootImageBuilder {
    body: Vec<u8>,
    load_address: u32,
    version: (u8, u8, u16, u32),
    protected: Vec<(u16, Vec<u8>)>,
    with_hash: bool,
}

impl McuBootImageBuilder {
    pub fn new(body: &[u8]) -> Self {
        Self {
            body: body.to_vec(),
            load_address: 0,
            version: (1, 0, 0, 0),
            protected: Vec::new(),
            with_hash: true,
        }
    }

    pub fn version(mut self, major: u8, minor: u8, revision: u16, build: u32) -> Self {
        self.version = (major, minor, revision, build);
        self
    }

    pub fn load_address(mut self, address: u32) -> Self {
        self.load_address = address;
        self
    }

    pub fn protected_tlv(mut self, kind: u16, value: &[u8]) -> Self {
        self.protected.push((kind, value.to_vec()));
        self
    }

    pub fn without_hash(mut self) -> Self {
        self.with_hash = false;
        self
    }

    /// Header, body and protected TLVs: the bytes the SHA-256 covers.
    fn hashed_region(&self) -> Vec<u8> {
        let protected = if self.protected.is_empty() {
            Vec::new()
        } else {
            tlv_area(IMAGE_TLV_PROT_INFO_MAGIC, &self.protected)
        };
        let (major, minor, revision, build) = self.version;

        let mut out = Vec::with_capacity(IMAGE_HEADER_SIZE + self.body.len() + protected.len());
        out.extend_from_slice(&IMAGE_MAGIC.to_le_bytes());
        out.extend_from_slice(&self.load_address.to_le_bytes());
        out.extend_from_slice(&(IMAGE_HEADER_SIZE as u16).to_le_bytes());
        out.extend_from_slice(&(protected.len() as u16).to_le_bytes());
        out.extend_from_slice(&(self.body.len() as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // flags
        out.push(major);
        out.push(minor);
        out.extend_from_slice(&revision.to_le_bytes());
        out.extend_from_slice(&build.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // padding
        out.extend_from_slice(&self.body);
        out.extend_from_slice(&protected);
        out
    }

    pub fn expected_hash(&self) -> Vec<u8> {
        Sha256::digest(self.hashed_region()).to_vec()
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = self.hashed_region();
        let entries = if self.with_hash {
            vec![(IMAGE_TLV_SHA256, Sha256::digest(&out).to_vec())]
        } else {
            Vec::new()
        };
        out.extend_from_slice(&tlv_area(IMAGE_TLV_INFO_MAGIC, &entries));
        out
    }
}

/// Builder for ZIP firmware packages with a manifest.json
pub struct PackageZipBuilder {
    images: Vec<(u32, String, Vec<u8>)>,
    name: Option<String>,
    time: Option<i64>,
    numeric_indices: bool,
    with_manifest: bool,
    phantom_entries: Vec<String>,
    raw_manifest: Option<String>,
    declared_sizes: Vec<(String, u64)>,
}

impl PackageZipBuilder {
    pub fn new() -> Self {
        Self {
            images: Vec::new(),
            name: None,
            time: None,
            numeric_indices: false,
            with_manifest: true,
            phantom_entries: Vec::new(),
            raw_manifest: None,
            declared_sizes: Vec::new(),
        }
    }

    /// Add an MCUboot image wrapping `body`.
    pub fn image(mut self, index: u32, file: &str, body: &[u8]) -> Self {
        let bytes = McuBootImageBuilder::new(body).build();
        self.images.push((index, file.to_string(), bytes));
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn time(mut self, secs: i64) -> Self {
        self.time = Some(secs);
        self
    }

    /// Write `image_index` as a number instead of a string.
    pub fn numeric_indices(mut self) -> Self {
        self.numeric_indices = true;
        self
    }

    pub fn without_manifest(mut self) -> Self {
        self.with_manifest = false;
        self
    }

    /// List a file in the manifest without adding it to the archive.
    pub fn manifest_only_entry(mut self, file: &str) -> Self {
        self.phantom_entries.push(file.to_string());
        self
    }

    pub fn raw_manifest(mut self, contents: &str) -> Self {
        self.raw_manifest = Some(contents.to_string());
        self
    }

    /// Declare a bogus uncompressed size for `file` through a zip64 extra
    /// field in the central directory. The stored bytes are unchanged.
    pub fn declared_size(mut self, file: &str, size: u64) -> Self {
        self.declared_sizes.push((file.to_string(), size));
        self
    }

    fn manifest(&self) -> String {
        if let Some(raw) = &self.raw_manifest {
            return raw.clone();
        }

        let mut files: Vec<serde_json::Value> = self
            .images
            .iter()
            .map(|(index, file, bytes)| {
                let image_index = if self.numeric_indices {
                    json!(index)
                } else {
                    json!(index.to_string())
                };
                json!({
                    "file": file,
                    "image_index": image_index,
                    "size": bytes.len(),
                })
            })
            .collect();
        files.extend(
            self.phantom_entries
                .iter()
                .map(|file| json!({ "file": file, "image_index": "0" })),
        );

        let mut manifest = json!({ "format-version": 1, "files": files });
        if let Some(name) = &self.name {
            manifest["name"] = json!(name);
        }
        if let Some(time) = self.time {
            manifest["time"] = json!(time);
        }
        manifest.to_string()
    }

    pub fn build(&self) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);

        for (_, file, bytes) in &self.images {
            writer.start_file(file.as_str(), options).expect("Failed to start zip entry");
            writer.write_all(bytes).expect("Failed to write zip entry");
        }
        if self.with_manifest {
            writer
                .start_file(MANIFEST_FILE_NAME, options)
                .expect("Failed to start manifest entry");
            writer
                .write_all(self.manifest().as_bytes())
                .expect("Failed to write manifest");
        }

        let mut zip = writer.finish().expect("Failed to finish zip").into_inner();
        for (file, size) in &self.declared_sizes {
            patch_zip64_size(&mut zip, file, *size);
        }
        zip
    }
}

fn le_u16(data: &[u8], offset: usize) -> usize {
    u16::from_le_bytes([data[offset], data[offset + 1]]) as usize
}

fn le_u32(data: &[u8], offset: usize) -> usize {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]]) as usize
}

/// Rewrite the central directory entry of `file` so its uncompressed size
/// is read from a zip64 extra field holding `size`.
fn patch_zip64_size(zip: &mut Vec<u8>, file: &str, size: u64) {
    const EOCD_SIZE: usize = 22;
    const CENTRAL_HEADER_SIZE: usize = 46;

    let eocd = zip.len() - EOCD_SIZE;
    assert_eq!(&zip[eocd..eocd + 4], b"PK\x05\x06", "archive has a comment");
    let entries = le_u16(zip, eocd + 10);
    let mut pos = le_u32(zip, eocd + 16);

    for _ in 0..entries {
        assert_eq!(&zip[pos..pos + 4], b"PK\x01\x02");
        let name_len = le_u16(zip, pos + 28);
        let extra_len = le_u16(zip, pos + 30);
        let comment_len = le_u16(zip, pos + 32);
        let name = &zip[pos + CENTRAL_HEADER_SIZE..pos + CENTRAL_HEADER_SIZE + name_len];

        if name == file.as_bytes() {
            let mut extra = vec![0x01, 0x00, 0x08, 0x00];
            extra.extend_from_slice(&size.to_le_bytes());

            zip[pos + 24..pos + 28].copy_from_slice(&u32::MAX.to_le_bytes());
            zip[pos + 30..pos + 32].copy_from_slice(&((extra_len + extra.len()) as u16).to_le_bytes());
            let at = pos + CENTRAL_HEADER_SIZE + name_len + extra_len;
            zip.splice(at..at, extra.iter().copied());

            let eocd = zip.len() - EOCD_SIZE;
            let central_size = le_u32(zip, eocd + 12) + extra.len();
            zip[eocd + 12..eocd + 16].copy_from_slice(&(central_size as u32).to_le_bytes());
            return;
        }

        pos += CENTRAL_HEADER_SIZE + name_len + extra_len + comment_len;
    }
    panic!("{} not in archive", file);
}

impl Default for PackageZipBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for SUIT envelopes carrying an authentication wrapper and manifest
pub struct SuitEnvelopeBuilder {
    digests: Vec<(i64, Vec<u8>)>,
    signature_block: bool,
    sequence_number: u64,
    tag: Option<u64>,
    with_manifest: bool,
}

fn cbor() -> Encoder<Vec<u8>> {
    Encoder::new(Vec::new())
}

impl SuitEnvelopeBuilder {
    pub fn new() -> Self {
        Self {
            digests: Vec::new(),
            signature_block: false,
            sequence_number: 1,
            tag: Some(SUIT_ENVELOPE_TAG),
            with_manifest: true,
        }
    }

    pub fn digest(mut self, algorithm: i64, hash: &[u8]) -> Self {
        self.digests.push((algorithm, hash.to_vec()));
        self
    }

    /// Append a COSE_Sign1-shaped block after the digests.
    pub fn signature_block(mut self) -> Self {
        self.signature_block = true;
        self
    }

    pub fn sequence_number(mut self, value: u64) -> Self {
        self.sequence_number = value;
        self
    }

    pub fn untagged(mut self) -> Self {
        self.tag = None;
        self
    }

    pub fn tag(mut self, tag: u64) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn without_manifest(mut self) -> Self {
        self.with_manifest = false;
        self
    }

    fn authentication_wrapper(&self) -> Vec<u8> {
        let count = self.digests.len() + usize::from(self.signature_block);
        let mut wrapper = cbor();
        wrapper.array(count as u64).expect("encode");

        for (algorithm, hash) in &self.digests {
            let mut digest = cbor();
            digest
                .array(2)
                .and_then(|e| e.i64(*algorithm))
                .and_then(|e| e.bytes(hash))
                .expect("encode");
            wrapper.bytes(&digest.into_writer()).expect("encode");
        }

        if self.signature_block {
            let mut sign1 = cbor();
            sign1
                .array(4)
                .and_then(|e| e.bytes(&[0xA1, 0x01, 0x26]))
                .and_then(|e| e.map(0))
                .and_then(|e| e.null())
                .and_then(|e| e.bytes(&[0x55; 64]))
                .expect("encode");
            wrapper.bytes(&sign1.into_writer()).expect("encode");
        }

        wrapper.into_writer()
    }

    fn manifest(&self) -> Vec<u8> {
        let mut manifest = cbor();
        manifest
            .map(2)
            .and_then(|e| e.u64(1))
            .and_then(|e| e.u64(1))
            .and_then(|e| e.u64(2))
            .and_then(|e| e.u64(self.sequence_number))
            .expect("encode");
        manifest.into_writer()
    }

    pub fn build(&self) -> Vec<u8> {
        let with_auth = !self.digests.is_empty();
        let entries = u64::from(with_auth) + u64::from(self.with_manifest);

        let mut envelope = cbor();
        if let Some(tag) = self.tag {
            envelope.tag(Tag::new(tag)).expect("encode");
        }
        envelope.map(entries).expect("encode");
        if with_auth {
            envelope
                .u64(2)
                .and_then(|e| e.bytes(&self.authentication_wrapper()))
                .expect("encode");
        }
        if self.with_manifest {
            envelope
                .u64(3)
                .and_then(|e| e.bytes(&self.manifest()))
                .expect("encode");
        }
        envelope.into_writer()
    }
}

impl Default for SuitEnvelopeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
