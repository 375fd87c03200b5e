//! Legacy multi-image firmware package reader.
//!
//! A package is either:
//! - a bare MCUboot image (`.bin`), uploaded to image 0, or
//! - a ZIP container with a manifest.json listing one MCUboot image per file
//!
//! The format is recognized from the content, never from the file extension.

use std::io::{Cursor, Read, Seek};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::config::{MANIFEST_FILE_NAME, ZIP_EMPTY_ARCHIVE_MAGIC, ZIP_LOCAL_HEADER_MAGIC};
use super::error::PackageError;
use super::image::{has_image_magic, ImageDescriptor, ImageVersion, McuBootImage};

/// One image inside a legacy package.
#[derive(Debug, Clone)]
pub struct PackageImage {
    /// Display name shown when choosing which image to upload.
    pub name: String,
    /// File the image was read from.
    pub file: String,
    pub version: ImageVersion,
    pub image: ImageDescriptor,
}

/// Metadata from a ZIP package manifest.
#[derive(Debug, Clone, Default)]
pub struct PackageManifest {
    pub name: Option<String>,
    pub build_time: Option<DateTime<Utc>>,
}

/// Contents of a legacy firmware package.
#[derive(Debug, Clone)]
pub struct FirmwarePackage {
    /// Images in manifest order.
    pub images: Vec<PackageImage>,
    /// Manifest metadata, absent for bare images.
    pub manifest: Option<PackageManifest>,
}

/// Raw manifest.json structure for deserialization.
#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    time: Option<i64>,
    files: Vec<RawManifestFile>,
}

#[derive(Debug, Deserialize)]
struct RawManifestFile {
    file: String,
    #[serde(default)]
    image_index: Option<RawImageIndex>,
    #[serde(default)]
    size: Option<u64>,
}

// Nordic tooling writes the index as a string, older manifests as a number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawImageIndex {
    Number(u32),
    Text(String),
}

impl RawImageIndex {
    fn value(&self) -> Result<u32, PackageError> {
        match self {
            RawImageIndex::Number(n) => Ok(*n),
            RawImageIndex::Text(text) => {
                text.trim()
                    .parse()
                    .map_err(|_| PackageError::InvalidManifest {
                        reason: format!("image_index '{}' is not a number", text),
                    })
            }
        }
    }
}

/// Display name of the core an image index targets.
pub fn core_name(index: u32) -> String {
    match index {
        0 => "App Core".to_string(),
        1 => "Net Core".to_string(),
        n => format!("Image {}", n),
    }
}

impl FirmwarePackage {
    /// Name of the image at `position`, if it exists.
    pub fn image_name(&self, position: usize) -> Option<&str> {
        self.images.get(position).map(|i| i.name.as_str())
    }

    pub fn image_names(&self) -> Vec<String> {
        self.images.iter().map(|i| i.name.clone()).collect()
    }

    /// One line per image: `"<name>: <n> bytes"`.
    pub fn size_string(&self) -> String {
        self.images
            .iter()
            .map(|i| format!("{}: {} bytes", i.name, i.image.payload.len()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// One line per image: `"<name>: <SHA-256 hex>"`.
    pub fn hash_string(&self) -> String {
        self.images
            .iter()
            .map(|i| format!("{}: {}", i.name, hex::encode_upper(&i.image.expected_hash)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Parse a legacy firmware package from the file contents.
///
/// # Arguments
/// * `file_name` - Name of the selected file, used for bare images
/// * `data` - Complete file contents
pub fn read_firmware_package(file_name: &str, data: &[u8]) -> Result<FirmwarePackage, PackageError> {
    if data.starts_with(ZIP_LOCAL_HEADER_MAGIC) || data.starts_with(ZIP_EMPTY_ARCHIVE_MAGIC) {
        read_zip_package(data)
    } else if has_image_magic(data) {
        let image = McuBootImage::parse(file_name, data)?;
        Ok(FirmwarePackage {
            images: vec![PackageImage {
                name: core_name(0),
                file: file_name.to_string(),
                version: image.header.version,
                image: ImageDescriptor {
                    index: 0,
                    expected_hash: image.hash,
                    payload: data.to_vec(),
                },
            }],
            manifest: None,
        })
    } else {
        Err(PackageError::UnrecognizedFormat)
    }
}

fn read_zip_package(data: &[u8]) -> Result<FirmwarePackage, PackageError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;

    let raw = read_manifest(&mut archive)?;
    if raw.files.is_empty() {
        return Err(PackageError::InvalidManifest {
            reason: "manifest lists no images".to_string(),
        });
    }

    let mut images = Vec::with_capacity(raw.files.len());
    for entry in &raw.files {
        let index = match &entry.image_index {
            Some(index) => index.value()?,
            None => 0,
        };

        let payload = read_file_from_zip(&mut archive, &entry.file)?;
        if let Some(size) = entry.size {
            if size != payload.len() as u64 {
                return Err(PackageError::InvalidManifest {
                    reason: format!(
                        "{} is {} bytes, manifest declares {}",
                        entry.file,
                        payload.len(),
                        size
                    ),
                });
            }
        }

        let image = McuBootImage::parse(&entry.file, &payload)?;
        images.push(PackageImage {
            name: format!("{} ({})", core_name(index), entry.file),
            file: entry.file.clone(),
            version: image.header.version,
            image: ImageDescriptor {
                index,
                expected_hash: image.hash,
                payload,
            },
        });
    }

    Ok(FirmwarePackage {
        images,
        manifest: Some(PackageManifest {
            name: raw.name,
            build_time: raw.time.and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        }),
    })
}

/// Read and parse the manifest.json from the archive.
fn read_manifest<R: Read + Seek>(archive: &mut zip::ZipArchive<R>) -> Result<RawManifest, PackageError> {
    let mut manifest_file = archive
        .by_name(MANIFEST_FILE_NAME)
        .map_err(|_| PackageError::MissingFile {
            filename: MANIFEST_FILE_NAME.to_string(),
        })?;

    let mut contents = String::new();
    manifest_file.read_to_string(&mut contents)?;

    Ok(serde_json::from_str(&contents)?)
}

/// Read a file from the zip archive by name.
fn read_file_from_zip<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<Vec<u8>, PackageError> {
    let mut file = archive.by_name(name).map_err(|_| PackageError::MissingFile {
        filename: name.to_string(),
    })?;

    // The declared size comes from the archive and is not trusted as a hint.
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    Ok(data)
}
