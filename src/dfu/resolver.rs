//! Resolves a selected file into something the session can upload.
//!
//! The legacy package parser runs first. Only when it rejects the content as
//! "not a package" does the SUIT envelope parser get a turn; failing to read
//! the file at all is reported straight away.

use std::path::Path;

use tracing::debug;

use super::envelope::SuitEnvelope;
use super::error::{DfuError, DfuResult};
use super::package::{read_firmware_package, FirmwarePackage};

/// The two kinds of uploadable source.
#[derive(Debug, Clone)]
pub enum PackageSource {
    Legacy(FirmwarePackage),
    Suit(SuitEnvelope),
}

impl PackageSource {
    pub fn kind(&self) -> &'static str {
        match self {
            PackageSource::Legacy(_) => "package",
            PackageSource::Suit(_) => "suit-envelope",
        }
    }

    /// Number of images the user can pick from.
    pub fn image_count(&self) -> usize {
        match self {
            PackageSource::Legacy(package) => package.images.len(),
            PackageSource::Suit(_) => 1,
        }
    }

    pub fn size_string(&self) -> String {
        match self {
            PackageSource::Legacy(package) => package.size_string(),
            PackageSource::Suit(envelope) => envelope.size_string(),
        }
    }

    pub fn hash_string(&self) -> String {
        match self {
            PackageSource::Legacy(package) => package.hash_string(),
            PackageSource::Suit(envelope) => envelope.hash_string(),
        }
    }
}

/// A successfully resolved file.
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    /// Last path component of the selected file.
    pub file_name: String,
    pub source: PackageSource,
}

/// Display name for a path: its last component, or the whole path.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read and parse the file at `path`.
pub fn resolve<P: AsRef<Path>>(path: P) -> DfuResult<ResolvedFile> {
    let path = path.as_ref();
    let file_name = display_name(path);

    let data = std::fs::read(path).map_err(|source| DfuError::FileRead {
        file: file_name.clone(),
        source,
    })?;

    resolve_bytes(file_name, &data)
}

/// Parse already-loaded file contents.
pub fn resolve_bytes(file_name: String, data: &[u8]) -> DfuResult<ResolvedFile> {
    let package_error = match read_firmware_package(&file_name, data) {
        Ok(package) => {
            debug!(
                "{} is a firmware package with {} image(s)",
                file_name,
                package.images.len()
            );
            return Ok(ResolvedFile {
                file_name,
                source: PackageSource::Legacy(package),
            });
        }
        Err(e) => e,
    };

    debug!("{} is not a firmware package ({}), trying SUIT", file_name, package_error);

    match SuitEnvelope::parse(data) {
        Ok(envelope) => {
            debug!(
                "{} is a SUIT envelope with {} digest(s)",
                file_name,
                envelope.digests.len()
            );
            Ok(ResolvedFile {
                file_name,
                source: PackageSource::Suit(envelope),
            })
        }
        Err(envelope_error) => Err(DfuError::FormatParse {
            file: file_name,
            package: package_error,
            envelope: envelope_error,
        }),
    }
}
