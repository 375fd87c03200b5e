use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use crate::dfu::{resolve, PackageSource, ResolvedFile, UploadConfiguration};

/// One uploadable image in a firmware file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    pub name: String,
    /// Target image slot on the device.
    pub index: u32,
    /// MCUboot version, absent for envelopes.
    pub version: Option<String>,
    pub size: usize,
    /// Expected hash as upper-case hex.
    pub hash: String,
}

/// Upload settings as they would be shown next to the file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSummary {
    pub buffers: String,
    pub alignment: String,
    pub chunk_size: String,
}

impl From<&UploadConfiguration> for ConfigurationSummary {
    fn from(config: &UploadConfiguration) -> Self {
        Self {
            buffers: config.buffers_label(),
            alignment: config.alignment_label(),
            chunk_size: config.chunk_size_label(),
        }
    }
}

/// Everything known about a firmware file before uploading it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmwareSummary {
    pub file_name: String,
    /// `package` or `suit-envelope`.
    pub kind: String,
    pub size: String,
    pub hash: String,
    pub images: Vec<ImageSummary>,
    pub package_name: Option<String>,
    /// Manifest build time, RFC 3339.
    pub build_time: Option<String>,
    pub sequence_number: Option<u64>,
    /// Reason the file cannot be uploaded as-is.
    pub warning: Option<String>,
    pub configuration: ConfigurationSummary,
}

impl FirmwareSummary {
    pub fn new(resolved: &ResolvedFile, config: &UploadConfiguration) -> Self {
        let mut summary = Self {
            file_name: resolved.file_name.clone(),
            kind: resolved.source.kind().to_string(),
            size: resolved.source.size_string(),
            hash: resolved.source.hash_string(),
            images: Vec::new(),
            package_name: None,
            build_time: None,
            sequence_number: None,
            warning: None,
            configuration: ConfigurationSummary::from(config),
        };

        match &resolved.source {
            PackageSource::Legacy(package) => {
                summary.images = package
                    .images
                    .iter()
                    .map(|image| ImageSummary {
                        name: image.name.clone(),
                        index: image.image.index,
                        version: Some(image.version.to_string()),
                        size: image.image.payload.len(),
                        hash: hex::encode_upper(&image.image.expected_hash),
                    })
                    .collect();
                if let Some(manifest) = &package.manifest {
                    summary.package_name = manifest.name.clone();
                    summary.build_time = manifest.build_time.map(|time| time.to_rfc3339());
                }
            }
            PackageSource::Suit(envelope) => {
                summary.sequence_number = envelope.sequence_number;
                match envelope.image() {
                    Ok(image) => summary.images.push(ImageSummary {
                        name: resolved.file_name.clone(),
                        index: image.index,
                        version: None,
                        size: image.payload.len(),
                        hash: hex::encode_upper(&image.expected_hash),
                    }),
                    Err(e) => summary.warning = Some(e.to_string()),
                }
            }
        }

        summary
    }
}

impl fmt::Display for FirmwareSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "File:       {} ({})", self.file_name, self.kind)?;
        if let Some(name) = &self.package_name {
            writeln!(f, "Package:    {}", name)?;
        }
        if let Some(time) = &self.build_time {
            writeln!(f, "Built:      {}", time)?;
        }
        if let Some(sequence) = self.sequence_number {
            writeln!(f, "Sequence:   {}", sequence)?;
        }
        writeln!(f, "Buffers:    {}", self.configuration.buffers)?;
        writeln!(f, "Alignment:  {}", self.configuration.alignment)?;
        writeln!(f, "Chunk size: {}", self.configuration.chunk_size)?;

        writeln!(f, "\nSize:")?;
        for line in self.size.lines() {
            writeln!(f, "  {}", line)?;
        }
        writeln!(f, "Hash:")?;
        for line in self.hash.lines() {
            writeln!(f, "  {}", line)?;
        }

        if !self.images.is_empty() {
            writeln!(f, "Images:")?;
            for (position, image) in self.images.iter().enumerate() {
                write!(f, "  [{}] {} -> image {}", position, image.name, image.index)?;
                if let Some(version) = &image.version {
                    write!(f, ", version {}", version)?;
                }
                writeln!(f)?;
            }
        }

        if let Some(warning) = &self.warning {
            writeln!(f, "\nWarning: {}", warning)?;
        }
        Ok(())
    }
}

/// Resolve a firmware file and summarize it.
///
/// Parsing runs on the blocking pool; large packages are read and hashed in
/// full.
pub async fn inspect_firmware(
    path: PathBuf,
    config: UploadConfiguration,
) -> Result<FirmwareSummary, String> {
    tokio::task::spawn_blocking(move || {
        debug!("Inspecting {}", path.display());
        let resolved = resolve(&path).map_err(|e| format!("[{}] {}", e.error_code(), e))?;
        Ok(FirmwareSummary::new(&resolved, &config))
    })
    .await
    .map_err(|e| format!("Inspection failed: {}", e))?
}
