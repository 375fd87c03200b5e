//! Firmware upload session for MCUmgr-capable devices.
//!
//! This module resolves a selected firmware file into uploadable images and
//! drives one transfer at a time through an [`ImageUploader`].
//!
//! # Flow
//!
//! 1. **Selection** - The file is parsed as a legacy package (bare MCUboot
//!    image or ZIP with manifest.json), falling back to a SUIT envelope
//! 2. **Configuration** - Pipeline depth, byte alignment and chunk size
//! 3. **Image choice** - Packages ask which image to send, envelopes don't
//! 4. **Transfer** - The uploader reports progress, failure, cancellation
//!    or completion through an [`UploadObserver`](crate::traits::UploadObserver)
//! 5. **Throughput** - Progress samples become speed and average figures
//!
//! # Example
//!
//! ```ignore
//! use mcumgr_upload::dfu::{StartOutcome, UploadSession};
//!
//! let mut session = UploadSession::new(uploader);
//! session.set_buffer_count(4);
//! session.select_file("dfu_application.zip")?;
//! if let StartOutcome::ChooseImage(names) = session.start(None)? {
//!     println!("{:?}", names);
//!     session.start(Some(0))?;
//! }
//! session.process_events();
//! ```
//!
//! [`ImageUploader`]: crate::traits::ImageUploader

pub mod config;
mod envelope;
mod error;
mod image;
mod package;
mod resolver;
mod session;
mod status;
mod throughput;

// Configuration
pub use config::{ByteAlignment, CoseAlgorithm, UploadConfiguration, BUFFER_COUNT_CHOICES};

// Errors
pub use error::{DfuError, DfuResult, EnvelopeError, PackageError};

// Sources
pub use envelope::{SuitDigest, SuitEnvelope};
pub use image::{ImageDescriptor, ImageHeader, ImageVersion, McuBootImage};
pub use package::{core_name, read_firmware_package, FirmwarePackage, PackageImage, PackageManifest};
pub use resolver::{display_name, resolve, resolve_bytes, PackageSource, ResolvedFile};

// Session
pub use session::{ParseFailure, SessionState, StartOutcome, UploadSession};
pub use status::{Controls, SessionView};
pub use throughput::{Speed, SpeedReport, ThroughputTracker};
