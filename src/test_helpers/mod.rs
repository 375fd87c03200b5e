//! Shared builders and fixtures for unit tests.

mod fixtures;
mod temp;
mod uploader;

pub use fixtures::{McuBootImageBuilder, PackageZipBuilder, SuitEnvelopeBuilder};
pub use temp::TestContext;
pub use uploader::RecordingUploader;
