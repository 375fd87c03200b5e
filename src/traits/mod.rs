pub mod uploader;

pub use uploader::{ImageUploader, UploadEvent, UploadHandle, UploadObserver};

#[cfg(test)]
pub use uploader::MockImageUploader;
