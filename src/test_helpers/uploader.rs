use crate::dfu::{ImageDescriptor, UploadConfiguration};
use crate::traits::{ImageUploader, UploadHandle, UploadObserver};

/// Uploader that accepts every submission and records what it was asked.
///
/// Tests drive the transfer by calling the observer returned from
/// [`RecordingUploader::observer`].
#[derive(Default)]
pub struct RecordingUploader {
    submissions: Vec<Vec<ImageDescriptor>>,
    observers: Vec<UploadObserver>,
    pauses: usize,
    resumes: usize,
    cancels: usize,
}

impl RecordingUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Images of every submission, oldest first.
    pub fn submissions(&self) -> &[Vec<ImageDescriptor>] {
        &self.submissions
    }

    /// Observer of the latest submission.
    pub fn observer(&self) -> Option<UploadObserver> {
        self.observers.last().cloned()
    }

    pub fn pauses(&self) -> usize {
        self.pauses
    }

    pub fn resumes(&self) -> usize {
        self.resumes
    }

    pub fn cancels(&self) -> usize {
        self.cancels
    }
}

impl ImageUploader for RecordingUploader {
    fn submit(
        &mut self,
        images: Vec<ImageDescriptor>,
        _config: &UploadConfiguration,
        observer: UploadObserver,
    ) -> Result<UploadHandle, String> {
        self.submissions.push(images);
        self.observers.push(observer);
        Ok(UploadHandle(self.submissions.len() as u64))
    }

    fn pause(&mut self, _handle: UploadHandle) {
        self.pauses += 1;
    }

    fn resume(&mut self, _handle: UploadHandle) {
        self.resumes += 1;
    }

    fn cancel(&mut self, _handle: UploadHandle) {
        self.cancels += 1;
    }
}
