use std::sync::mpsc::Sender;
use std::time::Instant;

#[cfg(test)]
use mockall::automock;

use crate::dfu::{ImageDescriptor, UploadConfiguration};

/// Identifies a transfer started by an [`ImageUploader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UploadHandle(pub u64);

/// Notifications an uploader sends back while a transfer runs.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    Started,
    Progress {
        bytes_sent: u64,
        image_size: u64,
        timestamp: Instant,
    },
    Failed { reason: String },
    Cancelled,
    Finished,
}

/// Callback sink handed to the uploader at submission.
///
/// Events go through a channel in the order they are reported. Each observer
/// is bound to one session, so events from an abandoned transfer can be told
/// apart from the current one.
#[derive(Debug, Clone)]
pub struct UploadObserver {
    session: u64,
    tx: Sender<(u64, UploadEvent)>,
}

impl UploadObserver {
    pub(crate) fn new(session: u64, tx: Sender<(u64, UploadEvent)>) -> Self {
        Self { session, tx }
    }

    fn send(&self, event: UploadEvent) {
        // Receiver gone means the session was torn down; nothing to notify.
        let _ = self.tx.send((self.session, event));
    }

    pub fn on_start(&self) {
        self.send(UploadEvent::Started);
    }

    pub fn on_progress(&self, bytes_sent: u64, image_size: u64, timestamp: Instant) {
        self.send(UploadEvent::Progress {
            bytes_sent,
            image_size,
            timestamp,
        });
    }

    pub fn on_failure(&self, reason: impl Into<String>) {
        self.send(UploadEvent::Failed {
            reason: reason.into(),
        });
    }

    pub fn on_cancelled(&self) {
        self.send(UploadEvent::Cancelled);
    }

    pub fn on_finished(&self) {
        self.send(UploadEvent::Finished);
    }
}

/// Abstraction over the library that moves image bytes to the device.
///
/// Pause, resume and cancel are requests only; the outcome is reported
/// through the observer.
#[cfg_attr(test, automock)]
pub trait ImageUploader: Send {
    /// Start transferring `images`. Returns immediately.
    fn submit(
        &mut self,
        images: Vec<ImageDescriptor>,
        config: &UploadConfiguration,
        observer: UploadObserver,
    ) -> Result<UploadHandle, String>;

    fn pause(&mut self, handle: UploadHandle);

    fn resume(&mut self, handle: UploadHandle);

    fn cancel(&mut self, handle: UploadHandle);
}
