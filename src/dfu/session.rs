//! Upload session controller.
//!
//! Owns the selected source, the upload configuration and the life cycle of
//! one transfer at a time:
//!
//! ```text
//! Idle ──start──> Uploading ──pause──> Paused ──resume──> Uploading
//!   │                │  │                 │
//!   │ (package)      │  └──cancel──> Cancelled <──cancel──┘
//!   v                ├──failure──> Failed
//! AwaitingImageChoice└──finish───> Completed (source cleared)
//! ```
//!
//! Uploader callbacks arrive on a channel and are applied in order by
//! [`UploadSession::process_events`].

use std::fmt;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::config::{ByteAlignment, UploadConfiguration};
use super::error::{DfuError, DfuResult};
use super::image::ImageDescriptor;
use super::resolver::{display_name, resolve, PackageSource, ResolvedFile};
use super::throughput::{SpeedReport, ThroughputTracker};
use crate::traits::{ImageUploader, UploadEvent, UploadHandle, UploadObserver};

/// Life cycle state of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    AwaitingImageChoice,
    Uploading,
    Paused,
    Cancelled,
    Failed(String),
    Completed,
}

impl SessionState {
    /// Whether a transfer is in progress (uploading or paused).
    pub fn is_busy(&self) -> bool {
        matches!(self, SessionState::Uploading | SessionState::Paused)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => f.write_str("idle"),
            SessionState::AwaitingImageChoice => f.write_str("awaiting image choice"),
            SessionState::Uploading => f.write_str("uploading"),
            SessionState::Paused => f.write_str("paused"),
            SessionState::Cancelled => f.write_str("cancelled"),
            SessionState::Failed(reason) => write!(f, "failed ({})", reason),
            SessionState::Completed => f.write_str("completed"),
        }
    }
}

/// What a call to [`UploadSession::start`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// An image was handed to the uploader.
    Submitted(UploadHandle),
    /// The package has several images; call `start` again with a choice.
    ChooseImage(Vec<String>),
    /// No source is selected, nothing happened.
    NothingSelected,
}

/// A file that failed to resolve, kept for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub file_name: String,
    pub message: String,
}

/// Upload session controller.
pub struct UploadSession<U: ImageUploader> {
    uploader: U,
    config: UploadConfiguration,
    selection: Option<ResolvedFile>,
    parse_failure: Option<ParseFailure>,
    state: SessionState,
    handle: Option<UploadHandle>,
    session_id: u64,
    tracker: ThroughputTracker,
    report: Option<SpeedReport>,
    progress: f32,
    events_tx: Sender<(u64, UploadEvent)>,
    events_rx: Receiver<(u64, UploadEvent)>,
}

impl<U: ImageUploader> UploadSession<U> {
    pub fn new(uploader: U) -> Self {
        Self::with_configuration(uploader, UploadConfiguration::default())
    }

    pub fn with_configuration(uploader: U, config: UploadConfiguration) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            uploader,
            config,
            selection: None,
            parse_failure: None,
            state: SessionState::Idle,
            handle: None,
            session_id: 0,
            tracker: ThroughputTracker::new(),
            report: None,
            progress: 0.0,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn configuration(&self) -> &UploadConfiguration {
        &self.config
    }

    pub fn selection(&self) -> Option<&ResolvedFile> {
        self.selection.as_ref()
    }

    pub fn parse_failure(&self) -> Option<&ParseFailure> {
        self.parse_failure.as_ref()
    }

    /// Latest speed report of the current or last transfer.
    pub fn speed_report(&self) -> Option<&SpeedReport> {
        self.report.as_ref()
    }

    /// Fraction of the current image sent.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    pub fn set_pipeline_depth(&mut self, depth: u32) {
        self.config.set_pipeline_depth(depth);
    }

    pub fn set_buffer_count(&mut self, buffers: u32) {
        self.config.set_buffer_count(buffers);
    }

    pub fn set_byte_alignment(&mut self, alignment: ByteAlignment) {
        self.config.set_byte_alignment(alignment);
    }

    pub fn set_chunk_size(&mut self, input: &str) {
        self.config.set_chunk_size(input);
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Select and resolve a new firmware file.
    ///
    /// Any previous source is dropped first, so a failed parse leaves the
    /// session with nothing selected.
    pub fn select_file<P: AsRef<Path>>(&mut self, path: P) -> DfuResult<&ResolvedFile> {
        if self.state.is_busy() {
            return Err(self.busy("select a file"));
        }

        let path = path.as_ref();
        if let Some(handle) = self.handle.take() {
            // Outcomes of the abandoned transfer must not touch the new source.
            debug!("Abandoning transfer {:?}", handle);
            self.session_id += 1;
        }
        self.selection = None;
        self.parse_failure = None;
        self.report = None;
        self.progress = 0.0;
        self.state = SessionState::Idle;

        match resolve(path) {
            Ok(resolved) => {
                info!(
                    "Selected {} ({}, {} image(s))",
                    resolved.file_name,
                    resolved.source.kind(),
                    resolved.source.image_count()
                );
                Ok(&*self.selection.insert(resolved))
            }
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                self.parse_failure = Some(ParseFailure {
                    file_name: display_name(path),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Start uploading the selected source.
    ///
    /// For a package, `choice` picks the image by position. Without a choice
    /// the session waits in [`SessionState::AwaitingImageChoice`] and the
    /// image names are returned. Envelopes need no choice.
    pub fn start(&mut self, choice: Option<usize>) -> DfuResult<StartOutcome> {
        if self.state.is_busy() {
            warn!("Ignoring start request while {}", self.state);
            return Err(self.busy("start"));
        }

        let picked = match self.selection.as_ref().map(|s| &s.source) {
            None => {
                debug!("Start requested with no source selected");
                return Ok(StartOutcome::NothingSelected);
            }
            Some(PackageSource::Legacy(package)) => match choice {
                None => {
                    let names = package.image_names();
                    self.state = SessionState::AwaitingImageChoice;
                    return Ok(StartOutcome::ChooseImage(names));
                }
                Some(position) => package
                    .images
                    .get(position)
                    .map(|i| i.image.clone())
                    .ok_or(DfuError::ImageOutOfRange {
                        index: position,
                        count: package.images.len(),
                    }),
            },
            Some(PackageSource::Suit(envelope)) => envelope.image(),
        };

        match picked {
            Ok(image) => self.submit(image),
            Err(e) => {
                if matches!(e, DfuError::DigestUnsupported { .. }) {
                    warn!("{}", e);
                    self.state = SessionState::Failed(e.to_string());
                }
                Err(e)
            }
        }
    }

    fn submit(&mut self, image: ImageDescriptor) -> DfuResult<StartOutcome> {
        self.session_id += 1;
        self.tracker.reset();
        self.report = None;
        self.progress = 0.0;

        info!(
            "Uploading image {} ({} bytes, pipeline depth {}, alignment {}, chunk size {})",
            image.index,
            image.payload.len(),
            self.config.pipeline_depth,
            self.config.byte_alignment,
            self.config.reassembly_buffer_size
        );

        let observer = UploadObserver::new(self.session_id, self.events_tx.clone());
        match self.uploader.submit(vec![image], &self.config, observer) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.state = SessionState::Uploading;
                Ok(StartOutcome::Submitted(handle))
            }
            Err(reason) => {
                let e = DfuError::TransportSubmit { reason };
                warn!("{}", e);
                self.state = SessionState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Ask the uploader to pause. Returns whether a request was made.
    pub fn pause(&mut self) -> bool {
        match (&self.state, self.handle) {
            (SessionState::Uploading, Some(handle)) => {
                info!("Pausing upload");
                self.state = SessionState::Paused;
                self.uploader.pause(handle);
                true
            }
            _ => {
                debug!("Ignoring pause while {}", self.state);
                false
            }
        }
    }

    /// Ask the uploader to continue. Speed measurement restarts.
    pub fn resume(&mut self) -> bool {
        match (&self.state, self.handle) {
            (SessionState::Paused, Some(handle)) => {
                info!("Resuming upload");
                self.state = SessionState::Uploading;
                self.tracker.resume();
                self.uploader.resume(handle);
                true
            }
            _ => {
                debug!("Ignoring resume while {}", self.state);
                false
            }
        }
    }

    /// Cancel the transfer, or dismiss a pending image choice.
    ///
    /// The state changes right away; the uploader's own outcome is still
    /// applied when it arrives.
    pub fn cancel(&mut self) -> bool {
        match (&self.state, self.handle) {
            (SessionState::Uploading | SessionState::Paused, Some(handle)) => {
                info!("Cancelling upload");
                self.state = SessionState::Cancelled;
                self.uploader.cancel(handle);
                true
            }
            (SessionState::AwaitingImageChoice, _) => {
                self.state = SessionState::Idle;
                true
            }
            _ => {
                debug!("Ignoring cancel while {}", self.state);
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Uploader events
    // ------------------------------------------------------------------

    /// Apply every queued uploader event in arrival order.
    ///
    /// Returns the number of events applied. Events from earlier transfers
    /// are discarded.
    pub fn process_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok((session, event)) = self.events_rx.try_recv() {
            if session != self.session_id {
                debug!("Dropping {:?} from finished transfer {}", event, session);
                continue;
            }
            self.handle_event(event);
            applied += 1;
        }
        applied
    }

    /// Apply one event from the current transfer.
    fn handle_event(&mut self, event: UploadEvent) {
        if self.handle.is_none() {
            debug!("Ignoring {:?}, no transfer in progress", event);
            return;
        }

        match event {
            UploadEvent::Started => debug!("Uploader started transfer"),
            UploadEvent::Progress {
                bytes_sent,
                image_size,
                timestamp,
            } => {
                if self.state != SessionState::Uploading {
                    debug!("Ignoring progress while {}", self.state);
                    return;
                }
                let report = self.tracker.observe(bytes_sent, image_size, timestamp);
                debug!(
                    "{}/{} bytes, {}",
                    bytes_sent,
                    image_size,
                    report.speed_text()
                );
                self.progress = report.progress;
                self.report = Some(report);
            }
            UploadEvent::Failed { reason } => {
                let e = DfuError::TransportFailure { reason };
                warn!("{}", e);
                self.state = SessionState::Failed(e.to_string());
                self.end_transfer();
            }
            UploadEvent::Cancelled => {
                info!("Upload cancelled");
                self.state = SessionState::Cancelled;
                self.end_transfer();
            }
            UploadEvent::Finished => {
                info!("Upload complete");
                self.state = SessionState::Completed;
                self.selection = None;
                self.end_transfer();
            }
        }
    }

    fn end_transfer(&mut self) {
        self.handle = None;
        self.progress = 0.0;
    }

    fn busy(&self, operation: &'static str) -> DfuError {
        DfuError::SessionBusy {
            operation,
            state: self.state.to_string(),
        }
    }
}
