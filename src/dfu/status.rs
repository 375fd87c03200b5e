//! Read-only view of a session for presentation layers.

use serde::Serialize;

use super::session::{SessionState, UploadSession};
use super::throughput::Speed;
use crate::traits::ImageUploader;

/// Which commands a presentation layer should offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Controls {
    pub select: bool,
    pub configure: bool,
    pub start: bool,
    pub pause: bool,
    pub resume: bool,
    pub cancel: bool,
}

impl Controls {
    fn for_state(state: &SessionState, has_source: bool) -> Self {
        match state {
            SessionState::Uploading => Self {
                select: false,
                configure: false,
                start: false,
                pause: true,
                resume: false,
                cancel: true,
            },
            SessionState::Paused => Self {
                select: false,
                configure: false,
                start: false,
                pause: false,
                resume: true,
                cancel: true,
            },
            _ => Self {
                select: true,
                configure: true,
                start: has_source,
                pause: false,
                resume: false,
                cancel: false,
            },
        }
    }
}

/// Formatted snapshot of everything a firmware upload screen displays.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub state: SessionState,
    pub status: String,
    pub file_name: String,
    pub file_size: String,
    pub file_hash: String,
    pub buffers: String,
    pub alignment: String,
    pub chunk_size: String,
    /// Speed label, hidden unless uploading or just completed.
    pub speed: Option<String>,
    pub progress: f32,
    pub controls: Controls,
}

fn status_text(state: &SessionState, has_source: bool) -> String {
    match state {
        SessionState::Idle if has_source => "READY".to_string(),
        SessionState::Idle => "NO FILE SELECTED".to_string(),
        SessionState::AwaitingImageChoice => "SELECT IMAGE".to_string(),
        SessionState::Uploading => "UPLOADING...".to_string(),
        SessionState::Paused => "PAUSED".to_string(),
        SessionState::Cancelled => "CANCELLED".to_string(),
        SessionState::Failed(reason) => reason.clone(),
        SessionState::Completed => "UPLOAD COMPLETE".to_string(),
    }
}

impl SessionView {
    /// Snapshot the session as it stands.
    pub fn of<U: ImageUploader>(session: &UploadSession<U>) -> Self {
        let state = session.state().clone();
        let selection = session.selection();
        let config = session.configuration();

        let (file_name, file_size, file_hash) = match (selection, session.parse_failure()) {
            (Some(resolved), _) => (
                resolved.file_name.clone(),
                resolved.source.size_string(),
                resolved.source.hash_string(),
            ),
            (None, Some(failure)) => (failure.file_name.clone(), String::new(), String::new()),
            (None, None) => (String::new(), String::new(), String::new()),
        };

        let status = match session.parse_failure() {
            Some(failure) if state == SessionState::Idle => failure.message.clone(),
            _ => status_text(&state, selection.is_some()),
        };

        let speed = session.speed_report().and_then(|report| match (&state, report.speed) {
            (SessionState::Uploading, _) => Some(report.speed_text()),
            (SessionState::Completed, Speed::Completed { .. }) => Some(report.speed_text()),
            _ => None,
        });

        Self {
            controls: Controls::for_state(&state, selection.is_some()),
            status,
            file_name,
            file_size,
            file_hash,
            buffers: config.buffers_label(),
            alignment: config.alignment_label(),
            chunk_size: config.chunk_size_label(),
            speed,
            progress: session.progress(),
            state,
        }
    }
}

impl<U: ImageUploader> UploadSession<U> {
    pub fn view(&self) -> SessionView {
        SessionView::of(self)
    }
}
