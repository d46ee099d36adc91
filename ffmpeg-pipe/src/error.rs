use std::{io, process::ExitStatus, sync::Arc};

use crate::track::{Track, TrackState};

/// Failure of a single track pipeline. Every variant names the track so the
/// session owner can report which encoder broke.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TrackError {
    #[error(
        "ffmpeg's {track} process failed to start: {reason}. Please check if audio parameters are entered correctly or the audio codec is supported by the provided container"
    )]
    Startup { track: Track, reason: String },

    #[error(
        "ffmpeg's {track} process finished abruptly! Please check if you have enough storage or audio parameters are entered correctly. Error: {source}"
    )]
    Write {
        track: Track,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("{track} write queue is closed, the pipe writer has exited")]
    Closed { track: Track },

    #[error("{track} pipeline is {state}, cannot {op}")]
    InvalidState {
        track: Track,
        state: TrackState,
        op: &'static str,
    },

    #[error("ffmpeg's {track} process exited with {status}")]
    Exit { track: Track, status: ExitStatus },

    #[error("failed to wait for ffmpeg's {track} process: {source}")]
    Wait {
        track: Track,
        #[source]
        source: Arc<io::Error>,
    },
}

impl TrackError {
    pub fn track(&self) -> Track {
        match self {
            TrackError::Startup { track, .. }
            | TrackError::Write { track, .. }
            | TrackError::Closed { track }
            | TrackError::InvalidState { track, .. }
            | TrackError::Exit { track, .. }
            | TrackError::Wait { track, .. } => *track,
        }
    }

    pub(crate) fn startup(track: Track, err: impl std::fmt::Display) -> Self {
        TrackError::Startup {
            track,
            reason: err.to_string(),
        }
    }

    pub(crate) fn write(track: Track, err: io::Error) -> Self {
        TrackError::Write {
            track,
            source: Arc::new(err),
        }
    }
}

/// Failure of the pipeline set as a whole.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid audio frame rate {0}, expected a positive number of frames per second")]
    InvalidFrameRate(f64),

    #[error("audio pipelines are {state}, cannot {op}")]
    InvalidState { state: TrackState, op: &'static str },

    #[error(transparent)]
    Track(#[from] TrackError),
}

impl PipelineError {
    /// Track the failure belongs to, if it is track-specific.
    pub fn track(&self) -> Option<Track> {
        match self {
            PipelineError::Track(err) => Some(err.track()),
            _ => None,
        }
    }
}
