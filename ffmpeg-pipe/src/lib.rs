//! Streams live-rendered PCM frames into external ffmpeg processes.
//!
//! Data flow per track:
//! ```text
//! mixer ─► BufferPool::acquire ─► fill ─► WriteQueue ─► writer task ─► encoder input
//!               ▲                                            │
//!               └──────────────── BufferReturn ◄─────────────┘
//! ```
//!
//! One [`track::TrackPipeline`] exists per audio track, and
//! [`pipelines::AudioPipelines`] fans calls out to one (combined) or two
//! (music + effects) of them.

pub mod command;
pub mod error;
pub mod format;
pub mod input;
pub mod mixer;
pub mod pipelines;
pub mod pool;
pub mod probe;
pub mod process;
pub mod queue;
pub mod track;
pub mod writer;

#[cfg(test)]
mod test_support;

pub use error::{PipelineError, TrackError};
pub use track::Track;
