use std::{
    fmt::{Display, Formatter},
    io,
    path::PathBuf,
    process::ExitStatus,
};

use tokio::{io::AsyncWriteExt, task::JoinHandle};

use crate::{
    command::TrackPlan,
    error::TrackError,
    input::EncoderInput,
    mixer::AudioMixer,
    pool::BufferPool,
    process::{EncoderProcess, SpawnOptions},
    queue::{EnqueueError, WriteQueue},
    writer::{FatalSender, PipeWriter, WriterOutcome},
};

/// Upper bound of buffers per track. Bounds memory and is the hard
/// backpressure limit for the producer.
pub const MAX_AUDIO_BUFFERS: usize = 2000;

/// One independent audio signal path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Track {
    /// Master mix, encoded with the user's codec.
    Combined,
    Music,
    Effects,
}

impl Track {
    /// Base name of the files belonging to this track.
    pub fn file_stem(self) -> &'static str {
        match self {
            Track::Combined => "audio",
            Track::Music => "music",
            Track::Effects => "effects",
        }
    }
}

impl Display for Track {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Track::Combined => write!(f, "audio"),
            Track::Music => write!(f, "music audio"),
            Track::Effects => write!(f, "effects audio"),
        }
    }
}

/// Lifecycle of a track pipeline.
///
/// `Idle` and `Starting` are passed inside [`TrackPipeline::start`]: a
/// pipeline value only exists once its encoder runs, so callers observe
/// `Running`, `Draining` and `Stopped`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrackState {
    #[default]
    Idle,
    Starting,
    Running,
    Draining,
    Stopped,
}

impl Display for TrackState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrackState::Idle => "idle",
            TrackState::Starting => "starting",
            TrackState::Running => "running",
            TrackState::Draining => "draining",
            TrackState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug)]
pub struct PipelineOptions {
    /// Buffers pre-allocated per track.
    pub max_buffers: usize,
    /// Filled buffers that may wait for the writer.
    pub queue_capacity: usize,
    pub spawn: SpawnOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_buffers: MAX_AUDIO_BUFFERS,
            queue_capacity: MAX_AUDIO_BUFFERS,
            spawn: SpawnOptions::default(),
        }
    }
}

/// Where the buffers of a running track currently are.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    pub idle: usize,
    pub queued: usize,
}

impl PoolStats {
    /// Buffers held by the producer or by the writer.
    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.idle + self.queued)
    }
}

#[derive(Debug)]
pub struct TrackSummary {
    pub track: Track,
    pub frames_written: u64,
    pub bytes_written: u64,
    pub output: PathBuf,
    pub exit_status: ExitStatus,
}

/// Pool, queue, writer task and encoder process of one track.
///
/// Created running by [`TrackPipeline::start`] and finished by
/// [`TrackPipeline::stop`]; nothing of it outlives the stop.
pub struct TrackPipeline {
    track: Track,
    state: TrackState,
    output: PathBuf,
    pool: BufferPool,
    queue: WriteQueue,
    writer: Option<JoinHandle<WriterOutcome<EncoderInput>>>,
    process: EncoderProcess,
    pushed: u64,
}

impl TrackPipeline {
    pub async fn start(
        plan: &TrackPlan,
        frame_len: usize,
        options: &PipelineOptions,
        fatal: Option<FatalSender>,
    ) -> Result<Self, TrackError> {
        let track = plan.track;
        log::info!(
            "{} pipeline {}: {} buffers of {} bytes",
            track,
            TrackState::Starting,
            options.max_buffers,
            frame_len
        );

        let (process, input) = EncoderProcess::spawn(track, &plan.command, &options.spawn).await?;

        let (pool, pool_return) = BufferPool::new(options.max_buffers, frame_len);
        let (queue, queue_rx) = WriteQueue::new(options.queue_capacity);
        let mut writer = PipeWriter::new(track, input, queue_rx, pool_return);
        if let Some(fatal) = fatal {
            writer = writer.with_fatal(fatal);
        }
        let writer = writer.spawn();

        Ok(Self {
            track,
            state: TrackState::Running,
            output: plan.output.clone(),
            pool,
            queue,
            writer: Some(writer),
            process,
            pushed: 0,
        })
    }

    pub fn track(&self) -> Track {
        self.track
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn frames_pushed(&self) -> u64 {
        self.pushed
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.pool.capacity(),
            idle: self.pool.idle(),
            queued: self.queue.len(),
        }
    }

    /// Acquires a buffer, lets the mixer fill it and queues it for the writer.
    ///
    /// Waits while every buffer is in flight or the queue is full. Fails
    /// immediately once the pipeline is not running or the writer is gone.
    pub async fn push<M: AudioMixer + ?Sized>(&mut self, mixer: &mut M) -> Result<(), TrackError> {
        self.expect_running("push")?;

        let Some(mut buf) = self.pool.acquire().await else {
            return Err(TrackError::Closed { track: self.track });
        };
        mixer.fill(self.track, &mut buf);

        match self.queue.enqueue(buf).await {
            Ok(()) => {
                self.pushed += 1;
                Ok(())
            }
            Err(EnqueueError::Closed(_)) => Err(TrackError::InvalidState {
                track: self.track,
                state: self.state,
                op: "push",
            }),
            Err(EnqueueError::Disconnected(_)) => Err(TrackError::Closed { track: self.track }),
        }
    }

    /// Drains the queue, closes the encoder input and waits for the encoder.
    ///
    /// The pipeline always ends up stopped, also when the writer failed; the
    /// writer's error is returned in that case.
    pub async fn stop(&mut self) -> Result<TrackSummary, TrackError> {
        self.expect_running("stop")?;
        let track = self.track;

        log::info!("{} finished! Stopping {} pipe...", track, track);
        self.state = TrackState::Draining;
        self.queue.close();

        let (frames, bytes, written) = match self.writer.take() {
            Some(writer) => match writer.await {
                Ok(WriterOutcome {
                    mut input,
                    frames,
                    bytes,
                    result,
                }) => {
                    if let Err(e) = input.shutdown().await {
                        log::debug!("{} pipe shutdown: {}", track, e);
                    }
                    drop(input);
                    (frames, bytes, result)
                }
                Err(e) => (0, 0, Err(TrackError::write(track, io::Error::other(e.to_string())))),
            },
            None => (0, 0, Err(TrackError::Closed { track })),
        };

        log::info!(
            "{} pipe closed after {} frames. Waiting for {} ffmpeg process to finish...",
            track,
            frames,
            track
        );
        let status = self.process.wait().await;
        self.state = TrackState::Stopped;
        log::info!("{} process finished.", track);

        written?;
        let exit_status = status?;
        if !exit_status.success() {
            return Err(TrackError::Exit {
                track,
                status: exit_status,
            });
        }

        Ok(TrackSummary {
            track,
            frames_written: frames,
            bytes_written: bytes,
            output: self.output.clone(),
            exit_status,
        })
    }

    fn expect_running(&self, op: &'static str) -> Result<(), TrackError> {
        if self.state == TrackState::Running {
            Ok(())
        } else {
            Err(TrackError::InvalidState {
                track: self.track,
                state: self.state,
                op,
            })
        }
    }
}

#[cfg(test)]
#[path = "track_test.rs"]
mod track_test;
