use std::path::Path;

use futures::future::join_all;
use tokio::sync::mpsc;

use crate::{
    command::CommandPlanner,
    error::{PipelineError, TrackError},
    format::PcmFormat,
    mixer::AudioMixer,
    track::{PipelineOptions, Track, TrackPipeline, TrackState, TrackSummary},
    writer::FatalReceiver,
};

/// All audio track pipelines of one recording session.
///
/// Combined mode runs a single track; split mode runs independent music and
/// effects tracks. Every call fans out to all of them.
pub struct AudioPipelines {
    state: TrackState,
    tracks: Vec<TrackPipeline>,
    fatal: FatalReceiver,
    failure: Option<TrackError>,
}

impl AudioPipelines {
    pub fn tracks_for(split: bool) -> &'static [Track] {
        if split {
            &[Track::Music, Track::Effects]
        } else {
            &[Track::Combined]
        }
    }

    /// Starts one encoder per track. If any track fails to start, the ones
    /// already running are stopped before the error is returned.
    pub async fn start(
        planner: &dyn CommandPlanner,
        work_dir: &Path,
        frame_rate: f64,
        split: bool,
        options: &PipelineOptions,
    ) -> Result<Self, PipelineError> {
        let frame_len = PcmFormat::default()
            .frame_bytes(frame_rate)
            .ok_or(PipelineError::InvalidFrameRate(frame_rate))?;

        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        let mut tracks = Vec::new();
        for &track in Self::tracks_for(split) {
            let started = match planner.plan(track, work_dir) {
                Ok(plan) => {
                    TrackPipeline::start(&plan, frame_len, options, Some(fatal_tx.clone())).await
                }
                Err(e) => Err(TrackError::startup(track, format!("{:#}", e))),
            };

            match started {
                Ok(pipeline) => tracks.push(pipeline),
                Err(e) => {
                    for mut pipeline in tracks {
                        if let Err(stop_err) = pipeline.stop().await {
                            log::warn!(
                                "stopping {} after failed start: {}",
                                pipeline.track(),
                                stop_err
                            );
                        }
                    }
                    return Err(e.into());
                }
            }
        }

        Ok(Self {
            state: TrackState::Running,
            tracks,
            fatal: fatal_rx,
            failure: None,
        })
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn tracks(&self) -> impl Iterator<Item = &TrackPipeline> {
        self.tracks.iter()
    }

    /// First fatal error any writer has reported so far.
    pub fn failure(&mut self) -> Option<&TrackError> {
        while let Ok(err) = self.fatal.try_recv() {
            if self.failure.is_none() {
                self.failure = Some(err);
            }
        }
        self.failure.as_ref()
    }

    /// Pushes one render tick to every track.
    ///
    /// Refuses to push once a writer has failed, so a broken track never
    /// receives more frames.
    pub async fn push<M: AudioMixer + ?Sized>(&mut self, mixer: &mut M) -> Result<(), PipelineError> {
        self.expect_running("push")?;
        if let Some(err) = self.failure() {
            return Err(err.clone().into());
        }

        for i in 0..self.tracks.len() {
            if let Err(e) = self.tracks[i].push(mixer).await {
                // a closed queue is the symptom, the writer's error is the cause
                return Err(self.failure().cloned().unwrap_or(e).into());
            }
        }
        Ok(())
    }

    /// Stops every track and waits until all of them are stopped.
    pub async fn stop(&mut self) -> Result<Vec<TrackSummary>, PipelineError> {
        self.expect_running("stop")?;
        self.state = TrackState::Draining;
        log::info!("Audio finished! Stopping {} audio pipeline(s)...", self.tracks.len());

        let results = join_all(self.tracks.iter_mut().map(|t| t.stop())).await;
        self.state = TrackState::Stopped;

        let mut summaries = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    log::error!("{}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(err) = self.failure().cloned().or(first_error) {
            return Err(err.into());
        }
        log::info!("All audio encoders finished.");
        Ok(summaries)
    }

    fn expect_running(&self, op: &'static str) -> Result<(), PipelineError> {
        if self.state == TrackState::Running {
            Ok(())
        } else {
            Err(PipelineError::InvalidState {
                state: self.state,
                op,
            })
        }
    }
}

#[cfg(test)]
#[path = "pipelines_test.rs"]
mod pipelines_test;
