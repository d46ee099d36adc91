use std::{path::Path, time::Duration};

use super::AudioPipelines;
use crate::{
    command::{CommandPlanner, TrackPlan},
    error::{PipelineError, TrackError},
    format::PcmFormat,
    input::InputKind,
    test_support::{PatternMixer, cat_from_pipe, dies_after},
    track::{PipelineOptions, Track, TrackState},
};

/// Copies each track's input to `<work_dir>/<stem>.raw`.
struct CatPlanner;

impl CommandPlanner for CatPlanner {
    fn plan(&self, track: Track, work_dir: &Path) -> anyhow::Result<TrackPlan> {
        Ok(cat_from_pipe(
            track,
            &work_dir.join(format!("{}.raw", track.file_stem())),
        ))
    }
}

/// Encoder dies after reading `limit` bytes.
struct DyingPlanner {
    limit: usize,
}

impl CommandPlanner for DyingPlanner {
    fn plan(&self, track: Track, _work_dir: &Path) -> anyhow::Result<TrackPlan> {
        Ok(dies_after(track, self.limit))
    }
}

/// Plans music normally and refuses effects.
struct NoEffectsPlanner;

impl CommandPlanner for NoEffectsPlanner {
    fn plan(&self, track: Track, work_dir: &Path) -> anyhow::Result<TrackPlan> {
        match track {
            Track::Effects => anyhow::bail!("no effects encoder configured"),
            _ => CatPlanner.plan(track, work_dir),
        }
    }
}

fn options() -> PipelineOptions {
    let mut options = PipelineOptions::default();
    options.max_buffers = 8;
    options.queue_capacity = 8;
    options.spawn.input = InputKind::NamedPipe;
    options
}

fn raw_files(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

#[cfg(unix)]
#[tokio::test]
async fn test_combined_session_produces_one_artifact() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut pipelines =
        AudioPipelines::start(&CatPlanner, dir.path(), 60.0, false, &options()).await?;
    assert_eq!(pipelines.tracks().count(), 1);

    let mut mixer = PatternMixer::default();
    for _ in 0..120 {
        pipelines.push(&mut mixer).await?;
    }
    let summaries = pipelines.stop().await?;
    assert_eq!(pipelines.state(), TrackState::Stopped);

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].track, Track::Combined);
    assert!(summaries[0].exit_status.success());
    assert_eq!(raw_files(dir.path())?, ["audio.raw"]);

    let frame_len = PcmFormat::default().frame_bytes(60.0).unwrap();
    let written = std::fs::read(dir.path().join("audio.raw"))?;
    assert_eq!(written.len(), 120 * frame_len);
    assert_eq!(written, mixer.produced(Track::Combined));
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_split_session_keeps_tracks_apart() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut pipelines =
        AudioPipelines::start(&CatPlanner, dir.path(), 50.0, true, &options()).await?;

    let mut mixer = PatternMixer::default();
    for _ in 0..75 {
        pipelines.push(&mut mixer).await?;
    }
    let summaries = pipelines.stop().await?;
    assert_eq!(summaries.len(), 2);
    assert_eq!(raw_files(dir.path())?, ["effects.raw", "music.raw"]);

    let music = std::fs::read(dir.path().join("music.raw"))?;
    let effects = std::fs::read(dir.path().join("effects.raw"))?;
    assert_eq!(music, mixer.produced(Track::Music));
    assert_eq!(effects, mixer.produced(Track::Effects));
    assert!(!music.contains(&PatternMixer::tag(Track::Effects)));
    assert!(!effects.contains(&PatternMixer::tag(Track::Music)));
    assert!(mixer.produced(Track::Combined).is_empty());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_second_stop_and_late_push_fail_fast() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut pipelines =
        AudioPipelines::start(&CatPlanner, dir.path(), 60.0, true, &options()).await?;
    let mut mixer = PatternMixer::default();
    pipelines.push(&mut mixer).await?;
    pipelines.stop().await?;

    let stop = tokio::time::timeout(Duration::from_secs(1), pipelines.stop()).await?;
    assert!(matches!(
        stop,
        Err(PipelineError::InvalidState {
            state: TrackState::Stopped,
            op: "stop"
        })
    ));
    let push = tokio::time::timeout(Duration::from_secs(1), pipelines.push(&mut mixer)).await?;
    assert!(matches!(push, Err(PipelineError::InvalidState { op: "push", .. })));
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_encoder_failure_on_frame_50_aborts_pushing() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let frame_len = PcmFormat::default().frame_bytes(60.0).unwrap();
    let planner = DyingPlanner {
        limit: 50 * frame_len,
    };
    let mut pipelines =
        AudioPipelines::start(&planner, dir.path(), 60.0, false, &options()).await?;

    let mut mixer = PatternMixer::default();
    let mut error = None;
    for _ in 0..120 {
        if let Err(e) = pipelines.push(&mut mixer).await {
            error = Some(e);
            break;
        }
    }
    let error = error.expect("pushing must fail once the encoder died");
    assert_eq!(error.track(), Some(Track::Combined));
    assert!(matches!(
        error,
        PipelineError::Track(TrackError::Write { .. })
    ));
    assert!(pipelines.failure().is_some());

    // Once failed, further pushes are refused without touching the track.
    assert!(pipelines.push(&mut mixer).await.is_err());

    let stop = tokio::time::timeout(Duration::from_secs(10), pipelines.stop()).await?;
    assert!(matches!(
        stop,
        Err(PipelineError::Track(TrackError::Write {
            track: Track::Combined,
            ..
        }))
    ));
    assert_eq!(pipelines.state(), TrackState::Stopped);
    Ok(())
}

#[tokio::test]
async fn test_invalid_frame_rate_is_rejected() {
    let dir = std::env::temp_dir();
    let result = AudioPipelines::start(&CatPlanner, &dir, 0.0, false, &options()).await;
    assert!(matches!(result, Err(PipelineError::InvalidFrameRate(_))));
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_split_start_stops_started_tracks() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let result =
        AudioPipelines::start(&NoEffectsPlanner, dir.path(), 60.0, true, &options()).await;
    match result {
        Err(PipelineError::Track(TrackError::Startup { track, reason })) => {
            assert_eq!(track, Track::Effects);
            assert!(reason.contains("no effects encoder"));
        }
        Err(e) => anyhow::bail!("unexpected error: {}", e),
        Ok(_) => anyhow::bail!("start should fail"),
    }
    // the music encoder ran and was shut down cleanly
    assert_eq!(raw_files(dir.path())?, ["music.raw"]);
    Ok(())
}
