use std::{process::ExitStatus, process::Stdio, sync::Arc, time::Duration};

use tokio::process::{Child, Command};

use crate::{
    command::EncoderCommand,
    error::TrackError,
    input::{EncoderInput, InputKind, NamedPipe},
    track::Track,
};

#[derive(Clone, Debug)]
pub struct SpawnOptions {
    pub input: InputKind,
    /// Forward the encoder's stdout/stderr to ours.
    pub show_logs: bool,
    /// How long the encoder may take to open a named pipe.
    pub pipe_open_timeout: Duration,
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self {
            input: InputKind::Auto,
            show_logs: false,
            pipe_open_timeout: Duration::from_secs(10),
        }
    }
}

/// A running encoder subprocess. Started once, awaited once, never restarted.
pub struct EncoderProcess {
    track: Track,
    child: Child,
    pipe: Option<NamedPipe>,
}

impl EncoderProcess {
    /// Spawns the encoder and connects its input.
    pub async fn spawn(
        track: Track,
        command: &EncoderCommand,
        options: &SpawnOptions,
    ) -> Result<(Self, EncoderInput), TrackError> {
        let kind = options.input.resolve();
        let pipe = match kind {
            InputKind::NamedPipe => Some(
                NamedPipe::create(track.file_stem())
                    .await
                    .map_err(|e| TrackError::startup(track, format!("{:#}", e)))?,
            ),
            _ => None,
        };
        let input_name = match &pipe {
            Some(pipe) => pipe.path().to_string_lossy().into_owned(),
            None => "-".to_string(),
        };

        let args = command.resolve_args(&input_name);
        log::info!(
            "Running {} for {} with options: {:?}",
            command.program.display(),
            track,
            args
        );

        let mut cmd = Command::new(&command.program);
        cmd.args(&args).kill_on_drop(true);
        if pipe.is_some() {
            cmd.stdin(Stdio::null());
        } else {
            cmd.stdin(Stdio::piped());
        }
        if options.show_logs {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| TrackError::startup(track, e))?;

        let input = match &pipe {
            Some(pipe) => pipe
                .open_sender(&mut child, options.pipe_open_timeout)
                .await
                .map_err(|e| TrackError::startup(track, e)),
            None => child
                .stdin
                .take()
                .map(EncoderInput::Stdin)
                .ok_or_else(|| TrackError::startup(track, "encoder stdin was not captured")),
        };

        let input = match input {
            Ok(input) => input,
            Err(e) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(e);
            }
        };

        log::debug!("{} encoder started, pid {:?}", track, child.id());
        Ok((Self { track, child, pipe }, input))
    }

    /// Waits for the encoder to exit. Its input must already be closed.
    pub async fn wait(&mut self) -> Result<ExitStatus, TrackError> {
        let status = self.child.wait().await.map_err(|e| TrackError::Wait {
            track: self.track,
            source: Arc::new(e),
        });
        // the fifo is no longer needed once the reader is gone
        self.pipe.take();
        status
    }
}
