use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::mpsc,
    task::JoinHandle,
};

use crate::{error::TrackError, pool::BufferReturn, queue::QueueReceiver, track::Track};

/// Channel the writers report fatal errors on, read by the session owner.
pub type FatalSender = mpsc::UnboundedSender<TrackError>;
pub type FatalReceiver = mpsc::UnboundedReceiver<TrackError>;

/// What the writer hands back once it has exited. The input is returned
/// unclosed: closing it is the pipeline's job, after the writer is gone.
pub struct WriterOutcome<W> {
    pub input: W,
    pub frames: u64,
    pub bytes: u64,
    pub result: Result<(), TrackError>,
}

pub struct PipeWriter<W> {
    track: Track,
    input: W,
    queue: QueueReceiver,
    pool: BufferReturn,
    fatal: Option<FatalSender>,
}

impl<W> PipeWriter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(track: Track, input: W, queue: QueueReceiver, pool: BufferReturn) -> Self {
        Self {
            track,
            input,
            queue,
            pool,
            fatal: None,
        }
    }

    pub fn with_fatal(mut self, fatal: FatalSender) -> Self {
        self.fatal = Some(fatal);
        self
    }

    /// Spawns the writer. The returned handle is the completion signal.
    pub fn spawn(self) -> JoinHandle<WriterOutcome<W>> {
        tokio::spawn(self.run())
    }

    async fn run(self) -> WriterOutcome<W> {
        let Self {
            track,
            mut input,
            mut queue,
            pool,
            fatal,
        } = self;
        log::debug!("{} pipe writer started", track);

        let mut frames = 0u64;
        let mut bytes = 0u64;
        let mut result = Ok(());
        while let Some(buf) = queue.recv().await {
            if let Err(e) = input.write_all(&buf).await {
                result = Err(TrackError::write(track, e));
                break;
            }
            frames += 1;
            bytes += buf.len() as u64;
            pool.release(buf);
        }

        if result.is_ok() {
            if let Err(e) = input.flush().await {
                result = Err(TrackError::write(track, e));
            }
        }

        match &result {
            Ok(()) => log::debug!("{} pipe writer drained {} frames", track, frames),
            Err(e) => {
                log::error!("{}", e);
                if let Some(fatal) = fatal {
                    let _ = fatal.send(e.clone());
                }
            }
        }

        // Dropping the queue receiver and the pool return here unblocks a
        // producer waiting on either of them after a failure.
        drop(queue);
        drop(pool);

        WriterOutcome {
            input,
            frames,
            bytes,
            result,
        }
    }
}

#[cfg(test)]
#[path = "writer_test.rs"]
mod writer_test;
