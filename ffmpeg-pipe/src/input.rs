use std::{
    io,
    path::{Path, PathBuf},
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use tokio::{io::AsyncWrite, process::ChildStdin};

/// How the encoder receives its raw PCM.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InputKind {
    /// Named pipe where the platform supports it, stdin elsewhere.
    #[default]
    Auto,
    NamedPipe,
    Stdin,
}

impl InputKind {
    pub fn resolve(self) -> InputKind {
        match self {
            InputKind::Auto if cfg!(unix) => InputKind::NamedPipe,
            InputKind::Auto => InputKind::Stdin,
            kind => kind,
        }
    }
}

/// Writable end of an encoder's input. The writer task only sees
/// `AsyncWrite`, whichever plumbing is underneath.
pub enum EncoderInput {
    Stdin(ChildStdin),
    #[cfg(unix)]
    NamedPipe(tokio::net::unix::pipe::Sender),
}

impl AsyncWrite for EncoderInput {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            EncoderInput::Stdin(stdin) => Pin::new(stdin).poll_write(cx, buf),
            #[cfg(unix)]
            EncoderInput::NamedPipe(tx) => Pin::new(tx).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            EncoderInput::Stdin(stdin) => Pin::new(stdin).poll_flush(cx),
            #[cfg(unix)]
            EncoderInput::NamedPipe(tx) => Pin::new(tx).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            EncoderInput::Stdin(stdin) => Pin::new(stdin).poll_shutdown(cx),
            #[cfg(unix)]
            EncoderInput::NamedPipe(tx) => Pin::new(tx).poll_shutdown(cx),
        }
    }
}

/// A FIFO inside its own temporary directory. The directory, and the FIFO
/// with it, is removed on drop.
pub struct NamedPipe {
    _dir: tempfile::TempDir,
    path: PathBuf,
}

const PIPE_POLL_INTERVAL: Duration = Duration::from_millis(10);

impl NamedPipe {
    #[cfg(unix)]
    pub async fn create(name: &str) -> anyhow::Result<Self> {
        use anyhow::Context as _;

        let dir = tempfile::Builder::new()
            .prefix("ffmpeg-pipe-")
            .tempdir()
            .context("create named pipe directory")?;
        let path = dir.path().join(format!("{}.pcm", name));

        make_fifo(&path).with_context(|| format!("mkfifo {}", path.display()))?;

        Ok(Self { _dir: dir, path })
    }

    #[cfg(not(unix))]
    pub async fn create(_name: &str) -> anyhow::Result<Self> {
        anyhow::bail!("named pipes are not supported on this platform, use stdin input")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the write end once the encoder has opened the read end.
    ///
    /// Fails if the encoder exits first or `timeout` elapses.
    #[cfg(unix)]
    pub async fn open_sender(
        &self,
        child: &mut tokio::process::Child,
        timeout: Duration,
    ) -> io::Result<EncoderInput> {
        use tokio::net::unix::pipe;

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match pipe::OpenOptions::new().open_sender(&self.path) {
                Ok(tx) => return Ok(EncoderInput::NamedPipe(tx)),
                // no reader has opened the fifo yet
                Err(e) if e.raw_os_error() == Some(libc::ENXIO) => {}
                Err(e) => return Err(e),
            }

            if let Some(status) = child.try_wait()? {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    format!("encoder exited with {} before opening its input", status),
                ));
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!(
                        "encoder did not open {} within {:?}",
                        self.path.display(),
                        timeout
                    ),
                ));
            }
            tokio::time::sleep(PIPE_POLL_INTERVAL).await;
        }
    }

    #[cfg(not(unix))]
    pub async fn open_sender(
        &self,
        _child: &mut tokio::process::Child,
        _timeout: Duration,
    ) -> io::Result<EncoderInput> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "named pipes are not supported on this platform",
        ))
    }
}

#[cfg(unix)]
fn make_fifo(path: &Path) -> io::Result<()> {
    use std::{ffi::CString, os::unix::ffi::OsStrExt};

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    // SAFETY: `c_path` is a valid NUL-terminated string for the whole call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
