use std::ops::{Deref, DerefMut};

use bytes::BytesMut;
use tokio::sync::mpsc;

/// One render tick of interleaved PCM. The length is fixed when the pool is
/// seeded and never changes afterwards.
#[derive(Debug)]
pub struct FrameBuffer {
    data: BytesMut,
}

impl FrameBuffer {
    fn zeroed(len: usize) -> Self {
        Self {
            data: BytesMut::zeroed(len),
        }
    }
}

impl Deref for FrameBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for FrameBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Producer side of the buffer pool.
///
/// Every buffer is allocated in [`BufferPool::new`]; afterwards buffers only
/// move between the pool, the write queue and the writer. The returning side
/// ([`BufferReturn`]) is owned by the writer, so once the writer is gone the
/// pool drains its idle buffers and then reports exhaustion instead of
/// blocking forever.
pub struct BufferPool {
    idle: mpsc::Receiver<FrameBuffer>,
    capacity: usize,
}

/// Writer side of the buffer pool.
pub struct BufferReturn {
    tx: mpsc::Sender<FrameBuffer>,
}

impl BufferPool {
    pub fn new(capacity: usize, frame_len: usize) -> (Self, BufferReturn) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        for _ in 0..capacity {
            // Channel capacity equals the number of buffers, so seeding never fails.
            let _ = tx.try_send(FrameBuffer::zeroed(frame_len));
        }

        (
            Self {
                idle: rx,
                capacity,
            },
            BufferReturn { tx },
        )
    }

    /// Waits for an idle buffer. `None` means the writer has exited and no
    /// idle buffer is left.
    pub async fn acquire(&mut self) -> Option<FrameBuffer> {
        self.idle.recv().await
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Buffers currently sitting idle in the pool.
    pub fn idle(&self) -> usize {
        self.idle.len()
    }
}

impl BufferReturn {
    pub fn release(&self, buf: FrameBuffer) {
        if self.tx.try_send(buf).is_err() {
            log::trace!("buffer pool closed, dropping returned buffer");
        }
    }
}
