use tokio::sync::mpsc;

use crate::pool::FrameBuffer;

pub type QueueReceiver = mpsc::Receiver<FrameBuffer>;

/// Bounded FIFO handing filled buffers from the producer to the writer.
///
/// Closing drops the only sender; the writer then receives everything that
/// was already enqueued and observes `None` afterwards.
pub struct WriteQueue {
    tx: Option<mpsc::Sender<FrameBuffer>>,
}

/// Why an enqueue did not happen. The buffer is handed back to the caller.
#[derive(Debug)]
pub enum EnqueueError {
    /// `close` was already called.
    Closed(FrameBuffer),
    /// The writer dropped its end.
    Disconnected(FrameBuffer),
}

impl WriteQueue {
    pub fn new(capacity: usize) -> (Self, QueueReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// Places `buf` at the tail, waiting while the queue is full.
    pub async fn enqueue(&self, buf: FrameBuffer) -> Result<(), EnqueueError> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(EnqueueError::Closed(buf));
        };
        tx.send(buf)
            .await
            .map_err(|mpsc::error::SendError(buf)| EnqueueError::Disconnected(buf))
    }

    /// Closes the queue. Returns `false` if it was already closed.
    pub fn close(&mut self) -> bool {
        self.tx.take().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().is_none_or(|tx| tx.is_closed())
    }

    /// Buffers waiting for the writer.
    pub fn len(&self) -> usize {
        self.tx
            .as_ref()
            .map(|tx| tx.max_capacity() - tx.capacity())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::pool::BufferPool;

    #[tokio::test]
    async fn test_fifo_then_drain_after_close() {
        let (mut pool, _ret) = BufferPool::new(3, 1);
        let (mut queue, mut rx) = WriteQueue::new(3);

        for i in 0..3u8 {
            let mut buf = pool.acquire().await.unwrap();
            buf[0] = i;
            queue.enqueue(buf).await.unwrap();
        }
        assert_eq!(queue.len(), 3);
        assert!(!queue.is_empty());
        assert!(queue.close());
        assert!(!queue.close());

        for i in 0..3u8 {
            assert_eq!(rx.recv().await.unwrap()[0], i);
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_enqueue_after_close_is_rejected() {
        let (mut pool, _ret) = BufferPool::new(1, 1);
        let (mut queue, _rx) = WriteQueue::new(1);
        queue.close();
        assert!(queue.is_closed());

        let buf = pool.acquire().await.unwrap();
        assert!(matches!(
            queue.enqueue(buf).await,
            Err(EnqueueError::Closed(_))
        ));
    }

    #[tokio::test]
    async fn test_enqueue_waits_when_full() {
        let (mut pool, _ret) = BufferPool::new(2, 1);
        let (queue, mut rx) = WriteQueue::new(1);

        queue.enqueue(pool.acquire().await.unwrap()).await.unwrap();
        let second = pool.acquire().await.unwrap();
        let mut pending = Box::pin(queue.enqueue(second));
        assert!(
            tokio::time::timeout(Duration::from_millis(50), pending.as_mut())
                .await
                .is_err()
        );

        rx.recv().await.unwrap();
        pending.await.unwrap();
    }

    #[tokio::test]
    async fn test_enqueue_to_dropped_writer_returns_buffer() {
        let (mut pool, _ret) = BufferPool::new(1, 1);
        let (queue, rx) = WriteQueue::new(1);
        drop(rx);

        let buf = pool.acquire().await.unwrap();
        assert!(matches!(
            queue.enqueue(buf).await,
            Err(EnqueueError::Disconnected(_))
        ));
        assert!(queue.is_closed());
    }
}
