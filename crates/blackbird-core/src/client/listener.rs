//! Background receive task for the async client.
//!
//! One task owns the read half of the link and forwards every chunk it
//! receives into a bounded queue. It stops on end-of-stream, on a read
//! error, when the queue's receiver is gone, or when cancelled.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::protocol::SOCKET_RECV;

/// Capacity of the received-chunk queue
pub(crate) const QUEUE_CAPACITY: usize = 64;

/// Handle to the running listener task
pub(crate) struct Listener {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Listener {
    /// Spawn the task on the current tokio runtime
    pub(crate) fn spawn<R>(reader: R) -> (Self, mpsc::Receiver<Vec<u8>>)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(listen(reader, tx, cancel.clone()));
        (
            Self {
                cancel,
                task: Some(task),
            },
            rx,
        )
    }

    /// Stop the task and wait for it to finish
    pub(crate) async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn listen<R>(mut reader: R, tx: mpsc::Sender<Vec<u8>>, cancel: CancellationToken)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut buf = vec![0u8; SOCKET_RECV];
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Listener cancelled");
                break;
            }
            result = reader.read(&mut buf) => match result {
                Ok(0) => {
                    tracing::debug!("Link closed by peer");
                    break;
                }
                Ok(n) => {
                    tracing::trace!(bytes = n, data = ?String::from_utf8_lossy(&buf[..n]), "Chunk received");
                    if tx.send(buf[..n].to_vec()).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Listener read failed");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_listener_forwards_chunks() {
        let (client, mut device) = tokio::io::duplex(64);
        let (listener, mut rx) = Listener::spawn(client);

        device.write_all(b"01 Open.\r").await.unwrap();
        let chunk = rx.recv().await.unwrap();
        assert_eq!(chunk, b"01 Open.\r".to_vec());

        listener.shutdown().await;
    }

    #[tokio::test]
    async fn test_listener_stops_on_eof() {
        let (client, device) = tokio::io::duplex(64);
        let (_listener, mut rx) = Listener::spawn(client);

        drop(device);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_listener_shutdown_closes_queue() {
        let (client, _device) = tokio::io::duplex(64);
        let (listener, mut rx) = Listener::spawn(client);

        listener.shutdown().await;
        assert!(rx.recv().await.is_none());
    }
}
