use std::time::Duration;

use lazyfetch_error::{CoreError, CoreResult};
use lazyfetch_platform::LocalFile;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

/// Bytes per chunk handed from the reader task to the writer.
pub const CHUNK_SIZE: usize = 128 * 1024;
/// Upper bound on chunks in flight between reader and writer at once.
pub const MAX_CHUNKS: usize = 4;
/// Bound on any single read, write, or channel wait.
pub const IO_TIMEOUT: Duration = Duration::from_secs(15);

enum Delivered {
    Data { offset: u64, buf: Vec<u8> },
    Failed(CoreError),
}

/// A configurable instance of the copy engine. Defaults match the
/// production tunables; tests shrink `chunk_size`/`max_chunks`/`io_timeout`
/// to exercise the pipeline without copying megabytes.
#[derive(Debug, Clone, Copy)]
pub struct FetchEngine {
    chunk_size: usize,
    max_chunks: usize,
    io_timeout: Duration,
}

impl Default for FetchEngine {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            max_chunks: MAX_CHUNKS,
            io_timeout: IO_TIMEOUT,
        }
    }
}

impl FetchEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    #[must_use]
    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = max_chunks.max(1);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    /// Run the copy. Pre-flight extends `local` to `remote_size` before a
    /// byte moves, so a concurrent size-query observer never sees the
    /// pre-fetch zero-byte reality. On return (success or failure) `local`
    /// is truncated to however many bytes actually landed: no rollback of
    /// the pre-flight extension's *intent*, but the final length reflects
    /// what was really copied — including when the source ends short of
    /// its declared size.
    ///
    /// # Errors
    /// [`CoreError::Timeout`] if any single read, write, or handoff exceeds
    /// the configured timeout; otherwise the first I/O failure from either
    /// side of the pipeline.
    pub async fn run<R, L>(&self, source: R, remote_size: u64, local: &mut L) -> CoreResult<u64>
    where
        R: AsyncRead + Unpin + Send + 'static,
        L: LocalFile,
    {
        if remote_size == 0 {
            return Ok(0);
        }

        local.set_len(remote_size).await?;

        let channel_capacity = self.max_chunks.saturating_sub(1).max(1);
        let (tx, mut rx) = mpsc::channel::<Delivered>(channel_capacity);
        let chunk_size = self.chunk_size;
        let io_timeout = self.io_timeout;

        let reader = tokio::spawn(read_loop(source, remote_size, chunk_size, io_timeout, tx));

        let mut bytes_copied: u64 = 0;
        let result = loop {
            let delivered = match tokio::time::timeout(io_timeout, rx.recv()).await {
                Ok(Some(item)) => item,
                Ok(None) => break Ok(bytes_copied),
                Err(_) => break Err(CoreError::Timeout(io_timeout)),
            };
            match delivered {
                Delivered::Failed(err) => break Err(err),
                Delivered::Data { offset, buf } => {
                    if let Err(err) = write_chunk(local, offset, &buf, io_timeout).await {
                        break Err(err);
                    }
                    bytes_copied += buf.len() as u64;
                    if bytes_copied >= remote_size {
                        break Ok(bytes_copied);
                    }
                }
            }
        };

        // Drop the receiver so a still-running reader's next send fails
        // fast rather than blocking on a full channel nobody will drain.
        drop(rx);
        let _ = reader.await;

        let bytes_copied = result?;
        local.set_len(bytes_copied).await?;
        #[cfg(feature = "tracing")]
        tracing::debug!(remote_size, bytes_copied, "fetch engine run complete");
        Ok(bytes_copied)
    }
}

async fn write_chunk<L: LocalFile>(
    local: &mut L,
    offset: u64,
    buf: &[u8],
    io_timeout: Duration,
) -> CoreResult<()> {
    tokio::time::timeout(io_timeout, local.write_at(offset, buf))
        .await
        .map_err(|_| CoreError::Timeout(io_timeout))?
}

async fn read_loop<R>(
    mut source: R,
    remote_size: u64,
    chunk_size: usize,
    io_timeout: Duration,
    tx: mpsc::Sender<Delivered>,
) where
    R: AsyncRead + Unpin + Send,
{
    let mut offset: u64 = 0;
    while offset < remote_size {
        let want = usize::try_from(remote_size - offset)
            .unwrap_or(chunk_size)
            .min(chunk_size);
        let mut buf = vec![0u8; want];

        let read = match tokio::time::timeout(io_timeout, source.read(&mut buf)).await {
            Ok(Ok(n)) => n,
            Ok(Err(err)) => {
                let _ = tx.send(Delivered::Failed(err.into())).await;
                return;
            }
            Err(_) => {
                let _ = tx.send(Delivered::Failed(CoreError::Timeout(io_timeout))).await;
                return;
            }
        };

        if read == 0 {
            // Source ended before declared remote_size: stop, let the
            // writer drain what's already in flight and truncate.
            return;
        }

        buf.truncate(read);
        let this_offset = offset;
        offset += read as u64;

        if tx
            .send(Delivered::Data {
                offset: this_offset,
                buf,
            })
            .await
            .is_err()
        {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::io::Cursor;

    #[derive(Default)]
    struct MemLocal {
        data: Vec<u8>,
    }

    #[async_trait]
    impl LocalFile for MemLocal {
        async fn write_at(&mut self, offset: u64, buf: &[u8]) -> CoreResult<()> {
            let offset = offset as usize;
            if self.data.len() < offset + buf.len() {
                self.data.resize(offset + buf.len(), 0);
            }
            self.data[offset..offset + buf.len()].copy_from_slice(buf);
            Ok(())
        }

        async fn set_len(&mut self, len: u64) -> CoreResult<()> {
            self.data.resize(len as usize, 0);
            Ok(())
        }

        async fn current_len(&self) -> CoreResult<u64> {
            Ok(self.data.len() as u64)
        }
    }

    #[tokio::test]
    async fn zero_remote_size_succeeds_with_no_bytes() {
        let engine = FetchEngine::new();
        let mut local = MemLocal::default();
        let source = Cursor::new(Vec::<u8>::new());
        let copied = engine.run(source, 0, &mut local).await.unwrap();
        assert_eq!(copied, 0);
        assert_eq!(local.data.len(), 0);
    }

    #[tokio::test]
    async fn exact_length_source_copies_byte_for_byte() {
        let engine = FetchEngine::new().with_chunk_size(4).with_max_chunks(2);
        let content: Vec<u8> = (0u8..=255).collect();
        let mut local = MemLocal::default();
        let copied = engine
            .run(Cursor::new(content.clone()), content.len() as u64, &mut local)
            .await
            .unwrap();
        assert_eq!(copied, content.len() as u64);
        assert_eq!(local.data, content);
    }

    #[tokio::test]
    async fn short_source_truncates_to_bytes_actually_copied() {
        // Declared size 10240, source only has 2048 bytes.
        let engine = FetchEngine::new().with_chunk_size(512).with_max_chunks(3);
        let content = vec![7u8; 2048];
        let mut local = MemLocal::default();
        let copied = engine
            .run(Cursor::new(content.clone()), 10240, &mut local)
            .await
            .unwrap();
        assert_eq!(copied, 2048);
        assert_eq!(local.current_len().await.unwrap(), 2048);
        assert_eq!(local.data, content);
    }

    #[tokio::test]
    async fn single_chunk_fits_when_remote_size_is_small() {
        let engine = FetchEngine::new().with_chunk_size(128 * 1024).with_max_chunks(4);
        let content = vec![42u8; 10];
        let mut local = MemLocal::default();
        let copied = engine
            .run(Cursor::new(content.clone()), content.len() as u64, &mut local)
            .await
            .unwrap();
        assert_eq!(copied, 10);
        assert_eq!(local.data, content);
    }

    struct SlowReader;
    impl AsyncRead for SlowReader {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Pending
        }
    }

    #[tokio::test(start_paused = true)]
    async fn a_stalled_read_times_out() {
        let engine = FetchEngine::new()
            .with_chunk_size(16)
            .with_timeout(Duration::from_millis(50));
        let mut local = MemLocal::default();
        let err = engine.run(SlowReader, 32, &mut local).await.unwrap_err();
        assert!(matches!(err, CoreError::Timeout(_)));
    }
}
