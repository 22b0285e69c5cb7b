use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::ConsumerError;

/// An owned, detached copy of one log message. Buffered messages must
/// outlive the borrow of whatever client produced them, so headers and
/// payload are copied out eagerly at fetch time.
#[derive(Debug, Clone)]
pub struct OwnedMessage {
    pub headers: Vec<(String, Vec<u8>)>,
    pub payload: Vec<u8>,
}

impl OwnedMessage {
    pub fn header_pairs(&self) -> Vec<(&str, &[u8])> {
        self.headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
            .collect()
    }
}

/// The message-log side of the consumer: pulling individual messages and
/// committing offsets once a batch has been durably written.
pub trait MessageLog {
    fn fetch_message(
        &mut self,
    ) -> impl std::future::Future<Output = anyhow::Result<OwnedMessage>> + Send;

    fn commit_messages(
        &mut self,
        messages: &[OwnedMessage],
    ) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// The flush target: either the raw warehouse writer or the aggregate
/// HTTP writer.
pub trait Writer {
    fn write(
        &mut self,
        messages: &[OwnedMessage],
    ) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// Fixed-capacity buffer with an explicit occupancy cursor, drained by
/// `flush` and refilled by `fetch`. The buffer is never reallocated once
/// constructed: `fetch` writes into the next free slot and `flush`
/// operates only on `buffer[..buffer_idx]`.
pub struct BufferedConsumer<L, W> {
    log: L,
    writer: W,
    buffer: Vec<Option<OwnedMessage>>,
    buffer_idx: usize,
    buffer_size: usize,
    flush_interval: Duration,
}

impl<L, W> BufferedConsumer<L, W>
where
    L: MessageLog,
    W: Writer,
{
    /// # Panics
    /// Panics if `buffer_size` is zero or `flush_interval` is zero.
    pub fn new(log: L, writer: W, buffer_size: usize, flush_interval: Duration) -> Self {
        assert!(buffer_size > 0, "buffer_size must be positive");
        assert!(!flush_interval.is_zero(), "flush_interval must be positive");

        let mut buffer = Vec::with_capacity(buffer_size);
        buffer.resize_with(buffer_size, || None);

        Self {
            log,
            writer,
            buffer,
            buffer_idx: 0,
            buffer_size,
            flush_interval,
        }
    }

    pub fn buffer_full(&self) -> bool {
        self.buffer_idx == self.buffer_size
    }

    pub fn num_buffered_messages(&self) -> usize {
        self.buffer_idx
    }

    /// Fetch one message into the next free slot. Fails with
    /// [`ConsumerError::BufferFull`] without touching the log if the
    /// buffer has no room; propagates any other fetch error.
    pub async fn fetch(&mut self) -> Result<(), ConsumerError> {
        if self.buffer_full() {
            return Err(ConsumerError::BufferFull(self.buffer_idx));
        }
        let message = self.log.fetch_message().await.map_err(ConsumerError::Fetch)?;
        self.buffer[self.buffer_idx] = Some(message);
        self.buffer_idx += 1;
        Ok(())
    }

    /// Write and commit everything currently buffered. A no-op returning
    /// `Ok(0)` when the buffer is empty. On success resets the occupancy
    /// cursor to zero; on failure the buffer is left untouched so the
    /// next flush retries the same messages.
    pub async fn flush(&mut self) -> Result<usize, ConsumerError> {
        if self.buffer_idx == 0 {
            return Ok(0);
        }

        let batch: Vec<OwnedMessage> = self.buffer[..self.buffer_idx]
            .iter()
            .map(|slot| slot.clone().expect("occupied slots below buffer_idx are always Some"))
            .collect();

        self.writer.write(&batch).await.map_err(ConsumerError::Write)?;
        self.log.commit_messages(&batch).await.map_err(ConsumerError::Commit)?;

        self.buffer_idx = 0;
        Ok(batch.len())
    }

    /// Run the fetch/flush loop until `shutdown` reports `true`. Each
    /// cycle derives a deadline `flush_interval` out; hitting the
    /// deadline mid-fetch triggers a flush rather than propagating as an
    /// error. A non-`BufferFull` fetch error or any flush error is fatal
    /// and returned to the caller.
    pub async fn process(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), ConsumerError> {
        loop {
            if *shutdown.borrow() {
                self.flush().await?;
                return Ok(());
            }

            let deadline = Instant::now() + self.flush_interval;

            loop {
                if *shutdown.borrow() {
                    break;
                }
                if self.buffer_full() {
                    break;
                }

                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep_until(deadline) => break,
                    fetched = self.fetch() => {
                        match fetched {
                            Ok(()) => continue,
                            Err(ConsumerError::BufferFull(_)) => break,
                            Err(other) => return Err(other),
                        }
                    }
                }
            }

            self.flush().await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct FakeLog {
        to_fetch: Vec<anyhow::Result<OwnedMessage>>,
        committed: Arc<Mutex<Vec<OwnedMessage>>>,
    }

    impl MessageLog for FakeLog {
        async fn fetch_message(&mut self) -> anyhow::Result<OwnedMessage> {
            if self.to_fetch.is_empty() {
                anyhow::bail!("no more fake messages");
            }
            self.to_fetch.remove(0)
        }

        async fn commit_messages(&mut self, messages: &[OwnedMessage]) -> anyhow::Result<()> {
            self.committed.lock().await.extend_from_slice(messages);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeWriter {
        written: Arc<Mutex<Vec<OwnedMessage>>>,
        fail: bool,
    }

    impl Writer for FakeWriter {
        async fn write(&mut self, messages: &[OwnedMessage]) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("simulated writer failure");
            }
            self.written.lock().await.extend_from_slice(messages);
            Ok(())
        }
    }

    fn msg(n: u8) -> OwnedMessage {
        OwnedMessage {
            headers: vec![("schema_name".to_string(), b"a311_case".to_vec())],
            payload: vec![n],
        }
    }

    #[tokio::test]
    async fn fetch_fills_buffer_and_reports_full() {
        let log = FakeLog {
            to_fetch: vec![Ok(msg(1)), Ok(msg(2))],
            ..Default::default()
        };
        let writer = FakeWriter::default();
        let mut consumer = BufferedConsumer::new(log, writer, 2, Duration::from_secs(60));

        consumer.fetch().await.unwrap();
        assert_eq!(consumer.num_buffered_messages(), 1);
        assert!(!consumer.buffer_full());

        consumer.fetch().await.unwrap();
        assert!(consumer.buffer_full());

        assert!(matches!(
            consumer.fetch().await,
            Err(ConsumerError::BufferFull(2))
        ));
    }

    #[tokio::test]
    async fn flush_of_empty_buffer_is_a_noop() {
        let log = FakeLog::default();
        let writer = FakeWriter::default();
        let mut consumer = BufferedConsumer::new(log, writer, 4, Duration::from_secs(60));
        assert_eq!(consumer.flush().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn flush_writes_and_commits_only_the_occupied_prefix() {
        let committed = Arc::new(Mutex::new(Vec::new()));
        let written = Arc::new(Mutex::new(Vec::new()));
        let log = FakeLog {
            to_fetch: vec![Ok(msg(1)), Ok(msg(2))],
            committed: committed.clone(),
        };
        let writer = FakeWriter {
            written: written.clone(),
            fail: false,
        };
        let mut consumer = BufferedConsumer::new(log, writer, 4, Duration::from_secs(60));

        consumer.fetch().await.unwrap();
        consumer.fetch().await.unwrap();
        let n = consumer.flush().await.unwrap();

        assert_eq!(n, 2);
        assert_eq!(written.lock().await.len(), 2);
        assert_eq!(committed.lock().await.len(), 2);
        assert_eq!(consumer.num_buffered_messages(), 0);
    }

    #[tokio::test]
    async fn flush_failure_leaves_buffer_intact_and_skips_commit() {
        let committed = Arc::new(Mutex::new(Vec::new()));
        let log = FakeLog {
            to_fetch: vec![Ok(msg(1))],
            committed: committed.clone(),
        };
        let writer = FakeWriter {
            written: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        };
        let mut consumer = BufferedConsumer::new(log, writer, 4, Duration::from_secs(60));

        consumer.fetch().await.unwrap();
        assert!(consumer.flush().await.is_err());

        assert_eq!(consumer.num_buffered_messages(), 1);
        assert!(committed.lock().await.is_empty());
    }
}
