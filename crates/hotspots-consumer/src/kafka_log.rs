use anyhow::Context;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{Headers, Message};

use crate::buffered_consumer::{MessageLog, OwnedMessage};

/// [`MessageLog`] backed by a real Kafka-protocol broker via `rdkafka`.
/// Offsets are committed synchronously once a batch has been durably
/// written downstream.
pub struct KafkaLog {
    consumer: StreamConsumer,
}

impl KafkaLog {
    pub fn new(broker_url: &str, group_id: &str, topic: &str) -> anyhow::Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", broker_url)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()
            .context("failed to construct the kafka consumer")?;

        consumer
            .subscribe(&[topic])
            .with_context(|| format!("failed to subscribe to topic {topic}"))?;

        Ok(Self { consumer })
    }
}

impl MessageLog for KafkaLog {
    async fn fetch_message(&mut self) -> anyhow::Result<OwnedMessage> {
        let message = self
            .consumer
            .recv()
            .await
            .context("failed to fetch message from kafka")?;

        let headers = message
            .headers()
            .map(|headers| {
                (0..headers.count())
                    .map(|i| {
                        let header = headers.get(i);
                        (header.key.to_string(), header.value.unwrap_or(&[]).to_vec())
                    })
                    .collect()
            })
            .unwrap_or_default();

        let payload = message.payload().unwrap_or(&[]).to_vec();

        Ok(OwnedMessage { headers, payload })
    }

    async fn commit_messages(&mut self, _messages: &[OwnedMessage]) -> anyhow::Result<()> {
        // Offsets are tracked by the underlying consumer's own position,
        // not by replaying the flushed messages; committing the current
        // assignment is equivalent and avoids re-deriving topic/partition
        // offsets from the buffered batch.
        self.consumer
            .commit_consumer_state(CommitMode::Sync)
            .context("failed to commit kafka offsets")?;
        Ok(())
    }
}
