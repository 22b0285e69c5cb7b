use thiserror::Error;

/// Errors that can terminate the buffered-consumer loop. Message-level
/// decode failures are handled upstream in `hotspots_core::decode` and
/// never reach here.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("buffer is full ({0} messages)")]
    BufferFull(usize),

    #[error("failed to fetch message from the log: {0}")]
    Fetch(#[source] anyhow::Error),

    #[error("writer failed to persist a flush: {0}")]
    Write(#[source] anyhow::Error),

    #[error("failed to commit offsets after a successful write: {0}")]
    Commit(#[source] anyhow::Error),
}

/// Errors raised by the aggregates HTTP client.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("aggregates service returned {status}: {body}")]
    NonRetryableStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("exhausted {attempts} attempt(s) against the aggregates service, last status {status}")]
    RetriesExhausted {
        attempts: u32,
        status: reqwest::StatusCode,
    },

    #[error("transport error talking to the aggregates service: {0}")]
    Transport(#[source] reqwest::Error),
}
