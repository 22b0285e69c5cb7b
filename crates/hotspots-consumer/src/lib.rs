//! The consumer process: pulls incident messages off the log, buffers
//! them, and flushes each batch either into the warehouse verbatim (raw
//! mode) or as bucketed counts POSTed to the aggregates service
//! (aggregate mode).

pub mod aggregate_writer;
pub mod aggregates_client;
pub mod buffered_consumer;
pub mod config;
pub mod error;
pub mod kafka_log;
pub mod raw_writer;

pub use aggregate_writer::AggregateWriter;
pub use aggregates_client::AggregatesServiceClient;
pub use buffered_consumer::{BufferedConsumer, MessageLog, OwnedMessage, Writer};
pub use config::Config;
pub use error::ConsumerError;
pub use raw_writer::RawWriter;
